use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use snafu::{OptionExt as _, ResultExt as _};

use super::*;
use crate::auth::{Admin, Viewer};
use crate::catalog::{self, ListParams, Listing, Page, VideoItem};
use crate::database::{Database, Key};
use crate::model::{non_blank, Studio, Tag, Video, VideoContent};
use crate::time;
use crate::views::{Observer, Recorder};

pub fn routes() -> Router<App> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).put(update).delete(remove))
        .route("/:id/view", post(view))
}

#[tracing::instrument(skip(db))]
async fn list(
    State(db): State<Database>,
    viewer: Viewer,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>> {
    let listing = Listing::from(&params);
    let page = catalog::list(&listing, viewer.user().as_ref(), &db)
        .await
        .context(StorageSnafu)?;
    Ok(Json(page))
}

/// A signed in viewer's visit is recorded on the way. Recording is best effort and never fails the request.
#[tracing::instrument(skip(db, recorder))]
async fn show(
    State(db): State<Database>,
    State(recorder): State<Recorder>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<Json<VideoItem>> {
    let video = record::<Video>(&id, "video")?;
    let user = viewer.user();

    let mut item = catalog::find(&video, user.as_ref(), &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "video" })?;

    if let Some(user) = user {
        match recorder.record(&video, &Observer::User(user), time::now(), &db).await {
            Ok(Some(outcome)) => item.views = outcome.views,
            Ok(None) => {}
            Err(error) => tracing::warn!(%error, "could not record view"),
        }
    }

    Ok(Json(item))
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Viewed {
    #[serde_as(serialize_as = "Key")]
    video_id: Record<Video>,
    views: u64,
    counted: bool,
}

/// The caller's source address. `X-Forwarded-For` wins over the socket peer so that proxied callers are told apart.
fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse().ok())
        .or(peer.map(|peer| peer.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[tracing::instrument(skip(db, recorder, headers))]
async fn view(
    State(db): State<Database>,
    State(recorder): State<Recorder>,
    viewer: Viewer,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Viewed>> {
    let video = record::<Video>(&id, "video")?;

    let observer = match viewer.user() {
        Some(user) => Observer::User(user),
        None => Observer::Address(client_address(&headers, peer.map(|ConnectInfo(peer)| peer))),
    };

    let outcome = recorder
        .record(&video, &observer, time::now(), &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "video" })?;

    Ok(Json(Viewed {
        video_id: video,
        views: outcome.views,
        counted: outcome.counted,
    }))
}

#[derive(Debug, Deserialize)]
struct VideoPayload {
    title: Option<String>,
    description: Option<String>,
    studio_id: Option<String>,
    video_url: Option<String>,
    thumbnail_url: Option<String>,
    tags: Option<Vec<String>>,
}

impl VideoPayload {
    /// Validates the payload and checks that every referenced studio and tag exists.
    async fn resolve(self, db: &Database) -> Result<(VideoContent, Option<Vec<Record<Tag>>>)> {
        let title = non_blank(self.title.as_deref()).context(ValidationSnafu {
            message: "title is required",
        })?;
        let video_url = non_blank(self.video_url.as_deref()).context(ValidationSnafu {
            message: "video_url is required",
        })?;

        let studio = match self.studio_id.as_deref().and_then(Record::<Studio>::parse) {
            Some(studio) => {
                Studio::find(&studio, db)
                    .await
                    .context(StorageSnafu)?
                    .context(NotFoundSnafu { resource: "studio" })?;
                Some(studio)
            }
            None => None,
        };

        let tags = match self.tags {
            Some(keys) => Some(existing_tags(&keys, db).await?),
            None => None,
        };

        let content = VideoContent::new(
            title,
            non_blank(self.description.as_deref()),
            studio,
            video_url,
            non_blank(self.thumbnail_url.as_deref()),
        );
        Ok((content, tags))
    }
}

async fn existing_tags(keys: &[String], db: &Database) -> Result<Vec<Record<Tag>>> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for key in keys {
        let tag = record::<Tag>(key, "tag")?;
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }

    let found = Tag::existing(&tags, db).await.context(StorageSnafu)?;
    snafu::ensure!(found.len() == tags.len(), NotFoundSnafu { resource: "tag" });

    Ok(tags)
}

async fn enriched(video: &Record<Video>, db: &Database) -> Result<VideoItem> {
    catalog::find(video, None, db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "video" })
}

#[tracing::instrument(skip(db, payload))]
async fn create(
    State(db): State<Database>,
    Admin(_): Admin,
    Json(payload): Json<VideoPayload>,
) -> Result<(StatusCode, Json<VideoItem>)> {
    let (content, tags) = payload.resolve(&db).await?;

    let video = Video::create(&content, tags.as_deref().unwrap_or_default(), &db)
        .await
        .context(StorageSnafu)?;
    tracing::info!(video = %video.key(), "created video");

    Ok((StatusCode::CREATED, Json(enriched(&video, &db).await?)))
}

#[tracing::instrument(skip(db, payload))]
async fn update(
    State(db): State<Database>,
    Admin(_): Admin,
    Path(id): Path<String>,
    Json(payload): Json<VideoPayload>,
) -> Result<Json<VideoItem>> {
    let video = record::<Video>(&id, "video")?;
    Video::find(&video, &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "video" })?;

    let (content, tags) = payload.resolve(&db).await?;
    Video::update(&video, &content, tags.as_deref(), &db)
        .await
        .context(StorageSnafu)?;

    Ok(Json(enriched(&video, &db).await?))
}

#[tracing::instrument(skip(db))]
async fn remove(
    State(db): State<Database>,
    Admin(_): Admin,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let video = record::<Video>(&id, "video")?;
    Video::find(&video, &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "video" })?;

    Video::delete(&video, &db).await.context(StorageSnafu)?;
    tracing::info!(video = %video.key(), "removed video");

    Ok(Message::new("Video removed"))
}
