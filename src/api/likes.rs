use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_with::serde_as;
use snafu::{OptionExt as _, ResultExt as _};

use super::*;
use crate::auth::Authenticated;
use crate::catalog::{self, Page, PageParams, Paging};
use crate::database::{Database, Key};
use crate::model::{Like, LikeAction, Video};
use crate::time;

pub fn routes() -> Router<App> {
    Router::new()
        .route("/", get(liked))
        .route("/videos/:id", post(toggle))
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeToggled {
    action: LikeAction,
    likes_count: u64,
    #[serde_as(serialize_as = "Key")]
    video_id: Record<Video>,
}

#[tracing::instrument(skip(db))]
async fn toggle(
    State(db): State<Database>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<LikeToggled>> {
    let video = record::<Video>(&id, "video")?;

    let toggled = Like::toggle(&claims.user(), &video, time::now(), &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "video" })?;

    Ok(Json(LikeToggled {
        action: toggled.action,
        likes_count: toggled.likes_count,
        video_id: video,
    }))
}

#[tracing::instrument(skip(db))]
async fn liked(
    State(db): State<Database>,
    Authenticated(claims): Authenticated,
    Query(params): Query<PageParams>,
) -> Result<Json<Page>> {
    let page = catalog::liked(&claims.user(), Paging::from(&params), &db)
        .await
        .context(StorageSnafu)?;
    Ok(Json(page))
}
