use std::collections::HashMap;

use serde::Deserialize;

use super::*;
use crate::database::{take, Database, DatabaseQueryError};
use crate::model::{Tag, User};

/// Columns of a [VideoItem]. `likes_count` counts distinct liking users and is never stored.
const PROJECTION: &str = "id, title, description, studio, studio.name AS studio_name, video_url, thumbnail_url, \
    created_at, views, \
    array::len(array::distinct((SELECT VALUE user FROM likes WHERE video = $parent.id))) AS likes_count";

const IS_LIKED: &str = "($viewer INSIDE (SELECT VALUE user FROM likes WHERE video = $parent.id)) AS is_liked";

fn projection(viewer: Option<&Record<User>>) -> String {
    match viewer {
        Some(_) => format!("{PROJECTION}, {IS_LIKED}"),
        None => PROJECTION.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct Total {
    total: u64,
}

fn total(rows: Vec<Total>) -> u64 {
    rows.first().map_or(0, |row| row.total)
}

#[derive(Debug, Deserialize)]
struct TagRow {
    video: Record<Video>,
    tag: Record<Tag>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LikedRow {
    video: Record<Video>,
    created_at: Timestamp,
}

/// Produces one page of videos matching `listing`, with the total computed from the same predicate.
#[tracing::instrument(skip(db))]
pub async fn list(
    listing: &Listing,
    viewer: Option<&Record<User>>,
    db: &Database,
) -> Result<Page, DatabaseQueryError> {
    let predicate = listing.filter.predicate();
    let sql = format!(
        "SELECT {projection} FROM videos {predicate} ORDER BY {order} LIMIT $limit START $start;
        SELECT count() AS total FROM videos {predicate} GROUP ALL;",
        projection = projection(viewer),
        order = listing.sort.order(),
    );

    let mut query = listing.paging.bind(listing.filter.bind(db.sql(sql)));
    if let Some(viewer) = viewer {
        query = query.bind(("viewer", viewer));
    }

    let mut response = query.execute().await?;
    let mut videos: Vec<VideoItem> = take(&mut response, 0)?;
    let total = total(take(&mut response, 1)?);

    attach_tags(&mut videos, db).await?;

    Ok(Page {
        videos,
        pagination: Pagination::new(listing.paging, total),
    })
}

/// A single enriched video.
#[tracing::instrument(skip(db))]
pub async fn find(
    video: &Record<Video>,
    viewer: Option<&Record<User>>,
    db: &Database,
) -> Result<Option<VideoItem>, DatabaseQueryError> {
    let mut query = db
        .sql(format!("SELECT {} FROM $video", projection(viewer)))
        .bind(("video", video));
    if let Some(viewer) = viewer {
        query = query.bind(("viewer", viewer));
    }

    let mut videos: Vec<VideoItem> = query.fetch_first().await?;
    attach_tags(&mut videos, db).await?;

    Ok(videos.into_iter().next())
}

/// The videos liked by `viewer`, most recently liked first.
#[tracing::instrument(skip(db))]
pub async fn liked(viewer: &Record<User>, paging: Paging, db: &Database) -> Result<Page, DatabaseQueryError> {
    let mut response = paging
        .bind(db.sql(
            "SELECT video, created_at FROM likes WHERE user = $viewer ORDER BY created_at DESC LIMIT $limit START $start;
            SELECT count() AS total FROM likes WHERE user = $viewer GROUP ALL;",
        ))
        .bind(("viewer", viewer))
        .execute()
        .await?;

    let likes: Vec<LikedRow> = take(&mut response, 0)?;
    let total = total(take(&mut response, 1)?);

    let ids: Vec<&Record<Video>> = likes.iter().map(|like| &like.video).collect();
    let found: Vec<VideoItem> = db
        .sql(format!("SELECT {} FROM $videos", projection(Some(viewer))))
        .bind(("videos", &ids))
        .bind(("viewer", viewer))
        .fetch_first()
        .await?;

    let mut found: HashMap<Record<Video>, VideoItem> =
        found.into_iter().map(|video| (video.id.clone(), video)).collect();
    let mut videos: Vec<VideoItem> = likes
        .into_iter()
        .filter_map(|like| {
            let mut video = found.remove(&like.video)?;
            video.liked_at = Some(like.created_at);
            Some(video)
        })
        .collect();

    attach_tags(&mut videos, db).await?;

    Ok(Page {
        videos,
        pagination: Pagination::new(paging, total),
    })
}

/// Fills in the tags of every video with one batched query.
async fn attach_tags(videos: &mut [VideoItem], db: &Database) -> Result<(), DatabaseQueryError> {
    if videos.is_empty() {
        return Ok(());
    }

    let ids: Vec<&Record<Video>> = videos.iter().map(|video| &video.id).collect();
    let rows: Vec<TagRow> = db
        .sql("SELECT video, tag, tag.name AS name FROM video_tags WHERE video INSIDE $videos ORDER BY name ASC")
        .bind(("videos", &ids))
        .fetch_first()
        .await?;

    let mut tags: HashMap<Record<Video>, Vec<TagRef>> = HashMap::new();
    for TagRow { video, tag, name } in rows {
        tags.entry(video).or_default().push(TagRef { id: tag, name });
    }

    for video in videos {
        video.tags = tags.remove(&video.id).unwrap_or_default();
    }

    Ok(())
}
