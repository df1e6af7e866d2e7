use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};

use super::*;
use crate::auth::Admin;
use crate::database::Database;
use crate::model::{non_blank, Tag, TagContent};

pub fn routes() -> Router<App> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/name/:name", get(by_name))
        .route("/:id", get(show).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct TagPayload {
    name: Option<String>,
    description: Option<String>,
    thumbnail_url: Option<String>,
}

impl TagPayload {
    fn content(self) -> Result<TagContent> {
        let name = non_blank(self.name.as_deref()).context(ValidationSnafu {
            message: "tag name is required",
        })?;

        Ok(TagContent {
            name,
            description: non_blank(self.description.as_deref()),
            thumbnail_url: non_blank(self.thumbnail_url.as_deref()),
        })
    }
}

/// Names are unique regardless of case; `current` is allowed to keep its own name.
async fn ensure_unique(name: &str, current: Option<&Record<Tag>>, db: &Database) -> Result<()> {
    let holder = Tag::by_name(name, db).await.context(StorageSnafu)?;
    let taken = holder.is_some_and(|tag| Some(&tag.id) != current);
    snafu::ensure!(!taken, ConflictSnafu { message: "tag already exists" });
    Ok(())
}

async fn existing(id: &str, db: &Database) -> Result<Tag> {
    let tag = record::<Tag>(id, "tag")?;
    Tag::find(&tag, db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "tag" })
}

#[tracing::instrument(skip(db))]
async fn list(State(db): State<Database>) -> Result<Json<Vec<Tag>>> {
    Ok(Json(Tag::list(&db).await.context(StorageSnafu)?))
}

#[tracing::instrument(skip(db))]
async fn show(State(db): State<Database>, Path(id): Path<String>) -> Result<Json<Tag>> {
    Ok(Json(existing(&id, &db).await?))
}

#[tracing::instrument(skip(db))]
async fn by_name(State(db): State<Database>, Path(name): Path<String>) -> Result<Json<Tag>> {
    let tag = Tag::by_name(&name, &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "tag" })?;
    Ok(Json(tag))
}

#[tracing::instrument(skip(db))]
async fn create(
    State(db): State<Database>,
    Admin(_): Admin,
    Json(payload): Json<TagPayload>,
) -> Result<(StatusCode, Json<Tag>)> {
    let content = payload.content()?;
    ensure_unique(&content.name, None, &db).await?;

    let tag = Tag::create(&content, &db)
        .await
        .map_err(duplicate("tag already exists"))?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[tracing::instrument(skip(db))]
async fn update(
    State(db): State<Database>,
    Admin(_): Admin,
    Path(id): Path<String>,
    Json(payload): Json<TagPayload>,
) -> Result<Json<Tag>> {
    let tag = existing(&id, &db).await?;
    let content = payload.content()?;
    ensure_unique(&content.name, Some(&tag.id), &db).await?;

    let tag = Tag::update(&tag.id, &content, &db)
        .await
        .map_err(duplicate("tag already exists"))?
        .context(NotFoundSnafu { resource: "tag" })?;
    Ok(Json(tag))
}

/// A tag still attached to a video cannot be removed.
#[tracing::instrument(skip(db))]
async fn remove(State(db): State<Database>, Admin(_): Admin, Path(id): Path<String>) -> Result<Json<Message>> {
    let tag = existing(&id, &db).await?;

    let used = Tag::delete_unused(&tag.id, &db).await.context(StorageSnafu)?;
    snafu::ensure!(
        used == 0,
        ConflictSnafu {
            message: format!("tag is used by {used} video(s)"),
        }
    );

    Ok(Message::new("Tag removed"))
}
