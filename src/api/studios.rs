use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};

use super::*;
use crate::auth::Admin;
use crate::database::Database;
use crate::model::{non_blank, Studio, StudioContent};

pub fn routes() -> Router<App> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/name/:name", get(by_name))
        .route("/:id", get(show).put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
struct StudioPayload {
    name: Option<String>,
    description: Option<String>,
    website: Option<String>,
    logo_url: Option<String>,
}

impl StudioPayload {
    fn content(self) -> Result<StudioContent> {
        let name = non_blank(self.name.as_deref()).context(ValidationSnafu {
            message: "studio name is required",
        })?;

        Ok(StudioContent {
            name,
            description: non_blank(self.description.as_deref()),
            website: non_blank(self.website.as_deref()),
            logo_url: non_blank(self.logo_url.as_deref()),
        })
    }
}

/// Names are unique regardless of case; `current` is allowed to keep its own name.
async fn ensure_unique(name: &str, current: Option<&Record<Studio>>, db: &Database) -> Result<()> {
    let holder = Studio::by_name(name, db).await.context(StorageSnafu)?;
    let taken = holder.is_some_and(|studio| Some(&studio.id) != current);
    snafu::ensure!(!taken, ConflictSnafu { message: "studio already exists" });
    Ok(())
}

async fn existing(id: &str, db: &Database) -> Result<Studio> {
    let studio = record::<Studio>(id, "studio")?;
    Studio::find(&studio, db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "studio" })
}

#[tracing::instrument(skip(db))]
async fn list(State(db): State<Database>) -> Result<Json<Vec<Studio>>> {
    Ok(Json(Studio::list(&db).await.context(StorageSnafu)?))
}

#[tracing::instrument(skip(db))]
async fn show(State(db): State<Database>, Path(id): Path<String>) -> Result<Json<Studio>> {
    Ok(Json(existing(&id, &db).await?))
}

#[tracing::instrument(skip(db))]
async fn by_name(State(db): State<Database>, Path(name): Path<String>) -> Result<Json<Studio>> {
    let studio = Studio::by_name(&name, &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "studio" })?;
    Ok(Json(studio))
}

#[tracing::instrument(skip(db))]
async fn create(
    State(db): State<Database>,
    Admin(_): Admin,
    Json(payload): Json<StudioPayload>,
) -> Result<(StatusCode, Json<Studio>)> {
    let content = payload.content()?;
    ensure_unique(&content.name, None, &db).await?;

    let studio = Studio::create(&content, &db)
        .await
        .map_err(duplicate("studio already exists"))?;
    Ok((StatusCode::CREATED, Json(studio)))
}

#[tracing::instrument(skip(db))]
async fn update(
    State(db): State<Database>,
    Admin(_): Admin,
    Path(id): Path<String>,
    Json(payload): Json<StudioPayload>,
) -> Result<Json<Studio>> {
    let studio = existing(&id, &db).await?;
    let content = payload.content()?;
    ensure_unique(&content.name, Some(&studio.id), &db).await?;

    let studio = Studio::update(&studio.id, &content, &db)
        .await
        .map_err(duplicate("studio already exists"))?
        .context(NotFoundSnafu { resource: "studio" })?;
    Ok(Json(studio))
}

/// A studio that still owns videos cannot be removed.
#[tracing::instrument(skip(db))]
async fn remove(State(db): State<Database>, Admin(_): Admin, Path(id): Path<String>) -> Result<Json<Message>> {
    let studio = existing(&id, &db).await?;

    let used = Studio::delete_unused(&studio.id, &db).await.context(StorageSnafu)?;
    snafu::ensure!(
        used == 0,
        ConflictSnafu {
            message: format!("studio is used by {used} video(s)"),
        }
    );

    Ok(Message::new("Studio removed"))
}
