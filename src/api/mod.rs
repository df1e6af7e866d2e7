use std::path::Path;

use axum::Router;
use snafu::{IntoError as _, OptionExt as _};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::database::{DatabaseQueryError, Record, Table};

mod error;
mod state;

mod likes;
mod session;
mod settings;
mod studios;
mod tags;
mod users;
mod videos;

pub use error::*;
pub use state::*;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// The JSON API mounted under `/api`. When `static_dir` is given every other path serves the front-end build, with
/// `index.html` standing in for unknown files.
pub fn router(app: App, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .nest("/auth", session::routes())
        .nest("/videos", videos::routes())
        .nest("/tags", tags::routes())
        .nest("/studios", studios::routes())
        .nest("/likes", likes::routes())
        .nest("/users", users::routes())
        .nest("/settings", settings::routes());

    let mut router = Router::new().nest("/api", api);

    if let Some(dir) = static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app)
}

/// Resolves a path key, answering 404 for keys that cannot name a record.
fn record<T: Table>(key: &str, resource: &'static str) -> Result<Record<T>> {
    Record::parse(key).context(NotFoundSnafu { resource })
}

/// Answers a write refused by a unique index as a conflict, the same way the lookup before the write does.
fn duplicate(message: &'static str) -> impl FnOnce(DatabaseQueryError) -> ApiError {
    move |error| {
        if error.is_duplicate() {
            ConflictSnafu { message }.build()
        } else {
            StorageSnafu.into_error(error)
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct Message {
    msg: &'static str,
}

impl Message {
    fn new(msg: &'static str) -> axum::Json<Message> {
        axum::Json(Message { msg })
    }
}
