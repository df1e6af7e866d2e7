use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value};
use snafu::ResultExt as _;

use super::*;
use crate::auth::Admin;
use crate::database::Database;
use crate::model::Settings;

pub fn routes() -> Router<App> {
    Router::new().route("/", get(show).put(update))
}

#[tracing::instrument(skip(db))]
async fn show(State(db): State<Database>) -> Result<Json<Settings>> {
    Ok(Json(Settings::load(&db).await.context(StorageSnafu)?))
}

#[tracing::instrument(skip(db))]
async fn update(
    State(db): State<Database>,
    Admin(_): Admin,
    Json(changes): Json<Map<String, Value>>,
) -> Result<Json<Settings>> {
    let current = Settings::load(&db).await.context(StorageSnafu)?;
    let (settings, accepted) = current.apply(&changes).context(SettingSnafu)?;

    Settings::save(&accepted, &db).await.context(StorageSnafu)?;
    tracing::info!(keys = accepted.len(), "updated settings");

    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn typed_updates() {
        let app = fixtures::app().await;
        let admin = fixtures::admin("admin@vrhub.test", &app.database).await;
        let server = fixtures::server(&app);
        let (name, token) = fixtures::bearer(&app, &admin);

        let defaults: Value = server.get("/api/settings").await.json();
        assert_eq!(defaults["siteName"], "VR Hub");
        assert_eq!(defaults["defaultPageSize"], 12);

        let updated: Value = server
            .put("/api/settings")
            .add_header(name.clone(), token.clone())
            .json(&json!({ "siteName": "Hub", "defaultPageSize": 24, "unknown": 1 }))
            .await
            .json();
        assert_eq!(updated["siteName"], "Hub");
        assert!(updated.get("unknown").is_none());

        let rejected = server
            .put("/api/settings")
            .add_header(name, token)
            .json(&json!({ "siteName": "Broken", "allowRegistration": "yes" }))
            .await;
        rejected.assert_status(StatusCode::BAD_REQUEST);

        let stored: Value = server.get("/api/settings").await.json();
        assert_eq!(stored["siteName"], "Hub");
        assert_eq!(stored["defaultPageSize"], 24);

        server
            .put("/api/settings")
            .json(&json!({ "siteName": "Anonymous" }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
