use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _};

use super::*;
use crate::auth::{Authenticated, Authenticator};
use crate::database::Database;
use crate::model::{non_blank, NewUser, Settings, User};
use crate::time;

pub fn routes() -> Router<App> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Serialize)]
struct Session {
    token: String,
    user: User,
}

fn session(authenticator: &Authenticator, user: User) -> Result<Json<Session>> {
    let claims = authenticator.claims(&user, time::now());
    let token = authenticator.encode(&claims).context(TokenSnafu)?;
    Ok(Json(Session { token, user }))
}

#[derive(Debug, Deserialize)]
struct Register {
    email: Option<String>,
    password: Option<SecretString>,
    name: Option<String>,
}

#[tracing::instrument(skip(db, authenticator))]
async fn register(
    State(db): State<Database>,
    State(authenticator): State<Authenticator>,
    Json(payload): Json<Register>,
) -> Result<(StatusCode, Json<Session>)> {
    let settings = Settings::load(&db).await.context(StorageSnafu)?;
    snafu::ensure!(
        settings.allow_registration,
        ForbiddenSnafu {
            message: "registration is currently disabled"
        }
    );

    let email = non_blank(payload.email.as_deref())
        .map(|email| email.to_lowercase())
        .context(ValidationSnafu {
            message: "email is required",
        })?;
    let password = payload
        .password
        .filter(|password| !password.expose_secret().is_empty())
        .context(ValidationSnafu {
            message: "password is required",
        })?;

    let existing = User::by_email(&email, &db).await.context(StorageSnafu)?;
    snafu::ensure!(
        existing.is_none(),
        ConflictSnafu {
            message: "user already exists"
        }
    );

    let name = non_blank(payload.name.as_deref());
    let user = User::create(&NewUser::new(&email, password.expose_secret(), name.as_deref(), false), &db)
        .await
        .map_err(duplicate("user already exists"))?;
    tracing::info!(user = %user.id.key(), "registered user");

    Ok((StatusCode::CREATED, session(&authenticator, user)?))
}

#[derive(Debug, Deserialize)]
struct Login {
    email: String,
    password: SecretString,
}

#[tracing::instrument(skip(db, authenticator))]
async fn login(
    State(db): State<Database>,
    State(authenticator): State<Authenticator>,
    Json(payload): Json<Login>,
) -> Result<Json<Session>> {
    let email = payload.email.trim().to_lowercase();

    let user = User::by_credentials(&email, payload.password.expose_secret(), &db)
        .await
        .context(StorageSnafu)?
        .context(UnauthorizedSnafu {
            message: "invalid credentials",
        })?;

    session(&authenticator, user)
}

#[tracing::instrument(skip(db))]
async fn me(State(db): State<Database>, Authenticated(claims): Authenticated) -> Result<Json<User>> {
    let user = User::find(&claims.user(), &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "user" })?;
    Ok(Json(user))
}
