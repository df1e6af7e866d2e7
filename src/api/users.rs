use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _};

use super::*;
use crate::auth::{Admin, Authenticated};
use crate::database::Database;
use crate::model::{non_blank, NewUser, User, UserChanges, ViewHistory, WatchEntry};

pub fn routes() -> Router<App> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/watch-history", get(history).delete(clear_history))
        .route("/profile", put(update_profile))
        .route("/change-password", put(change_password))
        .route("/:id", get(show).put(update).delete(remove))
}

fn email(value: Option<&str>) -> Option<String> {
    non_blank(value).map(|email| email.to_lowercase())
}

fn password(value: Option<SecretString>) -> Option<SecretString> {
    value.filter(|password| !password.expose_secret().is_empty())
}

/// Rejects an email held by an account other than `current`.
async fn ensure_email_free(email: &str, current: Option<&Record<User>>, db: &Database) -> Result<()> {
    let holder = User::by_email(email, db).await.context(StorageSnafu)?;
    let taken = holder.is_some_and(|user| Some(&user.id) != current);
    snafu::ensure!(!taken, ConflictSnafu { message: "email already in use" });
    Ok(())
}

async fn existing(id: &str, db: &Database) -> Result<User> {
    let user = record::<User>(id, "user")?;
    User::find(&user, db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "user" })
}

#[tracing::instrument(skip(db))]
async fn list(State(db): State<Database>, Admin(_): Admin) -> Result<Json<Vec<User>>> {
    Ok(Json(User::list(&db).await.context(StorageSnafu)?))
}

#[tracing::instrument(skip(db))]
async fn show(State(db): State<Database>, Admin(_): Admin, Path(id): Path<String>) -> Result<Json<User>> {
    Ok(Json(existing(&id, &db).await?))
}

#[derive(Debug, Deserialize)]
struct NewAccount {
    email: Option<String>,
    password: Option<SecretString>,
    name: Option<String>,
    #[serde(default)]
    is_admin: bool,
    is_active: Option<bool>,
}

#[tracing::instrument(skip(db))]
async fn create(
    State(db): State<Database>,
    Admin(_): Admin,
    Json(payload): Json<NewAccount>,
) -> Result<(StatusCode, Json<User>)> {
    let (Some(email), Some(password)) = (email(payload.email.as_deref()), password(payload.password)) else {
        return ValidationSnafu {
            message: "email and password are required",
        }
        .fail();
    };
    ensure_email_free(&email, None, &db).await?;

    let name = non_blank(payload.name.as_deref());
    let account = NewUser {
        is_active: payload.is_active.unwrap_or(true),
        ..NewUser::new(&email, password.expose_secret(), name.as_deref(), payload.is_admin)
    };
    let user = User::create(&account, &db)
        .await
        .map_err(duplicate("email already in use"))?;
    tracing::info!(user = %user.id.key(), "created user");

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct AccountUpdate {
    email: Option<String>,
    password: Option<SecretString>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    name: Option<Option<String>>,
    is_admin: Option<bool>,
    is_active: Option<bool>,
}

/// Administrators may change any account. Everyone else may only change their own email, name and password.
#[tracing::instrument(skip(db))]
async fn update(
    State(db): State<Database>,
    Authenticated(claims): Authenticated,
    Path(id): Path<String>,
    Json(payload): Json<AccountUpdate>,
) -> Result<Json<User>> {
    let user = existing(&id, &db).await?;

    if !claims.is_admin {
        snafu::ensure!(
            user.id == claims.user(),
            ForbiddenSnafu {
                message: "not authorized to update this user"
            }
        );
        snafu::ensure!(
            payload.is_admin.is_none() && payload.is_active.is_none(),
            ForbiddenSnafu {
                message: "not authorized to change admin or active status"
            }
        );
    }

    let email = email(payload.email.as_deref()).filter(|email| *email != user.email);
    if let Some(email) = &email {
        ensure_email_free(email, Some(&user.id), &db).await?;
    }

    let changes = UserChanges {
        email,
        name: payload.name.map(|name| non_blank(name.as_deref())),
        password: password(payload.password),
        is_admin: payload.is_admin,
        is_active: payload.is_active,
    };
    snafu::ensure!(
        !changes.is_empty(),
        ValidationSnafu {
            message: "no fields to update"
        }
    );

    let user = User::update(&user.id, &changes, &db)
        .await
        .map_err(duplicate("email already in use"))?
        .context(NotFoundSnafu { resource: "user" })?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
struct Profile {
    email: Option<String>,
    name: Option<String>,
}

/// Replaces the caller's display name, and the email when one is given.
#[tracing::instrument(skip(db))]
async fn update_profile(
    State(db): State<Database>,
    Authenticated(claims): Authenticated,
    Json(payload): Json<Profile>,
) -> Result<Json<User>> {
    let me = claims.user();
    let email = email(payload.email.as_deref());
    if let Some(email) = &email {
        ensure_email_free(email, Some(&me), &db).await?;
    }

    let changes = UserChanges {
        email,
        name: Some(non_blank(payload.name.as_deref())),
        ..Default::default()
    };
    let user = User::update(&me, &changes, &db)
        .await
        .map_err(duplicate("email already in use"))?
        .context(NotFoundSnafu { resource: "user" })?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange {
    current_password: Option<SecretString>,
    new_password: Option<SecretString>,
}

#[tracing::instrument(skip(db))]
async fn change_password(
    State(db): State<Database>,
    Authenticated(claims): Authenticated,
    Json(payload): Json<PasswordChange>,
) -> Result<Json<Message>> {
    let (Some(current), Some(new)) = (password(payload.current_password), password(payload.new_password)) else {
        return ValidationSnafu {
            message: "current password and new password are required",
        }
        .fail();
    };

    let changed = User::change_password(&claims.user(), current.expose_secret(), new.expose_secret(), &db)
        .await
        .context(StorageSnafu)?;
    snafu::ensure!(
        changed,
        ValidationSnafu {
            message: "current password is incorrect"
        }
    );

    Ok(Message::new("Password updated successfully"))
}

/// Removes an account with its likes and watch history. Administrators cannot remove themselves.
#[tracing::instrument(skip(db))]
async fn remove(
    State(db): State<Database>,
    Admin(claims): Admin,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let user = record::<User>(&id, "user")?;
    snafu::ensure!(
        user != claims.user(),
        ValidationSnafu {
            message: "you cannot delete your own account"
        }
    );

    User::find(&user, &db)
        .await
        .context(StorageSnafu)?
        .context(NotFoundSnafu { resource: "user" })?;

    User::delete(&user, &db).await.context(StorageSnafu)?;
    tracing::info!(user = %user.key(), "removed user");

    Ok(Message::new("User removed"))
}

#[tracing::instrument(skip(db))]
async fn history(State(db): State<Database>, Authenticated(claims): Authenticated) -> Result<Json<Vec<WatchEntry>>> {
    let history = WatchEntry::of_user(&claims.user(), &db)
        .await
        .context(StorageSnafu)?;
    Ok(Json(history))
}

/// Forgets the ledger only. View counters keep every view already counted.
#[tracing::instrument(skip(db))]
async fn clear_history(State(db): State<Database>, Authenticated(claims): Authenticated) -> Result<Json<Message>> {
    let cleared = ViewHistory::clear(&claims.user(), &db)
        .await
        .context(StorageSnafu)?;
    tracing::debug!(entries = cleared.len(), "cleared watch history");

    Ok(Message::new("Watch history cleared"))
}
