use std::net::SocketAddr;

use secrecy::ExposeSecret as _;
use snafu::ResultExt as _;
use tokio::net::TcpListener;

use crate::api::{self, App};
use crate::auth::Authenticator;
use crate::config::{Config, ServerConfig};
use crate::database::{Database, DatabaseQueryError};
use crate::error::*;
use crate::model::{NewUser, User};
use crate::views::Recorder;

/// Connects to the store, makes sure the bootstrap administrator exists and serves the API until a shutdown signal.
pub async fn run(config: Config) -> Result<(), ApplicationError> {
    let database = Database::connect(&config.database)
        .await
        .context(ConnectDatabaseSnafu)?;

    seed_admin(&config.server, &database).await.context(SeedAdminSnafu)?;

    let app = App::new(
        database,
        Authenticator::new(config.server.jwt_secret.clone()),
        Recorder::new(config.server.view_window),
    );
    let router = api::router(app, config.server.static_dir.as_deref());

    let address = config.server.host;
    let listener = TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;
    tracing::info!(%address, "listening");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)?;

    tracing::info!("server stopped");
    Ok(())
}

/// Creates the administrator named by `ADMIN_EMAIL` and `ADMIN_PASSWORD` unless an account with that email exists.
async fn seed_admin(config: &ServerConfig, db: &Database) -> Result<(), DatabaseQueryError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };

    let email = email.trim().to_lowercase();
    if User::by_email(&email, db).await?.is_some() {
        return Ok(());
    }

    let admin = NewUser::new(&email, password.expose_secret(), Some("Admin"), true);
    let user = User::create(&admin, db).await?;
    tracing::info!(user = %user.id.key(), "created bootstrap administrator");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received ctrl-c, shutting down"),
            Err(error) => {
                tracing::error!(%error, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(error) => {
                tracing::error!(%error, "could not listen for terminate signals");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn config(email: Option<&str>, password: Option<&str>) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1:0".parse().unwrap(),
            log_dir: "logs".into(),
            static_dir: None,
            view_window: std::time::Duration::from_secs(60),
            jwt_secret: SecretString::new("secret".to_string()),
            admin_email: email.map(str::to_string),
            admin_password: password.map(|password| SecretString::new(password.to_string())),
        }
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let db = Database::memory().await.unwrap();
        let config = config(Some("Root@VRHub.test"), Some("hunter22"));

        seed_admin(&config, &db).await.unwrap();
        seed_admin(&config, &db).await.unwrap();

        let users = User::list(&db).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin);
        assert_eq!(users[0].email, "root@vrhub.test");
        assert!(User::by_credentials("root@vrhub.test", "hunter22", &db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn no_credentials_no_admin() {
        let db = Database::memory().await.unwrap();
        seed_admin(&config(Some("root@vrhub.test"), None), &db).await.unwrap();
        assert!(User::list(&db).await.unwrap().is_empty());
    }
}
