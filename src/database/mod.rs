use derive_new::new;
use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::opt::{auth, IntoQuery};
use surrealdb::Surreal;
use url::Url;

/// Helper trait for executing arbitrary SurrealQL queries.
pub mod query;

/// Typed record ids.
pub mod record;

/// Macros for defining table methods.
pub mod macros;

pub use query::{take, Bindings, DatabaseQueryError};
pub use record::{Key, Record, Table};

pub type DatabaseError = surrealdb::Error;

const SETUP: &str = include_str!("../../schema.surrealql");

/// Shared handle to the store. Cloning is cheap, every clone talks to the same connection.
#[derive(Debug, Clone, new)]
pub struct Database {
    database: Surreal<Any>,
}

impl Database {
    /// Connects to the configured server, signs in when credentials are given and applies the schema.
    #[tracing::instrument(skip_all, fields(url = %config.url))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let database = surrealdb::engine::any::connect(config.url.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            database
                .signin(auth::Root {
                    username,
                    password: password.expose_secret(),
                })
                .await?;
        }

        database
            .use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        let database = Database::new(database);
        database.setup().await?;

        tracing::info!(namespace = %config.namespace, database = %config.database, "connected to the database");
        Ok(database)
    }

    /// A fresh embedded in-memory store with the schema applied.
    pub async fn memory() -> Result<Self, DatabaseError> {
        let database = surrealdb::engine::any::connect("mem://").await?;
        database.use_ns("vrhub").use_db("vrhub").await?;

        let database = Database::new(database);
        database.setup().await?;
        Ok(database)
    }

    async fn setup(&self) -> Result<(), DatabaseError> {
        self.database.query(SETUP).await?.check()?;
        Ok(())
    }

    /// Create a builder to execute arbitrary SQL code on the database.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let videos: Vec<Video> = db.sql("SELECT * FROM videos WHERE views > $views")
    ///     .bind(("views", 1_000))
    ///     .fetch_first()
    ///     .await?;
    /// ```
    pub fn sql(&self, query: impl IntoQuery) -> Bindings<'_> {
        Bindings::new(self.database.query(query))
    }
}

/// Loaded from the `SURREAL_` prefixed environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Url,
    #[serde(rename = "ns", default = "default_name")]
    pub namespace: String,
    #[serde(rename = "db", default = "default_name")]
    pub database: String,
    #[serde(rename = "user")]
    pub username: Option<String>,
    #[serde(rename = "pass")]
    pub password: Option<SecretString>,
}

fn default_name() -> String {
    "vrhub".to_string()
}
