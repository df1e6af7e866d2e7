use derive_new::new;
use serde::de::DeserializeOwned;
use snafu::{Location, OptionExt as _, ResultExt as _, Snafu};
use surrealdb::opt::QueryResult;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatabaseQueryError {
    /// The database refused to run the query, or a statement inside it failed.
    #[snafu(display("query failed at {location}: {source}"))]
    MalformedQuery {
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("could not deserialize statement {index} at {location}: {source}"))]
    Deserialize {
        index: usize,
        source: surrealdb::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("expected a result but the query returned nothing at {location}"))]
    NoResults {
        #[snafu(implicit)]
        location: Location,
    },
}

impl DatabaseQueryError {
    /// Whether a write was refused by a unique index.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            DatabaseQueryError::MalformedQuery {
                source: surrealdb::Error::Db(surrealdb::error::Db::IndexExists { .. }),
                ..
            }
        )
    }
}

/// A SurrealQL query with its bound parameters, waiting to be executed.
///
/// Parameters are bound with [Bindings::bind] which takes any serializable `(name, value)` pair. Values are never
/// spliced into the query text.
///
/// # Example
/// ```ignore
/// let tags: Vec<Tag> = database.sql("SELECT * FROM tags WHERE name = $name")
///     .bind(("name", "horror"))
///     .fetch_first()
///     .await?;
/// ```
#[derive(Debug, new)]
pub struct Bindings<'a> {
    query: surrealdb::method::Query<'a, surrealdb::engine::any::Any>,
}

impl Bindings<'_> {
    pub fn bind(mut self, params: impl serde::Serialize) -> Self {
        let query = self.query;
        self.query = query.bind(params);
        self
    }

    /// Execute the query and return the [surrealdb::Response] holding one result per statement.
    ///
    /// Any failing statement turns the whole call into an error. Inside `BEGIN TRANSACTION` every statement fails
    /// together, so a successful return means the transaction committed.
    pub async fn execute(self) -> Result<surrealdb::Response, DatabaseQueryError> {
        let response = self.query.await.context(MalformedQuerySnafu)?;
        let response = response.check().context(MalformedQuerySnafu)?;
        tracing::debug!(statements = response.num_statements(), "executed query");
        Ok(response)
    }

    /// Execute the query and return the first statement as a deserialized value.
    pub async fn fetch_first<T: DeserializeOwned>(self) -> Result<T, DatabaseQueryError>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        take(&mut statements, 0)
    }

    /// Execute the query and return the last statement as a deserialized value.
    ///
    /// Useful for transactions where earlier statements only prepare state (`LET`, writes).
    pub async fn fetch_last<T: DeserializeOwned>(self) -> Result<T, DatabaseQueryError>
    where
        usize: QueryResult<T>,
    {
        let mut statements = self.execute().await?;
        let index = statements.num_statements().saturating_sub(1);
        take(&mut statements, index)
    }

    /// Same as [Bindings::fetch_first] but treats an empty result as [DatabaseQueryError::NoResults].
    pub async fn fetch_one<T: DeserializeOwned>(self) -> Result<T, DatabaseQueryError>
    where
        usize: QueryResult<Option<T>>,
    {
        self.fetch_first::<Option<T>>().await?.context(NoResultsSnafu)
    }
}

/// Deserialize the statement at `index` of an already executed query.
pub fn take<T: DeserializeOwned>(
    statements: &mut surrealdb::Response,
    index: usize,
) -> Result<T, DatabaseQueryError>
where
    usize: QueryResult<T>,
{
    statements
        .take::<T>(index)
        .context(DeserializeSnafu { index })
}
