/// Binds a model to its table name so that [crate::database::Record] can infer it.
///
/// ```ignore
/// define_table!("videos": Video);
/// ```
#[macro_export]
macro_rules! define_table {
    ($table:literal : $model:ty) => {
        impl $crate::database::Table for $model {
            fn table() -> &'static str {
                $table
            }
        }
    };
}

/// Defines a method to query the database using SQL.
///
/// # Syntax
/// ```ignore
/// [Base Type] > method_name(...arguments) > [Output Type] where "sql query"
/// ```
/// Where the `Base Type` is the type that the method is being defined for and the `Output Type` is the type that the
/// first statement of the query is deserialized into. Every argument is bound under its own name, and the generated
/// method takes the [crate::database::Database] as its last argument.
///
/// # Example
///
/// ```ignore
/// define_relation! {
///     Tag > by_name(name: &str) > Option<Tag>
///         where "SELECT * FROM tags WHERE string::lowercase(name) = string::lowercase($name) LIMIT 1"
/// }
///
/// let tag = Tag::by_name("horror", &db).await?;
/// ```
#[macro_export]
macro_rules! define_relation {
    ($model:ty > $relation:ident ($($binding:ident : $binding_type:ty),*) > $export:ty where $query:literal) => {
        impl $model {
            #[tracing::instrument(skip(db))]
            pub async fn $relation(
                $($binding : $binding_type ,)*
                db: &$crate::database::Database,
            ) -> Result<$export, $crate::database::DatabaseQueryError> {
                db.sql($query)
                    $(.bind((stringify!($binding), $binding)))*
                    .fetch_first()
                    .await
            }
        }
    };
}
