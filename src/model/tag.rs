use super::*;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Tag {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<Tag>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_count: Option<u64>,
}

define_table!("tags" : Tag);

/// The `{id, name}` pair attached to every video in a listing.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagRef {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<Tag>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TagContent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

define_relation! {
    Tag > list() > Vec<Tag>
        where "SELECT *, array::len((SELECT VALUE id FROM video_tags WHERE tag = $parent.id)) AS video_count
               FROM tags ORDER BY name ASC"
}

define_relation! {
    Tag > find(tag: &Record<Tag>) > Option<Tag>
        where "SELECT * FROM $tag"
}

define_relation! {
    Tag > by_name(name: &str) > Option<Tag>
        where "SELECT * FROM tags WHERE string::lowercase(name) = string::lowercase($name) LIMIT 1"
}

define_relation! {
    Tag > count_videos(tag: &Record<Tag>) > Option<u64>
        where "RETURN array::len((SELECT VALUE id FROM video_tags WHERE tag = $tag))"
}

define_relation! {
    Tag > existing(tags: &[Record<Tag>]) > Vec<Record<Tag>>
        where "SELECT VALUE id FROM $tags"
}

impl Tag {
    #[tracing::instrument(skip(db))]
    pub async fn create(content: &TagContent, db: &Database) -> Result<Tag, DatabaseQueryError> {
        db.sql("CREATE tags CONTENT $content")
            .bind(("content", content))
            .fetch_one()
            .await
    }

    /// Replaces the name; optional fields left out keep their stored value.
    #[tracing::instrument(skip(db))]
    pub async fn update(
        tag: &Record<Tag>,
        content: &TagContent,
        db: &Database,
    ) -> Result<Option<Tag>, DatabaseQueryError> {
        db.sql(
            "UPDATE $tag SET
                name = $name,
                description = ($description OR description),
                thumbnail_url = ($thumbnail_url OR thumbnail_url)
            WHERE id",
        )
        .bind(("tag", tag))
        .bind(("name", &content.name))
        .bind(("description", &content.description))
        .bind(("thumbnail_url", &content.thumbnail_url))
        .fetch_first()
        .await
    }

    /// Deletes the tag unless a video still carries it. The check and the delete share one transaction.
    ///
    /// Returns how many videos still reference the tag; the tag is only gone when that is zero.
    #[tracing::instrument(skip(db))]
    pub async fn delete_unused(tag: &Record<Tag>, db: &Database) -> Result<u64, DatabaseQueryError> {
        let used: Option<u64> = db
            .sql(
                "BEGIN TRANSACTION;
                LET $used = array::len((SELECT VALUE id FROM video_tags WHERE tag = $tag));
                DELETE $tag WHERE $used = 0;
                RETURN $used;
                COMMIT TRANSACTION;",
            )
            .bind(("tag", tag))
            .fetch_last()
            .await?;

        Ok(used.unwrap_or(0))
    }
}
