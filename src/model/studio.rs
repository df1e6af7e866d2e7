use super::*;

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Studio {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<Studio>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub created_at: Timestamp,
    /// Only present in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_count: Option<u64>,
}

define_table!("studios" : Studio);

/// Fields accepted when creating or updating a studio.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StudioContent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
}

define_relation! {
    Studio > list() > Vec<Studio>
        where "SELECT *, array::len((SELECT VALUE id FROM videos WHERE studio = $parent.id)) AS video_count
               FROM studios ORDER BY name ASC"
}

define_relation! {
    Studio > find(studio: &Record<Studio>) > Option<Studio>
        where "SELECT * FROM $studio"
}

define_relation! {
    Studio > by_name(name: &str) > Option<Studio>
        where "SELECT * FROM studios WHERE string::lowercase(name) = string::lowercase($name) LIMIT 1"
}

define_relation! {
    Studio > count_videos(studio: &Record<Studio>) > Option<u64>
        where "RETURN array::len((SELECT VALUE id FROM videos WHERE studio = $studio))"
}

impl Studio {
    #[tracing::instrument(skip(db))]
    pub async fn create(content: &StudioContent, db: &Database) -> Result<Studio, DatabaseQueryError> {
        db.sql("CREATE studios CONTENT $content")
            .bind(("content", content))
            .fetch_one()
            .await
    }

    /// Replaces the name; optional fields left out keep their stored value.
    #[tracing::instrument(skip(db))]
    pub async fn update(
        studio: &Record<Studio>,
        content: &StudioContent,
        db: &Database,
    ) -> Result<Option<Studio>, DatabaseQueryError> {
        db.sql(
            "UPDATE $studio SET
                name = $name,
                description = ($description OR description),
                website = ($website OR website),
                logo_url = ($logo_url OR logo_url)
            WHERE id",
        )
        .bind(("studio", studio))
        .bind(("name", &content.name))
        .bind(("description", &content.description))
        .bind(("website", &content.website))
        .bind(("logo_url", &content.logo_url))
        .fetch_first()
        .await
    }

    /// Deletes the studio unless it still owns videos, in one transaction. Returns the number of owned videos.
    #[tracing::instrument(skip(db))]
    pub async fn delete_unused(studio: &Record<Studio>, db: &Database) -> Result<u64, DatabaseQueryError> {
        let used: Option<u64> = db
            .sql(
                "BEGIN TRANSACTION;
                LET $used = array::len((SELECT VALUE id FROM videos WHERE studio = $studio));
                DELETE $studio WHERE $used = 0;
                RETURN $used;
                COMMIT TRANSACTION;",
            )
            .bind(("studio", studio))
            .fetch_last()
            .await?;

        Ok(used.unwrap_or(0))
    }
}
