use super::*;

/// A stored video row. Listings return the enriched [crate::catalog::VideoItem] instead.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Video {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<Video>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(serialize_as = "Option<Key>")]
    #[serde(default)]
    pub studio: Option<Record<Studio>>,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: Timestamp,
    pub views: u64,
}

define_table!("videos" : Video);

/// Row of the many-to-many join between videos and tags.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoTag {
    pub video: Record<Video>,
    pub tag: Record<Tag>,
}

define_table!("video_tags" : VideoTag);

/// The writable columns of a video, already validated.
#[derive(Debug, Clone, PartialEq, Serialize, new)]
pub struct VideoContent {
    pub title: String,
    pub description: Option<String>,
    pub studio: Option<Record<Studio>>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

define_relation! {
    Video > find(video: &Record<Video>) > Option<Video>
        where "SELECT * FROM $video"
}

impl Video {
    /// Writes the video and its tag associations in one transaction.
    #[tracing::instrument(skip(content, db), fields(title = %content.title))]
    pub async fn create(
        content: &VideoContent,
        tags: &[Record<Tag>],
        db: &Database,
    ) -> Result<Record<Video>, DatabaseQueryError> {
        let video = Record::<Video>::uuid();

        let mut sql = String::from("BEGIN TRANSACTION;\n");
        sql.push_str(&require_references(content, tags.len()));
        sql.push_str("CREATE $video CONTENT $content;\n");
        sql.push_str(&attach_tags(tags.len()));
        sql.push_str("COMMIT TRANSACTION;");

        let query = db
            .sql(sql)
            .bind(("video", &video))
            .bind(("content", content));
        let query = bind_references(query, content, tags);

        query.execute().await?;
        Ok(video)
    }

    /// Replaces the writable columns. Tag associations are only replaced when `tags` is given.
    #[tracing::instrument(skip(content, db), fields(title = %content.title))]
    pub async fn update(
        video: &Record<Video>,
        content: &VideoContent,
        tags: Option<&[Record<Tag>]>,
        db: &Database,
    ) -> Result<(), DatabaseQueryError> {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        sql.push_str(&require_references(content, tags.map_or(0, <[_]>::len)));
        sql.push_str(
            "UPDATE $video SET
                title = $content.title,
                description = $content.description,
                studio = $content.studio,
                video_url = $content.video_url,
                thumbnail_url = $content.thumbnail_url
            WHERE id;\n",
        );
        if let Some(tags) = tags {
            sql.push_str("DELETE video_tags WHERE video = $video;\n");
            sql.push_str(&attach_tags(tags.len()));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let query = db
            .sql(sql)
            .bind(("video", video))
            .bind(("content", content));
        let query = bind_references(query, content, tags.unwrap_or_default());

        query.execute().await?;
        Ok(())
    }

    /// Deletes the video with everything that references it.
    #[tracing::instrument(skip(db))]
    pub async fn delete(video: &Record<Video>, db: &Database) -> Result<(), DatabaseQueryError> {
        db.sql(
            "BEGIN TRANSACTION;
            DELETE video_tags WHERE video = $video;
            DELETE likes WHERE video = $video;
            DELETE view_history WHERE video = $video;
            DELETE anonymous_views WHERE video = $video;
            DELETE $video;
            COMMIT TRANSACTION;",
        )
        .bind(("video", video))
        .execute()
        .await?;

        Ok(())
    }
}

/// Aborts the transaction when the studio or one of the tags is gone by the time the write runs.
fn require_references(content: &VideoContent, tags: usize) -> String {
    let mut sql = String::new();
    if content.studio.is_some() {
        sql.push_str("IF array::len((SELECT VALUE id FROM $studio)) = 0 { THROW \"studio does not exist\" };\n");
    }
    if tags > 0 {
        sql.push_str("IF array::len((SELECT VALUE id FROM $tags)) != $tag_count { THROW \"tag does not exist\" };\n");
    }
    sql
}

fn bind_references<'a>(mut query: Bindings<'a>, content: &VideoContent, tags: &[Record<Tag>]) -> Bindings<'a> {
    if let Some(studio) = &content.studio {
        query = query.bind(("studio", studio));
    }
    if !tags.is_empty() {
        query = query.bind(("tags", tags)).bind(("tag_count", tags.len()));
    }
    for (index, tag) in tags.iter().enumerate() {
        query = query.bind((format!("tag_{index}"), tag));
    }
    query
}

/// One `CREATE video_tags` statement per tag, bound as `$tag_0`, `$tag_1`, ...
fn attach_tags(count: usize) -> String {
    (0..count)
        .map(|index| format!("CREATE video_tags SET video = $video, tag = $tag_{index};\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn content(title: &str) -> VideoContent {
        VideoContent::new(title.into(), None, None, "https://cdn.example/v.mp4".into(), None)
    }

    async fn tags_of(video: &Record<Video>, db: &Database) -> Vec<Record<Tag>> {
        let mut tags: Vec<Record<Tag>> = db
            .sql("SELECT VALUE tag FROM video_tags WHERE video = $video")
            .bind(("video", video))
            .fetch_first()
            .await
            .unwrap();
        tags.sort_by_key(|tag| tag.key());
        tags
    }

    #[tokio::test]
    async fn create_writes_video_and_tags() {
        let db = Database::memory().await.unwrap();
        let a = fixtures::tag("a", &db).await;
        let b = fixtures::tag("b", &db).await;

        let id = Video::create(&content("Clip"), &[a.id.clone(), b.id.clone()], &db)
            .await
            .unwrap();

        let video = Video::find(&id, &db).await.unwrap().unwrap();
        assert_eq!(video.title, "Clip");
        assert_eq!(video.views, 0);

        let mut expected = vec![a.id, b.id];
        expected.sort_by_key(|tag| tag.key());
        assert_eq!(tags_of(&id, &db).await, expected);
    }

    #[tokio::test]
    async fn failed_tag_write_leaves_no_video() {
        let db = Database::memory().await.unwrap();
        let a = fixtures::tag("a", &db).await;

        // the duplicate pair violates the unique index on the second insert
        let result = Video::create(&content("Clip"), &[a.id.clone(), a.id.clone()], &db).await;
        assert!(result.is_err());

        let titles: Vec<String> = db.sql("SELECT VALUE title FROM videos").fetch_first().await.unwrap();
        assert!(titles.is_empty());
        let pairs: Vec<VideoTag> = db.sql("SELECT * FROM video_tags").fetch_first().await.unwrap();
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn writes_fail_when_a_reference_is_gone() {
        let db = Database::memory().await.unwrap();
        let kept = fixtures::tag("kept", &db).await;
        let gone = fixtures::tag("gone", &db).await;
        let studio = fixtures::studio("Gone", &db).await;
        assert_eq!(Tag::delete_unused(&gone.id, &db).await.unwrap(), 0);
        assert_eq!(Studio::delete_unused(&studio.id, &db).await.unwrap(), 0);

        let tagged = Video::create(&content("Clip"), &[kept.id.clone(), gone.id.clone()], &db).await;
        assert!(tagged.is_err());

        let mut in_studio = content("Clip");
        in_studio.studio = Some(studio.id.clone());
        assert!(Video::create(&in_studio, &[], &db).await.is_err());

        let titles: Vec<String> = db.sql("SELECT VALUE title FROM videos").fetch_first().await.unwrap();
        assert!(titles.is_empty());

        let id = Video::create(&content("Clip"), &[kept.id.clone()], &db).await.unwrap();
        let retagged = Video::update(&id, &content("Clip"), Some(&[gone.id.clone()]), &db).await;
        assert!(retagged.is_err());
        assert_eq!(tags_of(&id, &db).await, vec![kept.id]);
    }

    #[tokio::test]
    async fn update_replaces_tags_only_when_given() {
        let db = Database::memory().await.unwrap();
        let a = fixtures::tag("a", &db).await;
        let b = fixtures::tag("b", &db).await;
        let id = Video::create(&content("Clip"), &[a.id.clone()], &db).await.unwrap();

        Video::update(&id, &content("Renamed"), None, &db).await.unwrap();
        assert_eq!(tags_of(&id, &db).await, vec![a.id.clone()]);
        assert_eq!(Video::find(&id, &db).await.unwrap().unwrap().title, "Renamed");

        Video::update(&id, &content("Renamed"), Some(&[b.id.clone()]), &db).await.unwrap();
        assert_eq!(tags_of(&id, &db).await, vec![b.id]);
    }

    #[tokio::test]
    async fn update_never_creates_missing_videos() {
        let db = Database::memory().await.unwrap();
        let missing = Record::<Video>::new("missing".to_string());

        Video::update(&missing, &content("Ghost"), Some(&[]), &db).await.unwrap();
        assert_eq!(Video::find(&missing, &db).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_cascades() {
        let db = Database::memory().await.unwrap();
        let tag = fixtures::tag("a", &db).await;
        let user = fixtures::user("fan@vrhub.test", &db).await;
        let video = fixtures::video("Clip", &db).await;
        fixtures::attach(&video.id, &tag.id, &db).await;
        Like::toggle(&user.id, &video.id, fixtures::at(0), &db).await.unwrap();

        Video::delete(&video.id, &db).await.unwrap();

        assert_eq!(Video::find(&video.id, &db).await.unwrap(), None);
        assert_eq!(Tag::count_videos(&tag.id, &db).await.unwrap(), Some(0));
        let likes: Vec<Like> = db.sql("SELECT * FROM likes").fetch_first().await.unwrap();
        assert!(likes.is_empty());
    }
}
