use super::*;

/// Per-user watch ledger row, keyed by the `(user, video)` pair.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewHistory {
    pub id: Record<ViewHistory>,
    pub user: Record<User>,
    pub video: Record<Video>,
    pub viewed_at: Timestamp,
    pub view_count: u64,
}

define_table!("view_history" : ViewHistory);

/// Anonymous ledger row, keyed by the `(ip, video)` pair. It only gates the view counter and is never exposed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnonymousView {
    pub id: Record<AnonymousView>,
    pub ip: String,
    pub video: Record<Video>,
    pub viewed_at: Timestamp,
}

define_table!("anonymous_views" : AnonymousView);

impl ViewHistory {
    pub fn record(user: &Record<User>, video: &Record<Video>) -> Record<ViewHistory> {
        Record::new(composite_key(&[&user.key(), &video.key()]))
    }
}

impl AnonymousView {
    pub fn record(ip: &str, video: &Record<Video>) -> Record<AnonymousView> {
        Record::new(composite_key(&[ip, &video.key()]))
    }
}

/// One line of a user's watch history, most recent first.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatchEntry {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<ViewHistory>,
    #[serde_as(serialize_as = "Key")]
    #[serde(rename(serialize = "video_id"))]
    pub video: Record<Video>,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde_as(serialize_as = "Option<Key>")]
    #[serde(default, rename(serialize = "studio_id"))]
    pub studio: Option<Record<Studio>>,
    #[serde(default)]
    pub studio_name: Option<String>,
    pub viewed_at: Timestamp,
    pub view_count: u64,
}

define_relation! {
    WatchEntry > of_user(user: &Record<User>) > Vec<WatchEntry>
        where "SELECT
                   id,
                   video,
                   video.title AS title,
                   video.thumbnail_url AS thumbnail_url,
                   video.studio AS studio,
                   video.studio.name AS studio_name,
                   viewed_at,
                   view_count
               FROM view_history WHERE user = $user ORDER BY viewed_at DESC"
}

define_relation! {
    ViewHistory > clear(user: &Record<User>) > Vec<ViewHistory>
        where "DELETE view_history WHERE user = $user RETURN BEFORE"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn clearing_only_touches_the_ledger() {
        let db = Database::memory().await.unwrap();
        let user = fixtures::user("fan@vrhub.test", &db).await;
        let other = fixtures::user("other@vrhub.test", &db).await;
        let video = fixtures::video("Clip", &db).await;
        fixtures::watched(&user.id, &video.id, &db).await;
        fixtures::watched(&other.id, &video.id, &db).await;

        let history = WatchEntry::of_user(&user.id, &db).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].title, "Clip");

        let cleared = ViewHistory::clear(&user.id, &db).await.unwrap();
        assert_eq!(cleared.len(), 1);

        assert!(WatchEntry::of_user(&user.id, &db).await.unwrap().is_empty());
        assert_eq!(WatchEntry::of_user(&other.id, &db).await.unwrap().len(), 1);
        assert_eq!(Video::find(&video.id, &db).await.unwrap().unwrap().views, 2);
    }
}
