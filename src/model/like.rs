use super::*;

/// A user's like on a video, keyed by the `(user, video)` pair so a user likes a video at most once.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Like {
    pub id: Record<Like>,
    pub user: Record<User>,
    pub video: Record<Video>,
    pub created_at: Timestamp,
}

define_table!("likes" : Like);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggled {
    pub action: LikeAction,
    pub likes_count: u64,
}

#[derive(Debug, Deserialize)]
struct ToggleRow {
    liked: bool,
    likes_count: u64,
}

impl Like {
    pub fn record(user: &Record<User>, video: &Record<Video>) -> Record<Like> {
        Record::new(composite_key(&[&user.key(), &video.key()]))
    }

    /// Flips the like of `user` on `video` in one transaction and returns the fresh like count.
    ///
    /// Returns [None] when the video does not exist; nothing is written in that case.
    #[tracing::instrument(skip(db))]
    pub async fn toggle(
        user: &Record<User>,
        video: &Record<Video>,
        now: Timestamp,
        db: &Database,
    ) -> Result<Option<Toggled>, DatabaseQueryError> {
        let row: Option<ToggleRow> = db
            .sql(
                "BEGIN TRANSACTION;
                LET $target = (SELECT VALUE id FROM $video);
                LET $existing = (SELECT VALUE id FROM $like);
                DELETE $like;
                UPDATE $like SET user = $user, video = $video, created_at = $now
                    WHERE ((array::len($target) > 0) AND (array::len($existing) = 0));
                SELECT
                    (array::len($existing) = 0) AS liked,
                    array::len((SELECT VALUE id FROM likes WHERE video = $parent.id)) AS likes_count
                FROM $video;
                COMMIT TRANSACTION;",
            )
            .bind(("like", Like::record(user, video)))
            .bind(("user", user))
            .bind(("video", video))
            .bind(("now", datetime(now)))
            .fetch_last()
            .await?;

        Ok(row.map(|row| Toggled {
            action: if row.liked { LikeAction::Liked } else { LikeAction::Unliked },
            likes_count: row.likes_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn toggling_twice_restores_the_original_state() {
        let db = Database::memory().await.unwrap();
        let user = fixtures::user("fan@vrhub.test", &db).await;
        let other = fixtures::user("other@vrhub.test", &db).await;
        let video = fixtures::video("Clip", &db).await;
        Like::toggle(&other.id, &video.id, fixtures::at(0), &db).await.unwrap();

        let liked = Like::toggle(&user.id, &video.id, fixtures::at(1), &db).await.unwrap();
        assert_eq!(
            liked,
            Some(Toggled {
                action: LikeAction::Liked,
                likes_count: 2
            })
        );

        let unliked = Like::toggle(&user.id, &video.id, fixtures::at(2), &db).await.unwrap();
        assert_eq!(
            unliked,
            Some(Toggled {
                action: LikeAction::Unliked,
                likes_count: 1
            })
        );

        let likes: Vec<Like> = db.sql("SELECT * FROM likes").fetch_first().await.unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].user, other.id);
    }

    #[tokio::test]
    async fn unknown_video_writes_nothing() {
        let db = Database::memory().await.unwrap();
        let user = fixtures::user("fan@vrhub.test", &db).await;
        let missing = Record::<Video>::new("missing".to_string());

        let result = Like::toggle(&user.id, &missing, fixtures::at(0), &db).await.unwrap();
        assert_eq!(result, None);

        let likes: Vec<Like> = db.sql("SELECT * FROM likes").fetch_first().await.unwrap();
        assert!(likes.is_empty());
    }
}
