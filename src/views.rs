//! Deduplicated view counting.
//!
//! A video's `views` counter moves by one per observer per window. An observer is either a signed in user, whose
//! observations are kept in the watch history ledger, or the source address of an anonymous caller, kept in a ledger
//! that nobody can read. The window slides: every observation refreshes the last seen time, and only an observation
//! at least one window after the previous one counts again.

use std::net::IpAddr;
use std::time::Duration;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::database::{Database, DatabaseQueryError, Record};
use crate::model::{AnonymousView, User, Video, ViewHistory};
use crate::time::{cutoff, datetime, Timestamp};

/// Who is looking at a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observer {
    User(Record<User>),
    Address(IpAddr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewOutcome {
    /// The counter after this observation.
    pub views: u64,
    /// Whether this observation moved the counter.
    pub counted: bool,
}

const USER_VIEW: &str = "BEGIN TRANSACTION;
LET $target = (SELECT VALUE id FROM $video);
LET $recent = (SELECT VALUE id FROM $entry WHERE viewed_at > $cutoff);
LET $counted = ((array::len($target) > 0) AND (array::len($recent) = 0));
UPDATE $entry SET user = $user, video = $video, viewed_at = $now, view_count = (view_count OR 0)
    WHERE (array::len($target) > 0);
UPDATE $entry SET view_count += 1 WHERE $counted;
UPDATE $video SET views += 1 WHERE $counted;
SELECT views, $counted AS counted FROM $video;
COMMIT TRANSACTION;";

const ANONYMOUS_VIEW: &str = "BEGIN TRANSACTION;
LET $target = (SELECT VALUE id FROM $video);
LET $recent = (SELECT VALUE id FROM $entry WHERE viewed_at > $cutoff);
LET $counted = ((array::len($target) > 0) AND (array::len($recent) = 0));
UPDATE $entry SET ip = $ip, video = $video, viewed_at = $now WHERE (array::len($target) > 0);
UPDATE $video SET views += 1 WHERE $counted;
SELECT views, $counted AS counted FROM $video;
COMMIT TRANSACTION;";

#[derive(Debug, Clone, Copy, new)]
pub struct Recorder {
    window: Duration,
}

impl Recorder {
    /// Records one observation of `video` at `now`.
    ///
    /// The check and both writes run in a single transaction, so concurrent observations by the same observer
    /// count once and a failure leaves the counter and the ledger untouched. Returns [None] for unknown videos.
    #[tracing::instrument(skip(self, db))]
    pub async fn record(
        &self,
        video: &Record<Video>,
        observer: &Observer,
        now: Timestamp,
        db: &Database,
    ) -> Result<Option<ViewOutcome>, DatabaseQueryError> {
        let cutoff = datetime(cutoff(now, self.window));

        let query = match observer {
            Observer::User(user) => db
                .sql(USER_VIEW)
                .bind(("entry", ViewHistory::record(user, video)))
                .bind(("user", user)),
            Observer::Address(ip) => {
                let ip = ip.to_string();
                db.sql(ANONYMOUS_VIEW)
                    .bind(("entry", AnonymousView::record(&ip, video)))
                    .bind(("ip", ip))
            }
        };

        let outcome: Option<ViewOutcome> = query
            .bind(("video", video))
            .bind(("now", datetime(now)))
            .bind(("cutoff", cutoff))
            .fetch_last()
            .await?;

        if let Some(outcome) = outcome {
            tracing::debug!(views = outcome.views, counted = outcome.counted, "recorded view");
        }

        Ok(outcome)
    }
}
