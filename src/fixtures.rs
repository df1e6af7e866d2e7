//! Store fixtures shared by the tests.

use axum::http::{header, HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::{Duration, TimeZone as _, Utc};
use secrecy::SecretString;

use crate::api::App;
use crate::auth::Authenticator;
use crate::database::{Database, Record};
use crate::model::{NewUser, Studio, StudioContent, Tag, TagContent, User, Video};
use crate::time::{datetime, Timestamp};
use crate::views::{Observer, Recorder};

const DAY: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// A fixed point in time, `hours` after the start of 2024.
pub fn at(hours: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

pub async fn user(email: &str, db: &Database) -> User {
    User::create(&NewUser::new(email, "hunter22", None, false), db)
        .await
        .unwrap()
}

pub async fn admin(email: &str, db: &Database) -> User {
    User::create(&NewUser::new(email, "hunter22", None, true), db)
        .await
        .unwrap()
}

pub async fn studio(name: &str, db: &Database) -> Studio {
    let content = StudioContent {
        name: name.to_string(),
        ..Default::default()
    };
    Studio::create(&content, db).await.unwrap()
}

pub async fn tag(name: &str, db: &Database) -> Tag {
    let content = TagContent {
        name: name.to_string(),
        ..Default::default()
    };
    Tag::create(&content, db).await.unwrap()
}

/// Creates a video with full control over the columns the listing sorts on.
pub async fn video_with(
    title: &str,
    description: Option<&str>,
    studio: Option<&Record<Studio>>,
    created_at: Timestamp,
    db: &Database,
) -> Video {
    let videos: Vec<Video> = db
        .sql(
            "CREATE videos SET
                title = $title,
                description = $description,
                studio = $studio,
                video_url = 'https://cdn.example/video.mp4',
                created_at = $created_at",
        )
        .bind(("title", title))
        .bind(("description", description))
        .bind(("studio", studio))
        .bind(("created_at", datetime(created_at)))
        .fetch_first()
        .await
        .unwrap();

    videos.into_iter().next().unwrap()
}

pub async fn video(title: &str, db: &Database) -> Video {
    video_with(title, None, None, at(0), db).await
}

pub async fn video_in(title: &str, studio: Option<&Record<Studio>>, db: &Database) -> Video {
    video_with(title, None, studio, at(0), db).await
}

pub async fn attach(video: &Record<Video>, tag: &Record<Tag>, db: &Database) {
    db.sql("CREATE video_tags SET video = $video, tag = $tag")
        .bind(("video", video))
        .bind(("tag", tag))
        .execute()
        .await
        .unwrap();
}

pub async fn like(user: &Record<User>, video: &Record<Video>, db: &Database) {
    let toggled = crate::model::Like::toggle(user, video, at(0), db).await.unwrap();
    assert!(toggled.is_some());
}

/// Records one counted view of `video` by `user`.
pub async fn watched(user: &Record<User>, video: &Record<Video>, db: &Database) {
    Recorder::new(DAY)
        .record(video, &Observer::User(user.clone()), at(0), db)
        .await
        .unwrap();
}

/// Application state over a fresh in-memory store.
pub async fn app() -> App {
    let database = Database::memory().await.unwrap();
    let authenticator = Authenticator::new(SecretString::new("test-secret".to_string()));
    App::new(database, authenticator, Recorder::new(DAY))
}

pub fn server(app: &App) -> TestServer {
    TestServer::new(crate::api::router(app.clone(), None)).unwrap()
}

/// The `Authorization` header of a request made by `user`.
pub fn bearer(app: &App, user: &User) -> (HeaderName, HeaderValue) {
    let claims = app.authenticator.claims(user, Utc::now());
    let token = app.authenticator.encode(&claims).unwrap();
    (header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap())
}
