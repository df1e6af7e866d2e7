use axum::extract::FromRef;
use derive_new::new;

use crate::auth::Authenticator;
use crate::database::Database;
use crate::views::Recorder;

/// Everything a handler may extract through `State`.
#[derive(Debug, Clone, FromRef, new)]
pub struct App {
    pub database: Database,
    pub authenticator: Authenticator,
    pub recorder: Recorder,
}
