use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::database::{Bindings, Database, DatabaseQueryError, Key, Record};
use crate::time::{datetime, Timestamp};
use crate::{define_relation, define_table};

pub use history::*;
pub use like::*;
pub use setting::*;
pub use studio::*;
pub use tag::*;
pub use user::*;
pub use video::*;

mod history;
mod like;
mod setting;
mod studio;
mod tag;
mod user;
mod video;

/// Joins record keys into a deterministic composite key, e.g. `likes:⟨user/video⟩`.
fn composite_key(parts: &[&str]) -> String {
    parts.join("/")
}

/// Trims a client supplied string, treating blank values as absent.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
