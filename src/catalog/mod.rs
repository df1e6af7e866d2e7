use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::database::{Key, Record};
use crate::model::{Studio, TagRef, Video};
use crate::time::Timestamp;

pub use listing::*;
pub use params::*;

/// Filtered, sorted and paginated video listings.
mod listing;

/// Normalization of listing query strings.
mod params;

/// A video as returned by every listing, enriched with its studio name, like count and tags.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoItem {
    #[serde_as(serialize_as = "Key")]
    pub id: Record<Video>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(serialize_as = "Option<Key>")]
    #[serde(default, rename(serialize = "studio_id"))]
    pub studio: Option<Record<Studio>>,
    #[serde(default)]
    pub studio_name: Option<String>,
    pub video_url: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    pub created_at: Timestamp,
    pub views: u64,
    pub likes_count: u64,
    /// Only present when the request carries a viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    /// Only present in the liked videos listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total_videos: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(paging: Paging, total_videos: u64) -> Self {
        Pagination {
            page: paging.page,
            limit: paging.limit,
            total_videos,
            total_pages: paging.total_pages(total_videos),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Page {
    pub videos: Vec<VideoItem>,
    pub pagination: Pagination,
}
