use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub type PostId = TypedId<Post>;

/// One scheduled content unit belonging to a campaign.
///
/// Field names on the wire are camelCase so snapshots written by older
/// deployments parse unchanged.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    /// 1-based day number within the campaign.
    pub day: u32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    /// Generated image payload as a data URL; `None` means no image yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub status: PostStatus,
    /// Informational only; nothing in the crate schedules anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl Post {
    /// Discards the generated image while keeping the prompt that
    /// produced it, so the image can be regenerated later.
    pub fn clear_image(&mut self) {
        self.image_url = None;
    }

    /// Adds a normalized tag; duplicates (case-sensitive) and blank
    /// input are no-ops. Returns whether the list changed.
    pub fn add_hashtag(&mut self, tag: &str) -> bool {
        let normalized = match normalize_hashtag(tag) {
            Some(tag) => tag,
            None => return false,
        };
        if self.hashtags.iter().any(|existing| *existing == normalized) {
            return false;
        }
        self.hashtags.push(normalized);
        true
    }

    /// Removes an exact-match tag. Returns whether the list changed.
    pub fn remove_hashtag(&mut self, tag: &str) -> bool {
        let before = self.hashtags.len();
        self.hashtags.retain(|existing| existing != tag);
        self.hashtags.len() != before
    }
}

impl TypedIdMarker for Post {
    fn tag() -> &'static str {
        "PST"
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Published,
    /// Reserved for a real publishing integration; no code path in this
    /// crate produces it.
    Failed,
}

/// Trims the tag and guarantees a leading `#`. Blank input yields `None`.
pub fn normalize_hashtag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        return None;
    }
    if tag.starts_with('#') {
        Some(tag.to_string())
    } else {
        Some(format!("#{}", tag))
    }
}

/// Normalizes every tag and drops duplicates, preserving first-seen order.
pub fn normalized_hashtags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        if let Some(tag) = normalize_hashtag(&tag) {
            if !normalized.iter().any(|existing| *existing == tag) {
                normalized.push(tag);
            }
        }
    }
    normalized
}
