use async_trait::async_trait;

use crate::campaign::{CreateCampaignDraft, Platform, ReferenceImageType};
use crate::error::Error;
use crate::post::Post;

pub mod gemini;

/// Client contract for the external generative backend. Both calls are
/// network-bound and fallible; neither is retried here.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produces the ordered post plan for a campaign. An empty vec is a
    /// valid outcome (usable-but-empty campaign); errors are reserved
    /// for transport/auth failures.
    async fn generate_campaign_content(&self, request: &ContentRequest)
        -> Result<Vec<Post>, Error>;

    /// Produces one image for a prompt, or `None` when the backend
    /// returns no inline image. Transport errors propagate.
    async fn generate_post_image(
        &self,
        prompt: &str,
        reference_image: Option<&str>,
    ) -> Result<Option<String>, Error>;
}

/// Campaign parameters as handed to the generator.
#[derive(Clone, Debug)]
pub struct ContentRequest {
    pub title: String,
    pub topic: String,
    pub target_audience: String,
    pub duration_days: u32,
    pub posts_per_day: u32,
    pub platforms: Vec<Platform>,
    pub reference_image: Option<String>,
    pub reference_image_type: Option<ReferenceImageType>,
}

impl ContentRequest {
    pub fn from_draft(draft: &CreateCampaignDraft) -> ContentRequest {
        let target_audience = if draft.target_audience.trim().is_empty() {
            "a general audience".to_string()
        } else {
            draft.target_audience.clone()
        };

        ContentRequest {
            title: draft.title.clone(),
            topic: draft.topic.clone(),
            target_audience,
            duration_days: draft.duration_days,
            posts_per_day: draft.posts_per_day,
            platforms: draft.platforms.clone(),
            reference_image: draft.reference_image.clone(),
            reference_image_type: draft.reference_image_type,
        }
    }

    pub fn total_posts(&self) -> u32 {
        self.duration_days * self.posts_per_day
    }
}

/// Splits a `data:<mime>[;base64],<payload>` URL into media type and
/// payload. Returns `None` for anything else.
pub(crate) fn split_data_url(data_url: &str) -> Option<(&str, &str)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime_type = header.split(';').next()?;
    if mime_type.is_empty() {
        return None;
    }
    Some((mime_type, data))
}
