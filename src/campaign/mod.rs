use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::post::{Post, PostId};
use crate::typedid::{TypedId, TypedIdMarker};
use crate::user::UserId;

pub mod db;
pub mod manager;

pub type CampaignId = TypedId<Campaign>;

/// A themed content plan spanning several days across chosen platforms.
///
/// `posts` insertion order is significant (day/sequence order) and is
/// preserved by every lifecycle operation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    #[serde(alias = "userId")]
    pub owner_id: UserId,
    pub title: String,
    pub topic: String,
    pub target_audience: String,
    pub posts_per_day: u32,
    pub duration_days: u32,
    /// Stored as-is; no operation in this crate transitions it.
    pub state: CampaignState,
    pub platforms: Vec<Platform>,
    pub created_at: DateTime<Utc>,
    pub posts: Vec<Post>,
    /// User-supplied generation context, as a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image_type: Option<ReferenceImageType>,
}

impl Campaign {
    /// Expected (not enforced) post count.
    pub fn total_posts(&self) -> u32 {
        self.posts_per_day * self.duration_days
    }

    pub fn post_by_id(&self, post_id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == post_id)
    }

    pub(crate) fn post_mut(&mut self, post_id: PostId) -> Option<&mut Post> {
        self.posts.iter_mut().find(|post| post.id == post_id)
    }
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CPN"
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignState {
    Created,
    Active,
    Completed,
    Paused,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    #[serde(alias = "x")]
    Twitter,
    Linkedin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::Linkedin),
            _ => Err(UnknownPlatform(s.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform: {}", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

/// How the generator is instructed to use the reference image.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceImageType {
    Logo,
    Character,
    Business,
    Expressive,
    Other,
}

/// Input for [`manager::CampaignManager::create_campaign`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignDraft {
    pub title: String,
    pub topic: String,
    #[serde(default)]
    pub target_audience: String,
    pub posts_per_day: u32,
    pub duration_days: u32,
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub reference_image: Option<String>,
    #[serde(default)]
    pub reference_image_type: Option<ReferenceImageType>,
}

impl CreateCampaignDraft {
    /// Collects every missing or invalid required field so the caller
    /// can surface them all at once.
    pub fn validate(&self) -> Result<(), Error> {
        let mut fields = Vec::new();
        if self.title.trim().is_empty() {
            fields.push("title");
        }
        if self.topic.trim().is_empty() {
            fields.push("topic");
        }
        if self.platforms.is_empty() {
            fields.push("platforms");
        }
        if self.duration_days == 0 {
            fields.push("durationDays");
        }
        if self.posts_per_day == 0 {
            fields.push("postsPerDay");
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingRequiredFields { fields })
        }
    }
}
