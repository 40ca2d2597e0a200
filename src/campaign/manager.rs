use std::sync::Arc;

use chrono::Utc;
use tracing::{error, warn};

use crate::campaign::db::{CampaignStore, SnapshotWriter};
use crate::error::Error;
use crate::generation::{ContentGenerator, ContentRequest};
use crate::post::{self, Post, PostId, PostStatus};
use crate::user::UserId;

use super::{Campaign, CampaignId, CampaignState, CreateCampaignDraft};

/// Owns the in-memory campaign collection, the single source of truth
/// for the session. Every effective mutation mirrors the collection to
/// the store through a queued best-effort save.
pub struct CampaignManager {
    campaigns: Vec<Campaign>,
    generator: Arc<dyn ContentGenerator>,
    writer: SnapshotWriter,
}

impl CampaignManager {
    /// Loads the stored snapshot (including the one-time legacy
    /// migration the store performs) and starts the snapshot writer.
    /// Storage failures are logged; the session starts empty.
    pub async fn load(
        store: Arc<dyn CampaignStore>,
        generator: Arc<dyn ContentGenerator>,
    ) -> CampaignManager {
        let campaigns = match store.load_campaigns().await {
            Ok(Some(campaigns)) => campaigns,
            Ok(None) => Vec::new(),
            Err(error) => {
                error!(%error, "failed to load campaign snapshot, starting empty");
                Vec::new()
            }
        };

        CampaignManager {
            campaigns,
            generator,
            writer: SnapshotWriter::spawn(store),
        }
    }

    /// Most-recent-first.
    pub fn campaigns(&self) -> &[Campaign] {
        &self.campaigns
    }

    pub fn campaign_by_id(&self, campaign_id: CampaignId) -> Option<&Campaign> {
        self.campaigns
            .iter()
            .find(|campaign| campaign.id == campaign_id)
    }

    /// Validates the draft, generates the post plan, and prepends the
    /// new campaign. A failed generation leaves the collection
    /// untouched and persists nothing.
    #[tracing::instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create_campaign(
        &mut self,
        owner_id: UserId,
        draft: CreateCampaignDraft,
    ) -> Result<&Campaign, Error> {
        draft.validate()?;

        let request = ContentRequest::from_draft(&draft);
        let posts = self.generator.generate_campaign_content(&request).await?;

        let campaign = Campaign {
            id: CampaignId::new(),
            owner_id,
            title: draft.title,
            topic: draft.topic,
            target_audience: draft.target_audience,
            posts_per_day: draft.posts_per_day,
            duration_days: draft.duration_days,
            state: CampaignState::Created,
            platforms: draft.platforms,
            created_at: Utc::now(),
            posts,
            reference_image: draft.reference_image,
            reference_image_type: draft.reference_image_type,
        };

        self.campaigns.insert(0, campaign);
        self.persist();

        Ok(&self.campaigns[0])
    }

    /// Returns whether a campaign was removed, so a caller holding a
    /// selection can clear it. Unknown ids are a no-op.
    #[tracing::instrument(skip(self))]
    pub fn delete_campaign(&mut self, campaign_id: CampaignId) -> bool {
        let before = self.campaigns.len();
        self.campaigns.retain(|campaign| campaign.id != campaign_id);

        let removed = self.campaigns.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Replaces the post with the matching id in place, preserving the
    /// sequence order. Silent no-op when the campaign or post is
    /// unknown; sourcing valid ids is the caller's job.
    pub fn update_post(&mut self, campaign_id: CampaignId, mut post: Post) {
        let slot = match self
            .campaign_mut(campaign_id)
            .and_then(|campaign| campaign.post_mut(post.id))
        {
            Some(slot) => slot,
            None => return,
        };

        post.hashtags = post::normalized_hashtags(std::mem::take(&mut post.hashtags));
        *slot = post;
        self.persist();
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_post(&mut self, campaign_id: CampaignId, post_id: PostId) {
        let campaign = match self.campaign_mut(campaign_id) {
            Some(campaign) => campaign,
            None => return,
        };

        let before = campaign.posts.len();
        campaign.posts.retain(|post| post.id != post_id);

        if campaign.posts.len() != before {
            self.persist();
        }
    }

    /// Generates images for every post that lacks one, one request in
    /// flight at a time. Each success is applied and persisted before
    /// the next request starts, so partial progress survives a crash;
    /// per-post failures are logged and the batch continues. Returns
    /// the number of images generated.
    #[tracing::instrument(skip(self))]
    pub async fn backfill_images(&mut self, campaign_id: CampaignId) -> Result<usize, Error> {
        let campaign_index = self
            .campaigns
            .iter()
            .position(|campaign| campaign.id == campaign_id)
            .ok_or(Error::CampaignDoesNotExist { campaign_id })?;

        let reference_image = self.campaigns[campaign_index].reference_image.clone();
        let pending: Vec<PostId> = self.campaigns[campaign_index]
            .posts
            .iter()
            .filter(|post| post.image_url.is_none())
            .map(|post| post.id)
            .collect();

        let generator = Arc::clone(&self.generator);
        let mut generated = 0;

        for post_id in pending {
            let prompt = match self.campaigns[campaign_index].post_by_id(post_id) {
                Some(post) => post
                    .image_prompt
                    .clone()
                    .unwrap_or_else(|| fallback_image_prompt(post)),
                None => continue,
            };

            match generator
                .generate_post_image(&prompt, reference_image.as_deref())
                .await
            {
                Ok(Some(image_url)) => {
                    if let Some(post) = self.campaigns[campaign_index].post_mut(post_id) {
                        post.image_url = Some(image_url);
                        // Keep the prompt actually used, so a regenerate
                        // starts from it.
                        post.image_prompt = Some(prompt);
                        generated += 1;
                    }
                    self.persist();
                }
                Ok(None) => {
                    warn!(%post_id, "generation backend returned no image");
                }
                Err(error) => {
                    warn!(%post_id, %error, "image generation failed, continuing with the next post");
                }
            }
        }

        Ok(generated)
    }

    /// Adds a normalized tag to a post; duplicate or blank tags and
    /// unknown ids are no-ops.
    pub fn add_hashtag(&mut self, campaign_id: CampaignId, post_id: PostId, tag: &str) {
        let changed = match self
            .campaign_mut(campaign_id)
            .and_then(|campaign| campaign.post_mut(post_id))
        {
            Some(post) => post.add_hashtag(tag),
            None => false,
        };

        if changed {
            self.persist();
        }
    }

    /// Removes an exact-match tag; no-op when absent.
    pub fn remove_hashtag(&mut self, campaign_id: CampaignId, post_id: PostId, tag: &str) {
        let changed = match self
            .campaign_mut(campaign_id)
            .and_then(|campaign| campaign.post_mut(post_id))
        {
            Some(post) => post.remove_hashtag(tag),
            None => false,
        };

        if changed {
            self.persist();
        }
    }

    /// A successful dispatch publishes the post. An unsuccessful one
    /// changes nothing: no transition to a failed state exists here.
    #[tracing::instrument(skip(self))]
    pub fn apply_share_result(&mut self, campaign_id: CampaignId, post_id: PostId, success: bool) {
        if !success {
            return;
        }

        let changed = match self
            .campaign_mut(campaign_id)
            .and_then(|campaign| campaign.post_mut(post_id))
        {
            Some(post) => {
                post.status = PostStatus::Published;
                true
            }
            None => false,
        };

        if changed {
            self.persist();
        }
    }

    /// Resolves once every save enqueued so far has been written. For
    /// graceful teardown; normal operation never waits on persistence.
    pub async fn flush(&self) {
        self.writer.flush().await
    }

    fn campaign_mut(&mut self, campaign_id: CampaignId) -> Option<&mut Campaign> {
        self.campaigns
            .iter_mut()
            .find(|campaign| campaign.id == campaign_id)
    }

    fn persist(&self) {
        self.writer.enqueue(self.campaigns.clone());
    }
}

fn fallback_image_prompt(post: &Post) -> String {
    let summary: String = post.content.chars().take(50).collect();
    format!("{} - {}", post.title, summary)
}
