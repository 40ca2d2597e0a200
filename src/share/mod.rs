use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::fs;
use tracing::{info, warn};

use crate::campaign::Platform;
use crate::generation::split_data_url;
use crate::post::Post;

const TWITTER_INTENT_URL: &str = "https://twitter.com/intent/tweet?text=";
const LINKEDIN_FEED_URL: &str = "https://www.linkedin.com/feed/";
const FACEBOOK_SHARER_URL: &str = "https://www.facebook.com/sharer/sharer.php?u=";

/// Environment seam for the hand-off side effects. A browser shell maps
/// these onto the clipboard, an anchor download, and `window.open`; the
/// built-in [`LocalIntentSink`] degrades them for headless use.
#[async_trait]
pub trait IntentSink: Send + Sync {
    async fn copy_text(&self, text: &str) -> bool;
    async fn download_image(&self, file_name: &str, image: &[u8]) -> bool;
    async fn open_url(&self, url: &str) -> bool;
    async fn notify(&self, message: &str);
}

/// Best-effort hand-off of one post to a platform's manual composer.
/// There is no real posting API behind any of this.
pub struct ShareDispatcher {
    sink: Arc<dyn IntentSink>,
    /// Page URL passed to sharer endpoints that take a link instead of
    /// text (facebook).
    referrer_url: String,
}

impl ShareDispatcher {
    pub fn new(sink: Arc<dyn IntentSink>, referrer_url: impl Into<String>) -> ShareDispatcher {
        ShareDispatcher {
            sink,
            referrer_url: referrer_url.into(),
        }
    }

    /// Runs the platform-specific hand-off. Always reports success:
    /// no failure path is modeled, and callers mark the post published
    /// on the strength of this return value.
    #[tracing::instrument(skip(self, post), fields(post_id = %post.id))]
    pub async fn share_content(&self, platform: Platform, post: &Post) -> bool {
        let full_text = full_share_text(post);

        match platform {
            Platform::Twitter => {
                self.download_if_present(post).await;
                let url = format!(
                    "{}{}",
                    TWITTER_INTENT_URL,
                    urlencoding::encode(&full_text)
                );
                self.sink.open_url(&url).await;
            }
            Platform::Linkedin => {
                // LinkedIn stopped accepting prefilled text, so hand the
                // user everything and open the feed.
                self.sink.copy_text(&full_text).await;
                self.download_if_present(post).await;
                self.sink
                    .notify(
                        "Text copied and image saved. Paste the text and upload the image \
                         in the LinkedIn window that opens now.",
                    )
                    .await;
                self.sink.open_url(LINKEDIN_FEED_URL).await;
            }
            Platform::Facebook => {
                // Facebook forbids prefilled text entirely.
                self.download_if_present(post).await;
                self.sink.copy_text(&full_text).await;
                self.sink
                    .notify(
                        "Text copied. Facebook does not allow prefilled posts; paste the \
                         text and upload the image manually.",
                    )
                    .await;
                let url = format!(
                    "{}{}",
                    FACEBOOK_SHARER_URL,
                    urlencoding::encode(&self.referrer_url)
                );
                self.sink.open_url(&url).await;
            }
            Platform::Instagram => {
                // No web composer exists; everything goes through the app.
                self.download_if_present(post).await;
                self.sink.copy_text(&full_text).await;
                self.sink
                    .notify(
                        "Text copied and image saved. Post through the Instagram app or a \
                         management tool.",
                    )
                    .await;
            }
        }

        true
    }

    async fn download_if_present(&self, post: &Post) -> bool {
        let image_url = match &post.image_url {
            Some(image_url) => image_url,
            None => return false,
        };

        let bytes = match decode_image_payload(image_url) {
            Some(bytes) => bytes,
            None => {
                warn!(post_id = %post.id, "post image is not a decodable data url");
                return false;
            }
        };

        self.sink
            .download_image(&format!("autoposter-{}.png", post.id), &bytes)
            .await
    }
}

/// Content plus tags, the way every composer hand-off presents it.
pub fn full_share_text(post: &Post) -> String {
    if post.hashtags.is_empty() {
        post.content.clone()
    } else {
        format!("{}\n\n{}", post.content, post.hashtags.join(" "))
    }
}

fn decode_image_payload(data_url: &str) -> Option<Vec<u8>> {
    let (_mime_type, data) = split_data_url(data_url)?;
    BASE64.decode(data).ok()
}

/// Headless sink: downloads land in a directory, the clipboard/compose
/// actions become structured log events an operator can act on.
pub struct LocalIntentSink {
    downloads_dir: PathBuf,
}

impl LocalIntentSink {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> LocalIntentSink {
        LocalIntentSink {
            downloads_dir: downloads_dir.into(),
        }
    }
}

#[async_trait]
impl IntentSink for LocalIntentSink {
    async fn copy_text(&self, text: &str) -> bool {
        info!(%text, "share text ready to paste");
        true
    }

    async fn download_image(&self, file_name: &str, image: &[u8]) -> bool {
        if let Err(error) = fs::create_dir_all(&self.downloads_dir).await {
            warn!(%error, "failed to create downloads directory");
            return false;
        }
        let path = self.downloads_dir.join(file_name);
        match fs::write(&path, image).await {
            Ok(()) => {
                info!(path = %path.display(), "saved share image");
                true
            }
            Err(error) => {
                warn!(%error, "failed to save share image");
                false
            }
        }
    }

    async fn open_url(&self, url: &str) -> bool {
        info!(%url, "open this composer url to finish sharing");
        true
    }

    async fn notify(&self, message: &str) {
        info!(%message, "share notice");
    }
}
