use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::campaign::{Platform, ReferenceImageType};
use crate::error::Error;
use crate::post::{self, Post, PostId, PostStatus};

use super::{split_data_url, ContentGenerator, ContentRequest};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONTENT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the Gemini `generateContent` API, covering both the
/// structured post-plan call and image generation.
pub struct GoogleGenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GoogleGenAiClient {
    /// Reads the credential from `API_KEY`, falling back to
    /// `GEMINI_API_KEY`. Fails fast when neither is set.
    pub fn from_env() -> Result<GoogleGenAiClient, Error> {
        let api_key = env::var("API_KEY")
            .or_else(|_| env::var("GEMINI_API_KEY"))
            .map_err(|_| Error::MissingGenerationCredential)?;
        GoogleGenAiClient::new(api_key)
    }

    pub fn new(api_key: impl Into<String>) -> Result<GoogleGenAiClient, Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(GoogleGenAiClient {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Points the client at a different backend host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> GoogleGenAiClient {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// One `generateContent` round trip. `Ok(None)` means the backend
    /// answered successfully but with a body that is not the expected
    /// envelope; callers treat that the same as empty content.
    async fn generate(&self, model: &str, body: &Value) -> Result<Option<Value>, Error> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(
                status = status.as_u16(),
                model, "generation backend rejected the request"
            );
            return Err(Error::GenerationRequestRejected {
                status: status.as_u16(),
                message: truncate_message(&text),
            });
        }

        match serde_json::from_str(&text) {
            Ok(data) => Ok(Some(data)),
            Err(error) => {
                warn!(%error, model, "generation backend returned a non-json body");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for GoogleGenAiClient {
    #[tracing::instrument(skip(self, request), fields(title = %request.title))]
    async fn generate_campaign_content(
        &self,
        request: &ContentRequest,
    ) -> Result<Vec<Post>, Error> {
        let mut parts = vec![json!({ "text": build_campaign_prompt(request) })];
        if let Some(reference) = &request.reference_image {
            match split_data_url(reference) {
                Some((mime_type, data)) => parts.push(json!({
                    "inline_data": { "mime_type": mime_type, "data": data }
                })),
                None => warn!("reference image is not a data url, sending text only"),
            }
        }

        let body = json!({
            "contents": [{ "parts": parts }],
            "generation_config": {
                "response_mime_type": "application/json",
                "response_schema": post_plan_schema(),
            },
        });

        let data = match self.generate(CONTENT_MODEL, &body).await? {
            Some(data) => data,
            None => return Ok(vec![]),
        };

        Ok(parse_post_plan(&response_text(&data), Utc::now()))
    }

    #[tracing::instrument(skip(self, prompt, reference_image))]
    async fn generate_post_image(
        &self,
        prompt: &str,
        reference_image: Option<&str>,
    ) -> Result<Option<String>, Error> {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(reference) = reference_image {
            match split_data_url(reference) {
                Some((mime_type, data)) => parts.push(json!({
                    "inline_data": { "mime_type": mime_type, "data": data }
                })),
                None => warn!("reference image is not a data url, sending text only"),
            }
        }

        let body = json!({ "contents": [{ "parts": parts }] });

        let data = match self.generate(IMAGE_MODEL, &body).await? {
            Some(data) => data,
            None => return Ok(None),
        };

        Ok(first_inline_image(&data))
    }
}

fn build_campaign_prompt(request: &ContentRequest) -> String {
    let platforms = request
        .platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You are an expert social media manager acting as the content engine.\n\
         \n\
         CAMPAIGN DETAILS:\n\
         - Campaign Title: \"{}\"\n\
         - Core Topic: \"{}\"\n\
         - Target Audience: \"{}\"\n\
         - Target Platforms: {}\n",
        request.title, request.topic, request.target_audience, platforms
    );

    if let Some(instruction) = visual_context(request) {
        prompt.push_str("\nVISUAL CONTEXT:\n");
        prompt.push_str(instruction);
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\nTASK:\n\
         Generate a content plan of exactly {} posts optimized for reach and engagement.\n\
         \n\
         GUIDELINES:\n\
         1. Open every post with a hook that grabs attention in the first seconds.\n\
         2. Use short, punchy sentences and end with a call to action or a question.\n\
         3. Include 5-10 high-traffic, relevant hashtags for each post.\n\
         4. Provide a creative, high-quality AI image generation prompt in English.\n",
        request.total_posts()
    ));

    if request.reference_image.is_some() {
        prompt.push_str(
            "5. The image prompts MUST be influenced by the attached reference image as \
             instructed above.\n",
        );
    }

    prompt
}

/// Reference-image-type-specific instruction. `None` when no reference
/// image is attached.
fn visual_context(request: &ContentRequest) -> Option<&'static str> {
    request.reference_image.as_ref()?;

    Some(match request.reference_image_type {
        Some(ReferenceImageType::Logo) => {
            "The attached image is the brand logo. The generated image prompts must \
             explicitly mention incorporating the brand colors and style shown in the logo."
        }
        Some(ReferenceImageType::Character) => {
            "The attached image is the main character or mascot. The generated image \
             prompts must describe this character in detail so it appears in every post image."
        }
        Some(ReferenceImageType::Business) => {
            "The attached image is the business environment. Use it as the aesthetic \
             setting for the content."
        }
        Some(ReferenceImageType::Expressive) => {
            "The attached image is the artistic vibe. Use its mood, lighting, and style \
             as the main inspiration for all generated image prompts."
        }
        Some(ReferenceImageType::Other) | None => {
            "Use the attached image as a general visual reference for the style."
        }
    })
}

fn post_plan_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "day": { "type": "INTEGER", "description": "Day number (1 to N)" },
                "title": { "type": "STRING", "description": "Catchy headline for the post" },
                "content": {
                    "type": "STRING",
                    "description": "Main post content optimized for engagement"
                },
                "hashtags": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "List of 5-10 relevant trending hashtags"
                },
                "imagePrompt": {
                    "type": "STRING",
                    "description": "Detailed AI image generation prompt in English"
                }
            },
            "required": ["day", "title", "content", "hashtags", "imagePrompt"]
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPost {
    day: u32,
    title: String,
    content: String,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    image_prompt: Option<String>,
}

/// Turns the backend's JSON text into posts. Empty or unparseable text
/// is an empty plan, not an error.
fn parse_post_plan(text: &str, now: DateTime<Utc>) -> Vec<Post> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let raw: Vec<RawPost> = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(%error, "generated post plan is not valid json, treating as empty");
            return Vec::new();
        }
    };

    raw.into_iter()
        .map(|raw| Post {
            id: PostId::new(),
            day: raw.day,
            title: raw.title,
            content: raw.content,
            hashtags: post::normalized_hashtags(raw.hashtags),
            image_prompt: raw.image_prompt,
            image_url: None,
            status: PostStatus::Pending,
            scheduled_time: Some(now + chrono::Duration::days(i64::from(raw.day))),
        })
        .collect()
}

/// Concatenated text parts of the first candidate.
fn response_text(data: &Value) -> String {
    let mut text = String::new();
    if let Some(parts) = data["candidates"][0]["content"]["parts"].as_array() {
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(|t| t.as_str()) {
                text.push_str(chunk);
            }
        }
    }
    text
}

/// First inline image payload of the first candidate, as a data URL.
fn first_inline_image(data: &Value) -> Option<String> {
    let parts = data["candidates"][0]["content"]["parts"].as_array()?;
    for part in parts {
        let inline = match part.get("inline_data").or_else(|| part.get("inlineData")) {
            Some(inline) => inline,
            None => continue,
        };
        if let Some(payload) = inline.get("data").and_then(|d| d.as_str()) {
            return Some(format!("data:image/png;base64,{}", payload));
        }
    }
    None
}

fn truncate_message(body: &str) -> String {
    const LIMIT: usize = 300;
    if body.chars().count() > LIMIT {
        let truncated: String = body.chars().take(LIMIT).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_reference(reference_image_type: Option<ReferenceImageType>) -> ContentRequest {
        ContentRequest {
            title: "Launch week".to_string(),
            topic: "Announcing the new app".to_string(),
            target_audience: "Early adopters".to_string(),
            duration_days: 2,
            posts_per_day: 2,
            platforms: vec![Platform::Twitter, Platform::Linkedin],
            reference_image: Some("data:image/png;base64,aGk=".to_string()),
            reference_image_type,
        }
    }

    #[test]
    fn prompt_embeds_parameters_and_post_count() {
        let mut request = request_with_reference(None);
        request.reference_image = None;

        let prompt = build_campaign_prompt(&request);
        assert!(prompt.contains("\"Launch week\""));
        assert!(prompt.contains("twitter, linkedin"));
        assert!(prompt.contains("exactly 4 posts"));
        assert!(!prompt.contains("VISUAL CONTEXT"));
        assert!(!prompt.contains("attached reference image"));
    }

    #[test]
    fn prompt_picks_the_instruction_for_the_reference_type() {
        let logo = build_campaign_prompt(&request_with_reference(Some(ReferenceImageType::Logo)));
        assert!(logo.contains("brand colors and style"));

        let character =
            build_campaign_prompt(&request_with_reference(Some(ReferenceImageType::Character)));
        assert!(character.contains("describe this character in detail"));

        let business =
            build_campaign_prompt(&request_with_reference(Some(ReferenceImageType::Business)));
        assert!(business.contains("aesthetic setting"));

        let expressive =
            build_campaign_prompt(&request_with_reference(Some(ReferenceImageType::Expressive)));
        assert!(expressive.contains("mood, lighting, and style"));

        let fallback = build_campaign_prompt(&request_with_reference(None));
        assert!(fallback.contains("general visual reference"));
        assert!(fallback.contains("MUST be influenced by the attached reference image"));
    }

    #[test]
    fn parse_post_plan_builds_pending_scheduled_posts() {
        let now = Utc::now();
        let text = r##"[
            {"day": 1, "title": "Hook them", "content": "Day one.", "hashtags": ["launch", "#launch", "#Apps"], "imagePrompt": "confetti over a phone"},
            {"day": 2, "title": "Keep them", "content": "Day two.", "hashtags": [], "imagePrompt": "a calendar page turning"}
        ]"##;

        let posts = parse_post_plan(text, now);
        assert_eq!(posts.len(), 2);

        assert_eq!(posts[0].day, 1);
        assert_eq!(posts[0].status, PostStatus::Pending);
        assert_eq!(
            posts[0].hashtags,
            vec!["#launch".to_string(), "#Apps".to_string()]
        );
        assert_eq!(
            posts[0].scheduled_time,
            Some(now + chrono::Duration::days(1))
        );
        assert_eq!(
            posts[1].scheduled_time,
            Some(now + chrono::Duration::days(2))
        );
        assert_ne!(posts[0].id, posts[1].id);
    }

    #[test]
    fn unparseable_or_empty_plans_become_empty() {
        assert!(parse_post_plan("", Utc::now()).is_empty());
        assert!(parse_post_plan("   ", Utc::now()).is_empty());
        assert!(parse_post_plan("not json at all", Utc::now()).is_empty());
    }

    #[test]
    fn response_text_concatenates_text_parts() {
        let data = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "[{\"day\": 1," },
                        { "inlineData": { "mimeType": "image/png", "data": "xxxx" } },
                        { "text": " \"title\": \"t\"}]" }
                    ]
                }
            }]
        });
        assert_eq!(
            response_text(&data),
            "[{\"day\": 1, \"title\": \"t\"}]".to_string()
        );
        assert_eq!(response_text(&json!({})), String::new());
    }

    #[test]
    fn first_inline_image_wraps_payload_as_data_url() {
        let data = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": "aW1hZ2U=" } }
                    ]
                }
            }]
        });
        assert_eq!(
            first_inline_image(&data),
            Some("data:image/png;base64,aW1hZ2U=".to_string())
        );
        assert_eq!(first_inline_image(&json!({ "candidates": [] })), None);
    }
}
