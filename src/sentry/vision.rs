use std::collections::HashSet;

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::FrameClassifier;
use crate::config::VisionConfig;

/// Frame classifier backed by an OpenAI-compatible vision model
///
/// Each frame is sent as a base64 data URL next to the configured prompt.
/// The model's reply is read as a comma-separated label list.
pub struct VisionClassifier {
    config: VisionConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl VisionClassifier {
    pub fn new(config: VisionConfig, api_key: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            http_client,
        })
    }

    /// Read the API key from `config.api_key_env`
    pub fn from_env(config: VisionConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} not set", config.api_key_env))?;
        Self::new(config, api_key)
    }

    fn request(&self, image: &[u8], mime_type: &str) -> ChatRequest {
        let data = base64::engine::general_purpose::STANDARD.encode(image);
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: self.config.prompt.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:{};base64,{}", mime_type, data),
                        },
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

#[async_trait::async_trait]
impl FrameClassifier for VisionClassifier {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn classify(&self, image: &[u8], mime_type: &str) -> Result<HashSet<String>> {
        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request(image, mime_type))
            .send()
            .await
            .context("Vision request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Vision API error {}: {}", status, body);
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("Failed to parse vision response")?;
        let answer = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Vision response had no choices"))?;

        debug!(model = %self.config.model, answer = %answer.trim(), "Vision reply");
        Ok(parse_labels(&answer))
    }
}

/// `"gun, Suspect."` -> `{"GUN", "SUSPECT"}`; `NONE` and blanks are dropped
pub fn parse_labels(answer: &str) -> HashSet<String> {
    answer
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(str::to_ascii_uppercase)
        .filter(|label| !label.is_empty() && label != "NONE")
        .collect()
}
