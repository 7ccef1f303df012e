//! Chat-completions client for OpenAI-compatible vision models.

use std::env;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DescriptionProvider, ProviderError};

const SYSTEM_PROMPT: &str = "\
You will receive the caption of a scientific figure together with one panel of that figure as an image. \
The figure is usually composed of several panels. \
Extract the part of the caption that describes the given panel. \
If the caption contains a generic description shared by several panels, return the generic and the panel-specific description together. \
The returned caption must contain enough information to interpret the panel on its own. \
Begin the panel caption with 'Panel X:' where X is the label of the panel in the figure.

Output format:
```
{
    \"panel_label\": \"X\",
    \"panel_caption\": \"Description of the panel.\"
}
```";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(api_key: String, config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client for description provider")?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    pub fn from_env(api_key_env: &str, config: OpenAiConfig) -> Result<Self> {
        let api_key = env::var(api_key_env)
            .with_context(|| format!("environment variable {api_key_env} is not set"))?;
        Self::new(api_key, config)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

impl DescriptionProvider for OpenAiProvider {
    fn describe(&self, panel_image: &[u8], caption: &str) -> Result<String, ProviderError> {
        let started = Instant::now();
        let request = build_request(&self.config, panel_image, caption);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json()?;
        debug!(
            model = %self.config.model,
            latency_ms = started.elapsed().as_millis() as u64,
            "description provider responded"
        );

        first_choice_content(completion)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    n: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
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
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

fn build_request(config: &OpenAiConfig, panel_image: &[u8], caption: &str) -> ChatRequest {
    let encoded = base64::engine::general_purpose::STANDARD.encode(panel_image);
    let image_url = format!("data:{};base64,{encoded}", sniff_image_mime(panel_image));

    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            Message {
                role: "system",
                content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
            },
            Message {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: caption.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ]),
            },
        ],
        n: 1,
        temperature: config.temperature,
    }
}

fn first_choice_content(completion: ChatResponse) -> Result<String, ProviderError> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?
        .message;

    if let Some(refusal) = message.refusal.filter(|text| !text.trim().is_empty()) {
        return Err(ProviderError::Refused(refusal));
    }

    message
        .content
        .map(|content| content.trim().to_string())
        .ok_or(ProviderError::EmptyResponse)
}

fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_base: "https://example.invalid/v1/".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.5,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn build_request_embeds_caption_and_data_url() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let request = build_request(&config(), &png, "A: cells. B: tissue.");
        let value = serde_json::to_value(&request).expect("serializable request");

        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["n"], 1);
        assert_eq!(value["messages"][0]["role"], "system");
        assert!(value["messages"][0]["content"].is_string());
        assert_eq!(value["messages"][1]["content"][0]["type"], "text");
        assert_eq!(value["messages"][1]["content"][0]["text"], "A: cells. B: tissue.");
        assert_eq!(value["messages"][1]["content"][1]["type"], "image_url");
        let url = value["messages"][1]["content"][1]["image_url"]["url"]
            .as_str()
            .expect("url string");
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn sniff_image_mime_recognizes_common_formats() {
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_image_mime(b"GIF89a"), "image/gif");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_image_mime(b"unknown"), "image/png");
    }

    #[test]
    fn first_choice_content_trims_and_reports_refusals() {
        let ok: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "  {\"panel_label\": \"A\"}\n"}}]}"#,
        )
        .expect("response");
        assert_eq!(
            first_choice_content(ok).expect("content"),
            "{\"panel_label\": \"A\"}"
        );

        let refused: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": null, "refusal": "cannot help"}}]}"#,
        )
        .expect("response");
        assert!(matches!(
            first_choice_content(refused),
            Err(ProviderError::Refused(reason)) if reason == "cannot help"
        ));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).expect("response");
        assert!(matches!(
            first_choice_content(empty),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn endpoint_joins_base_without_double_slash() {
        let provider = OpenAiProvider::new("key".to_string(), config()).expect("provider");
        assert_eq!(
            provider.endpoint(),
            "https://example.invalid/v1/chat/completions"
        );
    }
}
