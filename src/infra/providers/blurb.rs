use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use folio_api_types::Profile;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    config::BlurbSettings,
    domain::fallback,
    infra::kv::{BLURB_KEY, KvStore},
};

use super::{BlurbSource, ProviderError, ProviderKind, endpoint, with_deadline};

const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;

/// Instruction used when no remote prompt is configured or it cannot be read.
pub fn default_system_prompt(owner: &str) -> String {
    format!(
        "You generate a short, casual blurb about {owner} based on their recent activity. \
         Use the provided weather, article reading, and music listening data to create a single \
         sentence (60-80 tokens) that feels natural and conversational. \
         Don't use bullet points or lists."
    )
}

/// One-sentence summary of the profile from a chat-completions API.
pub struct OpenAiBlurb {
    http: Client,
    settings: BlurbSettings,
    kv: Arc<dyn KvStore>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBlurb {
    pub fn new(http: Client, settings: BlurbSettings, kv: Arc<dyn KvStore>) -> Self {
        Self { http, settings, kv }
    }

    /// Remote system prompt when it is a JSON string, the default otherwise.
    pub async fn system_prompt(&self) -> String {
        let Some(url) = self.settings.prompt_url.clone() else {
            return default_system_prompt(&self.settings.owner_name);
        };

        let fetched = async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(ProviderError::http)?;
            if !response.status().is_success() {
                return Err(ProviderError::Status {
                    status: response.status().as_u16(),
                });
            }
            response.json::<Value>().await.map_err(ProviderError::decode)
        }
        .await;

        match fetched {
            Ok(Value::String(prompt)) if !prompt.trim().is_empty() => prompt,
            Ok(_) => {
                warn!(
                    target = "folio::provider",
                    provider = ProviderKind::Blurb.as_str(),
                    "Remote prompt is not a string, using default prompt"
                );
                default_system_prompt(&self.settings.owner_name)
            }
            Err(err) => {
                warn!(
                    target = "folio::provider",
                    provider = ProviderKind::Blurb.as_str(),
                    error = %err,
                    "Failed to read remote prompt, using default prompt"
                );
                default_system_prompt(&self.settings.owner_name)
            }
        }
    }

    pub fn user_message(&self, profile: &Profile) -> String {
        let weather = &profile.weather;
        let owner = &self.settings.owner_name;

        let reading = match profile.articles.latest() {
            Some(article) => format!(
                "Latest article read: \"{}\"\nExcerpt: \"{}\"",
                article.title,
                article.excerpt.as_deref().unwrap_or("No excerpt available")
            ),
            None => "No recent articles".to_string(),
        };
        let listening = match profile.music.track.as_ref() {
            Some(track) => format!(
                "Last played music: \"{}\" by {}",
                track.title, track.artist
            ),
            None => "No recent music".to_string(),
        };
        let local_time = Utc::now()
            .with_timezone(&self.settings.timezone)
            .format("%-m/%-d/%Y, %-I:%M:%S %p");

        format!(
            "Generate a short, casual one-sentence blurb about {owner} based on this data:\n\n\
             Weather: {}, {}°F, {}, Humidity: {}%\n\n\
             {reading}\n\n\
             {listening}\n\n\
             Current date and time: {local_time}\n\n\
             Create a natural-sounding, casual sentence (max 80 tokens) that mentions these activities.",
            weather.city, weather.temperature, weather.condition, weather.mean_humidity
        )
    }

    /// Prompt lookup and completion under one deadline, without fallback.
    pub async fn generate(&self, profile: &Profile) -> Result<String, ProviderError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingConfiguration("blurb.api_key"))?;

        with_deadline(self.settings.timeout, async {
            let system_prompt = self.system_prompt().await;
            let user_message = self.user_message(profile);
            let request = CompletionRequest {
                model: &self.settings.model,
                messages: [
                    Message {
                        role: "system",
                        content: &system_prompt,
                    },
                    Message {
                        role: "user",
                        content: &user_message,
                    },
                ],
                max_tokens: MAX_TOKENS,
                temperature: TEMPERATURE,
            };

            let url = endpoint(&self.settings.api_base_url, "/v1/chat/completions");
            let response = self
                .http
                .post(url)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await
                .map_err(ProviderError::http)?;
            if !response.status().is_success() {
                return Err(ProviderError::Status {
                    status: response.status().as_u16(),
                });
            }

            let completion: CompletionResponse =
                response.json().await.map_err(ProviderError::decode)?;
            completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .map(|content| content.trim().to_string())
                .filter(|content| !content.is_empty())
                .ok_or(ProviderError::EmptyCompletion)
        })
        .await
    }

    async fn previous_blurb(&self) -> Option<String> {
        match self.kv.get::<String>(BLURB_KEY).await {
            Ok(blurb) => blurb.filter(|blurb| !blurb.is_empty()),
            Err(err) => {
                warn!(
                    target = "folio::kv",
                    error = %err,
                    "Failed to read persisted blurb"
                );
                None
            }
        }
    }
}

#[async_trait]
impl BlurbSource for OpenAiBlurb {
    async fn blurb(&self, profile: &Profile) -> String {
        let error = match self.generate(profile).await {
            Ok(blurb) => return blurb,
            Err(error) => error,
        };

        warn!(
            target = "folio::provider",
            provider = ProviderKind::Blurb.as_str(),
            error = %error,
            "Blurb generation failed, using fallback"
        );

        if let Some(previous) = self.previous_blurb().await {
            info!(
                target = "folio::provider",
                provider = ProviderKind::Blurb.as_str(),
                fallback = "persisted",
                "Using persisted blurb"
            );
            return previous;
        }

        info!(
            target = "folio::provider",
            provider = ProviderKind::Blurb.as_str(),
            fallback = "template",
            "Using templated blurb"
        );
        fallback::template_blurb(&self.settings.owner_name, profile)
    }
}
