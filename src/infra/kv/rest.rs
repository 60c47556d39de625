use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{KvError, KvStore, SetOptions};

/// Client for a Redis-compatible REST endpoint (Upstash / Vercel KV protocol).
///
/// Each command is posted as a JSON array; values are stored as JSON text.
#[derive(Debug, Clone)]
pub struct RestKv {
    client: Client,
    url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl RestKv {
    pub fn new(url: String, token: String, timeout: Duration) -> Result<Self, KvError> {
        let client = Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(KvError::transport)?;
        Ok(Self { client, url, token })
    }

    async fn command(&self, command: Value) -> Result<Option<Value>, KvError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(KvError::transport)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(KvError::transport)?;
        if status != StatusCode::OK {
            return Err(KvError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: CommandResponse = serde_json::from_slice(&bytes)
            .map_err(|err| KvError::Backend(format!("unreadable response: {err}")))?;
        if let Some(error) = parsed.error {
            return Err(KvError::Backend(error));
        }
        Ok(parsed.result)
    }
}

#[async_trait]
impl KvStore for RestKv {
    async fn get_value(&self, key: &str) -> Result<Option<Value>, KvError> {
        match self.command(json!(["GET", key])).await? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|err| KvError::decode(key, err)),
            Some(other) => Ok(Some(other)),
        }
    }

    async fn set_value(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<(), KvError> {
        let text = value.to_string();
        let command = match options.expire_after {
            Some(ttl) => json!(["SET", key, text, "EX", ttl.as_secs().max(1)]),
            None => json!(["SET", key, text]),
        };
        self.command(command).await?;
        debug!(
            target = "folio::kv",
            key,
            ttl_seconds = options.expire_after.map(|ttl| ttl.as_secs()),
            "Stored key"
        );
        Ok(())
    }
}
