//! Outbound page revalidation for the site that renders the profile.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::RevalidateSettings;

const CRON_HEADER: &str = "x-internal-cron";

#[derive(Debug, Error)]
pub enum RevalidateError {
    #[error("revalidation of `{path}` failed: {message}")]
    Transport { path: String, message: String },
    #[error("revalidation of `{path}` returned status {status}")]
    Status { path: String, status: u16 },
}

/// Asks the site to rebuild cached pages after a profile write.
#[derive(Clone)]
pub struct RevalidateClient {
    http: Client,
    url: Url,
    token: String,
    paths: Vec<String>,
    timeout: Duration,
}

impl RevalidateClient {
    /// `None` unless both the endpoint and its token are configured.
    pub fn from_settings(http: Client, settings: &RevalidateSettings, timeout: Duration) -> Option<Self> {
        let url = settings.url.clone()?;
        let token = settings.token.clone()?;
        Some(Self {
            http,
            url,
            token,
            paths: settings.paths.clone(),
            timeout,
        })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    fn request_url(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("secret", &self.token);
        url
    }

    pub async fn revalidate(&self, path: &str) -> Result<(), RevalidateError> {
        let response = self
            .http
            .post(self.request_url(path))
            .header(CRON_HEADER, "true")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| RevalidateError::Transport {
                path: path.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RevalidateError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(target = "folio::job", path, "Revalidated page");
        Ok(())
    }

    /// Revalidate every configured path, returning how many succeeded.
    pub async fn revalidate_all(&self) -> usize {
        let mut succeeded = 0;
        for path in &self.paths {
            match self.revalidate(path).await {
                Ok(()) => succeeded += 1,
                Err(err) => warn!(
                    target = "folio::job",
                    path = %path,
                    error = %err,
                    "Page revalidation failed"
                ),
            }
        }
        succeeded
    }
}
