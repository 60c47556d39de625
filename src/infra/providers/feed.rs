use std::sync::Arc;

use async_trait::async_trait;
use folio_api_types::{Article, ArticleFeed};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use url::Url;

use crate::{cache::DevCaches, config::FeedSettings, domain::fallback, infra::kv::KvStore};

use super::{ArticleSource, FallbackChain, ProviderError, ProviderKind, with_deadline};

const CACHE_KEY: &str = "feedly-data";
const EXCERPT_CHARS: usize = 160;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Recently saved articles from a Feedly JSON feed.
pub struct FeedlyClient {
    http: Client,
    settings: FeedSettings,
    kv: Arc<dyn KvStore>,
    caches: Arc<DevCaches>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    items: Vec<FeedItem>,
}

/// Feedly emits `null` for absent fields as often as it omits them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedItem {
    title: Option<String>,
    alternate: Option<Vec<Link>>,
    published: Option<i64>,
    origin: Option<Origin>,
    visual: Option<Visual>,
    thumbnail: Option<Vec<Visual>>,
    content: Option<Content>,
    summary: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct Origin {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Visual {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    content: Option<String>,
}

impl FeedlyClient {
    pub fn new(
        http: Client,
        settings: FeedSettings,
        kv: Arc<dyn KvStore>,
        caches: Arc<DevCaches>,
    ) -> Self {
        Self {
            http,
            settings,
            kv,
            caches,
        }
    }

    /// The configured feed URL with `count` set and `format=json` unless already present.
    pub fn feed_url(&self) -> Result<Url, ProviderError> {
        let base = self
            .settings
            .url
            .as_ref()
            .ok_or(ProviderError::MissingConfiguration("feed.url"))?;

        let retained: Vec<(String, String)> = base
            .query_pairs()
            .filter(|(key, _)| key != "count")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let has_format = retained.iter().any(|(key, _)| key == "format");

        let mut url = base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (key, value) in &retained {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("count", &self.settings.count.to_string());
            if !has_format {
                pairs.append_pair("format", "json");
            }
        }
        Ok(url)
    }

    pub async fn fetch_raw(&self) -> Result<Value, ProviderError> {
        let url = self.feed_url()?;
        with_deadline(self.settings.timeout, async {
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
        })
        .await
    }

    pub async fn fetch(&self) -> Result<ArticleFeed, ProviderError> {
        let raw = self.fetch_raw().await?;
        let feed: FeedResponse = serde_json::from_value(raw).map_err(ProviderError::decode)?;
        Ok(ArticleFeed {
            articles: feed.items.into_iter().map(normalize_item).collect(),
            last_updated: OffsetDateTime::now_utc(),
        })
    }
}

#[async_trait]
impl ArticleSource for FeedlyClient {
    async fn articles(&self) -> ArticleFeed {
        FallbackChain {
            kind: ProviderKind::Articles,
            kv: self.kv.as_ref(),
            cache: &self.caches.articles,
            cache_key: CACHE_KEY,
        }
        .resolve(
            self.fetch(),
            |profile| profile.articles,
            || fallback::default_articles(OffsetDateTime::now_utc()),
        )
        .await
    }
}

fn normalize_item(item: FeedItem) -> Article {
    let excerpt = item
        .content
        .and_then(|content| content.content)
        .or_else(|| item.summary.and_then(|summary| summary.content))
        .map(|html| excerpt_from_html(&html));

    let image_url = item
        .visual
        .and_then(|visual| visual.url)
        .filter(|url| !url.is_empty())
        .or_else(|| {
            item.thumbnail
                .into_iter()
                .flatten()
                .next()
                .and_then(|thumbnail| thumbnail.url)
                .filter(|url| !url.is_empty())
        });

    Article {
        title: item.title.unwrap_or_default(),
        url: item
            .alternate
            .into_iter()
            .flatten()
            .next()
            .map(|link| link.href)
            .unwrap_or_default(),
        date: item.published.unwrap_or_default(),
        source: item.origin.and_then(|origin| origin.title),
        image_url,
        excerpt,
    }
}

/// Strip tags, keep the first line, and cap it at 160 characters plus an ellipsis.
fn excerpt_from_html(html: &str) -> String {
    let text = HTML_TAG.replace_all(html, "");
    let first_line = text.split('\n').next().unwrap_or_default().trim();

    let mut excerpt: String = first_line.chars().take(EXCERPT_CHARS).collect();
    if excerpt.chars().count() == EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    excerpt
}
