//! HTTP client for the CFS catalog REST API
//!
//! - `GET {base}/socs?cfsVersion=..&continue=..` pages through entry
//!   summaries until no `continuationToken` is returned
//! - `GET {base}/socs/{id}?cfsVersion=..` returns `{ "item": {...} }`
//! - `GET {base}/ping` answers when the service is up

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ApiOptions, RemoteApiClient, SocListing};

/// Upper bound on listing pages, guards against a server that never stops
/// returning continuation tokens
const MAX_PAGES: usize = 1000;

/// REST client for the CFS catalog service
pub struct CfsApiClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    cfs_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    items: Vec<SocListing>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    item: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

impl CfsApiClient {
    /// Create a client; reads the API key from `options.api_key_env` if set
    pub fn new(options: ApiOptions) -> Result<Self> {
        let base_url = Url::parse(&options.base_url)
            .with_context(|| format!("Invalid API base URL: {}", options.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid API base URL: {}", options.base_url);
        }

        let api_key = std::env::var(&options.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            debug!(
                "{} is not set, using anonymous access to {}",
                options.api_key_env, base_url
            );
        }

        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(std::time::Duration::from_secs(options.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
            cfs_version: options.cfs_version,
        })
    }

    /// Whether the service answers at all; never fails
    pub async fn is_online(&self) -> bool {
        let Ok(url) = self.endpoint(&["ping"]) else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("CFS API is not reachable: {}", e);
                false
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid API base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut request = self
            .client
            .get(url.clone())
            .query(&[("cfsVersion", self.cfs_version.as_str())])
            .query(query);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            warn!("CFS API error: {} - {}", status, message);
            anyhow::bail!("CFS API error: {} - {}", status, message);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {url}"))
    }
}

#[async_trait]
impl RemoteApiClient for CfsApiClient {
    async fn list_socs(&self) -> Result<Vec<SocListing>> {
        let url = self.endpoint(&["socs"])?;
        let mut listings = Vec::new();
        let mut token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let query: Vec<(&str, &str)> = token
                .as_deref()
                .map(|t| vec![("continue", t)])
                .unwrap_or_default();
            let page: ListResponse = self.get_json(url.clone(), &query).await?;
            debug!("Fetched {} SoC summaries", page.items.len());
            listings.extend(page.items);

            match page.continuation_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => return Ok(listings),
            }
        }

        anyhow::bail!("SoC listing did not finish after {MAX_PAGES} pages")
    }

    async fn get_soc(&self, id: &str) -> Result<Value> {
        let url = self.endpoint(&["socs", id])?;
        let response: ItemResponse = self.get_json(url, &[]).await?;
        response
            .item
            .with_context(|| format!("CFS API returned no item for SoC {id}"))
    }

    fn name(&self) -> &'static str {
        "cfs-api"
    }
}
