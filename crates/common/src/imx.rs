use crate::error::FetchError;
use crate::types::AssetPage;
use anyhow::{Context, Result};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Assets per page requested from `/v1/assets`.
pub const PAGE_SIZE: u32 = 300;
/// Ordering applied to every asset listing.
pub const ORDER_BY: &str = "updated_at";

/// Thin client for the Immutable X asset listing. One call, one request;
/// pacing and retries belong to the caller.
pub struct ImxClient {
    api_url: Url,
    client: reqwest::Client,
}

impl ImxClient {
    pub fn new(api_url: &str) -> Result<Self> {
        Self::new_with_settings(api_url, Duration::from_secs(15))
    }

    pub fn new_with_settings(api_url: &str, request_timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(api_url.trim_end_matches('/'))
            .with_context(|| format!("invalid asset API url: {api_url}"))?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { api_url, client })
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_str().trim_end_matches('/')
    }

    pub fn assets_url(&self, user: &str, cursor: Option<&str>) -> String {
        let mut url = self.api_url.clone();
        url.set_path(&format!(
            "{}/v1/assets",
            self.api_url.path().trim_end_matches('/')
        ));
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("page_size", &PAGE_SIZE.to_string());
            qp.append_pair("order_by", ORDER_BY);
            qp.append_pair("user", user);
            if let Some(c) = cursor.filter(|c| !c.is_empty()) {
                qp.append_pair("cursor", c);
            }
        }
        url.to_string()
    }

    /// Fetch one page of assets owned by `user`.
    pub async fn fetch_assets_raw(
        &self,
        user: &str,
        cursor: Option<&str>,
    ) -> std::result::Result<AssetPage, FetchError> {
        let url = self.assets_url(user, cursor);
        debug!(url = %url, "fetching asset page");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let page: AssetPage = serde_json::from_str(&body)?;
        debug!(
            count = page.result.len(),
            has_cursor = page.next_cursor().is_some(),
            "fetched asset page"
        );
        Ok(page)
    }
}
