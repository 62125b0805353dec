use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use campus_types::api::{ItemPage, ListFilter, UnreadCountResponse};
use campus_types::models::UnreadDomain;

use crate::error::ApiError;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for the portal's item CRUD endpoints.
///
/// Stateless request/response wrapper: every call maps to exactly one HTTP
/// request and never touches local state. Mutation endpoints return
/// success/failure only; no response body is trusted over the store's own
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn items_url(&self, domain: UnreadDomain, suffix: &str) -> String {
        format!("{}/{}/items{}", self.base_url, domain.path_segment(), suffix)
    }

    /// Fetch one authoritative page. Pages are 1-based.
    pub async fn list_items(
        &self,
        domain: UnreadDomain,
        page: u32,
        page_size: u32,
        filter: &ListFilter,
    ) -> Result<ItemPage, ApiError> {
        let mut req = self
            .client
            .get(self.items_url(domain, ""))
            .bearer_auth(&self.token)
            .query(&[("page", page.to_string()), ("pageSize", page_size.to_string())]);
        if filter.unread_only {
            req = req.query(&[("unreadOnly", "true")]);
        }
        if let Some(kind) = filter.kind {
            req = req.query(&[("kind", kind.as_str())]);
        }
        let resp = req.send().await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json::<ItemPage>().await?)
    }

    /// Count-only request for the badge.
    pub async fn unread_count(&self, domain: UnreadDomain) -> Result<u32, ApiError> {
        let resp = self
            .client
            .get(self.items_url(domain, "/unread-count"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json::<UnreadCountResponse>().await?.count)
    }

    pub async fn mark_read(&self, domain: UnreadDomain, id: Uuid) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.items_url(domain, &format!("/{}/read", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }

    pub async fn mark_all_read(&self, domain: UnreadDomain) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.items_url(domain, "/read-all"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }

    pub async fn delete_item(&self, domain: UnreadDomain, id: Uuid) -> Result<(), ApiError> {
        let resp = self
            .client
            .delete(self.items_url(domain, &format!("/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(resp).await.map(|_| ())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let mut message = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            message.push_str("...");
        }
        debug!("API response error ({}): {}", status, message);
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
