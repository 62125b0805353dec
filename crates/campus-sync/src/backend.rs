use async_trait::async_trait;
use uuid::Uuid;

use campus_api::{ApiClient, ApiError};
use campus_types::api::{ItemPage, ListFilter};
use campus_types::models::UnreadDomain;

/// Read side of the CRUD collaborator: authoritative snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_page(
        &self,
        domain: UnreadDomain,
        page: u32,
        page_size: u32,
        filter: &ListFilter,
    ) -> Result<ItemPage, ApiError>;

    async fn fetch_unread_count(&self, domain: UnreadDomain) -> Result<u32, ApiError>;
}

/// Write side of the CRUD collaborator: the three item mutations. Responses
/// carry success/failure only; the store's own bookkeeping is what counts.
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn mark_read(&self, domain: UnreadDomain, id: Uuid) -> Result<(), ApiError>;

    async fn mark_all_read(&self, domain: UnreadDomain) -> Result<(), ApiError>;

    async fn delete_item(&self, domain: UnreadDomain, id: Uuid) -> Result<(), ApiError>;
}

#[async_trait]
impl SnapshotSource for ApiClient {
    async fn fetch_page(
        &self,
        domain: UnreadDomain,
        page: u32,
        page_size: u32,
        filter: &ListFilter,
    ) -> Result<ItemPage, ApiError> {
        self.list_items(domain, page, page_size, filter).await
    }

    async fn fetch_unread_count(&self, domain: UnreadDomain) -> Result<u32, ApiError> {
        self.unread_count(domain).await
    }
}

#[async_trait]
impl ActionSink for ApiClient {
    async fn mark_read(&self, domain: UnreadDomain, id: Uuid) -> Result<(), ApiError> {
        ApiClient::mark_read(self, domain, id).await
    }

    async fn mark_all_read(&self, domain: UnreadDomain) -> Result<(), ApiError> {
        ApiClient::mark_all_read(self, domain).await
    }

    async fn delete_item(&self, domain: UnreadDomain, id: Uuid) -> Result<(), ApiError> {
        ApiClient::delete_item(self, domain, id).await
    }
}
