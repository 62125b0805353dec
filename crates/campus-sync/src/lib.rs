pub mod backend;
pub mod engine;

use thiserror::Error;

use campus_api::ApiError;
use campus_types::models::UnreadDomain;

pub use backend::{ActionSink, SnapshotSource};
pub use engine::{SyncConfig, SyncEngine};

/// Errors surfaced to callers of the engine handle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The store loop has shut down.
    #[error("sync engine stopped")]
    Stopped,

    /// The domain was not configured at spawn time.
    #[error("domain not configured: {0:?}")]
    UnknownDomain(UnreadDomain),

    /// The CRUD collaborator rejected or failed a request. When returned
    /// from an action, the optimistic effect has already been rolled back.
    #[error(transparent)]
    Api(#[from] ApiError),
}
