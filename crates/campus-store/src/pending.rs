use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::store::StoredItem;

/// Identifier for one in-flight optimistic mutation.
pub type MutationId = Uuid;

/// The local action a pending mutation represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    MarkRead { id: Uuid },
    MarkAllRead,
    Delete { id: Uuid },
}

/// State captured at optimistic-apply time: exactly what `revert` needs to
/// undo the mutation if the server rejects it.
#[derive(Debug, Clone)]
pub(crate) enum PriorState {
    /// Whether the target existed and was unread when marked.
    MarkRead { was_unread: bool },
    /// The removed item and its list position, if it was held.
    Delete { removed: Option<(usize, StoredItem)> },
    /// Ids flipped to read, plus the counters to restore.
    MarkAll {
        flipped: Vec<Uuid>,
        prior_count: u32,
        prior_unknown: u32,
    },
}

/// One optimistic mutation awaiting server confirmation.
///
/// Created when the action dispatcher issues the request, removed on
/// confirm, undone on revert.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    pub id: MutationId,
    pub kind: MutationKind,
    pub applied_at: DateTime<Utc>,
    /// Counter adjustment this mutation applied locally. Snapshot counts
    /// are offset by the sum of these until the server confirms, so a
    /// snapshot racing the round trip never visually undoes the action.
    pub counter_delta: i64,
    pub(crate) prior: PriorState,
}
