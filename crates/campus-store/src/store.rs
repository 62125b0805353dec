use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use campus_types::api::ItemPage;
use campus_types::models::{Item, UnreadDomain, UnreadView};

use crate::pending::{MutationId, MutationKind, PendingMutation, PriorState};

/// How an item entered the store. Dedup bookkeeping only; never exposed
/// outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOrigin {
    Snapshot,
    Push,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredItem {
    pub(crate) item: Item,
    pub(crate) origin: ItemOrigin,
}

/// Single source of truth for one unread domain.
///
/// Merges three producers (authoritative snapshot pages, live push events,
/// and optimistic local mutations) into one consistent item list and
/// counter. Continuous invariant:
///
/// ```text
/// unread_count == count(held items with is_read == false) + unknown_unread
/// ```
///
/// `unknown_unread` covers unread items the client has never paged in (the
/// tail beyond the loaded window); it exists so mark-all-read can affect
/// items the client is not holding without the badge drifting.
///
/// The store is purely synchronous. Callers are responsible for serializing
/// every mutating call through one execution context.
pub struct UnreadStore {
    domain: UnreadDomain,
    /// Held items, newest first. Push inserts go to the head; snapshot
    /// order wins on the next full refresh.
    items: Vec<StoredItem>,
    unread_count: u32,
    unknown_unread: u32,
    pending: Vec<PendingMutation>,
    has_more: bool,
    stale: bool,
    /// Compact "recent" window size; `None` keeps every loaded item.
    recent_limit: Option<usize>,
}

impl UnreadStore {
    pub fn new(domain: UnreadDomain) -> Self {
        Self {
            domain,
            items: Vec::new(),
            unread_count: 0,
            unknown_unread: 0,
            pending: Vec::new(),
            has_more: false,
            stale: false,
            recent_limit: None,
        }
    }

    /// A store whose held window is truncated to `limit` items, for the
    /// compact badge-dropdown view. Unread items truncated off the tail keep
    /// counting through `unknown_unread`.
    pub fn with_recent_limit(domain: UnreadDomain, limit: usize) -> Self {
        Self {
            recent_limit: Some(limit),
            ..Self::new(domain)
        }
    }

    pub fn domain(&self) -> UnreadDomain {
        self.domain
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flag the held data as possibly outdated after a failed snapshot
    /// fetch. Cleared by the next applied snapshot.
    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Current projection for the presentation layer.
    pub fn view(&self) -> UnreadView {
        UnreadView {
            items: self.items.iter().map(|s| s.item.clone()).collect(),
            unread_count: self.unread_count,
            has_more: self.has_more,
            stale: self.stale,
        }
    }

    // -- Snapshot input --

    /// Merge an authoritative page. Page 1 replaces the held set (canonical
    /// server order wins over push-applied local ordering); later pages
    /// append with id-dedup.
    ///
    /// After installing the page, the item-level effect of every pending
    /// mutation is re-applied so a snapshot racing an in-flight action never
    /// visually undoes it, and the counter is recomputed from the
    /// authoritative count offset by the pending deltas. Applying the same
    /// page twice yields the same state.
    pub fn apply_snapshot(&mut self, page_number: u32, page: &ItemPage) {
        if page_number <= 1 {
            self.items.clear();
        }
        for item in &page.items {
            let stored = StoredItem {
                item: item.clone(),
                origin: ItemOrigin::Snapshot,
            };
            match self.find(item.id) {
                // Same entity already held (earlier page or push): the
                // snapshot copy is authoritative.
                Some(idx) => self.items[idx] = stored,
                None => self.items.push(stored),
            }
        }
        self.has_more = page.has_more;

        self.reapply_pending_effects();
        self.recount(page.unread_count);
        self.stale = false;
        self.truncate_recent();
    }

    /// Merge a count-only badge fetch. Items are untouched; the counter is
    /// recomputed from the authoritative count offset by pending deltas.
    pub fn apply_count(&mut self, authoritative: u32) {
        self.recount(authoritative);
    }

    /// Recompute `unread_count` and `unknown_unread` from an authoritative
    /// total, preserving the invariant. The counter never drops below what
    /// is visibly unread in the held window.
    fn recount(&mut self, authoritative: u32) {
        let delta_sum: i64 = self.pending.iter().map(|p| p.counter_delta).sum();
        let adjusted = (i64::from(authoritative) + delta_sum).max(0);
        let visible = i64::from(self.visible_unread());
        self.unknown_unread = (adjusted - visible).max(0) as u32;
        self.unread_count = self.visible_unread() + self.unknown_unread;
    }

    /// Re-apply the per-item effect of every pending mutation, in issue
    /// order, over freshly installed snapshot data.
    fn reapply_pending_effects(&mut self) {
        let pending: Vec<(MutationKind, DateTime<Utc>)> = self
            .pending
            .iter()
            .map(|p| (p.kind.clone(), p.applied_at))
            .collect();
        for (kind, applied_at) in pending {
            match kind {
                MutationKind::MarkRead { id } => {
                    if let Some(idx) = self.find(id) {
                        self.items[idx].item.is_read = true;
                    }
                }
                MutationKind::Delete { id } => {
                    if let Some(idx) = self.find(id) {
                        self.items.remove(idx);
                    }
                }
                MutationKind::MarkAllRead => {
                    for stored in &mut self.items {
                        if stored.item.created_at <= applied_at {
                            stored.item.is_read = true;
                        }
                    }
                }
            }
        }
    }

    // -- Push input --

    /// `item_created`: insert at head unless the id is already held (the
    /// same creation may arrive once via push and once via the next
    /// snapshot). Counts the item only if it lands unread.
    pub fn apply_created(&mut self, item: Item) {
        if self.find(item.id).is_some() {
            debug!(domain = ?self.domain, id = %item.id, "duplicate create dropped");
            return;
        }
        let mut item = item;
        if !item.is_read && self.pinned_read(&item) {
            // Covered by an in-flight mark-read/mark-all; arrives already
            // handled from the user's point of view.
            item.is_read = true;
        }
        if !item.is_read {
            self.unread_count += 1;
        }
        self.items.insert(
            0,
            StoredItem {
                item,
                origin: ItemOrigin::Push,
            },
        );
        self.truncate_recent();
    }

    /// `item_updated`: replace the held copy by id and adjust the counter by
    /// the read-state delta. Read items never re-open client-side; an update
    /// claiming otherwise keeps the item read. Updates for ids not held are
    /// dropped; the next snapshot reconciles.
    pub fn apply_updated(&mut self, item: Item) {
        let Some(idx) = self.find(item.id) else {
            debug!(domain = ?self.domain, id = %item.id, "update for unheld item dropped");
            return;
        };
        let was_read = self.items[idx].item.is_read;
        let mut incoming = item;
        if !incoming.is_read && (was_read || self.pinned_read(&incoming)) {
            if was_read {
                debug!(domain = ?self.domain, id = %incoming.id, "ignoring re-open of read item");
            }
            incoming.is_read = true;
        }
        if !was_read && incoming.is_read {
            self.decrement_counter(1);
        }
        self.items[idx].item = incoming;
    }

    /// `item_deleted`: remove by id; decrement the counter if the removed
    /// item was unread. Deletes for ids not held are dropped.
    pub fn apply_deleted(&mut self, id: Uuid) {
        let Some(idx) = self.find(id) else {
            debug!(domain = ?self.domain, %id, "delete for unheld item dropped");
            return;
        };
        let removed = self.items.remove(idx);
        if !removed.item.is_read {
            self.decrement_counter(1);
        }
    }

    // -- Local mutations --

    /// Apply an optimistic mutation synchronously and record it as pending.
    /// Returns the id to later `confirm` or `revert` with.
    pub fn apply_local(&mut self, kind: MutationKind) -> MutationId {
        let id = Uuid::new_v4();
        let applied_at = Utc::now();
        let (counter_delta, prior) = match &kind {
            MutationKind::MarkRead { id: target } => match self.find(*target) {
                Some(idx) if !self.items[idx].item.is_read => {
                    self.items[idx].item.is_read = true;
                    self.decrement_counter(1);
                    (-1, PriorState::MarkRead { was_unread: true })
                }
                _ => (0, PriorState::MarkRead { was_unread: false }),
            },
            MutationKind::Delete { id: target } => match self.find(*target) {
                Some(idx) => {
                    let removed = self.items.remove(idx);
                    let delta = if removed.item.is_read {
                        0
                    } else {
                        self.decrement_counter(1);
                        -1
                    };
                    (
                        delta,
                        PriorState::Delete {
                            removed: Some((idx, removed)),
                        },
                    )
                }
                None => (0, PriorState::Delete { removed: None }),
            },
            MutationKind::MarkAllRead => {
                let prior_count = self.unread_count;
                let prior_unknown = self.unknown_unread;
                let mut flipped = Vec::new();
                for stored in &mut self.items {
                    // Items created after this instant stay unread; the
                    // action only covers what existed when the user took it.
                    if !stored.item.is_read && stored.item.created_at <= applied_at {
                        stored.item.is_read = true;
                        flipped.push(stored.item.id);
                    }
                }
                self.unknown_unread = 0;
                self.unread_count = self.visible_unread();
                (
                    -i64::from(prior_count),
                    PriorState::MarkAll {
                        flipped,
                        prior_count,
                        prior_unknown,
                    },
                )
            }
        };
        self.pending.push(PendingMutation {
            id,
            kind,
            applied_at,
            counter_delta,
            prior,
        });
        id
    }

    /// The server accepted the mutation; its effect is already reflected
    /// locally, so only the pending record is dropped. Returns false if the
    /// id is unknown.
    pub fn confirm(&mut self, mutation: MutationId) -> bool {
        let Some(pos) = self.pending.iter().position(|p| p.id == mutation) else {
            debug!(domain = ?self.domain, %mutation, "confirm for unknown mutation");
            return false;
        };
        self.pending.remove(pos);
        true
    }

    /// The server rejected the mutation; restore the prior item state and
    /// counter. Targets that vanished in the interim (e.g. a push delete
    /// during the round trip) are skipped and the next snapshot is trusted.
    pub fn revert(&mut self, mutation: MutationId) -> bool {
        let Some(pos) = self.pending.iter().position(|p| p.id == mutation) else {
            debug!(domain = ?self.domain, %mutation, "revert for unknown mutation");
            return false;
        };
        let pending = self.pending.remove(pos);
        match pending.prior {
            PriorState::MarkRead { was_unread } => {
                let MutationKind::MarkRead { id } = pending.kind else {
                    return true;
                };
                if !was_unread {
                    return true;
                }
                match self.find(id) {
                    Some(idx) if self.items[idx].item.is_read => {
                        self.items[idx].item.is_read = false;
                        self.unread_count += 1;
                    }
                    Some(_) => {}
                    None => {
                        debug!(domain = ?self.domain, %id, "mark-read target gone, revert skipped");
                    }
                }
            }
            PriorState::Delete { removed } => {
                if let Some((idx, stored)) = removed {
                    if self.find(stored.item.id).is_none() {
                        let unread = !stored.item.is_read;
                        let idx = idx.min(self.items.len());
                        self.items.insert(idx, stored);
                        if unread {
                            self.unread_count += 1;
                        }
                    }
                }
            }
            PriorState::MarkAll {
                flipped,
                prior_count,
                prior_unknown,
            } => {
                for id in flipped {
                    if let Some(idx) = self.find(id) {
                        self.items[idx].item.is_read = false;
                    }
                }
                // Pushes may have landed during the round trip; derive the
                // counter from the invariant, not from prior_count.
                self.unknown_unread = prior_unknown;
                self.unread_count = self.visible_unread() + self.unknown_unread;
                debug!(
                    domain = ?self.domain,
                    prior_count, restored = self.unread_count, "mark-all reverted"
                );
            }
        }
        true
    }

    // -- Internals --

    fn find(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|s| s.item.id == id)
    }

    fn visible_unread(&self) -> u32 {
        self.items.iter().filter(|s| !s.item.is_read).count() as u32
    }

    /// Whether an incoming item is already covered by an in-flight
    /// mark-read or mark-all and must land read.
    fn pinned_read(&self, item: &Item) -> bool {
        self.pending.iter().any(|p| match &p.kind {
            MutationKind::MarkRead { id } => *id == item.id,
            MutationKind::MarkAllRead => item.created_at <= p.applied_at,
            MutationKind::Delete { .. } => false,
        })
    }

    fn decrement_counter(&mut self, by: u32) {
        if self.unread_count < by {
            warn!(domain = ?self.domain, "unread counter underflow clamped to zero");
            self.unread_count = 0;
        } else {
            self.unread_count -= by;
        }
    }

    fn truncate_recent(&mut self) {
        let Some(limit) = self.recent_limit else {
            return;
        };
        while self.items.len() > limit {
            if let Some(dropped) = self.items.pop() {
                if !dropped.item.is_read {
                    // Still unread, just no longer held; keep it on the badge.
                    self.unknown_unread += 1;
                }
                self.has_more = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_types::api::ItemPage;
    use campus_types::models::ItemKind;
    use chrono::Duration;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn item(n: u128, read: bool, age_secs: i64) -> Item {
        Item {
            id: id(n),
            kind: ItemKind::Message,
            is_read: read,
            created_at: Utc::now() - Duration::seconds(age_secs),
            payload: serde_json::Value::Null,
        }
    }

    fn page(items: Vec<Item>, unread_count: u32, has_more: bool) -> ItemPage {
        ItemPage {
            items,
            unread_count,
            has_more,
        }
    }

    fn store() -> UnreadStore {
        UnreadStore::new(UnreadDomain::Notifications)
    }

    #[test]
    fn snapshot_apply_is_idempotent() {
        let mut s = store();
        let p = page(vec![item(1, false, 30), item(2, true, 60)], 4, true);
        s.apply_snapshot(1, &p);
        let first = s.view();
        s.apply_snapshot(1, &p);
        assert_eq!(s.view(), first);
        assert_eq!(s.unread_count(), 4);
        assert!(s.has_more());
    }

    #[test]
    fn snapshot_pages_append_with_dedup() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10), item(2, true, 20)], 3, true));
        s.apply_snapshot(2, &page(vec![item(2, true, 20), item(3, false, 30)], 3, false));
        let v = s.view();
        assert_eq!(v.items.len(), 3);
        assert_eq!(v.unread_count, 3);
        assert!(!v.has_more);
    }

    #[test]
    fn created_push_after_snapshot_is_deduped() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        s.apply_created(item(1, false, 10));
        assert_eq!(s.view().items.len(), 1);
        assert_eq!(s.unread_count(), 1);
    }

    #[test]
    fn created_push_inserts_at_head_and_counts_unread() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, true, 60)], 0, false));
        s.apply_created(item(2, false, 0));
        let v = s.view();
        assert_eq!(v.items[0].id, id(2));
        assert_eq!(v.unread_count, 1);
    }

    #[test]
    fn deleted_push_decrements_for_unread_only() {
        // unreadCount=3, items [A(unread), B(unread), C(read)]; one more
        // unread lives beyond the page.
        let mut s = store();
        s.apply_snapshot(
            1,
            &page(
                vec![item(1, false, 10), item(2, false, 20), item(3, true, 30)],
                3,
                true,
            ),
        );
        s.apply_deleted(id(2));
        let v = s.view();
        assert_eq!(v.unread_count, 2);
        assert_eq!(
            v.items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![id(1), id(3)]
        );

        // Deleting the read item leaves the counter alone.
        s.apply_deleted(id(3));
        assert_eq!(s.unread_count(), 2);
    }

    #[test]
    fn counter_never_negative_under_hostile_interleaving() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        // Duplicate deletes, deletes of unknowns, repeated read transitions.
        s.apply_deleted(id(1));
        s.apply_deleted(id(1));
        s.apply_deleted(id(99));
        s.apply_updated(item(42, true, 5));
        assert_eq!(s.unread_count(), 0);

        s.apply_created(item(2, false, 0));
        s.apply_updated(item(2, true, 0));
        s.apply_updated(item(2, true, 0));
        assert_eq!(s.unread_count(), 0);
    }

    #[test]
    fn update_push_never_reopens_read_item() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, true, 10)], 0, false));
        s.apply_updated(item(1, false, 10));
        let v = s.view();
        assert!(v.items[0].is_read);
        assert_eq!(v.unread_count, 0);
    }

    #[test]
    fn mark_read_is_immediate_and_exact() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10), item(2, false, 20)], 2, false));
        s.apply_local(MutationKind::MarkRead { id: id(1) });
        let v = s.view();
        assert!(v.items[0].is_read);
        assert_eq!(v.unread_count, 1);

        // Marking an already-read item changes nothing.
        s.apply_local(MutationKind::MarkRead { id: id(1) });
        assert_eq!(s.unread_count(), 1);
    }

    #[test]
    fn rejected_mark_read_reverts_item_and_counter() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        let m = s.apply_local(MutationKind::MarkRead { id: id(1) });
        assert_eq!(s.unread_count(), 0);
        assert!(s.revert(m));
        let v = s.view();
        assert!(!v.items[0].is_read);
        assert_eq!(v.unread_count, 1);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn rejected_delete_restores_item_at_position() {
        let mut s = store();
        s.apply_snapshot(
            1,
            &page(vec![item(1, true, 10), item(2, false, 20), item(3, true, 30)], 1, false),
        );
        let m = s.apply_local(MutationKind::Delete { id: id(2) });
        assert_eq!(s.view().items.len(), 2);
        assert_eq!(s.unread_count(), 0);
        s.revert(m);
        let v = s.view();
        assert_eq!(
            v.items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![id(1), id(2), id(3)]
        );
        assert_eq!(v.unread_count, 1);
    }

    #[test]
    fn revert_after_push_delete_skips_restore() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        let m = s.apply_local(MutationKind::MarkRead { id: id(1) });
        s.apply_deleted(id(1));
        assert_eq!(s.unread_count(), 0);
        s.revert(m);
        // Nothing to restore; counter must not resurrect a phantom unread.
        assert_eq!(s.unread_count(), 0);
        assert!(s.view().items.is_empty());
    }

    #[test]
    fn mark_all_read_covers_unloaded_tail() {
        // 2 loaded, 5 more unread beyond the page, server count 7.
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10), item(2, false, 20)], 7, true));
        assert_eq!(s.unread_count(), 7);

        s.apply_local(MutationKind::MarkAllRead);
        assert_eq!(s.unread_count(), 0);
        assert!(s.view().items.iter().all(|i| i.is_read));

        // A later snapshot reporting 0 must not double-decrement.
        s.apply_snapshot(1, &page(vec![item(1, true, 10), item(2, true, 20)], 0, false));
        assert_eq!(s.unread_count(), 0);
    }

    #[test]
    fn snapshot_racing_pending_mark_all_stays_at_zero() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10), item(2, false, 20)], 7, true));
        s.apply_local(MutationKind::MarkAllRead);

        // Snapshot fetched before the server processed the mark-all: still
        // reports 7 unread and unread page items.
        s.apply_snapshot(1, &page(vec![item(1, false, 10), item(2, false, 20)], 7, true));
        let v = s.view();
        assert_eq!(v.unread_count, 0);
        assert!(v.items.iter().all(|i| i.is_read));
    }

    #[test]
    fn created_during_pending_mark_all_stays_unread() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 30)], 1, false));
        s.apply_local(MutationKind::MarkAllRead);
        assert_eq!(s.unread_count(), 0);

        // A genuinely new item arrives over push during the round trip.
        let fresh = Item {
            created_at: Utc::now() + Duration::seconds(5),
            ..item(2, false, 0)
        };
        s.apply_created(fresh);
        assert_eq!(s.unread_count(), 1);
        assert!(!s.view().items[0].is_read);
    }

    #[test]
    fn late_push_of_old_item_is_covered_by_pending_mark_all() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 30)], 2, true));
        s.apply_local(MutationKind::MarkAllRead);

        // This item existed before the mark-all (old created_at) but only
        // now arrives over push.
        s.apply_created(item(2, false, 120));
        assert_eq!(s.unread_count(), 0);
        assert!(s.view().items[0].is_read);
    }

    #[test]
    fn rejected_mark_all_restores_counts() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10), item(2, true, 20)], 4, true));
        let m = s.apply_local(MutationKind::MarkAllRead);
        assert_eq!(s.unread_count(), 0);
        s.revert(m);
        let v = s.view();
        assert_eq!(v.unread_count, 4);
        assert!(!v.items[0].is_read);
        assert!(v.items[1].is_read);
    }

    #[test]
    fn snapshot_racing_pending_mark_read_keeps_item_read() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        let _m = s.apply_local(MutationKind::MarkRead { id: id(1) });

        // In-flight snapshot still shows the item unread.
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        let v = s.view();
        assert!(v.items[0].is_read);
        assert_eq!(v.unread_count, 0);
    }

    #[test]
    fn confirm_drops_pending_and_later_snapshots_use_raw_count() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        let m = s.apply_local(MutationKind::MarkRead { id: id(1) });
        assert!(s.confirm(m));
        assert_eq!(s.pending_len(), 0);

        // Server has processed the mutation; its count stands as-is.
        s.apply_snapshot(1, &page(vec![item(1, true, 10)], 0, false));
        assert_eq!(s.unread_count(), 0);
        assert!(!s.confirm(m));
    }

    #[test]
    fn count_only_fetch_adjusts_for_pending() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 3, true));
        s.apply_local(MutationKind::MarkRead { id: id(1) });
        assert_eq!(s.unread_count(), 2);

        // Badge fetch raced the mutation server-side.
        s.apply_count(3);
        assert_eq!(s.unread_count(), 2);

        // New unread appeared upstream.
        s.apply_count(5);
        assert_eq!(s.unread_count(), 4);
    }

    #[test]
    fn recent_window_truncation_keeps_badge_accurate() {
        let mut s = UnreadStore::with_recent_limit(UnreadDomain::Notifications, 2);
        s.apply_snapshot(1, &page(vec![item(1, false, 30), item(2, false, 40)], 2, false));
        assert_eq!(s.unread_count(), 2);

        // A third unread arrives; the oldest unread falls off the window.
        s.apply_created(item(3, false, 0));
        let v = s.view();
        assert_eq!(v.items.len(), 2);
        assert_eq!(v.unread_count, 3);
        assert!(v.has_more);
    }

    #[test]
    fn failed_fetch_marks_view_stale_until_next_snapshot() {
        let mut s = store();
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        s.mark_stale();
        assert!(s.view().stale);
        s.apply_snapshot(1, &page(vec![item(1, false, 10)], 1, false));
        assert!(!s.view().stale);
    }
}
