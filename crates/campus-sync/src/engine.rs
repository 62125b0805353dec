use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use campus_gateway::GatewayMessage;
use campus_store::{MutationId, MutationKind, UnreadStore};
use campus_types::api::{ItemPage, ListFilter};
use campus_types::events::{PushEvent, PushEventKind};
use campus_types::models::{UnreadDomain, UnreadView};

use crate::SyncError;
use crate::backend::{ActionSink, SnapshotSource};

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub domains: Vec<UnreadDomain>,
    pub page_size: u32,
    /// Bound on the held item window, for the compact badge-dropdown view.
    pub recent_limit: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            domains: UnreadDomain::ALL.to_vec(),
            page_size: 20,
            recent_limit: None,
        }
    }
}

/// Store mutations, serialized through the loop task. Producers (gateway
/// pump, snapshot fetches, actions) only ever enqueue; nothing touches a
/// store from outside the loop.
enum Command {
    Snapshot {
        domain: UnreadDomain,
        generation: u64,
        page_number: u32,
        page: ItemPage,
    },
    SnapshotFailed {
        domain: UnreadDomain,
    },
    Count {
        domain: UnreadDomain,
        count: u32,
    },
    Push(PushEvent),
    ApplyLocal {
        domain: UnreadDomain,
        kind: MutationKind,
        reply: oneshot::Sender<MutationId>,
    },
    Confirm {
        domain: UnreadDomain,
        mutation: MutationId,
    },
    Revert {
        domain: UnreadDomain,
        mutation: MutationId,
    },
    BeginRefresh {
        domain: UnreadDomain,
        filter: Option<ListFilter>,
        reply: oneshot::Sender<(u64, ListFilter)>,
    },
    NextPage {
        domain: UnreadDomain,
        reply: oneshot::Sender<Option<(u64, u32, ListFilter)>>,
    },
}

struct DomainState {
    store: UnreadStore,
    view_tx: watch::Sender<UnreadView>,
    /// Snapshot request generation. Bumped by every refresh/filter change;
    /// pages tagged with an older generation are discarded on arrival.
    generation: u64,
    filter: ListFilter,
    loaded_pages: u32,
}

impl DomainState {
    fn publish(&self) {
        let _ = self.view_tx.send(self.store.view());
    }
}

type ActionLocks = Arc<Mutex<HashMap<(UnreadDomain, Uuid), Arc<tokio::sync::Mutex<()>>>>>;

/// Handle to one session's unread-state engine.
///
/// Cheap to clone. All store access is serialized through a single loop
/// task; the handle's methods suspend only their own caller; push events
/// keep applying while a fetch or mutation request is outstanding.
#[derive(Clone)]
pub struct SyncEngine {
    cmd_tx: mpsc::UnboundedSender<Command>,
    views: HashMap<UnreadDomain, watch::Receiver<UnreadView>>,
    snapshots: Arc<dyn SnapshotSource>,
    actions: Arc<dyn ActionSink>,
    page_size: u32,
    /// Per-target mutation locks: two actions on the same item serialize,
    /// actions on disjoint items run independently. Entries live for the
    /// session; the key space is bounded by the held item window.
    action_locks: ActionLocks,
}

impl SyncEngine {
    /// Spawn the store loop and the gateway pump. The engine runs until
    /// every handle is dropped.
    pub fn spawn(
        config: SyncConfig,
        snapshots: Arc<dyn SnapshotSource>,
        actions: Arc<dyn ActionSink>,
        gateway: mpsc::UnboundedReceiver<GatewayMessage>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let mut states = HashMap::new();
        let mut views = HashMap::new();
        for &domain in &config.domains {
            let store = match config.recent_limit {
                Some(limit) => UnreadStore::with_recent_limit(domain, limit),
                None => UnreadStore::new(domain),
            };
            let (view_tx, view_rx) = watch::channel(store.view());
            states.insert(
                domain,
                DomainState {
                    store,
                    view_tx,
                    generation: 0,
                    filter: ListFilter::default(),
                    loaded_pages: 0,
                },
            );
            views.insert(domain, view_rx);
        }
        tokio::spawn(run_loop(cmd_rx, states));

        let engine = Self {
            cmd_tx,
            views,
            snapshots,
            actions,
            page_size: config.page_size,
            action_locks: Arc::new(Mutex::new(HashMap::new())),
        };
        engine.spawn_gateway_pump(gateway);
        engine
    }

    pub fn domains(&self) -> Vec<UnreadDomain> {
        self.views.keys().copied().collect()
    }

    /// Subscribe to a domain's view. The receiver always holds a consistent
    /// projection; `changed()` wakes on every applied mutation.
    pub fn watch(&self, domain: UnreadDomain) -> Option<watch::Receiver<UnreadView>> {
        self.views.get(&domain).cloned()
    }

    /// Current projection of a domain.
    pub fn view(&self, domain: UnreadDomain) -> Option<UnreadView> {
        self.views.get(&domain).map(|rx| rx.borrow().clone())
    }

    // -- Snapshot glue --

    /// Fetch page 1 under a fresh generation and apply it. Any in-flight
    /// page from an older generation is discarded on arrival. On failure the
    /// view is flagged stale and the error returned; retrying is the
    /// caller's call.
    pub async fn refresh(&self, domain: UnreadDomain) -> Result<(), SyncError> {
        self.refresh_with(domain, None).await
    }

    /// Replace the domain's list filter and refresh under it.
    pub async fn set_filter(&self, domain: UnreadDomain, filter: ListFilter) -> Result<(), SyncError> {
        self.refresh_with(domain, Some(filter)).await
    }

    async fn refresh_with(
        &self,
        domain: UnreadDomain,
        filter: Option<ListFilter>,
    ) -> Result<(), SyncError> {
        self.ensure_domain(domain)?;
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::BeginRefresh { domain, filter, reply })
            .map_err(|_| SyncError::Stopped)?;
        let (generation, filter) = rx.await.map_err(|_| SyncError::Stopped)?;

        match self
            .snapshots
            .fetch_page(domain, 1, self.page_size, &filter)
            .await
        {
            Ok(page) => {
                let _ = self.cmd_tx.send(Command::Snapshot {
                    domain,
                    generation,
                    page_number: 1,
                    page,
                });
                Ok(())
            }
            Err(e) => {
                let _ = self.cmd_tx.send(Command::SnapshotFailed { domain });
                Err(SyncError::Api(e))
            }
        }
    }

    /// Fetch and apply the next page under the current generation. Returns
    /// false when there is nothing more to load.
    pub async fn load_more(&self, domain: UnreadDomain) -> Result<bool, SyncError> {
        self.ensure_domain(domain)?;
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::NextPage { domain, reply })
            .map_err(|_| SyncError::Stopped)?;
        let Some((generation, page_number, filter)) = rx.await.map_err(|_| SyncError::Stopped)?
        else {
            return Ok(false);
        };

        match self
            .snapshots
            .fetch_page(domain, page_number, self.page_size, &filter)
            .await
        {
            Ok(page) => {
                let _ = self.cmd_tx.send(Command::Snapshot {
                    domain,
                    generation,
                    page_number,
                    page,
                });
                Ok(true)
            }
            Err(e) => {
                let _ = self.cmd_tx.send(Command::SnapshotFailed { domain });
                Err(SyncError::Api(e))
            }
        }
    }

    /// Lightweight badge path: fetch the count only and fold it in.
    pub async fn refresh_unread_count(&self, domain: UnreadDomain) -> Result<(), SyncError> {
        self.ensure_domain(domain)?;
        let count = self.snapshots.fetch_unread_count(domain).await?;
        self.cmd_tx
            .send(Command::Count { domain, count })
            .map_err(|_| SyncError::Stopped)?;
        Ok(())
    }

    // -- Actions --

    /// Mark one item read: optimistic effect immediately, then the request;
    /// rolled back if the server rejects it.
    pub async fn mark_read(&self, domain: UnreadDomain, id: Uuid) -> Result<(), SyncError> {
        self.ensure_domain(domain)?;
        let _guard = self.action_lock(domain, id).await;
        let mutation = self.apply_local(domain, MutationKind::MarkRead { id }).await?;
        self.settle(domain, mutation, self.actions.mark_read(domain, id).await)
    }

    /// Mark every item in the domain read, including items beyond the
    /// loaded window.
    pub async fn mark_all_read(&self, domain: UnreadDomain) -> Result<(), SyncError> {
        self.ensure_domain(domain)?;
        let mutation = self.apply_local(domain, MutationKind::MarkAllRead).await?;
        self.settle(domain, mutation, self.actions.mark_all_read(domain).await)
    }

    /// Delete one item.
    pub async fn delete(&self, domain: UnreadDomain, id: Uuid) -> Result<(), SyncError> {
        self.ensure_domain(domain)?;
        let _guard = self.action_lock(domain, id).await;
        let mutation = self.apply_local(domain, MutationKind::Delete { id }).await?;
        self.settle(domain, mutation, self.actions.delete_item(domain, id).await)
    }

    fn settle(
        &self,
        domain: UnreadDomain,
        mutation: MutationId,
        result: Result<(), campus_api::ApiError>,
    ) -> Result<(), SyncError> {
        match result {
            Ok(()) => {
                let _ = self.cmd_tx.send(Command::Confirm { domain, mutation });
                Ok(())
            }
            Err(e) => {
                let _ = self.cmd_tx.send(Command::Revert { domain, mutation });
                Err(SyncError::Api(e))
            }
        }
    }

    async fn apply_local(
        &self,
        domain: UnreadDomain,
        kind: MutationKind,
    ) -> Result<MutationId, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ApplyLocal { domain, kind, reply })
            .map_err(|_| SyncError::Stopped)?;
        rx.await.map_err(|_| SyncError::Stopped)
    }

    async fn action_lock(
        &self,
        domain: UnreadDomain,
        id: Uuid,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let cell = {
            let mut locks = self.action_locks.lock().expect("action lock map poisoned");
            locks
                .entry((domain, id))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        cell.lock_owned().await
    }

    fn ensure_domain(&self, domain: UnreadDomain) -> Result<(), SyncError> {
        if self.views.contains_key(&domain) {
            Ok(())
        } else {
            Err(SyncError::UnknownDomain(domain))
        }
    }

    // -- Gateway pump --

    fn spawn_gateway_pump(&self, mut gateway: mpsc::UnboundedReceiver<GatewayMessage>) {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Some(msg) = gateway.recv().await {
                match msg {
                    GatewayMessage::Event(event) => {
                        if engine.cmd_tx.send(Command::Push(event)).is_err() {
                            return;
                        }
                    }
                    GatewayMessage::Connected { reconnect: true } => {
                        // The gateway has no replay; one refresh per domain
                        // recovers whatever was missed while disconnected.
                        // Fetches run off the pump so events keep flowing
                        // while they are in flight.
                        info!("gateway reconnected, refreshing snapshots");
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            for domain in engine.domains() {
                                if let Err(e) = engine.refresh(domain).await {
                                    warn!("post-reconnect refresh failed for {:?}: {}", domain, e);
                                }
                            }
                        });
                    }
                    GatewayMessage::Connected { reconnect: false } => {}
                    GatewayMessage::Disconnected => {
                        debug!("gateway disconnected, awaiting reconnect");
                    }
                }
            }
        });
    }
}

async fn run_loop(
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut states: HashMap<UnreadDomain, DomainState>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            Command::Snapshot {
                domain,
                generation,
                page_number,
                page,
            } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                if generation != state.generation {
                    debug!(
                        ?domain,
                        generation, current = state.generation, "discarding superseded snapshot"
                    );
                    continue;
                }
                state.store.apply_snapshot(page_number, &page);
                state.loaded_pages = state.loaded_pages.max(page_number);
                state.publish();
            }
            Command::SnapshotFailed { domain } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                state.store.mark_stale();
                state.publish();
            }
            Command::Count { domain, count } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                state.store.apply_count(count);
                state.publish();
            }
            Command::Push(event) => {
                let Some(domain) = UnreadDomain::from_entity_type(&event.entity_type) else {
                    debug!(entity_type = %event.entity_type, "push event for unknown entity type dropped");
                    continue;
                };
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                apply_push(state, event);
                state.publish();
            }
            Command::ApplyLocal { domain, kind, reply } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                let mutation = state.store.apply_local(kind);
                state.publish();
                let _ = reply.send(mutation);
            }
            Command::Confirm { domain, mutation } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                // Already reflected locally; no view change.
                state.store.confirm(mutation);
            }
            Command::Revert { domain, mutation } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                state.store.revert(mutation);
                state.publish();
            }
            Command::BeginRefresh { domain, filter, reply } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                state.generation += 1;
                if let Some(filter) = filter {
                    state.filter = filter;
                }
                state.loaded_pages = 0;
                let _ = reply.send((state.generation, state.filter.clone()));
            }
            Command::NextPage { domain, reply } => {
                let Some(state) = states.get_mut(&domain) else {
                    continue;
                };
                let more = state.loaded_pages == 0 || state.store.has_more();
                let next = more.then(|| {
                    (
                        state.generation,
                        state.loaded_pages + 1,
                        state.filter.clone(),
                    )
                });
                let _ = reply.send(next);
            }
        }
    }
}

/// Route one push event into a domain store. Undecodable payloads are
/// dropped with a log line; nothing that arrives over the wire can take the
/// loop down.
fn apply_push(state: &mut DomainState, event: PushEvent) {
    match event.kind {
        PushEventKind::Created | PushEventKind::Updated => match event.item() {
            Some(item) if item.id == event.entity_id => {
                if event.kind == PushEventKind::Created {
                    state.store.apply_created(item);
                } else {
                    state.store.apply_updated(item);
                }
            }
            Some(item) => {
                warn!(
                    entity_id = %event.entity_id, payload_id = %item.id,
                    "push event id mismatch, dropped"
                );
            }
            None => {
                warn!(entity_id = %event.entity_id, "push event payload undecodable, dropped");
            }
        },
        PushEventKind::Deleted => state.store.apply_deleted(event.entity_id),
    }
}
