// Notification store: the reconciliation core
// Holds the inbox, the unread counter and the push connection flag. Local mutators apply
// immediately; backend-synchronized mutators apply their local step first and then talk
// to the gateway / push channel without ever rolling the local step back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;

use crate::backends::PushEvent;
use crate::components::{
    NewNotification, Notification, NotificationError, NotificationGateway, NotificationId,
    NotificationKind, NotificationResult, Principal, PrincipalProvider, PushCommands,
};

/// Observable state of the store
///
/// `unread_count` always equals the number of entries with `is_read == false`;
/// both are only ever changed together inside one watch modification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Newest first
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub is_connected: bool,
}

impl StoreSnapshot {
    pub fn total(&self) -> usize {
        self.notifications.len()
    }

    fn count_unread(notifications: &[Notification]) -> usize {
        notifications.iter().filter(|n| !n.is_read).count()
    }
}

/// What happened to a backend load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The collection was replaced with this many entries
    Applied { count: usize },
    /// A later load was issued before this one returned; its result was discarded
    Superseded,
}

struct StoreInner {
    state: watch::Sender<StoreSnapshot>,
    gateway: Arc<dyn NotificationGateway>,
    push: Arc<dyn PushCommands>,
    principals: Arc<dyn PrincipalProvider>,
    /// Sequence number of the most recently issued load
    load_seq: AtomicU64,
}

/// Handle to the notification store
///
/// Cheap to clone; all clones share the same collection. Every mutator reads and
/// writes the collection and the counter in a single synchronous step, and
/// backend-synchronized mutators finish that step before their first await.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<StoreInner>,
}

impl NotificationStore {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        push: Arc<dyn PushCommands>,
        principals: Arc<dyn PrincipalProvider>,
    ) -> Self {
        let (state, _) = watch::channel(StoreSnapshot::default());
        Self {
            inner: Arc::new(StoreInner {
                state,
                gateway,
                push,
                principals,
                load_seq: AtomicU64::new(0),
            }),
        }
    }

    // ---- queries -------------------------------------------------------

    /// Receive every future state change
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.state.borrow().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.state.borrow().unread_count
    }

    pub fn total(&self) -> usize {
        self.inner.state.borrow().total()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected
    }

    pub fn get(&self, id: &NotificationId) -> Option<Notification> {
        self.inner
            .state
            .borrow()
            .notifications
            .iter()
            .find(|n| &n.id == id)
            .cloned()
    }

    /// Unread entries in collection order
    pub fn unread_subset(&self) -> Vec<Notification> {
        self.filtered(|n| !n.is_read)
    }

    /// Read entries in collection order
    pub fn read_subset(&self) -> Vec<Notification> {
        self.filtered(|n| n.is_read)
    }

    pub fn subset_by_type(&self, kind: NotificationKind) -> Vec<Notification> {
        self.filtered(|n| n.kind == kind)
    }

    fn filtered(&self, keep: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        self.inner
            .state
            .borrow()
            .notifications
            .iter()
            .filter(|n| keep(n))
            .cloned()
            .collect()
    }

    // ---- local-only mutators ------------------------------------------

    /// Prepend a new unread notification and return its generated id
    pub fn add(&self, data: NewNotification) -> NotificationId {
        let notification = Notification::from_new(data);
        let id = notification.id.clone();
        self.inner.state.send_modify(|state| {
            state.notifications.insert(0, notification);
            state.unread_count += 1;
        });
        tracing::debug!(%id, "Notification added");
        id
    }

    /// Mark `id` read; no-op when absent or already read
    ///
    /// Returns whether anything changed.
    pub fn mark_read(&self, id: &NotificationId) -> bool {
        self.inner.state.send_if_modified(|state| {
            let mut newly_read = 0;
            for notification in state.notifications.iter_mut().filter(|n| &n.id == id && !n.is_read) {
                notification.is_read = true;
                newly_read += 1;
            }
            state.unread_count -= newly_read;
            newly_read > 0
        })
    }

    pub fn mark_all_read(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.unread_count == 0 {
                return false;
            }
            for notification in &mut state.notifications {
                notification.is_read = true;
            }
            state.unread_count = 0;
            true
        })
    }

    /// Remove `id`; no-op when absent
    pub fn delete_one(&self, id: &NotificationId) -> bool {
        self.inner.state.send_if_modified(|state| {
            let before = state.notifications.len();
            let mut unread_removed = 0;
            state.notifications.retain(|n| {
                let keep = &n.id != id;
                if !keep && !n.is_read {
                    unread_removed += 1;
                }
                keep
            });
            state.unread_count -= unread_removed;
            state.notifications.len() != before
        })
    }

    pub fn clear_all(&self) -> bool {
        self.inner.state.send_if_modified(|state| {
            if state.notifications.is_empty() {
                return false;
            }
            state.notifications.clear();
            state.unread_count = 0;
            true
        })
    }

    /// Replace the whole collection, recounting unread entries from scratch
    pub fn replace_all(&self, entries: Vec<Notification>) {
        self.inner.state.send_modify(|state| {
            state.unread_count = StoreSnapshot::count_unread(&entries);
            state.notifications = entries;
        });
    }

    pub fn set_connection_status(&self, connected: bool) {
        self.inner.state.send_if_modified(|state| {
            let changed = state.is_connected != connected;
            state.is_connected = connected;
            changed
        });
    }

    /// Merge an event from the push channel
    pub fn apply_push_event(&self, event: PushEvent) {
        match event {
            PushEvent::Connected => self.set_connection_status(true),
            PushEvent::Disconnected => self.set_connection_status(false),
            PushEvent::Notification(notification) => self.receive(notification),
        }
    }

    /// Prepend a notification the user did not originate locally
    ///
    /// Honors the incoming read flag. Entries whose id is already present are
    /// inserted again rather than merged.
    pub fn receive(&self, notification: Notification) {
        self.inner.state.send_modify(|state| {
            if !notification.is_read {
                state.unread_count += 1;
            }
            state.notifications.insert(0, notification);
        });
    }

    /// Drop all local state; used on logout
    pub fn reset(&self) {
        // Any load still in flight belongs to the previous session
        self.inner.load_seq.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_modify(|state| *state = StoreSnapshot::default());
    }

    // ---- backend-synchronized mutators --------------------------------

    /// Replace the collection with the backend's view for the current principal
    ///
    /// On failure the collection keeps its prior contents. If another load is
    /// issued while this one is in flight, this one's result is discarded.
    pub async fn load_from_backend(&self) -> NotificationResult<LoadOutcome> {
        let principal = self.require_principal("load_from_backend")?;
        let seq = self.inner.load_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let records = match self.inner.gateway.fetch_all(&principal.id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, seq, "Failed to load notifications from backend");
                return Err(e);
            },
        };
        let entries: Vec<Notification> = records.iter().map(|record| record.to_notification()).collect();
        let count = entries.len();

        let applied = self.inner.state.send_if_modified(|state| {
            if self.inner.load_seq.load(Ordering::SeqCst) != seq {
                return false;
            }
            state.unread_count = StoreSnapshot::count_unread(&entries);
            state.notifications = entries;
            true
        });

        if applied {
            tracing::debug!(seq, count, "Loaded notifications from backend");
            Ok(LoadOutcome::Applied { count })
        } else {
            tracing::debug!(seq, "Discarding superseded notification load");
            Ok(LoadOutcome::Superseded)
        }
    }

    /// Mark read locally and tell the push channel; the push command is the only sync path
    pub fn sync_mark_read(&self, id: &NotificationId) {
        self.mark_read(id);
        self.inner.push.notify_read_command(id);
    }

    /// Delete locally, then on the backend and over the push channel
    ///
    /// A backend failure is returned but the local deletion stands; the entry
    /// may reappear on the next [`load_from_backend`](Self::load_from_backend).
    pub async fn sync_delete_one(&self, id: &NotificationId) -> NotificationResult<()> {
        self.delete_one(id);
        self.inner.push.notify_delete_command(id);

        self.inner
            .gateway
            .delete_one(id.as_str())
            .await
            .inspect_err(|e| tracing::warn!(error = %e, %id, "Failed to delete notification on backend"))
    }

    pub async fn sync_mark_all_read(&self) -> NotificationResult<()> {
        let principal = self.require_principal("sync_mark_all_read")?;
        self.mark_all_read();

        self.inner
            .gateway
            .mark_all_read(&principal.id)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to mark all notifications read on backend"))
    }

    pub async fn sync_clear_all(&self) -> NotificationResult<()> {
        let principal = self.require_principal("sync_clear_all")?;
        self.clear_all();

        self.inner
            .gateway
            .delete_all(&principal.id)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to delete all notifications on backend"))
    }

    /// "View details": mark read (synced) and return where to navigate
    pub fn open(&self, id: &NotificationId) -> Option<String> {
        let target = self.get(id)?.action_url;
        self.sync_mark_read(id);
        target
    }

    fn require_principal(&self, operation: &str) -> NotificationResult<Principal> {
        self.inner.principals.current_principal().ok_or_else(|| {
            tracing::debug!(operation, "No authenticated principal");
            NotificationError::Unauthenticated {
                operation: operation.to_string(),
            }
        })
    }
}
