// Seams between the store and the outside world
// Real implementations live in crate::backends; tests substitute their own

use futures::future::BoxFuture;

use super::{BackendNotification, NotificationId, NotificationResult, RecipientType};

/// Request/response access to the notification REST API
///
/// Every call issues exactly one request and performs no retries. Non-success
/// statuses and transport failures surface as `Fetch` (reads) or `Sync`
/// (mutations) errors.
pub trait NotificationGateway: Send + Sync {
    /// All records for a principal, in backend order
    fn fetch_all<'a>(
        &'a self,
        principal_id: &'a str,
    ) -> BoxFuture<'a, NotificationResult<Vec<BackendNotification>>>;

    /// Idempotent
    fn mark_all_read<'a>(&'a self, principal_id: &'a str) -> BoxFuture<'a, NotificationResult<()>>;

    /// Fails when the backend does not know the id
    fn delete_one<'a>(&'a self, notification_id: &'a str) -> BoxFuture<'a, NotificationResult<()>>;

    /// Idempotent
    fn delete_all<'a>(&'a self, principal_id: &'a str) -> BoxFuture<'a, NotificationResult<()>>;

    /// Administrative injection of a new record, outside the steady-state sync path
    fn create<'a>(
        &'a self,
        principal_id: &'a str,
        title: &'a str,
        message: &'a str,
        recipient: RecipientType,
    ) -> BoxFuture<'a, NotificationResult<BackendNotification>>;
}

/// Best-effort outbound signals over the push channel
///
/// Implementations drop commands silently while disconnected.
pub trait PushCommands: Send + Sync {
    fn notify_read_command(&self, id: &NotificationId);
    fn notify_delete_command(&self, id: &NotificationId);
}
