//! Example: Inbox Session
//!
//! Signs in a principal, loads the inbox from the backend and then prints
//! every change that arrives over the push channel for a minute.
//!
//! Run with: NOTIFY_BACKEND_URL=http://localhost:4000 cargo run --example inbox_session

use std::sync::Arc;
use std::time::Duration;

use inbox_sync::{CUSTOMER_ROLE, NotificationSession, Principal, SessionPrincipal, SyncConfig};

const WATCH_FOR: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("inbox_sync=debug")),
        )
        .init();

    let config = SyncConfig::from_env()?;
    let user_id = std::env::var("NOTIFY_USER_ID").unwrap_or_else(|_| "42".to_string());
    let role = std::env::var("NOTIFY_USER_ROLE").unwrap_or_else(|_| CUSTOMER_ROLE.to_string());

    let principals = Arc::new(SessionPrincipal::signed_in(Principal::new(user_id, role)));
    let session = NotificationSession::start(config, principals)?;

    match session.store().load_from_backend().await {
        Ok(outcome) => println!("Loaded inbox: {:?}", outcome),
        Err(e) => println!("Could not load inbox: {}", e),
    }
    print_inbox(&session);

    let mut updates = session.store().subscribe();
    let watch = async {
        while updates.changed().await.is_ok() {
            print_inbox(&session);
        }
    };
    let _ = tokio::time::timeout(WATCH_FOR, watch).await;

    session.shutdown();
    Ok(())
}

fn print_inbox(session: &NotificationSession) {
    let snapshot = session.store().snapshot();
    println!(
        "\n{} notifications, {} unread ({})",
        snapshot.total(),
        snapshot.unread_count,
        if snapshot.is_connected { "live" } else { "offline" }
    );
    for notification in &snapshot.notifications {
        let marker = if notification.is_urgent() {
            "!"
        } else if notification.is_read {
            " "
        } else {
            "*"
        };
        println!(
            "{} [{}] {} - {} ({})",
            marker,
            notification.kind,
            notification.title,
            notification.message,
            notification.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}
