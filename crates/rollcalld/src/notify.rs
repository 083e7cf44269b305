//! Notification sink: structured log always, desktop notification
//! best-effort via `org.freedesktop.Notifications`.
//!
//! Fire-and-forget by contract — delivery failures are warnings, never
//! errors, and nothing upstream waits on them.

use chrono::NaiveTime;
use rollcall_core::Alert;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Queue depth between the engine and the sink. The engine drops on a full
/// queue rather than blocking the monitoring loop.
pub const NOTIFY_QUEUE_DEPTH: usize = 32;

const NOTIFICATION_TIMEOUT_MS: i32 = 5000;

/// One outbound notification.
#[derive(Debug, Clone)]
pub enum Notification {
    Alert(Alert),
    ClassReminder { slot: NaiveTime },
}

/// Drain the notification queue until the engine hangs up.
///
/// `conn` is `None` when desktop notifications are disabled; logging still
/// happens either way.
pub fn spawn_notifier(
    conn: Option<zbus::Connection>,
    mut rx: mpsc::Receiver<Notification>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match &notification {
                Notification::Alert(alert) => {
                    tracing::warn!(
                        student = %alert.student_name,
                        at = %alert.timestamp.format("%H:%M:%S"),
                        "{}", alert.message
                    );
                    if let Some(conn) = &conn {
                        deliver_desktop(
                            conn,
                            "Student Alert",
                            &format!(
                                "{} detected outside without permission!",
                                alert.student_name
                            ),
                        )
                        .await;
                    }
                }
                Notification::ClassReminder { slot } => {
                    tracing::info!(slot = %slot.format("%H:%M"), "class starting");
                    if let Some(conn) = &conn {
                        deliver_desktop(
                            conn,
                            "Class Starting",
                            "A new class has started! Please mark attendance.",
                        )
                        .await;
                    }
                }
            }
        }
        tracing::debug!("notification sink exiting");
    })
}

async fn deliver_desktop(conn: &zbus::Connection, summary: &str, body: &str) {
    if let Err(err) = send_notification(conn, summary, body).await {
        tracing::warn!(error = %err, "desktop notification failed");
    }
}

async fn send_notification(
    conn: &zbus::Connection,
    summary: &str,
    body: &str,
) -> zbus::Result<u32> {
    let proxy = zbus::Proxy::new(
        conn,
        "org.freedesktop.Notifications",
        "/org/freedesktop/Notifications",
        "org.freedesktop.Notifications",
    )
    .await?;

    let hints: HashMap<&str, zbus::zvariant::Value<'_>> = HashMap::new();
    proxy
        .call(
            "Notify",
            &(
                "rollcall",
                0u32,
                "",
                summary,
                body,
                Vec::<&str>::new(),
                hints,
                NOTIFICATION_TIMEOUT_MS,
            ),
        )
        .await
}
