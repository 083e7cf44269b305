use anyhow::Result;
use rollcall_core::{Monitor, Roster};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod notify;
mod store;

use config::Config;
use dbus_interface::AttendanceService;
use notify::NOTIFY_QUEUE_DEPTH;
use store::RosterStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::from_env();

    // Open the store and load the roster synchronously (fail-fast).
    let store = RosterStore::open(&config.db_path)?;
    let students = store.list()?;
    tracing::info!(
        db = %config.db_path.display(),
        students = students.len(),
        "roster loaded"
    );

    let schedule = config.load_schedule()?;
    let monitor = Monitor::new(Roster::from_students(students), schedule);

    let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_QUEUE_DEPTH);
    let handle = engine::spawn_engine(
        store,
        monitor,
        config.match_threshold,
        config.tick_interval,
        notify_tx,
    )?;

    let conn = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", AttendanceService::new(handle))?
        .build()
        .await?;
    tracing::info!("serving org.rollcall.Attendance1 on the session bus");

    notify::spawn_notifier(config.desktop_notify.then(|| conn.clone()), notify_rx);

    tracing::info!("rollcalld ready");

    // Keep running until signaled.
    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
