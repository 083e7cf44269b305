use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{Alert, AttendanceStats, Student};
use std::path::PathBuf;

// `#[zbus::proxy]` generates the async `AttendanceProxy` used below.
#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn submit(&self) -> zbus::Result<bool>;
    async fn toggle_monitoring(&self) -> zbus::Result<String>;
    async fn set_presence(&self, id: &str, present: bool) -> zbus::Result<()>;
    async fn set_permission(&self, id: &str, permitted: bool) -> zbus::Result<()>;
    async fn report_recognition(&self, student_id: &str, confidence: f64) -> zbus::Result<()>;
    async fn stats(&self) -> zbus::Result<String>;
    async fn alerts(&self) -> zbus::Result<String>;
    async fn list_students(&self) -> zbus::Result<String>;
    async fn add_student(&self, name: &str, photo_ref: &str) -> zbus::Result<String>;
    async fn remove_student(&self, id: &str) -> zbus::Result<()>;
    async fn enroll_descriptor(&self, id: &str, embedding_json: &str) -> zbus::Result<()>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall classroom attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status
    Status,
    /// Submit attendance and start monitoring
    Submit,
    /// Pause or resume monitoring
    Toggle,
    /// Mark a student present or absent
    Present {
        /// Student id
        id: String,
        /// true = present, false = absent
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        value: bool,
    },
    /// Grant or revoke permission to be away
    Permit {
        /// Student id
        id: String,
        /// true = permitted, false = not permitted
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        value: bool,
    },
    /// Show attendance counters
    Stats,
    /// Show the alert history (newest first)
    Alerts,
    /// List the roster
    Students,
    /// Add a student
    Add {
        /// Student name
        #[arg(short, long)]
        name: String,
        /// Optional photo reference (path or URL)
        #[arg(short, long)]
        photo: Option<String>,
    },
    /// Remove a student
    Remove {
        /// Student id
        id: String,
    },
    /// Enroll a face descriptor from a JSON file (float array)
    Enroll {
        /// Student id
        id: String,
        /// Path to the descriptor JSON file
        descriptor: PathBuf,
    },
    /// Inject a recognition event (diagnostics)
    Simulate {
        /// Student id to report as recognized
        id: String,
        /// Detection confidence
        #[arg(short, long, default_value_t = 0.9)]
        confidence: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session()
        .await
        .context("connecting to the session bus")?;
    let proxy = AttendanceProxy::new(&conn)
        .await
        .context("connecting to rollcalld")?;

    match cli.command {
        Commands::Status => {
            let status = proxy.status().await?;
            let value: serde_json::Value = serde_json::from_str(&status)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Submit => {
            if proxy.submit().await? {
                println!("Attendance submitted; monitoring started");
            } else {
                println!("Attendance was already submitted");
            }
        }
        Commands::Toggle => {
            let state = proxy.toggle_monitoring().await?;
            println!("Monitoring is now {state}");
        }
        Commands::Present { id, value } => {
            proxy.set_presence(&id, value).await?;
            println!("{id}: present = {value}");
        }
        Commands::Permit { id, value } => {
            proxy.set_permission(&id, value).await?;
            println!("{id}: permission = {value}");
        }
        Commands::Stats => {
            let stats: AttendanceStats = serde_json::from_str(&proxy.stats().await?)?;
            println!(
                "{} students: {} present, {} absent, {} permitted",
                stats.total, stats.present, stats.absent, stats.permitted
            );
        }
        Commands::Alerts => {
            let alerts: Vec<Alert> = serde_json::from_str(&proxy.alerts().await?)?;
            if alerts.is_empty() {
                println!("No alerts");
            }
            for alert in alerts {
                println!(
                    "{}  {}  {}",
                    alert.timestamp.format("%H:%M:%S"),
                    alert.student_name,
                    alert.message
                );
            }
        }
        Commands::Students => {
            let students: Vec<Student> = serde_json::from_str(&proxy.list_students().await?)?;
            if students.is_empty() {
                println!("Roster is empty");
            }
            for s in students {
                let presence = if s.is_present { "present" } else { "absent" };
                let permission = if s.has_permission { ", permitted" } else { "" };
                println!("{}  {}  ({presence}{permission})", s.id, s.name);
            }
        }
        Commands::Add { name, photo } => {
            let json = proxy
                .add_student(&name, photo.as_deref().unwrap_or(""))
                .await?;
            let student: Student = serde_json::from_str(&json)?;
            println!("Added {} ({})", student.name, student.id);
        }
        Commands::Remove { id } => {
            proxy.remove_student(&id).await?;
            println!("Removed {id}");
        }
        Commands::Enroll { id, descriptor } => {
            let json = std::fs::read_to_string(&descriptor)
                .with_context(|| format!("reading {}", descriptor.display()))?;
            proxy.enroll_descriptor(&id, &json).await?;
            println!("Descriptor enrolled for {id}");
        }
        Commands::Simulate { id, confidence } => {
            proxy.report_recognition(&id, confidence).await?;
            println!("Recognition event injected for {id}");
        }
    }

    Ok(())
}
