//! Engine actor: a dedicated thread owning the monitor, the roster store,
//! and the enrolled gallery.
//!
//! Every mutation — UI commands, recognition events, clock ticks — arrives
//! as a message on one bounded channel and is handled in order, which is
//! the single-writer discipline the deduplicator's check-and-mark relies
//! on. Commands get a oneshot reply; recognition events and ticks are
//! fire-and-forget and are dropped (not queued) when the engine is behind.

use crate::notify::Notification;
use crate::store::{RosterStore, StoreError};
use chrono::Local;
use rollcall_core::{
    Alert, AttendanceStats, Embedding, EuclideanMatcher, GalleryEntry, Matcher, Monitor,
    MonitorError, MonitoringState, RecognitionEvent, Student,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

const REQUEST_QUEUE_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Input from the external detection pipeline.
#[derive(Debug)]
pub enum RecognitionInput {
    /// The pipeline already resolved the identity.
    Identified { student_id: String, confidence: f32 },
    /// Raw probe embedding; the engine matches it against the gallery.
    Descriptor {
        embedding: Embedding,
        confidence: f32,
    },
    /// The detector cannot produce results. Treated as "no detection":
    /// logged, never alerts, never stops the loop.
    DetectorDown { reason: String },
}

/// Daemon status snapshot for the IPC surface.
#[derive(Debug, Serialize)]
pub struct EngineStatus {
    pub state: &'static str,
    pub submitted: bool,
    pub students: usize,
    pub enrolled_descriptors: usize,
    pub alerts: usize,
    pub current_block: Option<String>,
}

/// Messages sent from IPC handlers to the engine thread.
enum EngineRequest {
    Submit {
        reply: oneshot::Sender<bool>,
    },
    Toggle {
        reply: oneshot::Sender<Result<MonitoringState, EngineError>>,
    },
    SetPresence {
        id: String,
        present: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetPermission {
        id: String,
        permitted: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    AddStudent {
        name: String,
        photo_ref: Option<String>,
        reply: oneshot::Sender<Result<Student, EngineError>>,
    },
    RemoveStudent {
        id: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    ListStudents {
        reply: oneshot::Sender<Vec<Student>>,
    },
    EnrollDescriptor {
        id: String,
        embedding: Embedding,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Stats {
        reply: oneshot::Sender<AttendanceStats>,
    },
    Alerts {
        reply: oneshot::Sender<Vec<Alert>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Recognition {
        input: RecognitionInput,
    },
    Tick {
        now: chrono::NaiveDateTime,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn submit(&self) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::Submit { reply }).await
    }

    pub async fn toggle(&self) -> Result<MonitoringState, EngineError> {
        self.request(|reply| EngineRequest::Toggle { reply }).await?
    }

    pub async fn set_presence(&self, id: String, present: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::SetPresence { id, present, reply })
            .await?
    }

    pub async fn set_permission(&self, id: String, permitted: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::SetPermission {
            id,
            permitted,
            reply,
        })
        .await?
    }

    pub async fn add_student(
        &self,
        name: String,
        photo_ref: Option<String>,
    ) -> Result<Student, EngineError> {
        self.request(|reply| EngineRequest::AddStudent {
            name,
            photo_ref,
            reply,
        })
        .await?
    }

    pub async fn remove_student(&self, id: String) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::RemoveStudent { id, reply })
            .await?
    }

    pub async fn list_students(&self) -> Result<Vec<Student>, EngineError> {
        self.request(|reply| EngineRequest::ListStudents { reply })
            .await
    }

    pub async fn enroll_descriptor(
        &self,
        id: String,
        embedding: Embedding,
    ) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::EnrollDescriptor {
            id,
            embedding,
            reply,
        })
        .await?
    }

    pub async fn stats(&self) -> Result<AttendanceStats, EngineError> {
        self.request(|reply| EngineRequest::Stats { reply }).await
    }

    pub async fn alerts(&self) -> Result<Vec<Alert>, EngineError> {
        self.request(|reply| EngineRequest::Alerts { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }

    /// Push a recognition event. Never waits: when the engine is behind,
    /// the stale detection is dropped and the next one will do.
    pub fn report(&self, input: RecognitionInput) {
        match self.tx.try_send(EngineRequest::Recognition { input }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("engine busy, recognition event dropped")
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("engine gone, recognition event dropped")
            }
        }
    }
}

/// Spawn the engine on a dedicated OS thread plus the tick driver task.
///
/// Loads the enrolled gallery synchronously (fail-fast), then enters the
/// request loop. The engine exits when every handle is dropped.
pub fn spawn_engine(
    store: RosterStore,
    monitor: Monitor,
    match_threshold: f32,
    tick_interval: Duration,
    notify_tx: mpsc::Sender<Notification>,
) -> Result<EngineHandle, EngineError> {
    let gallery = store
        .gallery()?
        .into_iter()
        .map(|e| GalleryEntry {
            student_id: e.student_id,
            embedding: e.embedding.normalized(),
        })
        .collect::<Vec<_>>();
    tracing::info!(entries = gallery.len(), "gallery loaded");

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(REQUEST_QUEUE_DEPTH);

    let mut engine = Engine {
        monitor,
        store,
        matcher: EuclideanMatcher::new(match_threshold),
        gallery,
        notify_tx,
    };

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                engine.handle(req);
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    // Tick driver: fire-and-forget, so a busy engine skips ticks instead
    // of building a backlog. The rollover check recovers on the next one.
    let tick_tx = tx.clone();
    tokio::spawn(async move {
        // First tick one period in, not immediately at spawn.
        let mut interval =
            tokio::time::interval_at(tokio::time::Instant::now() + tick_interval, tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let now = Local::now().naive_local();
            match tick_tx.try_send(EngineRequest::Tick { now }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => tracing::debug!("engine busy, tick dropped"),
                Err(TrySendError::Closed(_)) => break,
            }
        }
    });

    Ok(EngineHandle { tx })
}

struct Engine {
    monitor: Monitor,
    store: RosterStore,
    matcher: EuclideanMatcher,
    gallery: Vec<GalleryEntry>,
    notify_tx: mpsc::Sender<Notification>,
}

impl Engine {
    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Submit { reply } => {
                let _ = reply.send(self.monitor.submit());
            }
            EngineRequest::Toggle { reply } => {
                let result = self.monitor.toggle().map_err(EngineError::from);
                let _ = reply.send(result);
            }
            EngineRequest::SetPresence { id, present, reply } => {
                let _ = reply.send(self.set_presence(&id, present));
            }
            EngineRequest::SetPermission {
                id,
                permitted,
                reply,
            } => {
                let _ = reply.send(self.set_permission(&id, permitted));
            }
            EngineRequest::AddStudent {
                name,
                photo_ref,
                reply,
            } => {
                let _ = reply.send(self.add_student(&name, photo_ref.as_deref()));
            }
            EngineRequest::RemoveStudent { id, reply } => {
                let _ = reply.send(self.remove_student(&id));
            }
            EngineRequest::ListStudents { reply } => {
                let _ = reply.send(self.monitor.students().to_vec());
            }
            EngineRequest::EnrollDescriptor {
                id,
                embedding,
                reply,
            } => {
                let _ = reply.send(self.enroll_descriptor(&id, embedding));
            }
            EngineRequest::Stats { reply } => {
                let _ = reply.send(self.monitor.stats());
            }
            EngineRequest::Alerts { reply } => {
                let _ = reply.send(self.monitor.alerts());
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineRequest::Recognition { input } => self.on_recognition(input),
            EngineRequest::Tick { now } => {
                if let Some(slot) = self.monitor.tick(now) {
                    self.push_notification(Notification::ClassReminder { slot });
                }
            }
        }
    }

    // Flag commands persist first, then mirror into the session roster —
    // a rejected write must not leave the in-memory view ahead of the store.
    fn set_presence(&mut self, id: &str, present: bool) -> Result<(), EngineError> {
        self.store.update_flags(id, Some(present), None)?;
        self.monitor.set_presence(id, present)?;
        Ok(())
    }

    fn set_permission(&mut self, id: &str, permitted: bool) -> Result<(), EngineError> {
        self.store.update_flags(id, None, Some(permitted))?;
        self.monitor.set_permission(id, permitted)?;
        Ok(())
    }

    fn add_student(
        &mut self,
        name: &str,
        photo_ref: Option<&str>,
    ) -> Result<Student, EngineError> {
        let student = self.store.create(name, photo_ref)?;
        self.monitor.add_student(student.clone());
        tracing::info!(student = %student.name, id = %student.id, "student added");
        Ok(student)
    }

    fn remove_student(&mut self, id: &str) -> Result<(), EngineError> {
        self.store.delete(id)?;
        self.monitor.remove_student(id)?;
        self.gallery.retain(|e| e.student_id != id);
        tracing::info!(id, "student removed");
        Ok(())
    }

    fn enroll_descriptor(&mut self, id: &str, embedding: Embedding) -> Result<(), EngineError> {
        self.store.set_descriptor(id, &embedding)?;
        self.gallery.retain(|e| e.student_id != id);
        self.gallery.push(GalleryEntry {
            student_id: id.to_string(),
            embedding: embedding.normalized(),
        });
        tracing::info!(id, "descriptor enrolled");
        Ok(())
    }

    fn on_recognition(&mut self, input: RecognitionInput) {
        let now = Local::now().naive_local();
        let event = match input {
            RecognitionInput::Identified {
                student_id,
                confidence,
            } => RecognitionEvent {
                student_id: Some(student_id),
                confidence,
                timestamp: now,
            },
            RecognitionInput::Descriptor {
                embedding,
                confidence,
            } => {
                // Matching an embedding against the gallery is wasted work
                // when the gate would drop the event anyway.
                if self.monitor.state() != MonitoringState::Active {
                    tracing::debug!("monitoring not active, detection dropped");
                    return;
                }
                let outcome = self
                    .matcher
                    .match_probe(&embedding.normalized(), &self.gallery);
                tracing::debug!(
                    matched = outcome.student_id.as_deref().unwrap_or("unknown"),
                    distance = outcome.distance,
                    "descriptor matched"
                );
                RecognitionEvent {
                    student_id: outcome.student_id,
                    confidence,
                    timestamp: now,
                }
            }
            RecognitionInput::DetectorDown { reason } => {
                tracing::warn!(reason, "detector unavailable, treating as no detection");
                return;
            }
        };

        if let Some(alert) = self.monitor.on_recognition(&event) {
            self.push_notification(Notification::Alert(alert));
        }
    }

    fn push_notification(&self, notification: Notification) {
        match self.notify_tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!("notification queue full, dropping")
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("notification sink gone, dropping")
            }
        }
    }

    fn status(&self) -> EngineStatus {
        let now = Local::now().naive_local();
        EngineStatus {
            state: self.monitor.state().as_str(),
            submitted: self.monitor.is_submitted(),
            students: self.monitor.students().len(),
            enrolled_descriptors: self.gallery.len(),
            alerts: self.monitor.alerts().len(),
            current_block: self.monitor.current_block(now).map(|b| {
                format!(
                    "{}-{} {:?}",
                    b.start.format("%H:%M"),
                    b.end.format("%H:%M"),
                    b.kind
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NOTIFY_QUEUE_DEPTH;
    use rollcall_core::{ReminderSchedule, Roster};
    use std::time::Duration;

    fn spawn_test_engine() -> (EngineHandle, mpsc::Receiver<Notification>) {
        let store = RosterStore::open_in_memory().unwrap();
        let monitor = Monitor::new(Roster::new(), ReminderSchedule::standard());
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_QUEUE_DEPTH);
        // An hour-long tick interval keeps wall-clock ticks out of tests.
        let handle = spawn_engine(
            store,
            monitor,
            rollcall_core::MATCH_DISTANCE_THRESHOLD,
            Duration::from_secs(3600),
            notify_tx,
        )
        .unwrap();
        (handle, notify_rx)
    }

    #[tokio::test]
    async fn test_identified_event_alerts_absent_student() {
        let (engine, mut notify_rx) = spawn_test_engine();
        let student = engine.add_student("Avi".into(), None).await.unwrap();
        assert!(engine.submit().await.unwrap());

        engine.report(RecognitionInput::Identified {
            student_id: student.id.clone(),
            confidence: 0.9,
        });

        // The queue is FIFO: once alerts() answers, the event is processed.
        let alerts = engine.alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].student_name, "Avi");

        let delivered = tokio::time::timeout(Duration::from_secs(1), notify_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(delivered, Notification::Alert(_)));
    }

    #[tokio::test]
    async fn test_present_student_does_not_alert() {
        let (engine, _notify_rx) = spawn_test_engine();
        let student = engine.add_student("Avi".into(), None).await.unwrap();
        engine.submit().await.unwrap();
        engine
            .set_presence(student.id.clone(), true)
            .await
            .unwrap();

        engine.report(RecognitionInput::Identified {
            student_id: student.id,
            confidence: 0.9,
        });
        assert!(engine.alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_dropped_while_paused() {
        let (engine, _notify_rx) = spawn_test_engine();
        let student = engine.add_student("Avi".into(), None).await.unwrap();
        engine.submit().await.unwrap();
        assert_eq!(engine.toggle().await.unwrap(), MonitoringState::Paused);

        engine.report(RecognitionInput::Identified {
            student_id: student.id,
            confidence: 0.9,
        });
        assert!(engine.alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_before_submit_is_rejected() {
        let (engine, _notify_rx) = spawn_test_engine();
        let err = engine.toggle().await.unwrap_err();
        assert!(matches!(err, EngineError::Monitor(_)));
        let status = engine.status().await.unwrap();
        assert_eq!(status.state, "idle");
    }

    #[tokio::test]
    async fn test_descriptor_event_resolved_through_gallery() {
        let (engine, _notify_rx) = spawn_test_engine();
        let student = engine.add_student("Avi".into(), None).await.unwrap();
        engine
            .enroll_descriptor(student.id.clone(), Embedding::new(vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        engine.submit().await.unwrap();

        // Close probe: matches Avi and alerts.
        engine.report(RecognitionInput::Descriptor {
            embedding: Embedding::new(vec![0.98, 0.05, 0.0]),
            confidence: 0.8,
        });
        let alerts = engine.alerts().await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].student_id, student.id);

        // Distant probe: unknown, no further alert.
        engine.report(RecognitionInput::Descriptor {
            embedding: Embedding::new(vec![0.0, 0.0, 1.0]),
            confidence: 0.8,
        });
        assert_eq!(engine.alerts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_detector_down_is_silent() {
        let (engine, mut notify_rx) = spawn_test_engine();
        engine.add_student("Avi".into(), None).await.unwrap();
        engine.submit().await.unwrap();

        engine.report(RecognitionInput::DetectorDown {
            reason: "camera unplugged".into(),
        });
        assert!(engine.alerts().await.unwrap().is_empty());
        assert!(notify_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_student_commands_fail() {
        let (engine, _notify_rx) = spawn_test_engine();
        let err = engine
            .set_presence("ghost".into(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::NotFound(_))));
        let err = engine.remove_student("ghost".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_student_drops_gallery_entry() {
        let (engine, _notify_rx) = spawn_test_engine();
        let student = engine.add_student("Avi".into(), None).await.unwrap();
        engine
            .enroll_descriptor(student.id.clone(), Embedding::new(vec![1.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(engine.status().await.unwrap().enrolled_descriptors, 1);

        engine.remove_student(student.id).await.unwrap();
        let status = engine.status().await.unwrap();
        assert_eq!(status.enrolled_descriptors, 0);
        assert_eq!(status.students, 0);
    }
}
