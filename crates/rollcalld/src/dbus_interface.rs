use crate::engine::{EngineError, EngineHandle, RecognitionInput};
use rollcall_core::Embedding;
use zbus::fdo;
use zbus::interface;

/// D-Bus interface for the Rollcall attendance daemon.
///
/// Bus name: org.rollcall.Attendance1
/// Object path: /org/rollcall/Attendance1
pub struct AttendanceService {
    engine: EngineHandle,
}

impl AttendanceService {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

fn failed(err: EngineError) -> fdo::Error {
    fdo::Error::Failed(err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| fdo::Error::Failed(e.to_string()))
}

fn parse_embedding(json: &str) -> fdo::Result<Embedding> {
    let values: Vec<f32> = serde_json::from_str(json)
        .map_err(|e| fdo::Error::InvalidArgs(format!("bad embedding: {e}")))?;
    Ok(Embedding::new(values))
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Submit attendance and start monitoring. Returns whether this call
    /// started the session (false when already submitted).
    async fn submit(&self) -> fdo::Result<bool> {
        self.engine.submit().await.map_err(failed)
    }

    /// Pause or resume monitoring. Returns the new state name.
    async fn toggle_monitoring(&self) -> fdo::Result<String> {
        let state = self.engine.toggle().await.map_err(failed)?;
        Ok(state.as_str().to_string())
    }

    async fn set_presence(&self, id: &str, present: bool) -> fdo::Result<()> {
        self.engine
            .set_presence(id.to_string(), present)
            .await
            .map_err(failed)
    }

    async fn set_permission(&self, id: &str, permitted: bool) -> fdo::Result<()> {
        self.engine
            .set_permission(id.to_string(), permitted)
            .await
            .map_err(failed)
    }

    /// Recognition pipeline: report an already-identified student.
    async fn report_recognition(&self, student_id: &str, confidence: f64) -> fdo::Result<()> {
        self.engine.report(RecognitionInput::Identified {
            student_id: student_id.to_string(),
            confidence: confidence as f32,
        });
        Ok(())
    }

    /// Recognition pipeline: report a raw probe embedding (JSON float array).
    async fn report_descriptor(&self, embedding_json: &str, confidence: f64) -> fdo::Result<()> {
        let embedding = parse_embedding(embedding_json)?;
        self.engine.report(RecognitionInput::Descriptor {
            embedding,
            confidence: confidence as f32,
        });
        Ok(())
    }

    /// Recognition pipeline: the detector cannot currently produce results.
    async fn report_detector_down(&self, reason: &str) -> fdo::Result<()> {
        self.engine.report(RecognitionInput::DetectorDown {
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// Aggregate attendance counters as JSON.
    async fn stats(&self) -> fdo::Result<String> {
        let stats = self.engine.stats().await.map_err(failed)?;
        to_json(&stats)
    }

    /// Alert history (newest first) as JSON.
    async fn alerts(&self) -> fdo::Result<String> {
        let alerts = self.engine.alerts().await.map_err(failed)?;
        to_json(&alerts)
    }

    /// Roster in enrollment order as JSON.
    async fn list_students(&self) -> fdo::Result<String> {
        let students = self.engine.list_students().await.map_err(failed)?;
        to_json(&students)
    }

    /// Create a student. Empty `photo_ref` means no photo. Returns the
    /// created record as JSON.
    async fn add_student(&self, name: &str, photo_ref: &str) -> fdo::Result<String> {
        let photo = (!photo_ref.is_empty()).then(|| photo_ref.to_string());
        let student = self
            .engine
            .add_student(name.to_string(), photo)
            .await
            .map_err(failed)?;
        to_json(&student)
    }

    async fn remove_student(&self, id: &str) -> fdo::Result<()> {
        self.engine
            .remove_student(id.to_string())
            .await
            .map_err(failed)
    }

    /// Attach an enrolled face descriptor (JSON float array) to a student.
    async fn enroll_descriptor(&self, id: &str, embedding_json: &str) -> fdo::Result<()> {
        let embedding = parse_embedding(embedding_json)?;
        self.engine
            .enroll_descriptor(id.to_string(), embedding)
            .await
            .map_err(failed)
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> fdo::Result<String> {
        let status = self.engine.status().await.map_err(failed)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "state": status.state,
            "submitted": status.submitted,
            "students": status.students,
            "enrolled_descriptors": status.enrolled_descriptors,
            "alerts": status.alerts,
            "current_block": status.current_block,
        })
        .to_string())
    }
}
