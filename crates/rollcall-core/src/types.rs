use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Face embedding vector produced by the external descriptor pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Return an L2-normalized copy. A zero vector is returned unchanged.
    pub fn normalized(&self) -> Embedding {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Embedding {
                values: self.values.iter().map(|x| x / norm).collect(),
            }
        } else {
            self.clone()
        }
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Dimensions beyond the shorter vector are ignored; the pipeline is
    /// expected to produce fixed-width vectors.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A single recognized-identity event from the detection pipeline.
///
/// `student_id` is `None` when a face was seen but matched no enrolled
/// student. Consumed once; never stored.
#[derive(Debug, Clone)]
pub struct RecognitionEvent {
    pub student_id: Option<String>,
    pub confidence: f32,
    pub timestamp: NaiveDateTime,
}
