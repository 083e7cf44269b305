//! Identity matching against the enrolled gallery.
//!
//! Pure function over the probe and gallery: no side effects, deterministic
//! output for a given input, so unit tests can pin exact outcomes.

use crate::types::Embedding;

/// Distance threshold for a positive identification in normalized
/// embedding space. Probes farther than this from every gallery entry
/// resolve to unknown.
pub const MATCH_DISTANCE_THRESHOLD: f32 = 0.6;

/// Distances within this tolerance are treated as equal; ties resolve to
/// the lexicographically first student id.
const DISTANCE_TOLERANCE: f32 = 1e-6;

/// One enrolled reference embedding. A student may have several entries
/// (e.g., with and without glasses); the closest one wins.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub student_id: String,
    pub embedding: Embedding,
}

/// Result of matching a probe against the gallery.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Best-matching student, or `None` for unknown.
    pub student_id: Option<String>,
    /// Distance to the best gallery entry; 0.0 for an empty gallery.
    pub distance: f32,
}

/// Strategy for resolving a probe embedding to an enrolled identity.
pub trait Matcher {
    fn match_probe(&self, probe: &Embedding, gallery: &[GalleryEntry]) -> MatchOutcome;
}

/// Euclidean-distance matcher over L2-normalized embeddings.
///
/// Always visits every gallery entry, in lexicographic student-id order:
/// the winner for equidistant candidates is independent of how the caller
/// assembled the gallery.
pub struct EuclideanMatcher {
    threshold: f32,
}

impl EuclideanMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for EuclideanMatcher {
    fn default() -> Self {
        Self::new(MATCH_DISTANCE_THRESHOLD)
    }
}

impl Matcher for EuclideanMatcher {
    fn match_probe(&self, probe: &Embedding, gallery: &[GalleryEntry]) -> MatchOutcome {
        if gallery.is_empty() {
            return MatchOutcome {
                student_id: None,
                distance: 0.0,
            };
        }

        let mut ordered: Vec<&GalleryEntry> = gallery.iter().collect();
        ordered.sort_by(|a, b| a.student_id.cmp(&b.student_id));

        let mut best: Option<(&GalleryEntry, f32)> = None;
        for entry in ordered {
            let dist = probe.distance(&entry.embedding);
            let closer = match best {
                None => true,
                // Strictly closer beyond tolerance; an equidistant later
                // entry must not displace the incumbent.
                Some((_, best_dist)) => dist + DISTANCE_TOLERANCE < best_dist,
            };
            if closer {
                best = Some((entry, dist));
            }
        }

        match best {
            Some((entry, dist)) if dist <= self.threshold => MatchOutcome {
                student_id: Some(entry.student_id.clone()),
                distance: dist,
            },
            Some((_, dist)) => MatchOutcome {
                student_id: None,
                distance: dist,
            },
            None => MatchOutcome {
                student_id: None,
                distance: 0.0,
            },
        }
    }
}
