//! Garbage-collection event detection
//!
//! A GC event is inferred from a sharp drop in used memory between two
//! consecutive samples. Events are recomputed from the history on every
//! pass and never stored on their own.

use crate::models::Sample;
use serde::{Deserialize, Serialize};

/// An inferred collection between `index - 1` and `index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GcEvent {
    /// Position of the sample immediately after the drop
    pub index: usize,
    pub drop_bytes: u64,
    /// `(prev - cur) / prev`, in `(0, 1]`
    pub drop_ratio: f64,
}

/// Scan adjacent pairs for drops of at least `min_drop_ratio`
///
/// Pairs whose earlier sample reads 0 bytes are skipped.
pub fn detect_gc_events(samples: &[Sample], min_drop_ratio: f64) -> Vec<GcEvent> {
    samples
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (prev, cur) = (pair[0].used, pair[1].used);
            if prev == 0 || cur >= prev {
                return None;
            }

            let drop_bytes = prev - cur;
            let drop_ratio = drop_bytes as f64 / prev as f64;
            if drop_ratio < min_drop_ratio {
                return None;
            }

            Some(GcEvent {
                index: i + 1,
                drop_bytes,
                drop_ratio,
            })
        })
        .collect()
}
