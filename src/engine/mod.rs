mod ort;

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{Detection, RgbFrame};

pub use self::ort::OrtHandEngine;

/// A model file could not be loaded into an inference session. Surfaced once,
/// at startup; there is no automatic retry.
#[derive(Debug, Error)]
#[error("failed to load model from {path}: {source}")]
pub struct InitError {
    pub path: PathBuf,
    #[source]
    pub source: ::ort::Error,
}

/// The boundary to the landmark inference runtime.
///
/// Implementations run on the pipeline's worker thread, one request at a
/// time. `timestamp_ms` counts milliseconds from an arbitrary fixed epoch and
/// is non-decreasing across calls; it exists for ordering, not wall-clock
/// display. A failed call is a per-image detection error: the caller logs it,
/// reports it, and keeps submitting frames.
pub trait LandmarkEngine: Send + 'static {
    fn detect(&mut self, image: &RgbFrame, timestamp_ms: i64) -> anyhow::Result<Detection>;
}
