//! Runtime layer for live and offline tracking.
//!
//! [`FrameProcessingLoop`] is the per-frame path: pose landmarks, colour
//! endpoints, midpoint, frame rate, optional overlay and recording. A
//! [`TrackingSession`] drives it from a worker thread; frames offered while
//! the previous one is still being processed are dropped, never queued.

pub mod fps;
pub mod gate;
pub mod pipeline;
pub mod recorder;
pub mod session;

pub use fps::FrameRateEstimator;
pub use gate::{TickGate, TickPermit};
pub use pipeline::{
    process_source, process_source_with, FrameProcessingLoop, LoopConfig, LoopStatus, ProcessingReport, TickOutcome,
    TickOutput,
};
pub use recorder::PngSequenceRecorder;
pub use session::{SessionEvent, SessionSummary, TrackingSession};

use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Detection(#[from] inference::DetectionError),
    #[error("recorder io error ({context}): {source}")]
    Recorder {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tracking is not running")]
    NotTracking,
    #[error("session worker failed: {0}")]
    Worker(String),
}

pub mod prelude {
    pub use crate::{
        process_source, FrameProcessingLoop, FrameRateEstimator, LoopConfig, PngSequenceRecorder, RuntimeError,
        TickOutcome, TrackingSession,
    };
}
