pub mod audio;
pub mod cache;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod reader;
pub mod state;

pub use engine::{Segment, SegmentationEngine, SynthesisEngine};
pub use engine::gemini::{GeminiEngine, PREBUILT_VOICES};
pub use error::{Error, Result};
pub use reader::{Reader, ReaderEvent};
pub use state::{PlaybackPhase, PlaybackStatus, ReaderSettings};

/// Install the default log subscriber. Call once from the embedding app.
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
