pub mod gemini;

use async_trait::async_trait;
use serde::{Serialize, Deserialize};

use crate::error::Result;

/// A reading-sized unit of source text paired with its translation.
///
/// Produced by the segmentation service and immutable afterwards; `id` is
/// unique within one segment list and is the cache key for synthesized audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub original: String,
    pub translation: String,
}

/// Splits source text into ordered reading segments with translations.
///
/// Called once per analysis request; the result wholesale-replaces the
/// current segment list.
#[async_trait]
pub trait SegmentationEngine: Send + Sync {
    async fn analyze(&self, source_text: &str, target_language: &str) -> Result<Vec<Segment>>;
}

/// Converts text to an encoded audio payload (headerless 24kHz s16le PCM).
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;
}
