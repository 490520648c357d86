pub mod decode;
pub mod playback;
pub mod processing;

pub use playback::{AudioSink, CpalSink, SourceId};

/// Sample rate of payloads produced by the synthesis service (raw 24kHz PCM)
pub const SYNTH_SAMPLE_RATE: u32 = 24_000;

/// Audio buffer for passing audio data between modules
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.channels as f32 / self.sample_rate as f32
    }
}
