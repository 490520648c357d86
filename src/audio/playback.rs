use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;

use super::{processing, AudioBuffer};

/// Identity of one started playback source. A fresh id is handed out per
/// `play`; completion events carry the id so a listener can tell a natural
/// completion of the current source from a stale one.
pub type SourceId = u64;

/// Single-voice audio output.
///
/// At most one source is audible at any time: `play` stops whatever is
/// active before starting the new source. Natural completion is reported
/// exactly once per source by sending its id on the completion channel the
/// sink was built with; an explicitly stopped source never reports.
pub trait AudioSink: Send {
    fn play(&mut self, buffer: AudioBuffer) -> Result<SourceId>;
    /// Idempotent; stopping when nothing is playing is a no-op.
    fn stop(&mut self);
}

/// State shared with the output callback.
struct Shared {
    queue: VecDeque<f32>,
    /// Source the completion event is armed for. Cleared by `stop` and after
    /// the event fires, so each source reports at most once.
    armed: Option<SourceId>,
}

/// cpal-backed sink. The output device and stream are created lazily on the
/// first play and reused for every playback after that; the stream is paused
/// while idle and resumed before each start.
pub struct CpalSink {
    completion_tx: mpsc::UnboundedSender<SourceId>,
    shared: Arc<Mutex<Shared>>,
    output: Option<Output>,
    next_source_id: SourceId,
}

struct Output {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: usize,
}

// Safety: cpal::Stream on macOS wraps a CoreAudio AudioUnit which is
// thread-safe. The sink is owned by a single session task; the stream is
// never touched from two threads at once.
unsafe impl Send for CpalSink {}

impl CpalSink {
    pub fn new(completion_tx: mpsc::UnboundedSender<SourceId>) -> Self {
        Self {
            completion_tx,
            shared: Arc::new(Mutex::new(Shared {
                queue: VecDeque::new(),
                armed: None,
            })),
            output: None,
            next_source_id: 0,
        }
    }

    fn ensure_output(&mut self) -> Result<()> {
        if self.output.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device()
            .context("No output device available")?;

        let config = device.default_output_config()
            .context("Failed to get default output config")?;
        let stream_config: cpal::StreamConfig = config.into();
        let channels = stream_config.channels as usize;

        let shared = Arc::clone(&self.shared);
        let completion_tx = self.completion_tx.clone();

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut shared = shared.lock().unwrap();
                for sample in data.iter_mut() {
                    *sample = shared.queue.pop_front().unwrap_or(0.0);
                }
                if shared.queue.is_empty() {
                    if let Some(source_id) = shared.armed.take() {
                        let _ = completion_tx.send(source_id);
                    }
                }
            },
            |err| {
                tracing::error!("Audio output error: {}", err);
            },
            None,
        ).context("Failed to build output stream")?;

        tracing::info!(
            "Audio output ready (device sample rate: {}Hz, {} channels)",
            stream_config.sample_rate.0,
            channels
        );

        self.output = Some(Output {
            stream,
            sample_rate: stream_config.sample_rate.0,
            channels,
        });
        Ok(())
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, buffer: AudioBuffer) -> Result<SourceId> {
        self.stop();
        self.ensure_output()?;

        let (out_rate, channels) = {
            let output = self.output.as_ref().unwrap();
            (output.sample_rate, output.channels)
        };

        let mono = processing::resample(&buffer.samples, buffer.sample_rate, out_rate)?;
        let frames = processing::interleave(&mono, channels);

        self.next_source_id += 1;
        let source_id = self.next_source_id;

        {
            let mut shared = self.shared.lock().unwrap();
            shared.queue = frames.into();
            shared.armed = Some(source_id);
        }

        let started = self.output.as_ref().unwrap().stream.play()
            .context("Failed to start audio stream");
        if let Err(e) = started {
            self.stop();
            return Err(e);
        }

        tracing::debug!(
            "Playback started: source {} ({:.2}s)",
            source_id,
            buffer.duration_secs()
        );
        Ok(source_id)
    }

    fn stop(&mut self) {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.armed = None;
            shared.queue.clear();
        }
        if let Some(output) = &self.output {
            let _ = output.stream.pause();
        }
    }
}
