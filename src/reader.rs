use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use crate::audio::{decode, AudioBuffer, AudioSink, CpalSink, SourceId};
use crate::cache::AudioCache;
use crate::engine::gemini::GeminiEngine;
use crate::engine::{Segment, SegmentationEngine, SynthesisEngine};
use crate::error::Error;
use crate::persistence;
use crate::state::{PlaybackPhase, PlaybackStatus, ReaderSettings};

/// Notifications for the presentation layer
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    AnalysisReady { segments: Vec<Segment> },
    AnalysisFailed { message: String },
    PlaybackError { segment_id: String, message: String },
}

enum Command {
    Analyze { source_text: String },
    SetSegments { segments: Vec<Segment> },
    PlaySegment { segment_id: String },
    PlayAll,
    Stop,
    SetVoice { voice: String },
    #[cfg(test)]
    Ping(tokio::sync::oneshot::Sender<()>),
}

/// Results reported back by spawned service calls
enum Internal {
    AnalysisDone {
        seq: u64,
        result: crate::error::Result<Vec<Segment>>,
    },
    SynthesisDone {
        generation: u64,
        epoch: u64,
        segment_id: String,
        result: crate::error::Result<Vec<u8>>,
    },
}

/// Handle to the reading session.
///
/// Cheap to clone; all operations are forwarded to a single session task that
/// owns the segment list, the audio cache and the output sink, so playback
/// transitions never race each other. Dropping every handle shuts the session
/// down.
#[derive(Clone)]
pub struct Reader {
    commands: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<PlaybackStatus>,
    events_tx: broadcast::Sender<ReaderEvent>,
}

impl Reader {
    /// Session with the remote engine and the default audio output, using
    /// persisted settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_settings(api_key, persistence::load_settings())
    }

    pub fn with_settings(api_key: impl Into<String>, settings: ReaderSettings) -> Self {
        let engine = Arc::new(GeminiEngine::new(api_key));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let sink = CpalSink::new(completion_tx);
        Self::with_parts(engine.clone(), engine, Box::new(sink), completion_rx, settings)
    }

    /// Assemble a session from its parts. `completions` must be the receiving
    /// end of the channel the sink reports natural completions on.
    pub fn with_parts(
        segmentation: Arc<dyn SegmentationEngine>,
        synthesis: Arc<dyn SynthesisEngine>,
        sink: Box<dyn AudioSink>,
        completions: mpsc::UnboundedReceiver<SourceId>,
        settings: ReaderSettings,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(PlaybackStatus::default());
        let (events_tx, _) = broadcast::channel(32);

        let session = Session {
            segmentation,
            synthesis,
            sink,
            cache: AudioCache::new(),
            segments: Vec::new(),
            settings,
            phase: PlaybackPhase::Idle,
            active_segment_id: None,
            chain_mode: false,
            active_source: None,
            generation: 0,
            analysis_seq: 0,
            internal_tx,
            status_tx,
            events_tx: events_tx.clone(),
        };

        tokio::spawn(session.run(commands_rx, internal_rx, completions));

        Self {
            commands: commands_tx,
            status_rx,
            events_tx,
        }
    }

    /// Submit source text for analysis. The result replaces the segment list
    /// wholesale and is announced via `ReaderEvent::AnalysisReady`.
    pub fn analyze(&self, source_text: impl Into<String>) {
        let _ = self.commands.send(Command::Analyze {
            source_text: source_text.into(),
        });
    }

    /// Replace the segment list with one obtained elsewhere. Supersedes any
    /// active playback and clears the audio cache.
    pub fn set_segments(&self, segments: Vec<Segment>) {
        let _ = self.commands.send(Command::SetSegments { segments });
    }

    /// Play one segment. Invoked on the segment that is currently playing,
    /// this stops instead (toggle).
    pub fn play_segment(&self, segment_id: impl Into<String>) {
        let _ = self.commands.send(Command::PlaySegment {
            segment_id: segment_id.into(),
        });
    }

    /// Play every segment consecutively from the top of the list.
    pub fn play_all(&self) {
        let _ = self.commands.send(Command::PlayAll);
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Select the synthesis voice. A change invalidates all cached audio.
    pub fn set_voice(&self, voice: impl Into<String>) {
        let _ = self.commands.send(Command::SetVoice {
            voice: voice.into(),
        });
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.events_tx.subscribe()
    }

    #[cfg(test)]
    async fn ping(&self) {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let _ = self.commands.send(Command::Ping(tx));
        let _ = rx.await;
    }
}

/// All mutable session state, owned by one task. Transitions run one at a
/// time; the only suspension points are the spawned service calls, whose
/// results re-enter through the internal channel.
struct Session {
    segmentation: Arc<dyn SegmentationEngine>,
    synthesis: Arc<dyn SynthesisEngine>,
    sink: Box<dyn AudioSink>,
    cache: AudioCache,
    segments: Vec<Segment>,
    settings: ReaderSettings,

    phase: PlaybackPhase,
    active_segment_id: Option<String>,
    chain_mode: bool,
    active_source: Option<SourceId>,
    /// Bumped on every play/stop/new-list request; a synthesis result whose
    /// generation is stale is cached but never played.
    generation: u64,
    analysis_seq: u64,

    internal_tx: mpsc::UnboundedSender<Internal>,
    status_tx: watch::Sender<PlaybackStatus>,
    events_tx: broadcast::Sender<ReaderEvent>,
}

impl Session {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut completions: mpsc::UnboundedReceiver<SourceId>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(msg) = internal.recv() => self.handle_internal(msg),
                Some(source_id) = completions.recv() => self.handle_source_complete(source_id),
            }
        }
        self.sink.stop();
        tracing::debug!("Reading session shut down");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Analyze { source_text } => self.start_analysis(source_text),
            Command::SetSegments { segments } => self.replace_segments(segments),
            Command::PlaySegment { segment_id } => {
                if self.phase == PlaybackPhase::Playing
                    && self.active_segment_id.as_deref() == Some(segment_id.as_str())
                {
                    self.handle_stop();
                } else {
                    self.start_segment(&segment_id, false);
                }
            }
            Command::PlayAll => {
                let Some(first) = self.segments.first().map(|s| s.id.clone()) else {
                    return;
                };
                self.start_segment(&first, true);
            }
            Command::Stop => self.handle_stop(),
            Command::SetVoice { voice } => {
                if voice == self.settings.voice {
                    return;
                }
                tracing::info!("Voice changed to '{}', clearing audio cache", voice);
                self.settings.voice = voice;
                self.cache.clear();
            }
            #[cfg(test)]
            Command::Ping(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_internal(&mut self, msg: Internal) {
        match msg {
            Internal::AnalysisDone { seq, result } => {
                if seq != self.analysis_seq {
                    tracing::debug!("Discarding analysis result superseded by a newer request");
                    return;
                }
                match result {
                    Ok(segments) => {
                        self.replace_segments(segments.clone());
                        let _ = self.events_tx.send(ReaderEvent::AnalysisReady { segments });
                    }
                    Err(e) => {
                        tracing::warn!("Analysis failed: {}", e);
                        let _ = self.events_tx.send(ReaderEvent::AnalysisFailed {
                            message: e.to_string(),
                        });
                    }
                }
            }
            Internal::SynthesisDone {
                generation,
                epoch,
                segment_id,
                result,
            } => match result {
                Ok(payload) => {
                    // Always keep a successfully synthesized payload, unless
                    // the cache was cleared (voice or list change) after the
                    // request went out.
                    if epoch == self.cache.epoch() {
                        self.cache.put(&segment_id, payload.clone());
                    }
                    if generation != self.generation
                        || self.active_segment_id.as_deref() != Some(segment_id.as_str())
                    {
                        tracing::debug!(
                            "Discarding superseded synthesis result for '{}'",
                            segment_id
                        );
                        return;
                    }
                    self.decode_and_play(&segment_id, &payload);
                }
                Err(e) => {
                    if generation != self.generation {
                        tracing::debug!("Ignoring failure of superseded synthesis: {}", e);
                        return;
                    }
                    self.fail_segment(&segment_id, e);
                }
            },
        }
    }

    fn start_analysis(&mut self, source_text: String) {
        self.analysis_seq += 1;
        let seq = self.analysis_seq;
        let segmentation = Arc::clone(&self.segmentation);
        let target_language = self.settings.target_language.clone();
        let internal = self.internal_tx.clone();

        tokio::spawn(async move {
            let result = segmentation.analyze(&source_text, &target_language).await;
            let _ = internal.send(Internal::AnalysisDone { seq, result });
        });
    }

    /// Wholesale replacement of the segment list: old ids may collide with
    /// new ones, so the cache goes too, and any active playback is superseded.
    fn replace_segments(&mut self, segments: Vec<Segment>) {
        self.generation += 1;
        self.stop_source();
        self.chain_mode = false;
        self.cache.clear();
        self.segments = segments;
        self.set_status(PlaybackPhase::Idle, None);
    }

    /// Begin playback of one segment: cache lookup, then either straight to
    /// decode-and-play or through a spawned synthesis call.
    fn start_segment(&mut self, segment_id: &str, chain: bool) {
        let Some(segment) = self.segments.iter().find(|s| s.id == segment_id).cloned() else {
            tracing::warn!("Ignoring play request for unknown segment '{}'", segment_id);
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.chain_mode = chain;
        self.stop_source();

        if let Some(payload) = self.cache.get(&segment.id).map(|p| p.to_vec()) {
            self.active_segment_id = Some(segment.id.clone());
            self.decode_and_play(&segment.id, &payload);
            return;
        }

        self.set_status(PlaybackPhase::LoadingAudio, Some(segment.id.clone()));

        let synthesis = Arc::clone(&self.synthesis);
        let text = segment.original.clone();
        let voice = self.settings.voice.clone();
        let epoch = self.cache.epoch();
        let internal = self.internal_tx.clone();
        let id = segment.id;

        tokio::spawn(async move {
            let result = synthesis.synthesize(&text, &voice).await;
            let _ = internal.send(Internal::SynthesisDone {
                generation,
                epoch,
                segment_id: id,
                result,
            });
        });
    }

    fn decode_and_play(&mut self, segment_id: &str, payload: &[u8]) {
        let buffer: AudioBuffer = match decode::decode(payload) {
            Ok(buffer) => buffer,
            Err(e) => {
                self.fail_segment(segment_id, Error::Decode(e));
                return;
            }
        };

        match self.sink.play(buffer) {
            Ok(source_id) => {
                self.active_source = Some(source_id);
                self.set_status(PlaybackPhase::Playing, Some(segment_id.to_string()));
            }
            Err(e) => {
                self.sink.stop();
                self.fail_segment(segment_id, Error::Playback(e.to_string()));
            }
        }
    }

    /// Natural completion from the sink. Stale ids (a source that was already
    /// replaced or stopped) are ignored.
    fn handle_source_complete(&mut self, source_id: SourceId) {
        if self.phase != PlaybackPhase::Playing || self.active_source != Some(source_id) {
            tracing::debug!("Ignoring completion of inactive source {}", source_id);
            return;
        }
        self.active_source = None;

        if self.chain_mode {
            if let Some(next_id) = self.next_segment_id() {
                self.start_segment(&next_id, true);
                return;
            }
        }

        self.chain_mode = false;
        self.sink.stop();
        self.set_status(PlaybackPhase::Idle, None);
    }

    fn handle_stop(&mut self) {
        if self.phase == PlaybackPhase::Idle {
            return;
        }
        self.generation += 1;
        self.stop_source();
        self.chain_mode = false;
        self.set_status(PlaybackPhase::Idle, None);
    }

    /// Abort the current segment: skip-and-idle, never advance the chain.
    fn fail_segment(&mut self, segment_id: &str, error: Error) {
        tracing::warn!("Playback of segment '{}' failed: {}", segment_id, error);
        self.generation += 1;
        self.stop_source();
        self.chain_mode = false;
        self.set_status(PlaybackPhase::Idle, None);
        let _ = self.events_tx.send(ReaderEvent::PlaybackError {
            segment_id: segment_id.to_string(),
            message: error.to_string(),
        });
    }

    fn stop_source(&mut self) {
        self.sink.stop();
        self.active_source = None;
    }

    fn next_segment_id(&self) -> Option<String> {
        let active = self.active_segment_id.as_deref()?;
        let position = self.segments.iter().position(|s| s.id == active)?;
        self.segments.get(position + 1).map(|s| s.id.clone())
    }

    fn set_status(&mut self, phase: PlaybackPhase, active_segment_id: Option<String>) {
        self.phase = phase.clone();
        self.active_segment_id = active_segment_id.clone();
        self.status_tx.send_replace(PlaybackStatus {
            phase,
            active_segment_id,
        });
    }
}
