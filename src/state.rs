use serde::{Serialize, Deserialize};

/// Lifecycle phase of the playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    Idle,
    LoadingAudio,
    Playing,
}

impl Default for PlaybackPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Observable playback state: which segment is active and in what phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub phase: PlaybackPhase,
    pub active_segment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderSettings {
    /// Language the translations are produced in
    pub target_language: String,
    /// Prebuilt synthesis voice name
    pub voice: String,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            target_language: "English".to_string(),
            voice: "Kore".to_string(),
        }
    }
}
