use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use super::{Segment, SegmentationEngine, SynthesisEngine};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used to split text and translate segments
const SEGMENTATION_MODEL: &str = "gemini-2.5-flash";

/// Model used for speech synthesis (returns raw 24kHz PCM)
const SYNTHESIS_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Prebuilt voice names accepted by the synthesis model
pub const PREBUILT_VOICES: &[&str] = &[
    "Zephyr", "Puck", "Charon", "Kore", "Fenrir", "Leda", "Orus", "Aoede",
];

/// Remote segmentation + synthesis over the Generative Language API
pub struct GeminiEngine {
    http: reqwest::Client,
    api_key: String,
}

impl GeminiEngine {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Read the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::Config("GEMINI_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    async fn generate(&self, model: &str, body: serde_json::Value) -> Result<GenerateContentResponse> {
        let url = format!("{}/{}:generateContent", API_BASE, model);
        let resp = self.http.post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl SegmentationEngine for GeminiEngine {
    async fn analyze(&self, source_text: &str, target_language: &str) -> Result<Vec<Segment>> {
        let prompt = format!(
            "Split the following text into natural reading segments of roughly one \
             sentence each, in order, and translate each segment into {}. \
             Return only the segments.\n\nText:\n{}",
            target_language, source_text
        );

        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "original": {"type": "STRING"},
                            "translation": {"type": "STRING"}
                        },
                        "required": ["original", "translation"]
                    }
                }
            }
        });

        let resp = self.generate(SEGMENTATION_MODEL, body).await?;
        let text = resp.first_text()
            .ok_or_else(|| Error::Segmentation("response contained no text part".to_string()))?;

        let segments = parse_segments(&text)?;
        tracing::info!("Analysis complete: {} segments", segments.len());
        Ok(segments)
    }
}

#[async_trait]
impl SynthesisEngine for GeminiEngine {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let body = json!({
            "contents": [{"parts": [{"text": text}]}],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": {"voiceName": voice}
                    }
                }
            }
        });

        let resp = self.generate(SYNTHESIS_MODEL, body).await?;
        let encoded = resp.first_inline_data()
            .ok_or_else(|| Error::Synthesis("response contained no audio payload".to_string()))?;

        let payload = BASE64.decode(encoded.as_bytes())
            .map_err(|e| Error::Synthesis(format!("invalid base64 audio payload: {}", e)))?;

        tracing::debug!("Synthesized {} bytes for voice '{}'", payload.len(), voice);
        Ok(payload)
    }
}

/// Parse the model's JSON segment array, assigning positional ids.
fn parse_segments(text: &str) -> Result<Vec<Segment>> {
    #[derive(Deserialize)]
    struct RawSegment {
        original: String,
        translation: String,
    }

    let raw: Vec<RawSegment> = serde_json::from_str(text)
        .map_err(|e| Error::Segmentation(format!("unparseable segment list: {}", e)))?;

    Ok(raw.into_iter()
        .enumerate()
        .map(|(i, seg)| Segment {
            id: format!("seg-{}", i),
            original: seg.original,
            translation: seg.translation,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates.first()?
            .content.parts.iter()
            .find_map(|part| part.text.clone())
    }

    fn first_inline_data(&self) -> Option<String> {
        self.candidates.first()?
            .content.parts.iter()
            .find_map(|part| part.inline_data.as_ref().map(|d| d.data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_segments_assigns_positional_ids() {
        let text = r#"[
            {"original": "Hola.", "translation": "Hello."},
            {"original": "Adiós.", "translation": "Goodbye."}
        ]"#;
        let segments = parse_segments(text).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, "seg-0");
        assert_eq!(segments[0].original, "Hola.");
        assert_eq!(segments[1].id, "seg-1");
        assert_eq!(segments[1].translation, "Goodbye.");
    }

    #[test]
    fn parse_segments_rejects_non_json() {
        assert!(parse_segments("not json").is_err());
    }

    #[test]
    fn response_text_extraction() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{
            "candidates": [{"content": {"parts": [{"text": "[]"}]}}]
        }"#).unwrap();
        assert_eq!(resp.first_text().as_deref(), Some("[]"));
        assert!(resp.first_inline_data().is_none());
    }

    #[test]
    fn response_audio_extraction() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAAA"}}
            ]}}]
        }"#).unwrap();
        assert_eq!(resp.first_inline_data().as_deref(), Some("AAAA"));
    }

    #[test]
    fn empty_response_yields_none() {
        let resp: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.first_text().is_none());
        assert!(resp.first_inline_data().is_none());
    }
}
