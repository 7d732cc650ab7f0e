//! Shared types for the parley chat engine.
//!
//! Kept free of tokio and reqwest so the data model can be used (and tested)
//! without pulling in the network stack.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─── Conversation types ────────────────────────────────────────────────────

/// Who authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One completed turn in a character's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// MP3 bytes for assistant turns whose synthesis succeeded.
    #[serde(default, with = "base64_audio", skip_serializing_if = "Option::is_none")]
    pub audio: Option<Vec<u8>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            audio: None,
        }
    }

    pub fn assistant(content: impl Into<String>, audio: Option<Vec<u8>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            audio,
        }
    }
}

mod base64_audio {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(audio: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match audio {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Where the presentation loop is within one user submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    AwaitingText,
    AwaitingAudio,
}

// ─── Speech types ──────────────────────────────────────────────────────────

/// One entry of the synthesis backend's voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub name: String,
    pub voice_id: String,
}

/// Tuning parameters passed with every synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

impl VoiceSettings {
    pub const DEFAULT_VALUE: f32 = 0.5;
    /// Slider granularity.
    pub const STEP: f32 = 0.05;

    /// Build settings with both values clamped to `[0, 1]`. NaN becomes the default.
    pub fn clamped(stability: f32, similarity_boost: f32) -> Self {
        Self {
            stability: clamp_unit(stability),
            similarity_boost: clamp_unit(similarity_boost),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: Self::DEFAULT_VALUE,
            similarity_boost: Self::DEFAULT_VALUE,
        }
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        VoiceSettings::DEFAULT_VALUE
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Everything the synthesis backend needs for one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
    pub settings: VoiceSettings,
}

/// Audio as delivered by the backend, before it is handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPayload {
    Buffered(Vec<u8>),
    /// Chunks in delivery order.
    Chunked(Vec<Vec<u8>>),
}

impl AudioPayload {
    /// Resolve into one contiguous buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            AudioPayload::Buffered(bytes) => bytes,
            AudioPayload::Chunked(chunks) => chunks.concat(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AudioPayload::Buffered(bytes) => bytes.is_empty(),
            AudioPayload::Chunked(chunks) => chunks.iter().all(Vec::is_empty),
        }
    }
}

// ─── Backend configuration ─────────────────────────────────────────────────

/// Language-model backend configuration (any OpenAI-compatible endpoint).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "llama-3.3-70b-versatile".into(),
            api_key: None,
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Speech-synthesis backend configuration.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub base_url: String,
    pub model_id: String,
    /// 44.1 kHz MP3 at 128 kbps.
    pub output_format: String,
    pub api_key: Option<String>,
    /// Use the chunked streaming endpoint instead of the buffered one.
    pub streaming: bool,
    pub timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".into(),
            model_id: "eleven_multilingual_v2".into(),
            output_format: "mp3_44100_128".into(),
            api_key: None,
            streaming: false,
            timeout: Duration::from_secs(60),
        }
    }
}

/// How much of the conversation is sent to the language model per turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextMode {
    /// Persona instruction plus the latest user message only.
    #[default]
    SingleTurn,
    /// Persona instruction plus the active character's prior turns.
    MultiTurn,
}
