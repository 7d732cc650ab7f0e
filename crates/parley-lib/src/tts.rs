//! Speech synthesis: ElevenLabs text-to-speech and voice catalog.
//!
//! ```text
//! synthesize(req) → POST /v1/text-to-speech/{voice_id}[/stream]?output_format=mp3_44100_128
//!     → AudioPayload::Buffered (one body)  ┐
//!     → AudioPayload::Chunked (bytes_stream) ┴→ into_bytes() → Vec<u8>
//! ```
//!
//! The caller always receives one fully materialized buffer; nothing is
//! played or forwarded before the whole body has arrived.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use parley_core::types::{AudioPayload, SpeechConfig, SynthesisRequest, VoiceInfo, VoiceSettings};

use crate::error::{Error, Result};

const SERVICE: &str = "speech synthesis";
const XI_API_KEY_HEADER: &str = "xi-api-key";

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `req.text` and return the complete audio buffer.
    async fn synthesize(&self, req: &SynthesisRequest) -> Result<Vec<u8>>;

    /// List available voices in catalog order.
    async fn voices(&self) -> Result<Vec<VoiceInfo>>;

    /// Model id to put into [`SynthesisRequest`]s.
    fn model_id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct ElevenLabsClient {
    http: reqwest::Client,
    config: SpeechConfig,
}

#[derive(Serialize)]
struct TtsBody<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

impl ElevenLabsClient {
    pub fn new(config: SpeechConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(Error::MissingCredential(SERVICE))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Fetch audio in whatever shape the configured endpoint delivers it.
    pub async fn fetch_payload(&self, req: &SynthesisRequest) -> Result<AudioPayload> {
        let api_key = self.api_key()?;
        if req.voice_id.is_empty() {
            return Err(Error::NoVoiceSelected);
        }

        let path = if self.config.streaming {
            format!("/v1/text-to-speech/{}/stream", req.voice_id)
        } else {
            format!("/v1/text-to-speech/{}", req.voice_id)
        };
        let body = TtsBody {
            text: &req.text,
            model_id: &req.model_id,
            voice_settings: req.settings,
        };

        debug!(
            "tts: POST voice={} chars={} streaming={}",
            req.voice_id,
            req.text.len(),
            self.config.streaming
        );

        let resp = self
            .http
            .post(self.url(&path))
            .header(XI_API_KEY_HEADER, api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .query(&[("output_format", self.config.output_format.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("tts: backend error {status}");
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(Error::UnknownVoice(req.voice_id.clone()));
            }
            return Err(Error::Http {
                service: SERVICE,
                status,
                body: text,
            });
        }

        if !self.config.streaming {
            let bytes = resp.bytes().await.map_err(|e| Error::from_reqwest(SERVICE, e))?;
            return Ok(AudioPayload::Buffered(bytes.to_vec()));
        }

        let mut stream = resp.bytes_stream();
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::from_reqwest(SERVICE, e))?;
            chunks.push(chunk.to_vec());
        }
        debug!("tts: received {} chunks", chunks.len());
        Ok(AudioPayload::Chunked(chunks))
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, req: &SynthesisRequest) -> Result<Vec<u8>> {
        let payload = self.fetch_payload(req).await?;
        if payload.is_empty() {
            return Err(Error::EmptyResponse(SERVICE));
        }
        Ok(payload.into_bytes())
    }

    async fn voices(&self) -> Result<Vec<VoiceInfo>> {
        let api_key = self.api_key()?;
        let resp = self
            .http
            .get(self.url("/v1/voices"))
            .header(XI_API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(SERVICE, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::from_reqwest(SERVICE, e))?;
        if !status.is_success() {
            return Err(Error::Http {
                service: SERVICE,
                status,
                body: text,
            });
        }
        let parsed: VoicesResponse = serde_json::from_str(&text)?;
        debug!("tts: catalog has {} voices", parsed.voices.len());
        Ok(parsed.voices)
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    const CHUNKS: [&[u8]; 3] = [b"ID3\x04", b"\xFF\xFB\x90\x00", b"frames-and-tail"];

    #[derive(Default)]
    struct Seen {
        voice: String,
        query: HashMap<String, String>,
        api_key: String,
        body: Value,
    }

    type Captured = Arc<Mutex<Seen>>;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn record(
        captured: &Captured,
        voice: String,
        query: HashMap<String, String>,
        headers: &HeaderMap,
        body: Value,
    ) {
        let mut seen = captured.lock().unwrap();
        seen.voice = voice;
        seen.query = query;
        seen.api_key = headers
            .get(XI_API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        seen.body = body;
    }

    async fn buffered(
        State(captured): State<Captured>,
        Path(voice): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Vec<u8> {
        record(&captured, voice, query, &headers, body);
        CHUNKS.concat()
    }

    async fn streamed(
        State(captured): State<Captured>,
        Path(voice): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Body {
        record(&captured, voice, query, &headers, body);
        let chunks = CHUNKS.iter().map(|c| Ok::<_, std::convert::Infallible>(c.to_vec()));
        Body::from_stream(futures_util::stream::iter(chunks))
    }

    fn fake_backend(captured: Captured) -> Router {
        Router::new()
            .route("/v1/text-to-speech/{voice}", post(buffered))
            .route("/v1/text-to-speech/{voice}/stream", post(streamed))
            .route(
                "/v1/voices",
                get(|| async {
                    Json(json!({"voices": [
                        {"voice_id": "21m00Tcm4TlvDq8ikWAM", "name": "Rachel"},
                        {"voice_id": "ErXwobaYiN019PkySvjV", "name": "Antoni"}
                    ]}))
                }),
            )
            .with_state(captured)
    }

    fn client(base_url: String, streaming: bool) -> ElevenLabsClient {
        ElevenLabsClient::new(SpeechConfig {
            base_url,
            api_key: Some("xi-test".into()),
            streaming,
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            text: "The game is afoot.".into(),
            voice_id: "ErXwobaYiN019PkySvjV".into(),
            model_id: "eleven_multilingual_v2".into(),
            settings: VoiceSettings::clamped(0.3, 0.8),
        }
    }

    #[tokio::test]
    async fn sends_voice_settings_and_format() {
        let captured: Captured = Arc::default();
        let base = spawn(fake_backend(captured.clone())).await;

        let audio = client(base, false).synthesize(&request()).await.unwrap();
        assert_eq!(audio, CHUNKS.concat());

        let seen = captured.lock().unwrap();
        assert_eq!(seen.voice, "ErXwobaYiN019PkySvjV");
        assert_eq!(seen.query["output_format"], "mp3_44100_128");
        assert_eq!(seen.api_key, "xi-test");
        assert_eq!(seen.body["text"], "The game is afoot.");
        assert_eq!(seen.body["model_id"], "eleven_multilingual_v2");
        let stability = seen.body["voice_settings"]["stability"].as_f64().unwrap();
        let boost = seen.body["voice_settings"]["similarity_boost"].as_f64().unwrap();
        assert!((stability - 0.3).abs() < 1e-6);
        assert!((boost - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn streamed_and_buffered_audio_are_identical() {
        let base = spawn(fake_backend(Arc::default())).await;

        let buffered = client(base.clone(), false).synthesize(&request()).await.unwrap();
        let streamed = client(base.clone(), true).synthesize(&request()).await.unwrap();
        assert_eq!(buffered, streamed);

        match client(base, true).fetch_payload(&request()).await.unwrap() {
            AudioPayload::Chunked(chunks) => assert_eq!(chunks.concat(), CHUNKS.concat()),
            other => panic!("expected chunked payload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_voices_in_order() {
        let base = spawn(fake_backend(Arc::default())).await;
        let voices = client(base, false).voices().await.unwrap();
        let names: Vec<_> = voices.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["Rachel", "Antoni"]);
        assert_eq!(voices[1].voice_id, "ErXwobaYiN019PkySvjV");
    }

    #[tokio::test]
    async fn missing_key_is_a_configuration_error() {
        let client = ElevenLabsClient::new(SpeechConfig {
            base_url: "http://127.0.0.1:9".into(),
            api_key: None,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(client.voices().await, Err(Error::MissingCredential(_))));
        assert!(matches!(client.synthesize(&request()).await, Err(Error::MissingCredential(_))));
    }

    #[tokio::test]
    async fn rejected_key_surfaces_http_error() {
        let router = Router::new().route(
            "/v1/voices",
            get(|| async {
                (StatusCode::UNAUTHORIZED, r#"{"detail":{"status":"invalid_api_key"}}"#)
            }),
        );
        let base = spawn(router).await;
        let err = client(base, false).voices().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Http { status, .. } if status == reqwest::StatusCode::UNAUTHORIZED
        ));
    }

    #[tokio::test]
    async fn empty_audio_is_a_failure() {
        let router = Router::new().route(
            "/v1/text-to-speech/{voice}",
            post(|| async { Vec::<u8>::new() }),
        );
        let base = spawn(router).await;
        let err = client(base, false).synthesize(&request()).await.unwrap_err();
        assert!(matches!(err, Error::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn blank_voice_id_is_rejected() {
        let mut req = request();
        req.voice_id.clear();
        let err = client("http://127.0.0.1:9".into(), false).synthesize(&req).await.unwrap_err();
        assert!(matches!(err, Error::NoVoiceSelected));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        async fn stall() -> Vec<u8> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            CHUNKS.concat()
        }
        let router = Router::new()
            .route("/v1/text-to-speech/{voice}", post(stall))
            .route("/v1/text-to-speech/{voice}/stream", post(stall));
        let base = spawn(router).await;

        for streaming in [false, true] {
            let client = ElevenLabsClient::new(SpeechConfig {
                base_url: base.clone(),
                api_key: Some("xi-test".into()),
                streaming,
                timeout: Duration::from_millis(200),
                ..Default::default()
            })
            .unwrap();
            let err = client.synthesize(&request()).await.unwrap_err();
            assert!(matches!(err, Error::Timeout { .. }), "streaming={streaming}: got {err:?}");
        }
    }
}
