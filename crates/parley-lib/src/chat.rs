//! Presentation loop, one per connected client.
//!
//! ```text
//! Idle(character) ── submit ──▶ AwaitingText ── reply ──▶ AwaitingAudio ──▶ Idle
//!                                    │                     (audio or warning)
//!                                    └── generation failure ─────────────▶ Idle
//! ```
//!
//! [`ChatLoop`] owns the session store outright. It is driven by a single task
//! calling [`ChatLoop::handle`] with `&mut self`, so a turn always runs to
//! completion before the next client event (including a character switch) is
//! looked at. Everything the page needs to render is pushed as
//! [`ServerEvent`]s.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use parley_core::characters::Character;
use parley_core::protocol::{CharacterSummary, ClientEvent, NoticeLevel, ServerEvent, Snapshot};
use parley_core::session::ConversationSession;
use parley_core::text_prep::spoken_text;
use parley_core::types::{
    ContextMode, Message, SynthesisRequest, TurnPhase, VoiceInfo, VoiceSettings,
};
use parley_core::voice::VoiceSelection;

use crate::llm::ResponseGenerator;
use crate::tts::SpeechSynthesizer;

pub const VOICES_UNAVAILABLE: &str = "Could not load voices. Check your ElevenLabs API key.";
pub const VOICE_FAILED: &str = "Voice generation failed. Check your ElevenLabs API key.";
pub const GENERATION_FAILED: &str = "Failed to generate character response";
pub const NOTHING_TO_SPEAK: &str = "This reply has no speakable text, so no voice was generated.";

/// Per-server chat behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatConfig {
    pub context: ContextMode,
}

pub struct ChatLoop {
    generator: Arc<dyn ResponseGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: ChatConfig,
    session: ConversationSession,
    catalog: Vec<VoiceInfo>,
    selection: VoiceSelection,
    phase: TurnPhase,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl ChatLoop {
    pub fn new(
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        config: ChatConfig,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            config,
            session: ConversationSession::new(),
            catalog: Vec::new(),
            selection: VoiceSelection::default(),
            phase: TurnPhase::Idle,
            events,
        }
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn selection(&self) -> &VoiceSelection {
        &self.selection
    }

    pub fn catalog(&self) -> &[VoiceInfo] {
        &self.catalog
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Load the voice catalog and send the initial snapshot.
    ///
    /// An unavailable catalog leaves the session without a voice; text chat
    /// keeps working.
    pub async fn start(&mut self) {
        self.catalog = match self.synthesizer.voices().await {
            Ok(voices) => voices,
            Err(e) => {
                warn!("chat: voice catalog unavailable: {e}");
                Vec::new()
            }
        };
        if self.catalog.is_empty() {
            self.notice(NoticeLevel::Warning, VOICES_UNAVAILABLE.to_string());
        }
        self.selection = VoiceSelection::for_character(
            &self.catalog,
            self.session.current_character(),
            VoiceSettings::default(),
        );
        self.emit_snapshot();
    }

    /// Parse and handle one raw client frame.
    pub async fn handle_frame(&mut self, frame: &str) {
        match serde_json::from_str::<ClientEvent>(frame) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                debug!("chat: rejected frame: {e}");
                self.notice(NoticeLevel::Error, format!("Invalid message: {e}"));
            }
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::SelectCharacter { character } => self.select_character(character),
            ClientEvent::SelectVoice { voice_id } => {
                if !self.selection.choose(&self.catalog, &voice_id) {
                    self.notice(NoticeLevel::Warning, format!("Unknown voice: {voice_id}"));
                }
            }
            ClientEvent::Tune {
                stability,
                similarity_boost,
            } => {
                self.selection.settings = VoiceSettings::clamped(stability, similarity_boost);
            }
            ClientEvent::Submit { text } => self.submit(&text).await,
        }
    }

    fn select_character(&mut self, character: Character) {
        if character != self.session.current_character() {
            info!("chat: switched to {character}");
            self.session.set_current_character(character);
            self.selection =
                VoiceSelection::for_character(&self.catalog, character, self.selection.settings);
        }
        self.emit_snapshot();
    }

    /// Run one full turn: append the user message, generate, synthesize,
    /// append the reply.
    async fn submit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let character = self.session.current_character();
        let context = self.context_for(character);

        self.append(character, Message::user(text));
        self.set_phase(TurnPhase::AwaitingText);
        info!("chat: turn for {character} ({} chars)", text.len());

        let reply = match self
            .generator
            .generate(character.profile().instruction, &context, text)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!("chat: generation failed: {e}");
                self.notice(NoticeLevel::Error, format!("{GENERATION_FAILED}: {e}"));
                self.set_phase(TurnPhase::Idle);
                return;
            }
        };

        let audio = self.voice(&reply).await;
        debug!("chat: reply {} chars, audio={}", reply.len(), audio.is_some());
        self.append(character, Message::assistant(reply, audio));
        self.set_phase(TurnPhase::Idle);
    }

    /// Earlier turns to resend, without audio.
    fn context_for(&self, character: Character) -> Vec<Message> {
        match self.config.context {
            ContextMode::SingleTurn => Vec::new(),
            ContextMode::MultiTurn => self
                .session
                .history(character)
                .iter()
                .map(|m| Message {
                    audio: None,
                    ..m.clone()
                })
                .collect(),
        }
    }

    /// Best-effort synthesis; any reply left without audio gets a warning.
    async fn voice(&mut self, reply: &str) -> Option<Vec<u8>> {
        let Some(voice_id) = self.selection.voice_id().map(str::to_owned) else {
            self.notice(NoticeLevel::Warning, VOICE_FAILED.to_string());
            return None;
        };
        let spoken = spoken_text(reply);
        if spoken.is_empty() {
            debug!("chat: reply has no speakable text");
            self.notice(NoticeLevel::Warning, NOTHING_TO_SPEAK.to_string());
            return None;
        }

        self.set_phase(TurnPhase::AwaitingAudio);
        let req = SynthesisRequest {
            text: spoken,
            voice_id,
            model_id: self.synthesizer.model_id().to_string(),
            settings: self.selection.settings,
        };
        match self.synthesizer.synthesize(&req).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!("chat: synthesis failed: {e}");
                self.notice(NoticeLevel::Warning, format!("{VOICE_FAILED} ({e})"));
                None
            }
        }
    }

    fn append(&mut self, character: Character, message: Message) {
        self.session.append(character, message.clone());
        self.emit(ServerEvent::Message { character, message });
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
        self.emit(ServerEvent::Phase { phase });
    }

    fn notice(&self, level: NoticeLevel, text: String) {
        self.emit(ServerEvent::Notice { level, text });
    }

    fn emit_snapshot(&self) {
        let current = self.session.current_character();
        self.emit(ServerEvent::Snapshot(Snapshot {
            characters: CharacterSummary::all(),
            current,
            history: self.session.history(current).to_vec(),
            voices: self.catalog.clone(),
            selection: self.selection.clone(),
            phase: self.phase,
        }));
    }

    fn emit(&self, event: ServerEvent) {
        // The receiver only goes away when the connection is closing.
        let _ = self.events.send(event);
    }
}
