//! parley CLI — persona voice chat server.
//!
//! ```text
//! parley serve [--port 2004] [--host 127.0.0.1] [--multi-turn] [--stream-audio]
//! parley voices
//! parley ask --character "Tony Stark" [--voice Josh] [--out reply.mp3] "Who are you?"
//! ```
//!
//! Credentials come from `GROQ_API_KEY` and `ELEVENLABS_API_KEY` (or the
//! matching flags). Either may be missing; the dependent feature degrades.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use parley_lib::chat::{ChatConfig, VOICE_FAILED};
use parley_lib::llm::{ChatCompletionsClient, ResponseGenerator};
use parley_lib::parley_core::characters::Character;
use parley_lib::parley_core::text_prep::spoken_text;
use parley_lib::parley_core::types::{
    ContextMode, LlmConfig, SpeechConfig, SynthesisRequest, VoiceSettings,
};
use parley_lib::parley_core::voice::{VoiceSelection, find_by_name};
use parley_lib::server::{AppState, router};
use parley_lib::tts::{ElevenLabsClient, SpeechSynthesizer};

/// parley — chat with fictional characters in text and voice
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the chat server
    Serve {
        /// Listen port
        #[arg(long, default_value = "2004")]
        port: u16,
        /// Listen host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Resend the character's earlier turns to the language model
        #[arg(long)]
        multi_turn: bool,
        /// Use the chunked speech endpoint
        #[arg(long)]
        stream_audio: bool,
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// List voices available to the speech backend
    Voices {
        #[command(flatten)]
        backends: BackendArgs,
    },
    /// Run one turn from the terminal
    Ask {
        /// Character to talk to
        #[arg(long, short, default_value = "Sherlock Holmes")]
        character: Character,
        /// Voice name (defaults to the character's voice)
        #[arg(long)]
        voice: Option<String>,
        /// Write the spoken reply to this MP3 file
        #[arg(long, short)]
        out: Option<PathBuf>,
        #[arg(long, default_value = "0.5")]
        stability: f32,
        #[arg(long, default_value = "0.5")]
        similarity_boost: f32,
        /// Message to send
        text: String,
        #[command(flatten)]
        backends: BackendArgs,
    },
}

#[derive(Args)]
struct BackendArgs {
    /// Language-model API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: Option<String>,
    /// OpenAI-compatible chat-completions base URL
    #[arg(long, env = "PARLEY_LLM_URL", default_value = "https://api.groq.com/openai/v1")]
    llm_url: String,
    #[arg(long, env = "PARLEY_LLM_MODEL", default_value = "llama-3.3-70b-versatile")]
    llm_model: String,
    /// Speech-synthesis API key
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    elevenlabs_api_key: Option<String>,
    #[arg(long, env = "PARLEY_TTS_URL", default_value = "https://api.elevenlabs.io")]
    tts_url: String,
    #[arg(long, env = "PARLEY_TTS_MODEL", default_value = "eleven_multilingual_v2")]
    tts_model: String,
    /// Per-request timeout for both backends, in seconds
    #[arg(long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,
}

impl BackendArgs {
    fn build(self, stream_audio: bool) -> Result<(ChatCompletionsClient, ElevenLabsClient)> {
        let timeout = Duration::from_secs(self.timeout_secs);
        if self.groq_api_key.is_none() {
            warn!("GROQ_API_KEY is not set; replies will fail");
        }
        if self.elevenlabs_api_key.is_none() {
            warn!("ELEVENLABS_API_KEY is not set; voices are disabled");
        }

        let llm = ChatCompletionsClient::new(LlmConfig {
            base_url: self.llm_url,
            model: self.llm_model,
            api_key: self.groq_api_key,
            timeout,
            ..Default::default()
        })
        .context("failed to build language-model client")?;

        let tts = ElevenLabsClient::new(SpeechConfig {
            base_url: self.tts_url,
            model_id: self.tts_model,
            api_key: self.elevenlabs_api_key,
            streaming: stream_audio,
            timeout,
            ..Default::default()
        })
        .context("failed to build speech client")?;

        Ok((llm, tts))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "parley=debug,parley_lib=debug,tower_http=debug"
    } else {
        "parley=info,parley_lib=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Serve {
            port,
            host,
            multi_turn,
            stream_audio,
            backends,
        } => {
            let (llm, tts) = backends.build(stream_audio)?;
            let chat = ChatConfig {
                context: if multi_turn {
                    ContextMode::MultiTurn
                } else {
                    ContextMode::SingleTurn
                },
            };
            let app = router(AppState::new(Arc::new(llm), Arc::new(tts), chat));

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!("parley listening on http://{addr}");

            axum::serve(listener, app).await.context("server error")?;
        }

        Command::Voices { backends } => {
            let (_, tts) = backends.build(false)?;
            let voices = tts.voices().await.context("could not load voices")?;
            for v in voices {
                println!("{:<24} {}", v.name, v.voice_id);
            }
        }

        Command::Ask {
            character,
            voice,
            out,
            stability,
            similarity_boost,
            text,
            backends,
        } => {
            let (llm, tts) = backends.build(false)?;
            ask(
                &llm,
                &tts,
                character,
                voice.as_deref(),
                VoiceSettings::clamped(stability, similarity_boost),
                &text,
                out,
            )
            .await?;
        }
    }

    Ok(())
}

async fn ask(
    llm: &ChatCompletionsClient,
    tts: &ElevenLabsClient,
    character: Character,
    voice: Option<&str>,
    settings: VoiceSettings,
    text: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let reply = llm
        .generate(character.profile().instruction, &[], text)
        .await
        .context("Failed to generate character response")?;
    println!("{} {character}: {reply}", character.profile().avatar);

    let Some(out) = out else {
        return Ok(());
    };

    let catalog = tts.voices().await.unwrap_or_else(|e| {
        warn!("voice catalog unavailable: {e}");
        Vec::new()
    });
    let mut selection = VoiceSelection::for_character(&catalog, character, settings);
    if let Some(name) = voice {
        match find_by_name(&catalog, name) {
            Some(v) => selection.voice = Some(v.clone()),
            None => warn!(
                "voice {name:?} not in catalog, using {:?}",
                selection.voice.as_ref().map(|v| &v.name)
            ),
        }
    }
    let Some(voice_id) = selection.voice_id() else {
        eprintln!("{VOICE_FAILED}");
        return Ok(());
    };

    let req = SynthesisRequest {
        text: spoken_text(&reply),
        voice_id: voice_id.to_string(),
        model_id: tts.model_id().to_string(),
        settings: selection.settings,
    };
    match tts.synthesize(&req).await {
        Ok(audio) => {
            tokio::fs::write(&out, &audio)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("audio written to {} ({} bytes)", out.display(), audio.len());
        }
        Err(e) => eprintln!("{VOICE_FAILED} ({e})"),
    }
    Ok(())
}
