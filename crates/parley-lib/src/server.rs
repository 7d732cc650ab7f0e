//! HTTP API and WebSocket sessions for the chat page.
//!
//! Runs on port 2004 by default. Each WebSocket connection is one session:
//! its [`ChatLoop`] lives in the connection task and is dropped on close.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use parley_core::protocol::{CharacterSummary, ServerEvent};

use crate::chat::{ChatConfig, ChatLoop};
use crate::llm::ResponseGenerator;
use crate::tts::SpeechSynthesizer;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Read-only state shared by every connection.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub chat: ChatConfig,
    sessions: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        chat: ChatConfig,
    ) -> Self {
        Self {
            generator,
            synthesizer,
            chat,
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Build the axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_upgrade))
        .route("/health", get(health))
        .route("/characters", get(characters))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct OkResponse {
    ok: bool,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

async fn characters() -> Json<Vec<CharacterSummary>> {
    Json(CharacterSummary::all())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(socket: WebSocket, state: AppState) {
    let id = state.sessions.fetch_add(1, Ordering::SeqCst);
    info!("session {id}: connected");

    let (mut sink, mut stream) = socket.split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Writer task so phase and notice events reach the page while a turn is
    // still waiting on a backend.
    let writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(f) => f,
                Err(e) => {
                    error!("session: failed to encode event: {e}");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut chat = ChatLoop::new(
        state.generator.clone(),
        state.synthesizer.clone(),
        state.chat,
        event_tx,
    );
    chat.start().await;

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => chat.handle_frame(text.as_str()).await,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("session {id}: socket error: {e}");
                break;
            }
        }
    }

    // Dropping the loop closes the event channel and ends the writer.
    drop(chat);
    let _ = writer.await;
    info!("session {id}: closed");
}
