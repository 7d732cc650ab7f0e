//! parley-lib — Persona chat engine.
//!
//! Language-model replies, ElevenLabs speech, the per-session chat loop, and
//! the HTTP/WebSocket API. Depends on parley-core for pure types.

pub mod chat;
pub mod error;
pub mod llm;
pub mod server;
pub mod tts;

// Re-export parley-core for convenience
pub use parley_core;
