//! parley-core — Pure types, character registry, and session state.
//!
//! No async runtime, no I/O, no network clients.

pub mod characters;
pub mod protocol;
pub mod session;
pub mod text_prep;
pub mod types;
pub mod voice;
