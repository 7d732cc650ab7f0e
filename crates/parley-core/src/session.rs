//! Conversation session store.
//!
//! One [`ConversationSession`] belongs to exactly one connected client and is
//! dropped with it. Histories are kept per character and never touched by a
//! character switch.

use std::collections::BTreeMap;

use crate::characters::Character;
use crate::types::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    current: Character,
    histories: BTreeMap<Character, Vec<Message>>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Empty history for every registered character; the first one is selected.
    pub fn new() -> Self {
        Self {
            current: Character::default(),
            histories: Character::ALL.into_iter().map(|c| (c, Vec::new())).collect(),
        }
    }

    pub fn current_character(&self) -> Character {
        self.current
    }

    pub fn set_current_character(&mut self, character: Character) {
        self.current = character;
    }

    pub fn history(&self, character: Character) -> &[Message] {
        self.histories.get(&character).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn append(&mut self, character: Character, message: Message) {
        self.histories.entry(character).or_default().push(message);
    }
}
