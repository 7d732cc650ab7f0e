//! WebSocket protocol between the browser page and the chat loop.
//!
//! Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::characters::Character;
use crate::types::{Message, TurnPhase, VoiceInfo};
use crate::voice::VoiceSelection;

/// Browser → server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    SelectCharacter { character: Character },
    SelectVoice { voice_id: String },
    Tune { stability: f32, similarity_boost: f32 },
    Submit { text: String },
}

/// Server → browser.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full view state; sent on connect and whenever the character changes.
    Snapshot(Snapshot),
    Phase { phase: TurnPhase },
    /// A message was appended to `character`'s history.
    Message { character: Character, message: Message },
    Notice { level: NoticeLevel, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub characters: Vec<CharacterSummary>,
    pub current: Character,
    pub history: Vec<Message>,
    pub voices: Vec<VoiceInfo>,
    pub selection: VoiceSelection,
    pub phase: TurnPhase,
}

/// Registry entry as shown in the character picker.
#[derive(Debug, Clone, Serialize)]
pub struct CharacterSummary {
    pub name: &'static str,
    pub default_voice: &'static str,
    pub avatar: &'static str,
}

impl From<Character> for CharacterSummary {
    fn from(c: Character) -> Self {
        let p = c.profile();
        Self {
            name: p.name,
            default_voice: p.default_voice,
            avatar: p.avatar,
        }
    }
}

impl CharacterSummary {
    pub fn all() -> Vec<Self> {
        Character::ALL.into_iter().map(Self::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_events() {
        let frame = json!({"type": "select_character", "character": "Tony Stark"});
        let ev: ClientEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(ev, ClientEvent::SelectCharacter { character: Character::TonyStark });

        let frame = json!({"type": "tune", "stability": 0.3, "similarity_boost": 0.9});
        let ev: ClientEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(ev, ClientEvent::Tune { stability: 0.3, similarity_boost: 0.9 });

        let frame = json!({"type": "submit", "text": "Who are you?"});
        let ev: ClientEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(ev, ClientEvent::Submit { text: "Who are you?".into() });
    }

    #[test]
    fn rejects_unknown_character() {
        let frame = json!({"type": "select_character", "character": "Moriarty"});
        let res = serde_json::from_value::<ClientEvent>(frame);
        assert!(res.is_err());
    }

    #[test]
    fn server_events_are_tagged() {
        let ev = ServerEvent::Phase { phase: TurnPhase::AwaitingAudio };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"type": "phase", "phase": "awaiting_audio"})
        );

        let ev = ServerEvent::Notice {
            level: NoticeLevel::Warning,
            text: "careful".into(),
        };
        assert_eq!(
            serde_json::to_value(&ev).unwrap(),
            json!({"type": "notice", "level": "warning", "text": "careful"})
        );

        let ev = ServerEvent::Message {
            character: Character::WednesdayAddams,
            message: Message::user("Hi"),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["character"], "Wednesday Addams");
        assert_eq!(v["message"]["content"], "Hi");
    }

    #[test]
    fn snapshot_lists_registry() {
        let snap = Snapshot {
            characters: CharacterSummary::all(),
            current: Character::SherlockHolmes,
            history: Vec::new(),
            voices: Vec::new(),
            selection: VoiceSelection::default(),
            phase: TurnPhase::Idle,
        };
        let v = serde_json::to_value(ServerEvent::Snapshot(snap)).unwrap();
        assert_eq!(v["type"], "snapshot");
        assert_eq!(v["characters"].as_array().unwrap().len(), 3);
        assert_eq!(v["characters"][0]["avatar"], "🕵️");
        assert_eq!(v["current"], "Sherlock Holmes");
        assert!(v["selection"]["voice"].is_null());
    }
}
