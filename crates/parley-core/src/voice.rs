//! Which catalog voice and tuning a turn is spoken with.

use serde::Serialize;

use crate::characters::Character;
use crate::types::{VoiceInfo, VoiceSettings};

/// The voice and tuning in effect for the active character.
///
/// `voice` is `None` when the catalog is empty (e.g. the speech credential is
/// missing), in which case synthesis is skipped.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VoiceSelection {
    pub voice: Option<VoiceInfo>,
    #[serde(flatten)]
    pub settings: VoiceSettings,
}

impl VoiceSelection {
    /// Default voice for `character`: the catalog entry whose name matches the
    /// profile's default voice, otherwise the first entry.
    pub fn for_character(
        catalog: &[VoiceInfo],
        character: Character,
        settings: VoiceSettings,
    ) -> Self {
        Self {
            voice: default_voice(catalog, character.profile().default_voice).cloned(),
            settings,
        }
    }

    pub fn voice_id(&self) -> Option<&str> {
        self.voice.as_ref().map(|v| v.voice_id.as_str())
    }

    /// Switch to the catalog voice with `voice_id`. Returns `false` (and keeps
    /// the current voice) if the id is not in the catalog.
    pub fn choose(&mut self, catalog: &[VoiceInfo], voice_id: &str) -> bool {
        match catalog.iter().find(|v| v.voice_id == voice_id) {
            Some(v) => {
                self.voice = Some(v.clone());
                true
            }
            None => false,
        }
    }
}

fn default_voice<'a>(catalog: &'a [VoiceInfo], label: &str) -> Option<&'a VoiceInfo> {
    catalog
        .iter()
        .find(|v| v.name == label)
        .or_else(|| catalog.first())
}

/// Find a catalog voice by display name (case-insensitive).
pub fn find_by_name<'a>(catalog: &'a [VoiceInfo], name: &str) -> Option<&'a VoiceInfo> {
    catalog.iter().find(|v| v.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VoiceInfo> {
        ["Rachel", "Antoni", "Josh"]
            .iter()
            .map(|n| VoiceInfo {
                name: n.to_string(),
                voice_id: format!("id-{}", n.to_lowercase()),
            })
            .collect()
    }

    #[test]
    fn default_voice_matches_profile() {
        let sel = VoiceSelection::for_character(
            &catalog(),
            Character::SherlockHolmes,
            VoiceSettings::default(),
        );
        assert_eq!(sel.voice_id(), Some("id-antoni"));
        let sel = VoiceSelection::for_character(
            &catalog(),
            Character::TonyStark,
            VoiceSettings::default(),
        );
        assert_eq!(sel.voice_id(), Some("id-josh"));
    }

    #[test]
    fn falls_back_to_first_voice() {
        let only = vec![VoiceInfo {
            name: "Bella".into(),
            voice_id: "id-bella".into(),
        }];
        let sel = VoiceSelection::for_character(
            &only,
            Character::WednesdayAddams,
            VoiceSettings::default(),
        );
        assert_eq!(sel.voice_id(), Some("id-bella"));
    }

    #[test]
    fn empty_catalog_means_no_voice() {
        let sel = VoiceSelection::for_character(
            &[],
            Character::SherlockHolmes,
            VoiceSettings::default(),
        );
        assert_eq!(sel.voice, None);
        assert_eq!(sel.voice_id(), None);
    }

    #[test]
    fn choose_rejects_unknown_ids() {
        let cat = catalog();
        let mut sel = VoiceSelection::for_character(
            &cat,
            Character::SherlockHolmes,
            VoiceSettings::default(),
        );
        assert!(sel.choose(&cat, "id-rachel"));
        assert_eq!(sel.voice_id(), Some("id-rachel"));
        assert!(!sel.choose(&cat, "id-nobody"));
        assert_eq!(sel.voice_id(), Some("id-rachel"));
    }

    #[test]
    fn serializes_flat() {
        let sel = VoiceSelection::for_character(
            &catalog(),
            Character::TonyStark,
            VoiceSettings::clamped(0.25, 0.75),
        );
        let json = serde_json::to_value(&sel).unwrap();
        assert_eq!(json["voice"]["name"], "Josh");
        assert_eq!(json["stability"], 0.25);
        assert_eq!(json["similarity_boost"], 0.75);
    }

    #[test]
    fn lookup_by_name() {
        let cat = catalog();
        assert_eq!(find_by_name(&cat, "josh").map(|v| v.voice_id.as_str()), Some("id-josh"));
        assert!(find_by_name(&cat, "Adam").is_none());
    }
}
