//! Character registry: the fixed set of personas and their profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A persona the user can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Character {
    SherlockHolmes,
    WednesdayAddams,
    TonyStark,
}

/// Static profile for a [`Character`].
#[derive(Debug)]
pub struct CharacterProfile {
    pub name: &'static str,
    /// System prompt sent to the language model.
    pub instruction: &'static str,
    /// Voice name looked up in the synthesis catalog.
    pub default_voice: &'static str,
    pub avatar: &'static str,
}

const SHERLOCK_HOLMES: CharacterProfile = CharacterProfile {
    name: "Sherlock Holmes",
    instruction: "You are Sherlock Holmes, the famous detective from Arthur Conan Doyle's stories. \
        You speak with precise, Victorian-era English and exceptional deductive reasoning. You \
        notice small details and make brilliant deductions from them. You're confident, sometimes \
        arrogant, and impatient with those who can't follow your reasoning. You often say phrases \
        like 'Elementary, my dear Watson,' 'The game is afoot,' and 'When you have eliminated the \
        impossible, whatever remains, however improbable, must be the truth.'",
    default_voice: "Antoni",
    avatar: "🕵️",
};

const WEDNESDAY_ADDAMS: CharacterProfile = CharacterProfile {
    name: "Wednesday Addams",
    instruction: "You are Wednesday Addams from the Addams Family. You speak with a deadpan, \
        monotone delivery. Your humor is extremely dark and macabre. You're intelligent and \
        perceptive but socially detached and cynical. You find joy in the morbid and have zero \
        interest in normal social pleasantries. Your responses are brief, sardonic, and often \
        disturbing.",
    default_voice: "Rachel",
    avatar: "👧",
};

const TONY_STARK: CharacterProfile = CharacterProfile {
    name: "Tony Stark",
    instruction: "You are Tony Stark, also known as Iron Man. You speak with quick wit, \
        technological brilliance, and occasional narcissism. Use modern slang, tech jargon, and \
        sarcastic humor. You're confident to the point of arrogance but ultimately heroic. Make \
        references to your suits, tech innovations, and saving the world. Occasionally throw in \
        trademark phrases like 'Genius, billionaire, playboy, philanthropist.'",
    default_voice: "Josh",
    avatar: "🦸",
};

impl Character {
    /// Every character, in picker order. The first one is selected at session start.
    pub const ALL: [Character; 3] = [
        Character::SherlockHolmes,
        Character::WednesdayAddams,
        Character::TonyStark,
    ];

    pub fn profile(self) -> &'static CharacterProfile {
        match self {
            Character::SherlockHolmes => &SHERLOCK_HOLMES,
            Character::WednesdayAddams => &WEDNESDAY_ADDAMS,
            Character::TonyStark => &TONY_STARK,
        }
    }

    pub fn name(self) -> &'static str {
        self.profile().name
    }
}

impl Default for Character {
    fn default() -> Self {
        Character::ALL[0]
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name does not match any registered character.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown character: {0}")]
pub struct UnknownCharacter(pub String);

impl FromStr for Character {
    type Err = UnknownCharacter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Character::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCharacter(s.to_string()))
    }
}

// Characters travel on the wire by display name.
impl Serialize for Character {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Character {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
