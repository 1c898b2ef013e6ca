/// Sound slot identifiers
///
/// A `SoundKey` names one playable clip: what happened to the key (press or
/// release) and which family of key it was.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key action that produced the sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Press,
    Release,
}

/// Key family with its own sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyCategory {
    /// Letters, digits, punctuation and anything not listed below
    Generic,

    /// Backspace, delete and the modifier keys
    Backspace,

    Enter,

    Space,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Press, Action::Release];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Press => "press",
            Action::Release => "release",
        }
    }
}

impl KeyCategory {
    pub const ALL: [KeyCategory; 4] = [
        KeyCategory::Generic,
        KeyCategory::Backspace,
        KeyCategory::Enter,
        KeyCategory::Space,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyCategory::Generic => "generic",
            KeyCategory::Backspace => "backspace",
            KeyCategory::Enter => "enter",
            KeyCategory::Space => "space",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for KeyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a sound identifier cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSoundKeyError(pub String);

impl fmt::Display for ParseSoundKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unrecognized sound identifier: {}", self.0)
    }
}

impl std::error::Error for ParseSoundKeyError {}

impl FromStr for Action {
    type Err = ParseSoundKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "press" | "down" => Ok(Action::Press),
            "release" | "up" => Ok(Action::Release),
            _ => Err(ParseSoundKeyError(s.to_string())),
        }
    }
}

impl FromStr for KeyCategory {
    type Err = ParseSoundKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(KeyCategory::Generic),
            "backspace" => Ok(KeyCategory::Backspace),
            "enter" => Ok(KeyCategory::Enter),
            "space" => Ok(KeyCategory::Space),
            _ => Err(ParseSoundKeyError(s.to_string())),
        }
    }
}

/// One logical sound slot (action × key category)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundKey {
    pub action: Action,
    pub category: KeyCategory,
}

impl SoundKey {
    pub fn new(action: Action, category: KeyCategory) -> Self {
        Self { action, category }
    }

    pub fn press(category: KeyCategory) -> Self {
        Self::new(Action::Press, category)
    }

    pub fn release(category: KeyCategory) -> Self {
        Self::new(Action::Release, category)
    }

    /// The generic slot for the same action, used as a fallback
    pub fn generic(&self) -> Self {
        Self::new(self.action, KeyCategory::Generic)
    }

    pub fn is_generic(&self) -> bool {
        self.category == KeyCategory::Generic
    }

    /// Every slot, press slots first
    pub fn all() -> impl Iterator<Item = SoundKey> {
        Action::ALL.into_iter().flat_map(|action| {
            KeyCategory::ALL
                .into_iter()
                .map(move |category| SoundKey::new(action, category))
        })
    }
}

impl fmt::Display for SoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.category)
    }
}

impl FromStr for SoundKey {
    type Err = ParseSoundKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, category) = s
            .split_once(':')
            .ok_or_else(|| ParseSoundKeyError(s.to_string()))?;
        Ok(SoundKey::new(action.parse()?, category.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_key_display() {
        let key = SoundKey::press(KeyCategory::Backspace);
        assert_eq!(key.to_string(), "press:backspace");
        assert_eq!(SoundKey::release(KeyCategory::Space).to_string(), "release:space");
    }

    #[test]
    fn test_sound_key_parse() {
        let key: SoundKey = "Release:Enter".parse().unwrap();
        assert_eq!(key, SoundKey::release(KeyCategory::Enter));

        assert!("press".parse::<SoundKey>().is_err());
        assert!("press:tab".parse::<SoundKey>().is_err());
    }

    #[test]
    fn test_generic_fallback_slot() {
        let key = SoundKey::release(KeyCategory::Space);
        assert_eq!(key.generic(), SoundKey::release(KeyCategory::Generic));
        assert!(!key.is_generic());
        assert!(key.generic().is_generic());
    }

    #[test]
    fn test_all_slots() {
        let all: Vec<SoundKey> = SoundKey::all().collect();
        assert_eq!(all.len(), 8);
        assert_eq!(all[0], SoundKey::press(KeyCategory::Generic));
        assert_eq!(all[7], SoundKey::release(KeyCategory::Space));
    }
}
