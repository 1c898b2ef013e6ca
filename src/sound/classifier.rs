//! Keystroke classification
//!
//! Maps a keyboard event description onto the key family whose sound it plays.
//! Priority when several rules could apply: space, then enter, then the heavy
//! keys (backspace and modifiers), then generic.

use super::key::KeyCategory;

/// Keyboard event description
///
/// `key` is the logical key name ("a", " ", "Enter", "Shift"), `code` the
/// physical key code ("KeyA", "Space", "ShiftLeft"). Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub key: String,
    pub code: String,
}

impl KeyInput {
    pub fn new(key: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
        }
    }

    /// Identity used to recognise auto-repeat; the physical code when known
    pub fn identity(&self) -> &str {
        if self.code.is_empty() {
            &self.key
        } else {
            &self.code
        }
    }
}

const SPACE_NAMES: &[&str] = &["space", "spacebar"];
const ENTER_NAMES: &[&str] = &["enter", "return", "numpadenter"];
const HEAVY_NAMES: &[&str] = &[
    "backspace",
    "delete",
    "shift",
    "shiftleft",
    "shiftright",
    "control",
    "controlleft",
    "controlright",
    "alt",
    "altleft",
    "altright",
    "altgraph",
    "meta",
    "metaleft",
    "metaright",
    "os",
    "capslock",
    "tab",
];

fn matches_any(input: &KeyInput, names: &[&str]) -> bool {
    // A literal space is the logical key for the spacebar and trims to nothing.
    let key = if input.key == " " {
        "space".to_string()
    } else {
        input.key.trim().to_ascii_lowercase()
    };
    let code = input.code.trim().to_ascii_lowercase();
    names.iter().any(|name| key == *name || code == *name)
}

/// Classify a keystroke. Total and pure: unknown keys are `Generic`.
pub fn classify(input: &KeyInput) -> KeyCategory {
    if matches_any(input, SPACE_NAMES) {
        KeyCategory::Space
    } else if matches_any(input, ENTER_NAMES) {
        KeyCategory::Enter
    } else if matches_any(input, HEAVY_NAMES) {
        KeyCategory::Backspace
    } else {
        KeyCategory::Generic
    }
}
