//! Global keyboard listener
//!
//! Hooks the OS keyboard through `rdev` on a dedicated thread and forwards key
//! events to the orchestrator as commands. The configured mute chord becomes
//! `Command::ToggleMute` and its keys make no sound.

use std::collections::HashSet;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use rdev::{listen, EventType, Key};

use crate::config::MuteHotkey;
use crate::messaging::Command;
use crate::sound::KeyInput;

/// Describe an `rdev` key the way browsers name keys: logical key plus
/// physical code
pub fn key_input_for(key: Key) -> KeyInput {
    let (name, code): (&str, &str) = match key {
        Key::Space => (" ", "Space"),
        Key::Return => ("Enter", "Enter"),
        Key::KpReturn => ("Enter", "NumpadEnter"),
        Key::Backspace => ("Backspace", "Backspace"),
        Key::Delete => ("Delete", "Delete"),
        Key::KpDelete => ("Delete", "NumpadDecimal"),
        Key::Tab => ("Tab", "Tab"),
        Key::CapsLock => ("CapsLock", "CapsLock"),
        Key::ShiftLeft => ("Shift", "ShiftLeft"),
        Key::ShiftRight => ("Shift", "ShiftRight"),
        Key::ControlLeft => ("Control", "ControlLeft"),
        Key::ControlRight => ("Control", "ControlRight"),
        Key::Alt => ("Alt", "AltLeft"),
        Key::AltGr => ("AltGraph", "AltRight"),
        Key::MetaLeft => ("Meta", "MetaLeft"),
        Key::MetaRight => ("Meta", "MetaRight"),
        Key::Escape => ("Escape", "Escape"),
        _ => {
            let debug = format!("{:?}", key);
            if let Some(letter) = debug.strip_prefix("Key").filter(|l| l.len() == 1) {
                return KeyInput::new(letter.to_lowercase(), debug.as_str());
            }
            if let Some(digit) = debug.strip_prefix("Num").filter(|d| d.len() == 1) {
                return KeyInput::new(digit, format!("Digit{}", digit));
            }
            return KeyInput::new(debug.to_lowercase(), debug.as_str());
        }
    };
    KeyInput::new(name, code)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Modifiers {
    ctrl: bool,
    alt: bool,
    shift: bool,
    meta: bool,
}

impl Modifiers {
    /// Track a modifier key; returns false for other keys
    fn update(&mut self, key: Key, down: bool) -> bool {
        match key {
            Key::ControlLeft | Key::ControlRight => self.ctrl = down,
            Key::Alt | Key::AltGr => self.alt = down,
            Key::ShiftLeft | Key::ShiftRight => self.shift = down,
            Key::MetaLeft | Key::MetaRight => self.meta = down,
            _ => return false,
        }
        true
    }
}

/// Turns raw hook events into commands
#[derive(Debug)]
pub struct KeyTranslator {
    hotkey: MuteHotkey,
    modifiers: Modifiers,
    /// Chord keys whose release must stay silent too
    swallowed: HashSet<String>,
}

impl KeyTranslator {
    pub fn new(hotkey: MuteHotkey) -> Self {
        Self {
            hotkey,
            modifiers: Modifiers::default(),
            swallowed: HashSet::new(),
        }
    }

    fn is_chord(&self, input: &KeyInput) -> bool {
        self.hotkey.enabled
            && input.key.eq_ignore_ascii_case(&self.hotkey.key)
            && self.modifiers
                == Modifiers {
                    ctrl: self.hotkey.ctrl,
                    alt: self.hotkey.alt,
                    shift: self.hotkey.shift,
                    meta: self.hotkey.meta,
                }
    }

    pub fn translate(&mut self, event: &EventType) -> Option<Command> {
        match *event {
            EventType::KeyPress(key) => {
                let input = key_input_for(key);
                if !self.modifiers.update(key, true) && self.is_chord(&input) {
                    self.swallowed.insert(input.identity().to_string());
                    return Some(Command::ToggleMute);
                }
                Some(Command::press(input))
            }
            EventType::KeyRelease(key) => {
                self.modifiers.update(key, false);
                let input = key_input_for(key);
                if self.swallowed.remove(input.identity()) {
                    return None;
                }
                Some(Command::release(input))
            }
            _ => None,
        }
    }
}

/// Start the global hook on its own thread
///
/// The thread lives until the process exits; `rdev` offers no way to unhook.
pub fn spawn(hotkey: MuteHotkey, commands: Sender<Command>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("keyboard-listener".to_string())
        .spawn(move || {
            tracing::info!("Keyboard listener started (mute: {})", hotkey.format());
            let mut translator = KeyTranslator::new(hotkey);
            if let Err(e) = listen(move |event| {
                if let Some(command) = translator.translate(&event.event_type) {
                    let _ = commands.send(command);
                }
            }) {
                tracing::error!("Error setting up keyboard listener: {:?}", e);
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::{classify, KeyCategory};

    #[test]
    fn test_key_names() {
        assert_eq!(key_input_for(Key::KeyA), KeyInput::new("a", "KeyA"));
        assert_eq!(key_input_for(Key::Num7), KeyInput::new("7", "Digit7"));
        assert_eq!(key_input_for(Key::Space), KeyInput::new(" ", "Space"));
        assert_eq!(key_input_for(Key::F5), KeyInput::new("f5", "F5"));
    }

    #[test]
    fn test_keys_classify_as_expected() {
        let cases = [
            (Key::Space, KeyCategory::Space),
            (Key::Return, KeyCategory::Enter),
            (Key::KpReturn, KeyCategory::Enter),
            (Key::Backspace, KeyCategory::Backspace),
            (Key::ShiftRight, KeyCategory::Backspace),
            (Key::AltGr, KeyCategory::Backspace),
            (Key::KeyQ, KeyCategory::Generic),
            (Key::Num0, KeyCategory::Generic),
            (Key::Unknown(999), KeyCategory::Generic),
        ];
        for (key, expected) in cases {
            assert_eq!(classify(&key_input_for(key)), expected, "{:?}", key);
        }
    }

    #[test]
    fn test_mute_chord() {
        let mut translator = KeyTranslator::new(MuteHotkey::default());

        assert!(matches!(
            translator.translate(&EventType::KeyPress(Key::ControlLeft)),
            Some(Command::Key { .. })
        ));
        translator.translate(&EventType::KeyPress(Key::Alt));
        assert!(matches!(
            translator.translate(&EventType::KeyPress(Key::KeyM)),
            Some(Command::ToggleMute)
        ));
        assert!(translator
            .translate(&EventType::KeyRelease(Key::KeyM))
            .is_none());

        translator.translate(&EventType::KeyRelease(Key::Alt));
        translator.translate(&EventType::KeyRelease(Key::ControlLeft));
        assert!(matches!(
            translator.translate(&EventType::KeyPress(Key::KeyM)),
            Some(Command::Key { .. })
        ));
    }

    #[test]
    fn test_partial_chord_is_a_key() {
        let mut translator = KeyTranslator::new(MuteHotkey::default());
        translator.translate(&EventType::KeyPress(Key::ControlLeft));
        assert!(matches!(
            translator.translate(&EventType::KeyPress(Key::KeyM)),
            Some(Command::Key { .. })
        ));
    }

    #[test]
    fn test_mouse_events_are_ignored() {
        let mut translator = KeyTranslator::new(MuteHotkey::default());
        assert!(translator
            .translate(&EventType::MouseMove { x: 1.0, y: 2.0 })
            .is_none());
    }
}
