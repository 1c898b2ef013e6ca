/// Command types for the application
///
/// Commands represent requests to perform actions (imperative).
/// They are handled by the orchestrator on its own thread.
use crate::error::CommandError;
use crate::settings::SettingsChange;
use crate::sound::{Action, KeyInput};

/// Application commands
#[derive(Debug, Clone)]
pub enum Command {
    /// A key went down or up
    Key { input: KeyInput, action: Action },

    /// Validated settings updates
    ApplySettings { changes: Vec<SettingsChange> },

    /// Flip mute
    ToggleMute,

    /// Set the volume (0.0-1.0)
    SetVolume { volume: f32 },

    /// Publish engine diagnostics
    ReportStats,

    /// Stop the orchestrator loop
    Shutdown,
}

impl Command {
    /// Key press shortcut
    pub fn press(input: KeyInput) -> Self {
        Command::Key {
            input,
            action: Action::Press,
        }
    }

    /// Key release shortcut
    pub fn release(input: KeyInput) -> Self {
        Command::Key {
            input,
            action: Action::Release,
        }
    }

    /// Parse one console line
    ///
    /// Accepts `set <json object>`, `volume <0.0-1.0>`, `mute`, `stats` and
    /// `quit`. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "set" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("set"));
                }
                let delta: serde_json::Value = serde_json::from_str(rest)?;
                Command::ApplySettings {
                    changes: SettingsChange::parse_delta(&delta)?,
                }
            }
            "volume" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("volume"));
                }
                let volume: f32 = rest
                    .parse()
                    .map_err(|_| CommandError::InvalidVolume(rest.to_string()))?;
                Command::SetVolume { volume }
            }
            "mute" => Command::ToggleMute,
            "stats" => Command::ReportStats,
            "quit" | "exit" => Command::Shutdown,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }

    /// Get a human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            Command::Key { input, action } => {
                format!("Key {}: {}", action, input.identity())
            }
            Command::ApplySettings { changes } => {
                let fields: Vec<&str> = changes.iter().map(|c| c.field()).collect();
                format!("Apply settings: {}", fields.join(", "))
            }
            Command::ToggleMute => "Toggle mute".to_string(),
            Command::SetVolume { volume } => format!("Set volume: {:.2}", volume),
            Command::ReportStats => "Report stats".to_string(),
            Command::Shutdown => "Shutdown".to_string(),
        }
    }
}
