/// Event types for the application
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use crate::audio_system::{ConcurrentSoundsStats, PreloadingStats, SkipReason};
use crate::settings::Settings;
use crate::sound::SoundKey;

/// Application events
#[derive(Debug, Clone)]
pub enum Event {
    /// Engine initialized and clips preloaded
    Ready { preloading: PreloadingStats },

    /// Engine could not start; key presses stay silent
    InitFailed { message: String },

    SoundPlayed { key: SoundKey },

    SoundSkipped { key: SoundKey, reason: SkipReason },

    MuteToggled { muted: bool },

    VolumeChanged { volume: f32, muted: bool },

    SettingsChanged { settings: Settings },

    /// Answer to `Command::ReportStats`
    Stats {
        preloading: PreloadingStats,
        concurrency: ConcurrentSoundsStats,
    },

    /// An error occurred
    ErrorOccurred { message: String, context: String },

    /// Application is shutting down
    Shutdown,
}

impl Event {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            Event::Ready { preloading } => format!(
                "Ready ({}/{} sounds loaded)",
                preloading.loaded_files, preloading.total_files
            ),
            Event::InitFailed { message } => format!("Initialization failed: {}", message),
            Event::SoundPlayed { key } => format!("Played {}", key),
            Event::SoundSkipped { key, reason } => format!("Skipped {}: {}", key, reason),
            Event::MuteToggled { muted } => {
                if *muted {
                    "Muted".to_string()
                } else {
                    "Unmuted".to_string()
                }
            }
            Event::VolumeChanged { volume, muted } => {
                format!("Volume {:.2}{}", volume, if *muted { " (muted)" } else { "" })
            }
            Event::SettingsChanged { .. } => "Settings changed".to_string(),
            Event::Stats { concurrency, .. } => format!(
                "Stats: {}/{} active",
                concurrency.active_sounds, concurrency.max_concurrent_sounds
            ),
            Event::ErrorOccurred { message, .. } => {
                format!("Error: {}", message)
            }
            Event::Shutdown => "Shutting down".to_string(),
        }
    }
}
