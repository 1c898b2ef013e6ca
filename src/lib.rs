//! keyclack: mechanical keyboard click sounds for every keystroke
//!
//! The library holds the sound engine and its glue; the `keyclack` binary wires
//! it to a global keyboard hook and the default audio output.

pub mod audio_system;
pub mod config;
pub mod error;
pub mod listener;
pub mod messaging;
pub mod orchestrator;
pub mod settings;
pub mod sound;

pub use audio_system::KeySoundEngine;
pub use config::{Config, EngineConfig};
pub use error::{AppResult, AudioError};
pub use orchestrator::Orchestrator;
