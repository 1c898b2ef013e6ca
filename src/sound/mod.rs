//! Keystroke to sound mapping
//!
//! - `key`: sound slot identifiers (action × key category)
//! - `classifier`: keyboard event → key category
//! - `catalog`: sound slot → asset reference
//! - `synth`: procedurally generated click pack

pub mod catalog;
pub mod classifier;
pub mod key;
pub mod synth;

pub use catalog::{CatalogEntry, SoundCatalog};
pub use classifier::{classify, KeyInput};
pub use key::{Action, KeyCategory, ParseSoundKeyError, SoundKey};
