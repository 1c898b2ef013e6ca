/// Audio system module
///
/// Low-latency playback of short key clips:
/// - Concurrent preloading with per-asset timeouts and generic fallbacks
/// - Pooled per-sound gain nodes under a bounded concurrency limit
/// - Master volume with mute and linear ramps
///
/// ## Architecture
///
/// ```text
/// KeySoundEngine
///   ├── BufferStore        SoundKey -> Arc<AudioBuffer>
///   │     └── AssetFetcher (synth / directory / url) -> decoder
///   ├── PlaybackGraph
///   │     ├── AudioPlatform -> AudioDevice (rodio / headless)
///   │     ├── GainNodePool  (idle nodes)
///   │     ├── voices        (slotmap arena of playing sounds)
///   │     └── MasterGain    (ramped, shared with the audio thread)
///   └── VolumeController   (volume / mute state machine)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use keyclack::audio_system::{KeySoundEngine, RodioPlatform, SystemClock};
///
/// let mut engine = KeySoundEngine::new(
///     config.engine.clone(),
///     Box::new(RodioPlatform),
///     config.engine.sound_source.fetcher(),
///     Arc::new(SystemClock::new()),
/// );
/// engine.initialize()?;
/// engine.play_sound(KeyCategory::Space, Action::Press);
/// ```
pub mod backend;
pub mod buffer;
pub mod buffer_store;
pub mod decoder;
pub mod fetch;
pub mod gain;
pub mod graph;
pub mod manager;
pub mod pool;
pub mod volume;

// Re-export commonly used types
pub use backend::{AudioDevice, AudioPlatform, DeviceState, GainNode, HeadlessPlatform, RodioPlatform, VoiceId};
pub use buffer::AudioBuffer;
pub use buffer_store::{BufferStore, LoadReport, PreloadingStats};
pub use fetch::{AssetFetcher, FileFetcher, HttpFetcher, SynthFetcher};
pub use gain::{Clock, ManualClock, MasterGain, SystemClock};
pub use graph::{ConcurrentSoundsStats, PlayOutcome, PlaybackGraph, SkipReason};
pub use manager::KeySoundEngine;
pub use volume::VolumeController;
