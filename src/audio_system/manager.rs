/// Key sound engine
///
/// Facade tying the buffer store, the playback graph and the volume controller
/// together. Owned by a single thread; every operation takes `&mut self`.
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::backend::AudioPlatform;
use super::buffer_store::{BufferStore, PreloadingStats};
use super::fetch::AssetFetcher;
use super::gain::Clock;
use super::graph::{ConcurrentSoundsStats, PlayOutcome, PlaybackGraph, SkipReason};
use super::volume::VolumeController;
use crate::config::EngineConfig;
use crate::error::AudioError;
use crate::sound::{Action, KeyCategory, SoundCatalog, SoundKey};

pub struct KeySoundEngine {
    config: EngineConfig,
    catalog: SoundCatalog,
    fetcher: Arc<dyn AssetFetcher>,
    buffers: BufferStore,
    graph: PlaybackGraph,
    volume: VolumeController,
    rng: StdRng,
    ready: bool,
}

impl KeySoundEngine {
    pub fn new(
        config: EngineConfig,
        platform: Box<dyn AudioPlatform>,
        fetcher: Arc<dyn AssetFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let graph = PlaybackGraph::new(
            platform,
            clock,
            config.max_concurrent_sounds,
            config.category_gains,
        );
        let volume = VolumeController::new(config.default_volume);
        Self {
            config,
            catalog: SoundCatalog::standard(),
            fetcher,
            buffers: BufferStore::new(),
            graph,
            volume,
            rng: StdRng::from_entropy(),
            ready: false,
        }
    }

    /// Replace the catalog used by the next `initialize`
    pub fn with_catalog(mut self, catalog: SoundCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Fixed jitter seed, for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open the output device and preload every clip
    ///
    /// Returns once the load batch has settled, so any later `play_sound` sees
    /// the final buffer map. Calling it while ready does nothing.
    ///
    /// # Errors
    /// `AudioUnavailable` without an output device, `NoBuffersLoaded` when no
    /// clip could be loaded. The engine stays not ready in both cases.
    pub fn initialize(&mut self) -> Result<(), AudioError> {
        if self.ready {
            return Ok(());
        }

        self.graph.initialize()?;
        self.graph
            .set_volume(self.volume.effective_gain(), Duration::ZERO);

        if let Err(e) = self.buffers.load_all(
            &self.catalog,
            Arc::clone(&self.fetcher),
            self.config.load_timeout(),
        ) {
            tracing::error!("Sound engine initialization failed: {}", e);
            self.graph.destroy();
            return Err(e);
        }

        self.ready = true;
        tracing::info!(
            "Sound engine ready: {} clips, volume {:.2}{}",
            self.buffers.len(),
            self.volume.volume(),
            if self.volume.is_muted() { " (muted)" } else { "" }
        );
        Ok(())
    }

    /// Release the device and every buffer. Volume and mute state survive.
    pub fn destroy(&mut self) {
        self.graph.destroy();
        self.buffers.clear();
        if self.ready {
            tracing::info!("Sound engine destroyed");
        }
        self.ready = false;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Play the clip for `category` and `action`. Never fails.
    pub fn play_sound(&mut self, category: KeyCategory, action: Action) -> PlayOutcome {
        if !self.ready {
            return PlayOutcome::Skipped(SkipReason::NotInitialized);
        }
        if self.volume.is_muted() {
            return PlayOutcome::Skipped(SkipReason::Muted);
        }

        let jitter = self.config.volume_jitter.clamp(0.0, 1.0);
        let volume = if jitter > 0.0 {
            1.0 - self.rng.gen_range(0.0..=jitter)
        } else {
            1.0
        };

        self.graph
            .play_sound(SoundKey::new(action, category), volume, &self.buffers)
    }

    /// Set the volume with the configured ramp
    pub fn set_volume(&mut self, volume: f32) {
        let ramp = self.config.volume_ramp();
        self.set_volume_with_ramp(volume, ramp);
    }

    pub fn set_volume_with_ramp(&mut self, volume: f32, ramp: Duration) {
        let gain = self.volume.set_volume(volume);
        self.graph.set_volume(gain, ramp);
        tracing::debug!(
            "Volume set to {:.2} (muted: {})",
            self.volume.volume(),
            self.volume.is_muted()
        );
    }

    /// Flip mute; returns the new mute flag
    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.volume.toggle_mute();
        self.graph
            .set_volume(self.volume.effective_gain(), self.config.volume_ramp());
        tracing::info!("Sound {}", if muted { "muted" } else { "unmuted" });
        muted
    }

    /// Nominal volume; unaffected by mute
    pub fn volume(&self) -> f32 {
        self.volume.volume()
    }

    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    /// Master gain as currently heard
    pub fn master_gain(&self) -> f32 {
        self.graph.master().value()
    }

    pub fn stop_all_sounds(&mut self) -> usize {
        self.graph.stop_all_sounds()
    }

    /// Release voices whose sounds finished. Returns how many.
    pub fn process_completions(&mut self) -> usize {
        self.graph.process_completions()
    }

    pub fn preloading_stats(&self) -> PreloadingStats {
        self.buffers.stats()
    }

    pub fn concurrent_sounds_stats(&self) -> ConcurrentSoundsStats {
        self.graph.stats()
    }
}

impl std::fmt::Debug for KeySoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySoundEngine")
            .field("ready", &self.ready)
            .field("volume", &self.volume)
            .field("buffers", &self.buffers.len())
            .field("graph", &self.graph)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::HeadlessPlatform;
    use crate::audio_system::fetch::SynthFetcher;
    use crate::audio_system::gain::ManualClock;

    fn engine(platform: &HeadlessPlatform) -> KeySoundEngine {
        KeySoundEngine::new(
            EngineConfig::default(),
            Box::new(platform.clone()),
            Arc::new(SynthFetcher),
            Arc::new(ManualClock::new()),
        )
        .with_seed(7)
    }

    #[test]
    fn test_not_ready_before_initialize() {
        let platform = HeadlessPlatform::new();
        let mut engine = engine(&platform);
        assert!(!engine.is_ready());
        assert_eq!(
            engine.play_sound(KeyCategory::Generic, Action::Press),
            PlayOutcome::Skipped(SkipReason::NotInitialized)
        );
    }

    #[test]
    fn test_initialize_and_play() {
        let platform = HeadlessPlatform::new();
        let mut engine = engine(&platform);
        engine.initialize().unwrap();
        assert!(engine.is_ready());
        assert!(engine
            .play_sound(KeyCategory::Space, Action::Press)
            .is_started());
        assert_eq!(platform.sounds_started(), 1);
    }

    #[test]
    fn test_unavailable_audio_is_fatal() {
        let platform = HeadlessPlatform::new();
        platform.set_unavailable(true);
        let mut engine = engine(&platform);
        let err = engine.initialize().unwrap_err();
        assert!(matches!(err, AudioError::AudioUnavailable(_)));
        assert!(!engine.is_ready());
    }

    #[test]
    fn test_muted_engine_skips() {
        let platform = HeadlessPlatform::new();
        let mut engine = engine(&platform);
        engine.initialize().unwrap();
        assert!(engine.toggle_mute());
        assert_eq!(
            engine.play_sound(KeyCategory::Enter, Action::Release),
            PlayOutcome::Skipped(SkipReason::Muted)
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let platform = HeadlessPlatform::auto_complete();
        let mut engine = engine(&platform);
        engine.set_volume_with_ramp(1.0, Duration::ZERO);
        engine.initialize().unwrap();

        for _ in 0..50 {
            engine.play_sound(KeyCategory::Generic, Action::Press);
            engine.process_completions();
        }
        let jitter = EngineConfig::default().volume_jitter;
        for gain in platform.started_gains() {
            assert!(gain <= 1.0 && gain >= 1.0 - jitter - 1e-6, "gain {}", gain);
        }
    }

    #[test]
    fn test_volume_survives_destroy() {
        let platform = HeadlessPlatform::new();
        let mut engine = engine(&platform);
        engine.initialize().unwrap();
        engine.set_volume_with_ramp(0.3, Duration::ZERO);
        engine.destroy();
        engine.destroy();
        assert_eq!(engine.volume(), 0.3);

        engine.initialize().unwrap();
        assert!((engine.master_gain() - 0.3).abs() < 1e-6);
    }
}
