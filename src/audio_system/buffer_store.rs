/// Decoded buffer store
///
/// Owns every decoded clip, keyed by sound slot. Loading fans out one worker
/// thread per asset and collects results over a channel until a shared
/// deadline; a slow asset only loses its own slot. Failed slots borrow the
/// generic clip of the same action when one loaded.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use serde::Serialize;

use super::buffer::AudioBuffer;
use super::decoder;
use super::fetch::AssetFetcher;
use crate::error::AudioError;
use crate::sound::{SoundCatalog, SoundKey};

/// Preload diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadingStats {
    pub is_complete: bool,
    pub total_files: usize,
    /// Directly loaded plus fallback-substituted slots
    pub loaded_files: usize,
    /// Slots left without a buffer
    pub failed_files: usize,
    /// Slots served by the generic clip of their action
    pub fallback_files: usize,
    pub loaded_buffers: Vec<SoundKey>,
    pub load_time_ms: Option<u64>,
}

/// Outcome of one load batch
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<SoundKey>,
    pub fallbacks: Vec<SoundKey>,
    pub failed: Vec<(SoundKey, AudioError)>,
    pub elapsed: Duration,
}

type LoadResult = (SoundKey, Result<AudioBuffer, AudioError>);

#[derive(Debug, Default)]
pub struct BufferStore {
    buffers: HashMap<SoundKey, Arc<AudioBuffer>>,
    fallbacks: BTreeSet<SoundKey>,
    /// Slots with no buffer after their last load
    failed: BTreeSet<SoundKey>,
    stats: PreloadingStats,
}

impl BufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: SoundKey) -> Option<Arc<AudioBuffer>> {
        self.buffers.get(&key).cloned()
    }

    pub fn contains(&self, key: SoundKey) -> bool {
        self.buffers.contains_key(&key)
    }

    /// Whether `key` is served by its action's generic clip
    pub fn is_fallback(&self, key: SoundKey) -> bool {
        self.fallbacks.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Store an already decoded buffer
    ///
    /// Storing a generic clip re-points the slots that borrow it.
    pub fn insert(&mut self, key: SoundKey, buffer: AudioBuffer) {
        let buffer = Arc::new(buffer);
        self.fallbacks.remove(&key);
        self.failed.remove(&key);
        if key.is_generic() {
            for alias in self.fallbacks.iter().filter(|k| k.generic() == key) {
                self.buffers.insert(*alias, Arc::clone(&buffer));
            }
        }
        self.buffers.insert(key, buffer);
    }

    /// Fetch and decode a single asset, bounded by `timeout`
    ///
    /// A failed non-generic slot borrows its action's generic clip when that
    /// one is already stored, and the call succeeds.
    pub fn load(
        &mut self,
        key: SoundKey,
        asset: &str,
        fetcher: Arc<dyn AssetFetcher>,
        timeout: Duration,
    ) -> Result<(), AudioError> {
        let started = Instant::now();
        let (tx, rx) = unbounded();

        let result = spawn_load(key, asset.to_string(), fetcher, tx).and_then(|()| {
            match rx.recv_timeout(timeout) {
                Ok((_, result)) => result,
                Err(RecvTimeoutError::Timeout) => Err(AudioError::AssetLoadTimeout {
                    asset: asset.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
                Err(RecvTimeoutError::Disconnected) => Err(AudioError::AssetLoadFailure {
                    asset: asset.to_string(),
                    source: "loader thread exited without a result".into(),
                }),
            }
        });

        let outcome = match result {
            Ok(buffer) => {
                self.insert(key, buffer);
                tracing::debug!("Loaded {} from {}", key, asset);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load {} ({}): {}", key, asset, e);
                if self.substitute_generic(key) {
                    Ok(())
                } else {
                    self.failed.insert(key);
                    Err(e)
                }
            }
        };

        let total = self
            .stats
            .total_files
            .max(self.buffers.len() + self.failed.len());
        self.refresh_stats(total, started.elapsed());
        outcome
    }

    /// Load every catalog entry concurrently
    ///
    /// Each load gets `timeout` from the moment the batch starts. Failed slots
    /// fall back to the generic clip of the same action.
    ///
    /// # Errors
    /// `NoBuffersLoaded` when not a single slot ends up with a buffer.
    pub fn load_all(
        &mut self,
        catalog: &SoundCatalog,
        fetcher: Arc<dyn AssetFetcher>,
        timeout: Duration,
    ) -> Result<LoadReport, AudioError> {
        self.clear();
        let started = Instant::now();
        let deadline = started + timeout;
        let total = catalog.len();

        tracing::info!("Preloading {} sound assets", total);

        let (tx, rx) = unbounded::<LoadResult>();
        let mut pending: HashMap<SoundKey, String> = HashMap::new();
        let mut report = LoadReport::default();

        for entry in catalog.entries() {
            match spawn_load(entry.key, entry.asset.clone(), Arc::clone(&fetcher), tx.clone()) {
                Ok(()) => {
                    pending.insert(entry.key, entry.asset);
                }
                Err(e) => report.failed.push((entry.key, e)),
            }
        }
        drop(tx);

        while !pending.is_empty() {
            match rx.recv_deadline(deadline) {
                Ok((key, result)) => {
                    let Some(asset) = pending.remove(&key) else {
                        continue;
                    };
                    match result {
                        Ok(buffer) => {
                            self.insert(key, buffer);
                            report.loaded.push(key);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to load {} ({}): {}", key, asset, e);
                            report.failed.push((key, e));
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    for (key, asset) in pending.drain() {
                        tracing::warn!(
                            "Timed out loading {} ({}) after {}ms",
                            key,
                            asset,
                            timeout.as_millis()
                        );
                        report.failed.push((
                            key,
                            AudioError::AssetLoadTimeout {
                                asset,
                                timeout_ms: timeout.as_millis() as u64,
                            },
                        ));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    for (key, asset) in pending.drain() {
                        report.failed.push((
                            key,
                            AudioError::AssetLoadFailure {
                                asset,
                                source: "loader thread exited without a result".into(),
                            },
                        ));
                    }
                }
            }
        }

        // Substitute the generic clip for failed slots of the same action
        for (key, _) in &report.failed {
            if self.substitute_generic(*key) {
                report.fallbacks.push(*key);
            } else {
                self.failed.insert(*key);
            }
        }

        report.elapsed = started.elapsed();
        report.loaded.sort();
        report.fallbacks.sort();
        self.refresh_stats(total, report.elapsed);

        if self.buffers.is_empty() {
            tracing::error!("No sound assets could be loaded ({} failed)", report.failed.len());
            return Err(AudioError::NoBuffersLoaded {
                failed: report.failed.len(),
            });
        }

        tracing::info!(
            "Preloaded {}/{} sounds in {}ms ({} fallback, {} failed)",
            self.stats.loaded_files,
            total,
            report.elapsed.as_millis(),
            self.stats.fallback_files,
            self.stats.failed_files
        );

        Ok(report)
    }

    pub fn stats(&self) -> PreloadingStats {
        self.stats.clone()
    }

    /// Alias a failed slot to its action's generic clip
    fn substitute_generic(&mut self, key: SoundKey) -> bool {
        if key.is_generic() {
            return false;
        }
        let Some(generic) = self.buffers.get(&key.generic()).cloned() else {
            return false;
        };
        tracing::info!("Using {} as fallback for {}", key.generic(), key);
        self.buffers.insert(key, generic);
        self.fallbacks.insert(key);
        self.failed.remove(&key);
        true
    }

    fn refresh_stats(&mut self, total_files: usize, elapsed: Duration) {
        let mut loaded_buffers: Vec<SoundKey> = self.buffers.keys().copied().collect();
        loaded_buffers.sort();
        let load_time_ms = self.stats.load_time_ms.unwrap_or(0) + elapsed.as_millis() as u64;

        self.stats = PreloadingStats {
            is_complete: true,
            total_files,
            loaded_files: loaded_buffers.len(),
            failed_files: self.failed.len(),
            fallback_files: self.fallbacks.len(),
            loaded_buffers,
            load_time_ms: Some(load_time_ms),
        };
    }

    /// Drop every buffer and reset diagnostics
    pub fn clear(&mut self) {
        self.buffers.clear();
        self.fallbacks.clear();
        self.failed.clear();
        self.stats = PreloadingStats::default();
    }
}

fn spawn_load(
    key: SoundKey,
    asset: String,
    fetcher: Arc<dyn AssetFetcher>,
    tx: Sender<LoadResult>,
) -> Result<(), AudioError> {
    thread::Builder::new()
        .name(format!("load-{}", key))
        .spawn({
            let asset = asset.clone();
            move || {
                let result = fetcher
                    .fetch(&asset)
                    .and_then(|data| decoder::decode(data, &asset));
                // The batch may have given up on us already
                let _ = tx.send((key, result));
            }
        })
        .map(|_| ())
        .map_err(|e| spawn_failed(asset, e))
}

fn spawn_failed(asset: String, e: std::io::Error) -> AudioError {
    AudioError::AssetLoadFailure {
        asset,
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::fetch::SynthFetcher;
    use crate::sound::{synth, KeyCategory};

    fn failing_for(
        failing: &'static [&'static str],
    ) -> Arc<dyn AssetFetcher> {
        Arc::new(move |asset: &str| -> Result<Vec<u8>, AudioError> {
            if failing.contains(&asset) {
                Err(AudioError::AssetLoadFailure {
                    asset: asset.to_string(),
                    source: "not found".into(),
                })
            } else {
                SynthFetcher.fetch(asset)
            }
        })
    }

    #[test]
    fn test_load_all_from_synth() {
        let mut store = BufferStore::new();
        let report = store
            .load_all(&SoundCatalog::standard(), Arc::new(SynthFetcher), Duration::from_secs(10))
            .unwrap();

        assert_eq!(report.loaded.len(), 8);
        assert!(report.failed.is_empty());
        assert_eq!(store.len(), 8);

        let stats = store.stats();
        assert!(stats.is_complete);
        assert_eq!(stats.total_files, 8);
        assert_eq!(stats.loaded_files, 8);
        assert_eq!(stats.failed_files, 0);
        assert!(stats.load_time_ms.is_some());
    }

    #[test]
    fn test_fallback_to_generic() {
        let mut store = BufferStore::new();
        let report = store
            .load_all(
                &SoundCatalog::standard(),
                failing_for(&["press/backspace.wav"]),
                Duration::from_secs(10),
            )
            .unwrap();

        let backspace = SoundKey::press(KeyCategory::Backspace);
        assert_eq!(report.fallbacks, vec![backspace]);
        assert!(store.is_fallback(backspace));
        assert_eq!(store.get(backspace), store.get(SoundKey::press(KeyCategory::Generic)));

        let stats = store.stats();
        assert_eq!(stats.loaded_files, 8);
        assert_eq!(stats.fallback_files, 1);
        assert_eq!(stats.failed_files, 0);
        assert!(stats.loaded_buffers.contains(&backspace));
    }

    #[test]
    fn test_no_fallback_without_generic() {
        let mut store = BufferStore::new();
        store
            .load_all(
                &SoundCatalog::standard(),
                failing_for(&["release/generic.wav", "release/space.wav"]),
                Duration::from_secs(10),
            )
            .unwrap();

        assert!(store.get(SoundKey::release(KeyCategory::Space)).is_none());
        assert!(store.get(SoundKey::release(KeyCategory::Generic)).is_none());
        assert!(store.get(SoundKey::release(KeyCategory::Enter)).is_some());

        let stats = store.stats();
        assert_eq!(stats.loaded_files, 6);
        assert_eq!(stats.failed_files, 2);
    }

    #[test]
    fn test_all_failures_is_fatal() {
        let mut store = BufferStore::new();
        let fetcher: Arc<dyn AssetFetcher> =
            Arc::new(|asset: &str| -> Result<Vec<u8>, AudioError> {
                Err(AudioError::InvalidFormat(asset.to_string()))
            });

        let result = store.load_all(&SoundCatalog::standard(), fetcher, Duration::from_secs(10));
        assert!(matches!(result, Err(AudioError::NoBuffersLoaded { failed: 8 })));
        assert!(store.is_empty());
        assert_eq!(store.stats().loaded_files, 0);
        assert_eq!(store.stats().failed_files, 8);
    }

    #[test]
    fn test_slow_asset_times_out_without_blocking_others() {
        let mut store = BufferStore::new();
        let fetcher: Arc<dyn AssetFetcher> =
            Arc::new(|asset: &str| -> Result<Vec<u8>, AudioError> {
                if asset == "press/enter.wav" {
                    thread::sleep(Duration::from_secs(3));
                }
                SynthFetcher.fetch(asset)
            });

        let started = Instant::now();
        let report = store
            .load_all(&SoundCatalog::standard(), fetcher, Duration::from_millis(1000))
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));

        let enter = SoundKey::press(KeyCategory::Enter);
        assert!(report
            .failed
            .iter()
            .any(|(key, e)| *key == enter && matches!(e, AudioError::AssetLoadTimeout { .. })));
        assert!(store.is_fallback(enter));
        assert_eq!(store.stats().loaded_files, 8);
    }

    #[test]
    fn test_single_load() {
        let mut store = BufferStore::new();
        let key = SoundKey::press(KeyCategory::Space);
        store
            .load(key, "press/space.wav", Arc::new(SynthFetcher), Duration::from_secs(10))
            .unwrap();

        let buffer = store.get(key).unwrap();
        assert_eq!(buffer.frames(), synth::render_samples(key).len());
    }

    #[test]
    fn test_single_load_timeout() {
        let mut store = BufferStore::new();
        let fetcher: Arc<dyn AssetFetcher> =
            Arc::new(|asset: &str| -> Result<Vec<u8>, AudioError> {
                thread::sleep(Duration::from_millis(500));
                SynthFetcher.fetch(asset)
            });

        let result = store.load(
            SoundKey::press(KeyCategory::Space),
            "press/space.wav",
            fetcher,
            Duration::from_millis(20),
        );
        assert!(matches!(result, Err(AudioError::AssetLoadTimeout { timeout_ms: 20, .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_single_load_falls_back_to_generic() {
        let mut store = BufferStore::new();
        let generic = SoundKey::press(KeyCategory::Generic);
        let backspace = SoundKey::press(KeyCategory::Backspace);
        let fetcher = failing_for(&["press/backspace.wav"]);

        store
            .load(generic, "press/generic.wav", Arc::clone(&fetcher), Duration::from_secs(10))
            .unwrap();
        let stats = store.stats();
        assert!(stats.is_complete);
        assert_eq!(stats.loaded_files, 1);
        assert_eq!(stats.loaded_buffers, vec![generic]);

        store
            .load(backspace, "press/backspace.wav", fetcher, Duration::from_secs(10))
            .unwrap();
        assert!(store.is_fallback(backspace));
        assert_eq!(store.get(backspace), store.get(generic));

        let stats = store.stats();
        assert_eq!(stats.loaded_files, 2);
        assert_eq!(stats.fallback_files, 1);
        assert_eq!(stats.failed_files, 0);
        assert!(stats.loaded_buffers.contains(&backspace));
    }

    #[test]
    fn test_single_load_failure_without_generic() {
        let mut store = BufferStore::new();
        let enter = SoundKey::release(KeyCategory::Enter);

        let result = store.load(
            enter,
            "release/enter.wav",
            failing_for(&["release/enter.wav"]),
            Duration::from_secs(10),
        );
        assert!(matches!(result, Err(AudioError::AssetLoadFailure { .. })));
        assert!(store.get(enter).is_none());

        let stats = store.stats();
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.loaded_files, 0);
        assert_eq!(stats.failed_files, 1);

        // A later successful load clears the failure
        store
            .load(enter, "release/enter.wav", Arc::new(SynthFetcher), Duration::from_secs(10))
            .unwrap();
        assert_eq!(store.stats().failed_files, 0);
        assert_eq!(store.stats().loaded_files, 1);
    }

    #[test]
    fn test_reloading_generic_updates_aliases() {
        let mut store = BufferStore::new();
        store
            .load_all(
                &SoundCatalog::standard(),
                failing_for(&["press/space.wav"]),
                Duration::from_secs(10),
            )
            .unwrap();

        let generic = SoundKey::press(KeyCategory::Generic);
        let space = SoundKey::press(KeyCategory::Space);
        store.insert(generic, AudioBuffer::new(8_000, 1, vec![0.5; 16]));
        assert_eq!(store.get(space), store.get(generic));
        assert!(store.is_fallback(space));
    }

    #[test]
    fn test_spawn_failure_names_the_asset() {
        let err = spawn_failed(
            "press/space.wav".to_string(),
            std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads"),
        );
        assert!(matches!(
            err,
            AudioError::AssetLoadFailure { ref asset, .. } if asset == "press/space.wav"
        ));
    }

    #[test]
    fn test_clear_resets_stats() {
        let mut store = BufferStore::new();
        store
            .load_all(&SoundCatalog::standard(), Arc::new(SynthFetcher), Duration::from_secs(10))
            .unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats(), PreloadingStats::default());
    }
}
