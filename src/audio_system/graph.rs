/// Playback graph
///
/// Master gain into the output device, a pool of reusable per-sound gain
/// nodes, and an arena of voices that are currently playing.
///
/// ```text
/// buffer ─> [one-shot source] ─> GainNode (pooled) ─> MasterGain ─> device
/// ```
///
/// Completions come back over a channel and are applied on the owner's thread,
/// so every voice is released exactly once.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;
use slotmap::SlotMap;

use super::backend::{AudioDevice, AudioPlatform, Completion, DeviceState, GainNode, VoiceId};
use super::buffer_store::BufferStore;
use super::gain::{Clock, MasterGain};
use super::pool::GainNodePool;
use crate::config::CategoryGains;
use crate::sound::SoundKey;

/// Why a play request produced no sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotInitialized,
    Muted,
    ConcurrencyLimit,
    /// Device was suspended and refused to resume
    DeviceSuspended,
    NoBuffer,
    PlaybackFailed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::NotInitialized => "not initialized",
            SkipReason::Muted => "muted",
            SkipReason::ConcurrencyLimit => "concurrency limit reached",
            SkipReason::DeviceSuspended => "device suspended",
            SkipReason::NoBuffer => "no buffer",
            SkipReason::PlaybackFailed => "playback failed",
        };
        write!(f, "{}", reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started(VoiceId),
    Skipped(SkipReason),
}

impl PlayOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, PlayOutcome::Started(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            PlayOutcome::Started(_) => None,
            PlayOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// Concurrency diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConcurrentSoundsStats {
    pub active_sounds: usize,
    pub max_concurrent_sounds: usize,
    pub pooled_nodes: usize,
    /// Active voices as a percentage of the limit
    pub utilization: f32,
    pub sounds_started: u64,
    pub sounds_skipped: u64,
}

struct ActiveVoice {
    key: SoundKey,
    node: Box<dyn GainNode>,
}

pub struct PlaybackGraph {
    platform: Box<dyn AudioPlatform>,
    device: Option<Box<dyn AudioDevice>>,
    master: MasterGain,
    pool: GainNodePool,
    voices: SlotMap<VoiceId, ActiveVoice>,
    completions_tx: Sender<VoiceId>,
    completions_rx: Receiver<VoiceId>,
    max_concurrent: usize,
    category_gains: CategoryGains,
    sounds_started: u64,
    sounds_skipped: u64,
}

impl PlaybackGraph {
    pub fn new(
        platform: Box<dyn AudioPlatform>,
        clock: Arc<dyn Clock>,
        max_concurrent: usize,
        category_gains: CategoryGains,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (completions_tx, completions_rx) = unbounded();
        Self {
            platform,
            device: None,
            master: MasterGain::new(1.0, clock),
            pool: GainNodePool::with_capacity(max_concurrent),
            voices: SlotMap::with_key(),
            completions_tx,
            completions_rx,
            max_concurrent,
            category_gains,
            sounds_started: 0,
            sounds_skipped: 0,
        }
    }

    /// Open the output device. Calling it again while open does nothing.
    pub fn initialize(&mut self) -> Result<(), crate::error::AudioError> {
        if self.device.is_some() {
            return Ok(());
        }
        let device = self.platform.open_device()?;
        tracing::info!(
            "Playback graph ready on {} backend (max {} concurrent sounds)",
            self.platform.name(),
            self.max_concurrent
        );
        self.device = Some(device);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    pub fn device_state(&self) -> Option<DeviceState> {
        self.device.as_ref().map(|device| device.state())
    }

    pub fn master(&self) -> &MasterGain {
        &self.master
    }

    /// Start one sound. Never fails; problems surface as a skip reason.
    pub fn play_sound(&mut self, key: SoundKey, volume: f32, buffers: &BufferStore) -> PlayOutcome {
        let outcome = self.try_play(key, volume, buffers);
        match outcome {
            PlayOutcome::Started(_) => self.sounds_started += 1,
            PlayOutcome::Skipped(reason) => {
                self.sounds_skipped += 1;
                tracing::trace!("Skipped {}: {}", key, reason);
            }
        }
        outcome
    }

    fn try_play(&mut self, key: SoundKey, volume: f32, buffers: &BufferStore) -> PlayOutcome {
        if self.device.is_none() {
            return PlayOutcome::Skipped(SkipReason::NotInitialized);
        }

        self.process_completions();

        if self.voices.len() >= self.max_concurrent {
            return PlayOutcome::Skipped(SkipReason::ConcurrencyLimit);
        }

        let Some(device) = self.device.as_mut() else {
            return PlayOutcome::Skipped(SkipReason::NotInitialized);
        };
        match device.state() {
            DeviceState::Running => {}
            DeviceState::Suspended => {
                if let Err(e) = device.resume() {
                    tracing::warn!("Failed to resume audio device: {}", e);
                    return PlayOutcome::Skipped(SkipReason::DeviceSuspended);
                }
            }
            DeviceState::Closed => return PlayOutcome::Skipped(SkipReason::PlaybackFailed),
        }

        let Some(buffer) = buffers.get(key) else {
            return PlayOutcome::Skipped(SkipReason::NoBuffer);
        };

        let mut node = match self.pool.acquire() {
            Some(node) => node,
            None => match device.create_gain_node() {
                Ok(node) => node,
                Err(e) => {
                    tracing::warn!("Failed to create gain node: {}", e);
                    return PlayOutcome::Skipped(SkipReason::PlaybackFailed);
                }
            },
        };

        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        node.set_gain(volume * self.category_gains.gain_for(key.category));

        let id = self.voices.insert(ActiveVoice { key, node });
        let completion = Completion::new(id, self.completions_tx.clone());
        let started = self.voices[id].node.start(&buffer, &self.master, completion);

        match started {
            Ok(()) => PlayOutcome::Started(id),
            Err(e) => {
                tracing::warn!("Failed to start {}: {}", key, e);
                if let Some(voice) = self.voices.remove(id) {
                    self.pool.release(voice.node);
                }
                PlayOutcome::Skipped(SkipReason::PlaybackFailed)
            }
        }
    }

    /// Release finished voices back to the pool. Returns how many finished.
    pub fn process_completions(&mut self) -> usize {
        let mut finished = 0;
        while let Ok(id) = self.completions_rx.try_recv() {
            // Stale ids (voice already stopped) no longer resolve
            if let Some(voice) = self.voices.remove(id) {
                tracing::trace!("Voice {} finished", voice.key);
                self.pool.release(voice.node);
                finished += 1;
            }
        }
        finished
    }

    /// Set the master gain, ramping linearly over `ramp` when non-zero
    pub fn set_volume(&mut self, level: f32, ramp: Duration) {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        if ramp.is_zero() {
            self.master.set_immediate(level);
        } else {
            self.master.ramp_to(level, ramp);
        }
    }

    /// Force-stop every active voice; stopped nodes are discarded
    pub fn stop_all_sounds(&mut self) -> usize {
        let stopped = self.voices.len();
        for (_, mut voice) in self.voices.drain() {
            voice.node.stop();
        }
        if stopped > 0 {
            tracing::debug!("Stopped {} active sounds", stopped);
        }
        stopped
    }

    /// Stop everything and release the device. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        self.stop_all_sounds();
        self.pool.clear();
        while self.completions_rx.try_recv().is_ok() {}
        if let Some(mut device) = self.device.take() {
            device.close();
            tracing::info!("Playback graph destroyed");
        }
        self.sounds_started = 0;
        self.sounds_skipped = 0;
    }

    pub fn active_sounds(&self) -> usize {
        self.voices.len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn stats(&self) -> ConcurrentSoundsStats {
        ConcurrentSoundsStats {
            active_sounds: self.voices.len(),
            max_concurrent_sounds: self.max_concurrent,
            pooled_nodes: self.pool.len(),
            utilization: self.voices.len() as f32 / self.max_concurrent as f32 * 100.0,
            sounds_started: self.sounds_started,
            sounds_skipped: self.sounds_skipped,
        }
    }
}

impl Drop for PlaybackGraph {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for PlaybackGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackGraph")
            .field("backend", &self.platform.name())
            .field("initialized", &self.device.is_some())
            .field("active", &self.voices.len())
            .field("pool", &self.pool)
            .field("master", &self.master)
            .finish()
    }
}
