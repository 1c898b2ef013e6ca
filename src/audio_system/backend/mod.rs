//! Audio output backends
//!
//! Platform-independent abstraction over the output device. The playback graph
//! only talks to these traits:
//!
//! ```text
//! AudioPlatform ──open_device()──> AudioDevice ──create_gain_node()──> GainNode
//!                                                                        │
//!                                  start(buffer, master, on_ended) ──────┘
//! ```
//!
//! A `GainNode` is reusable: each `start` plays a fresh one-shot source through
//! it and fires `on_ended` once the source finishes.
//!
//! Not `Send`: the device is owned by the thread that runs the engine.

pub mod headless;
pub mod rodio_backend;

use crossbeam_channel::Sender;

use super::buffer::AudioBuffer;
use super::gain::MasterGain;
use crate::error::AudioError;

pub use headless::HeadlessPlatform;
pub use rodio_backend::RodioPlatform;

slotmap::new_key_type! {
    /// Generational handle of one started sound
    pub struct VoiceId;
}

/// Output device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Running,
    /// Output paused by the host; must be resumed before sound is heard
    Suspended,
    Closed,
}

/// Completion notification for one started voice
///
/// Sent from the audio thread back to the engine's thread, which releases the
/// voice's resources when it drains the channel.
#[derive(Debug, Clone)]
pub struct Completion {
    voice: VoiceId,
    sender: Sender<VoiceId>,
}

impl Completion {
    pub fn new(voice: VoiceId, sender: Sender<VoiceId>) -> Self {
        Self { voice, sender }
    }

    pub fn voice(&self) -> VoiceId {
        self.voice
    }

    /// Report that the voice finished. Sending after the engine is gone is fine.
    pub fn notify(&self) {
        let _ = self.sender.send(self.voice);
    }
}

/// Factory for output devices
pub trait AudioPlatform {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Open the output device
    ///
    /// # Errors
    /// `AudioUnavailable` when the host has no usable audio output.
    fn open_device(&self) -> Result<Box<dyn AudioDevice>, AudioError>;
}

/// An open output device
pub trait AudioDevice {
    fn state(&self) -> DeviceState;

    /// Resume a suspended device
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Allocate a per-sound gain node feeding the master gain
    fn create_gain_node(&mut self) -> Result<Box<dyn GainNode>, AudioError>;

    /// Release the device; later calls on nodes are no-ops
    fn close(&mut self);
}

/// Per-sound gain stage
pub trait GainNode {
    fn set_gain(&mut self, gain: f32);

    fn gain(&self) -> f32;

    /// Play `buffer` once through this node and the master gain
    fn start(
        &mut self,
        buffer: &AudioBuffer,
        master: &MasterGain,
        on_ended: Completion,
    ) -> Result<(), AudioError>;

    /// Stop whatever this node is playing. Stopping an idle node is fine.
    fn stop(&mut self);
}
