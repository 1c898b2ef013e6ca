//! Headless audio backend
//!
//! Accepts playback without producing sound. Used on machines without an audio
//! device and by tests, which can suspend the device, make it fail, and decide
//! when started sounds finish.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioDevice, AudioPlatform, Completion, DeviceState, GainNode};
use crate::audio_system::buffer::AudioBuffer;
use crate::audio_system::gain::MasterGain;
use crate::error::AudioError;

#[derive(Debug)]
struct HeadlessShared {
    unavailable: bool,
    state: DeviceState,
    resume_fails: bool,
    node_creation_fails: bool,
    auto_complete: bool,
    next_node_id: u64,
    nodes_created: usize,
    devices_opened: usize,
    sounds_started: usize,
    /// Started sounds that have not finished yet, by node
    playing: Vec<(u64, Completion)>,
    /// Effective gain (node × master) of every started sound, in order
    started_gains: Vec<f32>,
}

/// Device factory that plays nothing
///
/// Clones share state, so a test can keep one handle while the engine owns
/// another.
#[derive(Debug, Clone)]
pub struct HeadlessPlatform {
    shared: Arc<Mutex<HeadlessShared>>,
}

impl HeadlessPlatform {
    /// Sounds stay "playing" until [`HeadlessPlatform::finish_all`] is called
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(HeadlessShared {
                unavailable: false,
                state: DeviceState::Running,
                resume_fails: false,
                node_creation_fails: false,
                auto_complete: false,
                next_node_id: 0,
                nodes_created: 0,
                devices_opened: 0,
                sounds_started: 0,
                playing: Vec::new(),
                started_gains: Vec::new(),
            })),
        }
    }

    /// Sounds finish as soon as they start
    pub fn auto_complete() -> Self {
        let platform = Self::new();
        platform.shared.lock().auto_complete = true;
        platform
    }

    /// Make `open_device` fail as on a machine without audio output
    pub fn set_unavailable(&self, unavailable: bool) {
        self.shared.lock().unavailable = unavailable;
    }

    /// Put the device into the suspended state
    pub fn suspend(&self) {
        let mut shared = self.shared.lock();
        if shared.state == DeviceState::Running {
            shared.state = DeviceState::Suspended;
        }
    }

    pub fn set_resume_fails(&self, fails: bool) {
        self.shared.lock().resume_fails = fails;
    }

    pub fn set_node_creation_fails(&self, fails: bool) {
        self.shared.lock().node_creation_fails = fails;
    }

    pub fn device_state(&self) -> DeviceState {
        self.shared.lock().state
    }

    /// Finish every playing sound, firing its completion. Returns how many.
    pub fn finish_all(&self) -> usize {
        let finished: Vec<(u64, Completion)> = std::mem::take(&mut self.shared.lock().playing);
        for (_, completion) in &finished {
            completion.notify();
        }
        finished.len()
    }

    /// Finish the oldest playing sound
    pub fn finish_oldest(&self) -> bool {
        let oldest = {
            let mut shared = self.shared.lock();
            if shared.playing.is_empty() {
                None
            } else {
                Some(shared.playing.remove(0))
            }
        };
        match oldest {
            Some((_, completion)) => {
                completion.notify();
                true
            }
            None => false,
        }
    }

    pub fn playing_count(&self) -> usize {
        self.shared.lock().playing.len()
    }

    pub fn sounds_started(&self) -> usize {
        self.shared.lock().sounds_started
    }

    pub fn nodes_created(&self) -> usize {
        self.shared.lock().nodes_created
    }

    pub fn devices_opened(&self) -> usize {
        self.shared.lock().devices_opened
    }

    /// Effective gain of every sound started so far
    pub fn started_gains(&self) -> Vec<f32> {
        self.shared.lock().started_gains.clone()
    }
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlatform for HeadlessPlatform {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn open_device(&self) -> Result<Box<dyn AudioDevice>, AudioError> {
        let mut shared = self.shared.lock();
        if shared.unavailable {
            return Err(AudioError::AudioUnavailable(
                "headless output disabled".into(),
            ));
        }
        if shared.state == DeviceState::Closed {
            shared.state = DeviceState::Running;
        }
        shared.devices_opened += 1;
        Ok(Box::new(HeadlessDevice {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct HeadlessDevice {
    shared: Arc<Mutex<HeadlessShared>>,
}

impl AudioDevice for HeadlessDevice {
    fn state(&self) -> DeviceState {
        self.shared.lock().state
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut shared = self.shared.lock();
        if shared.resume_fails {
            return Err(AudioError::PlaybackFailure(
                "headless device refused to resume".to_string(),
            ));
        }
        if shared.state == DeviceState::Suspended {
            shared.state = DeviceState::Running;
        }
        Ok(())
    }

    fn create_gain_node(&mut self) -> Result<Box<dyn GainNode>, AudioError> {
        let mut shared = self.shared.lock();
        if shared.node_creation_fails {
            return Err(AudioError::PlaybackFailure(
                "headless node allocation failed".to_string(),
            ));
        }
        let id = shared.next_node_id;
        shared.next_node_id += 1;
        shared.nodes_created += 1;
        Ok(Box::new(HeadlessNode {
            id,
            gain: 1.0,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn close(&mut self) {
        let mut shared = self.shared.lock();
        shared.state = DeviceState::Closed;
        shared.playing.clear();
    }
}

struct HeadlessNode {
    id: u64,
    gain: f32,
    shared: Arc<Mutex<HeadlessShared>>,
}

impl GainNode for HeadlessNode {
    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn start(
        &mut self,
        buffer: &AudioBuffer,
        master: &MasterGain,
        on_ended: Completion,
    ) -> Result<(), AudioError> {
        if buffer.is_empty() {
            return Err(AudioError::PlaybackFailure("empty buffer".to_string()));
        }

        let mut shared = self.shared.lock();
        if shared.state == DeviceState::Closed {
            return Err(AudioError::PlaybackFailure("device closed".to_string()));
        }
        shared.sounds_started += 1;
        shared.started_gains.push(self.gain * master.value());

        if shared.auto_complete {
            drop(shared);
            on_ended.notify();
        } else {
            shared.playing.push((self.id, on_ended));
        }
        Ok(())
    }

    fn stop(&mut self) {
        let id = self.id;
        self.shared.lock().playing.retain(|(node, _)| *node != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::VoiceId;
    use crate::audio_system::gain::SystemClock;
    use crossbeam_channel::unbounded;
    use slotmap::SlotMap;

    fn master() -> MasterGain {
        MasterGain::new(1.0, Arc::new(SystemClock::new()))
    }

    #[test]
    fn test_unavailable_platform() {
        let platform = HeadlessPlatform::new();
        platform.set_unavailable(true);
        assert!(matches!(
            platform.open_device(),
            Err(AudioError::AudioUnavailable(_))
        ));
    }

    #[test]
    fn test_manual_completion() {
        let platform = HeadlessPlatform::new();
        let mut device = platform.open_device().unwrap();
        let mut node = device.create_gain_node().unwrap();

        let mut voices: SlotMap<VoiceId, ()> = SlotMap::with_key();
        let id = voices.insert(());
        let (tx, rx) = unbounded();
        let buffer = AudioBuffer::new(44_100, 1, vec![0.1; 64]);

        node.set_gain(0.5);
        node.start(&buffer, &master(), Completion::new(id, tx)).unwrap();
        assert_eq!(platform.playing_count(), 1);
        assert_eq!(platform.started_gains(), vec![0.5]);
        assert!(rx.try_recv().is_err());

        assert_eq!(platform.finish_all(), 1);
        assert_eq!(rx.try_recv().unwrap(), id);
        assert_eq!(platform.playing_count(), 0);
    }

    #[test]
    fn test_stop_drops_pending_completion() {
        let platform = HeadlessPlatform::new();
        let mut device = platform.open_device().unwrap();
        let mut node = device.create_gain_node().unwrap();

        let mut voices: SlotMap<VoiceId, ()> = SlotMap::with_key();
        let (tx, rx) = unbounded();
        let buffer = AudioBuffer::new(44_100, 1, vec![0.1; 64]);

        node.start(&buffer, &master(), Completion::new(voices.insert(()), tx))
            .unwrap();
        node.stop();
        assert_eq!(platform.finish_all(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_suspend_and_resume() {
        let platform = HeadlessPlatform::new();
        let mut device = platform.open_device().unwrap();
        platform.suspend();
        assert_eq!(device.state(), DeviceState::Suspended);

        platform.set_resume_fails(true);
        assert!(device.resume().is_err());
        assert_eq!(device.state(), DeviceState::Suspended);

        platform.set_resume_fails(false);
        device.resume().unwrap();
        assert_eq!(device.state(), DeviceState::Running);
    }

    #[test]
    fn test_close_and_reopen() {
        let platform = HeadlessPlatform::new();
        let mut device = platform.open_device().unwrap();
        device.close();
        assert_eq!(platform.device_state(), DeviceState::Closed);

        let device = platform.open_device().unwrap();
        assert_eq!(device.state(), DeviceState::Running);
        assert_eq!(platform.devices_opened(), 2);
    }
}
