//! Rodio audio backend
//!
//! Each gain node is a rodio `Sink`. A started sound reads the decoded buffer
//! in place, scaled by the master gain (re-read every few milliseconds so
//! ramps are heard on sounds already playing), and reports completion when
//! its last sample has been pulled.

use std::sync::Arc;
use std::time::Duration;

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use super::{AudioDevice, AudioPlatform, Completion, DeviceState, GainNode};
use crate::audio_system::buffer::AudioBuffer;
use crate::audio_system::gain::MasterGain;
use crate::error::AudioError;

/// How often a playing sound picks up master gain changes
const MASTER_GAIN_POLL: Duration = Duration::from_millis(5);

/// Opens the system default output device
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioPlatform;

impl AudioPlatform for RodioPlatform {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn open_device(&self) -> Result<Box<dyn AudioDevice>, AudioError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| AudioError::AudioUnavailable(Box::new(e)))?;
        tracing::info!("Opened default audio output device");
        Ok(Box::new(RodioDevice {
            _stream: Some(stream),
            stream_handle: Some(stream_handle),
        }))
    }
}

struct RodioDevice {
    /// Output stream (must be kept alive)
    _stream: Option<OutputStream>,
    stream_handle: Option<OutputStreamHandle>,
}

impl AudioDevice for RodioDevice {
    fn state(&self) -> DeviceState {
        if self.stream_handle.is_some() {
            DeviceState::Running
        } else {
            DeviceState::Closed
        }
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        // cpal streams are never suspended behind our back
        match self.stream_handle {
            Some(_) => Ok(()),
            None => Err(AudioError::PlaybackFailure("output stream closed".to_string())),
        }
    }

    fn create_gain_node(&mut self) -> Result<Box<dyn GainNode>, AudioError> {
        let handle = self
            .stream_handle
            .as_ref()
            .ok_or_else(|| AudioError::PlaybackFailure("output stream closed".to_string()))?;
        let sink = Sink::try_new(handle)
            .map_err(|e| AudioError::PlaybackFailure(format!("Failed to create sink: {}", e)))?;
        Ok(Box::new(RodioGainNode { sink }))
    }

    fn close(&mut self) {
        self.stream_handle = None;
        self._stream = None;
        tracing::info!("Closed audio output device");
    }
}

struct RodioGainNode {
    sink: Sink,
}

impl GainNode for RodioGainNode {
    fn set_gain(&mut self, gain: f32) {
        self.sink.set_volume(gain);
    }

    fn gain(&self) -> f32 {
        self.sink.volume()
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

        self.sink.append(voice_source(buffer, master, on_ended));
        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.stop();
    }
}

/// One-shot playback of a shared buffer
///
/// Notifies `on_ended` once, right after yielding the final sample.
struct SharedSamples {
    samples: Arc<[f32]>,
    position: usize,
    channels: u16,
    sample_rate: u32,
    on_ended: Option<Completion>,
}

impl SharedSamples {
    fn new(buffer: &AudioBuffer, on_ended: Completion) -> Self {
        Self {
            samples: buffer.shared_samples(),
            position: 0,
            channels: buffer.channels(),
            sample_rate: buffer.sample_rate(),
            on_ended: Some(on_ended),
        }
    }
}

impl Iterator for SharedSamples {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        match self.samples.get(self.position) {
            Some(&sample) => {
                self.position += 1;
                Some(sample)
            }
            None => {
                if let Some(on_ended) = self.on_ended.take() {
                    on_ended.notify();
                }
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl Source for SharedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len() - self.position)
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        let frames = self.samples.len() as f64 / self.channels as f64;
        Some(Duration::from_secs_f64(frames / self.sample_rate as f64))
    }
}

/// Buffer playback scaled by the live master gain
fn voice_source(
    buffer: &AudioBuffer,
    master: &MasterGain,
    on_ended: Completion,
) -> impl Source<Item = f32> + Send + 'static {
    let master = master.clone();
    SharedSamples::new(buffer, on_ended)
        .amplify(master.value())
        .periodic_access(MASTER_GAIN_POLL, move |amplified| {
            amplified.set_factor(master.value());
        })
}
