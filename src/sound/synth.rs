/// Click synthesizer
///
/// Generates short mechanical-switch clicks procedurally so the engine has a
/// complete sound pack without any files on disk. Each click is a filtered
/// noise burst (the switch contact) layered with a damped body resonance (the
/// keycap and plate). Clips are encoded as 16-bit mono WAV with hound so they
/// go through the same decode path as recorded packs.
use std::f32::consts::PI;
use std::io::Cursor;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::key::{Action, KeyCategory, SoundKey};
use crate::error::AudioError;

pub const SYNTH_SAMPLE_RATE: u32 = 44_100;

/// Shape of one synthesized click
#[derive(Debug, Clone, Copy)]
struct ClickVoice {
    /// Clip length in milliseconds
    length_ms: u32,
    /// Body resonance frequency in Hz
    body_hz: f32,
    /// Body decay rate (1/s)
    body_decay: f32,
    /// Noise burst decay rate (1/s)
    noise_decay: f32,
    /// Peak amplitude
    amplitude: f32,
    /// Noise to body mix (0 = body only)
    noise_mix: f32,
}

fn voice_for(key: SoundKey) -> ClickVoice {
    let mut voice = match key.category {
        KeyCategory::Generic => ClickVoice {
            length_ms: 60,
            body_hz: 1850.0,
            body_decay: 90.0,
            noise_decay: 380.0,
            amplitude: 0.7,
            noise_mix: 0.55,
        },
        KeyCategory::Backspace => ClickVoice {
            length_ms: 70,
            body_hz: 1500.0,
            body_decay: 80.0,
            noise_decay: 300.0,
            amplitude: 0.75,
            noise_mix: 0.6,
        },
        KeyCategory::Enter => ClickVoice {
            length_ms: 90,
            body_hz: 900.0,
            body_decay: 55.0,
            noise_decay: 260.0,
            amplitude: 0.8,
            noise_mix: 0.5,
        },
        KeyCategory::Space => ClickVoice {
            length_ms: 110,
            body_hz: 420.0,
            body_decay: 40.0,
            noise_decay: 220.0,
            amplitude: 0.85,
            noise_mix: 0.4,
        },
    };

    if key.action == Action::Release {
        voice.length_ms = voice.length_ms * 2 / 3;
        voice.body_hz *= 1.25;
        voice.body_decay *= 1.4;
        voice.amplitude *= 0.55;
        voice.noise_mix *= 0.8;
    }

    voice
}

fn seed_for(key: SoundKey) -> u64 {
    let action = match key.action {
        Action::Press => 0x5eed_0000,
        Action::Release => 0x5eed_1000,
    };
    let category = match key.category {
        KeyCategory::Generic => 1,
        KeyCategory::Backspace => 2,
        KeyCategory::Enter => 3,
        KeyCategory::Space => 4,
    };
    action + category
}

/// Synthesize mono PCM samples in [-1, 1] for a slot. Deterministic per slot.
pub fn render_samples(key: SoundKey) -> Vec<f32> {
    let voice = voice_for(key);
    let mut rng = StdRng::seed_from_u64(seed_for(key));
    let frames = (SYNTH_SAMPLE_RATE * voice.length_ms / 1000) as usize;
    let rate = SYNTH_SAMPLE_RATE as f32;

    // One-pole high-pass keeps the noise bright.
    let mut prev_in = 0.0f32;
    let mut prev_out = 0.0f32;
    let hp = 0.85f32;

    let mut samples = Vec::with_capacity(frames);
    for i in 0..frames {
        let t = i as f32 / rate;
        let white: f32 = rng.gen_range(-1.0..=1.0);
        let bright = hp * (prev_out + white - prev_in);
        prev_in = white;
        prev_out = bright;

        let noise = bright * (-t * voice.noise_decay).exp();
        let body = (2.0 * PI * voice.body_hz * t).sin() * (-t * voice.body_decay).exp();
        let attack = (t * rate / 32.0).min(1.0);

        let sample =
            attack * voice.amplitude * (voice.noise_mix * noise + (1.0 - voice.noise_mix) * body);
        samples.push(sample.clamp(-1.0, 1.0));
    }
    samples
}

/// Encode mono samples as a 16-bit PCM WAV file in memory
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::InvalidFormat(e.to_string()))?;
        for sample in samples {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| AudioError::InvalidFormat(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::InvalidFormat(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Synthesize a slot and return it as WAV bytes
pub fn render_wav(key: SoundKey) -> Result<Vec<u8>, AudioError> {
    encode_wav(&render_samples(key), SYNTH_SAMPLE_RATE)
}
