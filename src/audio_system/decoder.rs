/// Audio decoding
///
/// Decodes an in-memory sound file (WAV, MP3, OGG, FLAC, AAC) into an
/// `AudioBuffer` with symphonia. The asset reference only serves as a format
/// hint; the container is probed from the data.
use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::AudioBuffer;
use crate::error::AudioError;

/// Decode a complete sound file held in memory
pub fn decode(data: Vec<u8>, asset: &str) -> Result<AudioBuffer, AudioError> {
    if data.is_empty() {
        return Err(AudioError::InvalidFormat(format!("{} is empty", asset)));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    // Create a probe hint using the file extension
    let mut hint = Hint::new();
    if let Some((_, ext)) = asset.rsplit_once('.') {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| AudioError::DecodeFailed(Box::new(e)))?;

    let mut format = probed.format;

    // Find the first audio track with a known (decodable) codec
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::InvalidFormat(format!("{} has no audio track", asset)))?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| AudioError::DecodeFailed(Box::new(e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                // End of stream
                break;
            }
            // Track list changed mid-stream; a one-shot clip ends here.
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(AudioError::DecodeFailed(Box::new(err))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);

                let needed = decoded.capacity() as u64;
                let needs_new = sample_buf.as_ref().map_or(true, |buf| {
                    (buf.capacity() as u64) < needed * spec.channels.count() as u64
                });
                if needs_new {
                    sample_buf = Some(SampleBuffer::<f32>::new(needed, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => {
                // Skip the damaged packet
                continue;
            }
            Err(err) => return Err(AudioError::DecodeFailed(Box::new(err))),
        }
    }

    let sample_rate = sample_rate
        .ok_or_else(|| AudioError::InvalidFormat(format!("{} has unknown sample rate", asset)))?;
    let channels = channels
        .ok_or_else(|| AudioError::InvalidFormat(format!("{} has unknown channel count", asset)))?;

    if samples.is_empty() {
        return Err(AudioError::InvalidFormat(format!("{} decoded to no samples", asset)));
    }

    tracing::debug!(
        "Decoded {}: {} samples, {} Hz, {} channel(s)",
        asset,
        samples.len(),
        sample_rate,
        channels
    );

    Ok(AudioBuffer::new(sample_rate, channels, samples))
}
