//! Audio decoder using symphonia
//!
//! Decodes a rendered track (flac/mp3/wav/ogg) fully into memory as
//! interleaved s16 stereo at 48 kHz. The whole file is decoded in one pass
//! because the crossfade needs the tail of one track and the head of the
//! next at the same time.

use crate::audio::{resampler, CHANNELS};
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode an audio file to interleaved s16 stereo samples at 48 kHz.
///
/// Mono sources are duplicated to both channels; sources with more than two
/// channels are averaged down to stereo.
pub fn decode_file(path: &Path) -> Result<Vec<i16>> {
    debug!("decoding {}", path.display());

    let file = std::fs::File::open(path)
        .map_err(|e| Error::Decode(format!("failed to open {}: {e}", path.display())))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("sample rate not found".to_string()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| Error::Decode("channel count not found".to_string()))?;
    if channels == 0 {
        return Err(Error::Decode("zero channels".to_string()));
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("failed to create decoder: {e}")))?;

    // Decode every packet into one interleaved f32 buffer.
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("error reading packet: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
                });
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(e) => {
                warn!("decode error: {e}");
                continue;
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode(format!(
            "no samples decoded from {}",
            path.display()
        )));
    }

    let stereo = to_stereo(&samples, channels);
    let resampled = resampler::resample(&stereo, sample_rate, CHANNELS)?;

    debug!(
        "decoded {} ({} frames at {}Hz source)",
        path.display(),
        resampled.len() / CHANNELS,
        sample_rate
    );

    Ok(to_s16(&resampled))
}

/// Convert interleaved audio of any channel count to interleaved stereo.
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => {
            let mut stereo = Vec::with_capacity(samples.len() * 2);
            for &s in samples {
                stereo.push(s);
                stereo.push(s);
            }
            stereo
        }
        n => {
            // Average everything beyond the front pair into both channels.
            let mut stereo = Vec::with_capacity(samples.len() / n * 2);
            for frame in samples.chunks_exact(n) {
                let mixed: f32 = frame.iter().sum::<f32>() / n as f32;
                stereo.push(mixed);
                stereo.push(mixed);
            }
            stereo
        }
    }
}

/// Convert normalized f32 samples to s16 with clamping.
///
/// Scales by 32768 (the inverse of the decoder's normalization) so an s16
/// source round-trips exactly.
fn to_s16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_duplicates_to_stereo() {
        let mono = [0.1, 0.2, 0.3];
        assert_eq!(to_stereo(&mono, 1), vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn stereo_passes_through() {
        let stereo = [0.1, -0.1, 0.2, -0.2];
        assert_eq!(to_stereo(&stereo, 2), stereo.to_vec());
    }

    #[test]
    fn multichannel_averages_down() {
        // one 4-channel frame
        let quad = [0.4, 0.0, 0.4, 0.0];
        let stereo = to_stereo(&quad, 4);
        assert_eq!(stereo.len(), 2);
        assert!((stereo[0] - 0.2).abs() < 1e-6);
        assert!((stereo[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn s16_conversion_clamps() {
        let out = to_s16(&[0.0, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], i16::MAX);
        assert_eq!(out[3], i16::MAX);
        assert_eq!(out[4], i16::MIN);
    }

    #[test]
    fn missing_file_is_decode_error() {
        let err = decode_file(Path::new("/nonexistent/track.flac")).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
