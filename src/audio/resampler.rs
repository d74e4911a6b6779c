//! Sample rate conversion using rubato
//!
//! The generator renders at 48 kHz, so this is normally a no-op; it exists
//! so arbitrary source files still come out at the canonical rate.

use crate::audio::SAMPLE_RATE;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample interleaved audio to the canonical 48 kHz rate.
///
/// Returns the input unchanged when it is already at 48 kHz.
pub fn resample(input: &[f32], input_rate: u32, channels: usize) -> Result<Vec<f32>> {
    if input_rate == SAMPLE_RATE {
        return Ok(input.to_vec());
    }

    debug!(
        "resampling {}Hz -> {}Hz ({} channels)",
        input_rate, SAMPLE_RATE, channels
    );

    let planar_input = deinterleave(input, channels);
    let input_frames = planar_input[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        f64::from(SAMPLE_RATE) / f64::from(input_rate),
        1.0,
        PolynomialDegree::Septic,
        input_frames,
        channels,
    )
    .map_err(|e| Error::Decode(format!("failed to create resampler: {e}")))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Decode(format!("resampling failed: {e}")))?;

    Ok(interleave(planar_output))
}

/// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let num_frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(num_frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }
    planar
}

/// [[L, L, ...], [R, R, ...]] -> [L, R, L, R, ...]
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }
    let channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * channels);
    for frame_idx in 0..num_frames {
        for chan in &planar {
            interleaved.push(chan[frame_idx]);
        }
    }
    interleaved
}
