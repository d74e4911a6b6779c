//! Audio frame model and canonical PCM format
//!
//! Everything downstream of the decoder speaks one format: 48 kHz, stereo,
//! signed 16-bit interleaved samples, cut into 20 ms frames.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod crossfade;
pub mod decoder;
pub mod resampler;

/// Samples per second per channel.
pub const SAMPLE_RATE: u32 = 48_000;

/// Number of channels (stereo).
pub const CHANNELS: usize = 2;

/// Wall-time length of one frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Samples per channel per 20 ms frame.
pub const FRAME_SIZE: usize = 960;

/// Total interleaved samples per frame.
pub const FRAME_SAMPLES: usize = FRAME_SIZE * CHANNELS;

/// Bytes per frame (s16 = 2 bytes per sample).
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

/// One 20 ms frame of interleaved s16 PCM, shared read-only by every
/// broadcaster subscriber it reaches. Always exactly [`FRAME_SAMPLES`] long.
pub type Frame = Arc<[i16]>;

/// Identifies a generated track for the pipeline.
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    /// Opaque task id assigned by the generator.
    pub id: String,
    /// Genre label from the mood graph.
    pub genre: String,
    /// Local filesystem path to the rendered audio file.
    pub path: PathBuf,
    /// Human-readable display name.
    pub name: String,
}

/// Convert s16 samples to little-endian bytes for the encoder boundary.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        buf.extend_from_slice(&s.to_le_bytes());
    }
    buf
}
