//! Chunked MP3 streaming over HTTP
//!
//! Each connection gets its own broadcaster subscription and its own LAME
//! encoder, so listeners can join and leave at any point in the stream.

use crate::audio::Frame;
use crate::error::{Error, Result};
use crate::stream::broadcaster::{Broadcaster, ListenerGuard};
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use mp3lame_encoder::{Bitrate, Builder, InterleavedPcm, Quality};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

/// MP3 chunks buffered toward a single HTTP client.
const CHUNK_BUFFER: usize = 32;

/// Serve one live MP3 stream connection.
pub async fn handle_stream(broadcaster: Arc<Broadcaster>) -> Response {
    let mut encoder = match StreamEncoder::new() {
        Ok(encoder) => encoder,
        Err(e) => {
            warn!("mp3 encoder init failed: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut listener = broadcaster.subscribe();
    let guard = ListenerGuard::new(broadcaster.clone(), &listener);
    info!(
        "http listener connected (total: {})",
        broadcaster.listener_count()
    );

    let (chunk_tx, chunk_rx) = mpsc::channel::<std::io::Result<Bytes>>(CHUNK_BUFFER);

    tokio::spawn(async move {
        // Dropping the guard on any exit path unsubscribes the listener.
        let _guard = guard;
        loop {
            let frame: Frame = tokio::select! {
                _ = listener.cancelled.cancelled() => break,
                next = listener.frames.recv() => match next {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let chunk = encoder.encode(&frame);
            if !chunk.is_empty() && chunk_tx.send(Ok(Bytes::from(chunk))).await.is_err() {
                break; // client went away
            }
        }
        info!("http listener disconnected");
    });

    let body = Body::from_stream(ReceiverStream::new(chunk_rx));
    match Response::builder()
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CACHE_CONTROL, "no-cache, no-store")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header("icy-name", "everwave radio")
        .body(body)
    {
        Ok(resp) => resp,
        Err(e) => {
            warn!("stream response build failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// A per-connection LAME encoder for 48 kHz stereo s16 input.
struct StreamEncoder {
    lame: mp3lame_encoder::Encoder,
}

impl StreamEncoder {
    fn new() -> Result<Self> {
        let lame = Builder::new()
            .ok_or_else(|| Error::Encode("failed to create LAME encoder".to_string()))?
            .with_num_channels(crate::audio::CHANNELS as u8)
            .map_err(|e| Error::Encode(format!("lame channels: {e:?}")))?
            .with_sample_rate(crate::audio::SAMPLE_RATE)
            .map_err(|e| Error::Encode(format!("lame sample rate: {e:?}")))?
            .with_brate(Bitrate::Kbps192)
            .map_err(|e| Error::Encode(format!("lame bitrate: {e:?}")))?
            .with_quality(Quality::Best)
            .map_err(|e| Error::Encode(format!("lame quality: {e:?}")))?
            .build()
            .map_err(|e| Error::Encode(format!("lame build: {e:?}")))?;

        Ok(Self { lame })
    }

    /// Encode one interleaved s16 frame. May return an empty chunk while the
    /// encoder fills its internal window.
    fn encode(&mut self, samples: &[i16]) -> Vec<u8> {
        let per_channel = samples.len() / crate::audio::CHANNELS;
        let mut buf: Vec<u8> =
            Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(per_channel));

        match self.lame.encode(InterleavedPcm(samples), buf.spare_capacity_mut()) {
            Ok(written) => {
                // SAFETY: encode filled exactly `written` bytes of spare capacity.
                unsafe { buf.set_len(written) };
            }
            Err(e) => {
                warn!("lame encode error: {e:?}");
                buf.clear();
            }
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::FRAME_SAMPLES;

    #[test]
    fn encoder_produces_mp3_sync_frames() {
        let mut encoder = StreamEncoder::new().unwrap();

        // A second of silence pushes LAME past its internal buffering.
        let silence = vec![0i16; FRAME_SAMPLES];
        let mut out = Vec::new();
        for _ in 0..50 {
            out.extend(encoder.encode(&silence));
        }

        assert!(!out.is_empty(), "mp3 output should not be empty");
        // Raw LAME output starts on a sync word (no ID3 tag is written).
        assert_eq!(out[0], 0xFF, "expected MP3 sync byte, got {:#04x}", out[0]);
    }

    #[test]
    fn encoder_handles_single_frame_without_error() {
        let mut encoder = StreamEncoder::new().unwrap();
        let frame: Vec<i16> = (0..FRAME_SAMPLES as i32).map(|i| (i % 255) as i16).collect();
        // A single 20 ms frame may or may not flush a full MP3 frame; it
        // just must not blow up.
        let _ = encoder.encode(&frame);
    }
}
