//! The audio pipeline: decode ahead, crossfade, emit frames in real time
//!
//! Two stages connected by a bounded queue of decoded tracks. The decoder
//! stage turns enqueued `TrackInfo`s into PCM buffers off the hot path; the
//! playback stage owns the 20 ms ticker and emits exactly one frame per tick
//! while a track is available, blending track boundaries with a smoothstep
//! crossfade. Skips are observed at frame boundaries and coalesce.

use crate::audio::{
    crossfade::crossfade_frames, decoder, Frame, TrackInfo, FRAME_DURATION, FRAME_SAMPLES,
};
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Depth of the track input queue. Bounded so a full buffer blocks the
/// scheduler (its backpressure signal); deep enough that one finished
/// generation never blocks on its own.
const TRACK_QUEUE_DEPTH: usize = 8;

/// Depth of the decoded-track queue between the two stages.
const DECODED_QUEUE_DEPTH: usize = 4;

/// Frames buffered between the playback stage and the broadcaster.
const FRAME_BUFFER: usize = 100;

/// Frames emitted per second.
const FRAMES_PER_SECOND: f64 = 50.0;

/// A track with its fully decoded PCM buffer.
struct DecodedTrack {
    info: TrackInfo,
    samples: Vec<i16>,
}

#[derive(Default)]
struct PlaybackState {
    current_track: TrackInfo,
    position: Duration,
    duration: Duration,
}

/// Result of offering one frame to the output channel.
enum SendOutcome {
    Sent,
    Skipped,
    Stopped,
}

/// What `play_track` hands back to the outer loop.
enum PlayOutcome {
    /// Track ended; optionally a crossfaded-in successor and its resume frame.
    Finished(Option<(DecodedTrack, usize)>),
    /// Cancelled or downstream closed; stop playback entirely.
    Stopped,
}

/// The real-time audio pipeline.
pub struct Pipeline {
    track_tx: mpsc::Sender<TrackInfo>,
    track_rx: Mutex<Option<mpsc::Receiver<TrackInfo>>>,
    frame_tx: Mutex<Option<mpsc::Sender<Frame>>>,
    frame_rx: Mutex<Option<mpsc::Receiver<Frame>>>,
    skip_tx: mpsc::Sender<()>,
    skip_rx: Mutex<Option<mpsc::Receiver<()>>>,
    crossfade: RwLock<Duration>,
    state: RwLock<PlaybackState>,
}

impl Pipeline {
    /// Create a pipeline with the given initial crossfade duration.
    pub fn new(crossfade_duration: Duration) -> Self {
        let (track_tx, track_rx) = mpsc::channel(TRACK_QUEUE_DEPTH);
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_BUFFER);
        let (skip_tx, skip_rx) = mpsc::channel(1);

        Self {
            track_tx,
            track_rx: Mutex::new(Some(track_rx)),
            frame_tx: Mutex::new(Some(frame_tx)),
            frame_rx: Mutex::new(Some(frame_rx)),
            skip_tx,
            skip_rx: Mutex::new(Some(skip_rx)),
            crossfade: RwLock::new(crossfade_duration),
            state: RwLock::new(PlaybackState::default()),
        }
    }

    /// Take the pipeline's frame output stream. Returns `None` once taken;
    /// the stream itself closes when the pipeline stops.
    pub fn take_frames(&self) -> Option<mpsc::Receiver<Frame>> {
        self.frame_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    /// Offer a track to the playback queue. Blocks while the queue is full;
    /// this is the scheduler's backpressure signal.
    pub async fn enqueue(&self, track: TrackInfo) -> Result<()> {
        self.track_tx
            .send(track)
            .await
            .map_err(|_| Error::Cancelled)
    }

    /// Number of tracks waiting in the input queue.
    pub fn queue_size(&self) -> usize {
        self.track_tx.max_capacity() - self.track_tx.capacity()
    }

    /// Ask the playback loop to abandon the current track at the next frame
    /// boundary. Rapid repeated skips collapse into one.
    pub fn skip(&self) {
        let _ = self.skip_tx.try_send(());
    }

    /// Snapshot of the current track, position, and duration.
    pub fn status(&self) -> (TrackInfo, Duration, Duration) {
        match self.state.read() {
            Ok(state) => (state.current_track.clone(), state.position, state.duration),
            Err(_) => (TrackInfo::default(), Duration::ZERO, Duration::ZERO),
        }
    }

    /// Set the crossfade length used at the next track boundary.
    pub fn set_crossfade(&self, duration: Duration) {
        if let Ok(mut cf) = self.crossfade.write() {
            *cf = duration;
        }
    }

    /// Current crossfade length.
    pub fn crossfade_duration(&self) -> Duration {
        self.crossfade.read().map(|cf| *cf).unwrap_or(Duration::ZERO)
    }

    /// Run the pipeline until the token is cancelled. Owns the master clock;
    /// closes the frame channel on exit.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let Some(track_rx) = self.track_rx.lock().ok().and_then(|mut rx| rx.take()) else {
            error!("pipeline run called twice");
            return;
        };
        let Some(mut skip_rx) = self.skip_rx.lock().ok().and_then(|mut rx| rx.take()) else {
            error!("pipeline run called twice");
            return;
        };
        // Holding the only sender here means the frame channel closes as
        // soon as this function returns.
        let Some(frame_tx) = self.frame_tx.lock().ok().and_then(|mut tx| tx.take()) else {
            error!("pipeline run called twice");
            return;
        };

        let (decoded_tx, mut decoded_rx) = mpsc::channel(DECODED_QUEUE_DEPTH);
        let decoder_cancel = cancel.clone();
        let decoder_stage = tokio::spawn(async move {
            decode_stage(decoder_cancel, track_rx, decoded_tx).await;
        });

        let mut ticker = tokio::time::interval(FRAME_DURATION);
        // A missed tick emits one frame and realigns; no catch-up bursts.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut pending: Option<(DecodedTrack, usize)> = None;

        loop {
            let (track, start_frame) = match pending.take() {
                Some(carried) => carried,
                None => {
                    let track = tokio::select! {
                        _ = cancel.cancelled() => break,
                        next = decoded_rx.recv() => match next {
                            Some(track) => track,
                            None => break,
                        },
                    };
                    // A skip pressed while nothing was playing is a no-op;
                    // don't let it kill the first frame of this track.
                    while skip_rx.try_recv().is_ok() {}
                    (track, 0)
                }
            };

            match self
                .play_track(
                    &cancel,
                    &mut ticker,
                    &frame_tx,
                    &mut decoded_rx,
                    &mut skip_rx,
                    track,
                    start_frame,
                )
                .await
            {
                PlayOutcome::Finished(next) => pending = next,
                PlayOutcome::Stopped => break,
            }
        }

        decoder_stage.abort();
        info!("pipeline stopped");
    }

    /// Play one decoded track, crossfading into the next if one is ready.
    #[allow(clippy::too_many_arguments)]
    async fn play_track(
        &self,
        cancel: &CancellationToken,
        ticker: &mut Interval,
        frame_tx: &mpsc::Sender<Frame>,
        decoded_rx: &mut mpsc::Receiver<DecodedTrack>,
        skip_rx: &mut mpsc::Receiver<()>,
        track: DecodedTrack,
        start_frame: usize,
    ) -> PlayOutcome {
        let samples = &track.samples;
        let total_frames = samples.len() / FRAME_SAMPLES;
        let cf_frames = (self.crossfade_duration().as_secs_f64() * FRAMES_PER_SECOND) as usize;
        let cf_frames = cf_frames.min(total_frames / 2);
        let cf_start = total_frames - cf_frames;

        self.set_track(&track.info, total_frames);
        info!(
            "now playing: {} ({}, genre: {}, frames: {})",
            track.info.name, track.info.id, track.info.genre, total_frames
        );

        // Pre-crossfade frames, verbatim.
        for i in start_frame..cf_start {
            let frame = frame_at(samples, i);
            match self
                .send_frame(cancel, ticker, frame_tx, skip_rx, frame)
                .await
            {
                SendOutcome::Sent => self.update_position(i),
                SendOutcome::Skipped => return PlayOutcome::Finished(None),
                SendOutcome::Stopped => return PlayOutcome::Stopped,
            }
        }

        // Peek for the next track without waiting.
        let next = decoded_rx.try_recv().ok();

        let Some(next) = next else {
            // No successor ready: play the tail as-is and wait.
            for i in cf_start..total_frames {
                let frame = frame_at(samples, i);
                match self
                    .send_frame(cancel, ticker, frame_tx, skip_rx, frame)
                    .await
                {
                    SendOutcome::Sent => self.update_position(i),
                    SendOutcome::Skipped => return PlayOutcome::Finished(None),
                    SendOutcome::Stopped => return PlayOutcome::Stopped,
                }
            }
            return PlayOutcome::Finished(None);
        };

        // Crossfade zone: blend the outgoing tail with the incoming head.
        for i in 0..cf_frames {
            let out_pos = (cf_start + i) * FRAME_SAMPLES;
            let in_pos = i * FRAME_SAMPLES;
            if out_pos + FRAME_SAMPLES > samples.len()
                || in_pos + FRAME_SAMPLES > next.samples.len()
            {
                break;
            }

            let progress = i as f64 / cf_frames as f64;
            let mixed: Frame = crossfade_frames(
                &samples[out_pos..out_pos + FRAME_SAMPLES],
                &next.samples[in_pos..in_pos + FRAME_SAMPLES],
                progress,
            )
            .into();

            match self
                .send_frame(cancel, ticker, frame_tx, skip_rx, mixed)
                .await
            {
                SendOutcome::Sent => self.update_position(cf_start + i),
                // The incoming track is not lost on skip: it simply starts
                // from its own beginning.
                SendOutcome::Skipped => return PlayOutcome::Finished(Some((next, 0))),
                SendOutcome::Stopped => return PlayOutcome::Stopped,
            }
        }

        info!(
            "crossfaded into: {} (genre: {})",
            next.info.id, next.info.genre
        );
        PlayOutcome::Finished(Some((next, cf_frames)))
    }

    /// Wait for the next tick, then push one frame downstream. Cancel and
    /// skip are checked before the frame is committed.
    async fn send_frame(
        &self,
        cancel: &CancellationToken,
        ticker: &mut Interval,
        frame_tx: &mpsc::Sender<Frame>,
        skip_rx: &mut mpsc::Receiver<()>,
        frame: Frame,
    ) -> SendOutcome {
        tokio::select! {
            _ = cancel.cancelled() => return SendOutcome::Stopped,
            _ = skip_rx.recv() => {
                info!("track skipped");
                return SendOutcome::Skipped;
            }
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = cancel.cancelled() => SendOutcome::Stopped,
            sent = frame_tx.send(frame) => match sent {
                Ok(()) => SendOutcome::Sent,
                Err(_) => SendOutcome::Stopped,
            },
        }
    }

    fn set_track(&self, info: &TrackInfo, total_frames: usize) {
        if let Ok(mut state) = self.state.write() {
            state.current_track = info.clone();
            state.duration = FRAME_DURATION * total_frames as u32;
            state.position = Duration::ZERO;
        }
    }

    fn update_position(&self, frame_idx: usize) {
        if let Ok(mut state) = self.state.write() {
            state.position = FRAME_DURATION * frame_idx as u32;
        }
    }
}

/// Cut one frame out of a decoded sample buffer.
fn frame_at(samples: &[i16], index: usize) -> Frame {
    samples[index * FRAME_SAMPLES..(index + 1) * FRAME_SAMPLES].into()
}

/// Decoder stage: turns queued track paths into decoded PCM, dropping any
/// track that fails to decode. Decode errors never reach listeners.
async fn decode_stage(
    cancel: CancellationToken,
    mut track_rx: mpsc::Receiver<TrackInfo>,
    decoded_tx: mpsc::Sender<DecodedTrack>,
) {
    loop {
        let track = tokio::select! {
            _ = cancel.cancelled() => return,
            next = track_rx.recv() => match next {
                Some(track) => track,
                None => return,
            },
        };

        let path = track.path.clone();
        let decoded = tokio::task::spawn_blocking(move || decoder::decode_file(&path)).await;

        let samples = match decoded {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => {
                warn!("decode failed for {}: {e}", track.path.display());
                continue;
            }
            Err(e) => {
                warn!("decode task failed for {}: {e}", track.path.display());
                continue;
            }
        };

        if samples.len() < FRAME_SAMPLES {
            warn!(
                "{} decoded to less than one frame, dropping",
                track.path.display()
            );
            continue;
        }

        let decoded = DecodedTrack {
            info: track,
            samples,
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = decoded_tx.send(decoded) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_starts_empty() {
        let pipeline = Pipeline::new(Duration::from_secs(8));
        assert_eq!(pipeline.queue_size(), 0);
    }

    #[test]
    fn skip_with_nothing_playing_is_absorbed() {
        let pipeline = Pipeline::new(Duration::from_secs(8));
        // Coalesces: many rapid skips leave at most one pending.
        pipeline.skip();
        pipeline.skip();
        pipeline.skip();
        let (track, pos, dur) = pipeline.status();
        assert!(track.id.is_empty());
        assert_eq!(pos, Duration::ZERO);
        assert_eq!(dur, Duration::ZERO);
    }

    #[test]
    fn crossfade_duration_is_mutable() {
        let pipeline = Pipeline::new(Duration::from_secs(8));
        assert_eq!(pipeline.crossfade_duration(), Duration::from_secs(8));
        pipeline.set_crossfade(Duration::from_secs(3));
        assert_eq!(pipeline.crossfade_duration(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn enqueue_tracks_queue_size() {
        let pipeline = Pipeline::new(Duration::from_secs(8));
        pipeline
            .enqueue(TrackInfo {
                id: "t1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        pipeline
            .enqueue(TrackInfo {
                id: "t2".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pipeline.queue_size(), 2);
    }

    #[test]
    fn frame_at_cuts_exact_frames() {
        let samples: Vec<i16> = (0..(FRAME_SAMPLES * 2) as i32).map(|i| i as i16).collect();
        let first = frame_at(&samples, 0);
        let second = frame_at(&samples, 1);
        assert_eq!(first.len(), FRAME_SAMPLES);
        assert_eq!(second.len(), FRAME_SAMPLES);
        assert_eq!(first[0], 0);
        assert_eq!(second[0], FRAME_SAMPLES as i16);
    }
}
