//! The auto-DJ scheduler
//!
//! Keeps the pipeline's track queue fed from the generator, walks the mood
//! graph under a randomized dwell timer, and reconciles manual overrides.
//! Caption, structure, and name generation can each be delegated to an
//! optional hook; a hook that fails, times out, or returns nothing falls
//! back to the static implementations.

use crate::acestep::{self, GenerateRequest};
use crate::audio::TrackInfo;
use crate::autodj::{caption_for, graph, track_name};
use crate::playback::Pipeline;
use rand::Rng;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Budget for one LLM hook invocation; a slow model never delays a track.
const HOOK_TIMEOUT: Duration = Duration::from_secs(15);

/// Backoff after a failed submit.
const GENERATE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Interval between result polls for an in-flight task.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Track duration bounds in seconds.
const MIN_TRACK_DURATION: u32 = 15;
const MAX_TRACK_DURATION: u32 = 300;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Produces a caption for a genre. `None` or empty means "use the static
/// caption".
pub type CaptionFn = Arc<dyn Fn(String) -> BoxFuture<Option<String>> + Send + Sync>;

/// Produces structure tags from (genre, caption). Fallback: `[Instrumental]`.
pub type StructureFn = Arc<dyn Fn(String, String) -> BoxFuture<Option<String>> + Send + Sync>;

/// Produces a display name from (genre, track id, caption). Fallback: the
/// deterministic namer.
pub type NameFn = Arc<dyn Fn(String, String, String) -> BoxFuture<Option<String>> + Send + Sync>;

/// Auto-DJ parameters fixed at startup.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub starting_genre: String,
    /// Seconds per generated track; runtime-mutable via the control plane.
    pub track_duration: u32,
    /// Target pipeline queue depth.
    pub buffer_ahead: usize,
    /// Bounds of the randomized per-genre dwell, in seconds.
    pub dwell_min: u64,
    pub dwell_max: u64,
    pub inference_steps: u32,
    pub guidance_scale: f64,
    pub shift: f64,
    pub audio_format: String,
}

/// Snapshot of the DJ state for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub genre: String,
    pub auto_dj: bool,
    /// Seconds until the next automatic genre transition.
    pub dwell_remaining: f64,
    pub queue_size: usize,
}

struct DjState {
    current_genre: String,
    auto_dj: bool,
    dwell_end: Instant,
    last_caption: String,
    track_duration: u32,
    caption_fn: Option<CaptionFn>,
    structure_fn: Option<StructureFn>,
    name_fn: Option<NameFn>,
}

/// Drives generation and genre transitions.
pub struct Scheduler {
    client: Arc<acestep::Client>,
    pipeline: Arc<Pipeline>,
    cfg: SchedulerConfig,
    state: RwLock<DjState>,
    /// One-slot manual genre override; the newest write wins.
    genre_override: Mutex<Option<String>>,
}

impl Scheduler {
    pub fn new(
        client: Arc<acestep::Client>,
        pipeline: Arc<Pipeline>,
        cfg: SchedulerConfig,
    ) -> Self {
        let state = DjState {
            current_genre: cfg.starting_genre.clone(),
            auto_dj: true,
            dwell_end: Instant::now(),
            last_caption: String::new(),
            track_duration: cfg.track_duration.clamp(MIN_TRACK_DURATION, MAX_TRACK_DURATION),
            caption_fn: None,
            structure_fn: None,
            name_fn: None,
        };
        Self {
            client,
            pipeline,
            cfg,
            state: RwLock::new(state),
            genre_override: Mutex::new(None),
        }
    }

    /// Install the LLM caption hook. Pass `None` to use static captions.
    pub fn set_caption_fn(&self, hook: Option<CaptionFn>) {
        if let Ok(mut state) = self.state.write() {
            state.caption_fn = hook;
        }
    }

    /// Install the LLM structure hook. Pass `None` for `[Instrumental]`.
    pub fn set_structure_fn(&self, hook: Option<StructureFn>) {
        if let Ok(mut state) = self.state.write() {
            state.structure_fn = hook;
        }
    }

    /// Install the LLM name hook. Pass `None` for deterministic names.
    pub fn set_name_fn(&self, hook: Option<NameFn>) {
        if let Ok(mut state) = self.state.write() {
            state.name_fn = hook;
        }
    }

    /// Manually override the current genre. Non-blocking; the newest
    /// override wins if several arrive between loop iterations.
    pub fn set_genre(&self, genre: impl Into<String>) {
        if let Ok(mut slot) = self.genre_override.lock() {
            *slot = Some(genre.into());
        }
    }

    /// Skip the currently playing track.
    pub fn skip(&self) {
        self.pipeline.skip();
    }

    /// Enable or disable automatic genre transitions. Enabling resets the
    /// dwell timer.
    pub fn set_auto_dj(&self, enabled: bool) {
        if let Ok(mut state) = self.state.write() {
            state.auto_dj = enabled;
            if enabled {
                reset_dwell(&mut state, &self.cfg);
            }
        }
    }

    /// Update the duration for future generated tracks, clamped to
    /// [15, 300] seconds.
    pub fn set_track_duration(&self, seconds: u32) {
        let seconds = seconds.clamp(MIN_TRACK_DURATION, MAX_TRACK_DURATION);
        if let Ok(mut state) = self.state.write() {
            state.track_duration = seconds;
        }
        info!("track duration set to {seconds}s");
    }

    /// The current track duration setting in seconds.
    pub fn track_duration(&self) -> u32 {
        self.state
            .read()
            .map(|s| s.track_duration)
            .unwrap_or(MIN_TRACK_DURATION)
    }

    /// The caption used for the most recent generation.
    pub fn last_caption(&self) -> String {
        self.state
            .read()
            .map(|s| s.last_caption.clone())
            .unwrap_or_default()
    }

    /// Current DJ state for the status endpoint.
    pub fn status(&self) -> SchedulerStatus {
        let (genre, auto_dj, dwell_end) = match self.state.read() {
            Ok(state) => (
                state.current_genre.clone(),
                state.auto_dj,
                state.dwell_end,
            ),
            Err(_) => (String::new(), false, Instant::now()),
        };
        SchedulerStatus {
            genre,
            auto_dj,
            dwell_remaining: dwell_end.saturating_duration_since(Instant::now()).as_secs_f64(),
            queue_size: self.pipeline.queue_size(),
        }
    }

    /// Run the auto-DJ loop until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Ok(mut state) = self.state.write() {
            reset_dwell(&mut state, &self.cfg);
        }
        info!("auto-dj started with genre: {}", self.cfg.starting_genre);

        loop {
            if cancel.is_cancelled() {
                return;
            }

            // Drain at most one pending manual override.
            let pending = self.genre_override.lock().ok().and_then(|mut slot| slot.take());
            if let Some(genre) = pending {
                if let Ok(mut state) = self.state.write() {
                    state.current_genre = genre.clone();
                    reset_dwell(&mut state, &self.cfg);
                }
                info!("genre manually set to: {genre}");
            }

            let (auto_dj, expired) = match self.state.read() {
                Ok(state) => (state.auto_dj, Instant::now() >= state.dwell_end),
                Err(_) => (false, false),
            };
            if auto_dj && expired {
                self.transition_genre();
            }

            if self.pipeline.queue_size() < self.cfg.buffer_ahead {
                self.generate_one(&cancel).await;
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                }
            }
        }
    }

    /// Generate one track end to end and enqueue it.
    async fn generate_one(&self, cancel: &CancellationToken) {
        // Snapshot under the read lock; never hold it across network I/O.
        let (genre, track_duration, caption_fn, structure_fn, name_fn) = match self.state.read() {
            Ok(state) => (
                state.current_genre.clone(),
                state.track_duration,
                state.caption_fn.clone(),
                state.structure_fn.clone(),
                state.name_fn.clone(),
            ),
            Err(_) => return,
        };

        let caption = match &caption_fn {
            Some(hook) => run_hook(hook(genre.clone())).await,
            None => None,
        }
        .unwrap_or_else(|| caption_for(&genre));

        if let Ok(mut state) = self.state.write() {
            state.last_caption = caption.clone();
        }

        let lyrics = match &structure_fn {
            Some(hook) => run_hook(hook(genre.clone(), caption.clone())).await,
            None => None,
        }
        .unwrap_or_else(|| "[Instrumental]".to_string());

        info!("generating {genre} track...");

        let request = GenerateRequest {
            caption: caption.clone(),
            lyrics,
            audio_duration: track_duration,
            inference_steps: self.cfg.inference_steps,
            guidance_scale: self.cfg.guidance_scale,
            shift: self.cfg.shift,
            infer_method: "ode".to_string(),
            thinking: true,
            use_cot_caption: true,
            use_cot_language: true,
            vocal_language: "en".to_string(),
            seed: -1,
            use_random_seed: true,
            batch_size: 1,
            audio_format: self.cfg.audio_format.clone(),
        };

        let task_id = match self.client.generate(&request).await {
            Ok(task_id) => task_id,
            Err(e) => {
                error!("generate error: {e}");
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(GENERATE_RETRY_DELAY) => {}
                }
                return;
            }
        };

        let path = match self
            .client
            .poll_until_done(cancel, &task_id, POLL_INTERVAL)
            .await
        {
            Ok(path) => path,
            Err(crate::error::Error::Cancelled) => return,
            Err(e) => {
                error!("poll error for task {task_id}: {e}");
                return;
            }
        };

        let name = match &name_fn {
            Some(hook) => run_hook(hook(genre.clone(), task_id.clone(), caption.clone())).await,
            None => None,
        }
        .unwrap_or_else(|| track_name(&genre, &task_id));

        info!("track ready: {name} [{task_id}] (genre: {genre})");

        let track = TrackInfo {
            id: task_id,
            genre,
            path,
            name,
        };
        // Blocks when the pipeline queue is full; that backpressure is what
        // keeps generation at most buffer_ahead tracks in front of playback.
        if self.pipeline.enqueue(track).await.is_err() {
            info!("pipeline gone, dropping finished track");
        }
    }

    /// Step to a uniformly random neighbor in the mood graph, then reset
    /// the dwell timer either way.
    fn transition_genre(&self) {
        if let Ok(mut state) = self.state.write() {
            let neighbors = graph::adjacent_genres(&state.current_genre);
            if !neighbors.is_empty() {
                let next = neighbors[rand::thread_rng().gen_range(0..neighbors.len())];
                info!("auto-dj transition: {} -> {}", state.current_genre, next);
                state.current_genre = next.to_string();
            }
            reset_dwell(&mut state, &self.cfg);
        }
    }
}

/// Run a hook future under the hook timeout, treating empty output as
/// "no result".
async fn run_hook(fut: BoxFuture<Option<String>>) -> Option<String> {
    tokio::time::timeout(HOOK_TIMEOUT, fut)
        .await
        .ok()
        .flatten()
        .filter(|s| !s.is_empty())
}

/// Draw a fresh dwell interval: `dwell_min + U{0, dwell_max - dwell_min}`,
/// with a non-positive spread treated as one second.
fn reset_dwell(state: &mut DjState, cfg: &SchedulerConfig) {
    let spread = cfg.dwell_max.saturating_sub(cfg.dwell_min).max(1);
    let dwell = cfg.dwell_min + rand::thread_rng().gen_range(0..spread);
    state.dwell_end = Instant::now() + Duration::from_secs(dwell);
}
