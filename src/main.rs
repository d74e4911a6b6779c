//! everwave radio server entry point
//!
//! Wires the components together in dependency order: generator client,
//! pipeline, broadcaster, scheduler, transports, control plane. The only
//! fatal startup condition is the generator never becoming healthy.

use everwave::acestep;
use everwave::api::{self, AppContext};
use everwave::autodj::scheduler::{BoxFuture, CaptionFn, NameFn, StructureFn};
use everwave::autodj::{Scheduler, SchedulerConfig};
use everwave::ollama::{self, CaptionGenerator};
use everwave::playback::Pipeline;
use everwave::stream::webrtc::WebRtcHandler;
use everwave::stream::Broadcaster;
use everwave::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long the generator gets to come up before startup fails.
const GENERATOR_STARTUP_WINDOW: Duration = Duration::from_secs(300);

/// How long the optional LLM gets before the hooks stay static.
const LLM_READY_BUDGET: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "everwave=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("everwave radio starting up...");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutting down...");
            cancel.cancel();
        });
    }

    // Generator client; its health gate is the one fatal startup condition.
    let client = Arc::new(acestep::Client::new(
        &cfg.acestep_api_url,
        &cfg.acestep_api_key,
        cfg.acestep_output_dir.clone(),
    ));
    client
        .wait_for_healthy(&cancel, GENERATOR_STARTUP_WINDOW)
        .await?;

    // Audio pipeline: the master clock and single frame producer.
    let pipeline = Arc::new(Pipeline::new(cfg.crossfade_duration));
    let frames = pipeline
        .take_frames()
        .ok_or_else(|| anyhow::anyhow!("pipeline frame stream unavailable"))?;
    tokio::spawn(pipeline.clone().run(cancel.clone()));

    // Broadcaster: fan the frame stream out to all listeners.
    let broadcaster = Arc::new(Broadcaster::new());
    {
        let broadcaster = broadcaster.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { broadcaster.run(cancel, frames).await });
    }

    // Auto-DJ scheduler keeps the pipeline queue fed.
    let scheduler = Arc::new(Scheduler::new(
        client,
        pipeline.clone(),
        SchedulerConfig {
            starting_genre: cfg.starting_genre.clone(),
            track_duration: cfg.track_duration,
            buffer_ahead: cfg.buffer_ahead,
            dwell_min: cfg.dwell_min,
            dwell_max: cfg.dwell_max,
            inference_steps: cfg.inference_steps,
            guidance_scale: cfg.guidance_scale,
            shift: cfg.shift,
            audio_format: cfg.audio_format.clone(),
        },
    ));

    // Optional LLM enrichment; never blocks or fails startup.
    if !cfg.ollama_url.is_empty() {
        let llm = ollama::Client::new(&cfg.ollama_url, &cfg.ollama_model);
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if llm.wait_for_ready(&cancel, LLM_READY_BUDGET).await {
                install_llm_hooks(&scheduler, llm);
            } else {
                info!("ollama not ready; staying with static captions");
            }
        });
    }

    {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await });
    }

    // Transports and control plane.
    let webrtc = Arc::new(WebRtcHandler::new(broadcaster.clone()));
    let ctx = AppContext {
        scheduler,
        pipeline,
        broadcaster,
        webrtc,
    };
    api::run(cfg.port, ctx, cancel.clone()).await?;

    cancel.cancel();
    info!("everwave stopped");
    Ok(())
}

/// Wire the caption, structure, and name hooks to a ready LLM.
fn install_llm_hooks(scheduler: &Scheduler, llm: ollama::Client) {
    info!("llm hooks enabled (model: {})", llm.model());
    let generator = Arc::new(CaptionGenerator::new(llm));

    let caption_gen = generator.clone();
    let caption_fn: CaptionFn = Arc::new(move |genre: String| -> BoxFuture<Option<String>> {
        let generator = caption_gen.clone();
        Box::pin(async move { generator.generate_caption(&genre).await })
    });
    scheduler.set_caption_fn(Some(caption_fn));

    let structure_gen = generator.clone();
    let structure_fn: StructureFn =
        Arc::new(move |genre: String, caption: String| -> BoxFuture<Option<String>> {
            let generator = structure_gen.clone();
            Box::pin(async move { generator.generate_structure(&genre, &caption).await })
        });
    scheduler.set_structure_fn(Some(structure_fn));

    let name_fn: NameFn = Arc::new(
        move |genre: String, _track_id: String, caption: String| -> BoxFuture<Option<String>> {
            let generator = generator.clone();
            Box::pin(async move { generator.generate_name(&genre, &caption).await })
        },
    );
    scheduler.set_name_fn(Some(name_fn));
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
