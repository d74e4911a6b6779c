//! Environment configuration scenarios
//!
//! One test function mutates the process environment sequentially: separate
//! #[test] functions would race each other over the same variables.

use everwave::Config;
use std::env;
use std::time::Duration;

#[test]
fn environment_overrides_and_fallbacks() {
    // Phase 1: no relevant environment, everything at its default.
    for key in [
        "ACESTEP_API_URL",
        "ACESTEP_API_KEY",
        "ACESTEP_OUTPUT_DIR",
        "RADIO_PORT",
        "RADIO_GENRE",
        "RADIO_TRACK_DURATION",
        "RADIO_CROSSFADE_DURATION",
        "RADIO_BUFFER_AHEAD",
        "RADIO_DWELL_MIN",
        "RADIO_DWELL_MAX",
        "RADIO_INFERENCE_STEPS",
        "RADIO_GUIDANCE_SCALE",
        "RADIO_SHIFT",
        "RADIO_AUDIO_FORMAT",
        "OLLAMA_URL",
    ] {
        env::remove_var(key);
    }

    let cfg = Config::load();
    assert_eq!(cfg.acestep_api_url, "http://acestep:8000");
    assert_eq!(cfg.acestep_api_key, "");
    assert_eq!(cfg.acestep_output_dir.to_str(), Some("/acestep-outputs"));
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.starting_genre, "lofi hip hop");
    assert_eq!(cfg.track_duration, 90);
    assert_eq!(cfg.crossfade_duration, Duration::from_secs(8));
    assert_eq!(cfg.buffer_ahead, 3);
    assert_eq!(cfg.dwell_min, 300);
    assert_eq!(cfg.dwell_max, 900);
    assert_eq!(cfg.inference_steps, 50);
    assert_eq!(cfg.guidance_scale, 4.0);
    assert_eq!(cfg.shift, 3.0);
    assert_eq!(cfg.audio_format, "flac");
    assert_eq!(cfg.ollama_url, "");

    // Phase 2: explicit overrides are honored.
    env::set_var("RADIO_TRACK_DURATION", "60");
    env::set_var("RADIO_AUDIO_FORMAT", "wav");
    env::set_var("RADIO_GENRE", "jazz");
    env::set_var("ACESTEP_API_URL", "http://generator.internal:9000");

    let cfg = Config::load();
    assert_eq!(cfg.track_duration, 60);
    assert_eq!(cfg.audio_format, "wav");
    assert_eq!(cfg.starting_genre, "jazz");
    assert_eq!(cfg.acestep_api_url, "http://generator.internal:9000");

    // Phase 3: unparseable numbers silently fall back to defaults.
    env::set_var("RADIO_PORT", "not-a-number");
    env::set_var("RADIO_GUIDANCE_SCALE", "strong");

    let cfg = Config::load();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.guidance_scale, 4.0);
    // Valid keys set in phase 2 still apply.
    assert_eq!(cfg.track_duration, 60);

    for key in [
        "RADIO_TRACK_DURATION",
        "RADIO_AUDIO_FORMAT",
        "RADIO_GENRE",
        "ACESTEP_API_URL",
        "RADIO_PORT",
        "RADIO_GUIDANCE_SCALE",
    ] {
        env::remove_var(key);
    }
}
