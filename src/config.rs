//! Runtime configuration loaded from environment variables
//!
//! Every key has a default so the server starts with no environment at all.
//! Unparseable numeric values silently fall back to their defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// All runtime configuration for the radio server.
#[derive(Debug, Clone)]
pub struct Config {
    // Generator connection
    pub acestep_api_url: String,
    pub acestep_api_key: String,
    pub acestep_output_dir: PathBuf,

    // Server
    pub port: u16,

    // Radio behavior
    pub starting_genre: String,
    pub track_duration: u32,
    pub crossfade_duration: Duration,
    pub buffer_ahead: usize,
    pub dwell_min: u64,
    pub dwell_max: u64,

    // Generation knobs
    pub inference_steps: u32,
    pub guidance_scale: f64,
    pub shift: f64,
    pub audio_format: String,

    // Optional LLM enrichment (empty URL disables)
    pub ollama_url: String,
    pub ollama_model: String,
}

impl Config {
    /// Read configuration from the environment, applying defaults.
    pub fn load() -> Self {
        Self {
            acestep_api_url: env_str("ACESTEP_API_URL", "http://acestep:8000"),
            acestep_api_key: env_str("ACESTEP_API_KEY", ""),
            acestep_output_dir: PathBuf::from(env_str(
                "ACESTEP_OUTPUT_DIR",
                "/acestep-outputs",
            )),

            port: env_parse("RADIO_PORT", 8080),

            starting_genre: env_str("RADIO_GENRE", "lofi hip hop"),
            track_duration: env_parse("RADIO_TRACK_DURATION", 90),
            crossfade_duration: Duration::from_secs(env_parse("RADIO_CROSSFADE_DURATION", 8)),
            buffer_ahead: env_parse("RADIO_BUFFER_AHEAD", 3),
            dwell_min: env_parse("RADIO_DWELL_MIN", 300),
            dwell_max: env_parse("RADIO_DWELL_MAX", 900),

            inference_steps: env_parse("RADIO_INFERENCE_STEPS", 50),
            guidance_scale: env_parse("RADIO_GUIDANCE_SCALE", 4.0),
            shift: env_parse("RADIO_SHIFT", 3.0),
            audio_format: env_str("RADIO_AUDIO_FORMAT", "flac"),

            ollama_url: env_str("OLLAMA_URL", ""),
            ollama_model: env_str("OLLAMA_MODEL", "qwen3:8b"),
        }
    }
}

fn env_str(key: &str, fallback: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

fn env_parse<T: FromStr + Copy>(key: &str, fallback: T) -> T {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or(fallback),
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        // Keys that no other test touches, so parallel test runs stay clean.
        assert_eq!(env_str("EVERWAVE_TEST_UNSET_STR", "fallback"), "fallback");
        assert_eq!(env_parse("EVERWAVE_TEST_UNSET_INT", 42u16), 42);
    }

    #[test]
    fn parse_failure_falls_back() {
        env::set_var("EVERWAVE_TEST_BAD_INT", "not-a-number");
        assert_eq!(env_parse("EVERWAVE_TEST_BAD_INT", 8080u16), 8080);
        env::remove_var("EVERWAVE_TEST_BAD_INT");
    }

    #[test]
    fn env_overrides_default() {
        env::set_var("EVERWAVE_TEST_GOOD_INT", "60");
        assert_eq!(env_parse("EVERWAVE_TEST_GOOD_INT", 90u32), 60);
        env::remove_var("EVERWAVE_TEST_GOOD_INT");

        env::set_var("EVERWAVE_TEST_GOOD_STR", "wav");
        assert_eq!(env_str("EVERWAVE_TEST_GOOD_STR", "flac"), "wav");
        env::remove_var("EVERWAVE_TEST_GOOD_STR");
    }

    #[test]
    fn float_parse_failure_falls_back() {
        env::set_var("EVERWAVE_TEST_BAD_FLOAT", "4.0.1");
        assert_eq!(env_parse("EVERWAVE_TEST_BAD_FLOAT", 4.0f64), 4.0);
        env::remove_var("EVERWAVE_TEST_BAD_FLOAT");
    }
}
