//! everwave — a continuously playing internet radio server
//!
//! Audio is produced on demand by an external generative-music service. The
//! auto-DJ keeps a bounded buffer of upcoming tracks warm while walking a
//! genre affinity graph; the pipeline stitches finished tracks into one
//! real-time PCM frame stream with crossfaded transitions; the broadcaster
//! fans that stream out to any number of HTTP-MP3 and WebRTC-Opus listeners
//! without ever letting a slow one stall the rest.

pub mod acestep;
pub mod api;
pub mod audio;
pub mod autodj;
pub mod config;
pub mod error;
pub mod ollama;
pub mod playback;
pub mod stream;

pub use config::Config;
pub use error::{Error, Result};
