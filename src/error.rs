//! Error types for everwave
//!
//! One crate-wide error enum using thiserror. Only `Unavailable` during
//! startup is fatal; everything else is logged at its origin and handled by
//! retry-with-delay or drop-and-continue so the stream never stalls over a
//! single bad track.

use thiserror::Error;

/// Main error type for everwave
#[derive(Error, Debug)]
pub enum Error {
    /// Generator never became healthy within the startup window
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    /// Malformed response or non-OK API code from the generator or LLM
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Generation task reported terminal failure
    #[error("generation failed for task {task_id}")]
    GenerationFailed { task_id: String },

    /// Audio decoding errors; the affected track is dropped
    #[error("decode error: {0}")]
    Decode(String),

    /// Audio encoder setup or runtime errors on a transport
    #[error("encode error: {0}")]
    Encode(String),

    /// Cancel token fired; propagated quietly
    #[error("cancelled")]
    Cancelled,

    /// Invalid control-plane input (unknown genre, out-of-range values)
    #[error("validation error: {0}")]
    Validation(String),

    /// HTTP transport errors when talking to external services
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the everwave Error
pub type Result<T> = std::result::Result<T, Error>;
