//! Real-time playback: the pipeline that owns the master 20 ms clock.

pub mod pipeline;

pub use pipeline::Pipeline;
