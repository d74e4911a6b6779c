//! HTTP control plane: router, handlers, and the embedded player UI.

pub mod handlers;
pub mod server;

pub use server::{run, AppContext};
