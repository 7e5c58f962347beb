//! Error types surfaced by the renderer.

use thiserror::Error;

use crate::engine::EngineState;

/// Errors that can escape the renderer's public API.
///
/// Per-sample numerical issues (NaN radiance, total internal reflection)
/// are handled in-band and never surface here.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    #[error("Invalid render buffer: {0}")]
    InvalidBuffer(String),

    #[error("Operation '{operation}' is not legal in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },

    #[error("Invalid render profile: {0}")]
    InvalidProfile(String),
}

pub type RenderResult<T> = Result<T, RenderError>;
