//! Animation engine error types

use thiserror::Error;

/// Errors surfaced by the animation engine
#[derive(Error, Debug)]
pub enum AnimationError {
    /// Frame registered with a degenerate or inverted interval
    #[error("invalid frame bounds: start {start}ms must be less than end {end}ms")]
    InvalidFrameBounds { start: u64, end: u64 },

    /// `start` called while a run in the same direction is active
    #[error("animation is already running")]
    AlreadyRunning,

    /// The tick scheduler could not be armed
    #[error("tick scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
