//! Kinet Animation Engine
//!
//! Keyframe-driven timeline animation: register time-bounded frames that map
//! sub-intervals of a shared timeline to continuous values through curve
//! functions, then drive them with a cancellable, resumable, bidirectional
//! clock.
//!
//! # Features
//!
//! - **Frames**: time-bounded value producers with domain remapping and curves
//! - **Bidirectional clock**: start, stop, resume, and reverse mid-run
//! - **Edge dispatch**: enter/exit callbacks fire exactly on window transitions
//! - **Injected scheduling**: a thread ticker for wall-clock time, a manual
//!   ticker for deterministic hosts and tests

pub mod animator;
pub mod clock;
pub mod curve;
pub mod error;
pub mod frame;
pub mod ticker;

pub use animator::{Animator, FrameHandle};
pub use clock::Direction;
pub use curve::Curve;
pub use error::{AnimationError, Result};
pub use frame::FrameId;
pub use ticker::{FinishFn, ManualTicker, ThreadTicker, TickFn, TickHandle, TickSource};
