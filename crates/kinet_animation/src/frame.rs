//! Time-bounded animation frames
//!
//! A frame maps one sub-interval of the shared timeline to a continuous value
//! through a coefficient, a domain remap, and a curve. Frames also carry the
//! edge callbacks fired when their active window is entered or left.

use crate::clock::Direction;
use crate::curve::Curve;
use slotmap::new_key_type;
use std::sync::Arc;

new_key_type! {
    /// Key of a registered frame
    pub struct FrameId;
}

/// Per-tick value callback
pub(crate) type ValueFn = Arc<dyn Fn(f32) + Send + Sync>;
/// Edge or terminal callback, receiving the run direction
pub(crate) type EdgeFn = Arc<dyn Fn(Direction) + Send + Sync>;

/// Physical window-membership transition observed during a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EdgeEvent {
    Entered,
    Exited,
}

/// Timeline edge whose named callback fires for a physical event.
///
/// Callbacks are named after timeline edges (`on_enter` belongs to the
/// start-time edge, `on_exit` to the end-time edge), so backward traversal
/// swaps which one a physical entry or exit maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EdgeSlot {
    Start,
    End,
}

pub(crate) fn edge_slot(direction: Direction, event: EdgeEvent) -> EdgeSlot {
    match (direction, event) {
        (Direction::Forward, EdgeEvent::Entered) => EdgeSlot::Start,
        (Direction::Forward, EdgeEvent::Exited) => EdgeSlot::End,
        (Direction::Backward, EdgeEvent::Entered) => EdgeSlot::End,
        (Direction::Backward, EdgeEvent::Exited) => EdgeSlot::Start,
    }
}

/// One animated property over a sub-interval of the timeline
pub(crate) struct Frame {
    pub start_time: u64,
    pub end_time: u64,
    pub domain_start: f32,
    pub domain_end: f32,
    pub curve: Curve,
    pub coefficient: f32,
    /// True while the current timeline position lies inside the window;
    /// reset at the start of every full run
    pub active: bool,
    pub on_value: ValueFn,
    pub on_enter: Option<EdgeFn>,
    pub on_exit: Option<EdgeFn>,
}

impl Frame {
    pub fn new(start_time: u64, end_time: u64, on_value: ValueFn) -> Self {
        Self {
            start_time,
            end_time,
            domain_start: 0.0,
            domain_end: 1.0,
            curve: Curve::default(),
            coefficient: 1.0,
            active: false,
            on_value,
            on_enter: None,
            on_exit: None,
        }
    }

    /// Whether `time` lies inside the closed active window
    pub fn contains(&self, time: u64) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    /// Whether the window lies behind `time` in the direction of travel
    pub fn passed(&self, time: u64, direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.end_time < time,
            Direction::Backward => self.start_time > time,
        }
    }

    /// The callback registered for a timeline edge, if any
    pub fn edge(&self, slot: EdgeSlot) -> Option<EdgeFn> {
        match slot {
            EdgeSlot::Start => self.on_enter.clone(),
            EdgeSlot::End => self.on_exit.clone(),
        }
    }

    /// Map an absolute timeline position to the frame's output value.
    ///
    /// Normalized progress is scaled by the coefficient first, then remapped
    /// through the domain weights, then run through the curve. Registration
    /// guarantees `start_time < end_time`.
    pub fn sample(&self, time: u64) -> f32 {
        let span = (self.end_time - self.start_time) as f32;
        let raw = (time as f32 - self.start_time as f32) / span;
        let scaled = raw * self.coefficient;
        let t = self.domain_start + (self.domain_end - self.domain_start) * scaled;
        self.curve.apply(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(start: u64, end: u64) -> Frame {
        Frame::new(start, end, Arc::new(|_| {}))
    }

    #[test]
    fn test_linear_sample_endpoints() {
        let f = frame(0, 1000);
        assert_eq!(f.sample(0), 0.0);
        assert_eq!(f.sample(500), 0.5);
        assert_eq!(f.sample(1000), 1.0);
    }

    #[test]
    fn test_sample_with_offset_window() {
        let f = frame(200, 700);
        assert_eq!(f.sample(200), 0.0);
        assert!((f.sample(450) - 0.5).abs() < 1e-6);
        assert_eq!(f.sample(700), 1.0);
    }

    #[test]
    fn test_coefficient_scales_before_domain_remap() {
        let mut f = frame(0, 1000);
        f.coefficient = 2.0;
        // Halfway through the window the curve is already complete
        assert_eq!(f.sample(500), 1.0);
        // and keeps going, uncapped
        assert_eq!(f.sample(1000), 2.0);
    }

    #[test]
    fn test_inverted_domain_reverses_traversal() {
        let mut f = frame(0, 1000);
        f.domain_start = 1.0;
        f.domain_end = 0.0;
        assert_eq!(f.sample(0), 1.0);
        assert_eq!(f.sample(1000), 0.0);
    }

    #[test]
    fn test_sin_curve_with_shifted_domain_starts_at_peak() {
        // domain [0.25, -0.25] places t=0.25 under the sine at time zero
        let mut f = frame(0, 1000);
        f.curve = Curve::Sin;
        f.domain_start = 0.25;
        f.domain_end = -0.25;
        assert!((f.sample(0) - 1.0).abs() < 1e-6);
        assert!((f.sample(1000) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_membership_is_closed() {
        let f = frame(100, 200);
        assert!(f.contains(100));
        assert!(f.contains(200));
        assert!(!f.contains(99));
        assert!(!f.contains(201));
    }

    #[test]
    fn test_passed_is_directional() {
        let f = frame(100, 200);
        assert!(f.passed(201, Direction::Forward));
        assert!(!f.passed(99, Direction::Forward));
        assert!(f.passed(99, Direction::Backward));
        assert!(!f.passed(201, Direction::Backward));
    }

    #[test]
    fn test_edge_slot_swaps_with_direction() {
        assert_eq!(
            edge_slot(Direction::Forward, EdgeEvent::Entered),
            EdgeSlot::Start
        );
        assert_eq!(
            edge_slot(Direction::Forward, EdgeEvent::Exited),
            EdgeSlot::End
        );
        assert_eq!(
            edge_slot(Direction::Backward, EdgeEvent::Entered),
            EdgeSlot::End
        );
        assert_eq!(
            edge_slot(Direction::Backward, EdgeEvent::Exited),
            EdgeSlot::Start
        );
    }
}
