//! Animation controller
//!
//! The [`Animator`] owns the registered frames, derives the overall timeline
//! span from their intervals, and constructs a fresh [`Clock`] for every run.
//! Each tick maps the directional absolute time to per-frame progress and
//! dispatches edge and value callbacks in registration order.

use crate::clock::{Clock, Direction, RunContext};
use crate::curve::Curve;
use crate::error::{AnimationError, Result};
use crate::frame::{edge_slot, EdgeEvent, EdgeFn, EdgeSlot, Frame, FrameId, ValueFn};
use crate::ticker::{ThreadTicker, TickSource};
use slotmap::SlotMap;
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

/// A user callback captured during tick processing, invoked after the
/// controller lock is released so callbacks may call back into the animator
enum PendingCall {
    Edge(EdgeFn, Direction),
    Value(ValueFn, f32),
}

impl PendingCall {
    fn invoke(self) {
        match self {
            PendingCall::Edge(callback, direction) => callback(direction),
            PendingCall::Value(callback, value) => callback(value),
        }
    }
}

type PendingCalls = SmallVec<[PendingCall; 8]>;

struct AnimatorInner {
    frames: SlotMap<FrameId, Frame>,
    /// Registration order; dispatch within a tick follows it
    order: SmallVec<[FrameId; 8]>,
    min_time: u64,
    max_time: u64,
    /// Last directional time reported by the clock, preserved across
    /// stop/resume
    current_time: u64,
    direction: Direction,
    running: bool,
    /// Bumped per `start`; callbacks from a replaced run are discarded
    run_id: u64,
    clock: Option<Arc<Clock>>,
    on_start: Option<EdgeFn>,
    on_end: Option<EdgeFn>,
}

/// Keyframe timeline animation controller.
///
/// Register frames with [`animate`](Animator::animate), then drive them with
/// [`start`](Animator::start). One run is active at a time; starting the
/// opposite direction mid-run reverses over the remaining span.
pub struct Animator {
    inner: Arc<Mutex<AnimatorInner>>,
    interval: u64,
    source: Arc<dyn TickSource>,
}

impl Animator {
    /// Create a controller ticking every `interval` ms on a background thread
    pub fn new(interval: u64) -> Self {
        Self::with_ticker(interval, Arc::new(ThreadTicker))
    }

    /// Create a controller driven by an injected tick source
    pub fn with_ticker(interval: u64, source: Arc<dyn TickSource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AnimatorInner {
                frames: SlotMap::with_key(),
                order: SmallVec::new(),
                min_time: 0,
                max_time: 0,
                current_time: 0,
                direction: Direction::Forward,
                running: false,
                run_id: 0,
                clock: None,
                on_start: None,
                on_end: None,
            })),
            interval: interval.max(1),
            source,
        }
    }

    /// Create a controller and register frames in one expression
    pub fn new_with<F>(interval: u64, configure: F) -> Self
    where
        F: FnOnce(&Animator),
    {
        let animator = Self::new(interval);
        configure(&animator);
        animator
    }

    /// Register a frame spanning `[start_time, end_time]` on the timeline.
    ///
    /// `on_value` is invoked on every tick while the frame is active.
    /// Fails with [`AnimationError::InvalidFrameBounds`] unless
    /// `start_time < end_time`.
    pub fn animate<F>(&self, start_time: u64, end_time: u64, on_value: F) -> Result<FrameHandle>
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        if start_time >= end_time {
            return Err(AnimationError::InvalidFrameBounds {
                start: start_time,
                end: end_time,
            });
        }
        let mut inner = self.inner.lock().unwrap();
        let id = inner
            .frames
            .insert(Frame::new(start_time, end_time, Arc::new(on_value)));
        if inner.order.is_empty() || start_time < inner.min_time {
            inner.min_time = start_time;
        }
        inner.max_time = inner.max_time.max(end_time);
        inner.order.push(id);
        Ok(FrameHandle {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    /// Controller-level callback for the timeline's start edge: fires when a
    /// forward run launches and when a backward run completes
    pub fn on_start<F>(&self, callback: F)
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().on_start = Some(Arc::new(callback));
    }

    /// Controller-level callback for the timeline's end edge: fires when a
    /// backward run launches and when a forward run completes
    pub fn on_end<F>(&self, callback: F)
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().on_end = Some(Arc::new(callback));
    }

    /// Begin a run in `direction`.
    ///
    /// From an idle controller at a timeline edge this resets every frame and
    /// plays the full span. Mid-timeline (after `stop`, or while running the
    /// opposite direction) only the remaining span is played and frame state
    /// is preserved, which makes reversal seamless. Starting while already
    /// running in the same direction fails with
    /// [`AnimationError::AlreadyRunning`].
    pub fn start(&self, direction: Direction) -> Result<()> {
        let (clock, old_clock, launch, run_id) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.running && inner.direction == direction {
                return Err(AnimationError::AlreadyRunning);
            }
            let old_clock = inner.clock.take();
            let total = inner.max_time;
            let position = inner.current_time;
            let at_edge = position == 0 || position >= total;
            let (span, offset) = if at_edge {
                for (_, frame) in inner.frames.iter_mut() {
                    frame.active = false;
                }
                inner.current_time = match direction {
                    Direction::Forward => 0,
                    Direction::Backward => total,
                };
                (total, 0)
            } else {
                match direction {
                    Direction::Forward => (total - position, position),
                    Direction::Backward => (position, 0),
                }
            };
            inner.running = true;
            inner.direction = direction;
            inner.run_id += 1;
            let run_id = inner.run_id;
            let clock = Arc::new(Clock::new(
                span,
                self.interval,
                offset,
                direction,
                Arc::clone(&self.source),
            ));
            inner.clock = Some(Arc::clone(&clock));
            // The launch terminal fires only for full, edge-to-edge runs
            let launch = if at_edge {
                match edge_slot(direction, EdgeEvent::Entered) {
                    EdgeSlot::Start => inner.on_start.clone(),
                    EdgeSlot::End => inner.on_end.clone(),
                }
            } else {
                None
            };
            (clock, old_clock, launch, run_id)
        };
        if let Some(old) = old_clock {
            old.stop();
        }
        debug!(?direction, "animator start");
        if let Some(callback) = launch {
            callback(direction);
        }
        let tick_inner = Arc::downgrade(&self.inner);
        let done_inner = Arc::downgrade(&self.inner);
        let ctx = RunContext {
            on_tick: Box::new(move |time| Animator::refresh(&tick_inner, run_id, time)),
            on_complete: Mutex::new(Some(Box::new(move |time| {
                Animator::finish(&done_inner, run_id, time)
            }))),
        };
        clock.start(ctx)
    }

    /// Cancel the current run's ticker; a later [`resume`](Animator::resume)
    /// continues from the same position. No-op when idle.
    pub fn stop(&self) {
        let clock = {
            let mut inner = self.inner.lock().unwrap();
            inner.running = false;
            inner.clock.clone()
        };
        if let Some(clock) = clock {
            clock.stop();
            debug!(elapsed = clock.elapsed(), "animator stopped");
        }
    }

    /// Re-arm the stopped run for its remaining span. No-op when there is
    /// nothing to resume.
    pub fn resume(&self) -> Result<()> {
        let clock = {
            let inner = self.inner.lock().unwrap();
            if inner.running {
                return Ok(());
            }
            match inner.clock.clone() {
                Some(clock) => clock,
                None => return Ok(()),
            }
        };
        if clock.is_completed() {
            return Ok(());
        }
        if clock.resume()? {
            self.inner.lock().unwrap().running = true;
        }
        Ok(())
    }

    /// Earliest start time over all registered frames
    pub fn min_time(&self) -> u64 {
        self.inner.lock().unwrap().min_time
    }

    /// Latest end time over all registered frames; the timeline's duration
    pub fn max_time(&self) -> u64 {
        self.inner.lock().unwrap().max_time
    }

    /// Last directional time reported by the clock
    pub fn current_time(&self) -> u64 {
        self.inner.lock().unwrap().current_time
    }

    pub fn direction(&self) -> Direction {
        self.inner.lock().unwrap().direction
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn frame_count(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }

    /// Per-tick evaluation: edge detection first, then values, per frame in
    /// registration order
    fn refresh(inner: &Weak<Mutex<AnimatorInner>>, run_id: u64, time: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut pending: PendingCalls = SmallVec::new();
        {
            let mut state = inner.lock().unwrap();
            if state.run_id != run_id {
                return;
            }
            state.current_time = time;
            let direction = state.direction;
            let order = state.order.clone();
            for id in order {
                let Some(frame) = state.frames.get_mut(id) else {
                    continue;
                };
                if frame.contains(time) {
                    if !frame.active {
                        frame.active = true;
                        if let Some(callback) = frame.edge(edge_slot(direction, EdgeEvent::Entered))
                        {
                            pending.push(PendingCall::Edge(callback, direction));
                        }
                    }
                    pending.push(PendingCall::Value(
                        Arc::clone(&frame.on_value),
                        frame.sample(time),
                    ));
                } else if frame.passed(time, direction) {
                    if frame.active {
                        if let Some(callback) = frame.edge(edge_slot(direction, EdgeEvent::Exited))
                        {
                            pending.push(PendingCall::Edge(callback, direction));
                        }
                    }
                    frame.active = false;
                }
            }
        }
        for call in pending {
            call.invoke();
        }
    }

    /// Terminal dispatch: close out still-active frames, then fire the
    /// controller-level callback for the edge the run arrived at
    fn finish(inner: &Weak<Mutex<AnimatorInner>>, run_id: u64, time: u64) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut pending: PendingCalls = SmallVec::new();
        let terminal = {
            let mut state = inner.lock().unwrap();
            if state.run_id != run_id {
                return;
            }
            state.current_time = time;
            state.running = false;
            let direction = state.direction;
            let order = state.order.clone();
            for id in order {
                let Some(frame) = state.frames.get_mut(id) else {
                    continue;
                };
                if frame.active {
                    if let Some(callback) = frame.edge(edge_slot(direction, EdgeEvent::Exited)) {
                        pending.push(PendingCall::Edge(callback, direction));
                    }
                }
                frame.active = false;
            }
            let slot = edge_slot(direction, EdgeEvent::Exited);
            let callback = match slot {
                EdgeSlot::Start => state.on_start.clone(),
                EdgeSlot::End => state.on_end.clone(),
            };
            callback.map(|callback| (callback, direction))
        };
        debug!(time, "animator run complete");
        for call in pending {
            call.invoke();
        }
        if let Some((callback, direction)) = terminal {
            callback(direction);
        }
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Configuration handle for a registered frame.
///
/// Setter methods apply immediately to the underlying frame and are the only
/// mutation path after registration; call them before the next `start`.
#[derive(Clone)]
pub struct FrameHandle {
    inner: Arc<Mutex<AnimatorInner>>,
    id: FrameId,
}

impl std::fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl FrameHandle {
    pub fn id(&self) -> FrameId {
        self.id
    }

    fn with_frame<F: FnOnce(&mut Frame)>(&self, f: F) {
        if let Some(frame) = self.inner.lock().unwrap().frames.get_mut(self.id) {
            f(frame);
        }
    }

    /// Select the frame's curve
    pub fn curve(self, curve: Curve) -> Self {
        self.with_frame(|frame| frame.curve = curve);
        self
    }

    /// Select the frame's curve and a coefficient multiplying normalized time
    /// before the domain remap, letting the curve complete faster than the
    /// frame's wall-clock window
    pub fn curve_scaled(self, curve: Curve, coefficient: f32) -> Self {
        self.with_frame(|frame| {
            frame.curve = curve;
            frame.coefficient = coefficient;
        });
        self
    }

    /// Remap normalized progress into `[start, end]` before curve evaluation;
    /// the range may be inverted or extend beyond the unit interval
    pub fn domain(self, start: f32, end: f32) -> Self {
        self.with_frame(|frame| {
            frame.domain_start = start;
            frame.domain_end = end;
        });
        self
    }

    /// Callback for the frame's start-time edge (fires on forward entry and
    /// backward exit)
    pub fn on_enter<F>(self, callback: F) -> Self
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        let callback: EdgeFn = Arc::new(callback);
        self.with_frame(move |frame| frame.on_enter = Some(callback));
        self
    }

    /// Callback for the frame's end-time edge (fires on forward exit and
    /// backward entry)
    pub fn on_exit<F>(self, callback: F) -> Self
    where
        F: Fn(Direction) + Send + Sync + 'static,
    {
        let callback: EdgeFn = Arc::new(callback);
        self.with_frame(move |frame| frame.on_exit = Some(callback));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticker::ManualTicker;

    #[test]
    fn test_registration_updates_bounds() {
        let anim = Animator::new(10);
        anim.animate(100, 400, |_| {}).unwrap();
        assert_eq!(anim.min_time(), 100);
        assert_eq!(anim.max_time(), 400);

        anim.animate(50, 300, |_| {}).unwrap();
        assert_eq!(anim.min_time(), 50);
        assert_eq!(anim.max_time(), 400);

        // Existing bounds only widen
        anim.animate(200, 900, |_| {}).unwrap();
        assert_eq!(anim.min_time(), 50);
        assert_eq!(anim.max_time(), 900);
        assert_eq!(anim.frame_count(), 3);
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        let anim = Animator::new(10);
        let err = anim.animate(500, 500, |_| {}).unwrap_err();
        assert!(matches!(
            err,
            AnimationError::InvalidFrameBounds {
                start: 500,
                end: 500
            }
        ));
        assert!(anim.animate(600, 500, |_| {}).is_err());
        assert_eq!(anim.frame_count(), 0);
    }

    #[test]
    fn test_start_twice_same_direction_fails() {
        let ticker = Arc::new(ManualTicker::new());
        let anim = Animator::with_ticker(100, ticker.clone());
        anim.animate(0, 1000, |_| {}).unwrap();

        anim.start(Direction::Forward).unwrap();
        assert!(matches!(
            anim.start(Direction::Forward),
            Err(AnimationError::AlreadyRunning)
        ));
        assert!(anim.is_running());
    }

    #[test]
    fn test_handle_mutations_apply_immediately() {
        let ticker = Arc::new(ManualTicker::new());
        let anim = Animator::with_ticker(100, ticker.clone());
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        anim.animate(0, 1000, move |v| sink.lock().unwrap().push(v))
            .unwrap()
            .domain(1.0, 0.0);

        anim.start(Direction::Forward).unwrap();
        ticker.advance(1000);

        let values = values.lock().unwrap();
        assert_eq!(values.first(), Some(&1.0));
        assert_eq!(values.last(), Some(&0.0));
        assert_eq!(values.len(), 11);
    }

    #[test]
    fn test_curve_scaled_completes_early() {
        let ticker = Arc::new(ManualTicker::new());
        let anim = Animator::with_ticker(100, ticker.clone());
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&values);
        anim.animate(0, 1000, move |v| sink.lock().unwrap().push(v))
            .unwrap()
            .curve_scaled(Curve::Linear, 2.0);

        anim.start(Direction::Forward).unwrap();
        ticker.advance(500);

        // Halfway through the window the doubled curve is already at 1.0
        assert!((values.lock().unwrap().last().unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_new_with_registers_frames() {
        let anim = Animator::new_with(10, |anim| {
            anim.animate(0, 250, |_| {}).unwrap();
            anim.animate(250, 500, |_| {}).unwrap();
        });
        assert_eq!(anim.frame_count(), 2);
        assert_eq!(anim.max_time(), 500);
    }

    #[test]
    fn test_stop_is_a_no_op_when_idle() {
        let anim = Animator::new(10);
        anim.stop();
        assert!(!anim.is_running());
        assert!(anim.resume().is_ok());
    }
}
