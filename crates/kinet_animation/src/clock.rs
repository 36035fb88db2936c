//! Timeline clock
//!
//! A [`Clock`] drives one run of the timeline: it owns the armed tick job,
//! accumulates elapsed time across stop/resume, and reports directional
//! absolute time to its run context. States: Idle -> Running -> {Stopped,
//! Completed}; Stopped clocks can be re-armed with `resume`, Completed is
//! terminal.
//!
//! One mutex per clock guards tick processing against reconfiguration: a tick
//! never observes a clock mid-`stop`/`resume`, and a cancelled ticker's late
//! callback is discarded by an epoch check.

use crate::error::Result;
use crate::ticker::{FinishFn, TickFn, TickHandle, TickSource};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};

/// Traversal direction of the timeline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Start-to-end
    #[default]
    Forward,
    /// End-to-start
    Backward,
}

impl Direction {
    /// The opposite traversal direction
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Callbacks for one run, constructed fresh for every `Clock::start`.
///
/// Holding the callbacks in a per-run context (instead of rebinding slots on
/// a shared clock) means a stale ticker can never observe callbacks from a
/// later run.
pub(crate) struct RunContext {
    pub on_tick: Box<dyn Fn(u64) + Send + Sync>,
    pub on_complete: Mutex<Option<Box<dyn FnOnce(u64) + Send>>>,
}

struct ClockInner {
    /// Elapsed time folded in from runs before the last `resume`
    accumulated: u64,
    /// Elapsed time reported by the currently armed ticker
    elapsed: u64,
    /// Duration the current ticker was armed with
    armed: u64,
    /// Bumped on every re-arm or cancel; stale ticker callbacks check it
    epoch: u64,
    ticker: Option<Box<dyn TickHandle>>,
    ctx: Option<Arc<RunContext>>,
    completed: bool,
}

/// Directional absolute time for a total elapsed offset into the run
fn directional(duration: u64, start_offset: u64, direction: Direction, elapsed: u64) -> u64 {
    match direction {
        Direction::Forward => start_offset + elapsed,
        Direction::Backward => start_offset + duration - elapsed,
    }
}

/// Drives one run of the timeline over an injected tick source
pub(crate) struct Clock {
    duration: u64,
    interval: u64,
    start_offset: u64,
    direction: Direction,
    source: Arc<dyn TickSource>,
    inner: Arc<Mutex<ClockInner>>,
}

impl Clock {
    pub fn new(
        duration: u64,
        interval: u64,
        start_offset: u64,
        direction: Direction,
        source: Arc<dyn TickSource>,
    ) -> Self {
        Self {
            duration,
            interval,
            start_offset,
            direction,
            source,
            inner: Arc::new(Mutex::new(ClockInner {
                accumulated: 0,
                elapsed: 0,
                armed: 0,
                epoch: 0,
                ticker: None,
                ctx: None,
                completed: false,
            })),
        }
    }

    fn directional_time(&self, elapsed: u64) -> u64 {
        directional(self.duration, self.start_offset, self.direction, elapsed)
    }

    /// Total elapsed run time, preserved across stop/resume
    pub fn elapsed(&self) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.accumulated + inner.elapsed
    }

    pub fn is_completed(&self) -> bool {
        self.inner.lock().unwrap().completed
    }

    /// Start the run: reset timing state, deliver the initial tick at zero
    /// elapsed time to establish the starting state, then arm the ticker.
    pub fn start(&self, ctx: RunContext) -> Result<()> {
        let ctx = Arc::new(ctx);
        let stale = {
            let mut inner = self.inner.lock().unwrap();
            inner.accumulated = 0;
            inner.elapsed = 0;
            inner.completed = false;
            inner.epoch += 1;
            inner.ctx = Some(Arc::clone(&ctx));
            inner.ticker.take()
        };
        if let Some(mut ticker) = stale {
            ticker.cancel();
        }
        debug!(
            duration = self.duration,
            interval = self.interval,
            offset = self.start_offset,
            direction = ?self.direction,
            "clock start"
        );
        (ctx.on_tick)(self.directional_time(0));
        if self.duration == 0 {
            // Zero-span run: the initial tick is also the final one
            self.inner.lock().unwrap().completed = true;
            if let Some(done) = ctx.on_complete.lock().unwrap().take() {
                done(self.directional_time(0));
            }
            return Ok(());
        }
        self.arm(self.duration)
    }

    /// Cancel the ticker without clearing accumulated time
    pub fn stop(&self) {
        let ticker = {
            let mut inner = self.inner.lock().unwrap();
            inner.epoch += 1;
            inner.ticker.take()
        };
        if let Some(mut ticker) = ticker {
            ticker.cancel();
            debug!("clock stopped");
        }
    }

    /// Fold elapsed time into the accumulated total and re-arm the ticker for
    /// the remaining span. Returns false if there was nothing to resume.
    pub fn resume(&self) -> Result<bool> {
        let remaining = {
            let mut inner = self.inner.lock().unwrap();
            if inner.completed || inner.ctx.is_none() {
                return Ok(false);
            }
            inner.epoch += 1;
            if let Some(mut ticker) = inner.ticker.take() {
                ticker.cancel();
            }
            inner.accumulated += inner.elapsed;
            inner.elapsed = 0;
            self.duration.saturating_sub(inner.accumulated)
        };
        if remaining == 0 {
            return Ok(false);
        }
        debug!(remaining, "clock resume");
        self.arm(remaining)?;
        Ok(true)
    }

    fn arm(&self, remaining: u64) -> Result<()> {
        let epoch = {
            let mut inner = self.inner.lock().unwrap();
            inner.armed = remaining;
            inner.epoch
        };
        let duration = self.duration;
        let start_offset = self.start_offset;
        let direction = self.direction;

        let tick_state: Weak<Mutex<ClockInner>> = Arc::downgrade(&self.inner);
        let on_tick: TickFn = Box::new(move |remaining_ms| {
            let Some(state) = tick_state.upgrade() else {
                return;
            };
            let (ctx, total) = {
                let mut inner = state.lock().unwrap();
                if inner.epoch != epoch || inner.completed {
                    return;
                }
                inner.elapsed = inner.armed - remaining_ms;
                let total = inner.accumulated + inner.elapsed;
                let Some(ctx) = inner.ctx.clone() else {
                    return;
                };
                (ctx, total)
            };
            let time = directional(duration, start_offset, direction, total);
            trace!(time, "tick");
            (ctx.on_tick)(time);
        });

        let finish_state: Weak<Mutex<ClockInner>> = Arc::downgrade(&self.inner);
        let on_finish: FinishFn = Box::new(move || {
            let Some(state) = finish_state.upgrade() else {
                return;
            };
            let ctx = {
                let mut inner = state.lock().unwrap();
                if inner.epoch != epoch || inner.completed {
                    return;
                }
                inner.elapsed = inner.armed;
                inner.completed = true;
                inner.ticker = None;
                let Some(ctx) = inner.ctx.clone() else {
                    return;
                };
                ctx
            };
            // The final full-duration tick always precedes completion
            let time = directional(duration, start_offset, direction, duration);
            trace!(time, "final tick");
            (ctx.on_tick)(time);
            if let Some(done) = ctx.on_complete.lock().unwrap().take() {
                debug!(time, "clock completed");
                done(time);
            };
        });

        let mut handle = self
            .source
            .schedule(remaining, self.interval, on_tick, on_finish)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.epoch == epoch && !inner.completed {
            inner.ticker = Some(handle);
        } else {
            handle.cancel();
        }
        Ok(())
    }
}
