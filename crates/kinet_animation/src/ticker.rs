//! Tick scheduling
//!
//! The engine does not own a timer primitive. It asks an injected scheduler
//! capability to call it back every `interval` ms until `duration` has
//! elapsed. [`ThreadTicker`] drives wall-clock time on a background thread;
//! [`ManualTicker`] lets a host frame loop or a test advance time explicitly.

use crate::error::{AnimationError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Periodic progress callback, invoked with the remaining time in ms
pub type TickFn = Box<dyn Fn(u64) + Send + Sync>;
/// Completion callback, invoked once when the scheduled span has elapsed
pub type FinishFn = Box<dyn FnOnce() + Send>;

/// Scheduler capability required from the host environment.
///
/// After `schedule`, `on_tick` fires roughly every `interval` ms with the
/// strictly decreasing remaining time; once elapsed time reaches `duration`,
/// `on_finish` fires instead of a final `on_tick` (the clock synthesizes its
/// own boundary ticks). Tick delivery may happen on any thread.
pub trait TickSource: Send + Sync {
    fn schedule(
        &self,
        duration: u64,
        interval: u64,
        on_tick: TickFn,
        on_finish: FinishFn,
    ) -> Result<Box<dyn TickHandle>>;
}

/// Cancellation handle for a scheduled tick job
pub trait TickHandle: Send {
    /// Stop future callbacks; one already in flight may still complete.
    fn cancel(&mut self);
}

/// Wall-clock tick source running each job on its own named thread.
///
/// Cancellation only raises a flag; the thread notices it on its next wake
/// and exits, so cancelling from inside a tick callback cannot deadlock.
pub struct ThreadTicker;

impl TickSource for ThreadTicker {
    fn schedule(
        &self,
        duration: u64,
        interval: u64,
        on_tick: TickFn,
        on_finish: FinishFn,
    ) -> Result<Box<dyn TickHandle>> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("kinet-ticker".into())
            .spawn(move || {
                let begin = Instant::now();
                let mut on_finish = Some(on_finish);
                loop {
                    thread::sleep(Duration::from_millis(interval));
                    if thread_stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let elapsed = begin.elapsed().as_millis() as u64;
                    if elapsed >= duration {
                        if let Some(finish) = on_finish.take() {
                            finish();
                        }
                        return;
                    }
                    on_tick(duration - elapsed);
                }
            })
            .map_err(|e| AnimationError::SchedulerUnavailable(e.to_string()))?;
        Ok(Box::new(ThreadTickHandle { stop }))
    }
}

struct ThreadTickHandle {
    stop: Arc<AtomicBool>,
}

impl TickHandle for ThreadTickHandle {
    fn cancel(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Deterministic tick source driven by explicit calls to [`advance`].
///
/// Every scheduled job steps in whole-interval increments; a partial interval
/// is carried over to the next `advance` call. Callbacks fire outside the
/// internal lock, so they may schedule or cancel jobs.
///
/// [`advance`]: ManualTicker::advance
#[derive(Default)]
pub struct ManualTicker {
    jobs: Mutex<Vec<Arc<ManualJob>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every scheduled job by `ms` of virtual time
    pub fn advance(&self, ms: u64) {
        let jobs: Vec<Arc<ManualJob>> = self.jobs.lock().unwrap().clone();
        for job in jobs {
            job.advance(ms);
        }
        self.jobs.lock().unwrap().retain(|job| !job.is_done());
    }

    /// Number of jobs still armed
    pub fn active_jobs(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}

impl TickSource for ManualTicker {
    fn schedule(
        &self,
        duration: u64,
        interval: u64,
        on_tick: TickFn,
        on_finish: FinishFn,
    ) -> Result<Box<dyn TickHandle>> {
        let job = Arc::new(ManualJob {
            duration,
            interval,
            state: Mutex::new(JobState {
                elapsed: 0,
                carry: 0,
                finished: false,
            }),
            cancelled: AtomicBool::new(false),
            on_tick,
            on_finish: Mutex::new(Some(on_finish)),
        });
        self.jobs.lock().unwrap().push(Arc::clone(&job));
        Ok(Box::new(ManualTickHandle { job }))
    }
}

struct JobState {
    elapsed: u64,
    /// Sub-interval remainder from a previous `advance`
    carry: u64,
    finished: bool,
}

struct ManualJob {
    duration: u64,
    interval: u64,
    state: Mutex<JobState>,
    cancelled: AtomicBool,
    on_tick: TickFn,
    on_finish: Mutex<Option<FinishFn>>,
}

enum Step {
    Tick(u64),
    Finish,
    Done,
}

impl ManualJob {
    fn advance(&self, ms: u64) {
        let mut budget = ms;
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                return;
            }
            // Decide the next step under the state lock, fire outside it
            let step = {
                let mut state = self.state.lock().unwrap();
                if state.finished {
                    Step::Done
                } else {
                    let needed = self.interval - state.carry;
                    if budget < needed {
                        state.carry += budget;
                        Step::Done
                    } else {
                        budget -= needed;
                        state.carry = 0;
                        state.elapsed = (state.elapsed + self.interval).min(self.duration);
                        if state.elapsed >= self.duration {
                            state.finished = true;
                            Step::Finish
                        } else {
                            Step::Tick(self.duration - state.elapsed)
                        }
                    }
                }
            };
            match step {
                Step::Tick(remaining) => (self.on_tick)(remaining),
                Step::Finish => {
                    if let Some(finish) = self.on_finish.lock().unwrap().take() {
                        finish();
                    }
                    return;
                }
                Step::Done => return,
            }
        }
    }

    fn is_done(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.state.lock().unwrap().finished
    }
}

struct ManualTickHandle {
    job: Arc<ManualJob>,
}

impl TickHandle for ManualTickHandle {
    fn cancel(&mut self) {
        self.job.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_job(ticker: &ManualTicker, duration: u64, interval: u64) -> Arc<Mutex<Vec<u64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ticks = Arc::clone(&seen);
        let finish = Arc::clone(&seen);
        ticker
            .schedule(
                duration,
                interval,
                Box::new(move |remaining| ticks.lock().unwrap().push(remaining)),
                Box::new(move || finish.lock().unwrap().push(u64::MAX)),
            )
            .unwrap();
        seen
    }

    #[test]
    fn test_manual_ticker_steps_in_intervals() {
        let ticker = ManualTicker::new();
        let seen = counting_job(&ticker, 500, 100);

        ticker.advance(250);
        assert_eq!(*seen.lock().unwrap(), vec![400, 300]);

        // The leftover 50ms carries into the next advance
        ticker.advance(50);
        assert_eq!(*seen.lock().unwrap(), vec![400, 300, 200]);

        ticker.advance(200);
        assert_eq!(*seen.lock().unwrap(), vec![400, 300, 200, 100, u64::MAX]);
        assert_eq!(ticker.active_jobs(), 0);
    }

    #[test]
    fn test_cancel_stops_future_callbacks() {
        let ticker = ManualTicker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let ticks = Arc::clone(&seen);
        let mut handle = ticker
            .schedule(
                1000,
                100,
                Box::new(move |remaining| ticks.lock().unwrap().push(remaining)),
                Box::new(|| {}),
            )
            .unwrap();

        ticker.advance(200);
        handle.cancel();
        ticker.advance(1000);
        assert_eq!(*seen.lock().unwrap(), vec![900, 800]);
    }
}
