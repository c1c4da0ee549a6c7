//! Periodic "are there new items" timer
//!
//! An explicit two-state machine: `Stopped`, or `Running` with the handle of
//! the spawned timer task. There is at most one timer task per controller.
//! Each run gets a fresh generation number; a tick reports its generation
//! so callers can discard results from a run that has since been stopped.

use futures::future::BoxFuture;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

type TickFn = Arc<dyn Fn(u64) -> BoxFuture<'static, ControlFlow<()>> + Send + Sync>;

enum PollState {
    Stopped,
    Running { handle: JoinHandle<()>, generation: u64 },
}

/// Owns the poll timer for one feed window
pub struct PollController {
    interval: Duration,
    state: PollState,
    last_generation: u64,
    /// Kept so a paused controller can resume with the same tick
    on_tick: Option<TickFn>,
}

impl PollController {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: PollState::Stopped,
            last_generation: 0,
            on_tick: None,
        }
    }

    /// Run `on_tick` every interval until stopped or until it returns
    /// `ControlFlow::Break`. The first tick fires one interval after start.
    ///
    /// No-op (returns false) when already running.
    pub fn start<F, Fut>(&mut self, on_tick: F) -> bool
    where
        F: Fn(u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }
        let tick: TickFn = Arc::new(move |generation| Box::pin(on_tick(generation)));
        self.on_tick = Some(Arc::clone(&tick));
        self.spawn(tick);
        true
    }

    /// Cancel the timer. Ticks already scheduled never fire. Returns whether
    /// a timer was running.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, PollState::Stopped) {
            PollState::Running { handle, generation } => {
                let live = !handle.is_finished();
                handle.abort();
                debug!(generation, "Poll timer stopped");
                live
            }
            PollState::Stopped => false,
        }
    }

    /// Stop ticking while a one-shot fetch runs, so a tick cannot race it.
    /// Pair with [`PollController::resume`] once the fetch settles.
    pub fn pause_for_exclusive_fetch(&mut self) -> bool {
        self.stop()
    }

    /// Start again with the last tick function. No-op when running or when
    /// the controller was never started.
    pub fn resume(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        match self.on_tick.clone() {
            Some(tick) => {
                self.spawn(tick);
                true
            }
            None => false,
        }
    }

    /// Stop and drop the remembered tick so `resume` cannot revive it
    pub fn reset(&mut self) {
        self.stop();
        self.on_tick = None;
    }

    /// A run whose task has ended (tick returned `Break`, or panicked)
    /// counts as stopped
    pub fn is_running(&self) -> bool {
        matches!(&self.state, PollState::Running { handle, .. } if !handle.is_finished())
    }

    /// Whether `generation` belongs to the run currently in progress
    pub fn is_current(&self, generation: u64) -> bool {
        matches!(
            &self.state,
            PollState::Running { handle, generation: g } if *g == generation && !handle.is_finished()
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn spawn(&mut self, tick: TickFn) {
        self.last_generation += 1;
        let generation = self.last_generation;
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if tick(generation).await.is_break() {
                    debug!(generation, "Poll tick requested stop");
                    break;
                }
            }
        });

        debug!(generation, interval_ms = period.as_millis() as u64, "Poll timer started");
        self.state = PollState::Running { handle, generation };
    }
}

impl Drop for PollController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PollController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollController")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("last_generation", &self.last_generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_tick(counter: &Arc<AtomicUsize>) -> impl Fn(u64) -> BoxFuture<'static, ControlFlow<()>> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_generation| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));

        assert!(poll.start(counting_tick(&counter)));
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_is_noop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));

        assert!(poll.start(counting_tick(&counter)));
        assert!(!poll.start(counting_tick(&counter)));
        tokio::time::sleep(Duration::from_millis(250)).await;

        // One timer, not two
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_scheduled_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));

        poll.start(counting_tick(&counter));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(poll.stop());
        assert!(!poll.stop());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!poll.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_uses_new_generation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));

        poll.start(counting_tick(&counter));
        assert!(poll.is_current(1));

        assert!(poll.pause_for_exclusive_fetch());
        assert!(!poll.is_current(1));

        assert!(poll.resume());
        assert!(poll.is_current(2));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_forgets_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));

        poll.start(counting_tick(&counter));
        poll.reset();

        assert!(!poll.resume());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_the_loop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));
        let seen = Arc::clone(&counter);

        poll.start(move |_| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Break(())
            }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!poll.is_running());
        assert!(!poll.is_current(1));
        assert!(!poll.stop());

        // A finished run does not block a new one
        assert!(poll.start(counting_tick(&counter)));
        assert!(poll.is_current(2));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_break_restarts_timer() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut poll = PollController::new(Duration::from_millis(100));
        let seen = Arc::clone(&counter);

        poll.start(move |_| {
            let seen = Arc::clone(&seen);
            async move {
                // Stop after the first tick of every run
                seen.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Break(())
            }
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!poll.is_running());

        assert!(poll.resume());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
