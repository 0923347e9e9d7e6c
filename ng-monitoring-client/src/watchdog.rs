use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Idle,
    Armed,
    /// The deadline passed without traffic; waits for the next reset.
    Fired,
}

type FireCallback = Box<dyn Fn() + Send + Sync>;

/// Detects a stalled publish stream.
///
/// Arming spawns a tokio task that sleeps until the current deadline; every
/// `reset` pushes the deadline out by one interval. If the deadline passes
/// the callback runs once and the timer stays `Fired` until traffic resets
/// it, which re-arms it for the next stall.
///
/// Each arm bumps a generation counter and the task gives up as soon as its
/// generation is stale, so a `cancel` racing with a firing task never yields
/// a callback after `cancel` returned. The callback runs after the timer lock
/// is released, so it may query or reset the timer.
#[derive(Clone)]
pub struct WatchdogTimer {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<TimerState>,
    on_fire: FireCallback,
}

struct TimerState {
    status: WatchdogState,
    generation: u64,
    interval: Duration,
    deadline: Instant,
    cancel: Option<CancellationToken>,
    fired: u64,
}

impl WatchdogTimer {
    pub fn new(on_fire: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(TimerState {
                    status: WatchdogState::Idle,
                    generation: 0,
                    interval: Duration::ZERO,
                    deadline: Instant::now(),
                    cancel: None,
                    fired: 0,
                }),
                on_fire: Box::new(on_fire),
            }),
        }
    }

    /// Starts (or restarts) the timer with `interval`. Must be called from
    /// within a tokio runtime.
    pub fn arm(&self, interval: Duration) {
        let (generation, token) = {
            let mut state = self.inner.lock();
            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            state.generation = state.generation.wrapping_add(1);
            state.interval = interval;
            state.deadline = Instant::now() + interval;
            state.status = WatchdogState::Armed;
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());
            (state.generation, token)
        };
        trace!(generation, interval_ms = interval.as_millis() as u64, "watchdog armed");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(generation, token).await });
    }

    /// Records traffic. An idle timer stays idle; a fired one is re-armed.
    pub fn reset(&self) {
        let rearm = {
            let mut state = self.inner.lock();
            match state.status {
                WatchdogState::Idle => return,
                WatchdogState::Armed => {
                    state.deadline = Instant::now() + state.interval;
                    None
                }
                WatchdogState::Fired => Some(state.interval),
            }
        };
        if let Some(interval) = rearm {
            self.arm(interval);
        }
    }

    pub fn cancel(&self) {
        let mut state = self.inner.lock();
        state.generation = state.generation.wrapping_add(1);
        state.status = WatchdogState::Idle;
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.inner.lock().status
    }

    /// Current interval; `None` while idle.
    pub fn interval(&self) -> Option<Duration> {
        let state = self.inner.lock();
        (state.status != WatchdogState::Idle).then_some(state.interval)
    }

    /// Number of stalls reported since creation.
    pub fn fire_count(&self) -> u64 {
        self.inner.lock().fired
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self, generation: u64, token: CancellationToken) {
        loop {
            let deadline = {
                let state = self.lock();
                if state.generation != generation || state.status != WatchdogState::Armed {
                    return;
                }
                state.deadline
            };

            tokio::select! {
                _ = token.cancelled() => return,
                _ = sleep_until(deadline) => {}
            }

            {
                let mut state = self.lock();
                if state.generation != generation || state.status != WatchdogState::Armed {
                    return;
                }
                if Instant::now() < state.deadline {
                    // reset while sleeping
                    continue;
                }
                state.status = WatchdogState::Fired;
                state.fired += 1;
                state.cancel = None;
            }
            trace!(generation, "watchdog fired");
            (self.on_fire)();
            return;
        }
    }
}

impl std::fmt::Debug for WatchdogTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("WatchdogTimer")
            .field("state", &state.status)
            .field("interval", &state.interval)
            .field("fired", &state.fired)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::sleep;

    fn counting() -> (WatchdogTimer, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let timer = WatchdogTimer::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (timer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_stall() {
        let (timer, count) = counting();
        timer.arm(Duration::from_millis(2_000));
        sleep(Duration::from_millis(5_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), WatchdogState::Fired);

        // traffic re-arms for the next stall
        timer.reset();
        assert_eq!(timer.state(), WatchdogState::Armed);
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(timer.fire_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn traffic_keeps_it_armed() {
        let (timer, count) = counting();
        timer.arm(Duration::from_millis(1_000));
        for _ in 0..10 {
            sleep(Duration::from_millis(600)).await;
            timer.reset();
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timer.state(), WatchdogState::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let (timer, count) = counting();
        timer.arm(Duration::from_millis(1_000));
        sleep(Duration::from_millis(500)).await;
        timer.cancel();
        sleep(Duration::from_millis(3_000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timer.state(), WatchdogState::Idle);
        assert!(timer.interval().is_none());

        // idle timers ignore traffic
        timer.reset();
        assert_eq!(timer.state(), WatchdogState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_can_reenter_timer() {
        let slot: Arc<std::sync::OnceLock<WatchdogTimer>> = Arc::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let timer = {
            let slot = Arc::clone(&slot);
            let seen = Arc::clone(&seen);
            WatchdogTimer::new(move || {
                if let Some(timer) = slot.get() {
                    seen.lock().unwrap().push(timer.state());
                    // traffic observed from inside the callback re-arms
                    timer.reset();
                }
            })
        };
        slot.set(timer.clone()).unwrap();

        timer.arm(Duration::from_millis(1_000));
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(*seen.lock().unwrap(), vec![WatchdogState::Fired]);
        assert_eq!(timer.state(), WatchdogState::Armed);

        timer.cancel();
        sleep(Duration::from_millis(2_000)).await;
        assert_eq!(timer.fire_count(), 1);
        assert_eq!(timer.state(), WatchdogState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous_task() {
        let (timer, count) = counting();
        timer.arm(Duration::from_millis(1_000));
        sleep(Duration::from_millis(800)).await;
        timer.arm(Duration::from_millis(1_000));
        sleep(Duration::from_millis(800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
