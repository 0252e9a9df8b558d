use crate::config::{SyncConfig, DEFAULT_PLAYBACK_TICK_MS};
use crate::error::SyncError;
use crate::playback::clock::{PlaybackClock, PlaybackSnapshot, TickOutcome};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct PlaybackShared {
    clock: Mutex<PlaybackClock>,
    ticker: Mutex<Option<CancellationToken>>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    tick_period: Duration,
}

impl PlaybackShared {
    // Callers hold the clock lock, so ticker changes are ordered with clock changes.
    fn publish(&self, clock: &PlaybackClock) {
        self.snapshot_tx.send_replace(clock.snapshot());
    }

    fn stop_ticker(&self) {
        if let Some(token) = self.ticker.lock().take() {
            token.cancel();
        }
    }

    fn ensure_ticker(self: &Arc<Self>, runtime: &Handle) {
        let mut slot = self.ticker.lock();
        if slot.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return;
        }
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        runtime.spawn(run_ticker(Arc::clone(self), token));
    }

    fn start_locked(self: &Arc<Self>, clock: &mut PlaybackClock, runtime: &Handle) -> bool {
        let playing = clock.play(Instant::now());
        if playing {
            self.ensure_ticker(runtime);
        }
        self.publish(clock);
        playing
    }
}

pub struct PlaybackController {
    shared: Arc<PlaybackShared>,
}

impl PlaybackController {
    pub fn new(max: usize, base_interval: Duration, tick_period: Duration) -> Self {
        let clock = PlaybackClock::new(max, base_interval);
        let (snapshot_tx, _) = watch::channel(clock.snapshot());

        Self {
            shared: Arc::new(PlaybackShared {
                clock: Mutex::new(clock),
                ticker: Mutex::new(None),
                snapshot_tx,
                tick_period: tick_period.max(Duration::from_millis(1)),
            }),
        }
    }

    pub fn from_config(max: usize, config: &SyncConfig) -> Self {
        Self::new(max, config.playback_base_interval(), config.playback_tick())
    }

    pub fn with_defaults(max: usize) -> Self {
        Self::new(
            max,
            crate::playback::clock::DEFAULT_BASE_INTERVAL,
            Duration::from_millis(DEFAULT_PLAYBACK_TICK_MS),
        )
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.shared.clock.lock().snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn current_index(&self) -> usize {
        self.shared.clock.lock().current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.clock.lock().is_playing()
    }

    pub fn can_step_back(&self) -> bool {
        self.shared.clock.lock().can_step_back()
    }

    pub fn can_step_forward(&self) -> bool {
        self.shared.clock.lock().can_step_forward()
    }

    pub fn play(&self) -> Result<bool, SyncError> {
        let runtime = Handle::try_current()?;
        let mut clock = self.shared.clock.lock();
        Ok(self.shared.start_locked(&mut clock, &runtime))
    }

    pub fn pause(&self) {
        let mut clock = self.shared.clock.lock();
        clock.pause();
        self.shared.stop_ticker();
        self.shared.publish(&clock);
    }

    pub fn toggle(&self) -> Result<bool, SyncError> {
        let mut clock = self.shared.clock.lock();
        if clock.is_playing() {
            clock.pause();
            self.shared.stop_ticker();
            self.shared.publish(&clock);
            return Ok(false);
        }
        let runtime = Handle::try_current()?;
        Ok(self.shared.start_locked(&mut clock, &runtime))
    }

    pub fn step_back(&self) -> bool {
        let mut clock = self.shared.clock.lock();
        let moved = clock.step_back();
        if moved {
            self.shared.publish(&clock);
        }
        moved
    }

    pub fn step_forward(&self) -> bool {
        let mut clock = self.shared.clock.lock();
        let moved = clock.step_forward();
        if moved {
            self.shared.publish(&clock);
        }
        moved
    }

    pub fn set_speed(&self, speed: f64) -> Result<(), SyncError> {
        let mut clock = self.shared.clock.lock();
        clock.set_speed(speed)?;
        self.shared.publish(&clock);
        Ok(())
    }

    pub fn set_current_index(&self, index: usize) -> usize {
        let mut clock = self.shared.clock.lock();
        let index = clock.set_current_index(index);
        self.shared.publish(&clock);
        index
    }

    pub fn set_max(&self, max: usize) {
        let mut clock = self.shared.clock.lock();
        clock.set_max(max);
        self.shared.stop_ticker();
        self.shared.publish(&clock);
    }

    pub fn is_ticking(&self) -> bool {
        self.shared
            .ticker
            .lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let mut clock = self.shared.clock.lock();
        clock.pause();
        self.shared.stop_ticker();
    }
}

async fn run_ticker(shared: Arc<PlaybackShared>, token: CancellationToken) {
    let mut interval = tokio::time::interval(shared.tick_period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                let mut clock = shared.clock.lock();
                if token.is_cancelled() {
                    break;
                }
                match clock.tick(Instant::now()) {
                    TickOutcome::Waiting => {}
                    TickOutcome::Advanced(_) => shared.publish(&clock),
                    TickOutcome::Finished(index) => {
                        debug!(index, "playback reached end of range");
                        token.cancel();
                        shared.publish(&clock);
                        break;
                    }
                    TickOutcome::Idle => {
                        token.cancel();
                        break;
                    }
                }
            }
        }
    }
}
