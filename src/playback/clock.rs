use crate::config::DEFAULT_PLAYBACK_BASE_INTERVAL_MS;
use crate::error::SyncError;
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(DEFAULT_PLAYBACK_BASE_INTERVAL_MS);
pub const DEFAULT_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub current_index: usize,
    pub max: usize,
    pub playing: bool,
    pub speed: f64,
    pub can_step_back: bool,
    pub can_step_forward: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Waiting,
    Advanced(usize),
    Finished(usize),
}

fn frame_interval_for(base_interval: Duration, speed: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(base_interval.as_secs_f64() / speed).ok()
}

// Never reads the time itself; every time-dependent call takes `now`.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    current_index: usize,
    max: usize,
    playing: bool,
    speed: f64,
    base_interval: Duration,
    last_advance: Option<Instant>,
}

impl PlaybackClock {
    pub fn new(max: usize, base_interval: Duration) -> Self {
        Self {
            current_index: 0,
            max,
            playing: false,
            speed: DEFAULT_SPEED,
            base_interval,
            last_advance: None,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn can_step_back(&self) -> bool {
        self.current_index > 0
    }

    pub fn can_step_forward(&self) -> bool {
        self.current_index < self.max
    }

    pub fn frame_interval(&self) -> Duration {
        frame_interval_for(self.base_interval, self.speed).unwrap_or(Duration::MAX)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            current_index: self.current_index,
            max: self.max,
            playing: self.playing,
            speed: self.speed,
            can_step_back: self.can_step_back(),
            can_step_forward: self.can_step_forward(),
        }
    }

    // At the end of the range playback restarts from 0.
    pub fn play(&mut self, now: Instant) -> bool {
        if self.max == 0 {
            return false;
        }
        if self.playing {
            return true;
        }
        if self.current_index >= self.max {
            self.current_index = 0;
        }
        self.playing = true;
        self.last_advance = Some(now);
        true
    }

    pub fn pause(&mut self) -> bool {
        let was_playing = self.playing;
        self.playing = false;
        self.last_advance = None;
        was_playing
    }

    pub fn toggle(&mut self, now: Instant) -> bool {
        if self.playing {
            self.pause();
            false
        } else {
            self.play(now)
        }
    }

    pub fn step_back(&mut self) -> bool {
        if !self.can_step_back() {
            return false;
        }
        self.current_index -= 1;
        true
    }

    pub fn step_forward(&mut self) -> bool {
        if !self.can_step_forward() {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), SyncError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(SyncError::InvalidArgument(format!(
                "playback speed must be a finite positive number, got {speed}"
            )));
        }
        if frame_interval_for(self.base_interval, speed).is_none() {
            return Err(SyncError::InvalidArgument(format!(
                "playback speed {speed} gives a frame interval out of range"
            )));
        }
        self.speed = speed;
        Ok(())
    }

    pub fn set_current_index(&mut self, index: usize) -> usize {
        self.current_index = index.min(self.max);
        self.current_index
    }

    pub fn set_max(&mut self, max: usize) {
        self.max = max;
        self.current_index = 0;
        self.playing = false;
        self.last_advance = None;
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.playing {
            return TickOutcome::Idle;
        }

        let last_advance = *self.last_advance.get_or_insert(now);
        if now.saturating_duration_since(last_advance) < self.frame_interval() {
            return TickOutcome::Waiting;
        }

        if self.current_index < self.max {
            self.current_index += 1;
        }
        self.last_advance = Some(now);

        if self.current_index >= self.max {
            self.pause();
            TickOutcome::Finished(self.current_index)
        } else {
            TickOutcome::Advanced(self.current_index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1_000);

    #[test]
    fn plays_to_max_then_auto_pauses() {
        let mut clock = PlaybackClock::new(50, BASE);
        let start = Instant::now();
        assert!(clock.play(start));

        let interval = clock.frame_interval();
        let mut now = start;
        let mut last_outcome = TickOutcome::Idle;
        for _ in 0..50 {
            now += interval;
            last_outcome = clock.tick(now);
        }

        assert_eq!(last_outcome, TickOutcome::Finished(50));
        assert_eq!(clock.current_index(), 50);
        assert!(!clock.is_playing());

        now += interval;
        assert_eq!(clock.tick(now), TickOutcome::Idle);
        assert_eq!(clock.current_index(), 50);
    }

    #[test]
    fn waits_for_a_full_frame_interval() {
        let mut clock = PlaybackClock::new(10, BASE);
        let start = Instant::now();
        clock.play(start);

        assert_eq!(clock.tick(start + Duration::from_millis(16)), TickOutcome::Waiting);
        assert_eq!(clock.tick(start + Duration::from_millis(999)), TickOutcome::Waiting);
        assert_eq!(clock.tick(start + BASE), TickOutcome::Advanced(1));
        assert_eq!(
            clock.tick(start + BASE + Duration::from_millis(500)),
            TickOutcome::Waiting
        );
    }

    #[test]
    fn advances_at_most_one_step_per_tick() {
        let mut clock = PlaybackClock::new(10, BASE);
        let start = Instant::now();
        clock.play(start);

        assert_eq!(
            clock.tick(start + Duration::from_secs(5)),
            TickOutcome::Advanced(1)
        );
    }

    #[test]
    fn speed_shortens_frame_interval_on_next_tick() {
        let mut clock = PlaybackClock::new(10, BASE);
        let start = Instant::now();
        clock.play(start);

        assert_eq!(clock.tick(start + Duration::from_millis(250)), TickOutcome::Waiting);
        clock.set_speed(4.0).expect("valid speed");
        assert_eq!(clock.frame_interval(), Duration::from_millis(250));
        assert_eq!(
            clock.tick(start + Duration::from_millis(260)),
            TickOutcome::Advanced(1)
        );
    }

    #[test]
    fn rejects_non_positive_speed() {
        let mut clock = PlaybackClock::new(10, BASE);
        assert!(clock.set_speed(0.0).is_err());
        assert!(clock.set_speed(-2.0).is_err());
        assert!(clock.set_speed(f64::NAN).is_err());
        assert_eq!(clock.speed(), DEFAULT_SPEED);
    }

    #[test]
    fn rejects_speed_whose_frame_interval_overflows() {
        let mut clock = PlaybackClock::new(10, BASE);
        let result = clock.set_speed(1e-20);
        assert!(matches!(result, Err(SyncError::InvalidArgument(_))));
        assert_eq!(clock.speed(), DEFAULT_SPEED);

        let start = Instant::now();
        clock.play(start);
        assert_eq!(clock.tick(start + BASE), TickOutcome::Advanced(1));

        clock.set_speed(1e-6).expect("interval still fits");
        assert!(clock.frame_interval() > Duration::from_secs(999_999));
        assert_eq!(clock.tick(start + BASE * 2), TickOutcome::Waiting);
    }

    #[test]
    fn step_is_noop_at_bounds() {
        let mut clock = PlaybackClock::new(2, BASE);
        assert!(!clock.can_step_back());
        assert!(!clock.step_back());
        assert_eq!(clock.current_index(), 0);

        assert!(clock.step_forward());
        assert!(clock.step_forward());
        assert!(!clock.can_step_forward());
        assert!(!clock.step_forward());
        assert_eq!(clock.current_index(), 2);

        assert!(clock.step_back());
        assert_eq!(clock.current_index(), 1);
    }

    #[test]
    fn stepping_works_while_playing() {
        let mut clock = PlaybackClock::new(5, BASE);
        clock.play(Instant::now());
        assert!(clock.step_forward());
        assert!(clock.is_playing());
        assert_eq!(clock.current_index(), 1);
    }

    #[test]
    fn changing_max_resets_index_and_pauses() {
        let mut clock = PlaybackClock::new(20, BASE);
        let start = Instant::now();
        clock.set_current_index(12);
        clock.play(start);

        clock.set_max(100);
        assert_eq!(clock.current_index(), 0);
        assert!(!clock.is_playing());
        assert_eq!(clock.tick(start + BASE), TickOutcome::Idle);

        clock.set_max(3);
        assert_eq!(clock.current_index(), 0);
        assert_eq!(clock.max(), 3);
    }

    #[test]
    fn set_current_index_clamps_to_max() {
        let mut clock = PlaybackClock::new(10, BASE);
        assert_eq!(clock.set_current_index(42), 10);
        assert!(!clock.can_step_forward());
    }

    #[test]
    fn play_at_end_restarts_and_empty_range_cannot_play() {
        let mut clock = PlaybackClock::new(3, BASE);
        clock.set_current_index(3);
        assert!(clock.play(Instant::now()));
        assert_eq!(clock.current_index(), 0);

        let mut empty = PlaybackClock::new(0, BASE);
        assert!(!empty.play(Instant::now()));
        assert!(!empty.is_playing());
    }

    #[test]
    fn toggle_flips_play_state() {
        let mut clock = PlaybackClock::new(3, BASE);
        let now = Instant::now();
        assert!(clock.toggle(now));
        assert!(clock.is_playing());
        assert!(!clock.toggle(now));
        assert!(!clock.is_playing());
    }
}
