// src/detection/persistence.rs

use crate::types::{DetectionConfig, FrameSignals};
use tracing::debug;

/// Miss counter with a fixed threshold. The derived boolean stays true for
/// `threshold` frames after the last positive detection, so a one-frame
/// detector dropout never flickers the stable state.
#[derive(Debug, Clone)]
pub struct PersistenceCounter {
    counter: u32,
    threshold: u32,
}

impl PersistenceCounter {
    /// Starts at the threshold: every channel begins "not detected".
    pub fn new(threshold: u32) -> Self {
        Self {
            counter: threshold,
            threshold,
        }
    }

    /// Advance one frame. Returns true when this detection is a rising edge
    /// out of a fully-expired window (the counter was at/above threshold).
    pub fn observe(&mut self, detected: bool) -> bool {
        if detected {
            let rising = self.counter >= self.threshold;
            self.counter = 0;
            rising
        } else {
            self.counter = self.counter.saturating_add(1);
            false
        }
    }

    pub fn is_stable(&self) -> bool {
        self.counter < self.threshold
    }

    #[cfg(test)]
    pub fn count(&self) -> u32 {
        self.counter
    }
}

/// Debounced per-frame output of the persistence engine.
#[derive(Debug, Clone, Copy)]
pub struct StableStates {
    pub ball: bool,
    pub rim: bool,
    pub shot_made: bool,
    /// Fires exactly once per made-shot detection burst.
    pub shot_event: bool,
}

/// One counter per channel: ball, rim, shot-made. The shot-made channel
/// doubles as the event source for the ledger.
pub struct DetectionPersistence {
    ball: PersistenceCounter,
    rim: PersistenceCounter,
    shot_made: PersistenceCounter,
}

impl DetectionPersistence {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            ball: PersistenceCounter::new(config.ball_persistence_frames),
            rim: PersistenceCounter::new(config.rim_persistence_frames),
            shot_made: PersistenceCounter::new(config.shot_made_persistence_frames),
        }
    }

    pub fn observe(&mut self, signals: &FrameSignals) -> StableStates {
        self.ball.observe(signals.ball_seen);
        self.rim.observe(signals.rim_seen);
        let shot_event = self.shot_made.observe(signals.shot_signal_seen);

        if shot_event {
            debug!("Made-shot signal rising edge");
        }

        StableStates {
            ball: self.ball.is_stable(),
            rim: self.rim.is_stable(),
            shot_made: self.shot_made.is_stable(),
            shot_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DetectionConfig {
        DetectionConfig {
            ball_persistence_frames: 40,
            rim_persistence_frames: 20,
            shot_made_persistence_frames: 15,
            zone_window_seconds: 5.0,
            attempt_history_len: 30,
        }
    }

    fn signals(ball: bool, rim: bool, shot: bool) -> FrameSignals {
        FrameSignals {
            ball_seen: ball,
            rim_seen: rim,
            shot_signal_seen: shot,
            ball_center: None,
            rim_bbox: None,
        }
    }

    #[test]
    fn test_channels_start_not_detected() {
        let counter = PersistenceCounter::new(10);
        assert!(!counter.is_stable());
    }

    #[test]
    fn test_hysteresis_holds_until_threshold() {
        let threshold = 7;
        let mut counter = PersistenceCounter::new(threshold);
        counter.observe(true);
        assert!(counter.is_stable());

        // T-1 consecutive misses keep the state true
        for _ in 0..threshold - 1 {
            counter.observe(false);
            assert!(counter.is_stable());
        }

        // T-th miss flips it
        counter.observe(false);
        assert!(!counter.is_stable());
    }

    #[test]
    fn test_detection_resets_counter_regardless_of_count() {
        let mut counter = PersistenceCounter::new(5);
        counter.observe(true);
        counter.observe(false);
        counter.observe(false);
        assert_eq!(counter.count(), 2);

        counter.observe(true);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_single_event_per_burst() {
        let mut persistence = DetectionPersistence::new(&config());

        // Sustained positive burst longer than the threshold: one event
        let mut events = 0;
        for _ in 0..40 {
            if persistence.observe(&signals(false, false, true)).shot_event {
                events += 1;
            }
        }
        assert_eq!(events, 1);

        // Window must fully expire before the next burst can fire
        for _ in 0..14 {
            let states = persistence.observe(&signals(false, false, false));
            assert!(states.shot_made);
        }
        assert!(!persistence.observe(&signals(false, false, true)).shot_event);

        // After a full expiry a new burst fires again
        for _ in 0..15 {
            persistence.observe(&signals(false, false, false));
        }
        assert!(persistence.observe(&signals(false, false, true)).shot_event);
    }

    #[test]
    fn test_channels_are_independent() {
        let mut persistence = DetectionPersistence::new(&config());

        let states = persistence.observe(&signals(true, false, false));
        assert!(states.ball);
        assert!(!states.rim);
        assert!(!states.shot_made);

        let states = persistence.observe(&signals(false, true, false));
        assert!(states.ball); // still inside the ball hold-off window
        assert!(states.rim);
    }
}
