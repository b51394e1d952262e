// src/analysis/attempts.rs
//
// Trajectory-based shot attempt tracking. The made-shot detector class is
// authoritative for makes; this watcher exists to catch the misses: an
// attempt opens when the ball starts moving upward, arms once the ball
// clears the rim top, and a ball that then falls below the rim without a
// made-shot signal is recorded as a missed shot.

use crate::types::FrameSignals;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptEvent {
    /// Ball center entered the rim box; resolution belongs to the made-shot
    /// channel from here.
    RimContact,
    /// Ball fell below the rim during an armed attempt.
    Miss,
}

pub struct ShotAttemptTracker {
    positions: VecDeque<(f32, f32)>,
    capacity: usize,
    in_progress: bool,
    /// Ball has been above the rim top during this attempt
    armed: bool,
}

impl ShotAttemptTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
            in_progress: false,
            armed: false,
        }
    }

    /// Advance one frame. `shot_event` is the debounced made-shot rising
    /// edge; it closes any open attempt so a make is never double-counted
    /// as a miss.
    pub fn observe(&mut self, signals: &FrameSignals, shot_event: bool) -> Option<AttemptEvent> {
        if shot_event {
            if self.in_progress {
                debug!("Attempt resolved by made-shot signal");
            }
            self.reset();
            return None;
        }

        if let Some(center) = signals.ball_center {
            if self.positions.len() == self.capacity {
                self.positions.pop_front();
            }
            self.positions.push_back(center);
        }

        if self.positions.len() < 2 {
            return None;
        }

        let last = self.positions[self.positions.len() - 1];
        let prev = self.positions[self.positions.len() - 2];

        // Image y grows downward: a decreasing y means the ball is rising
        if !self.in_progress && last.1 < prev.1 {
            self.in_progress = true;
            self.armed = false;
            debug!("Shot attempt started");
        }

        if self.in_progress {
            if let Some(rim) = signals.rim_bbox {
                let inside_rim =
                    rim[0] <= last.0 && last.0 <= rim[2] && rim[1] <= last.1 && last.1 <= rim[3];
                if inside_rim {
                    self.reset();
                    return Some(AttemptEvent::RimContact);
                }

                if last.1 < rim[1] {
                    self.armed = true;
                }

                if self.armed && last.1 > rim[3] {
                    self.reset();
                    debug!("Attempt resolved as miss (ball below rim)");
                    return Some(AttemptEvent::Miss);
                }
            }
        }

        None
    }

    fn reset(&mut self) {
        self.in_progress = false;
        self.armed = false;
        self.positions.clear();
    }

    #[cfg(test)]
    fn is_in_progress(&self) -> bool {
        self.in_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIM: [f32; 4] = [300.0, 100.0, 360.0, 140.0];

    fn signals(ball: Option<(f32, f32)>, rim: Option<[f32; 4]>) -> FrameSignals {
        FrameSignals {
            ball_seen: ball.is_some(),
            rim_seen: rim.is_some(),
            shot_signal_seen: false,
            ball_center: ball,
            rim_bbox: rim,
        }
    }

    #[test]
    fn test_no_attempt_without_upward_motion() {
        let mut tracker = ShotAttemptTracker::new(30);
        // Ball dribbling downward
        for y in [300.0, 320.0, 340.0] {
            assert!(tracker
                .observe(&signals(Some((200.0, y)), Some(RIM)), false)
                .is_none());
        }
        assert!(!tracker.is_in_progress());
    }

    #[test]
    fn test_upward_motion_below_rim_is_not_a_miss() {
        let mut tracker = ShotAttemptTracker::new(30);
        // Rising, but never clearing the rim top: nothing to resolve yet
        tracker.observe(&signals(Some((250.0, 400.0)), Some(RIM)), false);
        let event = tracker.observe(&signals(Some((252.0, 350.0)), Some(RIM)), false);
        assert!(event.is_none());
        assert!(tracker.is_in_progress());
    }

    #[test]
    fn test_miss_recorded_when_ball_falls_below_rim() {
        let mut tracker = ShotAttemptTracker::new(30);

        // Rising beside the rim, over its top, then falling past the bottom
        tracker.observe(&signals(Some((250.0, 400.0)), Some(RIM)), false);
        tracker.observe(&signals(Some((255.0, 250.0)), Some(RIM)), false);
        tracker.observe(&signals(Some((260.0, 90.0)), Some(RIM)), false);
        assert!(tracker.is_in_progress());

        let event = tracker.observe(&signals(Some((265.0, 160.0)), Some(RIM)), false);
        assert_eq!(event, Some(AttemptEvent::Miss));
        assert!(!tracker.is_in_progress());
    }

    #[test]
    fn test_exactly_one_miss_per_attempt() {
        let mut tracker = ShotAttemptTracker::new(30);
        tracker.observe(&signals(Some((250.0, 400.0)), Some(RIM)), false);
        tracker.observe(&signals(Some((255.0, 90.0)), Some(RIM)), false);
        assert_eq!(
            tracker.observe(&signals(Some((260.0, 200.0)), Some(RIM)), false),
            Some(AttemptEvent::Miss)
        );

        // Continued descent after the resolution must not fire again
        assert!(tracker
            .observe(&signals(Some((265.0, 260.0)), Some(RIM)), false)
            .is_none());
    }

    #[test]
    fn test_made_shot_signal_cancels_attempt() {
        let mut tracker = ShotAttemptTracker::new(30);
        tracker.observe(&signals(Some((320.0, 400.0)), Some(RIM)), false);
        tracker.observe(&signals(Some((322.0, 90.0)), Some(RIM)), false);
        assert!(tracker.is_in_progress());

        // Made-shot rising edge closes the attempt
        assert!(tracker.observe(&signals(None, Some(RIM)), true).is_none());
        assert!(!tracker.is_in_progress());

        // The ball landing below the rim afterwards is not a miss
        tracker.observe(&signals(Some((330.0, 150.0)), Some(RIM)), false);
        let event = tracker.observe(&signals(Some((330.0, 170.0)), Some(RIM)), false);
        assert!(event.is_none());
    }

    #[test]
    fn test_rim_contact_defers_to_made_shot_channel() {
        let mut tracker = ShotAttemptTracker::new(30);
        tracker.observe(&signals(Some((320.0, 400.0)), Some(RIM)), false);
        tracker.observe(&signals(Some((322.0, 250.0)), Some(RIM)), false);

        // Ball center inside the rim box: attempt closes without a miss
        let event = tracker.observe(&signals(Some((330.0, 120.0)), Some(RIM)), false);
        assert_eq!(event, Some(AttemptEvent::RimContact));
        assert!(!tracker.is_in_progress());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut tracker = ShotAttemptTracker::new(5);
        for i in 0..20 {
            tracker.observe(&signals(Some((100.0, 500.0 + i as f32)), None), false);
        }
        assert!(tracker.positions.len() <= 5);
    }
}
