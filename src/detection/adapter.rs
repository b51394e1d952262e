// src/detection/adapter.rs

use crate::types::{Detection, DetectionClass, FrameSignals};

/// Reduce one frame's raw detections to the three channel signals plus the
/// measurements downstream components need (ball center for the filter, rim
/// bbox for the attempt tracker).
///
/// When several ball boxes appear in one frame the first one wins; this is a
/// deliberate simplification, not a fusion strategy.
pub fn extract_signals(detections: &[Detection]) -> FrameSignals {
    let mut signals = FrameSignals::default();

    for det in detections {
        match DetectionClass::from_id(det.class_id) {
            Some(DetectionClass::Ball) => {
                signals.ball_seen = true;
                if signals.ball_center.is_none() {
                    signals.ball_center = Some(det.center());
                }
            }
            Some(DetectionClass::Rim) => {
                signals.rim_seen = true;
                if signals.rim_bbox.is_none() {
                    signals.rim_bbox = Some(det.bbox);
                }
            }
            Some(DetectionClass::MadeShot) => {
                signals.shot_signal_seen = true;
            }
            // Person and shot-attempt markers carry no state
            Some(DetectionClass::Person) | Some(DetectionClass::ShotAttempt) | None => {}
        }
    }

    signals
}
