// src/pipeline/session.rs
//
// Foreground session loop state. Owns every mutable core component (filter,
// persistence counters, attempt tracker, ledger) and mutates them only from
// the consumer side, one observation at a time, in FIFO order.

use crate::analysis::attempts::{AttemptEvent, ShotAttemptTracker};
use crate::analysis::ball_filter::BallFilter;
use crate::analysis::ledger::{GraphPoint, SessionStats, ShotLedger, ShotRecord, ZoneStats};
use crate::analysis::streaks::{find_streak_periods, StreakPeriod};
use crate::detection::DetectionPersistence;
use crate::types::{Config, CourtZone, DisplaySnapshot, FrameObservation};
use serde::Serialize;
use tracing::{debug, info};

/// Result of absorbing one frame observation.
#[derive(Debug, Clone, Copy)]
pub struct SessionUpdate {
    pub snapshot: DisplaySnapshot,
    pub made_shot: bool,
    pub missed_shot: bool,
}

/// End-of-session report, serialized to the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub stats: SessionStats,
    pub hot_period: Option<StreakPeriod>,
    pub cold_period: Option<StreakPeriod>,
    pub zone_stats: Vec<ZoneStats>,
    pub graph_points: Vec<GraphPoint>,
    pub shots: Vec<ShotRecord>,
    pub frames_processed: u64,
}

pub struct ShotSession {
    filter: BallFilter,
    persistence: DetectionPersistence,
    attempts: ShotAttemptTracker,
    ledger: ShotLedger,
    frames_processed: u64,
    last_timestamp_ms: f64,
}

impl ShotSession {
    pub fn new(config: &Config) -> Self {
        Self {
            filter: BallFilter::new(&config.filter),
            persistence: DetectionPersistence::new(&config.detection),
            attempts: ShotAttemptTracker::new(config.detection.attempt_history_len),
            ledger: ShotLedger::new(config.detection.zone_window_seconds),
            frames_processed: 0,
            last_timestamp_ms: 0.0,
        }
    }

    /// Absorb one frame observation: predict/update the filter, debounce the
    /// detection channels, resolve attempts, and append confirmed shots.
    pub fn process_observation(&mut self, obs: &FrameObservation) -> SessionUpdate {
        self.frames_processed += 1;
        self.last_timestamp_ms = obs.timestamp_ms;

        // Predict every frame; correct only when the ball was seen
        self.filter.predict();
        if let Some(center) = obs.signals.ball_center {
            self.filter.update(center);
        }

        let states = self.persistence.observe(&obs.signals);
        let attempt = self.attempts.observe(&obs.signals, states.shot_event);

        let mut made_shot = false;
        let mut missed_shot = false;

        if states.shot_event {
            self.ledger.record_shot(true, obs.timestamp_ms);
            made_shot = true;
        }

        match attempt {
            Some(AttemptEvent::Miss) => {
                self.ledger.record_shot(false, obs.timestamp_ms);
                missed_shot = true;
            }
            Some(AttemptEvent::RimContact) => {
                debug!("Rim contact at frame {}", obs.frame_id);
            }
            None => {}
        }

        self.ledger.tick(obs.timestamp_ms);

        // Before the first measurement the filter reports the zero vector;
        // don't present that as a ball position
        let ball = self.filter.state();
        let (ball_position, ball_velocity) = if ball.initialized {
            (
                (ball.position.0 as f32, ball.position.1 as f32),
                (ball.velocity.0 as f32, ball.velocity.1 as f32),
            )
        } else {
            ((0.0, 0.0), (0.0, 0.0))
        };

        SessionUpdate {
            snapshot: DisplaySnapshot {
                ball_stable: states.ball,
                rim_stable: states.rim,
                shot_made_stable: states.shot_made,
                ball_position,
                ball_velocity,
            },
            made_shot,
            missed_shot,
        }
    }

    /// Operator-asserted make/miss. Same ledger path as detector-confirmed
    /// events, so statistics are identical regardless of source.
    pub fn record_manual_shot(&mut self, made: bool, now_ms: f64) {
        info!("Manual shot entry: {}", if made { "make" } else { "miss" });
        self.ledger.record_shot(made, now_ms);
    }

    pub fn assign_zone(&mut self, zone: CourtZone, now_ms: f64) -> bool {
        self.ledger.assign_zone(zone, now_ms)
    }

    /// Session clock: the timestamp of the last processed observation. The
    /// ledger keeps a single timeline, so manual entries are stamped with
    /// this rather than a wall clock that may diverge on file sources.
    pub fn clock_ms(&self) -> f64 {
        self.last_timestamp_ms
    }

    pub fn stats(&self) -> SessionStats {
        self.ledger.stats()
    }

    pub fn latest_record(&self) -> Option<&ShotRecord> {
        self.ledger.records().last()
    }

    pub fn latest_graph_point(&self) -> Option<GraphPoint> {
        self.ledger.graph_points().last().copied()
    }

    /// Close the ledger and run the post-hoc analytics. Call only after the
    /// capture worker has stopped and the queue is drained.
    pub fn finalize(mut self) -> SessionSummary {
        self.ledger.close();
        let (hot_period, cold_period) = find_streak_periods(self.ledger.records());

        SessionSummary {
            stats: self.ledger.stats(),
            hot_period,
            cold_period,
            zone_stats: self.ledger.zone_stats(),
            graph_points: self.ledger.graph_points().to_vec(),
            shots: self.ledger.records().to_vec(),
            frames_processed: self.frames_processed,
        }
    }
}
