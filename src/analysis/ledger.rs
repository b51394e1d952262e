// src/analysis/ledger.rs
//
// Append-only shot history plus the running aggregates derived from it.
// Detector-confirmed events and manual operator corrections both land here
// through the same record_shot path, so the statistics cannot diverge by
// event source.

use crate::types::{CourtZone, ShotOutcome};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ShotRecord {
    /// 1-based, monotonically increasing
    pub sequence: u32,
    pub outcome: ShotOutcome,
    /// Milliseconds since session start
    pub timestamp_ms: f64,
    /// None while the assignment window is open; frozen to a court zone or
    /// Unknown afterwards
    pub zone: Option<CourtZone>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionStats {
    pub total_shots: u32,
    pub made_shots: u32,
    pub shot_percentage: f64,
    pub current_streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphPoint {
    pub elapsed_minutes: f64,
    pub shot_percentage: f64,
    pub total_shots: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneStats {
    pub zone: CourtZone,
    pub attempts: u32,
    pub makes: u32,
    pub percentage: f64,
}

pub struct ShotLedger {
    records: Vec<ShotRecord>,
    stats: SessionStats,
    graph: Vec<GraphPoint>,
    zone_window_ms: f64,
    /// Deadline for zone assignment on the most recent record, if still open
    zone_deadline: Option<f64>,
}

impl ShotLedger {
    pub fn new(zone_window_seconds: f64) -> Self {
        Self {
            records: Vec::new(),
            stats: SessionStats::default(),
            graph: Vec::new(),
            zone_window_ms: zone_window_seconds * 1000.0,
            zone_deadline: None,
        }
    }

    /// Append a confirmed shot and update every aggregate. Returns the new
    /// record so the caller can trigger side effects (audio, drawing).
    pub fn record_shot(&mut self, made: bool, timestamp_ms: f64) -> &ShotRecord {
        // A still-open window on the previous record freezes now: only the
        // most recent record may receive a zone.
        self.freeze_pending_zone();

        let outcome = if made {
            ShotOutcome::Made
        } else {
            ShotOutcome::Missed
        };

        let record = ShotRecord {
            sequence: self.records.len() as u32 + 1,
            outcome,
            timestamp_ms,
            zone: None,
        };

        self.stats.total_shots += 1;
        if made {
            self.stats.made_shots += 1;
            self.stats.current_streak += 1;
            if self.stats.current_streak > self.stats.best_streak {
                self.stats.best_streak = self.stats.current_streak;
            }
        } else {
            self.stats.current_streak = 0;
        }
        self.stats.shot_percentage =
            100.0 * self.stats.made_shots as f64 / self.stats.total_shots as f64;

        self.graph.push(GraphPoint {
            elapsed_minutes: timestamp_ms / 60_000.0,
            shot_percentage: self.stats.shot_percentage,
            total_shots: self.stats.total_shots,
        });

        self.zone_deadline = Some(timestamp_ms + self.zone_window_ms);
        self.records.push(record);

        info!(
            "Shot #{}: {} | {}/{} ({:.1}%) | streak {} (best {})",
            self.stats.total_shots,
            if made { "MADE" } else { "MISSED" },
            self.stats.made_shots,
            self.stats.total_shots,
            self.stats.shot_percentage,
            self.stats.current_streak,
            self.stats.best_streak
        );

        self.records.last().unwrap()
    }

    /// Attach a zone to the most recent record. Succeeds only while its
    /// window is open; afterwards the record is frozen and this is a no-op.
    pub fn assign_zone(&mut self, zone: CourtZone, now_ms: f64) -> bool {
        match self.zone_deadline {
            Some(deadline) if now_ms <= deadline => {
                let record = self.records.last_mut().expect("deadline without record");
                record.zone = Some(zone);
                let sequence = record.sequence;
                self.zone_deadline = None;
                self.refresh_graph_point(now_ms);
                debug!("Zone {} assigned to shot #{}", zone.as_str(), sequence);
                true
            }
            _ => {
                warn!("Zone assignment rejected: window closed");
                false
            }
        }
    }

    /// Expire the zone window if its deadline has passed.
    pub fn tick(&mut self, now_ms: f64) {
        if let Some(deadline) = self.zone_deadline {
            if now_ms > deadline {
                self.freeze_pending_zone();
                self.refresh_graph_point(now_ms);
            }
        }
    }

    /// End-of-session close: any still-open zone window freezes to unknown.
    pub fn close(&mut self) {
        self.freeze_pending_zone();
    }

    fn freeze_pending_zone(&mut self) {
        if self.zone_deadline.take().is_some() {
            if let Some(record) = self.records.last_mut() {
                if record.zone.is_none() {
                    record.zone = Some(CourtZone::Unknown);
                    debug!("Shot #{} zone frozen as unknown", record.sequence);
                }
            }
        }
    }

    /// Refresh the most recent graph point's time when stats are recomputed
    /// without a new shot. Points are only appended when the total grows.
    pub fn refresh_graph_point(&mut self, now_ms: f64) {
        if let Some(point) = self.graph.last_mut() {
            let minutes = now_ms / 60_000.0;
            if minutes > point.elapsed_minutes {
                point.elapsed_minutes = minutes;
            }
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn records(&self) -> &[ShotRecord] {
        &self.records
    }

    pub fn graph_points(&self) -> &[GraphPoint] {
        &self.graph
    }

    /// Per-zone aggregates across the whole ledger, one entry per court zone
    /// plus the unknown bucket. Pending records count as unknown.
    pub fn zone_stats(&self) -> Vec<ZoneStats> {
        let mut zones: Vec<CourtZone> = CourtZone::COURT.to_vec();
        zones.push(CourtZone::Unknown);

        zones
            .into_iter()
            .map(|zone| {
                let mut attempts = 0;
                let mut makes = 0;
                for record in &self.records {
                    let record_zone = record.zone.unwrap_or(CourtZone::Unknown);
                    if record_zone == zone {
                        attempts += 1;
                        if record.outcome.is_made() {
                            makes += 1;
                        }
                    }
                }
                let percentage = if attempts > 0 {
                    100.0 * makes as f64 / attempts as f64
                } else {
                    0.0
                };
                ZoneStats {
                    zone,
                    attempts,
                    makes,
                    percentage,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_stats() {
        let ledger = ShotLedger::new(5.0);
        let stats = ledger.stats();
        assert_eq!(stats.total_shots, 0);
        assert_eq!(stats.shot_percentage, 0.0);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn test_sequence_numbers_are_monotonic() {
        let mut ledger = ShotLedger::new(5.0);
        for i in 0..5 {
            ledger.record_shot(i % 2 == 0, i as f64 * 1000.0);
        }
        let sequences: Vec<u32> = ledger.records().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_streak_tracking() {
        let mut ledger = ShotLedger::new(5.0);
        let outcomes = [true, true, true, false, true, true];
        for (i, &made) in outcomes.iter().enumerate() {
            ledger.record_shot(made, i as f64 * 1000.0);
        }

        let stats = ledger.stats();
        assert_eq!(stats.current_streak, 2); // trailing makes after the miss
        assert_eq!(stats.best_streak, 3);
        assert_eq!(stats.made_shots, 5);
        assert_eq!(stats.total_shots, 6);
    }

    #[test]
    fn test_percentage_invariant() {
        let mut ledger = ShotLedger::new(5.0);
        let outcomes = [true, false, false, true, true, false, true];
        for (i, &made) in outcomes.iter().enumerate() {
            ledger.record_shot(made, i as f64 * 500.0);
            let stats = ledger.stats();
            let expected = 100.0 * stats.made_shots as f64 / stats.total_shots as f64;
            assert!((stats.shot_percentage - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zone_assignment_within_window() {
        let mut ledger = ShotLedger::new(5.0);
        ledger.record_shot(true, 0.0);
        assert!(ledger.assign_zone(CourtZone::TopOfKey, 3000.0));
        assert_eq!(ledger.records()[0].zone, Some(CourtZone::TopOfKey));

        // Frozen after the first assignment
        assert!(!ledger.assign_zone(CourtZone::Paint, 3500.0));
        assert_eq!(ledger.records()[0].zone, Some(CourtZone::TopOfKey));
    }

    #[test]
    fn test_zone_timeout_freezes_unknown() {
        let mut ledger = ShotLedger::new(5.0);
        ledger.record_shot(true, 0.0);

        ledger.tick(4999.0);
        assert_eq!(ledger.records()[0].zone, None);

        ledger.tick(5100.0);
        assert_eq!(ledger.records()[0].zone, Some(CourtZone::Unknown));

        // Late assignment is a rejected no-op
        assert!(!ledger.assign_zone(CourtZone::Paint, 5200.0));
        assert_eq!(ledger.records()[0].zone, Some(CourtZone::Unknown));
    }

    #[test]
    fn test_new_shot_freezes_previous_pending_zone() {
        let mut ledger = ShotLedger::new(5.0);
        ledger.record_shot(true, 0.0);
        ledger.record_shot(false, 1000.0);

        assert_eq!(ledger.records()[0].zone, Some(CourtZone::Unknown));
        assert_eq!(ledger.records()[1].zone, None);

        // The window now belongs to the second record
        assert!(ledger.assign_zone(CourtZone::LeftWing, 2000.0));
        assert_eq!(ledger.records()[1].zone, Some(CourtZone::LeftWing));
    }

    #[test]
    fn test_graph_points_append_and_refresh() {
        let mut ledger = ShotLedger::new(5.0);
        ledger.record_shot(true, 60_000.0);
        ledger.record_shot(false, 120_000.0);
        assert_eq!(ledger.graph_points().len(), 2);

        // Recompute without a new shot refreshes the last point in place
        ledger.refresh_graph_point(180_000.0);
        assert_eq!(ledger.graph_points().len(), 2);
        let last = ledger.graph_points().last().unwrap();
        assert!((last.elapsed_minutes - 3.0).abs() < 1e-9);
        assert_eq!(last.total_shots, 2);

        // Monotonic in both elapsed time and totals
        let points = ledger.graph_points();
        for pair in points.windows(2) {
            assert!(pair[1].elapsed_minutes >= pair[0].elapsed_minutes);
            assert!(pair[1].total_shots >= pair[0].total_shots);
        }
    }

    #[test]
    fn test_zone_stats_buckets() {
        let mut ledger = ShotLedger::new(5.0);
        ledger.record_shot(true, 0.0);
        ledger.assign_zone(CourtZone::Paint, 100.0);
        ledger.record_shot(false, 1000.0);
        ledger.assign_zone(CourtZone::Paint, 1100.0);
        ledger.record_shot(true, 2000.0);
        ledger.tick(8000.0); // freezes as unknown

        let zone_stats = ledger.zone_stats();
        let paint = zone_stats
            .iter()
            .find(|z| z.zone == CourtZone::Paint)
            .unwrap();
        assert_eq!(paint.attempts, 2);
        assert_eq!(paint.makes, 1);
        assert!((paint.percentage - 50.0).abs() < 1e-9);

        let unknown = zone_stats
            .iter()
            .find(|z| z.zone == CourtZone::Unknown)
            .unwrap();
        assert_eq!(unknown.attempts, 1);
        assert_eq!(unknown.makes, 1);
    }
}
