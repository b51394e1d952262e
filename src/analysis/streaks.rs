// src/analysis/streaks.rs
//
// End-of-session hot/cold period detection over the shot ledger. Two
// candidate kinds per side: the best 5-shot rolling window, and the longest
// run of consecutive identical outcomes. A 100% consecutive-make run (or 0%
// consecutive-miss run) of length >= 3 wins whenever it ties or beats the
// rolling candidate on percentage, then length.

use super::ledger::ShotRecord;
use serde::Serialize;

const ROLLING_WINDOW: usize = 5;
const MIN_WINDOW_HITS: u32 = 3;
const MIN_RUN_LEN: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct StreakPeriod {
    pub start_timestamp_ms: f64,
    pub end_timestamp_ms: f64,
    pub percentage: f64,
    pub window_len: usize,
    pub is_hot: bool,
    pub shot_numbers: Vec<u32>,
}

/// Candidate span over the ledger, kept as indices until a winner is built.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    len: usize,
    percentage: f64,
}

/// Pure function over the ledger; computed once at session end.
/// Returns (hot, cold); both absent with fewer than 3 shots.
pub fn find_streak_periods(records: &[ShotRecord]) -> (Option<StreakPeriod>, Option<StreakPeriod>) {
    if records.len() < 3 {
        return (None, None);
    }

    let window = records.len().min(ROLLING_WINDOW);

    let mut rolling_hot: Option<Span> = None;
    let mut rolling_cold: Option<Span> = None;

    for start in 0..=records.len() - window {
        let slice = &records[start..start + window];
        let makes = slice.iter().filter(|r| r.outcome.is_made()).count() as u32;
        let misses = window as u32 - makes;
        let percentage = 100.0 * makes as f64 / window as f64;

        if makes >= MIN_WINDOW_HITS
            && rolling_hot.map_or(true, |best| percentage > best.percentage)
        {
            rolling_hot = Some(Span {
                start,
                len: window,
                percentage,
            });
        }
        if misses >= MIN_WINDOW_HITS
            && rolling_cold.map_or(true, |best| percentage < best.percentage)
        {
            rolling_cold = Some(Span {
                start,
                len: window,
                percentage,
            });
        }
    }

    let make_run = longest_run(records, true);
    let miss_run = longest_run(records, false);

    let hot = select(rolling_hot, make_run, true, records);
    let cold = select(rolling_cold, miss_run, false, records);

    (hot, cold)
}

/// Longest run of consecutive identical outcomes.
fn longest_run(records: &[ShotRecord], made: bool) -> Option<Span> {
    let mut best: Option<(usize, usize)> = None; // (start, len)
    let mut current: Option<(usize, usize)> = None;

    for (i, record) in records.iter().enumerate() {
        if record.outcome.is_made() == made {
            current = match current {
                Some((start, len)) => Some((start, len + 1)),
                None => Some((i, 1)),
            };
            if current.map(|(_, len)| len) > best.map(|(_, len)| len) {
                best = current;
            }
        } else {
            current = None;
        }
    }

    best.filter(|&(_, len)| len >= MIN_RUN_LEN)
        .map(|(start, len)| Span {
            start,
            len,
            percentage: if made { 100.0 } else { 0.0 },
        })
}

/// Pick between the rolling-window candidate and the consecutive run.
/// Consecutive runs win ties; percentage is compared first, then length.
fn select(
    rolling: Option<Span>,
    run: Option<Span>,
    is_hot: bool,
    records: &[ShotRecord],
) -> Option<StreakPeriod> {
    let winner = match (rolling, run) {
        (None, None) => return None,
        (Some(r), None) => r,
        (None, Some(c)) => c,
        (Some(r), Some(c)) => {
            let run_wins = if is_hot {
                c.percentage > r.percentage
                    || (c.percentage == r.percentage && c.len >= r.len)
            } else {
                c.percentage < r.percentage
                    || (c.percentage == r.percentage && c.len >= r.len)
            };
            if run_wins {
                c
            } else {
                r
            }
        }
    };

    let slice = &records[winner.start..winner.start + winner.len];
    Some(StreakPeriod {
        start_timestamp_ms: slice.first().unwrap().timestamp_ms,
        end_timestamp_ms: slice.last().unwrap().timestamp_ms,
        percentage: winner.percentage,
        window_len: winner.len,
        is_hot,
        shot_numbers: slice.iter().map(|r| r.sequence).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShotOutcome;

    fn ledger_from(outcomes: &[bool]) -> Vec<ShotRecord> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, &made)| ShotRecord {
                sequence: i as u32 + 1,
                outcome: if made {
                    ShotOutcome::Made
                } else {
                    ShotOutcome::Missed
                },
                timestamp_ms: i as f64 * 1000.0,
                zone: None,
            })
            .collect()
    }

    #[test]
    fn test_fewer_than_three_shots_reports_nothing() {
        let records = ledger_from(&[true, false]);
        let (hot, cold) = find_streak_periods(&records);
        assert!(hot.is_none());
        assert!(cold.is_none());
    }

    #[test]
    fn test_consecutive_runs_beat_rolling_windows() {
        // M M M X M M X X X M
        let records = ledger_from(&[
            true, true, true, false, true, true, false, false, false, true,
        ]);
        let (hot, cold) = find_streak_periods(&records);

        // The best rolling window is 4/5 = 80%, but the 3-make run at 100%
        // beats it; symmetrically the 3-miss run at 0% beats the 40% window.
        let hot = hot.unwrap();
        assert_eq!(hot.shot_numbers, vec![1, 2, 3]);
        assert_eq!(hot.percentage, 100.0);
        assert_eq!(hot.window_len, 3);
        assert!(hot.is_hot);

        let cold = cold.unwrap();
        assert_eq!(cold.shot_numbers, vec![7, 8, 9]);
        assert_eq!(cold.percentage, 0.0);
        assert!(!cold.is_hot);
    }

    #[test]
    fn test_rolling_window_wins_without_qualifying_run() {
        // Alternating-ish: no run reaches length 3, windows still qualify
        // M X M M X M M X M M -> best window [6..10] has 4 makes (80%)
        let records = ledger_from(&[
            true, false, true, true, false, true, true, false, true, true,
        ]);
        let (hot, cold) = find_streak_periods(&records);

        let hot = hot.unwrap();
        assert_eq!(hot.window_len, 5);
        assert!((hot.percentage - 80.0).abs() < 1e-9);

        // The densest miss window holds 2 misses, so no cold period qualifies
        assert!(cold.is_none());
    }

    #[test]
    fn test_short_ledger_clamps_window() {
        let records = ledger_from(&[true, true, true]);
        let (hot, cold) = find_streak_periods(&records);

        let hot = hot.unwrap();
        assert_eq!(hot.shot_numbers, vec![1, 2, 3]);
        assert_eq!(hot.percentage, 100.0);
        assert!(cold.is_none());
    }

    #[test]
    fn test_all_misses_cold_session() {
        let records = ledger_from(&[false; 6]);
        let (hot, cold) = find_streak_periods(&records);

        assert!(hot.is_none());
        let cold = cold.unwrap();
        assert_eq!(cold.percentage, 0.0);
        // Longest consecutive run covers the whole session and wins the tie
        assert_eq!(cold.window_len, 6);
        assert_eq!(cold.shot_numbers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_timestamps_span_the_selected_shots() {
        let records = ledger_from(&[true, true, true, false, false, false]);
        let (hot, cold) = find_streak_periods(&records);

        let hot = hot.unwrap();
        assert_eq!(hot.start_timestamp_ms, 0.0);
        assert_eq!(hot.end_timestamp_ms, 2000.0);

        let cold = cold.unwrap();
        assert_eq!(cold.start_timestamp_ms, 3000.0);
        assert_eq!(cold.end_timestamp_ms, 5000.0);
    }
}
