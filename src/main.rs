// src/main.rs

mod analysis;
mod audio;
mod config;
mod detection;
mod inference;
mod pipeline;
mod types;
mod video_processor;

use analysis::ledger::ShotRecord;
use anyhow::Result;
use audio::CrowdNoise;
use pipeline::{spawn_capture_worker, SessionSummary, ShotSession};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use types::{Config, CourtZone};

/// Operator input, read line-by-line from stdin.
#[derive(Debug, Clone, PartialEq)]
enum ControlCommand {
    ManualShot { made: bool },
    AssignZone(CourtZone),
    SetCategory(String),
    EndSession,
}

fn parse_command(line: &str) -> Option<ControlCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "m" => Some(ControlCommand::ManualShot { made: true }),
        "x" => Some(ControlCommand::ManualShot { made: false }),
        "z" => CourtZone::parse(parts.next()?).map(ControlCommand::AssignZone),
        "c" => parts
            .next()
            .map(|category| ControlCommand::SetCategory(category.to_string())),
        "q" => Some(ControlCommand::EndSession),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!("shot_detection={},ort=warn", config.logging.level))
        .init();

    info!("🏀 Shot Tracking Session Starting");
    info!(
        "Persistence thresholds: ball={}, rim={}, shot={}",
        config.detection.ball_persistence_frames,
        config.detection.rim_persistence_frames,
        config.detection.shot_made_persistence_frames
    );

    let mut crowd = if config.audio.enabled {
        match CrowdNoise::new(&config.audio.dir, &config.audio.category) {
            Ok(crowd) => {
                info!("Crowd categories available: {:?}", crowd.categories());
                Some(crowd)
            }
            Err(e) => {
                warn!("Audio disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    std::fs::create_dir_all(&config.video.output_dir)?;
    let shots_path = Path::new(&config.video.output_dir).join("shots.jsonl");
    let mut shots_file = std::fs::File::create(&shots_path)?;
    info!("💾 Shot records will be written to: {}", shots_path.display());

    let (obs_tx, mut obs_rx) = mpsc::channel(config.queue.capacity);
    let (control_tx, mut control_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let worker = spawn_capture_worker(config.clone(), obs_tx, cancel.clone());
    spawn_control_reader(control_tx);

    let mut session = ShotSession::new(&config);
    let mut writer: Option<opencv::videoio::VideoWriter> = None;

    let mut interval =
        tokio::time::interval(Duration::from_secs_f64(1.0 / config.queue.poll_hz as f64));

    // Consumer loop: the only writer of filter/persistence/ledger state.
    // Drains whatever the worker queued since the last tick, FIFO.
    'session: loop {
        tokio::select! {
            _ = interval.tick() => {
                loop {
                    match obs_rx.try_recv() {
                        Ok(obs) => {
                            let update = session.process_observation(&obs);

                            if update.made_shot {
                                if let Some(ref crowd) = crowd {
                                    crowd.play_random();
                                }
                            }
                            if update.made_shot || update.missed_shot {
                                if let Some(record) = session.latest_record() {
                                    save_shot_record(record, &mut shots_file)?;
                                }
                                if let Some(point) = session.latest_graph_point() {
                                    tracing::debug!(
                                        "Graph point: {:.2} min, {:.1}% over {} shots",
                                        point.elapsed_minutes,
                                        point.shot_percentage,
                                        point.total_shots
                                    );
                                }
                            }

                            if config.video.save_annotated {
                                if writer.is_none() {
                                    writer = Some(video_processor::create_writer(
                                        &config.video.output_dir,
                                        obs.frame.width as i32,
                                        obs.frame.height as i32,
                                        config.queue.poll_hz as f64,
                                    )?);
                                }
                                let stats = session.stats();
                                match video_processor::draw_status_overlay(
                                    &obs.frame,
                                    &obs.detections,
                                    &update.snapshot,
                                    &stats,
                                ) {
                                    Ok(annotated) => {
                                        use opencv::videoio::VideoWriterTrait;
                                        if let Some(ref mut w) = writer {
                                            w.write(&annotated)?;
                                        }
                                    }
                                    Err(e) => error!("Frame annotation failed: {e}"),
                                }
                            }
                        }
                        Err(mpsc::error::TryRecvError::Empty) => break,
                        Err(mpsc::error::TryRecvError::Disconnected) => {
                            info!("Capture stream ended");
                            break 'session;
                        }
                    }
                }
            }
            Some(cmd) = control_rx.recv() => {
                let now_ms = session.clock_ms();
                match cmd {
                    ControlCommand::ManualShot { made } => {
                        session.record_manual_shot(made, now_ms);
                        if made {
                            if let Some(ref crowd) = crowd {
                                crowd.play_random();
                            }
                        }
                        if let Some(record) = session.latest_record() {
                            save_shot_record(record, &mut shots_file)?;
                        }
                    }
                    ControlCommand::AssignZone(zone) => {
                        session.assign_zone(zone, now_ms);
                    }
                    ControlCommand::SetCategory(category) => {
                        if let Some(ref mut crowd) = crowd {
                            crowd.set_category(&category);
                        }
                    }
                    ControlCommand::EndSession => {
                        info!("Session end requested");
                        break 'session;
                    }
                }
            }
        }
    }

    // Stop the worker before finalizing so no late frame can mutate the
    // ledger after the analytics have run
    cancel.cancel();
    while let Some(obs) = obs_rx.recv().await {
        session.process_observation(&obs);
    }
    let capture_stats: pipeline::CaptureStats = match worker.await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Capture worker panicked: {e}");
            Default::default()
        }
    };
    if capture_stats.detection_failures > 0 {
        warn!(
            "{} frame(s) failed detection and were treated as empty",
            capture_stats.detection_failures
        );
    }

    let summary = session.finalize();
    let summary_path = Path::new(&config.video.output_dir).join("session_summary.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    info!("💾 Session summary saved to: {}", summary_path.display());

    print_final_report(&summary, capture_stats.frames_read, capture_stats.frames_dropped);

    Ok(())
}

fn spawn_control_reader(tx: mpsc::Sender<ControlCommand>) {
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = tokio::io::BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(cmd) => {
                    if tx.send(cmd).await.is_err() {
                        break;
                    }
                }
                None => warn!("Unrecognized command: '{}'", line.trim()),
            }
        }
    });
}

fn save_shot_record(record: &ShotRecord, file: &mut std::fs::File) -> Result<()> {
    let json_line = serde_json::to_string(record)?;
    writeln!(file, "{}", json_line)?;
    file.flush()?;
    Ok(())
}

fn print_final_report(summary: &SessionSummary, frames_read: u64, frames_dropped: u64) {
    info!("\n📊 Final Report:");
    info!("  Frames captured: {}", frames_read);
    if frames_dropped > 0 {
        warn!("  ⚠️  Frames dropped (backpressure): {}", frames_dropped);
    }
    info!("  Frames processed: {}", summary.frames_processed);
    info!(
        "  Shots: {}/{} ({:.1}%)",
        summary.stats.made_shots, summary.stats.total_shots, summary.stats.shot_percentage
    );
    info!("  Best streak: {}", summary.stats.best_streak);

    match &summary.hot_period {
        Some(hot) => info!(
            "  🔥 Hot period: shots {:?} at {:.0}% ({:.1}s → {:.1}s)",
            hot.shot_numbers,
            hot.percentage,
            hot.start_timestamp_ms / 1000.0,
            hot.end_timestamp_ms / 1000.0
        ),
        None => info!("  🔥 Hot period: none"),
    }
    match &summary.cold_period {
        Some(cold) => info!(
            "  🧊 Cold period: shots {:?} at {:.0}% ({:.1}s → {:.1}s)",
            cold.shot_numbers,
            cold.percentage,
            cold.start_timestamp_ms / 1000.0,
            cold.end_timestamp_ms / 1000.0
        ),
        None => info!("  🧊 Cold period: none"),
    }

    for zone in summary.zone_stats.iter().filter(|z| z.attempts > 0) {
        info!(
            "  📍 {}: {}/{} ({:.1}%)",
            zone.zone.as_str(),
            zone.makes,
            zone.attempts,
            zone.percentage
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manual_commands() {
        assert_eq!(
            parse_command("m"),
            Some(ControlCommand::ManualShot { made: true })
        );
        assert_eq!(
            parse_command("x"),
            Some(ControlCommand::ManualShot { made: false })
        );
        assert_eq!(parse_command("q"), Some(ControlCommand::EndSession));
    }

    #[test]
    fn test_parse_zone_command() {
        assert_eq!(
            parse_command("z top_of_key"),
            Some(ControlCommand::AssignZone(CourtZone::TopOfKey))
        );
        assert_eq!(parse_command("z nowhere"), None);
        assert_eq!(parse_command("z"), None);
    }

    #[test]
    fn test_parse_category_command() {
        assert_eq!(
            parse_command("c dogs"),
            Some(ControlCommand::SetCategory("dogs".to_string()))
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("hello world"), None);
    }
}
