// src/pipeline/worker.rs
//
// Background capture worker: read -> detect -> adapt -> send. The worker
// owns the video source and the detector; everything it ships downstream is
// an immutable FrameObservation. All session state (filter, counters,
// ledger) lives on the consumer side only.

use crate::detection::extract_signals;
use crate::inference::ShotDetector;
use crate::types::{Config, FrameObservation};
use crate::video_processor::VideoSource;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureStats {
    pub frames_read: u64,
    pub frames_dropped: u64,
    pub detection_failures: u64,
}

/// Spawn the capture loop on the blocking pool. The loop exits on end of
/// stream, a closed channel, or cancellation; its stats come back through
/// the join handle.
pub fn spawn_capture_worker(
    config: Config,
    tx: Sender<FrameObservation>,
    cancel: CancellationToken,
) -> JoinHandle<CaptureStats> {
    tokio::task::spawn_blocking(move || capture_loop(&config, tx, cancel))
}

fn capture_loop(
    config: &Config,
    tx: Sender<FrameObservation>,
    cancel: CancellationToken,
) -> CaptureStats {
    let mut stats = CaptureStats::default();

    let mut detector = match ShotDetector::new(&config.model) {
        Ok(detector) => detector,
        Err(e) => {
            error!("Detector failed to load: {e:#}");
            return stats;
        }
    };

    let mut source = match VideoSource::open_with_retry(
        &config.video.source,
        config.video.open_retries,
        config.video.open_retry_delay_ms,
    ) {
        Ok(source) => source,
        Err(e) => {
            error!("Video source failed to open: {e:#}");
            return stats;
        }
    };

    info!("✓ Capture worker running");

    loop {
        if cancel.is_cancelled() {
            info!("Capture worker cancelled");
            break;
        }

        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("End of stream after {} frames", stats.frames_read);
                break;
            }
            Err(e) => {
                error!("Frame read failed: {e:#}");
                break;
            }
        };
        stats.frames_read += 1;

        // Zero detections is a normal frame, not an error
        let detections = match detector.detect(&frame.data, frame.width, frame.height) {
            Ok(detections) => detections,
            Err(e) => {
                stats.detection_failures += 1;
                debug!("Detection failed on frame {}: {e}", stats.frames_read);
                Vec::new()
            }
        };

        let observation = FrameObservation {
            frame_id: stats.frames_read,
            timestamp_ms: frame.timestamp_ms,
            signals: extract_signals(&detections),
            detections,
            frame,
        };

        match tx.try_send(observation) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Drop-newest backpressure policy: the consumer is behind,
                // shed this frame rather than grow an unbounded backlog
                stats.frames_dropped += 1;
                warn!(
                    "Frame queue full, dropping frame {} ({} dropped so far)",
                    stats.frames_read, stats.frames_dropped
                );
            }
            Err(TrySendError::Closed(_)) => {
                info!("Frame queue closed, stopping capture");
                break;
            }
        }
    }

    stats
}
