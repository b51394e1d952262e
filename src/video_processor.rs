// src/video_processor.rs

use crate::analysis::ledger::SessionStats;
use crate::types::{Detection, DetectionClass, DisplaySnapshot, Frame};
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst, VideoWriter},
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

const CAMERA_FALLBACK_FPS: f64 = 30.0;

/// Sequential frame source: a capture device index or a video file.
pub struct VideoSource {
    cap: VideoCapture,
    pub fps: f64,
    pub width: i32,
    pub height: i32,
    current_frame: i64,
    /// Wall clock for live capture; files are timestamped by frame index
    started: Instant,
    is_live: bool,
}

impl VideoSource {
    pub fn open(source: &str) -> Result<Self> {
        let (cap, is_live) = match source.parse::<i32>() {
            Ok(index) => {
                info!("Opening capture device {}", index);
                (VideoCapture::new(index, videoio::CAP_ANY)?, true)
            }
            Err(_) => {
                info!("Opening video file: {}", source);
                (VideoCapture::from_file(source, videoio::CAP_ANY)?, false)
            }
        };

        if !cap.is_opened()? {
            anyhow::bail!("Failed to open video source '{source}'");
        }

        let mut fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        if !(fps.is_finite() && fps > 0.0) {
            fps = CAMERA_FALLBACK_FPS;
        }
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        info!("Video properties: {}x{} @ {:.1} FPS", width, height, fps);

        Ok(Self {
            cap,
            fps,
            width,
            height,
            current_frame: 0,
            started: Instant::now(),
            is_live,
        })
    }

    /// Open with linear backoff. A flaky camera often needs a second try;
    /// after the configured attempts the session is fatal.
    pub fn open_with_retry(source: &str, retries: u32, delay_ms: u64) -> Result<Self> {
        let attempts = retries.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match Self::open(source) {
                Ok(src) => return Ok(src),
                Err(e) => {
                    warn!("Open attempt {}/{} failed: {}", attempt, attempts, e);
                    last_err = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(std::time::Duration::from_millis(
                            delay_ms * attempt as u64,
                        ));
                    }
                }
            }
        }

        Err(last_err.expect("at least one open attempt"))
    }

    /// Next frame as RGB, or None at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();
        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }

        self.current_frame += 1;
        let timestamp_ms = if self.is_live {
            self.started.elapsed().as_secs_f64() * 1000.0
        } else {
            (self.current_frame as f64 / self.fps) * 1000.0
        };

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: self.width as usize,
            height: self.height as usize,
            timestamp_ms,
        }))
    }
}

pub fn create_writer(
    output_dir: &str,
    width: i32,
    height: i32,
    fps: f64,
) -> Result<VideoWriter> {
    std::fs::create_dir_all(output_dir)?;
    let output_path = PathBuf::from(output_dir).join("session_annotated.mp4");
    info!("Output video: {}", output_path.display());

    let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
    let writer = VideoWriter::new(
        output_path.to_str().unwrap(),
        fourcc,
        fps,
        core::Size::new(width, height),
        true,
    )?;
    Ok(writer)
}

fn class_color(class: DetectionClass) -> core::Scalar {
    match class {
        DetectionClass::Ball => core::Scalar::new(0.0, 255.0, 0.0, 0.0),
        DetectionClass::Rim => core::Scalar::new(0.0, 0.0, 255.0, 0.0),
        DetectionClass::MadeShot => core::Scalar::new(205.0, 250.0, 255.0, 0.0),
        _ => core::Scalar::new(255.0, 0.0, 0.0, 0.0),
    }
}

/// Render one annotated frame: detection boxes, channel status line, the
/// smoothed ball marker, and the running stats.
pub fn draw_status_overlay(
    frame: &Frame,
    detections: &[Detection],
    snapshot: &DisplaySnapshot,
    stats: &SessionStats,
) -> Result<Mat> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;

    let mut output = Mat::default();
    imgproc::cvt_color(&mat, &mut output, imgproc::COLOR_RGB2BGR, 0)?;

    // Detection boxes (person and shot-attempt markers stay invisible)
    for det in detections {
        let class = match DetectionClass::from_id(det.class_id) {
            Some(c @ (DetectionClass::Ball | DetectionClass::Rim | DetectionClass::MadeShot)) => c,
            _ => continue,
        };
        let color = class_color(class);
        let rect = core::Rect::new(
            det.bbox[0] as i32,
            det.bbox[1] as i32,
            (det.bbox[2] - det.bbox[0]) as i32,
            (det.bbox[3] - det.bbox[1]) as i32,
        );
        imgproc::rectangle(&mut output, rect, color, 2, imgproc::LINE_8, 0)?;
        imgproc::put_text(
            &mut output,
            &class.as_str().to_uppercase(),
            core::Point::new(det.bbox[0] as i32, det.bbox[1] as i32 - 10),
            imgproc::FONT_HERSHEY_DUPLEX,
            0.5,
            core::Scalar::new(255.0, 255.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            false,
        )?;
    }

    // Smoothed ball estimate with its velocity vector
    let (bx, by) = snapshot.ball_position;
    if snapshot.ball_stable && bx > 0.0 && by > 0.0 {
        imgproc::circle(
            &mut output,
            core::Point::new(bx as i32, by as i32),
            6,
            core::Scalar::new(255.0, 255.0, 255.0, 0.0),
            2,
            imgproc::LINE_AA,
            0,
        )?;

        let (vx, vy) = snapshot.ball_velocity;
        if vx.abs() > 1.0 || vy.abs() > 1.0 {
            imgproc::line(
                &mut output,
                core::Point::new(bx as i32, by as i32),
                core::Point::new((bx + vx * 5.0) as i32, (by + vy * 5.0) as i32),
                core::Scalar::new(255.0, 255.0, 255.0, 0.0),
                1,
                imgproc::LINE_AA,
                0,
            )?;
        }
    }

    // Info overlay background
    imgproc::rectangle(
        &mut output,
        core::Rect::new(5, 5, 560, 70),
        core::Scalar::new(40.0, 40.0, 40.0, 0.0),
        -1,
        imgproc::LINE_8,
        0,
    )?;

    let ball_text = if snapshot.ball_stable {
        "BALL DETECTED"
    } else {
        "BALL NOT DETECTED"
    };
    let rim_text = if snapshot.rim_stable || snapshot.shot_made_stable {
        "RIM DETECTED"
    } else {
        "RIM NOT DETECTED"
    };
    let status_color = if snapshot.shot_made_stable {
        core::Scalar::new(0.0, 255.0, 255.0, 0.0)
    } else if snapshot.ball_stable {
        core::Scalar::new(0.0, 255.0, 0.0, 0.0)
    } else {
        core::Scalar::new(0.0, 165.0, 255.0, 0.0)
    };

    imgproc::put_text(
        &mut output,
        &format!("{} | {}", ball_text, rim_text),
        core::Point::new(15, 32),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.6,
        status_color,
        2,
        imgproc::LINE_8,
        false,
    )?;

    let stats_text = format!(
        "Shots: {}/{} ({:.1}%) | Streak: {} (best {})",
        stats.made_shots,
        stats.total_shots,
        stats.shot_percentage,
        stats.current_streak,
        stats.best_streak
    );
    imgproc::put_text(
        &mut output,
        &stats_text,
        core::Point::new(15, 60),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        core::Scalar::new(200.0, 200.0, 200.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;

    Ok(output)
}
