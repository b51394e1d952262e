// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub filter: FilterConfig,
    pub video: VideoConfig,
    pub queue: QueueConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub input_size: usize,
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub ball_persistence_frames: u32,
    pub rim_persistence_frames: u32,
    pub shot_made_persistence_frames: u32,
    pub zone_window_seconds: f64,
    pub attempt_history_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub dt: f64,
    pub process_noise_std: f64,
    pub measurement_noise_std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Camera index ("0") or a video file path.
    pub source: String,
    pub output_dir: String,
    pub save_annotated: bool,
    pub open_retries: u32,
    pub open_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub capacity: usize,
    pub poll_hz: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub enabled: bool,
    pub dir: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

/// Model classes, in the order the detector was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionClass {
    Ball,
    MadeShot,
    Person,
    Rim,
    ShotAttempt,
}

impl DetectionClass {
    pub fn from_id(class_id: usize) -> Option<Self> {
        match class_id {
            0 => Some(Self::Ball),
            1 => Some(Self::MadeShot),
            2 => Some(Self::Person),
            3 => Some(Self::Rim),
            4 => Some(Self::ShotAttempt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ball => "ball",
            Self::MadeShot => "made_shot",
            Self::Person => "person",
            Self::Rim => "rim",
            Self::ShotAttempt => "shot",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // [x1, y1, x2, y2] in original image coordinates
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        (
            (self.bbox[0] + self.bbox[2]) / 2.0,
            (self.bbox[1] + self.bbox[3]) / 2.0,
        )
    }
}

/// Per-frame boolean signals extracted from the raw detections.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSignals {
    pub ball_seen: bool,
    pub rim_seen: bool,
    pub shot_signal_seen: bool,
    pub ball_center: Option<(f32, f32)>,
    pub rim_bbox: Option<[f32; 4]>,
}

/// Immutable snapshot pushed from the capture worker to the session loop.
/// The worker never touches session state directly.
#[derive(Debug, Clone)]
pub struct FrameObservation {
    pub frame_id: u64,
    pub timestamp_ms: f64,
    pub signals: FrameSignals,
    pub detections: Vec<Detection>,
    pub frame: Frame,
}

/// Debounced state published to the display after each processed frame.
#[derive(Debug, Clone, Copy)]
pub struct DisplaySnapshot {
    pub ball_stable: bool,
    pub rim_stable: bool,
    pub shot_made_stable: bool,
    pub ball_position: (f32, f32),
    pub ball_velocity: (f32, f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotOutcome {
    Made,
    Missed,
}

impl ShotOutcome {
    pub fn is_made(&self) -> bool {
        matches!(self, Self::Made)
    }
}

/// Eight fixed court regions plus the terminal "unknown" bucket for shots
/// whose zone was never assigned in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtZone {
    LeftCorner,
    LeftWing,
    LeftElbow,
    TopOfKey,
    RightElbow,
    RightWing,
    RightCorner,
    Paint,
    Unknown,
}

impl CourtZone {
    pub const COURT: [CourtZone; 8] = [
        Self::LeftCorner,
        Self::LeftWing,
        Self::LeftElbow,
        Self::TopOfKey,
        Self::RightElbow,
        Self::RightWing,
        Self::RightCorner,
        Self::Paint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftCorner => "left_corner",
            Self::LeftWing => "left_wing",
            Self::LeftElbow => "left_elbow",
            Self::TopOfKey => "top_of_key",
            Self::RightElbow => "right_elbow",
            Self::RightWing => "right_wing",
            Self::RightCorner => "right_corner",
            Self::Paint => "paint",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left_corner" => Some(Self::LeftCorner),
            "left_wing" => Some(Self::LeftWing),
            "left_elbow" => Some(Self::LeftElbow),
            "top_of_key" => Some(Self::TopOfKey),
            "right_elbow" => Some(Self::RightElbow),
            "right_wing" => Some(Self::RightWing),
            "right_corner" => Some(Self::RightCorner),
            "paint" => Some(Self::Paint),
            _ => None,
        }
    }
}
