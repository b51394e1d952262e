// src/audio.rs
//
// Crowd-noise playback. Clips live under <dir>/<category>/*.mp3; a confirmed
// make plays one clip picked at random from the active category. Rodio's
// output stream is not Send, so it lives on a dedicated thread behind a
// command channel.

use anyhow::Result;
use rand::seq::SliceRandom;
use rodio::{Decoder, OutputStream, Sink};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const CLIP_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

pub struct CrowdNoise {
    clips: HashMap<String, Vec<PathBuf>>,
    category: String,
    tx: Sender<PathBuf>,
}

impl CrowdNoise {
    pub fn new(dir: &str, category: &str) -> Result<Self> {
        let clips = scan_clips(Path::new(dir));

        let total: usize = clips.values().map(|v| v.len()).sum();
        info!(
            "Loaded {} crowd clip(s) across {} categories",
            total,
            clips.len()
        );
        if !clips.contains_key(category) {
            warn!("Crowd category '{}' has no clips", category);
        }

        let (tx, rx) = mpsc::channel::<PathBuf>();

        // Dedicated thread holding the non-Send audio objects; the output
        // stream is created lazily on the first clip
        thread::Builder::new()
            .name("crowd-noise".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, Sink)> = None;

                while let Ok(path) = rx.recv() {
                    if output.is_none() {
                        match OutputStream::try_default() {
                            Ok((stream, handle)) => match Sink::try_new(&handle) {
                                Ok(sink) => output = Some((stream, sink)),
                                Err(e) => {
                                    warn!("Audio sink unavailable: {e}");
                                    continue;
                                }
                            },
                            Err(e) => {
                                warn!("Audio output unavailable: {e}");
                                continue;
                            }
                        }
                    }

                    let sink = &output.as_ref().unwrap().1;
                    match File::open(&path).map(BufReader::new).map(Decoder::new) {
                        Ok(Ok(decoder)) => {
                            debug!("Playing {}", path.display());
                            sink.append(decoder);
                        }
                        Ok(Err(e)) => warn!("Failed to decode {}: {e}", path.display()),
                        Err(e) => warn!("Failed to open {}: {e}", path.display()),
                    }
                }
            })?;

        Ok(Self {
            clips,
            category: category.to_string(),
            tx,
        })
    }

    /// Switch the active category. Unknown categories are rejected.
    pub fn set_category(&mut self, category: &str) -> bool {
        if self.clips.contains_key(category) {
            info!("Crowd category set to '{}'", category);
            self.category = category.to_string();
            true
        } else {
            warn!("Unknown crowd category '{}'", category);
            false
        }
    }

    pub fn categories(&self) -> Vec<&str> {
        self.clips.keys().map(|k| k.as_str()).collect()
    }

    /// Queue a random clip from the active category.
    pub fn play_random(&self) {
        let Some(clips) = self.clips.get(&self.category) else {
            return;
        };
        if let Some(clip) = clips.choose(&mut rand::thread_rng()) {
            let _ = self.tx.send(clip.clone());
        }
    }
}

fn scan_clips(dir: &Path) -> HashMap<String, Vec<PathBuf>> {
    let mut clips: HashMap<String, Vec<PathBuf>> = HashMap::new();

    for entry in WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_clip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| CLIP_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_clip {
            continue;
        }

        if let Some(category) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
        {
            clips
                .entry(category.to_string())
                .or_default()
                .push(path.to_path_buf());
        }
    }

    clips
}
