use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use nageyell_types::{
    frame::{Facing, Frame},
    NageError, Result,
};
use tracing::{info, warn};

use crate::{camera_error, CameraMetrics, CameraOp, FrameSource};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Replays still images from `<root>/<facing>/` in a loop, one per pull.
pub struct StillImageCamera {
    root: PathBuf,
    frames: Vec<Frame>,
    cursor: usize,
    active: Option<Facing>,
    metrics: Arc<Mutex<CameraMetrics>>,
}

impl StillImageCamera {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            frames: Vec::new(),
            cursor: 0,
            active: None,
            metrics: Arc::new(Mutex::new(CameraMetrics::default())),
        }
    }

    async fn load_frames(dir: &Path) -> Result<Vec<Frame>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|err| camera_error(format!("{}: {err}", dir.display())))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| camera_error(format!("{}: {err}", dir.display())))?
        {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("Skipping unreadable frame {:?}: {err}", path);
                    continue;
                }
            };
            match image::load_from_memory(&raw) {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    frames.push(Frame::from_rgba(width, height, rgba.into_raw()));
                }
                Err(err) => warn!("Skipping undecodable frame {:?}: {err}", path),
            }
        }
        Ok(frames)
    }

    fn with_metrics(&self, f: impl FnOnce(&mut CameraMetrics)) {
        if let Ok(mut guard) = self.metrics.lock() {
            f(&mut guard);
        }
    }
}

#[async_trait]
impl FrameSource for StillImageCamera {
    async fn open(&mut self, facing: Facing) -> Result<()> {
        let dir = self.root.join(facing.as_str());
        let frames = Self::load_frames(&dir).await?;
        if frames.is_empty() {
            return Err(camera_error(format!(
                "no frames available for facing mode '{}' in {}",
                facing.as_str(),
                dir.display()
            )));
        }
        info!(
            "Still image camera opened ({}): {} frame(s)",
            facing.as_str(),
            frames.len()
        );
        self.frames = frames;
        self.cursor = 0;
        self.active = Some(facing);
        self.with_metrics(|m| {
            m.ops.push(CameraOp::Open(facing));
            m.open_streams += 1;
            m.max_open_streams = m.max_open_streams.max(m.open_streams);
        });
        Ok(())
    }

    async fn frame(&mut self) -> Result<Option<Frame>> {
        if self.active.is_none() || self.frames.is_empty() {
            return Err(NageError::TrackEnded);
        }
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        self.with_metrics(|m| m.frames_pulled += 1);
        Ok(Some(frame))
    }

    async fn close(&mut self) -> Result<()> {
        if self.active.take().is_some() {
            self.frames.clear();
            self.with_metrics(|m| {
                m.ops.push(CameraOp::Close);
                m.open_streams = m.open_streams.saturating_sub(1);
            });
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.active.is_some()
    }

    fn metrics(&self) -> CameraMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}
