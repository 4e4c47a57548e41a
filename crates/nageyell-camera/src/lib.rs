//! Camera abstraction layer: streams of raster frames per facing.

mod still;

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use nageyell_types::{
    frame::{Facing, Frame},
    NageError, Result,
};
use tracing::{debug, info};

pub use still::StillImageCamera;

/// Stream lifecycle operations, in the order a source saw them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraOp {
    Open(Facing),
    Close,
    Ended,
}

/// Aggregated frame source counters.
#[derive(Debug, Default, Clone)]
pub struct CameraMetrics {
    pub ops: Vec<CameraOp>,
    pub frames_pulled: u64,
    pub open_streams: u32,
    pub max_open_streams: u32,
}

impl CameraMetrics {
    pub fn opens(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, CameraOp::Open(_)))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.ops.iter().filter(|op| **op == CameraOp::Close).count()
    }
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Opens a stream for `facing`. Fails with `DeviceUnavailable` when no device matches
    /// or access is denied.
    async fn open(&mut self, facing: Facing) -> Result<()>;
    /// Pulls the current frame. `Ok(None)` means the stream has nothing ready yet;
    /// `Err(TrackEnded)` means it stopped underneath us.
    async fn frame(&mut self) -> Result<Option<Frame>>;
    /// Releases the stream. Calling it on a closed source does nothing.
    async fn close(&mut self) -> Result<()>;
    fn is_open(&self) -> bool;
    fn metrics(&self) -> CameraMetrics;
}

/// Deterministic frame source used for integration tests and demos.
pub struct ScriptedCamera {
    scripts: HashMap<Facing, VecDeque<Frame>>,
    unavailable: HashSet<Facing>,
    end_after: Option<u64>,
    active: Option<Facing>,
    pulls_this_stream: u64,
    metrics: Arc<Mutex<CameraMetrics>>,
}

impl Default for ScriptedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            unavailable: HashSet::new(),
            end_after: None,
            active: None,
            pulls_this_stream: 0,
            metrics: Arc::new(Mutex::new(CameraMetrics::default())),
        }
    }

    /// Queues frames served, in order, by streams opened against `facing`.
    /// Once the queue drains the stream reports no frame ready.
    pub fn with_frames(mut self, facing: Facing, frames: Vec<Frame>) -> Self {
        self.scripts.entry(facing).or_default().extend(frames);
        self
    }

    pub fn unavailable(mut self, facing: Facing) -> Self {
        self.unavailable.insert(facing);
        self
    }

    /// Ends every stream after `pulls` frame requests.
    pub fn end_after(mut self, pulls: u64) -> Self {
        self.end_after = Some(pulls);
        self
    }

    /// Shared view of the counters that survives moving the camera into a controller.
    pub fn monitor(&self) -> CameraMonitor {
        CameraMonitor {
            metrics: self.metrics.clone(),
        }
    }

    fn with_metrics(&self, f: impl FnOnce(&mut CameraMetrics)) {
        if let Ok(mut guard) = self.metrics.lock() {
            f(&mut guard);
        }
    }

    fn release(&mut self, op: CameraOp) {
        if self.active.take().is_some() {
            self.with_metrics(|m| {
                m.ops.push(op);
                m.open_streams = m.open_streams.saturating_sub(1);
            });
        }
    }
}

#[derive(Clone)]
pub struct CameraMonitor {
    metrics: Arc<Mutex<CameraMetrics>>,
}

impl CameraMonitor {
    pub fn snapshot(&self) -> CameraMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FrameSource for ScriptedCamera {
    async fn open(&mut self, facing: Facing) -> Result<()> {
        if self.unavailable.contains(&facing) {
            return Err(camera_error(format!(
                "no device matches facing mode '{}'",
                facing.as_str()
            )));
        }
        info!("Opening scripted camera stream ({})", facing.as_str());
        self.active = Some(facing);
        self.pulls_this_stream = 0;
        self.with_metrics(|m| {
            m.ops.push(CameraOp::Open(facing));
            m.open_streams += 1;
            m.max_open_streams = m.max_open_streams.max(m.open_streams);
        });
        Ok(())
    }

    async fn frame(&mut self) -> Result<Option<Frame>> {
        let Some(facing) = self.active else {
            return Err(NageError::TrackEnded);
        };
        if self
            .end_after
            .is_some_and(|limit| self.pulls_this_stream >= limit)
        {
            debug!("Scripted track ended after {} pulls", self.pulls_this_stream);
            self.release(CameraOp::Ended);
            return Err(NageError::TrackEnded);
        }
        self.pulls_this_stream += 1;
        self.with_metrics(|m| m.frames_pulled += 1);
        Ok(self
            .scripts
            .get_mut(&facing)
            .and_then(|queue| queue.pop_front()))
    }

    async fn close(&mut self) -> Result<()> {
        self.release(CameraOp::Close);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.active.is_some()
    }

    fn metrics(&self) -> CameraMetrics {
        self.monitor().snapshot()
    }
}

/// Generate an error aligned with camera semantics.
pub fn camera_error(message: impl Into<String>) -> NageError {
    NageError::DeviceUnavailable(message.into())
}
