//! Frame source → code detector loop.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use nageyell_camera::FrameSource;
use nageyell_events::EventSink;
use nageyell_types::{
    events::{EventPayload, SessionEvent},
    frame::{DecodedCode, Facing},
    session::ScanPhase,
    status::Status,
    NageError,
};
use nageyell_vision::CodeDetector;
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{state::SessionHandle, status::StatusBoard};

struct ScanTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the camera. At most one stream is open, and at most one tick task runs.
pub struct ScanController<C, D> {
    ctx: TickContext<C, D>,
    task: AsyncMutex<Option<ScanTask>>,
}

/// Everything the tick task needs, shared with the controller.
struct TickContext<C, D> {
    camera: Arc<AsyncMutex<C>>,
    detector: Arc<D>,
    state: SessionHandle,
    scan_status: StatusBoard,
    events: Arc<dyn EventSink>,
    phase: Arc<Mutex<ScanPhase>>,
    detections: mpsc::UnboundedSender<DecodedCode>,
    interval: Duration,
}

impl<C, D> Clone for TickContext<C, D> {
    fn clone(&self) -> Self {
        Self {
            camera: self.camera.clone(),
            detector: self.detector.clone(),
            state: self.state.clone(),
            scan_status: self.scan_status.clone(),
            events: self.events.clone(),
            phase: self.phase.clone(),
            detections: self.detections.clone(),
            interval: self.interval,
        }
    }
}

enum Tick {
    Continue,
    Finished,
}

impl<C, D> ScanController<C, D>
where
    C: FrameSource + 'static,
    D: CodeDetector + 'static,
{
    /// `status_clear_after` is how long a scan outcome stays in `scan_status`.
    pub fn new(
        camera: C,
        detector: D,
        state: SessionHandle,
        events: Arc<dyn EventSink>,
        interval: Duration,
        status_clear_after: Duration,
        detections: mpsc::UnboundedSender<DecodedCode>,
    ) -> Self {
        Self {
            ctx: TickContext {
                camera: Arc::new(AsyncMutex::new(camera)),
                detector: Arc::new(detector),
                scan_status: StatusBoard::for_scan(
                    state.clone(),
                    events.clone(),
                    status_clear_after,
                ),
                state,
                events,
                phase: Arc::new(Mutex::new(ScanPhase::Idle)),
                detections,
                interval,
            },
            task: AsyncMutex::new(None),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.ctx.phase()
    }

    /// Opens a stream for `facing` and starts ticking. Any running stream is shut down
    /// first. Returns `false` when the camera could not be opened; the reason is left
    /// in `scan_status`.
    pub async fn start(&self, facing: Facing) -> bool {
        let mut slot = self.task.lock().await;
        self.halt(&mut slot).await;

        let opened = self.ctx.camera.lock().await.open(facing).await;
        if let Err(err) = opened {
            let detail = match err {
                NageError::DeviceUnavailable(detail) => detail,
                other => other.to_string(),
            };
            warn!("Camera open failed ({}): {detail}", facing.as_str());
            self.ctx.state.update(|s| {
                s.facing = facing;
                s.scanning = false;
            });
            self.ctx
                .scan_status
                .publish(Status::CameraUnavailable(detail));
            self.ctx.set_phase(ScanPhase::Idle, facing);
            return false;
        }

        self.ctx.state.update(|s| {
            s.facing = facing;
            s.scanning = true;
            s.scan_status = None;
        });
        self.ctx.set_phase(ScanPhase::Streaming, facing);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.ctx.clone().run(facing, cancel.clone()));
        *slot = Some(ScanTask { cancel, handle });
        info!("Scanning started ({})", facing.as_str());
        true
    }

    /// Stops ticking and releases the camera. Safe to call in any phase.
    pub async fn stop(&self) {
        let mut slot = self.task.lock().await;
        self.halt(&mut slot).await;
        let facing = self.ctx.state.update(|s| {
            s.scanning = false;
            s.facing
        });
        if self.ctx.phase() != ScanPhase::Idle {
            self.ctx.set_phase(ScanPhase::Idle, facing);
        }
    }

    /// Flips the camera and scans again with the other facing.
    pub async fn toggle_facing(&self) -> bool {
        let facing = self.ctx.state.snapshot().facing.toggled();
        info!("Switching camera to {}", facing.as_str());
        self.start(facing).await
    }

    async fn halt(&self, slot: &mut Option<ScanTask>) {
        if let Some(task) = slot.take() {
            task.cancel.cancel();
            if let Err(err) = task.handle.await {
                warn!("Scan task ended abnormally: {err}");
            }
        }
        if let Err(err) = self.ctx.camera.lock().await.close().await {
            warn!("Camera close failed: {err}");
        }
    }
}

impl<C, D> TickContext<C, D>
where
    C: FrameSource + 'static,
    D: CodeDetector + 'static,
{
    async fn run(self, facing: Facing, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Scan task cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if let Tick::Finished = self.tick(facing, &cancel).await {
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self, facing: Facing, cancel: &CancellationToken) -> Tick {
        let pulled = self.camera.lock().await.frame().await;
        let frame = match pulled {
            Ok(Some(frame)) => frame,
            Ok(None) => return Tick::Continue,
            Err(err) => {
                warn!("Camera stream stopped while scanning: {err}");
                self.state.update(|s| s.scanning = false);
                self.scan_status.publish(Status::CameraStopped);
                self.set_phase(ScanPhase::Idle, facing);
                return Tick::Finished;
            }
        };

        if cancel.is_cancelled() {
            return Tick::Finished;
        }
        match self.detector.detect(&frame) {
            Some(code) => {
                self.on_detected(code, facing).await;
                Tick::Finished
            }
            None => Tick::Continue,
        }
    }

    async fn on_detected(&self, code: DecodedCode, facing: Facing) {
        self.set_phase(ScanPhase::Detected, facing);
        if let Err(err) = self.camera.lock().await.close().await {
            warn!("Camera close after detection failed: {err}");
        }

        let length = code.payload().len();
        self.state.update(|s| {
            s.credential = Some(code.payload().to_string());
            s.scanning = false;
        });
        self.scan_status.publish(Status::CodeDetected);
        info!("QR code detected ({length} bytes)");
        self.events
            .publish(SessionEvent::new(EventPayload::CredentialAcquired { length }));
        if self.detections.send(code).is_err() {
            debug!("No listener for detections");
        }
        self.set_phase(ScanPhase::Idle, facing);
    }

    fn phase(&self) -> ScanPhase {
        self.phase.lock().map(|p| *p).unwrap_or_default()
    }

    fn set_phase(&self, phase: ScanPhase, facing: Facing) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
        self.events.publish(SessionEvent::scan(phase, facing));
    }
}
