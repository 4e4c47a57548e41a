//! Acquisition-and-commit pipeline: scan a credential, compose a message, write the tag.
//!
//! Every write attempt comes from a named trigger on [`Session`]. Triggers are
//! neither queued nor coalesced, so rapid edits can overlap; the status shown is
//! whichever attempt resolved last.

mod commit;
mod composer;
mod scan;
mod state;
mod status;

use std::{sync::Arc, time::Duration};

use nageyell_camera::FrameSource;
use nageyell_events::EventSink;
use nageyell_generator::MessageGenerator;
use nageyell_nfc::TagWriter;
use nageyell_types::{
    config::NageConfig,
    events::{LifecyclePhase, SessionEvent},
    frame::{DecodedCode, Facing},
    session::{ScanPhase, SessionState},
    status::CommitOutcome,
};
use nageyell_vision::CodeDetector;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

pub use commit::CommitController;
pub use composer::MessageComposer;
pub use scan::ScanController;
pub use state::SessionHandle;
pub use status::StatusBoard;

/// Timing and encoding knobs for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub facing: Facing,
    pub frame_interval: Duration,
    pub status_clear_after: Duration,
    pub tag_language: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&NageConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &NageConfig) -> Self {
        Self {
            facing: config.camera.facing,
            frame_interval: Duration::from_millis(config.camera.frame_interval_ms),
            status_clear_after: Duration::from_millis(config.session.status_clear_ms),
            tag_language: config.tag.language.clone(),
        }
    }
}

pub struct Session<C, D, W, G> {
    state: SessionHandle,
    events: Arc<dyn EventSink>,
    scanner: ScanController<C, D>,
    commit: CommitController<W>,
    composer: MessageComposer<G>,
    detections: Mutex<mpsc::UnboundedReceiver<DecodedCode>>,
}

impl<C, D, W, G> Session<C, D, W, G>
where
    C: FrameSource + 'static,
    D: CodeDetector + 'static,
    W: TagWriter,
    G: MessageGenerator,
{
    pub fn new(
        settings: SessionSettings,
        camera: C,
        detector: D,
        writer: W,
        generator: G,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let state = SessionHandle::new(SessionState::with_facing(settings.facing));
        let board = StatusBoard::new(state.clone(), events.clone(), settings.status_clear_after);
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            scanner: ScanController::new(
                camera,
                detector,
                state.clone(),
                events.clone(),
                settings.frame_interval,
                settings.status_clear_after,
                tx,
            ),
            commit: CommitController::new(
                writer,
                board.clone(),
                events.clone(),
                settings.tag_language,
            ),
            composer: MessageComposer::new(generator, state.clone(), board),
            detections: Mutex::new(rx),
            state,
            events,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.state.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    pub fn scan_phase(&self) -> ScanPhase {
        self.scanner.phase()
    }

    /// Session start: begins scanning with the configured facing.
    pub async fn start(&self) -> bool {
        self.events.publish(SessionEvent::lifecycle(
            LifecyclePhase::Start,
            "session started",
        ));
        let facing = self.state.snapshot().facing;
        self.scanner.start(facing).await
    }

    /// Waits for the scanner's next detection and runs the credential trigger for it.
    /// Returns `None` once the scanner can no longer deliver detections.
    pub async fn next_detection(&self) -> Option<CommitOutcome> {
        let code = self.next_code().await?;
        Some(self.on_credential_acquired(code).await)
    }

    /// Waits for the scanner's next detection only. Safe to wrap in a timeout:
    /// nothing but the wait is cancelled.
    pub async fn next_code(&self) -> Option<DecodedCode> {
        self.detections.lock().await.recv().await
    }

    pub async fn on_credential_acquired(&self, code: DecodedCode) -> CommitOutcome {
        self.state
            .update(|s| s.credential = Some(code.into_payload()));
        self.composer.compose_if_empty().await;
        self.attempt().await
    }

    /// Stores the message. A blank one is replaced by a generated message first.
    pub async fn on_message_committed(&self, message: impl Into<String>) -> CommitOutcome {
        let message = message.into();
        self.state.update(|s| s.message = message);
        self.composer.compose_if_empty().await;
        self.attempt().await
    }

    pub async fn on_score_committed(&self, point: i64) -> CommitOutcome {
        self.state.update(|s| s.point = point);
        self.composer.compose_if_empty().await;
        self.attempt().await
    }

    /// Clears the message and asks for a freshly generated one.
    pub async fn reset_message(&self) -> CommitOutcome {
        self.state.update(|s| s.message.clear());
        self.composer.compose_if_empty().await;
        self.attempt().await
    }

    pub async fn toggle_camera(&self) -> bool {
        self.scanner.toggle_facing().await
    }

    pub async fn restart_scan(&self) -> bool {
        let facing = self.state.snapshot().facing;
        self.scanner.start(facing).await
    }

    pub async fn stop_scan(&self) {
        self.scanner.stop().await;
    }

    pub async fn shutdown(&self) {
        self.scanner.stop().await;
        info!("Session shut down");
        self.events.publish(SessionEvent::lifecycle(
            LifecyclePhase::Shutdown,
            "session ended",
        ));
    }

    async fn attempt(&self) -> CommitOutcome {
        let snapshot = self.state.snapshot();
        self.commit.attempt_write(&snapshot).await
    }
}
