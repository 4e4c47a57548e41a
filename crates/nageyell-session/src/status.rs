//! Transient user-facing status with per-publication expiry.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use nageyell_events::EventSink;
use nageyell_types::{events::SessionEvent, session::SessionState, status::Status};
use tracing::{debug, info};

use crate::state::SessionHandle;

/// Which status field of the session a board owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Status,
    ScanStatus,
}

impl Slot {
    fn field(self, state: &mut SessionState) -> &mut Option<Status> {
        match self {
            Slot::Status => &mut state.status,
            Slot::ScanStatus => &mut state.scan_status,
        }
    }

    fn event(self, status: Option<Status>) -> SessionEvent {
        match self {
            Slot::Status => SessionEvent::status(status),
            Slot::ScanStatus => SessionEvent::scan_status(status),
        }
    }
}

#[derive(Clone)]
pub struct StatusBoard {
    slot: Slot,
    state: SessionHandle,
    events: Arc<dyn EventSink>,
    clear_after: Duration,
    generation: Arc<Mutex<u64>>,
}

impl StatusBoard {
    /// Board for write and generation outcomes.
    pub fn new(state: SessionHandle, events: Arc<dyn EventSink>, clear_after: Duration) -> Self {
        Self::with_slot(Slot::Status, state, events, clear_after)
    }

    /// Board for scan outcomes, kept apart so scanning never hides a write result.
    pub fn for_scan(state: SessionHandle, events: Arc<dyn EventSink>, clear_after: Duration) -> Self {
        Self::with_slot(Slot::ScanStatus, state, events, clear_after)
    }

    fn with_slot(
        slot: Slot,
        state: SessionHandle,
        events: Arc<dyn EventSink>,
        clear_after: Duration,
    ) -> Self {
        Self {
            slot,
            state,
            events,
            clear_after,
            generation: Arc::new(Mutex::new(0)),
        }
    }

    /// Shows `status`, superseding whatever was shown. Sticky statuses stay until
    /// superseded; everything else clears itself after the configured delay.
    pub fn publish(&self, status: Status) {
        info!("Status ({:?}): {status}", self.slot);
        let sticky = status.is_sticky();
        let generation = self.with_generation(|current| {
            *current += 1;
            self.state
                .update(|s| *self.slot.field(s) = Some(status.clone()));
            *current
        });
        self.events.publish(self.slot.event(Some(status)));
        if !sticky {
            self.schedule_clear(generation);
        }
    }

    fn schedule_clear(&self, generation: u64) {
        let board = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(board.clear_after).await;
            board.clear_if_current(generation);
        });
    }

    /// Clears the status only if nothing was published after `generation`.
    fn clear_if_current(&self, generation: u64) -> bool {
        let cleared = self.with_generation(|current| {
            if *current != generation {
                return false;
            }
            self.state.update(|s| *self.slot.field(s) = None);
            true
        });
        if cleared {
            debug!("Status expired (generation {generation})");
            self.events.publish(self.slot.event(None));
        }
        cleared
    }

    fn with_generation<R>(&self, f: impl FnOnce(&mut u64) -> R) -> R {
        let mut guard = match self.generation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nageyell_events::LocalBus;
    use tokio::time::sleep;

    fn board(clear_ms: u64) -> (StatusBoard, SessionHandle) {
        let state = SessionHandle::default();
        let bus: Arc<dyn EventSink> = Arc::new(LocalBus::new(16));
        (
            StatusBoard::new(state.clone(), bus, Duration::from_millis(clear_ms)),
            state,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn status_clears_after_delay() {
        let (board, state) = board(3_000);
        board.publish(Status::WriteSucceeded);
        assert_eq!(state.snapshot().status, Some(Status::WriteSucceeded));

        sleep(Duration::from_millis(2_999)).await;
        assert_eq!(state.snapshot().status, Some(Status::WriteSucceeded));
        sleep(Duration::from_millis(2)).await;
        assert_eq!(state.snapshot().status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_status_survives_older_timer() {
        let (board, state) = board(3_000);
        board.publish(Status::WriteSucceeded);
        sleep(Duration::from_millis(1_000)).await;
        board.publish(Status::WriteFailed("tag out of range".into()));

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(
            state.snapshot().status,
            Some(Status::WriteFailed("tag out of range".into()))
        );
        sleep(Duration::from_millis(600)).await;
        assert_eq!(state.snapshot().status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_board_leaves_write_status_alone() {
        let (board, state) = board(3_000);
        let bus: Arc<dyn EventSink> = Arc::new(LocalBus::new(16));
        let scan = StatusBoard::for_scan(state.clone(), bus, Duration::from_millis(3_000));

        board.publish(Status::WriteSucceeded);
        scan.publish(Status::CameraStopped);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, Some(Status::WriteSucceeded));
        assert_eq!(snapshot.scan_status, Some(Status::CameraStopped));

        sleep(Duration::from_millis(3_001)).await;
        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, None);
        assert_eq!(snapshot.scan_status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn sticky_status_does_not_expire() {
        let (board, state) = board(3_000);
        board.publish(Status::UnsupportedPlatform);
        sleep(Duration::from_millis(10_000)).await;
        assert_eq!(state.snapshot().status, Some(Status::UnsupportedPlatform));
    }
}
