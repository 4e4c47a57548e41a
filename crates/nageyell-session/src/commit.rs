//! Validated record → NDEF text record → single tag write.

use std::sync::Arc;

use nageyell_events::EventSink;
use nageyell_nfc::{NdefMessage, TagWriter};
use nageyell_types::{
    events::{EventPayload, SessionEvent},
    session::SessionState,
    status::{CommitOutcome, Status},
    NageError,
};
use tracing::{debug, info, warn};

use crate::status::StatusBoard;

/// Runs write attempts. Overlapping attempts are not serialized; whichever
/// resolves last owns the status.
pub struct CommitController<W> {
    writer: W,
    status: StatusBoard,
    events: Arc<dyn EventSink>,
    language: String,
}

impl<W> CommitController<W>
where
    W: TagWriter,
{
    pub fn new(
        writer: W,
        status: StatusBoard,
        events: Arc<dyn EventSink>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            status,
            events,
            language: language.into(),
        }
    }

    pub async fn attempt_write(&self, state: &SessionState) -> CommitOutcome {
        let outcome = self.run_attempt(state).await;
        self.events
            .publish(SessionEvent::new(EventPayload::Commit(outcome.clone())));
        outcome
    }

    async fn run_attempt(&self, state: &SessionState) -> CommitOutcome {
        let record = match state.form().to_record() {
            Ok(record) => record,
            Err(report) => {
                debug!("Write skipped: {}", report.messages().join(", "));
                return CommitOutcome::Rejected(report);
            }
        };

        let message = match record
            .to_payload()
            .and_then(|payload| NdefMessage::text(&self.language, &payload))
        {
            Ok(message) => message,
            Err(err) => return self.fail(err.to_string()),
        };

        if !self.writer.is_supported() {
            warn!("Tag writing is not available on this platform");
            self.status.publish(Status::UnsupportedPlatform);
            return CommitOutcome::Unsupported;
        }

        info!("Writing score record (point={}) to tag", record.point);
        match self.writer.write(&message).await {
            Ok(()) => {
                self.status.publish(Status::WriteSucceeded);
                CommitOutcome::Written
            }
            Err(NageError::UnsupportedPlatform) => {
                self.status.publish(Status::UnsupportedPlatform);
                CommitOutcome::Unsupported
            }
            Err(NageError::WriteFailed(detail)) => self.fail(detail),
            Err(other) => self.fail(other.to_string()),
        }
    }

    fn fail(&self, detail: String) -> CommitOutcome {
        warn!("Tag write failed: {detail}");
        self.status.publish(Status::WriteFailed(detail.clone()));
        CommitOutcome::Failed(detail)
    }
}
