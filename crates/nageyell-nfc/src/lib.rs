//! NFC tag writing: NDEF codec plus tag backends.

mod emulated;
pub mod ndef;

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use nageyell_types::{NageError, Result};
use tracing::info;

pub use emulated::EmulatedTag;
pub use ndef::{NdefMessage, NdefRecord, TextRecord};

#[async_trait]
pub trait TagWriter: Send + Sync {
    /// Platform feature flag: whether tag writing exists at all here.
    fn is_supported(&self) -> bool;
    /// One write transaction. Failures come back as `WriteFailed` with the platform detail.
    async fn write(&self, message: &NdefMessage) -> Result<()>;
}

/// Scriptable tag used by tests: records every write and replays queued failures.
pub struct ScriptedTag {
    supported: bool,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<String>>,
    writes: Arc<Mutex<Vec<NdefMessage>>>,
}

impl Default for ScriptedTag {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTag {
    pub fn new() -> Self {
        Self {
            supported: true,
            delay: None,
            failures: Mutex::new(VecDeque::new()),
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Each write waits this long before resolving.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The next write fails with `detail`. Queued failures are consumed in order.
    pub fn fail_next(self, detail: impl Into<String>) -> Self {
        if let Ok(mut queue) = self.failures.lock() {
            queue.push_back(detail.into());
        }
        self
    }

    pub fn monitor(&self) -> TagMonitor {
        TagMonitor {
            writes: self.writes.clone(),
        }
    }
}

#[async_trait]
impl TagWriter for ScriptedTag {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn write(&self, message: &NdefMessage) -> Result<()> {
        if !self.supported {
            return Err(NageError::UnsupportedPlatform);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(message.clone());
        }
        let failure = self.failures.lock().ok().and_then(|mut q| q.pop_front());
        match failure {
            Some(detail) => Err(tag_error(detail)),
            None => {
                info!("Scripted tag accepted {} record(s)", message.records.len());
                Ok(())
            }
        }
    }
}

/// Shared view of the writes a `ScriptedTag` received.
#[derive(Clone)]
pub struct TagMonitor {
    writes: Arc<Mutex<Vec<NdefMessage>>>,
}

impl TagMonitor {
    pub fn writes(&self) -> Vec<NdefMessage> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| w.len()).unwrap_or_default()
    }
}

/// Generate an error aligned with tag-write semantics.
pub fn tag_error(message: impl Into<String>) -> NageError {
    NageError::WriteFailed(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_writes_and_replays_failures() {
        let tag = ScriptedTag::new().fail_next("tag out of range");
        let monitor = tag.monitor();
        let message = NdefMessage::text("en", "hello").unwrap();

        let err = tag.write(&message).await.unwrap_err();
        assert!(matches!(err, NageError::WriteFailed(ref d) if d == "tag out of range"));
        assert!(tag.write(&message).await.is_ok());
        assert_eq!(monitor.write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_write_waits() {
        let tag = ScriptedTag::new().with_delay(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        tag.write(&NdefMessage::text("en", "x").unwrap())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn unsupported_flag() {
        assert!(!ScriptedTag::unsupported().is_supported());
        assert!(ScriptedTag::new().is_supported());
    }
}
