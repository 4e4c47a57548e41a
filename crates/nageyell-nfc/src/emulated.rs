use std::path::PathBuf;

use async_trait::async_trait;
use nageyell_types::{NageError, Result};
use tracing::{info, warn};

use crate::{ndef::NdefMessage, tag_error, TagWriter};

/// User memory of an NTAG215, the usual sticker tag.
pub const DEFAULT_CAPACITY: usize = 504;

/// Tag emulated by a file holding the raw NDEF message bytes.
pub struct EmulatedTag {
    path: PathBuf,
    supported: bool,
    read_only: bool,
    capacity: usize,
}

impl EmulatedTag {
    pub fn new(path: impl Into<PathBuf>, supported: bool) -> Self {
        Self {
            path: path.into(),
            supported,
            read_only: false,
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Reads back whatever the last write left on the tag.
    pub async fn read(&self) -> Result<NdefMessage> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|err| tag_error(format!("tag read failed: {err}")))?;
        NdefMessage::decode(&raw)
    }
}

#[async_trait]
impl TagWriter for EmulatedTag {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn write(&self, message: &NdefMessage) -> Result<()> {
        if !self.supported {
            return Err(NageError::UnsupportedPlatform);
        }
        if self.read_only {
            warn!("Emulated tag {:?} is read-only", self.path);
            return Err(tag_error("tag is read-only"));
        }
        let bytes = message.encode()?;
        if bytes.len() > self.capacity {
            return Err(tag_error(format!(
                "message of {} bytes exceeds tag capacity of {} bytes",
                bytes.len(),
                self.capacity
            )));
        }
        tokio::fs::write(&self.path, &bytes)
            .await
            .map_err(|err| tag_error(format!("{}: {err}", self.path.display())))?;
        info!("Wrote {} NDEF bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }
}
