//! Operational helpers: logging and session event persistence.

use std::{path::PathBuf, sync::Arc};

use chrono::Utc;
use futures::{stream::BoxStream, StreamExt};
use nageyell_types::{config::OpsConfig, events::SessionEvent, NageError, Result};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| NageError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| NageError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// In-memory log of session events, flushed as JSON lines on demand.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_event(&self, event: SessionEvent) {
        self.events.lock().await.push(event);
    }

    /// Drains `stream` into the log until it ends.
    pub fn follow(&self, mut stream: BoxStream<'static, SessionEvent>) -> JoinHandle<()> {
        let log = self.clone();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                log.record_event(event).await;
            }
        })
    }

    pub async fn snapshot_events(&self) -> Vec<SessionEvent> {
        self.events.lock().await.clone()
    }

    /// Writes every recorded event as one JSON line into `dir`, returning the file path.
    pub async fn flush_jsonl(&self, dir: &str) -> Result<PathBuf> {
        let dir = ensure_telemetry_dir(dir)?;
        let path = dir.join(format!(
            "session_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S_%3f")
        ));
        let events = self.snapshot_events().await;
        let mut doc = String::new();
        for event in &events {
            let line = serde_json::to_string(event)
                .map_err(|err| NageError::Ops(format!("failed to encode event: {err}")))?;
            doc.push_str(&line);
            doc.push('\n');
        }
        tokio::fs::write(&path, doc)
            .await
            .map_err(|err| NageError::Ops(format!("failed to write event log: {err}")))?;
        info!("Flushed {} session event(s) to {:?}", events.len(), path);
        Ok(path)
    }
}

pub fn ensure_telemetry_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    std::fs::create_dir_all(&dir)
        .map_err(|err| NageError::Ops(format!("failed to create telemetry dir: {err}")))?;
    info!("Telemetry directory ready at {:?}", dir);
    Ok(dir)
}
