use thiserror::Error;

pub type Result<T, E = NageError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum NageError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera track ended")]
    TrackEnded,
    #[error("tag writing is not supported on this platform")]
    UnsupportedPlatform,
    #[error("tag write failed: {0}")]
    WriteFailed(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
