use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{frame::Facing, NageError, Result};

/// NDEF text records store the language length in six bits.
pub const MAX_LANGUAGE_LEN: usize = 63;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub facing: Facing,
    pub frame_interval_ms: u64,
    pub still_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub supported: bool,
    pub output_path: String,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    ChatCompletions,
    Canned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub status_clear_ms: u64,
    pub scan_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
    pub telemetry_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NageConfig {
    pub camera: CameraConfig,
    pub tag: TagConfig,
    pub generator: GeneratorConfig,
    pub session: SessionConfig,
    pub ops: OpsConfig,
}

impl Default for NageConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                facing: Facing::Environment,
                frame_interval_ms: 16,
                still_dir: None,
            },
            tag: TagConfig {
                supported: true,
                output_path: "tag.ndef".into(),
                language: "ja".into(),
            },
            generator: GeneratorConfig {
                kind: GeneratorKind::Canned,
                endpoint: "https://api.openai.com/v1/chat/completions".into(),
                model: "gpt-4o".into(),
                timeout_ms: 30_000,
            },
            session: SessionConfig {
                status_clear_ms: 3_000,
                scan_timeout_ms: 30_000,
            },
            ops: OpsConfig {
                log_level: "info".into(),
                telemetry_dir: "telemetry".into(),
            },
        }
    }
}

impl NageConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            NageError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            NageError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.frame_interval_ms == 0 {
            return Err(NageError::Configuration(
                "camera.frame_interval_ms must be greater than zero".into(),
            ));
        }
        let language = &self.tag.language;
        if language.is_empty() || language.len() > MAX_LANGUAGE_LEN || !language.is_ascii() {
            return Err(NageError::Configuration(format!(
                "tag.language must be 1..={MAX_LANGUAGE_LEN} ASCII bytes"
            )));
        }
        if self.tag.output_path.trim().is_empty() {
            return Err(NageError::Configuration(
                "tag.output_path must not be empty".into(),
            ));
        }
        if self.generator.kind == GeneratorKind::ChatCompletions
            && (self.generator.endpoint.trim().is_empty() || self.generator.model.trim().is_empty())
        {
            return Err(NageError::Configuration(
                "generator.endpoint and generator.model are required for chat_completions".into(),
            ));
        }
        if self.generator.timeout_ms == 0 {
            return Err(NageError::Configuration(
                "generator.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.session.status_clear_ms == 0 {
            return Err(NageError::Configuration(
                "session.status_clear_ms must be greater than zero".into(),
            ));
        }
        if self.session.scan_timeout_ms == 0 {
            return Err(NageError::Configuration(
                "session.scan_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
