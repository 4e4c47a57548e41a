use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::ValidationReport;

/// Human-readable status shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Status {
    CodeDetected,
    CameraUnavailable(String),
    CameraStopped,
    WriteSucceeded,
    WriteFailed(String),
    UnsupportedPlatform,
    MessageGenerated,
    GenerationFailed(String),
    CredentialMissing,
}

impl Status {
    /// Statuses that stay until superseded instead of expiring.
    pub fn is_sticky(&self) -> bool {
        matches!(self, Status::UnsupportedPlatform)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::CodeDetected => write!(f, "QRコードが読み取られました。"),
            Status::CameraUnavailable(detail) => write!(f, "カメラを利用できません: {detail}"),
            Status::CameraStopped => write!(f, "カメラが停止しました。"),
            Status::WriteSucceeded => write!(f, "NFCタグに正常に書き込みました！"),
            Status::WriteFailed(detail) => write!(f, "エラーが発生しました: {detail}"),
            Status::UnsupportedPlatform => {
                write!(f, "お使いの環境はNFCタグへの書き込みをサポートしていません。")
            }
            Status::MessageGenerated => write!(f, "感想文が生成されました。"),
            Status::GenerationFailed(detail) => write!(f, "エラーが発生しました: {detail}"),
            Status::CredentialMissing => write!(f, "APIキーが設定されていません。"),
        }
    }
}

/// Result of a single commit attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CommitOutcome {
    Rejected(ValidationReport),
    Unsupported,
    Written,
    Failed(String),
}

impl CommitOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, CommitOutcome::Written)
    }

    pub fn touched_hardware(&self) -> bool {
        matches!(self, CommitOutcome::Written | CommitOutcome::Failed(_))
    }
}
