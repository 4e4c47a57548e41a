use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{NageError, Result};

pub const POINT_MIN: i64 = 1;
pub const POINT_MAX: i64 = 1000;

/// Unit of persistence written to the tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub point: u16,
    pub message: String,
}

impl ScoreRecord {
    /// JSON text stored in the tag's text record.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| NageError::Serialization(format!("score record: {err}")))
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|err| NageError::Serialization(format!("score record: {err}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValidationReason {
    MissingMessage,
    PointOutOfRange,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationReason::MissingMessage => write!(f, "メッセージは必須です"),
            ValidationReason::PointOutOfRange => write!(
                f,
                "ポイントは{POINT_MIN}から{POINT_MAX}の間でなければなりません"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub reasons: BTreeSet<ValidationReason>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn contains(&self, reason: ValidationReason) -> bool {
        self.reasons.contains(&reason)
    }

    /// One user-facing line per failed field.
    pub fn messages(&self) -> Vec<String> {
        self.reasons.iter().map(ToString::to_string).collect()
    }
}

/// User-editable fields feeding a tag write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub message: String,
    pub point: i64,
}

impl FormState {
    pub fn new(message: impl Into<String>, point: i64) -> Self {
        Self {
            message: message.into(),
            point,
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut reasons = BTreeSet::new();
        if self.message.trim().is_empty() {
            reasons.insert(ValidationReason::MissingMessage);
        }
        if !(POINT_MIN..=POINT_MAX).contains(&self.point) {
            reasons.insert(ValidationReason::PointOutOfRange);
        }
        ValidationReport { reasons }
    }

    pub fn to_record(&self) -> std::result::Result<ScoreRecord, ValidationReport> {
        let report = self.validate();
        if !report.is_valid() {
            return Err(report);
        }
        let point = u16::try_from(self.point).map_err(|_| ValidationReport {
            reasons: BTreeSet::from([ValidationReason::PointOutOfRange]),
        })?;
        Ok(ScoreRecord {
            point,
            message: self.message.trim().to_string(),
        })
    }
}
