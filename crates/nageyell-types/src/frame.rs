use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which camera a stream is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    User,
    #[default]
    Environment,
}

impl Facing {
    pub fn toggled(self) -> Self {
        match self {
            Facing::User => Facing::Environment,
            Facing::Environment => Facing::User,
        }
    }

    /// Constraint value as understood by media device APIs.
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::User => "user",
            Facing::Environment => "environment",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Raw RGBA pixel buffer, row-major.
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub const CHANNELS: usize = 4;

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            captured_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::from_rgba(0, 0, Vec::new())
    }

    /// Solid frame of a single grey level, useful as a "nothing to see" sample.
    pub fn blank(width: u32, height: u32, level: u8) -> Self {
        let len = (width as usize) * (height as usize) * Self::CHANNELS;
        let mut data = Vec::with_capacity(len);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&[level, level, level, 255]);
        }
        Self::from_rgba(width, height, data)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the buffer length agrees with the declared dimensions.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * Self::CHANNELS
    }
}

/// Payload of a successfully decoded optical code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    payload: String,
}

impl DecodedCode {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_toggles_both_ways() {
        assert_eq!(Facing::Environment.toggled(), Facing::User);
        assert_eq!(Facing::User.toggled(), Facing::Environment);
        assert_eq!(Facing::default(), Facing::Environment);
    }

    #[test]
    fn facing_serializes_as_constraint_value() {
        let json = serde_json::to_string(&Facing::User).unwrap();
        assert_eq!(json, "\"user\"");
        assert_eq!(Facing::Environment.as_str(), "environment");
    }

    #[test]
    fn blank_frame_is_consistent() {
        let frame = Frame::blank(8, 4, 200);
        assert!(frame.is_consistent());
        assert!(!frame.is_empty());
        assert!(Frame::empty().is_empty());

        let broken = Frame::from_rgba(8, 4, vec![0; 10]);
        assert!(!broken.is_consistent());
    }
}
