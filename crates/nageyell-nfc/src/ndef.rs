//! NDEF message codec, limited to what a text-record tag needs.

use nageyell_types::{NageError, Result};

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;

const TEXT_TYPE: &[u8] = b"T";
const TEXT_UTF16: u8 = 0x80;
const TEXT_LANG_MASK: u8 = 0x3f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tnf {
    Empty,
    WellKnown,
    Media,
    AbsoluteUri,
    External,
    Unknown,
    Unchanged,
}

impl Tnf {
    fn bits(self) -> u8 {
        match self {
            Tnf::Empty => 0x00,
            Tnf::WellKnown => 0x01,
            Tnf::Media => 0x02,
            Tnf::AbsoluteUri => 0x03,
            Tnf::External => 0x04,
            Tnf::Unknown => 0x05,
            Tnf::Unchanged => 0x06,
        }
    }

    fn from_bits(bits: u8) -> Result<Self> {
        Ok(match bits {
            0x00 => Tnf::Empty,
            0x01 => Tnf::WellKnown,
            0x02 => Tnf::Media,
            0x03 => Tnf::AbsoluteUri,
            0x04 => Tnf::External,
            0x05 => Tnf::Unknown,
            0x06 => Tnf::Unchanged,
            other => return Err(ndef_error(format!("reserved TNF {other:#04x}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdefRecord {
    pub tnf: Tnf,
    pub record_type: Vec<u8>,
    pub id: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Decoded well-known text record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub language: String,
    pub text: String,
}

impl NdefRecord {
    /// Well-known "T" record with UTF-8 text.
    pub fn text(language: &str, text: &str) -> Result<Self> {
        if language.is_empty() || language.len() > TEXT_LANG_MASK as usize || !language.is_ascii()
        {
            return Err(ndef_error(format!(
                "invalid text record language code '{language}'"
            )));
        }
        let mut payload = Vec::with_capacity(1 + language.len() + text.len());
        payload.push(language.len() as u8);
        payload.extend_from_slice(language.as_bytes());
        payload.extend_from_slice(text.as_bytes());
        Ok(Self {
            tnf: Tnf::WellKnown,
            record_type: TEXT_TYPE.to_vec(),
            id: Vec::new(),
            payload,
        })
    }

    pub fn as_text(&self) -> Result<TextRecord> {
        if self.tnf != Tnf::WellKnown || self.record_type != TEXT_TYPE {
            return Err(ndef_error("record is not a text record"));
        }
        let (&status, rest) = self
            .payload
            .split_first()
            .ok_or_else(|| ndef_error("empty text record payload"))?;
        if status & TEXT_UTF16 != 0 {
            return Err(ndef_error("UTF-16 text records are not supported"));
        }
        let lang_len = (status & TEXT_LANG_MASK) as usize;
        if rest.len() < lang_len {
            return Err(ndef_error("text record language code is truncated"));
        }
        let (lang, body) = rest.split_at(lang_len);
        let language = std::str::from_utf8(lang)
            .map_err(|err| ndef_error(format!("language code: {err}")))?
            .to_string();
        let text = String::from_utf8(body.to_vec())
            .map_err(|err| ndef_error(format!("text body: {err}")))?;
        Ok(TextRecord { language, text })
    }

    fn encode_into(&self, out: &mut Vec<u8>, first: bool, last: bool) -> Result<()> {
        let type_len = u8::try_from(self.record_type.len())
            .map_err(|_| ndef_error("record type longer than 255 bytes"))?;
        let id_len =
            u8::try_from(self.id.len()).map_err(|_| ndef_error("record id longer than 255 bytes"))?;
        let payload_len = u32::try_from(self.payload.len())
            .map_err(|_| ndef_error("record payload exceeds 4 GiB"))?;
        let short = payload_len <= u8::MAX as u32;

        let mut header = self.tnf.bits();
        if first {
            header |= FLAG_MB;
        }
        if last {
            header |= FLAG_ME;
        }
        if short {
            header |= FLAG_SR;
        }
        if !self.id.is_empty() {
            header |= FLAG_IL;
        }

        out.push(header);
        out.push(type_len);
        if short {
            out.push(payload_len as u8);
        } else {
            out.extend_from_slice(&payload_len.to_be_bytes());
        }
        if !self.id.is_empty() {
            out.push(id_len);
        }
        out.extend_from_slice(&self.record_type);
        out.extend_from_slice(&self.id);
        out.extend_from_slice(&self.payload);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NdefMessage {
    pub records: Vec<NdefRecord>,
}

impl NdefMessage {
    pub fn single(record: NdefRecord) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// Message holding one UTF-8 text record.
    pub fn text(language: &str, text: &str) -> Result<Self> {
        Ok(Self::single(NdefRecord::text(language, text)?))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.records.is_empty() {
            return Err(ndef_error("cannot encode an empty message"));
        }
        let mut out = Vec::new();
        let last_idx = self.records.len() - 1;
        for (idx, record) in self.records.iter().enumerate() {
            record.encode_into(&mut out, idx == 0, idx == last_idx)?;
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { bytes, pos: 0 };
        let mut records = Vec::new();
        loop {
            let header = cursor.byte()?;
            if records.is_empty() && header & FLAG_MB == 0 {
                return Err(ndef_error("first record lacks the message-begin flag"));
            }
            if header & FLAG_CF != 0 {
                return Err(ndef_error("chunked records are not supported"));
            }
            let tnf = Tnf::from_bits(header & TNF_MASK)?;
            let type_len = cursor.byte()? as usize;
            let payload_len = if header & FLAG_SR != 0 {
                cursor.byte()? as usize
            } else {
                let raw = cursor.take(4)?;
                u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
            };
            let id_len = if header & FLAG_IL != 0 {
                cursor.byte()? as usize
            } else {
                0
            };
            let record_type = cursor.take(type_len)?.to_vec();
            let id = cursor.take(id_len)?.to_vec();
            let payload = cursor.take(payload_len)?.to_vec();
            records.push(NdefRecord {
                tnf,
                record_type,
                id,
                payload,
            });
            if header & FLAG_ME != 0 {
                break;
            }
        }
        if cursor.pos != bytes.len() {
            return Err(ndef_error("trailing bytes after message end"));
        }
        Ok(Self { records })
    }

    /// Text of the first text record, if any.
    pub fn first_text(&self) -> Option<TextRecord> {
        self.records.iter().find_map(|record| record.as_text().ok())
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| ndef_error("message is truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn ndef_error(message: impl Into<String>) -> NageError {
    NageError::Serialization(format!("ndef: {}", message.into()))
}
