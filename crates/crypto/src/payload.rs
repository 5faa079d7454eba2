//! Logical message content and its canonical byte encoding.
//!
//! The encoding is JSON with a fixed field order and an explicit format
//! version, so the decoder needs no outside schema. Text is percent-escaped
//! before serialization; everything but `[A-Za-z0-9@*_+-./]` becomes `%XX`
//! over its UTF-8 bytes.

use chrono::{DateTime, SubsecRound, Utc};
use huddle_shared::constants::MAX_ATTACHMENT_SIZE_BYTES;
use huddle_shared::ids::AttachmentId;
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

const PAYLOAD_VERSION: u8 = 1;

/// Kind of message carried by a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    /// Emote-style line ("/me waves").
    Action,
    /// File offer; the attachment describes the file.
    File,
}

impl MessageType {
    pub fn allows_empty_body(self) -> bool {
        matches!(self, MessageType::Action | MessageType::File)
    }
}

/// Metadata describing an offered file. Content transfer happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Attachment {
    pub id: AttachmentId,
    pub file_name: String,
    pub file_type: String,
    pub size: u64,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        size: u64,
    ) -> Result<Self, CryptoError> {
        if size > MAX_ATTACHMENT_SIZE_BYTES {
            return Err(CryptoError::MalformedPayload(format!(
                "attachment of {size} bytes exceeds {MAX_ATTACHMENT_SIZE_BYTES}"
            )));
        }
        Ok(Self {
            id: AttachmentId::new(),
            file_name: file_name.into(),
            file_type: file_type.into(),
            size,
        })
    }
}

/// One outgoing or received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    text: String,
    message_type: MessageType,
    attachment: Option<Attachment>,
    timestamp: DateTime<Utc>,
}

/// Serialized shape. Field order here is the canonical order on the wire.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EncodedPayload {
    v: u8,
    text: String,
    message_type: MessageType,
    attachment: Option<Attachment>,
    timestamp: DateTime<Utc>,
}

impl Payload {
    /// Build a payload stamped with the current time (millisecond precision).
    pub fn new(
        text: impl Into<String>,
        message_type: MessageType,
        attachment: Option<Attachment>,
    ) -> Result<Self, CryptoError> {
        let payload = Self {
            text: text.into(),
            message_type,
            attachment,
            timestamp: Utc::now().trunc_subsecs(3),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Plain text message.
    pub fn text(text: impl Into<String>) -> Result<Self, CryptoError> {
        Self::new(text, MessageType::Text, None)
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(3);
        self
    }

    pub fn body(&self) -> &str {
        &self.text
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn validate(&self) -> Result<(), CryptoError> {
        if self.text.trim().is_empty() && !self.message_type.allows_empty_body() {
            return Err(CryptoError::MalformedPayload(format!(
                "{:?} message requires a body",
                self.message_type
            )));
        }
        if self.message_type == MessageType::File && self.attachment.is_none() {
            return Err(CryptoError::MalformedPayload(
                "file message requires an attachment".into(),
            ));
        }
        Ok(())
    }

    /// Canonical serialization.
    pub fn encode(&self) -> Result<Vec<u8>, CryptoError> {
        self.validate()?;
        let encoded = EncodedPayload {
            v: PAYLOAD_VERSION,
            text: escape(&self.text),
            message_type: self.message_type,
            attachment: self.attachment.clone(),
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_vec(&encoded)?)
    }

    /// Inverse of [`encode`](Self::encode). Any structural problem is
    /// reported as `MalformedPayload`.
    pub fn decode(bytes: &[u8]) -> Result<Self, CryptoError> {
        let encoded: EncodedPayload = serde_json::from_slice(bytes)?;
        if encoded.v != PAYLOAD_VERSION {
            return Err(CryptoError::MalformedPayload(format!(
                "unsupported payload version {}",
                encoded.v
            )));
        }
        let payload = Self {
            text: unescape(&encoded.text)?,
            message_type: encoded.message_type,
            attachment: encoded.attachment,
            timestamp: encoded.timestamp,
        };
        payload.validate()?;
        Ok(payload)
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'@' | b'*' | b'_' | b'+' | b'-' | b'.' | b'/')
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for &b in text.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn unescape(escaped: &str) -> Result<String, CryptoError> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        CryptoError::MalformedPayload(format!("bad escape at offset {i}"))
                    })?;
                out.push(hex);
                i += 3;
            }
            b if is_unreserved(b) => {
                out.push(b);
                i += 1;
            }
            b => {
                return Err(CryptoError::MalformedPayload(format!(
                    "unescaped byte 0x{b:02x} at offset {i}"
                )))
            }
        }
    }
    String::from_utf8(out)
        .map_err(|_| CryptoError::MalformedPayload("escaped text is not UTF-8".into()))
}
