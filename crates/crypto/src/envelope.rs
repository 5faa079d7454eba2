//! Sealed message value types and their wire conversion.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use huddle_shared::api::envelope::{WireEnvelope, WireKeyRecord};
use huddle_shared::constants::IV_LENGTH;
use huddle_shared::ids::ParticipantId;

use crate::error::CryptoError;

/// One recipient's access ticket: both per-message keys wrapped under the
/// recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKeyRecord {
    pub recipient: ParticipantId,
    pub secret_key: Vec<u8>,
    pub signing_key: Vec<u8>,
}

/// A sealed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LENGTH],
    /// MAC over `ciphertext` under the per-message signing key.
    pub signature: Vec<u8>,
    pub records: Vec<WrappedKeyRecord>,
}

impl Envelope {
    /// The record addressed to `id`, if any.
    pub fn record_for(&self, id: ParticipantId) -> Option<&WrappedKeyRecord> {
        self.records.iter().find(|r| r.recipient == id)
    }

    pub fn recipients(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.records.iter().map(|r| r.recipient)
    }

    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            ciphertext: STANDARD.encode(&self.ciphertext),
            vector: STANDARD.encode(self.iv),
            signature: STANDARD.encode(&self.signature),
            secret_keys: self
                .records
                .iter()
                .map(|r| WireKeyRecord {
                    id: r.recipient,
                    secret_key: STANDARD.encode(&r.secret_key),
                    encrypted_signing_key: STANDARD.encode(&r.signing_key),
                })
                .collect(),
        }
    }

    /// Validate a wire envelope: every binary field must be valid base64, the
    /// IV must be exactly 16 bytes and no recipient may appear twice.
    pub fn from_wire(wire: WireEnvelope) -> Result<Self, CryptoError> {
        let vector = decode_field("vector", &wire.vector)?;
        let iv: [u8; IV_LENGTH] = vector.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedEnvelope(format!(
                "vector must be {IV_LENGTH} bytes, got {}",
                vector.len()
            ))
        })?;

        let mut seen = HashSet::with_capacity(wire.secret_keys.len());
        let mut records = Vec::with_capacity(wire.secret_keys.len());
        for record in &wire.secret_keys {
            if !seen.insert(record.id) {
                return Err(CryptoError::MalformedEnvelope(format!(
                    "duplicate key record for {}",
                    record.id
                )));
            }
            records.push(WrappedKeyRecord {
                recipient: record.id,
                secret_key: decode_field("secretKey", &record.secret_key)?,
                signing_key: decode_field("encryptedSigningKey", &record.encrypted_signing_key)?,
            });
        }

        Ok(Self {
            ciphertext: decode_field("ciphertext", &wire.ciphertext)?,
            iv,
            signature: decode_field("signature", &wire.signature)?,
            records,
        })
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("{name} is not base64: {e}")))
}

impl From<&Envelope> for WireEnvelope {
    fn from(envelope: &Envelope) -> Self {
        envelope.to_wire()
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = CryptoError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        Envelope::from_wire(wire)
    }
}
