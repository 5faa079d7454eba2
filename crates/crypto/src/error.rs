//! Error types for the huddle-crypto crate.

use huddle_shared::ids::ParticipantId;
use thiserror::Error;

use crate::provider::ProviderError;

/// Errors surfaced by identity, roster, payload and envelope operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The provider could not produce or export a key pair.
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// An identity was already created for this session.
    #[error("identity already exists")]
    IdentityAlreadyExists,

    /// No identity has been created for this session yet.
    #[error("identity not initialized")]
    IdentityNotInitialized,

    /// Roster lookup missed.
    #[error("participant not found: {id}")]
    NotFound { id: ParticipantId },

    /// Display name rejected by validation (empty, too long).
    #[error("invalid display name: {0}")]
    InvalidDisplayName(String),

    /// Display name is held by a different participant.
    #[error("display name {name:?} is taken by another participant")]
    NameTaken { name: String },

    /// A participant descriptor carried an unusable public key.
    #[error("invalid participant {id}: {detail}")]
    InvalidParticipant { id: ParticipantId, detail: String },

    /// Any step of sealing an envelope failed; nothing was emitted.
    #[error("envelope seal failed: {0}")]
    EnvelopeSealFailed(String),

    /// The envelope holds no key record for the local identity.
    #[error("no key record addressed to {id}")]
    NoMatchingRecipientRecord { id: ParticipantId },

    /// Key unwrap or payload decryption failed.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The signature over the ciphertext did not verify.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// The payload bytes could not be produced or parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The envelope structure is invalid (e.g. wrong IV length).
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::MalformedPayload(err.to_string())
    }
}

impl From<ProviderError> for CryptoError {
    fn from(err: ProviderError) -> Self {
        CryptoError::EnvelopeSealFailed(err.to_string())
    }
}

impl From<CryptoError> for huddle_shared::error::HuddleError {
    fn from(err: CryptoError) -> Self {
        use huddle_shared::error::HuddleError;
        match err {
            CryptoError::NoMatchingRecipientRecord { .. }
            | CryptoError::DecryptionFailed(_)
            | CryptoError::SignatureVerificationFailed
            | CryptoError::MalformedPayload(_)
            | CryptoError::MalformedEnvelope(_) => HuddleError::Undeliverable,
            CryptoError::NotFound { .. } => HuddleError::NotFound,
            CryptoError::InvalidDisplayName(_) | CryptoError::NameTaken { .. } => {
                HuddleError::Validation(err.to_string())
            }
            other => HuddleError::Crypto(other.to_string()),
        }
    }
}
