//! Capability interface over the raw cryptographic primitives.
//!
//! The envelope protocol never touches a cipher directly: it asks a
//! [`PrimitiveProvider`] for keys, wraps, encryptions and MACs. Key material
//! travels between the two as opaque [`KeyHandle`]s tagged with their kind, so
//! a provider can refuse to use a signing key for encryption or to export a
//! private key.

pub mod native;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

pub use native::NativeProvider;

/// Errors raised by a primitive provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Key material has the wrong length or encoding.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A key of one kind was handed to an operation expecting another.
    #[error("wrong key kind: expected {expected:?}, got {actual:?}")]
    WrongKeyKind { expected: KeyKind, actual: KeyKind },

    /// The key may not leave the provider (private keys).
    #[error("key is not exportable")]
    NotExportable,

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication tag mismatch, truncated input, wrong key.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// What a key handle may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Symmetric payload key.
    Secret,
    /// MAC key for signing ciphertext.
    Signing,
    /// Asymmetric public key (wrap target).
    Public,
    /// Asymmetric private key (unwrap).
    Private,
}

/// Export/import encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// Bare key bytes.
    Raw,
    /// SubjectPublicKeyInfo DER; public keys only.
    Spki,
}

/// Intended use of an imported key; selects the resulting [`KeyKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Encrypt,
    Sign,
    Wrap,
}

impl KeyUsage {
    pub fn kind(self) -> KeyKind {
        match self {
            KeyUsage::Encrypt => KeyKind::Secret,
            KeyUsage::Sign => KeyKind::Signing,
            KeyUsage::Wrap => KeyKind::Public,
        }
    }
}

/// Opaque key material tagged with its kind. Cloning shares the material;
/// it is zeroed when the last clone drops.
#[derive(Clone)]
pub struct KeyHandle {
    kind: KeyKind,
    material: Arc<Zeroizing<Vec<u8>>>,
}

impl KeyHandle {
    /// Wrap raw material. Intended for provider implementations.
    pub fn new(kind: KeyKind, material: Vec<u8>) -> Self {
        Self {
            kind,
            material: Arc::new(Zeroizing::new(material)),
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Borrow the raw material. Intended for provider implementations.
    pub fn material(&self) -> &[u8] {
        self.material.as_slice()
    }

    /// Fail unless this handle is of `expected` kind.
    pub fn expect_kind(&self, expected: KeyKind) -> Result<&Self, ProviderError> {
        if self.kind == expected {
            Ok(self)
        } else {
            Err(ProviderError::WrongKeyKind {
                expected,
                actual: self.kind,
            })
        }
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("kind", &self.kind)
            .field("len", &self.material.len())
            .finish_non_exhaustive()
    }
}

/// An asymmetric key pair.
#[derive(Debug)]
pub struct KeyPair {
    pub public: KeyHandle,
    pub private: KeyHandle,
}

/// The primitive operations the envelope protocol is built on.
///
/// Every operation except [`random_bytes`](Self::random_bytes) is async so
/// that implementations backed by hardware, a worker pool, or a platform
/// crypto API can suspend the caller while they compute.
#[async_trait]
pub trait PrimitiveProvider: Send + Sync {
    async fn generate_key_pair(&self) -> Result<KeyPair, ProviderError>;

    async fn generate_symmetric_key(&self) -> Result<KeyHandle, ProviderError>;

    async fn generate_signing_key(&self) -> Result<KeyHandle, ProviderError>;

    async fn export_key(
        &self,
        key: &KeyHandle,
        format: KeyFormat,
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError>;

    async fn import_key(
        &self,
        bytes: &[u8],
        format: KeyFormat,
        usage: KeyUsage,
    ) -> Result<KeyHandle, ProviderError>;

    /// Encrypt a small key value to `public_key`.
    async fn asymmetric_wrap(
        &self,
        bytes: &[u8],
        public_key: &KeyHandle,
    ) -> Result<Vec<u8>, ProviderError>;

    async fn asymmetric_unwrap(
        &self,
        bytes: &[u8],
        private_key: &KeyHandle,
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError>;

    async fn symmetric_encrypt(
        &self,
        bytes: &[u8],
        key: &KeyHandle,
        iv: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    async fn symmetric_decrypt(
        &self,
        bytes: &[u8],
        key: &KeyHandle,
        iv: &[u8],
    ) -> Result<Vec<u8>, ProviderError>;

    async fn sign(&self, bytes: &[u8], signing_key: &KeyHandle) -> Result<Vec<u8>, ProviderError>;

    /// `Ok(false)` means the signature does not match; `Err` means the
    /// provider could not evaluate it at all.
    async fn verify(
        &self,
        signature: &[u8],
        bytes: &[u8],
        signing_key: &KeyHandle,
    ) -> Result<bool, ProviderError>;

    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_usage_selects_kind() {
        assert_eq!(KeyUsage::Encrypt.kind(), KeyKind::Secret);
        assert_eq!(KeyUsage::Sign.kind(), KeyKind::Signing);
        assert_eq!(KeyUsage::Wrap.kind(), KeyKind::Public);
    }

    #[test]
    fn expect_kind_rejects_mismatch() {
        let key = KeyHandle::new(KeyKind::Signing, vec![1; 32]);
        assert!(key.expect_kind(KeyKind::Signing).is_ok());
        match key.expect_kind(KeyKind::Secret) {
            Err(ProviderError::WrongKeyKind { expected, actual }) => {
                assert_eq!(expected, KeyKind::Secret);
                assert_eq!(actual, KeyKind::Signing);
            }
            other => panic!("expected WrongKeyKind, got: {other:?}"),
        }
    }

    #[test]
    fn debug_output_hides_material() {
        let key = KeyHandle::new(KeyKind::Private, vec![0xAB; 32]);
        let debug = format!("{key:?}");
        assert!(debug.contains("Private"));
        assert!(!debug.contains("171"));
        assert!(!debug.to_lowercase().contains("ab, ab"));
    }

    #[test]
    fn clones_share_material() {
        let key = KeyHandle::new(KeyKind::Secret, vec![7; 32]);
        let copy = key.clone();
        assert_eq!(key.material(), copy.material());
    }
}
