//! Software implementation of [`PrimitiveProvider`].
//!
//! - key pairs: X25519
//! - payload encryption: AES-256-GCM with a 128-bit IV
//! - signing: HMAC-SHA256 under a per-message key
//! - key wrapping: ECIES (ephemeral X25519, HKDF-SHA256, AES-256-GCM)

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm, KeyInit, Nonce};
use async_trait::async_trait;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use huddle_shared::constants::IV_LENGTH;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::{
    KeyFormat, KeyHandle, KeyKind, KeyPair, KeyUsage, PrimitiveProvider, ProviderError,
};

/// AES-256-GCM with a 16-byte nonce, matching the envelope IV length.
type Aes256Gcm16 = AesGcm<Aes256, U16>;
type HmacSha256 = Hmac<Sha256>;

const KEY_SIZE: usize = 32;
const WRAP_NONCE_SIZE: usize = 12; // 96-bit nonce for the wrap cipher
const TAG_SIZE: usize = 16;

/// DER prefix of an X25519 SubjectPublicKeyInfo (OID 1.3.101.110).
const SPKI_X25519_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];

/// HKDF info label for key wrapping.
const WRAP_LABEL: &[u8] = b"huddle/key-wrap/v1";

/// Stateless software provider. Cheap to construct and share.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeProvider;

impl NativeProvider {
    pub fn new() -> Self {
        Self
    }
}

fn random_key() -> Zeroizing<[u8; KEY_SIZE]> {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rand::rng().fill_bytes(bytes.as_mut());
    bytes
}

fn key_array(bytes: &[u8]) -> Result<[u8; KEY_SIZE], ProviderError> {
    bytes.try_into().map_err(|_| {
        ProviderError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", bytes.len()))
    })
}

fn static_secret(private_key: &KeyHandle) -> Result<StaticSecret, ProviderError> {
    private_key.expect_kind(KeyKind::Private)?;
    let bytes = Zeroizing::new(key_array(private_key.material())?);
    Ok(StaticSecret::from(*bytes))
}

fn x25519_public(public_key: &KeyHandle) -> Result<PublicKey, ProviderError> {
    public_key.expect_kind(KeyKind::Public)?;
    Ok(PublicKey::from(key_array(public_key.material())?))
}

fn hmac_for(signing_key: &KeyHandle) -> Result<HmacSha256, ProviderError> {
    signing_key.expect_kind(KeyKind::Signing)?;
    <HmacSha256 as Mac>::new_from_slice(signing_key.material())
        .map_err(|e| ProviderError::InvalidKey(e.to_string()))
}

/// Derive the wrap cipher key, binding both public halves as salt.
fn derive_wrap_key(
    shared_secret: &[u8],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, ProviderError> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral_public);
    salt[32..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(WRAP_LABEL, okm.as_mut())
        .map_err(|e| ProviderError::InvalidKey(format!("hkdf expand: {e}")))?;
    Ok(okm)
}

#[async_trait]
impl PrimitiveProvider for NativeProvider {
    async fn generate_key_pair(&self) -> Result<KeyPair, ProviderError> {
        let secret = StaticSecret::from(*random_key());
        let public = PublicKey::from(&secret);
        Ok(KeyPair {
            public: KeyHandle::new(KeyKind::Public, public.as_bytes().to_vec()),
            private: KeyHandle::new(KeyKind::Private, secret.to_bytes().to_vec()),
        })
    }

    async fn generate_symmetric_key(&self) -> Result<KeyHandle, ProviderError> {
        Ok(KeyHandle::new(KeyKind::Secret, random_key().to_vec()))
    }

    async fn generate_signing_key(&self) -> Result<KeyHandle, ProviderError> {
        Ok(KeyHandle::new(KeyKind::Signing, random_key().to_vec()))
    }

    async fn export_key(
        &self,
        key: &KeyHandle,
        format: KeyFormat,
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError> {
        match (key.kind(), format) {
            (KeyKind::Private, _) => Err(ProviderError::NotExportable),
            (KeyKind::Public, KeyFormat::Spki) => {
                let mut out = Vec::with_capacity(SPKI_X25519_PREFIX.len() + KEY_SIZE);
                out.extend_from_slice(&SPKI_X25519_PREFIX);
                out.extend_from_slice(key.material());
                Ok(Zeroizing::new(out))
            }
            (_, KeyFormat::Raw) => Ok(Zeroizing::new(key.material().to_vec())),
            (kind, KeyFormat::Spki) => Err(ProviderError::InvalidKey(format!(
                "spki export is only defined for public keys, got {kind:?}"
            ))),
        }
    }

    async fn import_key(
        &self,
        bytes: &[u8],
        format: KeyFormat,
        usage: KeyUsage,
    ) -> Result<KeyHandle, ProviderError> {
        let raw = match (usage.kind(), format) {
            (KeyKind::Public, KeyFormat::Spki) => bytes
                .strip_prefix(SPKI_X25519_PREFIX.as_slice())
                .ok_or_else(|| ProviderError::InvalidKey("not an X25519 spki".into()))?,
            (_, KeyFormat::Raw) => bytes,
            (kind, KeyFormat::Spki) => {
                return Err(ProviderError::InvalidKey(format!(
                    "spki import is only defined for public keys, got {kind:?}"
                )))
            }
        };
        let raw = key_array(raw)?;
        Ok(KeyHandle::new(usage.kind(), raw.to_vec()))
    }

    async fn asymmetric_wrap(
        &self,
        bytes: &[u8],
        public_key: &KeyHandle,
    ) -> Result<Vec<u8>, ProviderError> {
        let recipient = x25519_public(public_key)?;

        let ephemeral = StaticSecret::from(*random_key());
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&recipient);
        if !shared.was_contributory() {
            return Err(ProviderError::InvalidKey("low-order recipient key".into()));
        }

        let wrap_key =
            derive_wrap_key(shared.as_bytes(), ephemeral_public.as_bytes(), recipient.as_bytes())?;

        let mut nonce_bytes = [0u8; WRAP_NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_ref())
            .map_err(|e| ProviderError::Encryption(format!("wrap cipher: {e}")))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: bytes,
                    aad: ephemeral_public.as_bytes(),
                },
            )
            .map_err(|e| ProviderError::Encryption(format!("wrap failed: {e}")))?;

        let mut out = Vec::with_capacity(KEY_SIZE + WRAP_NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(ephemeral_public.as_bytes());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    async fn asymmetric_unwrap(
        &self,
        bytes: &[u8],
        private_key: &KeyHandle,
    ) -> Result<Zeroizing<Vec<u8>>, ProviderError> {
        let secret = static_secret(private_key)?;
        if bytes.len() < KEY_SIZE + WRAP_NONCE_SIZE + TAG_SIZE {
            return Err(ProviderError::Decryption("wrapped key too short".into()));
        }

        let (ephemeral_bytes, rest) = bytes.split_at(KEY_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(WRAP_NONCE_SIZE);
        let ephemeral_public = PublicKey::from(key_array(ephemeral_bytes)?);
        let own_public = PublicKey::from(&secret);

        let shared = secret.diffie_hellman(&ephemeral_public);
        if !shared.was_contributory() {
            return Err(ProviderError::Decryption("low-order ephemeral key".into()));
        }
        let wrap_key =
            derive_wrap_key(shared.as_bytes(), ephemeral_public.as_bytes(), own_public.as_bytes())?;

        let cipher = Aes256Gcm::new_from_slice(wrap_key.as_ref())
            .map_err(|e| ProviderError::Decryption(format!("wrap cipher: {e}")))?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: ephemeral_public.as_bytes(),
                },
            )
            .map_err(|e| ProviderError::Decryption(format!("unwrap failed: {e}")))?;
        Ok(Zeroizing::new(plaintext))
    }

    async fn symmetric_encrypt(
        &self,
        bytes: &[u8],
        key: &KeyHandle,
        iv: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        key.expect_kind(KeyKind::Secret)?;
        if iv.len() != IV_LENGTH {
            return Err(ProviderError::Encryption(format!(
                "iv must be {IV_LENGTH} bytes, got {}",
                iv.len()
            )));
        }
        let cipher = Aes256Gcm16::new_from_slice(key.material())
            .map_err(|e| ProviderError::InvalidKey(e.to_string()))?;
        cipher
            .encrypt(Nonce::<U16>::from_slice(iv), bytes)
            .map_err(|e| ProviderError::Encryption(e.to_string()))
    }

    async fn symmetric_decrypt(
        &self,
        bytes: &[u8],
        key: &KeyHandle,
        iv: &[u8],
    ) -> Result<Vec<u8>, ProviderError> {
        key.expect_kind(KeyKind::Secret)?;
        if iv.len() != IV_LENGTH {
            return Err(ProviderError::Decryption(format!(
                "iv must be {IV_LENGTH} bytes, got {}",
                iv.len()
            )));
        }
        let cipher = Aes256Gcm16::new_from_slice(key.material())
            .map_err(|e| ProviderError::InvalidKey(e.to_string()))?;
        cipher
            .decrypt(Nonce::<U16>::from_slice(iv), bytes)
            .map_err(|e| ProviderError::Decryption(e.to_string()))
    }

    async fn sign(&self, bytes: &[u8], signing_key: &KeyHandle) -> Result<Vec<u8>, ProviderError> {
        let mut mac = hmac_for(signing_key)?;
        mac.update(bytes);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    async fn verify(
        &self,
        signature: &[u8],
        bytes: &[u8],
        signing_key: &KeyHandle,
    ) -> Result<bool, ProviderError> {
        let mut mac = hmac_for(signing_key)?;
        mac.update(bytes);
        Ok(mac.verify_slice(signature).is_ok())
    }

    fn random_bytes(&self, n: usize) -> Result<Vec<u8>, ProviderError> {
        let mut out = vec![0u8; n];
        rand::rng().fill_bytes(&mut out);
        Ok(out)
    }
}
