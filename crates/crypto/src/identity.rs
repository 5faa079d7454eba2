//! The local participant's key pair and public profile.
//!
//! The private half is held as a provider key handle and is only ever
//! handed back to the provider for unwrapping. `Identity` is neither
//! `Clone` nor `Serialize`.

use std::fmt;
use std::sync::Arc;

use huddle_shared::api::roster::ParticipantDescriptor;
use huddle_shared::ids::ParticipantId;

use crate::error::CryptoError;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::provider::{KeyFormat, KeyHandle, KeyKind, PrimitiveProvider};
use crate::roster::{validate_display_name, Participant};

pub struct Identity {
    id: ParticipantId,
    display_name: String,
    public_key: KeyHandle,
    public_key_spki: Arc<[u8]>,
    private_key: KeyHandle,
}

impl Identity {
    /// Generate a fresh key pair and assign a new participant id.
    ///
    /// Fails with `InvalidDisplayName` before touching the provider if the
    /// name is unusable, and with `KeyGenerationFailed` if the provider cannot
    /// produce the pair or export its public half.
    pub async fn create<P>(
        provider: &P,
        display_name: &str,
        max_name_len: usize,
    ) -> Result<Self, CryptoError>
    where
        P: PrimitiveProvider + ?Sized,
    {
        let display_name = validate_display_name(display_name, max_name_len)?;

        let pair = provider
            .generate_key_pair()
            .await
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        if pair.public.kind() != KeyKind::Public || pair.private.kind() != KeyKind::Private {
            return Err(CryptoError::KeyGenerationFailed(
                "provider returned mislabeled key pair".into(),
            ));
        }

        let spki = provider
            .export_key(&pair.public, KeyFormat::Spki)
            .await
            .map_err(|e| CryptoError::KeyGenerationFailed(format!("public key export: {e}")))?;
        if spki.is_empty() {
            return Err(CryptoError::KeyGenerationFailed(
                "provider exported an empty public key".into(),
            ));
        }

        let id = ParticipantId::new();
        tracing::debug!(participant = %id, "identity created");

        Ok(Self {
            id,
            display_name,
            public_key: pair.public,
            public_key_spki: spki.as_slice().into(),
            private_key: pair.private,
        })
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn public_key(&self) -> &KeyHandle {
        &self.public_key
    }

    pub fn public_key_spki(&self) -> &[u8] {
        &self.public_key_spki
    }

    pub(crate) fn private_key(&self) -> &KeyHandle {
        &self.private_key
    }

    pub(crate) fn set_display_name(&mut self, name: String) -> String {
        std::mem::replace(&mut self.display_name, name)
    }

    /// This identity as a roster member.
    pub fn profile(&self) -> Participant {
        Participant::new(
            self.id,
            self.display_name.clone(),
            self.public_key.clone(),
            Arc::clone(&self.public_key_spki),
        )
    }

    /// What gets announced to the membership layer on join.
    pub fn descriptor(&self) -> ParticipantDescriptor {
        ParticipantDescriptor {
            id: self.id,
            username: self.display_name.clone(),
            public_key: self.public_key_spki.to_vec(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.public_key_spki)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}
