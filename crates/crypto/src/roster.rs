//! Conversation membership: who is present and which public key seals to them.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use huddle_shared::api::roster::ParticipantDescriptor;
use huddle_shared::ids::ParticipantId;

use crate::error::CryptoError;
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::provider::{KeyFormat, KeyHandle, KeyUsage, PrimitiveProvider};

/// A known member of the conversation.
#[derive(Debug, Clone)]
pub struct Participant {
    id: ParticipantId,
    display_name: String,
    public_key: KeyHandle,
    public_key_spki: Arc<[u8]>,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        display_name: impl Into<String>,
        public_key: KeyHandle,
        public_key_spki: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            public_key,
            public_key_spki: public_key_spki.into(),
        }
    }

    /// Import a participant announced by the membership layer.
    pub async fn from_descriptor<P>(
        provider: &P,
        descriptor: &ParticipantDescriptor,
    ) -> Result<Self, CryptoError>
    where
        P: PrimitiveProvider + ?Sized,
    {
        let public_key = provider
            .import_key(&descriptor.public_key, KeyFormat::Spki, KeyUsage::Wrap)
            .await
            .map_err(|e| CryptoError::InvalidParticipant {
                id: descriptor.id,
                detail: e.to_string(),
            })?;

        Ok(Self::new(
            descriptor.id,
            descriptor.username.clone(),
            public_key,
            descriptor.public_key.clone(),
        ))
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

    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.public_key_spki)
    }

    pub fn descriptor(&self) -> ParticipantDescriptor {
        ParticipantDescriptor {
            id: self.id,
            username: self.display_name.clone(),
            public_key: self.public_key_spki.to_vec(),
        }
    }

    /// Public key as the base64 string shown next to the fingerprint.
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.public_key_spki)
    }
}

/// Trim and length-check a display name.
pub fn validate_display_name(name: &str, max_len: usize) -> Result<String, CryptoError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CryptoError::InvalidDisplayName("name is empty".into()));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(CryptoError::InvalidDisplayName(format!(
            "name is {len} characters, limit is {max_len}"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(CryptoError::InvalidDisplayName(
            "name contains control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Ordered membership list for one conversation.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    members: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant. Returns `false` (and changes nothing) if the id is
    /// already present.
    pub fn join(&mut self, participant: Participant) -> bool {
        if self.contains(participant.id) {
            tracing::debug!(participant = %participant.id, "join ignored, already present");
            return false;
        }
        tracing::debug!(participant = %participant.id, "participant joined");
        self.members.push(participant);
        true
    }

    /// Remove a participant; absent ids are a no-op.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        let index = self.members.iter().position(|p| p.id == id)?;
        tracing::debug!(participant = %id, "participant left");
        Some(self.members.remove(index))
    }

    /// Change the display name of `id`, returning the previous name.
    ///
    /// No uniqueness or length rule is applied here; callers that accept
    /// names from users check them first.
    pub fn rename(
        &mut self,
        id: ParticipantId,
        new_name: impl Into<String>,
    ) -> Result<String, CryptoError> {
        let participant = self
            .members
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CryptoError::NotFound { id })?;
        let previous = std::mem::replace(&mut participant.display_name, new_name.into());
        tracing::debug!(participant = %id, "participant renamed");
        Ok(previous)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.members.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.get(id).is_some()
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&Participant> {
        let wanted = name.trim().to_lowercase();
        self.members
            .iter()
            .find(|p| p.display_name.to_lowercase() == wanted)
    }

    /// Fail if `name` is held by someone other than `claimant`. A participant
    /// re-casing its own name is allowed.
    pub fn ensure_name_available(
        &self,
        name: &str,
        claimant: ParticipantId,
    ) -> Result<(), CryptoError> {
        match self.find_by_name(name) {
            Some(holder) if holder.id != claimant => Err(CryptoError::NameTaken {
                name: name.trim().to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Freeze the current membership. Later joins, leaves and renames do not
    /// affect a snapshot already taken.
    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            members: self.members.clone().into(),
        }
    }
}

/// Immutable view of a roster at one point in time.
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    members: Arc<[Participant]>,
}

impl Default for RosterSnapshot {
    fn default() -> Self {
        Self {
            members: Arc::from(Vec::new()),
        }
    }
}

impl RosterSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.members.iter()
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.members.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Everyone except `self_id`.
    pub fn others(&self, self_id: ParticipantId) -> Vec<Participant> {
        self.members
            .iter()
            .filter(|p| p.id != self_id)
            .cloned()
            .collect()
    }
}

/// Repeated ids keep their first occurrence.
impl FromIterator<Participant> for RosterSnapshot {
    fn from_iter<I: IntoIterator<Item = Participant>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        Self {
            members: iter.into_iter().filter(|p| seen.insert(p.id)).collect(),
        }
    }
}
