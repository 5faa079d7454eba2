//! Conversation session: the explicit owner of "who am I" and "who is here".
//!
//! A session holds the engine, the local identity (created at most once) and
//! the roster. Membership events from the transport are applied here; every
//! seal takes a fresh roster snapshot.

use std::sync::Arc;

use huddle_shared::api::envelope::{Delivery, InboundMessage};
use huddle_shared::api::roster::RosterEvent;
use huddle_shared::ids::ParticipantId;

use crate::config::EngineConfig;
use crate::engine::{CryptoEngine, DecodedMessage};
use crate::envelope::Envelope;
use crate::error::CryptoError;
use crate::identity::Identity;
use crate::payload::Payload;
use crate::provider::PrimitiveProvider;
use crate::roster::{validate_display_name, Participant, Roster};

/// Outcome of applying a membership event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Joined(ParticipantId),
    /// Join for an id already on the roster; nothing changed.
    AlreadyPresent(ParticipantId),
    Left(ParticipantId),
    /// Leave for an id not on the roster; nothing changed.
    NotPresent(ParticipantId),
    Renamed {
        id: ParticipantId,
        previous: String,
    },
}

pub struct Session<P: ?Sized> {
    engine: CryptoEngine<P>,
    identity: Option<Identity>,
    roster: Roster,
}

impl<P> Session<P>
where
    P: PrimitiveProvider + ?Sized,
{
    pub fn new(provider: Arc<P>, config: EngineConfig) -> Self {
        Self {
            engine: CryptoEngine::new(provider, config),
            identity: None,
            roster: Roster::new(),
        }
    }

    pub fn engine(&self) -> &CryptoEngine<P> {
        &self.engine
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The local identity, once created.
    pub fn identity(&self) -> Result<&Identity, CryptoError> {
        self.identity
            .as_ref()
            .ok_or(CryptoError::IdentityNotInitialized)
    }

    /// Create the local identity and put it on the roster.
    ///
    /// Only one identity may exist per session; a second call fails with
    /// `IdentityAlreadyExists` and leaves the first one in place.
    pub async fn create_identity(&mut self, display_name: &str) -> Result<&Identity, CryptoError> {
        if self.identity.is_some() {
            return Err(CryptoError::IdentityAlreadyExists);
        }

        let max_len = self.engine.config().max_display_name_length;
        let identity =
            Identity::create(self.engine.provider().as_ref(), display_name, max_len).await?;
        self.roster.ensure_name_available(identity.display_name(), identity.id())?;
        self.roster.join(identity.profile());

        Ok(self.identity.insert(identity))
    }

    /// Apply a membership event delivered by the transport.
    pub async fn apply(&mut self, event: RosterEvent) -> Result<RosterChange, CryptoError> {
        match event {
            RosterEvent::Join { participant } => {
                if self.roster.contains(participant.id) {
                    return Ok(RosterChange::AlreadyPresent(participant.id));
                }
                let participant =
                    Participant::from_descriptor(self.engine.provider().as_ref(), &participant)
                        .await?;
                let id = participant.id();
                self.roster.join(participant);
                Ok(RosterChange::Joined(id))
            }
            RosterEvent::Leave { id } => Ok(match self.roster.leave(id) {
                Some(_) => RosterChange::Left(id),
                None => RosterChange::NotPresent(id),
            }),
            RosterEvent::Rename { id, username } => {
                let previous = self.roster.rename(id, username.clone())?;
                if let Some(identity) = self.identity.as_mut().filter(|i| i.id() == id) {
                    identity.set_display_name(username);
                }
                Ok(RosterChange::Renamed { id, previous })
            }
        }
    }

    /// Change the local display name, returning the previous one.
    ///
    /// The name is validated and must not be held by another participant;
    /// re-casing one's own name is allowed.
    pub fn rename_self(&mut self, new_name: &str) -> Result<String, CryptoError> {
        let max_len = self.engine.config().max_display_name_length;
        let name = validate_display_name(new_name, max_len)?;

        let identity = self
            .identity
            .as_mut()
            .ok_or(CryptoError::IdentityNotInitialized)?;
        self.roster.ensure_name_available(&name, identity.id())?;

        // Self may be missing from the roster if a leave for our own id was
        // relayed; put it back.
        if !self.roster.contains(identity.id()) {
            self.roster.join(identity.profile());
        }
        self.roster.rename(identity.id(), name.clone())?;
        Ok(identity.set_display_name(name))
    }

    /// Seal a payload for everyone currently on the roster.
    pub async fn seal(&self, payload: &Payload) -> Result<Envelope, CryptoError> {
        let identity = self.identity()?;
        self.engine
            .encode(payload, identity, self.roster.snapshot())
            .await
    }

    /// Open a relayed message addressed to the local identity.
    pub async fn open(&self, message: &InboundMessage) -> Result<DecodedMessage, CryptoError> {
        let identity = self.identity()?;
        let mut decoded = self.engine.decode_inbound(message, identity).await?;
        if decoded.sender_name.is_none() {
            decoded.sender_name = self
                .roster
                .get(decoded.sender)
                .map(|p| p.display_name().to_string());
        }
        Ok(decoded)
    }

    /// Open a single message or a batch; each entry succeeds or fails on its own.
    pub async fn open_delivery(
        &self,
        delivery: &Delivery,
    ) -> Result<Vec<Result<DecodedMessage, CryptoError>>, CryptoError> {
        let identity = self.identity()?;
        Ok(self.engine.decode_delivery(delivery, identity).await)
    }

    /// End the session: forget everyone and drop the identity's keys.
    pub fn teardown(&mut self) {
        tracing::debug!(members = self.roster.len(), "session torn down");
        self.roster.clear();
        self.identity = None;
    }
}
