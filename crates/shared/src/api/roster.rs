use crate::api::base64_serde;
use crate::ids::ParticipantId;
use serde::{Deserialize, Serialize};

/// Public profile of a participant as announced by the membership layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDescriptor {
    pub id: ParticipantId,
    pub username: String,
    /// X25519 public key in SPKI form.
    #[serde(with = "base64_serde")]
    pub public_key: Vec<u8>,
}

/// Membership changes delivered by the session-membership layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RosterEvent {
    Join {
        participant: ParticipantDescriptor,
    },
    Leave {
        id: ParticipantId,
    },
    Rename {
        id: ParticipantId,
        username: String,
    },
}
