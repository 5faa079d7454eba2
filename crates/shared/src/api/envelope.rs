use crate::ids::ParticipantId;
use serde::{Deserialize, Serialize};

/// One recipient's wrapped keys as carried on the wire.
///
/// Binary fields stay base64 text here and are decoded when the envelope is
/// opened, so a corrupt field fails only the message that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireKeyRecord {
    pub id: ParticipantId,
    pub secret_key: String,
    pub encrypted_signing_key: String,
}

/// A sealed message in transport form. All binary fields travel as
/// standard-alphabet base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEnvelope {
    pub ciphertext: String,
    pub vector: String,
    pub signature: String,
    pub secret_keys: Vec<WireKeyRecord>,
}

/// An envelope as relayed to members: the transport stamps the sender's id
/// (and optionally its current display name) next to the envelope fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub envelope: WireEnvelope,
}

/// What the transport hands over: a single message or a batch (legacy replay).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Delivery {
    Single(InboundMessage),
    Batch(Vec<InboundMessage>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> WireEnvelope {
        WireEnvelope {
            ciphertext: "AQID".into(),
            vector: "qqqqqqqqqqqqqqqqqqqqqg==".into(),
            signature: "CQkJCQ==".into(),
            secret_keys: vec![WireKeyRecord {
                id: ParticipantId::new(),
                secret_key: "BAU=".into(),
                encrypted_signing_key: "Bgc=".into(),
            }],
        }
    }

    #[test]
    fn wire_envelope_uses_transport_field_names() {
        let json = serde_json::to_value(sample_envelope()).unwrap();
        assert!(json.get("ciphertext").unwrap().is_string());
        assert!(json.get("vector").unwrap().is_string());
        assert!(json.get("signature").unwrap().is_string());
        let record = &json["secretKeys"][0];
        assert!(record.get("id").is_some());
        assert!(record.get("secretKey").unwrap().is_string());
        assert!(record.get("encryptedSigningKey").unwrap().is_string());
    }

    #[test]
    fn non_string_binary_field_is_rejected() {
        let json = r#"{"ciphertext":[1,2],"vector":"","signature":"","secretKeys":[]}"#;
        assert!(serde_json::from_str::<WireEnvelope>(json).is_err());
    }

    #[test]
    fn inbound_message_flattens_envelope_fields() {
        let msg = InboundMessage {
            id: ParticipantId::new(),
            username: Some("alice".into()),
            envelope: sample_envelope(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("ciphertext").is_some());
        assert!(json.get("envelope").is_none());
        let back: InboundMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn delivery_accepts_single_and_batch_shapes() {
        let msg = InboundMessage {
            id: ParticipantId::new(),
            username: None,
            envelope: sample_envelope(),
        };
        let single = serde_json::to_string(&msg).unwrap();
        assert!(matches!(
            serde_json::from_str::<Delivery>(&single).unwrap(),
            Delivery::Single(_)
        ));

        let batch = serde_json::to_string(&vec![msg.clone(), msg]).unwrap();
        match serde_json::from_str::<Delivery>(&batch).unwrap() {
            Delivery::Batch(items) => assert_eq!(items.len(), 2),
            other => panic!("expected Batch, got: {other:?}"),
        }
    }

    #[test]
    fn batch_with_corrupt_base64_item_still_parses() {
        let good = InboundMessage {
            id: ParticipantId::new(),
            username: None,
            envelope: sample_envelope(),
        };
        let mut bad = good.clone();
        bad.envelope.ciphertext = "%%%".into();

        let json = serde_json::to_string(&vec![good, bad]).unwrap();
        match serde_json::from_str::<Delivery>(&json).unwrap() {
            Delivery::Batch(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].envelope.ciphertext, "%%%");
            }
            other => panic!("expected Batch, got: {other:?}"),
        }
    }
}
