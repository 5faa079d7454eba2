//! Envelope protocol: sealing a payload for every roster member and opening
//! envelopes addressed to the local identity.
//!
//! Sealing generates one symmetric key, one signing key and one IV per
//! message, encrypts the serialized payload, signs the ciphertext, then
//! wraps both keys for each recipient. The wraps run as a bounded set of
//! concurrent futures joined with an all-of barrier: a single failed wrap
//! fails the whole seal and no envelope is produced.
//!
//! Opening is strictly sequential. Plaintext is only parsed and returned
//! after the signature over the ciphertext verifies.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use huddle_shared::api::envelope::{Delivery, InboundMessage};
use huddle_shared::constants::IV_LENGTH;
use huddle_shared::ids::ParticipantId;
use zeroize::Zeroizing;

use crate::config::EngineConfig;
use crate::envelope::{Envelope, WrappedKeyRecord};
use crate::error::CryptoError;
use crate::identity::Identity;
use crate::payload::Payload;
use crate::provider::{KeyFormat, KeyUsage, PrimitiveProvider, ProviderError};
use crate::roster::{Participant, RosterSnapshot};

/// A verified, parsed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Sender id as declared by the transport.
    pub sender: ParticipantId,
    /// Display name the transport attached, if any. Informational only.
    pub sender_name: Option<String>,
    pub payload: Payload,
}

fn seal_failed(step: &'static str) -> impl Fn(ProviderError) -> CryptoError {
    move |e| CryptoError::EnvelopeSealFailed(format!("{step}: {e}"))
}

fn open_failed(step: &'static str) -> impl Fn(ProviderError) -> CryptoError {
    move |e| CryptoError::DecryptionFailed(format!("{step}: {e}"))
}

pub struct CryptoEngine<P: ?Sized> {
    provider: Arc<P>,
    config: EngineConfig,
}

impl<P> CryptoEngine<P>
where
    P: PrimitiveProvider + ?Sized,
{
    pub fn new(provider: Arc<P>, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Seal `payload` for every participant in `roster` other than the
    /// sender. With nobody else present, a single record addressed to the
    /// sender is produced instead.
    ///
    /// The roster snapshot is owned by the returned future, so membership
    /// changes made after this call only affect later seals.
    pub async fn encode(
        &self,
        payload: &Payload,
        identity: &Identity,
        roster: RosterSnapshot,
    ) -> Result<Envelope, CryptoError> {
        let plaintext = Zeroizing::new(payload.encode()?);
        if plaintext.len() > self.config.max_payload_bytes {
            return Err(CryptoError::MalformedPayload(format!(
                "payload is {} bytes, limit is {}",
                plaintext.len(),
                self.config.max_payload_bytes
            )));
        }

        let mut recipients = roster.others(identity.id());
        if recipients.is_empty() {
            recipients.push(identity.profile());
        }

        let secret_key = self
            .provider
            .generate_symmetric_key()
            .await
            .map_err(seal_failed("generate secret key"))?;
        let signing_key = self
            .provider
            .generate_signing_key()
            .await
            .map_err(seal_failed("generate signing key"))?;

        let iv: [u8; IV_LENGTH] = self
            .provider
            .random_bytes(IV_LENGTH)
            .map_err(seal_failed("generate iv"))?
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::EnvelopeSealFailed("provider returned short iv".into()))?;

        let ciphertext = self
            .provider
            .symmetric_encrypt(&plaintext, &secret_key, &iv)
            .await
            .map_err(seal_failed("encrypt payload"))?;
        let signature = self
            .provider
            .sign(&ciphertext, &signing_key)
            .await
            .map_err(seal_failed("sign ciphertext"))?;

        let exported_secret = self
            .provider
            .export_key(&secret_key, KeyFormat::Raw)
            .await
            .map_err(seal_failed("export secret key"))?;
        let exported_signing = self
            .provider
            .export_key(&signing_key, KeyFormat::Raw)
            .await
            .map_err(seal_failed("export signing key"))?;

        let recipient_count = recipients.len();
        let records: Vec<WrappedKeyRecord> = stream::iter(recipients)
            .map(|recipient| self.wrap_for(recipient, &exported_secret, &exported_signing))
            .buffered(self.config.max_concurrent_wraps.max(1))
            .try_collect()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "envelope seal aborted"))?;

        tracing::debug!(
            sender = %identity.id(),
            recipients = recipient_count,
            ciphertext_len = ciphertext.len(),
            "envelope sealed"
        );

        Ok(Envelope {
            ciphertext,
            iv,
            signature,
            records,
        })
    }

    async fn wrap_for(
        &self,
        recipient: Participant,
        secret_key: &[u8],
        signing_key: &[u8],
    ) -> Result<WrappedKeyRecord, CryptoError> {
        let wrap_failed = |e: ProviderError| {
            CryptoError::EnvelopeSealFailed(format!("wrap for {}: {e}", recipient.id()))
        };

        let (wrapped_secret, wrapped_signing) = futures::try_join!(
            self.provider
                .asymmetric_wrap(secret_key, recipient.public_key()),
            self.provider
                .asymmetric_wrap(signing_key, recipient.public_key()),
        )
        .map_err(wrap_failed)?;

        Ok(WrappedKeyRecord {
            recipient: recipient.id(),
            secret_key: wrapped_secret,
            signing_key: wrapped_signing,
        })
    }

    /// Open an envelope addressed to `identity`.
    ///
    /// A signature that does not verify always yields
    /// `SignatureVerificationFailed`, even if decryption already failed, so a
    /// tampered ciphertext is reported the same way as a tampered signature.
    pub async fn decode(
        &self,
        envelope: &Envelope,
        identity: &Identity,
        sender: ParticipantId,
    ) -> Result<DecodedMessage, CryptoError> {
        let record = envelope
            .record_for(identity.id())
            .ok_or(CryptoError::NoMatchingRecipientRecord { id: identity.id() })?;

        let secret_raw = self
            .provider
            .asymmetric_unwrap(&record.secret_key, identity.private_key())
            .await
            .map_err(open_failed("unwrap secret key"))?;
        let secret_key = self
            .provider
            .import_key(&secret_raw, KeyFormat::Raw, KeyUsage::Encrypt)
            .await
            .map_err(open_failed("import secret key"))?;

        // Held until the signature has been checked.
        let decrypted = self
            .provider
            .symmetric_decrypt(&envelope.ciphertext, &secret_key, &envelope.iv)
            .await
            .map(Zeroizing::new);

        let signing_raw = self
            .provider
            .asymmetric_unwrap(&record.signing_key, identity.private_key())
            .await
            .map_err(open_failed("unwrap signing key"))?;
        let signing_key = self
            .provider
            .import_key(&signing_raw, KeyFormat::Raw, KeyUsage::Sign)
            .await
            .map_err(open_failed("import signing key"))?;

        match self
            .provider
            .verify(&envelope.signature, &envelope.ciphertext, &signing_key)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(sender = %sender, "signature mismatch, message dropped");
                return Err(CryptoError::SignatureVerificationFailed);
            }
            Err(e) => {
                tracing::warn!(sender = %sender, error = %e, "signature check errored, message dropped");
                return Err(CryptoError::SignatureVerificationFailed);
            }
        }

        let plaintext = decrypted.map_err(open_failed("decrypt payload"))?;
        let payload = Payload::decode(&plaintext)?;

        tracing::debug!(sender = %sender, "envelope opened");
        Ok(DecodedMessage {
            sender,
            sender_name: None,
            payload,
        })
    }

    /// Validate a relayed message and open it.
    pub async fn decode_inbound(
        &self,
        message: &InboundMessage,
        identity: &Identity,
    ) -> Result<DecodedMessage, CryptoError> {
        let envelope = Envelope::from_wire(message.envelope.clone())?;
        let mut decoded = self.decode(&envelope, identity, message.id).await?;
        decoded.sender_name = message.username.clone();
        Ok(decoded)
    }

    /// Open each message independently; one failure does not affect the
    /// others. Results are in input order.
    pub async fn decode_batch(
        &self,
        messages: &[InboundMessage],
        identity: &Identity,
    ) -> Vec<Result<DecodedMessage, CryptoError>> {
        let results = futures::future::join_all(
            messages
                .iter()
                .map(|message| self.decode_inbound(message, identity)),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::debug!(total = results.len(), failed, "batch opened with failures");
        }
        results
    }

    pub async fn decode_delivery(
        &self,
        delivery: &Delivery,
        identity: &Identity,
    ) -> Vec<Result<DecodedMessage, CryptoError>> {
        match delivery {
            Delivery::Single(message) => vec![self.decode_inbound(message, identity).await],
            Delivery::Batch(messages) => self.decode_batch(messages, identity).await,
        }
    }
}
