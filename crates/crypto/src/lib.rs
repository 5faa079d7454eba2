//! huddle-crypto — end-to-end encryption core for group conversations.
//!
//! Seals each message under fresh per-message keys, wraps those keys for
//! every current roster member, and opens received envelopes only after the
//! ciphertext signature verifies. Cryptographic primitives are consumed
//! through the [`provider::PrimitiveProvider`] capability interface.

pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod payload;
pub mod provider;
pub mod roster;
pub mod session;
