/// Application-facing error. A message that cannot be opened is reported as
/// `Undeliverable` regardless of which step failed.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error("not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("message could not be decrypted")]
    Undeliverable,

    #[error("crypto error: {0}")]
    Crypto(String),
}
