/// Maximum length for participant display names, in characters.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 16;
/// Length of the initialization vector used for payload encryption.
pub const IV_LENGTH: usize = 16;
/// Maximum attachment size announced in a payload: 1 MB.
pub const MAX_ATTACHMENT_SIZE_BYTES: u64 = 1_000_000;
/// Default upper bound on a serialized payload: 2 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;
/// Default number of recipient key wraps allowed in flight per envelope.
pub const DEFAULT_MAX_CONCURRENT_WRAPS: usize = 16;
