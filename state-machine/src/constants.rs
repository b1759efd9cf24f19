/// Smallest dispute window a channel may be set up with, in seconds.
pub const MIN_CHANNEL_TIMEOUT: u64 = 60;

/// Largest dispute window a channel may be set up with, in seconds.
pub const MAX_CHANNEL_TIMEOUT: u64 = 30 * 24 * 60 * 60;

/// Dispute window applied when the caller does not choose one.
pub const DEFAULT_CHANNEL_TIMEOUT: u64 = 24 * 60 * 60;
