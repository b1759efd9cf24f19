use std::time::Duration;

/// How long the initiator waits for the counterparty's reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(30);

/// Additional send attempts after the first, each with a fresh inbox.
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Capacity of the channel event feed.
pub const EVENT_CHANNEL_SIZE: usize = 256;
