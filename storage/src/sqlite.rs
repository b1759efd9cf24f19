//! Schema of the channel database.

pub const DB_CREATE_CHANNELS: &str = "
CREATE TABLE IF NOT EXISTS channels (
    channel_address TEXT PRIMARY KEY,
    data TEXT NOT NULL
);
";

pub const DB_CREATE_COMMITMENTS: &str = "
CREATE TABLE IF NOT EXISTS commitments (
    identifier TEXT PRIMARY KEY,
    channel_address TEXT NOT NULL,
    nonce INTEGER NOT NULL,
    data TEXT NOT NULL,
    update_data TEXT NOT NULL,
    UNIQUE(channel_address, nonce)
);
";

pub const DB_CREATE_TRANSFERS: &str = "
CREATE TABLE IF NOT EXISTS transfers (
    transfer_id TEXT PRIMARY KEY,
    channel_address TEXT NOT NULL,
    data TEXT NOT NULL
);
";
