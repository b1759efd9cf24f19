//! Persistence of channels, transfers and the append-only commitment log.

/// Storage errors.
pub mod errors;
/// Database schema.
pub mod sqlite;
/// Channel state storage.
pub mod state;

pub use state::{
	ChannelStorage,
	CommitmentRecord,
	SqliteStorage,
};
