use thiserror::Error;

/// The storage error type.
#[derive(Error, Debug)]
pub enum StorageError {
	#[error("Storage lock poisoned")]
	CannotLock,
	#[error("Cannot serialize for storage: `{0}`")]
	Serialization(#[from] serde_json::Error),
	#[error("SQL error: `{0}`")]
	Sql(#[from] rusqlite::Error),
	#[error("Commitment log does not replay to the stored state: `{0}`")]
	Corrupted(String),
	#[error("Error: `{0}`")]
	Other(&'static str),
}
