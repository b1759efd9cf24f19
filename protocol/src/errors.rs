use duplex_blockchain::errors::ChainError;
use duplex_messaging::{
	messages::MessageError,
	MessagingError,
};
use duplex_primitives::types::Address;
use duplex_state_machine::{
	errors::ChannelError,
	types::ChannelUpdate,
};
use duplex_storage::errors::StorageError;
use thiserror::Error;

/// The protocol driver error type.
///
/// Validation failures are fatal for the round; messaging and external
/// failures are retriable at the caller's discretion. Everything that
/// arrived over the wire is a recoverable rejection, never a panic.
#[derive(Error, Debug)]
pub enum ProtocolError {
	#[error(transparent)]
	Validation(#[from] ChannelError),
	#[error(transparent)]
	Messaging(#[from] MessagingError),
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error(transparent)]
	Storage(#[from] StorageError),
	#[error("Signer error: `{0}`")]
	Signer(String),
	#[error("Channel `{0:?}` is not known")]
	ChannelNotFound(Address),
	#[error("Counterparty rejected the update: `{}`", .error.reason)]
	Rejected {
		error: MessageError,
		latest_update: Option<ChannelUpdate>,
	},
	#[error("Resynchronization failed: `{0}`")]
	SyncFailed(String),
}

impl ProtocolError {
	/// Whether retrying the operation can reasonably succeed. Validation
	/// failures and counterparty rejections are final for this round.
	pub fn is_retriable(&self) -> bool {
		matches!(
			self,
			ProtocolError::Messaging(_) |
				ProtocolError::Chain(_) |
				ProtocolError::Storage(_) |
				ProtocolError::Signer(_)
		)
	}
}
