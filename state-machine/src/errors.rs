#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::types::{
	DepositNonce,
	Nonce,
	TransferId,
};
use thiserror::Error;

/// Structured rejection of a proposed update. Neither the validator nor the
/// transition panics on wire input; every failure maps to one of these.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ChannelError {
	#[error("Nonce did not advance sequentially. Expected: `{expected}`, got: `{got}`")]
	BadNonce { expected: Nonce, got: Nonce },
	#[error("Deposit nonce did not advance. Current: `{current}`, proposed: `{proposed}`")]
	BadDepositNonce { current: DepositNonce, proposed: DepositNonce },
	#[error("Participants mismatch: `{0}`")]
	BadParticipants(String),
	#[error("Signature invalid: `{0}`")]
	BadSignature(String),
	#[error("Balance conservation violated: `{0}`")]
	ConservationViolated(String),
	#[error("Locked balance mismatch: `{0}`")]
	LockedBalanceMismatch(String),
	#[error("Merkle root mismatch: `{0}`")]
	MerkleRootMismatch(String),
	#[error("Update is stale. Local nonce: `{local_nonce}`")]
	StaleUpdate { local_nonce: Nonce },
	#[error("Updates missing. Local nonce: `{local_nonce}`")]
	MissingUpdates { local_nonce: Nonce },
	#[error("Transfer was not accepted by its definition: `{0}`")]
	TransferNotAccepted(String),
	#[error("Transfer `{0}` is not active")]
	TransferNotActive(TransferId),
	#[error("Invalid update: `{0}`")]
	InvalidUpdate(String),
}

impl ChannelError {
	/// Stable reason tag carried on the wire when the update is rejected.
	pub fn reason(&self) -> &'static str {
		match self {
			ChannelError::BadNonce { .. } => "BadNonce",
			ChannelError::BadDepositNonce { .. } => "BadDepositNonce",
			ChannelError::BadParticipants(_) => "BadParticipants",
			ChannelError::BadSignature(_) => "BadSignature",
			ChannelError::ConservationViolated(_) => "ConservationViolated",
			ChannelError::LockedBalanceMismatch(_) => "LockedBalanceMismatch",
			ChannelError::MerkleRootMismatch(_) => "MerkleRootMismatch",
			ChannelError::StaleUpdate { .. } => "StaleUpdate",
			ChannelError::MissingUpdates { .. } => "MissingUpdates",
			ChannelError::TransferNotAccepted(_) => "TransferNotAccepted",
			ChannelError::TransferNotActive(_) => "TransferNotActive",
			ChannelError::InvalidUpdate(_) => "InvalidUpdate",
		}
	}
}
