use duplex_primitives::types::Address;
use thiserror::Error;

use crate::programs::ProgramError;

/// The chain collaborator error type.
#[derive(Error, Debug)]
pub enum ChainError {
	#[error(transparent)]
	Web3(#[from] web3::Error),
	#[error(transparent)]
	Contract(#[from] web3::contract::Error),
	#[error("Contract ABI invalid: `{0}`")]
	Abi(#[from] ethabi::Error),
	#[error("No contract is deployed at `{0:?}`")]
	Undeployed(Address),
	#[error(transparent)]
	Program(#[from] ProgramError),
	#[error("Chain error: `{0}`")]
	Other(String),
}
