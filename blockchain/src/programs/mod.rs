#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::types::{
	Balance,
	Bytes,
};
use ethabi::{
	encode,
	Token,
};
use thiserror::Error;

/// Program executor.
mod executor;
/// Hashlock reference program.
mod hashlock;

pub use executor::*;
pub use hashlock::*;

/// Failure of a condition program run.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ProgramError {
	#[error("Could not decode program arguments: `{0}`")]
	Decode(String),
	#[error("Program rejected the input: `{0}`")]
	Rejected(String),
}

/// Semantics of one transfer definition, executed off-chain.
///
/// Implementations must be pure: no I/O, no clocks, equal inputs produce
/// equal outputs. A registry entry and the deployed contract must agree
/// byte-for-byte on every well-formed input.
pub trait TransferProgram: Send + Sync {
	/// Decide whether the proposed lock is acceptable.
	fn create(&self, initial_state: &Bytes, balance: &Balance) -> Result<bool, ProgramError>;

	/// Rule on the final payout split for the locked amount.
	fn resolve(
		&self,
		initial_state: &Bytes,
		resolver: &Bytes,
		balance: &Balance,
	) -> Result<Balance, ProgramError>;
}

/// ABI encoding of a balance as it crosses the program boundary:
/// `(address, address, uint256, uint256)`. The chain-side `resolve` call
/// returns the same shape, decoded by the contract layer.
pub fn encode_balance(balance: &Balance) -> Bytes {
	Bytes(encode(&[
		Token::Address(balance.to[0]),
		Token::Address(balance.to[1]),
		Token::Uint(balance.amount[0]),
		Token::Uint(balance.amount[1]),
	]))
}
