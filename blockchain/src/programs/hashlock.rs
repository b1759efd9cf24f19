#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::types::{
	Balance,
	Bytes,
	TokenAmount,
	H256,
	U256,
};
use ethabi::{
	ParamType,
	Token,
};
use sha2::{
	Digest,
	Sha256,
};

use super::{
	ProgramError,
	TransferProgram,
};

/// The sha256 image a preimage must produce to release the lock. The
/// deployed contract applies the same relation during disputes.
pub fn compute_lock_hash(preimage: &H256) -> H256 {
	H256::from_slice(&Sha256::digest(preimage.as_bytes()))
}

/// The reference condition program: balance locked under the sha256 image
/// of a secret.
///
/// Initial state is ABI `(bytes32 lockHash, uint256 expiry)`, the resolver
/// is ABI `(bytes32 preImage)`. A zero preimage refunds the sender; the
/// correct preimage pays the full locked amount to the receiver.
pub struct HashlockProgram;

/// Decode the ABI `(bytes32, uint256)` initial state into the lock hash and
/// expiry. Expiry is enforced by the deployed contract during disputes; the
/// off-chain path only ever refunds or pays against the preimage.
fn decode_state(initial_state: &Bytes) -> Result<(H256, U256), ProgramError> {
	let tokens = ethabi::decode(
		&[ParamType::FixedBytes(32), ParamType::Uint(256)],
		&initial_state.0,
	)
	.map_err(|e| ProgramError::Decode(format!("Hashlock state: {}", e)))?;

	let lock_hash = match tokens.get(0) {
		Some(Token::FixedBytes(bytes)) if bytes.len() == 32 => H256::from_slice(bytes),
		_ => return Err(ProgramError::Decode("Expected a 32-byte lock hash".to_owned())),
	};
	let expiry = match tokens.get(1) {
		Some(Token::Uint(expiry)) => *expiry,
		_ => return Err(ProgramError::Decode("Expected an expiry".to_owned())),
	};

	Ok((lock_hash, expiry))
}

/// Decode the ABI `(bytes32)` resolver.
fn decode_resolver(resolver: &Bytes) -> Result<H256, ProgramError> {
	let tokens = ethabi::decode(&[ParamType::FixedBytes(32)], &resolver.0)
		.map_err(|e| ProgramError::Decode(format!("Hashlock resolver: {}", e)))?;

	match tokens.get(0) {
		Some(Token::FixedBytes(bytes)) if bytes.len() == 32 => Ok(H256::from_slice(bytes)),
		_ => Err(ProgramError::Decode("Expected a 32-byte preimage".to_owned())),
	}
}

impl TransferProgram for HashlockProgram {
	fn create(&self, initial_state: &Bytes, balance: &Balance) -> Result<bool, ProgramError> {
		let (lock_hash, _expiry) = decode_state(initial_state)?;

		if lock_hash.is_zero() {
			return Ok(false)
		}
		// The lock holds the full amount on the sender's side until resolved.
		if !balance.amount[1].is_zero() {
			return Ok(false)
		}
		if balance.amount[0].is_zero() {
			return Ok(false)
		}

		Ok(true)
	}

	fn resolve(
		&self,
		initial_state: &Bytes,
		resolver: &Bytes,
		balance: &Balance,
	) -> Result<Balance, ProgramError> {
		let (lock_hash, _expiry) = decode_state(initial_state)?;
		let preimage = decode_resolver(resolver)?;

		// An empty preimage is an explicit refund to the sender.
		if preimage.is_zero() {
			return Ok(balance.clone())
		}

		if compute_lock_hash(&preimage) != lock_hash {
			return Err(ProgramError::Rejected("Preimage does not match the lock".to_owned()))
		}

		Ok(Balance {
			to: balance.to,
			amount: [TokenAmount::zero(), balance.total()],
		})
	}
}

#[cfg(test)]
mod tests {
	use duplex_primitives::types::{
		Address,
		Balance,
		Bytes,
		TokenAmount,
		H256,
	};
	use ethabi::{
		encode,
		Token,
	};

	use super::*;

	fn lock_state(lock_hash: H256) -> Bytes {
		Bytes(encode(&[
			Token::FixedBytes(lock_hash.as_bytes().to_vec()),
			Token::Uint(0u64.into()),
		]))
	}

	fn resolver(preimage: H256) -> Bytes {
		Bytes(encode(&[Token::FixedBytes(preimage.as_bytes().to_vec())]))
	}

	fn locked_balance() -> Balance {
		Balance {
			to: [Address::from_low_u64_be(1), Address::from_low_u64_be(2)],
			amount: [TokenAmount::from(40u64), TokenAmount::zero()],
		}
	}

	#[test]
	fn test_create_accepts_well_formed_lock() {
		let preimage = H256::from_low_u64_be(42);
		let lock_hash = compute_lock_hash(&preimage);

		let accepted = HashlockProgram
			.create(&lock_state(lock_hash), &locked_balance())
			.expect("State should decode");
		assert!(accepted);
	}

	#[test]
	fn test_create_rejects_zero_lock_hash() {
		let accepted = HashlockProgram
			.create(&lock_state(H256::zero()), &locked_balance())
			.expect("State should decode");
		assert!(!accepted);
	}

	#[test]
	fn test_resolve_pays_receiver_on_correct_preimage() {
		let preimage = H256::from_low_u64_be(42);
		let lock_hash = compute_lock_hash(&preimage);

		let outcome = HashlockProgram
			.resolve(&lock_state(lock_hash), &resolver(preimage), &locked_balance())
			.expect("Correct preimage should resolve");
		assert_eq!(outcome.amount, [TokenAmount::zero(), TokenAmount::from(40u64)]);
	}

	#[test]
	fn test_resolve_refunds_sender_on_empty_preimage() {
		let preimage = H256::from_low_u64_be(42);
		let lock_hash = compute_lock_hash(&preimage);

		let outcome = HashlockProgram
			.resolve(&lock_state(lock_hash), &resolver(H256::zero()), &locked_balance())
			.expect("Refund should resolve");
		assert_eq!(outcome, locked_balance());
	}

	#[test]
	fn test_resolve_rejects_wrong_preimage() {
		let preimage = H256::from_low_u64_be(42);
		let lock_hash = compute_lock_hash(&preimage);

		let outcome = HashlockProgram.resolve(
			&lock_state(lock_hash),
			&resolver(H256::from_low_u64_be(43)),
			&locked_balance(),
		);
		assert!(matches!(outcome, Err(ProgramError::Rejected(_))));
	}
}
