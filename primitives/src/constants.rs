#![warn(clippy::missing_docs_in_private_items)]

use lazy_static::lazy_static;
use web3::signing::keccak256;

use crate::types::MerkleRoot;

/// Nonce of the state a setup update produces.
pub const CHANNEL_FIRST_NONCE: u64 = 1;

/// Length in bytes of a packed recoverable signature.
pub const SIGNATURE_LENGTH: usize = 65;

lazy_static! {
	pub static ref MERKLE_ROOT_OF_NO_TRANSFERS: MerkleRoot =
		MerkleRoot::from_slice(&keccak256(&[]));
}
