#![warn(clippy::missing_docs_in_private_items)]

use web3::{
	signing::{
		self,
		keccak256,
		RecoveryError,
	},
	types::Address,
};

use crate::{
	constants::SIGNATURE_LENGTH,
	packing::pack_channel_commitment,
	types::ChannelCommitment,
};

/// Digest of `data` under the signed-message prefix. Kept as the single
/// prefixing implementation so the signer and the verifier cannot drift.
pub fn signed_message_digest(data: &[u8]) -> [u8; 32] {
	let prefix = format!("\x19Ethereum Signed Message:\n{}", data.len());
	let mut preimage = prefix.into_bytes();
	preimage.extend_from_slice(data);
	keccak256(&preimage)
}

/// The digest both participants sign to attest to a commitment: the
/// prefixed hash of the canonical encoding. Signatures never enter the
/// preimage, and the adjudicator computes the same digest on-chain.
pub fn hash_commitment(commitment: &ChannelCommitment) -> [u8; 32] {
	let packed = pack_channel_commitment(commitment);
	signed_message_digest(&packed.0)
}

/// Recover the address that produced `signature` over `digest`. A
/// signature is 65 bytes, r then s then a recovery byte offset by 27.
pub fn recover_signer(digest: [u8; 32], signature: &[u8]) -> Result<Address, RecoveryError> {
	if signature.len() != SIGNATURE_LENGTH {
		return Err(RecoveryError::InvalidSignature)
	}
	let recovery_id = signature[SIGNATURE_LENGTH - 1] as i32 - 27;
	signing::recover(&digest, &signature[..SIGNATURE_LENGTH - 1], recovery_id)
}

/// Recover the signer of a commitment. Recovering to `participants[i]` is
/// the only criterion that makes a signature valid in slot `i`.
pub fn recover_commitment_signer(
	commitment: &ChannelCommitment,
	signature: &[u8],
) -> Result<Address, RecoveryError> {
	recover_signer(hash_commitment(commitment), signature)
}
