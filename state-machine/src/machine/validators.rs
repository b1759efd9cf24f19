#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::{
	signing::{
		hash_commitment,
		recover_signer,
	},
	types::{
		Address,
		Signature,
	},
};
use itertools::izip;

use crate::{
	errors::ChannelError,
	machine::apply_update,
	types::{
		ChannelUpdate,
		FullChannelState,
		FullTransferState,
		UpdateDetails,
	},
};

/// Validates a signature over a commitment digest against the expected
/// signer.
pub(crate) fn is_valid_signature(
	digest: [u8; 32],
	signature: &Signature,
	sender_address: Address,
) -> Result<(), ChannelError> {
	let signer_address = recover_signer(digest, &signature.0)
		.map_err(|e| ChannelError::BadSignature(format!("Error recovering signature {:?}", e)))?;

	if signer_address == sender_address {
		return Ok(())
	}

	Err(ChannelError::BadSignature(
		"Signature was valid but the expected address does not match".to_owned(),
	))
}

/// Verify the signatures of `update` against the commitment of `state`,
/// without recomputing the transition. Used when adopting a counterparty's
/// dual-signed state during resynchronization: the signatures themselves
/// are the proof of agreement.
pub fn validate_commitment_signatures(
	state: &FullChannelState,
	update: &ChannelUpdate,
	required_signatures: usize,
) -> Result<(), ChannelError> {
	if update.signature_count() < required_signatures {
		return Err(ChannelError::BadSignature(format!(
			"Expected at least {} signatures, got {}",
			required_signatures,
			update.signature_count()
		)))
	}

	let digest = hash_commitment(&state.commitment());
	for (index, signature) in update.signatures.iter().enumerate() {
		if let Some(signature) = signature {
			is_valid_signature(digest, signature, state.core.participants[index])?;
		}
	}

	Ok(())
}

/// Decide whether `proposed_update` legally takes `previous_state` to
/// `proposed_new_state`.
///
/// Checks run in a fixed order and stop at the first failure: kind-specific
/// preconditions (by recomputing the transition), nonce, participant set and
/// channel address, conservation and locked-balance invariants, merkle root,
/// signature count, then signature validity against the commitment of the
/// proposed state. `required_signatures` is 1 while an update is in flight
/// half-signed and 2 once the round completes; 0 skips the count check for
/// structural validation of a locally built update.
pub fn validate_update(
	previous_state: Option<&FullChannelState>,
	proposed_update: &ChannelUpdate,
	proposed_new_state: &FullChannelState,
	active_transfers: &[FullTransferState],
	required_signatures: usize,
) -> Result<(), ChannelError> {
	let expected = apply_update(previous_state, proposed_update, active_transfers)?;
	let expected_core = &expected.new_state.core;
	let proposed_core = &proposed_new_state.core;

	if proposed_update.nonce != proposed_core.nonce || proposed_core.nonce != expected_core.nonce
	{
		return Err(ChannelError::BadNonce {
			expected: expected_core.nonce,
			got: proposed_core.nonce,
		})
	}

	if proposed_core.participants != expected_core.participants ||
		proposed_core.channel_address != expected_core.channel_address
	{
		return Err(ChannelError::BadParticipants(
			"Participant set or channel address changed across the transition".to_owned(),
		))
	}
	if proposed_new_state.public_identifiers != expected.new_state.public_identifiers {
		return Err(ChannelError::BadParticipants(
			"Public identifiers changed across the transition".to_owned(),
		))
	}

	if proposed_core.latest_deposit_nonce != expected_core.latest_deposit_nonce {
		return Err(ChannelError::BadDepositNonce {
			current: expected_core.latest_deposit_nonce,
			proposed: proposed_core.latest_deposit_nonce,
		})
	}

	if proposed_core.asset_ids != expected_core.asset_ids ||
		proposed_core.balances.len() != expected_core.balances.len()
	{
		return Err(ChannelError::ConservationViolated(
			"Asset list diverges from the computed transition".to_owned(),
		))
	}
	for (asset_id, proposed_balance, expected_balance) in izip!(
		&proposed_core.asset_ids,
		&proposed_core.balances,
		&expected_core.balances
	) {
		if proposed_balance != expected_balance {
			return Err(ChannelError::ConservationViolated(format!(
				"Balance for asset {} diverges from the computed transition",
				asset_id
			)))
		}
	}
	if proposed_core.locked_balance != expected_core.locked_balance {
		return Err(ChannelError::LockedBalanceMismatch(
			"Locked balance diverges from the computed transition".to_owned(),
		))
	}

	if proposed_core.merkle_root != expected_core.merkle_root {
		return Err(ChannelError::MerkleRootMismatch(format!(
			"Expected {}, got {}",
			expected_core.merkle_root, proposed_core.merkle_root
		)))
	}

	// Non-setup updates must also carry the post-update balance entry they
	// claim to produce.
	if !matches!(proposed_update.details, UpdateDetails::Setup(_)) {
		let update_balance_matches = expected_core
			.asset_ids
			.iter()
			.position(|a| *a == proposed_update.asset_id)
			.map(|index| expected_core.balances[index] == proposed_update.balance)
			.unwrap_or(false);
		if !update_balance_matches {
			return Err(ChannelError::ConservationViolated(
				"Update balance does not match the produced state".to_owned(),
			))
		}
	}

	if proposed_update.signature_count() < required_signatures {
		return Err(ChannelError::BadSignature(format!(
			"Expected at least {} signatures, got {}",
			required_signatures,
			proposed_update.signature_count()
		)))
	}

	let digest = hash_commitment(&proposed_new_state.commitment());
	for (index, signature) in proposed_update.signatures.iter().enumerate() {
		if let Some(signature) = signature {
			is_valid_signature(digest, signature, proposed_core.participants[index])?;
		}
	}

	Ok(())
}
