use duplex_primitives::{
	constants::MERKLE_ROOT_OF_NO_TRANSFERS,
	packing::derive_channel_address,
	signing::recover_commitment_signer,
	types::{
		Address,
		DepositNonce,
		Nonce,
	},
};

use crate::{
	errors::ChannelError,
	machine::{
		apply_update,
		validators::validate_update,
	},
	tests::factories::{
		accept_update,
		network_context,
		setup_channel,
		setup_update,
		sign_state,
		Keyring,
	},
};

#[test]
fn test_setup_produces_empty_channel() {
	let (update, result) = accept_update(None, setup_update(86_400), &[]);
	let state = result.new_state;

	assert_eq!(state.core.nonce, Nonce::from(1u64));
	assert_eq!(state.core.latest_deposit_nonce, DepositNonce::zero());
	assert!(state.core.balances.is_empty());
	assert!(state.core.asset_ids.is_empty());
	assert_eq!(state.core.merkle_root, *MERKLE_ROOT_OF_NO_TRANSFERS);
	assert_eq!(
		state.core.participants,
		[Keyring::Alice.address(), Keyring::Bob.address()]
	);
	assert!(result.transfer_change.is_none());

	validate_update(None, &update, &state, &[], 2).expect("Both signatures should recover");
}

#[test]
fn test_setup_rejects_existing_channel() {
	let state = setup_channel(86_400);

	let result = apply_update(Some(&state), &setup_update(86_400), &[]);
	assert!(matches!(result, Err(ChannelError::InvalidUpdate(_))));
}

#[test]
fn test_setup_rejects_wrong_channel_address() {
	let mut update = setup_update(86_400);
	update.channel_address = Address::from_low_u64_be(0xBAD);

	let result = apply_update(None, &update, &[]);
	assert!(matches!(result, Err(ChannelError::BadParticipants(_))));
}

#[test]
fn test_setup_rejects_out_of_bounds_timeout() {
	let result = apply_update(None, &setup_update(1), &[]);
	assert!(matches!(result, Err(ChannelError::InvalidUpdate(_))));
}

#[test]
fn test_setup_rejects_wrong_first_nonce() {
	let mut update = setup_update(86_400);
	update.nonce = Nonce::from(2u64);

	let result = apply_update(None, &update, &[]);
	assert!(matches!(result, Err(ChannelError::BadNonce { .. })));
}

#[test]
fn test_setup_rejects_identical_participants() {
	let mut update = setup_update(86_400);
	update.to_identifier = update.from_identifier.clone();

	let result = apply_update(None, &update, &[]);
	assert!(matches!(result, Err(ChannelError::BadParticipants(_))));
}

#[test]
fn test_commitment_signature_round_trip() {
	let state = setup_channel(86_400);

	for (keyring, participant) in
		[(Keyring::Alice, state.core.participants[0]), (Keyring::Bob, state.core.participants[1])]
	{
		let signature = sign_state(&state, &keyring);
		let signer = recover_commitment_signer(&state.commitment(), &signature.0)
			.expect("Signature should recover");
		assert_eq!(signer, participant);
	}
}

#[test]
fn test_channel_address_is_deterministic() {
	let participants = [Keyring::Alice.address(), Keyring::Bob.address()];
	let first = derive_channel_address(&participants, &network_context());
	let second = derive_channel_address(&participants, &network_context());
	assert_eq!(first, second);

	let swapped = derive_channel_address(
		&[participants[1], participants[0]],
		&network_context(),
	);
	assert_ne!(first, swapped);
}
