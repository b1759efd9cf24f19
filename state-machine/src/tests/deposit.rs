use duplex_primitives::types::{
	AssetId,
	DepositNonce,
	Nonce,
	TokenAmount,
};

use crate::{
	errors::ChannelError,
	machine::{
		apply_update,
		validators::validate_update,
	},
	tests::factories::{
		accept_update,
		deposit_update,
		setup_channel,
		sign_state,
		Keyring,
	},
};

#[test]
fn test_deposit_absorbs_onchain_balance() {
	let state = setup_channel(86_400);
	let asset_id = AssetId::zero();

	let (update, result) =
		accept_update(Some(&state), deposit_update(&state, asset_id, [100, 0], 1), &[]);
	let new_state = result.new_state;

	assert_eq!(new_state.core.nonce, Nonce::from(2u64));
	assert_eq!(new_state.core.latest_deposit_nonce, DepositNonce::from(1u64));
	assert_eq!(new_state.core.asset_ids, vec![asset_id]);
	assert_eq!(
		new_state.core.balances[0].amount,
		[TokenAmount::from(100u64), TokenAmount::zero()]
	);
	assert_eq!(new_state.core.merkle_root, state.core.merkle_root);

	validate_update(Some(&state), &update, &new_state, &[], 2)
		.expect("Fully signed deposit should validate");
}

#[test]
fn test_deposit_rejects_stale_deposit_nonce() {
	let state = setup_channel(86_400);
	let asset_id = AssetId::zero();
	let (_, result) =
		accept_update(Some(&state), deposit_update(&state, asset_id, [100, 0], 1), &[]);
	let funded = result.new_state;

	// Same on-chain deposit nonce again: nothing new to absorb.
	let update = deposit_update(&funded, asset_id, [200, 0], 1);
	let result = apply_update(Some(&funded), &update, &[]);
	assert!(matches!(result, Err(ChannelError::BadDepositNonce { .. })));
}

#[test]
fn test_deposit_rejects_skipped_nonce() {
	let state = setup_channel(86_400);
	let mut update = deposit_update(&state, AssetId::zero(), [100, 0], 1);
	update.nonce = Nonce::from(5u64);

	let result = apply_update(Some(&state), &update, &[]);
	assert!(matches!(result, Err(ChannelError::BadNonce { .. })));
}

#[test]
fn test_validator_rejects_wrong_slot_signature() {
	let state = setup_channel(86_400);
	let update = deposit_update(&state, AssetId::zero(), [100, 0], 1);
	let mut result =
		apply_update(Some(&state), &update, &[]).expect("Deposit should apply");

	// Bob's signature in alice's slot.
	let mut update = update;
	update.signatures =
		[Some(sign_state(&result.new_state, &Keyring::Bob)), None];
	result.new_state.latest_update = Some(update.clone());

	let outcome = validate_update(Some(&state), &update, &result.new_state, &[], 1);
	assert!(matches!(outcome, Err(ChannelError::BadSignature(_))));
}

#[test]
fn test_validator_rejects_missing_signatures() {
	let state = setup_channel(86_400);
	let update = deposit_update(&state, AssetId::zero(), [100, 0], 1);
	let result = apply_update(Some(&state), &update, &[]).expect("Deposit should apply");

	let outcome = validate_update(Some(&state), &update, &result.new_state, &[], 2);
	assert!(matches!(outcome, Err(ChannelError::BadSignature(_))));
}

#[test]
fn test_validator_rejects_tampered_balance() {
	let state = setup_channel(86_400);
	let (update, result) =
		accept_update(Some(&state), deposit_update(&state, AssetId::zero(), [100, 0], 1), &[]);
	let mut tampered = result.new_state;
	tampered.core.balances[0].amount[1] = TokenAmount::from(1u64);

	let outcome = validate_update(Some(&state), &update, &tampered, &[], 2);
	assert!(matches!(outcome, Err(ChannelError::ConservationViolated(_))));
}
