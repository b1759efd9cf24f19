mod keyring;

use duplex_primitives::{
	packing::derive_channel_address,
	signing::hash_commitment,
	types::{
		Address,
		AssetId,
		Balance,
		Bytes,
		ChainID,
		DepositNonce,
		NetworkContext,
		Nonce,
		Signature,
		TokenAmount,
		TransferId,
		TransferTimeout,
		U256,
	},
};
pub use keyring::*;

use crate::{
	machine::{
		apply_update,
		TransitionResult,
	},
	types::{
		ChannelUpdate,
		CreateDetails,
		DepositDetails,
		FullChannelState,
		FullTransferState,
		ResolveDetails,
		SetupDetails,
		TransferEncodings,
		UpdateDetails,
	},
	views,
};

pub fn network_context() -> NetworkContext {
	NetworkContext {
		chain_id: ChainID::Mainnet,
		adjudicator_address: Address::from_low_u64_be(0xAA),
	}
}

pub fn sign_state(state: &FullChannelState, keyring: &Keyring) -> Signature {
	let digest = hash_commitment(&state.commitment());
	let signature =
		keyring.private_key().sign(&digest).expect("Commitment should be signed");

	let mut bytes = signature.r.to_vec();
	bytes.extend(&signature.s);
	bytes.push(signature.v + 27);
	Bytes(bytes)
}

/// Apply `update`, sign the produced state with both keys and return the
/// transition with the fully signed update embedded.
pub fn accept_update(
	previous_state: Option<&FullChannelState>,
	mut update: ChannelUpdate,
	active_transfers: &[FullTransferState],
) -> (ChannelUpdate, TransitionResult) {
	let result = apply_update(previous_state, &update, active_transfers)
		.expect("Update should apply");
	update.signatures = [
		Some(sign_state(&result.new_state, &Keyring::Alice)),
		Some(sign_state(&result.new_state, &Keyring::Bob)),
	];
	let mut result = result;
	result.new_state.latest_update = Some(update.clone());
	(update, result)
}

pub fn setup_update(timeout: u64) -> ChannelUpdate {
	let network_context = network_context();
	let participants = [Keyring::Alice.address(), Keyring::Bob.address()];
	ChannelUpdate {
		channel_address: derive_channel_address(&participants, &network_context),
		from_identifier: Keyring::Alice.public_identifier(),
		to_identifier: Keyring::Bob.public_identifier(),
		nonce: Nonce::from(1u64),
		balance: Balance::zero(participants),
		asset_id: AssetId::zero(),
		details: UpdateDetails::Setup(SetupDetails {
			timeout: U256::from(timeout),
			network_context,
		}),
		signatures: [None, None],
	}
}

pub fn setup_channel(timeout: u64) -> FullChannelState {
	let (_, result) = accept_update(None, setup_update(timeout), &[]);
	result.new_state
}

pub fn deposit_update(
	state: &FullChannelState,
	asset_id: AssetId,
	amounts: [u64; 2],
	latest_deposit_nonce: u64,
) -> ChannelUpdate {
	ChannelUpdate {
		channel_address: state.core.channel_address,
		from_identifier: state.public_identifiers[0].clone(),
		to_identifier: state.public_identifiers[1].clone(),
		nonce: views::next_nonce(state),
		balance: Balance {
			to: state.core.participants,
			amount: [TokenAmount::from(amounts[0]), TokenAmount::from(amounts[1])],
		},
		asset_id,
		details: UpdateDetails::Deposit(DepositDetails {
			latest_deposit_nonce: DepositNonce::from(latest_deposit_nonce),
		}),
		signatures: [None, None],
	}
}

pub fn funded_channel(asset_id: AssetId, amounts: [u64; 2]) -> FullChannelState {
	let state = setup_channel(86_400);
	let (_, result) =
		accept_update(Some(&state), deposit_update(&state, asset_id, amounts, 1), &[]);
	result.new_state
}

pub fn create_update(
	state: &FullChannelState,
	asset_id: AssetId,
	transfer_id: TransferId,
	amount: u64,
	transfer_timeout: u64,
) -> ChannelUpdate {
	let free = views::free_balance(&state.core, asset_id)
		.cloned()
		.unwrap_or_else(|| Balance::zero(state.core.participants));
	let mut new_balance = free;
	new_balance.amount[0] = new_balance.amount[0].saturating_sub(TokenAmount::from(amount));
	ChannelUpdate {
		channel_address: state.core.channel_address,
		from_identifier: state.public_identifiers[0].clone(),
		to_identifier: state.public_identifiers[1].clone(),
		nonce: views::next_nonce(state),
		balance: new_balance,
		asset_id,
		details: UpdateDetails::Create(CreateDetails {
			transfer_id,
			transfer_definition: Address::from_low_u64_be(0xDEF),
			transfer_timeout: TransferTimeout::from(transfer_timeout),
			transfer_initial_state: Bytes(vec![1u8; 64]),
			transfer_encodings: TransferEncodings {
				state: "(bytes32 lockHash, uint256 expiry)".to_owned(),
				resolver: "(bytes32 preImage)".to_owned(),
			},
			balance: Balance {
				to: [state.core.participants[0], state.core.participants[1]],
				amount: [TokenAmount::from(amount), TokenAmount::zero()],
			},
			meta: None,
		}),
		signatures: [None, None],
	}
}

pub fn resolve_update(
	state: &FullChannelState,
	transfer: &FullTransferState,
	new_amounts: [u64; 2],
) -> ChannelUpdate {
	ChannelUpdate {
		channel_address: state.core.channel_address,
		from_identifier: state.public_identifiers[1].clone(),
		to_identifier: state.public_identifiers[0].clone(),
		nonce: views::next_nonce(state),
		balance: Balance {
			to: state.core.participants,
			amount: [TokenAmount::from(new_amounts[0]), TokenAmount::from(new_amounts[1])],
		},
		asset_id: transfer.asset_id,
		details: UpdateDetails::Resolve(ResolveDetails {
			transfer_id: transfer.transfer_id,
			transfer_resolver: Bytes(vec![2u8; 32]),
			meta: None,
		}),
		signatures: [None, None],
	}
}
