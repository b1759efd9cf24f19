#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::{
	constants::{
		CHANNEL_FIRST_NONCE,
		MERKLE_ROOT_OF_NO_TRANSFERS,
	},
	identifiers::address_from_identifier,
	packing::derive_channel_address,
	types::{
		CoreChannelState,
		DepositNonce,
		Nonce,
		TokenAmount,
		U256,
	},
};

use crate::{
	constants::{
		MAX_CHANNEL_TIMEOUT,
		MIN_CHANNEL_TIMEOUT,
	},
	errors::ChannelError,
	machine::utils::{
		compute_merkle_root,
		ensure_asset,
		transfer_leaves,
	},
	types::{
		ChannelUpdate,
		CreateDetails,
		DepositDetails,
		FullChannelState,
		FullTransferState,
		ResolveDetails,
		SetupDetails,
		UpdateDetails,
	},
	views,
};

/// Effect of an accepted update on the active transfer set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferChange {
	Created(FullTransferState),
	Resolved(FullTransferState),
}

/// Output of a successful transition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransitionResult {
	pub new_state: FullChannelState,
	pub transfer_change: Option<TransferChange>,
}

/// Apply `update` to `previous_state`, producing the next state.
///
/// Pure: equal inputs produce equal outputs and nothing is read from or
/// written to the outside world. `active_transfers` must be the channel's
/// current active transfer set; create and resolve recompute the merkle root
/// from it.
pub fn apply_update(
	previous_state: Option<&FullChannelState>,
	update: &ChannelUpdate,
	active_transfers: &[FullTransferState],
) -> Result<TransitionResult, ChannelError> {
	match &update.details {
		UpdateDetails::Setup(details) => apply_setup(previous_state, update, details),
		UpdateDetails::Deposit(details) => {
			let previous_state = existing_channel(previous_state)?;
			apply_deposit(previous_state, update, details)
		},
		UpdateDetails::Create(details) => {
			let previous_state = existing_channel(previous_state)?;
			apply_create(previous_state, update, details, active_transfers)
		},
		UpdateDetails::Resolve(details) => {
			let previous_state = existing_channel(previous_state)?;
			apply_resolve(previous_state, update, details, active_transfers)
		},
	}
}

/// Every update kind except setup advances an existing channel.
fn existing_channel(
	previous_state: Option<&FullChannelState>,
) -> Result<&FullChannelState, ChannelError> {
	previous_state
		.ok_or_else(|| ChannelError::InvalidUpdate("Channel does not exist".to_owned()))
}

/// The proposer must advance the nonce by exactly one.
fn expect_next_nonce(
	previous_state: &FullChannelState,
	update: &ChannelUpdate,
) -> Result<Nonce, ChannelError> {
	let expected = previous_state.core.nonce + 1;
	if update.nonce != expected {
		return Err(ChannelError::BadNonce { expected, got: update.nonce })
	}
	Ok(expected)
}

fn apply_setup(
	previous_state: Option<&FullChannelState>,
	update: &ChannelUpdate,
	details: &SetupDetails,
) -> Result<TransitionResult, ChannelError> {
	if previous_state.is_some() {
		return Err(ChannelError::InvalidUpdate("Channel is already set up".to_owned()))
	}
	if update.nonce != Nonce::from(CHANNEL_FIRST_NONCE) {
		return Err(ChannelError::BadNonce {
			expected: Nonce::from(CHANNEL_FIRST_NONCE),
			got: update.nonce,
		})
	}

	let alice = address_from_identifier(&update.from_identifier).ok_or_else(|| {
		ChannelError::BadParticipants(format!(
			"Proposer identifier is malformed: {}",
			update.from_identifier
		))
	})?;
	let bob = address_from_identifier(&update.to_identifier).ok_or_else(|| {
		ChannelError::BadParticipants(format!(
			"Counterparty identifier is malformed: {}",
			update.to_identifier
		))
	})?;
	if alice == bob {
		return Err(ChannelError::BadParticipants(
			"A channel requires two distinct participants".to_owned(),
		))
	}

	if details.timeout < U256::from(MIN_CHANNEL_TIMEOUT) ||
		details.timeout > U256::from(MAX_CHANNEL_TIMEOUT)
	{
		return Err(ChannelError::InvalidUpdate(format!(
			"Channel timeout {} is out of bounds",
			details.timeout
		)))
	}

	let participants = [alice, bob];
	let expected_address = derive_channel_address(&participants, &details.network_context);
	if update.channel_address != expected_address {
		return Err(ChannelError::BadParticipants(format!(
			"Channel address {} does not derive from participants",
			update.channel_address
		)))
	}

	let core = CoreChannelState {
		channel_address: expected_address,
		participants,
		timeout: details.timeout,
		balances: vec![],
		locked_balance: vec![],
		asset_ids: vec![],
		nonce: Nonce::from(CHANNEL_FIRST_NONCE),
		latest_deposit_nonce: DepositNonce::zero(),
		merkle_root: *MERKLE_ROOT_OF_NO_TRANSFERS,
	};

	Ok(TransitionResult {
		new_state: FullChannelState {
			core,
			public_identifiers: [update.from_identifier.clone(), update.to_identifier.clone()],
			network_context: details.network_context.clone(),
			latest_update: Some(update.clone()),
		},
		transfer_change: None,
	})
}

fn apply_deposit(
	previous_state: &FullChannelState,
	update: &ChannelUpdate,
	details: &DepositDetails,
) -> Result<TransitionResult, ChannelError> {
	let nonce = expect_next_nonce(previous_state, update)?;
	if views::participant_index(previous_state, &update.from_identifier).is_none() {
		return Err(ChannelError::BadParticipants(format!(
			"Proposer {} is not a channel participant",
			update.from_identifier
		)))
	}

	// An equal on-chain deposit nonce means no new deposit to absorb.
	if details.latest_deposit_nonce <= previous_state.core.latest_deposit_nonce {
		return Err(ChannelError::BadDepositNonce {
			current: previous_state.core.latest_deposit_nonce,
			proposed: details.latest_deposit_nonce,
		})
	}
	if update.balance.to != previous_state.core.participants {
		return Err(ChannelError::BadParticipants(
			"Deposit balance slots do not follow participant order".to_owned(),
		))
	}

	let mut core = previous_state.core.clone();
	let asset_index = ensure_asset(&mut core, update.asset_id);
	core.balances[asset_index] = update.balance.clone();
	core.latest_deposit_nonce = details.latest_deposit_nonce;
	core.nonce = nonce;

	Ok(TransitionResult {
		new_state: FullChannelState {
			core,
			public_identifiers: previous_state.public_identifiers.clone(),
			network_context: previous_state.network_context.clone(),
			latest_update: Some(update.clone()),
		},
		transfer_change: None,
	})
}

fn apply_create(
	previous_state: &FullChannelState,
	update: &ChannelUpdate,
	details: &CreateDetails,
	active_transfers: &[FullTransferState],
) -> Result<TransitionResult, ChannelError> {
	let nonce = expect_next_nonce(previous_state, update)?;
	let proposer_index = views::participant_index(previous_state, &update.from_identifier)
		.ok_or_else(|| {
			ChannelError::BadParticipants(format!(
				"Proposer {} is not a channel participant",
				update.from_identifier
			))
		})?;

	if views::get_transfer(active_transfers, details.transfer_id).is_some() {
		return Err(ChannelError::InvalidUpdate(format!(
			"Transfer {} is already active",
			details.transfer_id
		)))
	}

	let locked_amount = details.balance.total();
	if locked_amount.is_zero() {
		return Err(ChannelError::InvalidUpdate("Transfer locks no balance".to_owned()))
	}
	if details.balance.to[0] != previous_state.core.participants[proposer_index] {
		return Err(ChannelError::BadParticipants(
			"Transfer balance must put the proposer in slot zero".to_owned(),
		))
	}
	if details.transfer_timeout.is_zero() ||
		details.transfer_timeout > previous_state.core.timeout
	{
		return Err(ChannelError::InvalidUpdate(format!(
			"Transfer timeout {} exceeds channel timeout {}",
			details.transfer_timeout, previous_state.core.timeout
		)))
	}

	let free_balance = views::free_balance(&previous_state.core, update.asset_id)
		.map(|balance| balance.amount[proposer_index])
		.unwrap_or_else(TokenAmount::zero);
	if free_balance < locked_amount {
		return Err(ChannelError::ConservationViolated(format!(
			"Insufficient free balance. Available: {}, locking: {}",
			free_balance, locked_amount
		)))
	}

	let transfer = FullTransferState {
		transfer_id: details.transfer_id,
		channel_address: previous_state.core.channel_address,
		initiator: previous_state.core.participants[proposer_index],
		transfer_definition: details.transfer_definition,
		transfer_encodings: details.transfer_encodings.clone(),
		transfer_state: details.transfer_initial_state.clone(),
		transfer_resolver: None,
		transfer_timeout: details.transfer_timeout,
		asset_id: update.asset_id,
		balance: details.balance.clone(),
		meta: details.meta.clone(),
	};

	let mut core = previous_state.core.clone();
	let asset_index = ensure_asset(&mut core, update.asset_id);
	core.balances[asset_index].amount[proposer_index] -= locked_amount;
	core.locked_balance[asset_index] += locked_amount;

	let mut leaves = transfer_leaves(active_transfers);
	leaves.push(transfer.leaf());
	core.merkle_root = compute_merkle_root(leaves);
	core.nonce = nonce;

	Ok(TransitionResult {
		new_state: FullChannelState {
			core,
			public_identifiers: previous_state.public_identifiers.clone(),
			network_context: previous_state.network_context.clone(),
			latest_update: Some(update.clone()),
		},
		transfer_change: Some(TransferChange::Created(transfer)),
	})
}

fn apply_resolve(
	previous_state: &FullChannelState,
	update: &ChannelUpdate,
	details: &ResolveDetails,
	active_transfers: &[FullTransferState],
) -> Result<TransitionResult, ChannelError> {
	let nonce = expect_next_nonce(previous_state, update)?;
	if views::participant_index(previous_state, &update.from_identifier).is_none() {
		return Err(ChannelError::BadParticipants(format!(
			"Proposer {} is not a channel participant",
			update.from_identifier
		)))
	}

	let transfer = views::get_transfer(active_transfers, details.transfer_id)
		.ok_or(ChannelError::TransferNotActive(details.transfer_id))?;
	if transfer.asset_id != update.asset_id {
		return Err(ChannelError::InvalidUpdate(format!(
			"Resolve names asset {} but transfer {} locks {}",
			update.asset_id, transfer.transfer_id, transfer.asset_id
		)))
	}
	if update.balance.to != previous_state.core.participants {
		return Err(ChannelError::BadParticipants(
			"Resolve balance slots do not follow participant order".to_owned(),
		))
	}

	let locked_amount = transfer.locked_amount();
	let asset_index = views::asset_index(&previous_state.core, update.asset_id)
		.ok_or(ChannelError::TransferNotActive(details.transfer_id))?;
	let mut core = previous_state.core.clone();

	// The verdict may only distribute the released lock; free balances
	// never shrink on resolve.
	let previous_balance = &previous_state.core.balances[asset_index];
	let credited: TokenAmount = update.balance.total();
	if credited != previous_balance.total().saturating_add(locked_amount) {
		return Err(ChannelError::ConservationViolated(format!(
			"Resolve must release exactly the locked amount {}",
			locked_amount
		)))
	}
	for index in 0..2 {
		if update.balance.amount[index] < previous_balance.amount[index] {
			return Err(ChannelError::ConservationViolated(
				"Resolve decreases a participant's free balance".to_owned(),
			))
		}
	}
	if core.locked_balance[asset_index] < locked_amount {
		return Err(ChannelError::LockedBalanceMismatch(format!(
			"Locked balance {} cannot release {}",
			core.locked_balance[asset_index], locked_amount
		)))
	}

	core.balances[asset_index] = update.balance.clone();
	core.locked_balance[asset_index] -= locked_amount;

	let leaf = transfer.leaf();
	let leaves =
		transfer_leaves(active_transfers).into_iter().filter(|l| *l != leaf).collect();
	core.merkle_root = compute_merkle_root(leaves);
	core.nonce = nonce;

	let mut resolved = transfer.clone();
	resolved.transfer_resolver = Some(details.transfer_resolver.clone());

	Ok(TransitionResult {
		new_state: FullChannelState {
			core,
			public_identifiers: previous_state.public_identifiers.clone(),
			network_context: previous_state.network_context.clone(),
			latest_update: Some(update.clone()),
		},
		transfer_change: Some(TransferChange::Resolved(resolved)),
	})
}
