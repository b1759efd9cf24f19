#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::types::{
	Address,
	AssetId,
	Balance,
	CoreChannelState,
	LockedAmount,
	Nonce,
	TransferId,
};

use crate::types::{
	FullChannelState,
	FullTransferState,
};

/// Index of `asset_id` in the channel's asset list, if tracked.
pub fn asset_index(state: &CoreChannelState, asset_id: AssetId) -> Option<usize> {
	state.asset_ids.iter().position(|a| *a == asset_id)
}

/// Participant slot of a routing identifier.
pub fn participant_index(state: &FullChannelState, identifier: &str) -> Option<usize> {
	state.public_identifiers.iter().position(|id| id == identifier)
}

/// Participant slot of an on-chain address.
pub fn participant_index_by_address(state: &CoreChannelState, address: Address) -> Option<usize> {
	state.participants.iter().position(|a| *a == address)
}

/// The channel's free balance for `asset_id`, if tracked.
pub fn free_balance(state: &CoreChannelState, asset_id: AssetId) -> Option<&Balance> {
	asset_index(state, asset_id).map(|index| &state.balances[index])
}

/// The channel's locked balance for `asset_id`. Untracked assets lock
/// nothing.
pub fn locked_balance(state: &CoreChannelState, asset_id: AssetId) -> LockedAmount {
	asset_index(state, asset_id)
		.map(|index| state.locked_balance[index])
		.unwrap_or_else(LockedAmount::zero)
}

/// Nonce the next accepted update must carry.
pub fn next_nonce(state: &FullChannelState) -> Nonce {
	state.core.nonce + 1
}

/// The active transfer with `transfer_id`, if any.
pub fn get_transfer(
	active_transfers: &[FullTransferState],
	transfer_id: TransferId,
) -> Option<&FullTransferState> {
	active_transfers.iter().find(|t| t.transfer_id == transfer_id)
}
