#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::{
	constants::MERKLE_ROOT_OF_NO_TRANSFERS,
	types::{
		AssetId,
		Balance,
		CoreChannelState,
		LockedAmount,
		MerkleRoot,
		H256,
	},
};
use web3::signing::keccak256;

use crate::types::FullTransferState;

/// Returns the index of `asset_id` in the channel's asset list, appending a
/// zero entry to each parallel list first if the asset is not yet known.
pub(crate) fn ensure_asset(state: &mut CoreChannelState, asset_id: AssetId) -> usize {
	if let Some(index) = state.asset_ids.iter().position(|a| *a == asset_id) {
		return index
	}
	state.asset_ids.push(asset_id);
	state.balances.push(Balance::zero(state.participants));
	state.locked_balance.push(LockedAmount::zero());
	state.asset_ids.len() - 1
}

/// Leaves of the channel's merkle tree, one per active transfer.
pub fn transfer_leaves(active_transfers: &[FullTransferState]) -> Vec<H256> {
	active_transfers.iter().map(FullTransferState::leaf).collect()
}

/// Root over a set of transfer leaves.
///
/// Leaves are sorted ascending, then hashed pairwise; an odd leaf is carried
/// up unchanged. The empty set hashes to the empty root so an adjudicator
/// can distinguish "no transfers" from "unknown".
pub fn compute_merkle_root(mut leaves: Vec<H256>) -> MerkleRoot {
	if leaves.is_empty() {
		return *MERKLE_ROOT_OF_NO_TRANSFERS
	}

	leaves.sort();
	while leaves.len() > 1 {
		let mut next_level = Vec::with_capacity((leaves.len() + 1) / 2);
		for pair in leaves.chunks(2) {
			if pair.len() == 2 {
				let mut preimage = pair[0].as_bytes().to_vec();
				preimage.extend(pair[1].as_bytes());
				next_level.push(H256::from_slice(&keccak256(&preimage)));
			} else {
				next_level.push(pair[0]);
			}
		}
		leaves = next_level;
	}

	leaves[0]
}
