#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::{
	packing::transfer_leaf,
	types::{
		Address,
		AssetId,
		Balance,
		Bytes,
		ChannelCommitment,
		CoreChannelState,
		NetworkContext,
		PublicIdentifier,
		TokenAmount,
		TransferId,
		TransferTimeout,
		H256,
	},
};
use serde::{
	Deserialize,
	Serialize,
};

use crate::types::ChannelUpdate;

/// A channel as the node tracks it: the signed core plus the routing and
/// settlement context that never enters the commitment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FullChannelState {
	pub core: CoreChannelState,
	pub public_identifiers: [PublicIdentifier; 2],
	pub network_context: NetworkContext,
	pub latest_update: Option<ChannelUpdate>,
}

impl FullChannelState {
	/// The commitment over this state with both signature slots empty.
	pub fn commitment(&self) -> ChannelCommitment {
		ChannelCommitment::unsigned(self.core.clone(), &self.network_context)
	}

	/// The commitment carrying the signatures of `update`.
	pub fn commitment_with_signatures(&self, update: &ChannelUpdate) -> ChannelCommitment {
		let mut commitment = self.commitment();
		commitment.signatures = update.signatures.clone();
		commitment
	}
}

/// ABI type descriptors for a transfer's state and resolver payloads.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransferEncodings {
	pub state: String,
	pub resolver: String,
}

/// A conditionally locked sub-balance within a channel. Created by a CREATE
/// update, removed by a RESOLVE update.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FullTransferState {
	pub transfer_id: TransferId,
	pub channel_address: Address,
	/// Participant that locked the balance.
	pub initiator: Address,
	/// Address of the condition program ruling this transfer.
	pub transfer_definition: Address,
	pub transfer_encodings: TransferEncodings,
	/// ABI-encoded initial state handed to the condition program.
	pub transfer_state: Bytes,
	/// ABI-encoded verdict witness, present once resolved.
	pub transfer_resolver: Option<Bytes>,
	pub transfer_timeout: TransferTimeout,
	pub asset_id: AssetId,
	/// Expected payout split while the transfer is pending.
	pub balance: Balance,
	pub meta: Option<serde_json::Value>,
}

impl FullTransferState {
	/// Amount held under this transfer's condition.
	pub fn locked_amount(&self) -> TokenAmount {
		self.balance.total()
	}

	/// This transfer's leaf in the channel's merkle tree.
	pub fn leaf(&self) -> H256 {
		transfer_leaf(
			self.channel_address,
			self.transfer_id,
			self.transfer_definition,
			self.transfer_timeout,
			&self.transfer_state,
		)
	}
}
