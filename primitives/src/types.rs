#![warn(clippy::missing_docs_in_private_items)]

use derive_more::Display;
use serde::{
	Deserialize,
	Serialize,
};
pub use web3::types::{
	Address,
	BlockId,
	Bytes,
	H160,
	H256,
	U256,
};

/// Chain identifier module.
mod chain_id;
pub use chain_id::*;

use crate::{
	deserializers::u256_array_from_str,
	serializers::u256_array_to_str,
	traits::Checksum,
};

/// Alias type for asset identifier. The zero address denotes the chain's
/// native asset.
pub type AssetId = Address;

/// Alias type for channel dispute window, in seconds.
pub type ChannelTimeout = U256;

/// Alias type for the on-chain deposit counter.
pub type DepositNonce = U256;

/// Alias type for gas price.
pub type GasPrice = U256;

/// Alias type for the reply correlation identifier.
pub type Inbox = H256;

/// Alias type for locked amount.
pub type LockedAmount = U256;

/// Alias type for the root over active transfer commitments.
pub type MerkleRoot = H256;

/// Alias type for nonce.
pub type Nonce = U256;

/// Alias type for a participant's long-lived routing identifier.
pub type PublicIdentifier = String;

/// Alias type for signature.
pub type Signature = Bytes;

/// Alias type for token amount.
pub type TokenAmount = U256;

/// Alias type for transfer identifier.
pub type TransferId = H256;

/// Alias type for transfer dispute window, in seconds.
pub type TransferTimeout = U256;

/// Commitment type identifier.
///
/// These magic numbers domain-separate the signed encodings so that a
/// channel commitment can never be replayed as a transfer commitment.
#[repr(u8)]
#[derive(Clone, Copy, Display, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CommitmentTypeId {
	ChannelState = 1,
	TransferState = 2,
}

impl From<CommitmentTypeId> for [u8; 1] {
	fn from(val: CommitmentTypeId) -> Self {
		(val as u8).to_be_bytes()
	}
}

/// The chain and adjudicator a channel settles against. Immutable for the
/// life of the channel.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct NetworkContext {
	pub chain_id: ChainID,
	pub adjudicator_address: Address,
}

impl ToString for NetworkContext {
	fn to_string(&self) -> String {
		format!(
			"ChainID: {}, Adjudicator: {}",
			self.chain_id,
			self.adjudicator_address.checksum()
		)
	}
}

/// A two-element balance whose slots follow participant order.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Balance {
	pub to: [Address; 2],
	#[serde(deserialize_with = "u256_array_from_str", serialize_with = "u256_array_to_str")]
	pub amount: [TokenAmount; 2],
}

impl Balance {
	/// An all-zero balance between `to`.
	pub fn zero(to: [Address; 2]) -> Self {
		Self { to, amount: [TokenAmount::zero(), TokenAmount::zero()] }
	}

	/// The sum of both slots.
	pub fn total(&self) -> TokenAmount {
		self.amount[0].saturating_add(self.amount[1])
	}
}

/// The channel state fields covered by the commitment signature.
///
/// `balances`, `locked_balance` and `asset_ids` are parallel lists; an index
/// into `asset_ids` addresses the matching entries of the other two.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoreChannelState {
	pub channel_address: Address,
	pub participants: [Address; 2],
	pub timeout: ChannelTimeout,
	pub balances: Vec<Balance>,
	pub locked_balance: Vec<LockedAmount>,
	pub asset_ids: Vec<AssetId>,
	pub nonce: Nonce,
	pub latest_deposit_nonce: DepositNonce,
	pub merkle_root: MerkleRoot,
}

/// The artifact both participants sign. Produced for every accepted update
/// and submittable to the adjudicator as-is.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChannelCommitment {
	pub chain_id: ChainID,
	pub state: CoreChannelState,
	pub adjudicator_address: Address,
	pub signatures: [Option<Signature>; 2],
}

impl ChannelCommitment {
	/// Commitment over `state` with both signature slots empty.
	pub fn unsigned(state: CoreChannelState, network_context: &NetworkContext) -> Self {
		Self {
			chain_id: network_context.chain_id,
			state,
			adjudicator_address: network_context.adjudicator_address,
			signatures: [None, None],
		}
	}

	/// Number of filled signature slots.
	pub fn signature_count(&self) -> usize {
		self.signatures.iter().filter(|s| s.is_some()).count()
	}
}
