#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::types::{
	Address,
	AssetId,
	Balance,
	Bytes,
	ChannelTimeout,
	DepositNonce,
	NetworkContext,
	Nonce,
	PublicIdentifier,
	Signature,
	TransferId,
	TransferTimeout,
};
use serde::{
	Deserialize,
	Serialize,
};

use crate::types::TransferEncodings;

/// Payload of a setup update. Produces the empty channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SetupDetails {
	pub timeout: ChannelTimeout,
	pub network_context: NetworkContext,
}

/// Payload of a deposit update, incorporating on-chain balance changes up to
/// `latest_deposit_nonce`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DepositDetails {
	pub latest_deposit_nonce: DepositNonce,
}

/// Payload of a create update, locking balance under a condition program.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CreateDetails {
	pub transfer_id: TransferId,
	pub transfer_definition: Address,
	pub transfer_timeout: TransferTimeout,
	pub transfer_initial_state: Bytes,
	pub transfer_encodings: TransferEncodings,
	/// The locked split: full amount on the proposer's side.
	pub balance: Balance,
	pub meta: Option<serde_json::Value>,
}

/// Payload of a resolve update, releasing a locked balance per the condition
/// program's verdict.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResolveDetails {
	pub transfer_id: TransferId,
	pub transfer_resolver: Bytes,
	pub meta: Option<serde_json::Value>,
}

/// Kind-specific payload of an update.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpdateDetails {
	Setup(SetupDetails),
	Deposit(DepositDetails),
	Create(CreateDetails),
	Resolve(ResolveDetails),
}

/// A proposed or accepted channel state transition.
///
/// Signature slot 0 belongs to alice, slot 1 to bob, matching participant
/// order for the life of the channel.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChannelUpdate {
	pub channel_address: Address,
	pub from_identifier: PublicIdentifier,
	pub to_identifier: PublicIdentifier,
	/// Nonce of the state this update produces.
	pub nonce: Nonce,
	/// The post-update balance entry for `asset_id`.
	pub balance: Balance,
	pub asset_id: AssetId,
	pub details: UpdateDetails,
	pub signatures: [Option<Signature>; 2],
}

impl ChannelUpdate {
	/// Returns the string type name of the update.
	pub fn type_name(&self) -> &'static str {
		match self.details {
			UpdateDetails::Setup(_) => "Setup",
			UpdateDetails::Deposit(_) => "Deposit",
			UpdateDetails::Create(_) => "Create",
			UpdateDetails::Resolve(_) => "Resolve",
		}
	}

	/// Number of filled signature slots.
	pub fn signature_count(&self) -> usize {
		self.signatures.iter().filter(|s| s.is_some()).count()
	}
}
