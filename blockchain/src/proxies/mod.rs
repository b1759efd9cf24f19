#![warn(clippy::missing_docs_in_private_items)]

use duplex_primitives::types::{
	Address,
	AssetId,
	Balance,
	Bytes,
	ChainID,
	DepositNonce,
	GasPrice,
	TokenAmount,
};

use crate::errors::ChainError;

/// Adjudicator contract proxy.
mod adjudicator;
pub use adjudicator::*;

/// Chain result alias.
pub type Result<T> = std::result::Result<T, ChainError>;

/// The latest recognized on-chain deposit for one asset of a channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DepositRecord {
	pub amount: TokenAmount,
	pub nonce: DepositNonce,
}

/// Read access to the settlement chain.
///
/// Shared across channels and assumed internally thread-safe. The core
/// never writes to the chain; disputes are a separate component's job.
#[async_trait::async_trait]
pub trait ChainReader: Send + Sync {
	/// Total on-chain holdings of the channel for `asset_id`.
	async fn get_channel_onchain_balance(
		&self,
		channel_address: Address,
		chain_id: ChainID,
		asset_id: AssetId,
	) -> Result<TokenAmount>;

	/// The latest on-chain deposit record at or after `since_nonce`.
	async fn get_latest_deposit_by_asset(
		&self,
		channel_address: Address,
		chain_id: ChainID,
		asset_id: AssetId,
		since_nonce: DepositNonce,
	) -> Result<DepositRecord>;

	/// Deployed bytecode at `address`. Empty bytes mean undeployed.
	async fn get_code(&self, address: Address, chain_id: ChainID) -> Result<Bytes>;

	/// Current gas price.
	async fn get_gas_price(&self, chain_id: ChainID) -> Result<GasPrice>;

	/// Invoke `create` on a deployed transfer definition.
	async fn call_transfer_create(
		&self,
		definition: Address,
		chain_id: ChainID,
		initial_state: &Bytes,
		balance: &Balance,
	) -> Result<bool>;

	/// Invoke `resolve` on a deployed transfer definition.
	async fn call_transfer_resolve(
		&self,
		definition: Address,
		chain_id: ChainID,
		initial_state: &Bytes,
		balance: &Balance,
		resolver: &Bytes,
	) -> Result<Balance>;
}
