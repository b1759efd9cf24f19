use duplex_primitives::types::{
	Address,
	AssetId,
	Balance,
	Bytes,
	ChainID,
	DepositNonce,
	GasPrice,
	TokenAmount,
	U256,
};
use web3::{
	contract::{
		Contract,
		Options,
	},
	Transport,
	Web3,
};

use super::{
	ChainReader,
	DepositRecord,
	Result,
};
use crate::{
	contracts::{
		ADJUDICATOR_ABI,
		TRANSFER_DEFINITION_ABI,
	},
	errors::ChainError,
	programs::encode_balance,
};

/// Chain reader backed by the deployed adjudicator contract.
#[derive(Clone)]
pub struct AdjudicatorProxy<T: Transport> {
	web3: Web3<T>,
	contract: Contract<T>,
	chain_id: ChainID,
}

impl<T: Transport> AdjudicatorProxy<T> {
	/// Returns a new instance of `AdjudicatorProxy`.
	pub fn new(web3: Web3<T>, adjudicator_address: Address, chain_id: ChainID) -> Result<Self> {
		let contract =
			Contract::from_json(web3.eth(), adjudicator_address, ADJUDICATOR_ABI.as_bytes())?;
		Ok(Self { web3, contract, chain_id })
	}

	/// The adjudicator rules for exactly one chain; refuse cross-chain reads.
	fn check_chain(&self, chain_id: ChainID) -> Result<()> {
		if chain_id != self.chain_id {
			return Err(ChainError::Other(format!(
				"Adjudicator serves chain {}, got a read for {}",
				self.chain_id, chain_id
			)))
		}
		Ok(())
	}

	/// Proxy for a deployed transfer definition contract.
	fn definition_contract(&self, definition: Address) -> Result<Contract<T>> {
		Ok(Contract::from_json(
			self.web3.eth(),
			definition,
			TRANSFER_DEFINITION_ABI.as_bytes(),
		)?)
	}
}

#[async_trait::async_trait]
impl<T> ChainReader for AdjudicatorProxy<T>
where
	T: Transport + Send + Sync,
	T::Out: Send,
{
	async fn get_channel_onchain_balance(
		&self,
		channel_address: Address,
		chain_id: ChainID,
		asset_id: AssetId,
	) -> Result<TokenAmount> {
		self.check_chain(chain_id)?;
		let balance: TokenAmount = self
			.contract
			.query(
				"getChannelBalance",
				(channel_address, asset_id),
				None,
				Options::default(),
				None,
			)
			.await?;
		Ok(balance)
	}

	async fn get_latest_deposit_by_asset(
		&self,
		channel_address: Address,
		chain_id: ChainID,
		asset_id: AssetId,
		since_nonce: DepositNonce,
	) -> Result<DepositRecord> {
		self.check_chain(chain_id)?;
		let (amount, nonce): (TokenAmount, U256) = self
			.contract
			.query(
				"getLatestDeposit",
				(channel_address, asset_id, since_nonce),
				None,
				Options::default(),
				None,
			)
			.await?;
		Ok(DepositRecord { amount, nonce })
	}

	async fn get_code(&self, address: Address, chain_id: ChainID) -> Result<Bytes> {
		self.check_chain(chain_id)?;
		let code = self.web3.eth().code(address, None).await?;
		Ok(code)
	}

	async fn get_gas_price(&self, chain_id: ChainID) -> Result<GasPrice> {
		self.check_chain(chain_id)?;
		let gas_price = self.web3.eth().gas_price().await?;
		Ok(gas_price)
	}

	async fn call_transfer_create(
		&self,
		definition: Address,
		chain_id: ChainID,
		initial_state: &Bytes,
		balance: &Balance,
	) -> Result<bool> {
		self.check_chain(chain_id)?;
		let contract = self.definition_contract(definition)?;
		let accepted: bool = contract
			.query(
				"create",
				(initial_state.clone(), encode_balance(balance)),
				None,
				Options::default(),
				None,
			)
			.await?;
		Ok(accepted)
	}

	async fn call_transfer_resolve(
		&self,
		definition: Address,
		chain_id: ChainID,
		initial_state: &Bytes,
		balance: &Balance,
		resolver: &Bytes,
	) -> Result<Balance> {
		self.check_chain(chain_id)?;
		let contract = self.definition_contract(definition)?;
		let (alice_to, bob_to, alice_amount, bob_amount): (Address, Address, U256, U256) =
			contract
				.query(
					"resolve",
					(initial_state.clone(), encode_balance(balance), resolver.clone()),
					None,
					Options::default(),
					None,
				)
				.await?;
		Ok(Balance { to: [alice_to, bob_to], amount: [alice_amount, bob_amount] })
	}
}
