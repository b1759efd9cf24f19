#![warn(clippy::missing_docs_in_private_items)]

use std::{
	collections::HashMap,
	sync::Arc,
};

use duplex_primitives::types::{
	Address,
	Balance,
	Bytes,
	ChainID,
	H256,
};
use duplex_state_machine::types::FullTransferState;
use parking_lot::RwLock;
use tracing::debug;
use web3::signing::keccak256;

use super::TransferProgram;
use crate::{
	errors::ChainError,
	proxies::ChainReader,
};

/// Runs a transfer's condition program.
///
/// Local mode executes an audited native implementation keyed by the keccak
/// digest of the deployed bytecode; arguments and results cross the
/// boundary ABI-encoded, so a registry hit and the on-chain call agree for
/// well-formed programs. On a registry miss or any local failure the
/// executor falls back to invoking the deployed contract via the chain
/// reader.
pub struct ProgramExecutor {
	/// Shared chain reader.
	chain: Arc<dyn ChainReader>,
	/// Native implementations by code digest.
	registry: RwLock<HashMap<H256, Arc<dyn TransferProgram>>>,
}

impl ProgramExecutor {
	/// Returns a new instance of `ProgramExecutor` with an empty registry.
	pub fn new(chain: Arc<dyn ChainReader>) -> Self {
		Self { chain, registry: RwLock::new(HashMap::new()) }
	}

	/// Register a native implementation for the program whose deployed
	/// bytecode hashes to `code_digest`.
	pub fn register(&self, code_digest: H256, program: Arc<dyn TransferProgram>) {
		self.registry.write().insert(code_digest, program);
	}

	/// The native implementation for `definition`, if its deployed bytecode
	/// digest is registered. Errors when nothing is deployed there.
	async fn local_program(
		&self,
		definition: Address,
		chain_id: ChainID,
	) -> Result<Option<Arc<dyn TransferProgram>>, ChainError> {
		let code = self.chain.get_code(definition, chain_id).await?;
		if code.0.is_empty() {
			return Err(ChainError::Undeployed(definition))
		}
		let digest = H256::from_slice(&keccak256(&code.0));
		Ok(self.registry.read().get(&digest).cloned())
	}

	/// Run `create` on the transfer's condition program.
	pub async fn execute_create(
		&self,
		transfer: &FullTransferState,
		chain_id: ChainID,
	) -> Result<bool, ChainError> {
		if let Some(program) = self.local_program(transfer.transfer_definition, chain_id).await?
		{
			match program.create(&transfer.transfer_state, &transfer.balance) {
				Ok(accepted) => return Ok(accepted),
				Err(e) => {
					debug!(
						message = "Local program failed, falling back to chain",
						error = e.to_string().as_str()
					);
				},
			}
		}

		self.chain
			.call_transfer_create(
				transfer.transfer_definition,
				chain_id,
				&transfer.transfer_state,
				&transfer.balance,
			)
			.await
	}

	/// Run `resolve` on the transfer's condition program.
	pub async fn execute_resolve(
		&self,
		transfer: &FullTransferState,
		resolver: &Bytes,
		chain_id: ChainID,
	) -> Result<Balance, ChainError> {
		if let Some(program) = self.local_program(transfer.transfer_definition, chain_id).await?
		{
			match program.resolve(&transfer.transfer_state, resolver, &transfer.balance) {
				Ok(outcome) => return Ok(outcome),
				Err(e) => {
					debug!(
						message = "Local program failed, falling back to chain",
						error = e.to_string().as_str()
					);
				},
			}
		}

		self.chain
			.call_transfer_resolve(
				transfer.transfer_definition,
				chain_id,
				&transfer.transfer_state,
				&transfer.balance,
				resolver,
			)
			.await
	}
}
