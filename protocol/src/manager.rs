#![warn(clippy::missing_docs_in_private_items)]

use std::{
	collections::HashMap,
	sync::Arc,
	time::Duration,
};

use duplex_blockchain::{
	keys::{
		signature_to_bytes,
		PrivateKey,
	},
	programs::ProgramExecutor,
	proxies::ChainReader,
};
use duplex_messaging::{
	bus::MessageBus,
	service::ProtocolMessenger,
};
use duplex_primitives::{
	identifiers::address_from_identifier,
	packing::derive_channel_address,
	signing::hash_commitment,
	types::{
		Address,
		AssetId,
		Balance,
		Bytes,
		ChannelTimeout,
		NetworkContext,
		Nonce,
		PublicIdentifier,
		Signature,
		TokenAmount,
		TransferId,
		TransferTimeout,
		H256,
	},
};
use duplex_state_machine::{
	errors::ChannelError,
	machine::{
		apply_update,
		utils::{
			compute_merkle_root,
			transfer_leaves,
		},
		validators::{
			validate_commitment_signatures,
			validate_update,
		},
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
use duplex_storage::ChannelStorage;
use parking_lot::Mutex;
use tokio::sync::{
	broadcast,
	Mutex as ChannelLease,
};
use tracing::debug;
use web3::signing::{
	keccak256,
	Key,
};

use crate::{
	constants::{
		DEFAULT_MAX_RETRIES,
		DEFAULT_REPLY_TIMEOUT,
		EVENT_CHANNEL_SIZE,
	},
	errors::ProtocolError,
	events::ChannelEvent,
	reconcile::reconcile_deposit,
};

/// Tunables of the update exchange.
#[derive(Clone, Debug)]
pub struct ProtocolConfig {
	/// How long to wait for the counterparty's reply per attempt.
	pub reply_timeout: Duration,
	/// Additional attempts after the first, each with a fresh inbox.
	pub max_retries: u32,
}

impl Default for ProtocolConfig {
	fn default() -> Self {
		Self { reply_timeout: DEFAULT_REPLY_TIMEOUT, max_retries: DEFAULT_MAX_RETRIES }
	}
}

/// Caller-facing description of a transfer to create.
#[derive(Clone, Debug)]
pub struct CreateTransferParams {
	pub asset_id: AssetId,
	pub amount: TokenAmount,
	pub transfer_definition: Address,
	pub transfer_timeout: TransferTimeout,
	pub transfer_initial_state: Bytes,
	pub transfer_encodings: TransferEncodings,
	pub meta: Option<serde_json::Value>,
}

/// Caller-facing description of a transfer resolution.
#[derive(Clone, Debug)]
pub struct ResolveTransferParams {
	pub transfer_id: TransferId,
	pub transfer_resolver: Bytes,
	pub meta: Option<serde_json::Value>,
}

/// The protocol driver of one node.
///
/// Owns the initiator side of every update round and, once served, the
/// responder side. At most one round runs per channel at a time; the lease
/// map serializes concurrent attempts without preemption.
pub struct ChannelProtocol<B: MessageBus + 'static> {
	/// Persistence collaborator.
	pub(crate) storage: Arc<dyn ChannelStorage>,
	/// Correlated request/response endpoint.
	pub(crate) messenger: ProtocolMessenger<B>,
	/// Shared chain reader.
	pub(crate) chain: Arc<dyn ChainReader>,
	/// Condition program executor.
	pub(crate) executor: Arc<ProgramExecutor>,
	/// This node's signing key.
	private_key: PrivateKey,
	/// Round tunables.
	pub(crate) config: ProtocolConfig,
	/// Exclusive leases by channel address.
	channel_locks: Mutex<HashMap<Address, Arc<ChannelLease<()>>>>,
	/// Accepted update notifications.
	event_sender: broadcast::Sender<ChannelEvent>,
}

impl<B: MessageBus + 'static> ChannelProtocol<B> {
	/// Returns a new instance of `ChannelProtocol`.
	pub fn new(
		storage: Arc<dyn ChannelStorage>,
		messenger: ProtocolMessenger<B>,
		chain: Arc<dyn ChainReader>,
		executor: Arc<ProgramExecutor>,
		private_key: PrivateKey,
		config: ProtocolConfig,
	) -> Self {
		let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
		Self {
			storage,
			messenger,
			chain,
			executor,
			private_key,
			config,
			channel_locks: Mutex::new(HashMap::new()),
			event_sender,
		}
	}

	/// This node's on-chain address.
	pub fn our_address(&self) -> Address {
		self.private_key.address()
	}

	/// This node's routing identifier.
	pub fn our_identifier(&self) -> PublicIdentifier {
		self.messenger.our_identifier().clone()
	}

	/// Subscribe to accepted update notifications.
	pub fn subscribe_events(&self) -> broadcast::Receiver<ChannelEvent> {
		self.event_sender.subscribe()
	}

	/// The exclusive lease guarding `channel_address`.
	pub(crate) fn channel_lease(&self, channel_address: Address) -> Arc<ChannelLease<()>> {
		self.channel_locks
			.lock()
			.entry(channel_address)
			.or_insert_with(|| Arc::new(ChannelLease::new(())))
			.clone()
	}

	/// Set up a new channel with `counterparty`. The initiator takes the
	/// alice slot for the life of the channel.
	pub async fn setup(
		&self,
		counterparty: PublicIdentifier,
		network_context: NetworkContext,
		timeout: ChannelTimeout,
	) -> Result<FullChannelState, ProtocolError> {
		let counterparty_address = address_from_identifier(&counterparty).ok_or_else(|| {
			ProtocolError::Validation(ChannelError::BadParticipants(format!(
				"Counterparty identifier is malformed: {}",
				counterparty
			)))
		})?;
		let participants = [self.our_address(), counterparty_address];
		let channel_address = derive_channel_address(&participants, &network_context);

		let lease = self.channel_lease(channel_address);
		let _guard = lease.lock().await;

		if self.storage.load_channel(channel_address)?.is_some() {
			return Err(ProtocolError::Validation(ChannelError::InvalidUpdate(
				"Channel is already set up".to_owned(),
			)))
		}

		let update = ChannelUpdate {
			channel_address,
			from_identifier: self.our_identifier(),
			to_identifier: counterparty,
			nonce: 1u64.into(),
			balance: Balance::zero(participants),
			asset_id: AssetId::zero(),
			details: UpdateDetails::Setup(SetupDetails { timeout, network_context }),
			signatures: [None, None],
		};

		self.run_round(None, update).await
	}

	/// Absorb on-chain deposits for `asset_id` into the channel balance.
	pub async fn deposit(
		&self,
		channel_address: Address,
		asset_id: AssetId,
	) -> Result<FullChannelState, ProtocolError> {
		let lease = self.channel_lease(channel_address);
		let _guard = lease.lock().await;

		let mut resynced = false;
		loop {
			let state = self
				.storage
				.load_channel(channel_address)?
				.ok_or(ProtocolError::ChannelNotFound(channel_address))?;
			let (balance, latest_deposit_nonce) =
				reconcile_deposit(self.chain.as_ref(), &state, asset_id).await?;

			let update = ChannelUpdate {
				channel_address,
				from_identifier: self.our_identifier(),
				to_identifier: self.counterparty_identifier(&state)?,
				nonce: views::next_nonce(&state),
				balance,
				asset_id,
				details: UpdateDetails::Deposit(DepositDetails { latest_deposit_nonce }),
				signatures: [None, None],
			};

			match self.run_round(Some(&state), update).await {
				Err(error) if self.should_resync(&error, &mut resynced) => {
					self.adopt_counterparty_state(channel_address, &error).await?;
				},
				outcome => return outcome,
			}
		}
	}

	/// Lock `params.amount` under a condition program.
	pub async fn create_transfer(
		&self,
		channel_address: Address,
		params: CreateTransferParams,
	) -> Result<FullChannelState, ProtocolError> {
		let lease = self.channel_lease(channel_address);
		let _guard = lease.lock().await;

		let mut resynced = false;
		loop {
			let state = self
				.storage
				.load_channel(channel_address)?
				.ok_or(ProtocolError::ChannelNotFound(channel_address))?;
			let our_index = self.our_participant_index(&state)?;
			let counterparty_index = 1 - our_index;

			let transfer_balance = Balance {
				to: [
					state.core.participants[our_index],
					state.core.participants[counterparty_index],
				],
				amount: [params.amount, TokenAmount::zero()],
			};
			let transfer_id = derive_transfer_id(
				channel_address,
				params.transfer_definition,
				views::next_nonce(&state),
				&params.transfer_initial_state,
			);
			let transfer = FullTransferState {
				transfer_id,
				channel_address,
				initiator: state.core.participants[our_index],
				transfer_definition: params.transfer_definition,
				transfer_encodings: params.transfer_encodings.clone(),
				transfer_state: params.transfer_initial_state.clone(),
				transfer_resolver: None,
				transfer_timeout: params.transfer_timeout,
				asset_id: params.asset_id,
				balance: transfer_balance.clone(),
				meta: params.meta.clone(),
			};

			let accepted = self
				.executor
				.execute_create(&transfer, state.network_context.chain_id)
				.await?;
			if !accepted {
				return Err(ProtocolError::Validation(ChannelError::TransferNotAccepted(
					"Condition program rejected the proposed lock".to_owned(),
				)))
			}

			let mut balance = views::free_balance(&state.core, params.asset_id)
				.cloned()
				.unwrap_or_else(|| Balance::zero(state.core.participants));
			balance.amount[our_index] =
				balance.amount[our_index].saturating_sub(params.amount);

			let update = ChannelUpdate {
				channel_address,
				from_identifier: self.our_identifier(),
				to_identifier: self.counterparty_identifier(&state)?,
				nonce: views::next_nonce(&state),
				balance,
				asset_id: params.asset_id,
				details: UpdateDetails::Create(CreateDetails {
					transfer_id,
					transfer_definition: params.transfer_definition,
					transfer_timeout: params.transfer_timeout,
					transfer_initial_state: params.transfer_initial_state.clone(),
					transfer_encodings: params.transfer_encodings.clone(),
					balance: transfer_balance,
					meta: params.meta.clone(),
				}),
				signatures: [None, None],
			};

			match self.run_round(Some(&state), update).await {
				Err(error) if self.should_resync(&error, &mut resynced) => {
					self.adopt_counterparty_state(channel_address, &error).await?;
				},
				outcome => return outcome,
			}
		}
	}

	/// Release an active transfer per its condition program's verdict.
	pub async fn resolve_transfer(
		&self,
		channel_address: Address,
		params: ResolveTransferParams,
	) -> Result<FullChannelState, ProtocolError> {
		let lease = self.channel_lease(channel_address);
		let _guard = lease.lock().await;

		let mut resynced = false;
		loop {
			let state = self
				.storage
				.load_channel(channel_address)?
				.ok_or(ProtocolError::ChannelNotFound(channel_address))?;
			let active_transfers = self.storage.load_active_transfers(channel_address)?;
			let transfer = views::get_transfer(&active_transfers, params.transfer_id)
				.ok_or(ProtocolError::Validation(ChannelError::TransferNotActive(
					params.transfer_id,
				)))?
				.clone();

			let outcome = self
				.executor
				.execute_resolve(
					&transfer,
					&params.transfer_resolver,
					state.network_context.chain_id,
				)
				.await?;
			let previous_balance = views::free_balance(&state.core, transfer.asset_id)
				.cloned()
				.unwrap_or_else(|| Balance::zero(state.core.participants));
			let balance = resolved_channel_balance(
				&previous_balance,
				&outcome,
				&state.core.participants,
			)?;

			let update = ChannelUpdate {
				channel_address,
				from_identifier: self.our_identifier(),
				to_identifier: self.counterparty_identifier(&state)?,
				nonce: views::next_nonce(&state),
				balance,
				asset_id: transfer.asset_id,
				details: UpdateDetails::Resolve(ResolveDetails {
					transfer_id: params.transfer_id,
					transfer_resolver: params.transfer_resolver.clone(),
					meta: params.meta.clone(),
				}),
				signatures: [None, None],
			};

			match self.run_round(Some(&state), update).await {
				Err(error) if self.should_resync(&error, &mut resynced) => {
					self.adopt_counterparty_state(channel_address, &error).await?;
				},
				outcome => return outcome,
			}
		}
	}

	/// Drive one full update round as the initiator: structural validation,
	/// half-signing, the messaging exchange, full validation of the reply
	/// and the transactional write.
	async fn run_round(
		&self,
		previous_state: Option<&FullChannelState>,
		mut update: ChannelUpdate,
	) -> Result<FullChannelState, ProtocolError> {
		let active_transfers = match previous_state {
			Some(state) => self.storage.load_active_transfers(state.core.channel_address)?,
			None => vec![],
		};

		let candidate = apply_update(previous_state, &update, &active_transfers)
			.map_err(ProtocolError::Validation)?;
		validate_update(previous_state, &update, &candidate.new_state, &active_transfers, 0)
			.map_err(ProtocolError::Validation)?;

		let our_index = views::participant_index_by_address(
			&candidate.new_state.core,
			self.our_address(),
		)
		.ok_or_else(|| {
			ProtocolError::Validation(ChannelError::BadParticipants(
				"Own address is not a channel participant".to_owned(),
			))
		})?;
		update.signatures[our_index] = Some(self.sign_state(&candidate.new_state)?);

		let previous_update = previous_state.and_then(|state| state.latest_update.clone());
		let counterparty = update.to_identifier.clone();
		debug!(
			message = "Initiating update round",
			update_type = update.type_name(),
			nonce = update.nonce.as_u64(),
			counterparty = counterparty.as_str(),
		);
		let reply = self
			.messenger
			.send_protocol(
				counterparty,
				update.clone(),
				previous_update,
				self.config.reply_timeout,
				self.config.max_retries,
			)
			.await?;

		if let Some(error) = reply.error {
			debug!(
				message = "Counterparty rejected the round",
				reason = error.reason.as_str(),
			);
			return Err(ProtocolError::Rejected { error, latest_update: reply.previous_update })
		}
		let signed_update = reply.update.ok_or_else(|| {
			ProtocolError::Messaging(duplex_messaging::MessagingError::Unknown(
				"Reply carried neither update nor error".to_owned(),
			))
		})?;

		// The counterparty must return our update untouched, countersigned.
		if signed_update.details != update.details ||
			signed_update.nonce != update.nonce ||
			signed_update.signatures[our_index] != update.signatures[our_index]
		{
			return Err(ProtocolError::Validation(ChannelError::InvalidUpdate(
				"Counterparty altered the update it countersigned".to_owned(),
			)))
		}

		let result = apply_update(previous_state, &signed_update, &active_transfers)
			.map_err(ProtocolError::Validation)?;
		validate_update(
			previous_state,
			&signed_update,
			&result.new_state,
			&active_transfers,
			2,
		)
		.map_err(ProtocolError::Validation)?;

		self.persist_round(&result)?;
		Ok(result.new_state)
	}

	/// Write the accepted round and publish its event.
	pub(crate) fn persist_round(&self, result: &TransitionResult) -> Result<(), ProtocolError> {
		let update = result
			.new_state
			.latest_update
			.as_ref()
			.ok_or_else(|| ProtocolError::SyncFailed("Accepted state lost its update".into()))?;
		let commitment = result.new_state.commitment_with_signatures(update);
		self.storage.save_channel(
			&result.new_state,
			&commitment,
			result.transfer_change.as_ref(),
		)?;

		if let Some(event) = ChannelEvent::from_transition(result) {
			let _ = self.event_sender.send(event);
		}
		Ok(())
	}

	/// Sign the commitment of `state` with our key.
	pub(crate) fn sign_state(
		&self,
		state: &FullChannelState,
	) -> Result<Signature, ProtocolError> {
		let digest = hash_commitment(&state.commitment());
		let signature = self
			.private_key
			.sign(&digest, None)
			.map_err(|e| ProtocolError::Signer(format!("{:?}", e)))?;
		Ok(Bytes(signature_to_bytes(signature)))
	}

	/// Our slot in the channel's participant order.
	pub(crate) fn our_participant_index(
		&self,
		state: &FullChannelState,
	) -> Result<usize, ProtocolError> {
		views::participant_index_by_address(&state.core, self.our_address()).ok_or_else(|| {
			ProtocolError::Validation(ChannelError::BadParticipants(
				"Own address is not a channel participant".to_owned(),
			))
		})
	}

	/// The other participant's routing identifier.
	pub(crate) fn counterparty_identifier(
		&self,
		state: &FullChannelState,
	) -> Result<PublicIdentifier, ProtocolError> {
		let our_index = self.our_participant_index(state)?;
		Ok(state.public_identifiers[1 - our_index].clone())
	}

	/// A stale-update rejection triggers exactly one resynchronization.
	fn should_resync(&self, error: &ProtocolError, resynced: &mut bool) -> bool {
		let stale = matches!(
			error,
			ProtocolError::Rejected { error, .. } if error.reason == "StaleUpdate"
		);
		if stale && !*resynced {
			*resynced = true;
			return true
		}
		false
	}

	/// Adopt the counterparty's dual-signed latest state attached to a
	/// stale-update rejection, then let the caller restart the round.
	async fn adopt_counterparty_state(
		&self,
		channel_address: Address,
		error: &ProtocolError,
	) -> Result<(), ProtocolError> {
		let rejection = match error {
			ProtocolError::Rejected { error, .. } => error,
			_ => return Err(ProtocolError::SyncFailed("Not a rejection".to_owned())),
		};
		let state_json = rejection.context.get("state").ok_or_else(|| {
			ProtocolError::SyncFailed("Counterparty did not attach its state".to_owned())
		})?;
		let latest_state: FullChannelState = serde_json::from_str(state_json)
			.map_err(|e| ProtocolError::SyncFailed(format!("Attached state invalid: {}", e)))?;
		let transfers_json = rejection.context.get("activeTransfers").ok_or_else(|| {
			ProtocolError::SyncFailed("Counterparty did not attach its transfers".to_owned())
		})?;
		let active_transfers: Vec<FullTransferState> = serde_json::from_str(transfers_json)
			.map_err(|e| {
				ProtocolError::SyncFailed(format!("Attached transfers invalid: {}", e))
			})?;

		if latest_state.core.channel_address != channel_address {
			return Err(ProtocolError::SyncFailed(
				"Attached state names a different channel".to_owned(),
			))
		}
		let local_nonce = self
			.storage
			.load_channel(channel_address)?
			.map(|state| state.core.nonce)
			.unwrap_or_default();
		if latest_state.core.nonce <= local_nonce {
			return Err(ProtocolError::SyncFailed(format!(
				"Attached state nonce {} is not ahead of ours ({})",
				latest_state.core.nonce, local_nonce
			)))
		}

		let latest_update = latest_state.latest_update.clone().ok_or_else(|| {
			ProtocolError::SyncFailed("Attached state carries no update".to_owned())
		})?;
		if latest_update.nonce != latest_state.core.nonce {
			return Err(ProtocolError::SyncFailed(
				"Attached update does not produce the attached state".to_owned(),
			))
		}
		// The dual signature over the attached commitment is the proof both
		// parties accepted it; without ours it cannot bind us.
		validate_commitment_signatures(&latest_state, &latest_update, 2)
			.map_err(ProtocolError::Validation)?;

		let root = compute_merkle_root(transfer_leaves(&active_transfers));
		if root != latest_state.core.merkle_root {
			return Err(ProtocolError::SyncFailed(
				"Attached transfers do not hash to the attached merkle root".to_owned(),
			))
		}

		debug!(
			message = "Adopting counterparty state",
			nonce = latest_state.core.nonce.as_u64(),
		);
		let commitment = latest_state.commitment_with_signatures(&latest_update);
		self.storage.save_channel(&latest_state, &commitment, None)?;
		// Rebuild our transfer table to match the adopted root.
		for transfer in self.storage.load_active_transfers(channel_address)? {
			self.storage.remove_transfer(transfer.transfer_id)?;
		}
		for transfer in &active_transfers {
			self.storage.save_transfer(transfer)?;
		}
		Ok(())
	}
}

/// Deterministic transfer identifier for a create at `nonce`.
pub(crate) fn derive_transfer_id(
	channel_address: Address,
	transfer_definition: Address,
	nonce: Nonce,
	initial_state: &Bytes,
) -> TransferId {
	let mut b = channel_address.as_bytes().to_vec();
	b.extend(transfer_definition.as_bytes());
	let mut nonce_bytes = [0u8; 32];
	nonce.to_big_endian(&mut nonce_bytes);
	b.extend(&nonce_bytes);
	b.extend(keccak256(&initial_state.0));
	H256::from_slice(&keccak256(&b))
}

/// Map a condition program's payout split back onto participant order and
/// credit it on top of the channel's free balance.
pub(crate) fn resolved_channel_balance(
	previous_balance: &Balance,
	outcome: &Balance,
	participants: &[Address; 2],
) -> Result<Balance, ProtocolError> {
	let mut amounts = previous_balance.amount;
	for slot in 0..2 {
		if outcome.amount[slot].is_zero() {
			continue
		}
		let index = participants
			.iter()
			.position(|p| *p == outcome.to[slot])
			.ok_or_else(|| {
				ProtocolError::Validation(ChannelError::BadParticipants(
					"Program verdict pays a stranger".to_owned(),
				))
			})?;
		amounts[index] = amounts[index] + outcome.amount[slot];
	}
	Ok(Balance { to: *participants, amount: amounts })
}
