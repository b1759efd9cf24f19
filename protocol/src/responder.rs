#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use duplex_blockchain::errors::ChainError;
use duplex_messaging::{
	bus::MessageBus,
	messages::{
		MessageError,
		ProtocolPayload,
	},
};
use duplex_primitives::types::{
	Address,
	Balance,
	Inbox,
	PublicIdentifier,
};
use duplex_state_machine::{
	errors::ChannelError,
	machine::{
		apply_update,
		validators::validate_update,
	},
	types::{
		ChannelUpdate,
		FullChannelState,
		FullTransferState,
		UpdateDetails,
	},
	views,
};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
	errors::ProtocolError,
	manager::{
		resolved_channel_balance,
		ChannelProtocol,
	},
	reconcile::reconcile_deposit,
};

impl<B: MessageBus + 'static> ChannelProtocol<B> {
	/// Subscribe to this node's identifier and answer inbound update rounds
	/// until the task is aborted.
	pub async fn serve(self: &Arc<Self>) -> Result<JoinHandle<()>, ProtocolError> {
		let this = self.clone();
		let handle = self
			.messenger
			.on_receive_protocol(move |payload, from, inbox| {
				let this = this.clone();
				async move {
					this.handle_inbound(payload, from, inbox).await;
				}
			})
			.await?;
		Ok(handle)
	}

	/// Drive the responder side of one round: decide, counter-sign or
	/// reject, and always answer on the sender's inbox.
	pub(crate) async fn handle_inbound(
		&self,
		payload: ProtocolPayload,
		from: PublicIdentifier,
		inbox: Inbox,
	) {
		let update = match payload.update {
			Some(update) => update,
			// Stray error payloads outside a round carry nothing to act on.
			None => return,
		};
		let channel_address = update.channel_address;

		let lease = self.channel_lease(channel_address);
		let _guard = lease.lock().await;

		match self.respond_to_update(&update, payload.previous_update.as_ref()).await {
			Ok(signed_update) => {
				let _ = self.messenger.respond(from, inbox, signed_update, None).await;
			},
			Err(error) => {
				debug!(
					message = "Rejecting inbound update",
					update_type = update.type_name(),
					nonce = update.nonce.as_u64(),
					reason = error.to_string().as_str(),
				);
				let (wire_error, latest_update) =
					self.wire_rejection(channel_address, &error, &update);
				let _ = self
					.messenger
					.respond_error(from, inbox, wire_error, latest_update)
					.await;
			},
		}
	}

	/// Validate, apply and counter-sign one inbound update.
	async fn respond_to_update(
		&self,
		update: &ChannelUpdate,
		_claimed_previous: Option<&ChannelUpdate>,
	) -> Result<ChannelUpdate, ProtocolError> {
		let channel_address = update.channel_address;
		let state = self.storage.load_channel(channel_address)?;
		let local_nonce = state.as_ref().map(|s| s.core.nonce).unwrap_or_default();

		if update.nonce <= local_nonce {
			return Err(ProtocolError::Validation(ChannelError::StaleUpdate { local_nonce }))
		}
		if update.nonce > local_nonce + 1 {
			return Err(ProtocolError::Validation(ChannelError::MissingUpdates {
				local_nonce,
			}))
		}

		let active_transfers = match &state {
			Some(_) => self.storage.load_active_transfers(channel_address)?,
			None => vec![],
		};

		self.verify_inbound(update, state.as_ref(), &active_transfers).await?;

		let mut result = apply_update(state.as_ref(), update, &active_transfers)
			.map_err(ProtocolError::Validation)?;
		validate_update(state.as_ref(), update, &result.new_state, &active_transfers, 1)
			.map_err(ProtocolError::Validation)?;

		let proposer_index =
			views::participant_index(&result.new_state, &update.from_identifier).ok_or_else(
				|| {
					ProtocolError::Validation(ChannelError::BadParticipants(format!(
						"Proposer {} is not a channel participant",
						update.from_identifier
					)))
				},
			)?;
		if update.signatures[proposer_index].is_none() {
			return Err(ProtocolError::Validation(ChannelError::BadSignature(
				"Proposer did not sign its own slot".to_owned(),
			)))
		}
		let our_index = self.our_participant_index(&result.new_state)?;
		if our_index == proposer_index {
			return Err(ProtocolError::Validation(ChannelError::BadParticipants(
				"Proposer claims our slot".to_owned(),
			)))
		}

		let mut signed_update = update.clone();
		signed_update.signatures[our_index] = Some(self.sign_state(&result.new_state)?);
		result.new_state.latest_update = Some(signed_update.clone());

		self.persist_round(&result)?;
		Ok(signed_update)
	}

	/// Kind-specific checks that need the chain reader or the program
	/// executor before the pure validation runs.
	async fn verify_inbound(
		&self,
		update: &ChannelUpdate,
		state: Option<&FullChannelState>,
		active_transfers: &[FullTransferState],
	) -> Result<(), ProtocolError> {
		let state = match (&update.details, state) {
			(UpdateDetails::Setup(_), _) => return Ok(()),
			(_, Some(state)) => state,
			(_, None) =>
				return Err(ProtocolError::Validation(ChannelError::InvalidUpdate(
					"Channel does not exist".to_owned(),
				))),
		};

		match &update.details {
			UpdateDetails::Deposit(details) => {
				let (balance, deposit_nonce) =
					reconcile_deposit(self.chain.as_ref(), state, update.asset_id).await?;
				if deposit_nonce != details.latest_deposit_nonce {
					return Err(ProtocolError::Validation(ChannelError::BadDepositNonce {
						current: deposit_nonce,
						proposed: details.latest_deposit_nonce,
					}))
				}
				if balance != update.balance {
					return Err(ProtocolError::Validation(ChannelError::ConservationViolated(
						"Deposit balance does not match our view of the chain".to_owned(),
					)))
				}
			},
			UpdateDetails::Create(details) => {
				let proposer_index = views::participant_index(state, &update.from_identifier)
					.ok_or_else(|| {
						ProtocolError::Validation(ChannelError::BadParticipants(format!(
							"Proposer {} is not a channel participant",
							update.from_identifier
						)))
					})?;
				let transfer = FullTransferState {
					transfer_id: details.transfer_id,
					channel_address: state.core.channel_address,
					initiator: state.core.participants[proposer_index],
					transfer_definition: details.transfer_definition,
					transfer_encodings: details.transfer_encodings.clone(),
					transfer_state: details.transfer_initial_state.clone(),
					transfer_resolver: None,
					transfer_timeout: details.transfer_timeout,
					asset_id: update.asset_id,
					balance: details.balance.clone(),
					meta: details.meta.clone(),
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
			},
			UpdateDetails::Resolve(details) => {
				let transfer = views::get_transfer(active_transfers, details.transfer_id)
					.ok_or(ProtocolError::Validation(ChannelError::TransferNotActive(
						details.transfer_id,
					)))?;
				let outcome = self
					.executor
					.execute_resolve(
						transfer,
						&details.transfer_resolver,
						state.network_context.chain_id,
					)
					.await
					.map_err(|e| match e {
						ChainError::Program(program_error) => ProtocolError::Validation(
							ChannelError::TransferNotAccepted(program_error.to_string()),
						),
						other => ProtocolError::Chain(other),
					})?;
				let previous_balance = views::free_balance(&state.core, transfer.asset_id)
					.cloned()
					.unwrap_or_else(|| Balance::zero(state.core.participants));
				let expected = resolved_channel_balance(
					&previous_balance,
					&outcome,
					&state.core.participants,
				)?;
				if expected != update.balance {
					return Err(ProtocolError::Validation(ChannelError::TransferNotAccepted(
						"Resolved balance does not match the program verdict".to_owned(),
					)))
				}
			},
			UpdateDetails::Setup(_) => {},
		}

		Ok(())
	}

	/// Map a rejection onto the wire, attaching our latest dual-signed
	/// state when the proposer is behind so it can resynchronize.
	fn wire_rejection(
		&self,
		channel_address: Address,
		error: &ProtocolError,
		update: &ChannelUpdate,
	) -> (MessageError, Option<ChannelUpdate>) {
		match error {
			ProtocolError::Validation(channel_error) => {
				let mut wire_error =
					MessageError::from_channel_error(channel_error, Some(update));
				let mut latest_update = None;
				if matches!(channel_error, ChannelError::StaleUpdate { .. }) {
					if let Some((state_json, transfers_json, update)) =
						self.latest_snapshot(channel_address)
					{
						wire_error.context.insert("state".to_owned(), state_json);
						wire_error
							.context
							.insert("activeTransfers".to_owned(), transfers_json);
						latest_update = update;
					}
				}
				(wire_error, latest_update)
			},
			other => {
				let reason = match other {
					ProtocolError::Chain(_) => "ChainError",
					ProtocolError::Storage(_) => "StorageError",
					ProtocolError::Signer(_) => "SignerError",
					ProtocolError::Messaging(_) => "MessagingError",
					_ => "Error",
				};
				let mut context = std::collections::HashMap::new();
				context.insert("message".to_owned(), other.to_string());
				(MessageError { reason: reason.to_owned(), context }, None)
			},
		}
	}

	/// Our latest state and active transfers, serialized for a stale-update
	/// rejection. `None` when the channel or the serialization is missing.
	fn latest_snapshot(
		&self,
		channel_address: Address,
	) -> Option<(String, String, Option<ChannelUpdate>)> {
		let state = self.storage.load_channel(channel_address).ok()??;
		let transfers = self.storage.load_active_transfers(channel_address).ok()?;
		let state_json = serde_json::to_string(&state).ok()?;
		let transfers_json = serde_json::to_string(&transfers).ok()?;
		Some((state_json, transfers_json, state.latest_update))
	}
}
