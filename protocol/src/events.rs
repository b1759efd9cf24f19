use duplex_primitives::types::{
	Address,
	AssetId,
	Nonce,
	TransferId,
};
use duplex_state_machine::{
	machine::{
		TransferChange,
		TransitionResult,
	},
	types::UpdateDetails,
};

/// Notification of an accepted update, published after the round's storage
/// write. Subscribers observe a channel's events in nonce order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChannelEvent {
	ChannelSetup {
		channel_address: Address,
		nonce: Nonce,
	},
	DepositReconciled {
		channel_address: Address,
		asset_id: AssetId,
		nonce: Nonce,
	},
	TransferCreated {
		channel_address: Address,
		transfer_id: TransferId,
		nonce: Nonce,
	},
	TransferResolved {
		channel_address: Address,
		transfer_id: TransferId,
		nonce: Nonce,
	},
}

impl ChannelEvent {
	/// The event an accepted transition announces.
	pub fn from_transition(result: &TransitionResult) -> Option<Self> {
		let state = &result.new_state;
		let update = state.latest_update.as_ref()?;
		let event = match (&update.details, &result.transfer_change) {
			(UpdateDetails::Setup(_), _) => ChannelEvent::ChannelSetup {
				channel_address: state.core.channel_address,
				nonce: state.core.nonce,
			},
			(UpdateDetails::Deposit(_), _) => ChannelEvent::DepositReconciled {
				channel_address: state.core.channel_address,
				asset_id: update.asset_id,
				nonce: state.core.nonce,
			},
			(UpdateDetails::Create(_), Some(TransferChange::Created(transfer))) =>
				ChannelEvent::TransferCreated {
					channel_address: state.core.channel_address,
					transfer_id: transfer.transfer_id,
					nonce: state.core.nonce,
				},
			(UpdateDetails::Resolve(_), Some(TransferChange::Resolved(transfer))) =>
				ChannelEvent::TransferResolved {
					channel_address: state.core.channel_address,
					transfer_id: transfer.transfer_id,
					nonce: state.core.nonce,
				},
			_ => return None,
		};
		Some(event)
	}
}
