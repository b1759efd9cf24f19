#![warn(clippy::missing_docs_in_private_items)]

use web3::{
	ethabi::{
		encode,
		Token,
	},
	signing::keccak256,
	types::U256,
};

use crate::types::{
	Address,
	Bytes,
	ChannelCommitment,
	CommitmentTypeId,
	NetworkContext,
	TransferId,
	TransferTimeout,
	H256,
};

/// Canonical encoding of a channel commitment, excluding signatures.
///
/// Field order follows the commitment's declared order: chain id, core state
/// fields, adjudicator address. Addresses and 32-byte words go in raw,
/// integers ABI-encoded, lists prefixed with their length. The adjudicator
/// verifies signatures against the identical encoding, so this must stay
/// byte-for-byte stable.
pub fn pack_channel_commitment(commitment: &ChannelCommitment) -> Bytes {
	let state = &commitment.state;
	let mut b = vec![];

	b.extend(encode(&[Token::Uint(commitment.chain_id.into())]));
	b.extend(encode(&[Token::Uint(U256::from(CommitmentTypeId::ChannelState as u8))]));
	b.extend(state.channel_address.as_bytes());
	for participant in &state.participants {
		b.extend(participant.as_bytes());
	}
	b.extend(encode(&[Token::Uint(state.timeout)]));
	b.extend(encode(&[Token::Uint(U256::from(state.asset_ids.len()))]));
	for (index, asset_id) in state.asset_ids.iter().enumerate() {
		b.extend(asset_id.as_bytes());
		let balance = &state.balances[index];
		for to in &balance.to {
			b.extend(to.as_bytes());
		}
		for amount in &balance.amount {
			b.extend(encode(&[Token::Uint(*amount)]));
		}
		b.extend(encode(&[Token::Uint(state.locked_balance[index])]));
	}
	b.extend(encode(&[Token::Uint(state.nonce)]));
	b.extend(encode(&[Token::Uint(state.latest_deposit_nonce)]));
	b.extend(state.merkle_root.as_bytes());
	b.extend(commitment.adjudicator_address.as_bytes());

	Bytes(b)
}

/// Canonical encoding of a transfer commitment, the preimage of a merkle
/// leaf. The initial state enters through its keccak digest so that leaves
/// stay fixed-width.
pub fn pack_transfer_commitment(
	channel_address: Address,
	transfer_id: TransferId,
	transfer_definition: Address,
	transfer_timeout: TransferTimeout,
	initial_state: &Bytes,
) -> Bytes {
	let mut b = vec![];

	b.extend(encode(&[Token::Uint(U256::from(CommitmentTypeId::TransferState as u8))]));
	b.extend(channel_address.as_bytes());
	b.extend(transfer_id.as_bytes());
	b.extend(transfer_definition.as_bytes());
	b.extend(encode(&[Token::Uint(transfer_timeout)]));
	b.extend(keccak256(&initial_state.0));

	Bytes(b)
}

/// Deterministic channel address for a participant pair under a network
/// context. Low 20 bytes of the keccak digest over the packed inputs.
pub fn derive_channel_address(
	participants: &[Address; 2],
	network_context: &NetworkContext,
) -> Address {
	let mut b = vec![];

	for participant in participants {
		b.extend(participant.as_bytes());
	}
	let chain_id: Vec<u8> = network_context.chain_id.into();
	b.extend(chain_id);
	b.extend(network_context.adjudicator_address.as_bytes());

	let hash = keccak256(&b);
	Address::from_slice(&hash[12..])
}

/// Merkle leaf of an active transfer.
pub fn transfer_leaf(
	channel_address: Address,
	transfer_id: TransferId,
	transfer_definition: Address,
	transfer_timeout: TransferTimeout,
	initial_state: &Bytes,
) -> H256 {
	let packed = pack_transfer_commitment(
		channel_address,
		transfer_id,
		transfer_definition,
		transfer_timeout,
		initial_state,
	);
	H256::from_slice(&keccak256(&packed.0))
}
