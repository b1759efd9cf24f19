use duplex_blockchain::{
	errors::ChainError,
	proxies::ChainReader,
};
use duplex_primitives::types::{
	AssetId,
	Balance,
	DepositNonce,
};
use duplex_state_machine::{
	types::FullChannelState,
	views,
};

/// Compute the post-reconciliation balance a deposit update must carry.
///
/// Participant 0 absorbs the latest on-chain deposit when its nonce is ahead
/// of the channel's; an equal nonce means no new deposit and leaves the
/// entry untouched. Participant 1's share is the remainder of the on-chain
/// holdings after participant 0's credit and the locked balance.
pub async fn reconcile_deposit(
	chain: &dyn ChainReader,
	state: &FullChannelState,
	asset_id: AssetId,
) -> Result<(Balance, DepositNonce), ChainError> {
	let channel_address = state.core.channel_address;
	let chain_id = state.network_context.chain_id;

	let onchain_balance = chain
		.get_channel_onchain_balance(channel_address, chain_id, asset_id)
		.await?;
	let record = chain
		.get_latest_deposit_by_asset(
			channel_address,
			chain_id,
			asset_id,
			state.core.latest_deposit_nonce,
		)
		.await?;

	let current = views::free_balance(&state.core, asset_id)
		.cloned()
		.unwrap_or_else(|| Balance::zero(state.core.participants));
	let alice_amount = if record.nonce > state.core.latest_deposit_nonce {
		record.amount + current.amount[0]
	} else {
		current.amount[0]
	};
	let locked = views::locked_balance(&state.core, asset_id);
	let spoken_for = alice_amount + locked;
	if onchain_balance < spoken_for {
		return Err(ChainError::Other(format!(
			"On-chain balance {} cannot cover reconciled funds {}",
			onchain_balance, spoken_for
		)))
	}
	let bob_amount = onchain_balance - spoken_for;

	Ok((
		Balance { to: state.core.participants, amount: [alice_amount, bob_amount] },
		record.nonce,
	))
}
