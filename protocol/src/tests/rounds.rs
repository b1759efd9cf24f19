use std::sync::Arc;

use duplex_messaging::{
	bus::MemoryBus,
	MessagingError,
};
use duplex_primitives::{
	constants::MERKLE_ROOT_OF_NO_TRANSFERS,
	types::{
		AssetId,
		DepositNonce,
		LockedAmount,
		Nonce,
		TokenAmount,
	},
};
use duplex_state_machine::machine::{
	utils::compute_merkle_root,
	validators::validate_commitment_signatures,
};
use duplex_storage::ChannelStorage;

use crate::{
	errors::ProtocolError,
	events::ChannelEvent,
	manager::{
		CreateTransferParams,
		ResolveTransferParams,
	},
	tests::factories::{
		hashlock_definition,
		hashlock_pair,
		hashlock_resolver,
		hashlock_state,
		make_node,
		network_context,
		Keyring,
		MockChainReader,
	},
};

#[tokio::test]
async fn test_setup_round() {
	let bus = Arc::new(MemoryBus::new());
	let chain = Arc::new(MockChainReader::new());
	let alice = make_node(bus.clone(), chain.clone(), Keyring::Alice);
	let bob = make_node(bus, chain, Keyring::Bob);
	bob.protocol.serve().await.expect("Responder should start");

	let state = alice
		.protocol
		.setup(bob.protocol.our_identifier(), network_context(), 86_400u64.into())
		.await
		.expect("Setup round should complete");

	assert_eq!(state.core.nonce, Nonce::from(1u64));
	assert_eq!(state.core.latest_deposit_nonce, DepositNonce::zero());
	assert!(state.core.balances.is_empty());
	assert_eq!(state.core.merkle_root, *MERKLE_ROOT_OF_NO_TRANSFERS);
	assert_eq!(
		state.core.participants,
		[alice.protocol.our_address(), bob.protocol.our_address()]
	);

	let update = state.latest_update.as_ref().expect("State should carry its update");
	validate_commitment_signatures(&state, update, 2)
		.expect("Both signatures should recover to the participants");

	let bob_state = bob
		.storage
		.load_channel(state.core.channel_address)
		.expect("Load should succeed")
		.expect("Responder should have persisted the channel");
	assert_eq!(bob_state.core, state.core);
}

#[tokio::test]
async fn test_deposit_round() {
	let bus = Arc::new(MemoryBus::new());
	let chain = Arc::new(MockChainReader::new());
	let alice = make_node(bus.clone(), chain.clone(), Keyring::Alice);
	let bob = make_node(bus, chain.clone(), Keyring::Bob);
	bob.protocol.serve().await.expect("Responder should start");

	let state = alice
		.protocol
		.setup(bob.protocol.our_identifier(), network_context(), 86_400u64.into())
		.await
		.expect("Setup round should complete");
	let channel_address = state.core.channel_address;
	let asset_id = AssetId::zero();

	chain.set_balance(channel_address, asset_id, 100);
	chain.set_deposit(channel_address, asset_id, 100, 1);

	let state = alice
		.protocol
		.deposit(channel_address, asset_id)
		.await
		.expect("Deposit round should complete");

	assert_eq!(state.core.nonce, Nonce::from(2u64));
	assert_eq!(state.core.latest_deposit_nonce, DepositNonce::from(1u64));
	assert_eq!(
		state.core.balances[0].amount,
		[TokenAmount::from(100u64), TokenAmount::zero()]
	);

	let bob_state = bob
		.storage
		.load_channel(channel_address)
		.expect("Load should succeed")
		.expect("Responder should have the channel");
	assert_eq!(bob_state.core, state.core);
}

#[tokio::test]
async fn test_create_and_resolve_round() {
	let bus = Arc::new(MemoryBus::new());
	let chain = Arc::new(MockChainReader::new());
	let alice = make_node(bus.clone(), chain.clone(), Keyring::Alice);
	let bob = make_node(bus, chain.clone(), Keyring::Bob);
	alice.protocol.serve().await.expect("Responder should start");
	bob.protocol.serve().await.expect("Responder should start");

	let state = alice
		.protocol
		.setup(bob.protocol.our_identifier(), network_context(), 86_400u64.into())
		.await
		.expect("Setup round should complete");
	let channel_address = state.core.channel_address;
	let asset_id = AssetId::zero();

	chain.set_balance(channel_address, asset_id, 100);
	chain.set_deposit(channel_address, asset_id, 100, 1);
	alice
		.protocol
		.deposit(channel_address, asset_id)
		.await
		.expect("Deposit round should complete");

	let (preimage, lock_hash) = hashlock_pair();
	let state = alice
		.protocol
		.create_transfer(
			channel_address,
			CreateTransferParams {
				asset_id,
				amount: TokenAmount::from(40u64),
				transfer_definition: hashlock_definition(),
				transfer_timeout: 3_600u64.into(),
				transfer_initial_state: hashlock_state(lock_hash),
				transfer_encodings: Default::default(),
				meta: None,
			},
		)
		.await
		.expect("Create round should complete");

	assert_eq!(state.core.nonce, Nonce::from(3u64));
	assert_eq!(
		state.core.balances[0].amount,
		[TokenAmount::from(60u64), TokenAmount::zero()]
	);
	assert_eq!(state.core.locked_balance, vec![LockedAmount::from(40u64)]);

	let bob_transfers = bob
		.storage
		.load_active_transfers(channel_address)
		.expect("Transfers should load");
	assert_eq!(bob_transfers.len(), 1);
	let transfer = &bob_transfers[0];
	assert_eq!(state.core.merkle_root, compute_merkle_root(vec![transfer.leaf()]));

	// Bob learned the preimage and releases the lock.
	let state = bob
		.protocol
		.resolve_transfer(
			channel_address,
			ResolveTransferParams {
				transfer_id: transfer.transfer_id,
				transfer_resolver: hashlock_resolver(preimage),
				meta: None,
			},
		)
		.await
		.expect("Resolve round should complete");

	assert_eq!(state.core.nonce, Nonce::from(4u64));
	assert_eq!(
		state.core.balances[0].amount,
		[TokenAmount::from(60u64), TokenAmount::from(40u64)]
	);
	assert_eq!(state.core.locked_balance, vec![LockedAmount::zero()]);
	assert_eq!(state.core.merkle_root, *MERKLE_ROOT_OF_NO_TRANSFERS);

	for node in [&alice, &bob] {
		let transfers = node
			.storage
			.load_active_transfers(channel_address)
			.expect("Transfers should load");
		assert!(transfers.is_empty());
	}
	let alice_state = alice
		.storage
		.load_channel(channel_address)
		.expect("Load should succeed")
		.expect("Initiator side should have the channel");
	assert_eq!(alice_state.core, state.core);
}

#[tokio::test]
async fn test_events_follow_nonce_order() {
	let bus = Arc::new(MemoryBus::new());
	let chain = Arc::new(MockChainReader::new());
	let alice = make_node(bus.clone(), chain.clone(), Keyring::Alice);
	let bob = make_node(bus, chain.clone(), Keyring::Bob);
	alice.protocol.serve().await.expect("Responder should start");
	bob.protocol.serve().await.expect("Responder should start");

	let mut events = alice.protocol.subscribe_events();

	let state = alice
		.protocol
		.setup(bob.protocol.our_identifier(), network_context(), 86_400u64.into())
		.await
		.expect("Setup round should complete");
	let channel_address = state.core.channel_address;
	let asset_id = AssetId::zero();

	chain.set_balance(channel_address, asset_id, 100);
	chain.set_deposit(channel_address, asset_id, 100, 1);
	alice
		.protocol
		.deposit(channel_address, asset_id)
		.await
		.expect("Deposit round should complete");

	let (preimage, lock_hash) = hashlock_pair();
	alice
		.protocol
		.create_transfer(
			channel_address,
			CreateTransferParams {
				asset_id,
				amount: TokenAmount::from(40u64),
				transfer_definition: hashlock_definition(),
				transfer_timeout: 3_600u64.into(),
				transfer_initial_state: hashlock_state(lock_hash),
				transfer_encodings: Default::default(),
				meta: None,
			},
		)
		.await
		.expect("Create round should complete");
	let transfer_id = alice
		.storage
		.load_active_transfers(channel_address)
		.expect("Transfers should load")[0]
		.transfer_id;

	bob.protocol
		.resolve_transfer(
			channel_address,
			ResolveTransferParams {
				transfer_id,
				transfer_resolver: hashlock_resolver(preimage),
				meta: None,
			},
		)
		.await
		.expect("Resolve round should complete");

	let mut seen = vec![];
	while let Ok(event) = events.try_recv() {
		seen.push(event);
	}
	let nonces: Vec<u64> = seen
		.iter()
		.map(|event| match event {
			ChannelEvent::ChannelSetup { nonce, .. } => nonce.as_u64(),
			ChannelEvent::DepositReconciled { nonce, .. } => nonce.as_u64(),
			ChannelEvent::TransferCreated { nonce, .. } => nonce.as_u64(),
			ChannelEvent::TransferResolved { nonce, .. } => nonce.as_u64(),
		})
		.collect();
	assert_eq!(nonces, vec![1, 2, 3, 4]);
	assert!(matches!(seen[0], ChannelEvent::ChannelSetup { .. }));
	assert!(matches!(seen[3], ChannelEvent::TransferResolved { .. }));
}

#[tokio::test]
async fn test_round_times_out_without_responder() {
	let bus = Arc::new(MemoryBus::new());
	let chain = Arc::new(MockChainReader::new());
	let alice = make_node(bus.clone(), chain.clone(), Keyring::Alice);
	let bob = make_node(bus, chain, Keyring::Bob);

	// Bob never serves.
	let result = alice
		.protocol
		.setup(bob.protocol.our_identifier(), network_context(), 86_400u64.into())
		.await;

	assert!(matches!(
		result,
		Err(ProtocolError::Messaging(MessagingError::Timeout))
	));
}

#[tokio::test]
async fn test_responder_rejects_diverging_deposit() {
	let bus = Arc::new(MemoryBus::new());
	let alice_chain = Arc::new(MockChainReader::new());
	let bob_chain = Arc::new(MockChainReader::new());
	let alice = make_node(bus.clone(), alice_chain.clone(), Keyring::Alice);
	let bob = make_node(bus, bob_chain.clone(), Keyring::Bob);
	bob.protocol.serve().await.expect("Responder should start");

	let state = alice
		.protocol
		.setup(bob.protocol.our_identifier(), network_context(), 86_400u64.into())
		.await
		.expect("Setup round should complete");
	let channel_address = state.core.channel_address;
	let asset_id = AssetId::zero();

	// Alice's chain view disagrees with bob's.
	alice_chain.set_balance(channel_address, asset_id, 100);
	alice_chain.set_deposit(channel_address, asset_id, 100, 1);
	bob_chain.set_balance(channel_address, asset_id, 50);
	bob_chain.set_deposit(channel_address, asset_id, 50, 1);

	let result = alice.protocol.deposit(channel_address, asset_id).await;
	match result {
		Err(ProtocolError::Rejected { error, .. }) => {
			assert_eq!(error.reason, "ConservationViolated");
		},
		other => panic!("Expected a rejection, got {:?}", other.map(|s| s.core.nonce)),
	}
}
