use std::{
	sync::Arc,
	time::Duration,
};

use duplex_primitives::types::{
	Address,
	AssetId,
	Balance,
	ChainID,
	Inbox,
	NetworkContext,
	Nonce,
};
use duplex_state_machine::types::{
	ChannelUpdate,
	SetupDetails,
	UpdateDetails,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
	bus::{
		MemoryBus,
		MessageBus,
		Subject,
	},
	messages::{
		MessageError,
		ProtocolMessage,
		ProtocolPayload,
	},
	service::ProtocolMessenger,
	MessagingError,
};

fn make_update(nonce: u64) -> ChannelUpdate {
	ChannelUpdate {
		channel_address: Address::zero(),
		from_identifier: "dpxalice".to_owned(),
		to_identifier: "dpxbob".to_owned(),
		nonce: Nonce::from(nonce),
		balance: Balance::zero([Address::zero(), Address::zero()]),
		asset_id: AssetId::zero(),
		details: UpdateDetails::Setup(SetupDetails {
			timeout: 86_400u64.into(),
			network_context: NetworkContext {
				chain_id: ChainID::Mainnet,
				adjudicator_address: Address::zero(),
			},
		}),
		signatures: [None, None],
	}
}

fn make_pair() -> (ProtocolMessenger<MemoryBus>, ProtocolMessenger<MemoryBus>) {
	let bus = Arc::new(MemoryBus::new());
	(
		ProtocolMessenger::new(bus.clone(), "dpxalice".to_owned()),
		ProtocolMessenger::new(bus, "dpxbob".to_owned()),
	)
}

#[tokio::test]
async fn test_round_completes_with_single_reply() {
	let (alice, bob) = make_pair();

	let responder = bob.clone();
	bob.on_receive_protocol(move |payload, from, inbox| {
		let responder = responder.clone();
		async move {
			let update = payload.update.expect("Request should carry an update");
			responder
				.respond(from, inbox, update, None)
				.await
				.expect("Reply should publish");
		}
	})
	.await
	.expect("Responder should subscribe");

	let reply = alice
		.send_protocol(
			"dpxbob".to_owned(),
			make_update(1),
			None,
			Duration::from_millis(500),
			0,
		)
		.await
		.expect("Round should complete");

	assert_eq!(reply.update, Some(make_update(1)));
	assert!(reply.error.is_none());
}

#[tokio::test]
async fn test_send_times_out_without_responder() {
	let (alice, _bob) = make_pair();

	let result = alice
		.send_protocol(
			"dpxbob".to_owned(),
			make_update(1),
			None,
			Duration::from_millis(50),
			0,
		)
		.await;

	assert_eq!(result, Err(MessagingError::Timeout));
}

#[tokio::test]
async fn test_retry_generates_fresh_inbox() {
	let (alice, bob) = make_pair();

	let seen: Arc<Mutex<Vec<Inbox>>> = Arc::new(Mutex::new(vec![]));
	let responder = bob.clone();
	let seen_by_responder = seen.clone();
	bob.on_receive_protocol(move |payload, from, inbox| {
		let responder = responder.clone();
		let seen = seen_by_responder.clone();
		async move {
			let attempts = {
				let mut seen = seen.lock();
				seen.push(inbox);
				seen.len()
			};
			// Stay silent on the first attempt; the retry must arrive on a
			// different inbox.
			if attempts > 1 {
				let update = payload.update.expect("Request should carry an update");
				responder
					.respond(from, inbox, update, None)
					.await
					.expect("Reply should publish");
			}
		}
	})
	.await
	.expect("Responder should subscribe");

	let reply = alice
		.send_protocol(
			"dpxbob".to_owned(),
			make_update(1),
			None,
			Duration::from_millis(100),
			1,
		)
		.await
		.expect("Retry should complete the round");
	assert!(reply.update.is_some());

	let seen = seen.lock();
	assert_eq!(seen.len(), 2);
	assert_ne!(seen[0], seen[1]);
}

#[tokio::test]
async fn test_late_reply_is_discarded() {
	let (alice, bob) = make_pair();

	let (inbox_sender, mut inbox_receiver) = mpsc::unbounded_channel();
	bob.on_receive_protocol(move |_payload, from, inbox| {
		let inbox_sender = inbox_sender.clone();
		async move {
			let _ = inbox_sender.send((from, inbox));
		}
	})
	.await
	.expect("Responder should subscribe");

	let result = alice
		.send_protocol(
			"dpxbob".to_owned(),
			make_update(1),
			None,
			Duration::from_millis(50),
			0,
		)
		.await;
	assert_eq!(result, Err(MessagingError::Timeout));

	// The waiter is deregistered; replying now must not fail nor leak into
	// a later round.
	let (from, stale_inbox) = inbox_receiver.recv().await.expect("Request should arrive");
	bob.respond(from, stale_inbox, make_update(1), None)
		.await
		.expect("Publishing to a dead inbox should be a no-op");

	let result = alice
		.send_protocol(
			"dpxbob".to_owned(),
			make_update(2),
			None,
			Duration::from_millis(50),
			0,
		)
		.await;
	assert_eq!(result, Err(MessagingError::Timeout));
}

#[tokio::test]
async fn test_error_reply_is_returned() {
	let (alice, bob) = make_pair();

	let responder = bob.clone();
	bob.on_receive_protocol(move |_payload, from, inbox| {
		let responder = responder.clone();
		async move {
			let error = MessageError {
				reason: "StaleUpdate".to_owned(),
				context: Default::default(),
			};
			responder
				.respond_error(from, inbox, error, Some(make_update(5)))
				.await
				.expect("Error reply should publish");
		}
	})
	.await
	.expect("Responder should subscribe");

	let reply = alice
		.send_protocol(
			"dpxbob".to_owned(),
			make_update(1),
			None,
			Duration::from_millis(500),
			0,
		)
		.await
		.expect("Negative replies still complete the exchange");

	assert_eq!(reply.error.expect("Reply should carry an error").reason, "StaleUpdate");
	assert_eq!(reply.previous_update, Some(make_update(5)));
}

#[tokio::test]
async fn test_inbox_isolation_across_waiters() {
	let bus = Arc::new(MemoryBus::new());

	let first_inbox = Inbox::from_low_u64_be(1);
	let second_inbox = Inbox::from_low_u64_be(2);
	let mut first_receiver = bus
		.subscribe(Subject::Inbox(first_inbox))
		.await
		.expect("First waiter should subscribe");
	let mut second_receiver = bus
		.subscribe(Subject::Inbox(second_inbox))
		.await
		.expect("Second waiter should subscribe");

	let make_reply = |inbox: Inbox, nonce: u64| ProtocolMessage {
		to: "dpxalice".to_owned(),
		from: "dpxbob".to_owned(),
		inbox,
		sent_by: "dpxbob".to_owned(),
		data: ProtocolPayload::with_update(make_update(nonce), None),
	};

	bus.publish(Subject::Inbox(second_inbox), make_reply(second_inbox, 2))
		.await
		.expect("Publish should succeed");
	bus.publish(Subject::Inbox(first_inbox), make_reply(first_inbox, 1))
		.await
		.expect("Publish should succeed");

	let first = first_receiver.recv().await.expect("First waiter should get its reply");
	let second = second_receiver.recv().await.expect("Second waiter should get its reply");
	assert_eq!(first.inbox, first_inbox);
	assert_eq!(second.inbox, second_inbox);
	assert_eq!(first.data.update.map(|u| u.nonce), Some(Nonce::from(1u64)));
	assert_eq!(second.data.update.map(|u| u.nonce), Some(Nonce::from(2u64)));
}
