#![warn(clippy::missing_docs_in_private_items)]

use std::{
	future::Future,
	sync::Arc,
	time::Duration,
};

use duplex_primitives::types::{
	Inbox,
	PublicIdentifier,
	H256,
};
use duplex_state_machine::types::ChannelUpdate;
use rand::RngCore;
use tokio::{
	task::JoinHandle,
	time,
};
use tracing::trace;

use crate::{
	bus::{
		MessageBus,
		Subject,
	},
	messages::{
		MessageError,
		ProtocolMessage,
		ProtocolPayload,
	},
	MessagingError,
};

/// A fresh single-use correlation identifier. Inboxes are never reused: a
/// retried send registers a new one and the old one goes stale.
fn generate_inbox() -> Inbox {
	let mut bytes = [0u8; 32];
	rand::thread_rng().fill_bytes(&mut bytes);
	H256::from(bytes)
}

/// Correlated request/response endpoint of one node.
///
/// Wraps the bus with the inbox discipline: every outbound update registers
/// a single-shot waiter, awaits the first matching reply and deregisters on
/// delivery, timeout or cancellation.
pub struct ProtocolMessenger<B> {
	/// The underlying transport.
	bus: Arc<B>,
	/// This node's routing identifier.
	our_identifier: PublicIdentifier,
}

impl<B> Clone for ProtocolMessenger<B> {
	fn clone(&self) -> Self {
		Self { bus: self.bus.clone(), our_identifier: self.our_identifier.clone() }
	}
}

impl<B: MessageBus + 'static> ProtocolMessenger<B> {
	/// Returns a new instance of `ProtocolMessenger`.
	pub fn new(bus: Arc<B>, our_identifier: PublicIdentifier) -> Self {
		Self { bus, our_identifier }
	}

	/// This node's routing identifier.
	pub fn our_identifier(&self) -> &PublicIdentifier {
		&self.our_identifier
	}

	/// Send `update` to `counterparty` and await the single reply bound to
	/// this attempt's inbox.
	///
	/// A reply only matches when its inbox equals the generated inbox and
	/// it was addressed by the counterparty to us. Each retry uses a fresh
	/// inbox; late replies to earlier inboxes are discarded by the bus.
	/// `max_retries = 0` means a single attempt.
	pub async fn send_protocol(
		&self,
		counterparty: PublicIdentifier,
		update: ChannelUpdate,
		previous_update: Option<ChannelUpdate>,
		timeout: Duration,
		max_retries: u32,
	) -> Result<ProtocolPayload, MessagingError> {
		for attempt in 0..=max_retries {
			let inbox = generate_inbox();
			let subject = Subject::Inbox(inbox);
			let mut receiver = self.bus.subscribe(subject.clone()).await?;

			let message = ProtocolMessage {
				to: counterparty.clone(),
				from: self.our_identifier.clone(),
				inbox,
				sent_by: self.our_identifier.clone(),
				data: ProtocolPayload::with_update(update.clone(), previous_update.clone()),
			};
			trace!(
				message = "Sending protocol update",
				update_type = update.type_name(),
				counterparty = counterparty.as_str(),
				attempt = attempt,
			);
			self.bus.publish(Subject::Identifier(counterparty.clone()), message).await?;

			let reply = time::timeout(timeout, async {
				while let Some(reply) = receiver.recv().await {
					if reply.inbox == inbox &&
						reply.from == counterparty &&
						reply.to == self.our_identifier &&
						reply.sent_by == counterparty
					{
						return Some(reply)
					}
					trace!(message = "Discarding mismatched reply");
				}
				None
			})
			.await;

			self.bus.unsubscribe(&subject).await;

			match reply {
				Ok(Some(reply)) => return Ok(reply.data),
				Ok(None) =>
					return Err(MessagingError::Unknown("Reply stream closed".to_owned())),
				Err(_) => {
					trace!(
						message = "Protocol reply timed out",
						counterparty = counterparty.as_str(),
						attempt = attempt,
					);
				},
			}
		}

		Err(MessagingError::Timeout)
	}

	/// Publish a positive reply bound to `inbox`.
	pub async fn respond(
		&self,
		recipient: PublicIdentifier,
		inbox: Inbox,
		update: ChannelUpdate,
		previous_update: Option<ChannelUpdate>,
	) -> Result<(), MessagingError> {
		let message = ProtocolMessage {
			to: recipient,
			from: self.our_identifier.clone(),
			inbox,
			sent_by: self.our_identifier.clone(),
			data: ProtocolPayload::with_update(update, previous_update),
		};
		self.bus.publish(Subject::Inbox(inbox), message).await
	}

	/// Publish a negative reply bound to `inbox`, optionally attaching our
	/// latest accepted update.
	pub async fn respond_error(
		&self,
		recipient: PublicIdentifier,
		inbox: Inbox,
		error: MessageError,
		latest_update: Option<ChannelUpdate>,
	) -> Result<(), MessagingError> {
		let message = ProtocolMessage {
			to: recipient,
			from: self.our_identifier.clone(),
			inbox,
			sent_by: self.our_identifier.clone(),
			data: ProtocolPayload::with_error(error, latest_update),
		};
		self.bus.publish(Subject::Inbox(inbox), message).await
	}

	/// Invoke `handler` for every inbound message addressed to this node.
	pub async fn on_receive_protocol<F, Fut>(
		&self,
		handler: F,
	) -> Result<JoinHandle<()>, MessagingError>
	where
		F: Fn(ProtocolPayload, PublicIdentifier, Inbox) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send,
	{
		let mut receiver =
			self.bus.subscribe(Subject::Identifier(self.our_identifier.clone())).await?;
		let our_identifier = self.our_identifier.clone();

		Ok(tokio::spawn(async move {
			while let Some(message) = receiver.recv().await {
				if message.to != our_identifier {
					continue
				}
				handler(message.data, message.from, message.inbox).await;
			}
		}))
	}
}
