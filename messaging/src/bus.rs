#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;

use duplex_primitives::types::{
	Inbox,
	PublicIdentifier,
};
use parking_lot::Mutex;
use tokio::sync::mpsc::{
	self,
	UnboundedReceiver,
	UnboundedSender,
};
use tracing::trace;

use crate::{
	messages::ProtocolMessage,
	MessagingError,
};

/// Address space of the bus. Requests go to a peer's long-lived identifier
/// subject; replies go to the single-use inbox subject the request named.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Subject {
	Identifier(PublicIdentifier),
	Inbox(Inbox),
}

impl ToString for Subject {
	fn to_string(&self) -> String {
		match self {
			Subject::Identifier(identifier) => format!("identifier.{}", identifier),
			Subject::Inbox(inbox) => format!("inbox.{:x}", inbox),
		}
	}
}

/// The transport seam. Implementations may be an in-memory bus, a
/// publish/subscribe broker or a point-to-point socket; the protocol core
/// only relies on subject-addressed delivery.
#[async_trait::async_trait]
pub trait MessageBus: Send + Sync {
	/// Deliver `message` to the subscriber of `subject`, if any. A message
	/// published to a subject nobody subscribes to is dropped.
	async fn publish(&self, subject: Subject, message: ProtocolMessage)
		-> Result<(), MessagingError>;
	/// Subscribe to `subject`, replacing any previous subscriber.
	async fn subscribe(
		&self,
		subject: Subject,
	) -> Result<UnboundedReceiver<ProtocolMessage>, MessagingError>;
	/// Drop the subscription on `subject`.
	async fn unsubscribe(&self, subject: &Subject);
}

/// Reference bus delivering messages between peers of one process.
#[derive(Default)]
pub struct MemoryBus {
	/// Live subscriptions by subject.
	topics: Mutex<HashMap<Subject, UnboundedSender<ProtocolMessage>>>,
}

impl MemoryBus {
	/// Returns a new instance of `MemoryBus`.
	pub fn new() -> Self {
		Self { topics: Mutex::new(HashMap::new()) }
	}
}

#[async_trait::async_trait]
impl MessageBus for MemoryBus {
	async fn publish(
		&self,
		subject: Subject,
		message: ProtocolMessage,
	) -> Result<(), MessagingError> {
		let sender = self.topics.lock().get(&subject).cloned();
		match sender {
			Some(sender) => {
				if sender.send(message).is_err() {
					// Receiver was dropped; the waiter is gone.
					self.topics.lock().remove(&subject);
					trace!(
						message = "Dropping message for cancelled subscriber",
						subject = subject.to_string().as_str()
					);
				}
			},
			None => {
				trace!(
					message = "Dropping message without subscriber",
					subject = subject.to_string().as_str()
				);
			},
		}
		Ok(())
	}

	async fn subscribe(
		&self,
		subject: Subject,
	) -> Result<UnboundedReceiver<ProtocolMessage>, MessagingError> {
		let (sender, receiver) = mpsc::unbounded_channel();
		self.topics.lock().insert(subject, sender);
		Ok(receiver)
	}

	async fn unsubscribe(&self, subject: &Subject) {
		self.topics.lock().remove(subject);
	}
}
