#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;

use duplex_primitives::types::{
	Inbox,
	PublicIdentifier,
};
use duplex_state_machine::{
	errors::ChannelError,
	types::ChannelUpdate,
};
use serde::{
	Deserialize,
	Serialize,
};

/// Negative reply carried on the wire. `reason` comes from the protocol's
/// rejection taxonomy; `context` names the offending channel, nonce and
/// update kind.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageError {
	pub reason: String,
	pub context: HashMap<String, String>,
}

impl MessageError {
	/// Build a wire error out of a structured rejection.
	pub fn from_channel_error(error: &ChannelError, update: Option<&ChannelUpdate>) -> Self {
		let mut context = HashMap::new();
		context.insert("message".to_owned(), error.to_string());
		if let Some(update) = update {
			context
				.insert("channelAddress".to_owned(), format!("{:?}", update.channel_address));
			context.insert("nonce".to_owned(), update.nonce.to_string());
			context.insert("updateType".to_owned(), update.type_name().to_owned());
			context.insert("fromIdentifier".to_owned(), update.from_identifier.clone());
		}
		Self { reason: error.reason().to_owned(), context }
	}
}

/// Body of a protocol message. Exactly one of `update` or `error` is
/// present; `previous_update` may accompany either so the receiver can
/// detect rebases.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProtocolPayload {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub update: Option<ChannelUpdate>,
	#[serde(rename = "previousUpdate", skip_serializing_if = "Option::is_none")]
	pub previous_update: Option<ChannelUpdate>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<MessageError>,
}

impl ProtocolPayload {
	/// Payload proposing or confirming `update`.
	pub fn with_update(update: ChannelUpdate, previous_update: Option<ChannelUpdate>) -> Self {
		Self { update: Some(update), previous_update, error: None }
	}

	/// Payload rejecting the round, optionally attaching our latest accepted
	/// update so the peer can resynchronize.
	pub fn with_error(error: MessageError, latest_update: Option<ChannelUpdate>) -> Self {
		Self { update: None, previous_update: latest_update, error: Some(error) }
	}
}

/// A protocol message as it crosses the wire. Field names and order are part
/// of the peer interface.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
	pub to: PublicIdentifier,
	pub from: PublicIdentifier,
	pub inbox: Inbox,
	#[serde(rename = "sentBy")]
	pub sent_by: PublicIdentifier,
	pub data: ProtocolPayload,
}

impl ProtocolMessage {
	/// Returns the string type name of the message.
	pub fn type_name(&self) -> &'static str {
		if self.data.error.is_some() {
			return "Error"
		}
		match &self.data.update {
			Some(update) => update.type_name(),
			None => "Empty",
		}
	}
}
