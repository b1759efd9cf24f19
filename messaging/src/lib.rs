//! Implements the correlated request/response channel used to exchange
//! protocol updates between the two channel peers over an abstract bus.
use thiserror::Error;

pub mod bus;
pub mod messages;
pub mod service;
#[cfg(test)]
mod tests;

/// The messaging error type.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MessagingError {
	#[error("Timed out waiting for a protocol reply")]
	Timeout,
	#[error("Messaging error: `{0}`")]
	Unknown(String),
}
