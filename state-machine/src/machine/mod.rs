#![warn(clippy::missing_docs_in_private_items)]

/// Channel state machine.
pub mod channel;
/// Merkle and asset-list utils.
pub mod utils;
/// Update validators.
pub mod validators;

pub use channel::{
	apply_update,
	TransferChange,
	TransitionResult,
};
