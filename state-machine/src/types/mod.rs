#![warn(clippy::missing_docs_in_private_items)]

/// Channel and transfer state types.
mod state;
/// Channel update types.
mod update;

pub use state::*;
pub use update::*;
