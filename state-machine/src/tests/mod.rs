mod deposit;
pub mod factories;
mod setup;
