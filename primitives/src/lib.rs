#![warn(clippy::missing_docs_in_private_items)]

/// Protocol-wide constants.
pub mod constants;
/// String deserialization helpers for numeric and binary types.
pub mod deserializers;
/// Public identifier derivation.
pub mod identifiers;
/// Trait implementations for foreign types.
pub mod impls;
/// Canonical commitment encodings.
pub mod packing;
/// String serialization helpers for numeric and binary types.
pub mod serializers;
/// Message signing and signer recovery.
pub mod signing;
/// Trait definitions.
pub mod traits;
/// Common types and aliases.
pub mod types;
