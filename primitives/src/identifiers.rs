#![warn(clippy::missing_docs_in_private_items)]

use web3::signing::keccak256;

use crate::types::{
	Address,
	PublicIdentifier,
};

/// Prefix of every routing identifier.
pub const IDENTIFIER_PREFIX: &str = "dpx";

/// Derive a node's routing identifier from its uncompressed public key
/// (64 bytes, without the leading `0x04` tag).
pub fn public_identifier_from_pub_key(pub_key: &[u8]) -> PublicIdentifier {
	format!("{}{}", IDENTIFIER_PREFIX, hex::encode(pub_key))
}

/// Recover the on-chain address embedded in a routing identifier.
///
/// The address is the low 20 bytes of the keccak digest of the public key,
/// the same derivation the chain applies.
pub fn address_from_identifier(identifier: &str) -> Option<Address> {
	let hex_key = identifier.strip_prefix(IDENTIFIER_PREFIX)?;
	let pub_key = hex::decode(hex_key).ok()?;
	if pub_key.len() != 64 {
		return None
	}
	let hash = keccak256(&pub_key);
	Some(Address::from_slice(&hash[12..]))
}
