#![warn(clippy::missing_docs_in_private_items)]

use std::{
	fmt,
	str::FromStr,
};

use serde::{
	de::{
		Error,
		Visitor,
	},
	Deserialize,
	Deserializer,
};
use web3::types::{
	H256,
	U256,
};

use crate::types::{
	ChainID,
	Signature,
	TokenAmount,
};

/// Deserialize string to U256.
pub fn u256_from_str<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
	D: Deserializer<'de>,
{
	let binding = serde_json::Value::deserialize(deserializer)?;
	if let Some(value) = binding.as_u64() {
		return Ok(U256::from(value))
	}
	let v = binding.as_str().ok_or_else(|| D::Error::custom("Could not parse U256"))?;
	U256::from_dec_str(v).map_err(|_| D::Error::custom("Invalid U256"))
}

/// Deserialize a two-element list of decimal strings into an amount pair.
pub fn u256_array_from_str<'de, D>(deserializer: D) -> Result<[TokenAmount; 2], D::Error>
where
	D: Deserializer<'de>,
{
	let values: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
	if values.len() != 2 {
		return Err(D::Error::custom("Expected exactly two amounts"))
	}
	let mut amounts = [TokenAmount::zero(); 2];
	for (index, value) in values.iter().enumerate() {
		amounts[index] = if let Some(v) = value.as_u64() {
			U256::from(v)
		} else {
			let v = value.as_str().ok_or_else(|| D::Error::custom("Could not parse amount"))?;
			U256::from_dec_str(v).map_err(|_| D::Error::custom("Invalid amount"))?
		};
	}
	Ok(amounts)
}

/// Deserialize string into H256.
pub fn h256_from_str<'de, D>(deserializer: D) -> Result<H256, D::Error>
where
	D: Deserializer<'de>,
{
	let binding = serde_json::Value::deserialize(deserializer)?;
	let str_value = binding.as_str().ok_or_else(|| D::Error::custom("Could not parse H256"))?;
	let hex_value = hex::decode(str_value.trim_start_matches("0x"))
		.map_err(|e| D::Error::custom(format!("Could not decode hex: {:?}", e)))?;
	Ok(H256::from_slice(&hex_value))
}

/// Deserialize string to signature.
pub fn signature_from_str<'de, D>(deserializer: D) -> Result<Signature, D::Error>
where
	D: Deserializer<'de>,
{
	let v = serde_json::Value::deserialize(deserializer)?;
	let v = v
		.as_str()
		.ok_or_else(|| D::Error::custom("Invalid signature"))?
		.trim_start_matches("0x");
	Ok(Signature::from(hex::decode(v).map_err(|_| D::Error::custom("Invalid signature"))?))
}

impl<'de> Deserialize<'de> for ChainID {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		/// Visitor for Chain Identifier to try to parse from different types
		struct IdVisitor;

		impl<'de> Visitor<'de> for IdVisitor {
			type Value = ChainID;

			fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
				f.write_str("Chain ID as a number or string")
			}

			fn visit_u64<E>(self, id: u64) -> Result<Self::Value, E>
			where
				E: Error,
			{
				Ok(id.into())
			}

			fn visit_str<E>(self, id: &str) -> Result<Self::Value, E>
			where
				E: Error,
			{
				ChainID::from_str(id)
					.map_err(|_| Error::custom("Could not parse ChainID from string"))
			}
		}

		deserializer.deserialize_any(IdVisitor)
	}
}
