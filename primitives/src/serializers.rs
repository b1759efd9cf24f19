#![warn(clippy::missing_docs_in_private_items)]

use serde::{
	ser::SerializeSeq,
	Serialize,
	Serializer,
};

use crate::{
	traits::Checksum,
	types::{
		ChainID,
		TokenAmount,
	},
};

impl Serialize for ChainID {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		let value: u64 = (*self).into();
		serializer.serialize_str(&value.to_string())
	}
}

/// Serialize U256 into a string.
pub fn u256_to_str<T, S>(v: &T, serializer: S) -> Result<S::Ok, S::Error>
where
	T: ToString,
	S: Serializer,
{
	serializer.serialize_str(&v.to_string())
}

/// Serialize a participant-ordered amount pair into decimal strings.
pub fn u256_array_to_str<S>(v: &[TokenAmount; 2], serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let mut seq = serializer.serialize_seq(Some(2))?;
	for amount in v {
		seq.serialize_element(&amount.to_string())?;
	}
	seq.end()
}

/// Return a string of a check-summed address.
pub fn to_checksum_str<T, S>(v: &T, serializer: S) -> Result<S::Ok, S::Error>
where
	T: Checksum,
	S: Serializer,
{
	serializer.serialize_str(&v.checksum())
}
