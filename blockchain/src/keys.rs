use duplex_primitives::{
	constants::SIGNATURE_LENGTH,
	identifiers::public_identifier_from_pub_key,
	signing::signed_message_digest,
	types::PublicIdentifier,
};
use ethsign::SecretKey;
use web3::{
	signing::{
		self,
		Key,
		Signature,
	},
	types::{
		Address,
		H256,
	},
};

/// A participant's signing key. The only component allowed to touch key
/// material; everything else works with digests and signatures.
///
/// The routing identifier is derived once at construction; the signing
/// path never touches the public key again.
#[derive(Clone)]
pub struct PrivateKey {
	inner: SecretKey,
	public_identifier: PublicIdentifier,
}

impl PrivateKey {
	pub fn new(inner: SecretKey) -> Self {
		let public_identifier = public_identifier_from_pub_key(inner.public().bytes());
		Self { inner, public_identifier }
	}

	/// The long-lived routing identifier bound to this key.
	pub fn public_identifier(&self) -> &PublicIdentifier {
		&self.public_identifier
	}
}

impl Key for PrivateKey {
	fn sign(
		&self,
		message: &[u8],
		chain_id: Option<u64>,
	) -> Result<signing::Signature, signing::SigningError> {
		let signature =
			self.inner.sign(message).map_err(|_| signing::SigningError::InvalidMessage)?;

		let standard_v = signature.v as u64;
		let v = match chain_id {
			Some(chain_id) => standard_v + 35 + chain_id * 2,
			None => standard_v + 27,
		};
		Ok(signing::Signature { r: H256::from(signature.r), s: H256::from(signature.s), v })
	}

	fn sign_message(&self, message: &[u8]) -> Result<signing::Signature, signing::SigningError> {
		// Same prefixed digest the verifier recovers against.
		let digest = signed_message_digest(message);
		let signature =
			self.inner.sign(&digest).map_err(|_| signing::SigningError::InvalidMessage)?;

		Ok(signing::Signature {
			r: H256::from(signature.r),
			s: H256::from(signature.s),
			v: signature.v as u64 + 27,
		})
	}

	fn address(&self) -> web3::types::Address {
		Address::from(self.inner.public().address())
	}
}

/// Pack a recovered signature into the 65-byte wire layout: r, s, then the
/// low byte of v.
pub fn signature_to_bytes(s: Signature) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
	bytes.extend(s.r.as_bytes());
	bytes.extend(s.s.as_bytes());
	bytes.push((s.v & 0xff) as u8);
	bytes
}
