//! Signed extrinsic (format version 4) construction.
//!
//! The account is addressed as `MultiAddress::Id` and signs with
//! `MultiSignature::Ed25519`. Signed extensions are, in order: immortal era,
//! compact nonce and compact tip; the implicit part is spec version,
//! transaction version, genesis hash and the era checkpoint (genesis again).

use codec::{Compact, Encode};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer};

use crate::{encoding::blake2_256, types::AppId, Error};

const EXTRINSIC_VERSION: u8 = 4;
const SIGNED_BIT: u8 = 0b1000_0000;
const MULTI_ADDRESS_ID: u8 = 0x00;
const MULTI_SIGNATURE_ED25519: u8 = 0x00;
const IMMORTAL_ERA: u8 = 0x00;

/// Keypair of the account that pays for and authorizes destination transactions.
pub struct AccountKey {
    keypair: Keypair,
}

impl std::fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountKey")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

impl AccountKey {
    pub fn from_secret(secret_key: &[u8]) -> Result<Self, Error> {
        let secret = SecretKey::from_bytes(secret_key)
            .map_err(|e| Error::Signing(format!("Invalid account key: {}", e)))?;
        let public = PublicKey::from(&secret);
        Ok(Self {
            keypair: Keypair { secret, public },
        })
    }

    pub fn from_hex(secret_hex: &str) -> Result<Self, Error> {
        let bytes = hex::decode(secret_hex.trim_start_matches("0x"))
            .map_err(|e| Error::Signing(format!("Invalid account key hex: {}", e)))?;
        Self::from_secret(&bytes)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    fn sign(&self, payload: &[u8]) -> Result<[u8; 64], Error> {
        self.keypair
            .try_sign(payload)
            .map(|signature| signature.to_bytes())
            .map_err(|e| Error::Signing(e.to_string()))
    }
}

/// Chain state a transaction is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningContext {
    pub genesis_hash: [u8; 32],
    pub spec_version: u32,
    pub transaction_version: u32,
    pub nonce: u32,
}

/// `module.call(app_id, payload)`.
pub fn encode_call(call_index: [u8; 2], app_id: &AppId, payload: &[u8]) -> Vec<u8> {
    let mut call = call_index.to_vec();
    app_id.encode_to(&mut call);
    payload.encode_to(&mut call);
    call
}

fn encode_extra(nonce: u32) -> Vec<u8> {
    let mut extra = vec![IMMORTAL_ERA];
    Compact(nonce).encode_to(&mut extra);
    // zero tip
    Compact(0u128).encode_to(&mut extra);
    extra
}

/// Bytes the account signs. Payloads longer than 256 bytes are replaced by
/// their blake2-256 hash.
pub fn signing_payload(call: &[u8], context: &SigningContext) -> Vec<u8> {
    let mut payload = call.to_vec();
    payload.extend(encode_extra(context.nonce));
    context.spec_version.encode_to(&mut payload);
    context.transaction_version.encode_to(&mut payload);
    context.genesis_hash.encode_to(&mut payload);
    context.genesis_hash.encode_to(&mut payload);

    if payload.len() > 256 {
        blake2_256(&payload).to_vec()
    } else {
        payload
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedExtrinsic {
    pub signer: [u8; 32],
    pub signature: [u8; 64],
    pub nonce: u32,
    pub call: Vec<u8>,
}

impl SignedExtrinsic {
    pub fn sign(key: &AccountKey, call: Vec<u8>, context: &SigningContext) -> Result<Self, Error> {
        let signature = key.sign(&signing_payload(&call, context))?;
        Ok(Self {
            signer: key.public_key(),
            signature,
            nonce: context.nonce,
            call,
        })
    }

    /// Length-prefixed extrinsic as accepted by `author_submitExtrinsic`.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = vec![SIGNED_BIT | EXTRINSIC_VERSION, MULTI_ADDRESS_ID];
        body.extend_from_slice(&self.signer);
        body.push(MULTI_SIGNATURE_ED25519);
        body.extend_from_slice(&self.signature);
        body.extend(encode_extra(self.nonce));
        body.extend_from_slice(&self.call);
        body.encode()
    }

    /// Transaction hash the node reports for this extrinsic.
    pub fn hash(&self) -> [u8; 32] {
        blake2_256(&self.encode())
    }
}

#[cfg(test)]
pub(crate) fn decode_signed_nonce(extrinsic: &[u8]) -> u32 {
    use codec::Decode;

    let mut input = extrinsic;
    let _len = Compact::<u32>::decode(&mut input).unwrap();
    // version + address + signature + era
    let skip = 1 + 1 + 32 + 1 + 64 + 1;
    let mut rest = &input[skip..];
    Compact::<u32>::decode(&mut rest).unwrap().0
}

#[cfg(test)]
pub(crate) fn decode_call_index(extrinsic: &[u8]) -> [u8; 2] {
    use codec::Decode;

    let mut input = extrinsic;
    let _len = Compact::<u32>::decode(&mut input).unwrap();
    let skip = 1 + 1 + 32 + 1 + 64 + 1;
    let mut rest = &input[skip..];
    let _nonce = Compact::<u32>::decode(&mut rest).unwrap();
    let _tip = Compact::<u128>::decode(&mut rest).unwrap();
    [rest[0], rest[1]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    fn context(nonce: u32) -> SigningContext {
        SigningContext {
            genesis_hash: [0x99; 32],
            spec_version: 7,
            transaction_version: 1,
            nonce,
        }
    }

    #[test]
    fn test_call_layout() {
        let call = encode_call([8, 0], &[0xaa; 32], &[0xde, 0xad]);
        assert_eq!(&call[..2], &[8, 0]);
        assert_eq!(&call[2..34], &[0xaa; 32]);
        assert_eq!(&call[34..], &[0x08, 0xde, 0xad]);
    }

    #[test]
    fn test_extrinsic_layout() {
        let key = AccountKey::from_secret(&[3u8; 32]).unwrap();
        let call = encode_call([8, 0], &[0xaa; 32], &[0x01]);
        let xt = SignedExtrinsic::sign(&key, call.clone(), &context(5)).unwrap();
        let bytes = xt.encode();

        // compact length fits in two bytes for a body of this size
        let body = &bytes[2..];
        assert_eq!(body[0], 0x84);
        assert_eq!(body[1], MULTI_ADDRESS_ID);
        assert_eq!(&body[2..34], &key.public_key());
        assert_eq!(body[34], MULTI_SIGNATURE_ED25519);
        // era, compact(5), compact(0)
        assert_eq!(&body[99..102], &[0x00, 0x14, 0x00]);
        assert_eq!(&body[102..], call.as_slice());
        assert_eq!(decode_signed_nonce(&bytes), 5);
        assert_eq!(decode_call_index(&bytes), [8, 0]);
    }

    #[test]
    fn test_hash_is_blake2_of_encoding() {
        let key = AccountKey::from_secret(&[3u8; 32]).unwrap();
        let xt = SignedExtrinsic::sign(&key, vec![8, 0], &context(1)).unwrap();
        assert_eq!(xt.hash(), blake2_256(&xt.encode()));
    }

    #[test]
    fn test_signature_covers_signing_payload() {
        let key = AccountKey::from_secret(&[3u8; 32]).unwrap();
        let call = encode_call([8, 0], &[0xaa; 32], &[0x01]);
        let xt = SignedExtrinsic::sign(&key, call.clone(), &context(5)).unwrap();

        let public = PublicKey::from_bytes(&key.public_key()).unwrap();
        let signature = Signature::try_from(&xt.signature[..]).unwrap();
        assert!(public
            .verify(&signing_payload(&call, &context(5)), &signature)
            .is_ok());
        assert!(public
            .verify(&signing_payload(&call, &context(6)), &signature)
            .is_err());
    }

    #[test]
    fn test_long_payload_is_hashed() {
        let call = encode_call([8, 0], &[0xaa; 32], &[0x01; 300]);
        assert_eq!(signing_payload(&call, &context(0)).len(), 32);

        let short = encode_call([8, 0], &[0xaa; 32], &[0x01]);
        assert!(signing_payload(&short, &context(0)).len() > 32);
    }

    #[test]
    fn test_large_nonce_round_trips() {
        let key = AccountKey::from_secret(&[3u8; 32]).unwrap();
        let xt = SignedExtrinsic::sign(&key, vec![8, 0], &context(1_000_000)).unwrap();
        assert_eq!(decode_signed_nonce(&xt.encode()), 1_000_000);
    }
}
