use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use tracing::{debug, error, warn};

use crate::{types::Proof, Error};

/// Signs digests of encoded source events so the destination chain can check
/// the relayer actually observed them.
pub struct AttestationSigner {
    keypair: Keypair,
}

impl std::fmt::Debug for AttestationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSigner")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

impl AttestationSigner {
    /// Builds a signer from a 32 byte Ed25519 secret.
    pub fn from_secret(secret_key: &[u8]) -> Result<Self, Error> {
        debug!("Creating attestation signer from existing secret");
        let secret = SecretKey::from_bytes(secret_key).map_err(|e| {
            error!("Failed to create secret key: {}", e);
            Error::Signing(format!("Invalid attestation key: {}", e))
        })?;
        let public = PublicKey::from(&secret);
        Ok(Self {
            keypair: Keypair { secret, public },
        })
    }

    pub fn from_hex(secret_hex: &str) -> Result<Self, Error> {
        let bytes = hex::decode(secret_hex.trim_start_matches("0x"))
            .map_err(|e| Error::Signing(format!("Invalid attestation key hex: {}", e)))?;
        Self::from_secret(&bytes)
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public.to_bytes()
    }

    /// Blake2b-512 of the given bytes.
    pub fn digest(bytes: &[u8]) -> [u8; 64] {
        let mut hasher = Blake2b512::new();
        hasher.update(bytes);
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    pub fn sign(&self, digest: &[u8]) -> Result<[u8; 64], Error> {
        let signature = self
            .keypair
            .try_sign(digest)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(signature.to_bytes())
    }

    /// Digest `encoded` and sign the digest.
    pub fn prove(&self, encoded: &[u8]) -> Result<Proof, Error> {
        let digest = Self::digest(encoded);
        let signature = self.sign(&digest)?;
        Ok(Proof { digest, signature })
    }
}

/// Checks `signature` against the digest of `encoded_event`.
pub fn verify_attestation(public_key: &[u8], encoded_event: &[u8], signature: &[u8]) -> bool {
    let public = match PublicKey::from_bytes(public_key) {
        Ok(public) => public,
        Err(e) => {
            warn!("Invalid attestation public key: {}", e);
            return false;
        }
    };
    let signature = match Signature::try_from(signature) {
        Ok(signature) => signature,
        Err(e) => {
            warn!("Invalid signature format: {}", e);
            return false;
        }
    };
    let digest = AttestationSigner::digest(encoded_event);
    public.verify(&digest, &signature).is_ok()
}
