use crate::{
    did::Did,
    signer::{DidMethod, Secp256k1Signer},
};
use k256::{SecretKey, ecdsa::SigningKey};
use std::ops::Deref;

/// An abstraction over a secp256k1 key pair.
///
/// This provides a unified API for managing keys, creating DIDs, and generating
/// signers.
#[derive(Clone, Debug)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a new, random `Keypair`.
    pub fn generate() -> Self {
        let secret_key = SecretKey::random(&mut rand::thread_rng());
        Self { signing_key: secret_key.into() }
    }

    /// Creates a `Keypair` from a 32-byte secret key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, k256::elliptic_curve::Error> {
        let secret_key = SecretKey::from_slice(bytes)?;
        Ok(Self { signing_key: secret_key.into() })
    }

    /// Returns the raw 33-byte compressed public key.
    pub fn public_key(&self) -> [u8; 33] {
        self.signing_key.verifying_key().to_sec1_bytes().deref().try_into().expect("compressed sec1 key")
    }

    /// Creates a `Did` from this keypair's public key under the given method.
    #[allow(deprecated)]
    pub fn to_did(&self, method: DidMethod) -> Did {
        match method {
            DidMethod::Key => Did::key(self.public_key()),
            DidMethod::Nil => Did::nil(self.public_key()),
        }
    }

    /// Creates a `Secp256k1Signer` from this keypair using the given DID method.
    pub fn signer(&self, method: DidMethod) -> Secp256k1Signer {
        Secp256k1Signer::new(self.signing_key.clone(), method)
    }
}
