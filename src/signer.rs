use crate::{
    did::Did,
    envelope::{NucAlgorithm, NucHeader, NucType},
    token::{Eip712Nuc, Eip712NucPayload, NucToken},
};
use async_trait::async_trait;
use ethers::signers::Signer as EthersSigner;
use ethers::types::transaction::eip712::EIP712Domain;
use k256::ecdsa::{Signature, SigningKey};
use signature::Signer as _;
use std::ops::Deref;

/// A method for a DID that is derived from a secp256k1 key.
pub enum DidMethod {
    /// The modern `did:key` method.
    Key,
    /// The legacy `did:nil` method.
    #[deprecated(
        since = "1.0.0",
        note = "The `did:nil` method is legacy and will be removed the next major version. Use `did:key` instead."
    )]
    Nil,
}

/// A Nuc token signer.
#[async_trait]
pub trait NucSigner: Send + Sync {
    /// The DID of this signer.
    fn did(&self) -> &Did;

    /// Create and sign a Nuc for the given token.
    ///
    /// Returns the Nuc header and the resulting signature.
    async fn sign_token(&self, token: &NucToken) -> Result<(NucHeader, Vec<u8>), SigningError>;
}

/// An error that can occur when signing a Nuc token.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// A signer that uses a local `secp256k1` key.
pub struct Secp256k1Signer {
    key: SigningKey,
    did: Did,
    header: NucHeader,
}

impl Secp256k1Signer {
    /// Create a new `Secp256k1Signer`.
    #[allow(deprecated)]
    pub(crate) fn new(key: SigningKey, method: DidMethod) -> Self {
        let public_key: [u8; 33] = key.verifying_key().to_sec1_bytes().deref().try_into().expect("compressed sec1 key");
        let (did, header) = match method {
            DidMethod::Key => (
                Did::key(public_key),
                NucHeader {
                    typ: Some(NucType::Nuc),
                    algorithm: NucAlgorithm::Es256k,
                    version: Some("1.0.0".to_string()),
                    meta: None,
                },
            ),
            DidMethod::Nil => (
                Did::nil(public_key),
                NucHeader { typ: None, algorithm: NucAlgorithm::Es256k, version: None, meta: None },
            ),
        };
        Self { key, did, header }
    }
}

#[async_trait]
impl NucSigner for Secp256k1Signer {
    fn did(&self) -> &Did {
        &self.did
    }

    async fn sign_token(&self, token: &NucToken) -> Result<(NucHeader, Vec<u8>), SigningError> {
        let header = self.header.clone();
        let header_b64 = crate::builder::to_base64_json(&header).map_err(|e| SigningError::SigningFailed(e.to_string()))?;
        let payload_b64 = crate::builder::to_base64_json(token).map_err(|e| SigningError::SigningFailed(e.to_string()))?;

        let message_to_sign = format!("{header_b64}.{payload_b64}");
        let signature: Signature =
            self.key.try_sign(message_to_sign.as_bytes()).map_err(|e| SigningError::SigningFailed(e.to_string()))?;

        Ok((header, signature.to_bytes().to_vec()))
    }
}

/// A signer that uses an Eip-712 compatible wallet.
pub struct Eip712Signer<S: EthersSigner> {
    did: Did,
    domain: EIP712Domain,
    signer: S,
}

impl<S: EthersSigner> Eip712Signer<S> {
    /// Create a new Eip-712 signer.
    pub fn new(domain: EIP712Domain, signer: S) -> Self {
        let address: [u8; 20] = signer.address().into();
        let did = Did::ethr(address);
        Self { did, domain, signer }
    }
}

#[async_trait]
impl<S: EthersSigner + Send + Sync> NucSigner for Eip712Signer<S> {
    fn did(&self) -> &Did {
        &self.did
    }

    async fn sign_token(&self, token: &NucToken) -> Result<(NucHeader, Vec<u8>), SigningError> {
        let meta = serde_json::to_value(&self.domain).map_err(|e| SigningError::SigningFailed(e.to_string()))?;
        let header = NucHeader {
            typ: Some(NucType::NucEip712),
            algorithm: NucAlgorithm::Es256k,
            version: Some("1.0.0".to_string()),
            meta: Some(meta),
        };

        let payload =
            Eip712NucPayload::try_from(token).map_err(|e| SigningError::SigningFailed(e.to_string()))?;
        let typed_data = Eip712Nuc::new(payload, self.domain.clone());
        let signature =
            self.signer.sign_typed_data(&typed_data).await.map_err(|e| SigningError::SigningFailed(e.to_string()))?;

        Ok((header, signature.to_vec()))
    }
}
