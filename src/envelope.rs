use crate::{
    did::Did,
    token::{Eip712Nuc, Eip712NucPayload, NucToken, ProofHash},
};
use base64::{Engine, display::Base64Display, prelude::BASE64_URL_SAFE_NO_PAD};
use ethers::types::{
    Address, H256, RecoveryMessage, Signature as EthereumSignature,
    transaction::eip712::{EIP712Domain, Eip712},
};
use k256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use signature::Verifier;
use std::{iter, marker::PhantomData};

const DEFAULT_MAX_RAW_TOKEN_SIZE: usize = 1024 * 10;

/// An envelope for a NUC token.
///
/// This contains the NUC token itself along with all of its proofs.
#[derive(Clone, Debug)]
pub struct NucTokenEnvelope<T = SignaturesUnvalidated> {
    token: DecodedNucToken,
    proofs: Vec<DecodedNucToken>,
    _unused: PhantomData<T>,
}

impl NucTokenEnvelope<SignaturesUnvalidated> {
    /// Decode a NUC token.
    ///
    /// This performs no integrity checks, and instead only ensures the token and its proofs are well formed.
    pub fn decode(s: &str) -> Result<Self, NucEnvelopeParseError> {
        NucTokenEnvelopeDecoder::default().decode(s)
    }

    /// Validate the signature of this token and all of its proofs.
    ///
    /// Signatures are checked on the token first and then on every proof, in the order
    /// in which they were serialized; the first broken one aborts the validation.
    pub fn validate_signatures(self) -> Result<NucTokenEnvelope<SignaturesValidated>, InvalidSignature> {
        let tokens = iter::once(&self.token).chain(self.proofs.iter());
        for token in tokens {
            token.validate_signature()?;
        }
        Ok(NucTokenEnvelope { token: self.token, proofs: self.proofs, _unused: PhantomData })
    }
}

impl NucTokenEnvelope<SignaturesValidated> {
    /// Drop the proof that signatures in this envelope were validated.
    pub fn unvalidate(self) -> NucTokenEnvelope<SignaturesUnvalidated> {
        let Self { token, proofs, .. } = self;
        NucTokenEnvelope { token, proofs, _unused: PhantomData }
    }
}

impl<T> NucTokenEnvelope<T> {
    /// Encode this envelope.
    pub fn encode(&self) -> String {
        let tokens = iter::once(&self.token).chain(&self.proofs);
        let mut output = String::new();
        for (index, token) in tokens.enumerate() {
            if index > 0 {
                output.push('/');
            }
            output.push_str(&token.to_jwt());
        }
        output
    }

    /// Split this envelope into its parts.
    pub fn into_parts(self) -> (DecodedNucToken, Vec<DecodedNucToken>) {
        (self.token, self.proofs)
    }

    /// Get the token in this envelope.
    pub fn token(&self) -> &DecodedNucToken {
        &self.token
    }

    /// Get the proofs in this envelope.
    pub fn proofs(&self) -> &[DecodedNucToken] {
        &self.proofs
    }
}

impl NucTokenEnvelope<SignaturesUnvalidated> {
    // Assemble an envelope out of a token we just signed ourselves.
    pub(crate) fn from_parts(token: DecodedNucToken, proofs: Vec<DecodedNucToken>) -> Self {
        Self { token, proofs, _unused: PhantomData }
    }
}

/// A NUC token envelope decoder.
#[derive(Debug)]
pub struct NucTokenEnvelopeDecoder {
    /// The maximum raw token size, in bytes.
    pub max_raw_token_size: usize,
}

impl Default for NucTokenEnvelopeDecoder {
    fn default() -> Self {
        Self { max_raw_token_size: DEFAULT_MAX_RAW_TOKEN_SIZE }
    }
}

impl NucTokenEnvelopeDecoder {
    /// Decode a NUC.
    pub fn decode(&self, s: &str) -> Result<NucTokenEnvelope, NucEnvelopeParseError> {
        if s.len() > self.max_raw_token_size {
            return Err(NucEnvelopeParseError::NucTooLarge(self.max_raw_token_size));
        }
        let mut jwts = s.split('/');

        // The first element is the actual token, the rest of them are its proofs
        let token_jwt = jwts.next().ok_or(NucEnvelopeParseError::NoInput)?;
        let token = DecodedNucToken::from_jwt(token_jwt)?;
        let mut proofs = Vec::new();
        for jwt in jwts {
            let proof = DecodedNucToken::from_jwt(jwt)?;
            proofs.push(proof);
        }
        Ok(NucTokenEnvelope { token, proofs, _unused: PhantomData })
    }
}

/// A tag type to indicate an envelope has had its signatures validated.
#[derive(Clone, Debug)]
pub struct SignaturesValidated;

/// A tag type to indicate an envelope has not had its signatures validated.
#[derive(Clone, Debug)]
pub struct SignaturesUnvalidated;

/// An error when parsing a NUC envelope.
#[derive(Debug, thiserror::Error)]
pub enum NucEnvelopeParseError {
    #[error("empty input")]
    NoInput,

    #[error("NUC is larger than max allowed: {0} bytes")]
    NucTooLarge(usize),

    #[error("invalid NUC JWT: {0}")]
    Jwt(#[from] NucJwtParseError),
}

/// A raw NUC token.
///
/// This contains the exact byte sequences that were pulled out of the serialized
/// token. Signatures and proof hashes cover these bytes verbatim, so they are kept
/// around rather than being re-derived from the parsed token.
#[derive(Clone, Debug)]
pub struct RawNucToken {
    pub(crate) header: Vec<u8>,
    pub(crate) payload: Vec<u8>,
    pub(crate) signature: Vec<u8>,
}

impl RawNucToken {
    fn from_jwt(s: &str) -> Result<Self, NucJwtParseError> {
        let mut chunks = s.splitn(3, '.');
        let header = Self::parse_base64_next(&mut chunks, "header")?;
        let payload = Self::parse_base64_next(&mut chunks, "token")?;
        let signature = chunks.next().ok_or(NucJwtParseError::MissingComponent("signature"))?;
        let signature: Vec<u8> = from_base64(signature).map_err(|e| NucJwtParseError::Base64("signature", e))?;
        Ok(Self { header, payload, signature })
    }

    fn to_jwt(&self) -> String {
        let header = Base64Display::new(&self.header, &BASE64_URL_SAFE_NO_PAD);
        let payload = Base64Display::new(&self.payload, &BASE64_URL_SAFE_NO_PAD);
        let signature = Base64Display::new(&self.signature, &BASE64_URL_SAFE_NO_PAD);
        format!("{header}.{payload}.{signature}")
    }

    fn parse_base64_next<'a, I>(iter: &mut I, component: &'static str) -> Result<Vec<u8>, NucJwtParseError>
    where
        I: Iterator<Item = &'a str>,
    {
        let next = iter.next().ok_or(NucJwtParseError::MissingComponent(component))?;
        from_base64(next).map_err(|e| NucJwtParseError::Base64(component, e))
    }
}

/// An error when parsing a NUC in JWT format.
#[derive(Debug, thiserror::Error)]
pub enum NucJwtParseError {
    #[error("no {0} component in jwt")]
    MissingComponent(&'static str),

    #[error("invalid base64 found on {0}: {1}")]
    Base64(&'static str, base64::DecodeError),

    #[error("invalid JSON on {0}: {1}")]
    Json(&'static str, serde_json::Error),
}

/// A decoded NUC token.
///
/// This is a wrapper over a NUC token along with its raw pieces to be able to re-serialize it
/// later on without altering its contents.
#[derive(Clone, Debug)]
pub struct DecodedNucToken {
    pub(crate) raw: RawNucToken,
    pub(crate) header: NucHeader,
    pub(crate) token: NucToken,
}

impl DecodedNucToken {
    pub(crate) fn new(raw: RawNucToken, header: NucHeader, token: NucToken) -> Self {
        Self { raw, header, token }
    }

    fn from_raw(raw: RawNucToken) -> Result<Self, NucJwtParseError> {
        let header = serde_json::from_slice(&raw.header).map_err(|e| NucJwtParseError::Json("header", e))?;
        let token = serde_json::from_slice(&raw.payload).map_err(|e| NucJwtParseError::Json("token", e))?;
        Ok(Self { raw, header, token })
    }

    fn from_jwt(s: &str) -> Result<Self, NucJwtParseError> {
        let raw = RawNucToken::from_jwt(s)?;
        Self::from_raw(raw)
    }

    pub(crate) fn to_jwt(&self) -> String {
        self.raw.to_jwt()
    }

    /// Compute this token's hash.
    pub(crate) fn compute_hash(&self) -> ProofHash {
        let input = self.to_jwt();
        let hash = Sha256::digest(&input);
        ProofHash(hash.into())
    }

    /// Validate the signature in this token.
    ///
    /// The header type decides which signature scheme the token was signed under.
    pub(crate) fn validate_signature(&self) -> Result<(), InvalidSignature> {
        match self.header.typ {
            Some(NucType::NucEip712) => Eip712Scheme.verify(self),
            Some(NucType::Nuc) | None => NativeScheme.verify(self),
        }
    }

    /// Get the NUC token.
    pub fn token(&self) -> &NucToken {
        &self.token
    }

    /// Get the NUC header.
    pub fn header(&self) -> &NucHeader {
        &self.header
    }
}

// A signature scheme a token can be signed under.
trait SignatureScheme {
    fn verify(&self, token: &DecodedNucToken) -> Result<(), InvalidSignature>;
}

// The native scheme: an ECDSA signature over `base64url(header).base64url(payload)`
// verified against the public key embedded in the issuer identity.
struct NativeScheme;

impl SignatureScheme for NativeScheme {
    fn verify(&self, token: &DecodedNucToken) -> Result<(), InvalidSignature> {
        let header = Base64Display::new(&token.raw.header, &BASE64_URL_SAFE_NO_PAD);
        let payload = Base64Display::new(&token.raw.payload, &BASE64_URL_SAFE_NO_PAD);
        let input = format!("{header}.{payload}");

        let public_key = token.token.issuer.public_key().ok_or(InvalidSignature::IssuerPublicKey)?;
        let verifying_key = VerifyingKey::from_sec1_bytes(public_key).map_err(|_| InvalidSignature::IssuerPublicKey)?;
        let signature =
            Signature::try_from(token.raw.signature.as_slice()).map_err(|_| InvalidSignature::NativeSignature)?;
        verifying_key.verify(input.as_bytes(), &signature).map_err(|_| InvalidSignature::NativeSignature)?;
        Ok(())
    }
}

// The EIP-712 scheme: the typed data hash of the token payload under the domain
// carried in the header, signed by the address the issuer identity names.
struct Eip712Scheme;

impl SignatureScheme for Eip712Scheme {
    fn verify(&self, token: &DecodedNucToken) -> Result<(), InvalidSignature> {
        let Did::Ethr { address } = &token.token.issuer else {
            return Err(InvalidSignature::Eip712Issuer);
        };
        let domain = token.header.meta.clone().ok_or(InvalidSignature::Eip712Domain)?;
        let domain: EIP712Domain = serde_json::from_value(domain).map_err(|_| InvalidSignature::Eip712Domain)?;

        let payload = Eip712NucPayload::try_from(&token.token).map_err(|_| InvalidSignature::Eip712Payload)?;
        let digest =
            Eip712Nuc::new(payload, domain).encode_eip712().map_err(|_| InvalidSignature::Eip712Payload)?;

        let signature = EthereumSignature::try_from(token.raw.signature.as_slice())
            .map_err(|_| InvalidSignature::Eip712Signature)?;
        let recovered = signature
            .recover(RecoveryMessage::Hash(H256::from(digest)))
            .map_err(|_| InvalidSignature::Eip712Signature)?;
        if recovered != Address::from(*address) {
            return Err(InvalidSignature::Eip712Signature);
        }
        Ok(())
    }
}

/// An error during the verification of a token signature.
#[derive(Debug, thiserror::Error)]
pub enum InvalidSignature {
    #[error("invalid issuer public key")]
    IssuerPublicKey,

    #[error("native signature verification failed")]
    NativeSignature,

    #[error("eip712 issuer must be an address-based identity")]
    Eip712Issuer,

    #[error("missing or malformed eip712 domain in header")]
    Eip712Domain,

    #[error("eip712 payload could not be encoded")]
    Eip712Payload,

    #[error("eip712 signature verification failed")]
    Eip712Signature,
}

/// The header of a NUC token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NucHeader {
    /// The type of token, which selects the signature scheme. Legacy tokens carry no type
    /// and are verified under the native scheme.
    #[serde(rename = "typ", default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<NucType>,

    /// The signing algorithm.
    #[serde(rename = "alg")]
    pub algorithm: NucAlgorithm,

    /// The token format version.
    #[serde(rename = "ver", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Scheme specific parameters, such as the EIP-712 signing domain.
    #[serde(rename = "meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// The type of a NUC token.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub enum NucType {
    #[serde(rename = "nuc")]
    Nuc,

    #[serde(rename = "nuc+eip712")]
    NucEip712,
}

/// The algorithm a NUC token is signed with.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NucAlgorithm {
    Es256k,
}

pub(crate) fn from_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_URL_SAFE_NO_PAD.decode(input)
}
