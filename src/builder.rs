use crate::{
    did::Did,
    envelope::{DecodedNucToken, InvalidSignature, NucTokenEnvelope, RawNucToken, SignaturesValidated},
    policy::Policy,
    signer::{NucSigner, SigningError},
    token::{Command, JsonObject, NucToken, TokenBody},
};
use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

// Helper to simplify unwrapping options in the builders
macro_rules! try_get {
    ($option:expr, $name:literal) => {
        $option.ok_or(NucTokenBuildError::MissingField($name))
    };
}

// The setters shared by both builders.
macro_rules! common_builder_methods {
    () => {
        /// Set the audience for this token.
        pub fn audience(mut self, did: Did) -> Self {
            self.fields.audience = Some(did);
            self
        }

        /// Set the subject for this token.
        pub fn subject(mut self, did: Did) -> Self {
            self.fields.subject = Some(did);
            self
        }

        /// Set the expiration time for this token.
        pub fn expires_at(mut self, timestamp: DateTime<Utc>) -> Self {
            self.fields.expires_at = Some(timestamp);
            self
        }

        /// Set the expiration time for this token based on an offset from the current time.
        pub fn expires_in(mut self, offset: Duration) -> Self {
            self.fields.expires_at = Some(Utc::now() + offset);
            self
        }

        /// Set the timestamp at which this token first becomes valid.
        pub fn not_before(mut self, timestamp: DateTime<Utc>) -> Self {
            self.fields.not_before = Some(timestamp);
            self
        }

        /// Set the command for this token.
        pub fn command<T: Into<Command>>(mut self, command: T) -> Self {
            self.fields.command = Some(command.into());
            self
        }

        /// Set the metadata for this token.
        pub fn meta(mut self, meta: JsonObject) -> Self {
            self.fields.meta = Some(meta);
            self
        }

        /// Set the nonce for this token.
        ///
        /// A random 16 byte nonce is generated when none is set.
        pub fn nonce<T: Into<Vec<u8>>>(mut self, nonce: T) -> Self {
            self.fields.nonce = nonce.into();
            self
        }

        /// Use the given envelope as a proof to be chained into the built token.
        pub fn proof(mut self, envelope: NucTokenEnvelope<SignaturesValidated>) -> Self {
            self.fields.proof = Some(envelope);
            self
        }
    };
}

/// The fields shared by every token, regardless of its body.
#[derive(Clone, Debug, Default)]
struct TokenFields {
    audience: Option<Did>,
    subject: Option<Did>,
    not_before: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    command: Option<Command>,
    meta: Option<JsonObject>,
    nonce: Vec<u8>,
    proof: Option<NucTokenEnvelope<SignaturesValidated>>,
}

impl TokenFields {
    // Pull the subject, command and proof out of a delegation being extended.
    fn extending(envelope: NucTokenEnvelope<SignaturesValidated>) -> Result<Self, NucTokenBuildError> {
        let token = envelope.token().token();
        if let TokenBody::Invocation(_) = &token.body {
            return Err(NucTokenBuildError::CannotExtendInvocation);
        }
        let mut fields = Self { subject: Some(token.subject), command: Some(token.command.clone()), ..Default::default() };
        fields.proof = Some(envelope);
        Ok(fields)
    }
}

/// A builder for a delegation token.
#[derive(Clone, Debug, Default)]
pub struct DelegationBuilder {
    fields: TokenFields,
    policies: Vec<Policy>,
}

impl DelegationBuilder {
    /// Construct a new delegation builder with no policies attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder that extends the authority in the given delegation.
    ///
    /// This pulls the subject and command out of the given token and chains it in as
    /// the proof of the one being built.
    pub fn extending(envelope: NucTokenEnvelope<SignaturesValidated>) -> Result<Self, NucTokenBuildError> {
        let fields = TokenFields::extending(envelope)?;
        Ok(Self { fields, policies: Vec::new() })
    }

    common_builder_methods!();

    /// Add a policy to this token.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Set all the policies for this token, replacing any previously added ones.
    pub fn policies<I: Into<Vec<Policy>>>(mut self, policies: I) -> Self {
        self.policies = policies.into();
        self
    }

    /// Sign the built token, returning the envelope for it.
    pub async fn sign(
        self,
        signer: &dyn NucSigner,
    ) -> Result<NucTokenEnvelope<SignaturesValidated>, NucTokenBuildError> {
        let Self { fields, policies } = self;
        sign_token(fields, TokenBody::Delegation(policies), signer).await
    }

    /// Sign the built token and serialize the resulting envelope.
    pub async fn sign_and_serialize(self, signer: &dyn NucSigner) -> Result<String, NucTokenBuildError> {
        Ok(self.sign(signer).await?.encode())
    }
}

/// A builder for an invocation token.
#[derive(Clone, Debug)]
pub struct InvocationBuilder {
    fields: TokenFields,
    arguments: serde_json::Value,
}

impl InvocationBuilder {
    /// Construct a new invocation builder with empty arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder that invokes the authority granted in the given delegation.
    pub fn extending(envelope: NucTokenEnvelope<SignaturesValidated>) -> Result<Self, NucTokenBuildError> {
        let fields = TokenFields::extending(envelope)?;
        Ok(Self { fields, arguments: serde_json::Value::Object(Default::default()) })
    }

    common_builder_methods!();

    /// Set the arguments this invocation is performed with.
    ///
    /// The value must be a JSON object.
    pub fn arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = arguments;
        self
    }

    /// Sign the built token, returning the envelope for it.
    pub async fn sign(
        self,
        signer: &dyn NucSigner,
    ) -> Result<NucTokenEnvelope<SignaturesValidated>, NucTokenBuildError> {
        let Self { fields, arguments } = self;
        let arguments = match arguments {
            serde_json::Value::Object(arguments) => arguments,
            _ => return Err(NucTokenBuildError::ArgumentsNotAnObject),
        };
        sign_token(fields, TokenBody::Invocation(arguments), signer).await
    }

    /// Sign the built token and serialize the resulting envelope.
    pub async fn sign_and_serialize(self, signer: &dyn NucSigner) -> Result<String, NucTokenBuildError> {
        Ok(self.sign(signer).await?.encode())
    }
}

impl Default for InvocationBuilder {
    fn default() -> Self {
        Self { fields: Default::default(), arguments: serde_json::Value::Object(Default::default()) }
    }
}

async fn sign_token(
    fields: TokenFields,
    body: TokenBody,
    signer: &dyn NucSigner,
) -> Result<NucTokenEnvelope<SignaturesValidated>, NucTokenBuildError> {
    let TokenFields { audience, subject, not_before, expires_at, command, meta, nonce, proof } = fields;

    let audience = try_get!(audience, "audience")?;
    let subject = try_get!(subject, "subject")?;
    let command = try_get!(command, "command")?;
    let issuer = *signer.did();

    let nonce = if nonce.is_empty() { rand::random::<[u8; 16]>().to_vec() } else { nonce };

    let mut token =
        NucToken { issuer, audience, subject, not_before, expires_at, command, body, meta, nonce, proofs: vec![] };

    let mut all_proofs = Vec::new();
    if let Some(envelope) = proof {
        let hash = envelope.token().compute_hash();
        let (head_proof, proofs) = envelope.into_parts();
        token.proofs.push(hash);
        all_proofs.push(head_proof);
        all_proofs.extend(proofs);
    }

    let (header, signature) = signer.sign_token(&token).await?;

    let header_bytes = serde_json::to_vec(&header).map_err(|e| NucTokenBuildError::EncodingHeader(e.to_string()))?;
    let payload_bytes = serde_json::to_vec(&token).map_err(|e| NucTokenBuildError::EncodingToken(e.to_string()))?;
    let raw = RawNucToken { header: header_bytes, payload: payload_bytes, signature };
    let decoded = DecodedNucToken::new(raw, header, token);

    // Check the signer produced something its own identity can verify before handing
    // the envelope out.
    let envelope = NucTokenEnvelope::from_parts(decoded, all_proofs).validate_signatures()?;
    Ok(envelope)
}

/// An error when constructing a token.
#[derive(Debug, thiserror::Error)]
pub enum NucTokenBuildError {
    #[error("required field missing: {0}")]
    MissingField(&'static str),

    #[error("invocations cannot be extended")]
    CannotExtendInvocation,

    #[error("invocation arguments must be an object")]
    ArgumentsNotAnObject,

    #[error("encoding header: {0}")]
    EncodingHeader(String),

    #[error("encoding token: {0}")]
    EncodingToken(String),

    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("signer produced an invalid signature: {0}")]
    InvalidSignature(#[from] InvalidSignature),
}

pub(crate) fn to_base64<T: AsRef<[u8]>>(input: T) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn to_base64_json<T: Serialize>(input: &T) -> Result<String, serde_json::Error> {
    let input = serde_json::to_vec(input)?;
    Ok(to_base64(&input))
}
