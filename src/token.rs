use crate::{did::Did, policy::Policy};
use chrono::{DateTime, Utc};
use ethers::{
    abi::{self, Token},
    types::{
        U256,
        transaction::eip712::{EIP712Domain, Eip712, Eip712Error},
    },
    utils::keccak256,
};
use hex::FromHexError;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::{fmt, str::FromStr};

/// A JSON object.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// A Nillion NUC token.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NucToken {
    /// The token issuer.
    #[serde(rename = "iss")]
    pub issuer: Did,

    /// The token audience.
    #[serde(rename = "aud")]
    pub audience: Did,

    /// The token subject.
    #[serde(rename = "sub")]
    pub subject: Did,

    /// The first timestamp at which this token is valid.
    #[serde(
        rename = "nbf",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub not_before: Option<DateTime<Utc>>,

    /// The timestamp at which this token becomes invalid.
    #[serde(
        rename = "exp",
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,

    /// The command that is being invoked or the authority is being delegated for.
    #[serde(rename = "cmd")]
    pub command: Command,

    /// The token body.
    #[serde(flatten)]
    pub body: TokenBody,

    /// Metadata associated to this token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<JsonObject>,

    /// The token nonce.
    #[serde(with = "hex::serde")]
    pub nonce: Vec<u8>,

    /// The hash of the proofs in this token.
    #[serde(rename = "prf", default)]
    pub proofs: Vec<ProofHash>,
}

/// The hash of a proof.
#[derive(Clone, Copy, Debug, Eq, Hash, SerializeDisplay, DeserializeFromStr, PartialEq)]
pub struct ProofHash(pub [u8; 32]);

impl fmt::Display for ProofHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = hex::encode(self.0);
        write!(f, "{hash}")
    }
}

impl FromStr for ProofHash {
    type Err = FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut data = [0; 32];
        hex::decode_to_slice(s, &mut data)?;
        Ok(Self(data))
    }
}

/// A command.
#[derive(Clone, Debug, SerializeDisplay, DeserializeFromStr, PartialEq)]
pub struct Command(pub Vec<String>);

impl Command {
    /// Whether this command is scoped within `parent`.
    ///
    /// `/nil/db/read` is an attenuation of `/nil/db`, `/nil` and `/`, but not of
    /// `/nil/queries`.
    pub fn is_attenuation_of(&self, parent: &Command) -> bool {
        if self.0.len() < parent.0.len() {
            return false;
        }
        self.0.iter().take(parent.0.len()).eq(parent.0.iter())
    }
}

impl From<Vec<String>> for Command {
    fn from(command: Vec<String>) -> Self {
        Self(command)
    }
}

impl From<&[&str]> for Command {
    fn from(command: &[&str]) -> Self {
        let command = command.iter().map(ToString::to_string).collect();
        Self(command)
    }
}

impl<const N: usize> From<[&str; N]> for Command {
    fn from(command: [&str; N]) -> Self {
        Self::from(command.as_slice())
    }
}

impl FromStr for Command {
    type Err = MalformedCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('/') {
            return Err(MalformedCommandError::LeadingSlash);
        }
        let s = &s[1..];
        if s.is_empty() {
            return Ok(Self(vec![]));
        }
        let mut segments = Vec::new();
        for segment in s.split("/") {
            if segment.is_empty() {
                return Err(MalformedCommandError::EmptySegment);
            }
            segments.push(segment.into());
        }
        Ok(Self(segments))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// The body of a token
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub enum TokenBody {
    #[serde(rename = "pol")]
    Delegation(Vec<Policy>),

    #[serde(rename = "args")]
    Invocation(JsonObject),
}

/// An encountered error when parsing a command.
#[derive(Debug, thiserror::Error)]
pub enum MalformedCommandError {
    #[error("no leading slash")]
    LeadingSlash,

    #[error("empty segment")]
    EmptySegment,
}

/// The flattened form of a NUC token signed as EIP-712 typed data.
///
/// Wallets render what they sign, so every field maps to a primitive typed-data
/// value: identities as DID strings, the body as its JSON encoding, absent
/// timestamps as zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Eip712NucPayload {
    pub issuer: String,
    pub audience: String,
    pub subject: String,
    pub command: String,
    pub policy: String,
    pub arguments: String,
    pub not_before: u64,
    pub expires_at: u64,
    pub nonce: String,
    pub proofs: Vec<String>,
}

impl TryFrom<&NucToken> for Eip712NucPayload {
    type Error = serde_json::Error;

    fn try_from(token: &NucToken) -> Result<Self, Self::Error> {
        let (policy, arguments) = match &token.body {
            TokenBody::Delegation(policies) => (serde_json::to_string(policies)?, "{}".to_string()),
            TokenBody::Invocation(args) => ("[]".to_string(), serde_json::to_string(args)?),
        };
        Ok(Self {
            issuer: token.issuer.to_string(),
            audience: token.audience.to_string(),
            subject: token.subject.to_string(),
            command: token.command.to_string(),
            policy,
            arguments,
            not_before: token.not_before.map(|t| t.timestamp() as u64).unwrap_or(0),
            expires_at: token.expires_at.map(|t| t.timestamp() as u64).unwrap_or(0),
            nonce: hex::encode(&token.nonce),
            proofs: token.proofs.iter().map(ToString::to_string).collect(),
        })
    }
}

// The type every NUC payload is hashed under, mirroring the wire field names.
const NUC_PAYLOAD_TYPE: &str = "NucPayload(string iss,string aud,string sub,string cmd,string pol,string args,uint256 nbf,uint256 exp,string nonce,string[] prf)";

/// An [`Eip712NucPayload`] bound to a signing domain, hashable as EIP-712 typed data.
#[derive(Clone, Debug)]
pub struct Eip712Nuc {
    payload: Eip712NucPayload,
    domain: EIP712Domain,
}

impl Eip712Nuc {
    pub fn new(payload: Eip712NucPayload, domain: EIP712Domain) -> Self {
        Self { payload, domain }
    }
}

impl Eip712 for Eip712Nuc {
    type Error = Eip712Error;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        Ok(self.domain.clone())
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Ok(keccak256(NUC_PAYLOAD_TYPE))
    }

    fn encode_eip712(&self) -> Result<[u8; 32], Self::Error> {
        let domain_separator = self.domain()?.separator();
        let struct_hash = self.struct_hash()?;
        let digest = [[0x19, 0x01].as_slice(), &domain_separator, &struct_hash].concat();
        Ok(keccak256(digest))
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        let Eip712NucPayload {
            issuer,
            audience,
            subject,
            command,
            policy,
            arguments,
            not_before,
            expires_at,
            nonce,
            proofs,
        } = &self.payload;
        // Dynamic types are replaced by their keccak hash per the EIP-712 encoding rules.
        let proofs: Vec<u8> = proofs.iter().flat_map(|proof| keccak256(proof.as_bytes())).collect();
        let tokens = [
            Token::FixedBytes(Self::type_hash()?.to_vec()),
            hashed_string(issuer),
            hashed_string(audience),
            hashed_string(subject),
            hashed_string(command),
            hashed_string(policy),
            hashed_string(arguments),
            Token::Uint(U256::from(*not_before)),
            Token::Uint(U256::from(*expires_at)),
            hashed_string(nonce),
            Token::FixedBytes(keccak256(proofs).to_vec()),
        ];
        Ok(keccak256(abi::encode(&tokens)))
    }
}

fn hashed_string(value: &str) -> Token {
    Token::FixedBytes(keccak256(value.as_bytes()).to_vec())
}
