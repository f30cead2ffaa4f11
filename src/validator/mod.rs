mod chain;
pub mod error;
mod policy;
mod temporal;

#[cfg(test)]
mod tests;

use crate::{
    did::Did,
    envelope::NucTokenEnvelope,
    token::{NucToken, TokenBody},
};
use chrono::{DateTime, Utc};
use k256::PublicKey;
use std::{collections::HashSet, iter};

pub use error::{ValidationError, ValidationKind};

pub(crate) const MAX_CHAIN_LENGTH: usize = 5;
pub(crate) const MAX_POLICY_WIDTH: usize = 10;
pub(crate) const MAX_POLICY_DEPTH: usize = 5;

/// The result of validating a Nuc token.
pub type ValidationResult = Result<(), ValidationError>;

/// Parameters to be used during validation.
#[derive(Debug)]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct ValidationParameters {
    /// The maximum allowed chain length.
    pub max_chain_length: usize,

    /// The maximum width of a policy.
    pub max_policy_width: usize,

    /// The maximum depth of a policy.
    pub max_policy_depth: usize,

    /// The requirements for the token being validated.
    pub token_requirements: TokenTypeRequirements,
}

impl Default for ValidationParameters {
    fn default() -> Self {
        Self {
            max_chain_length: MAX_CHAIN_LENGTH,
            max_policy_width: MAX_POLICY_WIDTH,
            max_policy_depth: MAX_POLICY_DEPTH,
            token_requirements: Default::default(),
        }
    }
}

/// The requirements for the token being validated.
#[derive(Debug, Default)]
#[cfg_attr(test, derive(serde::Serialize), serde(rename_all = "snake_case"))]
pub enum TokenTypeRequirements {
    /// Require an invocation for the given DID.
    Invocation(Did),

    /// Require a delegation for the given DID.
    Delegation(Did),

    /// Apply no token type requirements, meaning we're okay with any invocation and/or delegation.
    #[default]
    None,
}

/// A Nuc validator.
pub struct NucValidator {
    root_keys: HashSet<[u8; 33]>,
    time_provider: Box<dyn TimeProvider>,
}

impl NucValidator {
    /// Construct a new Nuc validator.
    ///
    /// An empty set of root keys disables the root issuer check entirely.
    pub fn new(root_keys: &[PublicKey]) -> Self {
        let root_keys = root_keys
            .iter()
            .map(|pk| pk.to_sec1_bytes().as_ref().try_into().expect("compressed sec1 key"))
            .collect();
        Self { root_keys, time_provider: Box::new(SystemClockTimeProvider) }
    }

    /// Validate a Nuc.
    ///
    /// Structural, temporal and policy checks run before any signature is looked at so
    /// malformed chains are rejected without paying for cryptographic verification.
    pub fn validate(
        &self,
        envelope: NucTokenEnvelope,
        parameters: ValidationParameters,
        context: &serde_json::Value,
    ) -> Result<ValidatedNucToken, ValidationError> {
        // Perform this one check before anything else to avoid doing costly work
        if envelope.proofs().len().saturating_add(1) > parameters.max_chain_length {
            return Err(ValidationError::Validation(ValidationKind::ChainTooLong));
        }

        let token = &envelope.token().token;
        let proofs = match token.proofs.as_slice() {
            // A token that refers to no proof must not carry any either.
            [] if envelope.proofs().is_empty() => Vec::new(),
            [] => return Err(ValidationKind::UnchainedProofs.into()),
            [hash] => chain::sort_proofs(*hash, envelope.proofs())?,
            _ => return Err(ValidationKind::TooManyProofs.into()),
        };

        // Create a sequence [root, ..., token]
        let token_chain = iter::once(token).chain(proofs.iter().copied()).rev();
        let now = self.time_provider.current_time();
        chain::validate_proofs(token, &proofs, &self.root_keys)?;
        chain::validate_token_chain(token_chain, &parameters, now)?;
        validate_token(token, &proofs, &parameters.token_requirements, context)?;

        // Signature validation is done at the end as it's arguably the most expensive part of the
        // validation process.
        let envelope = envelope.validate_signatures().map_err(|_| ValidationKind::InvalidSignatures)?;
        let (token, proofs) = envelope.into_parts();
        let validated_token =
            ValidatedNucToken { token: token.token, proofs: proofs.into_iter().map(|proof| proof.token).collect() };
        Ok(validated_token)
    }
}

// Validations applied only to the token itself
fn validate_token(
    token: &NucToken,
    proofs: &[&NucToken],
    requirements: &TokenTypeRequirements,
    context: &serde_json::Value,
) -> ValidationResult {
    match &token.body {
        TokenBody::Delegation(_) => {
            match requirements {
                TokenTypeRequirements::Invocation(_) => {
                    return Err(ValidationError::Validation(ValidationKind::NeedInvocation));
                }
                TokenTypeRequirements::Delegation(did) => {
                    chain::validate_condition(&token.audience == did, ValidationKind::InvalidAudience)?
                }
                TokenTypeRequirements::None => (),
            };
        }
        TokenBody::Invocation(_) => {
            match requirements {
                TokenTypeRequirements::Invocation(did) => {
                    chain::validate_condition(&token.audience == did, ValidationKind::InvalidAudience)?;
                }
                TokenTypeRequirements::Delegation(_) => {
                    return Err(ValidationError::Validation(ValidationKind::NeedDelegation));
                }
                TokenTypeRequirements::None => (),
            }
            let token_json = serde_json::to_value(token).map_err(ValidationError::Serde)?;
            for proof in proofs {
                policy::validate_policy_matches(proof, &token_json, context)?;
            }
        }
    };
    Ok(())
}

/// A validated Nuc token along with its proofs.
#[derive(Debug)]
pub struct ValidatedNucToken {
    /// The token.
    pub token: NucToken,

    /// The proofs for the token.
    ///
    /// These are sorted in the way the chain was built, starting from `token`'s proof. That is:
    ///
    /// ```no_compile
    /// token proof -> proofs[0] -> ... -> root_token.
    /// ```
    pub proofs: Vec<NucToken>,
}

/// A source for the current time used during temporal checks.
pub trait TimeProvider: Send + Sync + 'static {
    fn current_time(&self) -> DateTime<Utc>;
}

struct SystemClockTimeProvider;

impl TimeProvider for SystemClockTimeProvider {
    fn current_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
