mod error;
mod ethr;
mod key;
mod nil;

pub use error::ParseDidError;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
use std::{fmt, str::FromStr};

/// A Decentralised Identifier (Did).
#[derive(Clone, Copy, Debug)]
pub enum Did {
    /// The legacy `nil` method.
    #[deprecated(
        since = "1.0.0",
        note = "The `did:nil` method is legacy and will be removed the next major version. Use `did:key` instead."
    )]
    Nil { public_key: [u8; 33] },
    /// The `key` method.
    Key { public_key: [u8; 33] },
    /// The `ethr` method.
    Ethr { address: [u8; 20] },
}

impl Did {
    /// Constructs a Did for the `nil` method.
    #[deprecated(
        since = "1.0.0",
        note = "The `did:nil` method is legacy and will be removed the next major version. Use `did:key` instead."
    )]
    #[allow(deprecated)]
    pub fn nil(public_key: [u8; 33]) -> Self {
        Self::Nil { public_key }
    }

    /// Constructs a Did for the `key` method.
    pub fn key(public_key: [u8; 33]) -> Self {
        Self::Key { public_key }
    }

    /// Constructs a Did for the `ethr` method.
    pub fn ethr(address: [u8; 20]) -> Self {
        Self::Ethr { address }
    }

    /// The raw public key behind this identity, if the method embeds one.
    #[allow(deprecated)]
    pub fn public_key(&self) -> Option<&[u8; 33]> {
        match self {
            Did::Nil { public_key } | Did::Key { public_key } => Some(public_key),
            Did::Ethr { .. } => None,
        }
    }
}

// Two identities backed by the same public key are the same identity no matter which
// method encoded them. Identities that carry no key fall back to structural comparison.
impl PartialEq for Did {
    fn eq(&self, other: &Self) -> bool {
        match (self.public_key(), other.public_key()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            (None, None) => match (self, other) {
                (Did::Ethr { address: lhs }, Did::Ethr { address: rhs }) => lhs == rhs,
                _ => false,
            },
            _ => false,
        }
    }
}

impl Eq for Did {}

impl fmt::Display for Did {
    #[allow(deprecated)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Did::Nil { public_key } => nil::format(public_key),
            Did::Key { public_key } => key::format(public_key),
            Did::Ethr { address } => ethr::format(address),
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Did {
    type Err = ParseDidError;

    #[allow(deprecated)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(s) = s.strip_prefix("did:nil:") {
            let public_key = nil::parse(s)?;
            Ok(Self::Nil { public_key })
        } else if let Some(s) = s.strip_prefix("did:key:") {
            let public_key = key::parse(s)?;
            Ok(Self::Key { public_key })
        } else if let Some(s) = s.strip_prefix("did:ethr:0x") {
            let address = ethr::parse(s)?;
            Ok(Self::Ethr { address })
        } else {
            Err(ParseDidError::NoDid)
        }
    }
}

impl Serialize for Did {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<Did>().map_err(D::Error::custom)
    }
}
