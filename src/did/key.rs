use super::error::ParseDidError;
use multibase::Base;

// The multicodec prefix for a secp256k1 public key.
const SECP256K1_PREFIX: [u8; 2] = [0xe7, 0x01];

pub(super) fn format(public_key: &[u8; 33]) -> String {
    let mut prefixed_key = [0u8; SECP256K1_PREFIX.len() + 33];
    prefixed_key[..SECP256K1_PREFIX.len()].copy_from_slice(&SECP256K1_PREFIX);
    prefixed_key[SECP256K1_PREFIX.len()..].copy_from_slice(public_key);
    let multibase_key = multibase::encode(Base::Base58Btc, prefixed_key);
    format!("did:key:{multibase_key}")
}

pub(super) fn parse(s: &str) -> Result<[u8; 33], ParseDidError> {
    let (base, decoded) = multibase::decode(s).map_err(|_| ParseDidError::Multibase)?;
    if base != Base::Base58Btc {
        return Err(ParseDidError::UnsupportedMultibase);
    }
    let key = decoded.strip_prefix(SECP256K1_PREFIX.as_slice()).ok_or(ParseDidError::UnsupportedMulticodec)?;
    key.try_into().map_err(|_| ParseDidError::InvalidKeyLength)
}
