use super::error::ParseDidError;
use ethers::{types::Address, utils::to_checksum};

pub(super) fn format(address: &[u8; 20]) -> String {
    let checksummed = to_checksum(&Address::from(*address), None);
    format!("did:ethr:{checksummed}")
}

pub(super) fn parse(s: &str) -> Result<[u8; 20], ParseDidError> {
    // Addresses are accepted in any case, the EIP-55 checksum is not enforced.
    let mut address = [0u8; 20];
    hex::decode_to_slice(s.to_lowercase(), &mut address).map_err(ParseDidError::AddressChars)?;
    Ok(address)
}
