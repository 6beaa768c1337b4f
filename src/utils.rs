//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::IdentifierError;

pub const ANIMAL_HRP: &str = "animal_";
pub const ADOPTION_HRP: &str = "adoption_";
pub const USER_HRP: &str = "user_";

// construct a unique time-ordered id then encode using bech32m
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, IdentifierError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|err| IdentifierError(err.to_string()))?;
    let encode =
        bech32::encode::<Bech32m>(hrp, uuid7().as_bytes()).map_err(|err| IdentifierError(err.to_string()))?;
    Ok(encode)
}
