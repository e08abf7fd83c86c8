//! Input checks that run before any wallet, provider or contract resource is
//! acquired.

use crate::contract::ContractAddress;
use crate::patient::{hash_condition, ConditionHash, Gender, MAX_AGE, MIN_AGE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("contract address is required")]
    MissingContractAddress,
    #[error("contract address {0:?} is not a 32-byte hex string")]
    InvalidContractAddress(String),
    #[error("age {0} is outside the accepted range [{MIN_AGE}, {MAX_AGE}]")]
    AgeOutOfRange(i64),
    #[error("gender code {0} is not one of 0 (male), 1 (female), 2 (other)")]
    InvalidGenderCode(i64),
    #[error("condition text is empty")]
    EmptyCondition,
    #[error("minimum age {min} is greater than maximum age {max}")]
    InvertedAgeRange { min: u8, max: u8 },
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

pub fn is_valid_age(age: i64) -> bool {
    (MIN_AGE..=MAX_AGE).contains(&age)
}

pub fn validate_age(age: i64) -> Result<u8, ValidationError> {
    if !is_valid_age(age) {
        return Err(ValidationError::AgeOutOfRange(age));
    }
    u8::try_from(age).map_err(|_| ValidationError::AgeOutOfRange(age))
}

/// Only the three declared codes are accepted at the edge, even though the
/// circuit itself would bucket anything else as `Other`.
pub fn validate_gender(code: i64) -> Result<Gender, ValidationError> {
    match code {
        0..=2 => Ok(Gender::from_code(code as u8)),
        _ => Err(ValidationError::InvalidGenderCode(code)),
    }
}

/// Whitespace-only text is rejected, but the hash covers the text exactly as
/// given.
pub fn validate_condition(condition: &str) -> Result<ConditionHash, ValidationError> {
    if condition.trim().is_empty() {
        return Err(ValidationError::EmptyCondition);
    }
    Ok(hash_condition(condition))
}

/// Both bounds must themselves be valid ages.
pub fn validate_age_range(min: i64, max: i64) -> Result<(u8, u8), ValidationError> {
    let min = validate_age(min)?;
    let max = validate_age(max)?;
    if min > max {
        return Err(ValidationError::InvertedAgeRange { min, max });
    }
    Ok((min, max))
}

pub fn require_contract_address(raw: Option<&str>) -> Result<ContractAddress, ValidationError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingContractAddress)?;
    ContractAddress::parse(raw).ok_or_else(|| ValidationError::InvalidContractAddress(raw.into()))
}
