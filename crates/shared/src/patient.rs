use std::fmt;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Scalar field bound every value handed to the registry circuit must stay
/// below.
pub const FIELD_MODULUS: U256 = U256::from_limbs([
    0xffff_ffff_0000_0000,
    0x53bd_a402_fffe_5bfe,
    0x3339_d808_09a1_d805,
    0x73ed_a753_299d_7d48,
]);

pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn code(&self) -> u8 {
        match self {
            Gender::Male => 0,
            Gender::Female => 1,
            Gender::Other => 2,
        }
    }

    /// Unknown codes fall into the `Other` bucket, matching the circuit.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Gender::Male,
            1 => Gender::Female,
            _ => Gender::Other,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        };
        f.write_str(label)
    }
}

pub fn code_to_gender(code: u8) -> Gender {
    Gender::from_code(code)
}

pub fn gender_to_code(gender: Gender) -> u8 {
    gender.code()
}

/// Field element standing in for a free-text condition.
///
/// The text itself is never submitted; only this hash is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConditionHash(pub U256);

impl ConditionHash {
    pub fn value(&self) -> U256 {
        self.0
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0.to_be_bytes::<32>()
    }
}

impl fmt::Display for ConditionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SHA-256 of the raw UTF-8 bytes reduced into the field. No normalisation:
/// `" flu"` and `"flu"` hash differently.
pub fn hash_condition(condition: &str) -> ConditionHash {
    let digest: [u8; 32] = Sha256::digest(condition.as_bytes()).into();
    ConditionHash(U256::from_be_bytes(digest) % FIELD_MODULUS)
}
