//! Turns a raw wallet secret (hex string or BIP-39 mnemonic) into the
//! canonical 32-byte [`Secret`].

use std::fmt;

use bip39::{Language, Mnemonic};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const SECRET_LEN: usize = 32;
pub const SECRET_HEX_LEN: usize = SECRET_LEN * 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeedError {
    #[error("wallet secret is missing")]
    MissingSecret,
    #[error("mnemonic phrase is invalid: {0}")]
    InvalidMnemonic(String),
    #[error("wallet secret contains non-hex characters")]
    InvalidHexSeed,
    #[error("wallet secret is too short: {0} hex characters, need at least {SECRET_HEX_LEN}")]
    SecretTooShort(usize),
}

#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_LEN]);

impl Secret {
    pub fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.0
    }

    /// Lowercase 64-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First `len` hex characters, used to name per-wallet files without
    /// exposing the full secret.
    pub fn hex_prefix(&self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.min(SECRET_HEX_LEN));
        hex
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({}…)", self.hex_prefix(8))
    }
}

pub fn normalize_seed(raw: Option<&str>) -> Result<Secret, SeedError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(SeedError::MissingSecret);
    }

    if trimmed.contains(char::is_whitespace) {
        from_mnemonic(trimmed)
    } else {
        from_hex(trimmed)
    }
}

fn from_mnemonic(phrase: &str) -> Result<Secret, SeedError> {
    let normalized = phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))?;

    let mut seed = mnemonic.to_seed_normalized("");
    let mut bytes = [0u8; SECRET_LEN];
    bytes.copy_from_slice(&seed[..SECRET_LEN]);
    seed.zeroize();

    Ok(Secret(bytes))
}

fn from_hex(raw: &str) -> Result<Secret, SeedError> {
    let without_prefix = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let mut cleaned: String = without_prefix
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SeedError::InvalidHexSeed);
    }
    if cleaned.len() < SECRET_HEX_LEN {
        return Err(SeedError::SecretTooShort(cleaned.len()));
    }
    cleaned.truncate(SECRET_HEX_LEN);

    let mut bytes = [0u8; SECRET_LEN];
    hex::decode_to_slice(&cleaned, &mut bytes).map_err(|_| SeedError::InvalidHexSeed)?;
    cleaned.zeroize();

    Ok(Secret(bytes))
}
