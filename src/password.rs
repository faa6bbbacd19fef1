//! # Password Generation
//!
//! Administrator passwords for new servers.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;

/// Generates random passwords of a requested length
pub trait PasswordGenerator: Send + Sync {
    fn generate(&self, length: usize) -> Result<String>;
}

/// Passwords drawn from the operating system RNG
///
/// `length` random bytes are base64 encoded and truncated to exactly `length`
/// characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPasswordGenerator;

impl PasswordGenerator for RandomPasswordGenerator {
    fn generate(&self, length: usize) -> Result<String> {
        if length == 0 {
            bail!("password length must be greater than zero");
        }

        let mut raw = vec![0u8; length];
        OsRng
            .try_fill_bytes(&mut raw)
            .context("cannot read random bytes")?;

        let mut password = STANDARD.encode(&raw);
        password.truncate(length);
        Ok(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PASSWORD_DATA_LEN;

    #[test]
    fn test_generate_exact_length() {
        for length in [1, 3, 4, PASSWORD_DATA_LEN, 64] {
            let password = RandomPasswordGenerator.generate(length).unwrap();
            assert_eq!(password.chars().count(), length);
        }
    }

    #[test]
    fn test_generate_uses_base64_alphabet() {
        let password = RandomPasswordGenerator.generate(PASSWORD_DATA_LEN).unwrap();
        assert!(password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '='));
    }

    #[test]
    fn test_generate_differs_between_calls() {
        let first = RandomPasswordGenerator.generate(PASSWORD_DATA_LEN).unwrap();
        let second = RandomPasswordGenerator.generate(PASSWORD_DATA_LEN).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_generate_rejects_zero_length() {
        assert!(RandomPasswordGenerator.generate(0).is_err());
    }
}
