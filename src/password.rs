//!
//! Store passwords and entry password verification
//!
use std::fmt;

use hmac::{Hmac, Mac};
use rand::{Rng, distr::Alphanumeric, random};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{Result, error::Error};

/// Length of generated store passwords
pub const DEFAULT_PASSWORD_LENGTH: usize = 32;

/// Password protecting a key store. Generated passwords are never reused across stores.
#[derive(Clone, PartialEq, Eq)]
pub struct StorePassword(Zeroizing<String>);

impl StorePassword {
    /// Generate a random alphanumeric password of [DEFAULT_PASSWORD_LENGTH] characters
    pub fn generate() -> Self {
        Self::generate_with_length(DEFAULT_PASSWORD_LENGTH)
    }

    /// Generate a random alphanumeric password of `length` characters
    pub fn generate_with_length(length: usize) -> Self {
        let password = rand::rng()
            .sample_iter(Alphanumeric)
            .take(length)
            .map(char::from)
            .collect::<String>();
        Self(Zeroizing::new(password))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for StorePassword {
    fn from(value: &str) -> Self {
        Self(Zeroizing::new(value.to_owned()))
    }
}

impl From<String> for StorePassword {
    fn from(value: String) -> Self {
        Self(Zeroizing::new(value))
    }
}

impl AsRef<str> for StorePassword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StorePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorePassword").field(&"<PASSWORD>").finish()
    }
}

/// Salted HMAC-SHA256 of an entry password; the password itself is not kept
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct PasswordVerifier {
    salt: [u8; 32],
    mac: Vec<u8>,
}

impl PasswordVerifier {
    pub(crate) fn new(password: &str) -> Result<Self> {
        let salt: [u8; 32] = random();
        let mac = keyed_mac(&salt, password)?.finalize().into_bytes().to_vec();
        Ok(Self { salt, mac })
    }

    pub(crate) fn verify(&self, password: &str) -> bool {
        keyed_mac(&self.salt, password).is_ok_and(|mac| mac.verify_slice(&self.mac).is_ok())
    }
}

fn keyed_mac(salt: &[u8], password: &str) -> Result<Hmac<Sha256>> {
    let mut hmac = <Hmac<Sha256> as Mac>::new_from_slice(salt).map_err(|_| Error::InvalidLength)?;
    hmac.update(password.as_bytes());
    Ok(hmac)
}

impl fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordVerifier").field("salt", &hex::encode(self.salt)).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_passwords() {
        let first = StorePassword::generate();
        let second = StorePassword::generate();
        assert_eq!(first.len(), DEFAULT_PASSWORD_LENGTH);
        assert!(first.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
        assert_eq!(format!("{first:?}"), "StorePassword(\"<PASSWORD>\")");
    }

    #[test]
    fn test_password_verifier() {
        let verifier = PasswordVerifier::new("changeit").unwrap();
        assert!(verifier.verify("changeit"));
        assert!(!verifier.verify("changeme"));
        assert!(!verifier.verify(""));
    }
}
