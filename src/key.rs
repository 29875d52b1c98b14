use std::fmt;

use der::oid::ObjectIdentifier;
use pkcs8::PrivateKeyInfo;
use spki::{AlgorithmIdentifierRef, SubjectPublicKeyInfoRef};
use zeroize::Zeroizing;

use crate::{Result, error::Error, oid};

/// Asymmetric key algorithm of a private or public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// RSA with PKCS#1 v1.5 signatures over SHA-256
    Rsa,
    /// ECDSA over NIST P-256 with SHA-256
    EcdsaP256,
    Ed25519,
    /// Any other algorithm: the key can be stored and encoded but not used for issuance
    Other(ObjectIdentifier),
}

impl KeyAlgorithm {
    pub(crate) fn from_algorithm_identifier(alg: &AlgorithmIdentifierRef<'_>) -> Self {
        match alg.oid {
            oid::RSA_ENCRYPTION_OID => KeyAlgorithm::Rsa,
            oid::EC_PUBLIC_KEY_OID => match alg.parameters_oid() {
                Ok(oid::SECP256R1_OID) => KeyAlgorithm::EcdsaP256,
                _ => KeyAlgorithm::Other(alg.oid),
            },
            oid::ED25519_OID => KeyAlgorithm::Ed25519,
            other => KeyAlgorithm::Other(other),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa => write!(f, "RSA"),
            KeyAlgorithm::EcdsaP256 => write!(f, "ECDSA P-256"),
            KeyAlgorithm::Ed25519 => write!(f, "Ed25519"),
            KeyAlgorithm::Other(oid) => write!(f, "{oid}"),
        }
    }
}

/// PKCS#8 private key wrapper
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub(crate) data: Zeroizing<Vec<u8>>,
    pub(crate) algorithm: KeyAlgorithm,
}

impl PrivateKey {
    /// Parses a PKCS#8 private key encoded in DER format and constructs a new instance of the struct.
    pub fn from_der(data: &[u8]) -> Result<Self> {
        let info: PrivateKeyInfo = data.try_into().map_err(|_| Error::InvalidPrivateKey)?;
        Ok(Self {
            data: Zeroizing::new(data.to_vec()),
            algorithm: KeyAlgorithm::from_algorithm_identifier(&info.algorithm),
        })
    }

    /// Returns a reference to the private key data in PKCS#8 DER-encoded format.
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }

    /// Returns the key algorithm.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("data", &"<PKCS#8>")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// SubjectPublicKeyInfo wrapper
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub(crate) data: Vec<u8>,
    pub(crate) algorithm: KeyAlgorithm,
}

impl PublicKey {
    /// Parses a DER-encoded SubjectPublicKeyInfo.
    pub fn from_der(data: &[u8]) -> Result<Self> {
        let info = SubjectPublicKeyInfoRef::try_from(data).map_err(|_| Error::InvalidPublicKey)?;
        Ok(Self {
            data: data.to_vec(),
            algorithm: KeyAlgorithm::from_algorithm_identifier(&info.algorithm),
        })
    }

    /// Returns the SubjectPublicKeyInfo in DER encoding.
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }

    /// Returns the key algorithm.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("data", &hex::encode(&self.data))
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

impl spki::EncodePublicKey for PublicKey {
    fn to_public_key_der(&self) -> spki::Result<spki::Document> {
        Ok(spki::Document::try_from(self.data.as_slice())?)
    }
}

/// KeyPair holds both halves of one identity's key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub(crate) private_key: PrivateKey,
    pub(crate) public_key: PublicKey,
}

impl KeyPair {
    /// Creates a key pair from its halves. Both halves must use the same algorithm.
    pub fn new(private_key: PrivateKey, public_key: PublicKey) -> Result<Self> {
        if private_key.algorithm != public_key.algorithm {
            return Err(Error::InvalidPublicKey);
        }
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Get a private key
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Get a public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Returns the key algorithm.
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.private_key.algorithm
    }

    /// Splits the pair into its private and public halves.
    pub fn into_parts(self) -> (PrivateKey, PublicKey) {
        (self.private_key, self.public_key)
    }
}
