//!
//! Cryptographic provider boundary.
//!
//! Every primitive the crate needs (key generation, signing, verification and
//! conversion between key encodings) goes through [CryptoProvider]. The rest of
//! the crate only sees DER-encoded [PrivateKey]/[PublicKey] values, so a
//! different backend can be plugged in by implementing the trait.
//!
//! [RustCryptoProvider] is the default backend, built on the `rsa` and `p256`
//! crates.
use std::fmt;

use der::{
    Any,
    asn1::{AnyRef, BitString},
};
use pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rand_core::OsRng;
use rsa::{
    RsaPrivateKey, RsaPublicKey,
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey},
};
use sha2::Sha256;
use signature::{Keypair, SignatureEncoding, Signer, Verifier};
use spki::{
    AlgorithmIdentifierOwned, DecodePublicKey, DynSignatureAlgorithmIdentifier, EncodePublicKey,
    SignatureBitStringEncoding,
};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use crate::{
    Result,
    error::Error,
    key::{KeyAlgorithm, KeyPair, PrivateKey, PublicKey},
    oid,
};

/// RSA modulus size used for newly generated keys
pub const RSA_KEY_SIZE: usize = 2048;

/// Private key in a traditional (algorithm-specific) encoding
#[derive(Clone, PartialEq, Eq)]
pub enum TraditionalKey {
    /// PKCS#1 RSAPrivateKey
    Pkcs1(Zeroizing<Vec<u8>>),
    /// SEC1 ECPrivateKey
    Sec1(Zeroizing<Vec<u8>>),
}

impl fmt::Debug for TraditionalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraditionalKey::Pkcs1(_) => f.debug_tuple("Pkcs1").field(&"<KEY>").finish(),
            TraditionalKey::Sec1(_) => f.debug_tuple("Sec1").field(&"<KEY>").finish(),
        }
    }
}

/// Signing capability bound to one private key
pub trait KeySigner: Send + Sync {
    /// Signature algorithm identifier written into signed structures.
    fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned;

    /// Public half of the signing key.
    fn public_key(&self) -> &PublicKey;

    /// Signs `message`, returning the signature in its X.509 BIT STRING payload form.
    fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, signature::Error>;
}

/// Capability set the crate requires from a cryptographic backend
pub trait CryptoProvider: fmt::Debug + Send + Sync {
    /// Generates a fresh key pair using the provider's key policy.
    fn generate_key_pair(&self) -> Result<KeyPair>;

    /// Creates a signer for the given private key.
    fn signer(&self, key: &PrivateKey) -> Result<Box<dyn KeySigner>>;

    /// Verifies `signature` over `message` with `key` using the given signature algorithm.
    fn verify(
        &self,
        key: &PublicKey,
        algorithm: &AlgorithmIdentifierOwned,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()>;

    /// Derives the public half of a private key.
    fn public_key(&self, key: &PrivateKey) -> Result<PublicKey>;

    /// Parses a PKCS#1 RSAPrivateKey into a key pair.
    fn key_pair_from_pkcs1(&self, der: &[u8]) -> Result<KeyPair>;

    /// Parses a SEC1 ECPrivateKey into a key pair.
    fn key_pair_from_sec1(&self, der: &[u8]) -> Result<KeyPair>;

    /// Parses a PKCS#1 RSAPublicKey.
    fn public_key_from_pkcs1(&self, der: &[u8]) -> Result<PublicKey>;

    /// Converts a key pair into its traditional encoding.
    fn key_pair_to_traditional(&self, key_pair: &KeyPair) -> Result<TraditionalKey>;
}

/// Default provider backed by the RustCrypto `rsa` and `p256` crates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RustCryptoProvider {
    key_algorithm: KeyAlgorithm,
}

impl RustCryptoProvider {
    /// Creates a provider which generates keys of the given algorithm.
    /// Only [KeyAlgorithm::EcdsaP256] and [KeyAlgorithm::Rsa] can be generated.
    pub const fn new(key_algorithm: KeyAlgorithm) -> Self {
        Self { key_algorithm }
    }

    /// Algorithm used for newly generated keys
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        self.key_algorithm
    }
}

impl Default for RustCryptoProvider {
    fn default() -> Self {
        Self::new(KeyAlgorithm::EcdsaP256)
    }
}

fn unsupported(operation: &str, algorithm: KeyAlgorithm) -> Error {
    Error::UnsupportedType(format!("{operation} for {algorithm} keys"))
}

fn rsa_private_key(key: &PrivateKey) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_der(key.as_der()).map_err(|_| Error::InvalidPrivateKey)
}

fn p256_secret_key(key: &PrivateKey) -> Result<p256::SecretKey> {
    p256::SecretKey::from_pkcs8_der(key.as_der()).map_err(|_| Error::InvalidPrivateKey)
}

fn rsa_key_pair(private_key: &RsaPrivateKey) -> Result<KeyPair> {
    let private_der = private_key.to_pkcs8_der().map_err(|_| Error::InvalidPrivateKey)?;
    let public_der = private_key
        .to_public_key()
        .to_public_key_der()
        .map_err(|_| Error::InvalidPublicKey)?;
    KeyPair::new(
        PrivateKey::from_der(private_der.as_bytes())?,
        PublicKey::from_der(public_der.as_bytes())?,
    )
}

fn p256_key_pair(secret_key: &p256::SecretKey) -> Result<KeyPair> {
    let private_der = secret_key.to_pkcs8_der().map_err(|_| Error::InvalidPrivateKey)?;
    let public_der = secret_key
        .public_key()
        .to_public_key_der()
        .map_err(|_| Error::InvalidPublicKey)?;
    KeyPair::new(
        PrivateKey::from_der(private_der.as_bytes())?,
        PublicKey::from_der(public_der.as_bytes())?,
    )
}

impl CryptoProvider for RustCryptoProvider {
    #[instrument(name = "generate_key_pair", skip(self), fields(algorithm = %self.key_algorithm))]
    fn generate_key_pair(&self) -> Result<KeyPair> {
        let key_pair = match self.key_algorithm {
            KeyAlgorithm::EcdsaP256 => p256_key_pair(&p256::SecretKey::random(&mut OsRng))?,
            KeyAlgorithm::Rsa => {
                let private_key =
                    RsaPrivateKey::new(&mut OsRng, RSA_KEY_SIZE).map_err(|e| Error::KeyGeneration(e.to_string()))?;
                rsa_key_pair(&private_key)?
            }
            other => return Err(unsupported("key generation", other)),
        };
        debug!("generated key pair");
        Ok(key_pair)
    }

    fn signer(&self, key: &PrivateKey) -> Result<Box<dyn KeySigner>> {
        match key.algorithm() {
            KeyAlgorithm::Rsa => {
                let private_key = rsa_private_key(key)?;
                let public_key = rsa_key_pair(&private_key)?.public_key;
                Ok(Box::new(RustCryptoSigner::Rsa {
                    key: rsa::pkcs1v15::SigningKey::<Sha256>::new(private_key),
                    public_key,
                }))
            }
            KeyAlgorithm::EcdsaP256 => {
                let secret_key = p256_secret_key(key)?;
                let public_key = p256_key_pair(&secret_key)?.public_key;
                Ok(Box::new(RustCryptoSigner::EcdsaP256 {
                    key: p256::ecdsa::SigningKey::from(&secret_key),
                    public_key,
                }))
            }
            other => Err(unsupported("signing", other)),
        }
    }

    fn verify(
        &self,
        key: &PublicKey,
        algorithm: &AlgorithmIdentifierOwned,
        message: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        match (key.algorithm(), algorithm.oid) {
            (KeyAlgorithm::Rsa, oid::SHA256_WITH_RSA_ENCRYPTION_OID) => {
                let public_key =
                    RsaPublicKey::from_public_key_der(key.as_der()).map_err(|_| Error::InvalidPublicKey)?;
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public_key);
                let signature = rsa::pkcs1v15::Signature::try_from(signature)?;
                verifying_key.verify(message, &signature)?;
            }
            (KeyAlgorithm::EcdsaP256, oid::ECDSA_WITH_SHA256_OID) => {
                let verifying_key =
                    p256::ecdsa::VerifyingKey::from_public_key_der(key.as_der()).map_err(|_| Error::InvalidPublicKey)?;
                let signature = p256::ecdsa::Signature::from_der(signature)?;
                verifying_key.verify(message, &signature)?;
            }
            // key and signature algorithm disagree
            _ => return Err(Error::SignatureError(signature::Error::new())),
        }
        Ok(())
    }

    fn public_key(&self, key: &PrivateKey) -> Result<PublicKey> {
        match key.algorithm() {
            KeyAlgorithm::Rsa => Ok(rsa_key_pair(&rsa_private_key(key)?)?.public_key),
            KeyAlgorithm::EcdsaP256 => Ok(p256_key_pair(&p256_secret_key(key)?)?.public_key),
            other => Err(unsupported("public key derivation", other)),
        }
    }

    fn key_pair_from_pkcs1(&self, der: &[u8]) -> Result<KeyPair> {
        let private_key = RsaPrivateKey::from_pkcs1_der(der).map_err(|_| Error::InvalidPrivateKey)?;
        rsa_key_pair(&private_key)
    }

    fn key_pair_from_sec1(&self, der: &[u8]) -> Result<KeyPair> {
        let secret_key = p256::SecretKey::from_sec1_der(der).map_err(|_| Error::InvalidPrivateKey)?;
        p256_key_pair(&secret_key)
    }

    fn public_key_from_pkcs1(&self, der: &[u8]) -> Result<PublicKey> {
        let public_key = RsaPublicKey::from_pkcs1_der(der).map_err(|_| Error::InvalidPublicKey)?;
        let der = public_key.to_public_key_der().map_err(|_| Error::InvalidPublicKey)?;
        PublicKey::from_der(der.as_bytes())
    }

    fn key_pair_to_traditional(&self, key_pair: &KeyPair) -> Result<TraditionalKey> {
        match key_pair.algorithm() {
            KeyAlgorithm::Rsa => {
                let doc = rsa_private_key(key_pair.private_key())?
                    .to_pkcs1_der()
                    .map_err(|_| Error::InvalidPrivateKey)?;
                Ok(TraditionalKey::Pkcs1(Zeroizing::new(doc.as_bytes().to_vec())))
            }
            KeyAlgorithm::EcdsaP256 => {
                let sec1 = p256_secret_key(key_pair.private_key())?
                    .to_sec1_der()
                    .map_err(|_| Error::InvalidPrivateKey)?;
                Ok(TraditionalKey::Sec1(sec1))
            }
            other => Err(unsupported("traditional encoding", other)),
        }
    }
}

enum RustCryptoSigner {
    Rsa {
        key: rsa::pkcs1v15::SigningKey<Sha256>,
        public_key: PublicKey,
    },
    EcdsaP256 {
        key: p256::ecdsa::SigningKey,
        public_key: PublicKey,
    },
}

impl KeySigner for RustCryptoSigner {
    fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        match self {
            RustCryptoSigner::Rsa { .. } => AlgorithmIdentifierOwned {
                oid: oid::SHA256_WITH_RSA_ENCRYPTION_OID,
                parameters: Some(Any::from(AnyRef::NULL)),
            },
            RustCryptoSigner::EcdsaP256 { .. } => AlgorithmIdentifierOwned {
                oid: oid::ECDSA_WITH_SHA256_OID,
                parameters: None,
            },
        }
    }

    fn public_key(&self) -> &PublicKey {
        match self {
            RustCryptoSigner::Rsa { public_key, .. } | RustCryptoSigner::EcdsaP256 { public_key, .. } => public_key,
        }
    }

    fn sign(&self, message: &[u8]) -> std::result::Result<Vec<u8>, signature::Error> {
        match self {
            RustCryptoSigner::Rsa { key, .. } => {
                let signature: rsa::pkcs1v15::Signature = key.try_sign(message)?;
                Ok(signature.to_vec())
            }
            RustCryptoSigner::EcdsaP256 { key, .. } => {
                let signature: p256::ecdsa::DerSignature = key.try_sign(message)?;
                Ok(signature.to_vec())
            }
        }
    }
}

/// Adapts a [KeySigner] to the signer traits expected by the `x509-cert` builders
pub(crate) struct IssuerKey(Box<dyn KeySigner>);

impl IssuerKey {
    pub(crate) fn new(signer: Box<dyn KeySigner>) -> Self {
        Self(signer)
    }
}

impl Keypair for IssuerKey {
    type VerifyingKey = PublicKey;

    fn verifying_key(&self) -> PublicKey {
        self.0.public_key().clone()
    }
}

impl DynSignatureAlgorithmIdentifier for IssuerKey {
    fn signature_algorithm_identifier(&self) -> spki::Result<AlgorithmIdentifierOwned> {
        Ok(self.0.algorithm_identifier())
    }
}

impl Signer<RawSignature> for IssuerKey {
    fn try_sign(&self, msg: &[u8]) -> std::result::Result<RawSignature, signature::Error> {
        self.0.sign(msg).map(RawSignature)
    }
}

/// Signature bytes as produced by a [KeySigner]
pub(crate) struct RawSignature(Vec<u8>);

impl SignatureBitStringEncoding for RawSignature {
    fn to_bitstring(&self) -> der::Result<BitString> {
        BitString::from_bytes(&self.0)
    }
}
