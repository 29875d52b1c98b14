//!
//! Closed union of PKI object kinds and the classifier that produces it
//!
use std::fmt;

use tracing::trace;
use zeroize::Zeroizing;

use crate::{
    Result,
    cert::{Certificate, CertificateRequest, CertificateRevocationList},
    error::Error,
    key::{KeyPair, PrivateKey, PublicKey},
    provider::CryptoProvider,
};

/// Kind of a [PkiObject]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    KeyPair,
    PrivateKey,
    PublicKey,
    Certificate,
    CertificateRequest,
    Crl,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::KeyPair => "key pair",
            ObjectKind::PrivateKey => "private key",
            ObjectKind::PublicKey => "public key",
            ObjectKind::Certificate => "certificate",
            ObjectKind::CertificateRequest => "certificate request",
            ObjectKind::Crl => "CRL",
        };
        f.write_str(name)
    }
}

/// PkiObject is one decoded PEM block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PkiObject {
    KeyPair(KeyPair),
    PrivateKey(PrivateKey),
    PublicKey(PublicKey),
    Certificate(Certificate),
    CertificateRequest(CertificateRequest),
    Crl(CertificateRevocationList),
}

impl PkiObject {
    /// Returns the kind of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            PkiObject::KeyPair(_) => ObjectKind::KeyPair,
            PkiObject::PrivateKey(_) => ObjectKind::PrivateKey,
            PkiObject::PublicKey(_) => ObjectKind::PublicKey,
            PkiObject::Certificate(_) => ObjectKind::Certificate,
            PkiObject::CertificateRequest(_) => ObjectKind::CertificateRequest,
            PkiObject::Crl(_) => ObjectKind::Crl,
        }
    }
}

impl From<KeyPair> for PkiObject {
    fn from(value: KeyPair) -> Self {
        PkiObject::KeyPair(value)
    }
}

impl From<PrivateKey> for PkiObject {
    fn from(value: PrivateKey) -> Self {
        PkiObject::PrivateKey(value)
    }
}

impl From<PublicKey> for PkiObject {
    fn from(value: PublicKey) -> Self {
        PkiObject::PublicKey(value)
    }
}

impl From<Certificate> for PkiObject {
    fn from(value: Certificate) -> Self {
        PkiObject::Certificate(value)
    }
}

impl From<CertificateRequest> for PkiObject {
    fn from(value: CertificateRequest) -> Self {
        PkiObject::CertificateRequest(value)
    }
}

impl From<CertificateRevocationList> for PkiObject {
    fn from(value: CertificateRevocationList) -> Self {
        PkiObject::Crl(value)
    }
}

/// Native DER structure as it comes out of the armor layer, before classification
#[derive(Clone, PartialEq, Eq)]
pub enum RawObject {
    /// X.509 Certificate
    Certificate(Vec<u8>),
    /// PKCS#10 CertificationRequest
    CertificateRequest(Vec<u8>),
    /// X.509 CertificateList
    Crl(Vec<u8>),
    /// PKCS#8 PrivateKeyInfo
    PrivateKeyInfo(Zeroizing<Vec<u8>>),
    /// PKCS#1 RSAPrivateKey
    RsaPrivateKey(Zeroizing<Vec<u8>>),
    /// SEC1 ECPrivateKey
    EcPrivateKey(Zeroizing<Vec<u8>>),
    /// X.509 SubjectPublicKeyInfo
    SubjectPublicKeyInfo(Vec<u8>),
    /// PKCS#1 RSAPublicKey
    RsaPublicKey(Vec<u8>),
    /// Any structure with no PKI object counterpart, e.g. PKCS#7 or domain parameters
    Other { label: String, der: Vec<u8> },
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RawObject::Certificate(_) => "Certificate",
            RawObject::CertificateRequest(_) => "CertificateRequest",
            RawObject::Crl(_) => "Crl",
            RawObject::PrivateKeyInfo(_) => "PrivateKeyInfo",
            RawObject::RsaPrivateKey(_) => "RsaPrivateKey",
            RawObject::EcPrivateKey(_) => "EcPrivateKey",
            RawObject::SubjectPublicKeyInfo(_) => "SubjectPublicKeyInfo",
            RawObject::RsaPublicKey(_) => "RsaPublicKey",
            RawObject::Other { label, .. } => return f.debug_struct("Other").field("label", label).finish(),
        };
        f.debug_tuple(name).field(&"<DER>").finish()
    }
}

/// Normalizes a parsed structure into exactly one [PkiObject] variant
pub trait Classify {
    fn classify(self, provider: &dyn CryptoProvider) -> Result<PkiObject>;
}

impl Classify for RawObject {
    fn classify(self, provider: &dyn CryptoProvider) -> Result<PkiObject> {
        trace!(raw = ?self, "classifying object");
        Ok(match self {
            RawObject::Certificate(der) => PkiObject::Certificate(Certificate::from_der(&der)?),
            RawObject::CertificateRequest(der) => PkiObject::CertificateRequest(CertificateRequest::from_der(&der)?),
            RawObject::Crl(der) => PkiObject::Crl(CertificateRevocationList::from_der(&der)?),
            RawObject::PrivateKeyInfo(der) => PkiObject::PrivateKey(PrivateKey::from_der(&der)?),
            RawObject::RsaPrivateKey(der) => PkiObject::KeyPair(provider.key_pair_from_pkcs1(&der)?),
            RawObject::EcPrivateKey(der) => PkiObject::KeyPair(provider.key_pair_from_sec1(&der)?),
            RawObject::SubjectPublicKeyInfo(der) => PkiObject::PublicKey(PublicKey::from_der(&der)?),
            RawObject::RsaPublicKey(der) => PkiObject::PublicKey(provider.public_key_from_pkcs1(&der)?),
            RawObject::Other { label, .. } => return Err(Error::UnknownObjectType(label)),
        })
    }
}

/// Classifying an already classified object is the identity
impl Classify for PkiObject {
    fn classify(self, _provider: &dyn CryptoProvider) -> Result<PkiObject> {
        Ok(self)
    }
}

/// Classifies `object` with the given provider.
pub fn classify<T: Classify>(object: T, provider: &dyn CryptoProvider) -> Result<PkiObject> {
    object.classify(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RustCryptoProvider;

    #[test]
    fn test_classify_other_is_unknown() {
        let provider = RustCryptoProvider::default();
        let raw = RawObject::Other {
            label: "PKCS7".to_owned(),
            der: vec![0x30, 0x00],
        };
        assert!(matches!(classify(raw, &provider), Err(Error::UnknownObjectType(label)) if label == "PKCS7"));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let provider = RustCryptoProvider::default();
        let key_pair = provider.generate_key_pair().unwrap();

        let raw = RawObject::PrivateKeyInfo(Zeroizing::new(key_pair.private_key().as_der().to_vec()));
        let first = classify(raw, &provider).unwrap();
        let second = classify(first.clone(), &provider).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.kind(), ObjectKind::PrivateKey);
    }

    #[test]
    fn test_classify_sec1_key_pair() {
        let provider = RustCryptoProvider::default();
        let key_pair = provider.generate_key_pair().unwrap();
        let crate::provider::TraditionalKey::Sec1(sec1) = provider.key_pair_to_traditional(&key_pair).unwrap() else {
            panic!("P-256 key pair must encode as SEC1");
        };

        let classified = classify(RawObject::EcPrivateKey(sec1), &provider).unwrap();
        assert_eq!(classified, PkiObject::KeyPair(key_pair));
    }

    #[test]
    fn test_classify_bad_certificate() {
        let provider = RustCryptoProvider::default();
        let result = classify(RawObject::Certificate(vec![0x30, 0x03, 0x02, 0x01, 0x01]), &provider);
        assert!(matches!(result, Err(e) if e.kind() == crate::error::ErrorKind::Format));
    }
}
