//!
//! PEM codec: armor text to typed [PkiObject] values and back
//!
//! A stream may hold any number of blocks. Text outside of `BEGIN`/`END`
//! delimiters is ignored, and blocks are returned in stream order.
//!
use std::{
    fmt,
    io::{Read, Write},
    sync::Arc,
};

use der::pem::{self, LineEnding};
use pkcs5::pbes2;
use pkcs8::{EncryptedPrivateKeyInfo, PrivateKeyInfo};
use rand::random;
use tracing::{debug, instrument};
use x509_parser::pem::Pem;
use zeroize::Zeroizing;

use crate::{
    Result,
    cert::{Certificate, CertificateRequest},
    error::Error,
    key::PrivateKey,
    object::{Classify, ObjectKind, PkiObject, RawObject},
    provider::{CryptoProvider, RustCryptoProvider, TraditionalKey},
};

/// PBKDF2 iteration count for encrypted private keys written by this codec
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 10000;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const CERTIFICATE_REQUEST_LABEL: &str = "CERTIFICATE REQUEST";
pub const CRL_LABEL: &str = "X509 CRL";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
pub const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";
pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
pub const RSA_PUBLIC_KEY_LABEL: &str = "RSA PUBLIC KEY";

// Labels of well-formed PEM structures which have no PkiObject counterpart
const UNSUPPORTED_LABELS: &[&str] = &[
    "PKCS7",
    "CMS",
    "EC PARAMETERS",
    "DH PARAMETERS",
    "ATTRIBUTE CERTIFICATE",
    "TRUSTED CERTIFICATE",
];

/// PEM encoder and decoder bound to a cryptographic provider
#[derive(Clone)]
pub struct PemCodec {
    provider: Arc<dyn CryptoProvider>,
    password: Option<Zeroizing<String>>,
}

impl Default for PemCodec {
    fn default() -> Self {
        Self::new(Arc::new(RustCryptoProvider::default()))
    }
}

impl fmt::Debug for PemCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PemCodec")
            .field("provider", &self.provider)
            .field("password", &self.password.as_ref().map(|_| "<PASSWORD>"))
            .finish()
    }
}

impl PemCodec {
    /// Create a codec using the given provider for legacy key formats
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            password: None,
        }
    }

    /// Set the password used to decrypt `ENCRYPTED PRIVATE KEY` blocks
    pub fn password(mut self, password: &str) -> Self {
        self.password = Some(Zeroizing::new(password.to_owned()));
        self
    }

    /// Decode every PEM block of `source` into a [PkiObject], in stream order
    #[instrument(name = "pem_decode", skip_all)]
    pub fn decode<R: Read>(&self, mut source: R) -> Result<Vec<PkiObject>> {
        let mut data = Zeroizing::new(Vec::new());
        source.read_to_end(&mut data)?;
        drop(source);

        std::str::from_utf8(&data).map_err(|_| Error::InvalidEncoding)?;

        let objects = Pem::iter_from_buffer(&data)
            .map(|block| {
                let Pem { label, contents } = block?;
                self.to_raw(&label, contents)?.classify(self.provider.as_ref())
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = objects.len(), "decoded PEM objects");
        Ok(objects)
    }

    /// Decode certificates, failing if any block holds a different object kind
    pub fn decode_certificates<R: Read>(&self, source: R) -> Result<Vec<Certificate>> {
        self.decode(source)?
            .into_iter()
            .map(|object| match object {
                PkiObject::Certificate(cert) => Ok(cert),
                other => Err(type_mismatch(ObjectKind::Certificate, &other)),
            })
            .collect()
    }

    /// Decode private keys, taking the private half of any key pair
    pub fn decode_private_keys<R: Read>(&self, source: R) -> Result<Vec<PrivateKey>> {
        self.decode(source)?
            .into_iter()
            .map(|object| match object {
                PkiObject::PrivateKey(key) => Ok(key),
                PkiObject::KeyPair(key_pair) => Ok(key_pair.into_parts().0),
                other => Err(type_mismatch(ObjectKind::PrivateKey, &other)),
            })
            .collect()
    }

    /// Decode exactly one private key
    pub fn decode_single_private_key<R: Read>(&self, source: R) -> Result<PrivateKey> {
        exactly_one(self.decode_private_keys(source)?, ObjectKind::PrivateKey)
    }

    /// Decode exactly one certificate request
    pub fn decode_csr<R: Read>(&self, source: R) -> Result<CertificateRequest> {
        let requests = self
            .decode(source)?
            .into_iter()
            .map(|object| match object {
                PkiObject::CertificateRequest(csr) => Ok(csr),
                other => Err(type_mismatch(ObjectKind::CertificateRequest, &other)),
            })
            .collect::<Result<Vec<_>>>()?;
        exactly_one(requests, ObjectKind::CertificateRequest)
    }

    /// Write one object as a PEM block
    pub fn encode<W: Write>(&self, object: &PkiObject, mut sink: W) -> Result<()> {
        let encoded = match object {
            PkiObject::Certificate(cert) => Zeroizing::new(pem::encode_string(
                CERTIFICATE_LABEL,
                LineEnding::LF,
                cert.as_der(),
            )?),
            PkiObject::CertificateRequest(csr) => Zeroizing::new(pem::encode_string(
                CERTIFICATE_REQUEST_LABEL,
                LineEnding::LF,
                csr.as_der(),
            )?),
            PkiObject::Crl(crl) => Zeroizing::new(pem::encode_string(CRL_LABEL, LineEnding::LF, crl.as_der())?),
            PkiObject::PrivateKey(key) => Zeroizing::new(pem::encode_string(
                PRIVATE_KEY_LABEL,
                LineEnding::LF,
                key.as_der(),
            )?),
            PkiObject::PublicKey(key) => Zeroizing::new(pem::encode_string(
                PUBLIC_KEY_LABEL,
                LineEnding::LF,
                key.as_der(),
            )?),
            PkiObject::KeyPair(key_pair) => match self.provider.key_pair_to_traditional(key_pair)? {
                TraditionalKey::Pkcs1(der) => {
                    Zeroizing::new(pem::encode_string(RSA_PRIVATE_KEY_LABEL, LineEnding::LF, &der)?)
                }
                TraditionalKey::Sec1(der) => {
                    Zeroizing::new(pem::encode_string(EC_PRIVATE_KEY_LABEL, LineEnding::LF, &der)?)
                }
            },
        };
        sink.write_all(encoded.as_bytes())?;
        sink.flush()?;
        Ok(())
    }

    /// Write a private key as an `ENCRYPTED PRIVATE KEY` block (PBES2, PBKDF2-SHA256, AES-256-CBC)
    pub fn encode_encrypted_private_key<W: Write>(&self, key: &PrivateKey, password: &str, mut sink: W) -> Result<()> {
        let salt: [u8; 32] = random();
        let iv: [u8; 16] = random();
        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(DEFAULT_PBKDF2_ITERATIONS, &salt, &iv)
            .map_err(|_| Error::InvalidPrivateKey)?;

        let info = PrivateKeyInfo::try_from(key.as_der()).map_err(|_| Error::InvalidPrivateKey)?;
        let encrypted = info
            .encrypt_with_params(params, password.as_bytes())
            .map_err(|_| Error::InvalidPrivateKey)?;

        let encoded = pem::encode_string(ENCRYPTED_PRIVATE_KEY_LABEL, LineEnding::LF, encrypted.as_bytes())?;
        sink.write_all(encoded.as_bytes())?;
        sink.flush()?;
        Ok(())
    }

    fn to_raw(&self, label: &str, der: Vec<u8>) -> Result<RawObject> {
        Ok(match label {
            CERTIFICATE_LABEL | "X509 CERTIFICATE" => RawObject::Certificate(der),
            CERTIFICATE_REQUEST_LABEL | "NEW CERTIFICATE REQUEST" => RawObject::CertificateRequest(der),
            CRL_LABEL => RawObject::Crl(der),
            PRIVATE_KEY_LABEL => RawObject::PrivateKeyInfo(Zeroizing::new(der)),
            ENCRYPTED_PRIVATE_KEY_LABEL => RawObject::PrivateKeyInfo(self.decrypt(&der)?),
            RSA_PRIVATE_KEY_LABEL => RawObject::RsaPrivateKey(Zeroizing::new(der)),
            EC_PRIVATE_KEY_LABEL => RawObject::EcPrivateKey(Zeroizing::new(der)),
            PUBLIC_KEY_LABEL => RawObject::SubjectPublicKeyInfo(der),
            RSA_PUBLIC_KEY_LABEL => RawObject::RsaPublicKey(der),
            other if UNSUPPORTED_LABELS.contains(&other) => RawObject::Other {
                label: other.to_owned(),
                der,
            },
            other => return Err(Error::UnrecognizedLabel(other.to_owned())),
        })
    }

    fn decrypt(&self, der: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let password = self.password.as_ref().ok_or(Error::MissingPassword)?;
        let info = EncryptedPrivateKeyInfo::try_from(der).map_err(Error::DecryptionFailed)?;
        let document = info.decrypt(password.as_bytes()).map_err(Error::DecryptionFailed)?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }
}

fn type_mismatch(expected: ObjectKind, found: &PkiObject) -> Error {
    Error::TypeMismatch {
        expected,
        found: found.kind(),
    }
}

fn exactly_one<T>(items: Vec<T>, expected: ObjectKind) -> Result<T> {
    let [item]: [T; 1] = items.try_into().map_err(|items: Vec<T>| Error::Cardinality {
        expected,
        found: items.len(),
    })?;
    Ok(item)
}

/// Decode all objects from `source` with the default codec
pub fn decode<R: Read>(source: R) -> Result<Vec<PkiObject>> {
    PemCodec::default().decode(source)
}

/// Decode certificates from `source` with the default codec
pub fn decode_certificates<R: Read>(source: R) -> Result<Vec<Certificate>> {
    PemCodec::default().decode_certificates(source)
}

/// Decode private keys from `source` with the default codec
pub fn decode_private_keys<R: Read>(source: R) -> Result<Vec<PrivateKey>> {
    PemCodec::default().decode_private_keys(source)
}

/// Decode exactly one private key from `source` with the default codec
pub fn decode_single_private_key<R: Read>(source: R) -> Result<PrivateKey> {
    PemCodec::default().decode_single_private_key(source)
}

/// Decode exactly one certificate request from `source` with the default codec
pub fn decode_csr<R: Read>(source: R) -> Result<CertificateRequest> {
    PemCodec::default().decode_csr(source)
}

/// Encode one object with the default codec
pub fn encode<W: Write>(object: &PkiObject, sink: W) -> Result<()> {
    PemCodec::default().encode(object, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unterminated_block() {
        let text = "-----BEGIN CERTIFICATE-----\nMAA=\n";
        assert!(matches!(decode(text.as_bytes()), Err(Error::PemError(_))));
    }

    #[test]
    fn test_unrecognized_label() {
        let text = "header\r\n-----BEGIN FOO-----\r\nMAA=\r\n-----END FOO-----\r\n";
        assert!(matches!(decode(text.as_bytes()), Err(Error::UnrecognizedLabel(label)) if label == "FOO"));
    }

    #[test]
    fn test_exactly_one() {
        assert_eq!(exactly_one(vec![1], ObjectKind::PrivateKey).unwrap(), 1);
        assert!(matches!(
            exactly_one(Vec::<u8>::new(), ObjectKind::PrivateKey),
            Err(Error::Cardinality { found: 0, .. })
        ));
        assert!(matches!(
            exactly_one(vec![1, 2], ObjectKind::PrivateKey),
            Err(Error::Cardinality { found: 2, .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(decode(&b""[..]).unwrap().is_empty());
        assert!(decode(&b"no armor here\n"[..]).unwrap().is_empty());
    }

    #[test]
    fn test_non_utf8_input() {
        assert!(matches!(decode(&[0xffu8, 0xfe][..]), Err(Error::InvalidEncoding)));
    }
}
