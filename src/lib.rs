//!
//! PEM codec, certificate issuance and KeyStore/TrustStore assembly for services which act
//! as their own small PKI, written in pure Rust.
//!
//! The crate is organized around four steps:
//!
//! * [pem] decodes armored text into an ordered sequence of [PkiObject] values and encodes them back.
//!   Each block is classified into exactly one of: key pair, private key, public key, certificate,
//!   certificate request or CRL.
//! * [Generator] issues key pairs, certificate requests, certificates and CRLs.
//! * [KeyStore] and [TrustStore] hold identities and trust anchors by alias;
//!   [build_key_and_trust_stores] assembles both from PEM streams.
//! * [TlsContext] derives rustls server and client configurations from the stores.
//!
//! All cryptographic primitives go through the [CryptoProvider] trait.
//! [RustCryptoProvider] is the default implementation.
//!
//! Supported key algorithms for issuance: ECDSA P-256 (default) and RSA 2048 with SHA-256.
//!
//! Supported PEM labels:
//!
//! * `CERTIFICATE`, `X509 CERTIFICATE`
//! * `CERTIFICATE REQUEST`, `NEW CERTIFICATE REQUEST`
//! * `X509 CRL`
//! * `PRIVATE KEY`, `ENCRYPTED PRIVATE KEY`, `RSA PRIVATE KEY`, `EC PRIVATE KEY`
//! * `PUBLIC KEY`, `RSA PUBLIC KEY`
//!

mod bootstrap;
mod cert;
pub mod error;
mod generator;
mod key;
mod keystore;
mod name;
mod object;
mod oid;
pub mod password;
pub mod pem;
mod policy;
pub mod provider;
pub mod tls;

/// Result type for codec, issuance and store operations
pub type Result<T> = std::result::Result<T, error::Error>;

pub use bootstrap::{
    CA_CERTIFICATE_ALIAS_PREFIX, PRIVATE_KEY_ALIAS, StoreBundle, build_key_and_trust_stores,
    build_key_and_trust_stores_with,
};
pub use cert::{Certificate, CertificateRequest, CertificateRevocationList};
pub use error::{Error, ErrorKind};
pub use generator::Generator;
pub use key::{KeyAlgorithm, KeyPair, PrivateKey, PublicKey};
pub use keystore::{CertificateStore, Entries, KeyStore, KeyStoreEntry, PrivateKeyChain, TrustStore};
pub use name::{DistinguishedName, NameBuilder, extract_common_name};
pub use object::{Classify, ObjectKind, PkiObject, RawObject, classify};
pub use password::StorePassword;
pub use pem::PemCodec;
pub use policy::IssuancePolicy;
pub use provider::{CryptoProvider, KeySigner, RustCryptoProvider};
pub use tls::{ClientAuth, Identity, KeyManagerFactory, TlsContext, TlsContextBuilder, TrustManagerFactory, build_tls_context};
