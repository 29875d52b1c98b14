//!
//! Key and trust store assembly from PEM streams
//!
use std::io::Read;

use tracing::{debug, instrument};

use crate::{
    Result,
    keystore::{CertificateStore, KeyStore, TrustStore},
    password::StorePassword,
    pem::PemCodec,
};

/// Alias of the identity entry in bootstrapped key stores
pub const PRIVATE_KEY_ALIAS: &str = "private-key";

/// Alias prefix of CA certificates in bootstrapped trust stores
pub const CA_CERTIFICATE_ALIAS_PREFIX: &str = "cert-ca";

/// Stores produced by [build_key_and_trust_stores]. The password is the only way to unlock
/// the key store entries and must travel with it.
#[derive(Debug, Clone)]
pub struct StoreBundle {
    pub key_store: KeyStore,
    pub trust_store: TrustStore,
    pub key_store_password: StorePassword,
}

/// Build a key store holding one identity and a trust store holding all CA certificates.
///
/// The identity is added under [PRIVATE_KEY_ALIAS] with a freshly generated password,
/// CA certificates are added as `cert-ca-0`, `cert-ca-1` and so on.
/// Nothing is returned unless every step succeeds.
pub fn build_key_and_trust_stores<C, K, A>(cert_source: C, key_source: K, ca_cert_source: A) -> Result<StoreBundle>
where
    C: Read,
    K: Read,
    A: Read,
{
    build_key_and_trust_stores_with(&PemCodec::default(), cert_source, key_source, ca_cert_source)
}

/// Same as [build_key_and_trust_stores], decoding with `codec`
#[instrument(skip_all)]
pub fn build_key_and_trust_stores_with<C, K, A>(
    codec: &PemCodec,
    cert_source: C,
    key_source: K,
    ca_cert_source: A,
) -> Result<StoreBundle>
where
    C: Read,
    K: Read,
    A: Read,
{
    let key_store_password = StorePassword::generate();

    let mut key_store = KeyStore::new();
    key_store.add_private_key_from_streams_with(
        codec,
        PRIVATE_KEY_ALIAS,
        key_source,
        key_store_password.as_str(),
        cert_source,
    )?;

    let mut trust_store = TrustStore::new();
    let count = trust_store.add_certificates_from_stream_with(codec, CA_CERTIFICATE_ALIAS_PREFIX, ca_cert_source)?;

    debug!(trusted = count, "assembled key and trust stores");

    Ok(StoreBundle {
        key_store,
        trust_store,
        key_store_password,
    })
}
