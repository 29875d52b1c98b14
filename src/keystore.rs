use std::{
    collections::{BTreeMap, btree_map::Iter},
    fmt,
    io::Read,
};

use tracing::debug;

use crate::{
    Result,
    cert::Certificate,
    error::Error,
    key::PrivateKey,
    password::PasswordVerifier,
    pem::PemCodec,
};

/// PrivateKeyChain represents a password-protected private key and its certificate chain
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyChain {
    pub(crate) key: PrivateKey,
    pub(crate) certs: Vec<Certificate>,
    pub(crate) verifier: PasswordVerifier,
}

impl PrivateKeyChain {
    /// Creates a new keychain protected by `password`.
    /// The leaf (entity) certificate must be the first in the list, and the root certificate must be the last.
    /// Fails with [Error::MissingCertificate] if `certs` is empty.
    pub fn new<I>(alias: &str, key: PrivateKey, password: &str, certs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Certificate>,
    {
        let certs: Vec<Certificate> = certs.into_iter().collect();
        if certs.is_empty() {
            return Err(Error::MissingCertificate(alias.to_owned()));
        }
        Ok(Self {
            key,
            certs,
            verifier: PasswordVerifier::new(password)?,
        })
    }

    /// Get the private key, checking the entry password
    pub fn key(&self, password: &str) -> Option<&PrivateKey> {
        self.verifier.verify(password).then_some(&self.key)
    }

    /// Get certificates
    pub fn certs(&self) -> &[Certificate] {
        &self.certs
    }

    /// Get the entity certificate, which is always the first in the chain
    pub fn certificate(&self) -> &Certificate {
        // never empty, checked on construction
        &self.certs[0]
    }
}

impl fmt::Debug for PrivateKeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyChain")
            .field("key", &self.key)
            .field("certs", &self.certs)
            .finish()
    }
}

/// KeyStoreEntry represents one entry in the keystore
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreEntry {
    PrivateKeyChain(PrivateKeyChain),
    Certificate(Certificate),
}

impl KeyStoreEntry {
    fn same_type(&self, other: &KeyStoreEntry) -> bool {
        matches!(
            (self, other),
            (KeyStoreEntry::PrivateKeyChain(_), KeyStoreEntry::PrivateKeyChain(_))
                | (KeyStoreEntry::Certificate(_), KeyStoreEntry::Certificate(_))
        )
    }
}

/// Keystore entries iterator
pub struct Entries<'a> {
    iter: Iter<'a, String, KeyStoreEntry>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a String, &'a KeyStoreEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// Store of certificates addressed by alias
pub trait CertificateStore {
    /// Add a certificate. An existing certificate under `alias` is replaced.
    fn add_certificate(&mut self, alias: &str, cert: Certificate) -> Result<()>;

    /// Check that a certificate could be added under `alias` without changing the store
    fn check_certificate_alias(&self, alias: &str) -> Result<()>;

    /// Decode all certificates from `source` with `codec` and add them as `<alias_prefix>-<index>`,
    /// numbered from 0 in stream order. Returns the number of added certificates.
    /// Nothing is added if any certificate fails to decode or any alias is rejected.
    fn add_certificates_from_stream_with<R: Read>(
        &mut self,
        codec: &PemCodec,
        alias_prefix: &str,
        source: R,
    ) -> Result<usize> {
        let certs = codec.decode_certificates(source)?;
        let count = certs.len();
        let aliases = (0..count)
            .map(|index| format!("{alias_prefix}-{index}"))
            .collect::<Vec<_>>();
        for alias in &aliases {
            self.check_certificate_alias(alias)?;
        }
        for (alias, cert) in aliases.iter().zip(certs) {
            self.add_certificate(alias, cert)?;
        }
        debug!(alias_prefix, count, "added certificates from stream");
        Ok(count)
    }

    /// Same as [CertificateStore::add_certificates_from_stream_with] with the default codec
    fn add_certificates_from_stream<R: Read>(&mut self, alias_prefix: &str, source: R) -> Result<usize> {
        self.add_certificates_from_stream_with(&PemCodec::default(), alias_prefix, source)
    }
}

fn check_alias(alias: &str) -> Result<()> {
    if alias.is_empty() {
        Err(Error::EmptyAlias)
    } else {
        Ok(())
    }
}

/// KeyStore holds a dictionary of [KeyStoreEntry] instances indexed by aliases (names)
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: BTreeMap<String, KeyStoreEntry>,
}

impl KeyStore {
    /// Create new empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    /// Get entries iterator
    pub fn entries(&self) -> Entries<'_> {
        let iter = self.entries.iter();
        Entries { iter }
    }

    /// Get an entry for a given alias
    pub fn entry(&self, alias: &str) -> Option<&KeyStoreEntry> {
        self.entries.get(alias)
    }

    /// Get entries count in the keystore
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the keystore holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add new entry to the keystore. An entry of the same type under `alias` is replaced,
    /// an entry of the other type makes the call fail with [Error::DuplicateAlias].
    pub fn add_entry(&mut self, alias: &str, entry: KeyStoreEntry) -> Result<()> {
        self.check_entry_alias(alias, &entry)?;
        self.entries.insert(alias.to_owned(), entry);
        Ok(())
    }

    fn check_entry_alias(&self, alias: &str, entry: &KeyStoreEntry) -> Result<()> {
        check_alias(alias)?;
        match self.entries.get(alias) {
            Some(existing) if !existing.same_type(entry) => Err(Error::DuplicateAlias(alias.to_owned())),
            _ => Ok(()),
        }
    }

    /// Add a private key entry protected by `password`. Fails with [Error::MissingCertificate]
    /// if no certificate is given.
    pub fn add_private_key(
        &mut self,
        alias: &str,
        key: PrivateKey,
        password: &str,
        cert: Option<Certificate>,
    ) -> Result<()> {
        self.add_private_key_chain(alias, key, password, cert)
    }

    /// Add a private key entry with a certificate chain, leaf first
    pub fn add_private_key_chain<I>(&mut self, alias: &str, key: PrivateKey, password: &str, certs: I) -> Result<()>
    where
        I: IntoIterator<Item = Certificate>,
    {
        check_alias(alias)?;
        let chain = PrivateKeyChain::new(alias, key, password, certs)?;
        self.add_entry(alias, KeyStoreEntry::PrivateKeyChain(chain))?;
        debug!(alias, "added private key entry");
        Ok(())
    }

    /// Decode exactly one private key from `key_source` and its certificate chain from `cert_source`,
    /// then add them as one entry. The first certificate is the identity certificate.
    pub fn add_private_key_from_streams_with<K: Read, C: Read>(
        &mut self,
        codec: &PemCodec,
        alias: &str,
        key_source: K,
        password: &str,
        cert_source: C,
    ) -> Result<()> {
        let key = codec.decode_single_private_key(key_source)?;
        let certs = codec.decode_certificates(cert_source)?;
        self.add_private_key_chain(alias, key, password, certs)
    }

    /// Same as [KeyStore::add_private_key_from_streams_with] with the default codec
    pub fn add_private_key_from_streams<K: Read, C: Read>(
        &mut self,
        alias: &str,
        key_source: K,
        password: &str,
        cert_source: C,
    ) -> Result<()> {
        self.add_private_key_from_streams_with(&PemCodec::default(), alias, key_source, password, cert_source)
    }

    /// Get the private key under `alias`. Returns `Ok(None)` if there is no private key entry
    /// and fails with [Error::KeyStoreAccess] if the password does not match.
    pub fn private_key(&self, alias: &str, password: &str) -> Result<Option<&PrivateKey>> {
        match self.entries.get(alias) {
            Some(KeyStoreEntry::PrivateKeyChain(chain)) => chain
                .key(password)
                .map(Some)
                .ok_or_else(|| Error::KeyStoreAccess(alias.to_owned())),
            Some(KeyStoreEntry::Certificate(_)) | None => Ok(None),
        }
    }

    /// Get the certificate chain of the private key entry under `alias`
    pub fn certificate_chain(&self, alias: &str) -> Option<&[Certificate]> {
        match self.entries.get(alias)? {
            KeyStoreEntry::PrivateKeyChain(chain) => Some(chain.certs()),
            KeyStoreEntry::Certificate(_) => None,
        }
    }

    /// Get the certificate under `alias`: the trusted certificate or the entity certificate of a chain
    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        match self.entries.get(alias)? {
            KeyStoreEntry::PrivateKeyChain(chain) => Some(chain.certificate()),
            KeyStoreEntry::Certificate(cert) => Some(cert),
        }
    }

    /// Delete entry from the keystore
    pub fn delete_entry(&mut self, alias: &str) -> Option<KeyStoreEntry> {
        self.entries.remove(alias)
    }

    /// Get the first private keychain
    pub fn private_key_chain(&self) -> Option<(&str, &PrivateKeyChain)> {
        self.private_key_chains().next()
    }

    /// Iterate over all private keychains in alias order
    pub fn private_key_chains(&self) -> impl Iterator<Item = (&str, &PrivateKeyChain)> {
        self.entries().filter_map(|(alias, entry)| match entry {
            KeyStoreEntry::PrivateKeyChain(chain) => Some((alias.as_str(), chain)),
            KeyStoreEntry::Certificate(_) => None,
        })
    }
}

impl CertificateStore for KeyStore {
    fn add_certificate(&mut self, alias: &str, cert: Certificate) -> Result<()> {
        self.add_entry(alias, KeyStoreEntry::Certificate(cert))
    }

    fn check_certificate_alias(&self, alias: &str) -> Result<()> {
        check_alias(alias)?;
        match self.entries.get(alias) {
            Some(KeyStoreEntry::PrivateKeyChain(_)) => Err(Error::DuplicateAlias(alias.to_owned())),
            _ => Ok(()),
        }
    }
}

/// TrustStore holds trusted CA certificates indexed by aliases
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certs: BTreeMap<String, Certificate>,
}

impl TrustStore {
    /// Create new empty truststore
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate over (alias, certificate) pairs in alias order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Certificate)> {
        self.certs.iter().map(|(alias, cert)| (alias.as_str(), cert))
    }

    /// Iterate over certificates in alias order
    pub fn certificates(&self) -> impl Iterator<Item = &Certificate> {
        self.certs.values()
    }

    /// Get the certificate under `alias`
    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        self.certs.get(alias)
    }

    /// Get certificates count in the truststore
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Returns true if the truststore holds no certificates
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Delete the certificate under `alias`, returning it if present
    pub fn delete_entry(&mut self, alias: &str) -> Option<Certificate> {
        self.certs.remove(alias)
    }
}

impl CertificateStore for TrustStore {
    fn add_certificate(&mut self, alias: &str, cert: Certificate) -> Result<()> {
        check_alias(alias)?;
        self.certs.insert(alias.to_owned(), cert);
        Ok(())
    }

    fn check_certificate_alias(&self, alias: &str) -> Result<()> {
        check_alias(alias)
    }
}
