//!
//! TLS context construction from key and trust stores
//!
use std::{fmt, io::Read, sync::Arc};

use rustls::{
    ClientConfig, RootCertStore, ServerConfig,
    crypto::{CryptoProvider as TlsCryptoProvider, ring::default_provider},
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    server::WebPkiClientVerifier,
    sign::CertifiedKey,
    version::{TLS12, TLS13},
};
use tracing::{debug, instrument};

use crate::{
    Result,
    bootstrap::build_key_and_trust_stores,
    error::Error,
    keystore::{KeyStore, TrustStore},
};

/// Identity material extracted from one private key entry
pub struct Identity {
    alias: String,
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Identity {
    /// Alias of the key store entry this identity was taken from
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Certificate chain, entity certificate first
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// PKCS#8 private key
    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("alias", &self.alias)
            .field("cert_chain", &self.cert_chain.len())
            .finish()
    }
}

/// Key material of a [KeyStore], unlocked with the store password
#[derive(Debug)]
pub struct KeyManagerFactory {
    identities: Vec<Identity>,
}

impl KeyManagerFactory {
    /// Unlock every private key entry of `key_store`.
    /// Fails with [Error::KeyStoreAccess] if `password` is wrong for any entry.
    pub fn new(key_store: &KeyStore, password: &str) -> Result<Self> {
        let identities = key_store
            .private_key_chains()
            .map(|(alias, chain)| {
                let key = chain.key(password).ok_or_else(|| Error::KeyStoreAccess(alias.to_owned()))?;
                Ok(Identity {
                    alias: alias.to_owned(),
                    cert_chain: chain
                        .certs()
                        .iter()
                        .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
                        .collect(),
                    key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.as_der().to_vec())),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { identities })
    }

    /// All identities in alias order
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// The identity presented by TLS contexts: the first one in alias order
    pub fn identity(&self) -> Option<&Identity> {
        self.identities.first()
    }
}

/// Trust anchors of a [TrustStore]
#[derive(Debug, Clone)]
pub struct TrustManagerFactory {
    roots: Arc<RootCertStore>,
}

impl TrustManagerFactory {
    /// Collect all certificates of `trust_store` as trust anchors.
    /// Fails with [Error::ContextInit] if a certificate cannot serve as an anchor.
    pub fn new(trust_store: &TrustStore) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        for (alias, cert) in trust_store.entries() {
            roots
                .add(CertificateDer::from(cert.as_der().to_vec()))
                .map_err(|e| Error::ContextInit(format!("invalid trust anchor '{alias}': {e}")))?;
        }
        Ok(Self { roots: Arc::new(roots) })
    }

    /// Get the trust anchors
    pub fn roots(&self) -> &Arc<RootCertStore> {
        &self.roots
    }
}

/// Client certificate policy of the server side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientAuth {
    /// Client certificates are not requested
    #[default]
    None,
    /// Client certificates are verified when presented
    Optional,
    /// Connections without a verified client certificate are rejected
    Required,
}

/// Server and client TLS configurations sharing one identity and one set of trust anchors
#[derive(Debug, Clone)]
pub struct TlsContext {
    server_config: Arc<ServerConfig>,
    client_config: Arc<ClientConfig>,
}

impl TlsContext {
    /// Start building a context with [ClientAuth::None]
    pub fn builder() -> TlsContextBuilder {
        TlsContextBuilder::default()
    }

    /// Configuration for accepting TLS connections
    pub fn server_config(&self) -> Arc<ServerConfig> {
        self.server_config.clone()
    }

    /// Configuration for originating TLS connections
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }
}

/// TLS context builder
#[derive(Debug, Clone)]
pub struct TlsContextBuilder {
    client_auth: ClientAuth,
    provider: Arc<TlsCryptoProvider>,
}

impl Default for TlsContextBuilder {
    fn default() -> Self {
        Self {
            client_auth: ClientAuth::default(),
            provider: Arc::new(default_provider()),
        }
    }
}

impl TlsContextBuilder {
    /// Set client certificate policy. Default is [ClientAuth::None]
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Build both configurations from unlocked key material and trust anchors
    #[instrument(skip_all, fields(client_auth = ?self.client_auth))]
    pub fn build(self, key_managers: &KeyManagerFactory, trust_managers: &TrustManagerFactory) -> Result<TlsContext> {
        let identity = key_managers
            .identity()
            .ok_or_else(|| Error::ContextInit("key store holds no private key entry".to_owned()))?;

        // rejects keys which do not match the entity certificate
        CertifiedKey::from_der(identity.cert_chain.clone(), identity.key.clone_key(), &self.provider)
            .map_err(|e| Error::ContextInit(format!("identity '{}': {e}", identity.alias)))?;

        let server_builder =
            ServerConfig::builder_with_provider(self.provider.clone()).with_protocol_versions(&[&TLS12, &TLS13])?;
        let server_builder = match self.client_auth {
            ClientAuth::None => server_builder.with_no_client_auth(),
            mode => {
                let verifier = WebPkiClientVerifier::builder_with_provider(trust_managers.roots.clone(), self.provider.clone());
                let verifier = if mode == ClientAuth::Optional {
                    verifier.allow_unauthenticated()
                } else {
                    verifier
                };
                let verifier = verifier
                    .build()
                    .map_err(|e| Error::ContextInit(format!("client verifier: {e}")))?;
                server_builder.with_client_cert_verifier(verifier)
            }
        };
        let server_config = server_builder
            .with_single_cert(identity.cert_chain.clone(), identity.key.clone_key())
            .map_err(|e| Error::ContextInit(e.to_string()))?;

        let client_config = ClientConfig::builder_with_provider(self.provider.clone())
            .with_protocol_versions(&[&TLS12, &TLS13])?
            .with_root_certificates(trust_managers.roots.clone())
            .with_client_auth_cert(identity.cert_chain.clone(), identity.key.clone_key())
            .map_err(|e| Error::ContextInit(e.to_string()))?;

        debug!(identity = %identity.alias, "built TLS context");

        Ok(TlsContext {
            server_config: Arc::new(server_config),
            client_config: Arc::new(client_config),
        })
    }
}

/// Assemble key and trust stores from PEM streams and build a TLS context from them
#[instrument(skip_all)]
pub fn build_tls_context<C, K, A>(cert_source: C, key_source: K, ca_cert_source: A) -> Result<TlsContext>
where
    C: Read,
    K: Read,
    A: Read,
{
    let stores = build_key_and_trust_stores(cert_source, key_source, ca_cert_source)?;
    let key_managers = KeyManagerFactory::new(&stores.key_store, stores.key_store_password.as_str())?;
    let trust_managers = TrustManagerFactory::new(&stores.trust_store)?;
    TlsContext::builder().build(&key_managers, &trust_managers)
}
