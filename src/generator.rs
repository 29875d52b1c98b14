//!
//! Key, CSR, certificate and CRL issuance
//!
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use der::{
    Decode, Encode,
    asn1::{BitString, Ia5String},
};
use spki::SubjectPublicKeyInfoOwned;
use tracing::{debug, instrument};
use x509_cert::{
    Version,
    builder::{Builder, CertificateBuilder, Profile, RequestBuilder},
    crl::{CertificateList, RevokedCert, TbsCertList},
    ext::pkix::{ExtendedKeyUsage, SubjectAltName, name::GeneralName},
    request::CertReq,
    serial_number::SerialNumber,
    time::{Time, Validity},
};

use crate::{
    Result,
    cert::{Certificate, CertificateRequest, CertificateRevocationList},
    error::Error,
    key::{KeyAlgorithm, KeyPair, PrivateKey, PublicKey},
    name::{self, DistinguishedName},
    oid,
    policy::IssuancePolicy,
    provider::{CryptoProvider, IssuerKey, RawSignature, RustCryptoProvider},
};

/// Generator issues key pairs, certificate requests, certificates and CRLs
#[derive(Debug, Clone)]
pub struct Generator {
    provider: Arc<dyn CryptoProvider>,
    policy: IssuancePolicy,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(Arc::new(RustCryptoProvider::default()))
    }
}

impl Generator {
    /// Create a generator with the default [IssuancePolicy]
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            policy: IssuancePolicy::default(),
        }
    }

    /// Set issuance policy
    pub fn policy(mut self, policy: IssuancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get issuance policy
    pub fn issuance_policy(&self) -> &IssuancePolicy {
        &self.policy
    }

    /// Get the cryptographic provider used for keys and signatures
    pub fn provider(&self) -> &Arc<dyn CryptoProvider> {
        &self.provider
    }

    /// Generate a key pair with the provider's key algorithm
    pub fn generate_key_pair(&self) -> Result<KeyPair> {
        self.provider.generate_key_pair()
    }

    /// Build a subject name from the policy attributes and `common_name`.
    /// The same input always yields the same name.
    pub fn generate_distinguished_name(&self, common_name: &str) -> Result<DistinguishedName> {
        self.policy.distinguished_name(common_name)
    }

    /// Returns the common name of `name`, failing with [ErrorKind::AttributeNotFound](crate::error::ErrorKind)
    /// if there is none
    pub fn extract_common_name(&self, name: &DistinguishedName) -> Result<String> {
        name::extract_common_name(name)
    }

    /// Create a CSR for `subject`, self-signed with the key pair's private key
    #[instrument(skip_all, fields(subject = %subject))]
    pub fn generate_csr(&self, key_pair: &KeyPair, subject: &DistinguishedName) -> Result<CertificateRequest> {
        let signer = IssuerKey::new(self.provider.signer(key_pair.private_key())?);
        let builder = RequestBuilder::new(subject.as_name().clone(), &signer)?;
        let request = builder.build::<RawSignature>()?;

        debug!("created certificate request");
        CertificateRequest::from_der(&request.to_der()?)
    }

    /// Sign a CSR into a leaf certificate. The CSR's proof of possession is verified first.
    /// Serial numbers are not checked for uniqueness.
    #[instrument(skip(self, csr, issuer, issuer_key), fields(subject = %csr.subject(), issuer = %issuer))]
    pub fn sign_certificate(
        &self,
        csr: &CertificateRequest,
        issuer: &DistinguishedName,
        serial: u64,
        issuer_key: &PrivateKey,
    ) -> Result<Certificate> {
        self.verify_csr(csr)?;

        let subject = csr.subject_name()?;
        let spki = SubjectPublicKeyInfoOwned::from_der(csr.public_key().as_der())?;
        let validity = validity_from_now(self.policy.certificate_validity)?;
        let signer = IssuerKey::new(self.provider.signer(issuer_key)?);

        let profile = Profile::Leaf {
            issuer: issuer.as_name().clone(),
            enable_key_agreement: false,
            enable_key_encipherment: csr.public_key().algorithm() == KeyAlgorithm::Rsa,
        };

        let san = subject.common_name().ok().and_then(|cn| dns_alt_name(&cn));

        let mut builder = CertificateBuilder::new(
            profile,
            SerialNumber::from(serial),
            validity,
            subject.into(),
            spki,
            &signer,
        )?;

        builder.add_extension(&ExtendedKeyUsage(vec![
            oid::KP_SERVER_AUTH_OID,
            oid::KP_CLIENT_AUTH_OID,
        ]))?;
        if let Some(san) = san {
            builder.add_extension(&san)?;
        }

        let certificate = builder.build::<RawSignature>()?;

        debug!("signed certificate");
        Certificate::from_der(&certificate.to_der()?)
    }

    /// Issue a self-signed CA certificate for `key_pair`
    #[instrument(skip(self, key_pair, subject), fields(subject = %subject))]
    pub fn self_signed_certificate(
        &self,
        key_pair: &KeyPair,
        subject: &DistinguishedName,
        serial: u64,
    ) -> Result<Certificate> {
        let spki = SubjectPublicKeyInfoOwned::from_der(key_pair.public_key().as_der())?;
        let validity = validity_from_now(self.policy.ca_validity)?;
        let signer = IssuerKey::new(self.provider.signer(key_pair.private_key())?);

        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::from(serial),
            validity,
            subject.as_name().clone(),
            spki,
            &signer,
        )?;
        let certificate = builder.build::<RawSignature>()?;

        debug!("created CA certificate");
        Certificate::from_der(&certificate.to_der()?)
    }

    /// Issue an empty CRL
    pub fn generate_crl(&self, issuer: &DistinguishedName, issuer_key: &PrivateKey) -> Result<CertificateRevocationList> {
        self.generate_crl_with_revocations(issuer, issuer_key, &[])
    }

    /// Issue a CRL listing the given serial numbers as revoked now
    #[instrument(skip(self, issuer, issuer_key), fields(issuer = %issuer))]
    pub fn generate_crl_with_revocations(
        &self,
        issuer: &DistinguishedName,
        issuer_key: &PrivateKey,
        revoked: &[u64],
    ) -> Result<CertificateRevocationList> {
        let signer = self.provider.signer(issuer_key)?;
        let signature_algorithm = signer.algorithm_identifier();

        let now = SystemTime::now();
        let this_update = Time::try_from(now)?;
        let next_update = Time::try_from(expiry(now, self.policy.crl_next_update)?)?;

        let revoked_certificates = revoked
            .iter()
            .map(|serial| RevokedCert {
                serial_number: SerialNumber::from(*serial),
                revocation_date: this_update,
                crl_entry_extensions: None,
            })
            .collect::<Vec<_>>();

        let tbs_cert_list = TbsCertList {
            version: Version::V2,
            signature: signature_algorithm.clone(),
            issuer: issuer.as_name().clone(),
            this_update,
            next_update: Some(next_update),
            // an empty list is omitted
            revoked_certificates: (!revoked_certificates.is_empty()).then_some(revoked_certificates),
            crl_extensions: None,
        };

        let signature = signer.sign(&tbs_cert_list.to_der()?)?;
        let crl = CertificateList {
            tbs_cert_list,
            signature_algorithm,
            signature: BitString::from_bytes(&signature)?,
        };

        debug!(revoked = revoked.len(), "issued CRL");
        CertificateRevocationList::from_der(&crl.to_der()?)
    }

    /// Verify the self-signature of a CSR
    pub fn verify_csr(&self, csr: &CertificateRequest) -> Result<()> {
        let request = CertReq::from_der(csr.as_der())?;
        self.provider.verify(
            csr.public_key(),
            &request.algorithm,
            &request.info.to_der()?,
            request.signature.raw_bytes(),
        )
    }

    /// Verify that `cert` was signed by the holder of `issuer_key`
    pub fn verify_certificate(&self, cert: &Certificate, issuer_key: &PublicKey) -> Result<()> {
        let certificate = x509_cert::Certificate::from_der(cert.as_der())?;
        self.provider.verify(
            issuer_key,
            &certificate.signature_algorithm,
            &certificate.tbs_certificate.to_der()?,
            certificate.signature.raw_bytes(),
        )
    }

    /// Verify that `crl` was signed by the holder of `issuer_key`
    pub fn verify_crl(&self, crl: &CertificateRevocationList, issuer_key: &PublicKey) -> Result<()> {
        let list = CertificateList::from_der(crl.as_der())?;
        self.provider.verify(
            issuer_key,
            &list.signature_algorithm,
            &list.tbs_cert_list.to_der()?,
            list.signature.raw_bytes(),
        )
    }
}

fn expiry(start: SystemTime, period: Duration) -> Result<SystemTime> {
    start.checked_add(period).ok_or(Error::ValidityOutOfRange(period))
}

fn validity_from_now(period: Duration) -> Result<Validity> {
    let now = SystemTime::now();
    Ok(Validity {
        not_before: Time::try_from(now)?,
        not_after: Time::try_from(expiry(now, period)?)?,
    })
}

// Host-like common names are mirrored into a dNSName SAN so TLS peers can match them
fn dns_alt_name(common_name: &str) -> Option<SubjectAltName> {
    let is_host = !common_name.is_empty()
        && common_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '*'));
    if !is_host {
        return None;
    }
    let name = Ia5String::new(common_name).ok()?;
    Some(SubjectAltName(vec![GeneralName::DnsName(name)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_alt_name() {
        assert!(dns_alt_name("localhost").is_some());
        assert!(dns_alt_name("*.example.com").is_some());
        assert!(dns_alt_name("My Service").is_none());
        assert!(dns_alt_name("").is_none());
    }

    #[test]
    fn test_expiry_overflow() {
        let now = SystemTime::now();
        assert!(matches!(expiry(now, Duration::MAX), Err(Error::ValidityOutOfRange(_))));
        assert!(validity_from_now(Duration::MAX).is_err());
        assert!(validity_from_now(Duration::from_secs(60)).is_ok());
    }
}
