use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use der::Decode;
use x509_parser::{
    certification_request::X509CertificationRequest, prelude::FromDer, time::ASN1Time,
};

use crate::{Result, key::PublicKey, name::DistinguishedName};

/// X.509 certificate wrapper
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    pub(crate) data: Vec<u8>,
    pub(crate) subject: String,
    pub(crate) issuer: String,
    pub(crate) serial: Vec<u8>,
    pub(crate) not_before: SystemTime,
    pub(crate) not_after: SystemTime,
    pub(crate) public_key: PublicKey,
}

impl Certificate {
    /// Create certificate from DER encoding
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)?;
        Ok(Self {
            data: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial: strip_leading_zeroes(cert.raw_serial()).to_vec(),
            not_before: to_system_time(&cert.validity().not_before),
            not_after: to_system_time(&cert.validity().not_after),
            public_key: PublicKey::from_der(cert.public_key().raw)?,
        })
    }

    /// Get certificate subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get certificate issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Get the structured subject name
    pub fn subject_name(&self) -> Result<DistinguishedName> {
        Ok(DistinguishedName::from(
            x509_cert::Certificate::from_der(&self.data)?.tbs_certificate.subject,
        ))
    }

    /// Get the structured issuer name
    pub fn issuer_name(&self) -> Result<DistinguishedName> {
        Ok(DistinguishedName::from(
            x509_cert::Certificate::from_der(&self.data)?.tbs_certificate.issuer,
        ))
    }

    /// Get the big-endian serial number without leading zero bytes
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Get the serial number if it fits into 64 bits
    pub fn serial_u64(&self) -> Option<u64> {
        serial_to_u64(&self.serial)
    }

    /// Start of the validity period
    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    /// End of the validity period
    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    /// Get the subject public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Get certificate data in DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("data", &"<X.509>")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &hex::encode(&self.serial))
            .finish()
    }
}

/// PKCS#10 certificate signing request wrapper
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub(crate) data: Vec<u8>,
    pub(crate) subject: String,
    pub(crate) public_key: PublicKey,
}

impl CertificateRequest {
    /// Create certificate request from DER encoding
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, csr) = X509CertificationRequest::from_der(der)?;
        let info = &csr.certification_request_info;
        Ok(Self {
            data: der.to_vec(),
            subject: info.subject.to_string(),
            public_key: PublicKey::from_der(info.subject_pki.raw)?,
        })
    }

    /// Get requested subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get the structured subject name
    pub fn subject_name(&self) -> Result<DistinguishedName> {
        Ok(DistinguishedName::from(
            x509_cert::request::CertReq::from_der(&self.data)?.info.subject,
        ))
    }

    /// Get the public key bound by the request
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Get request data in DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("data", &"<PKCS#10>")
            .field("subject", &self.subject)
            .finish()
    }
}

/// X.509 certificate revocation list wrapper
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateRevocationList {
    pub(crate) data: Vec<u8>,
    pub(crate) issuer: String,
    pub(crate) revoked: Vec<Vec<u8>>,
}

impl CertificateRevocationList {
    /// Create CRL from DER encoding
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, crl) = x509_parser::parse_x509_crl(der)?;
        Ok(Self {
            data: der.to_vec(),
            issuer: crl.issuer().to_string(),
            revoked: crl
                .iter_revoked_certificates()
                .map(|entry| strip_leading_zeroes(entry.raw_serial()).to_vec())
                .collect(),
        })
    }

    /// Get CRL issuer
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Get the serial numbers of all revoked certificates, big-endian without leading zero bytes
    pub fn revoked_serials(&self) -> &[Vec<u8>] {
        &self.revoked
    }

    /// Returns true if the serial number is listed as revoked
    pub fn is_revoked(&self, serial: u64) -> bool {
        self.revoked.iter().any(|s| serial_to_u64(s) == Some(serial))
    }

    /// Get CRL data in DER encoding
    pub fn as_der(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for CertificateRevocationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRevocationList")
            .field("data", &"<X.509 CRL>")
            .field("issuer", &self.issuer)
            .field("revoked", &self.revoked.iter().map(hex::encode).collect::<Vec<_>>())
            .finish()
    }
}

fn strip_leading_zeroes(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn serial_to_u64(serial: &[u8]) -> Option<u64> {
    let serial = strip_leading_zeroes(serial);
    if serial.len() > 8 {
        return None;
    }
    Some(serial.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn to_system_time(time: &ASN1Time) -> SystemTime {
    let secs = time.timestamp();
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_to_u64() {
        assert_eq!(serial_to_u64(&[0x00, 0x80]), Some(0x80));
        assert_eq!(serial_to_u64(&[0x01]), Some(1));
        assert_eq!(serial_to_u64(&[]), Some(0));
        assert_eq!(serial_to_u64(&[0x01; 9]), None);
    }

    #[test]
    fn test_strip_leading_zeroes() {
        assert_eq!(strip_leading_zeroes(&[0, 0, 5, 0]), &[5, 0]);
        assert_eq!(strip_leading_zeroes(&[0, 0]), &[] as &[u8]);
    }
}
