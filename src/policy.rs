use std::time::Duration;

use crate::{Result, name::DistinguishedName};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default validity of issued leaf certificates
pub const DEFAULT_CERTIFICATE_VALIDITY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default validity of self-signed CA certificates
pub const DEFAULT_CA_VALIDITY: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Default interval between a CRL's thisUpdate and nextUpdate
pub const DEFAULT_CRL_NEXT_UPDATE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Fixed parameters applied to every issued artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuancePolicy {
    pub(crate) certificate_validity: Duration,
    pub(crate) ca_validity: Duration,
    pub(crate) crl_next_update: Duration,
    country: Option<String>,
    organization: Option<String>,
    organizational_unit: Option<String>,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            certificate_validity: DEFAULT_CERTIFICATE_VALIDITY,
            ca_validity: DEFAULT_CA_VALIDITY,
            crl_next_update: DEFAULT_CRL_NEXT_UPDATE,
            country: None,
            organization: None,
            organizational_unit: None,
        }
    }
}

impl IssuancePolicy {
    /// Create a policy with default validity periods and no fixed name attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Set leaf certificate validity. Default is 365 days
    pub fn certificate_validity(mut self, validity: Duration) -> Self {
        self.certificate_validity = validity;
        self
    }

    /// Set CA certificate validity. Default is 10 years
    pub fn ca_validity(mut self, validity: Duration) -> Self {
        self.ca_validity = validity;
        self
    }

    /// Set CRL next update interval. Default is 7 days, values below one day are raised to one day
    pub fn crl_next_update(mut self, interval: Duration) -> Self {
        self.crl_next_update = interval.max(DAY);
        self
    }

    /// Set the country (C) attribute of generated names
    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.to_owned());
        self
    }

    /// Set the organization (O) attribute of generated names
    pub fn organization(mut self, organization: &str) -> Self {
        self.organization = Some(organization.to_owned());
        self
    }

    /// Set the organizational unit (OU) attribute of generated names
    pub fn organizational_unit(mut self, unit: &str) -> Self {
        self.organizational_unit = Some(unit.to_owned());
        self
    }

    /// Builds the name for `common_name`: policy attributes first, common name last.
    pub(crate) fn distinguished_name(&self, common_name: &str) -> Result<DistinguishedName> {
        let mut builder = DistinguishedName::builder();
        if let Some(country) = &self.country {
            builder = builder.country(country);
        }
        if let Some(organization) = &self.organization {
            builder = builder.organization(organization);
        }
        if let Some(unit) = &self.organizational_unit {
            builder = builder.organizational_unit(unit);
        }
        builder.common_name(common_name).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = IssuancePolicy::default();
        assert_eq!(policy.certificate_validity, DEFAULT_CERTIFICATE_VALIDITY);
        assert_eq!(policy.ca_validity, DEFAULT_CA_VALIDITY);
        assert_eq!(policy.crl_next_update, DEFAULT_CRL_NEXT_UPDATE);
        assert_eq!(policy.distinguished_name("host").unwrap().to_string(), "CN=host");
    }

    #[test]
    fn test_crl_interval_floor() {
        let policy = IssuancePolicy::new().crl_next_update(Duration::from_secs(5));
        assert_eq!(policy.crl_next_update, DAY);
    }

    #[test]
    fn test_distinguished_name_is_deterministic() {
        let policy = IssuancePolicy::new().country("DE").organization("Example").organizational_unit("Ops");
        let first = policy.distinguished_name("node-1").unwrap();
        let second = policy.distinguished_name("node-1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.common_name().unwrap(), "node-1");
    }
}
