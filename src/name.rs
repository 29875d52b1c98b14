//!
//! Distinguished names and common-name extraction
//!
use std::fmt;

use der::{
    Any, Decode, Encode, Tag, Tagged,
    asn1::{BmpString, ObjectIdentifier, PrintableStringRef, SetOfVec},
};
use x509_cert::{
    attr::AttributeTypeAndValue,
    name::{Name, RdnSequence, RelativeDistinguishedName},
};

use crate::{Result, error::Error, oid};

/// Structured subject or issuer identity
#[derive(Clone, PartialEq, Eq)]
pub struct DistinguishedName(Name);

impl DistinguishedName {
    /// Creates a name holding only a common-name attribute.
    pub fn from_common_name(common_name: &str) -> Result<Self> {
        Self::builder().common_name(common_name).build()
    }

    /// Starts an ordered name builder.
    pub fn builder() -> NameBuilder {
        NameBuilder::default()
    }

    /// Returns the first common-name attribute value.
    pub fn common_name(&self) -> Result<String> {
        extract_common_name(self)
    }

    /// Returns the underlying X.501 name.
    pub fn as_name(&self) -> &Name {
        &self.0
    }

    /// Returns the name in DER encoding.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.0.to_der()?)
    }

    /// Parses a DER-encoded X.501 name.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self(Name::from_der(der)?))
    }
}

impl From<Name> for DistinguishedName {
    fn from(value: Name) -> Self {
        Self(value)
    }
}

impl From<DistinguishedName> for Name {
    fn from(value: DistinguishedName) -> Self {
        value.0
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DistinguishedName").field(&self.0.to_string()).finish()
    }
}

/// Builds a [DistinguishedName] from attributes in most-significant-first order
#[derive(Debug, Default)]
pub struct NameBuilder {
    attributes: Vec<(ObjectIdentifier, Tag, String)>,
}

impl NameBuilder {
    /// Adds a country (C) attribute, encoded as PrintableString.
    pub fn country(mut self, country: &str) -> Self {
        self.attributes
            .push((oid::COUNTRY_NAME_OID, Tag::PrintableString, country.to_owned()));
        self
    }

    /// Adds an organization (O) attribute.
    pub fn organization(mut self, organization: &str) -> Self {
        self.attributes
            .push((oid::ORGANIZATION_NAME_OID, Tag::Utf8String, organization.to_owned()));
        self
    }

    /// Adds an organizational unit (OU) attribute.
    pub fn organizational_unit(mut self, unit: &str) -> Self {
        self.attributes
            .push((oid::ORGANIZATIONAL_UNIT_NAME_OID, Tag::Utf8String, unit.to_owned()));
        self
    }

    /// Adds a common name (CN) attribute.
    pub fn common_name(mut self, common_name: &str) -> Self {
        self.attributes
            .push((oid::COMMON_NAME_OID, Tag::Utf8String, common_name.to_owned()));
        self
    }

    /// Build the name, failing if a value cannot be encoded with its string type
    pub fn build(self) -> Result<DistinguishedName> {
        let mut rdns = Vec::with_capacity(self.attributes.len());
        for (oid, tag, value) in self.attributes {
            if tag == Tag::PrintableString {
                PrintableStringRef::new(&value)?;
            }
            let atv = AttributeTypeAndValue {
                oid,
                value: Any::new(tag, value.into_bytes())?,
            };
            rdns.push(RelativeDistinguishedName(SetOfVec::from_iter([atv])?));
        }
        Ok(DistinguishedName(RdnSequence(rdns)))
    }
}

/// Returns the value of the first common-name attribute of `name`.
pub fn extract_common_name(name: &DistinguishedName) -> Result<String> {
    let value = name
        .0
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == oid::COMMON_NAME_OID)
        .map(|atv| &atv.value)
        .ok_or(Error::AttributeNotFound("CN"))?;

    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            Ok(std::str::from_utf8(value.value())
                .map_err(|_| Error::InvalidEncoding)?
                .to_owned())
        }
        Tag::BmpString => Ok(BmpString::from_der(&value.to_der()?)?.to_string()),
        _ => Err(Error::AttributeNotFound("CN")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_name_round_trip() {
        let name = DistinguishedName::from_common_name("my-service").unwrap();
        assert_eq!(extract_common_name(&name).unwrap(), "my-service");
        assert_eq!(name.to_string(), "CN=my-service");
    }

    #[test]
    fn test_name_with_policy_attributes() {
        let name = DistinguishedName::builder()
            .country("DE")
            .organization("Example")
            .common_name("node-1")
            .build()
            .unwrap();
        assert_eq!(name.common_name().unwrap(), "node-1");

        let der = name.to_der().unwrap();
        assert_eq!(DistinguishedName::from_der(&der).unwrap(), name);
    }

    #[test]
    fn test_missing_common_name() {
        let name = DistinguishedName::builder().organization("Example").build().unwrap();
        assert!(matches!(extract_common_name(&name), Err(Error::AttributeNotFound("CN"))));
    }

    #[test]
    fn test_invalid_country() {
        assert!(DistinguishedName::builder().country("D@").build().is_err());
    }
}
