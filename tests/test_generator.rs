mod common;

use std::{sync::Arc, time::Duration};

use pem_keystore::{
    DistinguishedName, ErrorKind, Generator, IssuancePolicy, KeyAlgorithm, RustCryptoProvider, extract_common_name,
};
use x509_parser::{extensions::GeneralName, prelude::FromDer};

use common::{CA_SERIAL, LEAF_COMMON_NAME, LEAF_SERIAL, TestPki};

#[test]
fn test_csr_proves_possession() {
    let pki = TestPki::new();
    pki.generator.verify_csr(&pki.leaf_csr).unwrap();
    assert_eq!(pki.leaf_csr.public_key(), pki.leaf_key.public_key());
    assert_eq!(pki.leaf_csr.subject_name().unwrap(), pki.leaf_name);
}

#[test]
fn test_issued_certificate() {
    let pki = TestPki::new();
    let cert = &pki.leaf_cert;

    assert_eq!(cert.serial_u64(), Some(LEAF_SERIAL));
    assert_eq!(cert.issuer_name().unwrap(), pki.ca_name);
    assert_eq!(cert.subject_name().unwrap(), pki.leaf_name);
    assert_eq!(cert.issuer(), pki.ca_cert.subject());
    assert_eq!(cert.public_key(), pki.leaf_key.public_key());

    pki.generator
        .verify_certificate(cert, pki.ca_key.public_key())
        .unwrap();

    let err = pki
        .generator
        .verify_certificate(cert, pki.leaf_key.public_key())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);

    let (_, parsed) = x509_parser::certificate::X509Certificate::from_der(cert.as_der()).unwrap();
    let basic_constraints = parsed.basic_constraints().unwrap();
    assert!(basic_constraints.is_none_or(|bc| !bc.value.ca));

    let san = parsed.subject_alternative_name().unwrap().unwrap();
    assert_eq!(san.value.general_names, vec![GeneralName::DNSName(LEAF_COMMON_NAME)]);
}

#[test]
fn test_self_signed_ca() {
    let pki = TestPki::new();
    let ca = &pki.ca_cert;

    assert_eq!(ca.serial_u64(), Some(CA_SERIAL));
    assert_eq!(ca.subject(), ca.issuer());
    pki.generator
        .verify_certificate(ca, pki.ca_key.public_key())
        .unwrap();

    let (_, parsed) = x509_parser::certificate::X509Certificate::from_der(ca.as_der()).unwrap();
    assert!(parsed.basic_constraints().unwrap().unwrap().value.ca);
}

#[test]
fn test_certificate_validity_follows_policy() {
    let policy = IssuancePolicy::new().certificate_validity(Duration::from_secs(30 * 24 * 60 * 60));
    let pki = TestPki::with_generator(Generator::default().policy(policy));

    let lifetime = pki
        .leaf_cert
        .not_after()
        .duration_since(pki.leaf_cert.not_before())
        .unwrap();
    assert!(lifetime.abs_diff(Duration::from_secs(30 * 24 * 60 * 60)) <= Duration::from_secs(1));
}

#[test]
fn test_oversized_validity_is_rejected() {
    let pki = TestPki::new();
    let policy = IssuancePolicy::new()
        .certificate_validity(Duration::MAX)
        .ca_validity(Duration::from_secs(20_000 * 365 * 24 * 60 * 60))
        .crl_next_update(Duration::MAX);
    let generator = Generator::default().policy(policy);

    let err = generator
        .sign_certificate(&pki.leaf_csr, &pki.ca_name, 2, pki.ca_key.private_key())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);

    let err = generator
        .self_signed_certificate(&pki.ca_key, &pki.ca_name, 3)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);

    let err = generator
        .generate_crl(&pki.ca_name, pki.ca_key.private_key())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_certificate_from_foreign_issuer_fails_verification() {
    let pki = TestPki::new();
    let other = TestPki::new();

    let cert = other
        .generator
        .sign_certificate(&pki.leaf_csr, &other.ca_name, 2, other.ca_key.private_key())
        .unwrap();
    let err = pki
        .generator
        .verify_certificate(&cert, pki.ca_key.public_key())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);
}

#[test]
fn test_crl_issuance() {
    let pki = TestPki::new();

    let empty = pki
        .generator
        .generate_crl(&pki.ca_name, pki.ca_key.private_key())
        .unwrap();
    assert!(empty.revoked_serials().is_empty());
    assert_eq!(empty.issuer(), pki.ca_cert.subject());
    pki.generator.verify_crl(&empty, pki.ca_key.public_key()).unwrap();

    let crl = pki
        .generator
        .generate_crl_with_revocations(&pki.ca_name, pki.ca_key.private_key(), &[3, 7])
        .unwrap();
    assert_eq!(crl.revoked_serials().len(), 2);
    assert!(crl.is_revoked(3));
    assert!(crl.is_revoked(7));
    assert!(!crl.is_revoked(LEAF_SERIAL));

    let err = pki
        .generator
        .verify_crl(&crl, pki.leaf_key.public_key())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);
}

#[test]
fn test_distinguished_names() {
    let policy = IssuancePolicy::new().country("DE").organization("Example Corp").organizational_unit("Ops");
    let generator = Generator::default().policy(policy);

    let first = generator.generate_distinguished_name("node-1").unwrap();
    let second = generator.generate_distinguished_name("node-1").unwrap();
    assert_eq!(first, second);
    let expected = DistinguishedName::builder()
        .country("DE")
        .organization("Example Corp")
        .organizational_unit("Ops")
        .common_name("node-1")
        .build()
        .unwrap();
    assert_eq!(first, expected);
    assert_eq!(generator.extract_common_name(&first).unwrap(), "node-1");

    let no_cn = DistinguishedName::builder().organization("Example Corp").build().unwrap();
    let err = extract_common_name(&no_cn).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AttributeNotFound);
}

#[test]
fn test_rsa_issuance() {
    let generator = Generator::new(Arc::new(RustCryptoProvider::new(KeyAlgorithm::Rsa)));
    let pki = TestPki::with_generator(generator);

    assert_eq!(pki.ca_key.algorithm(), KeyAlgorithm::Rsa);
    assert_eq!(pki.leaf_cert.serial_u64(), Some(LEAF_SERIAL));
    pki.generator.verify_csr(&pki.leaf_csr).unwrap();
    pki.generator
        .verify_certificate(&pki.leaf_cert, pki.ca_key.public_key())
        .unwrap();

    let crl = pki
        .generator
        .generate_crl_with_revocations(&pki.ca_name, pki.ca_key.private_key(), &[LEAF_SERIAL])
        .unwrap();
    assert!(crl.is_revoked(LEAF_SERIAL));
    pki.generator.verify_crl(&crl, pki.ca_key.public_key()).unwrap();
}
