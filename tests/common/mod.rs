#![allow(dead_code)]

use pem_keystore::{
    Certificate, CertificateRequest, DistinguishedName, Generator, KeyPair, PkiObject, pem,
};

pub const CA_SERIAL: u64 = 1000;
pub const LEAF_SERIAL: u64 = 1;
pub const CA_COMMON_NAME: &str = "Test Root CA";
pub const LEAF_COMMON_NAME: &str = "localhost";

/// Self-signed CA plus one leaf issued by it, generated at runtime
pub struct TestPki {
    pub generator: Generator,
    pub ca_key: KeyPair,
    pub ca_name: DistinguishedName,
    pub ca_cert: Certificate,
    pub leaf_key: KeyPair,
    pub leaf_name: DistinguishedName,
    pub leaf_csr: CertificateRequest,
    pub leaf_cert: Certificate,
}

impl TestPki {
    pub fn new() -> Self {
        Self::with_generator(Generator::default())
    }

    pub fn with_generator(generator: Generator) -> Self {
        let ca_key = generator.generate_key_pair().unwrap();
        let ca_name = generator.generate_distinguished_name(CA_COMMON_NAME).unwrap();
        let ca_cert = generator
            .self_signed_certificate(&ca_key, &ca_name, CA_SERIAL)
            .unwrap();

        let leaf_key = generator.generate_key_pair().unwrap();
        let leaf_name = generator.generate_distinguished_name(LEAF_COMMON_NAME).unwrap();
        let leaf_csr = generator.generate_csr(&leaf_key, &leaf_name).unwrap();
        let leaf_cert = generator
            .sign_certificate(&leaf_csr, &ca_name, LEAF_SERIAL, ca_key.private_key())
            .unwrap();

        Self {
            generator,
            ca_key,
            ca_name,
            ca_cert,
            leaf_key,
            leaf_name,
            leaf_csr,
            leaf_cert,
        }
    }
}

/// Encode one object into PEM text
pub fn to_pem<O: Into<PkiObject>>(object: O) -> Vec<u8> {
    let mut out = Vec::new();
    pem::encode(&object.into(), &mut out).unwrap();
    out
}

/// Concatenate PEM documents into one stream
pub fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}
