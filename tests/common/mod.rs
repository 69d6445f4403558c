//! Shared fixtures for integration tests
//!
//! Certificates, keys and DH parameters are generated into a temporary
//! directory per test so nothing is checked in.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::dh::Dh;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509, X509NameBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Passphrase protecting the encrypted key fixtures
pub const PASSPHRASE: &str = "correct horse battery staple";

/// On-disk fixture set
pub struct Fixtures {
    pub dir: TempDir,
    /// CA certificate (PEM)
    pub ca_cert: PathBuf,
    /// Directory holding the CA under its subject hash
    pub ca_dir: PathBuf,
    /// Leaf certificate (PEM)
    pub leaf_cert_pem: PathBuf,
    /// Leaf certificate (DER)
    pub leaf_cert_der: PathBuf,
    /// Leaf certificate followed by the CA (PEM)
    pub chain: PathBuf,
    /// Leaf key, unencrypted PKCS#8 (PEM)
    pub key_pem: PathBuf,
    /// Leaf key, PKCS#1 (DER)
    pub key_der: PathBuf,
    /// Leaf key, encrypted PKCS#8 (PEM)
    pub key_encrypted: PathBuf,
    /// Leaf key, encrypted traditional RSA (PEM)
    pub rsa_key_encrypted: PathBuf,
    /// RSA key unrelated to the leaf certificate (PEM)
    pub other_key_pem: PathBuf,
    /// EC key (PEM)
    pub ec_key_pem: PathBuf,
    /// DH parameters (PEM)
    pub dh_params: PathBuf,
    /// Arbitrary bytes
    pub garbage: PathBuf,
}

impl Fixtures {
    pub fn generate() -> Fixtures {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name);

        let ca_key = rsa_key();
        let ca = certificate("sslctx test CA", 1, &ca_key, None);
        let leaf_key = rsa_key();
        let leaf = certificate("localhost", 2, &leaf_key, Some((&ca, &ca_key)));
        let other_key = rsa_key();
        let ec_key = {
            let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
            PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
        };
        let leaf_rsa = leaf_key.rsa().unwrap();

        let ca_dir = path("certs");
        fs::create_dir(&ca_dir).unwrap();
        write(
            &ca_dir.join(format!("{:08x}.0", ca.subject_name_hash())),
            &ca.to_pem().unwrap(),
        );

        let mut chain = leaf.to_pem().unwrap();
        chain.extend_from_slice(&ca.to_pem().unwrap());

        let fixtures = Fixtures {
            ca_cert: path("ca.pem"),
            ca_dir,
            leaf_cert_pem: path("leaf.pem"),
            leaf_cert_der: path("leaf.der"),
            chain: path("chain.pem"),
            key_pem: path("key.pem"),
            key_der: path("key.der"),
            key_encrypted: path("key.enc.pem"),
            rsa_key_encrypted: path("rsa.enc.pem"),
            other_key_pem: path("other.pem"),
            ec_key_pem: path("ec.pem"),
            dh_params: path("dh.pem"),
            garbage: path("garbage.bin"),
            dir,
        };

        write(&fixtures.ca_cert, &ca.to_pem().unwrap());
        write(&fixtures.leaf_cert_pem, &leaf.to_pem().unwrap());
        write(&fixtures.leaf_cert_der, &leaf.to_der().unwrap());
        write(&fixtures.chain, &chain);
        write(&fixtures.key_pem, &leaf_key.private_key_to_pem_pkcs8().unwrap());
        write(&fixtures.key_der, &leaf_rsa.private_key_to_der().unwrap());
        write(
            &fixtures.key_encrypted,
            &leaf_key
                .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), PASSPHRASE.as_bytes())
                .unwrap(),
        );
        write(
            &fixtures.rsa_key_encrypted,
            &leaf_rsa
                .private_key_to_pem_passphrase(Cipher::aes_256_cbc(), PASSPHRASE.as_bytes())
                .unwrap(),
        );
        write(&fixtures.other_key_pem, &other_key.private_key_to_pem_pkcs8().unwrap());
        write(&fixtures.ec_key_pem, &ec_key.private_key_to_pem_pkcs8().unwrap());
        write(
            &fixtures.dh_params,
            &Dh::get_2048_256().unwrap().params_to_pem().unwrap(),
        );
        write(&fixtures.garbage, b"this is neither PEM nor DER\n");

        fixtures
    }

    /// Path inside the fixture directory that does not exist
    pub fn missing(&self) -> PathBuf {
        self.dir.path().join("does-not-exist.pem")
    }
}

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write(path: &Path, data: &[u8]) {
    fs::write(path, data).unwrap();
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn certificate(
    common_name: &str,
    serial: u32,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();

    let signer = match issuer {
        Some((issuer_cert, issuer_key)) => {
            builder.set_issuer_name(issuer_cert.subject_name()).unwrap();
            issuer_key
        }
        None => {
            builder.set_issuer_name(&name).unwrap();
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
            key
        }
    };

    builder.sign(signer, MessageDigest::sha256()).unwrap();
    builder.build()
}
