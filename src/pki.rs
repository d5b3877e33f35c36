//! Throwaway test PKI
//!
//! Generates the certificate layout the scenario drivers expect under
//! `/certs`, into any directory:
//!
//! | file | contents |
//! |---|---|
//! | `root-ca.crt` / `root-ca.key` | self-signed root CA |
//! | `server.crt` / `server.key` | server certificate signed by the root |
//! | `client-valid.crt` / `client-valid.key` | client certificate signed by the root |
//! | `client-invalid.crt` / `client-invalid.key` | self-signed client certificate |
//!
//! All keys are EC P-256 and all certificates are valid from now for
//! `VALIDITY_DAYS`.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder, X509Ref, X509};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Common Name of the generated root CA
pub const ROOT_CA_NAME: &str = "Test Root CA";

pub const CLIENT_VALID_NAME: &str = "client-valid";
pub const CLIENT_INVALID_NAME: &str = "client-invalid";

const VALIDITY_DAYS: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("server certificate needs at least one name")]
    NoServerName,
}

/// Which extended key usage a leaf certificate gets
#[derive(Clone, Copy)]
enum Usage {
    Server,
    Client,
}

/// Paths of a generated PKI
#[derive(Debug, Clone)]
pub struct TestPki {
    dir: PathBuf,
}

impl TestPki {
    /// Generate a fresh PKI into `dir`
    ///
    /// The server certificate's CN is the first of `server_names`; every name
    /// becomes a SAN entry (`IP:` for address literals, `DNS:` otherwise).
    pub fn generate(dir: &Path, server_names: &[&str]) -> Result<TestPki, PkiError> {
        let common_name = *server_names.first().ok_or(PkiError::NoServerName)?;
        let pki = TestPki {
            dir: dir.to_path_buf(),
        };

        let ca_key = generate_key()?;
        let ca_cert = root_certificate(&ca_key)?;
        pki.write_pair("root-ca", &ca_cert, &ca_key)?;

        let server_key = generate_key()?;
        let server_cert = leaf_certificate(
            common_name,
            server_names,
            Usage::Server,
            &server_key,
            Some((&ca_cert, &ca_key)),
        )?;
        pki.write_pair("server", &server_cert, &server_key)?;

        let valid_key = generate_key()?;
        let valid_cert = leaf_certificate(
            CLIENT_VALID_NAME,
            &[],
            Usage::Client,
            &valid_key,
            Some((&ca_cert, &ca_key)),
        )?;
        pki.write_pair("client-valid", &valid_cert, &valid_key)?;

        let invalid_key = generate_key()?;
        let invalid_cert =
            leaf_certificate(CLIENT_INVALID_NAME, &[], Usage::Client, &invalid_key, None)?;
        pki.write_pair("client-invalid", &invalid_cert, &invalid_key)?;

        log::debug!("generated test PKI in {}", dir.display());
        Ok(pki)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn root_ca(&self) -> PathBuf {
        self.dir.join("root-ca.crt")
    }

    pub fn server_cert(&self) -> PathBuf {
        self.dir.join("server.crt")
    }

    pub fn server_key(&self) -> PathBuf {
        self.dir.join("server.key")
    }

    pub fn client_valid_cert(&self) -> PathBuf {
        self.dir.join("client-valid.crt")
    }

    pub fn client_valid_key(&self) -> PathBuf {
        self.dir.join("client-valid.key")
    }

    pub fn client_invalid_cert(&self) -> PathBuf {
        self.dir.join("client-invalid.crt")
    }

    pub fn client_invalid_key(&self) -> PathBuf {
        self.dir.join("client-invalid.key")
    }

    fn write_pair(&self, stem: &str, cert: &X509Ref, key: &PKeyRef<Private>) -> Result<(), PkiError> {
        write_file(&self.dir.join(format!("{}.crt", stem)), &cert.to_pem()?)?;
        write_file(&self.dir.join(format!("{}.key", stem)), &key.private_key_to_pem_pkcs8()?)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), PkiError> {
    fs::write(path, contents).map_err(|source| PkiError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn generate_key() -> Result<PKey<Private>, ErrorStack> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    PKey::from_ec_key(EcKey::generate(&group)?)
}

fn name(common_name: &str) -> Result<X509Name, ErrorStack> {
    let mut builder = X509NameBuilder::new()?;
    builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, "tls-harness")?;
    builder.append_entry_by_nid(Nid::COMMONNAME, common_name)?;
    Ok(builder.build())
}

/// Builder with version, serial, validity and public key filled in
fn base_builder(subject: &X509Name, key: &PKeyRef<Private>) -> Result<X509Builder, ErrorStack> {
    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;

    let mut serial = BigNum::new()?;
    serial.rand(127, MsbOption::MAYBE_ZERO, false)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;

    builder.set_subject_name(subject)?;
    builder.set_pubkey(key)?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(VALIDITY_DAYS)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    Ok(builder)
}

fn root_certificate(key: &PKeyRef<Private>) -> Result<X509, ErrorStack> {
    let subject = name(ROOT_CA_NAME)?;
    let mut builder = base_builder(&subject, key)?;
    builder.set_issuer_name(&subject)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(KeyUsage::new().critical().key_cert_sign().crl_sign().build()?)?;
    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(ski)?;

    builder.sign(key, MessageDigest::sha256())?;
    Ok(builder.build())
}

/// End-entity certificate, signed by `issuer` or self-signed when `None`
fn leaf_certificate(
    common_name: &str,
    alt_names: &[&str],
    usage: Usage,
    key: &PKeyRef<Private>,
    issuer: Option<(&X509Ref, &PKeyRef<Private>)>,
) -> Result<X509, ErrorStack> {
    let subject = name(common_name)?;
    let mut builder = base_builder(&subject, key)?;

    match issuer {
        Some((ca_cert, _)) => builder.set_issuer_name(ca_cert.subject_name())?,
        None => builder.set_issuer_name(&subject)?,
    }

    builder.append_extension(BasicConstraints::new().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_agreement()
            .build()?,
    )?;

    let mut eku = ExtendedKeyUsage::new();
    match usage {
        Usage::Server => eku.server_auth(),
        Usage::Client => eku.client_auth(),
    };
    builder.append_extension(eku.build()?)?;

    let ca_cert = issuer.map(|(cert, _)| cert);

    if !alt_names.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for alt in alt_names {
            if alt.parse::<IpAddr>().is_ok() {
                san.ip(alt);
            } else {
                san.dns(alt);
            }
        }
        let san = san.build(&builder.x509v3_context(ca_cert, None))?;
        builder.append_extension(san)?;
    }

    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(ca_cert, None))?;
    builder.append_extension(ski)?;
    if ca_cert.is_some() {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(ca_cert, None))?;
        builder.append_extension(aki)?;
    }

    let signing_key = issuer.map(|(_, key)| key).unwrap_or(key);
    builder.sign(signing_key, MessageDigest::sha256())?;
    Ok(builder.build())
}
