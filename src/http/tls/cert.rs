//! Certificate summaries
//!
//! Extracts the handful of fields a verbose transfer trace prints about each
//! certificate in the peer's chain.

use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref};
use std::net::IpAddr;

/// Human-readable summary of one X.509 certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject Common Name
    pub subject: String,
    /// Issuer Common Name
    pub issuer: String,
    /// Subject Alternative Names, prefixed `DNS:` or `IP:`
    pub subject_alt_names: Vec<String>,
    pub not_before: String,
    pub not_after: String,
}

impl CertInfo {
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
            not_before: cert.not_before().to_string(),
            not_after: cert.not_after().to_string(),
        }
    }

    /// Whether subject and issuer match, i.e. the certificate looks self-signed
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };

    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            let ip = match name.ipaddress()? {
                [a, b, c, d] => IpAddr::from([*a, *b, *c, *d]),
                bytes if bytes.len() == 16 => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(bytes);
                    IpAddr::from(octets)
                }
                _ => return None,
            };
            Some(format!("IP:{}", ip))
        })
        .collect()
}

/// Summaries of the peer certificate followed by the rest of its chain
///
/// On the client the peer chain already starts with the leaf, so it is not
/// repeated.
pub fn peer_chain(ssl: &SslRef) -> Vec<CertInfo> {
    let mut chain = Vec::new();

    if let Some(peer) = ssl.peer_certificate() {
        chain.push(CertInfo::from_x509(&peer));
    }

    if let Some(stack) = ssl.peer_cert_chain() {
        for cert in stack {
            let info = CertInfo::from_x509(cert);
            if chain.first() != Some(&info) {
                chain.push(info);
            }
        }
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::TestPki;
    use openssl::x509::X509;

    fn load(path: std::path::PathBuf) -> X509 {
        X509::from_pem(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_server_cert_summary() {
        let dir = tempfile::tempdir().unwrap();
        let pki = TestPki::generate(dir.path(), &["localhost", "127.0.0.1"]).unwrap();

        let info = CertInfo::from_x509(&load(pki.server_cert()));
        assert_eq!(info.subject, "localhost");
        assert_eq!(info.issuer, crate::pki::ROOT_CA_NAME);
        assert!(!info.is_self_issued());
        assert!(info.subject_alt_names.contains(&"DNS:localhost".to_string()));
        assert!(info.subject_alt_names.contains(&"IP:127.0.0.1".to_string()));
        assert!(info.not_after.contains("GMT"));
    }

    #[test]
    fn test_invalid_client_cert_is_self_issued() {
        let dir = tempfile::tempdir().unwrap();
        let pki = TestPki::generate(dir.path(), &["localhost"]).unwrap();

        let info = CertInfo::from_x509(&load(pki.client_invalid_cert()));
        assert!(info.is_self_issued());
        assert!(info.subject_alt_names.is_empty());
    }
}
