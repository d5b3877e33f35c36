//! Negotiated connection details
//!
//! Captured right after the handshake so callers can report what was agreed
//! without holding on to the `SslRef`.

use super::cert::{peer_chain, CertInfo};
use openssl::ssl::{NameType, SslRef};
use openssl::x509::X509VerifyResult;

/// What a finished handshake negotiated
#[derive(Debug, Clone)]
pub struct TlsInfo {
    /// Protocol version, e.g. "TLSv1.3"
    pub version: String,
    /// Cipher suite name
    pub cipher: String,
    /// SNI name (as sent by the client / as received by the server)
    pub servername: Option<String>,
    /// ALPN protocol selected by the server
    pub alpn: Option<String>,
    /// Peer certificate first, then the rest of the presented chain
    pub cert_chain: Vec<CertInfo>,
    /// OpenSSL's verdict on the peer chain ("ok" when it verified)
    pub verify_result: String,
    pub session_reused: bool,
}

impl TlsInfo {
    pub fn from_ssl(ssl: &SslRef) -> Self {
        let verify = ssl.verify_result();

        TlsInfo {
            version: ssl.version_str().to_string(),
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            servername: ssl.servername(NameType::HOST_NAME).map(|s| s.to_string()),
            alpn: ssl
                .selected_alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).into_owned()),
            cert_chain: peer_chain(ssl),
            verify_result: if verify == X509VerifyResult::OK {
                "ok".to_string()
            } else {
                verify.error_string().to_string()
            },
            session_reused: ssl.session_reused(),
        }
    }

    /// The peer's own certificate, if it presented one
    pub fn peer_cert(&self) -> Option<&CertInfo> {
        self.cert_chain.first()
    }

    pub fn peer_verified(&self) -> bool {
        self.peer_cert().is_some() && self.verify_result == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(verify_result: &str, with_cert: bool) -> TlsInfo {
        TlsInfo {
            version: "TLSv1.3".to_string(),
            cipher: "TLS_AES_256_GCM_SHA384".to_string(),
            servername: Some("nginx".to_string()),
            alpn: None,
            cert_chain: if with_cert {
                vec![CertInfo {
                    subject: "client".to_string(),
                    issuer: "Test Root CA".to_string(),
                    subject_alt_names: Vec::new(),
                    not_before: String::new(),
                    not_after: String::new(),
                }]
            } else {
                Vec::new()
            },
            verify_result: verify_result.to_string(),
            session_reused: false,
        }
    }

    #[test]
    fn test_peer_verified() {
        assert!(sample("ok", true).peer_verified());
        assert!(!sample("ok", false).peer_verified());
        assert!(!sample("self-signed certificate", true).peer_verified());
    }
}
