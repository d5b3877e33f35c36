//! Transfer errors

use crate::http;
use crate::http::tls::TlsError;
use std::io;

/// Why a transfer did not produce a response
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to initialize transfer: {0}")]
    Init(String),

    #[error("URL rejected: {0}")]
    InvalidUrl(String),

    #[error("Protocol \"{0}\" not supported")]
    UnsupportedScheme(String),

    #[error("Could not resolve host: {0}")]
    Resolve(String),

    #[error("Failed to connect to {host} port {port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// CA bundle, client certificate or private key could not be used
    #[error("SSL certificate problem: {0}")]
    Certificate(String),

    /// Negotiation or peer verification failed
    #[error("SSL connect error: {0}")]
    Handshake(String),

    #[error("HTTP transfer failed: {0}")]
    Http(http::Error),

    #[error("Maximum ({0}) redirects followed")]
    TooManyRedirects(u32),
}

impl TransferError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransferError::Timeout(_))
    }
}

impl From<http::Error> for TransferError {
    fn from(err: http::Error) -> Self {
        match err {
            http::Error::Timeout => TransferError::Timeout("no response within the time limit".to_string()),
            http::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
                TransferError::Timeout(e.to_string())
            }
            other => TransferError::Http(other),
        }
    }
}

impl From<TlsError> for TransferError {
    fn from(err: TlsError) -> Self {
        match err {
            TlsError::Certificate(msg) => TransferError::Certificate(msg),
            TlsError::PeerVerification(_) | TlsError::HandshakeFailed(_) | TlsError::OpenSsl(_) => {
                TransferError::Handshake(err.to_string())
            }
            TlsError::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
                TransferError::Timeout(e.to_string())
            }
            TlsError::Io(e) => TransferError::Handshake(e.to_string()),
            TlsError::InvalidConfig(_) => TransferError::Init(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_timeout_maps_to_timeout() {
        assert!(TransferError::from(http::Error::Timeout).is_timeout());
        assert!(TransferError::from(http::Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "slow"
        )))
        .is_timeout());
        assert!(matches!(
            TransferError::from(http::Error::ConnectionClosed),
            TransferError::Http(http::Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_tls_error_mapping() {
        let err = TransferError::from(TlsError::PeerVerification(
            "unable to get local issuer certificate".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "SSL connect error: certificate verify failed: unable to get local issuer certificate"
        );

        let err = TransferError::from(TlsError::Certificate("bad key".to_string()));
        assert!(matches!(err, TransferError::Certificate(_)));

        let err = TransferError::from(TlsError::InvalidConfig("x".to_string()));
        assert!(matches!(err, TransferError::Init(_)));
    }
}
