//! TLS session operations
//!
//! `TlsSessionOps` implements `SessionOps` over an `SslStream`, so the HTTP
//! client and server run unchanged on top of TLS.

use super::config::{TlsConfig, TlsError};
use super::info::TlsInfo;
use crate::http::session::{poll_fd, Interest, SessionOps};
use crate::http::{Error, Result as HttpResult};
use openssl::ssl::{HandshakeError, MidHandshakeSslStream, Ssl, SslStream};
use openssl::x509::X509VerifyResult;
use std::io::{self, Read, Write};
use std::net::{IpAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// TLS session over a TCP stream
pub struct TlsSessionOps {
    stream: SslStream<TcpStream>,
    info: TlsInfo,
    failed: bool,
}

impl TlsSessionOps {
    /// Client handshake
    ///
    /// The configured server name is sent as SNI unless it is an IP literal.
    /// When hostname verification is on, the peer certificate must match it
    /// (as a DNS name or an IP address SAN).
    pub fn connect(stream: TcpStream, config: &TlsConfig) -> Result<Self, TlsError> {
        let mut ssl = Ssl::new(&config.ctx)?;

        if let Some(name) = config.servername.as_deref() {
            match name.parse::<IpAddr>() {
                Ok(ip) => {
                    if config.verify_hostname {
                        ssl.param_mut().set_ip(ip)?;
                    }
                }
                Err(_) => {
                    ssl.set_hostname(name)?;
                    if config.verify_hostname {
                        ssl.param_mut().set_host(name)?;
                    }
                }
            }
        }

        let stream = ssl.connect(stream).map_err(handshake_error)?;
        Ok(Self::established(stream))
    }

    /// Server handshake
    pub fn accept(stream: TcpStream, config: &TlsConfig) -> Result<Self, TlsError> {
        let ssl = Ssl::new(&config.ctx)?;
        let stream = ssl.accept(stream).map_err(handshake_error)?;
        Ok(Self::established(stream))
    }

    fn established(stream: SslStream<TcpStream>) -> Self {
        let info = TlsInfo::from_ssl(stream.ssl());
        log::debug!(
            "TLS established: {} / {} (verify: {})",
            info.version,
            info.cipher,
            info.verify_result
        );

        TlsSessionOps {
            stream,
            info,
            failed: false,
        }
    }

    pub fn info(&self) -> &TlsInfo {
        &self.info
    }

    /// The stream is unusable after any I/O error, so close skips close_notify
    fn io_failure(&mut self, err: io::Error) -> Error {
        self.failed = true;
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(err),
        }
    }
}

fn handshake_error(err: HandshakeError<TcpStream>) -> TlsError {
    match err {
        HandshakeError::SetupFailure(stack) => TlsError::OpenSsl(stack),
        HandshakeError::Failure(mid) => failure_reason(&mid),
        // Only reachable when the socket has a read/write timeout.
        HandshakeError::WouldBlock(_) => TlsError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "TLS handshake timed out",
        )),
    }
}

fn failure_reason(mid: &MidHandshakeSslStream<TcpStream>) -> TlsError {
    let verify = mid.ssl().verify_result();
    if verify != X509VerifyResult::OK {
        return TlsError::PeerVerification(verify.error_string().to_string());
    }

    let error = mid.error();
    match error.io_error() {
        Some(io) if io.kind() == io::ErrorKind::WouldBlock || io.kind() == io::ErrorKind::TimedOut => {
            TlsError::Io(io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))
        }
        _ => TlsError::HandshakeFailed(error.to_string()),
    }
}

impl SessionOps for TlsSessionOps {
    fn poll(&self, interest: Interest, timeout: Option<Duration>) -> HttpResult<bool> {
        // Decrypted bytes may already be buffered inside OpenSSL.
        if interest == Interest::Readable && self.stream.ssl().pending() > 0 {
            return Ok(true);
        }
        poll_fd(self.stream.get_ref().as_raw_fd(), interest, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        let result = self.stream.read(buf);
        result.map_err(|e| self.io_failure(e))
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        let result = self.stream.write(buf);
        result.map_err(|e| self.io_failure(e))
    }

    /// A readable socket may hold only post-handshake records such as TLS 1.3
    /// session tickets, after which `SSL_read` waits on the socket itself.
    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> HttpResult<()> {
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        let tcp = self.stream.get_ref();
        tcp.set_read_timeout(timeout)?;
        tcp.set_write_timeout(timeout)?;
        Ok(())
    }

    fn close(&mut self) -> HttpResult<()> {
        if !self.failed {
            // close_notify is best effort; the peer may already be gone.
            let _ = self.stream.shutdown();
        }

        match self.stream.get_mut().shutdown(std::net::Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other.map_err(Error::from),
        }
    }
}
