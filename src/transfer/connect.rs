//! Connection setup: resolve, TCP connect with a timeout, optional TLS

use super::error::TransferError;
use super::verbose::Trace;
use crate::http::session::{FdSessionOps, Interest, SessionOps};
use crate::http::tls::{TlsConfig, TlsSessionOps};
use crate::http::Result as HttpResult;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Plain or TLS transport for one hop of a transfer
pub enum Connection {
    Plain(FdSessionOps),
    Tls(Box<TlsSessionOps>),
}

impl Connection {
    pub fn tls(&self) -> Option<&TlsSessionOps> {
        match self {
            Connection::Plain(_) => None,
            Connection::Tls(session) => Some(&**session),
        }
    }
}

impl SessionOps for Connection {
    fn poll(&self, interest: Interest, timeout: Option<Duration>) -> HttpResult<bool> {
        match self {
            Connection::Plain(s) => s.poll(interest, timeout),
            Connection::Tls(s) => s.poll(interest, timeout),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        match self {
            Connection::Plain(s) => s.read(buf),
            Connection::Tls(s) => s.read(buf),
        }
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        match self {
            Connection::Plain(s) => s.write(buf),
            Connection::Tls(s) => s.write(buf),
        }
    }

    fn close(&mut self) -> HttpResult<()> {
        match self {
            Connection::Plain(s) => s.close(),
            Connection::Tls(s) => s.close(),
        }
    }

    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> HttpResult<()> {
        match self {
            Connection::Plain(s) => s.set_io_timeout(timeout),
            Connection::Tls(s) => s.set_io_timeout(timeout),
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, TransferError> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| {
            log::debug!("resolving {} failed: {}", host, e);
            TransferError::Resolve(host.to_string())
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransferError::Resolve(host.to_string()));
    }
    Ok(addrs)
}

/// Connect to the first reachable address of `host`
///
/// Each address gets the full `timeout`; the last failure is reported when
/// none of them accepts.
pub(crate) fn open_tcp(host: &str, port: u16, timeout: Duration, trace: &Trace) -> Result<TcpStream, TransferError> {
    let mut last_error = None;

    for addr in resolve(host, port)? {
        trace.note(format_args!("  Trying {}...", addr));

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| TransferError::Connect {
                host: host.to_string(),
                port,
                source,
            })?;

        match socket.connect_timeout(&SockAddr::from(addr), timeout) {
            Ok(()) => {
                if let Err(e) = socket.set_nodelay(true) {
                    log::warn!("could not set TCP_NODELAY: {}", e);
                }
                trace.note(format_args!("Connected to {} ({}) port {}", host, addr.ip(), port));
                return Ok(socket.into());
            }
            Err(e) => {
                log::debug!("connect to {} failed: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
            Err(TransferError::Timeout(format!(
                "connection to {} port {} not established within {} ms",
                host,
                port,
                timeout.as_millis()
            )))
        }
        Some(source) => Err(TransferError::Connect {
            host: host.to_string(),
            port,
            source,
        }),
        None => Err(TransferError::Resolve(host.to_string())),
    }
}

/// TLS handshake bounded by `timeout`
pub(crate) fn handshake(
    stream: TcpStream,
    config: &TlsConfig,
    timeout: Duration,
    trace: &Trace,
) -> Result<TlsSessionOps, TransferError> {
    // Blocking handshake; socket timeouts turn a stalled peer into an error.
    let timeout = Some(timeout.max(Duration::from_millis(1)));
    stream
        .set_read_timeout(timeout)
        .and_then(|_| stream.set_write_timeout(timeout))
        .map_err(|e| TransferError::Handshake(e.to_string()))?;

    trace.note("TLS handshake started");
    // HttpSession replaces the socket timeouts before each later read or write.
    Ok(config.connect(stream)?)
}
