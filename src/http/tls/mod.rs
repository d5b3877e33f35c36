//! TLS for the HTTP layer, on top of OpenSSL
//!
//! OpenSSL does the cryptography, certificate parsing and chain checks. This
//! module picks the settings and reports what came out of the handshake.
//! [`TlsConfig`] wraps a finished context for either side of a connection,
//! [`TlsSessionOps`] is the [`SessionOps`](crate::http::SessionOps) transport
//! over an `SslStream`, and [`TlsInfo`] describes the negotiated session.
//!
//! A client that trusts a private CA and presents a certificate:
//!
//! ```no_run
//! use std::net::TcpStream;
//! use tls_harness::http::tls::TlsConfig;
//!
//! let config = TlsConfig::client()?
//!     .verify_peer(true)
//!     .verify_hostname(true)
//!     .ca_file("/certs/root-ca.crt")?
//!     .client_cert("/certs/client-valid.crt", Some("/certs/client-valid.key"))?
//!     .servername("nginx")
//!     .build()?;
//!
//! let session = config.connect(TcpStream::connect("nginx:8444")?)?;
//! println!("{} {}", session.info().version, session.info().cipher);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The matching server side, refusing clients without a certificate:
//!
//! ```no_run
//! use std::net::TcpListener;
//! use tls_harness::http::tls::{ClientVerify, TlsConfig};
//!
//! let config = TlsConfig::server()?
//!     .cert_and_key("server.crt", "server.key")?
//!     .client_verify_ca("root-ca.crt")?
//!     .client_verify(ClientVerify::Required)
//!     .build()?;
//!
//! let (tcp, _) = TcpListener::bind("127.0.0.1:8444")?.accept()?;
//! let _session = config.accept(tcp)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cert;
pub mod config;
pub mod info;
pub mod session;

pub use cert::CertInfo;
pub use config::{
    ClientConfigBuilder, ClientVerify, ServerConfigBuilder, TlsConfig, TlsError, TlsVersion,
};
pub use info::TlsInfo;
pub use session::TlsSessionOps;
