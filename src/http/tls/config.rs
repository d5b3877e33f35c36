//! OpenSSL context setup for both ends of a connection
//!
//! Files are not checked up front. A missing or unreadable CA bundle,
//! certificate or key shows up as [`TlsError::Certificate`] from the builder
//! call that tried to load it, with the path in the message.

use super::TlsSessionOps;
use openssl::pkey::PKey;
use openssl::ssl::{
    AlpnError, SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode, SslVersion,
};
use openssl::x509::{X509Name, X509};
use std::fs;
use std::net::TcpStream;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsVersion {
    fn protocol(self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }
}

/// What a server asks of the client's certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientVerify {
    /// No certificate request is sent
    None,
    /// Requested and checked when sent; a client without one still connects
    Optional,
    /// The handshake fails without a verifiable client certificate
    Required,
}

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("bad TLS configuration: {0}")]
    InvalidConfig(String),

    /// CA bundle, certificate or key unusable
    #[error("{0}")]
    Certificate(String),

    /// Chain or name check on the peer certificate failed
    #[error("certificate verify failed: {0}")]
    PeerVerification(String),

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
}

type Result<T> = std::result::Result<T, TlsError>;

/// A finished context plus the per-connection settings applied at connect
#[derive(Clone)]
pub struct TlsConfig {
    pub(crate) ctx: SslContext,
    pub(crate) is_server: bool,
    pub(crate) servername: Option<String>,
    pub(crate) verify_hostname: bool,
}

impl TlsConfig {
    pub fn client() -> Result<ClientConfigBuilder> {
        ClientConfigBuilder::new()
    }

    pub fn server() -> Result<ServerConfigBuilder> {
        ServerConfigBuilder::new()
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Run the client handshake on a connected socket
    pub fn connect(&self, stream: TcpStream) -> Result<TlsSessionOps> {
        if self.is_server {
            return Err(TlsError::InvalidConfig("server context used to connect".to_string()));
        }
        TlsSessionOps::connect(stream, self)
    }

    /// Run the server handshake on an accepted socket
    pub fn accept(&self, stream: TcpStream) -> Result<TlsSessionOps> {
        if !self.is_server {
            return Err(TlsError::InvalidConfig("client context used to accept".to_string()));
        }
        TlsSessionOps::accept(stream, self)
    }
}

/// Protocol names as length-prefixed ALPN wire bytes
fn alpn_wire(protocols: &[&str]) -> Result<Vec<u8>> {
    protocols.iter().try_fold(Vec::new(), |mut wire, name| {
        match u8::try_from(name.len()) {
            Ok(len) if len > 0 => {
                wire.push(len);
                wire.extend_from_slice(name.as_bytes());
                Ok(wire)
            }
            _ => Err(TlsError::InvalidConfig(format!("ALPN protocol {:?}", name))),
        }
    })
}

/// First protocol in the client's list that is also in `ours`, as a slice
/// of the client's list
fn choose_alpn<'a>(ours: &[Vec<u8>], offered: &'a [u8]) -> Option<&'a [u8]> {
    let mut rest = offered;
    while let Some((&len, tail)) = rest.split_first() {
        let len = usize::from(len);
        if tail.len() < len {
            return None;
        }
        let (name, next) = tail.split_at(len);
        if ours.iter().any(|p| p.as_slice() == name) {
            return Some(name);
        }
        rest = next;
    }
    None
}

fn set_versions(ctx: &mut SslContextBuilder, min: TlsVersion, max: TlsVersion) -> Result<()> {
    ctx.set_min_proto_version(Some(min.protocol()))?;
    ctx.set_max_proto_version(Some(max.protocol()))?;
    Ok(())
}

/// Client context builder. Peer verification starts off.
pub struct ClientConfigBuilder {
    ctx: SslContextBuilder,
    servername: Option<String>,
    verify_peer: bool,
    verify_hostname: bool,
    has_ca_file: bool,
}

impl ClientConfigBuilder {
    fn new() -> Result<Self> {
        let mut ctx = SslContextBuilder::new(SslMethod::tls_client())?;
        ctx.set_verify(SslVerifyMode::NONE);
        Ok(ClientConfigBuilder {
            ctx,
            servername: None,
            verify_peer: false,
            verify_hostname: false,
            has_ca_file: false,
        })
    }

    pub fn version(self, version: TlsVersion) -> Result<Self> {
        self.version_range(version, version)
    }

    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Result<Self> {
        set_versions(&mut self.ctx, min, max)?;
        Ok(self)
    }

    /// Protocols offered in ALPN, most preferred first
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self> {
        self.ctx.set_alpn_protos(&alpn_wire(protocols)?)?;
        Ok(self)
    }

    /// Sent as SNI (unless an IP literal) and checked against the certificate
    pub fn servername(mut self, name: impl Into<String>) -> Self {
        self.servername = Some(name.into());
        self
    }

    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        let mode = if verify {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        };
        self.ctx.set_verify(mode);
        self
    }

    /// Has no effect unless `verify_peer` is on too
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    /// Trust the PEM certificates in `path` instead of the system store
    pub fn ca_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Err(e) = self.ctx.set_ca_file(path) {
            return Err(TlsError::Certificate(format!(
                "error setting certificate verify locations: CAfile: {} ({})",
                path.display(),
                e
            )));
        }
        self.has_ca_file = true;
        Ok(self)
    }

    /// PEM certificate chain and key offered when the server asks. A `None`
    /// key is looked for in the certificate file.
    pub fn client_cert<P: AsRef<Path>>(mut self, cert: P, key: Option<P>) -> Result<Self> {
        let cert = cert.as_ref();
        let key = key.as_ref().map_or(cert, |k| k.as_ref());

        if let Err(e) = self.ctx.set_certificate_chain_file(cert) {
            return Err(TlsError::Certificate(format!(
                "could not load PEM client certificate from {} ({})",
                cert.display(),
                e
            )));
        }
        let unusable_key = |reason: String| {
            TlsError::Certificate(format!(
                "unable to set private key file: '{}' type PEM ({})",
                key.display(),
                reason
            ))
        };
        let pkey = fs::read(key)
            .map_err(|e| unusable_key(e.to_string()))
            .and_then(|pem| PKey::private_key_from_pem(&pem).map_err(|e| unusable_key(e.to_string())))?;

        // Leaf comes first in the chain file that just loaded.
        let chain_pem = fs::read(cert)?;
        let leaf = X509::from_pem(&chain_pem)?;
        if !leaf.public_key()?.public_eq(&pkey) {
            return Err(TlsError::Certificate(format!(
                "private key {} does not match client certificate {}",
                key.display(),
                cert.display()
            )));
        }
        self.ctx.set_private_key(&pkey)?;
        Ok(self)
    }

    pub fn build(mut self) -> Result<TlsConfig> {
        if self.verify_peer && !self.has_ca_file {
            self.ctx.set_default_verify_paths()?;
        }
        Ok(TlsConfig {
            ctx: self.ctx.build(),
            is_server: false,
            servername: self.servername,
            verify_hostname: self.verify_peer && self.verify_hostname,
        })
    }
}

pub struct ServerConfigBuilder {
    ctx: SslContextBuilder,
    has_identity: bool,
}

impl ServerConfigBuilder {
    fn new() -> Result<Self> {
        Ok(ServerConfigBuilder {
            ctx: SslContextBuilder::new(SslMethod::tls_server())?,
            has_identity: false,
        })
    }

    pub fn version(mut self, version: TlsVersion) -> Result<Self> {
        set_versions(&mut self.ctx, version, version)?;
        Ok(self)
    }

    /// Picks the first protocol the client offers that is also listed here
    pub fn alpn(mut self, protocols: &[&str]) -> Result<Self> {
        alpn_wire(protocols)?;
        let ours: Vec<Vec<u8>> = protocols.iter().map(|p| p.as_bytes().to_vec()).collect();
        self.ctx.set_alpn_select_callback(move |_, offered| {
            choose_alpn(&ours, offered).ok_or(AlpnError::NOACK)
        });
        Ok(self)
    }

    /// Server certificate chain and key, both PEM
    pub fn cert_and_key<P: AsRef<Path>>(mut self, cert: P, key: P) -> Result<Self> {
        let (cert, key) = (cert.as_ref(), key.as_ref());
        self.ctx
            .set_certificate_chain_file(cert)
            .map_err(|e| TlsError::Certificate(format!("{}: {}", cert.display(), e)))?;
        self.ctx
            .set_private_key_file(key, SslFiletype::PEM)
            .map_err(|e| TlsError::Certificate(format!("{}: {}", key.display(), e)))?;
        self.ctx.check_private_key()?;
        self.has_identity = true;
        Ok(self)
    }

    pub fn client_verify(mut self, mode: ClientVerify) -> Self {
        self.ctx.set_verify(match mode {
            ClientVerify::None => SslVerifyMode::NONE,
            ClientVerify::Optional => SslVerifyMode::PEER,
            ClientVerify::Required => SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT,
        });
        self
    }

    /// CA that client certificates must chain to; its name is sent in the
    /// certificate request
    pub fn client_verify_ca<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        self.ctx.set_ca_file(path)?;
        self.ctx.set_client_ca_list(X509Name::load_client_ca_file(path)?);
        Ok(self)
    }

    pub fn build(self) -> Result<TlsConfig> {
        if !self.has_identity {
            return Err(TlsError::InvalidConfig("server needs a certificate and key".to_string()));
        }
        Ok(TlsConfig {
            ctx: self.ctx.build(),
            is_server: true,
            servername: None,
            verify_hostname: false,
        })
    }
}
