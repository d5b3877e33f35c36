//! Transfer engine
//!
//! A `Transfer` is the transport handle a test client owns: a bag of options
//! plus `perform()`, which runs one GET (following redirects) and returns the
//! status, body and negotiated TLS details of the final hop.
//!
//! Every hop shares one deadline derived from the total timeout. The connect
//! timeout additionally bounds each TCP connect and TLS handshake.
//!
//! ```no_run
//! use tls_harness::transfer::Transfer;
//!
//! let _tls = tls_harness::transfer::global_init();
//! let mut transfer = Transfer::new()?;
//! transfer.set_url("https://nginx:8443/");
//! transfer.set_ca_file("/certs/root-ca.crt");
//! let info = transfer.perform()?;
//! println!("{} {}", info.status, info.body_text());
//! # Ok::<(), tls_harness::transfer::TransferError>(())
//! ```

pub mod connect;
pub mod error;
mod verbose;

pub use connect::Connection;
pub use error::TransferError;

use crate::http::session::FdSessionOps;
use crate::http::tls::{TlsConfig, TlsInfo, TlsVersion};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, Status};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::{Host, Url};
use verbose::Trace;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_REDIRECTS: u32 = 30;

const USER_AGENT: &str = concat!("tls-harness/", env!("CARGO_PKG_VERSION"));

/// Status codes that are followed when `follow_location` is on
const REDIRECT_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// Process-wide TLS library state
///
/// Hold it for as long as transfers may run.
#[must_use = "TLS state is torn down when the guard is dropped"]
pub struct GlobalGuard {
    _private: (),
}

impl Drop for GlobalGuard {
    fn drop(&mut self) {
        log::debug!("TLS library teardown");
    }
}

/// Initialize the TLS library
pub fn global_init() -> GlobalGuard {
    openssl::init();
    log::debug!("TLS library initialized: {}", openssl::version::version());
    GlobalGuard { _private: () }
}

/// Per-transfer options
#[derive(Debug, Clone)]
pub struct TransferOptions {
    pub url: Option<String>,
    /// PEM bundle of trusted CAs; the system store when `None`
    pub ca_file: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    /// Defaults to `client_cert` when `None`
    pub client_key: Option<PathBuf>,
    pub verify_peer: bool,
    pub verify_host: bool,
    /// Budget for the whole transfer, redirects included
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub follow_location: bool,
    pub max_redirects: u32,
    pub verbose: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            url: None,
            ca_file: None,
            client_cert: None,
            client_key: None,
            verify_peer: true,
            verify_host: true,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            follow_location: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            verbose: true,
        }
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone)]
pub struct TransferInfo {
    /// URL of the last hop
    pub url: Url,
    pub status: u16,
    pub body: Vec<u8>,
    pub redirects: u32,
    /// Negotiated TLS details of the last hop, for `https` URLs
    pub tls: Option<TlsInfo>,
}

impl TransferInfo {
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// One request/response exchange
struct Hop {
    response: HttpResponse,
    tls: Option<TlsInfo>,
}

/// Transport handle
pub struct Transfer {
    options: TransferOptions,
}

impl Transfer {
    /// Create a handle, checking that a TLS client context can be built
    pub fn new() -> Result<Self, TransferError> {
        TlsConfig::client()
            .and_then(|builder| builder.build())
            .map_err(|e| TransferError::Init(e.to_string()))?;

        Ok(Transfer {
            options: TransferOptions::default(),
        })
    }

    /// Restore every option to its default
    pub fn reset(&mut self) {
        self.options = TransferOptions::default();
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.options.url = Some(url.into());
    }

    pub fn set_ca_file(&mut self, path: impl Into<PathBuf>) {
        self.options.ca_file = Some(path.into());
    }

    pub fn set_client_cert(&mut self, cert: impl Into<PathBuf>, key: Option<PathBuf>) {
        self.options.client_cert = Some(cert.into());
        self.options.client_key = key;
    }

    pub fn set_verify_peer(&mut self, verify: bool) {
        self.options.verify_peer = verify;
    }

    pub fn set_verify_host(&mut self, verify: bool) {
        self.options.verify_host = verify;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.timeout = timeout;
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.options.connect_timeout = timeout;
    }

    pub fn set_follow_location(&mut self, follow: bool) {
        self.options.follow_location = follow;
    }

    pub fn set_max_redirects(&mut self, max: u32) {
        self.options.max_redirects = max;
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.options.verbose = verbose;
    }

    /// Run the transfer
    pub fn perform(&mut self) -> Result<TransferInfo, TransferError> {
        let raw = self
            .options
            .url
            .as_deref()
            .ok_or_else(|| TransferError::InvalidUrl("no URL set".to_string()))?;
        let mut url =
            Url::parse(raw).map_err(|e| TransferError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let deadline = Instant::now() + self.options.timeout;
        let trace = Trace::new(self.options.verbose);
        let mut redirects = 0;

        loop {
            let hop = self.fetch(&url, deadline, &trace)?;
            let status = hop.response.status().code();

            let location = hop.response.headers().get("Location").map(str::to_string);
            match location {
                Some(location) if self.options.follow_location && REDIRECT_CODES.contains(&status) => {
                    if redirects >= self.options.max_redirects {
                        return Err(TransferError::TooManyRedirects(self.options.max_redirects));
                    }
                    url = url.join(&location).map_err(|e| {
                        TransferError::InvalidUrl(format!("bad redirect target {:?}: {}", location, e))
                    })?;
                    redirects += 1;
                    log::debug!("redirect {} -> {}", redirects, url);
                    trace.note(format_args!("Issue another request to this URL: '{}'", url));
                }
                _ => {
                    return Ok(TransferInfo {
                        url,
                        status,
                        body: hop.response.into_body(),
                        redirects,
                        tls: hop.tls,
                    });
                }
            }
        }
    }

    fn fetch(&self, url: &Url, deadline: Instant, trace: &Trace) -> Result<Hop, TransferError> {
        let secure = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(TransferError::UnsupportedScheme(other.to_string())),
        };

        let host = match url.host() {
            Some(Host::Domain(name)) => name.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(TransferError::InvalidUrl(format!("{}: no host", url))),
        };
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransferError::InvalidUrl(format!("{}: no port", url)))?;

        let stream = connect::open_tcp(&host, port, self.step_budget(deadline)?, trace)?;

        let connection = if secure {
            let config = self.tls_config(&host)?;
            let session = connect::handshake(stream, &config, self.step_budget(deadline)?, trace)?;
            trace.tls(session.info(), self.options.verify_peer);
            Connection::Tls(Box::new(session))
        } else {
            Connection::Plain(FdSessionOps::new(stream))
        };

        let tls = connection.tls().map(|session| session.info().clone());

        let mut client = HttpClient::new(connection);
        client.set_deadline(deadline);

        let request = self.request_for(url);
        trace.request(&request);
        let response = client.exchange(&request)?;
        trace.response(&response);

        if let Err(e) = client.close() {
            log::debug!("closing connection: {}", e);
        }
        trace.closed(&host);

        Ok(Hop { response, tls })
    }

    /// Connect timeout, clipped to what is left of the total budget
    fn step_budget(&self, deadline: Instant) -> Result<Duration, TransferError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransferError::Timeout(format!(
                "transfer exceeded {} ms",
                self.options.timeout.as_millis()
            )));
        }
        Ok(remaining.min(self.options.connect_timeout))
    }

    fn tls_config(&self, host: &str) -> Result<TlsConfig, TransferError> {
        let opts = &self.options;
        let mut builder = TlsConfig::client()?
            .version_range(TlsVersion::Tls12, TlsVersion::Tls13)?
            .alpn(&["http/1.1"])?
            .verify_peer(opts.verify_peer)
            .verify_hostname(opts.verify_host)
            .servername(host);

        if let Some(ca) = &opts.ca_file {
            builder = builder.ca_file(ca)?;
        }
        if let Some(cert) = &opts.client_cert {
            builder = builder.client_cert(cert, opts.client_key.as_ref())?;
        }

        log::debug!(
            "TLS context: verify_peer={} verify_host={} ca={:?} client_cert={:?}",
            opts.verify_peer,
            opts.verify_host,
            opts.ca_file,
            opts.client_cert
        );
        Ok(builder.build()?)
    }

    fn request_for(&self, url: &Url) -> HttpRequest {
        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let host_header = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        HttpRequest::builder()
            .method(Method::Get)
            .uri(target)
            .header("Host", host_header)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "*/*")
            .header("Connection", "close")
            .build()
    }
}

/// Whether `status` is the only one a harness check accepts
pub fn is_ok_status(status: u16) -> bool {
    status == Status::OK.code()
}
