//! Harness configuration
//!
//! Where the scenarios point: the server host, the two ports and the
//! certificate files. Defaults match the container layout (`nginx`, `/certs`);
//! `SERVER_HOST` overrides the host.

use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "nginx";
pub const DEFAULT_HTTPS_PORT: u16 = 8443;
pub const DEFAULT_MTLS_PORT: u16 = 8444;
pub const DEFAULT_CERT_DIR: &str = "/certs";

/// Environment variable overriding the server host
pub const HOST_ENV: &str = "SERVER_HOST";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub host: String,
    /// Port of the server-authenticated TLS endpoint
    pub https_port: u16,
    /// Port of the endpoint that asks for client certificates
    pub mtls_port: u16,
    pub ca_cert: PathBuf,
    pub client_valid_cert: PathBuf,
    pub client_valid_key: PathBuf,
    pub client_invalid_cert: PathBuf,
    pub client_invalid_key: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            host: DEFAULT_HOST.to_string(),
            https_port: DEFAULT_HTTPS_PORT,
            mtls_port: DEFAULT_MTLS_PORT,
            ca_cert: PathBuf::new(),
            client_valid_cert: PathBuf::new(),
            client_valid_key: PathBuf::new(),
            client_invalid_cert: PathBuf::new(),
            client_invalid_key: PathBuf::new(),
        }
        .with_cert_dir(DEFAULT_CERT_DIR)
    }
}

impl HarnessConfig {
    /// Defaults, with the host taken from `SERVER_HOST` when set
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`
    ///
    /// An empty value counts as unset.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = HarnessConfig::default();
        match lookup(HOST_ENV).filter(|host| !host.trim().is_empty()) {
            Some(host) => {
                log::debug!("{} overrides server host: {}", HOST_ENV, host);
                config.with_host(host.trim())
            }
            None => config,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_ports(mut self, https_port: u16, mtls_port: u16) -> Self {
        self.https_port = https_port;
        self.mtls_port = mtls_port;
        self
    }

    /// Point every certificate path into `dir`, using the standard file names
    pub fn with_cert_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.ca_cert = dir.join("root-ca.crt");
        self.client_valid_cert = dir.join("client-valid.crt");
        self.client_valid_key = dir.join("client-valid.key");
        self.client_invalid_cert = dir.join("client-invalid.crt");
        self.client_invalid_key = dir.join("client-invalid.key");
        self
    }

    pub fn https_url(&self) -> String {
        self.url(self.https_port)
    }

    pub fn mtls_url(&self) -> String {
        self.url(self.mtls_port)
    }

    fn url(&self, port: u16) -> String {
        if self.host.contains(':') {
            // IPv6 literal
            format!("https://[{}]:{}/", self.host, port)
        } else {
            format!("https://{}:{}/", self.host, port)
        }
    }
}
