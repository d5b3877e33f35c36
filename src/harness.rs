//! Test client
//!
//! `TestClient` wraps one `Transfer` with the knobs a scenario turns (trust
//! anchor, client certificate, insecure mode) and prints a human-readable
//! report. A request check returns `true` only when the transfer completed
//! and the final status was 200; every error is printed and folded into
//! `false`.

use crate::transfer::{self, Transfer, TransferError};
use chrono::Local;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 60;

/// Effective peer/host verification for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub peer: bool,
    pub host: bool,
}

impl Verification {
    /// Insecure mode turns both checks off whatever was asked for
    pub fn resolve(insecure: bool, peer: bool, host: bool) -> Self {
        if insecure {
            Verification {
                peer: false,
                host: false,
            }
        } else {
            Verification { peer, host }
        }
    }
}

pub struct TestClient {
    name: String,
    description: String,
    ca_cert: Option<PathBuf>,
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
    insecure: bool,
    transfer: Result<Transfer, TransferError>,
    out: Box<dyn Write>,
}

impl TestClient {
    /// Client reporting to stdout
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::with_output(name, description, Box::new(io::stdout()))
    }

    /// Client reporting to `out`
    pub fn with_output(
        name: impl Into<String>,
        description: impl Into<String>,
        out: Box<dyn Write>,
    ) -> Self {
        let transfer = Transfer::new();
        if let Err(e) = &transfer {
            log::warn!("transport unavailable: {}", e);
        }

        TestClient {
            name: name.into(),
            description: description.into(),
            ca_cert: None,
            client_cert: None,
            client_key: None,
            insecure: false,
            transfer,
            out,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_ca_cert(&mut self, path: impl Into<PathBuf>) {
        self.ca_cert = Some(path.into());
    }

    pub fn set_client_cert(&mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
    }

    pub fn set_insecure(&mut self, insecure: bool) {
        self.insecure = insecure;
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    /// GET `url` over TLS with the given verification flags
    ///
    /// Insecure mode overrides both flags.
    pub fn test_https(&mut self, url: &str, verify_peer: bool, verify_host: bool) -> bool {
        let verification = Verification::resolve(self.insecure, verify_peer, verify_host);
        let client_cert = self.client_cert.clone();
        let client_key = self.client_key.clone();
        self.check(url, verification, client_cert, client_key)
    }

    /// GET `url` presenting a client certificate
    ///
    /// Non-empty paths replace those given to `set_client_cert`; empty ones
    /// leave them in place. With neither, no certificate is offered.
    pub fn test_mtls(&mut self, url: &str, client_cert: &str, client_key: &str) -> bool {
        let verification = Verification::resolve(self.insecure, true, true);
        let client_cert = non_empty(client_cert).or_else(|| self.client_cert.clone());
        let client_key = non_empty(client_key).or_else(|| self.client_key.clone());
        self.check(url, verification, client_cert, client_key)
    }

    fn check(
        &mut self,
        url: &str,
        verification: Verification,
        client_cert: Option<PathBuf>,
        client_key: Option<PathBuf>,
    ) -> bool {
        if let Err(e) = &self.transfer {
            let line = format!("ERROR: Failed to initialize transport: {}", e);
            self.emit(&line);
            return false;
        }
        let Ok(handle) = &mut self.transfer else {
            return false;
        };

        handle.reset();
        handle.set_url(url);
        handle.set_timeout(transfer::DEFAULT_TIMEOUT);
        handle.set_connect_timeout(transfer::DEFAULT_CONNECT_TIMEOUT);
        handle.set_follow_location(true);
        handle.set_verbose(true);
        handle.set_verify_peer(verification.peer);
        handle.set_verify_host(verification.host);
        if let Some(ca) = &self.ca_cert {
            handle.set_ca_file(ca.clone());
        }
        if let Some(cert) = client_cert {
            handle.set_client_cert(cert, client_key);
        } else if client_key.is_some() {
            log::warn!("client key given without a certificate; ignoring it");
        }

        log::debug!("{}: GET {} ({:?})", self.name, url, verification);
        let result = handle.perform();

        match result {
            Ok(info) => {
                let response = format!("HTTP Response: {}", info.body_text());
                let status = format!("HTTP Status Code: {}", info.status);
                self.emit(&response);
                self.emit(&status);
                transfer::is_ok_status(info.status)
            }
            Err(e) => {
                let line = format!("Transport Error: {}", e);
                self.emit(&line);
                false
            }
        }
    }

    /// Print the banner that opens a report
    pub fn print_test_header(&mut self) {
        let mut buf = Vec::new();
        if self.write_test_header(&mut buf).is_ok() {
            self.emit_raw(&buf);
        }
    }

    pub fn write_test_header(&self, w: &mut impl Write) -> io::Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(w)?;
        writeln!(w, "{}", rule)?;
        writeln!(w, "TEST: {}", self.name)?;
        writeln!(w, "DESCRIPTION: {}", self.description)?;
        writeln!(w, "TIME: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(w, "{}", rule)
    }

    /// Print the verdict that closes a report
    pub fn print_result(&mut self, success: bool, expected: &str, actual: &str) {
        let mut buf = Vec::new();
        if write_result(&mut buf, success, expected, actual).is_ok() {
            self.emit_raw(&buf);
        }
    }

    /// Print one detail line (e.g. `URL: ...`) between header and result
    pub fn print_line(&mut self, line: &str) {
        self.emit(line);
    }

    fn emit(&mut self, line: &str) {
        let mut buf = line.as_bytes().to_vec();
        buf.push(b'\n');
        self.emit_raw(&buf);
    }

    fn emit_raw(&mut self, bytes: &[u8]) {
        if let Err(e) = self.out.write_all(bytes).and_then(|_| self.out.flush()) {
            log::warn!("failed to write report: {}", e);
        }
    }
}

/// Result block: verdict, expectation, observation, closing rule
pub fn write_result(w: &mut impl Write, success: bool, expected: &str, actual: &str) -> io::Result<()> {
    writeln!(w)?;
    writeln!(w, "RESULT: {}", if success { "SUCCESS" } else { "FAILED" })?;
    writeln!(w, "EXPECTED: {}", expected)?;
    if !actual.is_empty() {
        writeln!(w, "ACTUAL: {}", actual)?;
    }
    writeln!(w, "{}", "-".repeat(RULE_WIDTH))
}

fn non_empty(path: &str) -> Option<PathBuf> {
    (!path.is_empty()).then(|| Path::new(path).to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Writer whose contents stay readable after the client takes it
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn client(out: &Captured) -> TestClient {
        TestClient::with_output("HTTPS With CA", "should succeed", Box::new(out.clone()))
    }

    #[test]
    fn test_insecure_wins() {
        assert_eq!(
            Verification::resolve(true, true, true),
            Verification { peer: false, host: false }
        );
        assert_eq!(
            Verification::resolve(false, true, false),
            Verification { peer: true, host: false }
        );
        assert_eq!(
            Verification::resolve(false, false, false),
            Verification { peer: false, host: false }
        );
    }

    #[test]
    fn test_header_format() {
        let out = Captured::default();
        let mut client = client(&out);
        client.print_test_header();

        let text = out.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "=".repeat(60));
        assert_eq!(lines[2], "TEST: HTTPS With CA");
        assert_eq!(lines[3], "DESCRIPTION: should succeed");
        assert!(lines[4].starts_with("TIME: "));
        assert_eq!(lines[4].len(), "TIME: 2026-01-01 00:00:00".len());
        assert_eq!(lines[5], "=".repeat(60));
    }

    #[test]
    fn test_result_format() {
        let mut buf = Vec::new();
        write_result(&mut buf, true, "SUCCESS: Should succeed", "SUCCESS (expected)").unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            format!(
                "\nRESULT: SUCCESS\nEXPECTED: SUCCESS: Should succeed\nACTUAL: SUCCESS (expected)\n{}\n",
                "-".repeat(60)
            )
        );
    }

    #[test]
    fn test_result_omits_empty_actual() {
        let mut buf = Vec::new();
        write_result(&mut buf, false, "FAIL", "").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("RESULT: FAILED\n"));
        assert!(!text.contains("ACTUAL"));
    }

    #[test]
    fn test_transport_error_is_reported() {
        let out = Captured::default();
        let mut client = client(&out);

        assert!(!client.test_https("ftp://nginx/", true, true));
        assert!(out.text().starts_with("Transport Error: Protocol \"ftp\" not supported"));
    }

    #[test]
    fn test_missing_ca_file_fails_request() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("https://127.0.0.1:{}/", listener.local_addr().unwrap().port());

        let out = Captured::default();
        let mut client = client(&out);
        client.set_ca_cert("/nonexistent/root-ca.crt");

        assert!(!client.test_https(&url, true, true));
        assert!(out.text().contains("/nonexistent/root-ca.crt"));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(""), None);
        assert_eq!(non_empty("/certs/a.crt"), Some(PathBuf::from("/certs/a.crt")));
    }
}
