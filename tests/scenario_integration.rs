//! The six scenarios against local fixture endpoints

mod common;

use common::{spawn_https_endpoint, spawn_mtls_endpoint, Pki};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tls_harness::config::HarnessConfig;
use tls_harness::scenario::{Outcome, Scenario};

#[derive(Clone, Default)]
struct Report(Arc<Mutex<Vec<u8>>>);

impl Write for Report {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Report {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

struct Setup {
    config: HarnessConfig,
    _pki: Pki,
}

fn setup() -> Setup {
    let pki = Pki::new();
    let https = spawn_https_endpoint(&pki);
    let mtls = spawn_mtls_endpoint(&pki);

    let config = HarnessConfig::default()
        .with_host("localhost")
        .with_ports(https.port(), mtls.port())
        .with_cert_dir(pki.pki.dir());

    Setup { config, _pki: pki }
}

fn run(scenario: Scenario, config: &HarnessConfig) -> (Outcome, String) {
    let report = Report::default();
    let outcome = scenario.run_with_output(config, Box::new(report.clone()));
    (outcome, report.text())
}

#[test]
fn test_https_no_ca_fails() {
    let setup = setup();
    let (outcome, report) = run(Scenario::HttpsNoCa, &setup.config);

    assert!(!outcome.success);
    assert!(outcome.matched());
    assert!(report.contains("Transport Error: SSL connect error"));
    assert!(report.contains("RESULT: FAILED"));
    assert!(report.contains("ACTUAL: FAIL (expected)"));
}

#[test]
fn test_https_with_ca_succeeds() {
    let setup = setup();
    let (outcome, report) = run(Scenario::HttpsWithCa, &setup.config);

    assert!(outcome.success, "{}", report);
    assert!(outcome.matched());
    assert!(report.contains(&format!("HTTP Response: {}", common::GREETING)));
    assert!(report.contains("HTTP Status Code: 200"));
    assert!(report.contains("ACTUAL: SUCCESS (expected)"));
}

#[test]
fn test_https_insecure_succeeds() {
    let setup = setup();
    let (outcome, report) = run(Scenario::HttpsInsecure, &setup.config);

    assert!(outcome.success, "{}", report);
    assert!(report.contains("SSL Verification: Disabled (insecure)"));
}

#[test]
fn test_mtls_without_client_cert_fails() {
    let setup = setup();
    let (outcome, report) = run(Scenario::MtlsNoClientCert, &setup.config);

    assert!(!outcome.success);
    assert!(outcome.matched());
    assert!(report.contains("Client Certificate: None"));
    assert!(report.contains("HTTP Status Code: 400"));
}

#[test]
fn test_mtls_valid_cert_succeeds() {
    let setup = setup();
    let (outcome, report) = run(Scenario::MtlsValidCert, &setup.config);

    assert!(outcome.success, "{}", report);
    assert!(outcome.matched());
    assert!(report.contains("(valid - signed by Root CA)"));
}

#[test]
fn test_mtls_invalid_cert_fails() {
    let setup = setup();
    let (outcome, report) = run(Scenario::MtlsInvalidCert, &setup.config);

    assert!(!outcome.success);
    assert!(outcome.matched());
    assert!(report.contains("(invalid - self-signed)"));
}

#[test]
fn test_report_layout() {
    let setup = setup();
    let (_, report) = run(Scenario::HttpsWithCa, &setup.config);

    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines[1], "=".repeat(60));
    assert_eq!(lines[2], "TEST: HTTPS With CA");
    assert!(lines[6].starts_with("URL: https://localhost:"));
    assert_eq!(*lines.last().unwrap(), "-".repeat(60));
}

#[test]
fn test_scenarios_against_wrong_endpoint() {
    // Everything pointed at the endpoint that ignores client certificates:
    // the mTLS expectations no longer hold for the no-cert case.
    let setup = setup();
    let config = setup
        .config
        .clone()
        .with_ports(setup.config.https_port, setup.config.https_port);

    let (outcome, _) = run(Scenario::MtlsNoClientCert, &config);
    assert!(outcome.success);
    assert!(!outcome.matched());
}
