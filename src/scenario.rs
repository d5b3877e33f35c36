//! The six TLS/mTLS scenarios
//!
//! Each scenario configures a `TestClient`, prints what it is about to do,
//! issues one request and compares the result with its expectation. The
//! driver binaries are one-liners around `drive`.

use crate::config::HarnessConfig;
use crate::harness::TestClient;
use crate::logging;
use crate::transfer;
use std::io::{self, Write};
use std::process::ExitCode;

/// Which endpoint a scenario talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Server-authenticated TLS (8443 by default)
    Https,
    /// Endpoint that asks for a client certificate (8444 by default)
    Mtls,
}

/// Client certificate a scenario presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCert {
    None,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    HttpsNoCa,
    HttpsWithCa,
    HttpsInsecure,
    MtlsNoClientCert,
    MtlsValidCert,
    MtlsInvalidCert,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::HttpsNoCa,
        Scenario::HttpsWithCa,
        Scenario::HttpsInsecure,
        Scenario::MtlsNoClientCert,
        Scenario::MtlsValidCert,
        Scenario::MtlsInvalidCert,
    ];

    /// Name of the driver binary
    pub fn binary_name(&self) -> &'static str {
        match self {
            Scenario::HttpsNoCa => "test_https_no_ca",
            Scenario::HttpsWithCa => "test_https_with_ca",
            Scenario::HttpsInsecure => "test_https_insecure",
            Scenario::MtlsNoClientCert => "test_mtls_no_client_cert",
            Scenario::MtlsValidCert => "test_mtls_valid_cert",
            Scenario::MtlsInvalidCert => "test_mtls_invalid_cert",
        }
    }

    pub fn from_binary_name(name: &str) -> Option<Scenario> {
        Scenario::ALL.into_iter().find(|s| s.binary_name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::HttpsNoCa => "HTTPS No CA",
            Scenario::HttpsWithCa => "HTTPS With CA",
            Scenario::HttpsInsecure => "HTTPS Insecure",
            Scenario::MtlsNoClientCert => "mTLS No Client Cert",
            Scenario::MtlsValidCert => "mTLS Valid Client Cert",
            Scenario::MtlsInvalidCert => "mTLS Invalid Client Cert",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::HttpsNoCa => {
                "HTTPS request without CA certificate - should fail with certificate verification error"
            }
            Scenario::HttpsWithCa => {
                "HTTPS request with Root CA certificate - should succeed with proper certificate validation"
            }
            Scenario::HttpsInsecure => {
                "HTTPS request with insecure flag - should succeed but skip certificate verification"
            }
            Scenario::MtlsNoClientCert => {
                "mTLS request without client certificate - should fail with SSL handshake error"
            }
            Scenario::MtlsValidCert => {
                "mTLS request with valid client certificate - should succeed with mutual authentication"
            }
            Scenario::MtlsInvalidCert => {
                "mTLS request with invalid client certificate - should fail with certificate verification error"
            }
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            Scenario::HttpsNoCa | Scenario::HttpsWithCa | Scenario::HttpsInsecure => Endpoint::Https,
            _ => Endpoint::Mtls,
        }
    }

    /// Whether the root CA is configured as trust anchor
    pub fn uses_ca(&self) -> bool {
        !matches!(self, Scenario::HttpsNoCa | Scenario::HttpsInsecure)
    }

    pub fn client_cert(&self) -> ClientCert {
        match self {
            Scenario::MtlsValidCert => ClientCert::Valid,
            Scenario::MtlsInvalidCert => ClientCert::Invalid,
            _ => ClientCert::None,
        }
    }

    pub fn insecure(&self) -> bool {
        *self == Scenario::HttpsInsecure
    }

    pub fn expect_success(&self) -> bool {
        matches!(
            self,
            Scenario::HttpsWithCa | Scenario::HttpsInsecure | Scenario::MtlsValidCert
        )
    }

    /// Text printed after `EXPECTED:`
    pub fn expectation(&self) -> &'static str {
        match self {
            Scenario::HttpsNoCa => "FAIL: Certificate verification should fail",
            Scenario::HttpsWithCa => "SUCCESS: Should succeed with valid CA certificate",
            Scenario::HttpsInsecure => "SUCCESS: Should succeed with insecure flag",
            Scenario::MtlsNoClientCert => {
                "FAIL: Server should reject connection without client certificate"
            }
            Scenario::MtlsValidCert => "SUCCESS: Should succeed with valid client certificate",
            Scenario::MtlsInvalidCert => "FAIL: Server should reject invalid client certificate",
        }
    }

    pub fn url(&self, config: &HarnessConfig) -> String {
        match self.endpoint() {
            Endpoint::Https => config.https_url(),
            Endpoint::Mtls => config.mtls_url(),
        }
    }

    /// Run against `config`, reporting to stdout
    pub fn run(&self, config: &HarnessConfig) -> Outcome {
        self.run_with_output(config, Box::new(io::stdout()))
    }

    /// Run against `config`, reporting to `out`
    pub fn run_with_output(&self, config: &HarnessConfig, out: Box<dyn Write>) -> Outcome {
        let mut client = TestClient::with_output(self.name(), self.description(), out);
        let url = self.url(config);

        if self.uses_ca() {
            client.set_ca_cert(&config.ca_cert);
        }
        client.set_insecure(self.insecure());

        let cert_paths = match self.client_cert() {
            ClientCert::None => None,
            ClientCert::Valid => Some((&config.client_valid_cert, &config.client_valid_key)),
            ClientCert::Invalid => Some((&config.client_invalid_cert, &config.client_invalid_key)),
        };
        if let Some((cert, key)) = cert_paths {
            client.set_client_cert(cert, key);
        }

        client.print_test_header();
        for line in self.detail_lines(config, &url) {
            client.print_line(&line);
        }

        let success = match (self.endpoint(), cert_paths) {
            (Endpoint::Https, _) => {
                let verify = !self.insecure();
                client.test_https(&url, verify, verify)
            }
            (Endpoint::Mtls, None) => client.test_mtls(&url, "", ""),
            (Endpoint::Mtls, Some((cert, key))) => client.test_mtls(
                &url,
                &cert.to_string_lossy(),
                &key.to_string_lossy(),
            ),
        };

        let outcome = Outcome {
            expect_success: self.expect_success(),
            success,
        };
        client.print_result(success, self.expectation(), outcome.actual());
        log::debug!("{} finished: {:?}", self.binary_name(), outcome);
        outcome
    }

    /// Lines printed between the header and the request trace
    pub fn detail_lines(&self, config: &HarnessConfig, url: &str) -> Vec<String> {
        let mut lines = vec![format!("URL: {}", url)];

        lines.push(if self.uses_ca() {
            format!("CA Certificate: {}", config.ca_cert.display())
        } else {
            "CA Certificate: None".to_string()
        });

        match self.client_cert() {
            ClientCert::None if self.endpoint() == Endpoint::Mtls => {
                lines.push("Client Certificate: None".to_string());
            }
            ClientCert::None => {}
            ClientCert::Valid => {
                lines.push(format!(
                    "Client Certificate: {} (valid - signed by Root CA)",
                    config.client_valid_cert.display()
                ));
                lines.push(format!("Client Key: {}", config.client_valid_key.display()));
            }
            ClientCert::Invalid => {
                lines.push(format!(
                    "Client Certificate: {} (invalid - self-signed)",
                    config.client_invalid_cert.display()
                ));
                lines.push(format!("Client Key: {}", config.client_invalid_key.display()));
            }
        }

        lines.push(if self.insecure() {
            "SSL Verification: Disabled (insecure)".to_string()
        } else {
            "SSL Verification: Enabled".to_string()
        });

        lines
    }
}

/// Observed result next to the expected one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub expect_success: bool,
    pub success: bool,
}

impl Outcome {
    pub fn matched(&self) -> bool {
        self.expect_success == self.success
    }

    /// Text printed after `ACTUAL:`
    pub fn actual(&self) -> &'static str {
        match (self.success, self.matched()) {
            (true, true) => "SUCCESS (expected)",
            (true, false) => "SUCCESS (unexpected)",
            (false, true) => "FAIL (expected)",
            (false, false) => "FAIL (unexpected)",
        }
    }

    /// 0 when the scenario behaved as expected, 1 otherwise
    pub fn exit_code(&self) -> ExitCode {
        if self.matched() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Entry point shared by the driver binaries
pub fn drive(scenario: Scenario) -> ExitCode {
    logging::init();
    let _tls = transfer::global_init();

    let config = HarnessConfig::from_env();
    let outcome = scenario.run(&config);

    if let Err(e) = io::stdout().flush() {
        log::warn!("flushing stdout: {}", e);
    }
    outcome.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_table() {
        use Scenario::*;

        let expected = [
            (HttpsNoCa, Endpoint::Https, false, ClientCert::None, false, false),
            (HttpsWithCa, Endpoint::Https, true, ClientCert::None, false, true),
            (HttpsInsecure, Endpoint::Https, false, ClientCert::None, true, true),
            (MtlsNoClientCert, Endpoint::Mtls, true, ClientCert::None, false, false),
            (MtlsValidCert, Endpoint::Mtls, true, ClientCert::Valid, false, true),
            (MtlsInvalidCert, Endpoint::Mtls, true, ClientCert::Invalid, false, false),
        ];

        for (scenario, endpoint, ca, cert, insecure, success) in expected {
            assert_eq!(scenario.endpoint(), endpoint, "{:?}", scenario);
            assert_eq!(scenario.uses_ca(), ca, "{:?}", scenario);
            assert_eq!(scenario.client_cert(), cert, "{:?}", scenario);
            assert_eq!(scenario.insecure(), insecure, "{:?}", scenario);
            assert_eq!(scenario.expect_success(), success, "{:?}", scenario);
            assert_eq!(
                scenario.expectation().starts_with("SUCCESS"),
                success,
                "{:?}",
                scenario
            );
        }
    }

    #[test]
    fn test_binary_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_binary_name(scenario.binary_name()), Some(scenario));
        }
        assert_eq!(Scenario::from_binary_name("test_other"), None);
    }

    #[test]
    fn test_urls() {
        let config = HarnessConfig::default();
        assert_eq!(Scenario::HttpsWithCa.url(&config), "https://nginx:8443/");
        assert_eq!(Scenario::MtlsValidCert.url(&config), "https://nginx:8444/");
    }

    #[test]
    fn test_outcome_texts() {
        let outcome = |expect_success, success| Outcome {
            expect_success,
            success,
        };

        assert_eq!(outcome(true, true).actual(), "SUCCESS (expected)");
        assert_eq!(outcome(false, true).actual(), "SUCCESS (unexpected)");
        assert_eq!(outcome(false, false).actual(), "FAIL (expected)");
        assert_eq!(outcome(true, false).actual(), "FAIL (unexpected)");

        assert!(outcome(false, false).matched());
        assert!(!outcome(true, false).matched());
    }

    #[test]
    fn test_detail_lines() {
        let config = HarnessConfig::default();

        assert_eq!(
            Scenario::HttpsInsecure.detail_lines(&config, "https://nginx:8443/"),
            vec![
                "URL: https://nginx:8443/",
                "CA Certificate: None",
                "SSL Verification: Disabled (insecure)",
            ]
        );

        assert_eq!(
            Scenario::MtlsNoClientCert.detail_lines(&config, "https://nginx:8444/"),
            vec![
                "URL: https://nginx:8444/",
                "CA Certificate: /certs/root-ca.crt",
                "Client Certificate: None",
                "SSL Verification: Enabled",
            ]
        );

        assert_eq!(
            Scenario::MtlsInvalidCert.detail_lines(&config, "https://nginx:8444/"),
            vec![
                "URL: https://nginx:8444/",
                "CA Certificate: /certs/root-ca.crt",
                "Client Certificate: /certs/client-invalid.crt (invalid - self-signed)",
                "Client Key: /certs/client-invalid.key",
                "SSL Verification: Enabled",
            ]
        );
    }
}
