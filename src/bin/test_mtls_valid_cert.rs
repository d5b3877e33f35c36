//! mTLS with a client certificate signed by the root CA; must succeed.

use std::process::ExitCode;
use tls_harness::scenario::{drive, Scenario};

fn main() -> ExitCode {
    drive(Scenario::MtlsValidCert)
}
