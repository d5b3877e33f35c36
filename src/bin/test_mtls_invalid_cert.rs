//! mTLS with a self-signed client certificate; must be rejected.

use std::process::ExitCode;
use tls_harness::scenario::{drive, Scenario};

fn main() -> ExitCode {
    drive(Scenario::MtlsInvalidCert)
}
