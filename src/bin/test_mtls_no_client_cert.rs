//! mTLS endpoint without a client certificate; must be rejected.

use std::process::ExitCode;
use tls_harness::scenario::{drive, Scenario};

fn main() -> ExitCode {
    drive(Scenario::MtlsNoClientCert)
}
