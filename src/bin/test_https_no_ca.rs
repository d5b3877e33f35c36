//! HTTPS without a trust anchor; the handshake must fail.

use std::process::ExitCode;
use tls_harness::scenario::{drive, Scenario};

fn main() -> ExitCode {
    drive(Scenario::HttpsNoCa)
}
