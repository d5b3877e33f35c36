//! HTTPS trusting the root CA; must succeed with status 200.

use std::process::ExitCode;
use tls_harness::scenario::{drive, Scenario};

fn main() -> ExitCode {
    drive(Scenario::HttpsWithCa)
}
