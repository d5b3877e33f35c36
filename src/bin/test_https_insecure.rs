//! HTTPS with verification disabled; must succeed.

use std::process::ExitCode;
use tls_harness::scenario::{drive, Scenario};

fn main() -> ExitCode {
    drive(Scenario::HttpsInsecure)
}
