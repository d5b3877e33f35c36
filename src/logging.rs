//! Logger setup for the scenario drivers
//!
//! `env_logger` writing to stdout, so the transfer trace interleaves with
//! the report. The filter comes from `RUST_LOG` and defaults to `info`,
//! which includes the trace. Trace lines are printed as-is; everything
//! else gets a level and target prefix.

use std::io::Write;
use std::sync::Once;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

static INIT: Once = Once::new();

fn builder() -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER));

    builder
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            if record.target() == "transfer" {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "[{} {}] {}", record.level(), record.target(), record.args())
            }
        });
    builder
}

/// Install the logger; later calls are no-ops
pub fn init() {
    INIT.call_once(|| {
        if let Err(e) = builder().try_init() {
            eprintln!("logger already installed: {}", e);
        }
    });
}

/// Logger for tests: output captured by the test harness
pub fn init_test() {
    let _ = builder().is_test(true).try_init();
}
