//! tls-harness - TLS and mutual-TLS scenario harness
//!
//! Drives one HTTPS request per scenario against a test server and checks
//! that the handshake and certificate checks succeed or fail as expected.
//! OpenSSL does the TLS work; the crate's own HTTP/1.1 layer does the
//! framing.

pub mod config;
pub mod harness;
pub mod http;
pub mod logging;
pub mod pki;
pub mod scenario;
pub mod transfer;
