//! HTTP/1.1 plumbing under the transfer engine
//!
//! A driver only ever sends one `GET`, but the responses come from a real
//! nginx, so this layer handles everything such a server may answer with:
//! informational responses, `Content-Length` and chunked bodies, and bodies
//! that run until the connection closes.
//!
//! Transport is abstracted by [`SessionOps`]. [`FdSessionOps`] covers plain
//! TCP and [`tls::TlsSessionOps`] covers OpenSSL streams. [`HttpSession`] puts
//! per-operation timeouts and an overall deadline on top of either one, and
//! [`HttpClient`] / [`HttpServer`] speak HTTP over that.
//!
//! ```no_run
//! use std::net::TcpStream;
//! use tls_harness::http::session::FdSessionOps;
//! use tls_harness::http::{HttpClient, HttpRequest};
//!
//! let stream = TcpStream::connect("127.0.0.1:8080").unwrap();
//! let mut client = HttpClient::new(FdSessionOps::new(stream));
//!
//! let request = HttpRequest::builder()
//!     .uri("/")
//!     .header("Host", "127.0.0.1:8080")
//!     .build();
//! let response = client.exchange(&request).unwrap();
//! println!("{}", response.status());
//! ```

pub mod chunked;
pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod server;
pub mod session;
pub mod tls;

pub use client::HttpClient;
pub use headers::Headers;
pub use message::{HttpRequest, HttpResponse, Method, Status, Version};
pub use parser::{RequestParser, ResponseParser};
pub use server::HttpServer;
pub use session::{FdSessionOps, HttpSession, SessionOps};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Operation timed out")]
    Timeout,

    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// EOF arrived before the framing said the message was complete
    #[error("Incomplete message")]
    Incomplete,

    #[error("Malformed message: {0}")]
    Parse(String),

    #[error("Unsupported HTTP version {0:?}")]
    InvalidVersion(String),

    #[error("Unsupported request method {0:?}")]
    InvalidMethod(String),

    #[error("Bad status code {0:?}")]
    InvalidStatus(String),

    #[error("Bad header: {0}")]
    InvalidHeader(String),

    #[error("Bad chunk size line {0:?}")]
    InvalidChunkSize(String),

    #[error("Response head larger than {0} bytes")]
    HeadersTooLarge(usize),

    #[error("Protocol violation: {0}")]
    Protocol(String),
}

/// Headers past this count are dropped
pub const MAX_HEADERS: usize = 64;

/// Status line plus header block
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

pub const CRLF: &str = "\r\n";
