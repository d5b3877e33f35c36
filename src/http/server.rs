//! Serving side of the HTTP layer
//!
//! Only the fixture servers in the test suite use it. They need to read one
//! request and reply with plain text, a redirect or a chunked body.

use super::chunked::encode_chunks;
use super::{
    Error, HttpRequest, HttpResponse, HttpSession, RequestParser, Result, SessionOps, Status,
};
use std::time::Duration;

pub struct HttpServer<S: SessionOps> {
    session: HttpSession<S>,
}

impl<S: SessionOps> HttpServer<S> {
    pub fn new(transport: S) -> Self {
        HttpServer {
            session: HttpSession::new(transport),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(Some(timeout));
    }

    pub fn receive_request(&mut self) -> Result<HttpRequest> {
        let mut parser = RequestParser::new();
        let mut chunk = [0u8; 4096];
        loop {
            match self.session.read(&mut chunk)? {
                0 => return Err(Error::ConnectionClosed),
                n => {
                    if let Some(request) = parser.parse(&chunk[..n])? {
                        return Ok(request);
                    }
                }
            }
        }
    }

    pub fn send_response(&mut self, response: &HttpResponse) -> Result<()> {
        self.session.write_all(&response.to_wire())
    }

    /// `text/plain` reply with a `Content-Length`
    pub fn send_text(&mut self, status: Status, body: &str) -> Result<()> {
        self.send_response(
            &HttpResponse::builder()
                .status(status)
                .header("Content-Type", "text/plain")
                .header("Content-Length", body.len().to_string())
                .body(body.into())
                .build(),
        )
    }

    pub fn send_ok(&mut self, body: &str) -> Result<()> {
        self.send_text(Status::OK, body)
    }

    /// `302 Found` with an empty body
    pub fn send_redirect(&mut self, location: &str) -> Result<()> {
        self.send_response(
            &HttpResponse::builder()
                .status(Status::FOUND)
                .header("Location", location)
                .header("Content-Length", "0")
                .build(),
        )
    }

    pub fn send_chunked(&mut self, status: Status, chunks: &[&[u8]]) -> Result<()> {
        self.send_response(
            &HttpResponse::builder()
                .status(status)
                .header("Transfer-Encoding", "chunked")
                .body(encode_chunks(chunks))
                .build(),
        )
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}
