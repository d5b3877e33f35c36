//! Request/response exchange on one connection

use super::{
    Error, HttpRequest, HttpResponse, HttpSession, Method, ResponseParser, Result, SessionOps,
};
use std::io::ErrorKind;
use std::time::{Duration, Instant};

const READ_CHUNK: usize = 16 * 1024;

pub struct HttpClient<S: SessionOps> {
    session: HttpSession<S>,
    parser: ResponseParser,
}

impl<S: SessionOps> HttpClient<S> {
    pub fn new(transport: S) -> Self {
        HttpClient {
            session: HttpSession::new(transport),
            parser: ResponseParser::new(),
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.session.set_timeout(Some(timeout));
    }

    /// Every read and write after this fails with `Error::Timeout` once
    /// `deadline` has passed
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.session.set_deadline(Some(deadline));
    }

    pub fn send_request(&mut self, request: &HttpRequest) -> Result<()> {
        self.parser.reset();
        self.parser.set_head_request(request.method() == Method::Head);
        self.session.write_all(&request.to_wire())
    }

    pub fn receive_response(&mut self) -> Result<HttpResponse> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let received = match self.session.read(&mut chunk) {
                // A TLS peer that drops the socket without close_notify.
                Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => 0,
                other => other?,
            };
            let parsed = match received {
                0 => return self.parser.finish()?.ok_or(Error::ConnectionClosed),
                n => self.parser.parse(&chunk[..n])?,
            };
            if let Some(response) = parsed {
                return Ok(response);
            }
        }
    }

    pub fn exchange(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        self.send_request(request)?;
        self.receive_response()
    }

    pub fn close(&mut self) -> Result<()> {
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::FdSessionOps;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    /// Peer that reads one request, answers with `reply` and hangs up;
    /// joining it yields the request text
    fn canned_peer(reply: &'static [u8]) -> (HttpClient<FdSessionOps>, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = vec![0u8; 1024];
            let n = stream.read(&mut request).unwrap();
            if !reply.is_empty() {
                stream.write_all(reply).unwrap();
            }
            String::from_utf8_lossy(&request[..n]).into_owned()
        });
        let client = HttpClient::new(FdSessionOps::new(TcpStream::connect(addr).unwrap()));
        (client, peer)
    }

    #[test]
    fn test_sized_response() {
        let (mut client, peer) = canned_peer(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nHello",
        );

        let request = HttpRequest::builder().header("Host", "localhost").build();
        let response = client.exchange(&request).unwrap();
        assert_eq!(response.status().code(), 200);
        assert_eq!(response.body(), b"Hello");

        let seen = peer.join().unwrap();
        assert!(seen.starts_with("GET / HTTP/1.1\r\n"));
        assert!(seen.contains("Host: localhost\r\n"));
    }

    #[test]
    fn test_body_ends_at_close() {
        let (mut client, peer) = canned_peer(b"HTTP/1.0 200 OK\r\n\r\nuntil close");

        let response = client.exchange(&HttpRequest::builder().build()).unwrap();
        assert_eq!(response.body(), b"until close");
        peer.join().unwrap();
    }

    #[test]
    fn test_head_ignores_content_length() {
        let (mut client, peer) = canned_peer(b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\n\r\n");

        let request = HttpRequest::builder().method(Method::Head).build();
        let response = client.exchange(&request).unwrap();
        assert!(response.body().is_empty());
        assert!(peer.join().unwrap().starts_with("HEAD / "));
    }

    #[test]
    fn test_hangup_without_response() {
        let (mut client, peer) = canned_peer(b"");

        let result = client.exchange(&HttpRequest::builder().build());
        assert!(matches!(result, Err(Error::ConnectionClosed) | Err(Error::Io(_))));
        peer.join().unwrap();
    }
}
