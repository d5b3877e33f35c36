//! Fixture servers shared by the integration tests

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tls_harness::http::session::FdSessionOps;
use tls_harness::http::tls::{ClientVerify, TlsConfig, TlsInfo};
use tls_harness::http::{HttpRequest, HttpServer, SessionOps, Status};
use tls_harness::pki::TestPki;

pub const GREETING: &str = "Hello from the fixture";

/// What a fixture handler answers
pub enum Reply {
    Text(Status, String),
    Redirect(String),
    Chunked(Vec<&'static [u8]>),
    /// Keep the connection open without answering
    Stall(Duration),
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Text(Status::OK, body.to_string())
    }
}

/// Generated certificates, removed when dropped
pub struct Pki {
    pub pki: TestPki,
    _dir: TempDir,
}

impl Pki {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pki = TestPki::generate(dir.path(), &["localhost", "127.0.0.1"]).unwrap();
        Pki { pki, _dir: dir }
    }

    pub fn server_config(&self, client_verify: ClientVerify) -> TlsConfig {
        TlsConfig::server()
            .unwrap()
            .cert_and_key(self.pki.server_cert(), self.pki.server_key())
            .unwrap()
            .client_verify_ca(self.pki.root_ca())
            .unwrap()
            .client_verify(client_verify)
            .build()
            .unwrap()
    }
}

fn respond<S: SessionOps>(server: &mut HttpServer<S>, reply: Reply) {
    let _ = match reply {
        Reply::Text(status, body) => server.send_text(status, &body),
        Reply::Redirect(location) => server.send_redirect(&location),
        Reply::Chunked(chunks) => server.send_chunked(Status::OK, &chunks),
        Reply::Stall(duration) => {
            thread::sleep(duration);
            Ok(())
        }
    };
    let _ = server.close();
}

/// TLS server on 127.0.0.1 answering every request through `handler`
///
/// Connections whose handshake fails are dropped and the server keeps
/// accepting.
pub fn spawn_tls_server<F>(config: TlsConfig, handler: F) -> SocketAddr
where
    F: Fn(&HttpRequest, &TlsInfo) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let Ok(session) = config.accept(stream) else { continue };
            let info = session.info().clone();

            let mut server = HttpServer::new(session);
            let Ok(request) = server.receive_request() else { continue };
            respond(&mut server, handler(&request, &info));
        }
    });

    addr
}

/// Plain HTTP counterpart of `spawn_tls_server`
pub fn spawn_http_server<F>(handler: F) -> SocketAddr
where
    F: Fn(&HttpRequest) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let mut server = HttpServer::new(FdSessionOps::new(stream));
            let Ok(request) = server.receive_request() else { continue };
            respond(&mut server, handler(&request));
        }
    });

    addr
}

/// Server-authenticated endpoint (the 8443 role)
pub fn spawn_https_endpoint(pki: &Pki) -> SocketAddr {
    spawn_tls_server(pki.server_config(ClientVerify::None), |_, _| Reply::ok(GREETING))
}

/// Endpoint that asks for a client certificate (the 8444 role)
///
/// Like nginx with `ssl_verify_client on`: a handshake without a certificate
/// completes but the request is answered with 400.
pub fn spawn_mtls_endpoint(pki: &Pki) -> SocketAddr {
    spawn_tls_server(pki.server_config(ClientVerify::Optional), |_, info| {
        if info.peer_verified() {
            Reply::ok(GREETING)
        } else {
            Reply::Text(
                Status::BAD_REQUEST,
                "No required SSL certificate was sent".to_string(),
            )
        }
    })
}
