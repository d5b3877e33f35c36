//! Verbose transfer trace
//!
//! curl-style lines: `* ` for connection notes, `> ` for what was sent and
//! `< ` for what was received. Everything goes through `log::info!` so the
//! trace lands wherever the logger writes.

use crate::http::tls::TlsInfo;
use crate::http::{HttpRequest, HttpResponse};
use std::fmt::Display;

const TARGET: &str = "transfer";

#[derive(Debug, Clone, Copy)]
pub(crate) struct Trace {
    enabled: bool,
}

impl Trace {
    pub(crate) fn new(enabled: bool) -> Self {
        Trace { enabled }
    }

    pub(crate) fn note(&self, msg: impl Display) {
        if self.enabled {
            log::info!(target: TARGET, "* {}", msg);
        }
    }

    pub(crate) fn request(&self, request: &HttpRequest) {
        self.emit(request_lines(request));
    }

    pub(crate) fn response(&self, response: &HttpResponse) {
        self.emit(response_lines(response));
    }

    pub(crate) fn tls(&self, info: &TlsInfo, verify_peer: bool) {
        self.emit(tls_lines(info, verify_peer));
    }

    /// Every hop sends `Connection: close`, so each one ends here
    pub(crate) fn closed(&self, host: &str) {
        self.emit(vec![closing_line(host)]);
    }

    fn emit(&self, lines: Vec<String>) {
        if self.enabled {
            for line in lines {
                log::info!(target: TARGET, "{}", line);
            }
        }
    }
}

fn request_lines(request: &HttpRequest) -> Vec<String> {
    let mut lines: Vec<String> = request
        .head_lines()
        .into_iter()
        .map(|line| format!("> {}", line))
        .collect();
    lines.push(">".to_string());
    lines
}

fn response_lines(response: &HttpResponse) -> Vec<String> {
    let mut lines: Vec<String> = response
        .head_lines()
        .into_iter()
        .map(|line| format!("< {}", line))
        .collect();
    lines.push("<".to_string());
    lines
}

fn closing_line(host: &str) -> String {
    format!("* Closing connection to {}", host)
}

fn tls_lines(info: &TlsInfo, verify_peer: bool) -> Vec<String> {
    let mut lines = vec![format!("* SSL connection using {} / {}", info.version, info.cipher)];

    lines.push(match &info.alpn {
        Some(proto) => format!("* ALPN: server accepted {}", proto),
        None => "* ALPN: server did not agree on a protocol".to_string(),
    });

    if let Some(cert) = info.peer_cert() {
        lines.push("* Server certificate:".to_string());
        lines.push(format!("*  subject: CN={}", cert.subject));
        lines.push(format!("*  start date: {}", cert.not_before));
        lines.push(format!("*  expire date: {}", cert.not_after));
        if !cert.subject_alt_names.is_empty() {
            lines.push(format!("*  subjectAltName: {}", cert.subject_alt_names.join(", ")));
        }
        lines.push(format!("*  issuer: CN={}", cert.issuer));
    }

    lines.push(if !verify_peer {
        format!(
            "*  SSL certificate verify result: {}, continuing anyway.",
            info.verify_result
        )
    } else {
        "*  SSL certificate verify ok.".to_string()
    });

    lines
}
