//! Request and response messages as they travel over a harness connection

use super::{Error, Headers, Result, CRLF};
use std::fmt;

/// The few request methods the transfer engine and the fixtures deal with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
}

/// Indexed by discriminant
const METHOD_NAMES: [(Method, &str); 3] = [
    (Method::Get, "GET"),
    (Method::Head, "HEAD"),
    (Method::Post, "POST"),
];

impl Method {
    /// Method token as sent on the request line; matching is case-sensitive
    pub fn parse(token: &str) -> Result<Self> {
        METHOD_NAMES
            .iter()
            .find(|(_, name)| *name == token)
            .map(|(method, _)| *method)
            .ok_or_else(|| Error::InvalidMethod(token.to_string()))
    }

    pub fn as_str(&self) -> &'static str {
        METHOD_NAMES[*self as usize].1
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol version on the request or status line. Only HTTP/1.x is spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Version {
    Http10,
    #[default]
    Http11,
}

impl Version {
    pub fn parse(token: &str) -> Result<Self> {
        match token.strip_prefix("HTTP/1.") {
            Some("0") => Ok(Version::Http10),
            Some("1") => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(token.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        if *self == Version::Http10 {
            "HTTP/1.0"
        } else {
            "HTTP/1.1"
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const REASONS: &[(u16, &str)] = &[
    (100, "Continue"),
    (101, "Switching Protocols"),
    (200, "OK"),
    (204, "No Content"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (495, "SSL Certificate Error"),
    (496, "SSL Certificate Required"),
    (500, "Internal Server Error"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
];

/// Three-digit status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(u16);

impl Status {
    pub const OK: Status = Status(200);
    pub const FOUND: Status = Status(302);
    pub const BAD_REQUEST: Status = Status(400);
    pub const NOT_FOUND: Status = Status(404);

    pub fn new(code: u16) -> Result<Self> {
        match code {
            100..=599 => Ok(Status(code)),
            _ => Err(Error::InvalidStatus(code.to_string())),
        }
    }

    pub fn code(&self) -> u16 {
        self.0
    }

    /// Registered reason phrase, "Unknown" for codes nginx and friends rarely send
    pub fn reason_phrase(&self) -> &'static str {
        REASONS
            .binary_search_by_key(&self.0, |(code, _)| *code)
            .map(|i| REASONS[i].1)
            .unwrap_or("Unknown")
    }

    pub fn is_informational(&self) -> bool {
        self.0 < 200
    }

    /// 1xx, 204 and 304 responses end at the blank line
    pub fn is_bodiless(&self) -> bool {
        self.is_informational() || matches!(self.0, 204 | 304)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason_phrase())
    }
}

fn encode(head: Vec<String>, body: &[u8]) -> Vec<u8> {
    let head_len: usize = head.iter().map(|l| l.len() + CRLF.len()).sum();
    let mut out = Vec::with_capacity(head_len + CRLF.len() + body.len());
    for line in head.iter().map(String::as_str).chain(std::iter::once("")) {
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(CRLF.as_bytes());
    }
    out.extend_from_slice(body);
    out
}

fn head_with(first: String, headers: &Headers) -> Vec<String> {
    std::iter::once(first)
        .chain(headers.iter().map(|(name, value)| format!("{}: {}", name, value)))
        .collect()
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: String,
    version: Version,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Starts from `GET / HTTP/1.1` with no headers
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder(HttpRequest {
            method: Method::Get,
            uri: "/".to_string(),
            version: Version::default(),
            headers: Headers::new(),
            body: Vec::new(),
        })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Request line and header lines, unterminated; what a verbose trace shows
    pub fn head_lines(&self) -> Vec<String> {
        head_with(format!("{} {} {}", self.method, self.uri, self.version), &self.headers)
    }

    pub fn to_wire(&self) -> Vec<u8> {
        encode(self.head_lines(), &self.body)
    }
}

#[derive(Debug)]
pub struct HttpRequestBuilder(HttpRequest);

impl HttpRequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.0.method = method;
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.0.uri = uri.into();
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.0.version = version;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.0.headers = headers;
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.0.body = body;
        self
    }

    pub fn build(self) -> HttpRequest {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Starts from `HTTP/1.1 200 OK`; the reason follows the status unless set
    pub fn builder() -> HttpResponseBuilder {
        HttpResponseBuilder {
            response: HttpResponse {
                version: Version::default(),
                status: Status::OK,
                reason: String::new(),
                headers: Headers::new(),
                body: Vec::new(),
            },
            custom_reason: false,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Status line and header lines, unterminated
    pub fn head_lines(&self) -> Vec<String> {
        head_with(
            format!("{} {} {}", self.version, self.status.code(), self.reason),
            &self.headers,
        )
    }

    pub fn to_wire(&self) -> Vec<u8> {
        encode(self.head_lines(), &self.body)
    }
}

#[derive(Debug)]
pub struct HttpResponseBuilder {
    response: HttpResponse,
    custom_reason: bool,
}

impl HttpResponseBuilder {
    pub fn version(mut self, version: Version) -> Self {
        self.response.version = version;
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.response.status = status;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.response.reason = reason.into();
        self.custom_reason = true;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers.insert(name, value);
        self
    }

    /// Replace every header set so far
    pub fn headers(mut self, headers: Headers) -> Self {
        self.response.headers = headers;
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.response.body = body;
        self
    }

    pub fn build(mut self) -> HttpResponse {
        if !self.custom_reason {
            self.response.reason = self.response.status.reason_phrase().to_string();
        }
        self.response
    }
}
