//! Incremental HTTP/1.1 parsers
//!
//! Bytes are pushed in as they arrive; `Ok(None)` means more are needed.
//! Both parsers share the head reader (start line and header fields with a
//! size cap) and the body reader (empty, sized, chunked or until close).

use super::chunked::ChunkedDecoder;
use super::{
    Error, Headers, HttpRequest, HttpResponse, Method, Result, Status, Version, CRLF,
    MAX_HEAD_SIZE,
};
use std::mem;

/// `METHOD SP target SP version`
pub fn parse_request_line(line: &str) -> Result<(Method, String, Version)> {
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some(method), Some(target), Some(version), None) => Ok((
            Method::parse(method)?,
            target.to_string(),
            Version::parse(version)?,
        )),
        _ => Err(Error::Parse(format!("request line {:?}", line))),
    }
}

/// `version SP 3DIGIT [SP reason]`; a missing reason gets the registered one
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let (version, rest) = line.split_once(' ').unwrap_or((line, ""));
    let version = Version::parse(version)?;

    let (digits, reason) = rest.split_once(' ').unwrap_or((rest, ""));
    if digits.is_empty() {
        return Err(Error::Parse(format!("status line {:?}", line)));
    }
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidStatus(digits.to_string()));
    }
    let status = digits
        .parse()
        .map_err(|_| Error::InvalidStatus(digits.to_string()))
        .and_then(Status::new)?;

    let reason = match reason.trim() {
        "" => status.reason_phrase().to_string(),
        given => given.to_string(),
    };
    Ok((version, status, reason))
}

/// Collects the start line and header fields of one message
#[derive(Debug, Default)]
struct HeadReader {
    start_line: Option<String>,
    headers: Headers,
    consumed: usize,
}

impl HeadReader {
    /// Take lines off `buf` until the blank line; true once it was seen.
    /// `check_start` rejects a bad start line as soon as it arrives.
    fn feed(
        &mut self,
        buf: &mut Vec<u8>,
        check_start: impl Fn(&str) -> Result<()>,
    ) -> Result<bool> {
        loop {
            let Some(end) = buf.windows(2).position(|w| w == CRLF.as_bytes()) else {
                if self.consumed + buf.len() > MAX_HEAD_SIZE {
                    return Err(Error::HeadersTooLarge(MAX_HEAD_SIZE));
                }
                return Ok(false);
            };

            self.consumed += end + 2;
            if self.consumed > MAX_HEAD_SIZE {
                return Err(Error::HeadersTooLarge(MAX_HEAD_SIZE));
            }
            let line = String::from_utf8_lossy(&buf[..end]).into_owned();
            buf.drain(..end + 2);

            if self.start_line.is_none() {
                check_start(&line)?;
                self.start_line = Some(line);
            } else if line.is_empty() {
                return Ok(true);
            } else {
                let (name, value) = Headers::parse_header_line(&line)?;
                self.headers.insert(name, value);
            }
        }
    }

    fn start_line(&self) -> &str {
        self.start_line.as_deref().unwrap_or_default()
    }

    fn has_started(&self) -> bool {
        self.consumed > 0
    }
}

/// How the body of the current message ends
#[derive(Debug)]
enum BodyReader {
    Empty,
    Sized(usize),
    Chunked(ChunkedDecoder),
    UntilClose,
}

impl BodyReader {
    fn for_headers(headers: &Headers, until_close_allowed: bool) -> Result<Self> {
        if headers.is_chunked() {
            return Ok(BodyReader::Chunked(ChunkedDecoder::new()));
        }
        Ok(match headers.content_length()? {
            Some(0) => BodyReader::Empty,
            Some(n) => BodyReader::Sized(n),
            None if until_close_allowed => BodyReader::UntilClose,
            None => BodyReader::Empty,
        })
    }

    /// Move body bytes from `buf` to `body`; true once the body is complete
    fn feed(&mut self, buf: &mut Vec<u8>, body: &mut Vec<u8>) -> Result<bool> {
        match self {
            BodyReader::Empty => Ok(true),
            BodyReader::Sized(n) if buf.len() >= *n => {
                body.extend(buf.drain(..*n));
                Ok(true)
            }
            BodyReader::Sized(_) => Ok(false),
            BodyReader::Chunked(decoder) => {
                let used = decoder.decode(buf, body)?;
                buf.drain(..used);
                Ok(decoder.is_complete())
            }
            BodyReader::UntilClose => {
                body.append(buf);
                Ok(false)
            }
        }
    }
}

#[derive(Debug)]
enum Stage {
    Head(HeadReader),
    Body {
        head: HeadReader,
        reader: BodyReader,
    },
    Done,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Head(HeadReader::default())
    }
}

/// Parses the responses a client reads off one connection
#[derive(Debug, Default)]
pub struct ResponseParser {
    stage: Stage,
    buffer: Vec<u8>,
    body: Vec<u8>,
    head_request: bool,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses to `HEAD` carry no body whatever their headers say
    pub fn set_head_request(&mut self, head: bool) {
        self.head_request = head;
    }

    /// Forget any partial response; the `HEAD` flag is kept
    pub fn reset(&mut self) {
        *self = ResponseParser {
            head_request: self.head_request,
            ..ResponseParser::default()
        };
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpResponse>> {
        self.buffer.extend_from_slice(data);
        loop {
            match mem::take(&mut self.stage) {
                Stage::Head(mut head) => {
                    let status_line = |line: &str| parse_status_line(line).map(drop);
                    if !head.feed(&mut self.buffer, status_line)? {
                        self.stage = Stage::Head(head);
                        return Ok(None);
                    }
                    let (_, status, _) = parse_status_line(head.start_line())?;
                    if status.is_informational() {
                        log::debug!("skipping interim response {}", status);
                        continue;
                    }
                    let reader = if self.head_request || status.is_bodiless() {
                        BodyReader::Empty
                    } else {
                        BodyReader::for_headers(&head.headers, true)?
                    };
                    self.stage = Stage::Body { head, reader };
                }
                Stage::Body { head, mut reader } => {
                    if reader.feed(&mut self.buffer, &mut self.body)? {
                        return self.complete(head).map(Some);
                    }
                    self.stage = Stage::Body { head, reader };
                    return Ok(None);
                }
                Stage::Done => {
                    self.stage = Stage::Done;
                    return Ok(None);
                }
            }
        }
    }

    /// The peer closed the connection
    ///
    /// Ends a close-delimited body. Any other unfinished response is
    /// `Incomplete`, and nothing received at all is `ConnectionClosed`.
    pub fn finish(&mut self) -> Result<Option<HttpResponse>> {
        match mem::take(&mut self.stage) {
            Stage::Body {
                head,
                reader: BodyReader::UntilClose,
            } => {
                self.body.append(&mut self.buffer);
                self.complete(head).map(Some)
            }
            Stage::Done => {
                self.stage = Stage::Done;
                Ok(None)
            }
            Stage::Head(head) if !head.has_started() && self.buffer.is_empty() => {
                Err(Error::ConnectionClosed)
            }
            _ => Err(Error::Incomplete),
        }
    }

    fn complete(&mut self, head: HeadReader) -> Result<HttpResponse> {
        self.stage = Stage::Done;
        let (version, status, reason) = parse_status_line(head.start_line())?;
        Ok(HttpResponse::builder()
            .version(version)
            .status(status)
            .reason(reason)
            .headers(head.headers)
            .body(mem::take(&mut self.body))
            .build())
    }
}

/// Parses one request, for the fixture server
#[derive(Debug, Default)]
pub struct RequestParser {
    stage: Stage,
    buffer: Vec<u8>,
    body: Vec<u8>,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<Option<HttpRequest>> {
        self.buffer.extend_from_slice(data);
        loop {
            match mem::take(&mut self.stage) {
                Stage::Head(mut head) => {
                    let request_line = |line: &str| parse_request_line(line).map(drop);
                    if !head.feed(&mut self.buffer, request_line)? {
                        self.stage = Stage::Head(head);
                        return Ok(None);
                    }
                    let reader = BodyReader::for_headers(&head.headers, false)?;
                    self.stage = Stage::Body { head, reader };
                }
                Stage::Body { head, mut reader } => {
                    if !reader.feed(&mut self.buffer, &mut self.body)? {
                        self.stage = Stage::Body { head, reader };
                        return Ok(None);
                    }
                    self.stage = Stage::Done;
                    let (method, target, version) = parse_request_line(head.start_line())?;
                    return Ok(Some(
                        HttpRequest::builder()
                            .method(method)
                            .uri(target)
                            .version(version)
                            .headers(head.headers)
                            .body(mem::take(&mut self.body))
                            .build(),
                    ));
                }
                Stage::Done => {
                    self.stage = Stage::Done;
                    return Ok(None);
                }
            }
        }
    }
}
