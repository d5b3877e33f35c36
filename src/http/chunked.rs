//! `Transfer-Encoding: chunked` bodies
//!
//! [`ChunkedDecoder`] is fed whatever the socket produced and says how much
//! of it was used, so the response parser can keep the rest buffered.
//! [`encode_chunks`] exists for the fixture server.

use super::{Error, Result, CRLF};

/// Chunked body built from `chunks`; empty chunks are skipped so they do not
/// terminate the body early
pub fn encode_chunks(chunks: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
        body.extend_from_slice(format!("{:x}{}", chunk.len(), CRLF).as_bytes());
        body.extend_from_slice(chunk);
        body.extend_from_slice(CRLF.as_bytes());
    }
    body.extend_from_slice(format!("0{}{}", CRLF, CRLF).as_bytes());
    body
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SizeLine,
    Payload(usize),
    PayloadEnd,
    Trailers,
    Done,
}

/// Progress made by one step of the decoder
enum Step {
    Advanced(usize),
    NeedMore,
}

#[derive(Debug)]
pub struct ChunkedDecoder {
    phase: Phase,
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        ChunkedDecoder {
            phase: Phase::SizeLine,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Append decoded payload from `input` to `output`
    ///
    /// Returns how many bytes of `input` were consumed. The caller keeps the
    /// rest and presents it again, extended, on the next call.
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let mut used = 0;
        while !self.is_complete() {
            match self.step(&input[used..], output)? {
                Step::Advanced(n) => used += n,
                Step::NeedMore => break,
            }
        }
        Ok(used)
    }

    fn step(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<Step> {
        match self.phase {
            Phase::SizeLine => {
                let Some(line_end) = line_end(input) else {
                    return Ok(Step::NeedMore);
                };
                let size = chunk_size(&input[..line_end])?;
                self.phase = if size == 0 {
                    Phase::Trailers
                } else {
                    Phase::Payload(size)
                };
                Ok(Step::Advanced(line_end + 2))
            }
            Phase::Payload(left) => {
                if input.is_empty() {
                    return Ok(Step::NeedMore);
                }
                let n = left.min(input.len());
                output.extend_from_slice(&input[..n]);
                self.phase = if n == left {
                    Phase::PayloadEnd
                } else {
                    Phase::Payload(left - n)
                };
                Ok(Step::Advanced(n))
            }
            Phase::PayloadEnd => match input.get(..2) {
                None => Ok(Step::NeedMore),
                Some(b"\r\n") => {
                    self.phase = Phase::SizeLine;
                    Ok(Step::Advanced(2))
                }
                Some(_) => Err(Error::Protocol("chunk data not followed by CRLF".to_string())),
            },
            Phase::Trailers => {
                // Trailer fields are read past and dropped.
                let Some(line_end) = line_end(input) else {
                    return Ok(Step::NeedMore);
                };
                if line_end == 0 {
                    self.phase = Phase::Done;
                }
                Ok(Step::Advanced(line_end + 2))
            }
            Phase::Done => Ok(Step::NeedMore),
        }
    }
}

fn line_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF.as_bytes())
}

/// Hex size from a size line, ignoring chunk extensions
fn chunk_size(line: &[u8]) -> Result<usize> {
    let line = String::from_utf8_lossy(line);
    let digits = line.split(';').next().unwrap_or_default().trim();
    usize::from_str_radix(digits, 16).map_err(|_| Error::InvalidChunkSize(digits.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();
        decoder.decode(input, &mut output)?;
        if decoder.is_complete() {
            Ok(output)
        } else {
            Err(Error::Incomplete)
        }
    }

    #[test]
    fn test_encode_skips_empty_chunks() {
        let body = encode_chunks(&[b"Hello", b"", b", mTLS"]);
        assert_eq!(body, b"5\r\nHello\r\n6\r\n, mTLS\r\n0\r\n\r\n");
        assert_eq!(encode_chunks(&[]), b"0\r\n\r\n");
    }

    #[test]
    fn test_extension_and_trailer_ignored() {
        let input = b"5;name=value\r\nHello\r\n0\r\nX-Trailer: yes\r\n\r\n";
        assert_eq!(decode_all(input).unwrap(), b"Hello");
    }

    #[test]
    fn test_truncated_body() {
        assert!(matches!(decode_all(b"5\r\nHel"), Err(Error::Incomplete)));
    }

    #[test]
    fn test_bad_size_line() {
        assert!(matches!(
            decode_all(b"zz\r\nHello\r\n0\r\n\r\n"),
            Err(Error::InvalidChunkSize(s)) if s == "zz"
        ));
    }

    #[test]
    fn test_missing_crlf_after_payload() {
        assert!(matches!(
            decode_all(b"5\r\nHelloXX0\r\n\r\n"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_stops_after_last_chunk() {
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();
        let input = b"2\r\nok\r\n0\r\n\r\nHTTP/1.1 200 OK\r\n";

        let used = decoder.decode(input, &mut output).unwrap();
        assert!(decoder.is_complete());
        assert_eq!(&input[used..], b"HTTP/1.1 200 OK\r\n");
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let input = encode_chunks(&[b"certif", b"icate ", b"accepted"]);
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();
        let mut pending = Vec::new();

        for byte in input {
            pending.push(byte);
            let used = decoder.decode(&pending, &mut output).unwrap();
            pending.drain(..used);
        }

        assert!(decoder.is_complete());
        assert!(pending.is_empty());
        assert_eq!(output, b"certificate accepted");
    }
}
