//! HTTP/1.0 response parser (C7) — spec.md §4.7.
//!
//! Operates on a byte slice already known to contain a full header block
//! (a blank line). [`header_boundary`] is the probe the RX_HEADERS read
//! loop (`transfer.rs`) uses to decide when enough bytes have arrived;
//! [`parse`] does the actual status-line/header parse once that's true.

use std::fmt;

/// Parsed HTTP/1.0 response header block.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub reason: String,
    pub content_length: u64,
    /// Offset into the input buffer of the first byte after the blank
    /// line — any bytes from there on are body bytes already read.
    pub content_start: usize,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    BadPreamble,
    BadStatusCode,
    MissingContentLength,
    MalformedContentLength,
    TruncatedHeaders,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseError(pub ParseErrorKind);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.0 {
            ParseErrorKind::BadPreamble => "missing \"HTTP/1.0 \" preamble",
            ParseErrorKind::BadStatusCode => "malformed status code",
            ParseErrorKind::MissingContentLength => "no Content-Length header",
            ParseErrorKind::MalformedContentLength => "malformed Content-Length value",
            ParseErrorKind::TruncatedHeaders => "header block has no blank-line terminator",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ParseError {}

const PREAMBLE: &[u8] = b"HTTP/1.0 ";

/// Scan for the end of the header block (`"\r\n\r\n"` or bare `"\n\n"`),
/// returning the offset of the first body byte if found.
pub fn header_boundary(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < buf.len() {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some(i + 2);
        }
        if i + 3 < buf.len() && &buf[i..i + 4] == b"\r\n\r\n" {
            return Some(i + 4);
        }
        i += 1;
    }
    None
}

/// Parse the status line and headers out of `buf`. `buf` must contain a
/// full header block (use [`header_boundary`] to confirm first); any bytes
/// from the returned `content_start` onward are body bytes already read.
pub fn parse(buf: &[u8]) -> Result<Response, ParseError> {
    let boundary = header_boundary(buf).ok_or(ParseError(ParseErrorKind::TruncatedHeaders))?;
    let header_block = &buf[..boundary];

    if !header_block.starts_with(PREAMBLE) {
        return Err(ParseError(ParseErrorKind::BadPreamble));
    }
    let rest = &header_block[PREAMBLE.len()..];

    if rest.len() < 4 || !rest[..3].iter().all(u8::is_ascii_digit) || rest[3] != b' ' {
        return Err(ParseError(ParseErrorKind::BadStatusCode));
    }
    let code: u16 = std::str::from_utf8(&rest[..3])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(ParseError(ParseErrorKind::BadStatusCode))?;

    let status_line_end = find_line_end(&rest[4..]).map(|e| e + 4).unwrap_or(rest.len());
    let reason = strip_cr(&rest[4..status_line_end]);
    let reason = String::from_utf8_lossy(reason).into_owned();

    let mut content_length: Option<u64> = None;
    let mut cursor = advance_past_line(rest, status_line_end);
    loop {
        let line_end = find_line_end(&rest[cursor..]).map(|e| e + cursor).unwrap_or(rest.len());
        let line = strip_cr(&rest[cursor..line_end]);
        if line.is_empty() {
            break;
        }
        if let Some(value) = strip_header_name(line, b"content-length:") {
            let value = trim_ascii(value);
            if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
                return Err(ParseError(ParseErrorKind::MalformedContentLength));
            }
            let text = std::str::from_utf8(value)
                .map_err(|_| ParseError(ParseErrorKind::MalformedContentLength))?;
            content_length = Some(
                text.parse()
                    .map_err(|_| ParseError(ParseErrorKind::MalformedContentLength))?,
            );
        }
        cursor = advance_past_line(rest, line_end);
        if cursor >= rest.len() {
            break;
        }
    }

    let content_length =
        content_length.ok_or(ParseError(ParseErrorKind::MissingContentLength))?;

    Ok(Response { code, reason, content_length, content_start: boundary })
}

fn find_line_end(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

fn advance_past_line(buf: &[u8], line_end_within_buf: usize) -> usize {
    if line_end_within_buf < buf.len() { line_end_within_buf + 1 } else { buf.len() }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.split_last() {
        Some((b'\r', rest)) => rest,
        _ => line,
    }
}

fn trim_ascii(buf: &[u8]) -> &[u8] {
    let start = buf.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(buf.len());
    let end = buf.iter().rposition(|b| !b.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &buf[start..end]
}

/// Case-insensitive header-name match; returns the value slice if `line`
/// starts with `name` (including the colon).
fn strip_header_name<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    if line.len() < name.len() {
        return None;
    }
    let head = &line[..name.len()];
    if head.eq_ignore_ascii_case(name) {
        Some(&line[name.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_boundary_finds_crlf_blank_line() {
        let buf = b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        assert_eq!(header_boundary(buf), Some(buf.len() - 5));
    }

    #[test]
    fn header_boundary_finds_bare_lf_blank_line() {
        let buf = b"HTTP/1.0 200 OK\nContent-Length: 5\n\nhello";
        assert_eq!(header_boundary(buf), Some(buf.len() - 5));
    }

    #[test]
    fn header_boundary_none_when_incomplete() {
        assert_eq!(header_boundary(b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n"), None);
    }

    #[test]
    fn parses_well_formed_response_with_trailing_body_bytes() {
        let buf = b"HTTP/1.0 200 OK\r\nContent-Length: 11\r\n\r\nhello world";
        let resp = parse(buf).unwrap();
        assert_eq!(resp.code, 200);
        assert_eq!(resp.reason, "OK");
        assert_eq!(resp.content_length, 11);
        assert_eq!(&buf[resp.content_start..], b"hello world");
    }

    #[test]
    fn content_length_header_name_is_case_insensitive() {
        let buf = b"HTTP/1.0 200 OK\r\ncontent-length: 3\r\n\r\nabc";
        assert_eq!(parse(buf).unwrap().content_length, 3);
    }

    #[test]
    fn rejects_http_1_1_preamble() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n";
        assert_eq!(parse(buf).unwrap_err().0, ParseErrorKind::BadPreamble);
    }

    #[test]
    fn rejects_missing_content_length() {
        let buf = b"HTTP/1.0 200 OK\r\nServer: x\r\n\r\n";
        assert_eq!(parse(buf).unwrap_err().0, ParseErrorKind::MissingContentLength);
    }

    #[test]
    fn rejects_malformed_content_length() {
        let buf = b"HTTP/1.0 200 OK\r\nContent-Length: 4kb\r\n\r\n";
        assert_eq!(parse(buf).unwrap_err().0, ParseErrorKind::MalformedContentLength);
    }

    #[test]
    fn rejects_non_numeric_status_code() {
        let buf = b"HTTP/1.0 abc OK\r\nContent-Length: 0\r\n\r\n";
        assert_eq!(parse(buf).unwrap_err().0, ParseErrorKind::BadStatusCode);
    }

    #[test]
    fn property_round_trip_for_status_and_length() {
        // P7: a constructed well-formed response parses back to the same
        // values for a range of status codes and content lengths.
        for code in [100u16, 200, 304, 404, 500, 999] {
            for len in [0u64, 1, 11, 1_000_000] {
                let text = format!("HTTP/1.0 {code} X\r\nContent-Length: {len}\r\n\r\nEXTRA");
                let resp = parse(text.as_bytes()).unwrap();
                assert_eq!(resp.code, code);
                assert_eq!(resp.content_length, len);
                assert_eq!(&text.as_bytes()[resp.content_start..], b"EXTRA");
            }
        }
    }
}
