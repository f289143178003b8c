//! Request line extraction.
//!
//! Only the first line is inspected; the raw bytes are forwarded untouched.

use std::str;

/// `METHOD SP PATH SP VERSION` from the first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub version: &'a str,
}

impl<'a> RequestLine<'a> {
    /// Parse the first line of `buf`. Returns a description of the problem on failure.
    pub fn parse(buf: &'a [u8]) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("empty request".to_string());
        }

        let end = buf
            .windows(2)
            .position(|w| w == b"\r\n")
            .or_else(|| buf.iter().position(|&b| b == b'\n'))
            .unwrap_or(buf.len());
        let line = str::from_utf8(&buf[..end])
            .map_err(|_| "request line is not valid UTF-8".to_string())?;

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(path), Some(version), None) => Ok(Self {
                method,
                path,
                version,
            }),
            _ => Err(format!("malformed request line {line:?}")),
        }
    }
}
