//! HTTP request/response detection.
//!
//! Looks only at the leading bytes of one payload. Messages spanning
//! several segments are not reassembled; each segment is judged alone.

use crate::domain::{HttpDirection, HttpMessage};

/// Request verbs recognised at the start of a payload
const HTTP_METHODS: [&str; 6] = ["GET ", "POST ", "HEAD ", "PUT ", "DELETE ", "OPTIONS "];

/// Prefix of every response status line
const HTTP_RESPONSE_PREFIX: &str = "HTTP/";

/// Detects HTTP requests and responses in single payloads.
pub struct HttpDetector;

impl HttpDetector {
    /// Create a new HTTP detector.
    pub fn new() -> Self {
        Self
    }

    /// Classify a payload, returning its non-empty lines on a match.
    pub fn detect(&self, payload: &[u8]) -> Option<HttpMessage> {
        let direction = Self::direction(payload)?;
        let text = String::from_utf8_lossy(payload);
        let lines = text
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Some(HttpMessage { direction, lines })
    }

    fn direction(payload: &[u8]) -> Option<HttpDirection> {
        if HTTP_METHODS
            .iter()
            .any(|method| payload.starts_with(method.as_bytes()))
        {
            Some(HttpDirection::Request)
        } else if payload.starts_with(HTTP_RESPONSE_PREFIX.as_bytes()) {
            Some(HttpDirection::Response)
        } else {
            None
        }
    }
}

impl Default for HttpDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_request() {
        let message = HttpDetector::new()
            .detect(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
            .unwrap();
        assert_eq!(message.direction, HttpDirection::Request);
        assert_eq!(message.lines, ["GET / HTTP/1.1", "Host: x"]);
    }

    #[test]
    fn test_detect_response() {
        let message = HttpDetector::new().detect(b"HTTP/1.1 200 OK\r\n\r\n").unwrap();
        assert_eq!(message.direction, HttpDirection::Response);
        assert_eq!(message.lines, ["HTTP/1.1 200 OK"]);
    }

    #[test]
    fn test_all_methods_recognised() {
        let detector = HttpDetector::new();
        for method in HTTP_METHODS {
            let payload = format!("{}/index.html HTTP/1.0\r\n", method);
            let message = detector.detect(payload.as_bytes());
            assert_eq!(message.map(|m| m.direction), Some(HttpDirection::Request));
        }
    }

    #[test]
    fn test_other_payloads_ignored() {
        let detector = HttpDetector::new();
        assert!(detector.detect(b"").is_none());
        assert!(detector.detect(b"GETX / HTTP/1.1\r\n").is_none());
        assert!(detector.detect(b"get / HTTP/1.1\r\n").is_none());
        assert!(detector.detect(b"PATCH / HTTP/1.1\r\n").is_none());
        assert!(detector.detect(b"\x16\x03\x01\x02\x00").is_none());
    }

    #[test]
    fn test_body_without_crlf_is_one_line() {
        let message = HttpDetector::new()
            .detect(b"POST /api HTTP/1.1\r\n\r\n{\"a\":1}")
            .unwrap();
        assert_eq!(message.lines, ["POST /api HTTP/1.1", "{\"a\":1}"]);
    }
}
