//! Line Protocol Parser
//!
//! Commands arrive as newline-terminated ASCII lines. TCP is a stream, so a
//! single read may hold half a line or several lines; the parser works on
//! the connection's accumulated buffer and only consumes complete lines.
//!
//! The parser returns either:
//! - `Ok(Some(tokens))` - a complete line was split off the buffer
//! - `Ok(None)` - no newline yet, wait for more data
//! - `Err(ParseError)` - the pending line grew past the size limit

use bytes::BytesMut;
use thiserror::Error;

/// Maximum length of a single command line (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors that can occur while framing lines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No newline within the allowed line length
    #[error("line too long: {size} bytes without a newline (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Frames newline-terminated lines and splits them into tokens.
///
/// # Example
///
/// ```
/// use photonkv::protocol::LineParser;
/// use bytes::BytesMut;
///
/// let parser = LineParser::new();
/// let mut buffer = BytesMut::from(&b"SET name Ada\r\nGET na"[..]);
///
/// let tokens = parser.next_line(&mut buffer).unwrap().unwrap();
/// assert_eq!(tokens, vec!["SET", "name", "Ada"]);
///
/// // The partial second line stays buffered
/// assert_eq!(parser.next_line(&mut buffer).unwrap(), None);
/// assert_eq!(&buffer[..], b"GET na");
/// ```
#[derive(Debug, Clone)]
pub struct LineParser {
    max_line: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_LENGTH)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self { max_line }
    }

    /// Splits the first complete line off `buf` and tokenizes it.
    ///
    /// A blank line yields an empty token list.
    pub fn next_line(&self, buf: &mut BytesMut) -> ParseResult<Option<Vec<String>>> {
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = buf.split_to(pos + 1);
                Ok(Some(tokenize(&line)))
            }
            None if buf.len() > self.max_line => Err(ParseError::LineTooLong {
                size: buf.len(),
                max: self.max_line,
            }),
            None => Ok(None),
        }
    }
}

/// Splits one line on ASCII whitespace. Invalid UTF-8 is replaced, not
/// rejected, so a stray byte never kills a telnet session.
pub fn tokenize(line: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(line)
        .split_whitespace()
        .map(str::to_owned)
        .collect()
}
