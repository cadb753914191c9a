//! Reply Types
//!
//! Every command produces one [`Reply`]. On the wire a reply is plain text
//! terminated by a newline:
//!
//! | Reply | Wire form |
//! |---|---|
//! | `Nil` | `(nil)` |
//! | `Bool(true)` / `Bool(false)` | `OK` / `FAIL` |
//! | `Integer(n)` | decimal digits |
//! | `Text(s)` | `s` |
//! | `List(items)` | one item per line |
//! | `Map(pairs)` | one `"key" -> "value"` line per pair |
//! | `Error(msg)` | `ERROR: msg` |

use std::fmt;

/// Line terminator for every reply
pub const NEWLINE: u8 = b'\n';

/// Prefix of error replies
pub const ERROR_PREFIX: &str = "ERROR: ";

/// The result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Absent value
    Nil,
    /// Success flag
    Bool(bool),
    Integer(i64),
    Text(String),
    List(Vec<String>),
    Map(Vec<(String, String)>),
    /// Client-visible failure description
    Error(String),
}

impl Reply {
    /// Creates a text reply.
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Common reply for successful operations
    pub fn ok() -> Self {
        Reply::Bool(true)
    }

    /// Converts any unsigned count into an integer reply.
    pub fn count(n: impl TryInto<i64>) -> Self {
        Reply::Integer(n.try_into().unwrap_or(i64::MAX))
    }

    /// Wraps an optional value, mapping `None` to `Nil`.
    pub fn optional(value: Option<String>) -> Self {
        value.map_or(Reply::Nil, Reply::Text)
    }

    /// Returns true if this reply is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Serializes the reply into its newline-terminated wire form.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the reply into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.to_string().as_bytes());
        buf.push(NEWLINE);
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Nil => f.write_str("(nil)"),
            Reply::Bool(true) => f.write_str("OK"),
            Reply::Bool(false) => f.write_str("FAIL"),
            Reply::Integer(n) => write!(f, "{}", n),
            Reply::Text(s) => f.write_str(s),
            Reply::List(items) => f.write_str(&items.join("\n")),
            Reply::Map(pairs) => {
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "\"{}\" -> \"{}\"", key, value)?;
                }
                Ok(())
            }
            Reply::Error(msg) => write!(f, "{}{}", ERROR_PREFIX, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nil_serialize() {
        assert_eq!(Reply::Nil.serialize(), b"(nil)\n");
    }

    #[test]
    fn test_bool_serialize() {
        assert_eq!(Reply::ok().serialize(), b"OK\n");
        assert_eq!(Reply::Bool(false).serialize(), b"FAIL\n");
    }

    #[test]
    fn test_integer_serialize() {
        assert_eq!(Reply::Integer(1000).serialize(), b"1000\n");
        assert_eq!(Reply::Integer(-2).serialize(), b"-2\n");
        assert_eq!(Reply::count(3usize), Reply::Integer(3));
    }

    #[test]
    fn test_text_serialize() {
        assert_eq!(Reply::text("PONG").serialize(), b"PONG\n");
        assert_eq!(Reply::optional(None), Reply::Nil);
        assert_eq!(Reply::optional(Some("v".into())), Reply::text("v"));
    }

    #[test]
    fn test_list_serialize() {
        let reply = Reply::List(vec!["b".to_string(), "a".to_string()]);
        assert_eq!(reply.serialize(), b"b\na\n");

        // An empty list is an empty line
        assert_eq!(Reply::List(vec![]).serialize(), b"\n");
    }

    #[test]
    fn test_map_serialize() {
        let reply = Reply::Map(vec![
            ("name".to_string(), "Ada".to_string()),
            ("lang".to_string(), "en".to_string()),
        ]);
        assert_eq!(reply.serialize(), b"\"name\" -> \"Ada\"\n\"lang\" -> \"en\"\n");
    }

    #[test]
    fn test_error_serialize() {
        let reply = Reply::error("unknown command 'FOO'");
        assert!(reply.is_error());
        assert_eq!(reply.serialize(), b"ERROR: unknown command 'FOO'\n");
    }
}
