//! Line Protocol Implementation
//!
//! PhotonKV speaks a telnet-friendly text protocol: one command per
//! newline-terminated line, tokens separated by whitespace, and one text
//! reply per command.
//!
//! ## Modules
//!
//! - `parser`: frames lines out of a connection buffer and tokenizes them
//! - `types`: defines [`Reply`] and its wire encoding
//!
//! ## Example
//!
//! ```text
//! > SET name Ada
//! OK
//! > LRANGE letters 0 -1
//! b
//! a
//! > HGETALL user
//! "name" -> "Ada"
//! > INCR name
//! ERROR: value is not an integer or out of range
//! ```

pub mod parser;
pub mod types;

pub use parser::{tokenize, LineParser, ParseError, ParseResult, MAX_LINE_LENGTH};
pub use types::Reply;
