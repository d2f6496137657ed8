mod fmt;
mod input;
pub mod parse;
pub mod value;

pub use fmt::write_json_string;
pub use input::Input;
pub use parse::{parse_document, parse_value, Options, Visitor};

/// Error of tokenizing a JSON byte stream.
/// Offsets count bytes consumed from the underlying source.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o failure while reading input")]
    Io(#[from] std::io::Error),
    #[error("syntax error at byte {offset}: {msg}")]
    Syntax { offset: u64, msg: String },
    #[error("nesting exceeds the supported depth at byte {offset}")]
    TooDeep { offset: u64 },
    #[error("parse aborted by visitor at byte {offset}")]
    Aborted { offset: u64 },
}
