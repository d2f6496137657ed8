//! Streaming transcoder from a JSON byte stream to typed records.
//!
//! A response body is tokenized exactly once. Subtrees whose path matches a
//! subscription pattern are rewritten into schema-shaped JSON as their
//! tokens arrive, and each completed subtree is parsed into a typed record
//! and handed to the matching sink, without ever buffering the response.
//!
//! Any `std::io::Read` serves as the byte source; an HTTP-body reader over a
//! TLS stream is the intended one.
//!
//! ```
//! use transcode::{parse_stream, Pattern};
//!
//! #[derive(serde::Deserialize, Debug)]
//! struct Beat {
//!     #[serde(default)]
//!     bpm: i64,
//! }
//! impl schema::Record for Beat {
//!     const FULL_NAME: &'static str = "club.Beat";
//! }
//!
//! // Schema blobs are zero-terminated byte spans, typically embedded with
//! // `include_bytes!`. The binary reflection form of a text schema comes
//! // from `schema::Schema::to_blob`.
//! let text = r#"{ "root": "club.Beat", "objects": { "club.Beat": { "bpm": "int" } } }"#;
//! let doc = json::value::from_str(text, json::Options::lenient()).unwrap();
//! let binary = schema::build::build_schema(&doc).unwrap().to_blob();
//! let registry = schema::Registry::new(format!("{text}\0").as_bytes(), &binary).unwrap();
//!
//! let body = r#"{"bpm": 120}"#;
//! let mut beats = Vec::new();
//! parse_stream(&registry, body.as_bytes(), Pattern::root(), |beat: Beat| {
//!     beats.push(beat.bpm);
//!     true
//! })
//! .unwrap();
//! assert_eq!(beats, vec![120]);
//! ```

mod pattern;
pub use pattern::{Component, Pattern};

mod transcoder;
pub use transcoder::{parse_stream, parse_stream_with_errors, Transcoder};

/// Error of a [`parse_stream`] call.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Json(#[from] json::Error),
    #[error("one or more matched subtrees failed to transcode")]
    Transcode,
}
