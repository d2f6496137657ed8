use super::{parse::Options, Error};
use std::io;

// Containers deeper than this are rejected rather than risking
// exhaustion of the caller's stack.
const MAX_DEPTH: u32 = 128;

/// Input is a pull source of bytes with one byte of lookahead.
/// It tracks the count of consumed bytes for diagnostics, and the
/// current container nesting depth.
///
/// Reads are un-buffered single-byte pulls against the source; callers
/// holding an expensive descriptor should wrap it in `io::BufReader`.
pub struct Input<R> {
    source: R,
    peeked: Option<u8>,
    offset: u64,
    depth: u32,
    options: Options,
}

impl<R: io::Read> Input<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, Options::default())
    }

    pub fn with_options(source: R, options: Options) -> Self {
        Self {
            source,
            peeked: None,
            offset: 0,
            depth: 0,
            options,
        }
    }

    /// Count of bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn options(&self) -> Options {
        self.options
    }

    fn fill(&mut self) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub(crate) fn peek(&mut self) -> Result<Option<u8>, Error> {
        if self.peeked.is_none() {
            self.peeked = self.fill()?;
        }
        Ok(self.peeked)
    }

    pub(crate) fn next(&mut self) -> Result<Option<u8>, Error> {
        let byte = match self.peeked.take() {
            Some(byte) => Some(byte),
            None => self.fill()?,
        };
        if byte.is_some() {
            self.offset += 1;
        }
        Ok(byte)
    }

    /// Consume the next byte if it equals `want`.
    pub(crate) fn eat(&mut self, want: u8) -> Result<bool, Error> {
        if self.peek()? == Some(want) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn enter(&mut self) -> Result<(), Error> {
        if self.depth == MAX_DEPTH {
            return Err(Error::TooDeep {
                offset: self.offset,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth -= 1;
    }

    pub(crate) fn syntax(&self, msg: impl Into<String>) -> Error {
        Error::Syntax {
            offset: self.offset,
            msg: msg.into(),
        }
    }

    pub(crate) fn aborted(&self) -> Error {
        Error::Aborted {
            offset: self.offset,
        }
    }
}
