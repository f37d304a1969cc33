//! Streaming decoder for batch artifacts
//!
//! An artifact is a single JSON array that can be far larger than memory.
//! [`StreamingDecoder`] walks the array framing itself (brackets, commas,
//! whitespace) and hands each element to `serde_json`, so only one element
//! is ever held in memory.
//!
//! Elements must be objects, arrays, strings, or literals. A bare number
//! element is rejected: `serde_json` has to read one byte past a number to
//! find its end, and that byte would be lost to the framing.

use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while decoding an artifact
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open artifact {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("read error: {0}")]
    Io(#[from] io::Error),

    #[error("artifact is not a JSON array (starts with {found:?})")]
    NotAnArray { found: char },

    #[error("artifact is empty")]
    Empty,

    #[error("artifact truncated after {elements} elements")]
    Truncated { elements: u64 },

    #[error("expected ',' or ']' after element {index}, found {found:?}")]
    UnexpectedToken { index: u64, found: char },

    #[error("element {index} starts with {found:?}; only objects, arrays, strings and literals are supported")]
    UnsupportedElement { index: u64, found: char },

    #[error("invalid element {index}: {source}")]
    Element {
        index: u64,
        source: serde_json::Error,
    },

    #[error("unexpected data after the closing bracket")]
    TrailingData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Before the opening bracket
    Start,
    /// After the opening bracket, before any element
    First,
    /// After an element
    Rest,
    /// Closed, failed, or exhausted
    Done,
}

/// Lazily decodes the elements of a JSON array
///
/// The sequence is finite and not restartable. After the first error it
/// yields nothing more.
pub struct StreamingDecoder<R, T> {
    reader: R,
    position: Position,
    decoded: u64,
    _element: PhantomData<fn() -> T>,
}

impl<R: BufRead, T: DeserializeOwned> StreamingDecoder<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: Position::Start,
            decoded: 0,
            _element: PhantomData,
        }
    }

    /// Number of elements decoded so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Skips JSON whitespace and returns the next byte without consuming it
    fn peek_significant(&mut self) -> io::Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(None);
            }

            let skip = buf.iter().take_while(|b| is_json_whitespace(**b)).count();
            if skip < buf.len() {
                let byte = buf[skip];
                self.reader.consume(skip);
                return Ok(Some(byte));
            }

            let len = buf.len();
            self.reader.consume(len);
        }
    }

    fn advance(&mut self) -> Result<Option<T>, DecodeError> {
        loop {
            match self.position {
                Position::Done => return Ok(None),
                Position::Start => match self.peek_significant()? {
                    Some(b'[') => {
                        self.reader.consume(1);
                        self.position = Position::First;
                    }
                    Some(other) => {
                        return Err(DecodeError::NotAnArray {
                            found: other as char,
                        })
                    }
                    None => return Err(DecodeError::Empty),
                },
                Position::First => match self.peek_significant()? {
                    Some(b']') => {
                        self.reader.consume(1);
                        self.finish()?;
                        return Ok(None);
                    }
                    Some(_) => return self.element().map(Some),
                    None => return Err(self.truncated()),
                },
                Position::Rest => match self.peek_significant()? {
                    Some(b']') => {
                        self.reader.consume(1);
                        self.finish()?;
                        return Ok(None);
                    }
                    Some(b',') => {
                        self.reader.consume(1);
                        return match self.peek_significant()? {
                            Some(_) => self.element().map(Some),
                            None => Err(self.truncated()),
                        };
                    }
                    Some(other) => {
                        return Err(DecodeError::UnexpectedToken {
                            index: self.decoded,
                            found: other as char,
                        })
                    }
                    None => return Err(self.truncated()),
                },
            }
        }
    }

    /// Decodes one element; the reader sits on its first byte
    fn element(&mut self) -> Result<T, DecodeError> {
        let index = self.decoded;
        let first = self.peek_significant()?.ok_or_else(|| self.truncated())?;

        if !matches!(first, b'{' | b'[' | b'"' | b't' | b'f' | b'n') {
            return Err(DecodeError::UnsupportedElement {
                index,
                found: first as char,
            });
        }

        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let value = T::deserialize(&mut de).map_err(|source| {
            if source.is_eof() {
                DecodeError::Truncated { elements: index }
            } else {
                DecodeError::Element { index, source }
            }
        })?;

        self.decoded += 1;
        self.position = Position::Rest;
        Ok(value)
    }

    /// Checks that only whitespace follows the closing bracket
    fn finish(&mut self) -> Result<(), DecodeError> {
        self.position = Position::Done;
        if self.decoded == 0 {
            tracing::warn!("Artifact contains an empty array");
        }
        match self.peek_significant()? {
            None => Ok(()),
            Some(_) => Err(DecodeError::TrailingData),
        }
    }

    fn truncated(&self) -> DecodeError {
        DecodeError::Truncated {
            elements: self.decoded,
        }
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for StreamingDecoder<R, T> {
    type Item = Result<T, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(e) => {
                self.position = Position::Done;
                Some(Err(e))
            }
        }
    }
}

/// Opens the artifact at `path` for streaming
pub fn decode_file<T: DeserializeOwned>(
    path: &Path,
) -> Result<StreamingDecoder<BufReader<File>, T>, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Streaming records from {}", path.display());
    Ok(StreamingDecoder::new(BufReader::new(file)))
}

fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
