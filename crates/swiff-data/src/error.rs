use crate::tags::TagCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A read ran past the buffer or the declared record length, or a record
    /// holds values that cannot be reconciled (e.g. morph edge streams).
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
    /// The tag kind is recognized but this crate does not decode it.
    #[error("Unsupported tag: {0:?}")]
    UnsupportedTag(TagCode),
    #[error("Invalid reference to character {0}")]
    InvalidReference(u16),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl ParseError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ParseError::MalformedRecord(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A failure surfaced while parsing a movie. Parsing continues past it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure {
    pub code: TagCode,
    /// Byte offset of the tag header within the parsed buffer.
    pub offset: usize,
    pub character_id: Option<u16>,
    pub error: ParseError,
}
