// swiff-data: tag stream reader, object model and definition parser for SWF movies
pub mod error;
pub mod library;
pub mod model;
pub mod movie;
pub mod parser;
pub mod reader;
pub mod tags;
#[cfg(any(test, feature = "writer"))]
pub mod writer;

pub use error::{ParseError, ParseFailure, Result};
pub use library::Library;
pub use movie::{parse_movie, parse_tags, Header, ParsedMovie};
pub use tags::{TagCode, TagRecord, TagStream};
