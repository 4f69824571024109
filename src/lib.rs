//! # Swiff
//!
//! `swiff` decodes uncompressed SWF movies and plays their vector content.
//!
//! Parsing lives in `swiff-data`, path building, morphing and the display
//! list in `swiff-core`. This crate ties them to a [`Movie`] that a host
//! ticks and draws through the [`Graphics`] trait.

pub mod config;
pub mod errors;
pub mod movie;

pub use config::PlaybackConfig;
pub use errors::{Result, SwiffError};
pub use movie::Movie;

pub use swiff_core::{
    draw, DisplaySnapshot, Graphics, PathRecorder, RenderItem, RenderList, RenderPath,
    SpriteMode,
};
pub use swiff_data::{Header, ParseError, ParseFailure};
