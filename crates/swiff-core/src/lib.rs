// swiff-core: path reconstruction, shape morphing and display-list playback on top of swiff-data
pub mod cache;
pub mod display;
pub mod graphics;
pub mod morph;
pub mod path;
pub mod renderer;

pub use cache::PathCache;
pub use display::{
    DisplayList, DisplaySnapshot, ObjectSnapshot, PlacedObject, PlacementOptions, PlaybackState,
    SpriteMode, SpriteTimeline,
};
pub use graphics::{draw, Graphics, PathRecorder};
pub use morph::{interpolate, Interpolatable};
pub use path::build_paths;
pub use renderer::*;
