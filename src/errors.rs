use swiff_data::ParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwiffError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Unknown frame label: {0}")]
    UnknownLabel(String),
    #[error("No object at depth path {0:?}")]
    ObjectNotFound(Vec<u16>),
    #[error("Object at depth path {0:?} is not a sprite")]
    NotASprite(Vec<u16>),
    #[error("Invalid playback config: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SwiffError>;
