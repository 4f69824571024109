use crate::errors::Result;
use serde::{Deserialize, Serialize};
use swiff_core::{PathCache, PlacementOptions, SpriteMode};

/// Host-facing playback settings. Every field has a default, so a partial
/// JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How newly placed sprites follow their parent.
    pub sprite_mode: SpriteMode,
    pub autoplay_sprites: bool,
    pub loop_sprites: bool,
    pub loop_movie: bool,
    /// Reuse built paths per shape definition.
    pub cache_shapes: bool,
    /// Ratio buckets per morph shape; 0 interpolates every ratio exactly.
    pub morph_cache_steps: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sprite_mode: SpriteMode::Independent,
            autoplay_sprites: true,
            loop_sprites: true,
            loop_movie: true,
            cache_shapes: true,
            morph_cache_steps: 0,
        }
    }
}

impl PlaybackConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn placement_options(&self) -> PlacementOptions {
        PlacementOptions {
            mode: self.sprite_mode,
            autoplay: self.autoplay_sprites,
            should_loop: self.loop_sprites,
        }
    }

    pub fn path_cache(&self) -> PathCache {
        PathCache::new(self.cache_shapes, self.morph_cache_steps)
    }
}
