//! The `Movie` facade: a parsed file plus its playing root timeline.

use crate::config::PlaybackConfig;
use crate::errors::{Result, SwiffError};
use glam::Vec4;
use kurbo::Affine;
use std::sync::Arc;
use swiff_core::{DisplaySnapshot, Graphics, PathCache, RenderList, SpriteTimeline};
use swiff_data::model::{ColorTransform, Rgba};
use swiff_data::{parse_movie, Header, Library, ParseError, ParseFailure, ParsedMovie};
use tracing::{debug, instrument, warn};

#[derive(Debug)]
pub struct Movie {
    header: Header,
    library: Arc<Library>,
    background: Option<Rgba>,
    failures: Vec<ParseFailure>,
    config: PlaybackConfig,
    cache: PathCache,
    root: SpriteTimeline,
}

impl Movie {
    /// Parses an uncompressed movie and positions it on frame 0.
    ///
    /// Only an unusable header fails. Tags that could not be decoded are
    /// skipped and listed in [`Movie::failures`].
    #[instrument(level = "debug", skip(bytes, config), fields(len = bytes.len()))]
    pub fn from_bytes(bytes: &[u8], config: PlaybackConfig) -> Result<Self> {
        let parsed = parse_movie(bytes)?;
        for failure in &parsed.failures {
            match &failure.error {
                ParseError::UnsupportedTag(code) => {
                    debug!(offset = failure.offset, "skipping unsupported tag {:?}", code)
                }
                _ => warn!(
                    offset = failure.offset,
                    character_id = failure.character_id,
                    "{:?} tag dropped: {}",
                    failure.code,
                    failure.error
                ),
            }
        }
        debug!(
            version = parsed.header.version,
            frames = parsed.header.frame_count,
            definitions = parsed.library.len(),
            "movie parsed"
        );
        Ok(Self::from_parsed(parsed, config))
    }

    pub fn from_parsed(parsed: ParsedMovie, config: PlaybackConfig) -> Self {
        let library = Arc::new(parsed.library);
        let mut root = SpriteTimeline::root(
            parsed.timeline,
            Arc::clone(&library),
            config.placement_options(),
        );
        root.set_playing(true);
        root.set_should_loop(config.loop_movie);
        Self {
            header: parsed.header,
            library,
            background: parsed.background,
            failures: parsed.failures,
            cache: config.path_cache(),
            config,
            root,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn background(&self) -> Option<Rgba> {
        self.background
    }

    /// Tags skipped while parsing, ordered by offset.
    pub fn failures(&self) -> &[ParseFailure] {
        &self.failures
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn root(&self) -> &SpriteTimeline {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut SpriteTimeline {
        &mut self.root
    }

    pub fn frame(&self) -> u16 {
        self.root.frame()
    }

    pub fn frame_count(&self) -> u16 {
        self.root.frame_count()
    }

    pub fn playing(&self) -> bool {
        self.root.playing()
    }

    pub fn play(&mut self) {
        self.root.set_playing(true);
    }

    pub fn stop(&mut self) {
        self.root.set_playing(false);
    }

    pub fn tick(&mut self) {
        self.root.tick();
        debug!(frame = self.root.frame(), "tick");
    }

    /// Seeks the root timeline, clamping past the last frame.
    pub fn goto_frame(&mut self, frame: u16) {
        debug!(from = self.root.frame(), to = frame, "goto");
        self.root.goto_frame(frame);
    }

    pub fn goto_label(&mut self, label: &str) -> Result<()> {
        let frame = self
            .root
            .frame_for_label(label)
            .ok_or_else(|| SwiffError::UnknownLabel(label.to_string()))?;
        self.goto_frame(frame);
        Ok(())
    }

    /// The timeline of the sprite reached by following `depth_path` from the
    /// root. An empty path is the root itself.
    pub fn sprite_mut(&mut self, depth_path: &[u16]) -> Result<&mut SpriteTimeline> {
        let mut current = &mut self.root;
        for (i, depth) in depth_path.iter().enumerate() {
            let object = current
                .object_mut(*depth)
                .ok_or_else(|| SwiffError::ObjectNotFound(depth_path[..=i].to_vec()))?;
            current = object
                .sprite_mut()
                .ok_or_else(|| SwiffError::NotASprite(depth_path[..=i].to_vec()))?;
        }
        Ok(current)
    }

    /// Detaches a parent-synced sprite so it plays on its own.
    pub fn promote(&mut self, depth_path: &[u16], play: bool) -> Result<()> {
        let Some((&depth, parent_path)) = depth_path.split_last() else {
            return Err(SwiffError::NotASprite(Vec::new()));
        };
        let parent = self.sprite_mut(parent_path)?;
        match parent.object(depth).map(|object| object.sprite().is_some()) {
            None => Err(SwiffError::ObjectNotFound(depth_path.to_vec())),
            Some(false) => Err(SwiffError::NotASprite(depth_path.to_vec())),
            Some(true) => {
                parent.promote(depth, play);
                Ok(())
            }
        }
    }

    /// Everything visible on the current frame, in stage pixels.
    pub fn render(&mut self) -> RenderList {
        let mut list = RenderList {
            items: Vec::new(),
            background: self
                .background
                .map(|c| Vec4::from_array(c.to_f32_array())),
        };
        self.root.render(
            &mut self.cache,
            Affine::IDENTITY,
            &ColorTransform::IDENTITY,
            &mut Vec::new(),
            &mut list.items,
        );
        list
    }

    pub fn draw(&mut self, graphics: &mut dyn Graphics) {
        let list = self.render();
        swiff_core::draw(&list, graphics);
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.root.snapshot()
    }
}
