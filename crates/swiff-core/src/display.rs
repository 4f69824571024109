//! Display list and timeline playback.
//!
//! Every timeline, the root movie included, is a [`SpriteTimeline`]: a frame
//! cursor over a sprite definition plus the objects currently on stage,
//! keyed by depth. Placed sprites own their own timeline, forming a tree that
//! is always driven top-down from the root.

use crate::cache::PathCache;
use crate::renderer::RenderItem;
use kurbo::Affine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use swiff_data::library::Library;
use swiff_data::model::{
    ColorTransform, Definition, DisplayAction, Frame, PlaceObject, SpriteDefinition,
};

/// Sprites nested deeper than this are placed without a timeline of their
/// own. A sprite that already encloses itself is never given one either.
pub const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpriteMode {
    /// Plays at its own pace, driven by ticks.
    #[default]
    Independent,
    /// Mirrors the parent's frame relative to where it was placed.
    ParentSynced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementOptions {
    pub mode: SpriteMode,
    pub autoplay: bool,
    pub should_loop: bool,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            mode: SpriteMode::Independent,
            autoplay: true,
            should_loop: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone)]
pub struct PlacedObject {
    pub definition: Arc<Definition>,
    pub depth: u16,
    pub transform: Affine,
    pub color_transform: ColorTransform,
    pub ratio: f32,
    pub name: Option<String>,
    pub clip_depth: Option<u16>,
    sprite: Option<SpriteTimeline>,
}

impl PlacedObject {
    pub fn character_id(&self) -> u16 {
        self.definition.id()
    }

    /// The object's own timeline, when it is a sprite.
    pub fn sprite(&self) -> Option<&SpriteTimeline> {
        self.sprite.as_ref()
    }

    pub fn sprite_mut(&mut self) -> Option<&mut SpriteTimeline> {
        self.sprite.as_mut()
    }

    fn apply(&mut self, place: &PlaceObject) {
        if let Some(matrix) = place.matrix {
            self.transform = matrix;
        }
        if let Some(cx) = place.color_transform {
            self.color_transform = cx;
        }
        if let Some(ratio) = place.ratio {
            self.ratio = ratio;
        }
        if let Some(name) = &place.name {
            self.name = Some(name.clone());
        }
        if let Some(clip) = place.clip_depth {
            self.clip_depth = Some(clip);
        }
    }
}

pub type DisplayList = BTreeMap<u16, PlacedObject>;

#[derive(Debug, Clone)]
pub struct SpriteTimeline {
    definition: Arc<Definition>,
    library: Arc<Library>,
    frame: u16,
    placed_frame: u16,
    state: PlaybackState,
    should_loop: bool,
    mode: SpriteMode,
    options: PlacementOptions,
    nesting: usize,
    /// Ids of the library sprites enclosing this timeline, itself included.
    ancestors: Vec<u16>,
    display_list: DisplayList,
}

impl SpriteTimeline {
    /// Creates a timeline at frame 0 with that frame's actions applied.
    /// Returns `None` unless `definition` is a sprite.
    ///
    /// `options` describe this timeline and are inherited by every sprite it
    /// places.
    pub fn new(
        definition: Arc<Definition>,
        library: Arc<Library>,
        options: PlacementOptions,
    ) -> Option<Self> {
        Self::nested(definition, library, options, 0, Vec::new(), 0)
    }

    fn nested(
        definition: Arc<Definition>,
        library: Arc<Library>,
        options: PlacementOptions,
        nesting: usize,
        mut ancestors: Vec<u16>,
        placed_frame: u16,
    ) -> Option<Self> {
        let id = definition.as_sprite()?.id;
        if nesting > MAX_NESTING || ancestors.contains(&id) {
            return None;
        }
        ancestors.push(id);
        Some(Self::build(
            definition,
            library,
            options,
            nesting,
            ancestors,
            placed_frame,
        ))
    }

    /// Timeline of a movie's main sprite.
    pub fn root(
        timeline: SpriteDefinition,
        library: Arc<Library>,
        options: PlacementOptions,
    ) -> Self {
        Self::build(
            Arc::new(Definition::Sprite(timeline)),
            library,
            options,
            0,
            Vec::new(),
            0,
        )
    }

    fn build(
        definition: Arc<Definition>,
        library: Arc<Library>,
        options: PlacementOptions,
        nesting: usize,
        ancestors: Vec<u16>,
        placed_frame: u16,
    ) -> Self {
        let mut timeline = Self {
            definition,
            library,
            frame: 0,
            placed_frame,
            state: if options.autoplay {
                PlaybackState::Playing
            } else {
                PlaybackState::Stopped
            },
            should_loop: options.should_loop,
            mode: options.mode,
            options,
            nesting,
            ancestors,
            display_list: DisplayList::new(),
        };
        timeline.apply_frame(0);
        timeline
    }

    fn frames(&self) -> &[Frame] {
        self.definition
            .as_sprite()
            .map(|sprite| sprite.frames.as_slice())
            .unwrap_or_default()
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn character_id(&self) -> u16 {
        self.definition.id()
    }

    pub fn frame(&self) -> u16 {
        self.frame
    }

    /// Always at least 1.
    pub fn frame_count(&self) -> u16 {
        self.frames().len().clamp(1, u16::MAX as usize) as u16
    }

    pub fn placed_frame(&self) -> u16 {
        self.placed_frame
    }

    pub fn set_placed_frame(&mut self, frame: u16) {
        self.placed_frame = frame;
    }

    pub fn should_loop(&self) -> bool {
        self.should_loop
    }

    pub fn set_should_loop(&mut self, should_loop: bool) {
        self.should_loop = should_loop;
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.state = if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        };
    }

    pub fn mode(&self) -> SpriteMode {
        self.mode
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.display_list
    }

    pub fn object(&self, depth: u16) -> Option<&PlacedObject> {
        self.display_list.get(&depth)
    }

    pub fn object_mut(&mut self, depth: u16) -> Option<&mut PlacedObject> {
        self.display_list.get_mut(&depth)
    }

    /// Index of the first frame carrying `label`.
    pub fn frame_for_label(&self, label: &str) -> Option<u16> {
        self.definition
            .as_sprite()
            .and_then(|sprite| sprite.frame_for_label(label))
    }

    /// One host tick: advances when playing, otherwise only lets
    /// independent children run.
    pub fn tick(&mut self) {
        match self.state {
            PlaybackState::Playing => self.advance_frame(),
            PlaybackState::Stopped => self.tick_children(self.frame),
        }
    }

    /// Moves to the next frame. Past the last frame a looping timeline
    /// rebuilds from frame 0 and a non-looping one stops on the last frame.
    /// Does nothing while stopped.
    pub fn advance_frame(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let last = self.frame_count() - 1;
        if self.frame < last {
            self.step(self.frame + 1);
        } else if !self.should_loop {
            self.state = PlaybackState::Stopped;
            self.tick_children(self.frame);
        } else if last == 0 {
            self.tick_children(0);
        } else {
            self.rewind();
        }
    }

    /// Seeks to `frame`, clamped into range. Moving forward steps through
    /// every intermediate frame; moving back replays from frame 0, so the
    /// result matches live playback to the same frame.
    pub fn goto_frame(&mut self, frame: u16) {
        let target = frame.min(self.frame_count() - 1);
        if target < self.frame {
            self.rewind();
        }
        for next in self.frame + 1..=target {
            self.step(next);
        }
    }

    pub fn set_frame(&mut self, frame: u16) {
        self.goto_frame(frame);
    }

    /// Follows a parent that is now on `parent_frame`.
    pub fn set_frame_from_parent(&mut self, parent_frame: u16) {
        let count = i32::from(self.frame_count());
        let local = (i32::from(parent_frame) - i32::from(self.placed_frame)).rem_euclid(count);
        let local = local as u16;
        if local == self.frame {
            self.tick_children(local);
        } else {
            self.goto_frame(local);
        }
    }

    /// Switches the sprite at `depth` to independent playback. Returns false
    /// when nothing with a timeline sits at that depth.
    pub fn promote(&mut self, depth: u16, play: bool) -> bool {
        match self.object_mut(depth).and_then(PlacedObject::sprite_mut) {
            Some(sprite) => {
                sprite.mode = SpriteMode::Independent;
                sprite.set_playing(play);
                true
            }
            None => false,
        }
    }

    fn rewind(&mut self) {
        self.display_list.clear();
        self.frame = 0;
        self.apply_frame(0);
    }

    // Children present before the frame's actions move first, so objects
    // placed by this frame start on their own frame 0.
    fn step(&mut self, next: u16) {
        self.tick_children(next);
        self.frame = next;
        self.apply_frame(next);
    }

    fn tick_children(&mut self, parent_frame: u16) {
        for object in self.display_list.values_mut() {
            if let Some(sprite) = object.sprite.as_mut() {
                match sprite.mode {
                    SpriteMode::Independent => sprite.tick(),
                    SpriteMode::ParentSynced => sprite.set_frame_from_parent(parent_frame),
                }
            }
        }
    }

    fn apply_frame(&mut self, index: u16) {
        let definition = Arc::clone(&self.definition);
        let Some(frame) = definition
            .as_sprite()
            .and_then(|sprite| sprite.frame(index))
        else {
            return;
        };
        for action in &frame.actions {
            match action {
                DisplayAction::Place(place) => self.place(place),
                DisplayAction::Remove { depth } => {
                    self.display_list.remove(depth);
                }
            }
        }
    }

    fn child_timeline(&self, definition: &Arc<Definition>) -> Option<SpriteTimeline> {
        Self::nested(
            Arc::clone(definition),
            Arc::clone(&self.library),
            self.options,
            self.nesting + 1,
            self.ancestors.clone(),
            self.frame,
        )
    }

    fn place(&mut self, place: &PlaceObject) {
        let replacement = place
            .character_id
            .and_then(|id| self.library.get(id))
            .cloned();

        if place.is_move && self.display_list.contains_key(&place.depth) {
            let needs_swap = match (&replacement, self.display_list.get(&place.depth)) {
                (Some(def), Some(existing)) => def.id() != existing.character_id(),
                _ => false,
            };
            let sprite = match (&replacement, needs_swap) {
                (Some(def), true) => Some(self.child_timeline(def)),
                _ => None,
            };
            if let Some(object) = self.display_list.get_mut(&place.depth) {
                if let (Some(def), Some(sprite)) = (replacement, sprite) {
                    object.definition = def;
                    object.sprite = sprite;
                }
                object.apply(place);
            }
            return;
        }

        // A move onto an empty depth with a character acts as a placement.
        let Some(definition) = replacement else {
            return;
        };
        let mut object = PlacedObject {
            sprite: self.child_timeline(&definition),
            definition,
            depth: place.depth,
            transform: Affine::IDENTITY,
            color_transform: ColorTransform::IDENTITY,
            ratio: 0.0,
            name: None,
            clip_depth: None,
        };
        object.apply(place);
        self.display_list.insert(place.depth, object);
    }

    /// Appends render items for every visible shape, in depth order.
    pub fn render(
        &self,
        cache: &mut PathCache,
        transform: Affine,
        color_transform: &ColorTransform,
        depth_path: &mut Vec<u16>,
        out: &mut Vec<RenderItem>,
    ) {
        for (depth, object) in &self.display_list {
            let world = transform * object.transform;
            let cx = color_transform.concat(&object.color_transform);
            depth_path.push(*depth);
            let paths = match object.definition.as_ref() {
                Definition::Shape(shape) => Some(cache.shape_paths(shape)),
                Definition::MorphShape(morph) => Some(cache.morph_paths(morph, object.ratio)),
                Definition::Sprite(_) => {
                    if let Some(sprite) = &object.sprite {
                        sprite.render(cache, world, &cx, depth_path, out);
                    }
                    None
                }
            };
            if let Some(paths) = paths {
                out.push(RenderItem {
                    depth_path: depth_path.clone(),
                    character_id: object.character_id(),
                    transform: world,
                    color_transform: cx,
                    paths,
                    clip_depth: object.clip_depth,
                });
            }
            depth_path.pop();
        }
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        DisplaySnapshot {
            frame: self.frame,
            playing: self.playing(),
            objects: self
                .display_list
                .values()
                .map(|object| ObjectSnapshot {
                    depth: object.depth,
                    character_id: object.character_id(),
                    transform: object.transform.as_coeffs(),
                    color_transform: object.color_transform,
                    ratio: object.ratio,
                    name: object.name.clone(),
                    clip_depth: object.clip_depth,
                    sprite: object.sprite.as_ref().map(|s| Box::new(s.snapshot())),
                })
                .collect(),
        }
    }
}

/// Comparable dump of a timeline's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    pub frame: u16,
    pub playing: bool,
    pub objects: Vec<ObjectSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSnapshot {
    pub depth: u16,
    pub character_id: u16,
    pub transform: [f64; 6],
    pub color_transform: ColorTransform,
    pub ratio: f32,
    pub name: Option<String>,
    pub clip_depth: Option<u16>,
    pub sprite: Option<Box<DisplaySnapshot>>,
}
