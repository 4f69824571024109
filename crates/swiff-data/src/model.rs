use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};

/// SWF coordinates are stored in twips; the model works in pixels.
pub const TWIPS_PER_PIXEL: f64 = 20.0;

pub fn twips_to_px(twips: i32) -> f64 {
    twips as f64 / TWIPS_PER_PIXEL
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Normalized `[r, g, b, a]` in 0..=1.
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }
}

/// Per-channel multiply and add terms. Multipliers are 1.0-based, add terms
/// are normalized to 0..=1 channel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTransform {
    pub mult: [f32; 4],
    pub add: [f32; 4],
}

impl ColorTransform {
    pub const IDENTITY: ColorTransform = ColorTransform {
        mult: [1.0; 4],
        add: [0.0; 4],
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Returns the transform equivalent to applying `child` first, then `self`.
    pub fn concat(&self, child: &ColorTransform) -> ColorTransform {
        let mut out = ColorTransform::IDENTITY;
        for i in 0..4 {
            out.mult[i] = self.mult[i] * child.mult[i];
            out.add[i] = self.mult[i] * child.add[i] + self.add[i];
        }
        out
    }

    pub fn apply(&self, color: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = (color[i] * self.mult[i] + self.add[i]).clamp(0.0, 1.0);
        }
        out
    }
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// Styles

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadMode {
    Pad,
    Reflect,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMode {
    Rgb,
    LinearRgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient, 0..=1.
    pub ratio: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    /// Maps the gradient square (-819.2..819.2 px) into shape space.
    pub matrix: Affine,
    pub spread: SpreadMode,
    pub interpolation: InterpolationMode,
    pub stops: Vec<GradientStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillStyle {
    Solid(Rgba),
    LinearGradient(Gradient),
    RadialGradient(Gradient),
    FocalGradient { gradient: Gradient, focal_point: f32 },
    Bitmap {
        bitmap_id: u16,
        matrix: Affine,
        repeating: bool,
        smoothed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapStyle {
    Round,
    None,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinStyle {
    Round,
    Bevel,
    Miter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineScaleMode {
    Normal,
    Horizontal,
    Vertical,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    /// Stroke width in pixels.
    pub width: f64,
    pub color: Rgba,
    pub start_cap: CapStyle,
    pub end_cap: CapStyle,
    pub join: JoinStyle,
    pub miter_limit: f32,
    pub pixel_hinting: bool,
    pub scale_mode: LineScaleMode,
    pub no_close: bool,
    /// DefineShape4 strokes may be painted with a fill style instead of `color`.
    pub fill: Option<FillStyle>,
}

impl LineStyle {
    pub fn solid(width: f64, color: Rgba) -> Self {
        Self {
            width,
            color,
            start_cap: CapStyle::Round,
            end_cap: CapStyle::Round,
            join: JoinStyle::Round,
            miter_limit: 3.0,
            pixel_hinting: false,
            scale_mode: LineScaleMode::Normal,
            no_close: false,
            fill: None,
        }
    }
}

/// Fill and line style arrays of one style group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleTable {
    pub fills: Vec<FillStyle>,
    pub lines: Vec<LineStyle>,
}

impl StyleTable {
    /// Looks up a 1-based fill index; 0 means "no fill".
    pub fn fill(&self, index: u32) -> Option<&FillStyle> {
        index.checked_sub(1).and_then(|i| self.fills.get(i as usize))
    }

    /// Looks up a 1-based line index; 0 means "no line".
    pub fn line(&self, index: u32) -> Option<&LineStyle> {
        index.checked_sub(1).and_then(|i| self.lines.get(i as usize))
    }
}

// Geometry

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    Move,
    Line,
    Curve,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    MoveTo(Point),
    LineTo(Point),
    /// Quadratic curve.
    CurveTo { control: Point, to: Point },
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        match self {
            Segment::MoveTo(_) => SegmentKind::Move,
            Segment::LineTo(_) => SegmentKind::Line,
            Segment::CurveTo { .. } => SegmentKind::Curve,
        }
    }

    pub fn end_point(&self) -> Point {
        match *self {
            Segment::MoveTo(p) | Segment::LineTo(p) => p,
            Segment::CurveTo { to, .. } => to,
        }
    }

    pub fn is_edge(&self) -> bool {
        !matches!(self, Segment::MoveTo(_))
    }
}

/// A contiguous run of edges sharing one style tuple.
///
/// Style indices are 1-based into `ShapeDefinition::styles[style_group]`,
/// 0 meaning no style. `fill0` paints the left side of the edges, `fill1`
/// the right side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePath {
    pub style_group: usize,
    pub fill0: u32,
    pub fill1: u32,
    pub line: u32,
    pub segments: Vec<Segment>,
}

impl ShapePath {
    pub fn edge_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_edge()).count()
    }

    pub fn has_edges(&self) -> bool {
        self.segments.iter().any(Segment::is_edge)
    }
}

// Definitions

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDefinition {
    pub id: u16,
    pub bounds: Rect,
    pub edge_bounds: Option<Rect>,
    /// DefineShape4 flag: fills use the non-zero winding rule.
    pub uses_fill_winding_rule: bool,
    pub styles: Vec<StyleTable>,
    pub paths: Vec<ShapePath>,
}

impl ShapeDefinition {
    pub fn fill_style(&self, group: usize, index: u32) -> Option<&FillStyle> {
        self.styles.get(group).and_then(|t| t.fill(index))
    }

    pub fn line_style(&self, group: usize, index: u32) -> Option<&LineStyle> {
        self.styles.get(group).and_then(|t| t.line(index))
    }
}

/// A start/end shape pair with point-for-point correspondence.
///
/// Both shapes have the same paths, style indices and segment kinds at every
/// index. The constructor enforces this, so morphing never has to re-derive it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MorphShapeDefinition {
    id: u16,
    start: ShapeDefinition,
    end: ShapeDefinition,
}

impl MorphShapeDefinition {
    pub fn new(
        id: u16,
        start: ShapeDefinition,
        end: ShapeDefinition,
    ) -> crate::error::Result<Self> {
        use crate::error::ParseError;

        if start.paths.len() != end.paths.len() {
            return Err(ParseError::malformed(format!(
                "morph shape {id}: {} start paths vs {} end paths",
                start.paths.len(),
                end.paths.len()
            )));
        }
        if start.styles.len() != end.styles.len() {
            return Err(ParseError::malformed(format!(
                "morph shape {id}: style group counts differ"
            )));
        }
        for (i, (s, e)) in start.paths.iter().zip(&end.paths).enumerate() {
            if (s.style_group, s.fill0, s.fill1, s.line) != (e.style_group, e.fill0, e.fill1, e.line)
            {
                return Err(ParseError::malformed(format!(
                    "morph shape {id}: path {i} style indices differ"
                )));
            }
            let same_kinds = s.segments.len() == e.segments.len()
                && s.segments
                    .iter()
                    .zip(&e.segments)
                    .all(|(a, b)| a.kind() == b.kind());
            if !same_kinds {
                return Err(ParseError::malformed(format!(
                    "morph shape {id}: path {i} segment kinds differ"
                )));
            }
        }
        Ok(Self { id, start, end })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn start(&self) -> &ShapeDefinition {
        &self.start
    }

    pub fn end(&self) -> &ShapeDefinition {
        &self.end
    }

    pub fn bounds(&self) -> Rect {
        self.start.bounds.union(self.end.bounds)
    }

    pub fn edge_bounds(&self) -> Option<Rect> {
        match (self.start.edge_bounds, self.end.edge_bounds) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceObject {
    pub depth: u16,
    pub character_id: Option<u16>,
    pub matrix: Option<Affine>,
    pub color_transform: Option<ColorTransform>,
    /// Morph ratio, 0..=1.
    pub ratio: Option<f32>,
    pub name: Option<String>,
    pub clip_depth: Option<u16>,
    /// Modifies (or replaces the character of) the object already at `depth`.
    pub is_move: bool,
}

impl PlaceObject {
    pub fn new(depth: u16, character_id: u16) -> Self {
        Self {
            depth,
            character_id: Some(character_id),
            matrix: None,
            color_transform: None,
            ratio: None,
            name: None,
            clip_depth: None,
            is_move: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DisplayAction {
    Place(PlaceObject),
    Remove { depth: u16 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub actions: Vec<DisplayAction>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteDefinition {
    pub id: u16,
    /// Union of the bounds of every character the timeline places.
    pub bounds: Rect,
    pub frames: Vec<Frame>,
}

impl SpriteDefinition {
    /// Always at least 1.
    pub fn frame_count(&self) -> u16 {
        self.frames.len().clamp(1, u16::MAX as usize) as u16
    }

    pub fn frame(&self, index: u16) -> Option<&Frame> {
        self.frames.get(index as usize)
    }

    pub fn frame_for_label(&self, label: &str) -> Option<u16> {
        self.frames
            .iter()
            .position(|f| f.label.as_deref() == Some(label))
            .map(|i| i as u16)
    }

    /// Iterates every character id placed anywhere on the timeline.
    pub fn referenced_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.frames.iter().flat_map(|f| {
            f.actions.iter().filter_map(|a| match a {
                DisplayAction::Place(p) => p.character_id,
                DisplayAction::Remove { .. } => None,
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Definition {
    Shape(ShapeDefinition),
    MorphShape(MorphShapeDefinition),
    Sprite(SpriteDefinition),
}

impl Definition {
    pub fn id(&self) -> u16 {
        match self {
            Definition::Shape(s) => s.id,
            Definition::MorphShape(m) => m.id(),
            Definition::Sprite(s) => s.id,
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Definition::Shape(s) => s.bounds,
            Definition::MorphShape(m) => m.bounds(),
            Definition::Sprite(s) => s.bounds,
        }
    }

    pub fn edge_bounds(&self) -> Option<Rect> {
        match self {
            Definition::Shape(s) => s.edge_bounds,
            Definition::MorphShape(m) => m.edge_bounds(),
            Definition::Sprite(_) => None,
        }
    }

    pub fn as_sprite(&self) -> Option<&SpriteDefinition> {
        match self {
            Definition::Sprite(s) => Some(s),
            _ => None,
        }
    }
}

/// Axis-aligned bounds of `rect` after `transform`.
pub fn transform_bounds(transform: Affine, rect: Rect) -> Rect {
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    let first = transform * corners[0];
    let mut out = Rect::from_points(first, first);
    for p in &corners[1..] {
        out = out.union_pt(transform * *p);
    }
    out
}
