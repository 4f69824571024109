use glam::Vec4;
use kurbo::{Affine, BezPath, PathEl};
use serde::Serialize;
use std::sync::Arc;
use swiff_data::model::{
    CapStyle, ColorTransform, FillStyle, InterpolationMode, JoinStyle, LineScaleMode, LineStyle,
    Rgba, Segment, SpreadMode,
};

/// One filled region or stroked polyline of a shape, styles resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPath {
    pub geometry: BezPath,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
}

impl RenderPath {
    /// The drawing commands of `geometry`. Paths built from shapes only
    /// contain moves, lines and quadratic curves.
    pub fn segments(&self) -> Vec<Segment> {
        self.geometry
            .elements()
            .iter()
            .filter_map(|el| match *el {
                PathEl::MoveTo(p) => Some(Segment::MoveTo(p)),
                PathEl::LineTo(p) => Some(Segment::LineTo(p)),
                PathEl::QuadTo(control, to) => Some(Segment::CurveTo { control, to }),
                PathEl::CurveTo(_, _, p) => Some(Segment::LineTo(p)),
                PathEl::ClosePath => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Fill {
    pub paint: Paint,
    pub rule: FillRule,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub paint: Paint,
    /// Width in shape space pixels.
    pub width: f32,
    pub start_cap: LineCap,
    pub end_cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: Option<f32>,
    pub pixel_hinting: bool,
    pub scale_mode: LineScaleMode,
    /// Closed contours are drawn with caps instead of a join.
    pub no_close: bool,
}

impl Stroke {
    pub fn from_line_style(line: &LineStyle) -> Self {
        let paint = match &line.fill {
            Some(fill) => Paint::from_fill_style(fill),
            None => Paint::from_rgba(line.color),
        };
        Stroke {
            paint,
            width: line.width as f32,
            start_cap: line.start_cap.into(),
            end_cap: line.end_cap.into(),
            join: line.join.into(),
            miter_limit: (line.join == JoinStyle::Miter).then_some(line.miter_limit),
            pixel_hinting: line.pixel_hinting,
            scale_mode: line.scale_mode,
            no_close: line.no_close,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

impl From<CapStyle> for LineCap {
    fn from(cap: CapStyle) -> Self {
        match cap {
            CapStyle::Round => LineCap::Round,
            CapStyle::None => LineCap::Butt,
            CapStyle::Square => LineCap::Square,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl From<JoinStyle> for LineJoin {
    fn from(join: JoinStyle) -> Self {
        match join {
            JoinStyle::Round => LineJoin::Round,
            JoinStyle::Bevel => LineJoin::Bevel,
            JoinStyle::Miter => LineJoin::Miter,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    Solid(Vec4), // R, G, B, A
    Gradient(Gradient),
    Bitmap {
        bitmap_id: u16,
        matrix: Affine,
        repeating: bool,
        smoothed: bool,
    },
}

impl Paint {
    pub fn from_rgba(color: Rgba) -> Self {
        Paint::Solid(Vec4::from_array(color.to_f32_array()))
    }

    pub fn from_fill_style(fill: &FillStyle) -> Self {
        let gradient = |kind, g: &swiff_data::model::Gradient, focal_point| {
            Paint::Gradient(Gradient {
                kind,
                stops: g
                    .stops
                    .iter()
                    .map(|s| GradientStop {
                        offset: s.ratio,
                        color: Vec4::from_array(s.color.to_f32_array()),
                    })
                    .collect(),
                matrix: g.matrix,
                spread: g.spread,
                interpolation: g.interpolation,
                focal_point,
            })
        };
        match fill {
            FillStyle::Solid(color) => Paint::from_rgba(*color),
            FillStyle::LinearGradient(g) => gradient(GradientKind::Linear, g, 0.0),
            FillStyle::RadialGradient(g) => gradient(GradientKind::Radial, g, 0.0),
            FillStyle::FocalGradient {
                gradient: g,
                focal_point,
            } => gradient(GradientKind::Focal, g, *focal_point),
            FillStyle::Bitmap {
                bitmap_id,
                matrix,
                repeating,
                smoothed,
            } => Paint::Bitmap {
                bitmap_id: *bitmap_id,
                matrix: *matrix,
                repeating: *repeating,
                smoothed: *smoothed,
            },
        }
    }

    /// Applies `cx` to every color of the paint. Bitmaps are left as is.
    pub fn color_transformed(&self, cx: &ColorTransform) -> Paint {
        if cx.is_identity() {
            return self.clone();
        }
        let apply = |c: Vec4| Vec4::from_array(cx.apply(c.to_array()));
        match self {
            Paint::Solid(c) => Paint::Solid(apply(*c)),
            Paint::Gradient(g) => {
                let mut g = g.clone();
                for stop in &mut g.stops {
                    stop.color = apply(stop.color);
                }
                Paint::Gradient(g)
            }
            Paint::Bitmap { .. } => self.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
    /// Maps the gradient square into shape space.
    pub matrix: Affine,
    pub spread: SpreadMode,
    pub interpolation: InterpolationMode,
    /// Only meaningful for `GradientKind::Focal`, -1..=1.
    pub focal_point: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GradientKind {
    Linear,
    Radial,
    Focal,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Vec4,
}

/// A placed shape or morph shape, ready to draw.
#[derive(Clone, Debug)]
pub struct RenderItem {
    /// Depths from the root timeline down to this object.
    pub depth_path: Vec<u16>,
    pub character_id: u16,
    /// Object to stage transform.
    pub transform: Affine,
    pub color_transform: ColorTransform,
    pub paths: Arc<Vec<RenderPath>>,
    /// Set when the object masks the depths up to this value.
    pub clip_depth: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct RenderList {
    pub items: Vec<RenderItem>,
    pub background: Option<Vec4>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
