use kurbo::{Affine, Point, Rect};
use swiff_data::model::{
    FillStyle, Gradient, GradientStop, LineStyle, MorphShapeDefinition, Rgba, Segment,
    ShapeDefinition, ShapePath, StyleTable,
};

/// Linear blend between two values of the same shape.
///
/// `lerp(a, b, 0.0) == a` and `lerp(a, b, 1.0) == b` hold exactly. Values that
/// cannot be blended take `self` below 0.5 and `other` from 0.5 on.
pub trait Interpolatable: Sized + Clone {
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

/// Start below 0.5, end from 0.5 on.
pub fn discrete<T: Clone>(start: &T, end: &T, t: f32) -> T {
    if t < 0.5 {
        start.clone()
    } else {
        end.clone()
    }
}

/// Clamps a morph ratio into 0..=1, mapping NaN to 0.
pub fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}

// Two-term form so both endpoints are reproduced exactly.
fn mix(a: f64, b: f64, t: f32) -> f64 {
    let t = t as f64;
    a * (1.0 - t) + b * t
}

fn mix32(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        mix32(*self, *other, t)
    }
}

impl Interpolatable for f64 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        mix(*self, *other, t)
    }
}

impl Interpolatable for Point {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Point::new(mix(self.x, other.x, t), mix(self.y, other.y, t))
    }
}

impl Interpolatable for Rect {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Rect::new(
            mix(self.x0, other.x0, t),
            mix(self.y0, other.y0, t),
            mix(self.x1, other.x1, t),
            mix(self.y1, other.y1, t),
        )
    }
}

impl Interpolatable for Affine {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let (a, b) = (self.as_coeffs(), other.as_coeffs());
        Affine::new(std::array::from_fn(|i| mix(a[i], b[i], t)))
    }
}

impl Interpolatable for Rgba {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let channel = |a: u8, b: u8| mix32(a as f32, b as f32, t).round().clamp(0.0, 255.0) as u8;
        Rgba::new(
            channel(self.r, other.r),
            channel(self.g, other.g),
            channel(self.b, other.b),
            channel(self.a, other.a),
        )
    }
}

impl Interpolatable for GradientStop {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        GradientStop {
            ratio: mix32(self.ratio, other.ratio, t),
            color: self.color.lerp(&other.color, t),
        }
    }
}

impl<T: Interpolatable> Interpolatable for Vec<T> {
    /// Element-wise when lengths match, otherwise discrete.
    fn lerp(&self, other: &Self, t: f32) -> Self {
        if self.len() != other.len() {
            return discrete(self, other, t);
        }
        self.iter().zip(other).map(|(a, b)| a.lerp(b, t)).collect()
    }
}

impl<T: Interpolatable> Interpolatable for Option<T> {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.lerp(b, t)),
            _ => discrete(self, other, t),
        }
    }
}

impl Interpolatable for Gradient {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Gradient {
            matrix: self.matrix.lerp(&other.matrix, t),
            spread: discrete(&self.spread, &other.spread, t),
            interpolation: discrete(&self.interpolation, &other.interpolation, t),
            stops: self.stops.lerp(&other.stops, t),
        }
    }
}

impl Interpolatable for FillStyle {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        match (self, other) {
            (FillStyle::Solid(a), FillStyle::Solid(b)) => FillStyle::Solid(a.lerp(b, t)),
            (FillStyle::LinearGradient(a), FillStyle::LinearGradient(b)) => {
                FillStyle::LinearGradient(a.lerp(b, t))
            }
            (FillStyle::RadialGradient(a), FillStyle::RadialGradient(b)) => {
                FillStyle::RadialGradient(a.lerp(b, t))
            }
            (
                FillStyle::FocalGradient {
                    gradient: a,
                    focal_point: fa,
                },
                FillStyle::FocalGradient {
                    gradient: b,
                    focal_point: fb,
                },
            ) => FillStyle::FocalGradient {
                gradient: a.lerp(b, t),
                focal_point: mix32(*fa, *fb, t),
            },
            (
                FillStyle::Bitmap {
                    bitmap_id,
                    matrix: ma,
                    repeating,
                    smoothed,
                },
                FillStyle::Bitmap {
                    bitmap_id: other_id,
                    matrix: mb,
                    ..
                },
            ) if bitmap_id == other_id => FillStyle::Bitmap {
                bitmap_id: *bitmap_id,
                matrix: ma.lerp(mb, t),
                repeating: *repeating,
                smoothed: *smoothed,
            },
            _ => discrete(self, other, t),
        }
    }
}

impl Interpolatable for LineStyle {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        LineStyle {
            width: mix(self.width, other.width, t),
            color: self.color.lerp(&other.color, t),
            start_cap: discrete(&self.start_cap, &other.start_cap, t),
            end_cap: discrete(&self.end_cap, &other.end_cap, t),
            join: discrete(&self.join, &other.join, t),
            miter_limit: mix32(self.miter_limit, other.miter_limit, t),
            pixel_hinting: discrete(&self.pixel_hinting, &other.pixel_hinting, t),
            scale_mode: discrete(&self.scale_mode, &other.scale_mode, t),
            no_close: discrete(&self.no_close, &other.no_close, t),
            fill: self.fill.lerp(&other.fill, t),
        }
    }
}

impl Interpolatable for StyleTable {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        StyleTable {
            fills: self.fills.lerp(&other.fills, t),
            lines: self.lines.lerp(&other.lines, t),
        }
    }
}

impl Interpolatable for Segment {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        match (self, other) {
            (Segment::MoveTo(a), Segment::MoveTo(b)) => Segment::MoveTo(a.lerp(b, t)),
            (Segment::LineTo(a), Segment::LineTo(b)) => Segment::LineTo(a.lerp(b, t)),
            (
                Segment::CurveTo {
                    control: ca,
                    to: ta,
                },
                Segment::CurveTo {
                    control: cb,
                    to: tb,
                },
            ) => Segment::CurveTo {
                control: ca.lerp(cb, t),
                to: ta.lerp(tb, t),
            },
            _ => discrete(self, other, t),
        }
    }
}

impl Interpolatable for ShapePath {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let base = discrete(self, other, t);
        ShapePath {
            segments: self.segments.lerp(&other.segments, t),
            ..base
        }
    }
}

impl Interpolatable for ShapeDefinition {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        ShapeDefinition {
            id: self.id,
            bounds: self.bounds.lerp(&other.bounds, t),
            edge_bounds: self.edge_bounds.lerp(&other.edge_bounds, t),
            uses_fill_winding_rule: discrete(
                &self.uses_fill_winding_rule,
                &other.uses_fill_winding_rule,
                t,
            ),
            styles: self.styles.lerp(&other.styles, t),
            paths: self.paths.lerp(&other.paths, t),
        }
    }
}

/// The shape at `ratio` along a morph, ready for [`crate::path::build_paths`].
pub fn interpolate(morph: &MorphShapeDefinition, ratio: f32) -> ShapeDefinition {
    let mut shape = morph.start().lerp(morph.end(), clamp_ratio(ratio));
    shape.id = morph.id();
    shape
}
