//! Drawing-command output.
//!
//! [`draw`] replays a [`RenderList`] as immediate-mode commands through the
//! [`Graphics`] trait, so any rendering surface can consume it.
//! [`PathRecorder`] goes the other way: it records commands issued through the
//! same API into render paths.

use crate::renderer::{Fill, FillRule, Gradient, Paint, RenderList, RenderPath, Stroke};
use glam::Vec4;
use kurbo::{Affine, BezPath, PathEl, Point};
use swiff_data::model::{ColorTransform, LineScaleMode};

pub trait Graphics {
    fn begin_fill(&mut self, color: Vec4, rule: FillRule);
    fn begin_gradient_fill(&mut self, gradient: &Gradient, rule: FillRule);
    /// Bitmap fills paint nothing unless the surface decodes bitmaps.
    fn begin_bitmap_fill(
        &mut self,
        _bitmap_id: u16,
        _matrix: Affine,
        _repeating: bool,
        _smoothed: bool,
        rule: FillRule,
    ) {
        self.begin_fill(Vec4::ZERO, rule);
    }
    fn line_style(&mut self, stroke: &Stroke);
    fn move_to(&mut self, p: Point);
    fn line_to(&mut self, p: Point);
    fn curve_to(&mut self, control: Point, anchor: Point);
    fn end_fill(&mut self);
    /// Paints the pending stroke with the current line style.
    fn stroke(&mut self);
}

fn begin_paint(g: &mut dyn Graphics, paint: &Paint, transform: Affine, rule: FillRule) {
    match paint {
        Paint::Solid(color) => g.begin_fill(*color, rule),
        Paint::Gradient(gradient) => {
            let mut gradient = gradient.clone();
            gradient.matrix = transform * gradient.matrix;
            g.begin_gradient_fill(&gradient, rule);
        }
        Paint::Bitmap {
            bitmap_id,
            matrix,
            repeating,
            smoothed,
        } => g.begin_bitmap_fill(*bitmap_id, transform * *matrix, *repeating, *smoothed, rule),
    }
}

fn emit(g: &mut dyn Graphics, geometry: &BezPath, transform: Affine) {
    let mut start = Point::ZERO;
    for el in geometry.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                start = transform * p;
                g.move_to(start);
            }
            PathEl::LineTo(p) => g.line_to(transform * p),
            PathEl::QuadTo(c, p) => g.curve_to(transform * c, transform * p),
            PathEl::CurveTo(_, _, p) => g.line_to(transform * p),
            PathEl::ClosePath => g.line_to(start),
        }
    }
}

/// Stroke width after `transform`, honoring the line's scale mode.
pub fn scaled_stroke_width(stroke: &Stroke, transform: Affine) -> f32 {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    let factor = match stroke.scale_mode {
        LineScaleMode::Normal => (a * d - b * c).abs().sqrt(),
        LineScaleMode::Horizontal => a.hypot(b),
        LineScaleMode::Vertical => c.hypot(d),
        LineScaleMode::None => 1.0,
    };
    stroke.width * factor as f32
}

fn draw_path(g: &mut dyn Graphics, path: &RenderPath, transform: Affine, cx: &ColorTransform) {
    if let Some(fill) = &path.fill {
        begin_paint(g, &fill.paint.color_transformed(cx), transform, fill.rule);
        emit(g, &path.geometry, transform);
        g.end_fill();
    }
    if let Some(stroke) = &path.stroke {
        let mut stroke = stroke.clone();
        stroke.paint = stroke.paint.color_transformed(cx);
        stroke.width = scaled_stroke_width(&stroke, transform);
        g.line_style(&stroke);
        emit(g, &path.geometry, transform);
        g.stroke();
    }
}

/// Replays every item of `list` in order, in stage coordinates.
pub fn draw(list: &RenderList, g: &mut dyn Graphics) {
    for item in &list.items {
        for path in item.paths.iter() {
            draw_path(g, path, item.transform, &item.color_transform);
        }
    }
}

/// Records drawing commands into render paths.
///
/// Follows the classic vector drawing API: a fill opened by `begin_fill` is
/// closed back to its first point by `end_fill`, and segments drawn while a
/// line style is active are also stroked.
#[derive(Debug, Default)]
pub struct PathRecorder {
    fill: Option<Fill>,
    fill_path: BezPath,
    fill_start: Option<Point>,
    stroke: Option<Stroke>,
    stroke_path: BezPath,
    stroke_open: bool,
    pen: Point,
    paths: Vec<RenderPath>,
}

impl PathRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_stroke(&mut self) {
        if let Some(stroke) = &self.stroke {
            if self.stroke_path.elements().len() > 1 {
                self.paths.push(RenderPath {
                    geometry: std::mem::take(&mut self.stroke_path),
                    fill: None,
                    stroke: Some(stroke.clone()),
                });
            }
        }
        self.stroke_path = BezPath::new();
        self.stroke_open = false;
    }

    fn close_fill(&mut self) {
        if let (Some(fill), Some(start)) = (self.fill.take(), self.fill_start.take()) {
            if self.pen != start {
                self.fill_path.line_to(start);
            }
            if self.fill_path.elements().len() > 1 {
                self.paths.push(RenderPath {
                    geometry: std::mem::take(&mut self.fill_path),
                    fill: Some(fill),
                    stroke: None,
                });
            }
        }
        self.fill_path = BezPath::new();
    }

    fn ensure_started(&mut self) {
        if self.fill.is_some() && self.fill_start.is_none() {
            self.fill_start = Some(self.pen);
            self.fill_path.move_to(self.pen);
        }
        if self.stroke.is_some() && !self.stroke_open {
            self.stroke_path.move_to(self.pen);
            self.stroke_open = true;
        }
    }

    fn begin(&mut self, fill: Fill) {
        self.close_fill();
        self.fill = Some(fill);
    }

    /// Removes everything drawn so far and resets the styles.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn draw_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.move_to(Point::new(x, y));
        self.line_to(Point::new(x + width, y));
        self.line_to(Point::new(x + width, y + height));
        self.line_to(Point::new(x, y + height));
        self.line_to(Point::new(x, y));
    }

    /// Rectangle with quadratic corners of `ellipse_width` by `ellipse_height`.
    pub fn draw_round_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        ellipse_width: f64,
        ellipse_height: f64,
    ) {
        let rx = (ellipse_width / 2.0).clamp(0.0, width / 2.0);
        let ry = (ellipse_height / 2.0).clamp(0.0, height / 2.0);
        if rx == 0.0 || ry == 0.0 {
            self.draw_rect(x, y, width, height);
            return;
        }
        let (right, bottom) = (x + width, y + height);
        self.move_to(Point::new(x + rx, y));
        self.line_to(Point::new(right - rx, y));
        self.curve_to(Point::new(right, y), Point::new(right, y + ry));
        self.line_to(Point::new(right, bottom - ry));
        self.curve_to(Point::new(right, bottom), Point::new(right - rx, bottom));
        self.line_to(Point::new(x + rx, bottom));
        self.curve_to(Point::new(x, bottom), Point::new(x, bottom - ry));
        self.line_to(Point::new(x, y + ry));
        self.curve_to(Point::new(x, y), Point::new(x + rx, y));
    }

    pub fn draw_circle(&mut self, x: f64, y: f64, radius: f64) {
        self.draw_ellipse(x - radius, y - radius, radius * 2.0, radius * 2.0);
    }

    /// Ellipse inscribed in the given box, as eight quadratic segments.
    pub fn draw_ellipse(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let (rx, ry) = (width / 2.0, height / 2.0);
        let center = Point::new(x + rx, y + ry);
        let step = std::f64::consts::FRAC_PI_4;
        let control_scale = 1.0 / (step / 2.0).cos();
        let at = |angle: f64, scale: f64| {
            Point::new(
                center.x + rx * scale * angle.cos(),
                center.y + ry * scale * angle.sin(),
            )
        };
        let start = at(0.0, 1.0);
        self.move_to(start);
        for i in 0..8 {
            let angle = step * i as f64;
            let anchor = if i == 7 { start } else { at(angle + step, 1.0) };
            self.curve_to(at(angle + step / 2.0, control_scale), anchor);
        }
    }

    /// Closes any open fill and stroke and returns everything recorded.
    pub fn paths_to_render(&mut self) -> Vec<RenderPath> {
        self.close_fill();
        self.flush_stroke();
        self.paths.clone()
    }
}

impl Graphics for PathRecorder {
    fn begin_fill(&mut self, color: Vec4, rule: FillRule) {
        self.begin(Fill {
            paint: Paint::Solid(color),
            rule,
        });
    }

    fn begin_gradient_fill(&mut self, gradient: &Gradient, rule: FillRule) {
        self.begin(Fill {
            paint: Paint::Gradient(gradient.clone()),
            rule,
        });
    }

    fn line_style(&mut self, stroke: &Stroke) {
        self.flush_stroke();
        self.stroke = Some(stroke.clone());
    }

    fn move_to(&mut self, p: Point) {
        self.pen = p;
        if self.fill.is_some() {
            match self.fill_start {
                // Moving inside a fill closes the current contour.
                Some(start) => {
                    if self.fill_path.elements().len() > 1 {
                        self.fill_path.line_to(start);
                    }
                    self.fill_path.move_to(p);
                    self.fill_start = Some(p);
                }
                None => {
                    self.fill_start = Some(p);
                    self.fill_path.move_to(p);
                }
            }
        }
        if self.stroke.is_some() {
            self.stroke_path.move_to(p);
            self.stroke_open = true;
        }
    }

    fn line_to(&mut self, p: Point) {
        self.ensure_started();
        if self.fill.is_some() {
            self.fill_path.line_to(p);
        }
        if self.stroke.is_some() {
            self.stroke_path.line_to(p);
        }
        self.pen = p;
    }

    fn curve_to(&mut self, control: Point, anchor: Point) {
        self.ensure_started();
        if self.fill.is_some() {
            self.fill_path.quad_to(control, anchor);
        }
        if self.stroke.is_some() {
            self.stroke_path.quad_to(control, anchor);
        }
        self.pen = anchor;
    }

    fn end_fill(&mut self) {
        self.close_fill();
    }

    fn stroke(&mut self) {
        self.flush_stroke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{LineCap, LineJoin, RenderItem};
    use std::sync::Arc;
    use swiff_data::model::Segment;

    fn stroke(width: f32) -> Stroke {
        Stroke {
            paint: Paint::Solid(Vec4::new(0.0, 0.0, 0.0, 1.0)),
            width,
            start_cap: LineCap::Round,
            end_cap: LineCap::Round,
            join: LineJoin::Round,
            miter_limit: None,
            pixel_hinting: false,
            scale_mode: LineScaleMode::Normal,
            no_close: false,
        }
    }

    #[test]
    fn test_recorder_closes_fills() {
        let mut rec = PathRecorder::new();
        rec.begin_fill(Vec4::new(1.0, 0.0, 0.0, 1.0), FillRule::EvenOdd);
        rec.move_to(Point::new(0.0, 0.0));
        rec.line_to(Point::new(10.0, 0.0));
        rec.line_to(Point::new(10.0, 10.0));
        rec.end_fill();
        let paths = rec.paths_to_render();

        assert_eq!(paths.len(), 1);
        let segments = paths[0].segments();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[3], Segment::LineTo(Point::ZERO));
    }

    #[test]
    fn test_recorder_strokes_and_fills_together() {
        let mut rec = PathRecorder::new();
        rec.line_style(&stroke(2.0));
        rec.begin_fill(Vec4::ONE, FillRule::NonZero);
        rec.draw_rect(0.0, 0.0, 5.0, 5.0);
        rec.end_fill();
        let paths = rec.paths_to_render();

        assert_eq!(paths.len(), 2);
        assert!(paths[0].fill.is_some());
        assert_eq!(paths[1].stroke.as_ref().map(|s| s.width), Some(2.0));
        assert_eq!(paths[1].segments().len(), 5);
    }

    #[test]
    fn test_draw_circle_is_eight_curves() {
        let mut rec = PathRecorder::new();
        rec.begin_fill(Vec4::ONE, FillRule::NonZero);
        rec.draw_circle(10.0, 10.0, 5.0);
        let paths = rec.paths_to_render();
        let segments = paths[0].segments();

        assert_eq!(segments.len(), 9);
        assert!(segments[1..]
            .iter()
            .all(|s| matches!(s, Segment::CurveTo { .. })));
        let end = segments[8].end_point();
        assert!((end.x - 15.0).abs() < 1e-9 && (end.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_rect_falls_back_to_rect() {
        let mut rec = PathRecorder::new();
        rec.begin_fill(Vec4::ONE, FillRule::NonZero);
        rec.draw_round_rect(0.0, 0.0, 10.0, 10.0, 0.0, 0.0);
        let square = rec.paths_to_render();
        assert_eq!(square[0].segments().len(), 5);

        rec.clear();
        rec.begin_fill(Vec4::ONE, FillRule::NonZero);
        rec.draw_round_rect(0.0, 0.0, 10.0, 10.0, 4.0, 4.0);
        let rounded = rec.paths_to_render();
        let curves = rounded[0]
            .segments()
            .iter()
            .filter(|s| matches!(s, Segment::CurveTo { .. }))
            .count();
        assert_eq!(curves, 4);
    }

    /// Collects the commands `draw` issues.
    #[derive(Default)]
    struct Log(Vec<String>);

    impl Graphics for Log {
        fn begin_fill(&mut self, color: Vec4, _rule: FillRule) {
            self.0.push(format!("fill {:?}", color.to_array()));
        }
        fn begin_gradient_fill(&mut self, _gradient: &Gradient, _rule: FillRule) {
            self.0.push("gradient".into());
        }
        fn line_style(&mut self, stroke: &Stroke) {
            self.0.push(format!("line {}", stroke.width));
        }
        fn move_to(&mut self, p: Point) {
            self.0.push(format!("M {} {}", p.x, p.y));
        }
        fn line_to(&mut self, p: Point) {
            self.0.push(format!("L {} {}", p.x, p.y));
        }
        fn curve_to(&mut self, c: Point, p: Point) {
            self.0.push(format!("Q {} {} {} {}", c.x, c.y, p.x, p.y));
        }
        fn end_fill(&mut self) {
            self.0.push("end".into());
        }
        fn stroke(&mut self) {
            self.0.push("stroke".into());
        }
    }

    #[test]
    fn test_draw_applies_item_transform_and_color() {
        let mut geometry = BezPath::new();
        geometry.move_to((0.0, 0.0));
        geometry.line_to((1.0, 0.0));
        let paths = vec![RenderPath {
            geometry,
            fill: Some(Fill {
                paint: Paint::Solid(Vec4::new(1.0, 1.0, 1.0, 1.0)),
                rule: FillRule::EvenOdd,
            }),
            stroke: Some(stroke(1.0)),
        }];
        let list = RenderList {
            items: vec![RenderItem {
                depth_path: vec![1],
                character_id: 1,
                transform: Affine::new([2.0, 0.0, 0.0, 2.0, 10.0, 0.0]),
                color_transform: ColorTransform {
                    mult: [0.5, 0.5, 0.5, 1.0],
                    add: [0.0; 4],
                },
                paths: Arc::new(paths),
                clip_depth: None,
            }],
            background: None,
        };
        let mut log = Log::default();
        draw(&list, &mut log);

        assert_eq!(
            log.0,
            vec![
                "fill [0.5, 0.5, 0.5, 1.0]",
                "M 10 0",
                "L 12 0",
                "end",
                "line 2",
                "M 10 0",
                "L 12 0",
                "stroke",
            ]
        );
    }
}
