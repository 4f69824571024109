//! Decodes definition and display-control tag bodies into the object model.

use crate::error::{ParseError, Result};
use crate::model::{
    twips_to_px, CapStyle, Definition, DisplayAction, FillStyle, Frame, Gradient, GradientStop,
    InterpolationMode, JoinStyle, LineScaleMode, LineStyle, MorphShapeDefinition, PlaceObject,
    Rgba, Segment, ShapeDefinition, ShapePath, SpreadMode, SpriteDefinition, StyleTable,
};
use crate::reader::Reader;
use crate::tags::{TagCode, TagRecord, TagStream};
use kurbo::{Point, Rect};

/// Decodes a top-level tag body.
///
/// Returns `Ok(None)` for tags that are not character definitions.
/// Definition kinds this crate does not decode fail with `UnsupportedTag`.
pub fn parse_tag(record: &TagRecord, body: &[u8]) -> Result<Option<Definition>> {
    let definition = match record.code {
        TagCode::DefineShape => Definition::Shape(parse_shape(body, 1)?),
        TagCode::DefineShape2 => Definition::Shape(parse_shape(body, 2)?),
        TagCode::DefineShape3 => Definition::Shape(parse_shape(body, 3)?),
        TagCode::DefineShape4 => Definition::Shape(parse_shape(body, 4)?),
        TagCode::DefineMorphShape => Definition::MorphShape(parse_morph_shape(body, 1)?),
        TagCode::DefineMorphShape2 => Definition::MorphShape(parse_morph_shape(body, 2)?),
        TagCode::DefineSprite => Definition::Sprite(parse_sprite(body, record.body_offset)?),
        code if code.is_definition() => return Err(ParseError::UnsupportedTag(code)),
        _ => return Ok(None),
    };
    Ok(Some(definition))
}

// Styles

fn read_color(r: &mut Reader, version: u8) -> Result<Rgba> {
    if version >= 3 {
        r.read_rgba()
    } else {
        r.read_rgb()
    }
}

fn read_array_count(r: &mut Reader, version: u8) -> Result<usize> {
    let count = r.read_u8()?;
    if count == 0xFF && version >= 2 {
        Ok(r.read_u16()? as usize)
    } else {
        Ok(count as usize)
    }
}

/// Spread, interpolation and stop count packed in one byte.
fn read_gradient_header(r: &mut Reader) -> Result<(SpreadMode, InterpolationMode, usize)> {
    let spread = match r.read_ubits(2)? {
        1 => SpreadMode::Reflect,
        2 => SpreadMode::Repeat,
        _ => SpreadMode::Pad,
    };
    let interpolation = match r.read_ubits(2)? {
        1 => InterpolationMode::LinearRgb,
        _ => InterpolationMode::Rgb,
    };
    let count = r.read_ubits(4)? as usize;
    Ok((spread, interpolation, count))
}

fn read_gradient(r: &mut Reader, version: u8) -> Result<Gradient> {
    let matrix = r.read_matrix()?;
    let (spread, interpolation, count) = read_gradient_header(r)?;
    let mut stops = Vec::with_capacity(count);
    for _ in 0..count {
        let ratio = r.read_u8()? as f32 / 255.0;
        let color = read_color(r, version)?;
        stops.push(GradientStop { ratio, color });
    }
    Ok(Gradient {
        matrix,
        spread,
        interpolation,
        stops,
    })
}

fn bitmap_flags(kind: u8) -> (bool, bool) {
    // (repeating, smoothed)
    (kind & 0x01 == 0, kind & 0x02 == 0)
}

fn read_fill_style(r: &mut Reader, version: u8) -> Result<FillStyle> {
    let kind = r.read_u8()?;
    let fill = match kind {
        0x00 => FillStyle::Solid(read_color(r, version)?),
        0x10 => FillStyle::LinearGradient(read_gradient(r, version)?),
        0x12 => FillStyle::RadialGradient(read_gradient(r, version)?),
        0x13 => {
            let gradient = read_gradient(r, version)?;
            let focal_point = r.read_fixed8()?;
            FillStyle::FocalGradient {
                gradient,
                focal_point,
            }
        }
        0x40..=0x43 => {
            let bitmap_id = r.read_u16()?;
            let matrix = r.read_matrix()?;
            let (repeating, smoothed) = bitmap_flags(kind);
            FillStyle::Bitmap {
                bitmap_id,
                matrix,
                repeating,
                smoothed,
            }
        }
        other => {
            return Err(ParseError::malformed(format!(
                "unknown fill style type {other:#04x}"
            )))
        }
    };
    Ok(fill)
}

fn cap_style(bits: u32) -> CapStyle {
    match bits {
        1 => CapStyle::None,
        2 => CapStyle::Square,
        _ => CapStyle::Round,
    }
}

struct LineFlags {
    start_cap: CapStyle,
    end_cap: CapStyle,
    join: JoinStyle,
    miter_limit: f32,
    has_fill: bool,
    pixel_hinting: bool,
    scale_mode: LineScaleMode,
    no_close: bool,
}

/// The two flag bytes of LINESTYLE2 and its optional miter limit.
fn read_line_flags(r: &mut Reader) -> Result<LineFlags> {
    let start_cap = cap_style(r.read_ubits(2)?);
    let join_bits = r.read_ubits(2)?;
    let has_fill = r.read_bit()?;
    let no_h_scale = r.read_bit()?;
    let no_v_scale = r.read_bit()?;
    let pixel_hinting = r.read_bit()?;
    r.read_ubits(5)?;
    let no_close = r.read_bit()?;
    let end_cap = cap_style(r.read_ubits(2)?);
    let (join, miter_limit) = match join_bits {
        1 => (JoinStyle::Bevel, 3.0),
        2 => (JoinStyle::Miter, r.read_fixed8()?),
        _ => (JoinStyle::Round, 3.0),
    };
    let scale_mode = match (no_h_scale, no_v_scale) {
        (true, true) => LineScaleMode::None,
        (true, false) => LineScaleMode::Vertical,
        (false, true) => LineScaleMode::Horizontal,
        (false, false) => LineScaleMode::Normal,
    };
    Ok(LineFlags {
        start_cap,
        end_cap,
        join,
        miter_limit,
        has_fill,
        pixel_hinting,
        scale_mode,
        no_close,
    })
}

impl LineFlags {
    fn into_style(self, width: f64, color: Rgba, fill: Option<FillStyle>) -> LineStyle {
        LineStyle {
            width,
            color,
            start_cap: self.start_cap,
            end_cap: self.end_cap,
            join: self.join,
            miter_limit: self.miter_limit,
            pixel_hinting: self.pixel_hinting,
            scale_mode: self.scale_mode,
            no_close: self.no_close,
            fill,
        }
    }
}

fn read_line_style(r: &mut Reader, version: u8) -> Result<LineStyle> {
    let width = twips_to_px(r.read_u16()? as i32);
    if version < 4 {
        return Ok(LineStyle::solid(width, read_color(r, version)?));
    }
    let flags = read_line_flags(r)?;
    if flags.has_fill {
        let fill = read_fill_style(r, version)?;
        let color = match &fill {
            FillStyle::Solid(c) => *c,
            _ => Rgba::BLACK,
        };
        Ok(flags.into_style(width, color, Some(fill)))
    } else {
        let color = r.read_rgba()?;
        Ok(flags.into_style(width, color, None))
    }
}

fn read_style_table(r: &mut Reader, version: u8) -> Result<StyleTable> {
    let fill_count = read_array_count(r, version)?;
    let mut fills = Vec::with_capacity(fill_count);
    for _ in 0..fill_count {
        fills.push(read_fill_style(r, version)?);
    }
    let line_count = read_array_count(r, version)?;
    let mut lines = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        lines.push(read_line_style(r, version)?);
    }
    Ok(StyleTable { fills, lines })
}

// Shape records

/// Accumulates SHAPERECORDs into style-homogeneous paths.
struct PathAccumulator {
    style_group: usize,
    fill0: u32,
    fill1: u32,
    line: u32,
    pen: (i32, i32),
    segments: Vec<Segment>,
    paths: Vec<ShapePath>,
}

impl PathAccumulator {
    fn new() -> Self {
        Self {
            style_group: 0,
            fill0: 0,
            fill1: 0,
            line: 0,
            pen: (0, 0),
            segments: Vec::new(),
            paths: Vec::new(),
        }
    }

    fn pen_point(&self) -> Point {
        Point::new(twips_to_px(self.pen.0), twips_to_px(self.pen.1))
    }

    fn flush(&mut self) {
        while matches!(self.segments.last(), Some(Segment::MoveTo(_))) {
            self.segments.pop();
        }
        let segments = std::mem::take(&mut self.segments);
        if segments.iter().any(Segment::is_edge) {
            self.paths.push(ShapePath {
                style_group: self.style_group,
                fill0: self.fill0,
                fill1: self.fill1,
                line: self.line,
                segments,
            });
        }
    }

    fn move_to(&mut self, x: i32, y: i32) {
        self.pen = (x, y);
        if self.segments.is_empty() {
            return;
        }
        let p = self.pen_point();
        match self.segments.last_mut() {
            Some(Segment::MoveTo(last)) => *last = p,
            _ => self.segments.push(Segment::MoveTo(p)),
        }
    }

    fn begin_edge(&mut self) {
        if self.segments.is_empty() {
            let p = self.pen_point();
            self.segments.push(Segment::MoveTo(p));
        }
    }

    fn line(&mut self, dx: i32, dy: i32) -> Result<()> {
        let to = pen_offset(self.pen, dx, dy)?;
        self.begin_edge();
        self.pen = to;
        let to = self.pen_point();
        self.segments.push(Segment::LineTo(to));
        Ok(())
    }

    fn curve(&mut self, cdx: i32, cdy: i32, adx: i32, ady: i32) -> Result<()> {
        let c = pen_offset(self.pen, cdx, cdy)?;
        let to = pen_offset(c, adx, ady)?;
        self.begin_edge();
        self.pen = to;
        let control = Point::new(twips_to_px(c.0), twips_to_px(c.1));
        let to = self.pen_point();
        self.segments.push(Segment::CurveTo { control, to });
        Ok(())
    }
}

fn pen_offset(from: (i32, i32), dx: i32, dy: i32) -> Result<(i32, i32)> {
    match (from.0.checked_add(dx), from.1.checked_add(dy)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ParseError::malformed(
            "edge moves the pen outside the twip coordinate range",
        )),
    }
}

/// Reads SHAPERECORDs up to the end record. `styles` receives any new style
/// groups; `None` rejects new-styles records (morph edge streams).
fn read_shape_records(
    r: &mut Reader,
    mut styles: Option<&mut Vec<StyleTable>>,
    version: u8,
) -> Result<Vec<ShapePath>> {
    r.byte_align();
    let mut fill_bits = r.read_ubits(4)?;
    let mut line_bits = r.read_ubits(4)?;
    let mut acc = PathAccumulator::new();

    loop {
        let is_edge = r.read_bit()?;
        if !is_edge {
            let flags = r.read_ubits(5)?;
            if flags == 0 {
                break;
            }
            let has_new_styles = flags & 0x10 != 0;
            let has_line = flags & 0x08 != 0;
            let has_fill1 = flags & 0x04 != 0;
            let has_fill0 = flags & 0x02 != 0;
            let has_move = flags & 0x01 != 0;

            let move_to = if has_move {
                let n = r.read_ubits(5)?;
                Some((r.read_sbits(n)?, r.read_sbits(n)?))
            } else {
                None
            };
            let fill0 = if has_fill0 { Some(r.read_ubits(fill_bits)?) } else { None };
            let fill1 = if has_fill1 { Some(r.read_ubits(fill_bits)?) } else { None };
            let line = if has_line { Some(r.read_ubits(line_bits)?) } else { None };

            let style_changed = has_new_styles || has_fill0 || has_fill1 || has_line;
            if style_changed {
                acc.flush();
            }
            if has_new_styles {
                let tables = styles.as_deref_mut().ok_or_else(|| {
                    ParseError::malformed("new styles record in a morph edge stream")
                })?;
                tables.push(read_style_table(r, version)?);
                acc.style_group = tables.len() - 1;
                acc.fill0 = 0;
                acc.fill1 = 0;
                acc.line = 0;
                fill_bits = r.read_ubits(4)?;
                line_bits = r.read_ubits(4)?;
            }
            if let Some(f) = fill0 {
                acc.fill0 = f;
            }
            if let Some(f) = fill1 {
                acc.fill1 = f;
            }
            if let Some(l) = line {
                acc.line = l;
            }
            if let Some((x, y)) = move_to {
                if style_changed {
                    acc.pen = (x, y);
                } else {
                    acc.move_to(x, y);
                }
            }
        } else if r.read_bit()? {
            let n = r.read_ubits(4)? + 2;
            let (dx, dy) = if r.read_bit()? {
                (r.read_sbits(n)?, r.read_sbits(n)?)
            } else if r.read_bit()? {
                (0, r.read_sbits(n)?)
            } else {
                (r.read_sbits(n)?, 0)
            };
            acc.line(dx, dy)?;
        } else {
            let n = r.read_ubits(4)? + 2;
            let cdx = r.read_sbits(n)?;
            let cdy = r.read_sbits(n)?;
            let adx = r.read_sbits(n)?;
            let ady = r.read_sbits(n)?;
            acc.curve(cdx, cdy, adx, ady)?;
        }
    }
    acc.flush();
    Ok(acc.paths)
}

fn parse_shape(body: &[u8], version: u8) -> Result<ShapeDefinition> {
    let mut r = Reader::new(body);
    let id = r.read_u16()?;
    let bounds = r.read_rect()?;
    let mut edge_bounds = None;
    let mut uses_fill_winding_rule = false;
    if version >= 4 {
        edge_bounds = Some(r.read_rect()?);
        let flags = r.read_u8()?;
        uses_fill_winding_rule = flags & 0x04 != 0;
    }
    let mut styles = vec![read_style_table(&mut r, version)?];
    let paths = read_shape_records(&mut r, Some(&mut styles), version)?;
    Ok(ShapeDefinition {
        id,
        bounds,
        edge_bounds,
        uses_fill_winding_rule,
        styles,
        paths,
    })
}

// Morph shapes

fn read_morph_gradient(r: &mut Reader) -> Result<(Gradient, Gradient)> {
    let start_matrix = r.read_matrix()?;
    let end_matrix = r.read_matrix()?;
    let (spread, interpolation, count) = read_gradient_header(r)?;
    let mut start_stops = Vec::with_capacity(count);
    let mut end_stops = Vec::with_capacity(count);
    for _ in 0..count {
        let ratio = r.read_u8()? as f32 / 255.0;
        let color = r.read_rgba()?;
        start_stops.push(GradientStop { ratio, color });
        let ratio = r.read_u8()? as f32 / 255.0;
        let color = r.read_rgba()?;
        end_stops.push(GradientStop { ratio, color });
    }
    let gradient = |matrix, stops| Gradient {
        matrix,
        spread,
        interpolation,
        stops,
    };
    Ok((
        gradient(start_matrix, start_stops),
        gradient(end_matrix, end_stops),
    ))
}

fn read_morph_fill_style(r: &mut Reader) -> Result<(FillStyle, FillStyle)> {
    let kind = r.read_u8()?;
    let pair = match kind {
        0x00 => (
            FillStyle::Solid(r.read_rgba()?),
            FillStyle::Solid(r.read_rgba()?),
        ),
        0x10 => {
            let (s, e) = read_morph_gradient(r)?;
            (FillStyle::LinearGradient(s), FillStyle::LinearGradient(e))
        }
        0x12 => {
            let (s, e) = read_morph_gradient(r)?;
            (FillStyle::RadialGradient(s), FillStyle::RadialGradient(e))
        }
        0x13 => {
            let (s, e) = read_morph_gradient(r)?;
            let start_focal = r.read_fixed8()?;
            let end_focal = r.read_fixed8()?;
            (
                FillStyle::FocalGradient {
                    gradient: s,
                    focal_point: start_focal,
                },
                FillStyle::FocalGradient {
                    gradient: e,
                    focal_point: end_focal,
                },
            )
        }
        0x40..=0x43 => {
            let bitmap_id = r.read_u16()?;
            let start_matrix = r.read_matrix()?;
            let end_matrix = r.read_matrix()?;
            let (repeating, smoothed) = bitmap_flags(kind);
            let bitmap = |matrix| FillStyle::Bitmap {
                bitmap_id,
                matrix,
                repeating,
                smoothed,
            };
            (bitmap(start_matrix), bitmap(end_matrix))
        }
        other => {
            return Err(ParseError::malformed(format!(
                "unknown morph fill style type {other:#04x}"
            )))
        }
    };
    Ok(pair)
}

fn read_morph_line_style(r: &mut Reader, version: u8) -> Result<(LineStyle, LineStyle)> {
    let start_width = twips_to_px(r.read_u16()? as i32);
    let end_width = twips_to_px(r.read_u16()? as i32);
    if version < 2 {
        let start = LineStyle::solid(start_width, r.read_rgba()?);
        let end = LineStyle::solid(end_width, r.read_rgba()?);
        return Ok((start, end));
    }
    let flags = read_line_flags(r)?;
    let (start_fill, end_fill) = if flags.has_fill {
        let (s, e) = read_morph_fill_style(r)?;
        (Some(s), Some(e))
    } else {
        (None, None)
    };
    let (start_color, end_color) = if flags.has_fill {
        let color = |f: &Option<FillStyle>| match f {
            Some(FillStyle::Solid(c)) => *c,
            _ => Rgba::BLACK,
        };
        (color(&start_fill), color(&end_fill))
    } else {
        (r.read_rgba()?, r.read_rgba()?)
    };
    let start = LineStyle {
        width: start_width,
        color: start_color,
        start_cap: flags.start_cap,
        end_cap: flags.end_cap,
        join: flags.join,
        miter_limit: flags.miter_limit,
        pixel_hinting: flags.pixel_hinting,
        scale_mode: flags.scale_mode,
        no_close: flags.no_close,
        fill: start_fill,
    };
    let end = flags.into_style(end_width, end_color, end_fill);
    Ok((start, end))
}

/// One edge of a flattened morph edge stream.
#[derive(Debug, Clone, Copy)]
struct MorphEdge {
    from: Point,
    control: Option<Point>,
    to: Point,
    /// Index of the start-shape path the edge belongs to.
    path: usize,
}

impl MorphEdge {
    fn length(&self) -> f64 {
        match self.control {
            Some(c) => (c - self.from).hypot() + (self.to - c).hypot(),
            None => (self.to - self.from).hypot(),
        }
    }

    /// Splits at t = 0.5.
    fn split(&self) -> (MorphEdge, MorphEdge) {
        match self.control {
            Some(c) => {
                let a = self.from.midpoint(c);
                let b = c.midpoint(self.to);
                let m = a.midpoint(b);
                (
                    MorphEdge {
                        to: m,
                        control: Some(a),
                        ..*self
                    },
                    MorphEdge {
                        from: m,
                        control: Some(b),
                        ..*self
                    },
                )
            }
            None => {
                let m = self.from.midpoint(self.to);
                (MorphEdge { to: m, ..*self }, MorphEdge { from: m, ..*self })
            }
        }
    }

    fn as_curve(&self) -> MorphEdge {
        MorphEdge {
            control: Some(self.control.unwrap_or_else(|| self.from.midpoint(self.to))),
            ..*self
        }
    }

    fn segment(&self) -> Segment {
        match self.control {
            Some(control) => Segment::CurveTo {
                control,
                to: self.to,
            },
            None => Segment::LineTo(self.to),
        }
    }
}

fn flatten_edges(paths: &[ShapePath]) -> Vec<MorphEdge> {
    let mut edges = Vec::new();
    for (index, path) in paths.iter().enumerate() {
        let mut pen = Point::ZERO;
        for segment in &path.segments {
            match *segment {
                Segment::MoveTo(p) => pen = p,
                Segment::LineTo(to) => {
                    edges.push(MorphEdge {
                        from: pen,
                        control: None,
                        to,
                        path: index,
                    });
                    pen = to;
                }
                Segment::CurveTo { control, to } => {
                    edges.push(MorphEdge {
                        from: pen,
                        control: Some(control),
                        to,
                        path: index,
                    });
                    pen = to;
                }
            }
        }
    }
    edges
}

/// Splits the longest edge of `edges` until it holds `target` edges.
fn subdivide_to(edges: &mut Vec<MorphEdge>, target: usize) {
    while edges.len() < target {
        let Some((index, _)) = edges
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.length().total_cmp(&b.length()))
        else {
            return;
        };
        let (a, b) = edges[index].split();
        edges[index] = a;
        edges.insert(index + 1, b);
    }
}

/// Brings the start and end edge streams into one-to-one correspondence and
/// rebuilds both path lists with identical structure.
fn align_morph_paths(
    id: u16,
    start: &[ShapePath],
    end: &[ShapePath],
) -> Result<(Vec<ShapePath>, Vec<ShapePath>)> {
    let mut start_edges = flatten_edges(start);
    let mut end_edges = flatten_edges(end);
    if start_edges.is_empty() != end_edges.is_empty() {
        return Err(ParseError::malformed(format!(
            "morph shape {id}: {} start edge(s) vs {} end edge(s)",
            start_edges.len(),
            end_edges.len()
        )));
    }
    subdivide_to(&mut start_edges, end_edges.len());
    subdivide_to(&mut end_edges, start_edges.len());

    let mut start_paths: Vec<ShapePath> = Vec::new();
    let mut end_paths: Vec<ShapePath> = Vec::new();
    let mut previous: Option<(MorphEdge, MorphEdge)> = None;
    for (s, e) in start_edges.iter().zip(&end_edges) {
        let (s, e) = if s.control.is_some() != e.control.is_some() {
            (s.as_curve(), e.as_curve())
        } else {
            (*s, *e)
        };
        match previous {
            Some((ps, _)) if ps.path == s.path => {
                let (Some(sp), Some(ep)) = (start_paths.last_mut(), end_paths.last_mut()) else {
                    continue;
                };
                let continuous = previous.is_some_and(|(ps, pe)| ps.to == s.from && pe.to == e.from);
                if !continuous {
                    sp.segments.push(Segment::MoveTo(s.from));
                    ep.segments.push(Segment::MoveTo(e.from));
                }
            }
            _ => {
                let source = &start[s.path];
                let new_path = |p: Point| ShapePath {
                    style_group: source.style_group,
                    fill0: source.fill0,
                    fill1: source.fill1,
                    line: source.line,
                    segments: vec![Segment::MoveTo(p)],
                };
                start_paths.push(new_path(s.from));
                end_paths.push(new_path(e.from));
            }
        }
        if let (Some(sp), Some(ep)) = (start_paths.last_mut(), end_paths.last_mut()) {
            sp.segments.push(s.segment());
            ep.segments.push(e.segment());
        }
        previous = Some((s, e));
    }
    Ok((start_paths, end_paths))
}

fn parse_morph_shape(body: &[u8], version: u8) -> Result<MorphShapeDefinition> {
    let mut r = Reader::new(body);
    let id = r.read_u16()?;
    let start_bounds = r.read_rect()?;
    let end_bounds = r.read_rect()?;
    let (mut start_edge_bounds, mut end_edge_bounds) = (None, None);
    if version >= 2 {
        start_edge_bounds = Some(r.read_rect()?);
        end_edge_bounds = Some(r.read_rect()?);
        // Reserved bits and the scaling/non-scaling stroke flags.
        r.read_u8()?;
    }
    let offset = r.read_u32()? as usize;
    let end_edges_at = r.position() + offset;

    let fill_count = read_array_count(&mut r, 2)?;
    let mut start_styles = StyleTable::default();
    let mut end_styles = StyleTable::default();
    for _ in 0..fill_count {
        let (s, e) = read_morph_fill_style(&mut r)?;
        start_styles.fills.push(s);
        end_styles.fills.push(e);
    }
    let line_count = read_array_count(&mut r, 2)?;
    for _ in 0..line_count {
        let (s, e) = read_morph_line_style(&mut r, version)?;
        start_styles.lines.push(s);
        end_styles.lines.push(e);
    }

    let start_paths = read_shape_records(&mut r, None, 3)?;
    let end_body = body.get(end_edges_at..).ok_or_else(|| {
        ParseError::malformed(format!(
            "morph shape {id}: end edges offset {offset} exceeds record length {}",
            body.len()
        ))
    })?;
    let end_paths = read_shape_records(&mut Reader::new(end_body), None, 3)?;
    let (start_paths, end_paths) = align_morph_paths(id, &start_paths, &end_paths)?;

    let start = ShapeDefinition {
        id,
        bounds: start_bounds,
        edge_bounds: start_edge_bounds,
        uses_fill_winding_rule: false,
        styles: vec![start_styles],
        paths: start_paths,
    };
    let end = ShapeDefinition {
        id,
        bounds: end_bounds,
        edge_bounds: end_edge_bounds,
        uses_fill_winding_rule: false,
        styles: vec![end_styles],
        paths: end_paths,
    };
    MorphShapeDefinition::new(id, start, end)
}

// Display control

/// A decoded timeline control tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlTag {
    Action(DisplayAction),
    ShowFrame,
    FrameLabel(String),
    End,
}

/// Decodes a display-control tag. Returns `Ok(None)` for any other tag.
pub fn parse_control(code: TagCode, body: &[u8]) -> Result<Option<ControlTag>> {
    let mut r = Reader::new(body);
    let tag = match code {
        TagCode::ShowFrame => ControlTag::ShowFrame,
        TagCode::End => ControlTag::End,
        TagCode::FrameLabel => ControlTag::FrameLabel(r.read_string()?),
        TagCode::PlaceObject => {
            let character_id = r.read_u16()?;
            let depth = r.read_u16()?;
            let mut place = PlaceObject::new(depth, character_id);
            place.matrix = Some(r.read_matrix()?);
            if !r.is_empty() {
                place.color_transform = Some(r.read_color_transform(false)?);
            }
            ControlTag::Action(DisplayAction::Place(place))
        }
        TagCode::PlaceObject2 => {
            let flags = r.read_u8()?;
            ControlTag::Action(DisplayAction::Place(read_place_object(&mut r, flags, 0)?))
        }
        TagCode::PlaceObject3 => {
            let flags = r.read_u8()?;
            let flags2 = r.read_u8()?;
            ControlTag::Action(DisplayAction::Place(read_place_object(
                &mut r, flags, flags2,
            )?))
        }
        TagCode::RemoveObject => {
            let _character_id = r.read_u16()?;
            let depth = r.read_u16()?;
            ControlTag::Action(DisplayAction::Remove { depth })
        }
        TagCode::RemoveObject2 => {
            let depth = r.read_u16()?;
            ControlTag::Action(DisplayAction::Remove { depth })
        }
        _ => return Ok(None),
    };
    Ok(Some(tag))
}

/// PlaceObject2/3 body after the flag byte(s). Clip actions, filters and
/// blend modes are not decoded.
fn read_place_object(r: &mut Reader, flags: u8, flags2: u8) -> Result<PlaceObject> {
    let has_clip_depth = flags & 0x40 != 0;
    let has_name = flags & 0x20 != 0;
    let has_ratio = flags & 0x10 != 0;
    let has_color_transform = flags & 0x08 != 0;
    let has_matrix = flags & 0x04 != 0;
    let has_character = flags & 0x02 != 0;
    let is_move = flags & 0x01 != 0;
    let has_image = flags2 & 0x10 != 0;
    let has_class_name = flags2 & 0x08 != 0;

    let depth = r.read_u16()?;
    if has_class_name || (has_image && has_character) {
        r.read_string()?;
    }
    let character_id = if has_character { Some(r.read_u16()?) } else { None };
    let matrix = if has_matrix { Some(r.read_matrix()?) } else { None };
    let color_transform = if has_color_transform {
        Some(r.read_color_transform(true)?)
    } else {
        None
    };
    let ratio = if has_ratio {
        Some(r.read_u16()? as f32 / 65535.0)
    } else {
        None
    };
    let name = if has_name { Some(r.read_string()?) } else { None };
    let clip_depth = if has_clip_depth { Some(r.read_u16()?) } else { None };
    Ok(PlaceObject {
        depth,
        character_id,
        matrix,
        color_transform,
        ratio,
        name,
        clip_depth,
        is_move,
    })
}

/// Groups control tags into frames.
#[derive(Debug, Default)]
pub struct TimelineBuilder {
    frames: Vec<Frame>,
    current: Frame,
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` once the End tag is seen.
    pub fn push(&mut self, tag: ControlTag) -> bool {
        match tag {
            ControlTag::Action(action) => self.current.actions.push(action),
            ControlTag::FrameLabel(label) => self.current.label = Some(label),
            ControlTag::ShowFrame => self.frames.push(std::mem::take(&mut self.current)),
            ControlTag::End => return false,
        }
        true
    }

    /// Frames shown so far, counting trailing actions as a final frame.
    pub fn shown_frames(&self) -> u16 {
        let trailing = !self.current.actions.is_empty() || self.current.label.is_some();
        (self.frames.len() + usize::from(trailing)).min(u16::MAX as usize) as u16
    }

    /// Frames padded or truncated to `declared_frames` (at least one).
    /// Actions after the last ShowFrame form a final frame.
    pub fn finish(mut self, declared_frames: u16) -> Vec<Frame> {
        if !self.current.actions.is_empty() || self.current.label.is_some() {
            self.frames.push(self.current);
        }
        self.frames
            .resize_with(declared_frames.max(1) as usize, Frame::default);
        self.frames
    }
}

fn parse_sprite(body: &[u8], body_offset: usize) -> Result<SpriteDefinition> {
    let mut r = Reader::new(body);
    let id = r.read_u16()?;
    let frame_count = r.read_u16()?;
    let tags_at = r.position();
    let mut timeline = TimelineBuilder::new();
    for item in TagStream::with_base_offset(&body[tags_at..], body_offset + tags_at) {
        let (record, tag_body) = item?;
        let Some(tag) = parse_control(record.code, tag_body).map_err(|e| match e {
            ParseError::MalformedRecord(msg) => ParseError::malformed(format!(
                "sprite {id}: {:?} at offset {}: {msg}",
                record.code, record.header_offset
            )),
            other => other,
        })?
        else {
            continue;
        };
        if !timeline.push(tag) {
            break;
        }
    }
    Ok(SpriteDefinition {
        id,
        bounds: Rect::ZERO,
        frames: timeline.finish(frame_count),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{BitWriter, MorphShapeWriter, ShapeWriter, TagWriter};
    use kurbo::Affine;

    fn record(code: TagCode, len: usize) -> TagRecord {
        TagRecord {
            code,
            header_offset: 0,
            body_offset: 0,
            body_length: len,
        }
    }

    fn parse_one(code: TagCode, body: &[u8]) -> Result<Option<Definition>> {
        parse_tag(&record(code, body.len()), body)
    }

    fn shape_of(def: Option<Definition>) -> ShapeDefinition {
        match def {
            Some(Definition::Shape(s)) => s,
            other => panic!("expected shape, got {other:?}"),
        }
    }

    fn morph_of(def: Option<Definition>) -> MorphShapeDefinition {
        match def {
            Some(Definition::MorphShape(m)) => m,
            other => panic!("expected morph shape, got {other:?}"),
        }
    }

    #[test]
    fn test_rectangle_shape() {
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        let writer = ShapeWriter::rectangle(1, rect, Rgba::opaque(255, 0, 0));
        let shape = shape_of(parse_one(writer.tag_code(), &writer.body()).unwrap());

        assert_eq!(shape.id, 1);
        assert_eq!(shape.bounds, rect);
        assert_eq!(shape.styles.len(), 1);
        assert_eq!(shape.styles[0].fills, vec![FillStyle::Solid(Rgba::opaque(255, 0, 0))]);
        assert_eq!(shape.paths.len(), 1);

        let path = &shape.paths[0];
        assert_eq!((path.fill0, path.fill1, path.line), (0, 1, 0));
        assert_eq!(path.edge_count(), 4);
        assert_eq!(path.segments[0], Segment::MoveTo(Point::new(0.0, 0.0)));
        assert_eq!(path.segments[4], Segment::LineTo(Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_style_change_splits_paths_and_move_stays_in_path() {
        let mut writer = ShapeWriter::new(2, Rect::new(0.0, 0.0, 10.0, 10.0));
        writer.styles.fills.push(FillStyle::Solid(Rgba::BLACK));
        writer.styles.lines.push(LineStyle::solid(1.0, Rgba::WHITE));
        writer
            .edges
            .set_styles(None, Some(1), None)
            .line_to(10.0, 0.0)
            // move without style change
            .move_to(0.0, 5.0)
            .line_to(10.0, 5.0)
            .set_styles(Some(0), Some(0), Some(1))
            .curve_to(5.0, 10.0, 0.0, 5.0);
        let shape = shape_of(parse_one(writer.tag_code(), &writer.body()).unwrap());

        assert_eq!(shape.paths.len(), 2);
        let first = &shape.paths[0];
        assert_eq!(
            first.segments,
            vec![
                Segment::MoveTo(Point::ZERO),
                Segment::LineTo(Point::new(10.0, 0.0)),
                Segment::MoveTo(Point::new(0.0, 5.0)),
                Segment::LineTo(Point::new(10.0, 5.0)),
            ]
        );
        let second = &shape.paths[1];
        assert_eq!((second.fill0, second.fill1, second.line), (0, 0, 1));
        assert_eq!(second.segments[0], Segment::MoveTo(Point::new(10.0, 5.0)));
        assert_eq!(
            second.segments[1],
            Segment::CurveTo {
                control: Point::new(5.0, 10.0),
                to: Point::new(0.0, 5.0)
            }
        );
    }

    #[test]
    fn test_new_styles_open_a_style_group() {
        let mut writer = ShapeWriter::new(3, Rect::new(0.0, 0.0, 10.0, 10.0));
        writer.styles.fills.push(FillStyle::Solid(Rgba::BLACK));
        writer
            .edges
            .set_styles(None, Some(1), None)
            .line_to(10.0, 0.0)
            .new_styles(StyleTable {
                fills: vec![FillStyle::Solid(Rgba::WHITE)],
                lines: vec![],
            })
            .set_styles(None, Some(1), None)
            .line_to(10.0, 10.0);
        let shape = shape_of(parse_one(writer.tag_code(), &writer.body()).unwrap());

        assert_eq!(shape.styles.len(), 2);
        assert_eq!(shape.paths.len(), 2);
        assert_eq!(shape.paths[1].style_group, 1);
        assert_eq!(
            shape.fill_style(1, shape.paths[1].fill1),
            Some(&FillStyle::Solid(Rgba::WHITE))
        );
    }

    #[test]
    fn test_gradient_fill_and_line_style_2() {
        let gradient = Gradient {
            matrix: Affine::new([0.5, 0.0, 0.0, 0.5, 10.0, 10.0]),
            spread: SpreadMode::Reflect,
            interpolation: InterpolationMode::LinearRgb,
            stops: vec![
                GradientStop {
                    ratio: 0.0,
                    color: Rgba::opaque(255, 0, 0),
                },
                GradientStop {
                    ratio: 1.0,
                    color: Rgba::new(0, 0, 255, 128),
                },
            ],
        };
        let mut line = LineStyle::solid(2.0, Rgba::new(1, 2, 3, 4));
        line.join = JoinStyle::Miter;
        line.miter_limit = 2.5;
        line.start_cap = CapStyle::Square;
        line.end_cap = CapStyle::None;
        line.scale_mode = LineScaleMode::Horizontal;

        let mut writer = ShapeWriter::new(4, Rect::new(0.0, 0.0, 20.0, 20.0)).with_version(4);
        writer.uses_fill_winding_rule = true;
        writer.styles.fills.push(FillStyle::FocalGradient {
            gradient: gradient.clone(),
            focal_point: -0.5,
        });
        writer.styles.lines.push(line.clone());
        writer
            .edges
            .set_styles(None, Some(1), Some(1))
            .line_to(20.0, 0.0);
        let shape = shape_of(parse_one(TagCode::DefineShape4, &writer.body()).unwrap());

        assert!(shape.uses_fill_winding_rule);
        assert_eq!(shape.edge_bounds, Some(Rect::new(0.0, 0.0, 20.0, 20.0)));
        match &shape.styles[0].fills[0] {
            FillStyle::FocalGradient {
                gradient: g,
                focal_point,
            } => {
                assert_eq!(*focal_point, -0.5);
                assert_eq!(g.spread, SpreadMode::Reflect);
                assert_eq!(g.interpolation, InterpolationMode::LinearRgb);
                assert_eq!(g.stops, gradient.stops);
                assert_eq!(g.matrix, gradient.matrix);
            }
            other => panic!("expected focal gradient, got {other:?}"),
        }
        assert_eq!(shape.styles[0].lines[0], line);
    }

    #[test]
    fn test_shape1_colors_are_opaque_rgb() {
        let writer = ShapeWriter::rectangle(5, Rect::new(0.0, 0.0, 1.0, 1.0), Rgba::new(9, 8, 7, 10))
            .with_version(1);
        let shape = shape_of(parse_one(TagCode::DefineShape, &writer.body()).unwrap());
        assert_eq!(shape.styles[0].fills[0], FillStyle::Solid(Rgba::opaque(9, 8, 7)));
    }

    #[test]
    fn test_truncated_shape_is_malformed() {
        let writer = ShapeWriter::rectangle(1, Rect::new(0.0, 0.0, 10.0, 10.0), Rgba::BLACK);
        let body = writer.body();
        let result = parse_one(TagCode::DefineShape3, &body[..body.len() - 3]);
        assert!(matches!(result, Err(ParseError::MalformedRecord(_))));
    }

    #[test]
    fn test_unsupported_and_control_tags() {
        assert_eq!(
            parse_one(TagCode::DefineFont2, &[1, 0]),
            Err(ParseError::UnsupportedTag(TagCode::DefineFont2))
        );
        assert_eq!(parse_one(TagCode::ShowFrame, &[]), Ok(None));
        assert_eq!(parse_one(TagCode::Unknown(200), &[1, 2, 3]), Ok(None));
    }

    fn morph_writer() -> MorphShapeWriter {
        let mut writer = MorphShapeWriter::new(
            10,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 20.0, 20.0),
        );
        writer.fills.push((
            FillStyle::Solid(Rgba::opaque(255, 0, 0)),
            FillStyle::Solid(Rgba::opaque(0, 0, 255)),
        ));
        writer
    }

    #[test]
    fn test_morph_shape_pairs_styles_and_edges() {
        let mut writer = morph_writer();
        writer
            .start
            .set_styles(None, Some(1), None)
            .move_to(0.0, 0.0)
            .line_to(10.0, 0.0)
            .line_to(10.0, 10.0);
        writer
            .end
            .move_to(0.0, 0.0)
            .line_to(20.0, 0.0)
            .line_to(20.0, 20.0);
        let morph = morph_of(parse_one(writer.tag_code(), &writer.body()).unwrap());

        assert_eq!(morph.id(), 10);
        assert_eq!(morph.start().paths.len(), 1);
        assert_eq!(morph.end().paths[0].fill1, 1);
        assert_eq!(
            morph.end().styles[0].fills[0],
            FillStyle::Solid(Rgba::opaque(0, 0, 255))
        );
        assert_eq!(
            morph.end().paths[0].segments[2],
            Segment::LineTo(Point::new(20.0, 20.0))
        );
        assert_eq!(morph.bounds(), Rect::new(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn test_morph_promotes_line_to_curve() {
        let mut writer = morph_writer();
        writer
            .start
            .set_styles(None, Some(1), None)
            .line_to(10.0, 0.0);
        writer.end.curve_to(5.0, 5.0, 10.0, 0.0);
        let morph = morph_of(parse_one(writer.tag_code(), &writer.body()).unwrap());

        assert_eq!(
            morph.start().paths[0].segments[1],
            Segment::CurveTo {
                control: Point::new(5.0, 0.0),
                to: Point::new(10.0, 0.0)
            }
        );
    }

    #[test]
    fn test_morph_edge_split_curve() {
        let edge = MorphEdge {
            from: Point::new(0.0, 0.0),
            control: Some(Point::new(4.0, 8.0)),
            to: Point::new(8.0, 0.0),
            path: 3,
        };
        let (a, b) = edge.split();

        assert_eq!(a.from, Point::new(0.0, 0.0));
        assert_eq!(a.control, Some(Point::new(2.0, 4.0)));
        assert_eq!(a.to, Point::new(4.0, 4.0));
        assert_eq!(b.from, Point::new(4.0, 4.0));
        assert_eq!(b.control, Some(Point::new(6.0, 4.0)));
        assert_eq!(b.to, Point::new(8.0, 0.0));
        assert_eq!((a.path, b.path), (3, 3));

        let line = MorphEdge { control: None, ..edge };
        let (a, b) = line.split();
        assert_eq!((a.to, b.from), (Point::new(4.0, 0.0), Point::new(4.0, 0.0)));
        assert!(a.control.is_none() && b.control.is_none());
    }

    fn filled(fill1: u32, segments: Vec<Segment>) -> ShapePath {
        ShapePath {
            style_group: 0,
            fill0: 0,
            fill1,
            line: 0,
            segments,
        }
    }

    #[test]
    fn test_morph_alignment_keeps_start_paths_and_gaps() {
        let p = Point::new;
        let start = vec![
            filled(1, vec![
                Segment::MoveTo(p(0.0, 0.0)),
                Segment::LineTo(p(10.0, 0.0)),
                Segment::MoveTo(p(0.0, 5.0)),
                Segment::LineTo(p(10.0, 5.0)),
            ]),
            filled(2, vec![
                Segment::MoveTo(p(20.0, 0.0)),
                Segment::CurveTo {
                    control: p(25.0, 5.0),
                    to: p(30.0, 0.0),
                },
            ]),
        ];
        let end = vec![filled(1, vec![
            Segment::MoveTo(p(0.0, 0.0)),
            Segment::LineTo(p(20.0, 0.0)),
            Segment::LineTo(p(40.0, 0.0)),
        ])];
        let (start, end) = align_morph_paths(9, &start, &end).unwrap();

        assert_eq!(start.len(), 2);
        assert_eq!(end.len(), 2);
        assert_eq!(start[0].segments, vec![
            Segment::MoveTo(p(0.0, 0.0)),
            Segment::LineTo(p(10.0, 0.0)),
            Segment::MoveTo(p(0.0, 5.0)),
            Segment::LineTo(p(10.0, 5.0)),
        ]);
        assert_eq!(end[0].segments, vec![
            Segment::MoveTo(p(0.0, 0.0)),
            Segment::LineTo(p(20.0, 0.0)),
            Segment::MoveTo(p(20.0, 0.0)),
            Segment::LineTo(p(30.0, 0.0)),
        ]);
        // The end line paired with a start curve is promoted.
        assert_eq!(end[1].segments, vec![
            Segment::MoveTo(p(30.0, 0.0)),
            Segment::CurveTo {
                control: p(35.0, 0.0),
                to: p(40.0, 0.0),
            },
        ]);
        assert_eq!((start[1].fill1, end[1].fill1), (2, 2));
        for (s, e) in start.iter().zip(&end) {
            assert_eq!(s.segments.len(), e.segments.len());
        }
    }

    #[test]
    fn test_morph_subdivides_shorter_stream() {
        let mut writer = morph_writer();
        writer
            .start
            .set_styles(None, Some(1), None)
            .line_to(10.0, 0.0);
        writer
            .end
            .line_to(10.0, 0.0)
            .line_to(10.0, 10.0)
            .line_to(0.0, 10.0);
        let morph = morph_of(parse_one(writer.tag_code(), &writer.body()).unwrap());

        let start = &morph.start().paths[0];
        assert_eq!(start.edge_count(), 3);
        // Split at 5, then the longer half (5..10) at 7.5.
        assert_eq!(
            start.segments[1..],
            [
                Segment::LineTo(Point::new(5.0, 0.0)),
                Segment::LineTo(Point::new(7.5, 0.0)),
                Segment::LineTo(Point::new(10.0, 0.0)),
            ]
        );
        assert_eq!(morph.end().paths[0].edge_count(), 3);
    }

    #[test]
    fn test_morph_with_empty_end_stream_is_malformed() {
        let mut writer = morph_writer();
        writer
            .start
            .set_styles(None, Some(1), None)
            .line_to(10.0, 0.0);
        let result = parse_one(writer.tag_code(), &writer.body());
        assert!(matches!(result, Err(ParseError::MalformedRecord(_))));
    }

    #[test]
    fn test_morph_shape_2_reads_edge_bounds_and_line_flags() {
        let mut writer = morph_writer();
        writer.version = 2;
        let mut start_line = LineStyle::solid(1.0, Rgba::BLACK);
        start_line.join = JoinStyle::Bevel;
        let mut end_line = start_line.clone();
        end_line.width = 3.0;
        end_line.color = Rgba::WHITE;
        writer.lines.push((start_line.clone(), end_line));
        writer
            .start
            .set_styles(None, Some(1), Some(1))
            .line_to(10.0, 0.0);
        writer.end.line_to(20.0, 0.0);
        let morph = morph_of(parse_one(TagCode::DefineMorphShape2, &writer.body()).unwrap());

        assert_eq!(morph.start().edge_bounds, Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert_eq!(morph.start().styles[0].lines[0], start_line);
        let end_line = &morph.end().styles[0].lines[0];
        assert_eq!(end_line.width, 3.0);
        assert_eq!(end_line.join, JoinStyle::Bevel);
    }

    #[test]
    fn test_place_object_2_fields() {
        let mut place = PlaceObject::new(3, 7);
        place.matrix = Some(Affine::translate((4.0, 5.0)));
        place.ratio = Some(1.0);
        place.name = Some("hero".into());
        place.clip_depth = Some(9);
        let mut tags = TagWriter::new();
        tags.place_object(&place);
        let bytes = tags.into_bytes();
        let (record, body) = TagStream::new(&bytes).next().unwrap().unwrap();

        let parsed = parse_control(record.code, body).unwrap();
        assert_eq!(parsed, Some(ControlTag::Action(DisplayAction::Place(place))));
    }

    #[test]
    fn test_pen_overflow_fails_the_tag() {
        let mut w = BitWriter::new();
        w.write_u16(1);
        w.write_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        w.write_u8(0);
        w.write_u8(0);
        // No style index bits.
        w.write_ubits(4, 0);
        w.write_ubits(4, 0);
        // Move to (2^30 - 1, 0).
        w.write_bit(false);
        w.write_ubits(5, 0x01);
        w.write_ubits(5, 31);
        w.write_sbits(31, (1 << 30) - 1);
        w.write_sbits(31, 0);
        for _ in 0..20_000 {
            // Horizontal straight edge of 65535 twips.
            w.write_bit(true);
            w.write_bit(true);
            w.write_ubits(4, 15);
            w.write_bit(false);
            w.write_bit(false);
            w.write_sbits(17, 65_535);
        }
        w.write_bit(false);
        w.write_ubits(5, 0);
        let body = w.into_bytes();

        assert!(matches!(
            parse_one(TagCode::DefineShape, &body),
            Err(ParseError::MalformedRecord(_))
        ));

        let mut tags = TagWriter::new();
        tags.write_tag(TagCode::DefineShape, &body)
            .shape(&ShapeWriter::rectangle(2, Rect::new(0.0, 0.0, 5.0, 5.0), Rgba::BLACK))
            .end();
        let movie = crate::movie::parse_tags(tags.as_bytes());
        assert!(!movie.library.contains(1));
        assert!(movie.library.contains(2));
        assert_eq!(movie.failures.len(), 1);
        assert_eq!(movie.failures[0].code, TagCode::DefineShape);
        assert_eq!(movie.failures[0].character_id, Some(1));
    }

    #[test]
    fn test_place_object_3_skips_class_name() {
        let mut w = BitWriter::new();
        // HasCharacter | Move
        w.write_u8(0x03);
        // HasClassName
        w.write_u8(0x08);
        w.write_u16(2);
        w.write_string("com.example.Hero");
        w.write_u16(12);
        let body = w.into_bytes();

        let parsed = parse_control(TagCode::PlaceObject3, &body).unwrap();
        let Some(ControlTag::Action(DisplayAction::Place(place))) = parsed else {
            panic!("expected placement, got {parsed:?}");
        };
        assert_eq!(place.depth, 2);
        assert_eq!(place.character_id, Some(12));
        assert!(place.is_move);
    }

    #[test]
    fn test_place_object_1_and_remove() {
        let mut w = BitWriter::new();
        w.write_u16(5);
        w.write_u16(1);
        w.write_matrix(Affine::IDENTITY);
        let body = w.into_bytes();
        let parsed = parse_control(TagCode::PlaceObject, &body).unwrap();
        let Some(ControlTag::Action(DisplayAction::Place(place))) = parsed else {
            panic!("expected placement, got {parsed:?}");
        };
        assert_eq!((place.depth, place.character_id), (1, Some(5)));
        assert!(place.color_transform.is_none());

        assert_eq!(
            parse_control(TagCode::RemoveObject, &[5, 0, 1, 0]).unwrap(),
            Some(ControlTag::Action(DisplayAction::Remove { depth: 1 }))
        );
        assert_eq!(
            parse_control(TagCode::RemoveObject2, &[4, 0]).unwrap(),
            Some(ControlTag::Action(DisplayAction::Remove { depth: 4 }))
        );
    }

    #[test]
    fn test_sprite_frames_and_labels() {
        let mut inner = TagWriter::new();
        inner
            .frame_label("start")
            .place_object(&PlaceObject::new(1, 1))
            .show_frame()
            .remove_object(1)
            .show_frame()
            .end();
        let mut outer = TagWriter::new();
        outer.sprite(20, 4, &inner);
        let bytes = outer.into_bytes();
        let (record, body) = TagStream::new(&bytes).next().unwrap().unwrap();

        let Some(Definition::Sprite(sprite)) = parse_tag(&record, body).unwrap() else {
            panic!("expected sprite");
        };
        assert_eq!(sprite.id, 20);
        // Declared 4 frames, 2 shown: padded with empty frames.
        assert_eq!(sprite.frame_count(), 4);
        assert_eq!(sprite.frame_for_label("start"), Some(0));
        assert_eq!(
            sprite.frames[1].actions,
            vec![DisplayAction::Remove { depth: 1 }]
        );
        assert!(sprite.frames[3].actions.is_empty());
        assert_eq!(sprite.referenced_ids().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_sprite_frame_count_minimum_is_one() {
        let mut inner = TagWriter::new();
        inner.end();
        let mut outer = TagWriter::new();
        outer.sprite(21, 0, &inner);
        let bytes = outer.into_bytes();
        let (record, body) = TagStream::new(&bytes).next().unwrap().unwrap();
        let Some(Definition::Sprite(sprite)) = parse_tag(&record, body).unwrap() else {
            panic!("expected sprite");
        };
        assert_eq!(sprite.frame_count(), 1);
    }
}
