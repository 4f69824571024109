//! Encoders for building tag streams by hand.
//!
//! The inverse of [`crate::reader`] and [`crate::parser`], used by tests and
//! tools to produce fixtures. Only the records the parser understands are
//! covered. Built for this crate's unit tests, or with the `writer` feature.

use crate::model::{
    CapStyle, ColorTransform, FillStyle, Gradient, InterpolationMode, JoinStyle, LineScaleMode,
    LineStyle, PlaceObject, Rgba, SpreadMode, StyleTable, TWIPS_PER_PIXEL,
};
use crate::tags::TagCode;
use kurbo::{Affine, Rect};

fn to_twips(px: f64) -> i32 {
    (px * TWIPS_PER_PIXEL).round() as i32
}

/// Bits needed to hold `v` as a signed field.
pub fn sbits_needed(v: i32) -> u32 {
    let magnitude = if v < 0 { !v } else { v };
    33 - (magnitude as u32).leading_zeros()
}

/// Bits needed to hold `v` as an unsigned field.
pub fn ubits_needed(v: u32) -> u32 {
    32 - v.leading_zeros()
}

#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_buf: u8,
    bits_used: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.bit_buf |= 1 << (7 - self.bits_used);
        }
        self.bits_used += 1;
        if self.bits_used == 8 {
            self.bytes.push(self.bit_buf);
            self.bit_buf = 0;
            self.bits_used = 0;
        }
    }

    pub fn write_ubits(&mut self, n: u32, value: u32) {
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    pub fn write_sbits(&mut self, n: u32, value: i32) {
        self.write_ubits(n, value as u32);
    }

    pub fn flush_bits(&mut self) {
        if self.bits_used > 0 {
            self.bytes.push(self.bit_buf);
            self.bit_buf = 0;
            self.bits_used = 0;
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.flush_bits();
        self.bytes.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_fixed8(&mut self, v: f32) {
        self.write_i16((v * 256.0).round() as i16);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.flush_bits();
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.bytes.push(0);
    }

    pub fn write_rect(&mut self, rect: Rect) {
        self.flush_bits();
        let values = [
            to_twips(rect.x0),
            to_twips(rect.x1),
            to_twips(rect.y0),
            to_twips(rect.y1),
        ];
        let n = values.iter().map(|v| sbits_needed(*v)).max().unwrap_or(0);
        self.write_ubits(5, n);
        for v in values {
            self.write_sbits(n, v);
        }
        self.flush_bits();
    }

    pub fn write_matrix(&mut self, m: Affine) {
        self.flush_bits();
        let [a, b, c, d, e, f] = m.as_coeffs();
        let fixed = |v: f64| (v * 65536.0).round() as i32;
        if a != 1.0 || d != 1.0 {
            let (sx, sy) = (fixed(a), fixed(d));
            let n = sbits_needed(sx).max(sbits_needed(sy));
            self.write_bit(true);
            self.write_ubits(5, n);
            self.write_sbits(n, sx);
            self.write_sbits(n, sy);
        } else {
            self.write_bit(false);
        }
        if b != 0.0 || c != 0.0 {
            let (r0, r1) = (fixed(b), fixed(c));
            let n = sbits_needed(r0).max(sbits_needed(r1));
            self.write_bit(true);
            self.write_ubits(5, n);
            self.write_sbits(n, r0);
            self.write_sbits(n, r1);
        } else {
            self.write_bit(false);
        }
        let (tx, ty) = (to_twips(e), to_twips(f));
        let n = if tx == 0 && ty == 0 {
            0
        } else {
            sbits_needed(tx).max(sbits_needed(ty))
        };
        self.write_ubits(5, n);
        self.write_sbits(n, tx);
        self.write_sbits(n, ty);
        self.flush_bits();
    }

    pub fn write_rgb(&mut self, c: Rgba) {
        self.write_bytes(&[c.r, c.g, c.b]);
    }

    pub fn write_rgba(&mut self, c: Rgba) {
        self.write_bytes(&[c.r, c.g, c.b, c.a]);
    }

    pub fn write_color_transform(&mut self, cx: &ColorTransform, with_alpha: bool) {
        self.flush_bits();
        let channels = if with_alpha { 4 } else { 3 };
        let mult: Vec<i32> = cx.mult[..channels]
            .iter()
            .map(|m| (m * 256.0).round() as i32)
            .collect();
        let add: Vec<i32> = cx.add[..channels]
            .iter()
            .map(|a| (a * 255.0).round() as i32)
            .collect();
        let has_mult = mult.iter().any(|&m| m != 256);
        let has_add = add.iter().any(|&a| a != 0);
        let n = mult
            .iter()
            .filter(|_| has_mult)
            .chain(add.iter().filter(|_| has_add))
            .map(|v| sbits_needed(*v))
            .max()
            .unwrap_or(0);
        self.write_bit(has_add);
        self.write_bit(has_mult);
        self.write_ubits(4, n);
        if has_mult {
            for v in &mult {
                self.write_sbits(n, *v);
            }
        }
        if has_add {
            for v in &add {
                self.write_sbits(n, *v);
            }
        }
        self.flush_bits();
    }

    pub fn len(&self) -> usize {
        self.bytes.len() + usize::from(self.bits_used > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush_bits();
        self.bytes
    }
}

// Styles

fn write_color(w: &mut BitWriter, color: Rgba, version: u8) {
    if version >= 3 {
        w.write_rgba(color);
    } else {
        w.write_rgb(color);
    }
}

fn write_gradient_header(w: &mut BitWriter, gradient: &Gradient) {
    let spread = match gradient.spread {
        SpreadMode::Pad => 0,
        SpreadMode::Reflect => 1,
        SpreadMode::Repeat => 2,
    };
    let interpolation = match gradient.interpolation {
        InterpolationMode::Rgb => 0,
        InterpolationMode::LinearRgb => 1,
    };
    w.write_ubits(2, spread);
    w.write_ubits(2, interpolation);
    w.write_ubits(4, gradient.stops.len().min(15) as u32);
}

fn ratio_byte(ratio: f32) -> u8 {
    (ratio.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn write_gradient(w: &mut BitWriter, gradient: &Gradient, version: u8) {
    w.write_matrix(gradient.matrix);
    write_gradient_header(w, gradient);
    for stop in gradient.stops.iter().take(15) {
        w.write_u8(ratio_byte(stop.ratio));
        write_color(w, stop.color, version);
    }
}

fn bitmap_code(repeating: bool, smoothed: bool) -> u8 {
    0x40 | if repeating { 0 } else { 1 } | if smoothed { 0 } else { 2 }
}

pub fn write_fill_style(w: &mut BitWriter, fill: &FillStyle, version: u8) {
    match fill {
        FillStyle::Solid(color) => {
            w.write_u8(0x00);
            write_color(w, *color, version);
        }
        FillStyle::LinearGradient(g) => {
            w.write_u8(0x10);
            write_gradient(w, g, version);
        }
        FillStyle::RadialGradient(g) => {
            w.write_u8(0x12);
            write_gradient(w, g, version);
        }
        FillStyle::FocalGradient {
            gradient,
            focal_point,
        } => {
            w.write_u8(0x13);
            write_gradient(w, gradient, version);
            w.write_fixed8(*focal_point);
        }
        FillStyle::Bitmap {
            bitmap_id,
            matrix,
            repeating,
            smoothed,
        } => {
            w.write_u8(bitmap_code(*repeating, *smoothed));
            w.write_u16(*bitmap_id);
            w.write_matrix(*matrix);
        }
    }
}

fn cap_bits(cap: CapStyle) -> u32 {
    match cap {
        CapStyle::Round => 0,
        CapStyle::None => 1,
        CapStyle::Square => 2,
    }
}

fn join_bits(join: JoinStyle) -> u32 {
    match join {
        JoinStyle::Round => 0,
        JoinStyle::Bevel => 1,
        JoinStyle::Miter => 2,
    }
}

fn width_twips(width: f64) -> u16 {
    to_twips(width).clamp(0, u16::MAX as i32) as u16
}

fn write_line_style_flags(w: &mut BitWriter, line: &LineStyle, has_fill: bool) {
    w.write_ubits(2, cap_bits(line.start_cap));
    w.write_ubits(2, join_bits(line.join));
    w.write_bit(has_fill);
    w.write_bit(matches!(
        line.scale_mode,
        LineScaleMode::None | LineScaleMode::Vertical
    ));
    w.write_bit(matches!(
        line.scale_mode,
        LineScaleMode::None | LineScaleMode::Horizontal
    ));
    w.write_bit(line.pixel_hinting);
    w.write_ubits(5, 0);
    w.write_bit(line.no_close);
    w.write_ubits(2, cap_bits(line.end_cap));
    if line.join == JoinStyle::Miter {
        w.write_fixed8(line.miter_limit);
    }
}

pub fn write_line_style(w: &mut BitWriter, line: &LineStyle, version: u8) {
    w.write_u16(width_twips(line.width));
    if version >= 4 {
        write_line_style_flags(w, line, line.fill.is_some());
        match &line.fill {
            Some(fill) => write_fill_style(w, fill, version),
            None => w.write_rgba(line.color),
        }
    } else {
        write_color(w, line.color, version);
    }
}

fn write_array_count(w: &mut BitWriter, count: usize, version: u8) {
    if count >= 0xFF && version >= 2 {
        w.write_u8(0xFF);
        w.write_u16(count as u16);
    } else {
        w.write_u8(count as u8);
    }
}

fn write_style_table(w: &mut BitWriter, table: &StyleTable, version: u8) {
    write_array_count(w, table.fills.len(), version);
    for fill in &table.fills {
        write_fill_style(w, fill, version);
    }
    write_array_count(w, table.lines.len(), version);
    for line in &table.lines {
        write_line_style(w, line, version);
    }
}

// Edge records

#[derive(Debug, Clone)]
enum EdgeOp {
    StyleChange {
        move_to: Option<(i32, i32)>,
        fill0: Option<u32>,
        fill1: Option<u32>,
        line: Option<u32>,
        new_styles: Option<StyleTable>,
    },
    Line(i32, i32),
    Curve(i32, i32, i32, i32),
}

/// A sequence of SHAPERECORDs tracked in absolute pixel coordinates.
#[derive(Debug, Clone, Default)]
pub struct EdgeRecords {
    ops: Vec<EdgeOp>,
    pen: (i32, i32),
}

impl EdgeRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f64, y: f64) -> &mut Self {
        let p = (to_twips(x), to_twips(y));
        self.pen = p;
        self.ops.push(EdgeOp::StyleChange {
            move_to: Some(p),
            fill0: None,
            fill1: None,
            line: None,
            new_styles: None,
        });
        self
    }

    /// Selects styles by 1-based index; `None` leaves a slot unchanged.
    pub fn set_styles(
        &mut self,
        fill0: Option<u32>,
        fill1: Option<u32>,
        line: Option<u32>,
    ) -> &mut Self {
        self.ops.push(EdgeOp::StyleChange {
            move_to: None,
            fill0,
            fill1,
            line,
            new_styles: None,
        });
        self
    }

    pub fn new_styles(&mut self, table: StyleTable) -> &mut Self {
        self.ops.push(EdgeOp::StyleChange {
            move_to: None,
            fill0: None,
            fill1: None,
            line: None,
            new_styles: Some(table),
        });
        self
    }

    pub fn line_to(&mut self, x: f64, y: f64) -> &mut Self {
        let p = (to_twips(x), to_twips(y));
        self.ops.push(EdgeOp::Line(p.0 - self.pen.0, p.1 - self.pen.1));
        self.pen = p;
        self
    }

    pub fn curve_to(&mut self, cx: f64, cy: f64, x: f64, y: f64) -> &mut Self {
        let c = (to_twips(cx), to_twips(cy));
        let a = (to_twips(x), to_twips(y));
        self.ops.push(EdgeOp::Curve(
            c.0 - self.pen.0,
            c.1 - self.pen.1,
            a.0 - c.0,
            a.1 - c.1,
        ));
        self.pen = a;
        self
    }

    fn write(&self, w: &mut BitWriter, styles: &StyleTable, version: u8) {
        let mut fill_bits = ubits_needed(styles.fills.len() as u32);
        let mut line_bits = ubits_needed(styles.lines.len() as u32);
        w.write_ubits(4, fill_bits);
        w.write_ubits(4, line_bits);
        for op in &self.ops {
            match op {
                EdgeOp::StyleChange {
                    move_to,
                    fill0,
                    fill1,
                    line,
                    new_styles,
                } => {
                    w.write_bit(false);
                    w.write_bit(new_styles.is_some());
                    w.write_bit(line.is_some());
                    w.write_bit(fill1.is_some());
                    w.write_bit(fill0.is_some());
                    w.write_bit(move_to.is_some());
                    if let Some((x, y)) = move_to {
                        let n = sbits_needed(*x).max(sbits_needed(*y));
                        w.write_ubits(5, n);
                        w.write_sbits(n, *x);
                        w.write_sbits(n, *y);
                    }
                    if let Some(f) = fill0 {
                        w.write_ubits(fill_bits, *f);
                    }
                    if let Some(f) = fill1 {
                        w.write_ubits(fill_bits, *f);
                    }
                    if let Some(l) = line {
                        w.write_ubits(line_bits, *l);
                    }
                    if let Some(table) = new_styles {
                        write_style_table(w, table, version);
                        fill_bits = ubits_needed(table.fills.len() as u32);
                        line_bits = ubits_needed(table.lines.len() as u32);
                        w.write_ubits(4, fill_bits);
                        w.write_ubits(4, line_bits);
                    }
                }
                EdgeOp::Line(dx, dy) => {
                    let n = sbits_needed(*dx).max(sbits_needed(*dy)).max(2);
                    w.write_bit(true);
                    w.write_bit(true);
                    w.write_ubits(4, n - 2);
                    if *dx != 0 && *dy != 0 {
                        w.write_bit(true);
                        w.write_sbits(n, *dx);
                        w.write_sbits(n, *dy);
                    } else {
                        w.write_bit(false);
                        let vertical = *dx == 0;
                        w.write_bit(vertical);
                        w.write_sbits(n, if vertical { *dy } else { *dx });
                    }
                }
                EdgeOp::Curve(cdx, cdy, adx, ady) => {
                    let n = [*cdx, *cdy, *adx, *ady]
                        .iter()
                        .map(|v| sbits_needed(*v))
                        .max()
                        .unwrap_or(0)
                        .max(2);
                    w.write_bit(true);
                    w.write_bit(false);
                    w.write_ubits(4, n - 2);
                    for v in [cdx, cdy, adx, ady] {
                        w.write_sbits(n, *v);
                    }
                }
            }
        }
        w.write_ubits(6, 0);
        w.flush_bits();
    }
}

/// Builds a DefineShape body (version 1 to 4).
#[derive(Debug, Clone)]
pub struct ShapeWriter {
    pub version: u8,
    pub id: u16,
    pub bounds: Rect,
    pub styles: StyleTable,
    pub edges: EdgeRecords,
    pub uses_fill_winding_rule: bool,
}

impl ShapeWriter {
    pub fn new(id: u16, bounds: Rect) -> Self {
        Self {
            version: 3,
            id,
            bounds,
            styles: StyleTable::default(),
            edges: EdgeRecords::new(),
            uses_fill_winding_rule: false,
        }
    }

    /// A closed axis-aligned rectangle painted with `fill` on its right side.
    pub fn rectangle(id: u16, rect: Rect, fill: Rgba) -> Self {
        let mut shape = Self::new(id, rect);
        shape.styles.fills.push(FillStyle::Solid(fill));
        shape
            .edges
            .set_styles(None, Some(1), None)
            .move_to(rect.x0, rect.y0)
            .line_to(rect.x1, rect.y0)
            .line_to(rect.x1, rect.y1)
            .line_to(rect.x0, rect.y1)
            .line_to(rect.x0, rect.y0);
        shape
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version.clamp(1, 4);
        self
    }

    pub fn tag_code(&self) -> TagCode {
        match self.version {
            1 => TagCode::DefineShape,
            2 => TagCode::DefineShape2,
            3 => TagCode::DefineShape3,
            _ => TagCode::DefineShape4,
        }
    }

    pub fn body(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_u16(self.id);
        w.write_rect(self.bounds);
        if self.version >= 4 {
            w.write_rect(self.bounds);
            w.write_ubits(5, 0);
            w.write_bit(self.uses_fill_winding_rule);
            w.write_bit(false);
            w.write_bit(true);
            w.flush_bits();
        }
        write_style_table(&mut w, &self.styles, self.version);
        self.edges.write(&mut w, &self.styles, self.version);
        w.into_bytes()
    }
}

/// Builds a DefineMorphShape body (version 1 or 2). Style pairs are
/// `(start, end)`; both must be the same variant.
#[derive(Debug, Clone)]
pub struct MorphShapeWriter {
    pub version: u8,
    pub id: u16,
    pub start_bounds: Rect,
    pub end_bounds: Rect,
    pub fills: Vec<(FillStyle, FillStyle)>,
    pub lines: Vec<(LineStyle, LineStyle)>,
    pub start: EdgeRecords,
    pub end: EdgeRecords,
}

impl MorphShapeWriter {
    pub fn new(id: u16, start_bounds: Rect, end_bounds: Rect) -> Self {
        Self {
            version: 1,
            id,
            start_bounds,
            end_bounds,
            fills: Vec::new(),
            lines: Vec::new(),
            start: EdgeRecords::new(),
            end: EdgeRecords::new(),
        }
    }

    pub fn tag_code(&self) -> TagCode {
        if self.version >= 2 {
            TagCode::DefineMorphShape2
        } else {
            TagCode::DefineMorphShape
        }
    }

    fn write_morph_gradient(w: &mut BitWriter, start: &Gradient, end: &Gradient) {
        w.write_matrix(start.matrix);
        w.write_matrix(end.matrix);
        write_gradient_header(w, start);
        for (s, e) in start.stops.iter().zip(&end.stops).take(15) {
            w.write_u8(ratio_byte(s.ratio));
            w.write_rgba(s.color);
            w.write_u8(ratio_byte(e.ratio));
            w.write_rgba(e.color);
        }
    }

    fn write_morph_fill(w: &mut BitWriter, start: &FillStyle, end: &FillStyle) {
        match (start, end) {
            (FillStyle::Solid(s), FillStyle::Solid(e)) => {
                w.write_u8(0x00);
                w.write_rgba(*s);
                w.write_rgba(*e);
            }
            (FillStyle::LinearGradient(s), FillStyle::LinearGradient(e)) => {
                w.write_u8(0x10);
                Self::write_morph_gradient(w, s, e);
            }
            (FillStyle::RadialGradient(s), FillStyle::RadialGradient(e)) => {
                w.write_u8(0x12);
                Self::write_morph_gradient(w, s, e);
            }
            (
                FillStyle::FocalGradient {
                    gradient: s,
                    focal_point: sf,
                },
                FillStyle::FocalGradient {
                    gradient: e,
                    focal_point: ef,
                },
            ) => {
                w.write_u8(0x13);
                Self::write_morph_gradient(w, s, e);
                w.write_fixed8(*sf);
                w.write_fixed8(*ef);
            }
            (
                FillStyle::Bitmap {
                    bitmap_id,
                    matrix: sm,
                    repeating,
                    smoothed,
                },
                FillStyle::Bitmap { matrix: em, .. },
            ) => {
                w.write_u8(bitmap_code(*repeating, *smoothed));
                w.write_u16(*bitmap_id);
                w.write_matrix(*sm);
                w.write_matrix(*em);
            }
            // Mismatched variants cannot be expressed; fall back to the start color.
            (s, _) => {
                let color = match s {
                    FillStyle::Solid(c) => *c,
                    _ => Rgba::BLACK,
                };
                w.write_u8(0x00);
                w.write_rgba(color);
                w.write_rgba(color);
            }
        }
    }

    pub fn body(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_u16(self.id);
        w.write_rect(self.start_bounds);
        w.write_rect(self.end_bounds);
        if self.version >= 2 {
            w.write_rect(self.start_bounds);
            w.write_rect(self.end_bounds);
            w.write_ubits(6, 0);
            w.write_bit(false);
            w.write_bit(true);
            w.flush_bits();
        }

        let mut rest = BitWriter::new();
        write_array_count(&mut rest, self.fills.len(), 2);
        for (s, e) in &self.fills {
            Self::write_morph_fill(&mut rest, s, e);
        }
        write_array_count(&mut rest, self.lines.len(), 2);
        for (s, e) in &self.lines {
            rest.write_u16(width_twips(s.width));
            rest.write_u16(width_twips(e.width));
            if self.version >= 2 {
                write_line_style_flags(&mut rest, s, false);
            }
            rest.write_rgba(s.color);
            rest.write_rgba(e.color);
        }
        let styles = StyleTable {
            fills: self.fills.iter().map(|(s, _)| s.clone()).collect(),
            lines: self.lines.iter().map(|(s, _)| s.clone()).collect(),
        };
        self.start.write(&mut rest, &styles, 3);
        let rest = rest.into_bytes();

        let mut end = BitWriter::new();
        // End edges carry no style indices.
        self.end.write(&mut end, &StyleTable::default(), 3);
        let end = end.into_bytes();

        w.write_u32(rest.len() as u32);
        w.write_bytes(&rest);
        w.write_bytes(&end);
        w.into_bytes()
    }
}

/// Writes tag headers and bodies.
#[derive(Debug, Default, Clone)]
pub struct TagWriter {
    bytes: Vec<u8>,
}

impl TagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_tag(&mut self, code: TagCode, body: &[u8]) -> &mut Self {
        let code = code.code() << 6;
        if body.len() < 0x3F {
            self.bytes
                .extend_from_slice(&(code | body.len() as u16).to_le_bytes());
        } else {
            self.bytes.extend_from_slice(&(code | 0x3F).to_le_bytes());
            self.bytes
                .extend_from_slice(&(body.len() as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(body);
        self
    }

    pub fn shape(&mut self, shape: &ShapeWriter) -> &mut Self {
        self.write_tag(shape.tag_code(), &shape.body())
    }

    pub fn morph_shape(&mut self, morph: &MorphShapeWriter) -> &mut Self {
        self.write_tag(morph.tag_code(), &morph.body())
    }

    pub fn sprite(&mut self, id: u16, frame_count: u16, control_tags: &TagWriter) -> &mut Self {
        let mut w = BitWriter::new();
        w.write_u16(id);
        w.write_u16(frame_count);
        w.write_bytes(&control_tags.bytes);
        self.write_tag(TagCode::DefineSprite, &w.into_bytes())
    }

    pub fn place_object(&mut self, place: &PlaceObject) -> &mut Self {
        let mut w = BitWriter::new();
        w.write_bit(false);
        w.write_bit(place.clip_depth.is_some());
        w.write_bit(place.name.is_some());
        w.write_bit(place.ratio.is_some());
        w.write_bit(place.color_transform.is_some());
        w.write_bit(place.matrix.is_some());
        w.write_bit(place.character_id.is_some());
        w.write_bit(place.is_move);
        w.write_u16(place.depth);
        if let Some(id) = place.character_id {
            w.write_u16(id);
        }
        if let Some(m) = place.matrix {
            w.write_matrix(m);
        }
        if let Some(cx) = &place.color_transform {
            w.write_color_transform(cx, true);
        }
        if let Some(ratio) = place.ratio {
            w.write_u16((ratio.clamp(0.0, 1.0) * 65535.0).round() as u16);
        }
        if let Some(name) = &place.name {
            w.write_string(name);
        }
        if let Some(depth) = place.clip_depth {
            w.write_u16(depth);
        }
        self.write_tag(TagCode::PlaceObject2, &w.into_bytes())
    }

    pub fn remove_object(&mut self, depth: u16) -> &mut Self {
        self.write_tag(TagCode::RemoveObject2, &depth.to_le_bytes())
    }

    pub fn show_frame(&mut self) -> &mut Self {
        self.write_tag(TagCode::ShowFrame, &[])
    }

    pub fn frame_label(&mut self, label: &str) -> &mut Self {
        let mut w = BitWriter::new();
        w.write_string(label);
        self.write_tag(TagCode::FrameLabel, &w.into_bytes())
    }

    pub fn background(&mut self, color: Rgba) -> &mut Self {
        self.write_tag(TagCode::SetBackgroundColor, &[color.r, color.g, color.b])
    }

    pub fn end(&mut self) -> &mut Self {
        self.write_tag(TagCode::End, &[])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Prepends an uncompressed SWF header to a tag stream.
pub fn movie_bytes(
    version: u8,
    frame_size: Rect,
    frame_rate: f32,
    frame_count: u16,
    tags: &TagWriter,
) -> Vec<u8> {
    let mut header = BitWriter::new();
    header.write_rect(frame_size);
    header.write_u8((frame_rate.fract() * 256.0).round() as u8);
    header.write_u8(frame_rate.trunc() as u8);
    header.write_u16(frame_count);
    let header = header.into_bytes();

    let file_length = 8 + header.len() + tags.bytes.len();
    let mut out = Vec::with_capacity(file_length);
    out.extend_from_slice(b"FWS");
    out.push(version);
    out.extend_from_slice(&(file_length as u32).to_le_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&tags.bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_needed() {
        assert_eq!(sbits_needed(0), 1);
        assert_eq!(sbits_needed(1), 2);
        assert_eq!(sbits_needed(-1), 1);
        assert_eq!(sbits_needed(200), 9);
        assert_eq!(sbits_needed(-256), 9);
        assert_eq!(ubits_needed(0), 0);
        assert_eq!(ubits_needed(1), 1);
        assert_eq!(ubits_needed(255), 8);
    }

    #[test]
    fn test_bit_writer_packs_msb_first() {
        let mut w = BitWriter::new();
        w.write_ubits(3, 0b101);
        w.write_u8(0xFF);
        assert_eq!(w.into_bytes(), vec![0b1010_0000, 0xFF]);
    }
}
