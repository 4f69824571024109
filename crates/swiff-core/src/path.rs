//! Rebuilds drawable paths from shape edge records.
//!
//! Edge records describe each edge once, with the fill on its left (`fill0`)
//! and right (`fill1`) side. A fill region is recovered by collecting every
//! edge that borders the fill, orienting them so the fill is on the right,
//! and chaining them end to start into closed contours.

use crate::renderer::{Fill, FillRule, Paint, RenderPath, Stroke};
use kurbo::{BezPath, Point};
use std::collections::HashMap;
use swiff_data::model::{Segment, ShapeDefinition, ShapePath};

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Point,
    control: Option<Point>,
    to: Point,
}

impl Edge {
    fn reversed(self) -> Edge {
        Edge {
            from: self.to,
            control: self.control,
            to: self.from,
        }
    }

    fn append_to(&self, path: &mut BezPath) {
        match self.control {
            Some(c) => path.quad_to(c, self.to),
            None => path.line_to(self.to),
        }
    }
}

/// Point key for endpoint matching. Shape coordinates come from integer
/// twips, so a fine fixed grid is exact for parsed shapes.
type PointKey = (i64, i64);

fn key(p: Point) -> PointKey {
    ((p.x * 2000.0).round() as i64, (p.y * 2000.0).round() as i64)
}

fn path_edges(path: &ShapePath) -> impl Iterator<Item = Edge> + '_ {
    let mut pen = Point::ZERO;
    path.segments.iter().filter_map(move |segment| match *segment {
        Segment::MoveTo(p) => {
            pen = p;
            None
        }
        Segment::LineTo(to) => {
            let edge = Edge {
                from: pen,
                control: None,
                to,
            };
            pen = to;
            Some(edge)
        }
        Segment::CurveTo { control, to } => {
            let edge = Edge {
                from: pen,
                control: Some(control),
                to,
            };
            pen = to;
            Some(edge)
        }
    })
}

/// Chains oriented edges into contours, preferring the earliest unused
/// continuation so output follows source order.
fn assemble_contours(edges: &[Edge]) -> BezPath {
    let mut by_start: HashMap<PointKey, Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        by_start.entry(key(edge.from)).or_default().push(i);
    }
    let mut used = vec![false; edges.len()];
    let mut path = BezPath::new();

    for first in 0..edges.len() {
        if used[first] {
            continue;
        }
        used[first] = true;
        let start = key(edges[first].from);
        path.move_to(edges[first].from);
        edges[first].append_to(&mut path);
        let mut end = key(edges[first].to);

        while end != start {
            let next = by_start
                .get(&end)
                .and_then(|candidates| candidates.iter().copied().find(|&i| !used[i]));
            let Some(next) = next else {
                break;
            };
            used[next] = true;
            edges[next].append_to(&mut path);
            end = key(edges[next].to);
        }
    }
    path
}

/// Joins edges into polylines, starting a new subpath at each gap.
fn assemble_strokes(edges: &[Edge]) -> BezPath {
    let mut path = BezPath::new();
    let mut pen: Option<PointKey> = None;
    for edge in edges {
        if pen != Some(key(edge.from)) {
            path.move_to(edge.from);
        }
        edge.append_to(&mut path);
        pen = Some(key(edge.to));
    }
    path
}

/// Builds the render paths of a shape: for each style group, one path per
/// fill style in table order, then one per line style in table order.
///
/// Styles with no edges produce no path. The shape is not modified.
pub fn build_paths(shape: &ShapeDefinition) -> Vec<RenderPath> {
    let rule = if shape.uses_fill_winding_rule {
        FillRule::NonZero
    } else {
        FillRule::EvenOdd
    };
    let mut out = Vec::new();

    for (group, table) in shape.styles.iter().enumerate() {
        let group_paths: Vec<&ShapePath> = shape
            .paths
            .iter()
            .filter(|p| p.style_group == group)
            .collect();

        for (index, fill_style) in (1u32..).zip(&table.fills) {
            let mut edges = Vec::new();
            for path in &group_paths {
                if path.fill1 == index {
                    edges.extend(path_edges(path));
                }
                if path.fill0 == index {
                    let reversed: Vec<Edge> = path_edges(path).map(Edge::reversed).collect();
                    edges.extend(reversed.into_iter().rev());
                }
            }
            if edges.is_empty() {
                continue;
            }
            out.push(RenderPath {
                geometry: assemble_contours(&edges),
                fill: Some(Fill {
                    paint: Paint::from_fill_style(fill_style),
                    rule,
                }),
                stroke: None,
            });
        }

        for (index, line_style) in (1u32..).zip(&table.lines) {
            let edges: Vec<Edge> = group_paths
                .iter()
                .filter(|p| p.line == index)
                .flat_map(|p| path_edges(p))
                .collect();
            if edges.is_empty() {
                continue;
            }
            out.push(RenderPath {
                geometry: assemble_strokes(&edges),
                fill: None,
                stroke: Some(Stroke::from_line_style(line_style)),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use swiff_data::model::{FillStyle, LineStyle, Rgba, StyleTable};

    fn shape(styles: StyleTable, paths: Vec<ShapePath>) -> ShapeDefinition {
        ShapeDefinition {
            id: 1,
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            edge_bounds: None,
            uses_fill_winding_rule: false,
            styles: vec![styles],
            paths,
        }
    }

    fn path(fill0: u32, fill1: u32, line: u32, points: &[(f64, f64)]) -> ShapePath {
        let mut segments = vec![Segment::MoveTo(points[0].into())];
        segments.extend(points[1..].iter().map(|p| Segment::LineTo((*p).into())));
        ShapePath {
            style_group: 0,
            fill0,
            fill1,
            line,
            segments,
        }
    }

    fn solid_fills(n: usize) -> StyleTable {
        StyleTable {
            fills: (0..n)
                .map(|i| FillStyle::Solid(Rgba::opaque(i as u8, 0, 0)))
                .collect(),
            lines: vec![],
        }
    }

    #[test]
    fn test_rectangle_round_trip() {
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)];
        let def = shape(solid_fills(1), vec![path(0, 1, 0, &square)]);
        let paths = build_paths(&def);

        assert_eq!(paths.len(), 1);
        let segments = paths[0].segments();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::MoveTo(Point::ZERO));
        assert!(segments[1..].iter().all(|s| matches!(s, Segment::LineTo(_))));
        // Closes back to its start.
        assert_eq!(segments[4].end_point(), Point::ZERO);
        assert_eq!(paths[0].fill.as_ref().map(|f| f.rule), Some(FillRule::EvenOdd));
        // The input is not modified.
        assert_eq!(def.paths[0].segments.len(), 5);
    }

    #[test]
    fn test_fill0_edges_are_reversed_and_chained() {
        // Two edge runs that border fill 1 from opposite sides. Only after
        // reversing the fill0 run do they chain into one closed contour.
        let right = path(0, 1, 0, &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let left = path(1, 0, 0, &[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0)]);
        let def = shape(solid_fills(1), vec![right, left]);
        let paths = build_paths(&def);

        assert_eq!(paths.len(), 1);
        let points: Vec<Point> = paths[0].segments().iter().map(|s| s.end_point()).collect();
        assert_eq!(
            points,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
                Point::new(0.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_shared_edge_borders_two_fills() {
        // A downward edge between two squares: fill 2 (x > 5) on its left,
        // fill 1 (x < 5) on its right.
        let shared = path(2, 1, 0, &[(5.0, 0.0), (5.0, 10.0)]);
        let left_rest = path(0, 1, 0, &[(5.0, 10.0), (0.0, 10.0), (0.0, 0.0), (5.0, 0.0)]);
        let right_rest = path(2, 0, 0, &[(5.0, 10.0), (10.0, 10.0), (10.0, 0.0), (5.0, 0.0)]);
        let def = shape(solid_fills(2), vec![shared, left_rest, right_rest]);
        let paths = build_paths(&def);

        assert_eq!(paths.len(), 2);
        for render in &paths {
            let segments = render.segments();
            assert_eq!(segments.len(), 5, "one closed contour per fill");
            assert_eq!(segments[0].end_point(), segments[4].end_point());
        }
        assert_eq!(
            paths[0].fill.as_ref().map(|f| f.paint.clone()),
            Some(Paint::from_rgba(Rgba::opaque(0, 0, 0)))
        );
    }

    #[test]
    fn test_fills_precede_strokes_and_strokes_join() {
        let mut styles = solid_fills(1);
        styles.lines.push(LineStyle::solid(1.0, Rgba::BLACK));
        let a = path(0, 0, 1, &[(0.0, 0.0), (10.0, 0.0)]);
        let b = path(0, 1, 1, &[(10.0, 0.0), (10.0, 10.0), (0.0, 0.0)]);
        let gap = path(0, 0, 1, &[(20.0, 20.0), (30.0, 20.0)]);
        let def = shape(styles, vec![a, b, gap]);
        let paths = build_paths(&def);

        assert_eq!(paths.len(), 2);
        assert!(paths[0].fill.is_some());
        let stroke = &paths[1];
        assert!(stroke.stroke.is_some());
        let moves = stroke
            .segments()
            .iter()
            .filter(|s| matches!(s, Segment::MoveTo(_)))
            .count();
        assert_eq!(moves, 2);
        assert_eq!(stroke.segments().len(), 6);
    }

    #[test]
    fn test_unused_styles_produce_no_paths() {
        let def = shape(solid_fills(3), vec![path(0, 2, 0, &[(0.0, 0.0), (1.0, 0.0)])]);
        assert_eq!(build_paths(&def).len(), 1);
        assert!(build_paths(&shape(solid_fills(1), vec![])).is_empty());
    }
}
