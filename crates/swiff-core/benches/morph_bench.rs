use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kurbo::{Point, Rect};
use swiff_core::morph::interpolate;
use swiff_core::path::build_paths;
use swiff_data::model::{
    FillStyle, LineStyle, MorphShapeDefinition, Rgba, Segment, ShapeDefinition, ShapePath,
    StyleTable,
};

// A closed polygon of `edges` curved edges on a circle of `radius`.
fn polygon(edges: usize, radius: f64) -> ShapeDefinition {
    let at = |i: usize, r: f64| {
        let angle = i as f64 / edges as f64 * std::f64::consts::TAU;
        Point::new(r * angle.cos(), r * angle.sin())
    };
    let mut segments = vec![Segment::MoveTo(at(0, radius))];
    for i in 0..edges {
        segments.push(Segment::CurveTo {
            control: at(i, radius * 1.1),
            to: at(i + 1, radius),
        });
    }
    // Snap the last anchor onto the start so the contour closes exactly.
    if let Some(Segment::CurveTo { to, .. }) = segments.last_mut() {
        *to = at(0, radius);
    }
    ShapeDefinition {
        id: 1,
        bounds: Rect::new(-radius, -radius, radius, radius),
        edge_bounds: None,
        uses_fill_winding_rule: false,
        styles: vec![StyleTable {
            fills: vec![FillStyle::Solid(Rgba::opaque(200, 20, 20))],
            lines: vec![LineStyle::solid(1.0, Rgba::BLACK)],
        }],
        paths: vec![ShapePath {
            style_group: 0,
            fill0: 0,
            fill1: 1,
            line: 1,
            segments,
        }],
    }
}

fn bench_morph(c: &mut Criterion) {
    let mut group = c.benchmark_group("morph");

    for &edges in &[16usize, 256, 4096] {
        let morph = MorphShapeDefinition::new(1, polygon(edges, 10.0), polygon(edges, 50.0))
            .expect("aligned polygons");
        group.bench_with_input(BenchmarkId::new("interpolate", edges), &morph, |b, m| {
            b.iter(|| interpolate(m, 0.37))
        });
        let shape = interpolate(&morph, 0.37);
        group.bench_with_input(BenchmarkId::new("build_paths", edges), &shape, |b, s| {
            b.iter(|| build_paths(s))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_morph);
criterion_main!(benches);
