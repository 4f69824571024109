use crate::morph::{clamp_ratio, interpolate};
use crate::path::build_paths;
use crate::renderer::RenderPath;
use std::collections::HashMap;
use std::sync::Arc;
use swiff_data::model::{MorphShapeDefinition, ShapeDefinition};

/// Memoizes built paths per shape id and per (morph id, quantized ratio).
#[derive(Debug, Default)]
pub struct PathCache {
    cache_shapes: bool,
    morph_steps: u32,
    shapes: HashMap<u16, Arc<Vec<RenderPath>>>,
    morphs: HashMap<(u16, u32), Arc<Vec<RenderPath>>>,
}

impl PathCache {
    /// `morph_steps` is the number of ratio buckets per morph; 0 disables
    /// morph caching and interpolates at the exact ratio.
    pub fn new(cache_shapes: bool, morph_steps: u32) -> Self {
        Self {
            cache_shapes,
            morph_steps,
            shapes: HashMap::new(),
            morphs: HashMap::new(),
        }
    }

    pub fn shape_paths(&mut self, shape: &ShapeDefinition) -> Arc<Vec<RenderPath>> {
        if !self.cache_shapes {
            return Arc::new(build_paths(shape));
        }
        self.shapes
            .entry(shape.id)
            .or_insert_with(|| Arc::new(build_paths(shape)))
            .clone()
    }

    /// With caching enabled the ratio snaps to the nearest bucket.
    pub fn morph_paths(&mut self, morph: &MorphShapeDefinition, ratio: f32) -> Arc<Vec<RenderPath>> {
        let ratio = clamp_ratio(ratio);
        if self.morph_steps == 0 {
            return Arc::new(build_paths(&interpolate(morph, ratio)));
        }
        let steps = self.morph_steps;
        let bucket = (ratio * steps as f32).round() as u32;
        self.morphs
            .entry((morph.id(), bucket))
            .or_insert_with(|| {
                let snapped = bucket as f32 / steps as f32;
                Arc::new(build_paths(&interpolate(morph, snapped)))
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.shapes.len() + self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
        self.morphs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Point, Rect};
    use swiff_data::model::{FillStyle, Rgba, Segment, ShapePath, StyleTable};

    fn triangle(id: u16, scale: f64) -> ShapeDefinition {
        ShapeDefinition {
            id,
            bounds: Rect::new(0.0, 0.0, scale, scale),
            edge_bounds: None,
            uses_fill_winding_rule: false,
            styles: vec![StyleTable {
                fills: vec![FillStyle::Solid(Rgba::BLACK)],
                lines: vec![],
            }],
            paths: vec![ShapePath {
                style_group: 0,
                fill0: 0,
                fill1: 1,
                line: 0,
                segments: vec![
                    Segment::MoveTo(Point::ZERO),
                    Segment::LineTo(Point::new(scale, 0.0)),
                    Segment::LineTo(Point::new(scale, scale)),
                    Segment::LineTo(Point::ZERO),
                ],
            }],
        }
    }

    #[test]
    fn test_shape_paths_are_shared() {
        let mut cache = PathCache::new(true, 0);
        let shape = triangle(1, 10.0);
        let a = cache.shape_paths(&shape);
        let b = cache.shape_paths(&shape);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_morph_ratio_buckets() {
        let morph =
            MorphShapeDefinition::new(2, triangle(2, 10.0), triangle(2, 20.0)).unwrap();
        let mut cache = PathCache::new(true, 10);
        let a = cache.morph_paths(&morph, 0.51);
        let b = cache.morph_paths(&morph, 0.49);
        assert!(Arc::ptr_eq(&a, &b));
        // Snapped to 0.5.
        let last = a[0].segments()[2].end_point();
        assert_eq!(last, Point::new(15.0, 15.0));

        let mut uncached = PathCache::new(false, 0);
        let exact = uncached.morph_paths(&morph, 0.51);
        assert!(uncached.is_empty());
        assert_ne!(exact[0].segments()[2].end_point(), last);
    }
}
