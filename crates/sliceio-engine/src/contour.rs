//! Contour extraction from segmentation masks.
//!
//! Moore-neighbour boundary tracing over the binary mask. Each connected
//! foreground region yields one closed polygon of pixel coordinates,
//! ordered along the boundary. Tracing is deterministic: the same mask
//! always produces the same polygons in the same order.

use crate::engine::SliceMask;
use serde::{Deserialize, Serialize};

/// An ordered list of polygons, each an ordered list of `[x, y]` points.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContourSet {
    pub points: Vec<Vec<[f32; 2]>>,
}

impl ContourSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 8-neighbourhood ring, clockwise in raster coordinates starting west.
const RING: [(i64, i64); 8] = [
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
];

/// Trace the boundary polygons of every foreground region in `mask`.
#[must_use]
pub fn trace_contours(mask: &SliceMask) -> ContourSet {
    let w = mask.width as usize;
    let mut on_contour = vec![false; w * mask.height as usize];
    let mut points = Vec::new();

    for y in 0..mask.height as i64 {
        for x in 0..mask.width as i64 {
            // Start a trace at each untraced boundary pixel entered from
            // the west, the direction the raster scan arrives from.
            if mask.get(x, y)
                && !mask.get(x - 1, y)
                && !on_contour[y as usize * w + x as usize]
            {
                let polygon = trace_from(mask, (x, y), &mut on_contour);
                points.push(polygon);
            }
        }
    }

    ContourSet { points }
}

fn ring_index(from: (i64, i64), to: (i64, i64)) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    RING.iter().position(|&d| d == delta).unwrap_or(0)
}

fn trace_from(mask: &SliceMask, start: (i64, i64), on_contour: &mut [bool]) -> Vec<[f32; 2]> {
    let w = mask.width as usize;
    let mark = |on_contour: &mut [bool], p: (i64, i64)| {
        on_contour[p.1 as usize * w + p.0 as usize] = true;
    };

    let mut polygon = vec![[start.0 as f32, start.1 as f32]];
    mark(on_contour, start);

    let initial_backtrack = (start.0 - 1, start.1);
    let mut current = start;
    let mut backtrack = initial_backtrack;

    // The boundary can visit a pixel more than once (one-pixel-wide
    // bridges), so bound the walk by the ring perimeter limit.
    let limit = 4 * mask.width as usize * mask.height as usize + 8;
    for _ in 0..limit {
        let from = ring_index(current, backtrack);
        let mut advanced = false;

        for k in 1..=8 {
            let d = RING[(from + k) % 8];
            let candidate = (current.0 + d.0, current.1 + d.1);
            if mask.get(candidate.0, candidate.1) {
                let prev = RING[(from + k - 1) % 8];
                backtrack = (current.0 + prev.0, current.1 + prev.1);
                current = candidate;
                advanced = true;
                break;
            }
        }

        if !advanced {
            // Isolated single pixel.
            break;
        }
        if current == start && backtrack == initial_backtrack {
            break;
        }
        polygon.push([current.0 as f32, current.1 as f32]);
        mark(on_contour, current);
    }

    polygon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> SliceMask {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let data = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| c == '#'))
            .collect();
        SliceMask::new(width, height, data)
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        let mask = mask_from(&["....", "....", "...."]);
        assert!(trace_contours(&mask).is_empty());
    }

    #[test]
    fn test_single_pixel() {
        let mask = mask_from(&["....", ".#..", "...."]);
        let contours = trace_contours(&mask);
        assert_eq!(contours.points, vec![vec![[1.0, 1.0]]]);
    }

    #[test]
    fn test_square_boundary() {
        let mask = mask_from(&[".....", ".###.", ".###.", ".###.", "....."]);
        let contours = trace_contours(&mask);
        assert_eq!(contours.points.len(), 1);
        let polygon = &contours.points[0];
        // Boundary ring of a 3x3 square: 8 pixels, interior excluded.
        assert_eq!(polygon.len(), 8);
        assert!(!polygon.contains(&[2.0, 2.0]));
        assert_eq!(polygon[0], [1.0, 1.0]);
    }

    #[test]
    fn test_two_regions_two_polygons() {
        let mask = mask_from(&["##...", "##...", ".....", "...##", "...##"]);
        let contours = trace_contours(&mask);
        assert_eq!(contours.points.len(), 2);
    }

    #[test]
    fn test_tracing_is_deterministic() {
        let mask = mask_from(&[".##..", "####.", ".##..", ".....", "..#.."]);
        assert_eq!(trace_contours(&mask), trace_contours(&mask));
    }
}
