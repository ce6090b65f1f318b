//! Full-image marker detection: binarize, find dark quads, decode each quad.

use crate::decode::{decode_quad, DecodeConfig};
use crate::{Dictionary, Matcher};
use cuesight_core::{GrayImageView, PixelPoint};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// How the image is split into dark and light before quad search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ThresholdMode {
    /// Single Otsu level for the whole frame.
    Otsu,
    /// Compare each pixel with the mean of its `(2r+1)^2` block.
    Adaptive { block_radius: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerDetectorParams {
    pub threshold: ThresholdMode,
    /// Smallest accepted quad side, in pixels.
    pub min_side_px: f32,
    /// Largest accepted component, as a fraction of the frame's bounding box area.
    pub max_area_frac: f32,
    /// Longest over shortest quad side.
    pub max_side_ratio: f32,
    /// Override the dictionary's correction budget.
    pub max_hamming: Option<u8>,
    pub decode: DecodeConfig,
}

impl Default for MarkerDetectorParams {
    fn default() -> Self {
        Self {
            threshold: ThresholdMode::Otsu,
            min_side_px: 12.0,
            max_area_frac: 0.25,
            max_side_ratio: 4.0,
            max_hamming: None,
            decode: DecodeConfig::default(),
        }
    }
}

/// One decoded marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: u32,
    /// Outer border corners in the marker's own TL, TR, BR, BL order.
    pub corners: [Point2<f32>; 4],
    pub rotation: u8,
    pub hamming: u8,
    pub score: f32,
}

impl DetectedMarker {
    /// Midpoint of the marker's top-left/bottom-right diagonal, on the
    /// integer-truncated corners.
    pub fn center(&self) -> PixelPoint {
        let tl = self.corners[0];
        let br = self.corners[2];
        let (x0, y0) = (tl.x as i32, tl.y as i32);
        let (x1, y1) = (br.x as i32, br.y as i32);
        PixelPoint::new((x0 + x1) / 2, (y0 + y1) / 2)
    }
}

/// Finds and decodes markers of one dictionary.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    matcher: Matcher,
    params: MarkerDetectorParams,
}

impl MarkerDetector {
    pub fn new(dict: Dictionary, params: MarkerDetectorParams) -> Self {
        let max_hamming = params.max_hamming.unwrap_or(dict.max_correction_bits);
        Self {
            matcher: Matcher::new(dict, max_hamming),
            params,
        }
    }

    pub fn params(&self) -> &MarkerDetectorParams {
        &self.params
    }

    pub fn dictionary(&self) -> &Dictionary {
        self.matcher.dictionary()
    }

    /// Detect markers, in the order their dark components are first met by a
    /// row-major scan.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, gray),
            fields(dict = %self.matcher.dictionary().name, width = gray.width(), height = gray.height())
        )
    )]
    pub fn detect(&self, gray: &GrayImage) -> Vec<DetectedMarker> {
        let quads = find_dark_quads(gray, &self.params);
        let view = GrayImageView::from(gray);

        let mut out = Vec::new();
        for quad in &quads {
            let Some(dec) = decode_quad(&view, quad, &self.params.decode, &self.matcher) else {
                continue;
            };
            // With rotation r the marker's own top-left sits at quad corner r.
            let r = dec.rotation as usize;
            let corners = [0, 1, 2, 3].map(|i| quad[(i + r) % 4]);
            out.push(DetectedMarker {
                id: dec.id,
                corners,
                rotation: dec.rotation,
                hamming: dec.hamming,
                score: dec.score,
            });
        }

        log::debug!(
            "{}: {} quad candidates, {} markers decoded",
            self.matcher.dictionary().name,
            quads.len(),
            out.len()
        );
        out
    }
}

/// Binary mask with dark pixels set to 255.
fn dark_mask(gray: &GrayImage, mode: ThresholdMode) -> GrayImage {
    match mode {
        ThresholdMode::Otsu => {
            let level = imageproc::contrast::otsu_level(gray);
            GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                Luma([if gray.get_pixel(x, y).0[0] <= level { 255 } else { 0 }])
            })
        }
        ThresholdMode::Adaptive { block_radius } => {
            let mut light = imageproc::contrast::adaptive_threshold(gray, block_radius.max(1));
            for px in light.pixels_mut() {
                px.0[0] = 255 - px.0[0];
            }
            light
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ComponentStats {
    area: u32,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: f64,
    sum_y: f64,
}

impl ComponentStats {
    fn new(x: u32, y: u32) -> Self {
        Self {
            area: 0,
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: 0.0,
            sum_y: 0.0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += x as f64 + 0.5;
        self.sum_y += y as f64 + 0.5;
    }

    fn centroid(&self) -> Point2<f64> {
        let n = self.area.max(1) as f64;
        Point2::new(self.sum_x / n, self.sum_y / n)
    }
}

/// Quads (TL, TR, BR, BL in image order) around dark connected components.
fn find_dark_quads(gray: &GrayImage, params: &MarkerDetectorParams) -> Vec<[Point2<f32>; 4]> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let mask = dark_mask(gray, params.threshold);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    // Pass 1: per-component statistics, indexed by label - 1 in first-seen order.
    let mut stats: Vec<ComponentStats> = Vec::new();
    for (x, y, l) in labels.enumerate_pixels() {
        let label = l.0[0] as usize;
        if label == 0 {
            continue;
        }
        if stats.len() < label {
            stats.resize(label, ComponentStats::new(x, y));
        }
        stats[label - 1].add(x, y);
    }

    let max_area = params.max_area_frac as f64 * w as f64 * h as f64;
    let min_side = params.min_side_px.max(1.0) as u32;
    let keep: Vec<bool> = stats
        .iter()
        .map(|s| {
            let bw = s.max_x - s.min_x + 1;
            let bh = s.max_y - s.min_y + 1;
            bw >= min_side
                && bh >= min_side
                && (bw as f64 * bh as f64) <= max_area
                && s.min_x > 0
                && s.min_y > 0
                && s.max_x + 1 < w
                && s.max_y + 1 < h
        })
        .collect();

    // Pass 2: boundary pixels of kept components.
    let mut boundary: Vec<Vec<Point2<f64>>> = vec![Vec::new(); stats.len()];
    for (x, y, l) in labels.enumerate_pixels() {
        let label = l.0[0] as usize;
        if label == 0 || !keep[label - 1] {
            continue;
        }
        let on_edge = [(0i32, -1i32), (1, 0), (0, 1), (-1, 0)].iter().any(|&(dx, dy)| {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            nx < 0
                || ny < 0
                || nx >= w as i32
                || ny >= h as i32
                || labels.get_pixel(nx as u32, ny as u32).0[0] as usize != label
        });
        if on_edge {
            boundary[label - 1].push(Point2::new(x as f64 + 0.5, y as f64 + 0.5));
        }
    }

    stats
        .iter()
        .zip(&boundary)
        .filter(|(_, pts)| !pts.is_empty())
        .filter_map(|(s, pts)| quad_from_extremes(pts, s.centroid(), params))
        .collect()
}

/// Four extreme boundary points of a convex-ish blob: the farthest point from
/// the centroid, the farthest point from that one, and the two points farthest
/// on either side of the line joining them.
fn quad_from_extremes(
    pts: &[Point2<f64>],
    centroid: Point2<f64>,
    params: &MarkerDetectorParams,
) -> Option<[Point2<f32>; 4]> {
    let farthest_from = |q: Point2<f64>| {
        pts.iter()
            .copied()
            .max_by(|a, b| (a - q).norm_squared().total_cmp(&(b - q).norm_squared()))
    };

    let p1 = farthest_from(centroid)?;
    let p2 = farthest_from(p1)?;
    let axis = p2 - p1;
    let diag = axis.norm();
    if diag < 1e-6 {
        return None;
    }

    let side_of = |p: &Point2<f64>| (axis.x * (p.y - p1.y) - axis.y * (p.x - p1.x)) / diag;
    let p3 = pts.iter().copied().max_by(|a, b| side_of(a).total_cmp(&side_of(b)))?;
    let p4 = pts.iter().copied().min_by(|a, b| side_of(a).total_cmp(&side_of(b)))?;

    // Both off-diagonal corners must stand well clear of the diagonal.
    if side_of(&p3) < 0.2 * diag || -side_of(&p4) < 0.2 * diag {
        return None;
    }

    let mut quad = [p1, p3, p2, p4];
    // Push pixel centres out to the pixel's outer corner.
    for p in &mut quad {
        let d = *p - centroid;
        p.x += 0.5 * d.x.signum();
        p.y += 0.5 * d.y.signum();
    }

    // Clockwise in image coordinates (y down), starting nearest to atan2 = -135deg.
    quad.sort_by(|a, b| {
        let ta = (a.y - centroid.y).atan2(a.x - centroid.x);
        let tb = (b.y - centroid.y).atan2(b.x - centroid.x);
        ta.total_cmp(&tb)
    });

    let sides: Vec<f64> = (0..4).map(|i| (quad[(i + 1) % 4] - quad[i]).norm()).collect();
    let shortest = sides.iter().copied().fold(f64::INFINITY, f64::min);
    let longest = sides.iter().copied().fold(0.0, f64::max);
    if shortest < params.min_side_px as f64 || longest > params.max_side_ratio as f64 * shortest {
        return None;
    }

    Some(quad.map(|p| Point2::new(p.x as f32, p.y as f32)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::builtin_dictionary;
    use crate::render::render_marker;
    use image::imageops;

    fn scene(dict: &Dictionary, placements: &[(u32, i64, i64)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(400, 300, Luma([200]));
        for &(id, x, y) in placements {
            let m = render_marker(dict, id, 8, 1).unwrap();
            imageops::overlay(&mut img, &m, x, y);
        }
        img
    }

    #[test]
    fn finds_markers_in_scan_order_with_centers() {
        let dict = builtin_dictionary("DICT_5X5_50").unwrap();
        let img = scene(&dict, &[(3, 40, 30), (11, 250, 40), (20, 60, 180)]);
        let det = MarkerDetector::new(dict, MarkerDetectorParams::default());

        let found = det.detect(&img);
        let ids: Vec<u32> = found.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 11, 20]);

        // 5x5 + border = 7 cells of 8px, after a one-cell quiet zone.
        let m = &found[0];
        assert_eq!(m.rotation, 0);
        assert!((m.corners[0].x - 48.0).abs() <= 1.0);
        assert!((m.corners[0].y - 38.0).abs() <= 1.0);
        assert!((m.corners[2].x - 104.0).abs() <= 1.0);
        let c = m.center();
        assert!((c.x - 76).abs() <= 1 && (c.y - 66).abs() <= 1, "{c:?}");
    }

    #[test]
    fn rotated_marker_reports_its_own_top_left() {
        let dict = builtin_dictionary("DICT_4X4_50").unwrap();
        let marker = render_marker(&dict, 9, 8, 1).unwrap();
        let turned = imageops::rotate180(&marker);
        let mut img = GrayImage::from_pixel(200, 200, Luma([220]));
        imageops::overlay(&mut img, &turned, 50, 60);

        let found = MarkerDetector::new(dict, MarkerDetectorParams::default()).detect(&img);
        assert_eq!(found.len(), 1);
        let m = &found[0];
        assert_eq!((m.id, m.rotation), (9, 2));
        // Marker TL now shows up at the image bottom-right of the quad.
        assert!(m.corners[0].x > m.corners[2].x);
        assert!(m.corners[0].y > m.corners[2].y);
    }

    #[test]
    fn plain_dark_squares_are_not_markers() {
        let dict = builtin_dictionary("DICT_4X4_50").unwrap();
        let mut img = GrayImage::from_pixel(200, 200, Luma([230]));
        imageproc::drawing::draw_filled_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(50, 50).of_size(60, 60),
            Luma([10]),
        );
        let found = MarkerDetector::new(dict, MarkerDetectorParams::default()).detect(&img);
        assert!(found.is_empty());
    }
}
