//! Hough-gradient circle detection.
//!
//! Every Canny edge pixel casts votes along both directions of its Sobel
//! gradient, for distances in `[min_radius, max_radius]`, into an accumulator
//! whose cells are `dp` pixels wide. Cells whose 3x3 neighbourhood collects at
//! least `min_votes` and that are local maxima become center candidates, taken
//! strongest first and kept only if farther than `min_dist` from every center
//! already accepted. Each center is refined to the centroid of its votes, and
//! its radius is the distance most supported by edge pixels.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughParams {
    /// Inverse accumulator resolution: one cell covers `dp x dp` pixels.
    pub dp: f32,
    /// Minimum distance between accepted centers.
    pub min_dist: f32,
    pub min_radius: u32,
    pub max_radius: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Votes a candidate's 3x3 accumulator neighbourhood must collect.
    pub min_votes: u32,
    /// Fraction of the circumference that must be backed by edge pixels.
    pub min_support: f32,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            dp: 7.0,
            min_dist: 50.0,
            min_radius: 15,
            max_radius: 70,
            canny_low: 50.0,
            canny_high: 100.0,
            min_votes: 100,
            min_support: 0.4,
        }
    }
}

impl HoughParams {
    /// Same thresholds with different geometry bounds.
    pub fn with_geometry(dp: f32, min_dist: f32, min_radius: u32, max_radius: u32) -> Self {
        Self {
            dp,
            min_dist,
            min_radius,
            max_radius,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Accumulator votes in the candidate's neighbourhood.
    pub votes: u32,
}

#[derive(Clone, Copy, Default)]
struct Cell {
    votes: u32,
    sum_x: f32,
    sum_y: f32,
}

struct Accumulator {
    cols: usize,
    rows: usize,
    dp: f32,
    cells: Vec<Cell>,
}

impl Accumulator {
    fn new(width: u32, height: u32, dp: f32) -> Self {
        let cols = (width as f32 / dp).ceil() as usize + 1;
        let rows = (height as f32 / dp).ceil() as usize + 1;
        Self {
            cols,
            rows,
            dp,
            cells: vec![Cell::default(); cols * rows],
        }
    }

    #[inline]
    fn vote(&mut self, x: f32, y: f32) {
        if x < 0.0 || y < 0.0 {
            return;
        }
        let (c, r) = ((x / self.dp) as usize, (y / self.dp) as usize);
        if c >= self.cols || r >= self.rows {
            return;
        }
        let cell = &mut self.cells[r * self.cols + c];
        cell.votes += 1;
        cell.sum_x += x;
        cell.sum_y += y;
    }

    /// 3x3 neighbourhood totals.
    fn neighbourhood(&self) -> Vec<Cell> {
        let mut out = vec![Cell::default(); self.cells.len()];
        for r in 0..self.rows {
            for c in 0..self.cols {
                let acc = &mut out[r * self.cols + c];
                for nr in r.saturating_sub(1)..(r + 2).min(self.rows) {
                    for nc in c.saturating_sub(1)..(c + 2).min(self.cols) {
                        let src = self.cells[nr * self.cols + nc];
                        acc.votes += src.votes;
                        acc.sum_x += src.sum_x;
                        acc.sum_y += src.sum_y;
                    }
                }
            }
        }
        out
    }
}

/// Detect circles, strongest first.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(gray, params), fields(width = gray.width(), height = gray.height()))
)]
pub fn find_circles(gray: &GrayImage, params: &HoughParams) -> Vec<Circle> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 || params.max_radius < params.min_radius || params.max_radius == 0 {
        return Vec::new();
    }
    let dp = params.dp.max(1.0);
    let low = params.canny_low.min(params.canny_high);

    let edges = canny(gray, low, params.canny_high);
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    let mut edge_pts: Vec<(f32, f32)> = Vec::new();
    let mut acc = Accumulator::new(w, h, dp);
    let r_min = params.min_radius.max(1) as f32;
    let r_max = params.max_radius as f32;

    for (x, y, e) in edges.enumerate_pixels() {
        if e.0[0] == 0 {
            continue;
        }
        edge_pts.push((x as f32, y as f32));

        let dx = gx.get_pixel(x, y).0[0] as f32;
        let dy = gy.get_pixel(x, y).0[0] as f32;
        let mag = dx.hypot(dy);
        if mag < 1e-3 {
            continue;
        }
        let (ux, uy) = (dx / mag, dy / mag);

        // One vote per accumulator cell crossed, in both directions.
        let mut r = r_min;
        while r <= r_max {
            acc.vote(x as f32 + ux * r, y as f32 + uy * r);
            acc.vote(x as f32 - ux * r, y as f32 - uy * r);
            r += dp;
        }
    }
    if edge_pts.is_empty() {
        return Vec::new();
    }

    let hood = acc.neighbourhood();
    let mut candidates: Vec<(usize, u32)> = Vec::new();
    for r in 0..acc.rows {
        for c in 0..acc.cols {
            let idx = r * acc.cols + c;
            let v = hood[idx].votes;
            if v < params.min_votes.max(1) {
                continue;
            }
            // Strict against earlier neighbours, non-strict against later ones.
            let is_peak = (r.saturating_sub(1)..(r + 2).min(acc.rows)).all(|nr| {
                (c.saturating_sub(1)..(c + 2).min(acc.cols)).all(|nc| {
                    let nidx = nr * acc.cols + nc;
                    nidx == idx
                        || (nidx < idx && hood[nidx].votes < v)
                        || (nidx > idx && hood[nidx].votes <= v)
                })
            });
            if is_peak {
                candidates.push((idx, v));
            }
        }
    }
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let min_dist_sq = params.min_dist * params.min_dist;
    let mut out: Vec<Circle> = Vec::new();
    for (idx, votes) in candidates {
        let cell = hood[idx];
        let cx = cell.sum_x / cell.votes as f32;
        let cy = cell.sum_y / cell.votes as f32;

        if out.iter().any(|c| {
            let (ddx, ddy) = (c.x - cx, c.y - cy);
            ddx * ddx + ddy * ddy < min_dist_sq
        }) {
            continue;
        }

        let Some(radius) = estimate_radius(&edge_pts, cx, cy, params) else {
            continue;
        };
        out.push(Circle {
            x: cx,
            y: cy,
            radius,
            votes,
        });
    }

    log::debug!(
        "hough: {} edge pixels, {} circles (dp={}, r={}..{})",
        edge_pts.len(),
        out.len(),
        dp,
        params.min_radius,
        params.max_radius
    );
    out
}

/// Radius with the most edge pixels at that distance (1px bins, smoothed over
/// three bins), normalised by circumference so large rings of clutter do not win.
fn estimate_radius(edge_pts: &[(f32, f32)], cx: f32, cy: f32, params: &HoughParams) -> Option<f32> {
    let r_min = params.min_radius.max(1) as usize;
    let r_max = params.max_radius as usize;
    let mut hist = vec![0u32; r_max + 2];

    for &(x, y) in edge_pts {
        let d = (x - cx).hypot(y - cy).round() as usize;
        if d + 1 >= r_min && d <= r_max + 1 {
            hist[d.min(r_max + 1)] += 1;
        }
    }

    let mut best: Option<(usize, u32, f32)> = None;
    for r in r_min..=r_max {
        let support = hist[r - 1] + hist[r] + hist[r + 1];
        let score = support as f32 / r as f32;
        if best.is_none_or(|(_, _, s)| score > s) {
            best = Some((r, support, score));
        }
    }

    let (r, support, _) = best?;
    let needed = params.min_support * std::f32::consts::TAU * r as f32;
    if (support as f32) < needed {
        return None;
    }
    // Sub-pixel: weighted mean of the three bins.
    let w = [hist[r - 1], hist[r], hist[r + 1]].map(|v| v as f32);
    let refined = ((r - 1) as f32 * w[0] + r as f32 * w[1] + (r + 1) as f32 * w[2])
        / (w[0] + w[1] + w[2]).max(1.0);
    Some(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    fn disc_image(w: u32, h: u32, discs: &[(i32, i32, i32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([0]));
        for &(x, y, r) in discs {
            draw_filled_circle_mut(&mut img, (x, y), r, Luma([220]));
        }
        img
    }

    #[test]
    fn finds_single_disc() {
        let img = disc_image(400, 300, &[(200, 150, 30)]);
        let circles = find_circles(&img, &HoughParams::default());
        assert_eq!(circles.len(), 1, "{circles:?}");
        let c = circles[0];
        assert!((c.x - 200.0).abs() < 3.0 && (c.y - 150.0).abs() < 3.0, "{c:?}");
        assert!((c.radius - 30.0).abs() < 3.0, "{c:?}");
    }

    #[test]
    fn separates_distant_discs_and_orders_by_votes() {
        let img = disc_image(480, 320, &[(100, 100, 20), (330, 200, 40)]);
        let params = HoughParams::with_geometry(4.0, 50.0, 15, 60);
        let circles = find_circles(&img, &params);
        assert_eq!(circles.len(), 2, "{circles:?}");
        // The larger disc has more edge pixels and comes first.
        assert!((circles[0].x - 330.0).abs() < 3.0);
        assert!((circles[1].x - 100.0).abs() < 3.0);
        assert!(circles[0].votes >= circles[1].votes);
    }

    #[test]
    fn blank_image_has_no_circles() {
        let img = GrayImage::new(200, 200);
        assert!(find_circles(&img, &HoughParams::default()).is_empty());
    }

    #[test]
    fn straight_edges_are_not_circles() {
        let mut img = GrayImage::from_pixel(300, 200, Luma([0]));
        imageproc::drawing::draw_filled_rect_mut(
            &mut img,
            imageproc::rect::Rect::at(60, 40).of_size(180, 120),
            Luma([220]),
        );
        assert!(find_circles(&img, &HoughParams::default()).is_empty());
    }
}
