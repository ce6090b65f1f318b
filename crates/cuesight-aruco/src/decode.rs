//! Reading marker bits from an image quad.

use crate::threshold::otsu_level_of_samples;
use crate::Matcher;
use cuesight_core::{homography_from_4pt, GrayImageView, Homography};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Bit sampling configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Marker border width in cells.
    pub border_bits: usize,
    /// Fraction of a cell ignored around each sample point's cell edge.
    ///
    /// Samples are averaged over the central `1 - 2 * cell_margin` part of
    /// each cell.
    pub cell_margin: f32,
    /// Require at least this fraction of border cells to read black.
    pub min_border_score: f32,
    /// Also try reading the quad with inverted polarity (white-on-black prints).
    pub allow_inverted: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            border_bits: 1,
            cell_margin: 0.2,
            min_border_score: 0.85,
            allow_inverted: false,
        }
    }
}

/// Bits and match read from one quad.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadDecode {
    pub id: u32,
    /// Clockwise quarter turns of the marker relative to the quad's corner order.
    pub rotation: u8,
    pub hamming: u8,
    /// `border_score` scaled down by the fraction of corrected bits.
    pub score: f32,
    pub border_score: f32,
    /// Observed inner bits (row-major, black = 1).
    pub code: u64,
    pub inverted: bool,
}

// Canonical cell size of the sampling square.
const CELL_UNITS: f32 = 16.0;
// Sub-samples per cell axis.
const SUBSAMPLES: usize = 3;

/// Decode the marker whose outer border is the quad `corners` (TL, TR, BR, BL
/// in image order, clockwise).
pub fn decode_quad(
    image: &GrayImageView<'_>,
    corners: &[Point2<f32>; 4],
    cfg: &DecodeConfig,
    matcher: &Matcher,
) -> Option<QuadDecode> {
    let bits = matcher.dictionary().marker_size;
    let cells = bits + 2 * cfg.border_bits;
    if bits * bits > 64 || cells == 0 {
        return None;
    }

    let side = cells as f32 * CELL_UNITS;
    let square = [
        Point2::new(0.0, 0.0),
        Point2::new(side, 0.0),
        Point2::new(side, side),
        Point2::new(0.0, side),
    ];
    let h = homography_from_4pt(&square, corners)?;

    let samples = sample_cells(image, &h, cells, cfg.cell_margin)?;
    let obs = decode_samples(&samples, cells, bits, cfg)?;

    let m = matcher.match_code(obs.code)?;
    let bit_count = matcher.dictionary().bit_count().max(1) as f32;
    let ham_pen = 1.0 - (m.hamming as f32 / bit_count);
    Some(QuadDecode {
        id: m.id,
        rotation: m.rotation,
        hamming: m.hamming,
        score: (obs.border_score * ham_pen).clamp(0.0, 1.0),
        border_score: obs.border_score,
        code: obs.code,
        inverted: obs.inverted,
    })
}

#[derive(Clone, Copy, Debug)]
struct MarkerObservation {
    code: u64,
    border_score: f32,
    inverted: bool,
}

// Mean intensity of each cell (row-major), from a SUBSAMPLES^2 grid inside
// the cell's central region.
fn sample_cells(
    image: &GrayImageView<'_>,
    h: &Homography,
    cells: usize,
    margin: f32,
) -> Option<Vec<u8>> {
    let margin = margin.clamp(0.0, 0.45);
    let inner = CELL_UNITS * (1.0 - 2.0 * margin);
    let step = inner / SUBSAMPLES as f32;

    let mut out = Vec::with_capacity(cells * cells);
    for cy in 0..cells {
        for cx in 0..cells {
            let x0 = cx as f32 * CELL_UNITS + margin * CELL_UNITS;
            let y0 = cy as f32 * CELL_UNITS + margin * CELL_UNITS;
            let mut sum = 0u32;
            for sy in 0..SUBSAMPLES {
                for sx in 0..SUBSAMPLES {
                    let p = Point2::new(
                        x0 + (sx as f32 + 0.5) * step,
                        y0 + (sy as f32 + 0.5) * step,
                    );
                    sum += pixel_at(image, h.apply(p))? as u32;
                }
            }
            out.push((sum / (SUBSAMPLES * SUBSAMPLES) as u32) as u8);
        }
    }
    Some(out)
}

#[inline]
fn pixel_at(img: &GrayImageView<'_>, p: Point2<f32>) -> Option<u8> {
    if !p.x.is_finite() || !p.y.is_finite() || p.x < 0.0 || p.y < 0.0 {
        return None;
    }
    let (x, y) = (p.x as usize, p.y as usize);
    if x >= img.width || y >= img.height {
        return None;
    }
    Some(img.data[y * img.width + x])
}

fn decode_samples(
    samples: &[u8],
    cells: usize,
    bits: usize,
    cfg: &DecodeConfig,
) -> Option<MarkerObservation> {
    if samples.len() != cells * cells {
        return None;
    }
    let thr = otsu_level_of_samples(samples)?;
    let border = cfg.border_bits;
    let use_border = border > 0;

    let polarities: &[bool] = if cfg.allow_inverted {
        &[false, true]
    } else {
        &[false]
    };

    let mut best: Option<MarkerObservation> = None;
    for &inverted in polarities {
        let mut border_ok = 0u32;
        let mut border_total = 0u32;
        let mut code: u64 = 0;

        for cy in 0..cells {
            for cx in 0..cells {
                let is_black = (samples[cy * cells + cx] <= thr) != inverted;

                let in_border = cx < border
                    || cy < border
                    || cx >= cells - border
                    || cy >= cells - border;
                if use_border && in_border {
                    border_total += 1;
                    border_ok += is_black as u32;
                } else if is_black {
                    let idx = (cy - border) * bits + (cx - border);
                    code |= 1u64 << idx;
                }
            }
        }

        let border_score = if use_border {
            border_ok as f32 / border_total.max(1) as f32
        } else {
            1.0
        };
        if border_score < cfg.min_border_score {
            continue;
        }
        if best.is_none_or(|b| border_score > b.border_score) {
            best = Some(MarkerObservation {
                code,
                border_score,
                inverted,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::builtin_dictionary;
    use crate::render::render_marker;
    use crate::rotate_code_u64;
    use cuesight_core::GrayImage;

    fn to_core(img: &image::GrayImage) -> GrayImage {
        GrayImage {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw().clone(),
        }
    }

    fn full_quad(side: f32) -> [Point2<f32>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn decodes_axis_aligned_marker() {
        let dict = builtin_dictionary("DICT_5X5_50").unwrap();
        let img = to_core(&render_marker(&dict, 13, 10, 0).unwrap());
        let matcher = Matcher::with_default_correction(dict);

        let side = img.width as f32;
        let det = decode_quad(&img.view(), &full_quad(side), &DecodeConfig::default(), &matcher)
            .expect("decode");
        assert_eq!(det.id, 13);
        assert_eq!(det.rotation, 0);
        assert_eq!(det.hamming, 0);
        assert!(det.border_score > 0.99);
    }

    #[test]
    fn reports_rotation_of_turned_marker() {
        let dict = builtin_dictionary("DICT_4X4_50").unwrap();
        let img = render_marker(&dict, 5, 8, 0).unwrap();
        let turned = to_core(&image::imageops::rotate90(&img));
        let matcher = Matcher::with_default_correction(dict.clone());

        let side = turned.width as f32;
        let det = decode_quad(&turned.view(), &full_quad(side), &DecodeConfig::default(), &matcher)
            .expect("decode");
        assert_eq!(det.id, 5);
        assert_eq!(det.rotation, 1);
        assert_eq!(
            det.code,
            rotate_code_u64(dict.codes[5], dict.marker_size, 1)
        );
    }

    #[test]
    fn blank_quad_is_rejected() {
        let dict = builtin_dictionary("DICT_4X4_50").unwrap();
        let matcher = Matcher::with_default_correction(dict);
        let img = GrayImage {
            width: 60,
            height: 60,
            data: vec![255; 3600],
        };
        assert!(decode_quad(&img.view(), &full_quad(60.0), &DecodeConfig::default(), &matcher)
            .is_none());
    }
}
