//! Table-felt removal and border black-out.

use crate::dominant::{dominant_color, KMeansParams};
use cuesight_core::{Bgr, ColorBand};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableColor {
    Green,
    Blue,
    Red,
}

/// How the felt color was judged for one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TableClassification {
    Classified { color: TableColor, dominant: Bgr },
    /// No channel strictly dominated; nothing was masked.
    Ambiguous { dominant: Bgr },
    /// Color masking was not requested.
    Skipped,
}

/// Felt color bands, one per supported table color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBands {
    pub green: ColorBand,
    pub blue: ColorBand,
    pub red: ColorBand,
}

impl TableBands {
    pub fn band(&self, color: TableColor) -> ColorBand {
        match color {
            TableColor::Green => self.green,
            TableColor::Blue => self.blue,
            TableColor::Red => self.red,
        }
    }
}

/// Disc radius that closes the felt mask when none is configured.
pub const DEFAULT_CLOSING_RADIUS: u8 = 20;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackgroundParams {
    pub bands: TableBands,
    /// Radius of the disc used to close gaps in the felt mask.
    #[serde(default = "default_closing_radius")]
    pub closing_radius: u8,
    #[serde(default)]
    pub kmeans: KMeansParams,
}

fn default_closing_radius() -> u8 {
    DEFAULT_CLOSING_RADIUS
}

impl BackgroundParams {
    pub fn new(bands: TableBands) -> Self {
        Self {
            bands,
            closing_radius: default_closing_radius(),
            kmeans: KMeansParams::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BackgroundRemoval {
    pub image: RgbImage,
    pub table: TableClassification,
}

/// Felt color from the dominant color: the one channel strictly above both others.
pub fn classify_table(c: Bgr) -> Option<TableColor> {
    if c.g > c.b && c.g > c.r {
        Some(TableColor::Green)
    } else if c.b > c.g && c.b > c.r {
        Some(TableColor::Blue)
    } else if c.r > c.g && c.r > c.b {
        Some(TableColor::Red)
    } else {
        None
    }
}

/// Remove the table felt and black out the rig's border and corner artifacts.
///
/// Unless `contour_only`, pixels inside the (closed) felt mask are zeroed.
/// Then black bands `rect_offset` wide are painted along all four edges,
/// followed by black discs of radius `circ_offset` on the four corners.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, params), fields(width = image.width(), height = image.height()))
)]
pub fn remove_background(
    image: &RgbImage,
    params: &BackgroundParams,
    rect_offset: u32,
    circ_offset: u32,
    contour_only: bool,
) -> BackgroundRemoval {
    let (mut out, table) = if contour_only {
        (image.clone(), TableClassification::Skipped)
    } else {
        mask_felt(image, params)
    };
    black_out_borders(&mut out, rect_offset, circ_offset);
    BackgroundRemoval { image: out, table }
}

fn mask_felt(image: &RgbImage, params: &BackgroundParams) -> (RgbImage, TableClassification) {
    let dominant = dominant_color(image, &params.kmeans);
    let Some(color) = classify_table(dominant) else {
        // An unrecognised felt leaves every pixel in place.
        log::warn!("table color not recognised (dominant {dominant:?}); masking disabled");
        return (image.clone(), TableClassification::Ambiguous { dominant });
    };
    let band = params.bands.band(color);
    let table = TableClassification::Classified { color, dominant };
    log::debug!("table classification: {table:?}");

    let felt = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([if band.contains_rgb(*image.get_pixel(x, y)) { 255 } else { 0 }])
    });
    let felt = imageproc::morphology::close(&felt, Norm::L2, params.closing_radius);

    let mut out = image.clone();
    for (px, m) in out.pixels_mut().zip(felt.pixels()) {
        if m.0[0] != 0 {
            *px = Rgb([0, 0, 0]);
        }
    }
    (out, table)
}

/// Paint the black edge bands, then the black corner discs.
pub fn black_out_borders(img: &mut RgbImage, rect_offset: u32, circ_offset: u32) {
    let (w, h) = img.dimensions();
    let black = Rgb([0u8, 0, 0]);

    if rect_offset > 0 && w > 0 && h > 0 {
        let t = rect_offset.min(w).min(h);
        let bands = [
            Rect::at(0, 0).of_size(w, t),
            Rect::at(0, (h - t) as i32).of_size(w, t),
            Rect::at(0, 0).of_size(t, h),
            Rect::at((w - t) as i32, 0).of_size(t, h),
        ];
        for r in bands {
            draw_filled_rect_mut(img, r, black);
        }
    }

    if circ_offset > 0 {
        let r = circ_offset as i32;
        let (wi, hi) = (w as i32, h as i32);
        for center in [(0, 0), (wi, 0), (0, hi), (wi, hi)] {
            draw_filled_circle_mut(img, center, r, black);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> TableBands {
        TableBands {
            green: ColorBand::new(Bgr::new(0, 100, 0), Bgr::new(120, 255, 120)),
            blue: ColorBand::new(Bgr::new(100, 0, 0), Bgr::new(255, 120, 120)),
            red: ColorBand::new(Bgr::new(0, 0, 100), Bgr::new(120, 120, 255)),
        }
    }

    #[test]
    fn channel_dominance_is_strict() {
        assert_eq!(classify_table(Bgr::new(10, 200, 30)), Some(TableColor::Green));
        assert_eq!(classify_table(Bgr::new(200, 10, 30)), Some(TableColor::Blue));
        assert_eq!(classify_table(Bgr::new(10, 20, 30)), Some(TableColor::Red));
        assert_eq!(classify_table(Bgr::new(10, 200, 200)), None);
        assert_eq!(classify_table(Bgr::new(50, 50, 50)), None);
    }

    #[test]
    fn all_felt_image_becomes_black() {
        let img = RgbImage::from_pixel(120, 90, Rgb([40, 160, 50]));
        let out = remove_background(&img, &BackgroundParams::new(bands()), 5, 12, false);
        assert!(matches!(
            out.table,
            TableClassification::Classified {
                color: TableColor::Green,
                ..
            }
        ));
        assert!(out.image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn objects_larger_than_the_closing_disc_survive() {
        let mut img = RgbImage::from_pixel(200, 160, Rgb([40, 160, 50]));
        draw_filled_circle_mut(&mut img, (100, 80), 40, Rgb([250, 250, 250]));
        let mut params = BackgroundParams::new(bands());
        params.closing_radius = 5;

        let out = remove_background(&img, &params, 0, 0, false);
        assert_eq!(out.image.get_pixel(100, 80).0, [250, 250, 250]);
        assert_eq!(out.image.get_pixel(10, 10).0, [0, 0, 0]);
    }

    #[test]
    fn ambiguous_table_keeps_pixels_but_still_blacks_out_borders() {
        let img = RgbImage::from_pixel(100, 80, Rgb([90, 90, 90]));
        let out = remove_background(&img, &BackgroundParams::new(bands()), 4, 10, false);
        assert!(matches!(out.table, TableClassification::Ambiguous { .. }));
        assert_eq!(out.image.get_pixel(50, 40).0, [90, 90, 90]);
        assert_eq!(out.image.get_pixel(2, 40).0, [0, 0, 0]);
        assert_eq!(out.image.get_pixel(50, 78).0, [0, 0, 0]);
        // Inside the corner disc but outside the edge bands.
        assert_eq!(out.image.get_pixel(6, 6).0, [0, 0, 0]);
        assert_eq!(out.image.get_pixel(94, 74).0, [0, 0, 0]);
        assert_eq!(out.image.get_pixel(12, 12).0, [90, 90, 90]);
    }

    #[test]
    fn contour_only_skips_color_masking() {
        let img = RgbImage::from_pixel(60, 60, Rgb([40, 160, 50]));
        let out = remove_background(&img, &BackgroundParams::new(bands()), 3, 0, true);
        assert_eq!(out.table, TableClassification::Skipped);
        assert_eq!(out.image.get_pixel(30, 30).0, [40, 160, 50]);
        assert_eq!(out.image.get_pixel(1, 30).0, [0, 0, 0]);
    }
}
