//! Circle candidates classified by their local dominant color.

use crate::circles::{find_circles, Circle, HoughParams};
use crate::dominant::{dominant_color, KMeansParams};
use cuesight_core::{draw_label, luminance, Bgr, ColorBand, PixelPoint, LABEL_SCALE};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER_MARK: Rgb<u8> = Rgb([255, 128, 0]);
/// Fraction of the radius covered by the square sampled for color.
const SAMPLE_FRACTION: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectColor {
    White,
    Yellow,
    Cyan,
    Brown,
    Blue,
    Red,
}

impl ObjectColor {
    /// Upper-case name, as written in reports and on annotated frames.
    pub fn name(self) -> &'static str {
        match self {
            ObjectColor::White => "WHITE",
            ObjectColor::Yellow => "YELLOW",
            ObjectColor::Cyan => "CYAN",
            ObjectColor::Brown => "BROWN",
            ObjectColor::Blue => "BLUE",
            ObjectColor::Red => "RED",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Ball,
    Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedColorBand {
    pub label: ObjectColor,
    pub kind: ObjectKind,
    pub band: ColorBand,
}

/// Ball bands of the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallBands {
    pub white: ColorBand,
    pub yellow: ColorBand,
    pub blue: ColorBand,
    pub red: ColorBand,
}

/// Projected target bands of the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBands {
    pub white: ColorBand,
    pub yellow: ColorBand,
    pub cyan: ColorBand,
    pub brown: ColorBand,
}

/// Ordered list of bands; the first band containing a color names it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorCatalog {
    entries: Vec<NamedColorBand>,
}

impl ColorCatalog {
    pub fn new(entries: Vec<NamedColorBand>) -> Self {
        Self { entries }
    }

    /// The check order the game rig relies on: ball white, ball yellow,
    /// target white, target yellow, cyan, brown, ball blue, ball red.
    pub fn rig_order(balls: &BallBands, targets: &TargetBands) -> Self {
        use ObjectColor::*;
        use ObjectKind::*;
        let e = |label, kind, band| NamedColorBand { label, kind, band };
        Self::new(vec![
            e(White, Ball, balls.white),
            e(Yellow, Ball, balls.yellow),
            e(White, Target, targets.white),
            e(Yellow, Target, targets.yellow),
            e(Cyan, Target, targets.cyan),
            e(Brown, Target, targets.brown),
            e(Blue, Ball, balls.blue),
            e(Red, Ball, balls.red),
        ])
    }

    pub fn entries(&self) -> &[NamedColorBand] {
        &self.entries
    }

    pub fn classify(&self, color: Bgr) -> Option<&NamedColorBand> {
        self.entries.iter().find(|e| e.band.contains(color))
    }
}

/// What happens when two candidates classify to the same label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The later candidate overwrites the earlier one.
    #[default]
    LastWins,
    Reject,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("label {label:?} detected twice, at {first} and {second}")]
    DuplicateLabel {
        label: ObjectColor,
        first: PixelPoint,
        second: PixelPoint,
    },
}

/// One Hough candidate and how it was judged.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCircle {
    pub circle: Circle,
    pub center: PixelPoint,
    pub dominant: Bgr,
    /// `None` when the sample was pure black or matched no band.
    pub label: Option<ObjectColor>,
}

#[derive(Clone, Debug)]
pub struct CircleClassification {
    /// Input copy, annotated when requested.
    pub image: RgbImage,
    pub objects: BTreeMap<ObjectColor, PixelPoint>,
    /// Every candidate in detector order.
    pub circles: Vec<ClassifiedCircle>,
}

/// Find circles, sample each one's dominant color with `kmeans` and name it
/// with `catalog`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, hough, catalog, kmeans), fields(width = image.width(), height = image.height()))
)]
pub fn detect_circles(
    image: &RgbImage,
    hough: &HoughParams,
    catalog: &ColorCatalog,
    kmeans: &KMeansParams,
    annotate: bool,
    policy: DuplicatePolicy,
) -> Result<CircleClassification, ClassifyError> {
    let mut out = image.clone();
    let found = find_circles(&luminance(image), hough);

    let mut objects = BTreeMap::new();
    let mut circles = Vec::with_capacity(found.len());

    for circle in found {
        let center = PixelPoint::new(circle.x.round() as i32, circle.y.round() as i32);
        let dominant = sample_color(image, center, circle.radius, kmeans);
        let entry = if dominant.is_black() {
            None
        } else {
            catalog.classify(dominant)
        };
        circles.push(ClassifiedCircle {
            circle,
            center,
            dominant,
            label: entry.map(|e| e.label),
        });

        let Some(entry) = entry else {
            log::trace!("circle at {center} dropped (color {dominant:?})");
            continue;
        };
        log::debug!(
            "circle at {center} r={:.1}: {:?} {:?}",
            circle.radius,
            entry.kind,
            entry.label
        );

        if let Some(first) = objects.insert(entry.label, center) {
            match policy {
                DuplicatePolicy::LastWins => {
                    log::warn!("{:?} seen again, {first} replaced by {center}", entry.label)
                }
                DuplicatePolicy::Reject => {
                    return Err(ClassifyError::DuplicateLabel {
                        label: entry.label,
                        first,
                        second: center,
                    })
                }
            }
        }
        if annotate {
            annotate_object(&mut out, center, circle.radius, entry.label, entry.band.max);
        }
    }

    Ok(CircleClassification {
        image: out,
        objects,
        circles,
    })
}

/// Dominant color of the square of half-width `trunc(radius * 0.8)` around
/// `center`, clipped to the image.
fn sample_color(image: &RgbImage, center: PixelPoint, radius: f32, params: &KMeansParams) -> Bgr {
    let half = (radius * SAMPLE_FRACTION) as i64;
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (cx, cy) = (center.x as i64, center.y as i64);
    let x0 = (cx - half).clamp(0, w);
    let x1 = (cx + half).clamp(0, w);
    let y0 = (cy - half).clamp(0, h);
    let y1 = (cy + half).clamp(0, h);
    let view = image::imageops::crop_imm(
        image,
        x0 as u32,
        y0 as u32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    );
    dominant_color(&*view, params)
}

/// Name in the band color with its baseline on the circle's bottom, then the
/// outline and a center square.
fn annotate_object(
    img: &mut RgbImage,
    center: PixelPoint,
    radius: f32,
    label: ObjectColor,
    color: Bgr,
) {
    let r = radius.round() as i32;
    draw_label(
        img,
        label.name(),
        center.x,
        center.y + r - LABEL_SCALE as i32,
        color.to_rgb(),
    );
    for dr in -1..3 {
        if r + dr > 0 {
            draw_hollow_circle_mut(img, (center.x, center.y), r + dr, OUTLINE);
        }
    }
    draw_filled_rect_mut(
        img,
        Rect::at(center.x - 5, center.y - 5).of_size(11, 11),
        CENTER_MARK,
    );
}
