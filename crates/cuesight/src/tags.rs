//! Four-corner fiducial detection with corner-role assignment.

use crate::aruco::{
    builtin_dictionary, DetectedMarker, Dictionary, DictionaryError, MarkerDetector,
    MarkerDetectorParams,
};
use crate::core::{assign_roles, draw_label, luminance, PixelPoint, TableCorners, LABEL_SCALE};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_filled_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER: Rgb<u8> = Rgb([255, 0, 0]);
const ORIGIN: Rgb<u8> = Rgb([0, 0, 255]);
/// Gap between a marker's top-left corner and the baseline of its ID.
const ID_LIFT: i32 = 15;

#[derive(thiserror::Error, Debug)]
pub enum TagError {
    #[error("unsupported marker family {0:?}")]
    UnsupportedFamily(String),
    #[error("marker code table {}: {source}", path.display())]
    CodeTable {
        path: PathBuf,
        #[source]
        source: DictionaryError,
    },
}

/// Resolve a family setting: a built-in name such as `DICT_5X5_50`, or the
/// path of a `.json` code table (cuesight's layout or an OpenCV export).
pub fn resolve_family(family: &str) -> Result<Dictionary, TagError> {
    if let Some(dict) = builtin_dictionary(family) {
        return Ok(dict);
    }
    let path = Path::new(family);
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
        let dict = Dictionary::load_json(path).map_err(|source| TagError::CodeTable {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("{}: {} codes from {}", dict.name, dict.len(), path.display());
        return Ok(dict);
    }
    Err(TagError::UnsupportedFamily(family.to_string()))
}

/// Markers found in one frame and, when at least four were seen, the corner roles.
#[derive(Clone, Debug)]
pub struct TagDetection {
    /// Every decoded marker, in detection order.
    pub markers: Vec<DetectedMarker>,
    /// `None` means fewer than four markers: the frame must not be used for a transform.
    pub corners: Option<TableCorners>,
    pub annotated: Option<RgbImage>,
}

impl TagDetection {
    pub fn centers(&self) -> Vec<PixelPoint> {
        self.markers.iter().map(DetectedMarker::center).collect()
    }
}

#[derive(Clone, Debug)]
pub struct TagDetector {
    detector: MarkerDetector,
}

impl TagDetector {
    pub fn new(dict: Dictionary, params: MarkerDetectorParams) -> Self {
        Self {
            detector: MarkerDetector::new(dict, params),
        }
    }

    /// Detector for a family setting, see [`resolve_family`].
    pub fn from_family(family: &str, params: MarkerDetectorParams) -> Result<Self, TagError> {
        Ok(Self::new(resolve_family(family)?, params))
    }

    pub fn family(&self) -> &str {
        &self.detector.dictionary().name
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(family = %self.family()))
    )]
    pub fn detect(&self, image: &RgbImage, annotate: bool) -> TagDetection {
        let markers = self.detector.detect(&luminance(image));
        let centers: Vec<PixelPoint> = markers.iter().map(DetectedMarker::center).collect();
        let corners = assign_roles(&centers);

        match &corners {
            Some(c) => log::info!(
                "{}: {} markers, TL={} TR={} BL={} BR={}",
                self.family(),
                markers.len(),
                c.top_left,
                c.top_right,
                c.bottom_left,
                c.bottom_right
            ),
            None => log::warn!(
                "{}: only {} of 4 markers found",
                self.family(),
                markers.len()
            ),
        }

        let annotated = annotate.then(|| {
            let mut out = image.clone();
            draw_markers(&mut out, &markers);
            out
        });
        TagDetection {
            markers,
            corners,
            annotated,
        }
    }
}

/// Outline each marker, cross its center, flag its own top-left corner and
/// write its ID above that corner.
pub fn draw_markers(img: &mut RgbImage, markers: &[DetectedMarker]) {
    for m in markers {
        for i in 0..4 {
            let a = m.corners[i];
            let b = m.corners[(i + 1) % 4];
            draw_line_segment_mut(img, (a.x, a.y), (b.x, b.y), OUTLINE);
        }
        let c = m.center();
        draw_cross_mut(img, CENTER, c.x, c.y);
        let tl = m.corners[0];
        draw_filled_rect_mut(
            img,
            Rect::at(tl.x as i32 - 2, tl.y as i32 - 2).of_size(5, 5),
            ORIGIN,
        );
        draw_label(
            img,
            &m.id.to_string(),
            tl.x as i32,
            tl.y as i32 - ID_LIFT - LABEL_SCALE as i32,
            OUTLINE,
        );
    }
}
