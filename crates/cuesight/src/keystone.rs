//! Keystone calibration: the projector-to-table transform from one camera frame.
//!
//! The camera sees two sets of corner markers at once: markers fixed to the
//! table and markers the projector draws. Both sets get corner roles, and the
//! homography taking projector roles onto table roles is the transform applied
//! to every image sent to the projector afterwards.

use crate::config::RigConfig;
use crate::core::{
    compute_homography, warp_perspective, CornerRole, Homography, HomographyError, TableCorners,
};
use crate::rectify::fit_canvas;
use crate::store::{StoreError, TransformStore};
use crate::tags::{draw_markers, TagDetection, TagDetector};
use image::RgbImage;
use std::path::Path;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Role order of the correspondences fed to the solver.
const CORRESPONDENCE_ORDER: [CornerRole; 4] = [
    CornerRole::TopRight,
    CornerRole::TopLeft,
    CornerRole::BottomLeft,
    CornerRole::BottomRight,
];

#[derive(thiserror::Error, Debug)]
pub enum KeystoneError {
    #[error("incorrect tag detection: {family} found {found} of 4 markers")]
    IncorrectTagDetection { family: String, found: usize },
    #[error(transparent)]
    Homography(#[from] HomographyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to write {}: {source}", path.display())]
    Image {
        path: std::path::PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
pub struct KeystoneCalibration {
    /// Maps projector-canvas pixels to where they must be drawn to land on the table markers.
    pub transform: Homography,
    pub table: TableCorners,
    pub projector: TableCorners,
    /// The template warped through `transform`.
    pub verification: RgbImage,
    /// Camera frame with both marker sets drawn in.
    pub tagged: RgbImage,
}

/// Both marker sets as seen in one frame, drawn onto the canvas-sized frame.
#[derive(Clone, Debug)]
pub struct KeystoneTags {
    pub table: TagDetection,
    pub projector: TagDetection,
    pub tagged: RgbImage,
}

#[derive(Clone, Debug)]
pub struct KeystoneCalibrator {
    table: TagDetector,
    projector: TagDetector,
    size: (u32, u32),
}

fn save_image(img: &RgbImage, path: &Path) -> Result<(), KeystoneError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    img.save(path).map_err(|source| KeystoneError::Image {
        path: path.to_path_buf(),
        source,
    })
}

impl KeystoneCalibrator {
    pub fn new(table: TagDetector, projector: TagDetector, size: (u32, u32)) -> Self {
        Self {
            table,
            projector,
            size,
        }
    }

    pub fn from_rig(rig: &RigConfig) -> Self {
        Self::new(
            TagDetector::new(rig.table_dictionary.clone(), rig.markers.clone()),
            TagDetector::new(rig.projector_dictionary.clone(), rig.markers.clone()),
            rig.image_size,
        )
    }

    /// Detect both marker sets on the camera frame resized to the canvas.
    pub fn detect_tags(&self, camera: &RgbImage) -> KeystoneTags {
        let frame = fit_canvas(camera, self.size);
        let table = self.table.detect(&frame, false);
        let projector = self.projector.detect(&frame, false);

        let mut tagged = frame;
        draw_markers(&mut tagged, &table.markers);
        draw_markers(&mut tagged, &projector.markers);
        KeystoneTags {
            table,
            projector,
            tagged,
        }
    }

    /// Compute the transform. Both inputs are first resized to the working canvas.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, camera, template), fields(width = self.size.0, height = self.size.1))
    )]
    pub fn calibrate(
        &self,
        camera: &RgbImage,
        template: &RgbImage,
    ) -> Result<KeystoneCalibration, KeystoneError> {
        let tags = self.detect_tags(camera);
        self.calibrate_from_tags(&tags, template)
    }

    /// Solve from tags already detected by [`detect_tags`](Self::detect_tags).
    pub fn calibrate_from_tags(
        &self,
        tags: &KeystoneTags,
        template: &RgbImage,
    ) -> Result<KeystoneCalibration, KeystoneError> {
        let corners_of = |det: &TagDetector, found: &TagDetection| {
            found
                .corners
                .ok_or_else(|| KeystoneError::IncorrectTagDetection {
                    family: det.family().to_string(),
                    found: found.markers.len(),
                })
        };
        let table = corners_of(&self.table, &tags.table)?;
        let projector = corners_of(&self.projector, &tags.projector)?;

        let src = projector.in_order(CORRESPONDENCE_ORDER);
        let dst = table.in_order(CORRESPONDENCE_ORDER);
        let transform = compute_homography(&src, &dst)?;
        log::debug!("keystone transform {:?}", transform.to_array());

        let (w, h) = self.size;
        let verification = warp_perspective(&fit_canvas(template, self.size), &transform, w, h)?;
        Ok(KeystoneCalibration {
            transform,
            table,
            projector,
            verification,
            tagged: tags.tagged.clone(),
        })
    }

    /// Calibrate, then replace the stored transform and write the verification
    /// image. The tagged frame goes to `tagged_path` whatever the outcome, so a
    /// failed run shows which markers were missed. Nothing else is written when
    /// calibration fails.
    pub fn calibrate_and_persist(
        &self,
        camera: &RgbImage,
        template: &RgbImage,
        store: &TransformStore,
        verification_path: &Path,
        tagged_path: Option<&Path>,
    ) -> Result<KeystoneCalibration, KeystoneError> {
        let tags = self.detect_tags(camera);
        if let Some(path) = tagged_path {
            save_image(&tags.tagged, path)?;
        }
        let cal = match self.calibrate_from_tags(&tags, template) {
            Ok(cal) => cal,
            Err(e) => {
                log::warn!("keystone failed, stored transform left untouched: {e}");
                return Err(e);
            }
        };
        store.save(&cal.transform)?;
        save_image(&cal.verification, verification_path)?;
        log::info!("keystone done");
        Ok(cal)
    }
}
