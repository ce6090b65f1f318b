//! End-to-end frame analysis: ball positions from a camera frame, target
//! positions from a game image.

use crate::config::RigConfig;
use crate::core::{warp_perspective, Homography, HomographyError, TableCorners};
use crate::rectify::{fit_canvas, rectify_table};
use crate::scoring::{GameKind, Positions};
use crate::table::{
    detect_circles, remove_background, ClassifiedCircle, ClassifyError, ObjectColor,
    TableClassification,
};
use crate::tags::TagDetector;
use image::RgbImage;
use imageproc::drawing::draw_hollow_circle_mut;

#[cfg(feature = "tracing")]
use tracing::instrument;

const ZONE_THICKNESS: i32 = 4;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Homography(#[from] HomographyError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Every stage of one ball detection.
#[derive(Clone, Debug)]
pub struct BallReport {
    pub corners: TableCorners,
    /// Camera frame rectified onto the table canvas.
    pub warped: RgbImage,
    /// `warped` with felt and borders blacked out.
    pub no_background: RgbImage,
    /// `no_background` with the named circles drawn in.
    pub annotated: RgbImage,
    pub table: TableClassification,
    pub objects: Positions,
    pub circles: Vec<ClassifiedCircle>,
}

#[derive(Clone, Debug)]
pub enum BallDetection {
    Detected(Box<BallReport>),
    /// Fewer than four table markers: the frame cannot be rectified.
    TagsNotFound { markers_found: usize },
}

#[derive(Clone, Debug)]
pub struct TargetLayout {
    /// Game image as the projector will draw it.
    pub warped: RgbImage,
    pub objects: Positions,
    pub circles: Vec<ClassifiedCircle>,
}

/// Rectify the table, remove the felt and name the balls.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(camera, rig), fields(width = camera.width(), height = camera.height()))
)]
pub fn detect_balls(camera: &RgbImage, rig: &RigConfig) -> Result<BallDetection, PipelineError> {
    let tags = TagDetector::new(rig.table_dictionary.clone(), rig.markers.clone()).detect(camera, false);
    let Some(corners) = tags.corners else {
        return Ok(BallDetection::TagsNotFound {
            markers_found: tags.markers.len(),
        });
    };

    let warped = rectify_table(camera, &corners, rig.tag_offset, rig.image_size)?;
    let removal = remove_background(
        &warped,
        &rig.background,
        rig.border_rect_offset,
        rig.border_circle_radius,
        false,
    );
    let found = detect_circles(
        &removal.image,
        &rig.ball_hough,
        &rig.catalog,
        &rig.background.kmeans,
        true,
        rig.duplicate_policy,
    )?;
    log::info!("{} objects on the table", found.objects.len());

    Ok(BallDetection::Detected(Box::new(BallReport {
        corners,
        warped,
        no_background: removal.image,
        annotated: found.image,
        table: removal.table,
        objects: found.objects,
        circles: found.circles,
    })))
}

/// Resize a game image to the canvas, keystone it and name its target circles.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn detect_targets(
    game_image: &RgbImage,
    transform: &Homography,
    rig: &RigConfig,
) -> Result<TargetLayout, PipelineError> {
    let (w, h) = rig.image_size;
    let warped = warp_perspective(&fit_canvas(game_image, rig.image_size), transform, w, h)?;
    let found = detect_circles(
        &warped,
        &rig.target_hough,
        &rig.catalog,
        &rig.background.kmeans,
        false,
        rig.duplicate_policy,
    )?;
    log::info!("{} targets in the game image", found.objects.len());
    Ok(TargetLayout {
        warped,
        objects: found.objects,
        circles: found.circles,
    })
}

/// Ring the scoring zones of `game` on a projector image.
pub fn draw_target_zones(img: &mut RgbImage, targets: &Positions, game: GameKind, rig: &RigConfig) {
    let mut zones = vec![(ObjectColor::Brown, rig.target_bands.brown.max)];
    if game == GameKind::Contact {
        zones.push((ObjectColor::Cyan, rig.target_bands.cyan.max));
    }
    for (label, color) in zones {
        let Some(c) = targets.get(&label) else {
            log::warn!("no {label:?} target to ring");
            continue;
        };
        let r = rig.zone_radius as i32;
        for t in 0..ZONE_THICKNESS {
            draw_hollow_circle_mut(img, (c.x, c.y), r - ZONE_THICKNESS / 2 + t, color.to_rgb());
        }
    }
}
