//! Rig parameters: the JSON record on disk and the validated value passed around.

use crate::aruco::{Dictionary, MarkerDetectorParams};
use crate::core::{Bgr, ColorBand};
use crate::device::DeviceConfig;
use crate::table::{
    BackgroundParams, BallBands, ColorCatalog, DuplicatePolicy, HoughParams, KMeansParams,
    TableBands, TargetBands, DEFAULT_CLOSING_RADIUS,
};
use crate::tags::{resolve_family, TagError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{key}: {source}")]
    Family {
        key: &'static str,
        #[source]
        source: TagError,
    },
}

fn default_table_family() -> String {
    "DICT_5X5_50".to_string()
}

fn default_projector_family() -> String {
    "DICT_7X7_100".to_string()
}

fn default_target_hough() -> HoughParams {
    HoughParams::with_geometry(7.0, 100.0, 20, 80)
}

fn default_placement_radius() -> u32 {
    100
}

fn default_closing_radius() -> u8 {
    DEFAULT_CLOSING_RADIUS
}

/// Where frames, intermediates and the transform live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigPaths {
    pub camera_frame: PathBuf,
    pub warped: PathBuf,
    pub no_background: PathBuf,
    pub circles: PathBuf,
    pub keystone_frame: PathBuf,
    pub keystone_template: PathBuf,
    pub keystone_verification: PathBuf,
    pub keystone_tagged: PathBuf,
    pub transform: PathBuf,
}

impl Default for RigPaths {
    fn default() -> Self {
        Self {
            camera_frame: "assets/output/0-cam_input.png".into(),
            warped: "assets/output/1-warped.png".into(),
            no_background: "assets/output/2-no_background.png".into(),
            circles: "assets/output/3-circle_detect.png".into(),
            keystone_frame: "assets/keystone/kstInputCAMERA.png".into(),
            keystone_template: "assets/keystone/kstTemplateIN.png".into(),
            keystone_verification: "assets/keystone/kstTemplateOUT.png".into(),
            keystone_tagged: "assets/keystone/kstTagged.png".into(),
            transform: "assets/keystone/matrix.csv".into(),
        }
    }
}

/// The `parameters.json` record: named integer arrays, colors as `[b, g, r]`,
/// plus optional tuning sections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub camera_resolution: [u32; 2],
    pub camera_rotation: [u32; 1],
    #[serde(rename = "camera_waitTime")]
    pub camera_wait_time: [u32; 1],
    pub image_resolution: [u32; 2],
    pub tag_horizontal_offset: [i32; 1],
    pub background_rectangle_offset: [u32; 1],
    pub background_circle_radius: [u32; 1],

    #[serde(rename = "table_GREEN_min_value")]
    pub table_green_min: Bgr,
    #[serde(rename = "table_GREEN_max_value")]
    pub table_green_max: Bgr,
    #[serde(rename = "table_BLUE_min_value")]
    pub table_blue_min: Bgr,
    #[serde(rename = "table_BLUE_max_value")]
    pub table_blue_max: Bgr,
    #[serde(rename = "table_RED_min_value")]
    pub table_red_min: Bgr,
    #[serde(rename = "table_RED_max_value")]
    pub table_red_max: Bgr,

    #[serde(rename = "ball_YELLOW_min_value")]
    pub ball_yellow_min: Bgr,
    #[serde(rename = "ball_YELLOW_max_value")]
    pub ball_yellow_max: Bgr,
    #[serde(rename = "ball_WHITE_min_value")]
    pub ball_white_min: Bgr,
    #[serde(rename = "ball_WHITE_max_value")]
    pub ball_white_max: Bgr,
    #[serde(rename = "ball_BLUE_min_value")]
    pub ball_blue_min: Bgr,
    #[serde(rename = "ball_BLUE_max_value")]
    pub ball_blue_max: Bgr,
    #[serde(rename = "ball_RED_min_value")]
    pub ball_red_min: Bgr,
    #[serde(rename = "ball_RED_max_value")]
    pub ball_red_max: Bgr,

    #[serde(rename = "game_YELLOW_min_value")]
    pub game_yellow_min: Bgr,
    #[serde(rename = "game_YELLOW_max_value")]
    pub game_yellow_max: Bgr,
    #[serde(rename = "game_WHITE_min_value")]
    pub game_white_min: Bgr,
    #[serde(rename = "game_WHITE_max_value")]
    pub game_white_max: Bgr,
    #[serde(rename = "game_BROWN_min_value")]
    pub game_brown_min: Bgr,
    #[serde(rename = "game_BROWN_max_value")]
    pub game_brown_max: Bgr,
    #[serde(rename = "game_CYAN_min_value")]
    pub game_cyan_min: Bgr,
    #[serde(rename = "game_CYAN_max_value")]
    pub game_cyan_max: Bgr,

    pub game_zone_radius: [u32; 1],

    /// Built-in family name or path of a `.json` code table.
    #[serde(default = "default_table_family")]
    pub tag_family_table: String,
    #[serde(default = "default_projector_family")]
    pub tag_family_projector: String,
    #[serde(default)]
    pub marker_detector: MarkerDetectorParams,
    #[serde(default)]
    pub ball_hough: HoughParams,
    #[serde(default = "default_target_hough")]
    pub target_hough: HoughParams,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default = "default_placement_radius")]
    pub placement_radius: u32,
    #[serde(default = "default_closing_radius")]
    pub closing_radius: u8,
    #[serde(default)]
    pub kmeans: KMeansParams,
    #[serde(default)]
    pub paths: RigPaths,
    #[serde(default)]
    pub devices: DeviceConfig,
}

impl Default for Parameters {
    /// A starting point for a new rig: a 1280x720 projector canvas and
    /// loose bands meant to be tuned on site.
    fn default() -> Self {
        let c = Bgr::new;
        Self {
            camera_resolution: [2592, 1944],
            camera_rotation: [180],
            camera_wait_time: [2],
            image_resolution: [1280, 720],
            tag_horizontal_offset: [0],
            background_rectangle_offset: [20],
            background_circle_radius: [80],
            table_green_min: c(0, 80, 0),
            table_green_max: c(140, 255, 140),
            table_blue_min: c(80, 0, 0),
            table_blue_max: c(255, 140, 140),
            table_red_min: c(0, 0, 80),
            table_red_max: c(140, 140, 255),
            ball_yellow_min: c(0, 150, 150),
            ball_yellow_max: c(120, 255, 255),
            ball_white_min: c(200, 200, 200),
            ball_white_max: c(255, 255, 255),
            ball_blue_min: c(120, 0, 0),
            ball_blue_max: c(255, 110, 110),
            ball_red_min: c(0, 0, 120),
            ball_red_max: c(110, 110, 255),
            game_yellow_min: c(0, 120, 120),
            game_yellow_max: c(140, 255, 255),
            game_white_min: c(170, 170, 170),
            game_white_max: c(255, 255, 255),
            game_brown_min: c(0, 30, 70),
            game_brown_max: c(70, 110, 170),
            game_cyan_min: c(150, 150, 0),
            game_cyan_max: c(255, 255, 120),
            game_zone_radius: [60],
            tag_family_table: default_table_family(),
            tag_family_projector: default_projector_family(),
            marker_detector: MarkerDetectorParams::default(),
            ball_hough: HoughParams::default(),
            target_hough: default_target_hough(),
            duplicate_policy: DuplicatePolicy::default(),
            placement_radius: default_placement_radius(),
            closing_radius: default_closing_radius(),
            kmeans: KMeansParams::default(),
            paths: RigPaths::default(),
            devices: DeviceConfig::default(),
        }
    }
}

fn band(key: &'static str, min: Bgr, max: Bgr) -> Result<ColorBand, ConfigError> {
    if min.b > max.b || min.g > max.g || min.r > max.r {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("min {:?} exceeds max {:?}", <[u8; 3]>::from(min), <[u8; 3]>::from(max)),
        });
    }
    Ok(ColorBand::new(min, max))
}

impl Parameters {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Check the record and turn it into the value the pipelines take.
    pub fn build_rig(&self) -> Result<RigConfig, ConfigError> {
        let [width, height] = self.image_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid {
                key: "image_resolution",
                reason: format!("{width}x{height}"),
            });
        }
        let [rotation] = self.camera_rotation;
        if !matches!(rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::Invalid {
                key: "camera_rotation",
                reason: format!("{rotation} is not a multiple of 90 below 360"),
            });
        }
        for (key, h) in [("ball_hough", &self.ball_hough), ("target_hough", &self.target_hough)] {
            if h.dp < 1.0 || h.min_radius > h.max_radius {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!(
                        "dp={} radii {}..{}",
                        h.dp, h.min_radius, h.max_radius
                    ),
                });
            }
        }

        let family = |key, name: &str| {
            resolve_family(name).map_err(|source| ConfigError::Family { key, source })
        };
        let table_dictionary = family("tag_family_table", &self.tag_family_table)?;
        let projector_dictionary = family("tag_family_projector", &self.tag_family_projector)?;

        let table = TableBands {
            green: band("table_GREEN", self.table_green_min, self.table_green_max)?,
            blue: band("table_BLUE", self.table_blue_min, self.table_blue_max)?,
            red: band("table_RED", self.table_red_min, self.table_red_max)?,
        };
        let balls = BallBands {
            white: band("ball_WHITE", self.ball_white_min, self.ball_white_max)?,
            yellow: band("ball_YELLOW", self.ball_yellow_min, self.ball_yellow_max)?,
            blue: band("ball_BLUE", self.ball_blue_min, self.ball_blue_max)?,
            red: band("ball_RED", self.ball_red_min, self.ball_red_max)?,
        };
        let targets = TargetBands {
            white: band("game_WHITE", self.game_white_min, self.game_white_max)?,
            yellow: band("game_YELLOW", self.game_yellow_min, self.game_yellow_max)?,
            cyan: band("game_CYAN", self.game_cyan_min, self.game_cyan_max)?,
            brown: band("game_BROWN", self.game_brown_min, self.game_brown_max)?,
        };

        Ok(RigConfig {
            camera: CameraSettings {
                resolution: (self.camera_resolution[0], self.camera_resolution[1]),
                rotation,
                wait: Duration::from_secs(self.camera_wait_time[0] as u64),
            },
            image_size: (width, height),
            tag_offset: self.tag_horizontal_offset[0],
            border_rect_offset: self.background_rectangle_offset[0],
            border_circle_radius: self.background_circle_radius[0],
            table_dictionary,
            projector_dictionary,
            markers: self.marker_detector.clone(),
            background: BackgroundParams {
                bands: table,
                closing_radius: self.closing_radius,
                kmeans: self.kmeans.clone(),
            },
            catalog: ColorCatalog::rig_order(&balls, &targets),
            target_bands: targets,
            ball_hough: self.ball_hough.clone(),
            target_hough: self.target_hough.clone(),
            duplicate_policy: self.duplicate_policy,
            zone_radius: self.game_zone_radius[0],
            placement_radius: self.placement_radius,
            paths: self.paths.clone(),
            devices: self.devices.clone(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraSettings {
    pub resolution: (u32, u32),
    /// Degrees, one of 0, 90, 180, 270.
    pub rotation: u32,
    pub wait: Duration,
}

/// Validated, immutable rig configuration. Reconfiguring means building a new one.
#[derive(Clone, Debug)]
pub struct RigConfig {
    pub camera: CameraSettings,
    /// Working canvas: camera frames are rectified to it and projected images use it.
    pub image_size: (u32, u32),
    pub tag_offset: i32,
    pub border_rect_offset: u32,
    pub border_circle_radius: u32,
    pub table_dictionary: Dictionary,
    pub projector_dictionary: Dictionary,
    pub markers: MarkerDetectorParams,
    pub background: BackgroundParams,
    pub catalog: ColorCatalog,
    /// Kept apart from the catalog for drawing target zones.
    pub target_bands: TargetBands,
    pub ball_hough: HoughParams,
    pub target_hough: HoughParams,
    pub duplicate_policy: DuplicatePolicy,
    pub zone_radius: u32,
    pub placement_radius: u32,
    pub paths: RigPaths,
    pub devices: DeviceConfig,
}

impl RigConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let rig = Parameters::load_json(path)?.build_rig()?;
        log::info!(
            "rig config {}: {}x{} canvas, tags {} / {}",
            path.display(),
            rig.image_size.0,
            rig.image_size.1,
            rig.table_dictionary.name,
            rig.projector_dictionary.name
        );
        Ok(rig)
    }
}
