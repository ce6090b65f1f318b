//! Vision core of a projector pool-table game.
//!
//! This crate provides:
//! - re-exports of the underlying crates (`core`, `aruco`, `table`),
//! - corner-marker detection with role assignment ([`tags`]),
//! - keystone calibration between the table and projector marker sets,
//!   with a file-backed transform ([`keystone`], [`store`]),
//! - ball detection from a camera frame and target detection from a game
//!   image ([`pipeline`]),
//! - game scoring ([`scoring`]),
//! - the rig parameter file ([`config`]) and camera/projector seams ([`device`]).
//!
//! ## Quickstart
//!
//! ```no_run
//! use cuesight::config::RigConfig;
//! use cuesight::pipeline::{detect_balls, BallDetection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rig = RigConfig::load("parameters.json")?;
//! let frame = image::open("frame.png")?.to_rgb8();
//! if let BallDetection::Detected(report) = detect_balls(&frame, &rig)? {
//!     println!("{:?}", report.objects);
//! }
//! # Ok(())
//! # }
//! ```

pub use cuesight_aruco as aruco;
pub use cuesight_core as core;
pub use cuesight_table as table;

pub mod config;
pub mod device;
pub mod keystone;
pub mod pipeline;
pub mod rectify;
pub mod scoring;
pub mod store;
pub mod tags;

pub use config::{ConfigError, Parameters, RigConfig};
pub use keystone::{KeystoneCalibration, KeystoneCalibrator, KeystoneError, KeystoneTags};
pub use pipeline::{detect_balls, detect_targets, BallDetection, BallReport, PipelineError};
pub use scoring::{GameKind, Positions, RoundOutcome, Verdict};
pub use store::{StoreError, TransformStore};
pub use tags::{resolve_family, TagDetection, TagDetector, TagError};
