//! Core types and utilities for the cuesight pool-table vision stack.
//!
//! This crate is small and mostly geometric/photometric, plus the label font
//! shared by every annotated frame. It knows nothing about fiducial
//! dictionaries or circle detection; those live in `cuesight-aruco` and
//! `cuesight-table`.

mod color;
mod gray;
mod homography;
mod label;
mod logger;
mod roles;

pub use color::{Bgr, ColorBand};
pub use gray::{luminance, sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView};
pub use homography::{
    compute_homography, homography_from_4pt, warp_perspective, Homography, HomographyError,
};
pub use label::{draw_label, label_size, LABEL_SCALE};
pub use roles::{assign_roles, CornerRole, PixelPoint, TableCorners, ROLES_BY_ASCENDING_SUM};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, LOG_ENV};
