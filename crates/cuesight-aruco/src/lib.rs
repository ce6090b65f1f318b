//! ArUco-style fiducial markers for the cuesight rig.
//!
//! This crate covers:
//! - built-in dictionary families selected by name, plus JSON code tables,
//! - matching observed codes against a dictionary under all four rotations,
//! - finding dark quads in a full frame and decoding the marker inside each,
//! - rendering markers for printing or synthetic scenes.
//!
//! Corner-role assignment and the two-family calibration live in the
//! `cuesight` facade crate.

pub mod builtins;
mod decode;
mod detect;
mod dictionary;
mod matcher;
mod render;
mod threshold;

pub use builtins::{builtin_dictionary, BUILTIN_NAMES};
pub use decode::{decode_quad, DecodeConfig, QuadDecode};
pub use detect::{DetectedMarker, MarkerDetector, MarkerDetectorParams, ThresholdMode};
pub use dictionary::{Dictionary, DictionaryError};
pub use matcher::{rotate_code_u64, Match, Matcher};
pub use render::render_marker;
