//! Table-side image analysis for cuesight.
//!
//! - [`dominant_color`]: k-means estimate of a region's representative color.
//! - [`remove_background`]: felt removal by dominant-color classification and
//!   band masking, followed by border and corner black-out.
//! - [`find_circles`]: Hough-gradient circle detection.
//! - [`detect_circles`]: circles named by the color bands of a [`ColorCatalog`].

mod background;
mod circles;
mod classify;
mod dominant;

pub use background::{
    black_out_borders, classify_table, remove_background, BackgroundParams, BackgroundRemoval,
    TableBands, TableClassification, TableColor, DEFAULT_CLOSING_RADIUS,
};
pub use circles::{find_circles, Circle, HoughParams};
pub use classify::{
    detect_circles, BallBands, CircleClassification, ClassifiedCircle, ClassifyError,
    ColorCatalog, DuplicatePolicy, NamedColorBand, ObjectColor, ObjectKind, TargetBands,
};
pub use dominant::{dominant_color, try_dominant_color, KMeansParams};
