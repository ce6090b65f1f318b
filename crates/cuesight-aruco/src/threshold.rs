//! Thresholding helpers for marker decoding.

use image::GrayImage;

/// Otsu level of a bag of intensity samples.
///
/// Samples `<=` the returned level belong to the dark class. Returns `None`
/// when all samples share one value, since there is nothing to split.
pub(crate) fn otsu_level_of_samples(samples: &[u8]) -> Option<u8> {
    let (&first, rest) = samples.split_first()?;
    if rest.iter().all(|&v| v == first) {
        return None;
    }
    let strip = GrayImage::from_raw(samples.len() as u32, 1, samples.to_vec())?;
    Some(imageproc::contrast::otsu_level(&strip))
}
