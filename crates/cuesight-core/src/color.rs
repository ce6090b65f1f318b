//! Blue-green-red color triples and inclusive per-channel bands.

use image::Rgb;
use serde::{Deserialize, Serialize};

/// An 8-bit color in B,G,R channel order.
///
/// Rig configuration stores colors as `[b, g, r]` arrays; pixels from the
/// `image` crate are RGB, so conversion is always explicit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Bgr {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Bgr {
    pub const BLACK: Bgr = Bgr::new(0, 0, 0);
    pub const WHITE: Bgr = Bgr::new(255, 255, 255);

    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    #[inline]
    pub fn from_rgb(px: Rgb<u8>) -> Self {
        let [r, g, b] = px.0;
        Self { b, g, r }
    }

    #[inline]
    pub fn to_rgb(self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }

    #[inline]
    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

impl From<[u8; 3]> for Bgr {
    fn from(v: [u8; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Bgr> for [u8; 3] {
    fn from(c: Bgr) -> Self {
        [c.b, c.g, c.r]
    }
}

/// Inclusive per-channel range `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    pub min: Bgr,
    pub max: Bgr,
}

impl ColorBand {
    /// Band accepting every color; used when no masking should happen.
    pub const FULL: ColorBand = ColorBand {
        min: Bgr::BLACK,
        max: Bgr::WHITE,
    };

    pub const fn new(min: Bgr, max: Bgr) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, c: Bgr) -> bool {
        (self.min.b..=self.max.b).contains(&c.b)
            && (self.min.g..=self.max.g).contains(&c.g)
            && (self.min.r..=self.max.r).contains(&c.r)
    }

    #[inline]
    pub fn contains_rgb(&self, px: Rgb<u8>) -> bool {
        self.contains(Bgr::from_rgb(px))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_bounds_are_inclusive() {
        let band = ColorBand::new(Bgr::new(10, 20, 30), Bgr::new(40, 50, 60));
        assert!(band.contains(Bgr::new(10, 20, 30)));
        assert!(band.contains(Bgr::new(40, 50, 60)));
        assert!(!band.contains(Bgr::new(41, 50, 60)));
        assert!(!band.contains(Bgr::new(40, 19, 60)));
    }

    #[test]
    fn rgb_conversion_swaps_channels() {
        let c = Bgr::from_rgb(Rgb([1, 2, 3]));
        assert_eq!(c, Bgr::new(3, 2, 1));
        assert_eq!(c.to_rgb(), Rgb([1, 2, 3]));
    }

    #[test]
    fn serializes_as_bgr_array() {
        let json = serde_json::to_string(&Bgr::new(5, 6, 7)).unwrap();
        assert_eq!(json, "[5,6,7]");
        let back: Bgr = serde_json::from_str("[9,8,7]").unwrap();
        assert_eq!(back, Bgr::new(9, 8, 7));
    }
}
