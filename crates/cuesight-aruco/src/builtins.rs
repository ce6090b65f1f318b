//! Embedded built-in dictionaries.
//!
//! The source of truth lives in `cuesight-aruco/data/*_CODES.json`; the build
//! script compiles those tables into the binary. Each table holds codes whose
//! Hamming distance to every other code, under all four rotations and to their
//! own rotations, is at least `2 * max_correction_bits + 1`.
//!
//! These are cuesight's own tables, not OpenCV's. A rig printed with OpenCV
//! should point its config at a table exported from OpenCV, read with
//! [`Dictionary::from_opencv_json`](crate::Dictionary::from_opencv_json).

#![allow(clippy::unreadable_literal)]

use crate::Dictionary;
use std::borrow::Cow;

include!(concat!(env!("OUT_DIR"), "/builtins.rs"));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::rotate_code_u64;

    fn rotation_distance(a: u64, b: u64, n: usize) -> u32 {
        (0..4)
            .map(|rot| (a ^ rotate_code_u64(b, n, rot)).count_ones())
            .min()
            .unwrap()
    }

    fn self_distance(code: u64, n: usize) -> u32 {
        (1..4)
            .map(|rot| (code ^ rotate_code_u64(code, n, rot)).count_ones())
            .min()
            .unwrap()
    }

    #[test]
    fn rig_families_are_available() {
        for name in ["DICT_5X5_50", "DICT_7X7_100", "DICT_4X4_50"] {
            let dict = builtin_dictionary(name).expect("builtin");
            assert_eq!(dict.name, name);
            dict.validate().expect("valid table");
        }
        assert!(builtin_dictionary("DICT_9X9_5").is_none());
    }

    #[test]
    fn every_name_resolves_to_its_size() {
        assert_eq!(BUILTIN_NAMES.len(), 16);
        for name in BUILTIN_NAMES {
            let dict = builtin_dictionary(name).unwrap();
            let size: usize = name[5..6].parse().unwrap();
            let count: usize = name[9..].parse().unwrap();
            assert_eq!(dict.marker_size, size, "{name}");
            assert_eq!(dict.len(), count, "{name}");
        }
    }

    #[test]
    fn codes_are_separated_under_rotation() {
        for name in ["DICT_5X5_50", "DICT_7X7_100"] {
            let dict = builtin_dictionary(name).unwrap();
            let min_allowed = 2 * dict.max_correction_bits as u32 + 1;
            for (i, &a) in dict.codes.iter().enumerate() {
                assert!(self_distance(a, dict.marker_size) >= min_allowed);
                for &b in &dict.codes[i + 1..] {
                    assert!(rotation_distance(a, b, dict.marker_size) >= min_allowed);
                }
            }
        }
    }

    #[test]
    fn larger_markers_correct_more_bits() {
        let small = builtin_dictionary("DICT_5X5_50").unwrap();
        let large = builtin_dictionary("DICT_7X7_100").unwrap();
        assert_eq!(small.max_correction_bits, 3);
        assert_eq!(large.max_correction_bits, 7);
    }
}
