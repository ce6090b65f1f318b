//! Dictionary matching and rotation helpers.

use crate::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub id: u32,
    /// Rotation `0..=3` such that `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance between observed and dictionary code (after rotation).
    pub hamming: u8,
}

/// Brute-force matcher over all ids and rotations.
///
/// Dictionaries here hold at most a thousand codes, so the linear scan is
/// fast enough and keeps memory small.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher accepting up to `max_hamming` flipped bits.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        let n = dict.marker_size;
        debug_assert!(n * n <= 64, "marker_size {n} does not fit a u64 code");

        let rotated = dict
            .codes
            .iter()
            .map(|&base| [0u8, 1, 2, 3].map(|rot| rotate_code_u64(base, n, rot)))
            .collect();

        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    /// Matcher using the dictionary's own correction budget.
    pub fn with_default_correction(dict: Dictionary) -> Self {
        let max = dict.max_correction_bits;
        Self::new(dict, max)
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Find the closest code within `max_hamming`; ties keep the lowest id.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.is_some_and(|prev| prev.hamming <= h) {
                    continue;
                }
                best = Some(Match {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                });
                if h == 0 {
                    return best;
                }
            }
        }

        best
    }
}

/// Rotate a code stored in row-major bits (`idx = y * n + x`) by
/// `rot * 90` degrees clockwise.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::builtin_dictionary;

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, 8, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn rotation_is_clockwise() {
        // 2x2: only the top-left cell set.
        let tl = 0b0001;
        // After a clockwise quarter turn it sits top-right.
        assert_eq!(rotate_code_u64(tl, 2, 1), 0b0010);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let dict = builtin_dictionary("DICT_4X4_50").expect("builtin dict");
        let base = dict.codes[7];
        let observed = rotate_code_u64(base, dict.marker_size, 3);

        let matcher = Matcher::new(dict, 0);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 7);
        assert_eq!(m.rotation, 3);
        assert_eq!(m.hamming, 0);
    }

    #[test]
    fn matcher_corrects_within_budget_only() {
        let dict = builtin_dictionary("DICT_7X7_100").expect("builtin dict");
        let budget = dict.max_correction_bits;
        assert!(budget >= 2);
        let base = dict.codes[42];
        let matcher = Matcher::with_default_correction(dict);

        let flipped = base ^ 0b101;
        let m = matcher.match_code(flipped).expect("correctable");
        assert_eq!((m.id, m.rotation, m.hamming), (42, 0, 2));

        let too_many = (0..=budget as u32 * 2 + 1).fold(base, |c, i| c ^ (1u64 << i));
        let m = matcher.match_code(too_many);
        assert!(m.is_none_or(|m| (m.id, m.rotation) != (42, 0)));
    }
}
