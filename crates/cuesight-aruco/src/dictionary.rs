//! Dictionary metadata, packed marker codes and JSON code tables.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("marker_size {marker_size} implies {bits} bits; at most 64 are supported")]
    TooManyBits { marker_size: usize, bits: usize },
    #[error("dictionary {name} has no codes")]
    Empty { name: String },
    #[error("code #{index} of {name} sets bits beyond the {bits}-bit payload")]
    CodeOutOfRange {
        name: String,
        index: usize,
        bits: usize,
    },
    #[error("OpenCV table {name}: marker_{index} is missing or not {bits} '0'/'1' characters")]
    OpenCvMarker {
        name: String,
        index: usize,
        bits: usize,
    },
}

/// The JSON that OpenCV's `Dictionary::writeDictionary` produces through a
/// `.json` `FileStorage`: one `marker_<i>` bit string per code, `1` = white.
#[derive(Deserialize)]
struct OpenCvTable {
    nmarkers: usize,
    markersize: usize,
    #[serde(rename = "maxCorrectionBits", default)]
    max_correction_bits: u8,
    #[serde(flatten)]
    markers: HashMap<String, serde_json::Value>,
}

/// An ArUco-style dictionary.
///
/// Codes hold the inner `marker_size x marker_size` bits in row-major order
/// with **black = 1**; bit `y * marker_size + x` is cell `(x, y)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    pub name: Cow<'static, str>,
    pub marker_size: usize,
    /// Largest number of flipped bits the matcher may correct.
    pub max_correction_bits: u8,
    pub codes: Cow<'static, [u64]>,
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Check the payload width and that every code fits in it.
    pub fn validate(&self) -> Result<(), DictionaryError> {
        let bits = self.bit_count();
        if bits > 64 || self.marker_size == 0 {
            return Err(DictionaryError::TooManyBits {
                marker_size: self.marker_size,
                bits,
            });
        }
        if self.codes.is_empty() {
            return Err(DictionaryError::Empty {
                name: self.name.to_string(),
            });
        }
        let mask = payload_mask(bits);
        if let Some(index) = self.codes.iter().position(|&c| c & !mask != 0) {
            return Err(DictionaryError::CodeOutOfRange {
                name: self.name.to_string(),
                index,
                bits,
            });
        }
        Ok(())
    }

    /// Parse and validate a code table such as
    /// `{"name": "DICT_5X5_50", "marker_size": 5, "max_correction_bits": 3, "codes": [...]}`.
    pub fn from_json_str(raw: &str) -> Result<Self, DictionaryError> {
        let dict: Dictionary = serde_json::from_str(raw)?;
        dict.validate()?;
        Ok(dict)
    }

    /// Import a table written by OpenCV's `writeDictionary`, e.g. the real
    /// `DICT_5X5_50` exported once from `cv2.aruco.getPredefinedDictionary`.
    pub fn from_opencv_json(name: &str, raw: &str) -> Result<Self, DictionaryError> {
        let table: OpenCvTable = serde_json::from_str(raw)?;
        let bits = table.markersize * table.markersize;
        if bits > 64 || bits == 0 {
            return Err(DictionaryError::TooManyBits {
                marker_size: table.markersize,
                bits,
            });
        }

        let codes = (0..table.nmarkers)
            .map(|index| {
                let bad = || DictionaryError::OpenCvMarker {
                    name: name.to_string(),
                    index,
                    bits,
                };
                let s = table
                    .markers
                    .get(&format!("marker_{index}"))
                    .and_then(|v| v.as_str())
                    .filter(|s| s.len() == bits)
                    .ok_or_else(bad)?;
                s.bytes().enumerate().try_fold(0u64, |code, (i, b)| match b {
                    // Black cells are the set bits here.
                    b'0' => Ok(code | (1u64 << i)),
                    b'1' => Ok(code),
                    _ => Err(bad()),
                })
            })
            .collect::<Result<Vec<u64>, _>>()?;

        let dict = Dictionary {
            name: Cow::Owned(name.to_string()),
            marker_size: table.markersize,
            max_correction_bits: table.max_correction_bits,
            codes: Cow::Owned(codes),
        };
        dict.validate()?;
        Ok(dict)
    }

    /// Load a code table in either cuesight's layout or OpenCV's. An OpenCV
    /// table is named after the file stem.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        if value.get("nmarkers").is_some() {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("opencv");
            return Self::from_opencv_json(name, &raw);
        }
        Self::from_json_str(&raw)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DictionaryError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[inline]
pub(crate) fn payload_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_table_round_trips_through_disk() {
        let dict = Dictionary {
            name: Cow::Borrowed("CUSTOM_3X3"),
            marker_size: 3,
            max_correction_bits: 0,
            codes: Cow::Owned(vec![0b000_111_000, 0b101_010_101]),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        dict.write_json(&path).unwrap();
        let back = Dictionary::load_json(&path).unwrap();
        assert_eq!(back, dict);
    }

    #[test]
    fn rejects_codes_wider_than_payload() {
        let raw = r#"{"name":"BAD","marker_size":2,"max_correction_bits":0,"codes":[3,16]}"#;
        let err = Dictionary::from_json_str(raw).unwrap_err();
        assert!(matches!(err, DictionaryError::CodeOutOfRange { index: 1, .. }));
    }

    #[test]
    fn opencv_export_reads_white_as_zero() {
        // 2x2 markers: a lone white cell at the top-left, then a white diagonal.
        let raw = r#"{
            "nmarkers": 2,
            "markersize": 2,
            "maxCorrectionBits": 0,
            "marker_0": "1000",
            "marker_1": "1001"
        }"#;
        let dict = Dictionary::from_opencv_json("TINY", raw).unwrap();
        assert_eq!(dict.name, "TINY");
        assert_eq!(dict.marker_size, 2);
        assert_eq!(dict.codes.as_ref(), &[0b1110, 0b0110]);
    }

    #[test]
    fn opencv_export_with_a_short_marker_is_rejected() {
        let raw = r#"{"nmarkers": 2, "markersize": 2, "marker_0": "1000", "marker_1": "10"}"#;
        assert!(matches!(
            Dictionary::from_opencv_json("TINY", raw),
            Err(DictionaryError::OpenCvMarker { index: 1, .. })
        ));
    }

    #[test]
    fn load_json_detects_the_opencv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DICT_2X2_EXPORT.json");
        fs::write(
            &path,
            r#"{"nmarkers": 1, "markersize": 2, "maxCorrectionBits": 0, "marker_0": "0111"}"#,
        )
        .unwrap();
        let dict = Dictionary::load_json(&path).unwrap();
        assert_eq!(dict.name, "DICT_2X2_EXPORT");
        assert_eq!(dict.codes.as_ref(), &[0b0001]);
    }

    #[test]
    fn rejects_oversized_markers() {
        let raw = r#"{"name":"BIG","marker_size":9,"max_correction_bits":0,"codes":[1]}"#;
        assert!(matches!(
            Dictionary::from_json_str(raw),
            Err(DictionaryError::TooManyBits { bits: 81, .. })
        ));
    }
}
