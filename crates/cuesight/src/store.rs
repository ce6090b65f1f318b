//! Persisted keystone transform.
//!
//! The matrix is stored as three lines of three comma-separated values in
//! `%.18e` notation, which is what numpy's `savetxt(..., delimiter=",")`
//! produces and `loadtxt` reads back. Nineteen significant digits make the
//! text form round-trip every `f64` exactly.

use crate::core::Homography;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no calibration stored at {}", path.display())]
    NoCalibration { path: PathBuf },
    #[error("malformed transform file, line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One `%.18e` value, exponent signed and at least two digits wide.
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{v:.18e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

pub fn format_matrix(h: &Homography) -> String {
    let mut out = String::new();
    for row in h.to_array() {
        let cells: Vec<String> = row.iter().map(|&v| format_value(v)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

/// Parse the text form. Blank lines and `#` comments are skipped.
pub fn parse_matrix(text: &str) -> Result<Homography, StoreError> {
    let mut rows: Vec<[f64; 3]> = Vec::with_capacity(3);
    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let content = raw.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        if rows.len() == 3 {
            return Err(StoreError::Malformed {
                line,
                reason: "more than 3 rows".to_string(),
            });
        }
        let values = content
            .split(',')
            .map(|f| {
                f.trim().parse::<f64>().map_err(|e| StoreError::Malformed {
                    line,
                    reason: format!("{:?}: {e}", f.trim()),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        let row: [f64; 3] = values.try_into().map_err(|v: Vec<f64>| StoreError::Malformed {
            line,
            reason: format!("expected 3 values, found {}", v.len()),
        })?;
        rows.push(row);
    }
    let rows: [[f64; 3]; 3] = rows.try_into().map_err(|r: Vec<[f64; 3]>| StoreError::Malformed {
        line: text.lines().count(),
        reason: format!("expected 3 rows, found {}", r.len()),
    })?;
    Ok(Homography::from_array(rows))
}

/// File-backed home of the current camera-to-table transform.
#[derive(Clone, Debug)]
pub struct TransformStore {
    path: PathBuf,
}

impl TransformStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Homography, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NoCalibration {
                    path: self.path.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let h = parse_matrix(&text)?;
        log::debug!("transform loaded from {}", self.path.display());
        Ok(h)
    }

    /// Replace the stored transform. The new text goes to a sibling file that
    /// is renamed over the old one, so readers see either version whole.
    pub fn save(&self, h: &Homography) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "matrix.csv".into());
        name.push(".tmp");
        let tmp = self.path.with_file_name(name);

        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(format_matrix(h).as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        log::info!("transform saved to {}", self.path.display());
        Ok(())
    }
}
