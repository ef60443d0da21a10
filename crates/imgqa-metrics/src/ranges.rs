//! Per-dimension range normalization of feature vectors.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::QualityError;

/// Per-dimension (min, max) bounds that rescale a raw feature vector into a
/// fixed target interval.
///
/// The table is loaded once, is immutable afterwards and can be shared
/// read-only across concurrent scoring calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RangeTable {
    /// Lower bound of the target interval.
    pub lower: f64,
    /// Upper bound of the target interval.
    pub upper: f64,
    /// Per-dimension minimum of the raw feature values.
    pub min: Vec<f64>,
    /// Per-dimension maximum of the raw feature values.
    pub max: Vec<f64>,
}

impl RangeTable {
    /// Create a range table mapping into the canonical `[-1, 1]` interval.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::DimensionMismatch`] if `min` and `max` have
    /// different lengths.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<Self, QualityError> {
        if min.len() != max.len() {
            return Err(QualityError::DimensionMismatch {
                expected: min.len(),
                found: max.len(),
            });
        }

        Ok(Self {
            lower: -1.0,
            upper: 1.0,
            min,
            max,
        })
    }

    /// Load a range table from a JSON document on disk.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::ModelLoad`] if the file is missing, unreadable
    /// or does not match the schema.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, QualityError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| QualityError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let table: RangeTable = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| QualityError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        if table.min.len() != table.max.len() {
            return Err(QualityError::ModelLoad(format!(
                "range table bounds differ in length: {} vs {}",
                table.min.len(),
                table.max.len()
            )));
        }

        log::debug!(
            "loaded range table with {} dimensions from {}",
            table.min.len(),
            path.display()
        );

        Ok(table)
    }

    /// Persist the range table as a JSON document.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), QualityError> {
        let file = File::create(path.as_ref())
            .map_err(|e| QualityError::ModelLoad(e.to_string()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| QualityError::ModelLoad(e.to_string()))?;
        Ok(())
    }

    /// The number of feature dimensions covered by the table.
    pub fn len(&self) -> usize {
        self.min.len()
    }

    /// Whether the table covers zero dimensions.
    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Rescale a raw feature vector into the target interval.
    ///
    /// Each dimension maps linearly from `[min_i, max_i]` onto
    /// `[lower, upper]`. A degenerate dimension (`max_i == min_i`) maps to the
    /// interval midpoint instead of dividing by zero.
    ///
    /// # Errors
    ///
    /// Returns [`QualityError::DimensionMismatch`] if the vector length does
    /// not equal the table length.
    pub fn normalize(&self, features: &[f64]) -> Result<Vec<f64>, QualityError> {
        if features.len() != self.len() {
            return Err(QualityError::DimensionMismatch {
                expected: self.len(),
                found: features.len(),
            });
        }

        let normalized = features
            .iter()
            .zip(self.min.iter().zip(self.max.iter()))
            .map(|(&x, (&min, &max))| {
                if max == min {
                    0.5 * (self.lower + self.upper)
                } else {
                    self.lower + (self.upper - self.lower) * (x - min) / (max - min)
                }
            })
            .collect();

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_endpoints() -> Result<(), QualityError> {
        let table = RangeTable::new(vec![0.0, -2.0], vec![10.0, 2.0])?;

        let at_min = table.normalize(&[0.0, -2.0])?;
        assert_eq!(at_min, vec![-1.0, -1.0]);

        let at_max = table.normalize(&[10.0, 2.0])?;
        assert_eq!(at_max, vec![1.0, 1.0]);

        let mid = table.normalize(&[5.0, 0.0])?;
        assert_relative_eq!(mid[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(mid[1], 0.0, epsilon = 1e-12);

        Ok(())
    }

    #[test]
    fn normalize_stays_in_interval() -> Result<(), QualityError> {
        let table = RangeTable::new(vec![0.0; 4], vec![1.0; 4])?;
        let out = table.normalize(&[0.1, 0.5, 0.9, 1.0])?;
        for v in out {
            assert!((-1.0..=1.0).contains(&v));
        }
        Ok(())
    }

    #[test]
    fn normalize_degenerate_dimension() -> Result<(), QualityError> {
        let table = RangeTable::new(vec![3.0], vec![3.0])?;
        let out = table.normalize(&[3.0])?;
        assert_eq!(out, vec![0.0]);

        // any input value maps to the midpoint on a degenerate dimension
        let out = table.normalize(&[100.0])?;
        assert_eq!(out, vec![0.0]);

        Ok(())
    }

    #[test]
    fn normalize_length_mismatch() {
        let table = RangeTable::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let res = table.normalize(&[0.0; 2]);
        assert!(matches!(
            res,
            Err(QualityError::DimensionMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn bounds_length_mismatch() {
        let res = RangeTable::new(vec![0.0; 3], vec![1.0; 2]);
        assert!(matches!(
            res,
            Err(QualityError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn save_and_load_roundtrip() -> Result<(), QualityError> {
        let dir = tempfile::tempdir().map_err(|e| QualityError::ModelLoad(e.to_string()))?;
        let path = dir.path().join("range.json");

        let table = RangeTable::new(vec![0.0, 1.0], vec![2.0, 3.0])?;
        table.save(&path)?;

        let loaded = RangeTable::from_file(&path)?;
        assert_eq!(loaded.min, table.min);
        assert_eq!(loaded.max, table.max);
        assert_eq!(loaded.lower, -1.0);
        assert_eq!(loaded.upper, 1.0);

        Ok(())
    }

    #[test]
    fn load_missing_file() {
        let res = RangeTable::from_file("does/not/exist.json");
        assert!(matches!(res, Err(QualityError::ModelLoad(_))));
    }
}
