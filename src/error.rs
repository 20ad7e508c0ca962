use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrossError {
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("{0}")]
    General(String),
}

#[cfg(feature = "python")]
impl From<CrossError> for pyo3::PyErr {
    fn from(err: CrossError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}

/// Non-fatal conditions accumulated over one operation.
///
/// None of these abort a run; they are counted and reported alongside the
/// result so the operator can see how much of the input degraded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Variety keys absent from the key index (resolved to themselves).
    pub unresolved_keys: usize,
    /// Cells expected to be numeric that failed to parse.
    pub numeric_coercions: usize,
    /// Candidate rows without a match in an optional trait/kinship source.
    pub join_mismatches: usize,
    /// Source columns dropped because their prefixed name already existed.
    pub column_collisions: usize,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        self.unresolved_keys == 0
            && self.numeric_coercions == 0
            && self.join_mismatches == 0
            && self.column_collisions == 0
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        self.unresolved_keys += other.unresolved_keys;
        self.numeric_coercions += other.numeric_coercions;
        self.join_mismatches += other.join_mismatches;
        self.column_collisions += other.column_collisions;
    }

    /// Emit one aggregated warning line for `operation` if anything degraded.
    pub fn log(&self, operation: &str) {
        if !self.is_clean() {
            log::warn!(
                "{operation}: {} unresolved keys, {} numeric coercions, {} join mismatches, {} column collisions",
                self.unresolved_keys,
                self.numeric_coercions,
                self.join_mismatches,
                self.column_collisions
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_sums_counts() {
        let mut a = Diagnostics {
            unresolved_keys: 1,
            numeric_coercions: 0,
            join_mismatches: 2,
            column_collisions: 0,
        };
        a.merge(&Diagnostics {
            unresolved_keys: 3,
            numeric_coercions: 4,
            join_mismatches: 0,
            column_collisions: 1,
        });
        assert_eq!(a.unresolved_keys, 4);
        assert_eq!(a.numeric_coercions, 4);
        assert_eq!(a.join_mismatches, 2);
        assert_eq!(a.column_collisions, 1);
        assert!(!a.is_clean());
        assert!(Diagnostics::default().is_clean());
    }

    #[test]
    fn missing_input_names_the_path() {
        let err = CrossError::MissingInput(PathBuf::from("Combinations/Combinations_12.csv"));
        assert_eq!(
            err.to_string(),
            "Missing input: Combinations/Combinations_12.csv"
        );
    }
}
