use std::path::{Path, PathBuf};

use crate::capacity::CrossPair;
use crate::error::CrossError;
use crate::schema::allocation;
use crate::table;

/// One committed cross, as stored in the allocation log.
pub type AllocationRecord = CrossPair;

/// The day's append-only allocation log (`FEMALE`,`MALE` STD varieties).
///
/// There is no lock between reading the log for a capacity snapshot and
/// appending to it; a concurrent writer can push the day past capacity.
#[derive(Debug, Clone)]
pub struct AllocationLog {
    path: PathBuf,
}

impl AllocationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All committed pairs in log order. A missing or empty log has none.
    pub fn records(&self) -> Result<Vec<AllocationRecord>, CrossError> {
        if !table::has_content(&self.path) {
            return Ok(Vec::new());
        }
        let df = table::read_csv_as_strings(&self.path)?;
        let females = table::string_cells_or_blank(&df, allocation::FEMALE)?;
        let males = table::string_cells_or_blank(&df, allocation::MALE)?;
        Ok(females
            .into_iter()
            .zip(males)
            .map(|(female, male)| CrossPair::new(female, male))
            .collect())
    }

    pub fn append(&self, records: &[AllocationRecord]) -> Result<(), CrossError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut df = table::string_frame(vec![
            (
                allocation::FEMALE,
                records.iter().map(|r| r.female.clone()).collect(),
            ),
            (
                allocation::MALE,
                records.iter().map(|r| r.male.clone()).collect(),
            ),
        ])?;
        table::append_csv(&self.path, &mut df)?;
        log::info!(
            "appended {} allocation records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}
