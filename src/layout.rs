use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate};

use crate::config::{PATHS_FILE, RULES_FILE};
use crate::error::CrossError;

const SURVEY_DIR: &str = "tassle_survey_data";
const TASSELS_DIR: &str = "Tassles";
const COMBINATIONS_DIR: &str = "Combinations";
const CROSSES_DIR: &str = "Crosses for the day";

/// Where one day's files live under the data root.
///
/// Every day-keyed file carries the day-of-year ordinal as its suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLayout {
    root: PathBuf,
    day: u32,
}

impl DayLayout {
    pub fn new(root: impl Into<PathBuf>, day: u32) -> Self {
        Self {
            root: root.into(),
            day,
        }
    }

    pub fn for_date(root: impl Into<PathBuf>, date: NaiveDate) -> Self {
        Self::new(root, date.ordinal())
    }

    pub fn today(root: impl Into<PathBuf>) -> Self {
        Self::for_date(root, Local::now().date_naive())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn survey(&self) -> PathBuf {
        self.root
            .join(SURVEY_DIR)
            .join(format!("tassel_survey_data_{}.csv", self.day))
    }

    pub fn tassels(&self) -> PathBuf {
        self.root
            .join(TASSELS_DIR)
            .join(format!("Tassles_{}.csv", self.day))
    }

    pub fn combinations(&self) -> PathBuf {
        self.root
            .join(COMBINATIONS_DIR)
            .join(format!("Combinations_{}.csv", self.day))
    }

    pub fn candidates(&self) -> PathBuf {
        self.root
            .join(CROSSES_DIR)
            .join(format!("Possible_crossings_{}.csv", self.day))
    }

    pub fn allocations(&self) -> PathBuf {
        self.root
            .join(CROSSES_DIR)
            .join(format!("allocated_{}.csv", self.day))
    }

    pub fn rules(&self) -> PathBuf {
        self.root.join(RULES_FILE)
    }

    pub fn sources(&self) -> PathBuf {
        self.root.join(PATHS_FILE)
    }

    pub fn ensure_dirs(&self) -> Result<(), CrossError> {
        for dir in [SURVEY_DIR, TASSELS_DIR, COMBINATIONS_DIR, CROSSES_DIR] {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_are_suffixed_with_day_of_year() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let layout = DayLayout::for_date("/data", date);
        assert_eq!(layout.day(), 34);
        assert_eq!(
            layout.survey(),
            PathBuf::from("/data/tassle_survey_data/tassel_survey_data_34.csv")
        );
        assert_eq!(layout.tassels(), PathBuf::from("/data/Tassles/Tassles_34.csv"));
        assert_eq!(
            layout.allocations(),
            PathBuf::from("/data/Crosses for the day/allocated_34.csv")
        );
    }

    #[test]
    fn ensure_dirs_creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DayLayout::new(dir.path(), 200);
        layout.ensure_dirs().unwrap();
        assert!(layout.combinations().parent().unwrap().is_dir());
        assert!(layout.candidates().parent().unwrap().is_dir());
    }
}
