use std::path::PathBuf;

use polars::prelude::*;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3_polars::PyDataFrame;

use crate::error::CrossError;
use crate::export::ExportOutcome;
use crate::layout::DayLayout;
use crate::model::CrossingModel;
use crate::schema;
use crate::survey::{Location, Observation};

#[pyclass(name = "CrossingModel")]
pub struct PyCrossingModel {
    inner: CrossingModel,
}

#[pymethods]
impl PyCrossingModel {
    /// `day` is the day-of-year ordinal; today when omitted.
    #[new]
    #[pyo3(signature = (root, day=None))]
    fn new(root: String, day: Option<u32>) -> PyResult<Self> {
        let layout = match day {
            Some(day) => DayLayout::new(PathBuf::from(root), day),
            None => DayLayout::today(PathBuf::from(root)),
        };
        layout.ensure_dirs()?;
        Ok(Self {
            inner: CrossingModel::new(layout),
        })
    }

    #[getter]
    fn day(&self) -> u32 {
        self.inner.layout().day()
    }

    /// Append one observation. Returns (AVARIETY, STDVARIETY, sex).
    fn record_observation(
        &self,
        bay: String,
        cart: String,
        can: String,
        tassels: u32,
        pollen_rating: i64,
    ) -> PyResult<(String, String, String)> {
        let observation = Observation {
            location: Location { bay, cart, can },
            tassels,
            pollen_rating,
        };
        let recorded = self.inner.record_observation(&observation)?;
        Ok((recorded.av, recorded.std, recorded.sex.as_str().to_string()))
    }

    /// (total, male, female) entries in today's observation file.
    fn survey_summary(&self) -> PyResult<(usize, usize, usize)> {
        let s = self.inner.survey_summary()?;
        Ok((s.total, s.male, s.female))
    }

    fn generate_combinations(&self) -> PyResult<usize> {
        Ok(self.inner.generate_combinations()?.combinations)
    }

    fn match_crossings(&self) -> PyResult<String> {
        Ok(self.inner.match_crossings()?.summary())
    }

    fn load_candidates(&mut self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.load_candidates()?.clone()))
    }

    fn candidates(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.inner.candidates()?.clone()))
    }

    fn set_selected(&mut self, row: usize, selected: bool) -> PyResult<()> {
        Ok(self.inner.set_selected(row, selected)?)
    }

    fn clear_selection(&mut self) {
        self.inner.clear_selection();
    }

    fn selected_rows(&self) -> Vec<usize> {
        self.inner.selected_rows()
    }

    /// Remaining capacity as rows of (STDVARIETY, Sex, remaining).
    fn availability(&self) -> PyResult<PyDataFrame> {
        let rows = self.inner.availability()?;
        let varieties: Vec<String> = rows.iter().map(|r| r.variety.clone()).collect();
        let roles: Vec<&str> = rows.iter().map(|r| r.role.as_str()).collect();
        let remaining: Vec<u64> = rows.iter().map(|r| r.remaining).collect();
        let df = DataFrame::new(vec![
            Column::new(schema::tassels::STDVARIETY.into(), &varieties),
            Column::new("Sex".into(), &roles),
            Column::new("Flowers remaining".into(), &remaining),
        ])
        .map_err(CrossError::from)?;
        Ok(PyDataFrame(df))
    }

    fn visible_rows(&self) -> PyResult<Vec<usize>> {
        Ok(self.inner.visible_rows()?)
    }

    fn display_headers(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.display_headers()?)
    }

    fn hidden_columns(&self) -> PyResult<Vec<String>> {
        Ok(self.inner.hidden_columns()?)
    }

    fn highlights(&self) -> PyResult<Vec<Option<String>>> {
        Ok(self.inner.highlights()?)
    }

    /// Export the selection. Returns (batch id or None, committed rows,
    /// skipped rows with their reasons).
    #[pyo3(signature = (destination=None))]
    fn export_selected(
        &mut self,
        destination: Option<String>,
    ) -> PyResult<(Option<String>, Vec<usize>, Vec<(usize, String)>)> {
        let destination = destination
            .map(PathBuf::from)
            .unwrap_or_else(|| self.inner.default_export_path());
        let outcome = match self.inner.export_selected(&destination)? {
            ExportOutcome::NothingSelected => (None, Vec::new(), Vec::new()),
            ExportOutcome::Rejected(skipped) => (
                None,
                Vec::new(),
                skipped.iter().map(|s| (s.row, s.reason())).collect(),
            ),
            ExportOutcome::Committed(report) => (
                Some(report.batch_id.to_string()),
                report.committed_rows,
                report.skipped.iter().map(|s| (s.row, s.reason())).collect(),
            ),
        };
        Ok(outcome)
    }
}

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Reference
    let reference = PyModule::new(m.py(), "reference")?;
    reference.add("AVARIETY", schema::reference::AVARIETY)?;
    reference.add("STDVARIETY", schema::reference::STDVARIETY)?;
    reference.add("NUMVAR", schema::reference::NUMVAR)?;
    reference.add("BAY", schema::reference::BAY)?;
    reference.add("CART", schema::reference::CART)?;
    reference.add("CAN", schema::reference::CAN)?;
    m.add_submodule(&reference)?;

    // Survey
    let survey = PyModule::new(m.py(), "survey")?;
    survey.add("AVARIETY", schema::survey::AVARIETY)?;
    survey.add("STDVARIETY", schema::survey::STDVARIETY)?;
    survey.add("CAN", schema::survey::CAN)?;
    survey.add("CART", schema::survey::CART)?;
    survey.add("BAY", schema::survey::BAY)?;
    survey.add("TASSELS", schema::survey::TASSELS)?;
    survey.add("POLLEN_RATING", schema::survey::POLLEN_RATING)?;
    survey.add("SEX", schema::survey::SEX)?;
    m.add_submodule(&survey)?;

    // Tassel totals
    let tassels = PyModule::new(m.py(), "tassels")?;
    tassels.add("STDVARIETY", schema::tassels::STDVARIETY)?;
    tassels.add("MALE", schema::tassels::MALE)?;
    tassels.add("FEMALE", schema::tassels::FEMALE)?;
    m.add_submodule(&tassels)?;

    // Combination
    let combination = PyModule::new(m.py(), "combination")?;
    combination.add("FEMALE_AVAR", schema::combination::FEMALE_AVAR)?;
    combination.add("MALE_AVAR", schema::combination::MALE_AVAR)?;
    combination.add("FEMALE_STD", schema::combination::FEMALE_STD)?;
    combination.add("MALE_STD", schema::combination::MALE_STD)?;
    combination.add("FEMALE_NUMVAR", schema::combination::FEMALE_NUMVAR)?;
    combination.add("MALE_NUMVAR", schema::combination::MALE_NUMVAR)?;
    m.add_submodule(&combination)?;

    // Candidate
    let candidate = PyModule::new(m.py(), "candidate")?;
    candidate.add("KINSHIP", schema::candidate::KINSHIP)?;
    candidate.add("FEMALE_PREFIX", schema::candidate::FEMALE_PREFIX)?;
    candidate.add("MALE_PREFIX", schema::candidate::MALE_PREFIX)?;
    candidate.add("FEMALE_CD_PREFIX", schema::candidate::FEMALE_CD_PREFIX)?;
    candidate.add("MALE_CD_PREFIX", schema::candidate::MALE_CD_PREFIX)?;
    m.add_submodule(&candidate)?;

    // Allocation log
    let allocation = PyModule::new(m.py(), "allocation")?;
    allocation.add("FEMALE", schema::allocation::FEMALE)?;
    allocation.add("MALE", schema::allocation::MALE)?;
    m.add_submodule(&allocation)?;

    Ok(())
}

#[pymodule]
fn crossing_engine(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyCrossingModel>()?;
    add_schema_exports(m)?;
    Ok(())
}
