use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::allocation::AllocationLog;
use crate::capacity::{AvailabilityRow, CapacityLedger, CapacitySnapshot, CrossPair};
use crate::combinations::{self, CombinationGenerator};
use crate::config::{ResolvedSources, Settings, SourcePaths};
use crate::enrich::TraitEnricher;
use crate::error::{CrossError, Diagnostics};
use crate::export::{ExportOutcome, GuardedExportEngine};
use crate::highlight;
use crate::keys::VarietyKeyIndex;
use crate::kinship::{KinshipMatrix, KinshipResolver};
use crate::layout::DayLayout;
use crate::schema::combination;
use crate::survey::{
    self, Observation, RecordedObservation, SurveyAggregator, SurveySummary, SurveyTotals,
    TasselCounts,
};
use crate::table;

/// Outcome of the generation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub combinations: usize,
    pub female_varieties: usize,
    pub male_varieties: usize,
    /// STD varieties written to the tassel totals file.
    pub tassel_varieties: usize,
    pub diagnostics: Diagnostics,
}

/// Outcome of the match step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub rows: usize,
    pub genetic_values: bool,
    pub crossing_dataset: bool,
    pub kinship: bool,
    pub diagnostics: Diagnostics,
}

impl MatchReport {
    /// One-line summary with Y/N per source.
    pub fn summary(&self) -> String {
        let yn = |b: bool| if b { "Y" } else { "N" };
        format!(
            "{} rows; GV: {}, CD: {}, Kinship: {}",
            self.rows,
            yn(self.genetic_values),
            yn(self.crossing_dataset),
            yn(self.kinship)
        )
    }
}

/// One day's crossing session: file layout, the loaded candidate table and
/// the operator's current selection.
///
/// Every operation re-reads what it needs from disk. Capacity is recomputed
/// on each call and never cached.
#[derive(Debug)]
pub struct CrossingModel {
    layout: DayLayout,
    candidates: Option<DataFrame>,
    pairs: Vec<CrossPair>,
    selected: BTreeSet<usize>,
}

impl CrossingModel {
    pub fn new(layout: DayLayout) -> Self {
        Self {
            layout,
            candidates: None,
            pairs: Vec::new(),
            selected: BTreeSet::new(),
        }
    }

    pub fn layout(&self) -> &DayLayout {
        &self.layout
    }

    pub fn settings(&self) -> Settings {
        Settings::load(&self.layout.rules())
    }

    pub fn sources(&self) -> ResolvedSources {
        SourcePaths::load(&self.layout.sources()).resolve(self.layout.root())
    }

    fn allocation_log(&self) -> AllocationLog {
        AllocationLog::new(self.layout.allocations())
    }

    // ── Observations ────────────────────────────────────────────────────────

    pub fn record_observation(
        &self,
        observation: &Observation,
    ) -> Result<RecordedObservation, CrossError> {
        survey::append_observation(
            &self.layout.survey(),
            &self.sources().reference,
            observation,
        )
    }

    pub fn survey_summary(&self) -> Result<SurveySummary, CrossError> {
        SurveySummary::from_file(&self.layout.survey())
    }

    // ── Generation and matching ─────────────────────────────────────────────

    /// Aggregate today's observations, write the combinations file and the
    /// STD-keyed tassel totals.
    ///
    /// An observation file that exists but is empty counts as zero
    /// observations and produces empty outputs.
    pub fn generate_combinations(&self) -> Result<GenerationReport, CrossError> {
        let survey_path = self.layout.survey();
        let totals = if table::has_content(&survey_path) {
            SurveyAggregator::aggregate(&table::read_required(&survey_path)?)?
        } else if survey_path.exists() {
            log::warn!("{} is empty; no observations today", survey_path.display());
            SurveyTotals::default()
        } else {
            return Err(CrossError::MissingInput(survey_path));
        };
        let keys = VarietyKeyIndex::load(&self.sources().reference)?;

        let (combos, mut diagnostics) = CombinationGenerator::new(&keys).generate(&totals);
        diagnostics.merge(&totals.diagnostics);

        let mut frame = combinations::to_frame(&combos)?;
        table::write_csv(&self.layout.combinations(), &mut frame)?;
        let tassels = totals.by_std(&keys);
        tassels.write(&self.layout.tassels())?;

        let report = GenerationReport {
            combinations: combos.len(),
            female_varieties: totals.female.nonzero_keys().count(),
            male_varieties: totals.male.nonzero_keys().count(),
            tassel_varieties: tassels.len(),
            diagnostics,
        };
        log::info!(
            "generated {} combinations ({} female x {} male) for day {}",
            report.combinations,
            report.female_varieties,
            report.male_varieties,
            self.layout.day()
        );
        report.diagnostics.log("generate");
        Ok(report)
    }

    /// Enrich the day's combinations into the candidate table.
    pub fn match_crossings(&self) -> Result<MatchReport, CrossError> {
        let raw = table::read_required(&self.layout.combinations())?;
        let frame = combinations::normalize_frame(raw)?;
        let sources = self.sources();

        let enriched =
            TraitEnricher::new(&sources.genetic_values, &sources.crossing_dataset).enrich(frame)?;
        let mut diagnostics = enriched.diagnostics;
        let mut frame = enriched.frame;

        let matrix = Self::load_kinship(&sources.kinship);
        let kinship = !matrix.is_empty();
        if kinship {
            let (with_kinship, kin_diagnostics) = KinshipResolver::new(&matrix).attach(frame)?;
            frame = with_kinship;
            diagnostics.merge(&kin_diagnostics);
        }

        table::write_csv(&self.layout.candidates(), &mut frame)?;
        let report = MatchReport {
            rows: frame.height(),
            genetic_values: enriched.genetic_values,
            crossing_dataset: enriched.crossing_dataset,
            kinship,
            diagnostics,
        };
        log::info!("match: {}", report.summary());
        report.diagnostics.log("match");
        Ok(report)
    }

    fn load_kinship(path: &Path) -> KinshipMatrix {
        if !path.exists() {
            log::warn!("kinship matrix {} not found", path.display());
            return KinshipMatrix::default();
        }
        match KinshipMatrix::load(path) {
            Ok(matrix) => matrix,
            Err(e) => {
                log::warn!("kinship not attached: {e}");
                KinshipMatrix::default()
            }
        }
    }

    // ── Candidate table and selection ───────────────────────────────────────

    /// Load the day's candidate table. Clears any previous selection.
    pub fn load_candidates(&mut self) -> Result<&DataFrame, CrossError> {
        let df = table::fill_blank(table::read_required(&self.layout.candidates())?)?;
        for name in [combination::FEMALE_STD, combination::MALE_STD] {
            if !table::has_column(&df, name) {
                return Err(CrossError::MissingColumn(name.to_string()));
            }
        }
        let females = table::string_cells(&df, combination::FEMALE_STD)?;
        let males = table::string_cells(&df, combination::MALE_STD)?;
        self.pairs = females
            .into_iter()
            .zip(males)
            .map(|(f, m)| CrossPair::new(f, m))
            .collect();
        self.selected.clear();
        log::info!("loaded {} candidate rows", df.height());
        Ok(self.candidates.insert(df))
    }

    pub fn candidates(&self) -> Result<&DataFrame, CrossError> {
        self.candidates
            .as_ref()
            .ok_or_else(|| CrossError::NotLoaded("candidates".to_string()))
    }

    pub fn set_selected(&mut self, row: usize, selected: bool) -> Result<(), CrossError> {
        let height = self.candidates()?.height();
        if row >= height {
            return Err(CrossError::InvalidData(format!(
                "row {row} is outside the candidate table ({height} rows)"
            )));
        }
        if selected {
            self.selected.insert(row);
        } else {
            self.selected.remove(&row);
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Selected rows in table order.
    pub fn selected_rows(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub fn pair(&self, row: usize) -> Option<&CrossPair> {
        self.pairs.get(row)
    }

    // ── Capacity ────────────────────────────────────────────────────────────

    /// Live capacity with every selected row counted as pending.
    pub fn capacities(&self) -> Result<CapacitySnapshot, CrossError> {
        let pending: Vec<CrossPair> = self
            .selected
            .iter()
            .filter_map(|row| self.pairs.get(*row).cloned())
            .collect();
        self.snapshot(&pending)
    }

    fn snapshot(&self, pending: &[CrossPair]) -> Result<CapacitySnapshot, CrossError> {
        let (tassels, diagnostics) = TasselCounts::load(&self.layout.tassels())?;
        diagnostics.log("tassel totals");
        let history = self.allocation_log().records()?;
        Ok(CapacityLedger::compute(
            &tassels,
            self.settings().rules(),
            &history,
            pending,
        ))
    }

    pub fn availability(&self) -> Result<Vec<AvailabilityRow>, CrossError> {
        Ok(self.capacities()?.availability())
    }

    /// Rows to show: selected rows always, others only while eligible.
    pub fn visible_rows(&self) -> Result<Vec<usize>, CrossError> {
        self.candidates()?;
        let snapshot = self.capacities()?;
        Ok(self
            .pairs
            .iter()
            .enumerate()
            .filter(|(row, pair)| self.selected.contains(row) || snapshot.is_eligible(pair))
            .map(|(row, _)| row)
            .collect())
    }

    // ── Presentation helpers ────────────────────────────────────────────────

    pub fn display_headers(&self) -> Result<Vec<String>, CrossError> {
        let settings = self.settings();
        Ok(table::column_names(self.candidates()?)
            .iter()
            .map(|h| settings.display_name(h).to_string())
            .collect())
    }

    /// Configured hidden columns that exist in the candidate table.
    pub fn hidden_columns(&self) -> Result<Vec<String>, CrossError> {
        let df = self.candidates()?;
        Ok(self
            .settings()
            .hidden_columns
            .into_iter()
            .filter(|c| table::has_column(df, c))
            .collect())
    }

    pub fn highlights(&self) -> Result<Vec<Option<String>>, CrossError> {
        highlight::evaluate(self.candidates()?, &self.settings().highlight_rules)
    }

    // ── Export ──────────────────────────────────────────────────────────────

    /// Export the whole current selection.
    pub fn export_selected(&mut self, destination: &Path) -> Result<ExportOutcome, CrossError> {
        let batch = self.selected_rows();
        self.export_rows(&batch, destination)
    }

    /// Export `rows` (selected or not) in table order.
    ///
    /// Selected rows outside the batch stay pending and are deducted from the
    /// snapshot first. Committed rows are deselected; skipped rows keep their
    /// selection state.
    pub fn export_rows(
        &mut self,
        rows: &[usize],
        destination: &Path,
    ) -> Result<ExportOutcome, CrossError> {
        let df = self.candidates()?;
        let batch: BTreeSet<usize> = rows.iter().copied().collect();
        let mut ordered = Vec::with_capacity(batch.len());
        for row in &batch {
            let pair = self.pairs.get(*row).ok_or_else(|| {
                CrossError::InvalidData(format!(
                    "row {row} is outside the candidate table ({} rows)",
                    df.height()
                ))
            })?;
            ordered.push((*row, pair.clone()));
        }

        let pending: Vec<CrossPair> = self
            .selected
            .difference(&batch)
            .filter_map(|row| self.pairs.get(*row).cloned())
            .collect();
        let snapshot = self.snapshot(&pending)?;

        let log = self.allocation_log();
        let outcome = GuardedExportEngine::new(&log).export(df, &ordered, &snapshot, destination)?;
        if let ExportOutcome::Committed(report) = &outcome {
            let committed: HashSet<usize> = report.committed_rows.iter().copied().collect();
            self.selected.retain(|row| !committed.contains(row));
        }
        Ok(outcome)
    }

    pub fn default_export_path(&self) -> PathBuf {
        self.layout
            .root()
            .join(format!("export_{}.csv", self.layout.day()))
    }
}
