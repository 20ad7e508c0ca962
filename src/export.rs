//! Capacity-guarded commit of selected candidates.
//!
//! Selections are walked in table order against a running copy of the
//! snapshot. Rows that still fit commit and consume one unit per side; rows
//! that don't are skipped with the exhausted side. Partial batches commit.
use std::path::{Path, PathBuf};

use polars::prelude::*;
use uuid::Uuid;

use crate::allocation::{AllocationLog, AllocationRecord};
use crate::capacity::{CapacitySnapshot, CrossPair, ExhaustedSide};
use crate::error::CrossError;
use crate::table;

/// A selected row that could not be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// Index into the candidate table.
    pub row: usize,
    pub pair: CrossPair,
    pub side: ExhaustedSide,
}

impl SkippedRow {
    pub fn reason(&self) -> String {
        let female = format!("female '{}' has 0 remaining", self.pair.female);
        let male = format!("male '{}' has 0 remaining (rule-adjusted)", self.pair.male);
        match self.side {
            ExhaustedSide::Female => female,
            ExhaustedSide::Male => male,
            ExhaustedSide::Both => format!("{female}; {male}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportPlan {
    pub committed: Vec<(usize, CrossPair)>,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub batch_id: Uuid,
    /// Candidate-table indices that were written and logged.
    pub committed_rows: Vec<usize>,
    pub skipped: Vec<SkippedRow>,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    NothingSelected,
    /// Every selected row was skipped; nothing was written.
    Rejected(Vec<SkippedRow>),
    Committed(ExportReport),
}

pub struct GuardedExportEngine<'a> {
    log: &'a AllocationLog,
}

impl<'a> GuardedExportEngine<'a> {
    pub fn new(log: &'a AllocationLog) -> Self {
        Self { log }
    }

    /// Greedy pass over `rows` (already in table order).
    pub fn plan(rows: &[(usize, CrossPair)], snapshot: &CapacitySnapshot) -> ExportPlan {
        let mut remaining = snapshot.clone();
        let mut plan = ExportPlan::default();
        for (row, pair) in rows {
            match remaining.exhausted_side(pair) {
                None => {
                    remaining.consume(pair);
                    plan.committed.push((*row, pair.clone()));
                }
                Some(side) => plan.skipped.push(SkippedRow {
                    row: *row,
                    pair: pair.clone(),
                    side,
                }),
            }
        }
        plan
    }

    /// Plan, then write committed rows of `candidates` to `destination` and
    /// append them to the allocation log. Nothing is written unless at least
    /// one row commits.
    pub fn export(
        &self,
        candidates: &DataFrame,
        rows: &[(usize, CrossPair)],
        snapshot: &CapacitySnapshot,
        destination: &Path,
    ) -> Result<ExportOutcome, CrossError> {
        if rows.is_empty() {
            return Ok(ExportOutcome::NothingSelected);
        }
        let plan = Self::plan(rows, snapshot);
        if plan.committed.is_empty() {
            log::warn!("none of the {} selected rows fit remaining availability", rows.len());
            return Ok(ExportOutcome::Rejected(plan.skipped));
        }

        let mut mask = vec![false; candidates.height()];
        for (row, _) in &plan.committed {
            match mask.get_mut(*row) {
                Some(slot) => *slot = true,
                None => {
                    return Err(CrossError::InvalidData(format!(
                        "selected row {row} is outside the candidate table"
                    )))
                }
            }
        }
        let mask = BooleanChunked::from_slice("committed".into(), &mask);
        let mut committed = candidates.filter(&mask)?;
        table::write_csv(destination, &mut committed)?;

        let records: Vec<AllocationRecord> =
            plan.committed.iter().map(|(_, pair)| pair.clone()).collect();
        self.log.append(&records)?;

        let batch_id = Uuid::new_v4();
        log::info!(
            "export {batch_id}: {} committed, {} skipped -> {}",
            records.len(),
            plan.skipped.len(),
            destination.display()
        );
        for skip in &plan.skipped {
            log::info!("export {batch_id}: row {} skipped, {}", skip.row + 1, skip.reason());
        }

        Ok(ExportOutcome::Committed(ExportReport {
            batch_id,
            committed_rows: plan.committed.iter().map(|(row, _)| *row).collect(),
            skipped: plan.skipped,
            destination: destination.to_path_buf(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::CapacityLedger;
    use crate::config::CrossingRules;
    use crate::survey::{TasselCount, TasselCounts};

    fn snapshot(rows: &[(&str, u64, u64)]) -> CapacitySnapshot {
        let mut counts = TasselCounts::default();
        for (variety, male, female) in rows {
            counts.insert(
                variety,
                TasselCount {
                    male: *male,
                    female: *female,
                },
            );
        }
        CapacityLedger::compute(&counts, CrossingRules::default(), &[], &[])
    }

    #[test]
    fn greedy_plan_commits_first_in_order() {
        let snap = snapshot(&[("F1", 0, 5), ("F2", 0, 5), ("F3", 0, 5), ("M", 1, 0)]);
        let rows = vec![
            (0, CrossPair::new("F1", "M")),
            (1, CrossPair::new("F2", "M")),
            (2, CrossPair::new("F3", "M")),
        ];
        let plan = GuardedExportEngine::plan(&rows, &snap);
        assert_eq!(plan.committed, vec![(0, CrossPair::new("F1", "M"))]);
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan.skipped.iter().all(|s| s.side == ExhaustedSide::Male));
        assert_eq!(
            plan.skipped[0].reason(),
            "male 'M' has 0 remaining (rule-adjusted)"
        );
    }

    #[test]
    fn reason_names_both_sides() {
        let skip = SkippedRow {
            row: 0,
            pair: CrossPair::new("A", "B"),
            side: ExhaustedSide::Both,
        };
        assert_eq!(
            skip.reason(),
            "female 'A' has 0 remaining; male 'B' has 0 remaining (rule-adjusted)"
        );
    }

    #[test]
    fn rejected_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = AllocationLog::new(dir.path().join("allocated.csv"));
        let destination = dir.path().join("out.csv");
        let candidates = df!("FEMALE_STD" => &["A"], "MALE_STD" => &["B"]).unwrap();

        let outcome = GuardedExportEngine::new(&log)
            .export(
                &candidates,
                &[(0, CrossPair::new("A", "B"))],
                &snapshot(&[("A", 0, 0)]),
                &destination,
            )
            .unwrap();
        assert!(matches!(outcome, ExportOutcome::Rejected(ref s) if s.len() == 1));
        assert!(!destination.exists());
        assert!(log.records().unwrap().is_empty());
    }

    #[test]
    fn committed_rows_keep_original_headers() {
        let dir = tempfile::tempdir().unwrap();
        let log = AllocationLog::new(dir.path().join("allocated.csv"));
        let destination = dir.path().join("out.csv");
        let candidates = df!(
            "FEMALE_STD" => &["A", "C"],
            "MALE_STD" => &["B", "B"],
            "KINSHIP" => &["0.1", ""]
        )
        .unwrap();

        let outcome = GuardedExportEngine::new(&log)
            .export(
                &candidates,
                &[(0, CrossPair::new("A", "B")), (1, CrossPair::new("C", "B"))],
                &snapshot(&[("A", 0, 1), ("C", 0, 1), ("B", 1, 0)]),
                &destination,
            )
            .unwrap();
        let ExportOutcome::Committed(report) = outcome else {
            panic!("expected a commit");
        };
        assert_eq!(report.committed_rows, vec![0]);
        assert_eq!(report.skipped.len(), 1);

        let written = table::read_csv_as_strings(&destination).unwrap();
        assert_eq!(
            table::column_names(&written),
            vec!["FEMALE_STD", "MALE_STD", "KINSHIP"]
        );
        assert_eq!(written.height(), 1);
        assert_eq!(log.records().unwrap(), vec![CrossPair::new("A", "B")]);
    }

    #[test]
    fn empty_selection_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = AllocationLog::new(dir.path().join("allocated.csv"));
        let outcome = GuardedExportEngine::new(&log)
            .export(
                &DataFrame::empty(),
                &[],
                &CapacitySnapshot::default(),
                &dir.path().join("out.csv"),
            )
            .unwrap();
        assert_eq!(outcome, ExportOutcome::NothingSelected);
    }
}
