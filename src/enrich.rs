use std::collections::HashSet;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::error::{CrossError, Diagnostics};
use crate::schema::{candidate, combination, crossing_dataset, genetic_value};
use crate::table::{self, NumericCell};

const ROW_INDEX: &str = "__row_index";
const JOIN_KEY: &str = "__join_key";

/// Result of running the optional enrichment passes.
#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub frame: DataFrame,
    pub genetic_values: bool,
    pub crossing_dataset: bool,
    pub diagnostics: Diagnostics,
}

/// Attaches genetic-value and per-parent trait columns to candidates.
///
/// Both sources are optional. A missing file or a failed join leaves the
/// candidates as they were and is reported as "not attached".
#[derive(Debug, Clone)]
pub struct TraitEnricher {
    genetic_values: PathBuf,
    crossing_dataset: PathBuf,
}

impl TraitEnricher {
    pub fn new(genetic_values: impl Into<PathBuf>, crossing_dataset: impl Into<PathBuf>) -> Self {
        Self {
            genetic_values: genetic_values.into(),
            crossing_dataset: crossing_dataset.into(),
        }
    }

    pub fn enrich(&self, candidates: DataFrame) -> Result<EnrichOutcome, CrossError> {
        let mut outcome = EnrichOutcome {
            frame: candidates,
            genetic_values: false,
            crossing_dataset: false,
            diagnostics: Diagnostics::default(),
        };

        let gv = match load_trait_table(&self.genetic_values) {
            Ok(gv) => gv,
            Err(e) => {
                log::warn!("genetic values not attached: {e}");
                None
            }
        };
        if let Some(gv) = &gv {
            match attach_genetic_values(outcome.frame.clone(), gv) {
                Ok((frame, diagnostics)) => {
                    outcome.frame = frame;
                    outcome.genetic_values = true;
                    outcome.diagnostics.merge(&diagnostics);
                }
                Err(e) => log::warn!("genetic values not attached: {e}"),
            }
        }

        match load_trait_table(&self.crossing_dataset) {
            Ok(Some(cd)) => match attach_crossing_dataset(outcome.frame.clone(), &cd) {
                Ok((frame, attached, diagnostics)) => {
                    outcome.frame = frame;
                    outcome.crossing_dataset = attached;
                    outcome.diagnostics.merge(&diagnostics);
                }
                Err(e) => log::warn!("crossing dataset not attached: {e}"),
            },
            Ok(None) => {}
            Err(e) => log::warn!("crossing dataset not attached: {e}"),
        }

        if let (true, Some(gv)) = (outcome.genetic_values, &gv) {
            match attach_baseline_percentages(outcome.frame.clone(), gv) {
                Ok((frame, diagnostics)) => {
                    outcome.frame = frame;
                    outcome.diagnostics.merge(&diagnostics);
                }
                Err(e) => log::warn!("baseline percentages skipped: {e}"),
            }
        }

        Ok(outcome)
    }
}

/// Read a trait table with upper-cased headers and blanks for nulls.
/// `None` when the file does not exist.
fn load_trait_table(path: &Path) -> Result<Option<DataFrame>, CrossError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut df = table::read_csv_as_strings(path)?;
    table::upper_case_headers(&mut df)?;
    Ok(Some(table::fill_blank(df)?))
}

/// Join the genetic-value table onto both parents by NUM variety, as
/// `FEMALE_<col>` and `MALE_<col>`.
pub fn attach_genetic_values(
    candidates: DataFrame,
    gv: &DataFrame,
) -> Result<(DataFrame, Diagnostics), CrossError> {
    if !table::has_column(gv, genetic_value::VARIETY) {
        return Err(CrossError::MissingColumn(genetic_value::VARIETY.to_string()));
    }
    let (df, mut diagnostics) = left_join_prefixed(
        candidates,
        gv,
        combination::FEMALE_NUMVAR,
        genetic_value::VARIETY,
        candidate::FEMALE_PREFIX,
    )?;
    let (df, male) = left_join_prefixed(
        df,
        gv,
        combination::MALE_NUMVAR,
        genetic_value::VARIETY,
        candidate::MALE_PREFIX,
    )?;
    diagnostics.merge(&male);
    Ok((df, diagnostics))
}

/// Express every parent trait value as a percentage of the baseline
/// variety's value, rounded to 3 decimals.
///
/// Without a baseline row nothing is added. A trait whose baseline value is
/// blank, non-numeric or zero gets no percentage columns; a candidate cell
/// that is not numeric yields a null percentage.
pub fn attach_baseline_percentages(
    mut candidates: DataFrame,
    gv: &DataFrame,
) -> Result<(DataFrame, Diagnostics), CrossError> {
    let mut diagnostics = Diagnostics::default();
    let varieties = table::string_cells(gv, genetic_value::VARIETY)?;
    let Some(base_row) = varieties
        .iter()
        .position(|v| v == genetic_value::BASELINE_VARIETY)
    else {
        log::debug!(
            "no baseline {} row; percentage columns skipped",
            genetic_value::BASELINE_VARIETY
        );
        return Ok((candidates, diagnostics));
    };

    for trait_col in table::column_names(gv) {
        if trait_col == genetic_value::VARIETY {
            continue;
        }
        let base = match table::parse_number(&table::string_cells(gv, &trait_col)?[base_row]) {
            NumericCell::Number(b) if b != 0.0 => b,
            _ => continue,
        };
        for prefix in [candidate::FEMALE_PREFIX, candidate::MALE_PREFIX] {
            let source = format!("{prefix}{trait_col}");
            // A trait named like a key column was never joined under that name.
            if combination::ALL.contains(&source.as_str())
                || !table::has_column(&candidates, &source)
            {
                continue;
            }
            let pct: Vec<Option<f64>> = table::string_cells(&candidates, &source)?
                .iter()
                .map(|cell| match table::parse_number(cell) {
                    NumericCell::Number(v) => Some(round_to(v / base * 100.0, 3)),
                    NumericCell::Invalid => {
                        diagnostics.numeric_coercions += 1;
                        None
                    }
                    NumericCell::Blank => None,
                })
                .collect();
            let name = format!("{source}{}", genetic_value::PCT_SUFFIX);
            candidates.with_column(Column::new(name.into(), &pct))?;
        }
    }
    Ok((candidates, diagnostics))
}

/// Join the per-parent crossing dataset: the `FVARIETY` family (columns not
/// starting with `M`) onto the female NUM key, the `MVARIETY` family (columns
/// not starting with `F`) onto the male NUM key.
///
/// Each family keeps only the first row per key before joining. Returns
/// whether either family was present.
pub fn attach_crossing_dataset(
    candidates: DataFrame,
    cd: &DataFrame,
) -> Result<(DataFrame, bool, Diagnostics), CrossError> {
    let mut diagnostics = Diagnostics::default();
    let names = table::column_names(cd);
    let mut df = candidates;
    let mut attached = false;

    let families = [
        (
            crossing_dataset::FVARIETY,
            'M',
            combination::FEMALE_NUMVAR,
            candidate::FEMALE_CD_PREFIX,
        ),
        (
            crossing_dataset::MVARIETY,
            'F',
            combination::MALE_NUMVAR,
            candidate::MALE_CD_PREFIX,
        ),
    ];
    for (key, excluded, left_key, prefix) in families {
        if !names.iter().any(|c| c == key) {
            continue;
        }
        let cols: Vec<String> = names
            .iter()
            .filter(|c| !c.starts_with(excluded))
            .cloned()
            .collect();
        let family = first_per_key(&cd.select(cols)?, key)?;
        let (joined, joined_diagnostics) = left_join_prefixed(df, &family, left_key, key, prefix)?;
        df = joined;
        diagnostics.merge(&joined_diagnostics);
        attached = true;
    }
    Ok((df, attached, diagnostics))
}

/// Keep the first occurring row for every distinct value of `key`.
fn first_per_key(df: &DataFrame, key: &str) -> Result<DataFrame, CrossError> {
    Ok(df.unique_stable(Some(&[key.to_string()]), UniqueKeepStrategy::First, None)?)
}

/// Left-join `right` onto `base` where `base[left_key] == right[right_key]`,
/// renaming every other right column to `<prefix><name>`.
///
/// A right column whose prefixed name is already a base column is dropped
/// and counted as a collision. Left row order is preserved. Unpartnered base
/// rows are counted as join mismatches.
fn left_join_prefixed(
    base: DataFrame,
    right: &DataFrame,
    left_key: &str,
    right_key: &str,
    prefix: &str,
) -> Result<(DataFrame, Diagnostics), CrossError> {
    let mut diagnostics = Diagnostics::default();
    let base_cols = table::column_names(&base);
    let right_keys = table::string_cells(right, right_key)?;

    let mut columns = vec![Column::new(JOIN_KEY.into(), &right_keys)];
    let mut added = Vec::new();
    for name in table::column_names(right) {
        if name == right_key {
            continue;
        }
        let prefixed = format!("{prefix}{name}");
        if base_cols.contains(&prefixed) {
            log::debug!("{prefixed} already present; source column {name} not joined");
            diagnostics.column_collisions += 1;
            continue;
        }
        columns.push(right.column(&name)?.clone().with_name(prefixed.as_str().into()));
        added.push(prefixed);
    }
    let renamed = DataFrame::new(columns)?;

    let known: HashSet<&str> = right_keys.iter().map(String::as_str).collect();
    diagnostics.join_mismatches = table::string_cells(&base, left_key)?
        .iter()
        .filter(|k| !known.contains(k.as_str()))
        .count();

    let keep: Vec<Expr> = base_cols
        .iter()
        .chain(&added)
        .map(|c| col(c.as_str()))
        .collect();

    let joined = base
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .join(
            renamed.lazy(),
            [col(left_key)],
            [col(JOIN_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .sort(
            [ROW_INDEX],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .select(keep)
        .collect()?;

    Ok((joined, diagnostics))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
