use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;

use crate::error::{CrossError, Diagnostics};
use crate::schema::{candidate, combination};
use crate::table::{self, NumericCell};

/// Pairwise kinship coefficients indexed by STD variety on both axes.
///
/// The file's first column holds the row labels; the remaining headers are
/// the column labels. Blank cells are treated as absent so a matrix stored as
/// a single triangle still resolves from either side.
#[derive(Debug, Clone, Default)]
pub struct KinshipMatrix {
    cells: HashMap<(String, String), String>,
}

impl KinshipMatrix {
    pub fn load(path: &Path) -> Result<Self, CrossError> {
        let df = table::read_csv_as_strings(path)?;
        Self::from_frame(&df)
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self, CrossError> {
        let names = table::column_names(df);
        let Some((label_col, value_cols)) = names.split_first() else {
            return Ok(Self::default());
        };
        let rows = table::string_cells(df, label_col)?;

        let mut cells = HashMap::new();
        for column in value_cols {
            let values = table::string_cells(df, column)?;
            let col_label = column.trim().to_string();
            for (row_label, value) in rows.iter().zip(values) {
                if value.is_empty() {
                    continue;
                }
                cells.insert((row_label.clone(), col_label.clone()), value);
            }
        }
        Ok(Self { cells })
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: &str, column: &str) -> Option<&str> {
        self.cells
            .get(&(row.to_string(), column.to_string()))
            .map(String::as_str)
    }

    /// Raw cell for (female, male), falling back to (male, female).
    pub fn lookup(&self, female: &str, male: &str) -> Option<&str> {
        self.get(female, male).or_else(|| self.get(male, female))
    }
}

/// Outcome of resolving one candidate's kinship.
#[derive(Debug, Clone, PartialEq)]
pub enum Kinship {
    /// A coefficient was found; the original text is kept for output.
    Known { text: String, value: f64 },
    /// Neither orientation is in the matrix.
    Unknown,
    /// A cell was found but is not a number.
    Invalid(String),
}

impl Kinship {
    /// Cell text for the candidate table; unknown and invalid are blank.
    pub fn cell(&self) -> String {
        match self {
            Kinship::Known { text, .. } => text.clone(),
            Kinship::Unknown | Kinship::Invalid(_) => String::new(),
        }
    }
}

/// Symmetric kinship lookup for candidate pairs.
pub struct KinshipResolver<'a> {
    matrix: &'a KinshipMatrix,
}

impl<'a> KinshipResolver<'a> {
    pub fn new(matrix: &'a KinshipMatrix) -> Self {
        Self { matrix }
    }

    pub fn resolve(&self, female_std: &str, male_std: &str) -> Kinship {
        match self.matrix.lookup(female_std.trim(), male_std.trim()) {
            None => Kinship::Unknown,
            Some(text) => match table::parse_number(text) {
                NumericCell::Number(value) => Kinship::Known {
                    text: text.to_string(),
                    value,
                },
                _ => Kinship::Invalid(text.to_string()),
            },
        }
    }

    /// Add the `KINSHIP` column to a candidate frame.
    pub fn attach(&self, mut candidates: DataFrame) -> Result<(DataFrame, Diagnostics), CrossError> {
        let mut diagnostics = Diagnostics::default();
        let females = table::string_cells_or_blank(&candidates, combination::FEMALE_STD)?;
        let males = table::string_cells_or_blank(&candidates, combination::MALE_STD)?;

        let values: Vec<String> = females
            .iter()
            .zip(&males)
            .map(|(f, m)| {
                let kinship = self.resolve(f, m);
                match &kinship {
                    Kinship::Unknown => diagnostics.join_mismatches += 1,
                    Kinship::Invalid(text) => {
                        log::debug!("kinship {f} x {m}: '{text}' is not a number");
                        diagnostics.numeric_coercions += 1;
                    }
                    Kinship::Known { .. } => {}
                }
                kinship.cell()
            })
            .collect();
        candidates.with_column(Column::new(candidate::KINSHIP.into(), &values))?;
        Ok((candidates, diagnostics))
    }
}
