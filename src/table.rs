//! CSV boundary helpers shared by every engine component.
//!
//! Every file is read with all columns as String so that variety codes such as
//! `2001299` or `007` keep their exact spelling; numeric interpretation happens
//! per cell, where a failed parse is a counted warning instead of an error.
use std::fs::{self, File, OpenOptions};
use std::path::Path;

use polars::prelude::*;

use crate::error::CrossError;

/// Read a CSV file with all columns as String dtype.
/// Trims whitespace from column names.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, CrossError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Like [`read_csv_as_strings`] but refuses with `MissingInput` when the
/// file does not exist.
pub fn read_required(path: &Path) -> Result<DataFrame, CrossError> {
    if !path.exists() {
        return Err(CrossError::MissingInput(path.to_path_buf()));
    }
    read_csv_as_strings(path)
}

/// `true` when the path exists and holds at least one byte.
pub fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Upper-case and trim every header in place.
pub fn upper_case_headers(df: &mut DataFrame) -> Result<(), CrossError> {
    let upper: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_uppercase())
        .collect();
    df.set_column_names(upper.as_slice())?;
    Ok(())
}

/// Find a column by name, ignoring case and surrounding whitespace.
pub fn find_column(df: &DataFrame, wanted: &str) -> Option<String> {
    let wanted = wanted.trim().to_uppercase();
    df.get_column_names_str()
        .iter()
        .find(|c| c.trim().to_uppercase() == wanted)
        .map(|c| c.to_string())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().contains(name)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names_str()
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// All cells of a column as trimmed strings; nulls become `""`.
/// Non-string columns are cast to their textual form first.
pub fn string_cells(df: &DataFrame, name: &str) -> Result<Vec<String>, CrossError> {
    let column = df.column(name)?;
    let column = if column.dtype() == &DataType::String {
        column.clone()
    } else {
        column.cast(&DataType::String)?
    };
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("").trim().to_string())
        .collect())
}

/// Like [`string_cells`] but yields blanks when the column is absent.
pub fn string_cells_or_blank(df: &DataFrame, name: &str) -> Result<Vec<String>, CrossError> {
    if has_column(df, name) {
        string_cells(df, name)
    } else {
        Ok(vec![String::new(); df.height()])
    }
}

/// Replace nulls in every column with `""`.
pub fn fill_blank(df: DataFrame) -> Result<DataFrame, CrossError> {
    let names = column_names(&df);
    let exprs: Vec<Expr> = names
        .iter()
        .map(|c| col(c.as_str()).fill_null(lit("")))
        .collect();
    Ok(df.lazy().with_columns(exprs).collect()?)
}

/// A cell that was expected to hold a number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCell {
    Blank,
    Number(f64),
    /// Non-blank text that does not parse; callers count it as a coercion.
    Invalid,
}

impl NumericCell {
    pub fn value(self) -> Option<f64> {
        match self {
            NumericCell::Number(v) => Some(v),
            NumericCell::Blank | NumericCell::Invalid => None,
        }
    }
}

/// Parse a cell as a float. Thousands separators are ignored.
pub fn parse_number(cell: &str) -> NumericCell {
    let cell = cell.trim();
    if cell.is_empty() {
        return NumericCell::Blank;
    }
    match cell.replace(',', "").parse::<f64>() {
        Ok(v) if v.is_finite() => NumericCell::Number(v),
        _ => NumericCell::Invalid,
    }
}

/// Overwrite `path` with `df` (header included), creating parent directories.
pub fn write_csv(path: &Path, df: &mut DataFrame) -> Result<(), CrossError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Append the rows of `df` to `path`; the header is only written when the
/// file is new or empty.
pub fn append_csv(path: &Path, df: &mut DataFrame) -> Result<(), CrossError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let is_new = !has_content(path);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    CsvWriter::new(&mut file)
        .include_header(is_new)
        .finish(df)?;
    Ok(())
}

/// Build a frame of String columns from `(name, values)` pairs.
pub fn string_frame(columns: Vec<(&str, Vec<String>)>) -> Result<DataFrame, CrossError> {
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| Column::new(name.into(), &values))
        .collect();
    Ok(DataFrame::new(columns)?)
}
