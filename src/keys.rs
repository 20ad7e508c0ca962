use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;

use crate::error::CrossError;
use crate::schema::reference;
use crate::table;

/// The three naming systems a variety is known under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySpace {
    /// Alternate (informal) variety name.
    Av,
    /// Standardised variety name.
    Std,
    /// Numeric variety code, the join key into trait tables.
    Num,
}

/// Cross-reference between AV, STD and NUM variety names.
///
/// Five directed partial maps are built from the reference table in file row
/// order, so when one source key appears on several rows the last row wins.
/// Lookups never fail: an unmapped key resolves to itself.
#[derive(Debug, Clone, Default)]
pub struct VarietyKeyIndex {
    av_to_std: HashMap<String, String>,
    av_to_num: HashMap<String, String>,
    std_to_num: HashMap<String, String>,
    num_to_std: HashMap<String, String>,
    num_to_av: HashMap<String, String>,
}

impl VarietyKeyIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from the reference file. A missing file yields an empty index.
    pub fn load(path: &Path) -> Result<Self, CrossError> {
        if !path.exists() {
            log::warn!(
                "reference table {} not found; variety keys resolve to themselves",
                path.display()
            );
            return Ok(Self::empty());
        }
        let df = table::read_csv_as_strings(path)?;
        Self::from_frame(&df)
    }

    /// Build from an in-memory reference table.
    ///
    /// Column names are matched case-insensitively. If any of the three key
    /// columns is absent the index is empty.
    pub fn from_frame(df: &DataFrame) -> Result<Self, CrossError> {
        let (Some(a), Some(s), Some(n)) = (
            table::find_column(df, reference::AVARIETY),
            table::find_column(df, reference::STDVARIETY),
            table::find_column(df, reference::NUMVAR),
        ) else {
            log::warn!("reference table lacks AVARIETY/STDVARIETY/NUMVAR; key index is empty");
            return Ok(Self::empty());
        };

        let avs = table::string_cells(df, &a)?;
        let stds = table::string_cells(df, &s)?;
        let nums = table::string_cells(df, &n)?;

        let mut index = Self::empty();
        for ((av, sd), num) in avs.into_iter().zip(stds).zip(nums) {
            if av.is_empty() && sd.is_empty() && num.is_empty() {
                continue;
            }
            if !av.is_empty() && !sd.is_empty() {
                index.av_to_std.insert(av.clone(), sd.clone());
            }
            if !av.is_empty() && !num.is_empty() {
                index.av_to_num.insert(av.clone(), num.clone());
            }
            if !sd.is_empty() && !num.is_empty() {
                index.std_to_num.insert(sd.clone(), num.clone());
                index.num_to_std.insert(num.clone(), sd);
            }
            if !num.is_empty() && !av.is_empty() {
                index.num_to_av.insert(num, av);
            }
        }
        Ok(index)
    }

    pub fn is_empty(&self) -> bool {
        self.av_to_std.is_empty()
            && self.av_to_num.is_empty()
            && self.std_to_num.is_empty()
            && self.num_to_std.is_empty()
            && self.num_to_av.is_empty()
    }

    fn map(&self, from: KeySpace, to: KeySpace) -> Option<&HashMap<String, String>> {
        match (from, to) {
            (KeySpace::Av, KeySpace::Std) => Some(&self.av_to_std),
            (KeySpace::Av, KeySpace::Num) => Some(&self.av_to_num),
            (KeySpace::Std, KeySpace::Num) => Some(&self.std_to_num),
            (KeySpace::Num, KeySpace::Std) => Some(&self.num_to_std),
            (KeySpace::Num, KeySpace::Av) => Some(&self.num_to_av),
            _ => None,
        }
    }

    /// The mapped value, if the index knows one.
    pub fn lookup<'a>(&'a self, key: &'a str, from: KeySpace, to: KeySpace) -> Option<&'a str> {
        if from == to {
            return Some(key);
        }
        self.map(from, to)?.get(key).map(String::as_str)
    }

    /// The mapped value, or `key` unchanged when unmapped.
    pub fn resolve(&self, key: &str, from: KeySpace, to: KeySpace) -> String {
        self.lookup(key, from, to).unwrap_or(key).to_string()
    }
}
