use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CrossError;
use crate::highlight::HighlightRule;

pub const RULES_FILE: &str = "rules.json";
pub const PATHS_FILE: &str = "paths.json";

/// Contents of `rules.json`, owned by the settings layer.
///
/// The ratio fields are kept as raw JSON so that a hand-edited `"2"` or an
/// invalid entry degrades to a sane ratio instead of rejecting the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub females_per_male: Value,
    pub males_per_female: Value,
    pub hidden_columns: Vec<String>,
    pub highlight_rules: Vec<HighlightRule>,
    /// Original CSV header → label shown to the operator.
    pub display_names: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            females_per_male: Value::from(1),
            males_per_female: Value::from(1),
            hidden_columns: Vec::new(),
            highlight_rules: Vec::new(),
            display_names: HashMap::new(),
        }
    }
}

impl Settings {
    /// Read settings; a missing or unreadable file yields the defaults.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                log::warn!("{}: {e}; using default rules", path.display());
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>, CrossError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), CrossError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn rules(&self) -> CrossingRules {
        CrossingRules {
            females_per_male: ratio(&self.females_per_male),
            males_per_female: ratio(&self.males_per_female),
        }
    }

    /// Label for a header, falling back to the header itself.
    pub fn display_name<'a>(&'a self, header: &'a str) -> &'a str {
        self.display_names
            .get(header)
            .map(String::as_str)
            .unwrap_or(header)
    }
}

/// How raw tassel counts convert into crossing capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingRules {
    /// Females one male tassel can pollinate.
    pub females_per_male: u64,
    /// Males one female tassel can accept.
    pub males_per_female: u64,
}

impl Default for CrossingRules {
    fn default() -> Self {
        Self {
            females_per_male: 1,
            males_per_female: 1,
        }
    }
}

impl CrossingRules {
    /// Both ratios are clamped to at least 1.
    pub fn new(females_per_male: u64, males_per_female: u64) -> Self {
        Self {
            females_per_male: females_per_male.max(1),
            males_per_female: males_per_female.max(1),
        }
    }
}

/// Integer ratio from a JSON value; anything unusable becomes 1.
fn ratio(value: &Value) -> u64 {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(|v| v.max(1) as u64).unwrap_or(1)
}

/// Locations of the external reference sources, from `paths.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    /// Reference/key table (AV, STD, NUM and field locations).
    pub photoperiod: String,
    /// Per-parent crossing dataset.
    pub crossingdataset: String,
    /// Genetic-value table.
    pub gv: String,
    /// Kinship matrix.
    pub amat: String,
}

/// Resolved, absolute source locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSources {
    pub reference: PathBuf,
    pub crossing_dataset: PathBuf,
    pub genetic_values: PathBuf,
    pub kinship: PathBuf,
}

impl SourcePaths {
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path)
            .map_err(CrossError::from)
            .and_then(|text| Ok(serde_json::from_str(&text)?))
        {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("{}: {e}; using default source paths", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CrossError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Pick, per source, the first existing candidate among the configured
    /// path, `<root>/<default>` and `<root>/<dir>/<default>`.
    pub fn resolve(&self, root: &Path) -> ResolvedSources {
        ResolvedSources {
            reference: first_existing(
                &self.photoperiod,
                root,
                "Photoperiod_Pos_2025.csv",
                Some("Photoperiod_Pos"),
            ),
            crossing_dataset: first_existing(
                &self.crossingdataset,
                root,
                "ZT_CrossingDataset.csv",
                Some("CrossingDataset"),
            ),
            genetic_values: first_existing(&self.gv, root, "ZT_GVs_1.4.csv", None),
            kinship: first_existing(&self.amat, root, "AMAT_25.csv", None),
        }
    }
}

fn first_existing(configured: &str, root: &Path, default: &str, dir: Option<&str>) -> PathBuf {
    let mut candidates = Vec::new();
    if !configured.trim().is_empty() {
        candidates.push(PathBuf::from(configured.trim()));
    }
    candidates.push(root.join(default));
    if let Some(dir) = dir {
        candidates.push(root.join(dir).join(default));
    }
    candidates
        .iter()
        .find(|p| p.exists())
        .unwrap_or(&candidates[0])
        .clone()
}
