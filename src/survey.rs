use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use polars::prelude::*;

use crate::error::{CrossError, Diagnostics};
use crate::keys::{KeySpace, VarietyKeyIndex};
use crate::schema::{reference, sex, survey, tassels};
use crate::table;

/// Flowering role of an observed plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    /// Pollen rating 1–4 sheds pollen (male), 5–10 receives it (female).
    pub fn from_pollen_rating(rating: i64) -> Self {
        match rating {
            1..=4 => Sex::Male,
            5..=10 => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            sex::MALE => Sex::Male,
            sex::FEMALE => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => sex::MALE,
            Sex::Female => sex::FEMALE,
            Sex::Unknown => sex::UNKNOWN,
        }
    }
}

/// Summed counts keyed by variety, iterated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedTotals {
    order: Vec<String>,
    totals: HashMap<String, u64>,
}

impl OrderedTotals {
    pub fn add(&mut self, key: &str, count: u64) {
        match self.totals.get_mut(key) {
            Some(total) => *total += count,
            None => {
                self.order.push(key.to_string());
                self.totals.insert(key.to_string(), count);
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.totals.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.order
            .iter()
            .map(move |k| (k.as_str(), self.totals[k.as_str()]))
    }

    /// Varieties with a non-zero total, in first-seen order.
    pub fn nonzero_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().filter(|(_, n)| *n > 0).map(|(k, _)| k)
    }
}

/// Per-sex tassel totals keyed by AV variety.
#[derive(Debug, Clone, Default)]
pub struct SurveyTotals {
    pub male: OrderedTotals,
    pub female: OrderedTotals,
    pub diagnostics: Diagnostics,
}

/// Supply of one STD variety in both roles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TasselCount {
    pub male: u64,
    pub female: u64,
}

/// STD-keyed tassel totals, the supply side of the capacity ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TasselCounts {
    counts: BTreeMap<String, TasselCount>,
}

/// Turns the day's observation rows into per-variety, per-sex supply counts.
pub struct SurveyAggregator;

impl SurveyAggregator {
    /// Sum `#Tas` per AV variety, separately for each sex.
    ///
    /// The `Sex` label decides the role when it reads male/female; otherwise
    /// the `Pollen Rating` column is consulted. Unknown-sex rows and rows with
    /// a blank variety contribute to neither total. A count that fails to
    /// parse contributes zero.
    pub fn aggregate(df: &DataFrame) -> Result<SurveyTotals, CrossError> {
        let av_col = table::find_column(df, survey::AVARIETY)
            .ok_or_else(|| CrossError::MissingColumn(survey::AVARIETY.to_string()))?;
        let avs = table::string_cells(df, &av_col)?;
        let labels = match table::find_column(df, survey::SEX) {
            Some(c) => table::string_cells(df, &c)?,
            None => vec![String::new(); df.height()],
        };
        let ratings = match table::find_column(df, survey::POLLEN_RATING) {
            Some(c) => table::string_cells(df, &c)?,
            None => vec![String::new(); df.height()],
        };
        let counts = match table::find_column(df, survey::TASSELS) {
            Some(c) => table::string_cells(df, &c)?,
            None => vec![String::new(); df.height()],
        };

        let mut totals = SurveyTotals::default();
        for i in 0..df.height() {
            let av = avs[i].as_str();
            if av.is_empty() {
                continue;
            }
            let role = match Sex::from_label(&labels[i]) {
                Sex::Unknown => ratings[i]
                    .parse::<i64>()
                    .map(Sex::from_pollen_rating)
                    .unwrap_or(Sex::Unknown),
                known => known,
            };
            let count = match counts[i].parse::<u64>() {
                Ok(n) => n,
                Err(_) => {
                    totals.diagnostics.numeric_coercions += 1;
                    0
                }
            };
            match role {
                Sex::Male => totals.male.add(av, count),
                Sex::Female => totals.female.add(av, count),
                Sex::Unknown => log::debug!("row {i}: variety {av} has unknown sex; skipped"),
            }
        }
        Ok(totals)
    }
}

impl SurveyTotals {
    /// Re-key both totals by STD variety, summing AV names that share one.
    pub fn by_std(&self, keys: &VarietyKeyIndex) -> TasselCounts {
        let mut counts = TasselCounts::default();
        for (av, n) in self.male.iter() {
            let std = keys.resolve(av, KeySpace::Av, KeySpace::Std);
            counts.entry(std).male += n;
        }
        for (av, n) in self.female.iter() {
            let std = keys.resolve(av, KeySpace::Av, KeySpace::Std);
            counts.entry(std).female += n;
        }
        counts
    }
}

impl TasselCounts {
    fn entry(&mut self, variety: String) -> &mut TasselCount {
        self.counts.entry(variety).or_default()
    }

    /// Set the counts of one variety, replacing any earlier entry.
    pub fn insert(&mut self, variety: &str, count: TasselCount) {
        self.counts.insert(variety.to_string(), count);
    }

    pub fn get(&self, variety: &str) -> Option<TasselCount> {
        self.counts.get(variety).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Varieties in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TasselCount)> + '_ {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn to_frame(&self) -> Result<DataFrame, CrossError> {
        let varieties: Vec<String> = self.counts.keys().cloned().collect();
        let male: Vec<u64> = self.counts.values().map(|c| c.male).collect();
        let female: Vec<u64> = self.counts.values().map(|c| c.female).collect();
        Ok(DataFrame::new(vec![
            Column::new(tassels::STDVARIETY.into(), &varieties),
            Column::new(tassels::MALE.into(), &male),
            Column::new(tassels::FEMALE.into(), &female),
        ])?)
    }

    pub fn write(&self, path: &Path) -> Result<(), CrossError> {
        let mut df = self.to_frame()?;
        table::write_csv(path, &mut df)
    }

    /// Read a tassel-totals file. A missing file means no supply at all.
    ///
    /// A row whose counts fail to parse contributes zero for both sexes; a
    /// variety listed twice keeps its last row.
    pub fn load(path: &Path) -> Result<(Self, Diagnostics), CrossError> {
        let mut counts = Self::default();
        let mut diagnostics = Diagnostics::default();
        if !table::has_content(path) {
            return Ok((counts, diagnostics));
        }
        let df = table::read_csv_as_strings(path)?;
        let varieties = table::string_cells_or_blank(&df, tassels::STDVARIETY)?;
        let male = table::string_cells_or_blank(&df, tassels::MALE)?;
        let female = table::string_cells_or_blank(&df, tassels::FEMALE)?;

        for i in 0..df.height() {
            let parsed = (male[i].parse::<u64>(), female[i].parse::<u64>());
            let count = match parsed {
                (Ok(m), Ok(f)) => TasselCount { male: m, female: f },
                _ => {
                    diagnostics.numeric_coercions += 1;
                    TasselCount::default()
                }
            };
            counts.insert(&varieties[i], count);
        }
        Ok((counts, diagnostics))
    }
}

/// Entry counts shown to the recorder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurveySummary {
    pub total: usize,
    pub male: usize,
    pub female: usize,
}

impl SurveySummary {
    /// Count the rows of the observation file by their `Sex` label.
    pub fn from_file(path: &Path) -> Result<Self, CrossError> {
        if !table::has_content(path) {
            return Ok(Self::default());
        }
        let df = table::read_csv_as_strings(path)?;
        let labels = table::string_cells_or_blank(&df, survey::SEX)?;
        let mut summary = Self {
            total: df.height(),
            ..Self::default()
        };
        for label in &labels {
            match Sex::from_label(label) {
                Sex::Male => summary.male += 1,
                Sex::Female => summary.female += 1,
                Sex::Unknown => {}
            }
        }
        Ok(summary)
    }
}

/// Where a plant stands in the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub bay: String,
    pub cart: String,
    pub can: String,
}

/// Outcome of looking a field location up in the reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationMatch {
    Found { av: String, std: String },
    NoMatch,
    NoFile,
}

impl LocationMatch {
    /// The (AV, STD) pair written into the observation row.
    pub fn varieties(&self) -> (String, String) {
        match self {
            LocationMatch::Found { av, std } => (av.clone(), std.clone()),
            LocationMatch::NoMatch => ("No match".into(), "No match".into()),
            LocationMatch::NoFile => ("No file".into(), "No file".into()),
        }
    }
}

/// Find the variety planted at `location`; the first matching row wins.
/// A blank STD name falls back to the AV name.
pub fn lookup_location(reference_path: &Path, location: &Location) -> Result<LocationMatch, CrossError> {
    if !reference_path.exists() {
        return Ok(LocationMatch::NoFile);
    }
    let df = table::read_csv_as_strings(reference_path)?;
    let column = |name: &str| -> Result<Vec<String>, CrossError> {
        match table::find_column(&df, name) {
            Some(c) => table::string_cells(&df, &c),
            None => Ok(vec![String::new(); df.height()]),
        }
    };
    let bays = column(reference::BAY)?;
    let carts = column(reference::CART)?;
    let cans = column(reference::CAN)?;
    let avs = column(reference::AVARIETY)?;
    let stds = column(reference::STDVARIETY)?;

    for i in 0..df.height() {
        if bays[i] == location.bay.trim()
            && carts[i] == location.cart.trim()
            && cans[i] == location.can.trim()
        {
            let av = avs[i].clone();
            let std = if stds[i].is_empty() { av.clone() } else { stds[i].clone() };
            return Ok(LocationMatch::Found { av, std });
        }
    }
    Ok(LocationMatch::NoMatch)
}

/// One field observation as entered by the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub location: Location,
    pub tassels: u32,
    pub pollen_rating: i64,
}

/// The row actually appended to the observation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedObservation {
    pub av: String,
    pub std: String,
    pub sex: Sex,
}

/// Append one observation to the day's observation file, creating it (with
/// header) on first use.
pub fn append_observation(
    survey_path: &Path,
    reference_path: &Path,
    observation: &Observation,
) -> Result<RecordedObservation, CrossError> {
    let (av, std) = lookup_location(reference_path, &observation.location)?.varieties();
    let sex = Sex::from_pollen_rating(observation.pollen_rating);
    let loc = &observation.location;

    let values = [
        av.clone(),
        std.clone(),
        loc.can.clone(),
        loc.cart.clone(),
        loc.bay.clone(),
        observation.tassels.to_string(),
        observation.pollen_rating.to_string(),
        sex.as_str().to_string(),
    ];
    let mut row = table::string_frame(
        survey::ALL
            .iter()
            .zip(values)
            .map(|(name, value)| (*name, vec![value]))
            .collect(),
    )?;
    table::append_csv(survey_path, &mut row)?;

    log::info!(
        "recorded {av}/{std} at bay {} cart {} can {}: {} tassels, pollen {} ({})",
        loc.bay,
        loc.cart,
        loc.can,
        observation.tassels,
        observation.pollen_rating,
        sex.as_str()
    );
    Ok(RecordedObservation { av, std, sex })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pollen_rating_bands() {
        assert_eq!(Sex::from_pollen_rating(1), Sex::Male);
        assert_eq!(Sex::from_pollen_rating(4), Sex::Male);
        assert_eq!(Sex::from_pollen_rating(5), Sex::Female);
        assert_eq!(Sex::from_pollen_rating(10), Sex::Female);
        assert_eq!(Sex::from_pollen_rating(0), Sex::Unknown);
        assert_eq!(Sex::from_pollen_rating(11), Sex::Unknown);
    }

    #[test]
    fn aggregate_sums_each_sex_independently() {
        let df = df!(
            "AVARIETY" => &["A", "B", "A", "C", "A", "D"],
            "Sex" => &["female", "male", "FEMALE", "unknown", "male", ""],
            "#Tas" => &["3", "2", "4", "9", "x", "1"],
            "Pollen Rating" => &["7", "2", "8", "0", "3", "6"]
        )
        .unwrap();
        let totals = SurveyAggregator::aggregate(&df).unwrap();

        assert_eq!(totals.female.get("A"), 7);
        assert_eq!(totals.male.get("B"), 2);
        // Unparseable count contributes zero but the variety is still seen.
        assert_eq!(totals.male.get("A"), 0);
        assert_eq!(totals.diagnostics.numeric_coercions, 1);
        // Unknown sex row excluded from both.
        assert_eq!(totals.male.get("C") + totals.female.get("C"), 0);
        // Blank label falls back to the pollen rating.
        assert_eq!(totals.female.get("D"), 1);
        assert_eq!(totals.male.nonzero_keys().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn by_std_merges_aliases() {
        let reference = df!(
            "AVARIETY" => &["A1", "A2"],
            "STDVARIETY" => &["S", "S"],
            "NUMVAR" => &["1", "2"]
        )
        .unwrap();
        let keys = VarietyKeyIndex::from_frame(&reference).unwrap();
        let survey = df!(
            "AVARIETY" => &["A1", "A2", "Z"],
            "Sex" => &["male", "male", "female"],
            "#Tas" => &["2", "5", "1"]
        )
        .unwrap();
        let counts = SurveyAggregator::aggregate(&survey).unwrap().by_std(&keys);
        assert_eq!(counts.get("S"), Some(TasselCount { male: 7, female: 0 }));
        assert_eq!(counts.get("Z"), Some(TasselCount { male: 0, female: 1 }));
    }

    #[test]
    fn tassel_file_round_trips_and_tolerates_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tassles_1.csv");
        std::fs::write(
            &path,
            "STDVARIETY,MALE TASSLES,FEMALE TASSLES\nS,2,4\nT,x,3\nS,1,1\n",
        )
        .unwrap();
        let (counts, diagnostics) = TasselCounts::load(&path).unwrap();
        assert_eq!(counts.get("S"), Some(TasselCount { male: 1, female: 1 }));
        assert_eq!(counts.get("T"), Some(TasselCount::default()));
        assert_eq!(diagnostics.numeric_coercions, 1);

        counts.write(&path).unwrap();
        let (again, _) = TasselCounts::load(&path).unwrap();
        assert_eq!(again, counts);
    }

    #[test]
    fn append_observation_looks_up_location() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.csv");
        std::fs::write(
            &reference,
            "BAY,CART,CAN,AVARIETY,STDVARIETY\n1,A,3,Q208,\n2,B,1,KQ228,KQ228S\n",
        )
        .unwrap();
        let survey_path = dir.path().join("survey.csv");

        let entry = |bay: &str, cart: &str, can: &str, pollen| Observation {
            location: Location {
                bay: bay.into(),
                cart: cart.into(),
                can: can.into(),
            },
            tassels: 2,
            pollen_rating: pollen,
        };
        let first = append_observation(&survey_path, &reference, &entry("1", "A", "3", 7)).unwrap();
        assert_eq!(first.av, "Q208");
        assert_eq!(first.std, "Q208");
        assert_eq!(first.sex, Sex::Female);
        let second = append_observation(&survey_path, &reference, &entry("9", "Z", "9", 2)).unwrap();
        assert_eq!(second.av, "No match");

        let summary = SurveySummary::from_file(&survey_path).unwrap();
        assert_eq!(
            summary,
            SurveySummary {
                total: 2,
                male: 1,
                female: 1
            }
        );
        let df = table::read_csv_as_strings(&survey_path).unwrap();
        assert_eq!(table::column_names(&df), survey::ALL.to_vec());
    }
}
