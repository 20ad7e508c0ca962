use std::collections::HashSet;

use polars::prelude::*;

use crate::error::{CrossError, Diagnostics};
use crate::keys::{KeySpace, VarietyKeyIndex};
use crate::schema::combination;
use crate::survey::SurveyTotals;
use crate::table;

/// A candidate female × male pairing in all three key representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combination {
    pub female_av: String,
    pub male_av: String,
    pub female_std: String,
    pub male_std: String,
    pub female_num: String,
    pub male_num: String,
}

/// Produces the deduplicated female × male candidate set.
pub struct CombinationGenerator<'a> {
    keys: &'a VarietyKeyIndex,
}

impl<'a> CombinationGenerator<'a> {
    pub fn new(keys: &'a VarietyKeyIndex) -> Self {
        Self { keys }
    }

    /// Cross every female AV with every male AV seen today.
    ///
    /// Varieties whose total for a sex is zero are not in that sex's set.
    /// Emission order is females in first-seen order, then males in
    /// first-seen order, which keeps the output reproducible.
    pub fn generate(&self, totals: &SurveyTotals) -> (Vec<Combination>, Diagnostics) {
        let mut diagnostics = Diagnostics::default();
        let mut seen: HashSet<Combination> = HashSet::new();
        let mut combos = Vec::new();

        let males: Vec<&str> = totals.male.nonzero_keys().collect();
        for f_av in totals.female.nonzero_keys() {
            for m_av in &males {
                let combo = Combination {
                    female_av: f_av.to_string(),
                    male_av: m_av.to_string(),
                    female_std: self.resolve(f_av, KeySpace::Std, &mut diagnostics),
                    male_std: self.resolve(m_av, KeySpace::Std, &mut diagnostics),
                    female_num: self.resolve(f_av, KeySpace::Num, &mut diagnostics),
                    male_num: self.resolve(m_av, KeySpace::Num, &mut diagnostics),
                };
                if seen.insert(combo.clone()) {
                    combos.push(combo);
                }
            }
        }
        (combos, diagnostics)
    }

    fn resolve(&self, av: &str, to: KeySpace, diagnostics: &mut Diagnostics) -> String {
        match self.keys.lookup(av, KeySpace::Av, to) {
            Some(v) => v.to_string(),
            None => {
                diagnostics.unresolved_keys += 1;
                av.to_string()
            }
        }
    }
}

/// Frame with the six combination columns, in file order.
pub fn to_frame(combos: &[Combination]) -> Result<DataFrame, CrossError> {
    let mut columns: [Vec<String>; 6] = Default::default();
    for c in combos {
        columns[0].push(c.female_av.clone());
        columns[1].push(c.male_av.clone());
        columns[2].push(c.female_std.clone());
        columns[3].push(c.male_std.clone());
        columns[4].push(c.female_num.clone());
        columns[5].push(c.male_num.clone());
    }
    table::string_frame(combination::ALL.into_iter().zip(columns).collect())
}

/// Normalise a combinations frame read back from disk: headers upper-cased,
/// blanks instead of nulls, all six key columns present and trimmed.
pub fn normalize_frame(df: DataFrame) -> Result<DataFrame, CrossError> {
    let mut df = df;
    table::upper_case_headers(&mut df)?;
    let mut df = table::fill_blank(df)?;
    for name in combination::ALL {
        let values = table::string_cells_or_blank(&df, name)?;
        df.with_column(Column::new(name.into(), &values))?;
    }
    Ok(df)
}
