//! Remaining crossing capacity per variety and role.
//!
//! A snapshot is a pure function of the day's tassel totals, the crossing
//! rules, the allocation history and the caller's pending selection. It is
//! rebuilt on every query and never stored.
use std::collections::BTreeMap;
use std::fmt;

use crate::config::CrossingRules;
use crate::survey::TasselCounts;

/// A (female STD, male STD) pairing. Also the shape of one allocation log row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrossPair {
    pub female: String,
    pub male: String,
}

impl CrossPair {
    pub fn new(female: impl Into<String>, male: impl Into<String>) -> Self {
        Self {
            female: female.into().trim().to_string(),
            male: male.into().trim().to_string(),
        }
    }
}

impl fmt::Display for CrossPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {}", self.female, self.male)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacity {
    /// Flowers this variety can still provide as a male parent.
    pub male_cap: u64,
    /// Flowers this variety can still accept as a female parent.
    pub female_cap: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Male,
    Female,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Male => "MALE",
            Role::Female => "FEMALE",
        }
    }
}

/// One line of the availability view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRow {
    pub variety: String,
    pub role: Role,
    pub remaining: u64,
}

impl AvailabilityRow {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Which side of a pair has no capacity left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedSide {
    Female,
    Male,
    Both,
}

/// Remaining capacity for every variety with a tassel-totals row.
///
/// Varieties outside the snapshot have zero capacity in both roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapacitySnapshot {
    caps: BTreeMap<String, Capacity>,
}

impl CapacitySnapshot {
    pub fn get(&self, variety: &str) -> Option<Capacity> {
        self.caps.get(variety).copied()
    }

    pub fn male_cap(&self, variety: &str) -> u64 {
        self.caps.get(variety).map_or(0, |c| c.male_cap)
    }

    pub fn female_cap(&self, variety: &str) -> u64 {
        self.caps.get(variety).map_or(0, |c| c.female_cap)
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Capacity)> + '_ {
        self.caps.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `None` when both the female's female_cap and the male's male_cap are
    /// above zero.
    pub fn exhausted_side(&self, pair: &CrossPair) -> Option<ExhaustedSide> {
        let female_ok = self.female_cap(&pair.female) > 0;
        let male_ok = self.male_cap(&pair.male) > 0;
        match (female_ok, male_ok) {
            (true, true) => None,
            (false, true) => Some(ExhaustedSide::Female),
            (true, false) => Some(ExhaustedSide::Male),
            (false, false) => Some(ExhaustedSide::Both),
        }
    }

    pub fn is_eligible(&self, pair: &CrossPair) -> bool {
        self.exhausted_side(pair).is_none()
    }

    /// Take one unit from each side of `pair`, clamped at zero. Unknown
    /// varieties are left alone.
    pub fn consume(&mut self, pair: &CrossPair) {
        if let Some(cap) = self.caps.get_mut(&pair.female) {
            cap.female_cap = cap.female_cap.saturating_sub(1);
        }
        if let Some(cap) = self.caps.get_mut(&pair.male) {
            cap.male_cap = cap.male_cap.saturating_sub(1);
        }
    }

    /// Two rows per variety, sorted by variety with the male row first.
    pub fn availability(&self) -> Vec<AvailabilityRow> {
        self.caps
            .iter()
            .flat_map(|(variety, cap)| {
                [
                    AvailabilityRow {
                        variety: variety.clone(),
                        role: Role::Male,
                        remaining: cap.male_cap,
                    },
                    AvailabilityRow {
                        variety: variety.clone(),
                        role: Role::Female,
                        remaining: cap.female_cap,
                    },
                ]
            })
            .collect()
    }
}

pub struct CapacityLedger;

impl CapacityLedger {
    /// Tassel-derived capacity, minus one unit per side for every historical
    /// allocation, minus one unit per side for every pending selection.
    pub fn compute(
        tassels: &TasselCounts,
        rules: CrossingRules,
        history: &[CrossPair],
        pending: &[CrossPair],
    ) -> CapacitySnapshot {
        let caps = tassels
            .iter()
            .map(|(variety, count)| {
                let cap = Capacity {
                    male_cap: count.male.saturating_mul(rules.females_per_male),
                    female_cap: count.female.saturating_mul(rules.males_per_female),
                };
                (variety.to_string(), cap)
            })
            .collect();
        let mut snapshot = CapacitySnapshot { caps };

        for pair in history.iter().chain(pending) {
            snapshot.consume(pair);
        }
        log::debug!(
            "capacity over {} varieties: {} allocated, {} pending",
            snapshot.len(),
            history.len(),
            pending.len()
        );
        snapshot
    }
}
