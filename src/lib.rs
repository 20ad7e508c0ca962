//! Crossing combination and capacity-constrained allocation engine.
//!
//! A day of crossing runs: record observations, generate female × male
//! combinations, enrich them into a candidate table, then export selected
//! candidates against the remaining tassel capacity.

pub mod allocation;
pub mod capacity;
pub mod combinations;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod highlight;
pub mod keys;
pub mod kinship;
pub mod layout;
pub mod model;
pub mod schema;
pub mod survey;
pub mod table;

#[cfg(feature = "python")]
mod python;

pub use allocation::{AllocationLog, AllocationRecord};
pub use capacity::{CapacityLedger, CapacitySnapshot, CrossPair, ExhaustedSide};
pub use combinations::{Combination, CombinationGenerator};
pub use config::{CrossingRules, Settings, SourcePaths};
pub use enrich::TraitEnricher;
pub use error::{CrossError, Diagnostics};
pub use export::{ExportOutcome, ExportReport, GuardedExportEngine, SkippedRow};
pub use keys::{KeySpace, VarietyKeyIndex};
pub use kinship::{Kinship, KinshipMatrix, KinshipResolver};
pub use layout::DayLayout;
pub use model::{CrossingModel, GenerationReport, MatchReport};
pub use survey::{Observation, Sex, SurveyAggregator, TasselCount, TasselCounts};
