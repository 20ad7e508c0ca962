/// Column-name constants for the crossing engine's files.
/// Single source of truth - also exported to Python via PyO3.

// ── Reference / key table ───────────────────────────────────────────────────
pub mod reference {
    pub const AVARIETY: &str = "AVARIETY";
    pub const STDVARIETY: &str = "STDVARIETY";
    pub const NUMVAR: &str = "NUMVAR";
    pub const BAY: &str = "BAY";
    pub const CART: &str = "CART";
    pub const CAN: &str = "CAN";
}

// ── Daily observations ──────────────────────────────────────────────────────
pub mod survey {
    pub const AVARIETY: &str = "AVARIETY";
    pub const STDVARIETY: &str = "STDVARIETY";
    pub const CAN: &str = "Can";
    pub const CART: &str = "Cart";
    pub const BAY: &str = "Bay";
    pub const TASSELS: &str = "#Tas";
    pub const POLLEN_RATING: &str = "Pollen Rating";
    pub const SEX: &str = "Sex";

    pub const ALL: [&str; 8] = [
        AVARIETY,
        STDVARIETY,
        CAN,
        CART,
        BAY,
        TASSELS,
        POLLEN_RATING,
        SEX,
    ];
}

// ── Sex labels ──────────────────────────────────────────────────────────────
pub mod sex {
    pub const MALE: &str = "male";
    pub const FEMALE: &str = "female";
    pub const UNKNOWN: &str = "unknown";
}

// ── Tassel totals ───────────────────────────────────────────────────────────
pub mod tassels {
    pub const STDVARIETY: &str = "STDVARIETY";
    pub const MALE: &str = "MALE TASSLES";
    pub const FEMALE: &str = "FEMALE TASSLES";
}

// ── Combination columns ─────────────────────────────────────────────────────
pub mod combination {
    pub const FEMALE_AVAR: &str = "FEMALE_AVAR";
    pub const MALE_AVAR: &str = "MALE_AVAR";
    pub const FEMALE_STD: &str = "FEMALE_STD";
    pub const MALE_STD: &str = "MALE_STD";
    pub const FEMALE_NUMVAR: &str = "FEMALE_NUMVAR";
    pub const MALE_NUMVAR: &str = "MALE_NUMVAR";

    pub const ALL: [&str; 6] = [
        FEMALE_AVAR,
        MALE_AVAR,
        FEMALE_STD,
        MALE_STD,
        FEMALE_NUMVAR,
        MALE_NUMVAR,
    ];
}

// ── Candidate table extras ──────────────────────────────────────────────────
pub mod candidate {
    pub const KINSHIP: &str = "KINSHIP";
    pub const FEMALE_PREFIX: &str = "FEMALE_";
    pub const MALE_PREFIX: &str = "MALE_";
    pub const FEMALE_CD_PREFIX: &str = "FEMALE_CD_";
    pub const MALE_CD_PREFIX: &str = "MALE_CD_";
}

// ── Genetic-value table ─────────────────────────────────────────────────────
pub mod genetic_value {
    pub const VARIETY: &str = "VARIETY";
    pub const BASELINE_VARIETY: &str = "2001299";
    pub const PCT_SUFFIX: &str = "_PCT_2001299";
}

// ── Per-parent crossing dataset ─────────────────────────────────────────────
pub mod crossing_dataset {
    pub const FVARIETY: &str = "FVARIETY";
    pub const MVARIETY: &str = "MVARIETY";
}

// ── Allocation log ──────────────────────────────────────────────────────────
pub mod allocation {
    pub const FEMALE: &str = "FEMALE";
    pub const MALE: &str = "MALE";
}
