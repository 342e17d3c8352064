use polars::prelude::{DataFrame, PolarsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::helper_functions::non_blank;

// Canonical column names shared by every normalized table.
pub const SAMPLE_ID: &str = "sample_id";
pub const ER_STATUS: &str = "er_status";
pub const PR_STATUS: &str = "pr_status";
pub const HER2_STATUS: &str = "her2_status";
pub const TRIPLE_NEGATIVE: &str = "triple_negative";
pub const SUBTYPE: &str = "subtype";
pub const GENE: &str = "gene";
pub const EXPRESSION: &str = "expression";
pub const QUARTILE: &str = "quartile";
pub const TIER: &str = "tier";

/// A tabular input of the pipeline.
///
/// `load` returns the normalized frame: canonical column names and
/// identifiers already carrying the sample suffix.
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceptorStatus {
    Positive,
    Negative,
    Indeterminate,
}

impl ReceptorStatus {
    /// Exact match only; anything other than "Positive"/"Negative" is indeterminate.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("Positive") => ReceptorStatus::Positive,
            Some("Negative") => ReceptorStatus::Negative,
            _ => ReceptorStatus::Indeterminate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceptorStatus::Positive => "Positive",
            ReceptorStatus::Negative => "Negative",
            ReceptorStatus::Indeterminate => "Indeterminate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subtype {
    LuminalA,
    LuminalB,
    Basal,
    Her2,
    Normal,
}

impl Subtype {
    /// Parses PAM50 labels in the spellings portals publish them in
    /// (`LumA`, `Luminal A`, `BRCA_LumA`, ...). Missing or unknown labels give `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let label = non_blank(raw)?;
        if label == "NA" {
            return None;
        }
        let key: String = label
            .strip_prefix("BRCA_")
            .unwrap_or(label)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "luma" | "luminala" => Some(Subtype::LuminalA),
            "lumb" | "luminalb" => Some(Subtype::LuminalB),
            "basal" | "basallike" => Some(Subtype::Basal),
            "her2" | "her2enriched" => Some(Subtype::Her2),
            "normal" | "normallike" => Some(Subtype::Normal),
            _ => {
                warn!("Unrecognised subtype label '{}', treating as missing", label);
                None
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subtype::LuminalA => "LuminalA",
            Subtype::LuminalB => "LuminalB",
            Subtype::Basal => "Basal",
            Subtype::Her2 => "Her2",
            Subtype::Normal => "Normal",
        }
    }

    pub fn all() -> [Subtype; 5] {
        [Subtype::LuminalA, Subtype::LuminalB, Subtype::Basal, Subtype::Her2, Subtype::Normal]
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Low,
    Mid,
    High,
}

impl Tier {
    /// Rank 1 is Low, rank 4 is High, ranks 2 and 3 are Mid.
    pub fn from_rank(rank: u8) -> Self {
        match rank {
            0 | 1 => Tier::Low,
            2 | 3 => Tier::Mid,
            _ => Tier::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "Low",
            Tier::Mid => "Mid",
            Tier::High => "High",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub sample_id: String,
    pub er: ReceptorStatus,
    pub pr: ReceptorStatus,
    pub her2: ReceptorStatus,
    triple_negative: bool,
}

impl SampleRecord {
    pub fn new(sample_id: String, er: ReceptorStatus, pr: ReceptorStatus, her2: ReceptorStatus) -> Self {
        let triple_negative = er == ReceptorStatus::Negative
            && pr == ReceptorStatus::Negative
            && her2 == ReceptorStatus::Negative;
        Self { sample_id, er, pr, her2, triple_negative }
    }

    pub fn is_triple_negative(&self) -> bool {
        self.triple_negative
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeRecord {
    pub sample_id: String,
    pub subtype: Option<Subtype>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionObservation {
    pub sample_id: String,
    pub gene: String,
    pub value: Option<f64>,
}

/// One member of the analysis cohort. The subtype is never missing.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortEntry {
    pub sample: SampleRecord,
    pub subtype: Subtype,
    pub tier: Tier,
    pub quartile: u8,
    pub expression: f64,
}

impl CohortEntry {
    pub fn sample_id(&self) -> &str {
        &self.sample.sample_id
    }
}
