use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::classification::GeneClassification;
use crate::models::{
    CohortEntry, SampleRecord, Subtype, SubtypeRecord, Tier, ER_STATUS, EXPRESSION, HER2_STATUS, PR_STATUS,
    QUARTILE, SAMPLE_ID, SUBTYPE, TIER, TRIPLE_NEGATIVE,
};

/// The joined, subtype-complete analysis cohort. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    gene: String,
    entries: Vec<CohortEntry>,
}

/// Inner join of clinical records, subtype calls and the gene's tiers on sample id.
///
/// A sample missing from any of the three inputs, or whose subtype call is
/// missing, is left out. Entries are ordered by sample id.
pub fn build_cohort(
    samples: &[SampleRecord],
    subtypes: &[SubtypeRecord],
    classification: &GeneClassification,
) -> Cohort {
    let subtype_by_id: HashMap<&str, Option<Subtype>> =
        subtypes.iter().map(|s| (s.sample_id.as_str(), s.subtype)).collect();
    let tier_by_id = classification.by_sample();

    let mut no_subtype_row = 0usize;
    let mut no_subtype_call = 0usize;
    let mut no_expression = 0usize;
    let mut entries = Vec::new();

    for sample in samples {
        let id = sample.sample_id.as_str();
        let Some(subtype) = subtype_by_id.get(id) else {
            no_subtype_row += 1;
            continue;
        };
        let Some(assignment) = tier_by_id.get(id) else {
            no_expression += 1;
            continue;
        };
        let Some(subtype) = subtype else {
            no_subtype_call += 1;
            continue;
        };
        entries.push(CohortEntry {
            sample: sample.clone(),
            subtype: *subtype,
            tier: assignment.tier,
            quartile: assignment.quartile,
            expression: assignment.value,
        });
    }
    entries.sort_by(|a, b| a.sample_id().cmp(b.sample_id()));

    debug!(
        "Cohort join: {} without subtype row, {} without {} value, {} with missing subtype",
        no_subtype_row, no_expression, classification.gene, no_subtype_call
    );
    info!("Cohort of {} samples from {} clinical records", entries.len(), samples.len());

    Cohort { gene: classification.gene.clone(), entries }
}

impl Cohort {
    pub fn gene(&self) -> &str {
        &self.gene
    }

    pub fn entries(&self) -> &[CohortEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A fresh cohort holding the entries matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Cohort
    where
        F: Fn(&CohortEntry) -> bool,
    {
        Cohort {
            gene: self.gene.clone(),
            entries: self.entries.iter().filter(|e| predicate(e)).cloned().collect(),
        }
    }

    pub fn with_tier(&self, tier: Tier) -> Cohort {
        self.filter(|e| e.tier == tier)
    }

    pub fn with_subtype(&self, subtype: Subtype) -> Cohort {
        self.filter(|e| e.subtype == subtype)
    }

    /// Columns: sample_id, er/pr/her2 status, triple_negative, subtype, quartile, tier, expression.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let e = &self.entries;
        let ids: Vec<&str> = e.iter().map(|x| x.sample_id()).collect();
        let er: Vec<&str> = e.iter().map(|x| x.sample.er.as_str()).collect();
        let pr: Vec<&str> = e.iter().map(|x| x.sample.pr.as_str()).collect();
        let her2: Vec<&str> = e.iter().map(|x| x.sample.her2.as_str()).collect();
        let tnbc: Vec<bool> = e.iter().map(|x| x.sample.is_triple_negative()).collect();
        let subtypes: Vec<&str> = e.iter().map(|x| x.subtype.as_str()).collect();
        let quartiles: Vec<u32> = e.iter().map(|x| x.quartile as u32).collect();
        let tiers: Vec<&str> = e.iter().map(|x| x.tier.as_str()).collect();
        let expression: Vec<f64> = e.iter().map(|x| x.expression).collect();

        df!(
            SAMPLE_ID => ids,
            ER_STATUS => er,
            PR_STATUS => pr,
            HER2_STATUS => her2,
            TRIPLE_NEGATIVE => tnbc,
            SUBTYPE => subtypes,
            QUARTILE => quartiles,
            TIER => tiers,
            EXPRESSION => expression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::classify;
    use crate::models::{ExpressionObservation, ReceptorStatus};
    use ReceptorStatus::{Negative, Positive};

    fn sample(id: &str, er: ReceptorStatus) -> SampleRecord {
        SampleRecord::new(id.to_string(), er, Positive, Negative)
    }

    fn subtype(id: &str, subtype: Option<Subtype>) -> SubtypeRecord {
        SubtypeRecord { sample_id: id.to_string(), subtype }
    }

    fn expression(values: &[(&str, f64)]) -> GeneClassification {
        let obs: Vec<ExpressionObservation> = values
            .iter()
            .map(|(id, v)| ExpressionObservation {
                sample_id: id.to_string(),
                gene: "ESR1".to_string(),
                value: Some(*v),
            })
            .collect();
        classify("ESR1", &obs).unwrap()
    }

    fn entry<'a>(cohort: &'a Cohort, id: &str) -> Option<&'a CohortEntry> {
        cohort.entries().iter().find(|e| e.sample_id() == id)
    }

    fn fixture() -> Cohort {
        let samples = vec![
            sample("S1", Positive),
            sample("S2", Positive),
            sample("S3", Negative),
            sample("S4", Positive),
            sample("S5", Positive),
            sample("S7", Positive),
        ];
        let subtypes = vec![
            subtype("S2", Some(Subtype::LuminalA)),
            subtype("S3", Some(Subtype::Basal)),
            subtype("S4", None),
            subtype("S5", Some(Subtype::LuminalB)),
            subtype("S6", Some(Subtype::Her2)),
            subtype("S7", Some(Subtype::LuminalA)),
        ];
        let tiers = expression(&[
            ("S1", 0.1),
            ("S2", 0.2),
            ("S3", -1.5),
            ("S4", 0.9),
            ("S5", 2.5),
            ("S6", 1.0),
        ]);
        build_cohort(&samples, &subtypes, &tiers)
    }

    #[test]
    fn sample_without_subtype_row_is_excluded() {
        let cohort = fixture();
        assert!(entry(&cohort, "S1").is_none());
    }

    #[test]
    fn inner_join_drops_samples_missing_anywhere() {
        let cohort = fixture();
        let ids: Vec<&str> = cohort.entries().iter().map(|e| e.sample_id()).collect();
        // S4 has no subtype call, S6 no clinical row, S7 no expression value
        assert_eq!(ids, vec!["S2", "S3", "S5"]);
    }

    #[test]
    fn entries_carry_tier_and_raw_value() {
        let cohort = fixture();
        let s3 = entry(&cohort, "S3").unwrap();
        assert_eq!(s3.subtype, Subtype::Basal);
        assert_eq!(s3.tier, Tier::Low);
        assert_eq!(s3.expression, -1.5);
        assert_eq!(entry(&cohort, "S5").unwrap().tier, Tier::High);
        assert_eq!(cohort.gene(), "ESR1");
    }

    #[test]
    fn filters_return_fresh_cohorts() {
        let cohort = fixture();
        let luminal = cohort.filter(|e| e.subtype != Subtype::Basal);
        assert_eq!(luminal.len(), 2);
        assert_eq!(cohort.len(), 3);
        assert_eq!(cohort.with_tier(Tier::High).len(), 1);
        assert_eq!(cohort.with_subtype(Subtype::Her2).len(), 0);
    }

    #[test]
    fn dataframe_has_no_null_subtypes() {
        let df = fixture().to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column(SUBTYPE).unwrap().null_count(), 0);
        let tnbc = df.column(TRIPLE_NEGATIVE).unwrap().bool().unwrap();
        assert_eq!(tnbc.get(0), Some(false));
    }
}
