//! Quartile binning of one gene's expression into Low / Mid / High tiers.
//!
//! Samples are ordered by (value, sample id) and given positional ranks 1-4 in
//! groups of equal size, the first `n % 4` groups one larger. Samples sharing a
//! value never straddle a boundary: the whole tie group takes the highest rank
//! any member was given, so a value on a cut point lands in the higher rank.

use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{CohortError, Result};
use crate::models::{ExpressionObservation, Tier, EXPRESSION, QUARTILE, SAMPLE_ID, TIER};

const QUARTILES: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct TierAssignment {
    pub sample_id: String,
    pub value: f64,
    pub quartile: u8,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneClassification {
    pub gene: String,
    /// Ascending by (value, sample id).
    pub assignments: Vec<TierAssignment>,
}

/// Positional ranks for `n` sorted elements, dplyr `ntile` style.
pub fn ntile_ranks(n: usize) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let larger_groups = n % QUARTILES;
    let small = n / QUARTILES;
    let large = small + 1;
    let threshold = large * larger_groups;

    (0..n)
        .map(|i| {
            let bucket = if i < threshold {
                i / large
            } else {
                // small > 0 whenever an index reaches past the larger groups
                (i - threshold) / small + larger_groups
            };
            (bucket + 1) as u8
        })
        .collect()
}

/// Quartile rank per value for already sorted `values`, ties promoted to the higher rank.
pub fn quartile_ranks(sorted_values: &[f64]) -> Vec<u8> {
    let mut ranks = ntile_ranks(sorted_values.len());
    let mut start = 0;
    while start < sorted_values.len() {
        let mut end = start + 1;
        while end < sorted_values.len() && sorted_values[end] == sorted_values[start] {
            end += 1;
        }
        let top = ranks[end - 1];
        ranks[start..end].iter_mut().for_each(|r| *r = top);
        start = end;
    }
    ranks
}

pub fn classify(gene: &str, observations: &[ExpressionObservation]) -> Result<GeneClassification> {
    let of_gene: Vec<&ExpressionObservation> = observations.iter().filter(|o| o.gene == gene).collect();
    if of_gene.is_empty() {
        return Err(CohortError::GeneNotFound(gene.to_string()));
    }

    let mut present: Vec<(&str, f64)> = of_gene
        .iter()
        .filter_map(|o| o.value.filter(|v| !v.is_nan()).map(|v| (o.sample_id.as_str(), v)))
        .collect();
    if present.len() < QUARTILES {
        return Err(CohortError::degenerate_quantile(gene, present.len()));
    }
    debug!(
        "{}: {} samples with a value, {} missing",
        gene,
        present.len(),
        of_gene.len() - present.len()
    );

    present.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    let values: Vec<f64> = present.iter().map(|(_, v)| *v).collect();
    let ranks = quartile_ranks(&values);

    let assignments: Vec<TierAssignment> = present
        .iter()
        .zip(ranks)
        .map(|((sample_id, value), quartile)| TierAssignment {
            sample_id: sample_id.to_string(),
            value: *value,
            quartile,
            tier: Tier::from_rank(quartile),
        })
        .collect();

    let classification = GeneClassification { gene: gene.to_string(), assignments };
    info!(
        "{} tiers: {} Low, {} Mid, {} High",
        gene,
        classification.count(Tier::Low),
        classification.count(Tier::Mid),
        classification.count(Tier::High)
    );
    Ok(classification)
}

impl GeneClassification {
    pub fn count(&self, tier: Tier) -> usize {
        self.assignments.iter().filter(|a| a.tier == tier).count()
    }

    pub fn by_sample(&self) -> HashMap<&str, &TierAssignment> {
        self.assignments.iter().map(|a| (a.sample_id.as_str(), a)).collect()
    }

    /// Highest value in each quartile that has members, in quartile order.
    pub fn cut_points(&self) -> Vec<(u8, f64)> {
        let mut cuts: Vec<(u8, f64)> = Vec::new();
        for a in &self.assignments {
            match cuts.last_mut() {
                Some((q, max)) if *q == a.quartile => *max = a.value,
                _ => cuts.push((a.quartile, a.value)),
            }
        }
        cuts
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let ids: Vec<&str> = self.assignments.iter().map(|a| a.sample_id.as_str()).collect();
        let values: Vec<f64> = self.assignments.iter().map(|a| a.value).collect();
        let quartiles: Vec<u32> = self.assignments.iter().map(|a| a.quartile as u32).collect();
        let tiers: Vec<&str> = self.assignments.iter().map(|a| a.tier.as_str()).collect();
        df!(
            SAMPLE_ID => ids,
            EXPRESSION => values,
            QUARTILE => quartiles,
            TIER => tiers
        )
    }

    pub fn cut_points_frame(&self) -> PolarsResult<DataFrame> {
        let cuts = self.cut_points();
        let quartiles: Vec<u32> = cuts.iter().map(|(q, _)| *q as u32).collect();
        let maxima: Vec<f64> = cuts.iter().map(|(_, m)| *m).collect();
        df!(
            QUARTILE => quartiles,
            "max_expression" => maxima
        )
    }
}
