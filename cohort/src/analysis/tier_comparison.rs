use polars::prelude::*;
use std::collections::HashMap;
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::cohort_builder::Cohort;
use crate::error::{CohortError, Result};
use crate::models::{CohortEntry, Subtype, Tier, SAMPLE_ID, SUBTYPE};

const ALL_SUBTYPES: &str = "All";

#[derive(Debug, Clone, PartialEq)]
pub struct WelchTest {
    pub n_a: usize,
    pub n_b: usize,
    pub mean_a: f64,
    pub mean_b: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

/// High vs Low comparison of one score, over the whole cohort or one subtype.
#[derive(Debug, Clone, PartialEq)]
pub struct TierComparison {
    pub score: String,
    pub subtype: Option<Subtype>,
    pub test: WelchTest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCorrelation {
    pub score: String,
    pub n: usize,
    pub pearson_r: f64,
}

/// Two-sided Welch two-sample t-test. `None` when a group has fewer than two
/// values or both groups have zero variance.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<Option<WelchTest>> {
    if a.len() < 2 || b.len() < 2 {
        return Ok(None);
    }
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let (mean_a, mean_b) = (a.mean(), b.mean());
    let se_a = a.variance() / n_a;
    let se_b = b.variance() / n_b;
    let se = se_a + se_b;
    if se <= 0.0 {
        return Ok(None);
    }

    let t_statistic = (mean_a - mean_b) / se.sqrt();
    let degrees_of_freedom = se * se / (se_a * se_a / (n_a - 1.0) + se_b * se_b / (n_b - 1.0));
    let dist = StudentsT::new(0.0, 1.0, degrees_of_freedom).map_err(|e| CohortError::statistics(e.to_string()))?;
    let p_value = (2.0 * (1.0 - dist.cdf(t_statistic.abs()))).min(1.0);

    Ok(Some(WelchTest {
        n_a: a.len(),
        n_b: b.len(),
        mean_a,
        mean_b,
        t_statistic,
        degrees_of_freedom,
        p_value,
    }))
}

/// Pearson r from sample covariance over the product of sample standard deviations.
/// `None` for fewer than two pairs or a constant series.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() < 2 || x.len() != y.len() {
        return None;
    }
    let spread = x.std_dev() * y.std_dev();
    if !(spread > 0.0) {
        return None;
    }
    Some(x.covariance(y) / spread)
}

// --------------------------------------------------------
//  Cohort x score table
// --------------------------------------------------------

struct ScoredRow<'a> {
    entry: &'a CohortEntry,
    score: f64,
}

/// Cohort entries that have a value in `score`, matched on sample id.
/// A sample repeated in the score table contributes its first row only.
fn scored_rows<'a>(cohort: &'a Cohort, scores: &DataFrame, score: &str) -> PolarsResult<Vec<ScoredRow<'a>>> {
    let ids = scores.column(SAMPLE_ID)?.str()?;
    let values = scores.column(score)?.f64()?;

    let mut by_sample: HashMap<&str, Option<f64>> = HashMap::with_capacity(scores.height());
    for (id, value) in ids.into_iter().zip(values.into_iter()) {
        if let Some(id) = id {
            by_sample.entry(id).or_insert(value);
        }
    }

    let rows: Vec<ScoredRow> = cohort
        .entries()
        .iter()
        .filter_map(|entry| {
            let score = (*by_sample.get(entry.sample_id())?)?;
            Some(ScoredRow { entry, score })
        })
        .collect();
    debug!("{}: {} of {} cohort samples scored", score, rows.len(), cohort.len());
    Ok(rows)
}

/// Welch t-test of High vs Low tier for each score column, overall and per subtype.
pub fn compare_tiers(cohort: &Cohort, scores: &DataFrame, score_columns: &[String]) -> Result<Vec<TierComparison>> {
    let scopes: Vec<Option<Subtype>> = std::iter::once(None).chain(Subtype::all().into_iter().map(Some)).collect();

    let mut comparisons = Vec::new();
    for score in score_columns {
        let rows = scored_rows(cohort, scores, score)?;
        for scope in &scopes {
            let in_scope = |r: &&ScoredRow| scope.map_or(true, |s| r.entry.subtype == s);
            let high: Vec<f64> = rows
                .iter()
                .filter(in_scope)
                .filter(|r| r.entry.tier == Tier::High)
                .map(|r| r.score)
                .collect();
            let low: Vec<f64> = rows
                .iter()
                .filter(in_scope)
                .filter(|r| r.entry.tier == Tier::Low)
                .map(|r| r.score)
                .collect();

            match welch_t_test(&high, &low)? {
                Some(test) => {
                    info!(
                        "{} [{}]: High {:.3} (n={}) vs Low {:.3} (n={}), t={:.3}, p={:.3e}",
                        score,
                        scope.map_or(ALL_SUBTYPES, |s| s.as_str()),
                        test.mean_a,
                        test.n_a,
                        test.mean_b,
                        test.n_b,
                        test.t_statistic,
                        test.p_value
                    );
                    comparisons.push(TierComparison { score: score.clone(), subtype: *scope, test });
                }
                None => debug!(
                    "{} [{}]: too few samples to compare",
                    score,
                    scope.map_or(ALL_SUBTYPES, |s| s.as_str())
                ),
            }
        }
    }
    Ok(comparisons)
}

/// Pearson r between the cohort gene's raw expression and each score column.
pub fn correlate_scores(cohort: &Cohort, scores: &DataFrame, score_columns: &[String]) -> Result<Vec<ScoreCorrelation>> {
    let mut correlations = Vec::new();
    for score in score_columns {
        let rows = scored_rows(cohort, scores, score)?;
        let x: Vec<f64> = rows.iter().map(|r| r.entry.expression).collect();
        let y: Vec<f64> = rows.iter().map(|r| r.score).collect();
        if let Some(pearson_r) = pearson_correlation(&x, &y) {
            info!("{} vs {}: r = {:.3} (n={})", cohort.gene(), score, pearson_r, rows.len());
            correlations.push(ScoreCorrelation { score: score.clone(), n: rows.len(), pearson_r });
        }
    }
    Ok(correlations)
}

pub fn comparisons_frame(comparisons: &[TierComparison]) -> PolarsResult<DataFrame> {
    let scores: Vec<&str> = comparisons.iter().map(|c| c.score.as_str()).collect();
    let subtypes: Vec<&str> = comparisons
        .iter()
        .map(|c| c.subtype.map_or(ALL_SUBTYPES, |s| s.as_str()))
        .collect();
    let n_high: Vec<u32> = comparisons.iter().map(|c| c.test.n_a as u32).collect();
    let n_low: Vec<u32> = comparisons.iter().map(|c| c.test.n_b as u32).collect();
    let mean_high: Vec<f64> = comparisons.iter().map(|c| c.test.mean_a).collect();
    let mean_low: Vec<f64> = comparisons.iter().map(|c| c.test.mean_b).collect();
    let t: Vec<f64> = comparisons.iter().map(|c| c.test.t_statistic).collect();
    let dof: Vec<f64> = comparisons.iter().map(|c| c.test.degrees_of_freedom).collect();
    let p: Vec<f64> = comparisons.iter().map(|c| c.test.p_value).collect();

    df!(
        "score" => scores,
        SUBTYPE => subtypes,
        "n_high" => n_high,
        "n_low" => n_low,
        "mean_high" => mean_high,
        "mean_low" => mean_low,
        "t_statistic" => t,
        "df" => dof,
        "p_value" => p
    )
}

pub fn correlations_frame(correlations: &[ScoreCorrelation]) -> PolarsResult<DataFrame> {
    let scores: Vec<&str> = correlations.iter().map(|c| c.score.as_str()).collect();
    let n: Vec<u32> = correlations.iter().map(|c| c.n as u32).collect();
    let r: Vec<f64> = correlations.iter().map(|c| c.pearson_r).collect();
    df!("score" => scores, "n" => n, "pearson_r" => r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::classify;
    use crate::cohort_builder::build_cohort;
    use crate::models::{ExpressionObservation, ReceptorStatus, SampleRecord, SubtypeRecord};

    #[test]
    fn welch_matches_hand_computation() {
        let test = welch_t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 6.0, 8.0, 10.0])
            .unwrap()
            .unwrap();
        assert!((test.t_statistic - -1.897_366_6).abs() < 1e-6);
        assert!((test.degrees_of_freedom - 5.882_352_9).abs() < 1e-6);
        assert!((test.p_value - 0.1075).abs() < 1e-3);
        assert_eq!(test.mean_b, 6.0);
    }

    #[test]
    fn welch_needs_two_values_per_group() {
        assert_eq!(welch_t_test(&[1.0], &[2.0, 3.0]).unwrap(), None);
        assert_eq!(welch_t_test(&[1.0, 1.0], &[2.0, 2.0]).unwrap(), None);
    }

    #[test]
    fn pearson_of_known_series() {
        let r = pearson_correlation(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 1.0, 4.0, 3.0, 5.0]).unwrap();
        assert!((r - 0.8).abs() < 1e-12);
        assert_eq!(pearson_correlation(&[1.0, 1.0], &[2.0, 3.0]), None);
        assert_eq!(pearson_correlation(&[1.0], &[2.0]), None);
    }

    fn cohort() -> Cohort {
        let ids: Vec<String> = (1..=8).map(|i| format!("S{}", i)).collect();
        let samples: Vec<SampleRecord> = ids
            .iter()
            .map(|id| {
                SampleRecord::new(
                    id.clone(),
                    ReceptorStatus::Positive,
                    ReceptorStatus::Positive,
                    ReceptorStatus::Negative,
                )
            })
            .collect();
        let subtypes: Vec<SubtypeRecord> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| SubtypeRecord {
                sample_id: id.clone(),
                subtype: Some(if i % 2 == 0 { Subtype::LuminalA } else { Subtype::LuminalB }),
            })
            .collect();
        let obs: Vec<ExpressionObservation> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| ExpressionObservation {
                sample_id: id.clone(),
                gene: "ESR1".to_string(),
                value: Some(i as f64),
            })
            .collect();
        build_cohort(&samples, &subtypes, &classify("ESR1", &obs).unwrap())
    }

    #[test]
    fn compares_high_and_low_tiers() {
        let scores = df!(
            SAMPLE_ID => &["S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8", "S9"],
            "Proliferation" => &[0.1, 0.3, 0.4, 0.2, 0.6, 0.5, 0.9, 1.1, 5.0]
        )
        .unwrap();
        let columns = vec!["Proliferation".to_string()];

        let comparisons = compare_tiers(&cohort(), &scores, &columns).unwrap();
        // per-subtype groups hold a single High and a single Low sample
        assert_eq!(comparisons.len(), 1);
        let overall = &comparisons[0];
        assert_eq!(overall.subtype, None);
        assert_eq!((overall.test.n_a, overall.test.n_b), (2, 2));
        assert!((overall.test.mean_a - 1.0).abs() < 1e-12);
        assert!((overall.test.mean_b - 0.2).abs() < 1e-12);

        let frame = comparisons_frame(&comparisons).unwrap();
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.column(SUBTYPE).unwrap().str().unwrap().get(0), Some("All"));
    }

    #[test]
    fn repeated_score_rows_count_once() {
        let scores = df!(
            SAMPLE_ID => &["S1", "S1", "S1", "S2", "S7", "S8"],
            "Proliferation" => &[0.1, 3.0, 4.0, 0.3, 0.9, 1.1]
        )
        .unwrap();

        let comparisons = compare_tiers(&cohort(), &scores, &["Proliferation".to_string()]).unwrap();
        let overall = &comparisons[0];
        assert_eq!((overall.test.n_a, overall.test.n_b), (2, 2));
        assert!((overall.test.mean_b - 0.2).abs() < 1e-12);
    }

    #[test]
    fn correlates_expression_with_scores() {
        let scores = df!(
            SAMPLE_ID => &["S1", "S2", "S3", "S4"],
            "ROR-P" => &[10.0, 20.0, 30.0, 40.0]
        )
        .unwrap();
        let correlations = correlate_scores(&cohort(), &scores, &["ROR-P".to_string()]).unwrap();
        assert_eq!(correlations.len(), 1);
        assert_eq!(correlations[0].n, 4);
        assert!((correlations[0].pearson_r - 1.0).abs() < 1e-12);
        assert_eq!(correlations_frame(&correlations).unwrap().height(), 1);
    }
}
