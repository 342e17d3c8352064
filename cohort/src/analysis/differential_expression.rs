//! Hand-off to the external differential-expression engine.
//!
//! The engine runs offline on a High vs Low contrast restricted to ER-positive,
//! non-basal samples. We write its design table and read its results back.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;
use tracing::info;

use crate::cohort_builder::Cohort;
use crate::error::Result;
use crate::helper_functions::dataframe_to_tsv;
use crate::models::{ReceptorStatus, Subtype, Tier, ER_STATUS, HER2_STATUS, PR_STATUS, SAMPLE_ID, SUBTYPE, TIER};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeResult {
    pub gene: String,
    #[serde(rename = "log2FoldChange", deserialize_with = "csv::invalid_option")]
    pub log2_fold_change: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    pub padj: Option<f64>,
}

impl DeResult {
    pub fn is_significant(&self, padj_threshold: f64, min_abs_log2_fold_change: f64) -> bool {
        match (self.padj, self.log2_fold_change) {
            (Some(padj), Some(lfc)) => padj <= padj_threshold && lfc.abs() >= min_abs_log2_fold_change,
            _ => false,
        }
    }
}

/// ER-positive, non-basal samples in the High or Low tier.
pub fn contrast_subset(cohort: &Cohort) -> Cohort {
    cohort.filter(|e| {
        e.sample.er == ReceptorStatus::Positive
            && e.subtype != Subtype::Basal
            && matches!(e.tier, Tier::High | Tier::Low)
    })
}

pub fn write_design(cohort: &Cohort, path: &Path) -> Result<usize> {
    let subset = contrast_subset(cohort);
    let mut design = subset
        .to_dataframe()?
        .select([SAMPLE_ID, TIER, ER_STATUS, PR_STATUS, HER2_STATUS, SUBTYPE])?;
    dataframe_to_tsv(&mut design, path)?;
    info!(
        "DE design: {} High vs {} Low samples written to {}",
        subset.with_tier(Tier::High).len(),
        subset.with_tier(Tier::Low).len(),
        path.display()
    );
    Ok(subset.len())
}

pub fn read_results(path: &Path) -> Result<Vec<DeResult>> {
    info!("Reading DE results from {}", path.display());
    let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(path)?;
    let mut results = Vec::new();
    for record in reader.deserialize() {
        let result: DeResult = record?;
        results.push(result);
    }
    Ok(results)
}

/// Significant genes by ascending adjusted p-value.
pub fn significant(results: &[DeResult], padj_threshold: f64, min_abs_log2_fold_change: f64) -> Vec<DeResult> {
    let mut hits: Vec<DeResult> = results
        .iter()
        .filter(|r| r.is_significant(padj_threshold, min_abs_log2_fold_change))
        .cloned()
        .collect();
    hits.sort_by(|a, b| {
        a.padj
            .unwrap_or(f64::INFINITY)
            .total_cmp(&b.padj.unwrap_or(f64::INFINITY))
            .then_with(|| a.gene.cmp(&b.gene))
    });
    hits
}

pub fn write_results(results: &[DeResult], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(File::create(path)?);
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}
