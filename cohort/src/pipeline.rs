use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::analysis::differential_expression;
use crate::analysis::tier_comparison::{comparisons_frame, compare_tiers, correlate_scores, correlations_frame};
use crate::classification::{classify, GeneClassification};
use crate::cohort_builder::{build_cohort, Cohort};
use crate::config::PipelineConfig;
use crate::data_handling::clinical::ClinicalDataset;
use crate::data_handling::expression::ExpressionDataset;
use crate::data_handling::scores::ScoreDataset;
use crate::data_handling::subtype::SubtypeDataset;
use crate::error::Result;
use crate::helper_functions::dataframe_to_tsv;
use crate::models::{Dataset, Subtype};

#[derive(Debug)]
pub struct PipelineSummary {
    pub cohort_size: usize,
    pub design_size: usize,
    pub comparisons: usize,
    pub significant_genes: Option<usize>,
    pub outputs: Vec<PathBuf>,
}

/// Load the three input tables, classify the gene of interest and join them.
pub fn load_cohort(config: &PipelineConfig) -> Result<(GeneClassification, Cohort)> {
    let samples = ClinicalDataset::from(&config.clinical).load_records()?;
    let subtypes = SubtypeDataset::from(&config.subtype).load_records()?;
    let matrix = ExpressionDataset::from(&config.expression).load_matrix()?;

    let observations = matrix.values_for(&config.gene_of_interest);
    let classification = classify(&config.gene_of_interest, &observations)?;
    let cohort = build_cohort(&samples, &subtypes, &classification);
    Ok((classification, cohort))
}

pub fn run(config: &PipelineConfig) -> Result<PipelineSummary> {
    let (classification, cohort) = load_cohort(config)?;
    if cohort.is_empty() {
        warn!("Cohort is empty, check that sample id suffixes line up across tables");
    }
    for subtype in Subtype::all() {
        debug!("{}: {} samples", subtype, cohort.with_subtype(subtype).len());
    }

    let out = &config.output_dir;
    let mut outputs = Vec::new();

    let path = out.join("cohort.tsv");
    dataframe_to_tsv(&mut cohort.to_dataframe()?, &path)?;
    outputs.push(path);

    let path = out.join("tier_assignments.tsv");
    dataframe_to_tsv(&mut classification.to_dataframe()?, &path)?;
    outputs.push(path);

    let path = out.join("tier_cut_points.tsv");
    dataframe_to_tsv(&mut classification.cut_points_frame()?, &path)?;
    outputs.push(path);

    let de = &config.differential_expression;
    let design_file = config.design_file();
    let design_size = differential_expression::write_design(&cohort, &design_file)?;
    outputs.push(design_file);

    let mut comparisons = 0;
    for (i, table) in config.score_tables.iter().enumerate() {
        let scores = ScoreDataset::from(table).load()?;

        let tested = compare_tiers(&cohort, &scores, &table.score_columns)?;
        comparisons += tested.len();
        let path = out.join(format!("tier_comparisons_{}.tsv", i + 1));
        dataframe_to_tsv(&mut comparisons_frame(&tested)?, &path)?;
        outputs.push(path);

        let correlations = correlate_scores(&cohort, &scores, &table.score_columns)?;
        let path = out.join(format!("score_correlations_{}.tsv", i + 1));
        dataframe_to_tsv(&mut correlations_frame(&correlations)?, &path)?;
        outputs.push(path);
    }

    let significant_genes = match &de.results_file {
        Some(results_file) => {
            let results = differential_expression::read_results(results_file)?;
            let hits = differential_expression::significant(&results, de.padj_threshold, de.min_abs_log2_fold_change);
            info!(
                "{} of {} genes pass padj <= {} and |log2FC| >= {}",
                hits.len(),
                results.len(),
                de.padj_threshold,
                de.min_abs_log2_fold_change
            );
            let path = out.join("de_significant.tsv");
            differential_expression::write_results(&hits, &path)?;
            outputs.push(path);
            Some(hits.len())
        }
        None => None,
    };

    Ok(PipelineSummary {
        cohort_size: cohort.len(),
        design_size,
        comparisons,
        significant_genes,
        outputs,
    })
}
