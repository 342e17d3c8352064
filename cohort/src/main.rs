use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;

mod analysis;
mod classification;
mod cohort_builder;
mod config;
mod data_handling;
mod error;
mod helper_functions;
mod models;
mod pipeline;

fn main() -> anyhow::Result<()> {
    // Setup logging and project configuration
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the cohort pipeline");

    let config = PipelineConfig::load_default().context("failed to load pipeline configuration")?;
    let written = config
        .write_effective()
        .context("failed to write effective configuration")?;
    info!("Effective configuration written to {}", written.display());
    info!("Gene of interest: {}", config.gene_of_interest);

    let summary = pipeline::run(&config).context("cohort pipeline failed")?;

    info!(
        "Cohort: {} samples, {} in the DE contrast, {} tier comparisons",
        summary.cohort_size, summary.design_size, summary.comparisons
    );
    if let Some(genes) = summary.significant_genes {
        info!("{} significant DE genes", genes);
    }
    for path in &summary.outputs {
        info!("Wrote {}", path.display());
    }

    Ok(())
}
