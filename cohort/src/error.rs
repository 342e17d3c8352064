use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CohortError>;

#[derive(Error, Debug)]
pub enum CohortError {
    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("gene {gene} has {found} non-missing expression values, quartile binning needs at least 4")]
    DegenerateQuantile { gene: String, found: usize },

    #[error("gene {0} not found in expression matrix")]
    GeneNotFound(String),

    #[error("statistics failed: {0}")]
    Statistics(String),
}

impl CohortError {
    pub fn degenerate_quantile(gene: impl Into<String>, found: usize) -> Self {
        Self::DegenerateQuantile { gene: gene.into(), found }
    }

    pub fn statistics(message: impl Into<String>) -> Self {
        Self::Statistics(message.into())
    }
}
