use polars::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::ScoreTableConfig;
use crate::helper_functions::read_tsv;
use crate::models::{Dataset, SAMPLE_ID};

/// Auxiliary per-sample scores (proliferation, risk of recurrence, ...).
pub struct ScoreDataset {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub sample_id_column: String,
    pub id_suffix: String,
    pub score_columns: Vec<String>,
}

impl From<&ScoreTableConfig> for ScoreDataset {
    fn from(config: &ScoreTableConfig) -> Self {
        Self {
            path: config.path.clone(),
            skip_rows: config.skip_rows,
            sample_id_column: config.sample_id_column.clone(),
            id_suffix: config.id_suffix.clone(),
            score_columns: config.score_columns.clone(),
        }
    }
}

impl Dataset for ScoreDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading score table from {}", self.path.display());
        let df = match read_tsv(&self.path, self.skip_rows) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read score table: {}", e);
                return Err(e);
            }
        };

        let mut exprs = vec![(col(self.sample_id_column.as_str()) + lit(self.id_suffix.as_str())).alias(SAMPLE_ID)];
        exprs.extend(
            self.score_columns
                .iter()
                .map(|name| col(name.as_str()).cast(DataType::Float64)),
        );

        let df = df
            .lazy()
            .select(exprs)
            .filter(col(SAMPLE_ID).is_not_null())
            .collect()?;
        first_row_per_sample(&df)
    }
}

/// Keep the first row of every sample id, so a repeated sample is scored once.
pub fn first_row_per_sample(df: &DataFrame) -> PolarsResult<DataFrame> {
    let ids = df.column(SAMPLE_ID)?.str()?;
    let mut seen = HashSet::new();
    let keep: Vec<bool> = ids.into_iter().map(|id| id.is_some_and(|id| seen.insert(id))).collect();

    let duplicates = keep.iter().filter(|k| !**k).count();
    if duplicates == 0 {
        return Ok(df.clone());
    }
    warn!("Dropped {} score rows with a repeated sample id", duplicates);
    let mask = BooleanChunked::new("".into(), keep.as_slice());
    df.filter(&mask)
}
