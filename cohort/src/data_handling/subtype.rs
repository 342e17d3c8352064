use polars::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info};

use crate::config::SubtypeConfig;
use crate::helper_functions::read_tsv;
use crate::models::{Dataset, Subtype, SubtypeRecord, SAMPLE_ID, SUBTYPE};

/// PAM50 subtype calls keyed by patient.
pub struct SubtypeDataset {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub patient_id_column: String,
    pub subtype_column: String,
    pub id_suffix: String,
}

impl From<&SubtypeConfig> for SubtypeDataset {
    fn from(config: &SubtypeConfig) -> Self {
        Self {
            path: config.path.clone(),
            skip_rows: config.skip_rows,
            patient_id_column: config.patient_id_column.clone(),
            subtype_column: config.subtype_column.clone(),
            id_suffix: config.id_suffix.clone(),
        }
    }
}

impl Dataset for SubtypeDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading subtype data from {}", self.path.display());
        let df = match read_tsv(&self.path, self.skip_rows) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read subtype table: {}", e);
                return Err(e);
            }
        };
        debug!("Loaded {} subtype rows", df.height());

        df.lazy()
            .select([
                (col(self.patient_id_column.as_str()) + lit(self.id_suffix.as_str())).alias(SAMPLE_ID),
                col(self.subtype_column.as_str()).alias(SUBTYPE),
            ])
            .filter(col(SAMPLE_ID).is_not_null())
            .collect()
    }
}

impl SubtypeDataset {
    pub fn load_records(&self) -> PolarsResult<Vec<SubtypeRecord>> {
        subtype_records(&self.load()?)
    }
}

/// Records keep missing subtypes as `None`; the cohort builder drops them.
pub fn subtype_records(df: &DataFrame) -> PolarsResult<Vec<SubtypeRecord>> {
    let ids = df.column(SAMPLE_ID)?.str()?;
    let labels = df.column(SUBTYPE)?.str()?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(df.height());
    for (id, label) in ids.into_iter().zip(labels.into_iter()) {
        let Some(id) = id else { continue };
        if !seen.insert(id) {
            continue;
        }
        records.push(SubtypeRecord {
            sample_id: id.to_string(),
            subtype: Subtype::parse(label),
        });
    }

    let missing = records.iter().filter(|r| r.subtype.is_none()).count();
    debug!("{} subtype records, {} without a call", records.len(), missing);
    Ok(records)
}
