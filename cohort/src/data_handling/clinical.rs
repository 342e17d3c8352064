use polars::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::ClinicalConfig;
use crate::helper_functions::read_tsv;
use crate::models::{Dataset, ReceptorStatus, SampleRecord, ER_STATUS, HER2_STATUS, PR_STATUS, SAMPLE_ID};

/// Per-patient receptor annotations (ER/PR/HER2 by IHC).
pub struct ClinicalDataset {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub sample_id_column: String,
    pub er_column: String,
    pub pr_column: String,
    pub her2_column: String,
    pub id_suffix: String,
}

impl From<&ClinicalConfig> for ClinicalDataset {
    fn from(config: &ClinicalConfig) -> Self {
        Self {
            path: config.path.clone(),
            skip_rows: config.skip_rows,
            sample_id_column: config.sample_id_column.clone(),
            er_column: config.er_column.clone(),
            pr_column: config.pr_column.clone(),
            her2_column: config.her2_column.clone(),
            id_suffix: config.id_suffix.clone(),
        }
    }
}

impl Dataset for ClinicalDataset {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading clinical data from {}", self.path.display());
        let df = match read_tsv(&self.path, self.skip_rows) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read clinical table: {}", e);
                return Err(e);
            }
        };
        debug!("Loaded {} clinical rows", df.height());

        df.lazy()
            .select([
                (col(self.sample_id_column.as_str()) + lit(self.id_suffix.as_str())).alias(SAMPLE_ID),
                col(self.er_column.as_str()).alias(ER_STATUS),
                col(self.pr_column.as_str()).alias(PR_STATUS),
                col(self.her2_column.as_str()).alias(HER2_STATUS),
            ])
            .filter(col(SAMPLE_ID).is_not_null())
            .collect()
    }
}

impl ClinicalDataset {
    pub fn load_records(&self) -> PolarsResult<Vec<SampleRecord>> {
        sample_records(&self.load()?)
    }
}

/// Convert a normalized clinical frame into records, keeping the first row per sample.
pub fn sample_records(df: &DataFrame) -> PolarsResult<Vec<SampleRecord>> {
    let ids = df.column(SAMPLE_ID)?.str()?;
    let er = df.column(ER_STATUS)?.str()?;
    let pr = df.column(PR_STATUS)?.str()?;
    let her2 = df.column(HER2_STATUS)?.str()?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(id) = ids.get(i) else { continue };
        if !seen.insert(id) {
            continue;
        }
        records.push(SampleRecord::new(
            id.to_string(),
            ReceptorStatus::parse(er.get(i)),
            ReceptorStatus::parse(pr.get(i)),
            ReceptorStatus::parse(her2.get(i)),
        ));
    }

    let duplicates = df.height() - records.len();
    if duplicates > 0 {
        warn!("Dropped {} clinical rows with a repeated sample id", duplicates);
    }
    let tnbc = records.iter().filter(|r| r.is_triple_negative()).count();
    info!("{} clinical samples, {} triple-negative", records.len(), tnbc);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dataset(path: PathBuf) -> ClinicalDataset {
        ClinicalDataset::from(&ClinicalConfig { path, ..ClinicalConfig::default() })
    }

    #[test]
    fn load_renames_and_suffixes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "PATIENT_ID\tAGE\tER_STATUS_BY_IHC\tPR_STATUS_BY_IHC\tIHC_HER2\n\
             TCGA-A1-0001\t50\tNegative\tNegative\tNegative\n\
             TCGA-A1-0002\t61\tPositive\tPositive\tNegative\n"
        )
        .unwrap();

        let df = dataset(file.path().to_path_buf()).load().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec![SAMPLE_ID, ER_STATUS, PR_STATUS, HER2_STATUS]);
        let ids = df.column(SAMPLE_ID).unwrap().str().unwrap();
        assert_eq!(ids.get(0), Some("TCGA-A1-0001-01A"));
    }

    #[test]
    fn missing_status_is_not_triple_negative() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "PATIENT_ID\tER_STATUS_BY_IHC\tPR_STATUS_BY_IHC\tIHC_HER2\n\
             P1\tNegative\tNegative\tNegative\n\
             P2\tNegative\tNegative\tPositive\n\
             P3\tNegative\t\tNegative\n\
             P4\tNegative\tNA\tNegative\n\
             P1\tPositive\tPositive\tPositive\n"
        )
        .unwrap();

        let records = dataset(file.path().to_path_buf()).load_records().unwrap();
        assert_eq!(records.len(), 4);
        let tnbc: Vec<&str> = records
            .iter()
            .filter(|r| r.is_triple_negative())
            .map(|r| r.sample_id.as_str())
            .collect();
        assert_eq!(tnbc, vec!["P1-01A"]);
        assert_eq!(records[2].pr, ReceptorStatus::Indeterminate);
    }

    #[test]
    fn missing_column_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "PATIENT_ID\tER_STATUS_BY_IHC\nP1\tNegative\n").unwrap();
        assert!(dataset(file.path().to_path_buf()).load().is_err());
    }
}
