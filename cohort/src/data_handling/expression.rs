use polars::prelude::*;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::config::ExpressionConfig;
use crate::helper_functions::read_tsv;
use crate::models::{Dataset, ExpressionObservation, GENE};

/// Gene-by-sample matrix of z-scored expression values.
pub struct ExpressionDataset {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub gene_column: String,
    pub annotation_columns: Vec<String>,
    pub id_suffix: String,
}

impl From<&ExpressionConfig> for ExpressionDataset {
    fn from(config: &ExpressionConfig) -> Self {
        Self {
            path: config.path.clone(),
            skip_rows: config.skip_rows,
            gene_column: config.gene_column.clone(),
            annotation_columns: config.annotation_columns.clone(),
            id_suffix: config.id_suffix.clone(),
        }
    }
}

impl Dataset for ExpressionDataset {
    /// Wide frame: `gene` followed by one Float64 column per suffixed sample id.
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading expression matrix from {}", self.path.display());
        let df = match read_tsv(&self.path, self.skip_rows) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read expression matrix: {}", e);
                return Err(e);
            }
        };

        let sample_columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .filter(|c| *c != self.gene_column && !self.annotation_columns.contains(c))
            .collect();
        debug!("Expression matrix: {} genes x {} samples", df.height(), sample_columns.len());

        let mut exprs = vec![col(self.gene_column.as_str()).alias(GENE)];
        exprs.extend(sample_columns.iter().map(|name| {
            col(name.as_str())
                .cast(DataType::Float64)
                .alias(format!("{}{}", name, self.id_suffix))
        }));

        let df = df
            .lazy()
            .select(exprs)
            .filter(col(GENE).is_not_null())
            .collect()?;
        debug!("{} genes with a symbol", df.height());
        Ok(df)
    }
}

/// Long-form view of the matrix: one observation per (sample, gene).
#[derive(Debug, Clone, Default)]
pub struct ExpressionMatrix {
    pub observations: Vec<ExpressionObservation>,
}

impl ExpressionDataset {
    pub fn load_matrix(&self) -> PolarsResult<ExpressionMatrix> {
        let matrix = ExpressionMatrix::from_wide(&self.load()?)?;
        debug!("{} observations over {} genes", matrix.observations.len(), matrix.genes().len());
        Ok(matrix)
    }
}

impl ExpressionMatrix {
    pub fn from_wide(df: &DataFrame) -> PolarsResult<Self> {
        let genes = df.column(GENE)?.str()?;
        let mut observations = Vec::with_capacity(df.height() * df.width().saturating_sub(1));

        for column in df.get_columns().iter().filter(|c| c.name().as_str() != GENE) {
            let values = column.f64()?;
            let sample_id = column.name().to_string();
            for (gene, value) in genes.into_iter().zip(values.into_iter()) {
                let Some(gene) = gene else { continue };
                observations.push(ExpressionObservation {
                    sample_id: sample_id.clone(),
                    gene: gene.to_string(),
                    value,
                });
            }
        }
        Ok(Self { observations })
    }

    /// Observations of one gene, taken from the first matrix row carrying that symbol.
    pub fn values_for(&self, gene: &str) -> Vec<ExpressionObservation> {
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        let mut repeated = 0usize;
        for obs in self.observations.iter().filter(|o| o.gene == gene) {
            if !seen.insert(obs.sample_id.as_str()) {
                repeated += 1;
                continue;
            }
            selected.push(obs.clone());
        }
        if repeated > 0 {
            warn!("Gene {} appears on more than one row, keeping the first", gene);
        }
        selected
    }

    pub fn genes(&self) -> Vec<&str> {
        let mut genes: Vec<&str> = self.observations.iter().map(|o| o.gene.as_str()).collect();
        genes.sort_unstable();
        genes.dedup();
        genes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_matrix() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "Hugo_Symbol\tEntrez_Gene_Id\tTCGA-A1-0001-01\tTCGA-A1-0002-01\n\
             ESR1\t2099\t1.25\t-0.5\n\
             \t100\t3.0\t3.0\n\
             FOXA1\t3169\tNA\t0.75\n\
             ESR1\t2099\t9.0\t9.0\n"
        )
        .unwrap();
        file
    }

    fn dataset(path: PathBuf) -> ExpressionDataset {
        ExpressionDataset::from(&ExpressionConfig { path, ..ExpressionConfig::default() })
    }

    #[test]
    fn drops_unnamed_genes_and_suffixes_samples() {
        let file = write_matrix();
        let df = dataset(file.path().to_path_buf()).load().unwrap();

        assert_eq!(df.height(), 3);
        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec![GENE, "TCGA-A1-0001-01A", "TCGA-A1-0002-01A"]);
    }

    #[test]
    fn long_form_keeps_missing_values() {
        let file = write_matrix();
        let matrix = dataset(file.path().to_path_buf()).load_matrix().unwrap();

        assert_eq!(matrix.observations.len(), 6);
        assert_eq!(matrix.genes(), vec!["ESR1", "FOXA1"]);
        let foxa1 = matrix.values_for("FOXA1");
        assert_eq!(foxa1[0].value, None);
        assert_eq!(foxa1[1].value, Some(0.75));
    }

    #[test]
    fn repeated_gene_uses_first_row() {
        let file = write_matrix();
        let matrix = dataset(file.path().to_path_buf()).load_matrix().unwrap();

        let esr1 = matrix.values_for("ESR1");
        assert_eq!(esr1.len(), 2);
        assert_eq!(esr1[0].sample_id, "TCGA-A1-0001-01A");
        assert_eq!(esr1[0].value, Some(1.25));
        assert_eq!(esr1[1].value, Some(-0.5));
    }
}
