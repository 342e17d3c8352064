use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::helper_functions::{project_root, resolve_path};

pub const CONFIG_FILE_NAME: &str = "cohort_config.json";
pub const EFFECTIVE_CONFIG_FILE_NAME: &str = "effective_config.json";
pub const DESIGN_FILE_NAME: &str = "de_design.tsv";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub gene_of_interest: String,
    pub output_dir: PathBuf,
    pub clinical: ClinicalConfig,
    pub subtype: SubtypeConfig,
    pub expression: ExpressionConfig,
    pub score_tables: Vec<ScoreTableConfig>,
    pub differential_expression: DifferentialExpressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalConfig {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub sample_id_column: String,
    pub er_column: String,
    pub pr_column: String,
    pub her2_column: String,
    pub id_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtypeConfig {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub patient_id_column: String,
    pub subtype_column: String,
    pub id_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub gene_column: String,
    /// Non-sample columns of the matrix besides the gene symbol.
    pub annotation_columns: Vec<String>,
    pub id_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTableConfig {
    pub path: PathBuf,
    pub skip_rows: usize,
    pub sample_id_column: String,
    pub id_suffix: String,
    pub score_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialExpressionConfig {
    /// Defaults to `de_design.tsv` inside the output directory.
    pub design_file: Option<PathBuf>,
    /// Result file produced offline by the DE engine; skipped when absent.
    pub results_file: Option<PathBuf>,
    pub padj_threshold: f64,
    pub min_abs_log2_fold_change: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gene_of_interest: "ESR1".to_string(),
            output_dir: PathBuf::from("./results"),
            clinical: ClinicalConfig::default(),
            subtype: SubtypeConfig::default(),
            expression: ExpressionConfig::default(),
            score_tables: Vec::new(),
            differential_expression: DifferentialExpressionConfig::default(),
        }
    }
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/brca_clinical.tsv"),
            skip_rows: 0,
            sample_id_column: "PATIENT_ID".to_string(),
            er_column: "ER_STATUS_BY_IHC".to_string(),
            pr_column: "PR_STATUS_BY_IHC".to_string(),
            her2_column: "IHC_HER2".to_string(),
            id_suffix: "-01A".to_string(),
        }
    }
}

impl Default for SubtypeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/brca_subtypes.tsv"),
            skip_rows: 4,
            patient_id_column: "PATIENT_ID".to_string(),
            subtype_column: "SUBTYPE".to_string(),
            id_suffix: "-01A".to_string(),
        }
    }
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/brca_mrna_zscores.tsv"),
            skip_rows: 0,
            gene_column: "Hugo_Symbol".to_string(),
            annotation_columns: vec!["Entrez_Gene_Id".to_string()],
            id_suffix: "A".to_string(),
        }
    }
}

impl Default for ScoreTableConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/brca_scores.tsv"),
            skip_rows: 0,
            sample_id_column: "Sample".to_string(),
            id_suffix: String::new(),
            score_columns: Vec::new(),
        }
    }
}

impl Default for DifferentialExpressionConfig {
    fn default() -> Self {
        Self {
            design_file: None,
            results_file: None,
            padj_threshold: 0.05,
            min_abs_log2_fold_change: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Load `cohort_config.json` from the project root, or defaults when it does not exist.
    pub fn load_default() -> Result<Self> {
        let path = project_root().join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            info!("No {} under {}, using defaults", CONFIG_FILE_NAME, project_root().display());
            Ok(Self::default().resolved())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        info!("Reading configuration from {}", path.display());
        let file = File::open(path)?;
        let config: PipelineConfig = serde_json::from_reader(file)?;
        Ok(config.resolved())
    }

    /// All relative paths made absolute against the project root.
    pub fn resolved(mut self) -> Self {
        self.output_dir = resolve_path(&self.output_dir);
        self.clinical.path = resolve_path(&self.clinical.path);
        self.subtype.path = resolve_path(&self.subtype.path);
        self.expression.path = resolve_path(&self.expression.path);
        for table in &mut self.score_tables {
            table.path = resolve_path(&table.path);
        }
        let de = &mut self.differential_expression;
        de.design_file = Some(match de.design_file.take() {
            Some(path) => resolve_path(&path),
            None => self.output_dir.join(DESIGN_FILE_NAME),
        });
        de.results_file = de.results_file.as_deref().map(resolve_path);
        self
    }

    pub fn design_file(&self) -> PathBuf {
        match &self.differential_expression.design_file {
            Some(path) => path.clone(),
            None => self.output_dir.join(DESIGN_FILE_NAME),
        }
    }

    pub fn write_effective(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(EFFECTIVE_CONFIG_FILE_NAME);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}
