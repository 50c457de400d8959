//! Salary dataset loading
//!
//! Reads the survey CSV (training data) and the template CSV (form options and
//! sidebar statistics), and produces deterministic train/test splits.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Feature columns, in the order the encoder lays them out
pub const FEATURE_COLUMNS: [&str; 8] = [
    "idade",
    "genero",
    "pcd",
    "ufOndeMora",
    "cargoAtual",
    "nivel",
    "tempoDeExperienciaDados",
    "tempoDeExperienciaEmTi",
];

/// The single numeric feature
pub const NUMERIC_COLUMN: &str = "idade";

/// Categorical features, one-hot encoded
pub const CATEGORICAL_COLUMNS: [&str; 7] = [
    "genero",
    "pcd",
    "ufOndeMora",
    "cargoAtual",
    "nivel",
    "tempoDeExperienciaDados",
    "tempoDeExperienciaEmTi",
];

/// Dataset errors
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("Row {row}: invalid value '{value}' for column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Dataset has no usable rows")]
    Empty,

    #[error("Cannot split {rows} rows with test_size {test_size}")]
    InvalidSplit { rows: usize, test_size: f64 },
}

/// One row of features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRecord {
    pub idade: f64,
    pub genero: String,
    pub pcd: String,
    #[serde(rename = "ufOndeMora")]
    pub uf_onde_mora: String,
    #[serde(rename = "cargoAtual")]
    pub cargo_atual: String,
    pub nivel: String,
    #[serde(rename = "tempoDeExperienciaDados")]
    pub tempo_experiencia_dados: String,
    #[serde(rename = "tempoDeExperienciaEmTi")]
    pub tempo_experiencia_ti: String,
}

impl SalaryRecord {
    /// Value of a categorical column, `None` for unknown or numeric columns
    pub fn categorical(&self, column: &str) -> Option<&str> {
        let value = match column {
            "genero" => &self.genero,
            "pcd" => &self.pcd,
            "ufOndeMora" => &self.uf_onde_mora,
            "cargoAtual" => &self.cargo_atual,
            "nivel" => &self.nivel,
            "tempoDeExperienciaDados" => &self.tempo_experiencia_dados,
            "tempoDeExperienciaEmTi" => &self.tempo_experiencia_ti,
            _ => return None,
        };
        Some(value.as_str())
    }

    fn from_row(
        row: usize,
        record: &csv::StringRecord,
        columns: &HashMap<&'static str, usize>,
    ) -> Result<Self, DatasetError> {
        let field = |name: &str| -> String {
            columns
                .get(name)
                .and_then(|&idx| record.get(idx))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let raw_age = field(NUMERIC_COLUMN);
        let idade = raw_age
            .parse::<f64>()
            .ok()
            .filter(|age| age.is_finite() && *age >= 0.0)
            .ok_or_else(|| DatasetError::InvalidValue {
                row,
                column: NUMERIC_COLUMN.to_string(),
                value: raw_age.clone(),
            })?;

        Ok(Self {
            idade,
            genero: field("genero"),
            pcd: field("pcd"),
            uf_onde_mora: field("ufOndeMora"),
            cargo_atual: field("cargoAtual"),
            nivel: field("nivel"),
            tempo_experiencia_dados: field("tempoDeExperienciaDados"),
            tempo_experiencia_ti: field("tempoDeExperienciaEmTi"),
        })
    }
}

/// Records with their salary-band labels
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub records: Vec<SalaryRecord>,
    pub labels: Vec<String>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct labels
    pub fn classes(&self) -> Vec<String> {
        self.labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Subset by row indices, keeping index order
    pub fn select(&self, indices: &[usize]) -> LabeledDataset {
        LabeledDataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }
}

/// Template rows backing the prediction form
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    pub records: Vec<SalaryRecord>,
}

/// Sidebar statistics of the template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSummary {
    pub total_records: usize,
    pub unique_job_titles: usize,
    pub unique_states: usize,
}

impl TemplateData {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            total_records: self.records.len(),
            unique_job_titles: self.options("cargoAtual").len(),
            unique_states: self.options("ufOndeMora").len(),
        }
    }

    /// Sorted distinct non-blank values of a categorical column
    pub fn options(&self, column: &str) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.categorical(column))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Smallest age in the template
    pub fn min_age(&self) -> Option<f64> {
        self.records
            .iter()
            .map(|r| r.idade)
            .fold(None, |acc: Option<f64>, age| {
                Some(acc.map_or(age, |m| m.min(age)))
            })
    }

    /// Rows sharing seniority and state
    pub fn similar_profiles(&self, nivel: &str, uf: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.nivel == nivel && r.uf_onde_mora == uf)
            .count()
    }

    /// Percentage of rows holding the given job title
    pub fn job_title_share(&self, cargo: &str) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let count = self.records.iter().filter(|r| r.cargo_atual == cargo).count();
        count as f64 / self.records.len() as f64 * 100.0
    }
}

fn open(path: &Path) -> Result<File, DatasetError> {
    File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn header_index(
    headers: &csv::StringRecord,
) -> Result<HashMap<&'static str, usize>, DatasetError> {
    let mut columns = HashMap::new();
    for name in FEATURE_COLUMNS {
        let idx = headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
        columns.insert(name, idx);
    }
    Ok(columns)
}

/// Load the labeled training dataset from a CSV file
pub fn load_dataset(path: &Path, label_column: &str) -> Result<LabeledDataset, DatasetError> {
    info!("Loading dataset from {}", path.display());
    let dataset = read_dataset(open(path)?, label_column)?;
    info!(
        "Loaded {} labeled rows with {} classes",
        dataset.len(),
        dataset.classes().len()
    );
    Ok(dataset)
}

/// Parse a labeled dataset from any CSV source
pub fn read_dataset<R: Read>(reader: R, label_column: &str) -> Result<LabeledDataset, DatasetError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = header_index(&headers)?;
    let label_idx = headers
        .iter()
        .position(|h| h.trim() == label_column)
        .ok_or_else(|| DatasetError::MissingColumn(label_column.to_string()))?;

    let mut records = Vec::new();
    let mut labels = Vec::new();
    let mut skipped = 0usize;

    for (idx, row) in reader.records().enumerate() {
        let row = row?;
        let label = row.get(label_idx).map(str::trim).unwrap_or_default();
        if label.is_empty() {
            skipped += 1;
            continue;
        }
        // header is line 1
        records.push(SalaryRecord::from_row(idx + 2, &row, &columns)?);
        labels.push(label.to_string());
    }

    if skipped > 0 {
        warn!("Skipped {} rows without a label", skipped);
    }
    if records.is_empty() {
        return Err(DatasetError::Empty);
    }

    Ok(LabeledDataset { records, labels })
}

/// Load the template CSV; the label column is optional here
pub fn load_template(path: &Path) -> Result<TemplateData, DatasetError> {
    debug!("Loading template from {}", path.display());
    read_template(open(path)?)
}

/// Parse template rows from any CSV source
pub fn read_template<R: Read>(reader: R) -> Result<TemplateData, DatasetError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = header_index(&headers)?;

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        records.push(SalaryRecord::from_row(idx + 2, &row?, &columns)?);
    }

    if records.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(TemplateData { records })
}

/// Shuffle `0..rows` with a seeded RNG and cut it into (train, test) indices
pub fn train_test_split(
    rows: usize,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), DatasetError> {
    if rows < 2 || !(test_size > 0.0 && test_size < 1.0) {
        return Err(DatasetError::InvalidSplit { rows, test_size });
    }

    let n_test = ((rows as f64) * test_size).round() as usize;
    let n_test = n_test.clamp(1, rows - 1);

    let mut indices: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    debug!("Split {} rows into {} train / {} test", rows, train.len(), indices.len());
    Ok((train, indices))
}
