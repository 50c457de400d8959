//! Feature encoding
//!
//! Turns [`SalaryRecord`]s into a dense feature matrix: the age column is
//! standardised and every categorical column is one-hot encoded against the
//! vocabulary seen while fitting. Unseen categories encode as all zeros.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ml_integration::dataset::{SalaryRecord, CATEGORICAL_COLUMNS};

/// Vocabulary of one categorical column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryVocabulary {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoryVocabulary {
    fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// Fitted feature encoder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureEncoder {
    pub age_mean: f64,
    pub age_std: f64,
    pub vocabularies: Vec<CategoryVocabulary>,
}

impl FeatureEncoder {
    /// Learn the age scaling and category vocabularies
    pub fn fit(records: &[SalaryRecord]) -> anyhow::Result<Self> {
        if records.is_empty() {
            anyhow::bail!("Cannot fit an encoder on zero records");
        }

        let n = records.len() as f64;
        let age_mean = records.iter().map(|r| r.idade).sum::<f64>() / n;
        let variance = records
            .iter()
            .map(|r| (r.idade - age_mean).powi(2))
            .sum::<f64>()
            / n;
        // constant column: keep the centred value at zero instead of dividing by zero
        let age_std = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        let vocabularies = CATEGORICAL_COLUMNS
            .iter()
            .map(|column| CategoryVocabulary {
                column: column.to_string(),
                categories: records
                    .iter()
                    .filter_map(|r| r.categorical(column))
                    .map(str::to_string)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
            })
            .collect();

        Ok(Self {
            age_mean,
            age_std,
            vocabularies,
        })
    }

    /// Width of the encoded feature vector
    pub fn n_features(&self) -> usize {
        1 + self
            .vocabularies
            .iter()
            .map(|v| v.categories.len())
            .sum::<usize>()
    }

    /// Encoded column names (`idade`, `genero=Feminino`, ...)
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["idade".to_string()];
        for vocabulary in &self.vocabularies {
            for category in &vocabulary.categories {
                names.push(format!("{}={}", vocabulary.column, category));
            }
        }
        names
    }

    pub fn transform(&self, records: &[SalaryRecord]) -> Array2<f64> {
        let mut matrix = Array2::<f64>::zeros((records.len(), self.n_features()));

        for (row, record) in records.iter().enumerate() {
            matrix[[row, 0]] = (record.idade - self.age_mean) / self.age_std;

            let mut offset = 1;
            for vocabulary in &self.vocabularies {
                if let Some(pos) = record
                    .categorical(&vocabulary.column)
                    .and_then(|value| vocabulary.position(value))
                {
                    matrix[[row, offset + pos]] = 1.0;
                }
                offset += vocabulary.categories.len();
            }
        }

        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(idade: f64, genero: &str, uf: &str) -> SalaryRecord {
        SalaryRecord {
            idade,
            genero: genero.to_string(),
            pcd: "Não".to_string(),
            uf_onde_mora: uf.to_string(),
            cargo_atual: "Analista de Dados".to_string(),
            nivel: "Pleno".to_string(),
            tempo_experiencia_dados: "de 1 a 2 anos".to_string(),
            tempo_experiencia_ti: "de 1 a 2 anos".to_string(),
        }
    }

    #[test]
    fn test_one_hot_layout() {
        let records = vec![record(20.0, "Masculino", "SP"), record(40.0, "Feminino", "RJ")];
        let encoder = FeatureEncoder::fit(&records).unwrap();

        // idade + genero(2) + pcd(1) + uf(2) + cargo(1) + nivel(1) + dados(1) + ti(1)
        assert_eq!(encoder.n_features(), 10);
        assert_eq!(encoder.feature_names()[1], "genero=Feminino");

        let x = encoder.transform(&records);
        assert_eq!(x.shape(), &[2, 10]);
        assert!((x[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((x[[1, 0]] - 1.0).abs() < 1e-12);
        // Masculino is the second genero category
        assert_eq!(x[[0, 1]], 0.0);
        assert_eq!(x[[0, 2]], 1.0);
    }

    #[test]
    fn test_unseen_category_encodes_as_zeros() {
        let encoder = FeatureEncoder::fit(&[record(30.0, "Masculino", "SP")]).unwrap();
        let x = encoder.transform(&[record(30.0, "Outro", "SP")]);
        // constant age column stays centred
        assert_eq!(x[[0, 0]], 0.0);
        assert_eq!(x[[0, 1]], 0.0);
    }
}
