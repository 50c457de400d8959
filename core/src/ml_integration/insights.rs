//! Chart figures and form options derived from template data
//!
//! Figures are emitted as Plotly JSON (`{"data": [...], "layout": {...}}`)
//! so the page can hand them straight to `Plotly.newPlot`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ml_integration::dataset::TemplateData;
use crate::ml_integration::predictor::{BandProbability, MAX_AGE};

/// Default value of the age input
pub const DEFAULT_AGE: i64 = 30;

/// Reference salary of one seniority level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalaryBand {
    pub level: &'static str,
    pub salary: f64,
    pub range: &'static str,
    pub color: &'static str,
}

/// Reference salaries shown next to a prediction
pub const SALARY_BANDS: [SalaryBand; 4] = [
    SalaryBand {
        level: "Júnior",
        salary: 6000.0,
        range: "R$ 3.000 - R$ 6.000",
        color: "#ff9999",
    },
    SalaryBand {
        level: "Pleno",
        salary: 12000.0,
        range: "R$ 6.000 - R$ 12.000",
        color: "#66b3ff",
    },
    SalaryBand {
        level: "Sênior",
        salary: 20000.0,
        range: "R$ 12.000 - R$ 20.000",
        color: "#99ff99",
    },
    SalaryBand {
        level: "Especialista",
        salary: 30000.0,
        range: "R$ 20.000+",
        color: "#ffcc99",
    },
];

/// Bar chart of the reference salary per seniority level
pub fn salary_context_figure() -> Value {
    json!({
        "data": [{
            "type": "bar",
            "x": SALARY_BANDS.iter().map(|b| b.level).collect::<Vec<_>>(),
            "y": SALARY_BANDS.iter().map(|b| b.salary).collect::<Vec<_>>(),
            "text": SALARY_BANDS.iter().map(|b| b.range).collect::<Vec<_>>(),
            "textposition": "inside",
            "marker": { "color": SALARY_BANDS.iter().map(|b| b.color).collect::<Vec<_>>() },
        }],
        "layout": {
            "title": { "text": "Contexto Salarial por Nível" },
            "xaxis": { "title": { "text": "Nível" } },
            "yaxis": { "title": { "text": "Salário (R$)" } },
            "showlegend": false,
            "height": 400,
        }
    })
}

/// Horizontal bar chart of the predicted probability per band, highest on top
pub fn probability_figure(probabilities: &[BandProbability]) -> Value {
    let mut sorted: Vec<&BandProbability> = probabilities.iter().collect();
    sorted.sort_by(|a, b| a.probability.total_cmp(&b.probability));

    json!({
        "data": [{
            "type": "bar",
            "orientation": "h",
            "x": sorted.iter().map(|p| p.probability * 100.0).collect::<Vec<_>>(),
            "y": sorted.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
            "text": sorted
                .iter()
                .map(|p| format!("{:.1}%", p.probability * 100.0))
                .collect::<Vec<_>>(),
            "textposition": "auto",
            "marker": { "color": "#66b3ff" },
        }],
        "layout": {
            "title": { "text": "Probabilidade por Faixa Salarial" },
            "xaxis": { "title": { "text": "Probabilidade (%)" }, "range": [0, 100] },
            "showlegend": false,
            "height": 400,
            "margin": { "l": 260 },
        }
    })
}

/// Choices offered by the prediction form
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormOptions {
    pub min_age: i64,
    pub max_age: i64,
    pub default_age: i64,
    pub genero: Vec<String>,
    pub pcd: Vec<String>,
    pub uf_onde_mora: Vec<String>,
    pub cargo_atual: Vec<String>,
    pub nivel: Vec<String>,
    pub tempo_experiencia_dados: Vec<String>,
    pub tempo_experiencia_ti: Vec<String>,
}

impl FormOptions {
    pub fn from_template(template: &TemplateData) -> Self {
        let min_age = template
            .min_age()
            .map(|age| age.floor() as i64)
            .unwrap_or(0)
            .min(MAX_AGE);
        Self {
            min_age,
            max_age: MAX_AGE,
            default_age: DEFAULT_AGE.clamp(min_age, MAX_AGE),
            genero: template.options("genero"),
            pcd: template.options("pcd"),
            uf_onde_mora: template.options("ufOndeMora"),
            cargo_atual: template.options("cargoAtual"),
            nivel: template.options("nivel"),
            tempo_experiencia_dados: template.options("tempoDeExperienciaDados"),
            tempo_experiencia_ti: template.options("tempoDeExperienciaEmTi"),
        }
    }

    /// Options of a form field keyed by its column name
    pub fn for_column(&self, column: &str) -> &[String] {
        match column {
            "genero" => &self.genero,
            "pcd" => &self.pcd,
            "ufOndeMora" => &self.uf_onde_mora,
            "cargoAtual" => &self.cargo_atual,
            "nivel" => &self.nivel,
            "tempoDeExperienciaDados" => &self.tempo_experiencia_dados,
            "tempoDeExperienciaEmTi" => &self.tempo_experiencia_ti,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_integration::dataset::SalaryRecord;

    fn record(idade: f64, uf: &str, cargo: &str) -> SalaryRecord {
        SalaryRecord {
            idade,
            genero: "Masculino".to_string(),
            pcd: "Não".to_string(),
            uf_onde_mora: uf.to_string(),
            cargo_atual: cargo.to_string(),
            nivel: "Pleno".to_string(),
            tempo_experiencia_dados: "de 1 a 2 anos".to_string(),
            tempo_experiencia_ti: "de 1 a 2 anos".to_string(),
        }
    }

    #[test]
    fn test_context_figure_layout() {
        let figure = salary_context_figure();
        let trace = &figure["data"][0];
        assert_eq!(trace["x"], json!(["Júnior", "Pleno", "Sênior", "Especialista"]));
        assert_eq!(trace["y"], json!([6000.0, 12000.0, 20000.0, 30000.0]));
        assert_eq!(trace["text"][3], "R$ 20.000+");
        assert_eq!(trace["marker"]["color"][1], "#66b3ff");
        assert_eq!(figure["layout"]["title"]["text"], "Contexto Salarial por Nível");
        assert_eq!(figure["layout"]["showlegend"], false);
        assert_eq!(figure["layout"]["height"], 400);
    }

    #[test]
    fn test_probability_figure_sorts_ascending() {
        let figure = probability_figure(&[
            BandProbability {
                label: "alta".to_string(),
                probability: 0.7,
            },
            BandProbability {
                label: "baixa".to_string(),
                probability: 0.3,
            },
        ]);
        // plotly draws the last horizontal bar on top
        assert_eq!(figure["data"][0]["y"], json!(["baixa", "alta"]));
        assert_eq!(figure["data"][0]["text"][1], "70.0%");
    }

    #[test]
    fn test_form_options_from_template() {
        let template = TemplateData {
            records: vec![
                record(35.0, "SP", "Analista de Dados"),
                record(22.0, "MG", "Cientista de Dados"),
                record(41.0, "SP", "Analista de Dados"),
            ],
        };
        let options = FormOptions::from_template(&template);
        assert_eq!(options.min_age, 22);
        assert_eq!(options.max_age, 100);
        assert_eq!(options.default_age, 30);
        assert_eq!(options.uf_onde_mora, vec!["MG", "SP"]);
        assert_eq!(options.for_column("cargoAtual").len(), 2);
        assert!(options.for_column("idade").is_empty());
    }

    #[test]
    fn test_form_options_skip_blank_values() {
        let template = TemplateData {
            records: vec![record(35.0, "SP", ""), record(40.0, "", "Analista de Dados")],
        };
        let options = FormOptions::from_template(&template);
        assert_eq!(options.uf_onde_mora, vec!["SP"]);
        assert_eq!(options.cargo_atual, vec!["Analista de Dados"]);
    }
}
