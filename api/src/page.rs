//! HTML rendering of the prediction page

use std::fmt::Write;

use salario_core::ml_integration::{
    salary_context_figure, FormOptions, PredictionRequest, PredictionResponse, TemplateSummary,
};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Result area of the page
pub enum Outcome<'a> {
    Prediction(&'a PredictionResponse),
    Failure(String),
}

/// Everything the page needs once model and template loaded
pub struct PageView<'a> {
    pub model_version: u32,
    pub today: String,
    pub stats: &'a TemplateSummary,
    pub options: &'a FormOptions,
    pub submitted: Option<&'a PredictionRequest>,
    pub outcome: Option<Outcome<'a>>,
    pub show_chart: bool,
}

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn head(out: &mut String) {
    out.push_str(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Previsão Salarial - Área de Dados</title>\n",
    );
    let _ = writeln!(out, "<script src=\"{}\"></script>", PLOTLY_CDN);
    out.push_str(
        "<style>\n\
         body{font-family:sans-serif;margin:0;display:flex;min-height:100vh}\n\
         aside{width:260px;background:#f0f2f6;padding:1rem}\n\
         main{flex:1;padding:1rem 2rem}\n\
         .columns{display:flex;gap:2rem}.columns>div{flex:1}\n\
         label{display:block;margin-top:.75rem}select,input{width:100%}\n\
         .info{background:#e8f0fe;padding:.5rem;margin:.5rem 0}\n\
         .success{background:#e6f4ea;padding:1rem}.warning{background:#fef7e0;padding:1rem}\n\
         .error{background:#fce8e6;padding:1rem}.metric{font-size:1.5rem;font-weight:bold}\n\
         footer{text-align:center;color:#666;padding:1rem}\n\
         </style>\n</head>\n<body>\n",
    );
}

fn header(out: &mut String) {
    out.push_str(
        "<div style=\"text-align:center;padding:2rem 0;\">\n\
         <h1>💰 Preditor de Salário - Área de Dados</h1>\n\
         <p>Descubra sua faixa salarial baseada no mercado atual de dados</p>\n</div>\n",
    );
}

fn footer(out: &mut String) {
    out.push_str(
        "<hr>\n<footer><p>💡 Desenvolvido com Rust, axum e linfa | \
         📊 Dados baseados no mercado brasileiro de tecnologia</p></footer>\n",
    );
}

fn sidebar(out: &mut String, view: &PageView) {
    let _ = write!(
        out,
        "<aside>\n<h3>📊 Informações do Modelo</h3>\n\
         <div class=\"info\"><b>Versão:</b> {}</div>\n\
         <div class=\"info\"><b>Última atualização:</b> {}</div>\n\
         <h3>📈 Estatísticas dos Dados</h3>\n\
         <p>Total de Registros<br><span class=\"metric\">{}</span></p>\n\
         <p>Cargos Únicos<br><span class=\"metric\">{}</span></p>\n\
         <p>UFs Representadas<br><span class=\"metric\">{}</span></p>\n</aside>\n",
        view.model_version,
        escape(&view.today),
        view.stats.total_records,
        view.stats.unique_job_titles,
        view.stats.unique_states,
    );
}

fn select(out: &mut String, view: &PageView, column: &str, label: &str, help: &str) {
    let chosen = view.submitted.and_then(|r| r.text(column));
    let _ = writeln!(
        out,
        "<label for=\"{0}\" title=\"{1}\">{2}</label>\n<select id=\"{0}\" name=\"{0}\" required>",
        column,
        escape(help),
        escape(label)
    );
    for option in view.options.for_column(column) {
        let selected = if chosen.as_deref() == Some(option.as_str()) {
            " selected"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "<option value=\"{0}\"{1}>{0}</option>",
            escape(option),
            selected
        );
    }
    out.push_str("</select>\n");
}

fn form(out: &mut String, view: &PageView) {
    let options = view.options;
    let age = view
        .submitted
        .and_then(|r| r.text("idade"))
        .unwrap_or_else(|| options.default_age.to_string());
    let show_chart = if view.show_chart { " checked" } else { "" };

    out.push_str("<form method=\"post\" action=\"/predict\">\n<h2>👤 Seus Dados Profissionais</h2>\n");
    out.push_str("<div class=\"columns\">\n<div>\n<h3>📋 Informações Pessoais</h3>\n");
    let _ = writeln!(
        out,
        "<label for=\"idade\" title=\"Sua idade atual\">Idade</label>\n\
         <input id=\"idade\" name=\"idade\" type=\"number\" min=\"{}\" max=\"{}\" step=\"1\" value=\"{}\" required>",
        options.min_age,
        options.max_age,
        escape(&age)
    );
    select(out, view, "genero", "Gênero", "Seu gênero");
    select(
        out,
        view,
        "pcd",
        "Pessoa com Deficiência (PcD)",
        "Você é uma pessoa com deficiência?",
    );
    select(out, view, "ufOndeMora", "Estado (UF)", "Estado onde você mora/trabalha");
    out.push_str("</div>\n<div>\n<h3>💼 Informações Profissionais</h3>\n");
    select(out, view, "cargoAtual", "Cargo Atual", "Seu cargo/função atual");
    select(out, view, "nivel", "Nível", "Seu nível de senioridade");
    out.push_str("</div>\n<div>\n<h3>⏱️ Experiência</h3>\n");
    select(
        out,
        view,
        "tempoDeExperienciaDados",
        "Tempo de Experiência em Dados",
        "Há quanto tempo trabalha com dados?",
    );
    select(
        out,
        view,
        "tempoDeExperienciaEmTi",
        "Tempo de Experiência em TI",
        "Há quanto tempo trabalha com TI em geral?",
    );
    out.push_str("</div>\n</div>\n");
    let _ = writeln!(
        out,
        "<label><input type=\"checkbox\" name=\"show_chart\" style=\"width:auto\"{}> \
         📊 Mostrar contexto visual</label>\n\
         <p><button type=\"submit\" style=\"width:100%\">🎯 Previsão Salarial</button></p>\n</form>",
        show_chart
    );
}

fn prediction(out: &mut String, response: &PredictionResponse, show_chart: bool) {
    let _ = write!(
        out,
        "<hr>\n<h2>🎯 Estimativa Salarial</h2>\n<div class=\"columns\">\n<div style=\"flex:2\">\n\
         <div class=\"success\"><h3>💰 Sua faixa salarial estimada: <code>{}</code></h3></div>\n\
         <p><b>📊 Esta predição foi baseada em:</b></p>\n<ul>\n\
         <li>Dados do mercado brasileiro de tecnologia</li>\n\
         <li>Seu perfil profissional informado</li>\n\
         <li>Análise de salários por região e senioridade</li>\n</ul>\n\
         <div class=\"warning\">⚠️ <b>Importante:</b> Esta é uma estimativa baseada em dados históricos. \
         Salários podem variar significativamente baseado em:\n<ul>\n\
         <li>Empresa e setor</li>\n<li>Benefícios oferecidos</li>\n\
         <li>Negociação individual</li>\n<li>Conjuntura econômica atual</li>\n</ul></div>\n\
         </div>\n<div>\n<h3>📈 Informações Adicionais</h3>\n\
         <p title=\"Quantidade de profissionais com perfil similar nos dados\">Perfis Similares na Base<br>\
         <span class=\"metric\">{}</span></p>\n\
         <p title=\"Percentual deste cargo na base de dados\">Representatividade do Cargo<br>\
         <span class=\"metric\">{:.1}%</span></p>\n</div>\n</div>\n",
        escape(&response.salary_band),
        response.similar_profiles,
        response.job_title_share,
    );

    if show_chart {
        // serde_json output is valid JS; `</` is split so it cannot close the script tag
        let figure = salary_context_figure().to_string().replace("</", "<\\/");
        let _ = writeln!(
            out,
            "<div id=\"context-chart\"></div>\n<script>\n\
             const figure = {};\n\
             Plotly.newPlot(\"context-chart\", figure.data, figure.layout, {{responsive: true}});\n\
             </script>",
            figure
        );
    }
}

/// Full page with sidebar, form and optional result
pub fn render_page(view: &PageView) -> String {
    let mut out = String::with_capacity(16 * 1024);
    head(&mut out);
    sidebar(&mut out, view);
    out.push_str("<main>\n");
    header(&mut out);
    form(&mut out, view);
    match &view.outcome {
        Some(Outcome::Prediction(response)) => prediction(&mut out, response, view.show_chart),
        Some(Outcome::Failure(message)) => {
            let _ = writeln!(
                out,
                "<div class=\"error\">❌ Erro na predição: {}</div>",
                escape(message)
            );
        }
        None => {}
    }
    footer(&mut out);
    out.push_str("</main>\n</body>\n</html>\n");
    out
}

/// Page shown instead of the form when model or template cannot be loaded
pub fn render_error_page(message: &str, hint: &str) -> String {
    let mut out = String::with_capacity(4 * 1024);
    head(&mut out);
    out.push_str("<main>\n");
    header(&mut out);
    let _ = writeln!(
        out,
        "<div class=\"error\">❌ {}</div>\n<div class=\"info\">💡 {}</div>",
        escape(message),
        escape(hint)
    );
    footer(&mut out);
    out.push_str("</main>\n</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use salario_core::ml_integration::{BandProbability, ModelType};

    fn options() -> FormOptions {
        FormOptions {
            min_age: 18,
            max_age: 100,
            default_age: 30,
            genero: vec!["Feminino".to_string(), "Masculino".to_string()],
            nivel: vec!["Júnior".to_string(), "Pleno".to_string()],
            ..FormOptions::default()
        }
    }

    fn stats() -> TemplateSummary {
        TemplateSummary {
            total_records: 120,
            unique_job_titles: 7,
            unique_states: 12,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<a href=\"x\">R&D's</a>"),
            "&lt;a href=&quot;x&quot;&gt;R&amp;D&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_form_page_lists_options_and_stats() {
        let (options, stats) = (options(), stats());
        let html = render_page(&PageView {
            model_version: 3,
            today: "19/10/2026".to_string(),
            stats: &stats,
            options: &options,
            submitted: None,
            outcome: None,
            show_chart: false,
        });
        assert!(html.contains("<b>Versão:</b> 3"));
        assert!(html.contains("19/10/2026"));
        assert!(html.contains(">120<"));
        assert!(html.contains("<option value=\"Pleno\">Pleno</option>"));
        assert!(html.contains("min=\"18\" max=\"100\" step=\"1\" value=\"30\""));
        assert!(!html.contains("Estimativa Salarial"));
    }

    #[test]
    fn test_result_page_keeps_selection_and_draws_chart() {
        let (options, stats) = (options(), stats());
        let request = PredictionRequest::from_pairs([("nivel", "Pleno"), ("idade", "41")]);
        let response = PredictionResponse {
            raw_label: "Faixa 4 - de R$ 6.001/mês a R$ 8.000/mês".to_string(),
            salary_band: "de R$ 6.001/mês a R$ 8.000/mês".to_string(),
            model_name: "salario-model".to_string(),
            model_version: 3,
            model_type: ModelType::DecisionTree,
            probabilities: vec![BandProbability {
                label: "Faixa 4 - de R$ 6.001/mês a R$ 8.000/mês".to_string(),
                probability: 1.0,
            }],
            similar_profiles: 9,
            job_title_share: 12.5,
        };
        let html = render_page(&PageView {
            model_version: 3,
            today: "19/10/2026".to_string(),
            stats: &stats,
            options: &options,
            submitted: Some(&request),
            outcome: Some(Outcome::Prediction(&response)),
            show_chart: true,
        });
        assert!(html.contains("<code>de R$ 6.001/mês a R$ 8.000/mês</code>"));
        assert!(html.contains("<option value=\"Pleno\" selected>"));
        assert!(html.contains("value=\"41\""));
        assert!(html.contains("12.5%"));
        assert!(html.contains("Plotly.newPlot"));
        assert!(html.contains("Contexto Salarial por Nível"));
    }

    #[test]
    fn test_error_page_shows_hint() {
        let html = render_error_page("Modelo 'salario-model' não encontrado", "Treine em <mlruns>");
        assert!(html.contains("não encontrado"));
        assert!(html.contains("Treine em &lt;mlruns&gt;"));
        assert!(!html.contains("<form"));
    }
}
