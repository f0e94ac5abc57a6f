//! HTML pages rendered with askama
//!
//! Templates live in the crate's `templates/` directory and are compiled into
//! the binary. Every interpolated value is HTML-escaped.

use crate::features::FEATURE_NAMES;
use crate::pipeline::PredictionSuccess;
use crate::store::StoredPrediction;
use askama::Template;

/// One input of the prediction form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub label: String,
    pub step: &'static str,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    fields: &'a [FormField],
    show_history_link: bool,
}

#[derive(Template)]
#[template(path = "result.html")]
struct ResultTemplate<'a> {
    prediction: String,
    warning: Option<&'a str>,
}

/// Row of the history table
struct PredictionRow<'a> {
    id: i64,
    input_data: &'a str,
    prediction: String,
}

#[derive(Template)]
#[template(path = "predictions.html")]
struct PredictionsTemplate<'a> {
    rows: Vec<PredictionRow<'a>>,
}

/// Form inputs in model column order
///
/// `sex` is an integer code; every other column accepts decimals.
pub fn form_fields() -> Vec<FormField> {
    FEATURE_NAMES
        .iter()
        .map(|&name| FormField {
            name,
            label: field_label(name),
            step: if name == "sex" { "1" } else { "any" },
        })
        .collect()
}

/// "shucked_weight" -> "Shucked weight"
fn field_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Prediction as shown to the user, at full precision
///
/// `11.0` renders as "11.0"; other values use the shortest text that reads
/// back as the same `f64`.
pub fn format_prediction(prediction: f64) -> String {
    format!("{:?}", prediction)
}

/// Renders the input form
///
/// The link to the history page is only shown when persistence is enabled.
pub fn render_index(show_history_link: bool) -> Result<String, askama::Error> {
    let fields = form_fields();
    IndexTemplate {
        fields: &fields,
        show_history_link,
    }
    .render()
}

/// Renders the result page for a successful prediction
pub fn render_result(success: &PredictionSuccess) -> Result<String, askama::Error> {
    ResultTemplate {
        prediction: format_prediction(success.prediction),
        warning: success.warning.as_deref(),
    }
    .render()
}

/// Renders the table of stored predictions
pub fn render_predictions(predictions: &[StoredPrediction]) -> Result<String, askama::Error> {
    let rows = predictions
        .iter()
        .map(|stored| PredictionRow {
            id: stored.id,
            input_data: &stored.input_data,
            prediction: format_prediction(stored.prediction),
        })
        .collect();
    PredictionsTemplate { rows }.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_has_one_input_per_column() {
        let html = render_index(false).unwrap();
        for name in FEATURE_NAMES {
            assert!(
                html.contains(&format!("name=\"{}\"", name)),
                "missing input {}",
                name
            );
        }
        assert!(html.contains("action=\"/predict\""));
        assert!(!html.contains("/view-predictions"));

        let html = render_index(true).unwrap();
        assert!(html.contains("/view-predictions"));
    }

    #[test]
    fn test_field_labels() {
        let fields = form_fields();
        assert_eq!(fields.len(), FEATURE_NAMES.len());
        assert_eq!(fields[0].label, "Sex");
        assert_eq!(fields[0].step, "1");
        assert_eq!(fields[5].label, "Shucked weight");
        assert_eq!(fields[5].step, "any");
    }

    #[test]
    fn test_result_shows_prediction_and_warning() {
        let html = render_result(&PredictionSuccess {
            prediction: 11.0,
            stored_id: Some(1),
            warning: None,
        })
        .unwrap();
        assert!(html.contains("<strong id=\"prediction\">11.0</strong>"));
        assert!(!html.contains("class=\"warning\""));

        let html = render_result(&PredictionSuccess {
            prediction: 8.849999,
            stored_id: None,
            warning: Some("prediction was not saved: <disk full>".to_string()),
        })
        .unwrap();
        // not rounded
        assert!(html.contains("<strong id=\"prediction\">8.849999</strong>"));
        assert!(html.contains("class=\"warning\""));
        assert!(html.contains("&lt;disk full&gt;"));
    }

    #[test]
    fn test_format_prediction_keeps_full_precision() {
        assert_eq!(format_prediction(11.0), "11.0");
        assert_eq!(format_prediction(8.849999), "8.849999");
        assert_eq!(format_prediction(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_predictions_table() {
        let html = render_predictions(&[]).unwrap();
        assert!(html.contains("No predictions stored yet."));

        let html = render_predictions(&[
            StoredPrediction {
                id: 1,
                input_data: r#"{"sex":1}"#.to_string(),
                prediction: 11.0,
            },
            StoredPrediction {
                id: 2,
                input_data: r#"{"sex":0}"#.to_string(),
                prediction: 10.999999999999998,
            },
        ])
        .unwrap();
        assert!(html.contains("<td>1</td>"));
        assert!(html.contains("<td>2</td>"));
        assert!(html.contains("<td>11.0</td>"));
        assert!(html.contains("<td>10.999999999999998</td>"));
        assert!(!html.contains("No predictions stored yet."));
        let first = html.find("<td>1</td>").unwrap();
        let second = html.find("<td>2</td>").unwrap();
        assert!(first < second);
    }
}
