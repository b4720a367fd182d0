//! Deterministic chart renderer.
//!
//! Parses the runner's tuple text back into rows and emits a
//! plotly-compatible figure document (`{"data":[..],"layout":{..}}`) for
//! the planned chart type. Rendering failures are chart faults; the
//! coordinator suppresses them and ships the answer without a chart.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capabilities::{CapabilityError, ChartRenderer};
use crate::state::ChartType;

#[derive(Debug, Clone, Default)]
pub struct ChartSpecRenderer;

impl ChartSpecRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChartRenderer for ChartSpecRenderer {
    async fn render(
        &self,
        result: &str,
        chart_type: ChartType,
        title: &str,
    ) -> Result<String, CapabilityError> {
        let rows = parse_rows(result).ok_or_else(|| {
            CapabilityError::Malformed(format!("result is not tabular tuple text: {result}"))
        })?;
        if rows.len() < 2 {
            return Err(CapabilityError::Malformed(
                "not enough rows to chart".to_string(),
            ));
        }

        let mut labels = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let y = row
                .iter()
                .rev()
                .find_map(|field| match field {
                    Field::Number(n) => Some(*n),
                    Field::Text(_) => None,
                })
                .ok_or_else(|| {
                    CapabilityError::Malformed(format!("row {index} has no numeric value"))
                })?;
            values.push(json!(y));
            labels.push(label_for(row, y, index));
        }

        let trace = match chart_type {
            ChartType::Bar => json!({ "type": "bar", "x": labels, "y": values }),
            ChartType::Line => {
                json!({ "type": "scatter", "mode": "lines", "x": labels, "y": values })
            }
            ChartType::Scatter => {
                json!({ "type": "scatter", "mode": "markers", "x": labels, "y": values })
            }
            ChartType::Pie => json!({ "type": "pie", "labels": labels, "values": values }),
        };
        let figure = json!({
            "data": [trace],
            "layout": { "title": title },
        });

        serde_json::to_string(&figure)
            .map_err(|e| CapabilityError::Malformed(format!("figure serialization failed: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Field {
    Text(String),
    Number(f64),
}

/// Label for a row: its first field, unless the row is a bare numeric
/// 1-tuple, in which case the row index stands in.
fn label_for(row: &[Field], y: f64, index: usize) -> Value {
    match row.first() {
        Some(Field::Text(text)) => json!(text),
        Some(Field::Number(n)) if row.len() > 1 || *n != y => json!(n),
        _ => json!(index),
    }
}

/// Parse `[('a', 1), ('b', 2.5)]` tuple text. Returns `None` when the text
/// is not a list of tuples. A trailing `...` truncation marker is ignored.
fn parse_rows(text: &str) -> Option<Vec<Vec<Field>>> {
    let body = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    let chars: Vec<char> = body.chars().collect();
    let mut rows = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '(' {
            let (row, next) = parse_tuple(&chars, i + 1)?;
            rows.push(row);
            i = next;
        } else {
            i += 1;
        }
    }
    Some(rows)
}

fn parse_tuple(chars: &[char], mut i: usize) -> Option<(Vec<Field>, usize)> {
    let mut fields = Vec::new();
    loop {
        while i < chars.len() && (chars[i] == ',' || chars[i].is_whitespace()) {
            i += 1;
        }
        match chars.get(i)? {
            ')' => return Some((fields, i + 1)),
            '\'' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '\'' {
                    i += 1;
                }
                if i >= chars.len() {
                    return None;
                }
                fields.push(Field::Text(chars[start..i].iter().collect()));
                i += 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && chars[i] != ',' && chars[i] != ')' {
                    i += 1;
                }
                let token: String = chars[start..i].iter().collect::<String>().trim().to_string();
                if token.is_empty() {
                    return None;
                }
                match token.parse::<f64>() {
                    Ok(n) => fields.push(Field::Number(n)),
                    Err(_) => fields.push(Field::Text(token)),
                }
            }
        }
    }
}
