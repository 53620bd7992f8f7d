//! Text renderings of a sample sequence for the terminal and for files.

use anyhow::Result;
use clap::ValueEnum;
use serde::Deserialize;

use physim_core::{SamplePoint, SampleSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

/// Union of the fields of `points`, in first-seen order.
fn columns(points: &[&SamplePoint]) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for point in points {
        for key in point.keys() {
            if !cols.iter().any(|c| c == key) {
                cols.push(key.to_string());
            }
        }
    }
    cols
}

pub fn render(samples: &SampleSequence, format: OutputFormat, every: usize) -> Result<String> {
    let points = samples.decimate(every);
    Ok(match format {
        OutputFormat::Table => render_table(&points),
        OutputFormat::Csv => render_csv(&points),
        OutputFormat::Json => serde_json::to_string_pretty(&points)?,
    })
}

fn render_table(points: &[&SamplePoint]) -> String {
    let cols = columns(points);
    let mut out = String::new();
    for col in &cols {
        out.push_str(&format!("{col:>12}"));
    }
    out.push('\n');
    out.push_str(&"-".repeat(12 * cols.len()));
    out.push('\n');
    for point in points {
        for col in &cols {
            match point.get(col) {
                Some(v) => out.push_str(&format!("{v:>12.4}")),
                None => out.push_str(&format!("{:>12}", "-")),
            }
        }
        out.push('\n');
    }
    out
}

fn render_csv(points: &[&SamplePoint]) -> String {
    let cols = columns(points);
    let mut out = cols.join(",");
    out.push('\n');
    for point in points {
        let row: Vec<String> = cols
            .iter()
            .map(|c| point.get(c).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use physim_core::{validate, ScriptValue};
    use serde_json::json;

    fn samples() -> SampleSequence {
        validate(ScriptValue::from(json!([
            {"t": 0, "x": 0, "y": 0, "vx": 1.5},
            {"t": 1, "x": 1, "y": 0.5},
            {"t": 2, "x": 2, "y": 0.25, "energy": 3},
            {"t": 3, "x": 3, "y": 0}
        ])))
        .unwrap()
    }

    #[test]
    fn test_decimated_csv() {
        let csv = render(&samples(), OutputFormat::Csv, 2).unwrap();
        let ts: Vec<&str> = csv.lines().skip(1).map(|l| &l[..1]).collect();
        assert_eq!(ts, vec!["0", "2", "3"]);
    }

    #[test]
    fn test_csv_leaves_missing_fields_blank() {
        let csv = render(&samples(), OutputFormat::Csv, 1).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "t,x,y,vx,energy");
        assert_eq!(lines[1], "0,0,0,1.5,");
        assert_eq!(lines[3], "2,2,0.25,,3");
    }

    #[test]
    fn test_table_has_header_and_rows() {
        let table = render(&samples(), OutputFormat::Table, 1).unwrap();
        assert_eq!(table.lines().count(), 6);
        assert!(table.lines().next().unwrap().trim_start().starts_with('t'));
        assert!(table.contains("1.5000"));
    }

    #[test]
    fn test_json_is_array_of_points() {
        let text = render(&samples(), OutputFormat::Json, 3).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[0]["vx"], json!(1.5));
    }
}
