//! Markdown rendering of a run record collection.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::RecordError;
use crate::persistence::atomic_write;

/// Render an array of objects as a Markdown table.
///
/// Headers are the keys of the first object, in file order. Missing cells
/// are left empty.
pub fn render_table(records: &[Map<String, Value>]) -> Option<String> {
    let headers: Vec<&String> = records.first()?.keys().collect();

    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(format!(
        "| {} |",
        headers.iter().map(|h| h.as_str()).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("| {} |", vec!["---"; headers.len()].join(" | ")));
    for record in records {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| record.get(h.as_str()).map(cell_text).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    Some(lines.join("\n"))
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    text.replace('|', "\\|").replace('\n', " ")
}

/// Read a collection from `json_path` and write its table next to it as `.md`.
pub fn write_markdown_report(json_path: &Path) -> Result<PathBuf, RecordError> {
    let read_err = |message: String| RecordError::Read {
        path: json_path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(json_path).map_err(|e| read_err(e.to_string()))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| read_err(e.to_string()))?;
    let Value::Array(rows) = value else {
        return Err(read_err("expected a JSON array of objects".to_string()));
    };

    let records = rows
        .into_iter()
        .map(|row| match row {
            Value::Object(map) => Ok(map),
            _ => Err(read_err("expected a JSON array of objects".to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let table = render_table(&records).ok_or_else(|| read_err("collection is empty".to_string()))?;

    let md_path = json_path.with_extension("md");
    atomic_write(&md_path, table.as_bytes()).map_err(|source| RecordError::Write {
        path: md_path.clone(),
        source,
    })?;
    tracing::info!(path = %md_path.display(), rows = records.len(), "Markdown table written");
    Ok(md_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn objects(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_render_table() {
        let records = objects(json!([
            {"prompt_version": "2_1", "tp": 3, "precision": 0.75},
            {"prompt_version": "3_0", "tp": 5}
        ]));
        assert_eq!(
            render_table(&records).unwrap(),
            "| prompt_version | tp | precision |\n| --- | --- | --- |\n| 2_1 | 3 | 0.75 |\n| 3_0 | 5 |  |"
        );
    }

    #[test]
    fn test_render_escapes_pipes() {
        let records = objects(json!([{"prompt_description": "a | b\nc"}]));
        assert!(render_table(&records).unwrap().ends_with("| a \\| b c |"));
    }

    #[test]
    fn test_render_empty() {
        assert!(render_table(&[]).is_none());
    }

    #[test]
    fn test_write_report_next_to_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats_50.json");
        std::fs::write(&path, r#"[{"tp": 1, "fp": 2}]"#).unwrap();

        let md = write_markdown_report(&path).unwrap();
        assert_eq!(md, dir.path().join("stats_50.md"));
        assert_eq!(
            std::fs::read_to_string(md).unwrap(),
            "| tp | fp |\n| --- | --- |\n| 1 | 2 |"
        );
    }

    #[test]
    fn test_write_report_rejects_bad_shapes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stats.json");
        for body in [r#"{"tp": 1}"#, "[1, 2]", "[]", "not json"] {
            std::fs::write(&path, body).unwrap();
            assert!(
                matches!(write_markdown_report(&path), Err(RecordError::Read { .. })),
                "accepted {}",
                body
            );
        }
    }
}
