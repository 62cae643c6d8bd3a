//! write_to_csv: render structured rows to a CSV file in the data
//! directory and register it as a downloadable artifact.
//!
//! Rows arrive either as objects (column = key) or as arrays (column =
//! position); the two shapes cannot be mixed in one call.

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use super::args;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::artifacts::ArtifactStore;
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

pub struct WriteToCsv {
    sessions: Arc<SessionManager>,
    artifacts: Arc<ArtifactStore>,
    artifact_base_url: String,
    descriptor: SkillDescriptor,
}

impl WriteToCsv {
    pub fn new(
        sessions: Arc<SessionManager>,
        artifacts: Arc<ArtifactStore>,
        artifact_base_url: String,
    ) -> Self {
        let descriptor = SkillDescriptor {
            name: "write_to_csv",
            description:
                "Write structured data to CSV files with support for custom headers and file paths",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new(
                        "data",
                        ParamKind::Array,
                        "Rows to write: an array of objects (column per key) or an array of arrays (column per position)",
                    ),
                    ParamField::new(
                        "filename",
                        ParamKind::String,
                        "Name of the CSV file (without path, saved to the configured data directory)",
                    ),
                    ParamField::new(
                        "headers",
                        ParamKind::Array,
                        "Custom column headers (optional; object keys or column positions are used if not provided)",
                    ),
                    ParamField::new(
                        "include_headers",
                        ParamKind::Boolean,
                        "Whether to include headers in the CSV output",
                    )
                    .with_default(json!(true)),
                ],
                vec!["data", "filename"],
            ),
        };
        Self {
            sessions,
            artifacts,
            artifact_base_url,
            descriptor,
        }
    }
}

/// Rows in one of the two accepted shapes.
enum Rows {
    Objects(Vec<Map<String, Value>>),
    Arrays(Vec<Vec<Value>>),
}

impl Rows {
    fn len(&self) -> usize {
        match self {
            Rows::Objects(rows) => rows.len(),
            Rows::Arrays(rows) => rows.len(),
        }
    }
}

/// Parses `data`, keyed off the first item's shape; a mixed list is an
/// error naming the offending index.
fn parse_rows(data: &[Value]) -> Result<Rows> {
    match data.first() {
        Some(Value::Array(_)) => {
            let mut rows = Vec::with_capacity(data.len());
            for (index, item) in data.iter().enumerate() {
                match item {
                    Value::Array(cells) => rows.push(cells.clone()),
                    _ => {
                        return Err(AgentError::invalid(
                            format!("data[{index}]"),
                            "must be an array like the first row",
                        ))
                    }
                }
            }
            Ok(Rows::Arrays(rows))
        }
        _ => {
            let mut rows = Vec::with_capacity(data.len());
            for (index, item) in data.iter().enumerate() {
                rows.push(args::item_object("data", index, item)?);
            }
            Ok(Rows::Objects(rows))
        }
    }
}

/// Rejects absolute paths and traversal components; enforces `.csv`.
fn validate_filename(filename: &str) -> Result<String> {
    let path = Path::new(filename);
    let traversal = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if traversal || path.components().count() != 1 {
        return Err(AgentError::invalid(
            "filename",
            "must be a bare file name without path components",
        ));
    }
    if filename.ends_with(".csv") {
        Ok(filename.to_string())
    } else {
        Ok(format!("{filename}.csv"))
    }
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(value_to_cell).collect::<Vec<_>>().join(" ")
        ),
        other => other.to_string(),
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// First-seen order of keys across all object rows.
fn headers_from_objects(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut headers = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}

/// Positional labels covering the widest array row.
fn headers_from_arrays(rows: &[Vec<Value>]) -> Vec<String> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    (1..=width).map(|i| format!("column_{i}")).collect()
}

fn render_csv(rows: &Rows, headers: &[String], include_headers: bool) -> String {
    let mut out = String::new();
    if include_headers && !headers.is_empty() {
        out.push_str(
            &headers
                .iter()
                .map(|h| csv_escape(h))
                .collect::<Vec<_>>()
                .join(","),
        );
        out.push('\n');
    }

    match rows {
        Rows::Objects(rows) => {
            for row in rows {
                let cells: Vec<String> = headers
                    .iter()
                    .map(|header| {
                        csv_escape(&row.get(header).map(value_to_cell).unwrap_or_default())
                    })
                    .collect();
                out.push_str(&cells.join(","));
                out.push('\n');
            }
        }
        Rows::Arrays(rows) => {
            // Cells align by position; short rows pad with empty cells.
            for row in rows {
                let cells: Vec<String> = (0..headers.len())
                    .map(|i| csv_escape(&row.get(i).map(value_to_cell).unwrap_or_default()))
                    .collect();
                out.push_str(&cells.join(","));
                out.push('\n');
            }
        }
    }
    out
}

#[async_trait]
impl Skill for WriteToCsv {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let data = args::req_array(args, "data")?;
        let filename = validate_filename(args::req_str(args, "filename")?)?;
        let include_headers = args::opt_bool(args, "include_headers", true)?;

        let custom_headers: Option<Vec<String>> = match args::opt_array(args, "headers")? {
            None => None,
            Some(items) => {
                let mut headers = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => headers.push(s.clone()),
                        _ => {
                            return Err(AgentError::invalid("headers", "all headers must be strings"))
                        }
                    }
                }
                Some(headers)
            }
        };

        let rows = parse_rows(data)?;
        let headers = custom_headers
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| match &rows {
                Rows::Objects(rows) => headers_from_objects(rows),
                Rows::Arrays(rows) => headers_from_arrays(rows),
            });

        info!(
            target = "agent.skills",
            filename = %filename,
            rows_count = rows.len(),
            include_headers,
            "writing data to CSV file"
        );

        // The session ties the produced file to the caller's task in the
        // response, like every other skill.
        let session = self.sessions.task_session(ctx).await?;

        let csv = render_csv(&rows, &headers, include_headers);
        let path = self.artifacts.data_dir().join(&filename);
        tokio::fs::write(&path, csv.as_bytes()).await?;

        let mut metadata = serde_json::Map::new();
        metadata.insert("rows_written".into(), json!(rows.len()));
        metadata.insert("headers".into(), json!(headers));
        metadata.insert("include_headers".into(), json!(include_headers));
        metadata.insert("file_size".into(), json!(csv.len()));
        metadata.insert("original_records".into(), json!(data.len()));

        let artifact = self
            .artifacts
            .register_file(
                &path,
                "text/csv",
                Some(format!("CSV File: {filename}")),
                Some(format!(
                    "CSV file with {} rows written to {}",
                    rows.len(),
                    path.display()
                )),
                metadata,
            )
            .await?;

        info!(
            target = "agent.skills",
            filename = %filename,
            rows_written = rows.len(),
            artifact_id = %artifact.id,
            "CSV file created"
        );

        let response = json!({
            "success": true,
            "filename": filename,
            "path": path.display().to_string(),
            "rows_written": rows.len(),
            "columns": headers.len(),
            "session_id": session.id,
            "artifact_id": artifact.id,
            "download_url": format!("{}/artifacts/{}", self.artifact_base_url, artifact.id),
            "message": format!("Successfully created CSV with {} rows", rows.len()),
        });
        Ok(response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_session_manager;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn skill_with_store() -> (Arc<ArtifactStore>, WriteToCsv, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Arc::new(ArtifactStore::new(dir.path()).unwrap());
        let (_, sessions) = mock_session_manager();
        let skill = WriteToCsv::new(
            sessions,
            Arc::clone(&artifacts),
            "http://localhost:8081".into(),
        );
        (artifacts, skill, dir)
    }

    #[test]
    fn filename_validation() {
        assert_eq!(validate_filename("report.csv").unwrap(), "report.csv");
        assert_eq!(validate_filename("report").unwrap(), "report.csv");
        assert!(validate_filename("../escape.csv").is_err());
        assert!(validate_filename("/etc/passwd.csv").is_err());
        assert!(validate_filename("a/b.csv").is_err());
    }

    #[test]
    fn header_inference_preserves_first_seen_order() {
        let rows = vec![
            args(json!({"name": "a", "age": 1})),
            args(json!({"age": 2, "city": "x"})),
        ];
        assert_eq!(headers_from_objects(&rows), vec!["name", "age", "city"]);
    }

    #[test]
    fn positional_headers_cover_widest_row() {
        let rows = vec![vec![json!(1)], vec![json!(1), json!(2), json!(3)]];
        assert_eq!(
            headers_from_arrays(&rows),
            vec!["column_1", "column_2", "column_3"]
        );
    }

    #[tokio::test]
    async fn writes_object_rows_and_registers_artifact() {
        let (artifacts, skill, dir) = skill_with_store();

        let response = skill
            .call(
                &RequestContext::for_task("task-1"),
                &args(json!({
                    "filename": "people.csv",
                    "data": [
                        {"name": "Ada", "age": 36},
                        {"name": "Grace", "age": 85},
                    ],
                })),
            )
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["rows_written"], 2);
        assert_eq!(parsed["columns"], 2);

        let contents = std::fs::read_to_string(dir.path().join("people.csv")).unwrap();
        assert_eq!(contents, "name,age\nAda,36\nGrace,85\n");

        let entry = artifacts
            .get(parsed["artifact_id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(entry.mime_type, "text/csv");
        assert_eq!(entry.metadata["rows_written"], 2);
    }

    #[tokio::test]
    async fn writes_array_rows_with_custom_headers() {
        let (_, skill, dir) = skill_with_store();

        let response = skill
            .call(
                &RequestContext::for_task("task-2"),
                &args(json!({
                    "filename": "matrix",
                    "headers": ["name", "age"],
                    "data": [["Ada", 36], ["Grace", 85]],
                })),
            )
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["rows_written"], 2);
        assert_eq!(parsed["columns"], 2);

        let contents = std::fs::read_to_string(dir.path().join("matrix.csv")).unwrap();
        assert_eq!(contents, "name,age\nAda,36\nGrace,85\n");
    }

    #[tokio::test]
    async fn array_rows_without_headers_get_positional_labels() {
        let (_, skill, dir) = skill_with_store();

        skill
            .call(
                &RequestContext::for_task("task-3"),
                &args(json!({
                    "filename": "grid.csv",
                    "data": [["a", "b", "c"], ["d"]],
                })),
            )
            .await
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("grid.csv")).unwrap();
        assert_eq!(contents, "column_1,column_2,column_3\na,b,c\nd,,\n");
    }

    #[tokio::test]
    async fn custom_headers_and_missing_cells() {
        let (_, skill, dir) = skill_with_store();

        skill
            .call(
                &RequestContext::for_task("task-4"),
                &args(json!({
                    "filename": "partial",
                    "headers": ["name", "city"],
                    "data": [{"name": "Ada"}],
                })),
            )
            .await
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("partial.csv")).unwrap();
        assert_eq!(contents, "name,city\nAda,\n");
    }

    #[tokio::test]
    async fn rejects_scalar_rows() {
        let (_, skill, _dir) = skill_with_store();

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"filename": "x.csv", "data": ["not-a-row"]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("data[0]"));
    }

    #[tokio::test]
    async fn rejects_mixed_row_shapes() {
        let (_, skill, _dir) = skill_with_store();

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"filename": "x.csv", "data": [["a"], {"k": "v"}]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("data[1]"));
        assert!(err.to_string().contains("array"));
    }
}
