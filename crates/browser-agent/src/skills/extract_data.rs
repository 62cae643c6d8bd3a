//! extract_data: run a list of extractors and post-process the result.
//!
//! The driver's raw result is accepted in two shapes: a canonical JSON
//! object, or the legacy textual mapping form (`map[key:value ...]` with
//! bracketed arrays and quoted strings) that older backends emit.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use browser_driver::ExtractorSpec;
use serde_json::{json, Map, Value};
use tracing::info;

use super::args;
use super::schema::{ParamField, ParamKind, ParamSchema, SkillDescriptor};
use super::{RequestContext, Skill};
use crate::error::{AgentError, Result};
use crate::session::SessionManager;

const FORMATS: &[&str] = &["json", "csv", "text"];

pub struct ExtractData {
    sessions: Arc<SessionManager>,
    descriptor: SkillDescriptor,
}

impl ExtractData {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        let extractor_schema = ParamSchema::new(
            vec![
                ParamField::new("name", ParamKind::String, "Name for the extracted data field"),
                ParamField::new(
                    "selector",
                    ParamKind::String,
                    "CSS selector or XPath to extract data from",
                ),
                ParamField::new(
                    "attribute",
                    ParamKind::String,
                    "Attribute to extract (text, href, src, etc.)",
                )
                .with_default(json!("text")),
                ParamField::new(
                    "multiple",
                    ParamKind::Boolean,
                    "Extract all matching elements or just the first",
                )
                .with_default(json!(false)),
            ],
            vec!["name", "selector"],
        );

        let descriptor = SkillDescriptor {
            name: "extract_data",
            description:
                "Extract data from the page using selectors and return structured information",
            parameters: ParamSchema::new(
                vec![
                    ParamField::new("extractors", ParamKind::Array, "List of data extractors to run")
                        .with_items(extractor_schema),
                    ParamField::new("format", ParamKind::String, "Output format")
                        .with_default(json!("json"))
                        .with_enum(FORMATS),
                ],
                vec!["extractors"],
            ),
        };
        Self {
            sessions,
            descriptor,
        }
    }
}

fn parse_extractor(index: usize, item: &Value) -> Result<ExtractorSpec> {
    let map = args::item_object("extractors", index, item)?;

    let name = args::req_str(&map, "name").map_err(|_| {
        AgentError::invalid(
            format!("extractors[{index}].name"),
            "is required and must be a non-empty string",
        )
    })?;
    let selector = args::req_str(&map, "selector").map_err(|_| {
        AgentError::invalid(
            format!("extractors[{index}].selector"),
            "is required and must be a non-empty string",
        )
    })?;
    let attribute = args::opt_str(&map, "attribute")?.filter(|s| !s.is_empty()).unwrap_or("text");
    let multiple = args::opt_bool(&map, "multiple", false)?;

    Ok(ExtractorSpec {
        name: name.to_string(),
        selector: selector.to_string(),
        attribute: attribute.to_string(),
        multiple,
    })
}

/// Parses the driver's raw result into a name-to-value mapping.
pub fn parse_raw_result(raw: &str) -> Result<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        return Ok(map);
    }

    let trimmed = raw.trim();
    if trimmed.starts_with("map[") && trimmed.ends_with(']') {
        return Ok(parse_legacy_map(&trimmed[4..trimmed.len() - 1]));
    }

    // Last resort: line-oriented `key: value` pairs.
    let mut map = Map::new();
    for line in trimmed.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                map.insert(key.to_string(), Value::String(value.trim().to_string()));
            }
        }
    }
    Ok(map)
}

/// Parses the legacy `key:value key:[a b]` body, tolerating quoted values
/// and whitespace inside bracketed arrays.
fn parse_legacy_map(content: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for part in smart_split(content) {
        if let Some((key, value)) = part.split_once(':') {
            map.insert(
                key.trim().to_string(),
                parse_legacy_value(value.trim()),
            );
        }
    }
    map
}

/// Splits on the spaces that separate `key:value` pairs, but not on spaces
/// inside brackets, inside quotes, or inside an unquoted value that is
/// followed by more of the same value rather than a new key.
fn smart_split(content: &str) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut found_key = false;

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            '"' | '\'' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ':' if depth == 0 && !in_quotes && !found_key => {
                found_key = true;
                current.push(c);
            }
            ' ' if depth == 0 && !in_quotes => {
                if found_key && next_is_key(&chars, i) {
                    if !current.is_empty() {
                        parts.push(std::mem::take(&mut current));
                        found_key = false;
                    }
                } else if found_key {
                    current.push(c);
                } else if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
        i += 1;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// True when the next non-space run reads as `word:`.
fn next_is_key(chars: &[char], from: usize) -> bool {
    let mut i = from + 1;
    while i < chars.len() && chars[i] == ' ' {
        i += 1;
    }
    let start = i;
    while i < chars.len() && !matches!(chars[i], ' ' | ':' | '[' | ']') {
        i += 1;
    }
    i > start && i < chars.len() && chars[i] == ':'
}

fn parse_legacy_value(value: &str) -> Value {
    if value.starts_with('[') && value.ends_with(']') {
        let inner = &value[1..value.len() - 1];
        if inner.is_empty() {
            return Value::Array(Vec::new());
        }
        return Value::Array(
            inner
                .split_whitespace()
                .map(parse_legacy_scalar)
                .collect(),
        );
    }
    parse_legacy_scalar(value)
}

fn parse_legacy_scalar(value: &str) -> Value {
    let quoted = (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
        || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2);
    if quoted {
        return Value::String(value[1..value.len() - 1].to_string());
    }
    if let Ok(n) = value.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = value.parse::<f64>() {
        return json!(f);
    }
    if let Ok(b) = value.parse::<bool>() {
        return Value::Bool(b);
    }
    if value == "<nil>" || value == "null" {
        return Value::Null;
    }
    Value::String(value.to_string())
}

/// Trims, collapses internal whitespace, and strips control characters
/// from every string in the value tree.
pub fn clean_data(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clean_data(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(clean_data).collect()),
        Value::String(s) => Value::String(clean_string(&s)),
        other => other,
    }
}

fn clean_string(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .filter(|c| !c.is_control() && *c != '\u{7f}')
        .collect()
}

fn format_json(data: Map<String, Value>, extractor_count: usize) -> Result<String> {
    let cleaned = clean_data(Value::Object(data));
    let total_fields = cleaned.as_object().map(Map::len).unwrap_or(0);
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let result = json!({
        "success": true,
        "format": "json",
        "extractors": extractor_count,
        "data": cleaned,
        "metadata": {
            "extraction_time": epoch,
            "total_fields": total_fields,
        },
    });
    Ok(serde_json::to_string_pretty(&result)?)
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
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

/// Renders the mapping as CSV: headers follow extractor order; rows are
/// aligned by index, with the row count set by the longest array.
fn format_csv(data: &Map<String, Value>, headers: &[String]) -> String {
    let max_rows = data
        .values()
        .map(|value| match value {
            Value::Array(items) => items.len(),
            _ => 1,
        })
        .max()
        .unwrap_or(1)
        .max(1);

    let mut out = String::new();
    out.push_str(
        &headers
            .iter()
            .map(|h| csv_escape(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for row in 0..max_rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|header| {
                let cell = match data.get(header) {
                    Some(Value::Array(items)) => {
                        items.get(row).map(value_to_cell).unwrap_or_default()
                    }
                    Some(value) if row == 0 => value_to_cell(value),
                    _ => String::new(),
                };
                csv_escape(&cell)
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn format_text(data: &Map<String, Value>, headers: &[String]) -> String {
    let mut out = String::from("Extracted Data:\n==============\n\n");
    for header in headers {
        let Some(value) = data.get(header) else {
            continue;
        };
        out.push_str(header);
        out.push_str(": ");
        match value {
            Value::Array(items) => {
                out.push('\n');
                for (i, item) in items.iter().enumerate() {
                    out.push_str(&format!("  [{}] {}\n", i + 1, value_to_cell(item)));
                }
            }
            other => {
                out.push_str(&value_to_cell(other));
                out.push('\n');
            }
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl Skill for ExtractData {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn call(&self, ctx: &RequestContext, args: &Map<String, Value>) -> Result<String> {
        let raw_extractors = args::req_array(args, "extractors")?;
        let mut extractors = Vec::with_capacity(raw_extractors.len());
        for (index, item) in raw_extractors.iter().enumerate() {
            extractors.push(parse_extractor(index, item)?);
        }
        let format = args::str_enum(args, "format", FORMATS, "json")?;

        info!(
            target = "agent.skills",
            extractors_count = extractors.len(),
            format,
            "extracting data from page"
        );

        let session = self.sessions.task_session(ctx).await?;
        let raw = session
            .page
            .extract(&extractors)
            .await
            .map_err(|e| AgentError::driver("extract_data", e))?;

        let data = parse_raw_result(&raw)?;
        let headers: Vec<String> = extractors.iter().map(|e| e.name.clone()).collect();

        info!(
            target = "agent.skills",
            session_id = %session.id,
            format,
            "data extraction completed"
        );

        match format {
            "csv" => {
                let cleaned = match clean_data(Value::Object(data)) {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                Ok(format_csv(&cleaned, &headers))
            }
            "text" => {
                let cleaned = match clean_data(Value::Object(data)) {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                Ok(format_text(&cleaned, &headers))
            }
            _ => format_json(data, extractors.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_session_manager;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn parses_canonical_json() {
        let map = parse_raw_result(r#"{"title":"Hi","links":["/a"]}"#).unwrap();
        assert_eq!(map["title"], "Hi");
        assert_eq!(map["links"][0], "/a");
    }

    #[test]
    fn parses_legacy_map_format() {
        let map = parse_raw_result("map[title:  Hello   World  links:[/a /b]]").unwrap();
        assert_eq!(map["title"], "Hello   World");
        assert_eq!(map["links"], json!(["/a", "/b"]));
    }

    #[test]
    fn legacy_scalars() {
        let map = parse_raw_result("map[count:3 ratio:1.5 ok:true gone:<nil> name:\"quoted\"]").unwrap();
        assert_eq!(map["count"], 3);
        assert_eq!(map["ratio"], 1.5);
        assert_eq!(map["ok"], true);
        assert_eq!(map["gone"], Value::Null);
        assert_eq!(map["name"], "quoted");
    }

    #[test]
    fn cleaning_collapses_whitespace_and_strips_controls() {
        let cleaned = clean_data(json!({"a": "  Hello \t  World \u{0007} ", "b": ["  x  y "]}));
        assert_eq!(cleaned["a"], "Hello World");
        assert_eq!(cleaned["b"][0], "x y");
    }

    #[tokio::test]
    async fn json_format_matches_contract() {
        let (driver, sessions) = mock_session_manager();
        let skill = ExtractData::new(Arc::clone(&sessions));

        let ctx = RequestContext::for_task("task-1");
        sessions.task_session(&ctx).await.unwrap();
        driver
            .last_page()
            .unwrap()
            .set_extract_result("map[title:  Hello   World  links:[/a /b]]");

        let response = skill
            .call(
                &ctx,
                &args(json!({"extractors": [
                    {"name": "title", "selector": "h1"},
                    {"name": "links", "selector": "a", "attribute": "href", "multiple": true},
                ]})),
            )
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["format"], "json");
        assert_eq!(parsed["extractors"], 2);
        assert_eq!(parsed["data"], json!({"title": "Hello World", "links": ["/a", "/b"]}));
        assert_eq!(parsed["metadata"]["total_fields"], 2);
    }

    #[tokio::test]
    async fn csv_format_aligns_rows() {
        let (driver, sessions) = mock_session_manager();
        let skill = ExtractData::new(Arc::clone(&sessions));

        let ctx = RequestContext::for_task("task-2");
        sessions.task_session(&ctx).await.unwrap();
        driver
            .last_page()
            .unwrap()
            .set_extract_result(r#"{"name":"one","tags":["a","b","c"]}"#);

        let response = skill
            .call(
                &ctx,
                &args(json!({"format": "csv", "extractors": [
                    {"name": "name", "selector": ".n"},
                    {"name": "tags", "selector": ".t", "multiple": true},
                ]})),
            )
            .await
            .unwrap();

        let lines: Vec<&str> = response.lines().collect();
        assert_eq!(lines[0], "name,tags");
        assert_eq!(lines[1], "one,a");
        assert_eq!(lines[2], ",b");
        assert_eq!(lines[3], ",c");
    }

    #[tokio::test]
    async fn text_format_lists_arrays() {
        let (driver, sessions) = mock_session_manager();
        let skill = ExtractData::new(Arc::clone(&sessions));

        let ctx = RequestContext::for_task("task-3");
        sessions.task_session(&ctx).await.unwrap();
        driver
            .last_page()
            .unwrap()
            .set_extract_result(r#"{"links":["/a","/b"]}"#);

        let response = skill
            .call(
                &ctx,
                &args(json!({"format": "text", "extractors": [
                    {"name": "links", "selector": "a", "multiple": true},
                ]})),
            )
            .await
            .unwrap();

        assert!(response.starts_with("Extracted Data:"));
        assert!(response.contains("  [1] /a"));
        assert!(response.contains("  [2] /b"));
    }

    #[tokio::test]
    async fn invalid_format_rejected() {
        let (_, sessions) = mock_session_manager();
        let skill = ExtractData::new(sessions);

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"format": "xml", "extractors": [{"name": "a", "selector": "b"}]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("json, csv, text"));
    }

    #[tokio::test]
    async fn extractor_validation() {
        let (_, sessions) = mock_session_manager();
        let skill = ExtractData::new(sessions);

        let err = skill
            .call(
                &RequestContext::default(),
                &args(json!({"extractors": [{"selector": "h1"}]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("extractors[0].name"));

        let err = skill
            .call(&RequestContext::default(), &args(json!({"extractors": []})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("extractors"));
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
