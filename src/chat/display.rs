use serde_json::Value;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use colored::*;
use chrono::{TimeZone, Utc};

use crate::response::InferenceResult;
use crate::server::ApiError;

fn header(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Renders an inference result: the message first, then the numbered steps.
pub fn display_result(result: &InferenceResult) {
    let mut table = new_table();
    table.set_header(vec![header("#"), header("Guidance")]);
    for (i, step) in result.guidance_steps.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::White).set_alignment(CellAlignment::Center),
            Cell::new(step).fg(Color::Green),
        ]);
    }

    println!("\n{} {}", "SMS draft:".bold(), result.sms_draft.yellow());
    println!("{}", format!("({} characters)", result.sms_draft.chars().count()).bright_black());
    println!("{}", table);
}

/// Renders the report returned by a successful initialization.
///
/// # Arguments
///
/// * `report` - The `result` object of an init response
pub fn display_init_report(report: &Value) {
    println!("{}", "Model initialized".bright_green());
    println!("{}", report_table(report));
}

/// Renders the lifecycle state and, when present, the last initialization report.
pub fn display_status(status: &Value) {
    let state = status.get("state").and_then(Value::as_str).unwrap_or("unknown");
    let colored_state = match state {
        "ready" => state.green(),
        "busy" | "loading" => state.yellow(),
        "failed" => state.red(),
        _ => state.normal(),
    };
    println!("State: {}", colored_state.bold());
    if let Some(reason) = status.get("reason").and_then(Value::as_str) {
        println!("Reason: {}", reason.red());
    }
    if let Some(report) = status.get("report") {
        println!("{}", report_table(report));
    }
}

pub fn display_error(error: Option<&ApiError>) {
    match error {
        Some(error) => println!("{} {}", format!("[{}]", error.kind).red().bold(), error.message),
        None => println!("{}", "Request failed without an error description".red()),
    }
}

fn report_table(report: &Value) -> Table {
    let text = |pointer: &str| report.pointer(pointer).map(value_text).unwrap_or_else(|| "-".to_string());

    let loaded_at = report
        .get("loaded_at")
        .and_then(Value::as_i64)
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let rows = [
        ("Engine", text("/engine")),
        ("Artifact", text("/artifact/path")),
        ("Size (bytes)", text("/artifact/size_bytes")),
        ("Installed", text("/artifact/installed")),
        ("Format", text("/artifact/format/type")),
        ("Backend", text("/capabilities/backend")),
        ("Vision", text("/capabilities/supports_vision")),
        ("Audio", text("/capabilities/supports_audio")),
        ("top_k / top_p", format!("{} / {}", text("/sampling/top_k"), text("/sampling/top_p"))),
        ("Temperature", text("/sampling/temperature")),
        ("Max tokens", text("/sampling/max_tokens")),
        ("Loaded at", loaded_at),
    ];

    let mut table = new_table();
    table.set_header(vec![header("Property"), header("Value")]);
    for (name, value) in rows {
        table.add_row(vec![Cell::new(name).fg(Color::Yellow), Cell::new(value).fg(Color::White)]);
    }
    table
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_table_lists_artifact_and_sampling() {
        let report = json!({
            "engine": "llama.cpp",
            "artifact": { "path": "/data/model.gguf", "size_bytes": 42, "installed": true, "format": { "type": "gguf", "version": 3 } },
            "capabilities": { "backend": "cpu", "supports_vision": false, "supports_audio": false },
            "sampling": { "top_k": 40, "top_p": 0.95, "temperature": 1.0, "max_tokens": 256 },
            "loaded_at": 1_700_000_000
        });

        let rendered = report_table(&report).to_string();

        assert!(rendered.contains("/data/model.gguf"));
        assert!(rendered.contains("llama.cpp"));
        assert!(rendered.contains("40 / 0.95"));
        assert!(rendered.contains("2023-11-14"));
    }

    #[test]
    fn test_missing_fields_render_as_dash() {
        assert_eq!(value_text(&Value::Null), "-");
        assert_eq!(value_text(&json!("gpu")), "gpu");
        assert_eq!(value_text(&json!(3)), "3");
    }
}
