//! Chart artifact extraction from the agent's tool-call trace.
//!
//! Canonical encoding: a Responses API `mcp_call` item whose `name` is
//! `get_expense_summary` and whose `output` is a JSON string of
//! `{"charts": {"bar_chart": {...}, "pie_chart": {...}}}` with snake_case
//! fields. Everything else handled here (unlabelled items, camelCase fields,
//! wrapper objects, list-shaped `charts`) is legacy compatibility.
//!
//! Nothing in this module fails: an undecodable entry or chart is skipped.

use crate::ai::types::ChartImage;
use serde_json::{Map, Value};

/// Tool whose output carries the canonical chart payload
pub const SUMMARY_TOOL: &str = "get_expense_summary";

/// Other tools known to return the same `charts` payload family
const CHART_TOOLS: &[&str] = &[
    SUMMARY_TOOL,
    "get_finance_summary",
    "compare_finance_periods",
    "get_finance_timeline",
];

/// Named slots of the canonical `charts` mapping, with their camelCase aliases
const CHART_SLOTS: &[(&str, &str)] = &[("bar_chart", "barChart"), ("pie_chart", "pieChart")];

const BASE64_FIELDS: &[&str] = &["base64_data", "base64Data", "image_base64", "imageBase64", "base64", "data"];
const URL_FIELDS: &[&str] = &["image_url", "imageUrl", "url", "href"];
const MIME_FIELDS: &[&str] = &["mime_type", "mimeType", "content_type", "contentType"];
const TITLE_FIELDS: &[&str] = &["title", "caption"];

const DEFAULT_MIME_TYPE: &str = "image/png";

/// Decoding recursion limit for nested wrappers and JSON-in-string layers
const MAX_DECODE_DEPTH: u8 = 4;

type Payload = Map<String, Value>;

/// One way of recovering the `charts`-bearing payload from a tool output.
///
/// Tried in declaration order; each either produces a payload or falls through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadDecoder {
    /// Output is a mapping that already carries `charts`
    ChartsMapping,
    /// Mapping exposing `json` / `structuredContent`
    StructuredField,
    /// Mapping exposing a string `data` / `text` holding JSON
    EncodedTextField,
    /// MCP call-result shape: `content: [{type: "text", text: "..."}]`
    ContentBlocks,
    /// Bare JSON string
    JsonString,
    /// List of candidate outputs; first successful decode wins
    FirstOfList,
}

const DECODERS: &[PayloadDecoder] = &[
    PayloadDecoder::ChartsMapping,
    PayloadDecoder::StructuredField,
    PayloadDecoder::EncodedTextField,
    PayloadDecoder::ContentBlocks,
    PayloadDecoder::JsonString,
    PayloadDecoder::FirstOfList,
];

impl PayloadDecoder {
    fn decode(self, value: &Value, depth: u8) -> Option<Payload> {
        match self {
            PayloadDecoder::ChartsMapping => value
                .as_object()
                .filter(|map| map.contains_key("charts"))
                .cloned(),
            PayloadDecoder::StructuredField => {
                let map = value.as_object()?;
                ["structuredContent", "structured_content", "json"]
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .find_map(|inner| decode_payload(inner, depth + 1))
            }
            PayloadDecoder::EncodedTextField => {
                let map = value.as_object()?;
                ["data", "text"]
                    .iter()
                    .filter_map(|key| map.get(*key).and_then(Value::as_str))
                    .find_map(|raw| parse_json_object(raw, depth + 1))
            }
            PayloadDecoder::ContentBlocks => {
                let blocks = value.as_object()?.get("content")?.as_array()?;
                blocks.iter().find_map(|block| decode_payload(block, depth + 1))
            }
            PayloadDecoder::JsonString => parse_json_object(value.as_str()?, depth + 1),
            PayloadDecoder::FirstOfList => value
                .as_array()?
                .iter()
                .find_map(|item| decode_payload(item, depth + 1)),
        }
    }
}

fn parse_json_object(raw: &str, depth: u8) -> Option<Payload> {
    let parsed: Value = serde_json::from_str(raw.trim()).ok()?;
    decode_payload(&parsed, depth)
}

/// Recover the mapping carrying `charts` from a raw tool output, if any decoder can.
pub fn decode_payload(value: &Value, depth: u8) -> Option<Payload> {
    if depth > MAX_DECODE_DEPTH {
        return None;
    }
    DECODERS.iter().find_map(|decoder| decoder.decode(value, depth))
}

/// Tool name of a trace item, wherever the format keeps it.
fn tool_name(item: &Value) -> Option<&str> {
    item.get("name")
        .or_else(|| item.get("tool_name"))
        .or_else(|| item.get("raw_item").and_then(|raw| raw.get("name")))
        .and_then(Value::as_str)
}

/// Output field of a trace item, wherever the format keeps it.
fn tool_output(item: &Value) -> Option<&Value> {
    item.get("output")
        .or_else(|| item.get("raw_item").and_then(|raw| raw.get("output")))
        .or_else(|| item.get("result"))
        .filter(|v| !v.is_null())
}

fn is_chart_tool_item(item: &Value) -> bool {
    match tool_name(item) {
        Some(name) => CHART_TOOLS.contains(&name),
        // Looser trace formats don't label tool identity; accept them.
        None => true,
    }
}

fn first_string<'a>(map: &'a Payload, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|f| map.get(*f).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

/// Build one chart descriptor. Charts without image data are skipped.
fn chart_from(slot: &str, chart: &Value) -> Option<ChartImage> {
    let map = chart.as_object()?;
    let base64_data = first_string(map, BASE64_FIELDS).map(str::to_string);
    let image_url = first_string(map, URL_FIELDS).map(str::to_string);

    if base64_data.is_none() && image_url.is_none() {
        log::debug!("[CHARTS] Skipping {}: neither base64 nor URL present", slot);
        return None;
    }

    let mime_type = first_string(map, MIME_FIELDS)
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();
    Some(ChartImage {
        file_name: format!("{}.{}", slot, extension_for(&mime_type)),
        mime_type,
        base64_data,
        image_url,
        caption: first_string(map, TITLE_FIELDS).map(str::to_string),
    })
}

/// Charts declared in a decoded payload.
pub fn charts_from_payload(payload: &Payload) -> Vec<ChartImage> {
    match payload.get("charts") {
        Some(Value::Object(charts)) => CHART_SLOTS
            .iter()
            .filter_map(|(snake, camel)| {
                let chart = charts.get(*snake).or_else(|| charts.get(*camel))?;
                chart_from(snake, chart)
            })
            .collect(),
        Some(Value::Array(list)) => list
            .iter()
            .enumerate()
            .filter_map(|(i, chart)| chart_from(&format!("chart_{}", i + 1), chart))
            .collect(),
        _ => Vec::new(),
    }
}

/// Scan a run's trace and pull out every chart the summary tools produced.
pub fn extract_charts(trace: &[Value]) -> Vec<ChartImage> {
    let mut images = Vec::new();

    for (index, item) in trace.iter().enumerate() {
        if !is_chart_tool_item(item) {
            continue;
        }
        let Some(output) = tool_output(item) else {
            continue;
        };
        let Some(payload) = decode_payload(output, 0) else {
            log::debug!("[CHARTS] Trace item {} carries no chart payload", index);
            continue;
        };

        let found = charts_from_payload(&payload);
        if !found.is_empty() {
            log::info!(
                "[CHARTS] Extracted {} chart(s) from trace item {} ({})",
                found.len(),
                index,
                tool_name(item).unwrap_or("unlabelled")
            );
        }
        images.extend(found);
    }

    images
}
