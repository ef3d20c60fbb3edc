//! Turns raw model output into [`Picks`].
//!
//! Models wrap their JSON in code fences, prepend chatter, or return nothing at
//! all. Parsing runs an ordered chain of pure strategies over the cleaned text
//! and takes the first JSON object any of them yields. Every failure path ends
//! in empty picks plus a [`ParseIssue`]; nothing here returns an error.

use crate::core::record::{Picks, fighters_from_value};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

static OBJECT_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("object span pattern is valid"));

type JsonObject = Map<String, Value>;
type Strategy = fn(&str) -> Option<JsonObject>;

/// Tried in order on the fence-stripped text.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("embedded object", parse_embedded_object),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIssue {
    EmptyResponse,
    NoValidJson,
    ModelCall(String),
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyResponse => write!(f, "empty response"),
            Self::NoValidJson => write!(f, "no valid JSON found in response"),
            Self::ModelCall(msg) => write!(f, "model call failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub picks: Picks,
    pub issue: Option<ParseIssue>,
}

impl ParseOutcome {
    fn parsed(picks: Picks) -> Self {
        Self { picks, issue: None }
    }

    pub fn failed(issue: ParseIssue) -> Self {
        Self {
            picks: Picks::empty(),
            issue: Some(issue),
        }
    }
}

pub fn parse_response(raw: &str) -> ParseOutcome {
    if raw.trim().is_empty() {
        return ParseOutcome::failed(ParseIssue::EmptyResponse);
    }

    let cleaned = strip_code_fences(raw);

    for (name, strategy) in STRATEGIES {
        if let Some(object) = strategy(cleaned) {
            tracing::debug!(strategy = name, "parsed model response");
            return ParseOutcome::parsed(normalize(&object));
        }
        tracing::debug!(strategy = name, "strategy found no JSON object");
    }

    ParseOutcome::failed(ParseIssue::NoValidJson)
}

/// Removes a leading ```` ```json ```` / ```` ``` ```` and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

pub fn parse_direct(text: &str) -> Option<JsonObject> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Greedy: spans the first `{` to the last `}` in the text.
pub fn parse_embedded_object(text: &str) -> Option<JsonObject> {
    OBJECT_SPAN
        .find(text)
        .and_then(|span| parse_direct(span.as_str()))
}

fn normalize(object: &JsonObject) -> Picks {
    let fighters = match object.get("fighter_picks") {
        Some(picks) if is_populated(picks) => fighters_from_value(picks),
        _ => object.get("fighters").map(fighters_from_value).unwrap_or_default(),
    };

    // Kept exactly as sent; only fighter names are cleaned up.
    let event_name = object
        .get("event_name")
        .and_then(Value::as_str)
        .map(str::to_string);

    Picks {
        fighters,
        event_name,
    }
}

/// True when the value holds at least one usable name.
fn is_populated(value: &Value) -> bool {
    let has_name = |v: &Value| v.as_str().is_some_and(|s| !s.trim().is_empty());
    match value {
        Value::Array(items) => items.iter().any(has_name),
        Value::Object(map) => map.values().any(has_name),
        value => has_name(value),
    }
}
