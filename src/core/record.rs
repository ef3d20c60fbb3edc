use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delimiter used when the fighter list is flattened into a single column.
pub const FIGHTER_DELIMITER: &str = ", ";

/// What the model extracted from one transcript, before it is tied to a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Picks {
    pub fighters: Vec<String>,
    pub event_name: Option<String>,
}

impl Picks {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_record(self, video_id: impl Into<String>, title: Option<String>) -> AnalysisRecord {
        AnalysisRecord {
            video_id: video_id.into(),
            title,
            event_name: self.event_name,
            fighters: self.fighters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub event_name: Option<String>,
    pub fighters: Vec<String>,
}

impl AnalysisRecord {
    pub fn joined_fighters(&self) -> String {
        join_fighters(&self.fighters)
    }
}

/// A record as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub record: AnalysisRecord,
    pub created_at: NaiveDateTime,
}

pub fn join_fighters(fighters: &[String]) -> String {
    fighters.join(FIGHTER_DELIMITER)
}

pub fn split_fighters(joined: &str) -> Vec<String> {
    normalize_names(joined.split(',').map(str::to_string))
}

/// Trims every name, drops blanks and keeps only the first occurrence of each.
pub fn normalize_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let trimmed = name.trim();
        if trimmed.is_empty() || out.iter().any(|seen| seen == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

/// Converts either accepted fighters shape into the canonical ordered list.
///
/// A list is taken as-is. A mapping such as `{"1": "A", "fighter_2": "B"}` is
/// ordered by the number in each key; keys without one keep their original
/// order after the numbered keys. Non-string entries are ignored.
pub fn fighters_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => normalize_names(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string)),
        ),
        Value::Object(map) => normalize_names(ordered_positional(map)),
        Value::String(single) => normalize_names([single.clone()]),
        _ => Vec::new(),
    }
}

fn ordered_positional(map: &Map<String, Value>) -> Vec<String> {
    let mut entries: Vec<(u64, String)> = map
        .iter()
        .filter_map(|(key, v)| v.as_str().map(|name| (position_of(key), name.to_string())))
        .collect();
    // stable: ties keep insertion order
    entries.sort_by_key(|(pos, _)| *pos);
    entries.into_iter().map(|(_, name)| name).collect()
}

fn position_of(key: &str) -> u64 {
    let digits: String = key.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(u64::MAX)
}
