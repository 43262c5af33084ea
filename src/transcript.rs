//! JSON-lines transcripts written by decoding runs
//!
//! Each line is one record: a question id, the model id, and a `choices`
//! array whose entries carry per-turn `new_tokens` and `wall_time` lists.
//! Fields this module does not know about are preserved verbatim.

use crate::error::{BenchError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Sort key for `question_id`: numeric ids before textual ones
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuestionKey {
    Number(i64),
    Text(String),
    Missing,
}

impl QuestionKey {
    fn of(record: &Map<String, Value>) -> Self {
        match record.get("question_id") {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => QuestionKey::Number(i),
                None => QuestionKey::Text(n.to_string()),
            },
            Some(Value::String(s)) => QuestionKey::Text(s.clone()),
            _ => QuestionKey::Missing,
        }
    }
}

/// Read every record, failing on the first line that is not a JSON object
pub fn read_records(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let content = fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    let mut records = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line).map_err(|e| BenchError::Transcript {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(map) => records.push(map),
            other => {
                return Err(BenchError::Transcript {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: format!("expected an object, found {}", json_kind(&other)),
                })
            }
        }
    }

    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Tokens and seconds spent on one record, summed over choices and turns
fn record_totals(record: &Map<String, Value>) -> (f64, f64) {
    let mut tokens = 0.0;
    let mut seconds = 0.0;
    if let Some(Value::Array(choices)) = record.get("choices") {
        for choice in choices {
            tokens += sum_field(choice, "new_tokens");
            seconds += sum_field(choice, "wall_time");
        }
    }
    (tokens, seconds)
}

/// Sum a numeric field that is either a number or a list of numbers
fn sum_field(choice: &Value, field: &str) -> f64 {
    match choice.get(field) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_f64).sum(),
        Some(v) => v.as_f64().unwrap_or(0.0),
        None => 0.0,
    }
}

/// Aggregate statistics over one transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSummary {
    pub path: PathBuf,
    pub records: usize,
    pub total_new_tokens: f64,
    pub total_wall_time: f64,
    /// Mean of per-record tokens per second (records with zero time are skipped)
    pub mean_throughput: f64,
    pub std_dev_throughput: f64,
    /// Distinct model ids seen in the records
    pub model_ids: Vec<String>,
}

impl TranscriptSummary {
    pub fn load(path: &Path) -> Result<Self> {
        let records = read_records(path)?;
        Ok(Self::from_records(path, &records))
    }

    pub fn from_records(path: &Path, records: &[Map<String, Value>]) -> Self {
        let mut total_new_tokens = 0.0;
        let mut total_wall_time = 0.0;
        let mut throughputs = Vec::with_capacity(records.len());
        let mut model_ids: Vec<String> = Vec::new();

        for record in records {
            let (tokens, seconds) = record_totals(record);
            total_new_tokens += tokens;
            total_wall_time += seconds;
            if seconds > 0.0 {
                throughputs.push(tokens / seconds);
            }
            if let Some(Value::String(id)) = record.get("model_id") {
                if !model_ids.contains(id) {
                    model_ids.push(id.clone());
                }
            }
        }

        Self {
            path: path.to_path_buf(),
            records: records.len(),
            total_new_tokens,
            total_wall_time,
            mean_throughput: mean(&throughputs),
            std_dev_throughput: std_dev(&throughputs),
            model_ids,
        }
    }

    /// Overall tokens per second
    pub fn throughput(&self) -> f64 {
        if self.total_wall_time > 0.0 {
            self.total_new_tokens / self.total_wall_time
        } else {
            0.0
        }
    }
}

/// Deduplicate by `question_id` (last record wins) and sort, rewriting the
/// file in place. Returns the number of records kept.
pub fn reorganize(path: &Path) -> Result<usize> {
    let records = read_records(path)?;

    let mut by_id: BTreeMap<QuestionKey, Map<String, Value>> = BTreeMap::new();
    let mut unkeyed = Vec::new();
    for record in records {
        match QuestionKey::of(&record) {
            QuestionKey::Missing => unkeyed.push(record),
            key => {
                by_id.insert(key, record);
            }
        }
    }

    let mut out = String::new();
    let mut kept = 0;
    for record in by_id.into_values().chain(unkeyed) {
        let line = serde_json::to_string(&record).map_err(|e| BenchError::Transcript {
            path: path.to_path_buf(),
            line: kept + 1,
            reason: e.to_string(),
        })?;
        out.push_str(&line);
        out.push('\n');
        kept += 1;
    }

    fs::write(path, out).map_err(|e| BenchError::io(path, e))?;
    Ok(kept)
}

/// Calculate mean of values
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Calculate sample standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let mean = mean(values);
    let variance = values
        .iter()
        .map(|x| (x - mean).powi(2))
        .sum::<f64>()
        / (values.len() as f64 - 1.0);

    variance.sqrt()
}
