//! Result file addressing
//!
//! A transcript's file name encodes every setting that can change what the
//! job writes: `<model-id>-<method>-<dtype>[-<name>-<value>]*.jsonl`, with
//! `temperature`, `top-p`, `seed` and `max-new-tokens` first, then
//! `num-choices` when set, the method's declared parameters in table order,
//! the question range when restricted, and the datastore when one is used.
//! Device placement is not part of the name.
//!
//! Values are validated non-negative, so a value only contains `-` inside a
//! float exponent (`1e-07`) and never spells a parameter name. Together with
//! the fixed name sequence per method this keeps the mapping injective for a
//! given model id.

use crate::config::RunConfiguration;
use crate::datastore::DatastoreMode;
use crate::method::HyperValue;
use std::path::{Path, PathBuf};

/// Directory under `<data-root>/<bench-name>/` that holds transcripts
pub const ANSWER_DIR: &str = "model_answer";

/// Ordered `(name, value)` pairs that make up the file name suffix
pub fn name_components(config: &RunConfiguration) -> Vec<(&'static str, String)> {
    let mut parts = vec![
        ("temperature", HyperValue::Float(config.temperature()).to_string()),
        ("top-p", HyperValue::Float(config.top_p()).to_string()),
        ("seed", config.seed().to_string()),
        ("max-new-tokens", config.max_new_tokens().to_string()),
    ];
    if let Some(n) = config.num_choices() {
        parts.push(("num-choices", n.to_string()));
    }
    parts.extend(
        config
            .hyperparams()
            .iter()
            .map(|(name, value)| (name, value.to_string())),
    );

    let (begin, end) = config.question_range();
    if let Some(begin) = begin {
        parts.push(("question-begin", begin.to_string()));
    }
    if let Some(end) = end {
        parts.push(("question-end", end.to_string()));
    }
    if let Some(datastore) = config.datastore() {
        parts.push(("datastore", datastore_label(datastore)));
    }
    parts
}

/// `small` / `large` for the builder's own index names, else the file stem
fn datastore_label(path: &Path) -> String {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    match DatastoreMode::from_file_name(file_name) {
        Some(mode) => mode.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// File stem without directory or extension
pub fn result_stem(config: &RunConfiguration) -> String {
    let mut stem = format!(
        "{}-{}-{}",
        config.model_id(),
        config.method().name(),
        config.dtype()
    );
    for (name, value) in name_components(config) {
        stem.push('-');
        stem.push_str(name);
        stem.push('-');
        stem.push_str(&value);
    }
    stem
}

/// `<data-root>/<bench-name>/model_answer/<stem>.jsonl`, unless an explicit
/// answer file was configured
pub fn result_path(config: &RunConfiguration) -> PathBuf {
    if let Some(path) = config.answer_file() {
        return path.to_path_buf();
    }
    answer_dir(config).join(format!("{}.jsonl", result_stem(config)))
}

pub fn answer_dir(config: &RunConfiguration) -> PathBuf {
    config
        .data_root()
        .join(config.bench_name())
        .join(ANSWER_DIR)
}

/// Question file the external job reads
pub fn question_path(config: &RunConfiguration) -> PathBuf {
    config
        .data_root()
        .join(config.bench_name())
        .join("question.jsonl")
}
