//! Run reports: a human summary on stdout plus optional JSON or Markdown files

use crate::error::{BenchError, Result};
use crate::method::dispatch::RunOutcome;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub method: String,
    pub model_id: String,
    pub command: String,
    pub transcript: PathBuf,
    pub started_at: String,
    pub duration_ms: f64,
    pub exit_code: i32,
    pub records: usize,
    pub total_new_tokens: f64,
    pub mean_throughput: f64,
}

impl RunReport {
    pub fn new(outcome: &RunOutcome, started_at: DateTime<Local>) -> Self {
        let config = &outcome.config;
        Self {
            method: config.method().name().to_string(),
            model_id: config.model_id().to_string(),
            command: outcome.invocation.command_line(),
            transcript: outcome.transcript.clone(),
            started_at: started_at.to_rfc3339(),
            duration_ms: outcome.output.elapsed.as_secs_f64() * 1000.0,
            exit_code: outcome.output.code,
            records: outcome.summary.records,
            total_new_tokens: outcome.summary.total_new_tokens,
            mean_throughput: outcome.summary.mean_throughput,
        }
    }

    /// Write as Markdown when the path ends in `.md`, JSON otherwise
    pub fn write(&self, path: &Path) -> Result<()> {
        let body = if path.extension().is_some_and(|e| e == "md") {
            self.to_markdown()
        } else {
            serde_json::to_string_pretty(self).map_err(|e| {
                BenchError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })?
        };
        fs::write(path, body).map_err(|e| BenchError::io(path, e))
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("# {} run: {}\n\n", self.method, self.model_id));
        md.push_str(&format!("**Started:** {}\n\n", self.started_at));
        md.push_str("| Field | Value |\n");
        md.push_str("|-------|-------|\n");
        md.push_str(&format!("| Transcript | `{}` |\n", self.transcript.display()));
        md.push_str(&format!("| Duration | {:.2}s |\n", self.duration_ms / 1000.0));
        md.push_str(&format!("| Exit code | {} |\n", self.exit_code));
        md.push_str(&format!("| Records | {} |\n", self.records));
        md.push_str(&format!("| New tokens | {:.0} |\n", self.total_new_tokens));
        md.push_str(&format!("| Mean throughput | {:.2} tok/s |\n", self.mean_throughput));
        md.push_str(&format!("\n```sh\n{}\n```\n", self.command));
        md
    }

    pub fn print_summary(&self) {
        println!("\n=== {} run ===", self.method);
        println!("Model: {}", self.model_id);
        println!("Duration: {:.2}s", self.duration_ms / 1000.0);
        println!("Records: {}", self.records);
        println!("Mean throughput: {:.2} tok/s", self.mean_throughput);
        println!("Transcript: {}", self.transcript.display());
    }
}
