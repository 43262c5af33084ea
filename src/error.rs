//! Structured error types for specbench
//!
//! Every failure aborts the current invocation. Errors carry a stable error
//! code and a process exit code, and can be rendered either as human-readable
//! text or as structured JSON.

pub mod help_db;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BenchError>;

/// What a missing artifact was needed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// Baseline transcript of a comparison
    Baseline,
    /// Candidate transcript of a comparison
    Candidate,
    /// Transcript a decoding run was expected to write
    Transcript,
    /// Datastore index
    Datastore,
}

impl std::fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArtifactRole::Baseline => "baseline transcript",
            ArtifactRole::Candidate => "candidate transcript",
            ArtifactRole::Transcript => "transcript",
            ArtifactRole::Datastore => "datastore",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    /// Bad or missing input
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Method name outside the dispatch table
    #[error("unsupported method '{name}'{}", suggestion_suffix(.suggestion))]
    UnsupportedMethod {
        name: String,
        suggestion: Option<String>,
    },

    /// External tool exited unsuccessfully
    #[error("{tool} exited with {}", describe_exit(.code))]
    ExternalProcess {
        /// Method name or tool name
        tool: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },

    /// Required file absent
    #[error("{role} not found: {}", .path.display())]
    MissingArtifact { role: ArtifactRole, path: PathBuf },

    #[error("{tool} timed out after {}s", .after.as_secs())]
    Timeout { tool: String, after: Duration },

    /// specbench itself received SIGINT/SIGTERM/SIGHUP while a job ran
    #[error("{tool} interrupted by signal {signal}")]
    Interrupted { tool: String, signal: i32 },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Transcript line that is not a JSON object
    #[error("{}:{line}: invalid transcript record: {reason}", .path.display())]
    Transcript {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl BenchError {
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Configuration(message.into())
    }

    pub fn missing(role: ArtifactRole, path: impl AsRef<Path>) -> Self {
        BenchError::MissingArtifact {
            role,
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        BenchError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Stable error code, used for help lookup and JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            BenchError::Configuration(_) => "CONFIGURATION_ERROR",
            BenchError::UnsupportedMethod { .. } => "UNSUPPORTED_METHOD",
            BenchError::ExternalProcess { .. } => "EXTERNAL_PROCESS_FAILED",
            BenchError::MissingArtifact { .. } => "MISSING_ARTIFACT",
            BenchError::Timeout { .. } => "PROCESS_TIMEOUT",
            BenchError::Interrupted { .. } => "INTERRUPTED",
            BenchError::Spawn { .. } => "SPAWN_FAILED",
            BenchError::Transcript { .. } => "INVALID_TRANSCRIPT",
            BenchError::Io { .. } => "IO_ERROR",
        }
    }

    /// Exit code for the specbench process
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Configuration(_) | BenchError::UnsupportedMethod { .. } => 2,
            BenchError::ExternalProcess { code, .. } => match code {
                Some(c) if *c != 0 => *c,
                _ => 1,
            },
            BenchError::MissingArtifact { .. } => 3,
            BenchError::Timeout { .. } => 124,
            BenchError::Interrupted { signal, .. } => 128 + signal,
            BenchError::Spawn { .. } => 127,
            BenchError::Transcript { .. } => 65,
            BenchError::Io { .. } => 74,
        }
    }

    /// Diagnostic context (method, file path, exit code) as JSON
    fn context(&self) -> Option<serde_json::Value> {
        let value = match self {
            BenchError::UnsupportedMethod { name, suggestion } => {
                serde_json::json!({ "method": name, "suggestion": suggestion })
            }
            BenchError::ExternalProcess { tool, code } => {
                serde_json::json!({ "tool": tool, "code": code })
            }
            BenchError::MissingArtifact { role, path } => {
                serde_json::json!({ "role": role, "path": path })
            }
            BenchError::Timeout { tool, after } => {
                serde_json::json!({ "tool": tool, "after_secs": after.as_secs() })
            }
            BenchError::Interrupted { tool, signal } => {
                serde_json::json!({ "tool": tool, "signal": signal })
            }
            BenchError::Spawn { program, .. } => serde_json::json!({ "program": program }),
            BenchError::Transcript { path, line, .. } => {
                serde_json::json!({ "path": path, "line": line })
            }
            BenchError::Io { path, .. } => serde_json::json!({ "path": path }),
            BenchError::Configuration(_) => return None,
        };
        Some(value)
    }

    /// Convert into the serializable report shape
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            exit_code: self.exit_code(),
            context: self.context(),
        }
    }
}

/// Serializable view of an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error_code: String,
    pub message: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl ErrorReport {
    /// Format error as JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error_code":"{}","message":"{}","exit_code":{}}}"#,
                self.error_code, self.message, self.exit_code
            )
        })
    }

    /// Format error with help text appended
    pub fn with_help(&self) -> String {
        let mut output = self.message.clone();
        if let Some(help) = help_db::get_help(&self.error_code) {
            output.push_str("\n\n");
            output.push_str("Help: ");
            output.push_str(help.title);
            output.push('\n');
            output.push_str(help.explanation);
            output.push_str("\n\n");
            output.push_str(help.fix);
        }
        output
    }
}

/// How errors are printed on exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorFormat {
    #[default]
    Text,
    Json,
}

impl ErrorFormat {
    /// Interpret the value of SPECBENCH_ERROR_FORMAT
    pub fn from_setting(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => ErrorFormat::Json,
            _ => ErrorFormat::Text,
        }
    }

    pub fn render(&self, report: &ErrorReport) -> String {
        match self {
            ErrorFormat::Text => report.with_help(),
            ErrorFormat::Json => report.to_json(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_artifact() {
        let err = BenchError::missing(ArtifactRole::Baseline, "/tmp/vanilla.jsonl");
        assert_eq!(err.error_code(), "MISSING_ARTIFACT");
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.to_string(),
            "baseline transcript not found: /tmp/vanilla.jsonl"
        );
    }

    #[test]
    fn test_external_process_carries_code() {
        let err = BenchError::ExternalProcess {
            tool: "clasp".to_string(),
            code: Some(7),
        };
        assert_eq!(err.exit_code(), 7);
        assert!(err.to_string().contains("clasp"));
        assert!(err.to_string().contains("exit code 7"));
    }

    #[test]
    fn test_external_process_killed_by_signal() {
        let err = BenchError::ExternalProcess {
            tool: "speed".to_string(),
            code: None,
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_unsupported_method_message() {
        let err = BenchError::UnsupportedMethod {
            name: "swfit".to_string(),
            suggestion: Some("swift".to_string()),
        };
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.to_string(),
            "unsupported method 'swfit' (did you mean 'swift'?)"
        );

        let err = BenchError::UnsupportedMethod {
            name: "zzz".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unsupported method 'zzz'");
    }

    #[test]
    fn test_report_to_json() {
        let err = BenchError::ExternalProcess {
            tool: "casspec".to_string(),
            code: Some(42),
        };
        let json = err.report().to_json();
        assert!(json.contains("EXTERNAL_PROCESS_FAILED"));
        assert!(json.contains("casspec"));
        assert!(json.contains("42"));
    }

    #[test]
    fn test_configuration_has_no_context() {
        let report = BenchError::config("model path is required").report();
        assert!(report.context.is_none());
        assert_eq!(report.exit_code, 2);
    }

    #[test]
    fn test_with_help_formatting() {
        let report = BenchError::missing(ArtifactRole::Baseline, "base.jsonl").report();
        let formatted = report.with_help();
        assert!(formatted.contains("base.jsonl"));
        assert!(formatted.contains("Help:"));
        assert!(formatted.contains("produced by an earlier step"));
        assert!(formatted.contains("specbench build-datastore"));
    }

    #[test]
    fn test_interrupted_exit_code() {
        let err = BenchError::Interrupted {
            tool: "swift".to_string(),
            signal: 15,
        };
        assert_eq!(err.exit_code(), 143);
        assert_eq!(err.error_code(), "INTERRUPTED");
        assert_eq!(err.to_string(), "swift interrupted by signal 15");
        assert!(err.report().to_json().contains("\"signal\":15"));
    }

    #[test]
    fn test_error_format_setting() {
        assert_eq!(ErrorFormat::from_setting(None), ErrorFormat::Text);
        assert_eq!(ErrorFormat::from_setting(Some("json")), ErrorFormat::Json);
        assert_eq!(ErrorFormat::from_setting(Some("JSON")), ErrorFormat::Json);
        assert_eq!(ErrorFormat::from_setting(Some("text")), ErrorFormat::Text);
    }
}
