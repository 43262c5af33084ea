//! Speed comparison between a baseline and a candidate transcript
//!
//! The authoritative speedup comes from the external `evaluation.speed`
//! tool; this module checks both transcripts exist, runs the tool, echoes its
//! output and picks the reported ratio out of it. Record counts are not
//! cross-checked here.

use crate::config::ToolSettings;
use crate::error::{ArtifactRole, BenchError, Result};
use crate::process::{Invocation, OutputMode, ProcessRunner};
use crate::transcript::TranscriptSummary;
use serde::Serialize;
use std::path::Path;

pub const SPEED_MODULE: &str = "evaluation.speed";
pub const EQUAL_MODULE: &str = "evaluation.equal";

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    /// Speedup reported by the tool, if it printed one
    pub speedup: Option<f64>,
    /// Everything the tool wrote to stdout
    pub output: String,
}

/// Throughput-based estimate computed from the transcripts themselves
#[derive(Debug, Clone, Serialize)]
pub struct NativeComparison {
    pub baseline: TranscriptSummary,
    pub candidate: TranscriptSummary,
    pub speedup: f64,
}

pub struct SpeedComparator<'a> {
    runner: &'a dyn ProcessRunner,
    tools: &'a ToolSettings,
}

impl<'a> SpeedComparator<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, tools: &'a ToolSettings) -> Self {
        Self { runner, tools }
    }

    pub fn speed_invocation(&self, base: &Path, candidate: &Path, tokenizer: &Path) -> Invocation {
        Invocation::new("speed", &self.tools.python)
            .arg("-m")
            .arg(SPEED_MODULE)
            .flag("--base-path", base.display())
            .flag("--file-path", candidate.display())
            .flag("--tokenizer-path", tokenizer.display())
    }

    pub fn equal_invocation(&self, base: &Path, candidate: &Path) -> Invocation {
        Invocation::new("equal", &self.tools.python)
            .arg("-m")
            .arg(EQUAL_MODULE)
            .flag("--base-path", base.display())
            .flag("--file-path", candidate.display())
    }

    /// Run the external speed tool
    pub fn compare(
        &self,
        base: &Path,
        candidate: &Path,
        tokenizer: &Path,
    ) -> Result<ComparisonResult> {
        require_transcripts(base, candidate)?;
        let invocation = self.speed_invocation(base, candidate, tokenizer);
        self.run_and_echo(&invocation)
    }

    /// Run the external output-equality check
    pub fn check_equal(&self, base: &Path, candidate: &Path) -> Result<ComparisonResult> {
        require_transcripts(base, candidate)?;
        let invocation = self.equal_invocation(base, candidate);
        self.run_and_echo(&invocation)
    }

    fn run_and_echo(&self, invocation: &Invocation) -> Result<ComparisonResult> {
        let out = self.runner.run(invocation, OutputMode::Capture)?;
        print!("{}", out.stdout);
        let speedup = parse_ratio(&out.stdout);
        if speedup.is_none() {
            tracing::warn!(tool = %invocation.label, "no ratio found in tool output");
        }
        Ok(ComparisonResult {
            speedup,
            output: out.stdout,
        })
    }
}

/// Compare mean per-record throughput without the external tool
pub fn compare_native(base: &Path, candidate: &Path) -> Result<NativeComparison> {
    require_transcripts(base, candidate)?;
    let baseline = TranscriptSummary::load(base)?;
    let candidate = TranscriptSummary::load(candidate)?;

    if baseline.mean_throughput <= 0.0 {
        return Err(BenchError::Transcript {
            path: baseline.path.clone(),
            line: 0,
            reason: "no timed records to compare against".to_string(),
        });
    }
    if baseline.records != candidate.records {
        tracing::warn!(
            baseline = baseline.records,
            candidate = candidate.records,
            "record counts differ"
        );
    }

    let speedup = candidate.mean_throughput / baseline.mean_throughput;
    Ok(NativeComparison {
        baseline,
        candidate,
        speedup,
    })
}

fn require_transcripts(base: &Path, candidate: &Path) -> Result<()> {
    if !base.is_file() {
        return Err(BenchError::missing(ArtifactRole::Baseline, base));
    }
    if !candidate.is_file() {
        return Err(BenchError::missing(ArtifactRole::Candidate, candidate));
    }
    Ok(())
}

/// Last positive number in the tool's output, e.g. `Speedup ratio: 1.87x`
pub fn parse_ratio(output: &str) -> Option<f64> {
    output
        .split(|c: char| c.is_whitespace() || c == ':' || c == '=' || c == ',')
        .rev()
        .filter_map(|token| {
            let token = token.trim_end_matches(['x', 'X', '%', ')']).trim_start_matches('(');
            token.parse::<f64>().ok()
        })
        .find(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use std::cell::Cell;
    use std::fs;
    use std::time::Duration;

    struct Canned {
        stdout: &'static str,
        spawned: Cell<usize>,
    }

    impl ProcessRunner for Canned {
        fn run(&self, _invocation: &Invocation, _output: OutputMode) -> Result<ProcessOutput> {
            self.spawned.set(self.spawned.get() + 1);
            Ok(ProcessOutput {
                code: 0,
                stdout: self.stdout.to_string(),
                elapsed: Duration::ZERO,
            })
        }
    }

    fn transcript(dir: &Path, name: &str, tokens: u32, secs: f64) -> std::path::PathBuf {
        let path = dir.join(name);
        let line = format!(
            "{{\"question_id\": 1, \"choices\": [{{\"new_tokens\": [{}], \"wall_time\": [{}]}}]}}\n",
            tokens, secs
        );
        fs::write(&path, line).unwrap();
        path
    }

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("Speedup ratio: 1.87"), Some(1.87));
        assert_eq!(parse_ratio("ratio 2.5x\n"), Some(2.5));
        assert_eq!(parse_ratio("tokens/s 30.1, 45.2\nSpeedup=1.5\n"), Some(1.5));
        assert_eq!(parse_ratio("no numbers here"), None);
        assert_eq!(parse_ratio("ratio: 0"), None);
    }

    #[test]
    fn test_missing_baseline_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let candidate = transcript(dir.path(), "cand.jsonl", 10, 1.0);
        let tools = ToolSettings::default();
        let runner = Canned {
            stdout: "",
            spawned: Cell::new(0),
        };
        let err = SpeedComparator::new(&runner, &tools)
            .compare(&dir.path().join("vanilla.jsonl"), &candidate, Path::new("/tok"))
            .unwrap_err();
        match err {
            BenchError::MissingArtifact { role, .. } => assert_eq!(role, ArtifactRole::Baseline),
            other => panic!("expected MissingArtifact, got {:?}", other),
        }
        assert_eq!(runner.spawned.get(), 0);
    }

    #[test]
    fn test_missing_candidate_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let base = transcript(dir.path(), "base.jsonl", 10, 1.0);
        let tools = ToolSettings::default();
        let runner = Canned {
            stdout: "",
            spawned: Cell::new(0),
        };
        let err = SpeedComparator::new(&runner, &tools)
            .check_equal(&base, &dir.path().join("nope.jsonl"))
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_ARTIFACT");
        assert_eq!(runner.spawned.get(), 0);
    }

    #[test]
    fn test_compare_reports_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let base = transcript(dir.path(), "base.jsonl", 10, 1.0);
        let cand = transcript(dir.path(), "cand.jsonl", 20, 1.0);
        let tools = ToolSettings::default();
        let runner = Canned {
            stdout: "Speedup ratio: 1.93\n",
            spawned: Cell::new(0),
        };
        let result = SpeedComparator::new(&runner, &tools)
            .compare(&base, &cand, Path::new("/tok"))
            .unwrap();
        assert_eq!(result.speedup, Some(1.93));
        assert_eq!(runner.spawned.get(), 1);
    }

    #[test]
    fn test_speed_invocation() {
        let tools = ToolSettings::default();
        let runner = Canned {
            stdout: "",
            spawned: Cell::new(0),
        };
        let inv = SpeedComparator::new(&runner, &tools).speed_invocation(
            Path::new("b.jsonl"),
            Path::new("c.jsonl"),
            Path::new("/models/vicuna"),
        );
        assert_eq!(
            inv.command_line(),
            "python -m evaluation.speed --base-path b.jsonl --file-path c.jsonl --tokenizer-path /models/vicuna"
        );
    }

    #[test]
    fn test_native_speedup() {
        let dir = tempfile::tempdir().unwrap();
        let base = transcript(dir.path(), "base.jsonl", 10, 1.0);
        let cand = transcript(dir.path(), "cand.jsonl", 25, 1.0);
        let result = compare_native(&base, &cand).unwrap();
        assert!((result.speedup - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_native_requires_timed_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let base = transcript(dir.path(), "base.jsonl", 10, 0.0);
        let cand = transcript(dir.path(), "cand.jsonl", 25, 1.0);
        assert!(compare_native(&base, &cand).is_err());
    }
}
