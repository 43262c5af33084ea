//! Method dispatch: build and run the external command for one method

use super::params::HyperValue;
use super::Method;
use crate::config::{Resolver, RunConfiguration, RunOverrides, ToolSettings};
use crate::error::{ArtifactRole, BenchError, Result};
use crate::naming;
use crate::process::{Invocation, OutputMode, ProcessOutput, ProcessRunner};
use crate::transcript::TranscriptSummary;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Result of a successful decoding run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub config: RunConfiguration,
    pub invocation: Invocation,
    pub transcript: PathBuf,
    pub output: ProcessOutput,
    pub summary: TranscriptSummary,
}

pub struct MethodDispatcher<'a> {
    runner: &'a dyn ProcessRunner,
    tools: &'a ToolSettings,
}

impl<'a> MethodDispatcher<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, tools: &'a ToolSettings) -> Self {
        Self { runner, tools }
    }

    /// Build the exact command for `config`'s method
    pub fn invocation(&self, config: &RunConfiguration) -> Invocation {
        let spec = config.method().spec();

        let mut inv = Invocation::new(config.method().name(), &self.tools.python)
            .arg("-m")
            .arg(spec.module)
            .flag("--model-path", config.model_path().display())
            .flag("--model-id", config.model_id())
            .flag("--dtype", config.dtype())
            .flag("--temperature", HyperValue::Float(config.temperature()));

        for (name, value) in config.hyperparams().iter() {
            let Some(param) = spec.param(name) else {
                continue;
            };
            inv = match value {
                HyperValue::Switch(true) => inv.arg(param.flag),
                HyperValue::Switch(false) => inv,
                other => inv.flag(param.flag, other),
            };
        }

        if let Some(datastore) = config.datastore() {
            inv = inv.flag("--datastore-path", datastore.display());
        }

        inv = inv
            .flag("--bench-name", config.bench_name())
            .flag("--max-new-tokens", config.max_new_tokens())
            .flag("--seed", config.seed())
            .flag("--top-p", HyperValue::Float(config.top_p()));

        if let Some(n) = config.num_choices() {
            inv = inv.flag("--num-choices", n);
        }
        if let Some(n) = config.num_gpus_per_model() {
            inv = inv.flag("--num-gpus-per-model", n);
        }

        if !config.devices().is_empty() {
            inv = inv
                .flag("--num-gpus-total", config.devices().count())
                .env("CUDA_VISIBLE_DEVICES", config.devices().to_env_value());
        }

        let (begin, end) = config.question_range();
        if let Some(begin) = begin {
            inv = inv.flag("--question-begin", begin);
        }
        if let Some(end) = end {
            inv = inv.flag("--question-end", end);
        }

        inv = inv.flag("--answer-file", naming::result_path(config).display());

        for (key, value) in spec.env {
            inv = inv.env(*key, *value);
        }

        inv
    }

    /// Run the method described by `config` and validate its transcript
    pub fn run(&self, config: &RunConfiguration) -> Result<RunOutcome> {
        if let Some(datastore) = config.datastore() {
            if !datastore.exists() {
                return Err(BenchError::missing(ArtifactRole::Datastore, datastore));
            }
        }

        let questions = naming::question_path(config);
        if !questions.exists() {
            tracing::warn!(path = %questions.display(), "question file not found");
        }

        let transcript = naming::result_path(config);
        if let Some(dir) = transcript.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| BenchError::io(dir, e))?;
        }

        let before = fingerprint(&transcript);
        if before.is_some() {
            tracing::warn!(path = %transcript.display(), "transcript exists and will be replaced");
        }

        let invocation = self.invocation(config);
        tracing::info!(
            method = %config.method(),
            model_id = config.model_id(),
            transcript = %transcript.display(),
            "starting decoding run"
        );
        let output = self.runner.run(&invocation, OutputMode::Inherit)?;

        // A file left over from an earlier run does not count
        let after = fingerprint(&transcript);
        if after.is_none() || after == before {
            return Err(BenchError::missing(ArtifactRole::Transcript, &transcript));
        }
        let summary = TranscriptSummary::load(&transcript)?;
        tracing::info!(records = summary.records, "transcript validated");

        Ok(RunOutcome {
            config: config.clone(),
            invocation,
            transcript,
            output,
            summary,
        })
    }

    /// Resolve `method_name` and run it. Unknown names fail before anything
    /// is spawned.
    pub fn dispatch(
        &self,
        method_name: &str,
        resolver: &Resolver<'_>,
        overrides: &RunOverrides,
    ) -> Result<RunOutcome> {
        let config = configure(method_name, resolver, overrides)?;
        self.run(&config)
    }
}

/// Parse `method_name` and resolve its configuration
pub fn configure(
    method_name: &str,
    resolver: &Resolver<'_>,
    overrides: &RunOverrides,
) -> Result<RunConfiguration> {
    let method: Method = method_name.parse()?;
    resolver.run_configuration(method, overrides)
}

/// Size and modification time, or `None` if the file is absent
fn fingerprint(path: &Path) -> Option<(u64, SystemTime)> {
    let meta = fs::metadata(path).ok()?;
    Some((meta.len(), meta.modified().ok()?))
}
