//! Datastore builder invocation
//!
//! The retrieval index is built by an external script. This module only
//! chooses the output name, runs the script in the target directory and
//! checks the index appeared.

use crate::config::ToolSettings;
use crate::error::{ArtifactRole, BenchError, Result};
use crate::process::{Invocation, OutputMode, ProcessRunner};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Builder script, relative to the working directory
pub const DEFAULT_BUILDER_SCRIPT: &str = "get_datastore_chat.py";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatastoreMode {
    Small,
    Large,
}

impl DatastoreMode {
    pub fn from_large_flag(large: bool) -> Self {
        if large {
            DatastoreMode::Large
        } else {
            DatastoreMode::Small
        }
    }

    pub fn is_large(&self) -> bool {
        matches!(self, DatastoreMode::Large)
    }

    /// Index file the builder writes for this mode
    pub fn file_name(&self) -> &'static str {
        match self {
            DatastoreMode::Small => "datastore_chat_small.idx",
            DatastoreMode::Large => "datastore_chat_large.idx",
        }
    }

    /// Mode whose index is named `name`, if it is one of the builder's
    pub fn from_file_name(name: &str) -> Option<Self> {
        [DatastoreMode::Small, DatastoreMode::Large]
            .into_iter()
            .find(|mode| mode.file_name() == name)
    }
}

impl fmt::Display for DatastoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatastoreMode::Small => f.write_str("small"),
            DatastoreMode::Large => f.write_str("large"),
        }
    }
}

/// Accepts the builder's own `true|false` spelling as well as `small|large`
impl FromStr for DatastoreMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "large" => Ok(DatastoreMode::Large),
            "false" | "0" | "small" => Ok(DatastoreMode::Small),
            other => Err(BenchError::config(format!(
                "--large-datastore expects true or false, got '{}'",
                other
            ))),
        }
    }
}

/// A built index on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatastoreArtifact {
    pub path: PathBuf,
    pub mode: DatastoreMode,
}

pub struct DatastoreBuilder<'a> {
    runner: &'a dyn ProcessRunner,
    tools: &'a ToolSettings,
    script: PathBuf,
    workdir: PathBuf,
    /// Directory relative script and model paths are given against
    origin: Option<PathBuf>,
}

impl<'a> DatastoreBuilder<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        tools: &'a ToolSettings,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            tools,
            script: PathBuf::from(DEFAULT_BUILDER_SCRIPT),
            workdir: workdir.into(),
            origin: None,
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    /// Resolve relative paths against `dir` instead of the working directory
    /// the builder runs in.
    pub fn relative_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.origin = Some(dir.into());
        self
    }

    fn anchored(&self, path: &Path) -> PathBuf {
        match &self.origin {
            Some(origin) if path.is_relative() => origin.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Where the index for `mode` lands
    pub fn artifact_path(&self, mode: DatastoreMode) -> PathBuf {
        self.workdir.join(mode.file_name())
    }

    pub fn invocation(&self, model_path: &Path, mode: DatastoreMode) -> Invocation {
        Invocation::new("datastore-builder", &self.tools.python)
            .arg(self.anchored(&self.script).display().to_string())
            .flag("--model-path", self.anchored(model_path).display())
            .flag("--large-datastore", mode.is_large())
            .current_dir(&self.workdir)
    }

    /// Run the builder and wait for it. Failures are surfaced as-is; no
    /// retry and no cleanup of partial output.
    pub fn build(&self, model_path: &Path, mode: DatastoreMode) -> Result<DatastoreArtifact> {
        let invocation = self.invocation(model_path, mode);
        tracing::info!(
            model_path = %model_path.display(),
            %mode,
            workdir = %self.workdir.display(),
            "building datastore"
        );
        fs::create_dir_all(&self.workdir).map_err(|e| BenchError::io(&self.workdir, e))?;
        self.runner.run(&invocation, OutputMode::Inherit)?;

        let path = self.artifact_path(mode);
        if !path.exists() {
            return Err(BenchError::missing(ArtifactRole::Datastore, &path));
        }

        Ok(DatastoreArtifact { path, mode })
    }
}
