//! Shell-style configuration file parsing
//!
//! Benchmark settings traditionally live in the run scripts as plain
//! variable assignments. This module reads the same dialect:
//! - `KEY=value`, `KEY="value"`, `KEY='value'`
//! - `export KEY=value`
//! - `# comments` and blank lines
//! - `${KEY}` / `$KEY` references to keys assigned earlier in the file

use crate::error::{BenchError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name looked up in the working directory and the user config dir
pub const DEFAULT_FILE_NAME: &str = "specbench.env";

/// Parsed key/value assignments from a config file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    values: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Parse configuration from content string
    pub fn parse(content: &str) -> Self {
        let mut values: BTreeMap<String, String> = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);

            if let Some((key, value)) = parse_assignment(line) {
                let value = expand(&unquote(&value), &values);
                values.insert(key, value);
            }
        }

        Self { values }
    }

    /// Read and parse a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BenchError::config(format!("config file not found: {}", path.display()))
            } else {
                BenchError::io(path, e)
            }
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(Self::parse(&content))
    }

    /// Load the first config file that applies.
    ///
    /// An explicit path must exist. Otherwise `specbench.env` in the working
    /// directory, then in the user config directory, is used if present.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates = [
            Some(cwd.join(DEFAULT_FILE_NAME)),
            dirs::config_dir().map(|d| d.join("specbench").join(DEFAULT_FILE_NAME)),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }

        Ok(Self::default())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a shell variable assignment (KEY=value or KEY="value")
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim().to_string();
    let value = line[eq_pos + 1..].trim().to_string();

    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    Some((key, value))
}

/// Remove surrounding quotes from a value
fn unquote(s: &str) -> String {
    let s = s.trim();

    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return s[1..s.len() - 1].to_string();
    }

    s.to_string()
}

/// Substitute `$KEY` and `${KEY}` with earlier assignments; unknown keys expand to nothing
fn expand(value: &str, known: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut name = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_alphanumeric() || n == '_' {
                name.push(n);
                chars.next();
            } else {
                break;
            }
        }

        if braced {
            if chars.peek() == Some(&'}') {
                chars.next();
            } else {
                // Unterminated reference stays literal
                out.push_str("${");
                out.push_str(&name);
                continue;
            }
        }

        if name.is_empty() {
            out.push('$');
            if braced {
                out.push_str("{}");
            }
            continue;
        }

        if let Some(v) = known.get(&name) {
            out.push_str(v);
        }
    }

    out
}
