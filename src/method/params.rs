//! Method hyperparameters: declared parameters and their resolved values

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of value a hyperparameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    /// Boolean switch, emitted as a bare flag when true
    Switch,
}

/// A resolved hyperparameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperValue {
    Switch(bool),
    Int(i64),
    Float(f64),
}

impl HyperValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            HyperValue::Int(_) => ParamKind::Int,
            HyperValue::Float(_) => ParamKind::Float,
            HyperValue::Switch(_) => ParamKind::Switch,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HyperValue::Int(v) => Some(*v as f64),
            HyperValue::Float(v) => Some(*v),
            HyperValue::Switch(_) => None,
        }
    }

    /// Parse a raw config value for a parameter of the given kind
    pub fn parse(kind: ParamKind, name: &str, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match kind {
            ParamKind::Int => raw.parse::<i64>().map(HyperValue::Int).map_err(|_| {
                BenchError::config(format!("{}: expected an integer, got '{}'", name, raw))
            }),
            ParamKind::Float => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(HyperValue::Float(v)),
                _ => Err(BenchError::config(format!(
                    "{}: expected a number, got '{}'",
                    name, raw
                ))),
            },
            ParamKind::Switch => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(HyperValue::Switch(true)),
                "0" | "false" | "no" | "off" | "" => Ok(HyperValue::Switch(false)),
                _ => Err(BenchError::config(format!(
                    "{}: expected true or false, got '{}'",
                    name, raw
                ))),
            },
        }
    }

    /// Coerce to the declared kind; integers are accepted for float parameters
    pub fn coerce(self, kind: ParamKind, name: &str) -> Result<Self> {
        match (self, kind) {
            (HyperValue::Int(v), ParamKind::Float) => Ok(HyperValue::Float(v as f64)),
            (v, k) if v.kind() == k => Ok(v),
            (v, k) => Err(BenchError::config(format!(
                "{}: expected {:?}, got {}",
                name, k, v
            ))),
        }
    }
}

/// Renders the way Python's `str()` does: floats always carry a fractional
/// part (`0.0`, `128.0`) and switch to a two-digit exponent outside
/// `[1e-4, 1e16)` (`1e-07`, `2.5e+16`).
impl fmt::Display for HyperValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperValue::Switch(b) => write!(f, "{}", b),
            HyperValue::Int(v) => write!(f, "{}", v),
            HyperValue::Float(v) => f.write_str(&python_float(*v)),
        }
    }
}

/// Shortest round-trip rendering in Python's `repr` layout
fn python_float(v: f64) -> String {
    let magnitude = v.abs();
    if v != 0.0 && v.is_finite() && !(1e-4..1e16).contains(&magnitude) {
        let sci = format!("{:e}", v);
        if let Some((mantissa, exp)) = sci.split_once('e') {
            if let Ok(exp) = exp.parse::<i32>() {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exp.abs());
            }
        }
        return sci;
    }

    let plain = v.to_string();
    if v.is_finite() && !plain.contains('.') {
        format!("{}.0", plain)
    } else {
        plain
    }
}

/// A hyperparameter declared by a method
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Canonical lowercase name, also used in result file names
    pub name: &'static str,
    /// Flag passed to the external process
    pub flag: &'static str,
    pub kind: ParamKind,
    pub default: HyperValue,
    pub help: &'static str,
}

impl ParamSpec {
    pub const fn int(
        name: &'static str,
        flag: &'static str,
        default: i64,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            flag,
            kind: ParamKind::Int,
            default: HyperValue::Int(default),
            help,
        }
    }

    pub const fn float(
        name: &'static str,
        flag: &'static str,
        default: f64,
        help: &'static str,
    ) -> Self {
        Self {
            name,
            flag,
            kind: ParamKind::Float,
            default: HyperValue::Float(default),
            help,
        }
    }

    pub const fn switch(name: &'static str, flag: &'static str, help: &'static str) -> Self {
        Self {
            name,
            flag,
            kind: ParamKind::Switch,
            default: HyperValue::Switch(false),
            help,
        }
    }

    /// Key under which the parameter appears in shell-style config files
    pub fn env_key(&self) -> String {
        env_key_for(self.name)
    }
}

/// `draft-length-k` -> `DRAFT_LENGTH_K`
pub fn env_key_for(name: &str) -> String {
    name.replace('-', "_").to_ascii_uppercase()
}

/// `DRAFT_LENGTH_K` -> `draft-length-k`
pub fn name_for_env_key(key: &str) -> String {
    key.replace('_', "-").to_ascii_lowercase()
}

/// Resolved hyperparameters of one run, in the method's declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HyperParams {
    entries: Vec<(&'static str, HyperValue)>,
}

impl HyperParams {
    pub fn push(&mut self, name: &'static str, value: HyperValue) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<HyperValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, HyperValue)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_display_keeps_fraction() {
        assert_eq!(HyperValue::Float(0.0).to_string(), "0.0");
        assert_eq!(HyperValue::Float(0.4).to_string(), "0.4");
        assert_eq!(HyperValue::Float(128.0).to_string(), "128.0");
        assert_eq!(HyperValue::Int(128).to_string(), "128");
        assert_eq!(HyperValue::Switch(true).to_string(), "true");
    }

    #[test]
    fn test_float_display_uses_python_exponents() {
        assert_eq!(HyperValue::Float(1e-7).to_string(), "1e-07");
        assert_eq!(HyperValue::Float(1.5e-5).to_string(), "1.5e-05");
        assert_eq!(HyperValue::Float(0.0001).to_string(), "0.0001");
        assert_eq!(HyperValue::Float(1e16).to_string(), "1e+16");
        assert_eq!(HyperValue::Float(0.1 + 0.2).to_string(), "0.30000000000000004");
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(
            HyperValue::parse(ParamKind::Int, "level", "5").unwrap(),
            HyperValue::Int(5)
        );
        assert_eq!(
            HyperValue::parse(ParamKind::Float, "skip-ratio", " 0.45 ").unwrap(),
            HyperValue::Float(0.45)
        );
        assert_eq!(
            HyperValue::parse(ParamKind::Switch, "hc", "True").unwrap(),
            HyperValue::Switch(true)
        );
        assert!(HyperValue::parse(ParamKind::Int, "level", "5.5").is_err());
        assert!(HyperValue::parse(ParamKind::Float, "skip-ratio", "NaN").is_err());
        assert!(HyperValue::parse(ParamKind::Switch, "hc", "maybe").is_err());
    }

    #[test]
    fn test_coerce_int_to_float() {
        let v = HyperValue::Int(1).coerce(ParamKind::Float, "max-score").unwrap();
        assert_eq!(v, HyperValue::Float(1.0));
        assert!(HyperValue::Float(1.5).coerce(ParamKind::Int, "level").is_err());
    }

    #[test]
    fn test_env_key_mapping() {
        assert_eq!(env_key_for("draft-length-k"), "DRAFT_LENGTH_K");
        assert_eq!(name_for_env_key("SKIP_RATIO"), "skip-ratio");
    }

    #[test]
    fn test_hyper_params_keep_order() {
        let mut params = HyperParams::default();
        params.push("skip-ratio", HyperValue::Float(0.4));
        params.push("opt-interval", HyperValue::Int(128));
        let names: Vec<_> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["skip-ratio", "opt-interval"]);
        assert_eq!(params.get("opt-interval"), Some(HyperValue::Int(128)));
        assert_eq!(params.get("level"), None);
    }
}
