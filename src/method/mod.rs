//! Decoding methods and their dispatch
//!
//! The set of methods is closed. Each method maps to exactly one entry of
//! the dispatch table in [`table`], which knows the external module to run
//! and the hyperparameters it accepts.

pub mod dispatch;
pub mod params;
pub mod table;

use crate::error::BenchError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use strsim::jaro_winkler;

pub use dispatch::MethodDispatcher;
pub use params::{HyperParams, HyperValue, ParamKind, ParamSpec};
pub use table::MethodSpec;

/// Minimum similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Vanilla,
    Pld,
    Recycling,
    Lookahead,
    Swift,
    SwiftPld,
    Clasp,
    Casspec,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Vanilla,
        Method::Pld,
        Method::Recycling,
        Method::Lookahead,
        Method::Swift,
        Method::SwiftPld,
        Method::Clasp,
        Method::Casspec,
    ];

    /// Canonical name, as used in result file names
    pub fn name(&self) -> &'static str {
        match self {
            Method::Vanilla => "vanilla",
            Method::Pld => "pld",
            Method::Recycling => "recycling",
            Method::Lookahead => "lookahead",
            Method::Swift => "swift",
            Method::SwiftPld => "swift-pld",
            Method::Clasp => "clasp",
            Method::Casspec => "casspec",
        }
    }

    /// The dispatch table entry for this method
    pub fn spec(&self) -> &'static MethodSpec {
        table::METHODS
            .iter()
            .find(|s| s.method == *self)
            .unwrap_or_else(|| unreachable!("dispatch table has no entry for {}", self.name()))
    }

    /// Closest supported name for a mistyped one
    pub fn suggest(name: &str) -> Option<&'static str> {
        let name = name.to_ascii_lowercase();
        Method::ALL
            .iter()
            .map(|m| (m.name(), jaro_winkler(&name, m.name())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(n, _)| n)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.trim().to_ascii_lowercase().as_str() {
            "vanilla" | "baseline" => Method::Vanilla,
            "pld" | "prompt-lookup-decoding" => Method::Pld,
            "recycling" => Method::Recycling,
            "lookahead" => Method::Lookahead,
            "swift" => Method::Swift,
            "swift-pld" | "swift+pld" => Method::SwiftPld,
            "clasp" => Method::Clasp,
            "casspec" => Method::Casspec,
            _ => {
                return Err(BenchError::UnsupportedMethod {
                    name: s.to_string(),
                    suggestion: Method::suggest(s).map(str::to_string),
                })
            }
        };
        Ok(method)
    }
}
