//! Dispatch table: one entry per decoding method

use super::params::ParamSpec;
use super::Method;

/// Everything needed to invoke one decoding method
#[derive(Debug, Clone, Copy)]
pub struct MethodSpec {
    pub method: Method,
    /// Python module run with `python -m`
    pub module: &'static str,
    /// Declared hyperparameters, in argument and file-name order
    pub params: &'static [ParamSpec],
    /// Extra environment for the child process
    pub env: &'static [(&'static str, &'static str)],
    /// Whether the method can consume a datastore index
    pub accepts_datastore: bool,
    /// Whether the method needs the lookahead opt-in flag
    pub requires_lade: bool,
    pub summary: &'static str,
}

impl MethodSpec {
    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

const LOOKAHEAD_PARAMS: &[ParamSpec] = &[
    ParamSpec::int("level", "--level", 5, "n-gram size of the lookahead window"),
    ParamSpec::int("window", "--window", 7, "lookahead window width"),
    ParamSpec::int("guess", "--guess", 7, "maximum verified n-gram guesses per step"),
];

const SWIFT_PARAMS: &[ParamSpec] = &[
    ParamSpec::float(
        "skip-ratio",
        "--skip-ratio",
        0.45,
        "fraction of layers skipped while drafting",
    ),
    ParamSpec::int("opt-interval", "--opt-interval", 1, "steps between layer-set optimizations"),
    ParamSpec::int(
        "bayes-interval",
        "--bayes-interval",
        25,
        "steps between Bayesian optimization rounds",
    ),
    ParamSpec::int("max-opt-iter", "--max-opt-iter", 1000, "optimization iteration budget"),
    ParamSpec::int(
        "max-tolerance-iter",
        "--max-tolerance-iter",
        300,
        "iterations without improvement before stopping",
    ),
    ParamSpec::float("max-score", "--max-score", 0.93, "matchness score that stops optimization"),
    ParamSpec::int(
        "context-window",
        "--context-window",
        32,
        "tokens of context used for optimization",
    ),
    ParamSpec::switch("optimization", "--optimization", "enable on-the-fly layer-set optimization"),
    ParamSpec::switch("bayes", "--bayes", "enable Bayesian optimization"),
];

const CLASP_PARAMS: &[ParamSpec] = &[
    ParamSpec::float(
        "skip-ratio",
        "--skip-ratio",
        0.5,
        "fraction of layers skipped while drafting",
    ),
    ParamSpec::int(
        "opt-interval",
        "--opt-interval",
        1,
        "accepted tokens between layer-skip optimizations",
    ),
    ParamSpec::float(
        "draft-exit-threshold",
        "--draft-exit-threshold",
        0.7,
        "draft confidence below which drafting stops",
    ),
    ParamSpec::int("draft-length-k", "--draft-length-K", 8, "maximum tokens drafted per step"),
    ParamSpec::switch("hc", "-hc", "horizontal cascade with prompt lookup"),
    ParamSpec::switch("vc", "-vc", "vertical cascade with prompt lookup"),
];

const CASSPEC_PARAMS: &[ParamSpec] = &[
    ParamSpec::float(
        "skip-ratio",
        "--skip-ratio",
        0.5,
        "fraction of layers skipped while drafting",
    ),
    ParamSpec::int(
        "opt-interval",
        "--opt-interval",
        1,
        "accepted tokens between layer-skip optimizations",
    ),
    ParamSpec::float(
        "draft-exit-threshold",
        "--draft-exit-threshold",
        0.7,
        "draft confidence below which drafting stops",
    ),
    ParamSpec::int("draft-length-k", "--draft-length-K", 8, "maximum tokens drafted per step"),
    ParamSpec::switch("hc", "-hc", "historical cache"),
];

/// Dispatch table. Adding a method means adding one entry here.
pub static METHODS: &[MethodSpec] = &[
    MethodSpec {
        method: Method::Vanilla,
        module: "evaluation.inference_baseline",
        params: &[],
        env: &[],
        accepts_datastore: false,
        requires_lade: false,
        summary: "autoregressive baseline",
    },
    MethodSpec {
        method: Method::Pld,
        module: "evaluation.inference_pld",
        params: &[],
        env: &[],
        accepts_datastore: false,
        requires_lade: false,
        summary: "prompt lookup decoding",
    },
    MethodSpec {
        method: Method::Recycling,
        module: "evaluation.inference_recycling",
        params: &[],
        env: &[],
        accepts_datastore: false,
        requires_lade: false,
        summary: "token recycling",
    },
    MethodSpec {
        method: Method::Lookahead,
        module: "evaluation.inference_lookahead",
        params: LOOKAHEAD_PARAMS,
        env: &[("USE_LADE", "1")],
        accepts_datastore: false,
        requires_lade: true,
        summary: "lookahead decoding",
    },
    MethodSpec {
        method: Method::Swift,
        module: "evaluation.inference_swift",
        params: SWIFT_PARAMS,
        env: &[],
        accepts_datastore: false,
        requires_lade: false,
        summary: "on-the-fly self-speculative decoding with layer skipping",
    },
    MethodSpec {
        method: Method::SwiftPld,
        module: "evaluation.inference_swift_pld",
        params: SWIFT_PARAMS,
        env: &[],
        accepts_datastore: false,
        requires_lade: false,
        summary: "SWIFT drafting combined with prompt lookup",
    },
    MethodSpec {
        method: Method::Clasp,
        module: "evaluation.inference_clasp",
        params: CLASP_PARAMS,
        env: &[],
        accepts_datastore: false,
        requires_lade: false,
        summary: "dynamic layer skipping chosen by dynamic programming",
    },
    MethodSpec {
        method: Method::Casspec,
        module: "evaluation.inference_casspec",
        params: CASSPEC_PARAMS,
        env: &[],
        accepts_datastore: true,
        requires_lade: false,
        summary: "cascaded self-speculation with historical cache",
    },
];
