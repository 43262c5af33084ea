//! Run configuration
//!
//! All settings are resolved once, at the process boundary, from (lowest to
//! highest precedence) built-in defaults, a shell-style config file, the
//! process environment and command-line flags. Components receive the
//! resulting [`RunConfiguration`] and [`ToolSettings`] and never read the
//! environment themselves.

pub mod devices;
pub mod envfile;

use crate::error::{BenchError, Result};
use crate::method::params::name_for_env_key;
use crate::method::{HyperParams, HyperValue, Method, ParamKind};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub use devices::DeviceList;
pub use envfile::ConfigFile;

pub const DEFAULT_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_SEED: u64 = 2024;
pub const DEFAULT_MAX_NEW_TOKENS: u32 = 1024;
pub const DEFAULT_TOP_P: f64 = 0.85;
pub const DEFAULT_BENCH_NAME: &str = "spec_bench";
pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_PYTHON: &str = "python";

/// Config-file keys that are not method hyperparameters
const COMMON_KEYS: &[&str] = &[
    "MODEL_PATH",
    "MODEL_ID",
    "TEMP",
    "SEED",
    "MAX_NEW_TOKENS",
    "TORCH_DTYPE",
    "BENCH_NAME",
    "TOP_P",
    "GPU_DEVICES",
    "DATA_ROOT",
    "PYTHON",
    "TIMEOUT_SECS",
    "USE_LADE",
    "CUDA_VISIBLE_DEVICES",
    "DATASTORE_PATH",
    "NUM_CHOICES",
    "NUM_GPUS_PER_MODEL",
    "QUESTION_BEGIN",
    "QUESTION_END",
];

/// Numeric precision of the model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Float32,
    Float64,
    #[default]
    Float16,
    Bfloat16,
}

impl Dtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
            Dtype::Float16 => "float16",
            Dtype::Bfloat16 => "bfloat16",
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dtype {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float32" => Ok(Dtype::Float32),
            "float64" => Ok(Dtype::Float64),
            "float16" => Ok(Dtype::Float16),
            "bfloat16" => Ok(Dtype::Bfloat16),
            other => Err(BenchError::config(format!(
                "unknown dtype '{}' (expected float32, float64, float16 or bfloat16)",
                other
            ))),
        }
    }
}

/// Snapshot of the process environment, taken once in `main`
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot(HashMap<String, String>);

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self(std::env::vars().collect())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub model_path: Option<PathBuf>,
    pub model_id: Option<String>,
    pub temperature: Option<f64>,
    pub seed: Option<u64>,
    pub max_new_tokens: Option<u32>,
    pub dtype: Option<String>,
    pub bench_name: Option<String>,
    pub top_p: Option<f64>,
    pub devices: Option<String>,
    pub data_root: Option<PathBuf>,
    pub datastore: Option<PathBuf>,
    pub answer_file: Option<PathBuf>,
    pub num_choices: Option<u32>,
    pub num_gpus_per_model: Option<u32>,
    /// Debug subset: first question index (inclusive)
    pub question_begin: Option<u32>,
    /// Debug subset: last question index (exclusive)
    pub question_end: Option<u32>,
    /// Method hyperparameters keyed by canonical name
    pub params: Vec<(String, HyperValue)>,
}

/// How external tools are launched
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub python: String,
    pub timeout: Option<Duration>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            python: DEFAULT_PYTHON.to_string(),
            timeout: None,
        }
    }
}

/// Immutable description of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfiguration {
    model_id: String,
    model_path: PathBuf,
    dtype: Dtype,
    method: Method,
    temperature: f64,
    seed: u64,
    max_new_tokens: u32,
    bench_name: String,
    top_p: f64,
    hyperparams: HyperParams,
    devices: DeviceList,
    datastore: Option<PathBuf>,
    data_root: PathBuf,
    answer_file: Option<PathBuf>,
    num_choices: Option<u32>,
    num_gpus_per_model: Option<u32>,
    question_begin: Option<u32>,
    question_end: Option<u32>,
}

impl RunConfiguration {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    pub fn bench_name(&self) -> &str {
        &self.bench_name
    }

    pub fn top_p(&self) -> f64 {
        self.top_p
    }

    pub fn hyperparams(&self) -> &HyperParams {
        &self.hyperparams
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    pub fn datastore(&self) -> Option<&Path> {
        self.datastore.as_deref()
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Explicit transcript path, overriding the derived one
    pub fn answer_file(&self) -> Option<&Path> {
        self.answer_file.as_deref()
    }

    /// Answers generated per question; `None` leaves the job's default
    pub fn num_choices(&self) -> Option<u32> {
        self.num_choices
    }

    pub fn num_gpus_per_model(&self) -> Option<u32> {
        self.num_gpus_per_model
    }

    /// Half-open `[begin, end)` subset of the question file, if restricted
    pub fn question_range(&self) -> (Option<u32>, Option<u32>) {
        (self.question_begin, self.question_end)
    }
}

/// Resolves settings from the config file and the environment snapshot
pub struct Resolver<'a> {
    file: &'a ConfigFile,
    env: &'a EnvSnapshot,
}

impl<'a> Resolver<'a> {
    pub fn new(file: &'a ConfigFile, env: &'a EnvSnapshot) -> Self {
        Self { file, env }
    }

    /// Resolve tool launch settings
    pub fn tool_settings(
        &self,
        python: Option<&str>,
        timeout_secs: Option<u64>,
    ) -> Result<ToolSettings> {
        let python = python
            .map(str::to_string)
            .or_else(|| self.env.get("SPECBENCH_PYTHON").map(str::to_string))
            .or_else(|| self.file.get("PYTHON").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_PYTHON.to_string());

        let timeout_secs = match timeout_secs {
            Some(secs) => Some(secs),
            None => self
                .file
                .get("TIMEOUT_SECS")
                .map(|raw| parse_value::<u64>("TIMEOUT_SECS", raw))
                .transpose()?,
        };

        let timeout = match timeout_secs {
            Some(0) => return Err(BenchError::config("timeout must be at least one second")),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(ToolSettings { python, timeout })
    }

    /// Device list: flag, then `CUDA_VISIBLE_DEVICES`, then `GPU_DEVICES`
    pub fn devices(&self, flag: Option<&str>) -> Result<DeviceList> {
        let raw = flag
            .or_else(|| self.env.get("CUDA_VISIBLE_DEVICES"))
            .or_else(|| self.file.get("GPU_DEVICES"));
        match raw {
            Some(raw) => raw.parse(),
            None => Ok(DeviceList::default()),
        }
    }

    /// Whether the lookahead opt-in flag is enabled (default on)
    pub fn lade_enabled(&self) -> Result<bool> {
        let raw = self
            .env
            .get("USE_LADE")
            .or_else(|| self.file.get("USE_LADE"));
        match raw {
            None => Ok(true),
            Some(raw) => match HyperValue::parse(ParamKind::Switch, "USE_LADE", raw)? {
                HyperValue::Switch(b) => Ok(b),
                _ => Ok(true),
            },
        }
    }

    /// Model path for commands that only need that one value
    pub fn model_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        flag.map(Path::to_path_buf)
            .or_else(|| self.file.get("MODEL_PATH").map(PathBuf::from))
            .ok_or_else(|| {
                BenchError::config("model path is required (--model-path or MODEL_PATH)")
            })
    }

    /// Build the run configuration for `method`
    pub fn run_configuration(
        &self,
        method: Method,
        overrides: &RunOverrides,
    ) -> Result<RunConfiguration> {
        let spec = method.spec();

        let model_path = self.model_path(overrides.model_path.as_deref())?;

        let model_id = match overrides
            .model_id
            .clone()
            .or_else(|| self.file.get("MODEL_ID").map(str::to_string))
        {
            Some(id) => id,
            None => model_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    BenchError::config("model id is required (--model-id or MODEL_ID)")
                })?,
        };
        validate_model_id(&model_id)?;

        let dtype = match overrides.dtype.as_deref().or_else(|| self.file.get("TORCH_DTYPE")) {
            Some(raw) => raw.parse()?,
            None => Dtype::default(),
        };

        let temperature = self.number(overrides.temperature, "TEMP", DEFAULT_TEMPERATURE)?;
        if !(temperature.is_finite() && temperature >= 0.0) {
            return Err(BenchError::config(format!(
                "temperature must be a non-negative number, got {}",
                temperature
            )));
        }

        let top_p = self.number(overrides.top_p, "TOP_P", DEFAULT_TOP_P)?;
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err(BenchError::config(format!("top-p must be in (0, 1], got {}", top_p)));
        }

        let seed = self.number(overrides.seed, "SEED", DEFAULT_SEED)?;

        let max_new_tokens = self.number(
            overrides.max_new_tokens,
            "MAX_NEW_TOKENS",
            DEFAULT_MAX_NEW_TOKENS,
        )?;
        if max_new_tokens == 0 {
            return Err(BenchError::config("max-new-tokens must be greater than zero"));
        }

        let bench_name = overrides
            .bench_name
            .clone()
            .or_else(|| self.file.get("BENCH_NAME").map(str::to_string))
            .unwrap_or_else(|| DEFAULT_BENCH_NAME.to_string());
        if bench_name.is_empty() || bench_name.contains('/') {
            return Err(BenchError::config(format!("invalid bench name '{}'", bench_name)));
        }

        let devices = self.devices(overrides.devices.as_deref())?;

        let num_choices = self.optional_number(overrides.num_choices, "NUM_CHOICES")?;
        if num_choices == Some(0) {
            return Err(BenchError::config("num-choices must be at least 1"));
        }

        let num_gpus_per_model =
            self.optional_number(overrides.num_gpus_per_model, "NUM_GPUS_PER_MODEL")?;
        match num_gpus_per_model {
            Some(0) => return Err(BenchError::config("num-gpus-per-model must be at least 1")),
            Some(n) if !devices.is_empty() && n as usize > devices.count() => {
                return Err(BenchError::config(format!(
                    "num-gpus-per-model is {} but only {} devices are visible",
                    n,
                    devices.count()
                )))
            }
            _ => {}
        }

        let question_begin = self.optional_number(overrides.question_begin, "QUESTION_BEGIN")?;
        let question_end = self.optional_number(overrides.question_end, "QUESTION_END")?;
        if let (Some(begin), Some(end)) = (question_begin, question_end) {
            if begin >= end {
                return Err(BenchError::config(format!(
                    "question range is empty: begin {} is not below end {}",
                    begin, end
                )));
            }
        }

        if spec.requires_lade && !self.lade_enabled()? {
            return Err(BenchError::config(format!(
                "{} requires the USE_LADE opt-in flag, which is disabled",
                method
            )));
        }

        let hyperparams = self.hyperparams(method, &overrides.params)?;

        let datastore = overrides
            .datastore
            .clone()
            .or_else(|| self.file.get("DATASTORE_PATH").map(PathBuf::from));
        if datastore.is_some() && !spec.accepts_datastore {
            return Err(BenchError::config(format!(
                "{} does not use a datastore",
                method
            )));
        }

        let data_root = overrides
            .data_root
            .clone()
            .or_else(|| self.file.get("DATA_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));

        Ok(RunConfiguration {
            model_id,
            model_path,
            dtype,
            method,
            temperature,
            seed,
            max_new_tokens,
            bench_name,
            top_p,
            hyperparams,
            devices,
            datastore,
            data_root,
            answer_file: overrides.answer_file.clone(),
            num_choices,
            num_gpus_per_model,
            question_begin,
            question_end,
        })
    }

    fn number<T>(&self, flag: Option<T>, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
    {
        match flag {
            Some(v) => Ok(v),
            None => match self.file.get(key) {
                Some(raw) => parse_value(key, raw),
                None => Ok(default),
            },
        }
    }

    fn optional_number<T: FromStr>(&self, flag: Option<T>, key: &str) -> Result<Option<T>> {
        match flag {
            Some(v) => Ok(Some(v)),
            None => self.file.get(key).map(|raw| parse_value(key, raw)).transpose(),
        }
    }

    /// Method hyperparameters: declared defaults, overridden by the config
    /// file, overridden by flags. Anything the method does not declare is an
    /// error.
    fn hyperparams(&self, method: Method, flags: &[(String, HyperValue)]) -> Result<HyperParams> {
        let spec = method.spec();

        for (name, _) in flags {
            if spec.param(name).is_none() {
                return Err(BenchError::config(format!(
                    "{} does not accept --{}",
                    method, name
                )));
            }
        }

        for (key, _) in self.file.iter() {
            if COMMON_KEYS.contains(&key) {
                continue;
            }
            let name = name_for_env_key(key);
            if spec.param(&name).is_none() && is_known_param(&name) {
                tracing::debug!(key, %method, "ignoring config key not used by this method");
            }
        }

        let mut params = HyperParams::default();
        for p in spec.params {
            let from_flag = flags.iter().rev().find(|(n, _)| n == p.name).map(|(_, v)| *v);
            let value = match from_flag {
                Some(v) => v.coerce(p.kind, p.name)?,
                None => match self.file.get(&p.env_key()) {
                    Some(raw) => HyperValue::parse(p.kind, p.name, raw)?,
                    None => p.default,
                },
            };
            validate_param(p.name, value)?;
            params.push(p.name, value);
        }

        Ok(params)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BenchError::config(format!("{}: cannot parse '{}'", key, raw)))
}

fn is_known_param(name: &str) -> bool {
    crate::method::table::METHODS
        .iter()
        .any(|s| s.param(name).is_some())
}

fn validate_model_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(BenchError::config("model id must not be empty"));
    }
    if id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(BenchError::config(format!(
            "model id '{}' must not contain '/' or whitespace",
            id
        )));
    }
    Ok(())
}

/// Value ranges; negative values would also make result names ambiguous
fn validate_param(name: &str, value: HyperValue) -> Result<()> {
    let Some(v) = value.as_f64() else {
        return Ok(());
    };
    let ok = match name {
        "skip-ratio" => (0.0..1.0).contains(&v),
        "draft-exit-threshold" | "max-score" => (0.0..=1.0).contains(&v),
        _ => v >= 0.0,
    };
    if ok {
        Ok(())
    } else {
        Err(BenchError::config(format!("{} is out of range: {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(path: &str) -> RunOverrides {
        RunOverrides {
            model_path: Some(PathBuf::from(path)),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let config = Resolver::new(&file, &env)
            .run_configuration(Method::Vanilla, &overrides("/models/vicuna-7b"))
            .unwrap();
        assert_eq!(config.model_id(), "vicuna-7b");
        assert_eq!(config.dtype(), Dtype::Float16);
        assert_eq!(config.temperature(), 0.0);
        assert_eq!(config.seed(), 2024);
        assert_eq!(config.max_new_tokens(), 1024);
        assert_eq!(config.bench_name(), "spec_bench");
        assert!(config.hyperparams().is_empty());
        assert!(config.devices().is_empty());
    }

    #[test]
    fn test_model_path_required() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let err = Resolver::new(&file, &env)
            .run_configuration(Method::Vanilla, &RunOverrides::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert!(err.to_string().contains("model path"));
    }

    #[test]
    fn test_flag_beats_file_beats_default() {
        let file = ConfigFile::parse("TEMP=0.7\nSEED=7\nSKIP_RATIO=0.3\nOPT_INTERVAL=64\n");
        let env = EnvSnapshot::default();
        let mut o = overrides("/m/demo");
        o.seed = Some(11);
        o.params.push(("opt-interval".to_string(), HyperValue::Int(128)));
        let config = Resolver::new(&file, &env)
            .run_configuration(Method::Clasp, &o)
            .unwrap();
        assert_eq!(config.temperature(), 0.7);
        assert_eq!(config.seed(), 11);
        let hp = config.hyperparams();
        assert_eq!(hp.get("skip-ratio"), Some(HyperValue::Float(0.3)));
        assert_eq!(hp.get("opt-interval"), Some(HyperValue::Int(128)));
        assert_eq!(hp.get("draft-length-k"), Some(HyperValue::Int(8)));
    }

    #[test]
    fn test_undeclared_param_rejected() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let mut o = overrides("/m/demo");
        o.params.push(("level".to_string(), HyperValue::Int(5)));
        let err = Resolver::new(&file, &env)
            .run_configuration(Method::Casspec, &o)
            .unwrap_err();
        assert!(err.to_string().contains("does not accept --level"));
    }

    #[test]
    fn test_devices_precedence() {
        let file = ConfigFile::parse("GPU_DEVICES=2\n");
        let env: EnvSnapshot = [("CUDA_VISIBLE_DEVICES", "0,1")].into_iter().collect();
        let resolver = Resolver::new(&file, &env);
        assert_eq!(resolver.devices(None).unwrap().indices(), &[0, 1]);
        assert_eq!(resolver.devices(Some("3")).unwrap().indices(), &[3]);

        let empty = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &empty);
        assert_eq!(resolver.devices(None).unwrap().indices(), &[2]);
    }

    #[test]
    fn test_malformed_devices_rejected() {
        let file = ConfigFile::default();
        let env: EnvSnapshot = [("CUDA_VISIBLE_DEVICES", "0,,1")].into_iter().collect();
        let err = Resolver::new(&file, &env)
            .run_configuration(Method::Vanilla, &overrides("/m/demo"))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_lade_flag_gates_lookahead() {
        let file = ConfigFile::default();
        let env: EnvSnapshot = [("USE_LADE", "0")].into_iter().collect();
        let resolver = Resolver::new(&file, &env);
        assert!(resolver
            .run_configuration(Method::Lookahead, &overrides("/m/demo"))
            .is_err());
        assert!(resolver
            .run_configuration(Method::Vanilla, &overrides("/m/demo"))
            .is_ok());

        let env = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &env);
        assert!(resolver
            .run_configuration(Method::Lookahead, &overrides("/m/demo"))
            .is_ok());
    }

    #[test]
    fn test_out_of_range_values() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &env);

        let mut o = overrides("/m/demo");
        o.temperature = Some(-0.1);
        assert!(resolver.run_configuration(Method::Vanilla, &o).is_err());

        let mut o = overrides("/m/demo");
        o.params.push(("skip-ratio".to_string(), HyperValue::Float(1.0)));
        assert!(resolver.run_configuration(Method::Swift, &o).is_err());

        let mut o = overrides("/m/demo");
        o.max_new_tokens = Some(0);
        assert!(resolver.run_configuration(Method::Vanilla, &o).is_err());
    }

    #[test]
    fn test_model_id_validation() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let mut o = overrides("/m/demo");
        o.model_id = Some("org/model".to_string());
        assert!(Resolver::new(&file, &env)
            .run_configuration(Method::Vanilla, &o)
            .is_err());
    }

    #[test]
    fn test_datastore_only_for_retrieval_methods() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &env);
        let mut o = overrides("/m/demo");
        o.datastore = Some(PathBuf::from("datastore_chat_small.idx"));
        assert!(resolver.run_configuration(Method::Vanilla, &o).is_err());
        let config = resolver.run_configuration(Method::Casspec, &o).unwrap();
        assert_eq!(config.datastore(), Some(Path::new("datastore_chat_small.idx")));
    }

    #[test]
    fn test_tool_settings() {
        let file = ConfigFile::parse("PYTHON=python3\nTIMEOUT_SECS=60\n");
        let env = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &env);
        let tools = resolver.tool_settings(None, None).unwrap();
        assert_eq!(tools.python, "python3");
        assert_eq!(tools.timeout, Some(Duration::from_secs(60)));

        let env: EnvSnapshot = [("SPECBENCH_PYTHON", "/venv/bin/python")].into_iter().collect();
        let resolver = Resolver::new(&file, &env);
        let tools = resolver.tool_settings(None, Some(5)).unwrap();
        assert_eq!(tools.python, "/venv/bin/python");
        assert_eq!(tools.timeout, Some(Duration::from_secs(5)));
        assert!(resolver.tool_settings(None, Some(0)).is_err());
    }

    #[test]
    fn test_question_range_and_choices() {
        let file = ConfigFile::parse("QUESTION_BEGIN=10\nNUM_CHOICES=3\n");
        let env = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &env);

        let mut o = overrides("/m/demo");
        o.question_end = Some(20);
        let config = resolver.run_configuration(Method::Vanilla, &o).unwrap();
        assert_eq!(config.question_range(), (Some(10), Some(20)));
        assert_eq!(config.num_choices(), Some(3));
        assert_eq!(config.num_gpus_per_model(), None);

        o.question_end = Some(10);
        assert!(resolver.run_configuration(Method::Vanilla, &o).is_err());

        let mut o = overrides("/m/demo");
        o.num_choices = Some(0);
        assert!(resolver.run_configuration(Method::Vanilla, &o).is_err());
    }

    #[test]
    fn test_gpus_per_model_bounded_by_devices() {
        let file = ConfigFile::default();
        let env = EnvSnapshot::default();
        let resolver = Resolver::new(&file, &env);

        let mut o = overrides("/m/demo");
        o.devices = Some("0,1".to_string());
        o.num_gpus_per_model = Some(2);
        assert_eq!(
            resolver
                .run_configuration(Method::Vanilla, &o)
                .unwrap()
                .num_gpus_per_model(),
            Some(2)
        );

        o.num_gpus_per_model = Some(4);
        assert!(resolver.run_configuration(Method::Vanilla, &o).is_err());
    }

    #[test]
    fn test_dtype_parse() {
        assert_eq!("BFloat16".parse::<Dtype>().unwrap(), Dtype::Bfloat16);
        assert!("int8".parse::<Dtype>().is_err());
    }
}
