//! Command-line interface
//!
//! This is the process boundary: the environment snapshot and config file
//! are read here, turned into explicit settings, and handed to the
//! components.

use crate::compare::{self, SpeedComparator};
use crate::config::{ConfigFile, EnvSnapshot, Resolver, RunOverrides};
use crate::datastore::{DatastoreBuilder, DatastoreMode, DEFAULT_BUILDER_SCRIPT};
use crate::method::dispatch;
use crate::method::{HyperValue, Method, MethodDispatcher};
use crate::naming;
use crate::process::SystemRunner;
use crate::report::RunReport;
use crate::transcript::{self, TranscriptSummary};
use anyhow::{Context, Result};
use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Benchmark-invocation CLI for speculative decoding experiments.
#[derive(Parser, Debug)]
#[command(name = "specbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Shell-style config file (default: ./specbench.env).
    #[arg(long, global = true, env = "SPECBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Python interpreter used to launch external jobs.
    #[arg(long, global = true)]
    pub python: Option<String>,

    /// Kill external jobs that run longer than this.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List supported decoding methods and their hyperparameters.
    Methods,

    /// Run one decoding method and write its transcript.
    Run(RunArgs),

    /// Build the retrieval datastore index.
    BuildDatastore {
        #[arg(long)]
        model_path: Option<PathBuf>,

        /// Build the large datastore instead of the small one.
        #[arg(long, default_value = "false")]
        large_datastore: String,

        /// Directory the index is written to (default: current directory).
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Builder script.
        #[arg(long, default_value = DEFAULT_BUILDER_SCRIPT)]
        script: PathBuf,
    },

    /// Measure the speedup of a transcript against the baseline.
    Compare {
        #[arg(long)]
        base_path: PathBuf,

        #[arg(long)]
        file_path: PathBuf,

        #[arg(long, required_unless_present = "native")]
        tokenizer_path: Option<PathBuf>,

        /// Estimate from transcript timings instead of running the speed tool.
        #[arg(long)]
        native: bool,
    },

    /// Check that a transcript's answers match the baseline's.
    Equal {
        #[arg(long)]
        base_path: PathBuf,

        #[arg(long)]
        file_path: PathBuf,
    },

    /// Inspect or repair transcripts.
    Transcript {
        #[command(subcommand)]
        command: TranscriptCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TranscriptCommand {
    /// Print record count and throughput.
    Summarize {
        file: PathBuf,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Deduplicate by question id and sort, in place.
    Reorg { file: PathBuf },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Decoding method (see `specbench methods`).
    #[arg(long)]
    pub method: String,

    #[arg(long)]
    pub model_path: Option<PathBuf>,

    #[arg(long)]
    pub model_id: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub max_new_tokens: Option<u32>,

    /// float32, float64, float16 or bfloat16.
    #[arg(long)]
    pub dtype: Option<String>,

    #[arg(long)]
    pub bench_name: Option<String>,

    #[arg(long)]
    pub top_p: Option<f64>,

    /// Comma-separated GPU indices (overrides CUDA_VISIBLE_DEVICES).
    #[arg(long)]
    pub devices: Option<String>,

    /// Root of the benchmark data directory.
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Datastore index, for methods that use one.
    #[arg(long)]
    pub datastore_path: Option<PathBuf>,

    /// Write the transcript here instead of the derived path.
    #[arg(long)]
    pub answer_file: Option<PathBuf>,

    /// Answers generated per question.
    #[arg(long)]
    pub num_choices: Option<u32>,

    /// GPUs each model replica is spread over.
    #[arg(long)]
    pub num_gpus_per_model: Option<u32>,

    /// Debug subset: first question index (inclusive).
    #[arg(long)]
    pub question_begin: Option<u32>,

    /// Debug subset: last question index (exclusive).
    #[arg(long)]
    pub question_end: Option<u32>,

    #[command(flatten)]
    pub knobs: MethodKnobs,

    /// Print the command and transcript path without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Write a run report (.json or .md).
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Method-specific hyperparameters. Only the ones the selected method
/// declares may be given.
#[derive(Args, Debug, Default)]
pub struct MethodKnobs {
    #[arg(long)]
    pub skip_ratio: Option<f64>,
    #[arg(long)]
    pub opt_interval: Option<i64>,
    #[arg(long)]
    pub draft_exit_threshold: Option<f64>,
    #[arg(long = "draft-length-K", alias = "draft-length-k")]
    pub draft_length_k: Option<i64>,
    #[arg(long)]
    pub level: Option<i64>,
    #[arg(long)]
    pub window: Option<i64>,
    #[arg(long)]
    pub guess: Option<i64>,
    #[arg(long)]
    pub context_window: Option<i64>,
    #[arg(long)]
    pub bayes_interval: Option<i64>,
    #[arg(long)]
    pub max_opt_iter: Option<i64>,
    #[arg(long)]
    pub max_tolerance_iter: Option<i64>,
    #[arg(long)]
    pub max_score: Option<f64>,
    #[arg(long)]
    pub optimization: bool,
    #[arg(long)]
    pub bayes: bool,
    /// Historical cache / horizontal cascade (passed on as -hc).
    #[arg(long)]
    pub hc: bool,
    /// Vertical cascade (passed on as -vc).
    #[arg(long)]
    pub vc: bool,
}

impl MethodKnobs {
    /// Knobs given on the command line, keyed by canonical parameter name
    pub fn provided(&self) -> Vec<(String, HyperValue)> {
        let ints = [
            ("opt-interval", self.opt_interval),
            ("draft-length-k", self.draft_length_k),
            ("level", self.level),
            ("window", self.window),
            ("guess", self.guess),
            ("context-window", self.context_window),
            ("bayes-interval", self.bayes_interval),
            ("max-opt-iter", self.max_opt_iter),
            ("max-tolerance-iter", self.max_tolerance_iter),
        ];
        let floats = [
            ("skip-ratio", self.skip_ratio),
            ("draft-exit-threshold", self.draft_exit_threshold),
            ("max-score", self.max_score),
        ];
        let switches = [
            ("optimization", self.optimization),
            ("bayes", self.bayes),
            ("hc", self.hc),
            ("vc", self.vc),
        ];

        let mut out = Vec::new();
        for (name, v) in ints {
            if let Some(v) = v {
                out.push((name.to_string(), HyperValue::Int(v)));
            }
        }
        for (name, v) in floats {
            if let Some(v) = v {
                out.push((name.to_string(), HyperValue::Float(v)));
            }
        }
        for (name, on) in switches {
            if on {
                out.push((name.to_string(), HyperValue::Switch(true)));
            }
        }
        out
    }
}

impl RunArgs {
    pub fn overrides(&self) -> RunOverrides {
        RunOverrides {
            model_path: self.model_path.clone(),
            model_id: self.model_id.clone(),
            temperature: self.temperature,
            seed: self.seed,
            max_new_tokens: self.max_new_tokens,
            dtype: self.dtype.clone(),
            bench_name: self.bench_name.clone(),
            top_p: self.top_p,
            devices: self.devices.clone(),
            data_root: self.data_root.clone(),
            datastore: self.datastore_path.clone(),
            answer_file: self.answer_file.clone(),
            num_choices: self.num_choices,
            num_gpus_per_model: self.num_gpus_per_model,
            question_begin: self.question_begin,
            question_end: self.question_end,
            params: self.knobs.provided(),
        }
    }
}

fn init_tracing(verbose: u8, json: bool, env: &EnvSnapshot) {
    let filter = match (verbose, env.get("SPECBENCH_LOG")) {
        (0, Some(directives)) => EnvFilter::new(directives),
        (0, None) => EnvFilter::new("info"),
        (1, _) => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);

    // A subscriber may already be installed when embedded in tests
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Parse arguments from the process and run
pub fn run(env: EnvSnapshot) -> Result<()> {
    execute(Cli::parse(), env)
}

/// Run an already parsed command line
pub fn execute(cli: Cli, env: EnvSnapshot) -> Result<()> {
    init_tracing(cli.verbose, cli.log_json, &env);

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let file = ConfigFile::discover(cli.config.as_deref(), &cwd)?;

    let resolver = Resolver::new(&file, &env);
    let tools = resolver.tool_settings(cli.python.as_deref(), cli.timeout_secs)?;
    let runner = SystemRunner::new(tools.timeout);

    match cli.command {
        Commands::Methods => {
            print_methods();
        }

        Commands::Run(args) => {
            let overrides = args.overrides();
            let dispatcher = MethodDispatcher::new(&runner, &tools);

            if args.dry_run {
                let config = dispatch::configure(&args.method, &resolver, &overrides)?;
                println!("{}", dispatcher.invocation(&config).command_line());
                println!("questions: {}", naming::question_path(&config).display());
                println!("transcript: {}", naming::result_path(&config).display());
                return Ok(());
            }

            let started_at = Local::now();
            let outcome = dispatcher.dispatch(&args.method, &resolver, &overrides)?;
            let report = RunReport::new(&outcome, started_at);
            report.print_summary();
            if let Some(path) = args.report {
                report.write(&path)?;
                println!("Report saved to {}", path.display());
            }
        }

        Commands::BuildDatastore {
            model_path,
            large_datastore,
            workdir,
            script,
        } => {
            let model_path = resolver.model_path(model_path.as_deref())?;
            let mode: DatastoreMode = large_datastore.parse()?;
            let workdir = match workdir {
                Some(dir) => cwd.join(dir),
                None => cwd.clone(),
            };
            let artifact = DatastoreBuilder::new(&runner, &tools, workdir)
                .with_script(script)
                .relative_to(&cwd)
                .build(&model_path, mode)?;
            println!("Datastore written to {}", artifact.path.display());
        }

        Commands::Compare {
            base_path,
            file_path,
            tokenizer_path,
            native,
        } => {
            if native {
                let result = compare::compare_native(&base_path, &file_path)?;
                println!(
                    "Baseline: {:.2} tok/s over {} records",
                    result.baseline.mean_throughput, result.baseline.records
                );
                println!(
                    "Candidate: {:.2} tok/s over {} records",
                    result.candidate.mean_throughput, result.candidate.records
                );
                println!("Speedup ratio: {:.4}", result.speedup);
            } else {
                let tokenizer = tokenizer_path.context("--tokenizer-path is required")?;
                let result = SpeedComparator::new(&runner, &tools).compare(
                    &base_path,
                    &file_path,
                    &tokenizer,
                )?;
                if let Some(ratio) = result.speedup {
                    tracing::info!(speedup = ratio, "comparison finished");
                }
            }
        }

        Commands::Equal {
            base_path,
            file_path,
        } => {
            SpeedComparator::new(&runner, &tools).check_equal(&base_path, &file_path)?;
        }

        Commands::Transcript { command } => match command {
            TranscriptCommand::Summarize { file, json } => {
                let summary = TranscriptSummary::load(&file)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    println!("Records: {}", summary.records);
                    println!("New tokens: {:.0}", summary.total_new_tokens);
                    println!("Wall time: {:.2}s", summary.total_wall_time);
                    println!(
                        "Throughput: {:.2} tok/s (mean {:.2}, std dev {:.2})",
                        summary.throughput(),
                        summary.mean_throughput,
                        summary.std_dev_throughput
                    );
                }
            }
            TranscriptCommand::Reorg { file } => {
                let kept = transcript::reorganize(&file)?;
                println!("{} records kept in {}", kept, file.display());
            }
        },
    }

    Ok(())
}

fn print_methods() {
    for method in Method::ALL {
        let spec = method.spec();
        println!("{:<12} {}", method.name(), spec.summary);
        println!("{:<12} python -m {}", "", spec.module);
        if spec.accepts_datastore {
            println!("{:<12} accepts --datastore-path", "");
        }
        for p in spec.params {
            let flag = format!("{} {}", p.flag, p.default);
            println!("{:<14} {:<28} {}", "", flag, p.help);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_knobs() {
        let cli = Cli::try_parse_from([
            "specbench",
            "run",
            "--method",
            "casspec",
            "--model-path",
            "/models/demo-7b",
            "--skip-ratio",
            "0.4",
            "--draft-length-K",
            "6",
            "--hc",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let params = args.knobs.provided();
        assert!(params.contains(&("skip-ratio".to_string(), HyperValue::Float(0.4))));
        assert!(params.contains(&("draft-length-k".to_string(), HyperValue::Int(6))));
        assert!(params.contains(&("hc".to_string(), HyperValue::Switch(true))));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_compare_requires_tokenizer_unless_native() {
        assert!(Cli::try_parse_from([
            "specbench",
            "compare",
            "--base-path",
            "a",
            "--file-path",
            "b"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "specbench",
            "compare",
            "--base-path",
            "a",
            "--file-path",
            "b",
            "--native"
        ])
        .is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["specbench", "methods", "--timeout-secs", "30", "-vv"]).unwrap();
        assert_eq!(cli.timeout_secs, Some(30));
        assert_eq!(cli.verbose, 2);
    }
}
