//! Help text database for specbench errors
//!
//! Each error code can be looked up to get guidance on how to fix the issue.
//! External jobs take minutes to hours, so the help never suggests blind
//! retries.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Help text entry for an error
#[derive(Debug, Clone)]
pub struct HelpEntry {
    /// Short title of the problem
    pub title: &'static str,
    /// Detailed explanation of the error
    pub explanation: &'static str,
    /// How to fix the issue
    pub fix: &'static str,
}

/// Get help text for an error code
pub fn get_help(error_code: &str) -> Option<&'static HelpEntry> {
    HELP_DATABASE.get(error_code).copied()
}

static HELP_DATABASE: LazyLock<HashMap<&'static str, &'static HelpEntry>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();

        map.insert("CONFIGURATION_ERROR", &HELP_CONFIGURATION_ERROR);
        map.insert("UNSUPPORTED_METHOD", &HELP_UNSUPPORTED_METHOD);
        map.insert("EXTERNAL_PROCESS_FAILED", &HELP_EXTERNAL_PROCESS_FAILED);
        map.insert("MISSING_ARTIFACT", &HELP_MISSING_ARTIFACT);
        map.insert("PROCESS_TIMEOUT", &HELP_PROCESS_TIMEOUT);
        map.insert("INTERRUPTED", &HELP_INTERRUPTED);
        map.insert("SPAWN_FAILED", &HELP_SPAWN_FAILED);
        map.insert("INVALID_TRANSCRIPT", &HELP_INVALID_TRANSCRIPT);

        map
    });

const HELP_CONFIGURATION_ERROR: HelpEntry = HelpEntry {
    title: "Invalid or incomplete run configuration",
    explanation: "A required value such as the model path is missing, a value \
        could not be parsed, or a hyperparameter was given to a method that does \
        not declare it.",
    fix: "1. Pass --model-path or set MODEL_PATH in specbench.env\n\
        2. Check GPU_DEVICES / CUDA_VISIBLE_DEVICES is a comma-separated list of indices\n\
        3. Run 'specbench methods' to see which flags each method accepts",
};

const HELP_UNSUPPORTED_METHOD: HelpEntry = HelpEntry {
    title: "Unknown decoding method",
    explanation: "Only the methods in the dispatch table can be run, one per invocation.",
    fix: "Run 'specbench methods' to list the supported method names.",
};

const HELP_EXTERNAL_PROCESS_FAILED: HelpEntry = HelpEntry {
    title: "External job failed",
    explanation: "The Python job exited with a non-zero status. Its own output above \
        usually names the cause (CUDA out of memory, missing checkpoint, bad flag).",
    fix: "1. Read the job's stderr above this message\n\
        2. Re-run with --dry-run to print the exact command line\n\
        3. Run that command by hand from the benchmark checkout",
};

const HELP_MISSING_ARTIFACT: HelpEntry = HelpEntry {
    title: "Required file not found",
    explanation: "A step depends on a file produced by an earlier step. The baseline \
        (vanilla) transcript must exist before any comparison runs.",
    fix: "1. Run 'specbench run --method vanilla' for the same model first\n\
        2. Check --base-path / --file-path for typos\n\
        3. Build the datastore with 'specbench build-datastore' before retrieval runs",
};

const HELP_PROCESS_TIMEOUT: HelpEntry = HelpEntry {
    title: "External job exceeded the configured timeout",
    explanation: "The job ran longer than --timeout-secs and was terminated together \
        with its process group.",
    fix: "Raise --timeout-secs (or TIMEOUT_SECS), or omit it to wait indefinitely.",
};

const HELP_INTERRUPTED: HelpEntry = HelpEntry {
    title: "Run interrupted",
    explanation: "specbench received a termination signal and passed it on to the \
        running job before exiting.",
    fix: "Partial outputs are left in place. Delete the transcript before running \
        the method again.",
};

const HELP_SPAWN_FAILED: HelpEntry = HelpEntry {
    title: "Could not start the external job",
    explanation: "The Python interpreter or builder script could not be executed.",
    fix: "1. Set --python or SPECBENCH_PYTHON to the interpreter of the benchmark environment\n\
        2. Run specbench from the benchmark checkout so 'evaluation' is importable",
};

const HELP_INVALID_TRANSCRIPT: HelpEntry = HelpEntry {
    title: "Transcript contains a malformed record",
    explanation: "Every line of a transcript must be one JSON object. A truncated last \
        line usually means the run crashed while writing.",
    fix: "Delete the partial transcript and run the method again.",
};
