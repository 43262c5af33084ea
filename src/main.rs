use specbench::config::EnvSnapshot;
use specbench::error::{BenchError, ErrorFormat, ErrorReport};
use std::process;

fn main() {
    let env = EnvSnapshot::capture();
    let format = ErrorFormat::from_setting(env.get("SPECBENCH_ERROR_FORMAT"));

    if let Err(err) = specbench::cli::run(env) {
        let report = match err.downcast_ref::<BenchError>() {
            Some(bench) => bench.report(),
            None => ErrorReport {
                error_code: "INTERNAL_ERROR".to_string(),
                message: format!("{:#}", err),
                exit_code: 1,
                context: None,
            },
        };
        eprintln!("specbench: {}", format.render(&report));
        process::exit(report.exit_code);
    }
}
