use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use specbench::config::{ConfigFile, EnvSnapshot, Resolver, RunOverrides, ToolSettings};
use specbench::method::{HyperValue, Method, MethodDispatcher};
use specbench::naming;
use specbench::process::SystemRunner;
use std::path::PathBuf;

fn overrides() -> RunOverrides {
    RunOverrides {
        model_path: Some(PathBuf::from("/models/demo-7b")),
        params: vec![
            ("skip-ratio".to_string(), HyperValue::Float(0.4)),
            ("opt-interval".to_string(), HyperValue::Int(128)),
        ],
        ..Default::default()
    }
}

/// Resolving a configuration and deriving its result name for every method
fn bench_result_names(c: &mut Criterion) {
    let file = ConfigFile::default();
    let env = EnvSnapshot::default();
    let resolver = Resolver::new(&file, &env);
    let mut group = c.benchmark_group("result_stem");

    for method in [Method::Vanilla, Method::Swift, Method::Casspec] {
        let flags = if method == Method::Vanilla {
            RunOverrides {
                params: Vec::new(),
                ..overrides()
            }
        } else {
            overrides()
        };
        group.bench_with_input(BenchmarkId::from_parameter(method), &flags, |b, flags| {
            b.iter(|| {
                let config = resolver.run_configuration(method, black_box(flags)).unwrap();
                black_box(naming::result_stem(&config));
            });
        });
    }

    group.finish();
}

fn bench_invocation(c: &mut Criterion) {
    let file = ConfigFile::default();
    let env = EnvSnapshot::default();
    let config = Resolver::new(&file, &env)
        .run_configuration(Method::Casspec, &overrides())
        .unwrap();
    let runner = SystemRunner::default();
    let tools = ToolSettings::default();
    let dispatcher = MethodDispatcher::new(&runner, &tools);

    c.bench_function("casspec_command_line", |b| {
        b.iter(|| black_box(dispatcher.invocation(black_box(&config)).command_line()));
    });
}

criterion_group!(benches, bench_result_names, bench_invocation);
criterion_main!(benches);
