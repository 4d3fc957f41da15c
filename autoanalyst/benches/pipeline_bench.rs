//! Benchmarks for graph compilation and plan execution.

use autoanalyst::context::AnalysisContext;
use autoanalyst::executor::Executor;
use autoanalyst::graph::{GraphBuilder, END};
use autoanalyst::stage::NoOpStage;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn chain_builder(len: usize) -> GraphBuilder {
    let names: Vec<String> = (0..len).map(|i| format!("stage{i}")).collect();
    let mut builder = GraphBuilder::new("bench");
    for name in &names {
        builder = builder
            .register_stage(name, Arc::new(NoOpStage::new(name)))
            .unwrap();
    }
    for pair in names.windows(2) {
        builder = builder.add_edge(&pair[0], &pair[1]);
    }
    builder = builder.add_edge(names.last().unwrap(), END);
    builder.set_entry(&names[0]).unwrap()
}

fn pipeline_benchmark(c: &mut Criterion) {
    c.bench_function("compile_10_stage_chain", |b| {
        b.iter(|| black_box(chain_builder(10).compile().unwrap()))
    });

    let plan = chain_builder(10).compile().unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    c.bench_function("run_10_noop_stages", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut ctx = AnalysisContext::new();
                black_box(Executor::new().run(&plan, &mut ctx).await.unwrap())
            })
        })
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
