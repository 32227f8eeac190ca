use criterion::{criterion_group, criterion_main, Criterion};
use rflaunch::config::KeywordScope;
use rflaunch::dispatch::{DispatchEngine, DispatchSettings, ResultMerger};
use rflaunch::metrics::PluginTelemetry;
use rflaunch::plugin::PluginRegistry;
use rflaunch::ranking::RankingStore;
use rflaunch::{parse, CancellationToken, NativePlugin, PluginDescriptor, PluginResult, Query};
use std::collections::HashSet;
use std::hint::black_box;
use std::sync::Arc;

struct Numbers(usize);

impl NativePlugin for Numbers {
    fn query(&self, query: &Query, _token: &CancellationToken) -> rflaunch::Result<Vec<PluginResult>> {
        Ok((0..self.0)
            .map(|i| PluginResult::new(format!("{} {i}", query.search()), "", (i % 97) as i32))
            .collect())
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let keywords: HashSet<String> = ["g", "wiki", "calc"].iter().map(|k| k.to_string()).collect();
    c.bench_function("parse_keyword_query", |b| {
        b.iter(|| parse(black_box("  wiki   rust   ownership rules "), &keywords));
    });

    let batches: Vec<Vec<PluginResult>> = (0..8)
        .map(|p| {
            (0..200)
                .map(|i| PluginResult::new(format!("p{p} r{i}"), "", ((i * 31 + p) % 113) as i32))
                .collect()
        })
        .collect();
    c.bench_function("merge_8x200", |b| {
        b.iter(|| {
            let mut merger = ResultMerger::new(batches.len(), 50);
            for (slot, batch) in batches.iter().enumerate() {
                merger.replace(slot, batch.clone());
            }
            black_box(merger.view())
        });
    });

    let registry = Arc::new(PluginRegistry::new());
    for i in 0..6 {
        let id = format!("numbers{i}");
        registry
            .register_native(PluginDescriptor::native(&id, &id, &["*"]), Arc::new(Numbers(100)))
            .expect("register");
    }
    let engine = DispatchEngine::new(
        Arc::clone(&registry),
        Arc::new(RankingStore::new()),
        PluginTelemetry::new(),
        DispatchSettings {
            result_limit: 50,
            keyword_scope: KeywordScope::Narrow,
            worker_threads: 4,
        },
    )
    .expect("engine");
    let query = parse("bench", registry.as_ref()).expect("query");
    c.bench_function("dispatch_6_plugins", |b| {
        b.iter(|| black_box(engine.dispatch_blocking(&query)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
