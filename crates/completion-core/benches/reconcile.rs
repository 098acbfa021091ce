use completion_core::{
    AggregateCompletionPolicy, CompletableItem, CompletionContext, ContextStore, InMemoryContextStore,
    InMemoryProgress, NullSink, PrincipalId, Progress, Reconciler, context_progress,
};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;

const TIERS: [(&str, usize); 3] = [("small", 50), ("medium", 500), ("large", 5_000)];
const ITEMS_PER_CONTEXT: usize = 20;

struct Fixture {
    store: InMemoryContextStore,
    progress: InMemoryProgress,
    context: CompletionContext,
    items: Vec<Arc<CompletableItem>>,
    principals: Vec<PrincipalId>,
}

fn fixture(principal_count: usize) -> Fixture {
    let context = CompletionContext::new("tag:bench-course", "course");
    let items: Vec<_> = (0..ITEMS_PER_CONTEXT)
        .map(|i| Arc::new(CompletableItem::new(format!("tag:item-{i}"), "video")))
        .collect();
    let principals: Vec<_> = (0..principal_count)
        .map(|p| PrincipalId::new(format!("user-{p}")))
        .collect();

    let mut store = InMemoryContextStore::new();
    let state = store.register(&context);
    for item in &items {
        state.completable_mut().add_required_item(&**item);
    }

    let progress = InMemoryProgress::new();
    for (p, principal) in principals.iter().enumerate() {
        for (i, item) in items.iter().enumerate() {
            // Roughly two thirds of the pairs meet the default threshold.
            let absolute = if (p + i) % 3 == 0 { 4.0 } else { 10.0 };
            progress.set(
                Progress::for_item(item, principal.clone()).with_amounts(absolute, Some(10.0)),
            );
        }
    }

    Fixture {
        store,
        progress,
        context,
        items,
        principals,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile.principals");
    let policy = AggregateCompletionPolicy::default();
    let sink = NullSink;

    for (name, principals) in TIERS {
        let base = fixture(principals);
        group.throughput(Throughput::Elements((principals * ITEMS_PER_CONTEXT) as u64));

        group.bench_with_input(BenchmarkId::new("cold", name), &base, |b, base| {
            b.iter_batched(
                || base.store.clone(),
                |mut store| {
                    let reconciler = Reconciler::new(&policy, &base.progress, &sink);
                    for principal in &base.principals {
                        for item in &base.items {
                            let _ = black_box(reconciler.update_completion(
                                &mut store,
                                Some(item.as_ref()),
                                &item.ntiid,
                                principal,
                                &base.context,
                                false,
                            ));
                        }
                    }
                    store
                },
                criterion::BatchSize::LargeInput,
            );
        });

        let mut warm = base.store.clone();
        let reconciler = Reconciler::new(&policy, &base.progress, &sink);
        for principal in &base.principals {
            for item in &base.items {
                let _ = reconciler.update_completion(
                    &mut warm,
                    Some(item.as_ref()),
                    &item.ntiid,
                    principal,
                    &base.context,
                    false,
                );
            }
        }

        group.bench_with_input(BenchmarkId::new("context_progress", name), &warm, |b, warm| {
            let Some(state) = warm.state(&base.context) else {
                return;
            };
            b.iter(|| {
                for principal in &base.principals {
                    black_box(context_progress(
                        state,
                        &base.items,
                        principal,
                        &base.context,
                        Some(&policy),
                    ));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile);
criterion_main!(benches);
