use criterion::{Criterion, criterion_group, criterion_main};
use domain::{ChangePlan, InMemoryPlanRepository, PlanCommandService, RecordUsage};
use event_bus::InMemoryEventBus;

fn service() -> PlanCommandService<InMemoryPlanRepository, InMemoryEventBus> {
    PlanCommandService::new(
        InMemoryPlanRepository::new(),
        InMemoryEventBus::with_default_topics(4),
    )
}

fn bench_create_plan(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_plan", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = ChangePlan::full("bench-user", "Basic 5G", 10240, 200, 100, 45000.0);
                service().change_plan(cmd).await.unwrap();
            });
        });
    });
}

fn bench_merge_plan(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = service();
    rt.block_on(async {
        let cmd = ChangePlan::full("bench-user", "Basic 5G", 10240, 200, 100, 45000.0);
        service.change_plan(cmd).await.unwrap();
    });

    c.bench_function("domain/merge_plan", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = ChangePlan::new("bench-user").monthly_fee(50000.0);
                service.change_plan(cmd).await.unwrap();
            });
        });
    });
}

fn bench_record_usage(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = service();
    rt.block_on(async {
        let cmd = ChangePlan::full("bench-user", "Basic 5G", 10240, 200, 100, 45000.0);
        service.change_plan(cmd).await.unwrap();
    });

    c.bench_function("domain/record_usage", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cmd = RecordUsage::new("bench-user").data_usage(512).call_usage(30);
                service.record_usage(cmd).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_plan,
    bench_merge_plan,
    bench_record_usage
);
criterion_main!(benches);
