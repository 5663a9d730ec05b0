//! Benchmarks for the scheduler's hot paths.
//!
//! Benchmarks cover:
//! - Queue operations (enqueue/dequeue/priority ordering)
//! - Admission evaluation against the built-in presets
//! - End-to-end enqueue + tick with a no-op launcher

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use rand::Rng;

use prometheus_local_scheduler::config::SchedulerConfig;
use prometheus_local_scheduler::core::{
    evaluate, preset, ProcessHandle, ProcessLauncher, QueueItem, ResourceEnvelope, Scheduler,
    SchedulerError, SystemSnapshot, TaskQueue, TaskSpec, PRESET_NAMES,
};
use prometheus_local_scheduler::infra::{InMemoryQueue, InMemoryStore, StaticMetrics};

const MIB: u64 = 1024 * 1024;

// ============================================================================
// Helpers
// ============================================================================

struct InstantHandle {
    pid: u32,
    log_path: PathBuf,
}

impl ProcessHandle for InstantHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn poll(&mut self) -> Result<Option<i32>, SchedulerError> {
        Ok(Some(0))
    }

    fn terminate(&mut self) -> bool {
        false
    }
}

struct InstantLauncher;

impl ProcessLauncher for InstantLauncher {
    fn start(
        &self,
        task_id: &str,
        _command: &str,
        log_dir: &Path,
    ) -> Result<Box<dyn ProcessHandle>, SchedulerError> {
        Ok(Box::new(InstantHandle {
            pid: 1,
            log_path: log_dir.join(format!("{task_id}.log")),
        }))
    }
}

fn item(seq: u64, priority: i64) -> QueueItem {
    QueueItem {
        priority,
        enqueued_at: Utc::now(),
        seq,
        task_id: format!("T-{seq}"),
    }
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_enqueue_dequeue");

    for size in [100_u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut q = InMemoryQueue::new();
                for i in 0..size {
                    q.enqueue(item(i, 5));
                }
                while let Some(next) = q.dequeue() {
                    black_box(next);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_priority_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_priority_ordering");

    for size in [100_u64, 1_000, 5_000] {
        let priorities: Vec<i64> = {
            let mut rng = rand::rng();
            (0..size).map(|_| rng.random_range(0..10)).collect()
        };
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &priorities, |b, priorities| {
            b.iter(|| {
                let mut q = InMemoryQueue::new();
                for (seq, priority) in priorities.iter().enumerate() {
                    q.enqueue(item(seq as u64, *priority));
                }
                let mut count = 0;
                while q.dequeue().is_some() {
                    count += 1;
                }
                black_box(count);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Admission Benchmarks
// ============================================================================

fn bench_evaluate_presets(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_presets");
    let mut snapshot = SystemSnapshot::idle(16 * 1024 * MIB);
    snapshot.cpu_total_pct = 72.0;
    snapshot.mem_used_bytes = 12 * 1024 * MIB;
    snapshot.power.plugged = false;
    snapshot.power.battery_pct = Some(40.0);
    let envelope = ResourceEnvelope {
        max_cpu_pct: 90,
        max_mem_mb: 1024,
        requires_gpu: true,
        min_vram_mb: 2048,
    };
    let now = NaiveTime::from_hms_opt(23, 15, 0).unwrap_or_default();

    for name in PRESET_NAMES {
        let Some(rules) = preset(name) else { continue };
        group.bench_function(name, |b| {
            b.iter(|| black_box(evaluate(&snapshot, &envelope, &rules, now)));
        });
    }
    group.finish();
}

// ============================================================================
// End-to-End Benchmarks
// ============================================================================

fn bench_enqueue_and_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_and_tick");

    for size in [10_u64, 100, 500] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let config = SchedulerConfig {
                    max_parallel: 8,
                    ..SchedulerConfig::default()
                };
                let scheduler = Scheduler::new(
                    config,
                    Arc::new(InMemoryStore::new()),
                    Arc::new(StaticMetrics::new(SystemSnapshot::idle(16 * 1024 * MIB))),
                    Arc::new(InstantLauncher),
                )
                .unwrap();
                for i in 0..size {
                    let spec = TaskSpec::new(format!("job-{i}"), "true").with_priority((i % 5) as i64);
                    scheduler.enqueue(spec).unwrap();
                }
                while scheduler.queue_len() > 0 {
                    black_box(scheduler.tick().unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    queue_benches,
    bench_queue_enqueue_dequeue,
    bench_queue_priority_ordering
);

criterion_group!(admission_benches, bench_evaluate_presets);

criterion_group!(scheduler_benches, bench_enqueue_and_tick);

criterion_main!(queue_benches, admission_benches, scheduler_benches);
