//! Processing context benchmarks.
//!
//! Round trips through the bounded queue and the processing thread.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sysmsg_bench::{populated_registry, Scale};
use sysmsg_core::{Message, MsgCode};
use sysmsg_task::{ProcessingTask, TaskConfig};

const HOT: MsgCode = MsgCode::new(0x40);
const BATCH: u64 = 256;

fn bench_queue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("processing/batch");
    group.throughput(Throughput::Elements(BATCH));

    for capacity in [1usize, 32, 256] {
        group.bench_with_input(BenchmarkId::new("capacity", capacity), &capacity, |b, &capacity| {
            let (registry, hits) = populated_registry(Scale::Small, HOT);
            let config = TaskConfig::new()
                .with_queue_capacity(capacity)
                .with_thread_name("smt-bench");
            let (task, sender) = ProcessingTask::start(&config, Arc::clone(&registry)).unwrap();
            let per_message = Scale::Small.listeners() as u64;

            b.iter(|| {
                let target = hits.load(Ordering::Relaxed) + BATCH * per_message;
                for _ in 0..BATCH {
                    sender.send(Message::new(HOT)).unwrap();
                }
                while hits.load(Ordering::Relaxed) < target {
                    std::hint::spin_loop();
                }
            });

            task.stop();
        });
    }

    group.finish();
}

criterion_group!(benches, bench_queue_throughput);
criterion_main!(benches);
