use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use intrabus::{Context, Executor, Node, Slot};

#[derive(Clone)]
struct Payload {
    bytes: Vec<u8>,
}

fn payload() -> Payload {
    Payload {
        bytes: vec![0u8; 4096],
    }
}

/// Публикация без подписчиков: только снимок реестра и освобождение слота.
fn bench_publish_0_subs(c: &mut Criterion) {
    let ctx = Context::new();
    let mut node = Node::new(&ctx, "talker").unwrap();
    let publisher = node.create_publisher::<Payload>("chan").unwrap();

    c.bench_function("publish_0_subs", |b| {
        b.iter(|| black_box(publisher.publish(Slot::new(payload()))))
    });
}

/// Публикация и диспетчеризация при разном числе подписчиков. Первый
/// подписчик получает слот без копии, остальные копируют 4 KiB.
fn bench_publish_and_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_and_dispatch");
    for subs in [1usize, 4, 16] {
        let ctx = Context::new();
        let mut node = Node::new(&ctx, "hub").unwrap();
        for _ in 0..subs {
            node.create_subscription::<Payload, _>("chan", |slot| {
                black_box(slot.get().map(|p| p.bytes.len()).unwrap_or(0));
            })
            .unwrap();
        }
        let publisher = node.create_publisher::<Payload>("chan").unwrap();
        let executor = Executor::new(&ctx);
        executor.add_node(&node).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(subs), &subs, |b, _| {
            b.iter(|| {
                publisher.publish(Slot::new(payload()));
                black_box(executor.spin_some().unwrap())
            })
        });
    }
    group.finish();
}

/// Один слот по кругу между двумя узлами: стоимость одной пересылки.
fn bench_cycle_hop(c: &mut Criterion) {
    let ctx = Context::new();
    let mut a = Node::new(&ctx, "a").unwrap();
    let mut b = Node::new(&ctx, "b").unwrap();
    let to_b = a.create_publisher::<u64>("ab").unwrap();
    let to_a = b.create_publisher::<u64>("ba").unwrap();
    a.create_subscription::<u64, _>("ba", move |mut slot| {
        if let Ok(v) = slot.get_mut() {
            *v += 1;
        }
        to_b.publish(slot);
    })
    .unwrap();
    let seed = to_a.clone();
    b.create_subscription::<u64, _>("ab", move |slot| {
        to_a.publish(slot);
    })
    .unwrap();

    let executor = Executor::new(&ctx);
    executor.add_node(&a).unwrap();
    executor.add_node(&b).unwrap();
    seed.publish_value(0);

    c.bench_function("cycle_hop", |bench| {
        bench.iter(|| black_box(executor.spin_once().unwrap()))
    });
}

criterion_group!(
    benches,
    bench_publish_0_subs,
    bench_publish_and_dispatch,
    bench_cycle_hop
);
criterion_main!(benches);
