//! Dispatch throughput benchmark.
//!
//! Measures complete handshake runs and broadcast fan-out through the
//! drain/cycle loop using Criterion.

use agent_kernel::{state, Agent, AgentId, Context, Kernel, Message, State, Transition};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::Value;

#[derive(Debug)]
struct Parent {
    children: usize,
    awaiting_ready: usize,
    awaiting_done: usize,
}

impl Parent {
    fn start(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        for _ in 0..self.children {
            if let Ok(child) = ctx.spawn(|| Ok(Child)) {
                ctx.when_from("ready", child, state!(on_ready));
            }
        }
        None
    }

    fn on_ready(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        self.awaiting_ready -= 1;
        if self.awaiting_ready == 0 {
            ctx.when("done", state!(on_done));
            ctx.emit("go", Value::Null);
        }
        None
    }

    fn on_done(&mut self, _ctx: &mut Context<'_, Self>) -> Transition<Self> {
        self.awaiting_done -= 1;
        (self.awaiting_done == 0).then_some(State::Halt)
    }
}

impl Agent for Parent {
    fn initial_state(&self) -> State<Self> {
        state!(start)
    }
}

#[derive(Debug)]
struct Child;

impl Child {
    fn start(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        let parent = ctx.parent();
        ctx.emit_to(parent, "ready", Value::Null);
        ctx.when_from("go", parent, state!(on_go));
        None
    }

    fn on_go(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        let parent = ctx.parent();
        ctx.request(parent, "done", Value::Null, state!(on_acked));
        None
    }

    fn on_acked(&mut self, _ctx: &mut Context<'_, Self>) -> Transition<Self> {
        None
    }
}

impl Agent for Child {
    fn initial_state(&self) -> State<Self> {
        state!(start)
    }
}

/// Counts `tick` broadcasts.
#[derive(Debug)]
struct Listener;

impl Listener {
    fn setup(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        ctx.when("tick", state!(tick));
        None
    }

    fn tick(&mut self, _ctx: &mut Context<'_, Self>) -> Transition<Self> {
        None
    }
}

impl Agent for Listener {
    fn initial_state(&self) -> State<Self> {
        state!(setup)
    }
}

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");
    for children in [2usize, 16, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(children), &children, |b, &n| {
            b.iter(|| {
                let mut kernel = Kernel::default();
                let stats = kernel
                    .run(|| {
                        Ok(Parent {
                            children: n,
                            awaiting_ready: n,
                            awaiting_done: n,
                        })
                    })
                    .unwrap();
                black_box(stats)
            });
        });
    }
    group.finish();
}

fn bench_broadcast_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_fanout");
    for listeners in [8usize, 64, 512] {
        let mut kernel = Kernel::default();
        for _ in 0..listeners {
            kernel.spawn(|| Ok(Listener), AgentId::ROOT).unwrap();
        }
        for _ in 0..listeners {
            kernel.turn();
        }

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &listeners, |b, &n| {
            b.iter(|| {
                kernel.emit(Message::new("tick", AgentId::ROOT));
                // One accept plus one return to Listen per listener.
                for _ in 0..2 * n {
                    kernel.turn();
                }
                black_box(kernel.stats().cycles)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_handshake, bench_broadcast_fanout);
criterion_main!(benches);
