#![no_main]

//! Fuzz target for concurrent registry operations
//!
//! Races registration against resolution, including round-robin cursors
//! and lazy factories, and checks the invariants that must survive.

use arbitrary::Arbitrary;
use invoke_di::{DiError, Injectable, ProviderOption, Registry};
use libfuzzer_sys::fuzz_target;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[derive(Clone, Debug, Arbitrary)]
struct ConcurrentService {
    id: u64,
    data: Vec<u8>,
}

impl Injectable for ConcurrentService {}

#[derive(Clone, Debug)]
struct SharedConfig {
    value: u32,
}

impl Injectable for SharedConfig {}

#[derive(Clone, Debug)]
struct Backend {
    index: usize,
}

impl Injectable for Backend {}

/// Thread operation
#[derive(Debug, Clone, Arbitrary)]
enum ThreadOp {
    GetConfig,
    GetService,
    NextBackend,
    Contains,
    Register(ConcurrentService),
    InvokePair,
    Child,
}

#[derive(Debug, Arbitrary)]
struct ConcurrentScenario {
    backend_count: u8,
    // Clamped to 1-8
    thread_count: u8,
    ops_per_thread: Vec<ThreadOp>,
}

static FACTORY_RUNS: AtomicUsize = AtomicUsize::new(0);

fuzz_target!(|scenario: ConcurrentScenario| {
    let registry = Registry::new();
    let backend_count = (scenario.backend_count % 16) as usize + 1;

    FACTORY_RUNS.store(0, Ordering::SeqCst);
    registry
        .provide(
            || {
                let run = FACTORY_RUNS.fetch_add(1, Ordering::SeqCst);
                SharedConfig { value: run as u32 }
            },
            &[],
        )
        .unwrap();
    registry
        .provide_value(
            (0..backend_count).map(|index| Backend { index }).collect::<Vec<_>>(),
            &[ProviderOption::RoundRobin],
        )
        .unwrap();

    let thread_count = (scenario.thread_count % 8).max(1) as usize;
    let ops = scenario.ops_per_thread;

    let handles: Vec<_> = (0..thread_count)
        .map(|_| {
            let registry = registry.clone();
            let ops = ops.clone();
            thread::spawn(move || {
                let mut handed_out = 0usize;
                let mut observed = Vec::new();
                for op in ops.into_iter().take(50) {
                    match op {
                        ThreadOp::GetConfig => {
                            observed.push(registry.get::<SharedConfig>().unwrap().value);
                        }
                        ThreadOp::GetService => {
                            let _ = registry.try_get::<ConcurrentService>();
                        }
                        ThreadOp::NextBackend => {
                            let backend = registry.get::<Backend>().unwrap();
                            assert!(backend.index < backend_count);
                            handed_out += 1;
                        }
                        ThreadOp::Contains => {
                            assert!(registry.contains::<SharedConfig>());
                            let _ = registry.contains::<ConcurrentService>();
                        }
                        ThreadOp::Register(svc) => {
                            // Only one registration per type may win
                            match registry.provide_value(svc, &[]) {
                                Ok(()) | Err(DiError::DuplicateProvider { .. }) => {}
                                Err(err) => panic!("unexpected error: {err}"),
                            }
                        }
                        ThreadOp::InvokePair => {
                            let (a, b) = registry
                                .invoke(|a: SharedConfig, b: SharedConfig| (a.value, b.value))
                                .unwrap();
                            assert_eq!(a, b);
                            observed.push(a);
                        }
                        ThreadOp::Child => {
                            let child = registry.scope();
                            observed.push(child.get::<SharedConfig>().unwrap().value);
                        }
                    }
                }
                (handed_out, observed)
            })
        })
        .collect();

    let mut handed_out = 0;
    let mut observed = Vec::new();
    for handle in handles {
        let (count, values) = handle.join().unwrap();
        handed_out += count;
        observed.extend(values);
    }

    // Racing first resolutions may each run the factory, but only the
    // first stored output is ever handed out
    let cached = registry.get::<SharedConfig>().unwrap().value;
    assert!(observed.iter().all(|value| *value == cached));

    // The shared cursor advanced exactly once per resolution
    let next = registry.get::<Backend>().unwrap();
    assert_eq!(next.index, handed_out % backend_count);
});
