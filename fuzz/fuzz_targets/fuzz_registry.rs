#![no_main]

//! Fuzz target for single-threaded registry operations
//!
//! Applies arbitrary registration and resolution sequences to a root and
//! a child registry and checks lookups against a simple model.

use arbitrary::Arbitrary;
use invoke_di::{DiError, Injectable, ProviderOption, Registry};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Arbitrary)]
struct SmallService {
    id: u32,
    name: String,
}

impl Injectable for SmallService {}

#[derive(Clone, Debug, PartialEq, Arbitrary)]
struct Payload {
    data: Vec<u8>,
}

impl Injectable for Payload {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Arbitrary)]
enum Target {
    Root,
    Child,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Flags {
    None,
    Eager,
    Multi,
}

impl Flags {
    fn options(self) -> &'static [ProviderOption] {
        match self {
            Flags::None => &[],
            Flags::Eager => &[ProviderOption::EagerLoading],
            Flags::Multi => &[ProviderOption::MultiInstance],
        }
    }
}

#[derive(Debug, Arbitrary)]
enum RegistryOp {
    ProvideSmall(Target, SmallService),
    ProvideSmallFactory(Target, u32, Flags),
    ProvidePayloads(Target, Vec<Payload>),
    ProvideFailing(Target, Flags),
    GetSmall(Target),
    NextPayload(Target),
    InvokeBoth(Target),
}

fn pick(target: Target, root: &Registry, child: &Registry) -> Registry {
    match target {
        Target::Root => root.clone(),
        Target::Child => child.clone(),
    }
}

fuzz_target!(|ops: Vec<RegistryOp>| {
    let root = Registry::new();
    let child = root.scope();

    // Which registries bind SmallService, and to what id
    let mut small: HashMap<Target, u32> = HashMap::new();

    for op in ops.into_iter().take(64) {
        match op {
            RegistryOp::ProvideSmall(target, svc) => {
                let id = svc.id;
                match pick(target, &root, &child).provide_value(svc, &[]) {
                    Ok(()) => {
                        assert!(small.insert(target, id).is_none());
                    }
                    Err(DiError::DuplicateProvider { .. }) => {
                        assert!(small.contains_key(&target));
                    }
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            RegistryOp::ProvideSmallFactory(target, id, flags) => {
                let result = pick(target, &root, &child).provide(
                    move || SmallService {
                        id,
                        name: String::new(),
                    },
                    flags.options(),
                );
                match result {
                    Ok(()) => {
                        assert!(small.insert(target, id).is_none());
                    }
                    Err(DiError::DuplicateProvider { .. }) => {
                        assert!(small.contains_key(&target));
                    }
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            RegistryOp::ProvidePayloads(target, payloads) => {
                let registry = pick(target, &root, &child);
                let _ = registry.provide_value(payloads, &[ProviderOption::RoundRobin]);
            }
            RegistryOp::ProvideFailing(target, flags) => {
                let registry = pick(target, &root, &child);
                let result = registry.provide(
                    || -> Result<u64, std::io::Error> { Err(std::io::Error::other("boom")) },
                    flags.options(),
                );
                if let Flags::Eager = flags {
                    // Eager failures leave the binding in place
                    assert!(matches!(
                        result,
                        Err(DiError::EagerLoadFailed { .. })
                            | Err(DiError::DuplicateProvider { .. })
                    ));
                }
                if registry.contains_local::<u64>() {
                    assert!(registry.get::<u64>().is_err());
                }
            }
            RegistryOp::GetSmall(target) => {
                let registry = pick(target, &root, &child);
                let expected = match target {
                    Target::Root => small.get(&Target::Root),
                    Target::Child => small.get(&Target::Child).or(small.get(&Target::Root)),
                };
                match (registry.get::<SmallService>(), expected) {
                    (Ok(svc), Some(id)) => assert_eq!(svc.id, *id),
                    (Err(err), None) => assert!(err.is_not_found()),
                    (got, expected) => panic!("got {got:?}, expected {expected:?}"),
                }
            }
            RegistryOp::NextPayload(target) => {
                match pick(target, &root, &child).get::<Payload>() {
                    Ok(_)
                    | Err(DiError::ProviderNotFound { .. })
                    | Err(DiError::EmptyRoundRobin { .. }) => {}
                    Err(err) => panic!("unexpected error: {err}"),
                }
            }
            RegistryOp::InvokeBoth(target) => {
                let registry = pick(target, &root, &child);
                let _ = registry.invoke(|s: SmallService, p: Payload| (s.id, p.data.len()));
            }
        }
    }

    // Both registries remain usable
    assert!(root.contains::<Registry>());
    assert!(child.contains::<Registry>());
    let _ = root.len();
    let _ = child.registered_types();
});
