//! Providers and their resolution strategies
//!
//! A [`Provider`] binds one type to one of four strategies. The strategy
//! is fixed at construction; only the cache and the round-robin cursor
//! change afterwards, under the provider's own lock.

use crate::callable::Callable;
use crate::options::ProviderOptions;
use crate::types::{AnyValue, PoolShape, TypeInfo, TypeKey};
use crate::{DiError, Registry, Result};
use parking_lot::Mutex;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// How a provider produces values
pub(crate) enum Strategy {
    /// Stored value, returned as is
    Value(AnyValue),
    /// Stored sequence, one element per resolution
    ValueRoundRobin { pool: AnyValue, shape: PoolShape },
    /// Output `index` of a factory, computed on first use
    Factory { index: usize },
    /// Output `index` of a factory is a sequence, one element per resolution
    FactoryRoundRobin { index: usize, shape: PoolShape },
}

impl Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Value(_) => "value",
            Strategy::ValueRoundRobin { .. } => "value_round_robin",
            Strategy::Factory { .. } => "factory",
            Strategy::FactoryRoundRobin { .. } => "factory_round_robin",
        }
    }
}

/// Mutable part of a provider
struct State {
    /// Resolved factory output (sequence for round-robin factories)
    cache: Option<AnyValue>,
    /// Dropped once the output is cached
    factory: Option<Arc<Callable>>,
    /// Last handed out element, -1 before the first resolution
    cursor: isize,
}

/// One registered binding from a type to a strategy
pub(crate) struct Provider {
    /// Type this provider is bound under (element type for round-robin)
    key: TypeKey,
    /// Type that was provided
    provided: TypeKey,
    strategy: Strategy,
    options: ProviderOptions,
    state: Mutex<State>,
}

impl Provider {
    fn with_strategy(
        key: TypeKey,
        provided: TypeKey,
        strategy: Strategy,
        options: ProviderOptions,
        factory: Option<Arc<Callable>>,
    ) -> Self {
        Self {
            key,
            provided,
            strategy,
            options,
            state: Mutex::new(State {
                cache: None,
                factory,
                cursor: -1,
            }),
        }
    }

    /// Provider for a plain value
    pub(crate) fn value(
        info: &TypeInfo,
        value: AnyValue,
        options: ProviderOptions,
    ) -> Result<Self> {
        let provided = info.key();
        if options.round_robin {
            let shape = round_robin_shape(info)?;
            Ok(Self::with_strategy(
                shape.element(),
                provided,
                Strategy::ValueRoundRobin { pool: value, shape },
                options,
                None,
            ))
        } else {
            Ok(Self::with_strategy(provided, provided, Strategy::Value(value), options, None))
        }
    }

    /// Provider for output `index` of a factory
    pub(crate) fn factory(
        info: &TypeInfo,
        factory: Arc<Callable>,
        index: usize,
        options: ProviderOptions,
    ) -> Result<Self> {
        let provided = info.key();
        let (key, strategy) = if options.round_robin {
            let shape = round_robin_shape(info)?;
            (shape.element(), Strategy::FactoryRoundRobin { index, shape })
        } else {
            (provided, Strategy::Factory { index })
        };
        Ok(Self::with_strategy(key, provided, strategy, options, Some(factory)))
    }

    /// Type this provider is bound under
    #[inline]
    pub(crate) fn key(&self) -> TypeKey {
        self.key
    }

    /// Produce a value. Factories resolve their parameters from `owner`,
    /// the registry this provider is registered in.
    pub(crate) fn provide(&self, owner: &Registry) -> Result<AnyValue> {
        #[cfg(feature = "logging")]
        trace!(
            target: "invoke_di",
            service = self.key.name(),
            strategy = self.strategy.name(),
            "Running provider strategy"
        );

        match &self.strategy {
            Strategy::Value(value) => Ok(Arc::clone(value)),
            Strategy::ValueRoundRobin { pool, shape } => self.next_element(pool, shape),
            Strategy::Factory { index } => self.produce(owner, *index),
            Strategy::FactoryRoundRobin { index, shape } => {
                let pool = self.produce(owner, *index)?;
                self.next_element(&pool, shape)
            }
        }
    }

    /// Step the round-robin cursor back by one.
    ///
    /// Used after an eager load so it does not consume a rotation slot.
    pub(crate) fn rewind(&self) {
        self.state.lock().cursor -= 1;
    }

    /// Cached factory output, or a fresh one
    fn produce(&self, owner: &Registry, index: usize) -> Result<AnyValue> {
        let factory = {
            let state = self.state.lock();
            if !self.options.multi_instance {
                if let Some(cached) = &state.cache {
                    return Ok(Arc::clone(cached));
                }
            }
            state.factory.clone()
        };

        let factory = factory.ok_or_else(|| {
            DiError::Internal(format!("provider of {} has neither value nor factory", self.key))
        })?;

        #[cfg(feature = "logging")]
        debug!(
            target: "invoke_di",
            service = self.provided.name(),
            factory = factory.name(),
            multi_instance = self.options.multi_instance,
            "Invoking factory"
        );

        let mut results = owner.call(&factory)?;
        if index >= results.len() {
            return Err(DiError::Internal(format!(
                "factory {} returned {} values, expected output {index}",
                factory.name(),
                results.len()
            )));
        }
        let value = results.swap_remove(index);

        if self.options.multi_instance {
            return Ok(value);
        }

        // First stored value wins if two first resolutions raced.
        let mut state = self.state.lock();
        let value = Arc::clone(state.cache.get_or_insert(value));
        state.factory = None;
        Ok(value)
    }

    /// Advance the cursor and return the element under it
    fn next_element(&self, pool: &AnyValue, shape: &PoolShape) -> Result<AnyValue> {
        let len = shape.len(pool)?;
        if len == 0 {
            return Err(DiError::EmptyRoundRobin {
                type_name: self.provided.name(),
            });
        }

        let index = {
            let mut state = self.state.lock();
            state.cursor += 1;
            if state.cursor < 0 || state.cursor as usize >= len {
                state.cursor = 0;
            }
            state.cursor as usize
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "invoke_di",
            service = self.key.name(),
            index = index,
            len = len,
            "Round-robin element selected"
        );

        shape.element_at(pool, index)
    }
}

fn round_robin_shape(info: &TypeInfo) -> Result<PoolShape> {
    info.pool().ok_or(DiError::NotRoundRobinCompatible {
        type_name: info.key().name(),
    })
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("provided", &self.provided)
            .field("strategy", &self.strategy.name())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ProviderOption;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rr() -> ProviderOptions {
        ProviderOptions::new().with(ProviderOption::RoundRobin)
    }

    fn as_u32(value: AnyValue) -> u32 {
        *value.downcast_ref::<u32>().unwrap()
    }

    #[test]
    fn test_value_strategy() {
        let registry = Registry::new();
        let provider =
            Provider::value(&TypeInfo::of::<u32>(), Arc::new(42u32), ProviderOptions::new())
                .unwrap();

        assert_eq!(provider.key(), TypeKey::of::<u32>());
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 42);
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 42);
    }

    #[test]
    fn test_value_round_robin_wraps() {
        let registry = Registry::new();
        let provider =
            Provider::value(&TypeInfo::of::<Vec<u32>>(), Arc::new(vec![1u32, 2]), rr()).unwrap();

        assert_eq!(provider.key(), TypeKey::of::<u32>());
        let seen: Vec<u32> = (0..5)
            .map(|_| as_u32(provider.provide(&registry).unwrap()))
            .collect();
        assert_eq!(seen, [1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_round_robin_requires_sequence() {
        let err = Provider::value(&TypeInfo::of::<u32>(), Arc::new(1u32), rr()).unwrap_err();
        assert!(matches!(err, DiError::NotRoundRobinCompatible { type_name: "u32" }));
    }

    #[test]
    fn test_empty_round_robin() {
        let registry = Registry::new();
        let provider =
            Provider::value(&TypeInfo::of::<Vec<u32>>(), Arc::new(Vec::<u32>::new()), rr())
                .unwrap();
        assert!(matches!(
            provider.provide(&registry),
            Err(DiError::EmptyRoundRobin { .. })
        ));
    }

    #[test]
    fn test_factory_is_cached_and_released() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let registry = Registry::new();
        let factory = Arc::new(Callable::new(|| CALLS.fetch_add(1, Ordering::SeqCst) + 10));
        let provider = Provider::factory(
            &TypeInfo::of::<u32>(),
            Arc::clone(&factory),
            0,
            ProviderOptions::new(),
        )
        .unwrap();

        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 10);
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 10);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);

        // Provider no longer holds the factory
        assert_eq!(Arc::strong_count(&factory), 1);
    }

    #[test]
    fn test_multi_instance_factory_reruns() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let registry = Registry::new();
        let factory = Arc::new(Callable::new(|| CALLS.fetch_add(1, Ordering::SeqCst)));
        let provider = Provider::factory(
            &TypeInfo::of::<u32>(),
            factory,
            0,
            ProviderOptions::new().with(ProviderOption::MultiInstance),
        )
        .unwrap();

        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 0);
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 1);
    }

    #[test]
    fn test_factory_output_index() {
        let registry = Registry::new();
        let factory = Arc::new(Callable::new(|| (1u8, 2u32)));
        let provider =
            Provider::factory(&TypeInfo::of::<u32>(), factory, 1, ProviderOptions::new()).unwrap();
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 2);
    }

    #[test]
    fn test_failed_factory_stays_unresolved() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let registry = Registry::new();
        let factory = Arc::new(Callable::new(|| -> std::result::Result<u32, std::io::Error> {
            if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(std::io::Error::other("first call fails"))
            } else {
                Ok(7)
            }
        }));
        let provider =
            Provider::factory(&TypeInfo::of::<u32>(), factory, 0, ProviderOptions::new()).unwrap();

        assert!(matches!(
            provider.provide(&registry),
            Err(DiError::FactoryFailure(_))
        ));
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 7);
    }

    #[test]
    fn test_factory_round_robin_and_rewind() {
        let registry = Registry::new();
        let factory = Arc::new(Callable::new(|| vec![5u32, 6, 7]));
        let provider =
            Provider::factory(&TypeInfo::of::<Vec<u32>>(), factory, 0, rr()).unwrap();

        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 5);
        provider.rewind();
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 5);
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 6);
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 7);
        assert_eq!(as_u32(provider.provide(&registry).unwrap()), 5);
    }
    #[test]
    fn test_multi_instance_round_robin_reruns_and_advances() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let registry = Registry::new();
        let factory = Arc::new(Callable::new(|| {
            let base = CALLS.fetch_add(1, Ordering::SeqCst) * 10;
            vec![base, base + 1, base + 2]
        }));
        let provider = Provider::factory(
            &TypeInfo::of::<Vec<u32>>(),
            factory,
            0,
            rr().with(ProviderOption::MultiInstance),
        )
        .unwrap();

        // A fresh sequence per resolution, indexed by the shared cursor
        let seen: Vec<u32> = (0..4)
            .map(|_| as_u32(provider.provide(&registry).unwrap()))
            .collect();
        assert_eq!(seen, [0, 11, 22, 30]);
        assert_eq!(CALLS.load(Ordering::SeqCst), 4);
    }
}
