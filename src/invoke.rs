//! Invocation engine
//!
//! Resolves a callable's parameters left to right from a registry and its
//! ancestors, then calls it. Factories run through the same path when a
//! provider first needs their output.

use crate::callable::{Callable, Invocable};
use crate::types::{AnyValue, Injectable, TypeKey};
use crate::{BoxError, DiError, Registry, Result};
use std::any::Any;
use std::borrow::Borrow;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

impl Registry {
    /// Call `function` with every parameter resolved from this registry.
    ///
    /// Returns exactly what the function returns, so the return type needs
    /// no bounds. The function is not called if any parameter fails to
    /// resolve. For functions returning a `Result`, see
    /// [`try_invoke`](Self::try_invoke).
    ///
    /// ```rust
    /// use invoke_di::Registry;
    ///
    /// let registry = Registry::new();
    /// registry.provide_value(1, &[]).unwrap();
    ///
    /// registry.invoke(|i: i32| assert_eq!(i, 1)).unwrap();
    ///
    /// let err = registry.invoke(|_s: String| ()).unwrap_err();
    /// assert!(err.is_not_found());
    /// ```
    pub fn invoke<Args, F>(&self, function: F) -> Result<F::Output>
    where
        F: Invocable<Args>,
    {
        let args = self.resolve_params(&F::param_types())?;
        function.call_erased(&args)
    }

    /// Like [`invoke`](Self::invoke), for functions returning a `Result`.
    ///
    /// An `Err` from the function becomes [`DiError::FactoryFailure`]
    /// carrying the original error.
    ///
    /// ```rust
    /// use invoke_di::Registry;
    /// use std::io;
    ///
    /// let registry = Registry::new();
    /// registry.provide_value(0u16, &[]).unwrap();
    ///
    /// let err = registry
    ///     .try_invoke(|port: u16| -> io::Result<u16> {
    ///         if port == 0 {
    ///             return Err(io::Error::other("port must be set"));
    ///         }
    ///         Ok(port)
    ///     })
    ///     .unwrap_err();
    /// assert_eq!(err.to_string(), "port must be set");
    /// ```
    pub fn try_invoke<Args, F, T, E>(&self, function: F) -> Result<T>
    where
        F: Invocable<Args, Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
    {
        self.invoke(function)?.map_err(DiError::factory)
    }

    /// Invoke each callable in order, stopping at the first error.
    pub fn invoke_all<I>(&self, callables: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Borrow<Callable>,
    {
        for callable in callables {
            self.call(callable.borrow())?;
        }
        Ok(())
    }

    /// Invoke a dynamically typed value.
    ///
    /// The value must be a [`Callable`], an `Arc<Callable>` or a
    /// `Box<Callable>`; anything else fails with
    /// [`DiError::InvalidCallable`] before any parameter is resolved.
    pub fn invoke_any<T: Any>(&self, target: &T) -> Result<Vec<AnyValue>> {
        let target = target as &dyn Any;
        let callable = target
            .downcast_ref::<Callable>()
            .or_else(|| target.downcast_ref::<Arc<Callable>>().map(Arc::as_ref))
            .or_else(|| target.downcast_ref::<Box<Callable>>().map(Box::as_ref));

        match callable {
            Some(callable) => self.call(callable),
            None => Err(DiError::InvalidCallable {
                type_name: std::any::type_name::<T>(),
            }),
        }
    }

    /// Like [`invoke`](Self::invoke), but panics on error.
    ///
    /// # Panics
    ///
    /// Panics with the error message if a parameter fails to resolve.
    #[track_caller]
    pub fn must_invoke<Args, F>(&self, function: F) -> F::Output
    where
        F: Invocable<Args>,
    {
        match self.invoke(function) {
            Ok(output) => output,
            Err(err) => panic!("{err}"),
        }
    }

    /// Resolve a single type.
    ///
    /// Same as invoking a one-parameter function that returns its argument.
    ///
    /// ```rust
    /// use invoke_di::Registry;
    ///
    /// let registry = Registry::new();
    /// registry.provide(|| String::from("hello"), &[]).unwrap();
    /// assert_eq!(registry.get::<String>().unwrap(), "hello");
    /// ```
    pub fn get<T: Injectable>(&self) -> Result<T> {
        let value = self.resolve_param(0, &TypeKey::of::<T>())?;
        value.downcast_ref::<T>().cloned().ok_or_else(|| {
            DiError::Internal(format!(
                "provider returned a value that is not {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Try to resolve, returning None on any error.
    #[inline]
    pub fn try_get<T: Injectable>(&self) -> Option<T> {
        self.get::<T>().ok()
    }

    /// Resolve the parameters of a callable and call it
    pub(crate) fn call(&self, callable: &Callable) -> Result<Vec<AnyValue>> {
        #[cfg(feature = "logging")]
        trace!(
            target: "invoke_di",
            callable = callable.name(),
            params = callable.params().len(),
            depth = self.depth(),
            "Invoking callable"
        );

        let args = self.resolve_params(callable.params())?;
        callable.call(&args)
    }

    /// Resolve every parameter, stopping at the first failure
    pub(crate) fn resolve_params(&self, params: &[TypeKey]) -> Result<Vec<AnyValue>> {
        params
            .iter()
            .enumerate()
            .map(|(index, key)| self.resolve_param(index, key))
            .collect()
    }

    /// Resolve parameter `index` (0-based) of type `key`
    fn resolve_param(&self, index: usize, key: &TypeKey) -> Result<AnyValue> {
        let Some((owner, provider)) = self.storage.lookup(&key.id()) else {
            #[cfg(feature = "logging")]
            debug!(
                target: "invoke_di",
                service = key.name(),
                position = index + 1,
                depth = self.depth(),
                "Provider not found in registry or parent chain"
            );
            return Err(DiError::not_found(index, key));
        };

        #[cfg(feature = "logging")]
        trace!(
            target: "invoke_di",
            service = key.name(),
            position = index + 1,
            depth = self.depth(),
            owner_depth = owner.depth(),
            "Provider found"
        );

        let owner = Registry::from_shared(owner);
        provider.provide(&owner).map_err(|source| {
            #[cfg(feature = "logging")]
            debug!(
                target: "invoke_di",
                service = key.name(),
                position = index + 1,
                error = %source,
                "Provider failed"
            );
            DiError::resolution_failed(index, key, source)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderOption;
    use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, thiserror::Error)]
    #[error("test_err")]
    struct TestError;

    #[derive(Clone)]
    struct Database {
        url: String,
    }

    impl Injectable for Database {}

    #[derive(Clone)]
    struct UserService {
        db: Database,
        name: String,
    }

    impl Injectable for UserService {}

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    fn next_id() -> u64 {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NEXT.fetch_add(1, Ordering::SeqCst)
    }

    #[test]
    fn test_value_identity() {
        let registry = Registry::new();
        registry.provide_value(1, &[]).unwrap();
        registry.invoke(|i: i32| assert_eq!(i, 1)).unwrap();
    }

    #[test]
    fn test_factory_value() {
        let registry = Registry::new();
        registry.provide(|| 1, &[]).unwrap();
        assert_eq!(registry.invoke(|i: i32| i).unwrap(), 1);
    }

    #[test]
    fn test_trait_object_provider() {
        let registry = Registry::new();
        registry
            .provide(|| -> Arc<dyn Greeter> { Arc::new(English) }, &[])
            .unwrap();
        let greeting = registry.invoke(|g: Arc<dyn Greeter>| g.greet()).unwrap();
        assert_eq!(greeting, "hello");
    }

    #[test]
    fn test_value_round_robin() {
        let registry = Registry::new();
        registry
            .provide_value(vec![1, 2], &[ProviderOption::RoundRobin])
            .unwrap();
        let abc = registry.invoke(|a: i32, b: i32, c: i32| (a, b, c)).unwrap();
        assert_eq!(abc, (1, 2, 1));
    }

    #[test]
    fn test_factory_round_robin() {
        let registry = Registry::new();
        registry
            .provide(|| [1, 2], &[ProviderOption::RoundRobin])
            .unwrap();
        let abc = registry.invoke(|a: i32, b: i32, c: i32| (a, b, c)).unwrap();
        assert_eq!(abc, (1, 2, 1));

        // Rotation continues across invocations
        assert_eq!(registry.get::<i32>().unwrap(), 2);
    }

    #[test]
    fn test_single_instance_is_cached() {
        let registry = Registry::new();
        registry.provide(next_id, &[]).unwrap();
        let (a, b) = registry.invoke(|a: u64, b: u64| (a, b)).unwrap();
        assert_eq!(a, b);
        assert_eq!(registry.get::<u64>().unwrap(), a);
    }

    #[test]
    fn test_multi_instance_is_fresh() {
        let registry = Registry::new();
        registry
            .provide(next_id, &[ProviderOption::MultiInstance])
            .unwrap();
        let (a, b) = registry.invoke(|a: u64, b: u64| (a, b)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_factory_dependencies_resolve_recursively() {
        let registry = Registry::new();
        registry
            .provide(
                |db: Database| UserService {
                    db,
                    name: "users".into(),
                },
                &[],
            )
            .unwrap();
        registry
            .provide(|| Database { url: "postgres://localhost".into() }, &[])
            .unwrap();

        let users = registry.get::<UserService>().unwrap();
        assert_eq!(users.db.url, "postgres://localhost");
        assert_eq!(users.name, "users");
    }

    #[test]
    fn test_factory_receives_registry() {
        let registry = Registry::new();
        registry.provide_value(7u8, &[]).unwrap();
        registry
            .provide(
                |r: Registry| -> Result<u16> { Ok(u16::from(r.get::<u8>()?) * 2) },
                &[],
            )
            .unwrap();
        assert_eq!(registry.get::<u16>().unwrap(), 14);
    }

    #[test]
    fn test_not_found_names_position_and_type() {
        let registry = Registry::new();
        registry.provide_value(1, &[]).unwrap();

        let err = registry.invoke(|_i: i32, _s: String| ()).unwrap_err();
        match err {
            DiError::ProviderNotFound {
                position,
                type_name,
                ..
            } => {
                assert_eq!(position, 2);
                assert_eq!(type_name, "alloc::string::String");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_nested_not_found_is_wrapped() {
        let registry = Registry::new();
        registry.provide(|s: String| s.len(), &[]).unwrap();

        let err = registry.invoke(|_n: usize| ()).unwrap_err();
        assert!(matches!(
            err,
            DiError::ResolutionFailed { position: 1, type_name: "usize", .. }
        ));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_factory_error_stops_invocation() {
        let called = AtomicU32::new(0);
        let registry = Registry::new();
        registry
            .provide(|| -> std::result::Result<i32, TestError> { Err(TestError) }, &[])
            .unwrap();

        let err = registry
            .invoke(|_i: i32| {
                called.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();

        assert_eq!(called.load(Ordering::SeqCst), 0);
        let cause = err.factory_error().unwrap();
        assert!(cause.downcast_ref::<TestError>().is_some());
    }

    #[test]
    fn test_target_error_is_returned_verbatim() {
        let registry = Registry::new();
        let err = registry
            .try_invoke(|| -> std::result::Result<(), TestError> { Err(TestError) })
            .unwrap_err();
        match err {
            DiError::FactoryFailure(inner) => assert!(inner.downcast_ref::<TestError>().is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invoke_returns_unstorable_values() {
        struct Handle(u8);

        let registry = Registry::new();
        registry.provide_value(3u8, &[]).unwrap();

        let handle = registry.invoke(|n: u8| Handle(n)).unwrap();
        assert_eq!(handle.0, 3);

        let local = registry.invoke(|n: u8| std::rc::Rc::new(n)).unwrap();
        assert_eq!(*local, 3);

        let boxed = registry
            .invoke(|n: u8| -> Box<dyn Fn() -> u8> { Box::new(move || n + 1) })
            .unwrap();
        assert_eq!(boxed(), 4);
    }

    #[test]
    fn test_try_invoke_unwraps_ok() {
        let registry = Registry::new();
        registry.provide_value(21u32, &[]).unwrap();

        let doubled = registry
            .try_invoke(|n: u32| -> std::result::Result<u32, TestError> { Ok(n * 2) })
            .unwrap();
        assert_eq!(doubled, 42);

        // Without try_invoke the Result is handed back as is
        let raw = registry
            .invoke(|_n: u32| -> std::result::Result<u32, TestError> { Err(TestError) })
            .unwrap();
        assert!(raw.is_err());
    }

    #[test]
    fn test_must_invoke_returns_output() {
        let registry = Registry::new();
        registry.provide_value(String::from("abc"), &[]).unwrap();
        assert_eq!(registry.must_invoke(|s: String| s.len()), 3);
    }

    #[test]
    fn test_anyhow_factory_error() {
        let registry = Registry::new();
        registry
            .provide(
                |port: u16| -> anyhow::Result<String> {
                    anyhow::ensure!(port != 0, "port must be set");
                    Ok(format!("0.0.0.0:{port}"))
                },
                &[],
            )
            .unwrap();
        registry.provide_value(0u16, &[]).unwrap();

        let err = registry.get::<String>().unwrap_err();
        assert_eq!(err.factory_error().unwrap().to_string(), "port must be set");
    }

    #[test]
    fn test_invoke_borrows_locals() {
        let seen = Mutex::new(Vec::new());
        let registry = Registry::new();
        registry.provide_value(String::from("x"), &[]).unwrap();
        registry.invoke(|s: String| seen.lock().unwrap().push(s)).unwrap();
        assert_eq!(*seen.lock().unwrap(), ["x"]);
    }

    #[test]
    fn test_invoke_all_stops_at_first_error() {
        static RAN: AtomicU32 = AtomicU32::new(0);

        let registry = Registry::new();
        registry.provide_value(1u8, &[]).unwrap();

        let batch = [
            Callable::new(|_n: u8| {
                RAN.fetch_add(1, Ordering::SeqCst);
            }),
            Callable::new(|_s: String| {
                RAN.fetch_add(1, Ordering::SeqCst);
            }),
            Callable::new(|| {
                RAN.fetch_add(1, Ordering::SeqCst);
            }),
        ];

        let err = registry.invoke_all(&batch).unwrap_err();
        assert!(matches!(err, DiError::ProviderNotFound { position: 1, .. }));
        assert_eq!(RAN.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_any() {
        let registry = Registry::new();
        registry.provide_value(2u32, &[]).unwrap();

        let callable = Callable::new(|n: u32| n * 10);
        let results = registry.invoke_any(&callable).unwrap();
        assert_eq!(results[0].downcast_ref::<u32>(), Some(&20));

        let err = registry.invoke_any(&"test").unwrap_err();
        assert!(matches!(err, DiError::InvalidCallable { .. }));
    }

    #[test]
    fn test_invoke_any_shared_callable() {
        let registry = Registry::new();
        registry.provide_value(2u32, &[]).unwrap();

        let shared = Arc::new(Callable::new(|n: u32| n + 1));
        let results = registry.invoke_any(&shared).unwrap();
        assert_eq!(results[0].downcast_ref::<u32>(), Some(&3));

        let boxed = Box::new(Callable::new(|n: u32| n + 2));
        let results = registry.invoke_any(&boxed).unwrap();
        assert_eq!(results[0].downcast_ref::<u32>(), Some(&4));

        // Not a callable, even though it wraps one
        let err = registry.invoke_any(&Some(Callable::new(|| 1u8))).unwrap_err();
        assert!(matches!(err, DiError::InvalidCallable { .. }));
    }

    #[test]
    fn test_child_falls_back_and_shadows() {
        let root = Registry::new();
        root.provide_value(String::from("root"), &[]).unwrap();
        root.provide_value(1u8, &[]).unwrap();

        let child = root.scope();
        child.provide_value(2u8, &[]).unwrap();

        let (s, n) = child.invoke(|s: String, n: u8| (s, n)).unwrap();
        assert_eq!(s, "root");
        assert_eq!(n, 2);
        assert_eq!(root.get::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_parent_factory_resolves_from_parent() {
        let root = Registry::new();
        root.provide_value(1u8, &[]).unwrap();
        root.provide(|n: u8| u32::from(n) + 100, &[]).unwrap();

        let child = root.scope();
        child.provide_value(2u8, &[]).unwrap();

        // The factory is registered in root, so it sees root's u8
        assert_eq!(child.get::<u32>().unwrap(), 101);
    }

    #[test]
    fn test_deep_parent_chain() {
        let root = Registry::new();
        root.provide_value(String::from("deep"), &[]).unwrap();

        let leaf = root.scope().scope().scope();
        assert_eq!(leaf.depth(), 3);
        assert_eq!(leaf.get::<String>().unwrap(), "deep");
        assert!(leaf.contains::<String>());
        assert!(!leaf.contains_local::<String>());
    }

    #[test]
    #[should_panic(expected = "not found provider for 1 parameter")]
    fn test_must_invoke_panics() {
        Registry::new().must_invoke(|_b: bool| ());
    }

    #[test]
    fn test_try_get() {
        let registry = Registry::new();
        assert!(registry.try_get::<bool>().is_none());
        registry.provide_value(true, &[]).unwrap();
        assert_eq!(registry.try_get::<bool>(), Some(true));
    }

    #[test]
    fn test_concurrent_resolution() {
        let registry = Registry::new();
        registry
            .provide(
                || {
                    Arc::new(Database {
                        url: "shared".into(),
                    })
                },
                &[],
            )
            .unwrap();
        registry
            .provide(next_id, &[ProviderOption::MultiInstance])
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| {
                            registry
                                .invoke(|db: Arc<Database>, _id: u64| db)
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let all: Vec<Arc<Database>> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        let first = &all[0];
        assert!(all.iter().all(|db| Arc::ptr_eq(db, first)));
        assert_eq!(all.len(), 8 * 50);

        // The value that won the race stays cached
        let cached = registry.get::<Arc<Database>>().unwrap();
        assert!(Arc::ptr_eq(&cached, first));
    }
}
