//! The provider registry
//!
//! A [`Registry`] maps types to providers and optionally falls back to a
//! parent registry. Every registry provides itself, so factories can ask
//! for the `Registry` they are registered in.

use crate::callable::{Callable, Factory};
use crate::options::{ProviderOption, ProviderOptions};
use crate::provider::Provider;
use crate::storage::ProviderStorage;
use crate::types::{Injectable, TypeInfo, TypeKey};
use crate::{DiError, Result};
use std::any::TypeId;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::debug;

/// Type-keyed dependency registry.
///
/// Cloning is cheap and yields another handle to the same registry.
///
/// # Examples
///
/// ```rust
/// use invoke_di::{ProviderOption, Registry};
///
/// let registry = Registry::new();
/// registry.provide_value(8080u16, &[]).unwrap();
/// registry.provide(|port: u16| format!("0.0.0.0:{port}"), &[]).unwrap();
///
/// let addr = registry.invoke(|addr: String| addr).unwrap();
/// assert_eq!(addr, "0.0.0.0:8080");
/// ```
#[derive(Clone)]
pub struct Registry {
    pub(crate) storage: Arc<ProviderStorage>,
}

impl Registry {
    /// Create a new root registry.
    #[inline]
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "invoke_di", depth = 0, "Creating new root registry");

        Self::from_storage(ProviderStorage::new())
    }

    /// Create a root registry with pre-allocated capacity.
    ///
    /// Use this when you know approximately how many types will be provided.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_storage(ProviderStorage::with_capacity(capacity))
    }

    /// Create a registry that falls back to `parent` for types it does not
    /// provide itself.
    ///
    /// The child can shadow any of the parent's types with its own
    /// providers; the parent never sees the child's providers.
    ///
    /// ```rust
    /// use invoke_di::Registry;
    ///
    /// let root = Registry::new();
    /// root.provide_value(String::from("production"), &[]).unwrap();
    ///
    /// let child = Registry::new_from(&root);
    /// child.provide_value(3u8, &[]).unwrap();
    ///
    /// let label = child.invoke(|env: String, n: u8| format!("{env}-{n}")).unwrap();
    /// assert_eq!(label, "production-3");
    /// assert!(!root.contains::<u8>());
    /// ```
    #[inline]
    pub fn new_from(parent: &Registry) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "invoke_di",
            parent_depth = parent.depth(),
            child_depth = parent.depth() + 1,
            parent_providers = parent.storage.len(),
            "Creating child registry"
        );

        Self::from_storage(parent.storage.child())
    }

    /// Alias for [`new_from`](Self::new_from) with `self` as parent.
    #[inline]
    pub fn scope(&self) -> Self {
        Self::new_from(self)
    }

    fn from_storage(storage: ProviderStorage) -> Self {
        let registry = Self {
            storage: Arc::new(storage),
        };

        // Held weakly: the self-binding must not keep the registry alive.
        // Providers only run through a live owner, so the upgrade succeeds.
        let weak: Weak<ProviderStorage> = Arc::downgrade(&registry.storage);
        registry.must_provide(
            move || -> Result<Registry> {
                let storage = weak.upgrade().ok_or_else(|| {
                    DiError::Internal("self-binding outlived its registry".into())
                })?;
                Ok(Registry { storage })
            },
            &[ProviderOption::MultiInstance],
        );
        registry
    }

    /// Handle for an existing storage
    #[inline]
    pub(crate) fn from_shared(storage: Arc<ProviderStorage>) -> Self {
        Self { storage }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Provide a plain value, bound under its exact type.
    ///
    /// With [`ProviderOption::RoundRobin`] the value must be a sequence; it
    /// is bound under its element type and each resolution yields the next
    /// element. [`ProviderOption::EagerLoading`] has nothing to load for a
    /// plain value and is accepted as a no-op.
    ///
    /// ```rust
    /// use invoke_di::{ProviderOption, Registry};
    ///
    /// let registry = Registry::new();
    /// registry
    ///     .provide_value(vec![1, 2], &[ProviderOption::RoundRobin])
    ///     .unwrap();
    ///
    /// let picked = registry.invoke(|a: i32, b: i32, c: i32| (a, b, c)).unwrap();
    /// assert_eq!(picked, (1, 2, 1));
    /// ```
    pub fn provide_value<T: Injectable>(&self, value: T, options: &[ProviderOption]) -> Result<()> {
        let options = ProviderOptions::from(options);
        let info = TypeInfo::of::<T>();

        if info.is_reserved() {
            return Err(DiError::UnrepresentableValue {
                type_name: info.key().name(),
            });
        }

        let provider = Provider::value(&info, Arc::new(value), options)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "invoke_di",
            service = provider.key().name(),
            provided = info.key().name(),
            round_robin = options.round_robin,
            depth = self.depth(),
            provider_count = self.storage.len() + 1,
            "Registering value provider"
        );

        self.storage.insert(provider)?;
        Ok(())
    }

    /// Provide every return type of `factory`.
    ///
    /// Each output position gets its own provider; all of them share the
    /// factory, which runs lazily with its parameters resolved from this
    /// registry. A `Result` error channel is never provided, it fails the
    /// resolution instead. The factory result is cached unless
    /// [`ProviderOption::MultiInstance`] is set.
    ///
    /// ```rust
    /// use invoke_di::{ProviderOption, Registry};
    ///
    /// let registry = Registry::new();
    /// registry
    ///     .provide(|| (String::from("db"), 5432u16), &[ProviderOption::EagerLoading])
    ///     .unwrap();
    ///
    /// assert_eq!(registry.get::<u16>().unwrap(), 5432);
    /// assert_eq!(registry.get::<String>().unwrap(), "db");
    /// ```
    pub fn provide<Args, F>(&self, factory: F, options: &[ProviderOption]) -> Result<()>
    where
        F: Factory<Args>,
    {
        self.provide_callable(Arc::new(Callable::new(factory)), options)
    }

    /// Provide every return type of an already erased factory.
    pub fn provide_callable(
        &self,
        factory: Arc<Callable>,
        options: &[ProviderOption],
    ) -> Result<()> {
        let options = ProviderOptions::from(options);

        let mut providers = Vec::with_capacity(factory.outputs().len());
        for (index, info) in factory.outputs().iter().enumerate() {
            if info.is_reserved() {
                continue;
            }
            providers.push(Provider::factory(info, Arc::clone(&factory), index, options)?);
        }

        if providers.is_empty() {
            return Err(DiError::NoReturnValues {
                type_name: factory.name(),
            });
        }

        #[cfg(feature = "logging")]
        for provider in &providers {
            debug!(
                target: "invoke_di",
                service = provider.key().name(),
                factory = factory.name(),
                multi_instance = options.multi_instance,
                round_robin = options.round_robin,
                eager_loading = options.eager_loading,
                depth = self.depth(),
                "Registering factory provider"
            );
        }

        let providers = self.storage.insert_all(providers)?;

        if options.eager_loading {
            for provider in providers {
                let key = provider.key();
                provider.provide(self).map_err(|source| DiError::EagerLoadFailed {
                    type_name: key.name(),
                    source: Box::new(source),
                })?;
                if options.round_robin {
                    provider.rewind();
                }
            }
        }

        Ok(())
    }

    /// Like [`provide`](Self::provide), but panics on error.
    ///
    /// # Panics
    ///
    /// Panics with the error message if registration fails.
    #[track_caller]
    pub fn must_provide<Args, F>(&self, factory: F, options: &[ProviderOption]) -> &Self
    where
        F: Factory<Args>,
    {
        if let Err(err) = self.provide(factory, options) {
            panic!("{err}");
        }
        self
    }

    /// Like [`provide_value`](Self::provide_value), but panics on error.
    ///
    /// # Panics
    ///
    /// Panics with the error message if registration fails.
    #[track_caller]
    pub fn must_provide_value<T: Injectable>(&self, value: T, options: &[ProviderOption]) -> &Self {
        if let Err(err) = self.provide_value(value, options) {
            panic!("{err}");
        }
        self
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Check if `T` can be resolved here, including from parents.
    #[inline]
    pub fn contains<T: Injectable>(&self) -> bool {
        self.storage.contains_in_chain(&TypeId::of::<T>())
    }

    /// Check if `T` is provided by this registry itself.
    #[inline]
    pub fn contains_local<T: Injectable>(&self) -> bool {
        self.storage.contains(&TypeId::of::<T>())
    }

    /// Number of providers in this registry (not including parents).
    ///
    /// The registry's own self-binding is counted.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Always false in practice, since a registry provides itself.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Types bound in this registry.
    pub fn registered_types(&self) -> Vec<TypeKey> {
        self.storage.type_keys()
    }

    /// Number of ancestors (0 = root).
    #[inline]
    pub fn depth(&self) -> u32 {
        self.storage.depth()
    }

    /// The parent registry, if any.
    pub fn parent(&self) -> Option<Registry> {
        self.storage.parent().cloned().map(Registry::from_shared)
    }

    /// Check if two handles refer to the same registry.
    #[inline]
    pub fn ptr_eq(&self, other: &Registry) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }
}

impl Injectable for Registry {}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("provider_count", &self.storage.len())
            .field("depth", &self.storage.depth())
            .finish()
    }
}
