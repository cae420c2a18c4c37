//! # invoke-di - Runtime dependency registry with reflective invocation
//!
//! Register values or factory functions keyed by the type they produce,
//! then call any function and have its parameters supplied from the
//! registry by type.
//!
//! ## Features
//!
//! - 🔑 **Type-keyed** - Providers are bound by `TypeId`, no names or tokens
//! - 🏭 **Lazy factories** - Run on first use, cached unless `MultiInstance`
//! - 🔁 **Round-robin** - Bind a sequence and hand out its elements in turn
//! - ⚡ **Eager loading** - Surface factory errors at registration time
//! - 🌳 **Parent chaining** - Child registries fall back to their ancestors
//! - 🔒 **Fine-grained locking** - Sharded map plus one lock per provider
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use invoke_di::{Injectable, ProviderOption, Registry};
//!
//! #[derive(Clone)]
//! struct Database {
//!     url: String,
//! }
//!
//! impl Injectable for Database {}
//!
//! let registry = Registry::new();
//!
//! // A plain value
//! registry.provide_value(String::from("postgres://localhost"), &[]).unwrap();
//!
//! // A factory, with its own parameters resolved on first use
//! registry.provide(|url: String| Database { url }, &[]).unwrap();
//!
//! // Any function can be invoked with its parameters resolved
//! let url = registry.invoke(|db: Database| db.url).unwrap();
//! assert_eq!(url, "postgres://localhost");
//! ```
//!
//! ## Provider Options
//!
//! ```rust
//! use invoke_di::{ProviderOption, Registry};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! static COUNTER: AtomicU64 = AtomicU64::new(0);
//!
//! let registry = Registry::new();
//!
//! // Fresh value on every resolution
//! registry
//!     .provide(|| COUNTER.fetch_add(1, Ordering::SeqCst), &[ProviderOption::MultiInstance])
//!     .unwrap();
//!
//! // One element per resolution, wrapping around
//! registry
//!     .provide_value(vec!["a", "b"], &[ProviderOption::RoundRobin])
//!     .unwrap();
//!
//! let (first, second) = registry.invoke(|a: u64, b: u64| (a, b)).unwrap();
//! assert_ne!(first, second);
//!
//! let picked = registry
//!     .invoke(|x: &'static str, y: &'static str, z: &'static str| [x, y, z])
//!     .unwrap();
//! assert_eq!(picked, ["a", "b", "a"]);
//! ```
//!
//! ## Errors from factories
//!
//! Factories may return `Result<T, E>` for any `E: Into<BoxError>`. The
//! error is never provided; it fails the resolution, and the original value
//! is available from [`DiError::factory_error`]. [`Registry::invoke`] hands
//! back whatever the function returns, while [`Registry::try_invoke`]
//! flattens a returned `Err` into the same [`DiError::FactoryFailure`].

// Lets derive-generated `::invoke_di::` paths resolve inside this crate's tests
extern crate self as invoke_di;

mod callable;
mod error;
mod invoke;
#[cfg(feature = "logging")]
pub mod logging;
mod options;
mod provider;
mod registry;
mod storage;
mod types;

pub use callable::{Callable, Factory, Invocable, Outputs};
pub use error::*;
pub use options::{ProviderOption, ProviderOptions};
pub use registry::Registry;
pub use types::{AnyValue, Injectable, PoolShape, SharedError, TypeInfo, TypeKey};

#[cfg(feature = "derive")]
pub use invoke_di_derive::{Inject, Injectable};

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BoxError, Callable, DiError, Injectable, ProviderOption, ProviderOptions, Registry,
        Result,
    };
    pub use std::sync::Arc;
}
