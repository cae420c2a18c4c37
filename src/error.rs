//! Error types for the registry and invocation engine

use std::any::TypeId;
use thiserror::Error;

/// Boxed error returned by user factories and invoked functions.
///
/// This is the reserved error type: it is never registered as a provided
/// type, only used to signal failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while registering providers or invoking functions
#[derive(Error, Debug)]
pub enum DiError {
    /// A provider for this type already exists in the same registry
    #[error("provider of type {type_name:?} already exists")]
    DuplicateProvider { type_name: &'static str },

    /// The value's type is reserved for failure signaling and cannot be provided
    #[error("can't provide value of type {type_name:?}")]
    UnrepresentableValue { type_name: &'static str },

    /// Round-robin was requested for a type that is not a sequence
    #[error("can't round-robin value of type {type_name:?}, must be a sequence (Vec, array or boxed slice)")]
    NotRoundRobinCompatible { type_name: &'static str },

    /// A factory declares no return values
    #[error("can't declare factory provider {type_name:?} without return values")]
    NoReturnValues { type_name: &'static str },

    /// No registry in the ancestor chain provides the parameter type
    #[error("not found provider for {position} parameter of type {type_name:?}")]
    ProviderNotFound {
        position: usize,
        type_name: &'static str,
        type_id: TypeId,
    },

    /// A provider was found but its strategy failed
    #[error("failed to provide {position} parameter of type {type_name:?}: {source}")]
    ResolutionFailed {
        position: usize,
        type_name: &'static str,
        #[source]
        source: Box<DiError>,
    },

    /// The user factory or the invoked function returned an error
    #[error(transparent)]
    FactoryFailure(BoxError),

    /// An eagerly loaded provider failed during registration
    #[error("failed to eagerly load value of type {type_name:?}: {source}")]
    EagerLoadFailed {
        type_name: &'static str,
        #[source]
        source: Box<DiError>,
    },

    /// The value passed for dynamic invocation is not a [`Callable`](crate::Callable)
    #[error("can't invoke a non-function value of type {type_name:?}")]
    InvalidCallable { type_name: &'static str },

    /// A round-robin provider was backed by an empty sequence
    #[error("can't round-robin an empty sequence of {type_name:?}")]
    EmptyRoundRobin { type_name: &'static str },

    /// Internal error
    #[error("internal DI error: {0}")]
    Internal(String),
}

impl DiError {
    /// Create a ProviderNotFound error for a 0-based parameter index
    #[inline]
    pub(crate) fn not_found(index: usize, key: &crate::TypeKey) -> Self {
        Self::ProviderNotFound {
            position: index + 1,
            type_name: key.name(),
            type_id: key.id(),
        }
    }

    /// Wrap a strategy failure with the parameter's position and type
    #[inline]
    pub(crate) fn resolution_failed(index: usize, key: &crate::TypeKey, source: DiError) -> Self {
        Self::ResolutionFailed {
            position: index + 1,
            type_name: key.name(),
            source: Box::new(source),
        }
    }

    /// Create a FactoryFailure from any user error
    #[inline]
    pub fn factory(err: impl Into<BoxError>) -> Self {
        Self::FactoryFailure(err.into())
    }

    /// Returns the user error that caused this failure, if any.
    ///
    /// Walks through [`ResolutionFailed`](Self::ResolutionFailed) and
    /// [`EagerLoadFailed`](Self::EagerLoadFailed) wrappers and returns the
    /// exact value a factory or invoked function returned.
    ///
    /// ```rust
    /// use invoke_di::Registry;
    /// use std::io;
    ///
    /// let registry = Registry::new();
    /// registry
    ///     .provide(|| -> io::Result<u32> { Err(io::Error::other("boom")) }, &[])
    ///     .unwrap();
    ///
    /// let err = registry.invoke(|_n: u32| ()).unwrap_err();
    /// let cause = err.factory_error().unwrap();
    /// assert_eq!(cause.downcast_ref::<io::Error>().unwrap().to_string(), "boom");
    /// ```
    pub fn factory_error(&self) -> Option<&BoxError> {
        match self {
            Self::FactoryFailure(err) => Some(err),
            Self::ResolutionFailed { source, .. } | Self::EagerLoadFailed { source, .. } => {
                source.factory_error()
            }
            _ => None,
        }
    }

    /// Check if this is (or wraps) a missing provider error
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ProviderNotFound { .. } => true,
            Self::ResolutionFailed { source, .. } | Self::EagerLoadFailed { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;
