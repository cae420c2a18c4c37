//! Uniform view of injectable functions
//!
//! Any `Fn(A1, .., An) -> R` whose parameters are [`Injectable`] implements
//! [`Invocable`], which exposes the declared parameter types and a call
//! entry point taking type-erased arguments. [`Outputs`] describes the
//! declared return types and strips a trailing `Result` error.
//!
//! Factories are stored as a [`Callable`]: one type for every arity and
//! return shape, invoked through the same parameter resolution path as
//! user functions.

use crate::types::{AnyValue, Injectable, TypeInfo, TypeKey};
use crate::{BoxError, DiError, Result};
use std::any::type_name;
use std::sync::Arc;

// =============================================================================
// Outputs
// =============================================================================

/// Return shape of an injectable function.
///
/// Implemented for:
/// - `()` - no outputs
/// - any `T: Injectable` - one output
/// - tuples of `Injectable`s (up to 8) - one output per position
/// - `Result<O, E>` where `O` is one of the above and `E: Into<BoxError>`
pub trait Outputs: Sized + 'static {
    /// The successful value, with any `Result` wrapper removed
    type Value;

    /// Declared output types, in position order
    fn output_types() -> Vec<TypeInfo>;

    /// Split off the error channel
    fn into_value(self) -> std::result::Result<Self::Value, BoxError>;

    /// Erase every output position
    fn erase(value: Self::Value) -> Vec<AnyValue>;
}

impl Outputs for () {
    type Value = ();

    #[inline]
    fn output_types() -> Vec<TypeInfo> {
        Vec::new()
    }

    #[inline]
    fn into_value(self) -> std::result::Result<(), BoxError> {
        Ok(())
    }

    #[inline]
    fn erase(_value: ()) -> Vec<AnyValue> {
        Vec::new()
    }
}

impl<T: Injectable> Outputs for T {
    type Value = T;

    #[inline]
    fn output_types() -> Vec<TypeInfo> {
        vec![TypeInfo::of::<T>()]
    }

    #[inline]
    fn into_value(self) -> std::result::Result<T, BoxError> {
        Ok(self)
    }

    #[inline]
    fn erase(value: T) -> Vec<AnyValue> {
        vec![Arc::new(value) as AnyValue]
    }
}

impl<O, E> Outputs for std::result::Result<O, E>
where
    O: Outputs,
    E: Into<BoxError> + 'static,
{
    type Value = O::Value;

    #[inline]
    fn output_types() -> Vec<TypeInfo> {
        O::output_types()
    }

    #[inline]
    fn into_value(self) -> std::result::Result<O::Value, BoxError> {
        self.map_err(Into::into)?.into_value()
    }

    #[inline]
    fn erase(value: O::Value) -> Vec<AnyValue> {
        O::erase(value)
    }
}

macro_rules! impl_outputs_tuple {
    ($($T:ident),+) => {
        impl<$($T: Injectable),+> Outputs for ($($T,)+) {
            type Value = Self;

            #[inline]
            fn output_types() -> Vec<TypeInfo> {
                vec![$(TypeInfo::of::<$T>()),+]
            }

            #[inline]
            fn into_value(self) -> std::result::Result<Self, BoxError> {
                Ok(self)
            }

            #[inline]
            #[allow(non_snake_case)]
            fn erase(value: Self) -> Vec<AnyValue> {
                let ($($T,)+) = value;
                vec![$(Arc::new($T) as AnyValue),+]
            }
        }
    };
}

impl_outputs_tuple!(A, B);
impl_outputs_tuple!(A, B, C);
impl_outputs_tuple!(A, B, C, D);
impl_outputs_tuple!(A, B, C, D, E);
impl_outputs_tuple!(A, B, C, D, E, F);
impl_outputs_tuple!(A, B, C, D, E, F, G);
impl_outputs_tuple!(A, B, C, D, E, F, G, H);

// =============================================================================
// Invocable / Factory
// =============================================================================

/// A function whose parameters can be resolved from a registry.
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// per-arity implementations apart and is inferred at the call site.
/// The return type is unconstrained: only factories need storable outputs.
pub trait Invocable<Args> {
    /// What the function returns
    type Output;

    /// Declared parameter types, left to right
    fn param_types() -> Vec<TypeKey>;

    /// Call with already resolved arguments, one per declared parameter
    fn call_erased(&self, args: &[AnyValue]) -> Result<Self::Output>;
}

/// An [`Invocable`] that can be stored in a registry and shared between threads.
///
/// Its return type must describe storable [`Outputs`].
pub trait Factory<Args>: Invocable<Args, Output: Outputs> + Send + Sync + 'static {}

impl<Args, F> Factory<Args> for F
where
    F: Invocable<Args> + Send + Sync + 'static,
    F::Output: Outputs,
{
}

fn downcast_arg<T: Injectable>(arg: Option<&AnyValue>) -> Result<T> {
    arg.and_then(|value| value.downcast_ref::<T>())
        .cloned()
        .ok_or_else(|| DiError::Internal(format!("argument is not of type {}", type_name::<T>())))
}

macro_rules! impl_invocable {
    ($($A:ident),*) => {
        impl<Func, Out, $($A),*> Invocable<($($A,)*)> for Func
        where
            Func: Fn($($A),*) -> Out,
            $($A: Injectable),*
        {
            type Output = Out;

            #[inline]
            fn param_types() -> Vec<TypeKey> {
                vec![$(TypeKey::of::<$A>()),*]
            }

            #[inline]
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call_erased(&self, args: &[AnyValue]) -> Result<Out> {
                let mut args = args.iter();
                $(let $A = downcast_arg::<$A>(args.next())?;)*
                Ok((self)($($A),*))
            }
        }
    };
}

impl_invocable!();
impl_invocable!(A);
impl_invocable!(A, B);
impl_invocable!(A, B, C);
impl_invocable!(A, B, C, D);
impl_invocable!(A, B, C, D, E);
impl_invocable!(A, B, C, D, E, F);
impl_invocable!(A, B, C, D, E, F, G);
impl_invocable!(A, B, C, D, E, F, G, H);
impl_invocable!(A, B, C, D, E, F, G, H, I);
impl_invocable!(A, B, C, D, E, F, G, H, I, J);
impl_invocable!(A, B, C, D, E, F, G, H, I, J, K);
impl_invocable!(A, B, C, D, E, F, G, H, I, J, K, L);

// =============================================================================
// Callable - type-erased factory
// =============================================================================

type ErasedFn = Box<dyn Fn(&[AnyValue]) -> Result<Vec<AnyValue>> + Send + Sync>;

/// A type-erased function plus its declared parameter and return types.
///
/// Registries store factories as `Callable`s, and [`Registry::invoke_all`]
/// takes a batch of them.
///
/// [`Registry::invoke_all`]: crate::Registry::invoke_all
///
/// ```rust
/// use invoke_di::{Callable, TypeKey};
///
/// let callable = Callable::new(|port: u16, host: String| format!("{host}:{port}"));
/// assert_eq!(callable.params(), &[TypeKey::of::<u16>(), TypeKey::of::<String>()]);
/// assert_eq!(callable.outputs().len(), 1);
/// ```
pub struct Callable {
    name: &'static str,
    params: Vec<TypeKey>,
    outputs: Vec<TypeInfo>,
    call: ErasedFn,
}

impl Callable {
    /// Erase a function
    pub fn new<Args, F>(function: F) -> Self
    where
        F: Factory<Args>,
    {
        Self {
            name: type_name::<F>(),
            params: F::param_types(),
            outputs: <F::Output as Outputs>::output_types(),
            call: Box::new(move |args| {
                let value = function
                    .call_erased(args)?
                    .into_value()
                    .map_err(DiError::FactoryFailure)?;
                Ok(<F::Output as Outputs>::erase(value))
            }),
        }
    }

    /// Type name of the wrapped function
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared parameter types
    #[inline]
    pub fn params(&self) -> &[TypeKey] {
        &self.params
    }

    /// Declared return types, error channel excluded
    #[inline]
    pub fn outputs(&self) -> &[TypeInfo] {
        &self.outputs
    }

    /// Call with resolved arguments. An `Err` returned by the function
    /// becomes [`DiError::FactoryFailure`].
    #[inline]
    pub(crate) fn call(&self, args: &[AnyValue]) -> Result<Vec<AnyValue>> {
        (self.call)(args)
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("outputs", &self.outputs)
            .finish()
    }
}
