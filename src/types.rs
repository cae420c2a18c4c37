//! Runtime type identity for registered values
//!
//! Every provider is keyed by a [`TypeKey`]. Sequence types additionally
//! describe a [`PoolShape`] so a round-robin provider can hand out their
//! elements one at a time without knowing the concrete type.

use crate::{BoxError, DiError, Result};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// A type-erased, shareable value held by the registry.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Shared error value; reserved like [`BoxError`] and never provided.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Runtime identity of a type: its `TypeId` plus a name for messages.
///
/// Equality and hashing only consider the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key of type `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId`
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name, as reported by `std::any::type_name`
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Error types are reserved for failure signaling and never bound.
    pub fn is_reserved(&self) -> bool {
        self.id == TypeId::of::<BoxError>()
            || self.id == TypeId::of::<SharedError>()
            || self.id == TypeId::of::<DiError>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl std::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Element accessors for a sequence type, used by round-robin providers.
#[derive(Clone, Copy)]
pub struct PoolShape {
    element: TypeKey,
    len: fn(&AnyValue) -> Option<usize>,
    element_at: fn(&AnyValue, usize) -> Option<AnyValue>,
}

fn pool_len<S, T>(pool: &AnyValue) -> Option<usize>
where
    S: AsRef<[T]> + 'static,
{
    pool.downcast_ref::<S>().map(|seq| seq.as_ref().len())
}

fn pool_element<S, T>(pool: &AnyValue, index: usize) -> Option<AnyValue>
where
    S: AsRef<[T]> + 'static,
    T: Injectable,
{
    let element = pool.downcast_ref::<S>()?.as_ref().get(index)?.clone();
    Some(Arc::new(element) as AnyValue)
}

impl PoolShape {
    /// Shape of a sequence `S` whose elements are `T`
    pub fn of<S, T>() -> Self
    where
        S: AsRef<[T]> + 'static,
        T: Injectable,
    {
        Self {
            element: TypeKey::of::<T>(),
            len: pool_len::<S, T>,
            element_at: pool_element::<S, T>,
        }
    }

    /// Key of the element type
    #[inline]
    pub fn element(&self) -> TypeKey {
        self.element
    }

    /// Number of elements in `pool`
    pub(crate) fn len(&self, pool: &AnyValue) -> Result<usize> {
        (self.len)(pool).ok_or_else(|| {
            DiError::Internal(format!("round-robin pool is not a sequence of {}", self.element))
        })
    }

    /// Clone of the element at `index`
    pub(crate) fn element_at(&self, pool: &AnyValue, index: usize) -> Result<AnyValue> {
        (self.element_at)(pool, index).ok_or_else(|| {
            DiError::Internal(format!(
                "round-robin pool of {} has no element {index}",
                self.element
            ))
        })
    }
}

impl std::fmt::Debug for PoolShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolShape")
            .field("element", &self.element)
            .finish()
    }
}

/// Everything the registry needs to know about a provided type.
#[derive(Clone, Copy, Debug)]
pub struct TypeInfo {
    key: TypeKey,
    pool: Option<PoolShape>,
}

impl TypeInfo {
    /// Describe `T`
    #[inline]
    pub fn of<T: Injectable>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            pool: T::pool_shape(),
        }
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Round-robin shape, if the type is a sequence
    #[inline]
    pub fn pool(&self) -> Option<PoolShape> {
        self.pool
    }

    #[inline]
    pub fn is_reserved(&self) -> bool {
        self.key.is_reserved()
    }
}

/// Types that can be provided by a registry and injected as parameters.
///
/// Injected parameters are clones of the stored value, so share expensive
/// services through `Arc<T>`. The crate implements this for std scalars,
/// strings, collections, `Arc<T>` (including trait objects) and
/// `Option<T>`. Sequence types (`Vec<T>`, `[T; N]`, `Box<[T]>`) also report
/// a [`PoolShape`] so they can back a round-robin provider.
///
/// Your own types opt in with an empty impl, or with `#[derive(Injectable)]`
/// when the `derive` feature is enabled:
///
/// ```rust
/// use invoke_di::Injectable;
///
/// #[derive(Clone)]
/// struct Config {
///     debug: bool,
/// }
///
/// impl Injectable for Config {}
/// ```
pub trait Injectable: Clone + Send + Sync + 'static {
    /// Round-robin shape when `Self` is a sequence of injectable elements.
    #[inline]
    fn pool_shape() -> Option<PoolShape> {
        None
    }
}

macro_rules! impl_injectable {
    ($($t:ty),* $(,)?) => {
        $(impl Injectable for $t {})*
    };
}

impl_injectable!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, PathBuf, Duration, Instant, SystemTime, IpAddr, Ipv4Addr, Ipv6Addr,
    SocketAddr,
);

impl<T: ?Sized + Send + Sync + 'static> Injectable for Arc<T> {}

impl<T: Injectable> Injectable for Option<T> {}

impl<T: Injectable> Injectable for Vec<T> {
    #[inline]
    fn pool_shape() -> Option<PoolShape> {
        Some(PoolShape::of::<Self, T>())
    }
}

impl<T: Injectable, const N: usize> Injectable for [T; N] {
    #[inline]
    fn pool_shape() -> Option<PoolShape> {
        Some(PoolShape::of::<Self, T>())
    }
}

impl<T: Injectable> Injectable for Box<[T]> {
    #[inline]
    fn pool_shape() -> Option<PoolShape> {
        Some(PoolShape::of::<Self, T>())
    }
}

impl<K, V, S> Injectable for HashMap<K, V, S>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
}

impl<T, S> Injectable for HashSet<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
}

impl<K, V> Injectable for BTreeMap<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
}

impl<T: Clone + Send + Sync + 'static> Injectable for BTreeSet<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_identity() {
        assert_eq!(TypeKey::of::<u32>(), TypeKey::of::<u32>());
        assert_ne!(TypeKey::of::<u32>(), TypeKey::of::<i32>());
        assert_eq!(TypeKey::of::<u32>().name(), "u32");
    }

    #[test]
    fn test_reserved_error_types() {
        assert!(TypeKey::of::<BoxError>().is_reserved());
        assert!(TypeKey::of::<SharedError>().is_reserved());
        assert!(TypeKey::of::<DiError>().is_reserved());
        assert!(!TypeKey::of::<String>().is_reserved());
    }

    #[test]
    fn test_non_sequence_has_no_pool() {
        assert!(TypeInfo::of::<u64>().pool().is_none());
        assert!(TypeInfo::of::<String>().pool().is_none());
        assert!(TypeInfo::of::<Arc<[u8]>>().pool().is_none());
    }

    #[test]
    fn test_vec_pool_shape() {
        let shape = TypeInfo::of::<Vec<u16>>().pool().unwrap();
        assert_eq!(shape.element(), TypeKey::of::<u16>());

        let pool: AnyValue = Arc::new(vec![7u16, 9]);
        assert_eq!(shape.len(&pool).unwrap(), 2);

        let second = shape.element_at(&pool, 1).unwrap();
        assert_eq!(second.downcast_ref::<u16>(), Some(&9));
        assert!(shape.element_at(&pool, 2).is_err());
    }

    #[test]
    fn test_array_and_boxed_slice_pool_shape() {
        let array = TypeInfo::of::<[&'static str; 3]>().pool().unwrap();
        assert_eq!(array.element(), TypeKey::of::<&'static str>());
        let pool: AnyValue = Arc::new(["a", "b", "c"]);
        assert_eq!(array.len(&pool).unwrap(), 3);

        let boxed = TypeInfo::of::<Box<[i8]>>().pool().unwrap();
        let pool: AnyValue = Arc::new(vec![1i8, 2].into_boxed_slice());
        let first = boxed.element_at(&pool, 0).unwrap();
        assert_eq!(first.downcast_ref::<i8>(), Some(&1));
    }

    #[test]
    fn test_pool_shape_rejects_wrong_value() {
        let shape = TypeInfo::of::<Vec<u16>>().pool().unwrap();
        let not_a_pool: AnyValue = Arc::new(5u16);
        assert!(shape.len(&not_a_pool).is_err());
    }
}
