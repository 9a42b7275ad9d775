//! Typed keys and type tokens for values stored in a command context.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A stable identifier for a parseable value type.
///
/// Used as the key in the `type -> parser` and `type -> injector` registries;
/// the name is retained purely for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// The token for `T`.
    #[must_use]
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying type id.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name this token was created from.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A typed key addressing one value in a [`CommandContext`](crate::context::CommandContext).
///
/// Two keys address the same slot iff both name and value type match, so a
/// component named `count` storing an `i64` never collides with an unrelated
/// `count: String`.
pub struct ContextKey<T> {
    name: Arc<str>,
    _value: PhantomData<fn() -> T>,
}

impl<T: 'static> ContextKey<T> {
    /// Creates a key with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            _value: PhantomData,
        }
    }

    /// The key's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn raw(&self) -> RawKey {
        RawKey {
            name: Arc::clone(&self.name),
            ty: TypeId::of::<T>(),
        }
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// Untyped form of a context key: name plus value type id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RawKey {
    pub(crate) name: Arc<str>,
    pub(crate) ty: TypeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_different_type_is_a_different_slot() {
        let int_key = ContextKey::<i64>::new("count");
        let string_key = ContextKey::<String>::new("count");
        assert_ne!(int_key.raw(), string_key.raw());
    }

    #[test]
    fn value_type_tokens_compare_by_type() {
        assert_eq!(ValueType::of::<i32>(), ValueType::of::<i32>());
        assert_ne!(ValueType::of::<i32>(), ValueType::of::<u32>());
        assert!(ValueType::of::<String>().name().contains("String"));
    }
}
