use itertools::Itertools;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{Debug, Error, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A lightweight key usable to index into a [`RefStore`] or [`RefPool`].
///
/// Implemented automatically for any type that is cheap to convert to/from `usize`.
pub trait Ref: Into<usize> + From<usize> + Copy + PartialEq {}

impl<X> Ref for X where X: Into<usize> + From<usize> + Copy + PartialEq {}

/// Declares a newtype wrapping a `NonZeroU32`, usable as a [`Ref`].
///
/// The zero value is reserved so that `Option<T>` is the same size as `T`.
#[macro_export]
macro_rules! create_ref_type {
    ($type_name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
        pub struct $type_name(std::num::NonZeroU32);

        impl $type_name {
            pub const fn to_u32(self) -> u32 {
                self.0.get() - 1
            }
            pub const fn from_u32(u: u32) -> Self {
                unsafe { $type_name(std::num::NonZeroU32::new_unchecked(u + 1)) }
            }
        }
        impl From<usize> for $type_name {
            fn from(u: usize) -> Self {
                Self::from_u32(u as u32)
            }
        }
        impl From<$type_name> for usize {
            fn from(v: $type_name) -> Self {
                (v.0.get() - 1) as usize
            }
        }

        impl<V> std::ops::Index<$type_name> for Vec<V> {
            type Output = V;

            fn index(&self, index: $type_name) -> &Self::Output {
                &self[usize::from(index)]
            }
        }

        impl<V> std::ops::IndexMut<$type_name> for Vec<V> {
            fn index_mut(&mut self, index: $type_name) -> &mut Self::Output {
                &mut self[usize::from(index)]
            }
        }
    };
}

/// A store that interns complex values, returning a compact integer key for each distinct value.
///
/// Unlike [`RefStore`], a previously interned value can be looked back up to its key with `get_ref`.
#[derive(Clone)]
pub struct RefPool<Key, Val> {
    internal: Vec<Val>,
    rev: HashMap<Val, Key>,
}

impl<K, V: Hash + Eq> Default for RefPool<K, V> {
    fn default() -> Self {
        RefPool {
            internal: Default::default(),
            rev: HashMap::new(),
        }
    }
}

impl<K, V: Debug> Debug for RefPool<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{:?}", self.internal.iter().enumerate().format(", "))
    }
}

impl<K, V> RefPool<K, V>
where
    K: Ref,
{
    pub fn len(&self) -> usize {
        self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty()
    }

    /// Interns `v`, returning its existing key if already present, or a freshly allocated one.
    pub fn get_or_insert(&mut self, v: V) -> K
    where
        V: Eq + Hash + Clone,
    {
        if let Some(&k) = self.rev.get(&v) {
            return k;
        }
        let id: K = self.internal.len().into();
        self.rev.insert(v.clone(), id);
        self.internal.push(v);
        id
    }

    pub fn get(&self, k: K) -> &V {
        &self.internal[k.into()]
    }

    pub fn get_ref<W: ?Sized>(&self, v: &W) -> Option<K>
    where
        W: Eq + Hash,
        V: Eq + Hash + Borrow<W>,
    {
        self.rev.get(v).copied()
    }
}

impl<K: Ref, V> Index<K> for RefPool<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index)
    }
}

/// A dense, append-only store indexed by a compact key `K`.
///
/// Unlike [`RefPool`], values are not deduplicated and the key is only known at insertion time.
#[derive(Clone)]
pub struct RefStore<Key, Val> {
    internal: Vec<Val>,
    phantom: PhantomData<Key>,
}

impl<K, V: Debug> Debug for RefStore<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{:?}", self.internal.iter().enumerate().format(", "))
    }
}

impl<K: Ref, V> Default for RefStore<K, V> {
    fn default() -> Self {
        RefStore::new()
    }
}

impl<K, V> RefStore<K, V>
where
    K: Ref,
{
    pub fn new() -> Self {
        RefStore {
            internal: Vec::new(),
            phantom: PhantomData,
        }
    }

    /// Creates a store of `len` entries, all initialized to a clone of `v`.
    pub fn initialized(len: usize, v: V) -> Self
    where
        V: Clone,
    {
        RefStore {
            internal: vec![v; len],
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.len()).map(K::from)
    }

    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.internal.iter()
    }

    pub fn last_key(&self) -> Option<K> {
        if self.is_empty() {
            None
        } else {
            Some((self.len() - 1).into())
        }
    }

    pub fn push(&mut self, v: V) -> K {
        let id: K = self.internal.len().into();
        self.internal.push(v);
        id
    }

    /// Grows the store with clones of `filler` until it has an entry for `up_to`.
    pub fn fill_up_to(&mut self, up_to: K, filler: V)
    where
        V: Clone,
    {
        let idx: usize = up_to.into();
        while self.internal.len() <= idx {
            self.internal.push(filler.clone());
        }
    }

    pub fn get(&self, k: K) -> &V {
        &self.internal[k.into()]
    }

    pub fn get_mut(&mut self, k: K) -> &mut V {
        &mut self.internal[k.into()]
    }
}

impl<K: Ref, V> Index<K> for RefStore<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index)
    }
}

impl<K: Ref, V> IndexMut<K> for RefStore<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        self.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    create_ref_type!(TestKey);

    #[test]
    fn ref_store_push_and_index() {
        let mut store: RefStore<TestKey, &'static str> = RefStore::new();
        let a = store.push("a");
        let b = store.push("b");
        assert_eq!(store[a], "a");
        assert_eq!(store[b], "b");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn ref_pool_deduplicates() {
        let mut pool: RefPool<TestKey, String> = RefPool::default();
        let a1 = pool.get_or_insert("hello".to_string());
        let a2 = pool.get_or_insert("hello".to_string());
        let b = pool.get_or_insert("world".to_string());
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(pool.get_ref("hello"), Some(a1));
    }
}
