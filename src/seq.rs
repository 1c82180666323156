//! Lazy, single-pass, pull-driven sequences.
//!
//! `Seq` wraps any iterator and adds the chaining vocabulary the store,
//! schema layer and traversals are written in. Every combinator returns a
//! new `Seq` that pulls from its upstream on demand; nothing is buffered.
//! A `Seq` is consumed by driving it. To read the same data twice, call the
//! producing operation twice.

use std::hash::Hash;

use hashbrown::HashSet;

/// A lazy sequence of `T`.
pub struct Seq<'a, T> {
    inner: Box<dyn Iterator<Item = T> + 'a>,
}

impl<'a, T: 'a> Seq<'a, T> {
    /// Wrap any iterable source. The source may be infinite.
    pub fn new<I>(source: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'a,
    {
        Self { inner: Box::new(source.into_iter()) }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn once(item: T) -> Self {
        Self::new(std::iter::once(item))
    }

    /// Keep only the items accepted by `predicate`.
    pub fn filter<P>(self, mut predicate: P) -> Self
    where
        P: FnMut(&T) -> bool + 'a,
    {
        Self::new(self.inner.filter(move |x| predicate(x)))
    }

    pub fn map<U: 'a, F>(self, mapper: F) -> Seq<'a, U>
    where
        F: FnMut(T) -> U + 'a,
    {
        Seq::new(self.inner.map(mapper))
    }

    /// Yield at most `n` items. The only safe way to bound an infinite source.
    pub fn limit(self, n: usize) -> Self {
        Self::new(self.inner.take(n))
    }

    /// Drop items whose key was already produced by this materialization.
    pub fn unique_by<K, F>(self, mut key: F) -> Self
    where
        K: Eq + Hash + 'a,
        F: FnMut(&T) -> K + 'a,
    {
        let mut seen = HashSet::new();
        Self::new(self.inner.filter(move |x| seen.insert(key(x))))
    }

    /// Drive until one item is produced.
    pub fn first(mut self) -> Option<T> {
        self.inner.next()
    }
}

impl<'a, S> Seq<'a, S>
where
    S: IntoIterator + 'a,
    S::IntoIter: 'a,
    S::Item: 'a,
{
    /// Flatten a sequence of sequences, pulling each inner source only when reached.
    pub fn flatten(self) -> Seq<'a, S::Item> {
        Seq::new(self.inner.flat_map(|s| s.into_iter()))
    }
}

impl<T> Iterator for Seq<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }
}

impl<T> std::fmt::Debug for Seq<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seq { .. }")
    }
}
