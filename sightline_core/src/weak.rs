// Copyright 2026 the Sightline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Weak references and weak membership sets.
//!
//! Nothing reached through these types may be assumed alive: [`WeakRef::resolve`] and the
//! liveness predicate handed to [`WeakSet::sweep`] are the only ways to find out.

use alloc::sync::{Arc, Weak};
use core::fmt;

use smallvec::SmallVec;

/// A weak single-object holder.
///
/// Resolves to `None` once the referent has been dropped, or if the holder was created empty.
pub struct WeakRef<T: ?Sized> {
    inner: Option<Weak<T>>,
}

impl<T: ?Sized> WeakRef<T> {
    /// Creates a holder that never resolves.
    pub const fn empty() -> Self {
        Self { inner: None }
    }

    /// Creates a holder that does not keep `strong` alive.
    pub fn new(strong: &Arc<T>) -> Self {
        Self {
            inner: Some(Arc::downgrade(strong)),
        }
    }

    /// Upgrades to a strong reference if the referent is still alive.
    pub fn resolve(&self) -> Option<Arc<T>> {
        self.inner.as_ref()?.upgrade()
    }

    /// Returns `true` if the holder is empty or its referent is gone.
    pub fn is_gone(&self) -> bool {
        self.inner.as_ref().is_none_or(|weak| weak.strong_count() == 0)
    }
}

impl<T: ?Sized> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Default for WeakRef<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> From<&Arc<T>> for WeakRef<T> {
    fn from(strong: &Arc<T>) -> Self {
        Self::new(strong)
    }
}

impl<T: ?Sized> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("gone", &self.is_gone())
            .finish()
    }
}

/// A set of handles with membership-only semantics.
///
/// Entries are compared by identity. The set never keeps the referents alive; stale entries
/// linger until the next [`WeakSet::sweep`] or [`WeakSet::retain_alive`].
#[derive(Clone, Debug)]
pub struct WeakSet<I> {
    items: SmallVec<[I; 4]>,
}

impl<I> Default for WeakSet<I> {
    fn default() -> Self {
        Self {
            items: SmallVec::new(),
        }
    }
}

impl<I: Copy + Eq> WeakSet<I> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id`, returning `false` if it was already a member.
    pub fn insert(&mut self, id: I) -> bool {
        if self.contains(id) {
            return false;
        }
        self.items.push(id);
        true
    }

    /// Returns `true` if `id` is a member (alive or not).
    pub fn contains(&self, id: I) -> bool {
        self.items.contains(&id)
    }

    /// Removes `id`, returning `true` if it was a member.
    pub fn remove(&mut self, id: I) -> bool {
        let before = self.items.len();
        self.items.retain(|member| *member != id);
        before != self.items.len()
    }

    /// Removes `removed` (if given) and every entry whose referent is gone, in one pass.
    ///
    /// Returns the number of entries dropped.
    pub fn sweep(&mut self, removed: Option<I>, mut is_alive: impl FnMut(I) -> bool) -> usize {
        let before = self.items.len();
        self.items
            .retain(|member| Some(*member) != removed && is_alive(*member));
        before - self.items.len()
    }

    /// Drops every entry whose referent is gone.
    pub fn retain_alive(&mut self, is_alive: impl FnMut(I) -> bool) -> usize {
        self.sweep(None, is_alive)
    }

    /// Iterates over members in insertion order, including stale ones.
    pub fn iter(&self) -> impl Iterator<Item = I> + '_ {
        self.items.iter().copied()
    }

    /// Number of members, including stale ones.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn weak_ref_resolves_until_dropped() {
        let strong = Arc::new(7_u32);
        let weak = WeakRef::new(&strong);
        assert_eq!(weak.resolve().as_deref(), Some(&7));
        assert!(!weak.is_gone());

        drop(strong);
        assert!(weak.resolve().is_none());
        assert!(weak.is_gone());
    }

    #[test]
    fn empty_weak_ref_never_resolves() {
        let weak: WeakRef<u32> = WeakRef::empty();
        assert!(weak.resolve().is_none());
        assert!(weak.is_gone());
    }

    #[test]
    fn weak_ref_to_trait_object() {
        trait Named {
            fn name(&self) -> &'static str;
        }
        struct A;
        impl Named for A {
            fn name(&self) -> &'static str {
                "a"
            }
        }

        let strong: Arc<dyn Named> = Arc::new(A);
        let weak: WeakRef<dyn Named> = WeakRef::from(&strong);
        assert_eq!(weak.resolve().map(|n| n.name()), Some("a"));
    }

    #[test]
    fn set_deduplicates_by_identity() {
        let mut set = WeakSet::new();
        assert!(set.insert(1_u32));
        assert!(!set.insert(1_u32), "second insert of the same id is a no-op");
        assert!(set.insert(2_u32));
        assert_eq!(set.len(), 2);
        assert!(set.contains(2));
        assert!(set.remove(2));
        assert!(!set.remove(2));
    }

    #[test]
    fn sweep_removes_explicit_and_stale_entries() {
        let mut set = WeakSet::new();
        for id in 0_u32..6 {
            set.insert(id);
        }
        // Odd ids are "gone"; 2 is removed explicitly.
        let dropped = set.sweep(Some(2), |id| id % 2 == 0);
        assert_eq!(dropped, 4);
        assert_eq!(set.iter().collect::<Vec<_>>(), [0, 4]);
    }
}
