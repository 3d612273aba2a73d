//! Hash map that allocates its storage on first use.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::{self, HashMap, RandomState};

use crate::once::OnceValue;

/// A `HashMap` usable straight from `Map::new()` or `default()`.
///
/// Lookups on a map that was never written report it as empty without
/// allocating. Writing, clearing or iterating allocates the storage once.
/// Like `HashMap`, sharing a map between threads follows the normal borrow
/// rules: only the allocation itself is synchronized.
///
/// Iteration order is unspecified.
///
/// ```
/// use zeros::Map;
///
/// let mut scores: Map<&str, u32> = Map::new();
/// assert_eq!(scores.len(), 0);
///
/// scores.insert("ann", 3);
/// assert_eq!(scores.get("ann"), Some(&3));
/// assert_eq!(scores.get_or_default("bob"), 0);
/// ```
pub struct Map<K, V, S = RandomState> {
   once: OnceValue<HashMap<K, V, S>>,
}

impl<K, V, S> Map<K, V, S> {
   /// Creates a map. Nothing is allocated until the first write or iteration.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         once: OnceValue::new(),
      }
   }

   /// Wraps an existing `HashMap`.
   #[inline]
   #[must_use]
   pub const fn from_hash_map(map: HashMap<K, V, S>) -> Self {
      Self {
         once: OnceValue::with_value(map),
      }
   }

   /// Number of entries; 0 for a map that was never allocated.
   #[inline]
   pub fn len(&self) -> usize {
      self.once.get().map_or(0, HashMap::len)
   }

   /// Returns `true` if the map holds no entries. Never allocates.
   #[inline]
   pub fn is_empty(&self) -> bool {
      self.len() == 0
   }

   /// Consumes the wrapper, returning the storage if it was ever allocated.
   #[inline]
   pub fn into_hash_map(self) -> Option<HashMap<K, V, S>> {
      self.once.into_inner()
   }
}

impl<K, V, S: Default> Map<K, V, S> {
   #[inline]
   fn storage(&self) -> &HashMap<K, V, S> {
      self.once.get_or_init(HashMap::default)
   }

   #[inline]
   fn storage_mut(&mut self) -> &mut HashMap<K, V, S> {
      self.once.get_mut_or_init(HashMap::default)
   }

   /// The underlying map, allocated if needed.
   #[inline]
   pub fn as_hash_map(&self) -> &HashMap<K, V, S> {
      self.storage()
   }

   /// Mutable access to the underlying map, allocated if needed.
   #[inline]
   pub fn as_hash_map_mut(&mut self) -> &mut HashMap<K, V, S> {
      self.storage_mut()
   }

   /// Removes every entry, keeping the allocation.
   pub fn clear(&mut self) {
      self.storage_mut().clear();
   }

   /// Iterates over `(&key, &value)` pairs.
   ///
   /// Each call starts a fresh pass. Dropping the iterator early just stops
   /// the walk.
   pub fn iter(&self) -> hash_map::Iter<'_, K, V> {
      self.storage().iter()
   }

   /// Iterates over `(&key, &mut value)` pairs.
   pub fn iter_mut(&mut self) -> hash_map::IterMut<'_, K, V> {
      self.storage_mut().iter_mut()
   }

   /// Iterates the keys in arbitrary order. Allocates the storage if needed.
   pub fn keys(&self) -> hash_map::Keys<'_, K, V> {
      self.storage().keys()
   }

   /// Iterates the values in arbitrary order. Allocates the storage if needed.
   pub fn values(&self) -> hash_map::Values<'_, K, V> {
      self.storage().values()
   }

   /// Mutable counterpart of [`values`](Self::values).
   pub fn values_mut(&mut self) -> hash_map::ValuesMut<'_, K, V> {
      self.storage_mut().values_mut()
   }
}

impl<K, V, S> Map<K, V, S>
where
   K: Eq + Hash,
   S: BuildHasher + Default,
{
   /// Inserts or overwrites the entry for `key`, returning the old value.
   pub fn insert(&mut self, key: K, value: V) -> Option<V> {
      self.storage_mut().insert(key, value)
   }

   /// Returns the value for `key`, or `None` if it is absent.
   pub fn get<Q>(&self, key: &Q) -> Option<&V>
   where
      K: Borrow<Q>,
      Q: Hash + Eq + ?Sized,
   {
      self.once.get()?.get(key)
   }

   /// Returns a clone of the value for `key`, or `V::default()` if it is absent.
   pub fn get_or_default<Q>(&self, key: &Q) -> V
   where
      K: Borrow<Q>,
      Q: Hash + Eq + ?Sized,
      V: Clone + Default,
   {
      self.get(key).cloned().unwrap_or_default()
   }

   /// Mutable counterpart of [`get`](Self::get).
   pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
   where
      K: Borrow<Q>,
      Q: Hash + Eq + ?Sized,
   {
      self.once.get_mut()?.get_mut(key)
   }

   /// Returns `true` if `key` is present. Never allocates.
   pub fn contains_key<Q>(&self, key: &Q) -> bool
   where
      K: Borrow<Q>,
      Q: Hash + Eq + ?Sized,
   {
      self.get(key).is_some()
   }

   /// Removes `key`, returning its value if it was present.
   pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
   where
      K: Borrow<Q>,
      Q: Hash + Eq + ?Sized,
   {
      self.storage_mut().remove(key)
   }
}

impl<K, V, S> Default for Map<K, V, S> {
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<K, V, S> From<HashMap<K, V, S>> for Map<K, V, S> {
   #[inline]
   fn from(map: HashMap<K, V, S>) -> Self {
      Self::from_hash_map(map)
   }
}

impl<K: Clone, V: Clone, S: Clone> Clone for Map<K, V, S> {
   /// The clone gets its own storage; an unallocated map clones to an
   /// unallocated map.
   fn clone(&self) -> Self {
      match self.once.get() {
         Some(map) => Self::from_hash_map(map.clone()),
         None => Self::new(),
      }
   }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for Map<K, V, S> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self.once.get() {
         Some(map) => f.debug_map().entries(map.iter()).finish(),
         None => f.debug_map().finish(),
      }
   }
}

impl<K, V, S> PartialEq for Map<K, V, S>
where
   K: Eq + Hash,
   V: PartialEq,
   S: BuildHasher,
{
   /// Maps are equal when they hold the same entries, allocated or not.
   fn eq(&self, other: &Self) -> bool {
      match (self.once.get(), other.once.get()) {
         (Some(a), Some(b)) => a == b,
         (Some(map), None) | (None, Some(map)) => map.is_empty(),
         (None, None) => true,
      }
   }
}

impl<K, V, S> Eq for Map<K, V, S>
where
   K: Eq + Hash,
   V: Eq,
   S: BuildHasher,
{
}

impl<K, V, S> Extend<(K, V)> for Map<K, V, S>
where
   K: Eq + Hash,
   S: BuildHasher + Default,
{
   fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
      self.storage_mut().extend(iter);
   }
}

impl<K, V, S> FromIterator<(K, V)> for Map<K, V, S>
where
   K: Eq + Hash,
   S: BuildHasher + Default,
{
   fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
      Self::from_hash_map(HashMap::from_iter(iter))
   }
}

impl<'a, K, V, S: Default> IntoIterator for &'a Map<K, V, S> {
   type Item = (&'a K, &'a V);
   type IntoIter = hash_map::Iter<'a, K, V>;

   fn into_iter(self) -> Self::IntoIter {
      self.iter()
   }
}

impl<'a, K, V, S: Default> IntoIterator for &'a mut Map<K, V, S> {
   type Item = (&'a K, &'a mut V);
   type IntoIter = hash_map::IterMut<'a, K, V>;

   fn into_iter(self) -> Self::IntoIter {
      self.iter_mut()
   }
}
