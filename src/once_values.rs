//! Two-result flavour of [`OnceValue`].

use core::fmt;
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
use core::future::Future;

use crate::once::OnceValue;

/// A pair of values computed together by the first call that asks for them.
///
/// Same contract as [`OnceValue`]: usable from `new()`/`default()`, the
/// producer runs at most once, and a producer panic is replayed on every call.
///
/// ```
/// use zeros::OnceValues;
///
/// let split: OnceValues<String, usize> = OnceValues::new();
/// let (name, port) = split.get_or_init(|| {
///    let (name, port) = "db:5432".split_once(':').unwrap();
///    (name.to_owned(), port.parse().unwrap())
/// });
/// assert_eq!((name.as_str(), *port), ("db", 5432));
/// ```
pub struct OnceValues<T1, T2> {
   inner: OnceValue<(T1, T2)>,
}

impl<T1, T2> OnceValues<T1, T2> {
   /// Creates a cell whose producer has not run yet.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         inner: OnceValue::new(),
      }
   }

   /// Creates a cell that already holds both values.
   #[inline]
   #[must_use]
   pub const fn with_values(first: T1, second: T2) -> Self {
      Self {
         inner: OnceValue::with_value((first, second)),
      }
   }

   /// Returns `true` if the producer returned normally.
   #[inline]
   pub fn is_done(&self) -> bool {
      self.inner.is_done()
   }

   /// Returns `true` if the producer panicked.
   #[inline]
   pub fn is_poisoned(&self) -> bool {
      self.inner.is_poisoned()
   }

   /// Returns both values if the producer has already returned them.
   #[inline]
   pub fn get(&self) -> Option<(&T1, &T2)> {
      self.inner.get().map(|(first, second)| (first, second))
   }

   /// Returns the cached pair, running `f` first if nobody has yet.
   ///
   /// See [`OnceValue::get_or_init`] for blocking and panic replay.
   #[inline]
   pub fn get_or_init<F>(&self, f: F) -> (&T1, &T2)
   where
      F: FnOnce() -> (T1, T2),
   {
      let (first, second) = self.inner.get_or_init(f);
      (first, second)
   }

   /// Async counterpart of [`get_or_init`](Self::get_or_init).
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub async fn get_or_init_async<F, Fut>(&self, f: F) -> (&T1, &T2)
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = (T1, T2)>,
   {
      let (first, second) = self.inner.get_or_init_async(f).await;
      (first, second)
   }

   /// Consumes the cell, returning both values if the producer returned them.
   #[inline]
   pub fn into_inner(self) -> Option<(T1, T2)> {
      self.inner.into_inner()
   }
}

impl<T1, T2> Default for OnceValues<T1, T2> {
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<T1: fmt::Debug, T2: fmt::Debug> fmt::Debug for OnceValues<T1, T2> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("OnceValues");
      match self.inner.get() {
         Some((first, second)) => d.field(first).field(second),
         None if self.inner.is_poisoned() => d.field(&format_args!("<panicked>")),
         None => d.field(&format_args!("<pending>")),
      };
      d.finish()
   }
}
