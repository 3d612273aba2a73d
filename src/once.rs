//! Default-usable cell that runs a producer once and replays its outcome.
//!
//! [`OnceValue<T>`] is the primitive the rest of the crate is built on. The
//! first caller of [`OnceValue::get_or_init`] runs the producer while every
//! other caller parks; whatever the producer did (return a value or panic) is
//! recorded and handed to every later call.

use core::cell::UnsafeCell;
use core::fmt;
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
use core::future::Future;
use core::mem::MaybeUninit;
use std::panic::{self, AssertUnwindSafe, RefUnwindSafe, UnwindSafe};
use std::thread;

#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
use futures::FutureExt;
use tracing::{debug, trace};

use crate::payload::Payload;
use crate::state::{OnceState, Outcome, RunGuard};

/// A value computed by the first call that asks for it.
///
/// `OnceValue::new()` and `OnceValue::default()` are ready to use; there is no
/// separate initialization step. If the producer panics, the panic is captured
/// and [`get_or_init`](Self::get_or_init) panics on that call and on every
/// call after it. The producer is never run a second time.
///
/// Only the first call re-raises the producer's own payload. Later calls
/// replay a copy, which keeps its type for `&'static str` and `String`
/// payloads; any other payload type comes back as [`OpaquePanic`](crate::OpaquePanic).
///
/// ```
/// use zeros::OnceValue;
///
/// static GREETING: OnceValue<String> = OnceValue::new();
///
/// assert_eq!(GREETING.get_or_init(|| "hello".to_owned()), "hello");
/// // The second producer is ignored.
/// assert_eq!(GREETING.get_or_init(|| unreachable!()), "hello");
/// ```
pub struct OnceValue<T> {
   // Initialized iff the state says `Resolved`.
   value: UnsafeCell<MaybeUninit<T>>,
   // Written once, before the state says `Failed`.
   failure: UnsafeCell<Option<Payload>>,
   state: OnceState,
}

impl<T> OnceValue<T> {
   /// Creates a cell whose producer has not run yet.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         value: UnsafeCell::new(MaybeUninit::uninit()),
         failure: UnsafeCell::new(None),
         state: OnceState::pending(),
      }
   }

   /// Creates a cell that already holds `value`. No producer will ever run.
   #[inline]
   #[must_use]
   pub const fn with_value(value: T) -> Self {
      Self {
         value: UnsafeCell::new(MaybeUninit::new(value)),
         failure: UnsafeCell::new(None),
         state: OnceState::resolved(),
      }
   }

   /// Returns `true` if the producer returned normally.
   #[inline]
   pub fn is_done(&self) -> bool {
      self.state.outcome() == Outcome::Resolved
   }

   /// Returns `true` if the producer panicked. Every later
   /// [`get_or_init`](Self::get_or_init) will panic as well.
   #[inline]
   pub fn is_poisoned(&self) -> bool {
      self.state.outcome() == Outcome::Failed
   }

   /// Returns the value if the producer has already returned it.
   ///
   /// `None` while the producer hasn't run, is still running, or panicked.
   /// Never blocks and never panics.
   #[inline]
   pub fn get(&self) -> Option<&T> {
      match self.state.outcome() {
         // SAFETY: `Resolved` was published after the value was written.
         Outcome::Resolved => Some(unsafe { self.value_ref() }),
         _ => None,
      }
   }

   /// Mutable counterpart of [`get`](Self::get).
   #[inline]
   pub fn get_mut(&mut self) -> Option<&mut T> {
      match self.state.outcome() {
         // SAFETY: as in `get`, and `&mut self` rules out other readers.
         Outcome::Resolved => Some(unsafe { self.value.get_mut().assume_init_mut() }),
         _ => None,
      }
   }

   /// Returns the cached value, running `f` first if nobody has yet.
   ///
   /// Concurrent callers park until the single run of `f` finishes and then
   /// all observe its outcome. If `f` panicked, this call and every later
   /// call panic with an equal payload; see [`OpaquePanic`](crate::OpaquePanic)
   /// for payloads that are not strings.
   ///
   /// Calling `get_or_init` on the same cell from inside `f` deadlocks.
   #[inline]
   pub fn get_or_init<F>(&self, f: F) -> &T
   where
      F: FnOnce() -> T,
   {
      if self.state.outcome() == Outcome::Pending {
         self.initialize(f);
      }
      self.resolved()
   }

   /// Exclusive-access counterpart of [`get_or_init`](Self::get_or_init).
   ///
   /// Same replay rules; never parks since nobody else can hold the cell.
   #[inline]
   pub fn get_mut_or_init<F>(&mut self, f: F) -> &mut T
   where
      F: FnOnce() -> T,
   {
      if self.state.outcome() == Outcome::Pending {
         self.initialize(f);
      }
      match self.state.outcome() {
         // SAFETY: see `get_mut`.
         Outcome::Resolved => unsafe { self.value.get_mut().assume_init_mut() },
         _ => self.replay(),
      }
   }

   /// Async counterpart of [`get_or_init`](Self::get_or_init).
   ///
   /// A panic raised while polling the producer's future is captured and
   /// replayed like a synchronous one. If the future driving the producer is
   /// dropped before it completes, the cell returns to pending and the next
   /// caller runs its own producer.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub async fn get_or_init_async<F, Fut>(&self, f: F) -> &T
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = T>,
   {
      if self.state.outcome() == Outcome::Pending {
         self.initialize_async(f).await;
      }
      self.resolved()
   }

   /// Consumes the cell, returning the value if the producer returned one.
   #[inline]
   pub fn into_inner(mut self) -> Option<T> {
      if self.state.take_resolved() {
         // SAFETY: the value was initialized, and clearing `Resolved` keeps
         // `Drop` from touching it again.
         Some(unsafe { self.value.get_mut().assume_init_read() })
      } else {
         None
      }
   }

   /// # Safety
   ///
   /// The state must have been observed as `Resolved`.
   #[inline(always)]
   unsafe fn value_ref(&self) -> &T {
      (*self.value.get()).assume_init_ref()
   }

   /// Reads the outcome of a settled cell, replaying a captured panic.
   #[inline]
   fn resolved(&self) -> &T {
      match self.state.outcome() {
         // SAFETY: see `get`.
         Outcome::Resolved => unsafe { self.value_ref() },
         Outcome::Failed => self.replay(),
         Outcome::Pending => unreachable!("OnceValue read before its producer finished"),
      }
   }

   /// Re-raises the cached failure. Only called once the state says `Failed`.
   #[cold]
   fn replay(&self) -> ! {
      // SAFETY: the payload is written before `Failed` is published and is
      // never written again.
      match unsafe { &*self.failure.get() } {
         Some(payload) => payload.replay(),
         None => unreachable!("failed OnceValue has no payload"),
      }
   }

   #[cold]
   fn initialize<F>(&self, f: F)
   where
      F: FnOnce() -> T,
   {
      let Some(guard) = self.state.claim() else {
         return;
      };
      trace!(ty = core::any::type_name::<T>(), "running once producer");
      self.settle(guard, panic::catch_unwind(AssertUnwindSafe(f)));
   }

   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   #[cold]
   async fn initialize_async<F, Fut>(&self, f: F)
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = T>,
   {
      let Some(guard) = self.state.claim_async().await else {
         return;
      };
      trace!(ty = core::any::type_name::<T>(), "running async once producer");
      let outcome = AssertUnwindSafe(async move { f().await }).catch_unwind().await;
      self.settle(guard, outcome);
   }

   /// Records the producer's outcome and wakes everyone parked on the cell.
   /// On panic, resumes the original payload in the calling thread.
   fn settle(&self, guard: RunGuard<'_>, outcome: thread::Result<T>) {
      match outcome {
         Ok(value) => {
            // SAFETY: holding the run guard gives exclusive write access;
            // nobody reads the value until `resolve` publishes it.
            unsafe { (*self.value.get()).write(value) };
            guard.resolve();
            trace!(ty = core::any::type_name::<T>(), "once producer resolved");
         }
         Err(original) => {
            let captured = Payload::capture(&*original);
            debug!(
               ty = core::any::type_name::<T>(),
               payload = %captured,
               "once producer panicked, caching failure"
            );
            // SAFETY: as above, published by `fail`.
            unsafe { *self.failure.get() = Some(captured) };
            guard.fail();
            panic::resume_unwind(original);
         }
      }
   }
}

impl<T> Drop for OnceValue<T> {
   fn drop(&mut self) {
      if self.state.outcome() == Outcome::Resolved {
         // SAFETY: `Resolved` means the value is initialized.
         unsafe { self.value.get_mut().assume_init_drop() };
      }
   }
}

// SAFETY: a shared `OnceValue<T>` hands out `&T` to many threads (`T: Sync`)
// and the value may be produced on one thread and dropped on another
// (`T: Send`). All writes to the cell are serialized by `OnceState`.
unsafe impl<T: Send + Sync> Sync for OnceValue<T> {}

impl<T: RefUnwindSafe + UnwindSafe> RefUnwindSafe for OnceValue<T> {}
impl<T: UnwindSafe> UnwindSafe for OnceValue<T> {}

impl<T> Default for OnceValue<T> {
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<T> From<T> for OnceValue<T> {
   #[inline]
   fn from(value: T) -> Self {
      Self::with_value(value)
   }
}

impl<T: fmt::Debug> fmt::Debug for OnceValue<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("OnceValue");
      match self.state.outcome() {
         // SAFETY: see `get`.
         Outcome::Resolved => d.field(unsafe { self.value_ref() }),
         // SAFETY: see `replay`.
         Outcome::Failed => match unsafe { &*self.failure.get() } {
            Some(payload) => d.field(&format_args!("<panicked: {payload}>")),
            None => d.field(&format_args!("<panicked>")),
         },
         Outcome::Pending => d.field(&format_args!("<pending>")),
      };
      d.finish()
   }
}
