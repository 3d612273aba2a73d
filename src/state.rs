//! The one-shot execution guard shared by every cell in the crate.
//!
//! A cell's whole lifecycle, including how its producer ended, lives in one
//! `AtomicU8`:
//!
//! | bits | meaning |
//! |------|---------|
//! | 0    | RESOLVED: the producer returned a value |
//! | 1    | FAILED: the producer panicked |
//! | 2    | RUNNING: a thread owns the producer run |
//! | 3    | WAITING: someone is parked until the run ends |
//! | 4-7  | epoch, bumped whenever a run ends |
//!
//! A word never carries both RESOLVED and FAILED through this module, but if
//! it did, FAILED wins. Threads that lose the race park on the atomic's
//! address through `parking_lot_core` and are woken in bulk when the run ends.

use core::mem;
use core::sync::atomic::{AtomicU8, Ordering};

use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// How a cell's producer ended, as far as the state word says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
   Pending,
   Resolved,
   Failed,
}

/// Result of one non-blocking attempt at taking the producer run.
enum Attempt<'a> {
   Run(RunGuard<'a>),
   Settled,
   Busy(u8),
}

/// Atomic lifecycle of a once cell.
#[repr(transparent)]
pub(crate) struct OnceState(AtomicU8);

impl OnceState {
   const RESOLVED: u8 = 1 << 0;
   const FAILED: u8 = 1 << 1;
   const RUNNING: u8 = 1 << 2;
   const WAITING: u8 = 1 << 3;
   const SETTLED: u8 = Self::RESOLVED | Self::FAILED;
   const EPOCH_STEP: u8 = 1 << 4;

   /// Yields an async claimer spends before parking inside `block_in_place`.
   #[cfg(feature = "async-tokio-mt")]
   const ASYNC_YIELD_BUDGET: u32 = 256;

   #[inline]
   pub(crate) const fn pending() -> Self {
      Self(AtomicU8::new(0))
   }

   /// A state for cells built around a ready value.
   #[inline]
   pub(crate) const fn resolved() -> Self {
      Self(AtomicU8::new(Self::RESOLVED))
   }

   #[inline(always)]
   const fn decode(word: u8) -> Outcome {
      if word & Self::FAILED != 0 {
         Outcome::Failed
      } else if word & Self::RESOLVED != 0 {
         Outcome::Resolved
      } else {
         Outcome::Pending
      }
   }

   /// Current outcome. Uses `Acquire`, so a `Resolved` or `Failed` answer
   /// makes the cell's stored value or payload visible to the caller.
   #[inline]
   pub(crate) fn outcome(&self) -> Outcome {
      Self::decode(self.0.load(Ordering::Acquire))
   }

   /// Forgets a resolved outcome so the owner can move the value out.
   /// Returns whether the cell was resolved.
   #[inline]
   pub(crate) fn take_resolved(&mut self) -> bool {
      let word = self.0.get_mut();
      let was_resolved = Self::decode(*word) == Outcome::Resolved;
      if was_resolved {
         *word &= !Self::RESOLVED;
      }
      was_resolved
   }

   /// Non-blocking attempt at taking the run. `Busy` carries the word to
   /// park on; it always has WAITING set.
   fn try_claim(&self) -> Attempt<'_> {
      let mut word = self.0.load(Ordering::Acquire);
      loop {
         if word & Self::SETTLED != 0 {
            return Attempt::Settled;
         }
         let next = if word & Self::RUNNING == 0 {
            word | Self::RUNNING
         } else if word & Self::WAITING == 0 {
            word | Self::WAITING
         } else {
            return Attempt::Busy(word);
         };
         match self
            .0
            .compare_exchange_weak(word, next, Ordering::Acquire, Ordering::Acquire)
         {
            Ok(_) if word & Self::RUNNING == 0 => return Attempt::Run(RunGuard { state: self }),
            Ok(_) => return Attempt::Busy(next),
            Err(actual) => word = actual,
         }
      }
   }

   /// Takes the producer run, parking while another thread holds it.
   ///
   /// Returns `None` once the cell is settled. Calling this from inside the
   /// producer of the same cell deadlocks.
   pub(crate) fn claim(&self) -> Option<RunGuard<'_>> {
      loop {
         match self.try_claim() {
            Attempt::Run(guard) => return Some(guard),
            Attempt::Settled => return None,
            Attempt::Busy(word) => self.park_while(word),
         }
      }
   }

   /// Async flavour of [`claim`](Self::claim): yields to the tokio scheduler
   /// while the run is busy. On the multi-threaded runtime a long wait ends
   /// up parked inside `block_in_place`.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub(crate) async fn claim_async(&self) -> Option<RunGuard<'_>> {
      let mut yields: u32 = 0;
      loop {
         match self.try_claim() {
            Attempt::Run(guard) => return Some(guard),
            Attempt::Settled => return None,
            Attempt::Busy(word) => {
               if self.0.load(Ordering::Relaxed) != word {
                  continue;
               }
               yields = yields.saturating_add(1);
               #[cfg(feature = "async-tokio-mt")]
               if yields > Self::ASYNC_YIELD_BUDGET {
                  return tokio::task::block_in_place(|| {
                     self.park_while(word);
                     self.claim()
                  });
               }
               tokio::task::yield_now().await;
            }
         }
      }
   }

   /// Parks the current thread unless the word has moved past `observed`.
   fn park_while(&self, observed: u8) {
      // SAFETY: the key is the atomic's address, which only this module
      // parks or unparks on.
      unsafe {
         // The validate closure runs under the queue lock, so a run that
         // ends after our load still finds us in the queue.
         let _ = parking_lot_core::park(
            self.0.as_ptr() as usize,
            || self.0.load(Ordering::Acquire) == observed,
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            None,
         );
      }
   }

   /// Ends a run with `outcome` bits (0 to go back to pending).
   fn end_run(&self, outcome: u8) {
      let epoch = (self.0.load(Ordering::Relaxed) & !(Self::EPOCH_STEP - 1))
         .wrapping_add(Self::EPOCH_STEP);
      // Release pairs with the Acquire in `outcome`/`try_claim`, publishing
      // whatever the run stored in the cell.
      let prev = self.0.swap(epoch | outcome, Ordering::Release);
      if prev & Self::WAITING != 0 {
         // SAFETY: see `park_while`.
         unsafe {
            parking_lot_core::unpark_all(self.0.as_ptr() as usize, DEFAULT_UNPARK_TOKEN);
         }
      }
   }
}

/// Ownership of a producer run.
///
/// Finish it with [`resolve`](Self::resolve) or [`fail`](Self::fail).
/// Dropping it unfinished (an async producer whose future was dropped) puts
/// the cell back to pending so the next caller runs its own producer.
pub(crate) struct RunGuard<'a> {
   state: &'a OnceState,
}

impl RunGuard<'_> {
   /// The producer returned and its value is stored.
   pub(crate) fn resolve(self) {
      self.finish(OnceState::RESOLVED);
   }

   /// The producer panicked and its payload is stored.
   pub(crate) fn fail(self) {
      self.finish(OnceState::FAILED);
   }

   fn finish(self, outcome: u8) {
      self.state.end_run(outcome);
      mem::forget(self);
   }
}

impl Drop for RunGuard<'_> {
   fn drop(&mut self) {
      self.state.end_run(0);
   }
}
