//! Rendezvous channel that allocates itself on first use.

use core::fmt;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::trace;

use crate::once::OnceValue;

/// Halves that exist only while the channel is open. Dropping them is what
/// closes the channel.
struct OpenHalves<T> {
   data: Sender<T>,
   // Never sent on. Dropping it disconnects `Endpoints::closed`, which wakes
   // every send and receive parked on the channel.
   _close_signal: Sender<()>,
}

struct Endpoints<T> {
   open: Mutex<Option<OpenHalves<T>>>,
   receiver: Receiver<T>,
   closed: Receiver<()>,
}

impl<T> Endpoints<T> {
   fn rendezvous() -> Self {
      let (data, receiver) = crossbeam_channel::bounded(0);
      let (close_signal, closed) = crossbeam_channel::bounded(0);
      trace!(ty = core::any::type_name::<T>(), "allocated rendezvous channel");
      Self {
         open: Mutex::new(Some(OpenHalves {
            data,
            _close_signal: close_signal,
         })),
         receiver,
         closed,
      }
   }

   /// A short-lived clone of the data sender. Clones never outlive the call
   /// that made them, so closing the channel disconnects it promptly.
   fn open_sender(&self) -> Sender<T> {
      match self.open.lock().as_ref() {
         Some(halves) => halves.data.clone(),
         None => panic!("send on closed channel"),
      }
   }

   fn closed_now(&self) -> bool {
      matches!(self.closed.try_recv(), Err(TryRecvError::Disconnected))
   }
}

/// An unbuffered channel usable straight from `Chan::new()` or `default()`.
///
/// The underlying `crossbeam-channel` rendezvous pair is allocated by
/// whichever operation touches the channel first. A send completes only when
/// a receiver takes the value.
///
/// Sending on a closed channel and closing it twice are bugs in the caller and
/// panic, the same way they do for Go channels. Running out of values is not:
/// receives report it with `None` (or `T::default()` for [`recv`](Self::recv)).
///
/// ```
/// use std::thread;
/// use zeros::Chan;
///
/// let chan: Chan<i32> = Chan::new();
/// thread::scope(|s| {
///    s.spawn(|| chan.send(42));
///    assert_eq!(chan.recv(), 42);
/// });
/// ```
pub struct Chan<T> {
   once: OnceValue<Endpoints<T>>,
}

impl<T> Chan<T> {
   /// Creates a channel. Nothing is allocated until the first operation.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         once: OnceValue::new(),
      }
   }

   #[inline]
   fn endpoints(&self) -> &Endpoints<T> {
      self.once.get_or_init(Endpoints::rendezvous)
   }

   /// Sends `value`, blocking until a receiver takes it.
   ///
   /// # Panics
   ///
   /// If the channel is closed before the call or while it is blocked.
   pub fn send(&self, value: T) {
      let endpoints = self.endpoints();
      let data = endpoints.open_sender();
      // Biased: once closed, the close arm wins even if a receiver is ready.
      crossbeam_channel::select_biased! {
         recv(endpoints.closed) -> _ => panic!("send on closed channel"),
         // `endpoints` keeps the receiving half alive, so the send can't
         // report a disconnect.
         send(data, value) -> _ => {}
      }
   }

   /// Sends `value` only if a receiver is already waiting for it.
   ///
   /// Returns `false` and drops `value` otherwise.
   ///
   /// # Panics
   ///
   /// If the channel is closed.
   pub fn try_send(&self, value: T) -> bool {
      self.endpoints().open_sender().try_send(value).is_ok()
   }

   /// Receives a value, blocking until one is sent or the channel is closed.
   ///
   /// Returns `None` once the channel is closed. A close wins over a sender
   /// that happens to be ready at the same moment.
   pub fn recv_checked(&self) -> Option<T> {
      let endpoints = self.endpoints();
      crossbeam_channel::select_biased! {
         recv(endpoints.closed) -> _ => None,
         recv(endpoints.receiver) -> msg => msg.ok(),
      }
   }

   /// Like [`recv_checked`](Self::recv_checked), but a closed channel yields
   /// `T::default()`.
   pub fn recv(&self) -> T
   where
      T: Default,
   {
      self.recv_checked().unwrap_or_default()
   }

   /// Takes a value only if a sender is already blocked offering one.
   ///
   /// Returns `None` if nobody is sending right now, and also once the
   /// channel is closed.
   pub fn try_recv(&self) -> Option<T> {
      let endpoints = self.endpoints();
      if endpoints.closed_now() {
         return None;
      }
      endpoints.receiver.try_recv().ok()
   }

   /// Closes the channel.
   ///
   /// Receivers blocked now or later get `None`. Senders blocked now panic.
   ///
   /// # Panics
   ///
   /// If the channel is already closed.
   pub fn close(&self) {
      let halves = self.endpoints().open.lock().take();
      if halves.is_none() {
         panic!("close of closed channel");
      }
      drop(halves);
      trace!(ty = core::any::type_name::<T>(), "channel closed");
   }

   /// Returns `true` after [`close`](Self::close) has been called.
   pub fn is_closed(&self) -> bool {
      self.endpoints().open.lock().is_none()
   }

   /// The receiving half of the underlying channel, for use with
   /// [`crossbeam_channel::select!`].
   ///
   /// The channel never hands out its sending half, so after
   /// [`close`](Self::close) this receiver reports a disconnect as soon as
   /// the senders it woke have unwound.
   pub fn receiver(&self) -> &Receiver<T> {
      &self.endpoints().receiver
   }
}

impl<T> Default for Chan<T> {
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<T> fmt::Debug for Chan<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_struct("Chan");
      match self.once.get() {
         Some(endpoints) => d.field("closed", &endpoints.open.lock().is_none()),
         None => d.field("allocated", &false),
      };
      d.finish()
   }
}
