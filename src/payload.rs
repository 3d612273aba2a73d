//! Capturing a producer's panic so it can be raised again on every later call.
//!
//! A `Box<dyn Any + Send>` can only be resumed once, so the captured payload is
//! reduced to something that can rebuild an equivalent box on demand. The
//! payloads `panic!` itself produces (`&'static str` for literal messages,
//! `String` for formatted ones) are rebuilt with the same type and contents.

use core::any::Any;
use core::fmt;
use std::panic;

/// Payload raised on replay when the original panic carried a value that is
/// neither `&'static str` nor `String`.
///
/// Such payloads (from [`std::panic::panic_any`]) can't be duplicated, so only
/// the initiating call sees the original value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaquePanic;

impl fmt::Display for OpaquePanic {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str("once producer panicked with a non-string payload")
   }
}

/// A replayable copy of a panic payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
   Static(&'static str),
   Owned(String),
   Opaque,
}

impl Payload {
   pub(crate) fn capture(payload: &(dyn Any + Send)) -> Self {
      if let Some(msg) = payload.downcast_ref::<&'static str>() {
         Self::Static(msg)
      } else if let Some(msg) = payload.downcast_ref::<String>() {
         Self::Owned(msg.clone())
      } else {
         Self::Opaque
      }
   }

   /// Resumes unwinding with a fresh box equal to the captured payload.
   ///
   /// Uses [`panic::resume_unwind`], so the panic hook does not fire again.
   #[cold]
   pub(crate) fn replay(&self) -> ! {
      match self {
         Self::Static(msg) => panic::resume_unwind(Box::new(*msg)),
         Self::Owned(msg) => panic::resume_unwind(Box::new(msg.clone())),
         Self::Opaque => panic::resume_unwind(Box::new(OpaquePanic)),
      }
   }
}

impl fmt::Display for Payload {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::Static(msg) => f.write_str(msg),
         Self::Owned(msg) => f.write_str(msg),
         Self::Opaque => fmt::Display::fmt(&OpaquePanic, f),
      }
   }
}
