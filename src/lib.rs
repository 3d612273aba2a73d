//! Concurrency wrappers that work from their default value.
//!
//! Every type in this crate can be created with `new()` (a `const fn`) or
//! `Default::default()` and used right away, including in a `static`. The
//! resource behind it is produced on first use, exactly once, even when many
//! threads get there at the same time.
//!
//! - [`OnceValue<T>`]: runs a producer once and caches what it returned. If
//!   the producer panics, the panic is cached too and every call re-raises it.
//! - [`OnceValues<T1, T2>`]: the same for a producer returning two values.
//! - [`Chan<T>`]: a rendezvous channel allocated on first send or receive.
//! - [`Map<K, V>`]: a hash map allocated on first write or iteration.
//!
//! Waiting threads park through `parking_lot`'s futex-style queue instead of
//! spinning. With the `async-tokio` or `async-tokio-mt` feature, both once
//! cells also accept async producers.
//!
//! # Examples
//!
//! ```rust
//! use std::thread;
//! use zeros::{Chan, Map, OnceValue};
//!
//! #[derive(Default)]
//! struct Registry {
//!    config: OnceValue<String>,
//!    events: Chan<u32>,
//!    seen: Map<u32, &'static str>,
//! }
//!
//! let mut registry = Registry::default();
//! assert_eq!(registry.config.get_or_init(|| "prod".to_owned()), "prod");
//!
//! thread::scope(|s| {
//!    s.spawn(|| registry.events.send(7));
//!    assert_eq!(registry.events.recv(), 7);
//! });
//!
//! registry.seen.insert(7, "seven");
//! assert_eq!(registry.seen.len(), 1);
//! ```

/// Auto-allocating rendezvous channel.
mod chan;

/// Auto-allocating hash map.
mod map;

/// Single-value once cell with panic replay.
mod once;

/// Two-value once cell.
mod once_values;

/// Replayable panic payloads.
mod payload;

/// Internal one-shot execution guard.
mod state;

pub use chan::Chan;
pub use map::Map;
pub use once::OnceValue;
pub use once_values::OnceValues;
pub use payload::OpaquePanic;
