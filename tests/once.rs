use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use zeros::{OnceValue, OpaquePanic};

/// Runs `f`, expecting it to panic, and returns the payload.
fn panic_payload<R>(f: impl FnOnce() -> R) -> Box<dyn Any + Send> {
   match panic::catch_unwind(AssertUnwindSafe(f)) {
      Ok(_) => panic!("expected a panic"),
      Err(payload) => payload,
   }
}

#[test]
fn test_new_is_pending() {
   let once: OnceValue<i32> = OnceValue::new();
   assert!(!once.is_done());
   assert!(!once.is_poisoned());
   assert_eq!(once.get(), None);
}

#[test]
fn test_default_is_usable() {
   let once: OnceValue<Vec<u8>> = Default::default();
   assert_eq!(once.get_or_init(|| vec![1, 2]), &vec![1, 2]);
   assert!(once.is_done());
}

#[test]
fn test_with_value_is_done() {
   let once = OnceValue::with_value(42);
   assert!(once.is_done());
   assert_eq!(once.get(), Some(&42));
   // The producer never runs for a pre-filled cell
   assert_eq!(once.get_or_init(|| unreachable!()), &42);
}

#[test]
fn test_get_or_init_runs_once() {
   let once: OnceValue<i32> = OnceValue::new();
   let counter = AtomicUsize::new(0);
   let value = once.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      42
   });
   assert_eq!(value, &42);
   assert_eq!(counter.load(Ordering::SeqCst), 1);

   // Second call should not execute the closure
   let value = once.get_or_init(|| {
      counter.fetch_add(1, Ordering::SeqCst);
      panic!("Should not be called")
   });
   assert_eq!(value, &42);
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_static_cell() {
   static CELL: OnceValue<String> = OnceValue::new();
   assert_eq!(CELL.get_or_init(|| "static".to_owned()), "static");
   assert_eq!(CELL.get().map(String::as_str), Some("static"));
}

#[test]
fn test_panic_is_replayed() {
   let once: OnceValue<i32> = OnceValue::new();
   let calls = AtomicUsize::new(0);

   for _ in 0..10 {
      let payload = panic_payload(|| {
         once.get_or_init(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            panic!("x")
         })
      });
      assert_eq!(payload.downcast_ref::<&str>(), Some(&"x"));
   }

   assert_eq!(calls.load(Ordering::SeqCst), 1);
   assert!(once.is_poisoned());
   assert!(!once.is_done());
   assert_eq!(once.get(), None);
}

#[test]
fn test_formatted_panic_is_replayed() {
   let once: OnceValue<()> = OnceValue::new();
   let code = 17;

   let first = panic_payload(|| once.get_or_init(|| panic!("failed with code {code}")));
   // Later producers are ignored; the cached panic wins
   let second = panic_payload(|| once.get_or_init(|| ()));

   for payload in [first, second] {
      assert_eq!(
         payload.downcast_ref::<String>().map(String::as_str),
         Some("failed with code 17")
      );
   }
}

#[test]
fn test_opaque_panic_payload() {
   let once: OnceValue<u8> = OnceValue::new();

   // The initiating call gets the original payload back
   let first = panic_payload(|| once.get_or_init(|| panic::panic_any(404u16)));
   assert_eq!(first.downcast_ref::<u16>(), Some(&404));

   // Later calls get a marker, since arbitrary payloads can't be duplicated
   let second = panic_payload(|| once.get_or_init(|| 0));
   assert_eq!(second.downcast_ref::<OpaquePanic>(), Some(&OpaquePanic));
}

#[test]
fn test_get_mut_or_init() {
   let mut once: OnceValue<String> = OnceValue::new();
   once.get_mut_or_init(|| String::from("init")).push_str("ial");
   assert_eq!(once.get().map(String::as_str), Some("initial"));

   // Existing value is reused
   once.get_mut_or_init(|| unreachable!()).push('!');
   assert_eq!(once.into_inner(), Some(String::from("initial!")));
}

#[test]
fn test_get_mut_or_init_replays_panic() {
   let mut once: OnceValue<String> = OnceValue::new();
   let first = panic_payload(|| once.get_mut_or_init(|| panic!("bad")).len());
   assert_eq!(first.downcast_ref::<&str>(), Some(&"bad"));
   let second = panic_payload(|| once.get_mut_or_init(String::new).len());
   assert_eq!(second.downcast_ref::<&str>(), Some(&"bad"));
   assert_eq!(once.get_mut(), None);
   assert_eq!(once.into_inner(), None);
}

#[test]
fn test_multi_thread_get_or_init() {
   let once = Arc::new(OnceValue::new());
   let init_counter = Arc::new(AtomicUsize::new(0));
   let threads: Vec<_> = (0..10)
      .map(|_| {
         let once_clone = Arc::clone(&once);
         let counter_clone = Arc::clone(&init_counter);
         thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            *once_clone.get_or_init(|| {
               // Hold the guard long enough for the others to park
               thread::sleep(Duration::from_millis(20));
               counter_clone.fetch_add(1, Ordering::SeqCst) + 1
            })
         })
      })
      .collect();

   // Every caller observed the value produced by the single run
   for handle in threads {
      assert_eq!(handle.join().unwrap(), 1);
   }
   assert_eq!(once.get(), Some(&1));
   assert_eq!(init_counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multi_thread_panic_replay() {
   let once: Arc<OnceValue<i32>> = Arc::new(OnceValue::new());
   let calls = Arc::new(AtomicUsize::new(0));
   let barrier = Arc::new(Barrier::new(8));

   let threads: Vec<_> = (0..8)
      .map(|_| {
         let once = Arc::clone(&once);
         let calls = Arc::clone(&calls);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            once.get_or_init(|| {
               calls.fetch_add(1, Ordering::SeqCst);
               thread::sleep(Duration::from_millis(20));
               panic!("shared failure")
            });
         })
      })
      .collect();

   for handle in threads {
      let payload = handle.join().unwrap_err();
      assert_eq!(payload.downcast_ref::<&str>(), Some(&"shared failure"));
   }
   assert_eq!(calls.load(Ordering::SeqCst), 1);
   assert!(once.is_poisoned());
}

#[test]
fn test_producer_sees_pending_cell() {
   // Peeking from inside the producer doesn't block; only a nested
   // get_or_init would.
   let once: OnceValue<i32> = OnceValue::new();
   once.get_or_init(|| {
      assert_eq!(once.get(), None);
      assert!(!once.is_done());
      5
   });
   assert_eq!(once.get(), Some(&5));
}

#[test]
fn test_from_value() {
   let once: OnceValue<&str> = OnceValue::from("ready");
   assert!(once.is_done());
   assert_eq!(once.get(), Some(&"ready"));
}

#[test]
fn test_debug() {
   let pending: OnceValue<i32> = OnceValue::new();
   assert_eq!(format!("{pending:?}"), "OnceValue(<pending>)");

   let done = OnceValue::with_value(3);
   assert_eq!(format!("{done:?}"), "OnceValue(3)");

   let failed: OnceValue<i32> = OnceValue::new();
   let _ = panic_payload(|| failed.get_or_init(|| panic!("nope")));
   assert_eq!(format!("{failed:?}"), "OnceValue(<panicked: nope>)");
}

#[test]
fn test_drops_value() {
   let marker = Arc::new(());
   {
      let once = OnceValue::new();
      once.get_or_init(|| Arc::clone(&marker));
      assert_eq!(Arc::strong_count(&marker), 2);
   }
   assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
fn test_into_inner_moves_value_out() {
   let marker = Arc::new(());
   let once = OnceValue::new();
   once.get_or_init(|| Arc::clone(&marker));

   let taken = once.into_inner().expect("value was produced");
   assert_eq!(Arc::strong_count(&marker), 2);
   drop(taken);
   assert_eq!(Arc::strong_count(&marker), 1);
}

#[test]
fn test_state_queries_track_outcome() {
   let ok: OnceValue<u8> = OnceValue::new();
   ok.get_or_init(|| 1);
   assert!(ok.is_done() && !ok.is_poisoned());

   let failed: OnceValue<u8> = OnceValue::new();
   let _ = panic_payload(|| failed.get_or_init(|| panic!("boom")));
   assert!(failed.is_poisoned() && !failed.is_done());
   // A later producer doesn't flip the outcome
   let _ = panic_payload(|| failed.get_or_init(|| 2));
   assert!(failed.is_poisoned() && !failed.is_done());
}

#[tokio::test]
async fn test_get_or_init_async() {
   let once: OnceValue<i32> = OnceValue::new();
   let counter = Arc::new(AtomicUsize::new(0));

   let value = once
      .get_or_init_async(|| {
         let counter_clone = Arc::clone(&counter);
         async move {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            42
         }
      })
      .await;

   assert_eq!(value, &42);
   assert_eq!(counter.load(Ordering::SeqCst), 1);

   // Second call should not execute the future
   let value = once
      .get_or_init_async(|| async {
         counter.fetch_add(1, Ordering::SeqCst);
         panic!("Should not be called");
      })
      .await;

   assert_eq!(value, &42);
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_or_init_async_replays_panic() {
   use futures::FutureExt;

   let once: Arc<OnceValue<i32>> = Arc::new(OnceValue::new());
   let calls = Arc::new(AtomicUsize::new(0));

   for _ in 0..3 {
      let once = Arc::clone(&once);
      let calls = Arc::clone(&calls);
      let outcome = AssertUnwindSafe(async move {
         *once
            .get_or_init_async(|| async move {
               calls.fetch_add(1, Ordering::SeqCst);
               tokio::task::yield_now().await;
               panic!("async failure")
            })
            .await
      })
      .catch_unwind()
      .await;
      let payload = outcome.unwrap_err();
      assert_eq!(payload.downcast_ref::<&str>(), Some(&"async failure"));
   }

   assert_eq!(calls.load(Ordering::SeqCst), 1);
   // Sync callers observe the same failure
   let payload = panic_payload(|| once.get_or_init(|| 0));
   assert_eq!(payload.downcast_ref::<&str>(), Some(&"async failure"));
}

#[tokio::test]
async fn test_cancelled_async_producer_resets() {
   let once: OnceValue<i32> = OnceValue::new();

   // Drop the initializing future while its producer is suspended
   let slow = once.get_or_init_async(|| async {
      tokio::time::sleep(Duration::from_secs(3600)).await;
      1
   });
   let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;
   assert!(timed_out.is_err());
   assert!(!once.is_done());
   assert!(!once.is_poisoned());

   // The next caller runs its own producer
   assert_eq!(once.get_or_init_async(|| async { 2 }).await, &2);
}
