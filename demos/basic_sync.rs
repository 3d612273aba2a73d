use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};

use zeros::OnceValue;

static RUNS: AtomicUsize = AtomicUsize::new(0);
static DATA: OnceValue<String> = OnceValue::new();
static BROKEN: OnceValue<u32> = OnceValue::new();

fn get_data() -> &'static str {
   DATA.get_or_init(|| {
      // This closure runs only once
      RUNS.fetch_add(1, Ordering::Relaxed);
      println!("Initializing data...");
      std::thread::sleep(std::time::Duration::from_millis(50));
      "Expensive data".to_string()
   })
}

fn main() {
   let threads: Vec<_> = (0..5)
      .map(|_| {
         std::thread::spawn(|| {
            println!("Thread access: {}", get_data());
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   assert_eq!(DATA.get(), Some(&"Expensive data".to_string()));
   assert_eq!(RUNS.load(Ordering::Relaxed), 1);

   // A panicking producer is never retried; every call sees the same panic.
   for attempt in 0..3 {
      let caught = panic::catch_unwind(|| *BROKEN.get_or_init(|| panic!("no config file")));
      let payload = caught.unwrap_err();
      println!(
         "Attempt {attempt}: {:?}",
         payload.downcast_ref::<&str>().copied().unwrap_or("<other>")
      );
   }
   assert!(BROKEN.is_poisoned());
}
