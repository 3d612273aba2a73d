use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::time::{sleep, Duration};
use zeros::OnceValues;

static RUNS: AtomicUsize = AtomicUsize::new(0);
static ENDPOINT: OnceValues<String, u16> = OnceValues::new();

async fn endpoint() -> (&'static String, &'static u16) {
   ENDPOINT
      .get_or_init_async(|| async {
         // This async block runs only once
         RUNS.fetch_add(1, Ordering::Relaxed);
         println!("Resolving endpoint...");
         sleep(Duration::from_millis(50)).await;
         ("db.internal".to_string(), 5432)
      })
      .await
}

#[tokio::main]
async fn main() {
   let tasks: Vec<_> = (0..5)
      .map(|_| {
         tokio::spawn(async {
            let (host, port) = endpoint().await;
            println!("Task access: {host}:{port}");
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert_eq!(ENDPOINT.get(), Some((&"db.internal".to_string(), &5432)));
   assert_eq!(RUNS.load(Ordering::Relaxed), 1);
}
