use std::thread;

use zeros::{Chan, Map};

#[derive(Default)]
struct Pipeline {
   words: Chan<String>,
   counts: Map<String, usize>,
}

fn main() {
   let mut pipeline = Pipeline::default();

   thread::scope(|s| {
      let words = &pipeline.words;
      s.spawn(move || {
         for word in "the quick fox jumps over the lazy dog the end".split(' ') {
            words.send(word.to_owned());
         }
         words.close();
      });

      let mut counts = Map::<String, usize>::new();
      while let Some(word) = pipeline.words.recv_checked() {
         *counts.as_hash_map_mut().entry(word).or_default() += 1;
      }
      pipeline.counts = counts;
   });

   assert_eq!(pipeline.counts.get("the"), Some(&3));
   assert_eq!(pipeline.counts.get_or_default("cat"), 0);
   for (word, count) in &pipeline.counts {
      println!("{word}: {count}");
   }
}
