/*!

Demonstrates the collector on small linked structures: a chain kept alive by a
single rooting handle, and an isolated cycle that one pass reclaims whole.

*/

use gcptr::{
  force_collect,
  make_gc,
  start,
  statistics,
  Collectible,
  GcLink,
  GcPtr,
  Marker,
};

struct Node {
  name: String,
  next: GcLink<Node>,
}

impl Collectible for Node {
  fn trace(&self, marker: &mut Marker) {
    marker.mark(&self.next);
  }
}

fn new_node(name: &str) -> GcPtr<Node> {
  make_gc(Node {
    name: name.to_string(),
    next: GcLink::new_null(),
  })
  .expect("allocation failed")
}

fn main() {
  start(64, 64 * 1024 * 1024);

  // A chain rooted by one handle. The interior nodes keep no handles of
  // their own; they survive because the head reaches them.
  let head = new_node("a");
  let mid  = new_node("b");
  let tail = new_node("c");
  head.next.set(&mid);
  mid.next.set(&tail);
  drop(mid);
  drop(tail);

  // An isolated cycle: unreachable the moment its handles are gone.
  let x = new_node("x");
  let y = new_node("y");
  x.next.set(&y);
  y.next.set(&x);
  drop(x);
  drop(y);

  force_collect();

  let mut names  = Vec::new();
  let mut cursor = Some(head.clone());
  while let Some(current) = cursor {
    names.push(current.name.clone());
    let next = current.next.get();
    cursor = if next.is_null() { None } else { Some(next) };
  }
  println!("chain: {}", names.join(" -> "));

  let stats = statistics();
  println!(
    "collections: {}  live objects: {}  reclaimed: {} objects / {} bytes",
    stats.collections,
    stats.live_objects,
    stats.reclaimed_objects,
    stats.reclaimed_bytes,
  );
}
