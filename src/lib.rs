/*!

An embeddable tracing garbage collector with smart pointer handles.

Types opt into collection by implementing the [`Collectible`] capability and
are allocated with [`make_gc`], which returns a [`GcPtr`] — a movable,
cloneable handle that roots the object for as long as any copy of it exists.
Objects reference each other through [`GcLink`] interior edges reported from
[`Collectible::trace`]; reachability is decided purely by tracing from the
live handles, so isolated cycles are reclaimed as a unit.

Collection runs synchronously at allocation sites once [`start`] has enabled
the trigger policy, or on demand via [`force_collect`]. Handle operations
themselves (clone, move, drop, dereference) never trace.

```rust
use gcptr::{make_gc, force_collect, Collectible, GcLink, GcPtr, Marker};

struct Node {
  value: i32,
  next : GcLink<Node>,
}

impl Collectible for Node {
  fn trace(&self, marker: &mut Marker) {
    marker.mark(&self.next);
  }
}

# fn main() -> Result<(), gcptr::GcError> {
let head: GcPtr<Node> = make_gc(Node { value: 1, next: GcLink::new_null() })?;
let tail = make_gc(Node { value: 2, next: GcLink::new_null() })?;
head.next.set(&tail);
drop(tail);

// The tail node has no handle of its own left, but it is reachable through
// `head`, so it survives.
force_collect();
assert_eq!(head.next.get().value, 2);
# Ok(())
# }
```

*/

pub mod log;

pub mod api;
mod core;

pub use api::{
  collectible::{Collectible, Marker},
  gc_link::GcLink,
  gc_ptr::{GcAny, GcPtr},
};
pub use crate::core::{
  allocator::make_gc,
  collector::{force_collect, live_object_count, start, statistics, stop, GcStatistics},
  error::GcError,
};
