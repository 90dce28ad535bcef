/*!

The collectible capability. A type opts into collection by implementing
`Collectible`; the collector only ever works with managed objects through
`dyn Collectible`, never the concrete type. The trait carries the two hook
points the engine needs:

 1. `trace`, through which a pass extends reachability into the interior
    links an object embeds. The default implementation declares the object a
    leaf.
 2. Finalization, which is Rust's own drop glue invoked through the trait
    object, so a reclaimed object runs its concrete destructor no matter
    which handle type last referenced it.

`Collectible` requires `Any`, which is what makes the checked downcast of
type-erased handles possible.

*/

use std::any::Any;

use crate::{
  api::gc_link::GcLink,
  core::record::RecordPtr,
};

pub trait Collectible: Any {
  /// Visits the interior links this object embeds. Reachability extends
  /// transitively through every link visited here; a link that is not visited
  /// is invisible to the collector, and its target may be reclaimed under the
  /// object it belongs to.
  ///
  /// Leaf objects keep the default.
  fn trace(&self, marker: &mut Marker) {
    let _ = marker;
  }
}

impl dyn Collectible {
  /// Checked downcast to a concrete managed type.
  pub fn downcast_ref<T: Collectible>(&self) -> Option<&T> {
    (self as &dyn Any).downcast_ref::<T>()
  }
}

/// The marking context handed to `Collectible::trace` during a collection
/// pass. Marking is driven by an explicit worklist rather than recursion so
/// that deep object chains cannot overflow the stack.
pub struct Marker {
  worklist: Vec<std::ptr::NonNull<dyn Collectible>>,
}

impl Marker {
  pub(crate) fn new() -> Marker {
    Marker { worklist: Vec::new() }
  }

  /// Extends reachability through an interior link. Null links are ignored.
  pub fn mark<T: Collectible>(&mut self, link: &GcLink<T>) {
    if let Some(record) = link.record() {
      self.mark_record(record);
    }
  }

  /// Marks a record and queues its object for tracing, unless this pass has
  /// already reached it. The mark test is what terminates cycles.
  pub(crate) fn mark_record(&mut self, record: RecordPtr) {
    let record_ref = unsafe { record.as_ref() };

    if record_ref.is_marked() {
      return;
    }
    record_ref.set_marked();

    // A record mid-construction has no capability yet; it is pinned by its
    // `UnderConstruction` flag and has nothing to trace.
    if let Some(capability) = record_ref.capability() {
      self.worklist.push(capability);
    }
  }

  /// Runs the worklist dry, tracing every queued object polymorphically.
  pub(crate) fn drain(&mut self) {
    while let Some(capability) = self.worklist.pop() {
      unsafe { capability.as_ref() }.trace(self);
    }
  }
}
