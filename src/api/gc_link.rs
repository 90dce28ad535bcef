/*!

The interior edge type. A managed object that references another managed
object embeds a `GcLink<T>` and reports it from `Collectible::trace`; the
trace, not the link itself, is what keeps the target alive.

A link is deliberately *not* a root: it holds no registered slot, and an
object graph connected only by links is reclaimed as a unit the moment no
rooting handle reaches it — which is exactly what makes isolated cycles
collectable. To hold a target alive independently of the object that embeds
the link, promote it to a rooting handle with `get`.

A link must live inside a managed object and be reported from that object's
`trace`. A link held outside the managed heap is invisible to the collector
and does not keep its target alive.

Links are interiorly mutable (`Cell`) so object graphs can be relinked
through the shared references handles hand out.

*/

use std::cell::Cell;

use crate::{
  api::collectible::Collectible,
  api::gc_ptr::{GcEdge, GcPtr},
  core::record::RecordPtr,
};

pub struct GcLink<T: Collectible> {
  edge: Cell<Option<GcEdge<T>>>,
}

impl<T: Collectible> GcLink<T> {
  pub fn new_null() -> GcLink<T> {
    GcLink { edge: Cell::new(None) }
  }

  /// A link aliasing the object the given handle references.
  pub fn new(target: &GcPtr<T>) -> GcLink<T> {
    GcLink { edge: Cell::new(target.edge()) }
  }

  #[inline(always)]
  pub fn is_null(&self) -> bool {
    self.edge.get().is_none()
  }

  /// Points the link at the object the given handle references.
  pub fn set(&self, target: &GcPtr<T>) {
    self.edge.set(target.edge());
  }

  pub fn set_null(&self) {
    self.edge.set(None);
  }

  /// Promotes the link to a rooting handle. Empty when the link is null.
  pub fn get(&self) -> GcPtr<T> {
    GcPtr::from_edge(self.edge.get())
  }

  #[inline(always)]
  pub(crate) fn record(&self) -> Option<RecordPtr> {
    self.edge.get().map(|edge| edge.record)
  }
}

impl<T: Collectible> Default for GcLink<T> {
  fn default() -> Self {
    GcLink::new_null()
  }
}

impl<T: Collectible> Clone for GcLink<T> {
  fn clone(&self) -> Self {
    GcLink { edge: Cell::new(self.edge.get()) }
  }
}
