/*!

The smart pointer handles through which user code references managed objects.

`GcPtr<T>` is the typed rooting handle: as long as one exists for an object,
the object is a member of the root set and survives collection. Every handle
owns a registered slot cell for the duration of its life — registered on
construction, updated on reassignment, unregistered on destruction — so the
handle registry's slot set is exactly the set of live handles. A moved handle
carries its slot cell with it; the moved-from value ceases to exist without
running `Drop`, so moves need no registry traffic at all.

`GcAny` is the type-erased sibling: a handle to the collectible capability
itself. Converting `GcPtr<T>` up to `GcAny` always succeeds and references the
same object; converting back down is checked against the runtime type and
yields an empty handle on mismatch, never an error.

Handles are deliberately `!Send`: they own raw slot cells and belong to the
mutator that created them.

*/

use std::{
  fmt::{Debug, Formatter},
  ops::Deref,
  ptr::NonNull,
};

use crate::{
  api::collectible::Collectible,
  core::error::GcError,
  core::handle_registry::{acquire_handle_registry, HandleSlot, SlotPtr},
  core::record::RecordPtr,
};

/// A resolved reference: the object pointer a handle dereferences through,
/// paired with the record the collector tracks it by.
pub(crate) struct GcEdge<T: ?Sized> {
  pub(crate) object: NonNull<T>,
  pub(crate) record: RecordPtr,
}

// Derived impls would demand `T: Copy`; the edge itself is always plain
// pointers.
impl<T: ?Sized> Copy for GcEdge<T> {}

impl<T: ?Sized> Clone for GcEdge<T> {
  fn clone(&self) -> Self {
    *self
  }
}

fn register_new_slot(record: Option<RecordPtr>) -> SlotPtr {
  let slot = HandleSlot::create(record);
  acquire_handle_registry("GcPtr: register slot").register_slot(slot, record);
  slot
}

fn release_slot(slot: SlotPtr, record: Option<RecordPtr>) {
  acquire_handle_registry("GcPtr: unregister slot").unregister_slot(slot, record);
  unsafe { HandleSlot::dispose(slot) };
}

pub struct GcPtr<T: Collectible> {
  target: Option<GcEdge<T>>,
  slot  : SlotPtr,
}

impl<T: Collectible> GcPtr<T> {
  /// An empty handle. Registers a null slot, exactly as a default-constructed
  /// handle must.
  pub fn new_null() -> GcPtr<T> {
    GcPtr::from_edge(None)
  }

  pub(crate) fn from_edge(target: Option<GcEdge<T>>) -> GcPtr<T> {
    let slot = register_new_slot(target.map(|edge| edge.record));
    GcPtr { target, slot }
  }

  #[inline(always)]
  pub fn is_null(&self) -> bool {
    self.target.is_none()
  }

  /// The referenced object, or `None` for an empty handle.
  #[inline(always)]
  pub fn get(&self) -> Option<&T> {
    self.target.as_ref().map(|edge| unsafe { edge.object.as_ref() })
  }

  /// Fallible member access through the handle.
  pub fn try_deref(&self) -> Result<&T, GcError> {
    self.get().ok_or(GcError::NullDereference)
  }

  /// Explicitly nulls the handle. The slot stays registered, now empty.
  pub fn clear(&mut self) {
    let old = self.record();
    self.target = None;
    acquire_handle_registry("GcPtr::clear").update_slot(self.slot, old, None);
  }

  /// Converts up to a handle on the base capability. Unchecked; always
  /// succeeds and references the same object. An empty handle stays empty.
  pub fn upcast(&self) -> GcAny {
    match self.target {
      Some(edge) => {
        let object: NonNull<dyn Collectible> = edge.object;
        GcAny::from_edge(Some(GcEdge { object, record: edge.record }))
      }
      None => GcAny::from_edge(None),
    }
  }

  /// Whether two handles alias the same managed object.
  pub fn ptr_eq(&self, other: &GcPtr<T>) -> bool {
    match (&self.target, &other.target) {
      (Some(a), Some(b)) => a.record == b.record,
      (None, None)       => true,
      _                  => false,
    }
  }

  #[inline(always)]
  pub(crate) fn record(&self) -> Option<RecordPtr> {
    self.target.map(|edge| edge.record)
  }

  #[inline(always)]
  pub(crate) fn edge(&self) -> Option<GcEdge<T>> {
    self.target
  }
}

impl<T: Collectible> Default for GcPtr<T> {
  fn default() -> Self {
    GcPtr::new_null()
  }
}

impl<T: Collectible> Clone for GcPtr<T> {
  /// Aliases the same object through a freshly registered slot.
  fn clone(&self) -> Self {
    GcPtr::from_edge(self.target)
  }

  /// Reassignment: reuses the existing slot, updating what it references.
  fn clone_from(&mut self, source: &Self) {
    let old = self.record();
    let new = source.record();
    self.target = source.target;
    acquire_handle_registry("GcPtr::clone_from").update_slot(self.slot, old, new);
  }
}

impl<T: Collectible> Drop for GcPtr<T> {
  fn drop(&mut self) {
    release_slot(self.slot, self.record());
  }
}

impl<T: Collectible> Deref for GcPtr<T> {
  type Target = T;

  /// Member access. Dereferencing an empty handle is a programming error, not
  /// a recoverable condition; use `get` or `try_deref` when emptiness is
  /// expected.
  fn deref(&self) -> &T {
    match self.get() {
      Some(object) => object,
      None         => panic!("{}", GcError::NullDereference),
    }
  }
}

impl<T: Collectible> Debug for GcPtr<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.target {
      Some(edge) => write!(f, "GcPtr({:p})", edge.object.as_ptr()),
      None       => write!(f, "GcPtr(null)"),
    }
  }
}

/// A type-erased handle referencing a managed object through its collectible
/// capability. Same slot lifecycle and rooting behavior as `GcPtr`.
pub struct GcAny {
  target: Option<GcEdge<dyn Collectible>>,
  slot  : SlotPtr,
}

impl GcAny {
  pub fn new_null() -> GcAny {
    GcAny::from_edge(None)
  }

  pub(crate) fn from_edge(target: Option<GcEdge<dyn Collectible>>) -> GcAny {
    let slot = register_new_slot(target.map(|edge| edge.record));
    GcAny { target, slot }
  }

  #[inline(always)]
  pub fn is_null(&self) -> bool {
    self.target.is_none()
  }

  #[inline(always)]
  pub fn get(&self) -> Option<&dyn Collectible> {
    self.target.as_ref().map(|edge| unsafe { edge.object.as_ref() })
  }

  /// Checked conversion down to a typed handle. A runtime type mismatch
  /// yields an empty handle.
  pub fn downcast<T: Collectible>(&self) -> GcPtr<T> {
    let Some(edge) = self.target else {
      return GcPtr::from_edge(None);
    };

    match unsafe { edge.object.as_ref() }.downcast_ref::<T>() {
      Some(typed) => GcPtr::from_edge(Some(GcEdge {
        object: NonNull::from(typed),
        record: edge.record,
      })),
      None => GcPtr::from_edge(None),
    }
  }

  #[inline(always)]
  pub(crate) fn record(&self) -> Option<RecordPtr> {
    self.target.map(|edge| edge.record)
  }
}

impl Default for GcAny {
  fn default() -> Self {
    GcAny::new_null()
  }
}

impl Clone for GcAny {
  fn clone(&self) -> Self {
    GcAny::from_edge(self.target)
  }

  fn clone_from(&mut self, source: &Self) {
    let old = self.record();
    let new = source.record();
    self.target = source.target;
    acquire_handle_registry("GcAny::clone_from").update_slot(self.slot, old, new);
  }
}

impl Drop for GcAny {
  fn drop(&mut self) {
    release_slot(self.slot, self.record());
  }
}

impl Debug for GcAny {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.target {
      Some(edge) => write!(f, "GcAny({:p})", edge.object.as_ptr() as *const u8),
      None       => write!(f, "GcAny(null)"),
    }
  }
}
