/*!

The allocation entry point. `make_gc` reserves one region per managed object,
shaped `[GcRecord | padding | T]`, and hands back the object's first rooting
handle. The ordering is load-bearing:

 1. The ceiling reservation and the raw reservation both happen — and both can
    fail — before any record or slot exists, so a failed allocation leaves no
    trace in either table.
 2. The record is registered *before* the object is constructed in place, so a
    pass triggered from another thread mid-construction sees the region as
    allocated but not yet live and leaves it alone.
 3. The first handle is registered before the record is activated, so no
    object is ever observable by user code without a live root already in the
    registry.

*/

use std::{
  alloc::{self, Layout},
  mem::size_of,
  ptr::{self, NonNull},
};

use crate::{
  api::collectible::Collectible,
  api::gc_ptr::{GcEdge, GcPtr},
  core::collector,
  core::error::GcError,
  core::record::GcRecord,
  core::record_table::acquire_record_table,
};

/// Allocates a managed object and returns the unique initial root handle to
/// it. Fails with `OutOfMemory` when the configured ceiling would be
/// exceeded, or `AllocationError` when the underlying reservation fails;
/// neither failure registers a record or a slot.
pub fn make_gc<T: Collectible>(value: T) -> Result<GcPtr<T>, GcError> {
  let (layout, object_offset) = region_layout::<T>()?;

  collector::reserve_heap_bytes(layout.size())?;

  let base = match NonNull::new(unsafe { alloc::alloc(layout) }) {
    Some(base) => base,
    None => {
      collector::unreserve_heap_bytes(layout.size());
      return Err(GcError::AllocationError { requested: layout.size() });
    }
  };

  // The record precedes the object within the region. Register it before
  // construction; its `UnderConstruction` flag pins it until the first root
  // exists.
  let record = base.cast::<GcRecord>();
  unsafe { ptr::write(record.as_ptr(), GcRecord::new(base, layout)) };
  acquire_record_table("make_gc: allocate").allocate(record);

  let object = unsafe { NonNull::new_unchecked(base.as_ptr().add(object_offset) as *mut T) };
  unsafe { ptr::write(object.as_ptr(), value) };

  // Attach the capability under the table lock so the write is ordered with
  // any in-progress sweep.
  let capability: NonNull<dyn Collectible> = object;
  acquire_record_table("make_gc: attach").attach(record, capability);

  let handle = GcPtr::from_edge(Some(GcEdge { object, record }));
  acquire_record_table("make_gc: activate").activate(record);

  collector::note_allocation();

  Ok(handle)
}

/// The combined layout of a record followed by a `T`, and the object's offset
/// within it.
fn region_layout<T>() -> Result<(Layout, usize), GcError> {
  Layout::new::<GcRecord>()
      .extend(Layout::new::<T>())
      .map(|(layout, offset)| (layout.pad_to_align(), offset))
      .map_err(|_| GcError::AllocationError { requested: size_of::<T>() })
}
