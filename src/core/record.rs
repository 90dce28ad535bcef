/*!

The object record is the collector's metadata for one managed allocation. Every
managed object lives in a region shaped `[GcRecord | padding | T]`: the record
sits at the start of the region, so record and object share one allocation and
one lifetime, and the record's address is stable until the object is reclaimed.

The record stores the full allocation `Layout` rather than a bare byte length
because returning the region to the system allocator requires the alignment as
well as the size.

*/

use std::{
  alloc::Layout,
  cell::Cell,
  ptr::NonNull,
};

use enumflags2::{bitflags, BitFlags};

use crate::api::collectible::Collectible;

pub(crate) type RecordPtr = NonNull<GcRecord>;

#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq)]
pub(crate) enum GcRecordFlag {
  /// Reached from a root during the current trace
  Marked,
  /// Allocated but not yet rooted; the sweep must treat the record as live
  UnderConstruction,
}

pub(crate) type GcRecordFlags = BitFlags<GcRecordFlag, u8>;

pub(crate) struct GcRecord {
  /// Start address of the managed region (the record itself sits there).
  pub(crate) start : NonNull<u8>,
  /// Layout of the whole region, record and padding included.
  pub(crate) layout: Layout,
  /// Back-reference to the object's collectible capability. `None` until the
  /// object has been constructed in place.
  handle: Cell<Option<NonNull<dyn Collectible>>>,
  flags : Cell<GcRecordFlags>,
}

impl GcRecord {
  pub fn new(start: NonNull<u8>, layout: Layout) -> GcRecord {
    GcRecord {
      start,
      layout,
      handle: Cell::new(None),
      flags : Cell::new(GcRecordFlag::UnderConstruction.into()),
    }
  }

  #[inline(always)]
  pub fn address(&self) -> usize {
    self.start.as_ptr() as usize
  }

  /// Byte length of the managed region.
  #[inline(always)]
  pub fn length(&self) -> usize {
    self.layout.size()
  }

  #[inline(always)]
  pub fn capability(&self) -> Option<NonNull<dyn Collectible>> {
    self.handle.get()
  }

  #[inline(always)]
  pub fn set_capability(&self, capability: NonNull<dyn Collectible>) {
    self.handle.set(Some(capability));
  }

  // region GC related methods

  #[inline(always)]
  pub fn is_marked(&self) -> bool {
    self.flags.get().contains(GcRecordFlag::Marked)
  }

  #[inline(always)]
  pub fn set_marked(&self) {
    self.flags.set(self.flags.get() | GcRecordFlag::Marked);
  }

  #[inline(always)]
  pub fn clear_marked(&self) {
    let mut flags = self.flags.get();
    flags.remove(GcRecordFlag::Marked);
    self.flags.set(flags);
  }

  #[inline(always)]
  pub fn is_under_construction(&self) -> bool {
    self.flags.get().contains(GcRecordFlag::UnderConstruction)
  }

  /// Clears `UnderConstruction` once the first root slot for the object is
  /// registered. Only activated records are eligible for reclamation.
  #[inline(always)]
  pub fn activate(&self) {
    let mut flags = self.flags.get();
    flags.remove(GcRecordFlag::UnderConstruction);
    self.flags.set(flags);
  }

  /// A record may be reclaimed when the trace did not reach it, it is fully
  /// constructed, and its first root has been handed out.
  #[inline(always)]
  pub fn is_condemned(&self) -> bool {
    !self.is_marked() && !self.is_under_construction() && self.handle.get().is_some()
  }

  // endregion

}
