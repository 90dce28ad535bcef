/*!

The handle registry is the process-wide table of indirect pointer slots. Each
live handle owns one heap-allocated `HandleSlot`; the cell's address identifies
the slot, and the cell holds the record reference the handle currently aliases.

The cell is registered rather than the handle value itself because Rust moves
are bitwise and cannot be intercepted: a handle may move freely while its slot
address stays stable. Every write to a slot's record reference goes through the
registry under its lock, so a collection pass snapshotting the root set always
observes a consistent slot table.

The registry is root-set membership tracking, not reference counting:
reclamation is decided by the trace alone.

*/

use std::{
  cell::Cell,
  collections::HashMap,
  ptr::NonNull,
  sync::{Mutex, MutexGuard},
};

use once_cell::sync::Lazy;

use crate::{
  core::error::GcError,
  core::record::RecordPtr,
  log::warning,
};

static GLOBAL_HANDLE_REGISTRY: Lazy<Mutex<HandleRegistry>> = Lazy::new(|| {
  Mutex::new(HandleRegistry::new())
});

/// Acquire the global handle registry. The `caller_msg` is for debugging purposes.
#[inline(always)]
pub(crate) fn acquire_handle_registry(caller_msg: &str) -> MutexGuard<'static, HandleRegistry> {
  GLOBAL_HANDLE_REGISTRY.lock().expect(caller_msg)
}

/// The heap cell a handle owns for the duration of its life. Holds the record
/// the handle currently references, or `None` for an empty handle.
pub(crate) struct HandleSlot {
  record: Cell<Option<RecordPtr>>,
}

pub(crate) type SlotPtr = NonNull<HandleSlot>;

impl HandleSlot {
  /// Allocates a fresh slot cell. The caller must register it and, when the
  /// owning handle dies, unregister and `dispose` of it.
  pub fn create(record: Option<RecordPtr>) -> SlotPtr {
    let slot = Box::new(HandleSlot { record: Cell::new(record) });

    // Box never returns null.
    NonNull::new(Box::into_raw(slot)).unwrap()
  }

  /// Reclaims the cell. The slot must already be unregistered.
  pub unsafe fn dispose(slot: SlotPtr) {
    drop(Box::from_raw(slot.as_ptr()));
  }

  #[inline(always)]
  pub fn address(slot: SlotPtr) -> usize {
    slot.as_ptr() as usize
  }
}

pub(crate) struct HandleRegistry {
  slots: HashMap<usize, SlotPtr>,
}

// Access is hidden behind a mutex.
unsafe impl Send for HandleRegistry {}

impl HandleRegistry {
  pub fn new() -> Self {
    HandleRegistry {
      slots: HashMap::new(),
    }
  }

  /// Adds a slot entry. Registering the same cell address twice (placement
  /// reuse of a freed cell) overwrites rather than duplicates.
  pub fn register_slot(&mut self, slot: SlotPtr, record: Option<RecordPtr>) {
    unsafe { slot.as_ref() }.record.set(record);
    self.slots.insert(HandleSlot::address(slot), slot);
  }

  /// Changes what a slot references, atomically with respect to a pass's root
  /// snapshot. The slot must currently reference `old`.
  pub fn update_slot(&mut self, slot: SlotPtr, old: Option<RecordPtr>, new: Option<RecordPtr>) {
    if !self.slot_references(slot, old) {
      let error = GcError::RegistryConsistency { slot: HandleSlot::address(slot) };
      debug_assert!(false, "update_slot: {}", error);
      warning!(0, "update_slot ignored: {}", error);
      return;
    }

    unsafe { slot.as_ref() }.record.set(new);
  }

  /// Removes the slot entirely. The slot must currently reference `expected`.
  pub fn unregister_slot(&mut self, slot: SlotPtr, expected: Option<RecordPtr>) {
    if !self.slot_references(slot, expected) {
      let error = GcError::RegistryConsistency { slot: HandleSlot::address(slot) };
      debug_assert!(false, "unregister_slot: {}", error);
      warning!(0, "unregister_slot ignored: {}", error);
      return;
    }

    self.slots.remove(&HandleSlot::address(slot));
  }

  /// A fresh snapshot of the root set: every record referenced by a currently
  /// registered, non-null slot. Taken under the registry lock at the start of
  /// each collection pass.
  pub fn roots(&self) -> Vec<RecordPtr> {
    self
      .slots
      .values()
      .filter_map(|slot| unsafe { slot.as_ref() }.record.get())
      .collect()
  }

  /// Number of registered slots, empty handles included.
  #[inline(always)]
  pub fn slot_count(&self) -> usize {
    self.slots.len()
  }

  /// Number of registered slots referencing an object.
  pub fn live_slot_count(&self) -> usize {
    self
      .slots
      .values()
      .filter(|slot| unsafe { slot.as_ref() }.record.get().is_some())
      .count()
  }

  fn slot_references(&self, slot: SlotPtr, record: Option<RecordPtr>) -> bool {
    match self.slots.get(&HandleSlot::address(slot)) {
      Some(registered) => unsafe { registered.as_ref() }.record.get() == record,
      None             => false,
    }
  }

  /// Prints the state of the registry.
  #[cfg(feature = "gc_debug")]
  pub fn dump_slots(&self) {
    eprintln!("╭──────────────────┬──────────────────╮");
    eprintln!("│{:<18}│{:>18}│", "Slot", "Record");
    eprintln!("├──────────────────┼──────────────────┤");
    for (address, slot) in self.slots.iter() {
      match unsafe { slot.as_ref() }.record.get() {
        Some(record) => eprintln!("│{:<#18x}│{:>#18x}│", address, record.as_ptr() as usize),
        None         => eprintln!("│{:<#18x}│{:>18}│", address, "null"),
      }
    }
    eprintln!("╰──────────────────┴──────────────────╯");
  }

}
