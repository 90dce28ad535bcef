/*!

The object record table is the process-wide registry of managed allocations,
keyed by start address. Everything else in the collector consults it: the
allocator registers regions here before constructing objects in them, and the
sweep phase partitions it into survivors and condemned records.

*/

use std::{
  collections::BTreeMap,
  ptr::NonNull,
  sync::{Mutex, MutexGuard},
};

use once_cell::sync::Lazy;

use crate::{
  api::collectible::Collectible,
  core::record::{GcRecord, RecordPtr},
};

static GLOBAL_RECORD_TABLE: Lazy<Mutex<RecordTable>> = Lazy::new(|| {
  Mutex::new(RecordTable::new())
});

/// Acquire the global record table. The `caller_msg` is for debugging purposes.
#[inline(always)]
pub(crate) fn acquire_record_table(caller_msg: &str) -> MutexGuard<'static, RecordTable> {
  GLOBAL_RECORD_TABLE.lock().expect(caller_msg)
}

pub(crate) struct RecordTable {
  records: BTreeMap<usize, RecordPtr>,
}

// Access is hidden behind a mutex.
unsafe impl Send for RecordTable {}

impl RecordTable {
  pub fn new() -> Self {
    RecordTable {
      records: BTreeMap::new(),
    }
  }

  /// Registers the record of a freshly reserved, not-yet-constructed region.
  /// Registering an address twice overwrites the stale entry.
  pub fn allocate(&mut self, record: RecordPtr) {
    let address = unsafe { record.as_ref() }.address();
    self.records.insert(address, record);
  }

  /// Retrieval by the region's start address.
  #[allow(dead_code)]
  pub fn lookup(&self, address: usize) -> Option<RecordPtr> {
    self.records.get(&address).copied()
  }

  /// Stores the capability back-reference once the object has been constructed
  /// in place. The record stays `UnderConstruction` until `activate`.
  pub fn attach(&mut self, record: RecordPtr, capability: NonNull<dyn Collectible>) {
    unsafe { record.as_ref() }.set_capability(capability);
  }

  /// Marks the record eligible for reclamation once its first root slot exists.
  pub fn activate(&mut self, record: RecordPtr) {
    unsafe { record.as_ref() }.activate();
  }

  /// Removes a record the engine has proven unreachable. Invalid while any
  /// handle slot still references the record; the sweep partition guarantees
  /// this by construction.
  pub fn release(&mut self, record: RecordPtr) {
    let address = unsafe { record.as_ref() }.address();
    self.records.remove(&address);
  }

  /// Sweep partition: releases and returns every condemned record, clearing
  /// the mark on each survivor so the next trace starts clean.
  pub fn take_condemned(&mut self) -> Vec<RecordPtr> {
    let condemned: Vec<RecordPtr> = self
        .records
        .values()
        .copied()
        .filter(|record| unsafe { record.as_ref() }.is_condemned())
        .collect();

    for record in &condemned {
      self.release(*record);
    }

    for record in self.records.values() {
      let record_ref: &GcRecord = unsafe { record.as_ref() };
      record_ref.clear_marked();
    }

    condemned
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Prints the state of the table.
  #[cfg(feature = "gc_debug")]
  pub fn dump_records(&self) {
    eprintln!("╭──────────────────┬──────────┬────────┬───────────╮");
    eprintln!("│{:<18}│{:>10}│{:>8}│{:>11}│", "Record", "Length", "Marked", "Activated");
    eprintln!("├──────────────────┼──────────┼────────┼───────────┤");
    for (address, record) in self.records.iter() {
      let record_ref = unsafe { record.as_ref() };
      eprintln!(
        "│{:<#18x}│{:>10}│{:>8}│{:>11}│",
        address,
        record_ref.length(),
        record_ref.is_marked(),
        !record_ref.is_under_construction(),
      );
    }
    eprintln!("╰──────────────────┴──────────┴────────┴───────────╯");
  }

}
