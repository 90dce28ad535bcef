/*!

# Collector Engine

The engine owns the collection algorithm: when to run, what is reachable, and
what to reclaim. A pass moves Idle → Triggered → Tracing → Reclaiming → Idle
and is a bounded synchronous operation on the thread that triggered it; only
allocation and `force_collect` are trigger points.

Configuration and counters are process-wide atomics so that allocation never
needs the collector mutex; the mutex serializes the pass pipeline itself. A
pass proceeds in three steps:

 1. **Snapshot** the root set under the handle registry lock. Slot mutations
    after the snapshot are observed by the *next* pass — a record that loses
    its last root mid-pass survives until then, and a handle cloned mid-pass
    aliases an already-snapshotted record.
 2. **Trace** from the snapshot with a worklist, marking every record
    reachable through the objects' interior links, polymorphically via the
    collectible capability.
 3. **Reclaim**: condemned records are removed from the table first, then
    finalized (drop glue through the capability) and their regions returned
    to the system allocator. Finalizers run with no collector locks held, so
    they may allocate; a `force_collect` from a finalizer is a no-op, and
    finalizers must not dereference other managed objects.

*/

use std::{
  alloc,
  ptr::drop_in_place,
  sync::{
    atomic::{
      Ordering::Relaxed,
      AtomicBool,
      AtomicU64,
      AtomicUsize,
    },
    Mutex,
    MutexGuard,
  },
};

use once_cell::sync::Lazy;

use crate::{
  api::collectible::Marker,
  core::error::GcError,
  core::handle_registry::acquire_handle_registry,
  core::record_table::acquire_record_table,
  log::debug,
};

// Constant Collector Parameters
/// Allocations between automatic passes when `start` is given a step size of zero.
const MINIMUM_STEP_SIZE: usize = 1;
/// Ceiling used until `start` configures one.
const UNLIMITED_HEAP: usize = usize::MAX;

/// Whether allocations apply the trigger policy. `start` sets it, `stop` clears it.
static GC_ENABLED: AtomicBool = AtomicBool::new(false);
/// Every `STEP_SIZE`-th allocation triggers a pass while enabled.
static STEP_SIZE: AtomicUsize = AtomicUsize::new(MINIMUM_STEP_SIZE);
/// Heap ceiling in bytes; allocations that would exceed it fail immediately.
static MAX_HEAP_SIZE: AtomicUsize = AtomicUsize::new(UNLIMITED_HEAP);

static HEAP_BYTES_IN_USE: AtomicUsize = AtomicUsize::new(0);
static LIVE_OBJECT_COUNT: AtomicUsize = AtomicUsize::new(0);
static ALLOCATIONS_SINCE_COLLECT: AtomicUsize = AtomicUsize::new(0);

static COLLECTION_COUNT     : AtomicU64 = AtomicU64::new(0);
static RECLAIMED_OBJECT_COUNT: AtomicU64 = AtomicU64::new(0);
static RECLAIMED_BYTE_COUNT  : AtomicU64 = AtomicU64::new(0);

/// A pass runs to completion and is never nested; this flag is how reentrant
/// trigger points (a finalizer that allocates or forces a collection) become
/// no-ops instead of deadlocks.
static IN_COLLECTION: AtomicBool = AtomicBool::new(false);

static GLOBAL_COLLECTOR: Lazy<Mutex<Collector>> = Lazy::new(|| {
  Mutex::new(Collector::new())
});

/// Acquire the global collector. The `caller_msg` is for debugging purposes.
#[inline(always)]
fn acquire_collector(caller_msg: &str) -> MutexGuard<'static, Collector> {
  GLOBAL_COLLECTOR.lock().expect(caller_msg)
}

/// Enables incremental collection: every `step_size`-th allocation triggers a
/// pass, and the heap is capped at `max_size` bytes. Re-calling while already
/// started resets the policy (step size, ceiling, and the allocation budget).
pub fn start(step_size: usize, max_size: usize) {
  STEP_SIZE.store(step_size.max(MINIMUM_STEP_SIZE), Relaxed);
  MAX_HEAP_SIZE.store(max_size, Relaxed);
  ALLOCATIONS_SINCE_COLLECT.store(0, Relaxed);
  GC_ENABLED.store(true, Relaxed);

  debug!(1, "collector started: step_size={} max_size={}", step_size, max_size);
}

/// Disables automatic triggering. Outstanding live objects remain valid, and
/// the ceiling from the last `start` stays in force until the next `start`.
pub fn stop() {
  GC_ENABLED.store(false, Relaxed);

  debug!(1, "collector stopped");
}

/// Runs a full synchronous pass with the current live roots, whether or not
/// `start` was ever called. A no-op when a pass is already running.
pub fn force_collect() {
  if IN_COLLECTION.load(Relaxed) {
    return;
  }

  acquire_collector("force_collect").collect();
}

/// Number of live managed objects.
pub fn live_object_count() -> usize {
  LIVE_OBJECT_COUNT.load(Relaxed)
}

/// A snapshot of the collector's counters.
#[derive(Copy, Clone, Debug)]
pub struct GcStatistics {
  pub collections      : u64,
  pub live_objects     : usize,
  pub heap_bytes_in_use: usize,
  pub heap_ceiling     : usize,
  pub reclaimed_objects: u64,
  pub reclaimed_bytes  : u64,
  pub enabled          : bool,
}

pub fn statistics() -> GcStatistics {
  GcStatistics {
    collections      : COLLECTION_COUNT.load(Relaxed),
    live_objects     : LIVE_OBJECT_COUNT.load(Relaxed),
    heap_bytes_in_use: HEAP_BYTES_IN_USE.load(Relaxed),
    heap_ceiling     : MAX_HEAP_SIZE.load(Relaxed),
    reclaimed_objects: RECLAIMED_OBJECT_COUNT.load(Relaxed),
    reclaimed_bytes  : RECLAIMED_BYTE_COUNT.load(Relaxed),
    enabled          : GC_ENABLED.load(Relaxed),
  }
}

/// Reserves `bytes` against the ceiling in one atomic update, so concurrent
/// allocations cannot jointly overshoot it. Fails before any record or slot
/// is registered.
pub(crate) fn reserve_heap_bytes(bytes: usize) -> Result<(), GcError> {
  let ceiling = MAX_HEAP_SIZE.load(Relaxed);

  HEAP_BYTES_IN_USE
      .fetch_update(Relaxed, Relaxed, |in_use| {
        in_use.checked_add(bytes).filter(|total| *total <= ceiling)
      })
      .map(|_| ())
      .map_err(|in_use| GcError::OutOfMemory { requested: bytes, in_use, ceiling })
}

/// Rolls back a reservation whose underlying allocation failed.
pub(crate) fn unreserve_heap_bytes(bytes: usize) {
  HEAP_BYTES_IN_USE.fetch_sub(bytes, Relaxed);
}

/// Applies the trigger policy after a completed allocation. Called with no
/// locks held.
pub(crate) fn note_allocation() {
  LIVE_OBJECT_COUNT.fetch_add(1, Relaxed);

  if !GC_ENABLED.load(Relaxed) || IN_COLLECTION.load(Relaxed) {
    return;
  }

  let debt = ALLOCATIONS_SINCE_COLLECT.fetch_add(1, Relaxed) + 1;
  if debt >= STEP_SIZE.load(Relaxed) {
    let mut collector = acquire_collector("note_allocation");

    // Another thread may have raced us here and already run the pass.
    if ALLOCATIONS_SINCE_COLLECT.load(Relaxed) >= STEP_SIZE.load(Relaxed) {
      collector.collect();
    }
  }
}

pub(crate) struct Collector {
  /// Records surviving the most recent pass.
  last_survivors: usize,
  /// Records reclaimed by the most recent pass.
  last_reclaimed: usize,
}

impl Collector {
  pub fn new() -> Self {
    Collector {
      last_survivors: 0,
      last_reclaimed: 0,
    }
  }

  /// One full collection pass: snapshot, trace, reclaim.
  pub fn collect(&mut self) {
    if IN_COLLECTION.swap(true, Relaxed) {
      return;
    }
    // Clears the flag even if a finalizer panics out of the pass.
    let _guard = PassFlagGuard;

    let pass = COLLECTION_COUNT.fetch_add(1, Relaxed) + 1;
    ALLOCATIONS_SINCE_COLLECT.store(0, Relaxed);

    #[cfg(feature = "gc_debug")]
    {
      eprintln!("collect(): pass {}", pass);
      self.dump_collector_state();
      acquire_record_table("collect: dump").dump_records();
      acquire_handle_registry("collect: dump").dump_slots();
    }

    // Tracing
    let roots = acquire_handle_registry("collect: root snapshot").roots();

    let mut marker = Marker::new();
    for record in roots {
      marker.mark_record(record);
    }
    marker.drain();

    // Reclaiming. Condemned records leave the table before any finalizer
    // runs, so finalizers can allocate without observing a half-swept table.
    let (condemned, survivors) = {
      let mut table = acquire_record_table("collect: sweep");
      let condemned = table.take_condemned();
      (condemned, table.len())
    };

    let mut reclaimed_bytes = 0;
    for record in &condemned {
      let record_ref = unsafe { record.as_ref() };

      // A condemned record always carries its capability; losing it means the
      // heap is corrupted, and halting the pass beats freeing blind.
      let Some(capability) = record_ref.capability() else {
        panic!("collect: condemned record {:#x} has no capability", record_ref.address());
      };

      let start  = record_ref.start;
      let layout = record_ref.layout;
      reclaimed_bytes += record_ref.length();

      unsafe {
        // Virtual cleanup through the capability, then the region itself.
        drop_in_place(capability.as_ptr());
        alloc::dealloc(start.as_ptr(), layout);
      }
    }

    let reclaimed = condemned.len();
    LIVE_OBJECT_COUNT.fetch_sub(reclaimed, Relaxed);
    HEAP_BYTES_IN_USE.fetch_sub(reclaimed_bytes, Relaxed);
    RECLAIMED_OBJECT_COUNT.fetch_add(reclaimed as u64, Relaxed);
    RECLAIMED_BYTE_COUNT.fetch_add(reclaimed_bytes as u64, Relaxed);

    self.last_survivors = survivors;
    self.last_reclaimed = reclaimed;

    debug!(
      1,
      "collection {}: {} survivors, {} reclaimed ({} bytes)",
      pass,
      survivors,
      reclaimed,
      reclaimed_bytes
    );
  }

  /// Prints the state of the collector.
  #[cfg(feature = "gc_debug")]
  pub fn dump_collector_state(&self) {
    eprintln!("╭─────────────────────────────────────────────╮");
    eprintln!("│{:<32} {:>12}│", "Variable", "Value");
    eprintln!("├─────────────────────────────────────────────┤");
    eprintln!("│{:<32} {:>12}│", "enabled", GC_ENABLED.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "step_size", STEP_SIZE.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "max_heap_size", MAX_HEAP_SIZE.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "heap_bytes_in_use", HEAP_BYTES_IN_USE.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "live_object_count", LIVE_OBJECT_COUNT.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "allocations_since_collect", ALLOCATIONS_SINCE_COLLECT.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "collection_count", COLLECTION_COUNT.load(Relaxed));
    eprintln!("│{:<32} {:>12}│", "last_survivors", self.last_survivors);
    eprintln!("│{:<32} {:>12}│", "last_reclaimed", self.last_reclaimed);
    eprintln!("╰─────────────────────────────────────────────╯");
  }
}

struct PassFlagGuard;

impl Drop for PassFlagGuard {
  fn drop(&mut self) {
    IN_COLLECTION.store(false, Relaxed);
  }
}
