/*!

Behavioral tests for the collector: handle bookkeeping, reachability,
finalization, casts, the heap ceiling, the trigger policy, and randomized
churn over linked object graphs.

The record table and handle registry are process-wide, so every test
serializes on a module-local mutex and asserts count deltas rather than
absolutes.

*/

use std::{
  cell::Cell,
  rc::Rc,
  sync::{Mutex, MutexGuard},
};

use rand::Rng;

use crate::{
  api::collectible::{Collectible, Marker},
  api::gc_link::GcLink,
  api::gc_ptr::{GcAny, GcPtr},
  core::allocator::make_gc,
  core::collector::{force_collect, live_object_count, start, statistics, stop},
  core::error::GcError,
  core::handle_registry::{acquire_handle_registry, HandleSlot},
  core::record_table::acquire_record_table,
};

fn test_lock() -> MutexGuard<'static, ()> {
  static TEST_LOCK: Mutex<()> = Mutex::new(());

  // The should_panic test below poisons the lock by design; the global state
  // itself stays consistent.
  TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn slot_counts() -> (usize, usize) {
  let registry = acquire_handle_registry("test: slot_counts");
  (registry.slot_count(), registry.live_slot_count())
}

fn finalize_counter() -> Rc<Cell<usize>> {
  Rc::new(Cell::new(0))
}

/// Bumps its counter when the object holding it is finalized.
struct DropToken {
  finalized: Rc<Cell<usize>>,
}

impl DropToken {
  fn new(finalized: &Rc<Cell<usize>>) -> DropToken {
    DropToken { finalized: Rc::clone(finalized) }
  }
}

impl Drop for DropToken {
  fn drop(&mut self) {
    self.finalized.set(self.finalized.get() + 1);
  }
}

struct Leaf {
  value: i32,
}

impl Collectible for Leaf {}

struct Tracked {
  _token: DropToken,
}

impl Collectible for Tracked {}

fn tracked(finalized: &Rc<Cell<usize>>) -> Tracked {
  Tracked { _token: DropToken::new(finalized) }
}

struct Node {
  value : usize,
  next  : GcLink<Node>,
  _token: DropToken,
}

impl Collectible for Node {
  fn trace(&self, marker: &mut Marker) {
    marker.mark(&self.next);
  }
}

fn node(value: usize, finalized: &Rc<Cell<usize>>) -> Node {
  Node {
    value,
    next  : GcLink::new_null(),
    _token: DropToken::new(finalized),
  }
}

struct Branch {
  children: Vec<GcLink<Branch>>,
  _token  : DropToken,
}

impl Collectible for Branch {
  fn trace(&self, marker: &mut Marker) {
    for child in &self.children {
      marker.mark(child);
    }
  }
}

/*
Recursively builds a random tree of managed nodes with a given height and
width. Collection must not trigger while a subtree is under construction:
children are rooted only transitively once their parent is. Callers keep
automatic collection disabled and run passes before or after.
*/
fn build_random_tree(
  finalized : &Rc<Cell<usize>>,
  allocated : &Cell<usize>,
  max_height: usize,
  max_width : usize,
  rng       : &mut impl Rng,
) -> GcPtr<Branch> {
  let mut children      = Vec::new();
  let mut child_handles = Vec::new();

  if max_height > 0 {
    for _ in 0..rng.gen_range(0..=max_width) {
      let child = build_random_tree(finalized, allocated, max_height - 1, max_width, rng);
      children.push(GcLink::new(&child));
      child_handles.push(child);
    }
  }

  allocated.set(allocated.get() + 1);
  make_gc(Branch { children, _token: DropToken::new(finalized) }).unwrap()
  // child_handles drop here; the children stay reachable through the parent
}


#[test]
fn slot_bookkeeping_matches_live_handles() {
  let _guard = test_lock();
  let (slots, live) = slot_counts();

  let empty: GcPtr<Leaf> = GcPtr::new_null();
  assert_eq!(slot_counts(), (slots + 1, live));

  let h1 = make_gc(Leaf { value: 7 }).unwrap();
  assert_eq!(slot_counts(), (slots + 2, live + 1));

  let h2 = h1.clone();
  assert_eq!(slot_counts(), (slots + 3, live + 2));

  // A move is not a registry event: the slot cell travels with the handle.
  let h3 = h2;
  assert_eq!(slot_counts(), (slots + 3, live + 2));

  drop(h1);
  assert_eq!(slot_counts(), (slots + 2, live + 1));

  drop(h3);
  drop(empty);
  assert_eq!(slot_counts(), (slots, live));

  force_collect();
}

#[test]
fn copied_handle_keeps_object_alive() {
  let _guard = test_lock();
  let finalized = finalize_counter();

  let h1 = make_gc(tracked(&finalized)).unwrap();
  let h2 = h1.clone();

  drop(h1);
  force_collect();
  assert_eq!(finalized.get(), 0);

  drop(h2);
  force_collect();
  assert_eq!(finalized.get(), 1);

  // Reclaimed exactly once; a further pass must not touch it again.
  force_collect();
  assert_eq!(finalized.get(), 1);
}

#[test]
fn chain_survives_through_interior_links() {
  let _guard = test_lock();
  let finalized = finalize_counter();

  let head = make_gc(node(0, &finalized)).unwrap();
  let mid  = make_gc(node(1, &finalized)).unwrap();
  let tail = make_gc(node(2, &finalized)).unwrap();
  head.next.set(&mid);
  mid.next.set(&tail);
  drop(mid);
  drop(tail);

  // Only the head is rooted, but the whole chain is reachable through it.
  force_collect();
  assert_eq!(finalized.get(), 0);
  assert_eq!(head.next.get().next.get().value, 2);

  drop(head);
  force_collect();
  assert_eq!(finalized.get(), 3);
}

#[test]
fn isolated_cycle_reclaimed_in_one_pass() {
  let _guard = test_lock();
  let finalized = finalize_counter();

  let a = make_gc(node(0, &finalized)).unwrap();
  let b = make_gc(node(1, &finalized)).unwrap();
  a.next.set(&b);
  b.next.set(&a);

  drop(a);
  drop(b);

  force_collect();
  assert_eq!(finalized.get(), 2);
}

#[test]
fn object_reachable_only_through_owner_dies_with_it() {
  let _guard = test_lock();
  let finalized = finalize_counter();

  let a = make_gc(node(0, &finalized)).unwrap();
  let b = make_gc(node(1, &finalized)).unwrap();
  a.next.set(&b);
  drop(b);

  force_collect();
  assert_eq!(finalized.get(), 0);

  // One pass reclaims the owner and everything reachable only through it.
  drop(a);
  force_collect();
  assert_eq!(finalized.get(), 2);
}

#[test]
fn link_promotion_roots_the_target() {
  let _guard = test_lock();
  let finalized = finalize_counter();

  let a = make_gc(node(0, &finalized)).unwrap();
  let b = make_gc(node(1, &finalized)).unwrap();
  a.next.set(&b);
  drop(b);

  let promoted = a.next.get();
  drop(a);

  // The owner is gone, but the promoted handle roots the target on its own.
  force_collect();
  assert_eq!(finalized.get(), 1);
  assert_eq!(promoted.value, 1);

  drop(promoted);
  force_collect();
  assert_eq!(finalized.get(), 2);
}

#[test]
fn upcast_and_downcast() {
  let _guard = test_lock();

  let leaf = make_gc(Leaf { value: 31 }).unwrap();
  let any: GcAny = leaf.upcast();
  assert!(!any.is_null());

  let back: GcPtr<Leaf> = any.downcast::<Leaf>();
  assert!(back.ptr_eq(&leaf));
  assert_eq!(back.value, 31);

  // Downcast to an unrelated managed type yields an empty handle, never an error.
  let wrong: GcPtr<Tracked> = any.downcast::<Tracked>();
  assert!(wrong.is_null());

  // An empty handle stays empty in both directions.
  let null_any = GcPtr::<Leaf>::new_null().upcast();
  assert!(null_any.is_null());
  assert!(null_any.downcast::<Leaf>().is_null());

  drop((leaf, any, back, wrong, null_any));
  force_collect();
}

#[test]
fn allocation_beyond_ceiling_fails_cleanly() {
  let _guard = test_lock();
  force_collect();

  let (slots, live) = slot_counts();
  let objects = live_object_count();

  // A ceiling no allocation fits under.
  start(usize::MAX, 1);
  let result = make_gc(Leaf { value: 0 });
  assert!(matches!(result, Err(GcError::OutOfMemory { .. })));

  // The failed allocation registered no record and no slot.
  assert_eq!(slot_counts(), (slots, live));
  assert_eq!(live_object_count(), objects);

  start(usize::MAX, usize::MAX);
  stop();
}

#[test]
fn trigger_policy_runs_passes_and_stop_disables() {
  let _guard = test_lock();
  force_collect();

  let finalized = finalize_counter();

  start(5, usize::MAX);
  for _ in 0..5 {
    drop(make_gc(tracked(&finalized)).unwrap());
  }
  // The fifth allocation triggered a pass. The allocation owning the trigger
  // was still rooted by its in-flight handle, so four were reclaimed.
  assert_eq!(finalized.get(), 4);

  stop();
  for _ in 0..10 {
    drop(make_gc(tracked(&finalized)).unwrap());
  }
  assert_eq!(finalized.get(), 4);

  force_collect();
  assert_eq!(finalized.get(), 15);
}

#[test]
fn clone_from_reuses_the_slot() {
  let _guard = test_lock();

  let source = make_gc(Leaf { value: 12 }).unwrap();
  let mut dest: GcPtr<Leaf> = GcPtr::new_null();

  let (slots, live) = slot_counts();
  dest.clone_from(&source);
  assert_eq!(slot_counts(), (slots, live + 1));
  assert!(dest.ptr_eq(&source));
  assert_eq!(dest.value, 12);

  dest.clear();
  assert_eq!(slot_counts(), (slots, live));
  assert!(dest.is_null());

  drop((source, dest));
  force_collect();
}

#[test]
fn record_table_tracks_allocation_lifecycle() {
  let _guard = test_lock();

  let handle  = make_gc(Leaf { value: 3 }).unwrap();
  let record  = handle.record().unwrap();
  let address = unsafe { record.as_ref() }.address();

  assert!(acquire_record_table("test: lookup").lookup(address).is_some());

  drop(handle);
  force_collect();
  assert!(acquire_record_table("test: lookup").lookup(address).is_none());
}

#[test]
fn double_registration_overwrites() {
  let _guard = test_lock();

  let slot = HandleSlot::create(None);
  {
    let mut registry = acquire_handle_registry("test: register");
    let before = registry.slot_count();

    registry.register_slot(slot, None);
    registry.register_slot(slot, None);
    assert_eq!(registry.slot_count(), before + 1);

    registry.unregister_slot(slot, None);
    assert_eq!(registry.slot_count(), before);
  }
  unsafe { HandleSlot::dispose(slot) };
}

#[test]
fn try_deref_surfaces_null_dereference() {
  let _guard = test_lock();

  let handle: GcPtr<Leaf> = GcPtr::default();
  assert!(handle.is_null());
  assert!(handle.get().is_none());
  assert!(matches!(handle.try_deref(), Err(GcError::NullDereference)));
}

#[test]
#[should_panic(expected = "dereference of an empty handle")]
fn dereferencing_an_empty_handle_panics() {
  let _guard = test_lock();

  let handle: GcPtr<Leaf> = GcPtr::new_null();
  let _ = handle.value;
}

#[test]
fn statistics_reflect_activity() {
  let _guard = test_lock();

  let before = statistics();
  let handle = make_gc(Leaf { value: 1 }).unwrap();
  drop(handle);
  force_collect();
  let after = statistics();

  assert!(after.collections > before.collections);
  assert!(after.reclaimed_objects > before.reclaimed_objects);

  start(usize::MAX, usize::MAX);
  assert!(statistics().enabled);
  stop();
  assert!(!statistics().enabled);
}

#[test]
fn random_tree_churn_reclaims_everything_exactly_once() {
  let _guard = test_lock();
  stop();
  force_collect();

  let baseline = live_object_count();
  let mut rng  = rand::thread_rng();

  let mut forests = Vec::new();
  for _ in 0..8 {
    let finalized = finalize_counter();
    let allocated = Cell::new(0);
    let root = build_random_tree(&finalized, &allocated, 4, 3, &mut rng);
    forests.push((root, finalized, allocated.get()));
  }

  // Everything is rooted; a pass reclaims nothing.
  force_collect();
  for (_, finalized, _) in &forests {
    assert_eq!(finalized.get(), 0);
  }

  // Drop half the roots; exactly those trees are reclaimed, in one pass.
  let dropped: Vec<_> = forests
      .drain(0..4)
      .map(|(root, finalized, count)| {
        drop(root);
        (finalized, count)
      })
      .collect();
  force_collect();
  for (finalized, count) in &dropped {
    assert_eq!(finalized.get(), *count);
  }
  for (_, finalized, _) in &forests {
    assert_eq!(finalized.get(), 0);
  }

  forests.clear();
  force_collect();
  assert_eq!(live_object_count(), baseline);
}

#[test]
fn relinking_churn() {
  let _guard = test_lock();
  stop();
  force_collect();

  let finalized = finalize_counter();
  let mut rng   = rand::thread_rng();
  let mut allocated = 0;

  let mut roots: Vec<GcPtr<Node>> = Vec::new();
  for i in 0..16 {
    roots.push(make_gc(node(i, &finalized)).unwrap());
    allocated += 1;
  }

  for _ in 0..200 {
    match rng.gen_range(0..5) {
      0 => {
        let i = rng.gen_range(0..roots.len());
        let j = rng.gen_range(0..roots.len());
        roots[i].next.set(&roots[j]);
      }
      1 => {
        let i = rng.gen_range(0..roots.len());
        roots[i].next.set_null();
      }
      2 => {
        let i = rng.gen_range(0..roots.len());
        let aliased = roots[i].clone();
        roots.push(aliased);
      }
      3 => {
        if roots.len() > 4 {
          let i = rng.gen_range(0..roots.len());
          roots.swap_remove(i);
        }
      }
      4 => {
        roots.push(make_gc(node(roots.len(), &finalized)).unwrap());
        allocated += 1;
      }
      _ => unreachable!(),
    }

    if rng.gen_range(0..20) == 0 {
      force_collect();
    }
  }

  // Every surviving root still dereferences.
  for root in &roots {
    let _ = root.value;
  }

  roots.clear();
  force_collect();
  assert_eq!(finalized.get(), allocated);
}
