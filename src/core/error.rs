/*!

Error conditions surfaced by the collector. Allocation failures are recoverable and
returned to the caller of `make_gc`; the remaining variants describe contract
violations that are asserted in debug builds and tolerated defensively in release
builds.

*/

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub enum GcError {
  /// The allocation would push the heap past the ceiling configured with `start`.
  OutOfMemory {
    requested: usize,
    in_use   : usize,
    ceiling  : usize,
  },
  /// The underlying memory reservation failed (distinct from ceiling exhaustion).
  AllocationError {
    requested: usize,
  },
  /// Member access through an empty handle.
  NullDereference,
  /// A handle slot was updated or unregistered with a record it does not hold,
  /// or a slot unknown to the registry was unregistered. Indicates a bug in
  /// handle bookkeeping.
  RegistryConsistency {
    slot: usize,
  },
}

impl Display for GcError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      GcError::OutOfMemory { requested, in_use, ceiling } => {
        write!(
          f,
          "allocation of {} bytes would exceed the heap ceiling ({} of {} bytes in use)",
          requested, in_use, ceiling
        )
      } // end `GcError::OutOfMemory` branch

      GcError::AllocationError { requested } => {
        write!(f, "the allocator could not reserve {} bytes", requested)
      }

      GcError::NullDereference => {
        write!(f, "dereference of an empty handle")
      }

      GcError::RegistryConsistency { slot } => {
        write!(f, "handle slot {:#x} is inconsistent with the handle registry", slot)
      }

    } // end match on `GcError`

  }
}

impl Debug for GcError {
  fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for GcError {}
