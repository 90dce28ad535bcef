/*!

# Overview

Logging with a global verbosity threshold layered over the `tracing` crate. The
log level describes what _kind_ of message is being logged, and the numeric
threshold is a verbosity level: a message is emitted only when its threshold is
at most the global threshold, so a message logged at threshold 0 is always
emitted.

```
use gcptr::log::{info, debug, set_global_logging_threshold};

set_global_logging_threshold(1);

info!(1, "collection finished");          // Emitted
debug!(2, "slot table has {} entries", 3); // Not emitted
```

Available macros, from most to least severe: `critical!`, `error!`,
`warning!`, `info!`, `debug!`, `trace!`.

syntax:

```ignore
// With threshold
level!(threshold, "format string", args...);

// Without threshold (indicates threshold of 0, always emitted)
level!("format string", args...);
```

The logging macros handle subscriber initialization automatically; no explicit
initialization is required. The global threshold is managed with atomic
operations and can be adjusted at runtime.

*/

mod macros;

use std::sync::{
  atomic::{AtomicU8, Ordering},
  LazyLock,
};

pub use macros::*;

static GLOBAL_LOGGING_THRESHOLD: AtomicU8 = AtomicU8::new(0);

/// Used for implicit initialization.
static INIT_LOGGER: LazyLock<()> = LazyLock::new(|| {
  let subscriber = tracing_subscriber::fmt()
      .with_target(false)
      .without_time()
      .with_max_level(tracing::Level::TRACE)
      .with_writer(std::io::stdout)
      .finish();

  // The embedding application may have installed its own subscriber already,
  // in which case its choice wins.
  let _ = tracing::subscriber::set_global_default(subscriber);
});

/// This does not need to be called directly. Initializes the logging system.
pub fn init_logger() {
  LazyLock::force(&INIT_LOGGER);
}

/// Sets the verbosity: messages logged at a threshold greater than this value
/// are not emitted.
pub fn set_global_logging_threshold(threshold: u8) {
  GLOBAL_LOGGING_THRESHOLD.store(threshold, Ordering::Relaxed);
}

pub fn get_global_logging_threshold() -> u8 {
  GLOBAL_LOGGING_THRESHOLD.load(Ordering::Relaxed)
}
