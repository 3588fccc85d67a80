/*!

Logging setup. The crate emits `tracing` events (`debug!` for synthesis and cache
activity, `trace!` for per-call detail); this module installs a global subscriber the
first time anything logs through [`init_logger`]. Installation is idempotent; if the
embedding application already set a global default, ours loses the race and theirs wins.

*/

use once_cell::sync::Lazy;

/// Used for implicit initialization.
static INIT_LOGGER: Lazy<()> = Lazy::new(|| {
  let subscriber = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::TRACE)
      .with_target(false)
      .without_time()
      .finish();

  // An embedding host may have installed its own subscriber already; that is not an error.
  let _ = tracing::subscriber::set_global_default(subscriber);
});

/// This does not need to be called directly. Initializes the logging system.
pub fn init_logger() {
  Lazy::force(&INIT_LOGGER);
}
