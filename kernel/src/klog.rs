//! Installs the `log` crate facade over the serial backend.
//!
//! Grounded on the teacher's dependency on the `log` crate (declared but
//! unused as a sink in `doublegate-VeridianOS`, which calls `println!`
//! directly everywhere); Nimbus wires it up so every subsystem can use
//! `log::info!`/`warn!`/`error!` uniformly.

use crate::arch::x86::serial::SerialLogger;

/// Compile-time log level. There is no writable config store to make this
/// runtime-adjustable (no heap, no filesystem writes).
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

static LOGGER: SerialLogger = SerialLogger;

/// Install the global logger. Idempotent against a second call within the
/// same boot (the second `set_logger` fails and is ignored); only the
/// first `init()` call, from `arch::init`, matters.
pub fn init() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(LOG_LEVEL);
}
