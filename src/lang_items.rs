//! Language items for AVR targets
//!
//! Host builds get a panic runtime from the test harness; AVR builds
//! link `panic-halt`, which parks the CPU in a tight loop.

#[cfg(target_arch = "avr")]
use panic_halt as _;
