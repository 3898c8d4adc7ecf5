//! Scheduler start and stop
//!
//! The kernel core owns task selection; this layer only brings the tick
//! source up, launches the first context and tears the tick back down.

use portable_atomic::{AtomicBool, Ordering};

use crate::error::{PortError, PortResult};
use crate::{arch, kernel, tick};

static STARTED: AtomicBool = AtomicBool::new(false);

/// Program the tick source and launch the first task.
///
/// The kernel core must have selected a task and published its saved
/// stack pointer before calling this. Interrupts stay masked until the
/// first task's SREG image is restored, so the tick source is armed but
/// silent during the handover. Does not return on success.
pub fn start_scheduler() -> PortResult<()> {
    if STARTED.swap(true, Ordering::SeqCst) {
        return Err(PortError::AlreadyStarted);
    }
    if !kernel::has_current_task() {
        STARTED.store(false, Ordering::SeqCst);
        return Err(PortError::NoTaskSelected);
    }
    tick::setup_tick_interrupt();
    crate::debug!("scheduler starting, tick rate {} Hz", crate::config::TICK_RATE_HZ);
    arch::start_first_task()
}

/// Silence the tick source. The caller is left running with whatever
/// interrupt state it had; tasks already created are untouched.
pub fn end_scheduler() -> PortResult<()> {
    if !STARTED.swap(false, Ordering::SeqCst) {
        return Err(PortError::NotStarted);
    }
    tick::shutdown_tick_interrupt();
    Ok(())
}

/// Whether [`start_scheduler`] has run and not been undone.
pub fn is_scheduler_started() -> bool {
    STARTED.load(Ordering::SeqCst)
}
