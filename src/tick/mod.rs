//! Tick source configuration and interrupt dispatch
//!
//! Exactly one timer/watchdog variant, chosen at build time, raises the
//! periodic interrupt that drives scheduling. Each variant module derives
//! the resulting period from its own prescaler and compare value and
//! const-asserts it against the declared nominal period in
//! [`crate::config`], so the two can never drift apart silently.
//!
//! Programming contract, honoured by every variant: clear any
//! pre-existing timer configuration before programming, reset the
//! free-running counter afterwards (a stale near-full count would stretch
//! the first period), and never touch the global interrupt-enable bit.
//! That bit is set exactly once, when the first task's SREG is restored,
//! so no tick can fire before the kernel core is ready for it.

use crate::kernel;

pub mod timer0;
pub mod timer3;
pub mod wdt;

#[cfg(feature = "tick-wdt")]
use wdt as source;
#[cfg(feature = "tick-timer0")]
use timer0 as source;
#[cfg(feature = "tick-timer3")]
use timer3 as source;

/// Exact period of a compare-timer configuration, in milliseconds:
/// prescaler * (1 + top) / f_cpu.
pub const fn compare_period_ms(clock_hz: u32, prescaler: u32, top: u32) -> u32 {
    prescaler * (1 + top) * 1000 / clock_hz
}

/// Program the active tick source. Interrupts remain globally masked.
pub fn setup_tick_interrupt() {
    source::setup();
    crate::trace!("tick source programmed, period {} ms", crate::config::TICK_PERIOD_MS);
}

/// Silence the active tick source.
pub fn shutdown_tick_interrupt() {
    source::shutdown();
}

/// Preemptive tick body, called by the naked tick vector between the
/// context save and the following restore.
///
/// The compare-timer sources share their interrupt line with unrelated
/// channels on some devices, so the hardware match flag is checked and
/// cleared before acting; a tick is only accounted when the flag was
/// genuinely pending. The kernel's tick advance reports whether a
/// reschedule is warranted, and selection runs only then; most ticks
/// unblock nothing and restore straight back into the interrupted task.
#[no_mangle]
pub extern "C" fn port_tick_entry() {
    if !source::poll_interrupt_flag() {
        return;
    }
    crate::arch::sleep_reset();
    // Interrupts are disabled here: the save path ran cli microseconds ago.
    unsafe {
        if kernel::increment_tick() {
            kernel::switch_context();
        }
    }
}

/// Cooperative tick body: advance the counter, nothing else. Context
/// switches happen solely at voluntary yield points.
#[cfg(any(feature = "cooperative", not(target_arch = "avr")))]
pub fn tick_cooperative() {
    if !source::poll_interrupt_flag() {
        return;
    }
    crate::arch::sleep_reset();
    let _ = unsafe { kernel::increment_tick() };
}

// ============ Host bookkeeping ============

#[cfg(not(target_arch = "avr"))]
pub(crate) mod sim {
    use portable_atomic::{AtomicBool, Ordering};

    static CONFIGURED: AtomicBool = AtomicBool::new(false);

    pub(crate) fn set_configured(on: bool) {
        CONFIGURED.store(on, Ordering::SeqCst);
    }

    /// Whether the (simulated) tick source is currently programmed.
    pub fn is_configured() -> bool {
        CONFIGURED.load(Ordering::SeqCst)
    }
}

#[cfg(not(target_arch = "avr"))]
pub use sim::is_configured;
