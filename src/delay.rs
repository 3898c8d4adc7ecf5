//! Millisecond delays on top of a coarse tick
//!
//! The tick period is long (16 ms and up), so a requested delay rarely
//! lands on a tick boundary. The whole-tick part is slept through the
//! kernel's blocking delay; the sub-tick remainder is burned in a
//! calibrated busy loop. A delay shorter than one tick period never
//! reaches the kernel at all.

use crate::config::TICK_PERIOD_MS;
use crate::kernel;
use crate::types::{Tick, MAX_DELAY};

/// Split a millisecond delay into whole ticks and a millisecond
/// remainder. `ticks * TICK_PERIOD_MS + rest == ms` always holds; the
/// tick count stays in `u32` so the identity is exact even when the
/// `Tick` counter type is narrower.
pub const fn split_delay(ms: u32) -> (u32, u32) {
    (ms / TICK_PERIOD_MS, ms % TICK_PERIOD_MS)
}

/// Delay the calling task for at least `ms` milliseconds.
///
/// The tick part yields to other tasks; the remainder occupies the CPU.
/// Accuracy is bounded by the tick source (the watchdog oscillator in
/// particular runs a few percent slow).
pub fn delay_ms(ms: u32) {
    let (mut ticks, rest) = split_delay(ms);
    // A tick count wider than the counter type goes down in chunks.
    // MAX_DELAY is the kernel's block-forever sentinel and is never
    // handed over as a literal delay.
    while ticks > 0 {
        let step = if ticks < MAX_DELAY as u32 {
            ticks as Tick
        } else {
            MAX_DELAY - 1
        };
        unsafe { kernel::delay_ticks(step) };
        ticks -= step as u32;
    }
    if rest > 0 {
        busy_wait_ms(rest);
    }
}

#[cfg(target_arch = "avr")]
mod imp {
    use crate::config::CPU_CLOCK_HZ;

    // sbiw (2 cycles) + brne taken (2 cycles) per iteration.
    const CYCLES_PER_ITER: u32 = 4;
    const ITERS_PER_MS: u16 = (CPU_CLOCK_HZ / 1000 / CYCLES_PER_ITER) as u16;

    /// Spin for `ms` milliseconds without yielding.
    pub fn busy_wait_ms(ms: u32) {
        for _ in 0..ms {
            unsafe {
                core::arch::asm!(
                    "1:",
                    "sbiw {ctr}, 1",
                    "brne 1b",
                    ctr = inout(reg_iw) ITERS_PER_MS => _,
                    options(nomem, nostack),
                );
            }
        }
    }
}

#[cfg(not(target_arch = "avr"))]
mod imp {
    use portable_atomic::{AtomicU32, Ordering};

    static BUSY_WAITED_MS: AtomicU32 = AtomicU32::new(0);

    /// Host stand-in: account the request instead of spinning.
    pub fn busy_wait_ms(ms: u32) {
        BUSY_WAITED_MS.fetch_add(ms, Ordering::SeqCst);
    }

    /// Total milliseconds handed to [`busy_wait_ms`] so far.
    pub fn busy_wait_total_ms() -> u32 {
        BUSY_WAITED_MS.load(Ordering::SeqCst)
    }
}

#[cfg(not(target_arch = "avr"))]
pub use imp::busy_wait_total_ms;
pub use imp::busy_wait_ms;
