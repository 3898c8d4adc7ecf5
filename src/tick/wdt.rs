//! Watchdog oscillator tick source
//!
//! The watchdog timer runs from its own on-chip 128 kHz oscillator, so
//! the tick keeps running in the deepest sleep modes and costs no
//! general-purpose timer. The oscillator is loosely calibrated (circa
//! 120 kHz in practice, varying with voltage and temperature), so tick
//! periods from this source are nominal rather than exact; no correction
//! is applied.
//!
//! The watchdog is used in pure interrupt mode (WDE clear): with reset
//! mode disabled, the hardware does not clear WDIE when the interrupt
//! fires, so the source is periodic without any re-arm work in the
//! handler.

/// Nominal frequency of the dedicated watchdog oscillator.
pub const WDT_OSC_HZ: u32 = 128_000;

/// Oscillator cycles consumed at the shortest prescale setting.
const BASE_CYCLES: u32 = 2_048;

/// Nominal tick period for a prescale step, in milliseconds.
///
/// Step 0 divides the oscillator by [`BASE_CYCLES`] (16 ms); each
/// further step doubles the period, up to step 7 (2048 ms).
pub const fn period_ms(step: u8) -> u32 {
    (BASE_CYCLES / (WDT_OSC_HZ / 1000)) << step
}

/// Nominal tick rate for a prescale step, in ticks per second.
/// Steps 6 and 7 divide below 1 Hz and yield 0.
pub const fn rate_hz(step: u8) -> u32 {
    (WDT_OSC_HZ / BASE_CYCLES) >> step
}

#[cfg(feature = "tick-wdt")]
const _: () = {
    assert!(period_ms(crate::config::WDT_PRESCALE_STEP) == crate::config::TICK_PERIOD_MS);
    assert!(rate_hz(crate::config::WDT_PRESCALE_STEP) == crate::config::TICK_RATE_HZ);
};

/// The watchdog has no compare-match flag to consult; every vector entry
/// is a genuine tick.
pub fn poll_interrupt_flag() -> bool {
    true
}

#[cfg(all(target_arch = "avr", feature = "tick-wdt"))]
mod imp {
    use crate::config::WDT_PRESCALE_STEP;

    // The watchdog control register sits at the same data-space address
    // on every supported device. It is written raw because the timed
    // sequence below allows only four cycles between the two stores.
    const WDTCSR: *mut u8 = 0x60 as *mut u8;

    // WDTCSR bit positions.
    const WDIE: u8 = 1 << 6;
    const WDCE: u8 = 1 << 4;
    const WDE: u8 = 1 << 3;
    const WDP3: u8 = 1 << 5;

    /// Prescale field for the configured step. WDP3 lives apart from
    /// WDP2..0 in the register.
    const fn prescale_bits(step: u8) -> u8 {
        (step & 0x07) | if step & 0x08 != 0 { WDP3 } else { 0 }
    }

    /// Program the watchdog for periodic interrupts at the configured
    /// prescale step.
    ///
    /// Changing WDTCSR requires the hardware's timed sequence: set WDCE
    /// together with WDE, then write the final value within four cycles.
    /// A `wdr` first brings the countdown to a known phase.
    pub fn setup() {
        unsafe {
            core::arch::asm!("wdr");
            core::ptr::write_volatile(WDTCSR, WDCE | WDE);
            core::ptr::write_volatile(WDTCSR, WDIE | prescale_bits(WDT_PRESCALE_STEP));
        }
    }

    /// Disable the watchdog entirely, via the same timed sequence.
    pub fn shutdown() {
        unsafe {
            core::arch::asm!("wdr");
            core::ptr::write_volatile(WDTCSR, WDCE | WDE);
            core::ptr::write_volatile(WDTCSR, 0);
        }
    }
}

#[cfg(not(target_arch = "avr"))]
mod imp {
    pub fn setup() {
        super::super::sim::set_configured(true);
    }

    pub fn shutdown() {
        super::super::sim::set_configured(false);
    }
}

#[cfg(any(not(target_arch = "avr"), feature = "tick-wdt"))]
pub use imp::{setup, shutdown};
