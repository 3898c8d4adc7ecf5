//! 8-bit Timer0 tick source
//!
//! Timer0 in CTC mode, clocked from the CPU clock through the /1024
//! prescaler with a compare value of 249, divides a 16 MHz clock to an
//! exact 16 ms period. That is the only prescaler/top combination an
//! 8-bit counter can reach from the supported clocks without rounding,
//! so this source is fixed to 16 MHz parts.
//!
//! Unlike the watchdog source this one is crystal-accurate, at the cost
//! of occupying the timer most Arduino cores use for their millisecond
//! clock.

/// CPU clock divider feeding the counter.
pub const PRESCALER: u32 = 1024;

/// Compare value; the counter counts 0..=TOP, so the period spans
/// TOP + 1 counts.
pub const COMPARE_TOP: u8 = 249;

#[cfg(feature = "tick-timer0")]
const _: () = {
    let derived = super::compare_period_ms(crate::config::CPU_CLOCK_HZ, PRESCALER, COMPARE_TOP as u32);
    assert!(derived == crate::config::TICK_PERIOD_MS);
};

#[cfg(target_arch = "avr")]
mod imp {
    use crate::arch::avr::pac;

    /// Program Timer0 for CTC interrupts at the fixed 16 ms period.
    ///
    /// The compare interrupt is masked first so no stale configuration
    /// can fire mid-reprogramming, and the counter is zeroed last so the
    /// first period is full-length.
    pub fn setup() {
        let tc0 = unsafe { &*pac::TC0::ptr() };
        tc0.timsk0().write(|w| unsafe { w.bits(0) });
        tc0.tccr0a().write(|w| w.wgm0().ctc());
        tc0.tccr0b().write(|w| w.cs0().prescale_1024());
        tc0.ocr0a().write(|w| unsafe { w.bits(super::COMPARE_TOP) });
        tc0.tcnt0().write(|w| unsafe { w.bits(0) });
        tc0.timsk0().write(|w| w.ocie0a().set_bit());
    }

    /// Mask the compare interrupt and stop the counter clock.
    pub fn shutdown() {
        let tc0 = unsafe { &*pac::TC0::ptr() };
        tc0.timsk0().write(|w| unsafe { w.bits(0) });
        tc0.tccr0b().write(|w| w.cs0().no_clock());
    }

    /// Check and clear the compare-match flag.
    ///
    /// The vector can be entered without a pending match when another
    /// channel of the shared timer raised the line; only a set flag
    /// counts as a tick. Writing the bit back clears it.
    pub fn poll_interrupt_flag() -> bool {
        let tc0 = unsafe { &*pac::TC0::ptr() };
        if tc0.tifr0().read().ocf0a().bit_is_set() {
            tc0.tifr0().write(|w| w.ocf0a().set_bit());
            true
        } else {
            false
        }
    }
}

#[cfg(not(target_arch = "avr"))]
mod imp {
    use portable_atomic::{AtomicBool, Ordering};

    static PENDING_MATCH: AtomicBool = AtomicBool::new(false);

    /// Mark a compare match as pending, as the hardware flag would.
    pub fn raise_compare_match() {
        PENDING_MATCH.store(true, Ordering::SeqCst);
    }

    pub fn setup() {
        super::super::sim::set_configured(true);
    }

    pub fn shutdown() {
        super::super::sim::set_configured(false);
    }

    /// Consume the pending flag, mirroring the clear-on-read-and-ack
    /// behaviour of the hardware bit.
    pub fn poll_interrupt_flag() -> bool {
        PENDING_MATCH.swap(false, Ordering::SeqCst)
    }
}

#[cfg(not(target_arch = "avr"))]
pub use imp::raise_compare_match;
pub use imp::{poll_interrupt_flag, setup, shutdown};
