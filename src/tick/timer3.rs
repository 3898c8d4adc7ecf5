//! 16-bit Timer3 tick source
//!
//! With its 16-bit range the counter reaches an exact 16 ms period from
//! every supported CPU clock through a single /8 prescaler, which the
//! 8-bit timer can only manage at 16 MHz. Timer3 only exists on the
//! larger parts, so this source requires an ATmega2560 build.

/// CPU clock divider feeding the counter.
pub const PRESCALER: u32 = 8;

/// Compare value giving a 16 ms period at the configured CPU clock.
pub const COMPARE_TOP: u16 = compare_top(crate::config::CPU_CLOCK_HZ);

/// Compare value for an exact 16 ms period at a given CPU clock.
pub const fn compare_top(clock_hz: u32) -> u16 {
    match clock_hz {
        32_000_000 => 63_999,
        16_000_000 => 31_999,
        8_000_000 => 15_999,
        _ => panic!("no exact 16-bit tick period for this CPU clock"),
    }
}

#[cfg(feature = "tick-timer3")]
const _: () = {
    let derived = super::compare_period_ms(crate::config::CPU_CLOCK_HZ, PRESCALER, COMPARE_TOP as u32);
    assert!(derived == crate::config::TICK_PERIOD_MS);
};

#[cfg(all(target_arch = "avr", feature = "atmega2560"))]
mod imp {
    use crate::arch::avr::pac;

    /// Program Timer3 for CTC interrupts (mode 4, top in OCR3A).
    ///
    /// All control registers are cleared first; the boot environment may
    /// have left the timer in a PWM mode. The counter is zeroed after
    /// the compare value is in place so the first period is full-length.
    pub fn setup() {
        let tc3 = unsafe { &*pac::TC3::ptr() };
        tc3.timsk3().write(|w| unsafe { w.bits(0) });
        tc3.tccr3a().write(|w| unsafe { w.bits(0) });
        tc3.tccr3b().write(|w| unsafe { w.bits(0) });
        tc3.ocr3a().write(|w| unsafe { w.bits(super::COMPARE_TOP) });
        tc3.tccr3b().write(|w| unsafe { w.wgm3().bits(0b01) }.cs3().prescale_8());
        tc3.tcnt3().write(|w| unsafe { w.bits(0) });
        tc3.timsk3().write(|w| w.ocie3a().set_bit());
    }

    /// Mask the compare interrupt and stop the counter clock.
    pub fn shutdown() {
        let tc3 = unsafe { &*pac::TC3::ptr() };
        tc3.timsk3().write(|w| unsafe { w.bits(0) });
        tc3.tccr3b().write(|w| w.cs3().no_clock());
    }

    /// Check and clear the channel A compare-match flag. Only a set
    /// flag counts as a tick; writing the bit back clears it.
    pub fn poll_interrupt_flag() -> bool {
        let tc3 = unsafe { &*pac::TC3::ptr() };
        if tc3.tifr3().read().ocf3a().bit_is_set() {
            tc3.tifr3().write(|w| w.ocf3a().set_bit());
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

    /// Consume the pending flag, mirroring the clear-on-ack behaviour
    /// of the hardware bit.
    pub fn poll_interrupt_flag() -> bool {
        PENDING_MATCH.swap(false, Ordering::SeqCst)
    }
}

#[cfg(not(target_arch = "avr"))]
pub use imp::raise_compare_match;
#[cfg(any(not(target_arch = "avr"), feature = "atmega2560"))]
pub use imp::{poll_interrupt_flag, setup, shutdown};
