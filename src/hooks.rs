//! Fatal-condition reporting
//!
//! A port this small has no console to complain on, so fatal conditions
//! are signalled by blinking the board LED in a pattern distinctive
//! enough to identify the failure class by eye. The kernel core can
//! override any of these through its [`crate::kernel::Kernel`] hook
//! methods; these are the defaults.

/// The failure classes the port can signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalSignal {
    /// Kernel allocation failed. Fast blink, 50 ms.
    AllocationFailure,
    /// A task ran off the end of its stack. Slow blink, 2 s.
    StackOverflow,
    /// A checked invariant did not hold. Short-long-short-short.
    AssertionFailure,
}

/// Latch the failure and signal it forever. Interrupts are disabled
/// first; nothing sensible can be scheduled after this point.
pub fn fatal(signal: FatalSignal) -> ! {
    crate::critical::disable_interrupts();
    crate::error!("fatal: {}", signal);
    imp::signal_forever(signal)
}

#[cfg(target_arch = "avr")]
mod imp {
    use super::FatalSignal;
    use crate::arch::avr::pac;
    use crate::delay::busy_wait_ms;

    #[cfg(feature = "atmega328p")]
    const LED_BIT: u8 = 1 << 5; // PB5, the Uno board LED
    #[cfg(feature = "atmega2560")]
    const LED_BIT: u8 = 1 << 7; // PB7, the Mega board LED

    fn led_on() {
        let port = unsafe { &*pac::PORTB::ptr() };
        port.ddrb().modify(|r, w| unsafe { w.bits(r.bits() | LED_BIT) });
        port.portb().modify(|r, w| unsafe { w.bits(r.bits() | LED_BIT) });
    }

    /// Writing a 1 to the PIN register toggles the output latch.
    fn led_toggle() {
        let port = unsafe { &*pac::PORTB::ptr() };
        port.pinb().write(|w| unsafe { w.bits(LED_BIT) });
    }

    pub fn signal_forever(signal: FatalSignal) -> ! {
        led_on();
        loop {
            match signal {
                FatalSignal::AllocationFailure => {
                    busy_wait_ms(50);
                    led_toggle();
                }
                FatalSignal::StackOverflow => {
                    busy_wait_ms(2000);
                    led_toggle();
                }
                FatalSignal::AssertionFailure => {
                    busy_wait_ms(100);
                    led_toggle();
                    busy_wait_ms(2000);
                    led_toggle();
                    busy_wait_ms(100);
                    led_toggle();
                    busy_wait_ms(100);
                    led_toggle();
                }
            }
        }
    }
}

#[cfg(not(target_arch = "avr"))]
mod imp {
    use super::FatalSignal;

    pub fn signal_forever(signal: FatalSignal) -> ! {
        panic!("fatal port condition: {:?}", signal)
    }
}

/// Check an invariant; on failure, route to the kernel's assertion
/// hook, which never returns.
#[macro_export]
macro_rules! port_assert {
    ($cond:expr) => {
        if !$cond {
            $crate::kernel::assert_failed();
        }
    };
}
