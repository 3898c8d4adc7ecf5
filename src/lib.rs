//! AVR hardware port layer for a preemptive RTOS kernel
//!
//! Everything an RTOS kernel core needs from ATmega-class hardware:
//! - Context switching via full register-file save/restore assembly
//! - A periodic tick from the watchdog or a compare timer
//! - Initial stack frames indistinguishable from interrupted contexts
//! - Nestable critical sections over the single SREG I-bit
//! - Millisecond delays layered on the coarse tick
//!
//! The kernel core binds itself in with [`set_kernel!`]; scheduling
//! policy and tick source are chosen by cargo features, exactly one of
//! each, checked at build time.

#![no_std]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "avr")]
mod cs_impl {
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_enabled = crate::critical::interrupts_enabled();
            avr_device::interrupt::disable();
            was_enabled
        }

        unsafe fn release(was_enabled: RawRestoreState) {
            if was_enabled {
                unsafe { avr_device::interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod arch;
pub mod config;
pub mod critical;
pub mod delay;
pub mod error;
pub mod frame;
pub mod hooks;
pub mod kernel;
pub mod scheduler;
pub mod tick;
pub mod types;

// ============ Re-exports ============

pub use arch::{yield_from_isr, yield_now};
pub use critical::{critical_section, InterruptGuard};
pub use delay::delay_ms;
pub use error::{PortError, PortResult};
pub use frame::initialise_stack;
pub use hooks::FatalSignal;
pub use kernel::{Kernel, SavedStackPtr};
pub use scheduler::{end_scheduler, start_scheduler};
pub use types::{StackElement, TaskFn, TaskParam, Tick, MAX_DELAY};

pub use config::{TICK_PERIOD_MS, TICK_RATE_HZ};

#[cfg(target_arch = "avr")]
pub use arch::avr::pac;
