//! Target dispatch for the context-switch engine
//!
//! The AVR implementation carries the real save/restore machinery and
//! interrupt vectors. On other targets a stub stands in so the portable
//! logic and its tests build on the host.

#[cfg(target_arch = "avr")]
pub mod avr;
#[cfg(target_arch = "avr")]
pub use avr::{sleep_reset, start_first_task, yield_from_isr, yield_now};

#[cfg(not(target_arch = "avr"))]
mod host {
    use crate::kernel;

    /// Hand the processor to the next selected task.
    pub fn yield_now() {
        unsafe { kernel::switch_context() }
    }

    /// Yield requested from interrupt context; identical on the host.
    pub fn yield_from_isr() {
        unsafe { kernel::switch_context() }
    }

    /// No hardware context exists to launch into on the host.
    pub fn start_first_task() -> ! {
        unimplemented!("launching a task context requires an AVR target")
    }

    pub fn sleep_reset() {}
}

#[cfg(not(target_arch = "avr"))]
pub use host::{sleep_reset, start_first_task, yield_from_isr, yield_now};
