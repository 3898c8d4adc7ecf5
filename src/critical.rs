//! Critical section handling
//!
//! The AVR exposes exactly one interrupt-enable bit, SREG.I, so nesting
//! cannot be expressed in hardware. Composition comes from discipline
//! instead: Enter captures the current enable state before forcing
//! interrupts off, and Exit restores the captured state rather than
//! unconditionally re-enabling. Arbitrarily deep nesting then unwinds to
//! exactly the state that existed before the outermost Enter.
//!
//! On the host the enable bit is emulated with an atomic so the nesting
//! discipline is testable off target.

/// RAII guard for critical sections.
///
/// Creating the guard disables interrupts; dropping it restores the
/// enable state captured at creation.
pub struct InterruptGuard {
    was_enabled: bool,
}

impl InterruptGuard {
    /// Capture the interrupt-enable state, then disable interrupts.
    #[inline(always)]
    pub fn enter() -> Self {
        let was_enabled = interrupts_enabled();
        disable_interrupts();
        InterruptGuard { was_enabled }
    }
}

impl Drop for InterruptGuard {
    #[inline(always)]
    fn drop(&mut self) {
        if self.was_enabled {
            // Captured state said enabled; re-arm. A disabled capture
            // means an enclosing section still holds interrupts off.
            unsafe { enable_interrupts() }
        }
    }
}

/// Execute a closure with interrupts disabled, restoring the previous
/// enable state afterwards.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&InterruptGuard) -> R,
{
    let guard = InterruptGuard::enter();
    f(&guard)
}

// ============ Target implementation ============

#[cfg(target_arch = "avr")]
mod imp {
    /// Global interrupt-enable state (SREG bit 7).
    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        let sreg: u8;
        unsafe {
            core::arch::asm!(
                "in {}, 0x3F",
                out(reg) sreg,
                options(nomem, nostack, preserves_flags)
            );
        }
        sreg & 0x80 != 0
    }

    #[inline(always)]
    pub fn disable_interrupts() {
        avr_device::interrupt::disable();
    }

    /// # Safety
    /// Re-enabling interrupts must not expose state an enclosing critical
    /// section still relies on.
    #[inline(always)]
    pub unsafe fn enable_interrupts() {
        unsafe { avr_device::interrupt::enable() }
    }
}

// ============ Host emulation ============

#[cfg(not(target_arch = "avr"))]
mod imp {
    use portable_atomic::{AtomicBool, Ordering};

    /// Emulated SREG.I bit; starts enabled like a reset MCU running with
    /// `sei` already executed.
    static INT_ENABLED: AtomicBool = AtomicBool::new(true);

    #[inline(always)]
    pub fn interrupts_enabled() -> bool {
        INT_ENABLED.load(Ordering::SeqCst)
    }

    #[inline(always)]
    pub fn disable_interrupts() {
        INT_ENABLED.store(false, Ordering::SeqCst);
    }

    pub unsafe fn enable_interrupts() {
        INT_ENABLED.store(true, Ordering::SeqCst);
    }
}

pub use imp::{disable_interrupts, interrupts_enabled};
pub(crate) use imp::enable_interrupts;
