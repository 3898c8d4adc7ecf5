//! Kernel core interface
//!
//! The port layer never owns scheduling decisions; it consumes a small set
//! of entry points from the kernel core and shares exactly one piece of
//! state with it: the current-task reference. The kernel registers its
//! entry points with [`set_kernel!`](crate::set_kernel), the same
//! trait-plus-registration pattern the `critical-section` crate uses,
//! which resolves the binding at link time with no function pointers in
//! the switch path.

use core::ptr;

use crate::types::Tick;

/// The saved stack-pointer cell of a task.
///
/// This is the only part of a Task Control Block the port layer touches.
/// The kernel core guarantees it is the *first* field of its TCB, so the
/// context-switch assembly can reach it through [`CURRENT_TASK_SP`] without
/// knowing anything else about the TCB's layout.
#[repr(transparent)]
pub struct SavedStackPtr(core::cell::UnsafeCell<*mut u8>);

// Accessed only with interrupts disabled; see the concurrency note on
// CURRENT_TASK_SP below.
unsafe impl Sync for SavedStackPtr {}

impl SavedStackPtr {
    pub const fn new() -> Self {
        SavedStackPtr(core::cell::UnsafeCell::new(ptr::null_mut()))
    }

    /// # Safety
    /// Caller must hold interrupts disabled and own the task's stack.
    pub unsafe fn write(&self, sp: *mut u8) {
        unsafe { self.0.get().write(sp) }
    }

    /// # Safety
    /// Caller must hold interrupts disabled.
    pub unsafe fn read(&self) -> *mut u8 {
        unsafe { self.0.get().read() }
    }
}

impl Default for SavedStackPtr {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of the current task's saved-SP cell.
///
/// Kernel-core-owned process-wide state: initialised once before the
/// scheduler starts, rewritten only inside the kernel's selection step,
/// read by the save/restore assembly to locate the frame. Every access
/// happens with interrupts disabled, so no further locking exists or is
/// needed. `#[no_mangle]` because the naked context-switch routines reach
/// it by symbol.
#[no_mangle]
pub static mut CURRENT_TASK_SP: *const SavedStackPtr = ptr::null();

/// Point the port at the task the kernel core has selected.
///
/// # Safety
/// Must be called with interrupts disabled. `cell` must be the first field
/// of a live TCB and stay valid until the next selection.
#[inline(always)]
pub unsafe fn set_current_task(cell: *const SavedStackPtr) {
    unsafe { CURRENT_TASK_SP = cell };
}

/// Saved-SP cell of the current task, null before the first selection.
///
/// # Safety
/// Must be called with interrupts disabled.
#[inline(always)]
pub unsafe fn current_task() -> *const SavedStackPtr {
    unsafe { CURRENT_TASK_SP }
}

pub(crate) fn has_current_task() -> bool {
    let cs = crate::critical::InterruptGuard::enter();
    let set = !unsafe { CURRENT_TASK_SP }.is_null();
    drop(cs);
    set
}

/// Entry points the kernel core supplies to the port layer.
///
/// The three required methods are the scheduling seams; the hook methods
/// have terminal defaults (halt and blink) and may be overridden.
///
/// # Safety
/// `switch_context` must leave `CURRENT_TASK_SP` pointing at a task whose
/// frame is well formed; `increment_tick` and `delay_ticks` must be safe
/// to call with interrupts disabled.
pub unsafe trait Kernel {
    /// Task selection: pick the next task to run and update the current
    /// task reference. Called between a context save and the following
    /// restore, with interrupts disabled.
    unsafe fn switch_context();

    /// Advance the kernel's tick counter by one. Returns whether a
    /// reschedule is warranted, letting the tick path skip selection on
    /// ticks that unblock nothing.
    unsafe fn increment_tick() -> bool;

    /// Block the calling task for `ticks` whole ticks.
    unsafe fn delay_ticks(ticks: Tick);

    /// Allocation failure. Terminal: never returns.
    fn on_malloc_failed() -> ! {
        crate::hooks::fatal(crate::hooks::FatalSignal::AllocationFailure)
    }

    /// Detected stack overflow. Terminal: never returns.
    fn on_stack_overflow() -> ! {
        crate::hooks::fatal(crate::hooks::FatalSignal::StackOverflow)
    }

    /// Failed assertion (see [`port_assert!`](crate::port_assert)).
    /// Terminal: never returns.
    fn on_assert_failed() -> ! {
        crate::hooks::fatal(crate::hooks::FatalSignal::AssertionFailure)
    }
}

/// Bind a [`Kernel`] implementation to the port layer.
///
/// Exactly one registration must exist in the final binary; the linker
/// enforces this. The expansion generates the extern symbols the
/// context-switch, tick and hook routines call.
#[macro_export]
macro_rules! set_kernel {
    ($t:ty) => {
        #[no_mangle]
        unsafe extern "C" fn port_switch_context() {
            unsafe { <$t as $crate::kernel::Kernel>::switch_context() }
        }

        #[no_mangle]
        unsafe extern "C" fn port_increment_tick() -> bool {
            unsafe { <$t as $crate::kernel::Kernel>::increment_tick() }
        }

        #[no_mangle]
        unsafe extern "C" fn port_delay_ticks(ticks: $crate::types::Tick) {
            unsafe { <$t as $crate::kernel::Kernel>::delay_ticks(ticks) }
        }

        #[no_mangle]
        extern "C-unwind" fn port_malloc_failed_hook() -> ! {
            <$t as $crate::kernel::Kernel>::on_malloc_failed()
        }

        #[no_mangle]
        extern "C-unwind" fn port_stack_overflow_hook() -> ! {
            <$t as $crate::kernel::Kernel>::on_stack_overflow()
        }

        #[no_mangle]
        extern "C-unwind" fn port_assert_failed_hook() -> ! {
            <$t as $crate::kernel::Kernel>::on_assert_failed()
        }
    };
}

extern "C" {
    pub(crate) fn port_switch_context();
    pub(crate) fn port_increment_tick() -> bool;
    pub(crate) fn port_delay_ticks(ticks: Tick);
}

// The hooks are "C-unwind": on the target they never return, but host
// defaults report the condition with a panic, which must be able to
// unwind back through this symbol into a test harness.
extern "C-unwind" {
    pub(crate) fn port_malloc_failed_hook() -> !;
    pub(crate) fn port_stack_overflow_hook() -> !;
    pub(crate) fn port_assert_failed_hook() -> !;
}

/// Run the kernel's task selection.
///
/// # Safety
/// A [`Kernel`] must be registered and interrupts must be disabled.
#[inline(always)]
pub(crate) unsafe fn switch_context() {
    unsafe { port_switch_context() }
}

/// Advance the kernel tick; true means a reschedule is due.
///
/// # Safety
/// A [`Kernel`] must be registered and interrupts must be disabled.
#[inline(always)]
pub(crate) unsafe fn increment_tick() -> bool {
    unsafe { port_increment_tick() }
}

/// Ask the kernel to block the calling task for whole ticks.
///
/// # Safety
/// A [`Kernel`] must be registered; must be called from task context.
#[inline(always)]
pub(crate) unsafe fn delay_ticks(ticks: Tick) {
    unsafe { port_delay_ticks(ticks) }
}

/// Route to the registered assertion hook. Terminal.
pub fn assert_failed() -> ! {
    unsafe { port_assert_failed_hook() }
}

/// Route to the registered allocation-failure hook. Terminal.
pub fn malloc_failed() -> ! {
    unsafe { port_malloc_failed_hook() }
}

/// Route to the registered stack-overflow hook. Terminal.
pub fn stack_overflow() -> ! {
    unsafe { port_stack_overflow_hook() }
}

// The library's own test harness links without a kernel core; register an
// inert one so the `port_*` symbols resolve. Integration tests build the
// library without `cfg(test)` and register their own.
#[cfg(test)]
mod null_kernel {
    struct NullKernel;

    unsafe impl super::Kernel for NullKernel {
        unsafe fn switch_context() {}

        unsafe fn increment_tick() -> bool {
            false
        }

        unsafe fn delay_ticks(_ticks: crate::types::Tick) {}
    }

    crate::set_kernel!(NullKernel);
}
