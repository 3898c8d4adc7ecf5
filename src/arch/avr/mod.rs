//! AVR context-switch engine
//!
//! Context switches run entirely in naked assembly. The save sequence
//! pushes the complete register file plus SREG (and RAMPZ/EIND on the
//! extended parts) onto the interrupted task's own stack, then publishes
//! the stack pointer through [`crate::kernel::CURRENT_TASK_SP`]; the
//! restore sequence is its byte-exact mirror. The saved frame layout is
//! the one [`crate::frame`] builds for a task that has never run, so the
//! engine cannot tell a first launch from a resumption.
//!
//! SREG is captured before `cli` so the task's interrupt-enable state
//! survives the switch, and restored second-to-last so interrupts come
//! back only once the stack is consistent again.

use core::arch::naked_asm;

#[cfg(feature = "atmega328p")]
pub use avr_device::atmega328p as pac;
#[cfg(feature = "atmega2560")]
pub use avr_device::atmega2560 as pac;

// I/O-space addresses shared by all supported devices.
// SPL = 0x3d, SPH = 0x3e, SREG = 0x3f, RAMPZ = 0x3b, EIND = 0x3c.

#[cfg(feature = "atmega2560")]
macro_rules! save_extended {
    () => {
        concat!(
            "in r0, 0x3b\n",
            "push r0\n",
            "in r0, 0x3c\n",
            "push r0\n",
        )
    };
}
#[cfg(not(feature = "atmega2560"))]
macro_rules! save_extended {
    () => {
        ""
    };
}

#[cfg(feature = "atmega2560")]
macro_rules! restore_extended {
    () => {
        concat!(
            "pop r0\n",
            "out 0x3c, r0\n",
            "pop r0\n",
            "out 0x3b, r0\n",
        )
    };
}
#[cfg(not(feature = "atmega2560"))]
macro_rules! restore_extended {
    () => {
        ""
    };
}

/// Push the full execution context onto the current task's stack, then
/// store the resulting stack pointer through the published task cell.
///
/// r0 goes first so it can ferry SREG; interrupts are off from the `cli`
/// until the matching restore brings SREG back. r1 is cleared after
/// saving because compiled code assumes it holds zero.
macro_rules! save_context {
    () => {
        concat!(
            "push r0\n",
            "in r0, 0x3f\n",
            "cli\n",
            "push r0\n",
            save_extended!(),
            "push r1\n",
            "clr r1\n",
            "push r2\n",
            "push r3\n",
            "push r4\n",
            "push r5\n",
            "push r6\n",
            "push r7\n",
            "push r8\n",
            "push r9\n",
            "push r10\n",
            "push r11\n",
            "push r12\n",
            "push r13\n",
            "push r14\n",
            "push r15\n",
            "push r16\n",
            "push r17\n",
            "push r18\n",
            "push r19\n",
            "push r20\n",
            "push r21\n",
            "push r22\n",
            "push r23\n",
            "push r24\n",
            "push r25\n",
            "push r26\n",
            "push r27\n",
            "push r28\n",
            "push r29\n",
            "push r30\n",
            "push r31\n",
            "lds r26, {cell}\n",
            "lds r27, {cell}+1\n",
            "in r0, 0x3d\n",
            "st X+, r0\n",
            "in r0, 0x3e\n",
            "st X+, r0\n",
        )
    };
}

/// Load the stack pointer from the published task cell and pop the
/// execution context it holds, in the exact reverse of the save order.
macro_rules! restore_context {
    () => {
        concat!(
            "lds r26, {cell}\n",
            "lds r27, {cell}+1\n",
            "ld r28, X+\n",
            "out 0x3d, r28\n",
            "ld r29, X+\n",
            "out 0x3e, r29\n",
            "pop r31\n",
            "pop r30\n",
            "pop r29\n",
            "pop r28\n",
            "pop r27\n",
            "pop r26\n",
            "pop r25\n",
            "pop r24\n",
            "pop r23\n",
            "pop r22\n",
            "pop r21\n",
            "pop r20\n",
            "pop r19\n",
            "pop r18\n",
            "pop r17\n",
            "pop r16\n",
            "pop r15\n",
            "pop r14\n",
            "pop r13\n",
            "pop r12\n",
            "pop r11\n",
            "pop r10\n",
            "pop r9\n",
            "pop r8\n",
            "pop r7\n",
            "pop r6\n",
            "pop r5\n",
            "pop r4\n",
            "pop r3\n",
            "pop r2\n",
            "pop r1\n",
            restore_extended!(),
            "pop r0\n",
            "out 0x3f, r0\n",
            "pop r0\n",
        )
    };
}

/// Voluntary context switch.
///
/// Saves the caller's context, lets the kernel pick the next task, then
/// restores whatever context the task cell now points at. The final
/// `ret` consumes the program counter from the incoming frame, so a
/// task entered here for the first time starts at its entry function.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn port_yield() {
    naked_asm!(
        save_context!(),
        "call {switch}",
        restore_context!(),
        "ret",
        cell = sym crate::kernel::CURRENT_TASK_SP,
        switch = sym crate::kernel::port_switch_context,
    );
}

/// Preemptive tick path: save, run the tick body, restore.
///
/// The tick body decides whether the restore resumes the interrupted
/// task or a newly selected one; this code is identical either way.
#[cfg(feature = "preemptive")]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn port_yield_from_tick() {
    naked_asm!(
        save_context!(),
        "call {tick}",
        restore_context!(),
        "ret",
        cell = sym crate::kernel::CURRENT_TASK_SP,
        tick = sym crate::tick::port_tick_entry,
    );
}

/// Launch the first task: pure restore, nothing to save.
///
/// The frame popped here was built by the stack initializer, so the
/// `ret` lands on the task's entry function with interrupts enabled by
/// the SREG image in the frame. Never returns.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn port_start_first_task() -> ! {
    naked_asm!(
        restore_context!(),
        "ret",
        cell = sym crate::kernel::CURRENT_TASK_SP,
    );
}

/// Hand the processor to the next selected task.
#[inline]
pub fn yield_now() {
    unsafe { port_yield() }
}

/// Yield requested from interrupt context.
///
/// The full-frame save makes the voluntary path interrupt-safe as it
/// stands, so both routes share one implementation.
#[inline]
pub fn yield_from_isr() {
    unsafe { port_yield() }
}

/// Restore the context published in the task cell and run it.
pub fn start_first_task() -> ! {
    unsafe { port_start_first_task() }
}

/// Clear the sleep-enable configuration so a stray `sleep` opcode after
/// the tick cannot halt the CPU with a mode left over from a task.
pub fn sleep_reset() {
    let cpu = unsafe { &*pac::CPU::ptr() };
    cpu.smcr().write(|w| unsafe { w.bits(0) });
}

// ============ Tick interrupt vectors ============
//
// Preemptive builds take the naked-vector route: the compiler must not
// generate a prologue, because the full context save above already
// preserves everything and the frame layout must stay byte-exact.
// Cooperative builds use ordinary handlers; they only bump a counter.

#[cfg(all(feature = "preemptive", feature = "tick-wdt", feature = "atmega328p"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn __vector_6() {
    naked_asm!("call {isr}", "reti", isr = sym port_yield_from_tick);
}

#[cfg(all(feature = "preemptive", feature = "tick-timer0", feature = "atmega328p"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn __vector_14() {
    naked_asm!("call {isr}", "reti", isr = sym port_yield_from_tick);
}

#[cfg(all(feature = "preemptive", feature = "tick-wdt", feature = "atmega2560"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn __vector_12() {
    naked_asm!("call {isr}", "reti", isr = sym port_yield_from_tick);
}

#[cfg(all(feature = "preemptive", feature = "tick-timer0", feature = "atmega2560"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn __vector_21() {
    naked_asm!("call {isr}", "reti", isr = sym port_yield_from_tick);
}

#[cfg(all(feature = "preemptive", feature = "tick-timer3", feature = "atmega2560"))]
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn __vector_32() {
    naked_asm!("call {isr}", "reti", isr = sym port_yield_from_tick);
}

#[cfg(all(feature = "cooperative", feature = "tick-wdt", feature = "atmega328p"))]
#[avr_device::interrupt(atmega328p)]
fn WDT() {
    crate::tick::tick_cooperative();
}

#[cfg(all(feature = "cooperative", feature = "tick-timer0", feature = "atmega328p"))]
#[avr_device::interrupt(atmega328p)]
fn TIMER0_COMPA() {
    crate::tick::tick_cooperative();
}

#[cfg(all(feature = "cooperative", feature = "tick-wdt", feature = "atmega2560"))]
#[avr_device::interrupt(atmega2560)]
fn WDT() {
    crate::tick::tick_cooperative();
}

#[cfg(all(feature = "cooperative", feature = "tick-timer0", feature = "atmega2560"))]
#[avr_device::interrupt(atmega2560)]
fn TIMER0_COMPA() {
    crate::tick::tick_cooperative();
}

#[cfg(all(feature = "cooperative", feature = "tick-timer3", feature = "atmega2560"))]
#[avr_device::interrupt(atmega2560)]
fn TIMER3_COMPA() {
    crate::tick::tick_cooperative();
}
