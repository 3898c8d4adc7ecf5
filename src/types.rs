//! Core type definitions for the port layer
//!
//! These types pin down the widths the AVR calling convention and the
//! kernel core agree on.

/// One element of a task stack. AVR stacks are byte granular and grow
/// downward with no alignment requirement.
pub type StackElement = u8;

/// Tick counter type.
///
/// A 16-bit counter halves the size of every tick arithmetic site on an
/// 8-bit CPU, at the cost of a shorter wrap interval.
#[cfg(feature = "tick-16bit")]
pub type Tick = u16;
/// Tick counter type.
#[cfg(not(feature = "tick-16bit"))]
pub type Tick = u32;

/// Largest expressible delay, used by the kernel core as "block forever".
#[cfg(feature = "tick-16bit")]
pub const MAX_DELAY: Tick = 0xffff;
/// Largest expressible delay, used by the kernel core as "block forever".
#[cfg(not(feature = "tick-16bit"))]
pub const MAX_DELAY: Tick = 0xffff_ffff;

/// Opaque task parameter, forwarded untouched to the task entry point.
pub type TaskParam = *mut ();

/// Task entry point. Tasks never return; a task that wants to die asks
/// the kernel core to delete it.
pub type TaskFn = fn(TaskParam) -> !;
