//! Saved-context frame codec
//!
//! A suspended task rests as a *frame* on its own stack: the bytes the
//! context save pushed, in push order. The restore path consumes exactly
//! the same bytes in reverse. That equivalence is the central invariant of
//! the whole port: a single misordered slot silently corrupts every task.
//! To keep the sequencing in one place, this module defines the frame
//! layout once and derives both directions from it: the encoder builds
//! the initial frame of a never-run task, and the decoder exists so tests
//! can prove the two are mutual inverses for every supported variant.
//!
//! Push order (matching the context-save assembly in [`crate::arch`]):
//! return address low byte first, then r0, SREG, RAMPZ and EIND on the
//! three-byte-PC variant, r1, and r2..r31. The restore assembly pops in
//! exact reverse, restoring SREG second to last so the interrupt-enable
//! state captured at save time is the one re-armed.

use crate::config;
use crate::types::{StackElement, TaskFn, TaskParam};

/// Number of general purpose registers in a saved frame (r0..r31).
pub const GP_REG_COUNT: usize = 32;

/// SREG value placed in a fresh frame: global interrupt enable set, all
/// other flags clear. Tasks start with interrupts enabled.
pub const FLAGS_INT_ENABLED: u8 = 0x80;

/// Canary bytes written above the frame of a fresh stack, handy when
/// inspecting task stacks with a debugger.
pub const STACK_CANARY: [u8; 3] = [0x11, 0x22, 0x33];

/// Program counter width of a code address stored on the stack.
///
/// Devices with more than 128 KiB of flash have a 17-bit program counter;
/// `call`/`ret` move three bytes of it through the stack, and the RAMPZ
/// and EIND registers become part of the saved context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcWidth {
    TwoByte,
    ThreeByte,
}

impl PcWidth {
    /// Total frame length in bytes: the stored return address, r0..r31,
    /// SREG, plus RAMPZ/EIND on the extended variant.
    pub const fn frame_len(self) -> usize {
        match self {
            PcWidth::TwoByte => 2 + GP_REG_COUNT + 1,
            PcWidth::ThreeByte => 3 + GP_REG_COUNT + 1 + 2,
        }
    }
}

/// Descending stack cursor with AVR push semantics: store at the current
/// location, then move down. Counts the bytes it has written so the
/// mirror property is checkable.
pub struct StackWriter {
    sp: *mut StackElement,
    pushed: usize,
}

impl StackWriter {
    /// Start writing at `top`, the highest usable byte of the stack.
    ///
    /// # Safety
    /// `top` must point into a region with enough space below it for
    /// everything subsequently pushed.
    pub unsafe fn new(top: *mut StackElement) -> Self {
        StackWriter { sp: top, pushed: 0 }
    }

    pub fn push(&mut self, byte: StackElement) {
        unsafe {
            self.sp.write(byte);
            self.sp = self.sp.sub(1);
        }
        self.pushed += 1;
    }

    /// Resulting stack pointer (points at the first free byte below the
    /// frame, as the hardware leaves SP after a push) and byte count.
    pub fn finish(self) -> (*mut StackElement, usize) {
        (self.sp, self.pushed)
    }
}

/// Ascending stack cursor with AVR pop semantics: move up, then load.
pub struct StackReader {
    sp: *const StackElement,
    popped: usize,
}

impl StackReader {
    /// Start reading from a stack pointer as left by [`StackWriter`] or a
    /// live context save.
    ///
    /// # Safety
    /// `sp` must be the stack pointer of a well-formed frame.
    pub unsafe fn new(sp: *const StackElement) -> Self {
        StackReader { sp, popped: 0 }
    }

    pub fn pop(&mut self) -> StackElement {
        unsafe {
            self.sp = self.sp.add(1);
            self.popped += 1;
            self.sp.read()
        }
    }

    pub fn popped(&self) -> usize {
        self.popped
    }
}

/// Logical content of a saved frame.
///
/// `pc` is the 16-bit word the `ret` at the end of the restore path will
/// jump through. On the three-byte-PC variant the third (highest) stored
/// byte is always zero: task code is constrained to the low 128 KiB of
/// flash, so the extra bits never carry information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub pc: u16,
    pub sreg: u8,
    pub rampz: u8,
    pub eind: u8,
    /// r0..r31 in register order.
    pub gp: [u8; GP_REG_COUNT],
}

impl Frame {
    /// The frame a live save would have produced for a task suspended
    /// right at its own entry: interrupts enabled in the saved SREG, the
    /// zero register actually zero, the parameter in the r24/r25 pair the
    /// calling convention uses for a first argument, and the remaining
    /// register slots filled with deterministic markers. The markers are
    /// never read before the task overwrites them; they exist for stack
    /// dumps, mirroring the register number in BCD (r26 reads 0x26).
    pub fn initial(entry: u16, param: u16) -> Frame {
        let mut gp = [0u8; GP_REG_COUNT];
        for (reg, slot) in gp.iter_mut().enumerate().skip(2) {
            *slot = bcd_marker(reg as u8);
        }
        gp[0] = 0; // r0, the temp register
        gp[1] = 0; // r1, the compiler's zero register
        gp[24] = (param & 0x00ff) as u8;
        gp[25] = (param >> 8) as u8;
        Frame {
            pc: entry,
            sreg: FLAGS_INT_ENABLED,
            rampz: 0,
            eind: 0,
            gp,
        }
    }

    /// Write this frame in context-save push order.
    pub fn push(&self, w: &mut StackWriter, width: PcWidth) {
        // The return address is on the stack before the save runs; its low
        // byte sits at the highest address.
        w.push((self.pc & 0x00ff) as u8);
        w.push((self.pc >> 8) as u8);
        if width == PcWidth::ThreeByte {
            w.push(0);
        }
        w.push(self.gp[0]);
        w.push(self.sreg);
        if width == PcWidth::ThreeByte {
            w.push(self.rampz);
            w.push(self.eind);
        }
        w.push(self.gp[1]);
        for reg in 2..GP_REG_COUNT {
            w.push(self.gp[reg]);
        }
    }

    /// Read a frame back in context-restore pop order, the exact reverse
    /// of [`Frame::push`].
    pub fn pop(r: &mut StackReader, width: PcWidth) -> Frame {
        let mut gp = [0u8; GP_REG_COUNT];
        for reg in (2..GP_REG_COUNT).rev() {
            gp[reg] = r.pop();
        }
        gp[1] = r.pop();
        let (eind, rampz) = if width == PcWidth::ThreeByte {
            (r.pop(), r.pop())
        } else {
            (0, 0)
        };
        let sreg = r.pop();
        gp[0] = r.pop();
        if width == PcWidth::ThreeByte {
            // Highest return-address byte, consumed first by `ret`.
            let _ = r.pop();
        }
        let pc_high = r.pop();
        let pc_low = r.pop();
        Frame {
            pc: u16::from_be_bytes([pc_high, pc_low]),
            sreg,
            rampz,
            eind,
            gp,
        }
    }

    /// Parameter as seen through the first-argument convention.
    pub fn param(&self) -> u16 {
        u16::from_le_bytes([self.gp[24], self.gp[25]])
    }
}

/// Register-number marker in BCD, so r26 shows as 0x26 in a stack dump.
const fn bcd_marker(reg: u8) -> u8 {
    ((reg / 10) << 4) | (reg % 10)
}

/// Build the initial saved context of a never-run task.
///
/// `top_of_stack` is the highest usable byte of a fresh stack region owned
/// exclusively by the task. Returns the stack pointer value the restore
/// path will consume to start the task for the first time; the task itself
/// is never executed here.
///
/// # Safety
/// The region below `top_of_stack` must be writable for at least
/// `STACK_CANARY.len() + PC_WIDTH.frame_len()` bytes and must not be in
/// use by any live context.
pub unsafe fn initialise_stack(
    top_of_stack: *mut StackElement,
    entry: TaskFn,
    param: TaskParam,
) -> *mut StackElement {
    let mut w = unsafe { StackWriter::new(top_of_stack) };
    for byte in STACK_CANARY {
        w.push(byte);
    }
    Frame::initial(entry as usize as u16, param as usize as u16).push(&mut w, config::PC_WIDTH);
    w.finish().0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_lengths() {
        assert_eq!(PcWidth::TwoByte.frame_len(), 35);
        assert_eq!(PcWidth::ThreeByte.frame_len(), 38);
    }

    #[test]
    fn test_bcd_markers() {
        assert_eq!(bcd_marker(2), 0x02);
        assert_eq!(bcd_marker(19), 0x19);
        assert_eq!(bcd_marker(31), 0x31);
    }

    #[test]
    fn test_initial_frame_param_round_trip() {
        let frame = Frame::initial(0, 0xc0de);
        assert_eq!(frame.param(), 0xc0de);
    }
}
