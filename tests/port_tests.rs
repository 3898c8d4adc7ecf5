//! Unit tests for the port layer
//!
//! These tests run on the host (not the AVR target) to verify the frame
//! codec, the timing derivations and the portable scheduling glue. A
//! scripted kernel stands in for the kernel core; tests that touch
//! process-wide state serialise on one lock.

use std::sync::{Mutex, MutexGuard};

use portable_atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use avr_rtos_port::kernel::Kernel;
use avr_rtos_port::types::{TaskParam, Tick};

static SWITCHES: AtomicUsize = AtomicUsize::new(0);
static TICKS: AtomicUsize = AtomicUsize::new(0);
static RESCHEDULE: AtomicBool = AtomicBool::new(false);
static DELAY_TICKS_TOTAL: AtomicU32 = AtomicU32::new(0);

struct ScriptedKernel;

unsafe impl Kernel for ScriptedKernel {
    unsafe fn switch_context() {
        SWITCHES.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn increment_tick() -> bool {
        TICKS.fetch_add(1, Ordering::SeqCst);
        RESCHEDULE.load(Ordering::SeqCst)
    }

    unsafe fn delay_ticks(ticks: Tick) {
        DELAY_TICKS_TOTAL.fetch_add(ticks as u32, Ordering::SeqCst);
    }
}

avr_rtos_port::set_kernel!(ScriptedKernel);

// Kernel counters, the busy-wait total and the scheduler flag are
// process-wide; tests touching them take this lock.
static GLOBAL_STATE: Mutex<()> = Mutex::new(());

fn lock_global() -> MutexGuard<'static, ()> {
    GLOBAL_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

fn task_entry(_param: TaskParam) -> ! {
    unreachable!("initial frames are never executed by tests")
}

#[cfg(test)]
mod frame_codec_tests {
    use avr_rtos_port::frame::{Frame, PcWidth, StackReader, StackWriter, GP_REG_COUNT};

    #[test]
    fn test_frame_lengths() {
        assert_eq!(PcWidth::TwoByte.frame_len(), 35);
        assert_eq!(PcWidth::ThreeByte.frame_len(), 38);
    }

    #[test]
    fn test_push_pop_mirror_both_widths() {
        for width in [PcWidth::TwoByte, PcWidth::ThreeByte] {
            let mut frame = Frame::initial(0x1234, 0xbeef);
            frame.sreg = 0x80;
            frame.gp[7] = 0xa5;

            let mut buf = [0u8; 64];
            let top = &mut buf[63] as *mut u8;
            let mut w = unsafe { StackWriter::new(top) };
            frame.push(&mut w, width);
            let (sp, pushed) = w.finish();
            assert_eq!(pushed, width.frame_len());

            let mut r = unsafe { StackReader::new(sp) };
            let back = Frame::pop(&mut r, width);
            assert_eq!(r.popped(), pushed);
            assert_eq!(back, frame);
        }
    }

    #[test]
    fn test_initial_frame_register_conventions() {
        let frame = Frame::initial(0x0420, 0x1234);

        // r0 scratch and the compiler's zero register start cleared.
        assert_eq!(frame.gp[0], 0);
        assert_eq!(frame.gp[1], 0);

        // Interrupts enabled the moment the task first runs.
        assert_eq!(frame.sreg, 0x80);
        assert_eq!(frame.rampz, 0);
        assert_eq!(frame.eind, 0);

        // Parameter in the r24:r25 argument pair, little endian.
        assert_eq!(frame.gp[24], 0x34);
        assert_eq!(frame.gp[25], 0x12);
        assert_eq!(frame.param(), 0x1234);

        // Untouched slots mirror their register number in BCD.
        assert_eq!(frame.gp[2], 0x02);
        assert_eq!(frame.gp[9], 0x09);
        assert_eq!(frame.gp[23], 0x23);
        assert_eq!(frame.gp[26], 0x26);
        assert_eq!(frame.gp[31], 0x31);
        assert_eq!(GP_REG_COUNT, 32);
    }

    #[test]
    fn test_pc_survives_byte_split() {
        // The return address crosses the stack as two separate bytes,
        // low byte at the higher address.
        let frame = Frame::initial(0xabcd, 0);
        let mut buf = [0u8; 64];
        let top = &mut buf[63] as *mut u8;
        let mut w = unsafe { StackWriter::new(top) };
        frame.push(&mut w, PcWidth::TwoByte);

        assert_eq!(buf[63], 0xcd);
        assert_eq!(buf[62], 0xab);

        let (sp, _) = w.finish();
        let mut r = unsafe { StackReader::new(sp) };
        assert_eq!(Frame::pop(&mut r, PcWidth::TwoByte).pc, 0xabcd);
    }
}

#[cfg(test)]
mod stack_init_tests {
    use avr_rtos_port::config::PC_WIDTH;
    use avr_rtos_port::frame::{Frame, StackReader, STACK_CANARY};
    use avr_rtos_port::initialise_stack;

    #[test]
    fn test_initialise_stack_layout() {
        let mut stack = [0u8; 128];
        let top = &mut stack[127] as *mut u8;

        let sp = unsafe { initialise_stack(top, super::task_entry, 0x0180 as *mut ()) };

        // Canary above the frame, first byte at the very top.
        assert_eq!(stack[127], STACK_CANARY[0]);
        assert_eq!(stack[126], STACK_CANARY[1]);
        assert_eq!(stack[125], STACK_CANARY[2]);

        // SP ends up just below everything pushed.
        let expected =
            unsafe { top.sub(STACK_CANARY.len() + PC_WIDTH.frame_len()) };
        assert_eq!(sp, expected);

        // The frame decodes back to a task parked at its entry point.
        let mut r = unsafe { StackReader::new(sp) };
        let frame = Frame::pop(&mut r, PC_WIDTH);
        assert_eq!(frame.pc, super::task_entry as usize as u16);
        assert_eq!(frame.param(), 0x0180);
        assert_eq!(frame.sreg, 0x80);
        assert_eq!(frame.gp[1], 0);
    }
}

#[cfg(test)]
mod tick_timing_tests {
    use avr_rtos_port::config::{TICK_PERIOD_MS, TICK_RATE_HZ};
    use avr_rtos_port::tick::{compare_period_ms, timer0, timer3, wdt};

    #[test]
    fn test_watchdog_period_sequence() {
        // Steps 0..=7 double the period from 16 ms to 2048 ms.
        assert_eq!(wdt::period_ms(0), 16);
        assert_eq!(wdt::period_ms(1), 32);
        assert_eq!(wdt::period_ms(4), 256);
        assert_eq!(wdt::period_ms(7), 2048);
    }

    #[test]
    fn test_watchdog_rate_sequence() {
        assert_eq!(wdt::rate_hz(0), 62);
        assert_eq!(wdt::rate_hz(1), 31);
        assert_eq!(wdt::rate_hz(5), 1);
        // Below 1 Hz the truncated rate bottoms out at zero.
        assert_eq!(wdt::rate_hz(6), 0);
        assert_eq!(wdt::rate_hz(7), 0);
    }

    #[test]
    fn test_timer0_only_exact_combination() {
        assert_eq!(
            compare_period_ms(16_000_000, timer0::PRESCALER, timer0::COMPARE_TOP as u32),
            16
        );
    }

    #[test]
    fn test_timer3_tops_for_all_clocks() {
        for clock in [8_000_000u32, 16_000_000, 32_000_000] {
            let top = timer3::compare_top(clock) as u32;
            assert_eq!(compare_period_ms(clock, timer3::PRESCALER, top), 16);
        }
        assert_eq!(timer3::compare_top(32_000_000), 63_999);
        assert_eq!(timer3::compare_top(16_000_000), 31_999);
        assert_eq!(timer3::compare_top(8_000_000), 15_999);
    }

    #[test]
    fn test_declared_period_matches_rate() {
        // The default build mode uses the 15 ms watchdog step.
        assert_eq!(TICK_PERIOD_MS, 16);
        assert_eq!(TICK_RATE_HZ, 62);
    }
}

#[cfg(test)]
mod delay_tests {
    use avr_rtos_port::config::TICK_PERIOD_MS;
    use avr_rtos_port::delay::{busy_wait_total_ms, delay_ms, split_delay};
    use portable_atomic::Ordering;

    #[test]
    fn test_split_delay_identity() {
        for ms in [0u32, 1, 15, 16, 17, 35, 100, 2048, 65_535, 2_000_000, u32::MAX] {
            let (ticks, rest) = split_delay(ms);
            assert_eq!(ticks * TICK_PERIOD_MS + rest, ms);
            assert!(rest < TICK_PERIOD_MS);
        }
    }

    #[test]
    fn test_split_delay_exact_beyond_counter_width() {
        // The quotient must survive even when it exceeds a 16-bit tick
        // counter; splitting never truncates.
        assert_eq!(split_delay(2_000_000), (125_000, 0));
        assert_eq!(split_delay(2_000_007), (125_000, 7));
    }

    #[test]
    fn test_delay_splits_between_kernel_and_spin() {
        let _lock = super::lock_global();
        let ticks_before = super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst);
        let spin_before = busy_wait_total_ms();

        // 35 ms over a 16 ms tick: two whole ticks plus 3 ms of spinning.
        delay_ms(35);
        assert_eq!(super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst) - ticks_before, 2);
        assert_eq!(busy_wait_total_ms() - spin_before, 3);
    }

    #[test]
    fn test_sub_tick_delay_never_reaches_kernel() {
        let _lock = super::lock_global();
        let ticks_before = super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst);
        let spin_before = busy_wait_total_ms();

        delay_ms(5);
        assert_eq!(super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst), ticks_before);
        assert_eq!(busy_wait_total_ms() - spin_before, 5);
    }

    #[test]
    fn test_long_delay_reaches_kernel_in_full() {
        let _lock = super::lock_global();
        let ticks_before = super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst);
        let spin_before = busy_wait_total_ms();

        // 2 000 000 ms is 125 000 whole ticks: more than a 16-bit tick
        // counter can carry at once, so the kernel may see it in chunks,
        // but the chunks must sum to the full count.
        delay_ms(2_000_000);
        assert_eq!(
            super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst) - ticks_before,
            125_000
        );
        assert_eq!(busy_wait_total_ms(), spin_before);
    }

    #[test]
    fn test_whole_tick_delay_never_spins() {
        let _lock = super::lock_global();
        let ticks_before = super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst);
        let spin_before = busy_wait_total_ms();

        delay_ms(32);
        assert_eq!(super::DELAY_TICKS_TOTAL.load(Ordering::SeqCst) - ticks_before, 2);
        assert_eq!(busy_wait_total_ms(), spin_before);
    }
}

#[cfg(test)]
mod tick_dispatch_tests {
    use avr_rtos_port::tick::port_tick_entry;
    use portable_atomic::Ordering;

    #[test]
    fn test_switch_only_when_reschedule_due() {
        let _lock = super::lock_global();
        let ticks_before = super::TICKS.load(Ordering::SeqCst);
        let switches_before = super::SWITCHES.load(Ordering::SeqCst);

        // Ticks that unblock nothing skip task selection entirely.
        super::RESCHEDULE.store(false, Ordering::SeqCst);
        for _ in 0..5 {
            port_tick_entry();
        }
        assert_eq!(super::TICKS.load(Ordering::SeqCst) - ticks_before, 5);
        assert_eq!(super::SWITCHES.load(Ordering::SeqCst), switches_before);

        // A due reschedule runs selection exactly once per tick.
        super::RESCHEDULE.store(true, Ordering::SeqCst);
        port_tick_entry();
        assert_eq!(super::TICKS.load(Ordering::SeqCst) - ticks_before, 6);
        assert_eq!(super::SWITCHES.load(Ordering::SeqCst) - switches_before, 1);

        super::RESCHEDULE.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_cooperative_tick_never_selects() {
        let _lock = super::lock_global();
        let ticks_before = super::TICKS.load(Ordering::SeqCst);
        let switches_before = super::SWITCHES.load(Ordering::SeqCst);

        // The cooperative path only advances time: no selection happens
        // even when the kernel reports a reschedule as due.
        super::RESCHEDULE.store(true, Ordering::SeqCst);
        for _ in 0..3 {
            avr_rtos_port::tick::tick_cooperative();
        }
        assert_eq!(super::TICKS.load(Ordering::SeqCst) - ticks_before, 3);
        assert_eq!(super::SWITCHES.load(Ordering::SeqCst), switches_before);

        super::RESCHEDULE.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod yield_tests {
    use avr_rtos_port::{yield_from_isr, yield_now};
    use portable_atomic::Ordering;

    #[test]
    fn test_yield_runs_selection_once() {
        let _lock = super::lock_global();
        let before = super::SWITCHES.load(Ordering::SeqCst);

        yield_now();
        assert_eq!(super::SWITCHES.load(Ordering::SeqCst) - before, 1);

        yield_from_isr();
        assert_eq!(super::SWITCHES.load(Ordering::SeqCst) - before, 2);
    }
}

#[cfg(test)]
mod compare_match_tests {
    use avr_rtos_port::tick::{timer0, timer3};

    #[test]
    fn test_spurious_timer0_entry_suppressed() {
        // A shared vector line can fire without a pending match; only a
        // raised flag counts, and polling consumes it.
        timer0::raise_compare_match();
        assert!(timer0::poll_interrupt_flag());
        assert!(!timer0::poll_interrupt_flag());
    }

    #[test]
    fn test_spurious_timer3_entry_suppressed() {
        timer3::raise_compare_match();
        assert!(timer3::poll_interrupt_flag());
        assert!(!timer3::poll_interrupt_flag());
    }
}

#[cfg(test)]
mod critical_section_tests {
    use avr_rtos_port::critical::{interrupts_enabled, InterruptGuard};
    use avr_rtos_port::critical_section;

    #[test]
    fn test_nested_guards_restore_captured_state() {
        let _lock = super::lock_global();
        let initial = interrupts_enabled();

        let outer = InterruptGuard::enter();
        assert!(!interrupts_enabled());

        let inner = InterruptGuard::enter();
        assert!(!interrupts_enabled());

        // The inner exit restores a disabled capture: still off.
        drop(inner);
        assert!(!interrupts_enabled());

        // The outer exit restores whatever held before entry.
        drop(outer);
        assert_eq!(interrupts_enabled(), initial);
    }

    #[test]
    fn test_closure_form_restores_state() {
        let _lock = super::lock_global();
        let initial = interrupts_enabled();

        let value = critical_section(|_cs| {
            assert!(!interrupts_enabled());
            critical_section(|_cs| {
                assert!(!interrupts_enabled());
            });
            assert!(!interrupts_enabled());
            17
        });

        assert_eq!(value, 17);
        assert_eq!(interrupts_enabled(), initial);
    }
}

#[cfg(test)]
mod kernel_cell_tests {
    use avr_rtos_port::kernel::{current_task, set_current_task, SavedStackPtr};

    #[test]
    fn test_saved_sp_cell_round_trip() {
        let _lock = super::lock_global();

        let cell = SavedStackPtr::new();
        unsafe {
            assert!(cell.read().is_null());
            cell.write(0x0420 as *mut u8);
            assert_eq!(cell.read(), 0x0420 as *mut u8);

            set_current_task(&cell);
            assert_eq!(current_task(), &cell as *const SavedStackPtr);
            set_current_task(core::ptr::null());
        }
    }
}

#[cfg(test)]
mod scheduler_tests {
    use avr_rtos_port::kernel::{set_current_task, SavedStackPtr};
    use avr_rtos_port::scheduler::{end_scheduler, is_scheduler_started, start_scheduler};
    use avr_rtos_port::tick;
    use avr_rtos_port::PortError;

    static TASK_CELL: SavedStackPtr = SavedStackPtr::new();

    #[test]
    fn test_scheduler_lifecycle() {
        let _lock = super::lock_global();

        // Stopping before starting is an error.
        assert_eq!(end_scheduler(), Err(PortError::NotStarted));

        // Starting with no task selected is refused and leaves the
        // scheduler stopped.
        assert_eq!(start_scheduler(), Err(PortError::NoTaskSelected));
        assert!(!is_scheduler_started());

        unsafe { set_current_task(&TASK_CELL) };

        // On the host the launch itself panics after the tick source is
        // armed; the started flag and tick configuration survive it.
        let launch = std::panic::catch_unwind(|| {
            let _ = start_scheduler();
        });
        assert!(launch.is_err());
        assert!(is_scheduler_started());
        assert!(tick::is_configured());

        assert_eq!(start_scheduler(), Err(PortError::AlreadyStarted));

        assert_eq!(end_scheduler(), Ok(()));
        assert!(!is_scheduler_started());
        assert!(!tick::is_configured());

        unsafe { set_current_task(core::ptr::null()) };
    }
}

#[cfg(test)]
mod fatal_hook_tests {
    use avr_rtos_port::hooks::{fatal, FatalSignal};
    use avr_rtos_port::port_assert;

    #[test]
    #[should_panic(expected = "StackOverflow")]
    fn test_fatal_names_the_signal() {
        let _lock = super::lock_global();
        fatal(FatalSignal::StackOverflow);
    }

    #[test]
    fn test_port_assert_passes_on_true() {
        port_assert!(1 + 1 == 2);
    }

    #[test]
    fn test_hook_panic_unwinds_into_caller() {
        // The hook symbols are "C-unwind": the host default's panic must
        // come back through them as a catchable unwind, not an abort.
        let _lock = super::lock_global();
        let outcome = std::panic::catch_unwind(|| fatal(FatalSignal::AllocationFailure));
        assert!(outcome.is_err());
    }

    #[test]
    #[should_panic(expected = "AssertionFailure")]
    fn test_port_assert_routes_to_hook() {
        let _lock = super::lock_global();
        port_assert!(false);
    }
}
