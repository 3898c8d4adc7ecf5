//! Compile-time configuration of the port layer
//!
//! The build mode is a pair {scheduling policy} x {tick source}, refined by
//! the tick source's sub-parameters (watchdog prescale step, or MCU clock
//! for the compare timers). Exactly one consistent combination must be
//! selected through cargo features; anything missing or contradictory is
//! rejected here, at compile time, never at runtime.

use crate::frame::PcWidth;

// ============ Selection consistency ============

#[cfg(all(feature = "preemptive", feature = "cooperative"))]
compile_error!("features `preemptive` and `cooperative` are mutually exclusive");
#[cfg(not(any(feature = "preemptive", feature = "cooperative")))]
compile_error!("a scheduling policy must be selected: `preemptive` or `cooperative`");

#[cfg(any(
    all(feature = "tick-wdt", feature = "tick-timer0"),
    all(feature = "tick-wdt", feature = "tick-timer3"),
    all(feature = "tick-timer0", feature = "tick-timer3"),
))]
compile_error!("only one tick source may be selected");
#[cfg(not(any(feature = "tick-wdt", feature = "tick-timer0", feature = "tick-timer3")))]
compile_error!("a tick source must be selected: `tick-wdt`, `tick-timer0` or `tick-timer3`");

#[cfg(any(
    all(feature = "clock-8mhz", feature = "clock-16mhz"),
    all(feature = "clock-8mhz", feature = "clock-32mhz"),
    all(feature = "clock-16mhz", feature = "clock-32mhz"),
))]
compile_error!("only one MCU clock may be selected");
#[cfg(not(any(feature = "clock-8mhz", feature = "clock-16mhz", feature = "clock-32mhz")))]
compile_error!("an MCU clock must be selected: `clock-8mhz`, `clock-16mhz` or `clock-32mhz`");

#[cfg(all(feature = "atmega328p", feature = "atmega2560"))]
compile_error!("only one target device may be selected");
#[cfg(not(any(feature = "atmega328p", feature = "atmega2560")))]
compile_error!("a target device must be selected: `atmega328p` or `atmega2560`");

// The 8-bit timer supports one fixed prescaler/top combination, valid for a
// 16 MHz clock only.
#[cfg(all(feature = "tick-timer0", not(feature = "clock-16mhz")))]
compile_error!("`tick-timer0` supports a 16 MHz MCU clock only");

// Timer 3 exists on the ATmega2560 class of devices.
#[cfg(all(feature = "tick-timer3", feature = "atmega328p"))]
compile_error!("`tick-timer3` requires the `atmega2560` device");

#[cfg(all(feature = "tick-wdt", not(any(
    feature = "wdto-15ms", feature = "wdto-30ms", feature = "wdto-60ms",
    feature = "wdto-120ms", feature = "wdto-250ms", feature = "wdto-500ms",
    feature = "wdto-1000ms", feature = "wdto-2000ms",
))))]
compile_error!("`tick-wdt` requires a watchdog step: one of the `wdto-*` features");

// ============ Clock ============

/// MCU clock frequency in Hz.
#[cfg(feature = "clock-8mhz")]
pub const CPU_CLOCK_HZ: u32 = 8_000_000;
/// MCU clock frequency in Hz.
#[cfg(feature = "clock-16mhz")]
pub const CPU_CLOCK_HZ: u32 = 16_000_000;
/// MCU clock frequency in Hz.
#[cfg(feature = "clock-32mhz")]
pub const CPU_CLOCK_HZ: u32 = 32_000_000;

// ============ Watchdog step ============

/// Watchdog prescale step, 0..=7. Step n selects 2048 << n watchdog
/// oscillator cycles per tick.
#[cfg(feature = "wdto-15ms")]
pub const WDT_PRESCALE_STEP: u8 = 0;
#[cfg(feature = "wdto-30ms")]
pub const WDT_PRESCALE_STEP: u8 = 1;
#[cfg(feature = "wdto-60ms")]
pub const WDT_PRESCALE_STEP: u8 = 2;
#[cfg(feature = "wdto-120ms")]
pub const WDT_PRESCALE_STEP: u8 = 3;
#[cfg(feature = "wdto-250ms")]
pub const WDT_PRESCALE_STEP: u8 = 4;
#[cfg(feature = "wdto-500ms")]
pub const WDT_PRESCALE_STEP: u8 = 5;
#[cfg(feature = "wdto-1000ms")]
pub const WDT_PRESCALE_STEP: u8 = 6;
#[cfg(feature = "wdto-2000ms")]
pub const WDT_PRESCALE_STEP: u8 = 7;

// A step selected without the watchdog source is a stale feature set left
// over from a source change; reject it rather than silently ignoring it.
#[cfg(all(not(feature = "tick-wdt"), any(
    feature = "wdto-15ms", feature = "wdto-30ms", feature = "wdto-60ms",
    feature = "wdto-120ms", feature = "wdto-250ms", feature = "wdto-500ms",
    feature = "wdto-1000ms", feature = "wdto-2000ms",
)))]
compile_error!("`wdto-*` features are only meaningful with `tick-wdt`");

#[cfg(feature = "tick-wdt")]
const _: () = assert!(WDT_PRESCALE_STEP <= 7, "watchdog step out of range");

// ============ Nominal tick period ============

/// Declared nominal tick period in milliseconds.
///
/// Each tick source module re-derives the period from its own prescaler and
/// compare value and const-asserts that it matches this declaration, so a
/// disagreement is a build failure.
#[cfg(feature = "tick-wdt")]
pub const TICK_PERIOD_MS: u32 = 1 << (WDT_PRESCALE_STEP + 4);
/// Declared nominal tick period in milliseconds.
#[cfg(any(feature = "tick-timer0", feature = "tick-timer3"))]
pub const TICK_PERIOD_MS: u32 = 16;

/// Nominal tick rate in Hz, truncated to an integer.
///
/// The period constant is the exact one; this rate exists for coarse
/// configuration arithmetic in the kernel core (62 for the 16 ms period,
/// where the true rate is 62.5 Hz). Watchdog steps 6 and 7 tick below
/// 1 Hz, so this truncates to 0 there: never divide by this constant,
/// divide by [`TICK_PERIOD_MS`] instead.
#[cfg(feature = "tick-wdt")]
pub const TICK_RATE_HZ: u32 = 128_000 >> (WDT_PRESCALE_STEP + 11);
/// Nominal tick rate in Hz, truncated to an integer.
#[cfg(any(feature = "tick-timer0", feature = "tick-timer3"))]
pub const TICK_RATE_HZ: u32 = 1000 / TICK_PERIOD_MS;

// ============ Saved frame variant ============

/// Program counter width of the saved frame, resolved once from the device
/// selection. The ATmega2560 has a 17-bit program counter: code addresses
/// on its stack take three bytes, and RAMPZ/EIND join the saved context.
#[cfg(feature = "atmega2560")]
pub const PC_WIDTH: PcWidth = PcWidth::ThreeByte;
/// Program counter width of the saved frame.
#[cfg(not(feature = "atmega2560"))]
pub const PC_WIDTH: PcWidth = PcWidth::TwoByte;
