//! # Clock Generator
//!
//! A 555-style timer with two modes:
//!
//! - **Astable** ([`ClockGenerator::sasm`]): free-running. The oscillator loop
//!   started by [`ClockGenerator::start`] toggles the output every half period
//!   `1 / (2 * speed_hz)`, producing a square wave at `speed_hz`.
//! - **Monostable** ([`ClockGenerator::smsm`]): the oscillator loop idles and
//!   the output only changes on an explicit [`ClockGenerator::step`].
//!
//! A speed change is picked up on the next half period. When attached to a
//! bus the output is mirrored onto [`line::CLOCK`], where the CPU samples it
//! as PHI0.
//!
//! # Example
//!
//! ```rust
//! use sim65c02::clock::{ClockGenerator, ClockMode};
//! use sim65c02::diagnostics::tracing_sink;
//!
//! let clock = ClockGenerator::new(10.0, ClockMode::Monostable, tracing_sink());
//! assert!(!clock.clk_pin());
//!
//! clock.step();
//! assert!(clock.clk_pin());
//! assert_eq!(clock.rising_edges(), 1);
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::{line, Bus};
use crate::component::{self, ComponentHandle};
use crate::config::Timing;
use crate::diagnostics::Diagnostics;

const COMPONENT: &str = "clock";

/// Speed used when a non-positive or non-finite speed is supplied.
pub const DEFAULT_SPEED_HZ: f32 = 1000.0;

/// Operating mode of the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Free-running square wave.
    #[default]
    Astable,
    /// Output changes only on [`ClockGenerator::step`].
    Monostable,
}

impl ClockMode {
    fn to_u8(self) -> u8 {
        match self {
            ClockMode::Astable => 0,
            ClockMode::Monostable => 1,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClockMode::Astable,
            _ => ClockMode::Monostable,
        }
    }
}

/// The system's timing source.
pub struct ClockGenerator {
    speed_bits: AtomicU32,
    mode: AtomicU8,
    clk: AtomicBool,
    rising_edges: AtomicU64,
    bus: Mutex<Option<Arc<Bus>>>,
    diagnostics: Arc<dyn Diagnostics>,
}

fn valid_speed(hz: f32) -> bool {
    hz.is_finite() && hz > 0.0
}

impl ClockGenerator {
    /// Creates a stopped clock with its output low.
    ///
    /// An invalid `speed_hz` (zero, negative or not finite) is replaced with
    /// [`DEFAULT_SPEED_HZ`] and reported as a warning.
    pub fn new(speed_hz: f32, mode: ClockMode, diagnostics: Arc<dyn Diagnostics>) -> Self {
        let speed = if valid_speed(speed_hz) {
            speed_hz
        } else {
            diagnostics.warning(
                COMPONENT,
                &format!("Invalid speed {speed_hz} Hz, using {DEFAULT_SPEED_HZ} Hz"),
            );
            DEFAULT_SPEED_HZ
        };
        Self {
            speed_bits: AtomicU32::new(speed.to_bits()),
            mode: AtomicU8::new(mode.to_u8()),
            clk: AtomicBool::new(false),
            rising_edges: AtomicU64::new(0),
            bus: Mutex::new(None),
            diagnostics,
        }
    }

    /// Mirrors the output onto `bus`'s clock line from now on.
    pub fn attach_bus(&self, bus: Arc<Bus>) {
        let mut attached = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        bus.set_pin(line::CLOCK, self.clk_pin());
        *attached = Some(bus);
    }

    /// Toggles the output once.
    ///
    /// The toggle and the bus mirror happen under one lock, so concurrent
    /// steps leave `line::CLOCK` equal to [`ClockGenerator::clk_pin`].
    pub fn step(&self) {
        let attached = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        let level = !self.clk.fetch_xor(true, Ordering::AcqRel);
        if level {
            self.rising_edges.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(bus) = attached.as_ref() {
            bus.set_pin(line::CLOCK, level);
        }
    }

    /// Switches to astable (free-running) mode.
    pub fn sasm(&self) {
        self.mode.store(ClockMode::Astable.to_u8(), Ordering::Release);
    }

    /// Switches to monostable (manual step) mode.
    pub fn smsm(&self) {
        self.mode.store(ClockMode::Monostable.to_u8(), Ordering::Release);
    }

    pub fn mode(&self) -> ClockMode {
        ClockMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Sets the astable frequency. Invalid speeds are ignored with a warning.
    pub fn set_speed(&self, hz: f32) {
        if !valid_speed(hz) {
            self.diagnostics
                .warning(COMPONENT, &format!("Ignoring invalid speed {hz} Hz"));
            return;
        }
        self.speed_bits.store(hz.to_bits(), Ordering::Release);
    }

    pub fn get_speed(&self) -> f32 {
        f32::from_bits(self.speed_bits.load(Ordering::Acquire))
    }

    /// Current output level.
    pub fn clk_pin(&self) -> bool {
        self.clk.load(Ordering::Acquire)
    }

    /// Number of low-to-high transitions since creation.
    pub fn rising_edges(&self) -> u64 {
        self.rising_edges.load(Ordering::Relaxed)
    }

    /// Half of one period at the current speed.
    pub fn half_period(&self) -> Duration {
        Duration::try_from_secs_f32(1.0 / (2.0 * self.get_speed()))
            .unwrap_or(Duration::from_millis(1))
    }

    /// Starts the oscillator loop.
    ///
    /// In astable mode the loop toggles the output every half period; in
    /// monostable mode it sleeps `timing.clock_idle_poll()` and rechecks the
    /// mode.
    pub fn start(self: &Arc<Self>, timing: Timing) -> io::Result<ComponentHandle> {
        let clock = Arc::clone(self);
        component::spawn(COMPONENT, move |flag| {
            clock.diagnostics.info(
                COMPONENT,
                &format!("Oscillator started at {} Hz", clock.get_speed()),
            );
            while flag.is_running() {
                match clock.mode() {
                    ClockMode::Astable => {
                        clock.step();
                        flag.sleep(clock.half_period());
                    }
                    ClockMode::Monostable => {
                        flag.sleep(timing.clock_idle_poll());
                    }
                }
            }
            clock.diagnostics.info(COMPONENT, "Oscillator stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{tracing_sink, CapturedDiagnostics, Severity};

    #[test]
    fn test_step_toggles_and_counts_rising_edges() {
        let clock = ClockGenerator::new(1.0, ClockMode::Monostable, tracing_sink());
        for _ in 0..5 {
            clock.step();
        }
        assert!(clock.clk_pin());
        assert_eq!(clock.rising_edges(), 3);
    }

    #[test]
    fn test_mode_switching() {
        let clock = ClockGenerator::new(1.0, ClockMode::Astable, tracing_sink());
        assert_eq!(clock.mode(), ClockMode::Astable);
        clock.smsm();
        assert_eq!(clock.mode(), ClockMode::Monostable);
        clock.sasm();
        assert_eq!(clock.mode(), ClockMode::Astable);
    }

    #[test]
    fn test_speed_and_half_period() {
        let clock = ClockGenerator::new(10.0, ClockMode::Monostable, tracing_sink());
        assert_eq!(clock.get_speed(), 10.0);
        assert_eq!(clock.half_period(), Duration::from_millis(50));

        clock.set_speed(500.0);
        assert_eq!(clock.get_speed(), 500.0);
        assert_eq!(clock.half_period(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_speeds_rejected() {
        let sink = Arc::new(CapturedDiagnostics::new());
        let clock = ClockGenerator::new(0.0, ClockMode::Monostable, sink.clone());
        assert_eq!(clock.get_speed(), DEFAULT_SPEED_HZ);

        clock.set_speed(-5.0);
        clock.set_speed(f32::NAN);
        assert_eq!(clock.get_speed(), DEFAULT_SPEED_HZ);
        assert_eq!(sink.count(Severity::Warning), 3);
    }

    #[test]
    fn test_attached_bus_follows_output() {
        let bus = Arc::new(Bus::new());
        let clock = ClockGenerator::new(1.0, ClockMode::Monostable, tracing_sink());
        clock.attach_bus(Arc::clone(&bus));

        assert!(!bus.get_pin(line::CLOCK));
        clock.step();
        assert!(bus.get_pin(line::CLOCK));
        clock.step();
        assert!(!bus.get_pin(line::CLOCK));
    }
}
