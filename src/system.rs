//! # Computer Assembly
//!
//! [`Computer`] wires one of each part together the way the breadboard does:
//!
//! ```text
//!   ClockGenerator --CLOCK--> Bus <--------------------- Cpu
//!                              ^                          |
//!                              |                   AddressDecoder
//!                    RamChip monitor  RomChip monitor     |
//!                              \___________/______________/
//! ```
//!
//! The CPU reaches memory through the decoder (RAM window first, ROM window
//! second); each chip also runs its own pin monitor for external drivers.
//! [`Computer::start`] starts the oscillator, both chip monitors and the CPU
//! instruction loop, then powers the CPU on. [`Computer::shutdown`] (or
//! dropping the computer) stops and joins every loop, CPU first.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use sim65c02::{Computer, RomImage, SystemConfig};
//! use sim65c02::diagnostics::tracing_sink;
//!
//! let config = SystemConfig::default();
//! let image = RomImage::with_program(0x8000, 0x8000, &[0xA9, 0x42, 0x00]).unwrap();
//!
//! let mut computer = Computer::assemble(config, image, tracing_sink()).unwrap();
//! computer.start().unwrap();
//! assert!(computer.wait_for_halt(Duration::from_secs(5)));
//! assert_eq!(computer.with_cpu(|cpu| cpu.a()), 0x42);
//! assert!(computer.shutdown());
//! ```

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::bus::{Bus, BusError};
use crate::clock::ClockGenerator;
use crate::component::ComponentHandle;
use crate::config::{ConfigError, SystemConfig};
use crate::cpu::{Cpu, CpuState};
use crate::decoder::AddressDecoder;
use crate::devices::{self, RamChip, RomChip};
use crate::diagnostics::Diagnostics;
use crate::image::RomImage;

const COMPONENT: &str = "system";

/// Bus owner ids of the two memory chips.
const RAM_ID: u8 = 0;
const ROM_ID: u8 = 1;

/// Errors raised while assembling or starting a computer.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("ROM image is {actual} bytes, the ROM chip holds {expected}")]
    ImageSize { expected: usize, actual: usize },

    #[error("ROM image is based at 0x{actual:04X}, the ROM window starts at 0x{expected:04X}")]
    ImageBase { expected: u16, actual: u16 },

    #[error("failed to start component thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A complete simulated computer.
pub struct Computer {
    config: SystemConfig,
    diagnostics: Arc<dyn Diagnostics>,
    bus: Arc<Bus>,
    ram: Arc<RamChip>,
    rom: Arc<RomChip>,
    decoder: Arc<AddressDecoder>,
    clock: Arc<ClockGenerator>,
    cpu: Arc<Mutex<Cpu>>,
    handles: Vec<ComponentHandle>,
}

impl Computer {
    /// Builds every part from `config` and programs the ROM with `image`.
    ///
    /// Nothing runs until [`Computer::start`].
    ///
    /// # Errors
    ///
    /// - [`SystemError::Config`] if `config` does not validate
    /// - [`SystemError::ImageSize`] / [`SystemError::ImageBase`] if `image`
    ///   does not match the configured ROM
    pub fn assemble(
        config: SystemConfig,
        image: RomImage,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, SystemError> {
        config.validate()?;
        if image.capacity() != config.rom_capacity {
            return Err(SystemError::ImageSize {
                expected: config.rom_capacity,
                actual: image.capacity(),
            });
        }
        if image.base() != config.rom_start {
            return Err(SystemError::ImageBase {
                expected: config.rom_start,
                actual: image.base(),
            });
        }

        let bus = Arc::new(Bus::with_width(config.bus_width)?);
        let ram = Arc::new(RamChip::new(
            RAM_ID,
            config.ram_capacity,
            Arc::clone(&diagnostics),
        ));
        let rom = Arc::new(RomChip::from_image(ROM_ID, image, Arc::clone(&diagnostics)));

        let mut decoder = AddressDecoder::new(Arc::clone(&diagnostics));
        decoder.add_mapping(config.ram_start, config.ram_end, ram.clone());
        decoder.add_mapping(config.rom_start, config.rom_end, rom.clone());
        let decoder = Arc::new(decoder);

        let clock = Arc::new(ClockGenerator::new(
            config.clock_hz,
            config.clock_mode,
            Arc::clone(&diagnostics),
        ));
        clock.attach_bus(Arc::clone(&bus));

        let cpu = Cpu::new(
            Arc::clone(&bus),
            Arc::clone(&decoder),
            Arc::clone(&diagnostics),
        )
        .with_bus_timeout(config.timing.bus_timeout());

        diagnostics.info(
            COMPONENT,
            &format!(
                "Assembled: RAM 0x{:04X}-0x{:04X}, ROM 0x{:04X}-0x{:04X}, clock {} Hz",
                config.ram_start, config.ram_end, config.rom_start, config.rom_end, config.clock_hz
            ),
        );

        Ok(Self {
            config,
            diagnostics,
            bus,
            ram,
            rom,
            decoder,
            clock,
            cpu: Arc::new(Mutex::new(cpu)),
            handles: Vec::new(),
        })
    }

    /// Starts every component loop and powers the CPU on.
    ///
    /// Calling `start` on a running computer does nothing.
    pub fn start(&mut self) -> Result<(), SystemError> {
        if !self.handles.is_empty() {
            return Ok(());
        }
        let timing = self.config.timing;

        self.handles.push(self.clock.start(timing)?);
        self.handles.push(devices::spawn_monitor(
            self.ram.clone(),
            Arc::clone(&self.bus),
            timing,
        )?);
        self.handles.push(devices::spawn_monitor(
            self.rom.clone(),
            Arc::clone(&self.bus),
            timing,
        )?);

        self.lock_cpu().power_on();
        self.handles.push(Cpu::spawn(&self.cpu, timing)?);
        Ok(())
    }

    /// Waits until the CPU halts. Returns `false` if `timeout` elapses first.
    pub fn wait_for_halt(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.lock_cpu().state() == CpuState::Halted {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Stops and joins every component loop, CPU first.
    ///
    /// Returns `false` if any loop had panicked.
    pub fn shutdown(&mut self) -> bool {
        if self.handles.is_empty() {
            return true;
        }
        for handle in self.handles.iter().rev() {
            handle.request_stop();
        }
        let mut clean = true;
        while let Some(handle) = self.handles.pop() {
            clean &= handle.stop();
        }
        self.diagnostics.info(COMPONENT, "All components stopped");
        clean
    }

    /// True while the component loops are started.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Runs `f` with the CPU locked.
    pub fn with_cpu<R>(&self, f: impl FnOnce(&mut Cpu) -> R) -> R {
        f(&mut self.lock_cpu())
    }

    fn lock_cpu(&self) -> MutexGuard<'_, Cpu> {
        self.cpu.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Accessors ==========

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn cpu(&self) -> &Arc<Mutex<Cpu>> {
        &self.cpu
    }

    pub fn ram(&self) -> &Arc<RamChip> {
        &self.ram
    }

    pub fn rom(&self) -> &Arc<RomChip> {
        &self.rom
    }

    pub fn decoder(&self) -> &Arc<AddressDecoder> {
        &self.decoder
    }

    pub fn clock(&self) -> &Arc<ClockGenerator> {
        &self.clock
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }
}

impl Drop for Computer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::tracing_sink;

    fn image(code: &[u8]) -> RomImage {
        RomImage::with_program(0x8000, 0x8000, code).unwrap()
    }

    #[test]
    fn test_assemble_wires_decoder() {
        let computer =
            Computer::assemble(SystemConfig::default(), image(&[0xEA]), tracing_sink()).unwrap();

        let mappings = computer.decoder().mappings();
        assert_eq!(mappings.len(), 2);
        assert_eq!((mappings[0].start, mappings[0].end), (0x0000, 0x3FFF));
        assert_eq!((mappings[1].start, mappings[1].end), (0x8000, 0xFFFF));
        assert_eq!(computer.decoder().read(0x8000), 0xEA);
        assert_eq!(computer.bus().width(), 32);
        assert!(!computer.is_running());
        assert_eq!(computer.with_cpu(|cpu| cpu.state()), CpuState::PowerOff);
    }

    #[test]
    fn test_assemble_rejects_mismatched_image() {
        let small = RomImage::new(0xC000, 0x4000);
        assert!(matches!(
            Computer::assemble(SystemConfig::default(), small, tracing_sink()),
            Err(SystemError::ImageSize {
                expected: 0x8000,
                actual: 0x4000
            })
        ));

        let shifted = RomImage::new(0x0000, 0x8000);
        assert!(matches!(
            Computer::assemble(SystemConfig::default(), shifted, tracing_sink()),
            Err(SystemError::ImageBase { .. })
        ));
    }

    #[test]
    fn test_assemble_rejects_invalid_config() {
        let mut config = SystemConfig::default();
        config.clock_hz = -1.0;
        assert!(matches!(
            Computer::assemble(config, image(&[]), tracing_sink()),
            Err(SystemError::Config(ConfigError::InvalidClockSpeed(_)))
        ));
    }

    #[test]
    fn test_shutdown_without_start() {
        let mut computer =
            Computer::assemble(SystemConfig::default(), image(&[0x00]), tracing_sink()).unwrap();
        assert!(computer.shutdown());
    }
}
