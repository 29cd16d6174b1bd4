//! # CPU State and Execution
//!
//! This module contains the [`Cpu`] struct representing the 65C02 processor
//! state and its fetch-decode-execute state machine.
//!
//! ## CPU State
//!
//! The CPU maintains:
//! - **Registers**: Accumulator (A), index registers (X, Y)
//! - **Program counter** (PC): 16-bit address of next instruction
//! - **Stack pointer** (SP): 8-bit offset into stack page (0x0100-0x01FF)
//! - **Status flags**: N, V, B, D, I, Z, C (individual bool fields)
//! - **Pins**: address, data, RWB, SYNC, RDY, IRQB, NMIB, RESB, PHI0
//! - **Execution state**: [`CpuState`]
//!
//! ## State Machine
//!
//! ```text
//! PowerOff -> PowerOn -> Reset -> Running <-> Halted
//! ```
//!
//! [`Cpu::power_on`] runs the reset sequence and enters `Running`. `Reset` is
//! transient: [`Cpu::reset`] restores whatever state was current before it.
//! BRK, STP, unimplemented opcodes and fetches from unmapped addresses move
//! the CPU to `Halted`; the only way back is a reset through the RESB line.
//!
//! ## Bus Transactions
//!
//! Every instruction runs inside a single bus transaction: [`Cpu::step`]
//! acquires the bus, performs all of the instruction's memory accesses
//! through the address decoder, mirrors each access onto the bus lines, and
//! releases the bus. If the bus cannot be acquired in time the instruction is
//! skipped without side effects and [`Step::BusBusy`] is returned; it is
//! retried on the next dispatch.
//!
//! ## Clocked Execution
//!
//! [`Cpu::tick`] is one iteration of the instruction loop: it samples the
//! bus clock line into PHI0 and dispatches at most one instruction per high
//! phase. [`Cpu::spawn`] runs `tick` on its own thread.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::addressing::AddressingMode;
use crate::bus::{line, Bus, BusGuard, BusOwner};
use crate::component::{self, ComponentHandle};
use crate::config::Timing;
use crate::decoder::AddressDecoder;
use crate::diagnostics::{Diagnostics, Severity};
use crate::image::RESET_VECTOR;
use crate::instructions;
use crate::pins::Pins;
use crate::{ExecutionError, OpcodeMetadata, OPCODE_TABLE};

/// Part name used in diagnostics.
pub const PART_NAME: &str = "W65C02S";

/// Base address of the hardware stack page.
pub const STACK_BASE: u16 = 0x0100;

/// Default time the CPU waits for the bus before deferring an instruction.
pub const DEFAULT_BUS_TIMEOUT: Duration = Duration::from_millis(100);

/// Execution state of the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    PowerOff,
    PowerOn,
    Reset,
    Running,
    Halted,
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One instruction ran to completion.
    Executed { opcode: u8 },
    /// The bus could not be acquired; nothing changed.
    BusBusy,
    /// The CPU is halted.
    Halted,
    /// Nothing to do: powered off, RDY low, RESB held low, or waiting for the
    /// next clock phase.
    Idle,
}

// ========== CPU Pins ==========

/// Line positions within the CPU's pin word.
pub mod cpu_line {
    pub const ADDRESS: u8 = 0;
    pub const ADDRESS_WIDTH: u8 = 16;
    pub const DATA: u8 = 16;
    pub const DATA_WIDTH: u8 = 8;
    /// Read (high) / write (low).
    pub const RWB: u8 = 24;
    /// High during an opcode fetch.
    pub const SYNC: u8 = 25;
    /// Ready: execution pauses while low.
    pub const RDY: u8 = 26;
    /// Interrupt request, active low.
    pub const IRQB: u8 = 27;
    /// Non-maskable interrupt, active low.
    pub const NMIB: u8 = 28;
    /// Reset, active low.
    pub const RESB: u8 = 29;
    /// Phase 0 clock input.
    pub const PHI0: u8 = 30;
}

/// The CPU's pin state.
///
/// A fresh set has RDY, IRQB, NMIB, RESB and RWB high (inactive / read) and
/// everything else low. IRQB and NMIB are carried as lines only; interrupt
/// servicing is not part of the implemented instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuPins {
    pins: Pins,
}

impl CpuPins {
    pub fn new() -> Self {
        let mut pins = Pins::new();
        pins.set(cpu_line::RWB, true);
        pins.set(cpu_line::RDY, true);
        pins.set(cpu_line::IRQB, true);
        pins.set(cpu_line::NMIB, true);
        pins.set(cpu_line::RESB, true);
        Self { pins }
    }

    pub fn snapshot(&self) -> Pins {
        self.pins
    }

    pub fn address(&self) -> u16 {
        self.pins.field(cpu_line::ADDRESS, cpu_line::ADDRESS_WIDTH) as u16
    }

    pub fn data(&self) -> u8 {
        self.pins.field(cpu_line::DATA, cpu_line::DATA_WIDTH) as u8
    }

    pub fn rwb(&self) -> bool {
        self.pins.get(cpu_line::RWB)
    }

    pub fn sync(&self) -> bool {
        self.pins.get(cpu_line::SYNC)
    }

    pub fn rdy(&self) -> bool {
        self.pins.get(cpu_line::RDY)
    }

    pub fn irqb(&self) -> bool {
        self.pins.get(cpu_line::IRQB)
    }

    pub fn nmib(&self) -> bool {
        self.pins.get(cpu_line::NMIB)
    }

    pub fn resb(&self) -> bool {
        self.pins.get(cpu_line::RESB)
    }

    pub fn phi0(&self) -> bool {
        self.pins.get(cpu_line::PHI0)
    }

    fn set(&mut self, line: u8, level: bool) {
        self.pins.set(line, level);
    }

    fn latch(&mut self, addr: u16, value: u8, read: bool) {
        self.pins
            .set_field(cpu_line::ADDRESS, cpu_line::ADDRESS_WIDTH, u64::from(addr));
        self.pins
            .set_field(cpu_line::DATA, cpu_line::DATA_WIDTH, u64::from(value));
        self.pins.set(cpu_line::RWB, read);
    }
}

impl Default for CpuPins {
    fn default() -> Self {
        Self::new()
    }
}

// ========== CPU ==========

/// 65C02 CPU state and execution context.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sim65c02::devices::RomChip;
/// use sim65c02::diagnostics::tracing_sink;
/// use sim65c02::{AddressDecoder, Bus, Cpu, CpuState, RomImage};
///
/// let sink = tracing_sink();
/// let image = RomImage::with_program(0x8000, 0x8000, &[0xA9, 0x42, 0x00]).unwrap();
/// let rom = Arc::new(RomChip::from_image(1, image, sink.clone()));
///
/// let mut decoder = AddressDecoder::new(sink.clone());
/// decoder.add_mapping(0x8000, 0xFFFF, rom);
///
/// let mut cpu = Cpu::new(Arc::new(Bus::new()), Arc::new(decoder), sink);
/// cpu.power_on();
/// assert_eq!(cpu.pc(), 0x8000);
///
/// cpu.run_until_halt(10).unwrap();
/// assert_eq!(cpu.a(), 0x42);
/// assert_eq!(cpu.state(), CpuState::Halted);
/// ```
pub struct Cpu {
    /// Accumulator register
    pub(crate) a: u8,

    /// X index register
    pub(crate) x: u8,

    /// Y index register
    pub(crate) y: u8,

    /// Program counter (address of next instruction)
    pub(crate) pc: u16,

    /// Stack pointer (0x0100 + sp gives full stack address)
    pub(crate) sp: u8,

    pub(crate) flag_n: bool,
    pub(crate) flag_v: bool,
    pub(crate) flag_b: bool,
    pub(crate) flag_d: bool,
    pub(crate) flag_i: bool,
    pub(crate) flag_z: bool,
    pub(crate) flag_c: bool,

    /// Total CPU cycles executed
    pub(crate) cycles: u64,

    /// Instructions completed since power-on
    instructions: u64,

    pub(crate) state: CpuState,
    pins: CpuPins,

    /// Instruction already dispatched during the current PHI0 high phase
    dispatched: bool,
    /// RESB observed low and not yet released
    reset_held: bool,

    bus: Arc<Bus>,
    decoder: Arc<AddressDecoder>,
    diagnostics: Arc<dyn Diagnostics>,
    bus_timeout: Duration,
}

impl Cpu {
    /// Creates a powered-off CPU attached to `bus` and `decoder`.
    ///
    /// Registers are zero and SP is 0xFF until [`Cpu::power_on`] runs the
    /// reset sequence.
    pub fn new(
        bus: Arc<Bus>,
        decoder: Arc<AddressDecoder>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            a: 0x00,
            x: 0x00,
            y: 0x00,
            pc: 0x0000,
            sp: 0xFF,
            flag_n: false,
            flag_v: false,
            flag_b: false,
            flag_d: false,
            flag_i: true,
            flag_z: false,
            flag_c: false,
            cycles: 0,
            instructions: 0,
            state: CpuState::PowerOff,
            pins: CpuPins::new(),
            dispatched: false,
            reset_held: false,
            bus,
            decoder,
            diagnostics,
            bus_timeout: DEFAULT_BUS_TIMEOUT,
        }
    }

    /// Sets how long each instruction waits for the bus.
    pub fn with_bus_timeout(mut self, timeout: Duration) -> Self {
        self.bus_timeout = timeout;
        self
    }

    // ========== Lifecycle ==========

    /// Powers the CPU on: `PowerOn`, then the reset sequence, then `Running`.
    pub fn power_on(&mut self) {
        self.state = CpuState::PowerOn;
        self.diagnostics.info(PART_NAME, "Power on");
        self.reset();
        self.state = CpuState::Running;
    }

    /// Removes power. The instruction loop idles until the next power-on.
    pub fn power_off(&mut self) {
        self.state = CpuState::PowerOff;
        self.diagnostics.info(PART_NAME, "Power off");
    }

    /// Runs the reset sequence.
    ///
    /// Clears A, X, Y and every flag except I (set), sets SP to 0xFF, returns
    /// the pins to their idle levels and loads PC from the reset vector at
    /// 0xFFFC/0xFFFD (little-endian). If the bus cannot be acquired the
    /// vector is not read: an error is logged and PC falls back to 0x0000.
    ///
    /// The state in force before the call is restored afterwards.
    pub fn reset(&mut self) {
        let previous = self.state;
        self.state = CpuState::Reset;

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.set_status(0x00);
        self.flag_b = false;
        self.flag_i = true;
        self.sp = 0xFF;

        let phi0 = self.pins.phi0();
        self.pins = CpuPins::new();
        self.pins.set(cpu_line::PHI0, phi0);
        self.dispatched = false;

        let bus = Arc::clone(&self.bus);
        match bus.acquire(BusOwner::Cpu, self.bus_timeout) {
            Some(guard) => {
                self.pc = self.read_word(&guard, RESET_VECTOR);
                self.diagnostics.info(
                    PART_NAME,
                    &format!("Reset complete, PC set to 0x{:04X}", self.pc),
                );
            }
            None => {
                self.pc = 0x0000;
                self.diagnostics.error(
                    PART_NAME,
                    "Bus unavailable while reading reset vector, starting at 0x0000",
                );
            }
        }

        self.state = previous;
    }

    // ========== Execution ==========

    /// Executes one instruction if the CPU is running and RDY is high.
    ///
    /// # Returns
    ///
    /// - `Ok(Step::Executed { .. })` after an instruction completed
    /// - `Ok(Step::BusBusy)` if the bus could not be acquired; no state changed
    /// - `Ok(Step::Halted)` / `Ok(Step::Idle)` if nothing was executed
    /// - `Err(ExecutionError::UnmappedFetch { .. })` if no chip is mapped at
    ///   PC; the CPU is then halted
    /// - `Err(ExecutionError::UnimplementedOpcode { .. })` if the fetched
    ///   opcode is not implemented; the CPU is then halted
    pub fn step(&mut self) -> Result<Step, ExecutionError> {
        match self.state {
            CpuState::Running => {}
            CpuState::Halted => return Ok(Step::Halted),
            _ => return Ok(Step::Idle),
        }
        if !self.pins.rdy() {
            return Ok(Step::Idle);
        }

        let bus = Arc::clone(&self.bus);
        let Some(guard) = bus.acquire(BusOwner::Cpu, self.bus_timeout) else {
            self.diagnostics.warning(
                PART_NAME,
                &format!("Bus busy, instruction at 0x{:04X} deferred", self.pc),
            );
            return Ok(Step::BusBusy);
        };

        self.execute_one(&guard)
    }

    fn execute_one(&mut self, bus: &BusGuard<'_>) -> Result<Step, ExecutionError> {
        let pc = self.pc;

        if self.decoder.resolve(pc).is_none() {
            self.state = CpuState::Halted;
            self.diagnostics.error(
                PART_NAME,
                &format!("Fetch from unmapped address 0x{pc:04X}, halting"),
            );
            return Err(ExecutionError::UnmappedFetch { pc });
        }

        // Fetch
        self.set_sync(bus, true);
        let opcode = self.read(bus, pc);
        self.set_sync(bus, false);

        // Decode
        let metadata = &OPCODE_TABLE[opcode as usize];
        if !metadata.implemented {
            self.state = CpuState::Halted;
            self.diagnostics.error(
                PART_NAME,
                &format!("Unimplemented opcode 0x{opcode:02X} at 0x{pc:04X}, halting"),
            );
            return Err(ExecutionError::UnimplementedOpcode { opcode, pc });
        }

        // Execute
        instructions::execute(self, bus, opcode)?;
        self.instructions += 1;

        if self.diagnostics.enabled(Severity::Debug) {
            self.diagnostics.debug(
                PART_NAME,
                &format!(
                    "{pc:04X}  {:02X} {:<3}  A:{:02X} X:{:02X} Y:{:02X} SP:{:02X} P:{:02X}",
                    opcode,
                    metadata.mnemonic,
                    self.a,
                    self.x,
                    self.y,
                    self.sp,
                    self.status()
                ),
            );
        }
        if self.state == CpuState::Halted {
            self.diagnostics.info(
                PART_NAME,
                &format!("Halted by {} at 0x{pc:04X}", metadata.mnemonic),
            );
        }

        Ok(Step::Executed { opcode })
    }

    /// Runs one iteration of the clocked instruction loop.
    ///
    /// 1. Samples the bus clock line into PHI0.
    /// 2. While RESB is low the CPU holds; when it goes high again the reset
    ///    sequence runs and the CPU enters `Running`.
    /// 3. Dispatches at most one instruction per PHI0 high phase: after a
    ///    dispatch the CPU waits for PHI0 to go low before the next one. A
    ///    dispatch that found the bus busy or RDY low is retried within the
    ///    same phase.
    pub fn tick(&mut self) -> Result<Step, ExecutionError> {
        let phi0 = self.bus.get_pin(line::CLOCK);
        self.pins.set(cpu_line::PHI0, phi0);

        if self.state == CpuState::PowerOff {
            return Ok(Step::Idle);
        }

        if !self.pins.resb() {
            if !self.reset_held {
                self.diagnostics.info(PART_NAME, "RESB low, holding");
                self.reset_held = true;
            }
            return Ok(Step::Idle);
        }
        if self.reset_held {
            self.reset_held = false;
            self.reset();
            self.state = CpuState::Running;
        }

        if !phi0 {
            self.dispatched = false;
            return Ok(Step::Idle);
        }
        if self.dispatched {
            return Ok(Step::Idle);
        }

        let result = self.step();
        if matches!(result, Ok(Step::Executed { .. }) | Err(_)) {
            self.dispatched = true;
        }
        result
    }

    /// Steps until the CPU halts or `max_steps` dispatch attempts have been made.
    ///
    /// Returns the number of instructions executed. Stops early if the CPU is
    /// not running.
    pub fn run_until_halt(&mut self, max_steps: usize) -> Result<usize, ExecutionError> {
        let mut executed = 0;
        for _ in 0..max_steps {
            match self.step()? {
                Step::Executed { .. } => executed += 1,
                Step::BusBusy => {}
                Step::Halted | Step::Idle => break,
            }
            if self.state == CpuState::Halted {
                break;
            }
        }
        Ok(executed)
    }

    /// Starts the clocked instruction loop on its own thread.
    ///
    /// The loop calls [`Cpu::tick`] and sleeps `timing.cpu_poll()` between
    /// iterations. The CPU stays locked only for the duration of one tick,
    /// which includes waiting up to the bus timeout for the bus.
    pub fn spawn(cpu: &Arc<Mutex<Cpu>>, timing: Timing) -> io::Result<ComponentHandle> {
        let cpu = Arc::clone(cpu);
        let diagnostics = Arc::clone(&lock(&cpu).diagnostics);
        component::spawn(PART_NAME, move |flag| {
            diagnostics.info(PART_NAME, "Instruction loop started");
            while flag.is_running() {
                let result = lock(&cpu).tick();
                match result {
                    Ok(_) => {}
                    // The CPU is halted and `step` logged the error
                    Err(err) => {
                        diagnostics.debug(PART_NAME, &format!("Dispatch failed: {err}"))
                    }
                }
                flag.sleep(timing.cpu_poll());
            }
            diagnostics.info(PART_NAME, "Instruction loop stopped");
        })
    }

    // ========== Memory Access ==========

    /// Reads a byte with a decoder read cycle on the owning chip's pins,
    /// mirroring the access onto the bus.
    pub(crate) fn read(&mut self, bus: &BusGuard<'_>, addr: u16) -> u8 {
        bus.set_pin(line::RWB, true);
        bus.write_address(addr);
        let value = self.decoder.read_cycle(bus, addr);
        bus.write_data(value);
        self.pins.latch(addr, value, true);
        value
    }

    /// Writes a byte with a decoder write cycle on the owning chip's pins,
    /// mirroring the access onto the bus.
    pub(crate) fn write(&mut self, bus: &BusGuard<'_>, addr: u16, value: u8) {
        bus.set_pin(line::RWB, false);
        bus.write_address(addr);
        bus.write_data(value);
        self.decoder.write_cycle(bus, addr, value);
        self.pins.latch(addr, value, false);
    }

    /// Reads a little-endian word from `addr` and `addr + 1`.
    pub(crate) fn read_word(&mut self, bus: &BusGuard<'_>, addr: u16) -> u16 {
        let lo = self.read(bus, addr);
        let hi = self.read(bus, addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Reads a little-endian pointer from zero page, wrapping within the page.
    fn read_zero_page_word(&mut self, bus: &BusGuard<'_>, zp: u8) -> u16 {
        let lo = self.read(bus, u16::from(zp));
        let hi = self.read(bus, u16::from(zp.wrapping_add(1)));
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn push(&mut self, bus: &BusGuard<'_>, value: u8) {
        self.write(bus, STACK_BASE | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(crate) fn pull(&mut self, bus: &BusGuard<'_>) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.read(bus, STACK_BASE | u16::from(self.sp))
    }

    fn set_sync(&mut self, bus: &BusGuard<'_>, level: bool) {
        bus.set_pin(line::SYNC, level);
        self.pins.set(cpu_line::SYNC, level);
    }

    // ========== Operand Resolution ==========

    /// Resolves the effective address of the current instruction's operand.
    ///
    /// Operand bytes are read from `PC + 1` onwards; PC itself is not moved.
    /// Immediate mode resolves to the address of the operand byte. The second
    /// value reports whether indexing crossed a page boundary.
    pub(crate) fn effective_address(
        &mut self,
        bus: &BusGuard<'_>,
        mode: AddressingMode,
    ) -> (u16, bool) {
        let operand = self.pc.wrapping_add(1);
        match mode {
            AddressingMode::Implicit | AddressingMode::Immediate => (operand, false),
            AddressingMode::ZeroPage => (u16::from(self.read(bus, operand)), false),
            AddressingMode::ZeroPageX => {
                let zp = self.read(bus, operand).wrapping_add(self.x);
                (u16::from(zp), false)
            }
            AddressingMode::ZeroPageY => {
                let zp = self.read(bus, operand).wrapping_add(self.y);
                (u16::from(zp), false)
            }
            AddressingMode::Absolute => (self.read_word(bus, operand), false),
            AddressingMode::AbsoluteX => {
                let base = self.read_word(bus, operand);
                let addr = base.wrapping_add(u16::from(self.x));
                (addr, page_crossed(base, addr))
            }
            AddressingMode::AbsoluteY => {
                let base = self.read_word(bus, operand);
                let addr = base.wrapping_add(u16::from(self.y));
                (addr, page_crossed(base, addr))
            }
            AddressingMode::Indirect => {
                let ptr = self.read_word(bus, operand);
                (self.read_word(bus, ptr), false)
            }
            AddressingMode::IndirectX => {
                let zp = self.read(bus, operand).wrapping_add(self.x);
                (self.read_zero_page_word(bus, zp), false)
            }
            AddressingMode::IndirectY => {
                let zp = self.read(bus, operand);
                let base = self.read_zero_page_word(bus, zp);
                let addr = base.wrapping_add(u16::from(self.y));
                (addr, page_crossed(base, addr))
            }
        }
    }

    /// Reads the operand value for `mode`, with the page-crossing indicator.
    pub(crate) fn operand_value(
        &mut self,
        bus: &BusGuard<'_>,
        mode: AddressingMode,
    ) -> (u8, bool) {
        let (addr, crossed) = self.effective_address(bus, mode);
        (self.read(bus, addr), crossed)
    }

    /// Charges the instruction's cycles and moves PC past it.
    pub(crate) fn finish(&mut self, metadata: &OpcodeMetadata, page_crossed: bool) {
        self.cycles += u64::from(metadata.base_cycles) + u64::from(page_crossed);
        self.pc = self.pc.wrapping_add(u16::from(metadata.size_bytes));
    }

    /// Sets Z and N from `value`.
    pub(crate) fn update_zn(&mut self, value: u8) {
        self.flag_z = value == 0;
        self.flag_n = (value & 0x80) != 0;
    }

    // ========== Control Lines ==========

    /// Drives the RDY input. While low, [`Cpu::step`] does nothing.
    pub fn set_rdy(&mut self, level: bool) {
        self.pins.set(cpu_line::RDY, level);
    }

    /// Drives the RESB input (active low). See [`Cpu::tick`].
    pub fn set_resb(&mut self, level: bool) {
        self.pins.set(cpu_line::RESB, level);
    }

    /// Drives the IRQB input (active low).
    pub fn set_irqb(&mut self, level: bool) {
        self.pins.set(cpu_line::IRQB, level);
    }

    /// Drives the NMIB input (active low).
    pub fn set_nmib(&mut self, level: bool) {
        self.pins.set(cpu_line::NMIB, level);
    }

    pub fn pins(&self) -> &CpuPins {
        &self.pins
    }

    // ========== Register Getters ==========

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Returns the stack pointer value.
    ///
    /// The full stack address is 0x0100 + SP. The stack grows downward from 0x01FF.
    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Address the next push will write to.
    pub fn stack_address(&self) -> u16 {
        STACK_BASE | u16::from(self.sp)
    }

    /// Returns the status register as a packed byte.
    ///
    /// Bit layout (NV1BDIZC):
    /// - Bit 7: N (Negative)
    /// - Bit 6: V (Overflow)
    /// - Bit 5: (unused, always 1)
    /// - Bit 4: B (Break)
    /// - Bit 3: D (Decimal)
    /// - Bit 2: I (Interrupt Disable)
    /// - Bit 1: Z (Zero)
    /// - Bit 0: C (Carry)
    pub fn status(&self) -> u8 {
        let mut status: u8 = 0b00100000;

        if self.flag_n {
            status |= 0b10000000;
        }
        if self.flag_v {
            status |= 0b01000000;
        }
        if self.flag_b {
            status |= 0b00010000;
        }
        if self.flag_d {
            status |= 0b00001000;
        }
        if self.flag_i {
            status |= 0b00000100;
        }
        if self.flag_z {
            status |= 0b00000010;
        }
        if self.flag_c {
            status |= 0b00000001;
        }

        status
    }

    /// Loads N, V, D, I, Z and C from a packed status byte.
    ///
    /// B and bit 5 are not stored flags and are left unchanged.
    pub fn set_status(&mut self, value: u8) {
        self.flag_n = value & 0b10000000 != 0;
        self.flag_v = value & 0b01000000 != 0;
        self.flag_d = value & 0b00001000 != 0;
        self.flag_i = value & 0b00000100 != 0;
        self.flag_z = value & 0b00000010 != 0;
        self.flag_c = value & 0b00000001 != 0;
    }

    /// Total cycles charged since creation.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instructions completed since creation.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    pub fn decoder(&self) -> &Arc<AddressDecoder> {
        &self.decoder
    }

    // ========== Status Flag Getters ==========

    pub fn flag_n(&self) -> bool {
        self.flag_n
    }

    pub fn flag_v(&self) -> bool {
        self.flag_v
    }

    pub fn flag_b(&self) -> bool {
        self.flag_b
    }

    pub fn flag_d(&self) -> bool {
        self.flag_d
    }

    pub fn flag_i(&self) -> bool {
        self.flag_i
    }

    pub fn flag_z(&self) -> bool {
        self.flag_z
    }

    pub fn flag_c(&self) -> bool {
        self.flag_c
    }

    // ========== Register Setters ==========

    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    pub fn set_x(&mut self, value: u8) {
        self.x = value;
    }

    pub fn set_y(&mut self, value: u8) {
        self.y = value;
    }

    pub fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    pub fn set_sp(&mut self, value: u8) {
        self.sp = value;
    }
}

fn page_crossed(base: u16, addr: u16) -> bool {
    (base & 0xFF00) != (addr & 0xFF00)
}

fn lock(cpu: &Mutex<Cpu>) -> MutexGuard<'_, Cpu> {
    cpu.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Chip, RamChip};
    use crate::diagnostics::{tracing_sink, CapturedDiagnostics};

    fn setup_cpu(sink: Arc<dyn Diagnostics>) -> (Cpu, Arc<RamChip>) {
        let ram = Arc::new(RamChip::new(0, 0x10000, Arc::clone(&sink)));
        ram.write_word(0xFFFC, 0x8000);
        let mut decoder = AddressDecoder::new(Arc::clone(&sink));
        decoder.add_mapping(0x0000, 0xFFFF, ram.clone());
        let cpu = Cpu::new(Arc::new(Bus::new()), Arc::new(decoder), sink)
            .with_bus_timeout(Duration::from_millis(20));
        (cpu, ram)
    }

    #[test]
    fn test_cpu_starts_powered_off() {
        let (mut cpu, _ram) = setup_cpu(tracing_sink());
        assert_eq!(cpu.state(), CpuState::PowerOff);
        assert_eq!(cpu.step().unwrap(), Step::Idle);
    }

    #[test]
    fn test_power_on_resets() {
        let (mut cpu, _ram) = setup_cpu(tracing_sink());
        cpu.set_a(0x11);
        cpu.set_sp(0x10);
        cpu.power_on();

        assert_eq!(cpu.state(), CpuState::Running);
        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.sp(), 0xFF);
        assert_eq!(cpu.a(), 0x00);
        assert!(cpu.flag_i());
        assert_eq!(cpu.status(), 0b00100100);
        assert!(cpu.pins().rdy());
        assert!(cpu.pins().resb());
    }

    #[test]
    fn test_reset_restores_previous_state() {
        let (mut cpu, _ram) = setup_cpu(tracing_sink());
        cpu.power_on();
        cpu.state = CpuState::Halted;
        cpu.reset();
        assert_eq!(cpu.state(), CpuState::Halted);
    }

    #[test]
    fn test_reset_falls_back_when_bus_busy() {
        let sink = Arc::new(CapturedDiagnostics::new());
        let (mut cpu, _ram) = setup_cpu(sink.clone());
        let bus = Arc::clone(cpu.bus());
        assert!(bus.request(BusOwner::Clock, Duration::from_millis(10)));

        cpu.power_on();
        assert_eq!(cpu.pc(), 0x0000);
        assert!(sink.contains(Severity::Error, "reset vector"));
    }

    #[test]
    fn test_step_defers_when_bus_busy() {
        let sink = Arc::new(CapturedDiagnostics::new());
        let (mut cpu, ram) = setup_cpu(sink.clone());
        ram.load_bytes(0x8000, &[0xE8]);
        cpu.power_on();

        let bus = Arc::clone(cpu.bus());
        assert!(bus.request(BusOwner::External(1), Duration::from_millis(10)));
        assert_eq!(cpu.step().unwrap(), Step::BusBusy);
        assert_eq!(cpu.x(), 0);
        assert_eq!(cpu.pc(), 0x8000);
        assert!(sink.contains(Severity::Warning, "Bus busy"));

        bus.release(BusOwner::External(1));
        assert_eq!(cpu.step().unwrap(), Step::Executed { opcode: 0xE8 });
        assert_eq!(cpu.x(), 1);
    }

    #[test]
    fn test_unimplemented_opcode_halts() {
        let sink = Arc::new(CapturedDiagnostics::new());
        let (mut cpu, ram) = setup_cpu(sink.clone());
        ram.load_bytes(0x8000, &[0x02]);
        cpu.power_on();

        assert_eq!(
            cpu.step(),
            Err(ExecutionError::UnimplementedOpcode {
                opcode: 0x02,
                pc: 0x8000
            })
        );
        assert_eq!(cpu.state(), CpuState::Halted);
        assert_eq!(cpu.step().unwrap(), Step::Halted);
        assert!(sink.contains(Severity::Error, "0x02"));
    }

    #[test]
    fn test_rdy_low_pauses() {
        let (mut cpu, ram) = setup_cpu(tracing_sink());
        ram.load_bytes(0x8000, &[0xEA]);
        cpu.power_on();
        cpu.set_rdy(false);
        assert_eq!(cpu.step().unwrap(), Step::Idle);
        assert_eq!(cpu.pc(), 0x8000);
        cpu.set_rdy(true);
        assert_eq!(cpu.step().unwrap(), Step::Executed { opcode: 0xEA });
    }

    #[test]
    fn test_tick_dispatches_once_per_high_phase() {
        let (mut cpu, ram) = setup_cpu(tracing_sink());
        ram.load_bytes(0x8000, &[0xE8, 0xE8, 0xE8]);
        cpu.power_on();
        let bus = Arc::clone(cpu.bus());

        // Low phase: nothing
        assert_eq!(cpu.tick().unwrap(), Step::Idle);

        bus.set_pin(line::CLOCK, true);
        assert_eq!(cpu.tick().unwrap(), Step::Executed { opcode: 0xE8 });
        assert!(cpu.pins().phi0());
        assert_eq!(cpu.tick().unwrap(), Step::Idle);
        assert_eq!(cpu.tick().unwrap(), Step::Idle);
        assert_eq!(cpu.x(), 1);

        bus.set_pin(line::CLOCK, false);
        assert_eq!(cpu.tick().unwrap(), Step::Idle);
        bus.set_pin(line::CLOCK, true);
        cpu.tick().unwrap();
        assert_eq!(cpu.x(), 2);
    }

    #[test]
    fn test_resb_release_leaves_halted() {
        let (mut cpu, ram) = setup_cpu(tracing_sink());
        ram.load_bytes(0x8000, &[0xA2, 0x05, 0xDB]);
        cpu.power_on();
        cpu.run_until_halt(10).unwrap();
        assert_eq!(cpu.state(), CpuState::Halted);
        assert_eq!(cpu.x(), 0x05);

        cpu.set_resb(false);
        assert_eq!(cpu.tick().unwrap(), Step::Idle);
        assert_eq!(cpu.state(), CpuState::Halted);

        cpu.set_resb(true);
        cpu.tick().unwrap();
        assert_eq!(cpu.state(), CpuState::Running);
        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.x(), 0x00);
    }

    #[test]
    fn test_accesses_are_mirrored_on_bus() {
        let (mut cpu, ram) = setup_cpu(tracing_sink());
        ram.load_bytes(0x8000, &[0xA9, 0x77, 0x8D, 0x34, 0x12]);
        cpu.power_on();
        cpu.step().unwrap();
        cpu.step().unwrap();

        let bus = Arc::clone(cpu.bus());
        assert_eq!(bus.read_address(), 0x1234);
        assert_eq!(bus.read_data(), 0x77);
        assert!(!bus.get_pin(line::RWB));
        assert_eq!(bus.owner(), None);
        assert_eq!(cpu.pins().address(), 0x1234);
        assert!(!cpu.pins().rwb());
    }
}
