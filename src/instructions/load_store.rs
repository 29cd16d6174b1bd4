//! # Load and Store Instructions
//!
//! This module implements load and store operations:
//! - LDA: Load Accumulator
//! - LDX: Load X Register
//! - LDY: Load Y Register
//! - STA: Store Accumulator
//! - STX: Store X Register
//! - STY: Store Y Register
//!
//! Loads set Z and N from the loaded value and pay one extra cycle when an
//! indexed address crosses a page. Stores affect no flags and never pay the
//! page-crossing penalty.

use crate::bus::BusGuard;
use crate::cpu::Cpu;
use crate::{ExecutionError, OPCODE_TABLE};

/// Fetches the operand for a load, charges cycles and advances PC.
fn load(cpu: &mut Cpu, bus: &BusGuard<'_>, opcode: u8) -> u8 {
    let metadata = &OPCODE_TABLE[opcode as usize];
    let (value, page_crossed) = cpu.operand_value(bus, metadata.addressing_mode);
    cpu.update_zn(value);
    cpu.finish(metadata, page_crossed);
    value
}

/// Writes `value` to the effective address, charges cycles and advances PC.
fn store(cpu: &mut Cpu, bus: &BusGuard<'_>, opcode: u8, value: u8) {
    let metadata = &OPCODE_TABLE[opcode as usize];
    let (addr, _) = cpu.effective_address(bus, metadata.addressing_mode);
    cpu.write(bus, addr, value);
    cpu.finish(metadata, false);
}

/// Executes the LDA (Load Accumulator) instruction.
///
/// Loads a byte of memory into the accumulator, setting the zero and negative
/// flags as appropriate.
///
/// # Flag Behavior
///
/// - Zero (Z): Set if A = 0
/// - Negative (N): Set if bit 7 of A is set
/// - Other flags: Not affected
pub(crate) fn execute_lda(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    cpu.a = load(cpu, bus, opcode);
    Ok(())
}

/// Executes the LDX (Load X Register) instruction.
pub(crate) fn execute_ldx(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    cpu.x = load(cpu, bus, opcode);
    Ok(())
}

/// Executes the LDY (Load Y Register) instruction.
pub(crate) fn execute_ldy(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    cpu.y = load(cpu, bus, opcode);
    Ok(())
}

/// Executes the STA (Store Accumulator) instruction.
///
/// Stores the contents of the accumulator into memory at the address specified
/// by the addressing mode. No flags affected.
pub(crate) fn execute_sta(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let value = cpu.a;
    store(cpu, bus, opcode, value);
    Ok(())
}

/// Executes the STX (Store X Register) instruction.
pub(crate) fn execute_stx(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let value = cpu.x;
    store(cpu, bus, opcode, value);
    Ok(())
}

/// Executes the STY (Store Y Register) instruction.
pub(crate) fn execute_sty(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let value = cpu.y;
    store(cpu, bus, opcode, value);
    Ok(())
}
