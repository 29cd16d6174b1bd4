//! # Stack Operations
//!
//! This module implements stack manipulation instructions:
//! - PHA: Push Accumulator
//! - PHP: Push Processor Status
//! - PLA: Pull Accumulator
//! - PLP: Pull Processor Status
//!
//! The stack lives at 0x0100-0x01FF and grows downward. A push writes to
//! `0x0100 | SP` and then decrements SP; a pull increments SP and then reads.

use crate::bus::BusGuard;
use crate::cpu::Cpu;
use crate::{ExecutionError, OPCODE_TABLE};

/// Status bits that only exist in a pushed copy of P (B and bit 5).
const PUSHED_ONLY: u8 = 0b00110000;

/// Executes the PHA (Push Accumulator) instruction.
///
/// Flags affected: None
pub(crate) fn execute_pha(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let value = cpu.a;
    cpu.push(bus, value);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the PHP (Push Processor Status) instruction.
///
/// The pushed byte always has B and bit 5 set.
pub(crate) fn execute_php(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let value = cpu.status() | PUSHED_ONLY;
    cpu.push(bus, value);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the PLA (Pull Accumulator) instruction. Sets Z and N.
pub(crate) fn execute_pla(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    cpu.a = cpu.pull(bus);
    cpu.update_zn(cpu.a);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the PLP (Pull Processor Status) instruction.
///
/// N, V, D, I, Z and C are restored from the pulled byte; B and bit 5 are
/// ignored.
pub(crate) fn execute_plp(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let value = cpu.pull(bus);
    cpu.set_status(value);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}
