//! # Control Flow Instructions
//!
//! This module implements control flow operations:
//! - JMP: Jump (absolute and indirect)
//! - JSR: Jump to Subroutine
//! - RTS: Return from Subroutine
//! - NOP: No Operation
//! - BRK: Break, halts the CPU
//! - STP: Stop the clock, halts the CPU
//!
//! BRK does not vector through 0xFFFE here: interrupt servicing is not
//! modelled, so BRK marks the end of a program. It sets B and I, moves PC past
//! the opcode and halts.

use crate::bus::BusGuard;
use crate::cpu::{Cpu, CpuState};
use crate::{ExecutionError, OPCODE_TABLE};

/// Executes the JMP (Jump) instruction.
///
/// Absolute mode jumps to the operand; indirect mode jumps to the address
/// stored at the operand. No flags affected.
pub(crate) fn execute_jmp(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let metadata = &OPCODE_TABLE[opcode as usize];
    let (target, _) = cpu.effective_address(bus, metadata.addressing_mode);
    cpu.cycles += u64::from(metadata.base_cycles);
    cpu.pc = target;
    Ok(())
}

/// Executes the JSR (Jump to Subroutine) instruction.
///
/// Pushes the address of the last byte of the JSR (PC + 2), high byte first,
/// then jumps to the operand.
pub(crate) fn execute_jsr(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let metadata = &OPCODE_TABLE[opcode as usize];
    let (target, _) = cpu.effective_address(bus, metadata.addressing_mode);

    let [lo, hi] = cpu.pc.wrapping_add(2).to_le_bytes();
    cpu.push(bus, hi);
    cpu.push(bus, lo);

    cpu.cycles += u64::from(metadata.base_cycles);
    cpu.pc = target;
    Ok(())
}

/// Executes the RTS (Return from Subroutine) instruction.
///
/// Pulls the return address (low byte first) and resumes one past it.
pub(crate) fn execute_rts(
    cpu: &mut Cpu,
    bus: &BusGuard<'_>,
    opcode: u8,
) -> Result<(), ExecutionError> {
    let metadata = &OPCODE_TABLE[opcode as usize];
    let lo = cpu.pull(bus);
    let hi = cpu.pull(bus);

    cpu.cycles += u64::from(metadata.base_cycles);
    cpu.pc = u16::from_le_bytes([lo, hi]).wrapping_add(1);
    Ok(())
}

/// Executes the NOP (No Operation) instruction.
pub(crate) fn execute_nop(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the BRK (Break) instruction.
///
/// Flags affected:
/// - B: Set to 1
/// - I: Set to 1
pub(crate) fn execute_brk(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_b = true;
    cpu.flag_i = true;
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    cpu.state = CpuState::Halted;
    Ok(())
}

/// Executes the STP (Stop) instruction.
pub(crate) fn execute_stp(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    cpu.state = CpuState::Halted;
    Ok(())
}
