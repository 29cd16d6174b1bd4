//! # Status Flag Manipulation Instructions
//!
//! - CLC / SEC: Clear / Set Carry
//! - CLI / SEI: Clear / Set Interrupt Disable
//! - CLD / SED: Clear / Set Decimal Mode
//! - CLV: Clear Overflow
//!
//! These instructions use implied addressing mode and execute in 2 cycles.

use crate::cpu::Cpu;
use crate::{ExecutionError, OPCODE_TABLE};

fn finish(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the CLC (Clear Carry Flag) instruction.
pub(crate) fn execute_clc(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_c = false;
    finish(cpu, opcode)
}

/// Executes the SEC (Set Carry Flag) instruction.
pub(crate) fn execute_sec(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_c = true;
    finish(cpu, opcode)
}

/// Executes the CLI (Clear Interrupt Disable) instruction.
pub(crate) fn execute_cli(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_i = false;
    finish(cpu, opcode)
}

/// Executes the SEI (Set Interrupt Disable) instruction.
pub(crate) fn execute_sei(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_i = true;
    finish(cpu, opcode)
}

/// Executes the CLD (Clear Decimal Mode) instruction.
pub(crate) fn execute_cld(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_d = false;
    finish(cpu, opcode)
}

/// Executes the SED (Set Decimal Mode) instruction.
///
/// Decimal arithmetic is not implemented; the flag is only recorded.
pub(crate) fn execute_sed(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_d = true;
    finish(cpu, opcode)
}

/// Executes the CLV (Clear Overflow Flag) instruction.
pub(crate) fn execute_clv(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.flag_v = false;
    finish(cpu, opcode)
}
