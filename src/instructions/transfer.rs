//! # Register Transfer Instructions
//!
//! This module implements register transfer operations:
//! - TAX: Transfer Accumulator to X
//! - TAY: Transfer Accumulator to Y
//! - TXA: Transfer X to Accumulator
//! - TYA: Transfer Y to Accumulator
//! - TSX: Transfer Stack Pointer to X
//! - TXS: Transfer X to Stack Pointer
//!
//! Every transfer except TXS sets Z and N from the copied value.

use crate::cpu::Cpu;
use crate::{ExecutionError, OPCODE_TABLE};

/// Executes the TAX (Transfer Accumulator to X) instruction.
///
/// Copies the current contents of the accumulator into the X register
/// and sets the zero and negative flags as appropriate.
pub(crate) fn execute_tax(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.x = cpu.a;
    cpu.update_zn(cpu.x);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the TAY (Transfer Accumulator to Y) instruction.
pub(crate) fn execute_tay(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.y = cpu.a;
    cpu.update_zn(cpu.y);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the TXA (Transfer X to Accumulator) instruction.
pub(crate) fn execute_txa(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.a = cpu.x;
    cpu.update_zn(cpu.a);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the TYA (Transfer Y to Accumulator) instruction.
pub(crate) fn execute_tya(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.a = cpu.y;
    cpu.update_zn(cpu.a);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the TSX (Transfer Stack Pointer to X) instruction.
pub(crate) fn execute_tsx(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.x = cpu.sp;
    cpu.update_zn(cpu.x);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}

/// Executes the TXS (Transfer X to Stack Pointer) instruction.
///
/// Unlike the other transfers, TXS leaves every flag unchanged.
pub(crate) fn execute_txs(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    cpu.sp = cpu.x;
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
    Ok(())
}
