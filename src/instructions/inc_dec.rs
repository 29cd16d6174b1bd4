//! # Register Increment and Decrement
//!
//! - INX / INY: Increment X / Y
//! - DEX / DEY: Decrement X / Y
//!
//! All wrap at the byte boundary and set Z and N from the result.

use crate::cpu::Cpu;
use crate::{ExecutionError, OPCODE_TABLE};

fn finish(cpu: &mut Cpu, opcode: u8, result: u8) {
    cpu.update_zn(result);
    cpu.finish(&OPCODE_TABLE[opcode as usize], false);
}

/// Executes the INX (Increment X Register) instruction.
///
/// `X = X + 1`, wrapping from 0xFF to 0x00.
pub(crate) fn execute_inx(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    let result = cpu.x.wrapping_add(1);
    cpu.x = result;
    finish(cpu, opcode, result);
    Ok(())
}

/// Executes the INY (Increment Y Register) instruction.
pub(crate) fn execute_iny(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    let result = cpu.y.wrapping_add(1);
    cpu.y = result;
    finish(cpu, opcode, result);
    Ok(())
}

/// Executes the DEX (Decrement X Register) instruction.
///
/// `X = X - 1`, wrapping from 0x00 to 0xFF.
pub(crate) fn execute_dex(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    let result = cpu.x.wrapping_sub(1);
    cpu.x = result;
    finish(cpu, opcode, result);
    Ok(())
}

/// Executes the DEY (Decrement Y Register) instruction.
pub(crate) fn execute_dey(cpu: &mut Cpu, opcode: u8) -> Result<(), ExecutionError> {
    let result = cpu.y.wrapping_sub(1);
    cpu.y = result;
    finish(cpu, opcode, result);
    Ok(())
}
