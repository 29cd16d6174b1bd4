//! Tests for stack and control-flow instructions.
//!
//! Tests cover:
//! - PHA, PHP, PLA, PLP and stack pointer movement
//! - JMP absolute and indirect
//! - JSR / RTS pairs, nested calls
//! - BRK and STP halting

use std::sync::Arc;

use sim65c02::devices::{Chip, RamChip};
use sim65c02::diagnostics::tracing_sink;
use sim65c02::{AddressDecoder, Bus, Cpu, CpuState, Step};

/// Helper function to create a running CPU with `program` at 0x8000
fn setup_cpu(program: &[u8]) -> (Cpu, Arc<RamChip>) {
    let sink = tracing_sink();
    let ram = Arc::new(RamChip::new(0, 0x10000, Arc::clone(&sink)));
    ram.write_word(0xFFFC, 0x8000);
    ram.load_bytes(0x8000, program);

    let mut decoder = AddressDecoder::new(Arc::clone(&sink));
    decoder.add_mapping(0x0000, 0xFFFF, ram.clone());
    let mut cpu = Cpu::new(Arc::new(Bus::new()), Arc::new(decoder), sink);
    cpu.power_on();
    (cpu, ram)
}

// ========== Stack ==========

#[test]
fn test_pha_pushes_and_decrements() {
    let (mut cpu, ram) = setup_cpu(&[0x48]);
    cpu.set_a(0x3C);

    cpu.step().unwrap();

    assert_eq!(ram.read_byte(0x01FF), 0x3C);
    assert_eq!(cpu.sp(), 0xFE);
    assert_eq!(cpu.cycles(), 3);
}

#[test]
fn test_pla_pulls_and_sets_flags() {
    let (mut cpu, _ram) = setup_cpu(&[0x48, 0xA9, 0x01, 0x68]);
    cpu.set_a(0x80);

    cpu.step().unwrap(); // PHA
    cpu.step().unwrap(); // LDA #$01
    cpu.step().unwrap(); // PLA

    assert_eq!(cpu.a(), 0x80);
    assert!(cpu.flag_n());
    assert!(!cpu.flag_z());
    assert_eq!(cpu.sp(), 0xFF);
    assert_eq!(cpu.cycles(), 3 + 2 + 4);
}

#[test]
fn test_php_sets_break_and_unused_bits_on_stack() {
    let (mut cpu, ram) = setup_cpu(&[0x08]);

    cpu.step().unwrap();

    // After reset only I is set
    assert_eq!(ram.read_byte(0x01FF), 0b0011_0100);
    assert!(!cpu.flag_b());
}

#[test]
fn test_plp_restores_flags() {
    let (mut cpu, ram) = setup_cpu(&[0x28]);
    cpu.set_sp(0xFE);
    ram.write_byte(0x01FF, 0b1100_0011);

    cpu.step().unwrap();

    assert!(cpu.flag_n());
    assert!(cpu.flag_v());
    assert!(!cpu.flag_i());
    assert!(cpu.flag_z());
    assert!(cpu.flag_c());
    assert_eq!(cpu.sp(), 0xFF);
}

#[test]
fn test_php_plp_round_trip() {
    let (mut cpu, _ram) = setup_cpu(&[0x38, 0xF8, 0x08, 0x18, 0xD8, 0x28]);

    for _ in 0..6 {
        cpu.step().unwrap();
    }

    assert!(cpu.flag_c());
    assert!(cpu.flag_d());
    assert!(!cpu.flag_b());
}

#[test]
fn test_stack_pointer_wraps() {
    let (mut cpu, ram) = setup_cpu(&[0x48, 0x68]);
    cpu.set_sp(0x00);
    cpu.set_a(0x5D);

    cpu.step().unwrap();
    assert_eq!(ram.read_byte(0x0100), 0x5D);
    assert_eq!(cpu.sp(), 0xFF);

    cpu.set_a(0x00);
    cpu.step().unwrap();
    assert_eq!(cpu.a(), 0x5D);
    assert_eq!(cpu.sp(), 0x00);
}

// ========== Jumps ==========

#[test]
fn test_jmp_absolute() {
    let (mut cpu, _ram) = setup_cpu(&[0x4C, 0x00, 0x90]);

    cpu.step().unwrap();

    assert_eq!(cpu.pc(), 0x9000);
    assert_eq!(cpu.cycles(), 3);
}

#[test]
fn test_jmp_indirect() {
    let (mut cpu, ram) = setup_cpu(&[0x6C, 0x00, 0x03]);
    ram.write_word(0x0300, 0x1234);

    cpu.step().unwrap();

    assert_eq!(cpu.pc(), 0x1234);
    assert_eq!(cpu.cycles(), 6);
}

#[test]
fn test_jmp_indirect_crosses_page_for_high_byte() {
    let (mut cpu, ram) = setup_cpu(&[0x6C, 0xFF, 0x02]);
    ram.write_byte(0x02FF, 0x78);
    ram.write_byte(0x0300, 0x56);
    ram.write_byte(0x0200, 0xEE);

    cpu.step().unwrap();

    assert_eq!(cpu.pc(), 0x5678);
}

#[test]
fn test_jsr_pushes_return_address() {
    let (mut cpu, ram) = setup_cpu(&[0x20, 0x00, 0x90]);

    cpu.step().unwrap();

    assert_eq!(cpu.pc(), 0x9000);
    assert_eq!(cpu.sp(), 0xFD);
    // Address of the JSR's last byte, high byte pushed first
    assert_eq!(ram.read_byte(0x01FF), 0x80);
    assert_eq!(ram.read_byte(0x01FE), 0x02);
    assert_eq!(cpu.cycles(), 6);
}

#[test]
fn test_jsr_rts_round_trip() {
    let (mut cpu, ram) = setup_cpu(&[0x20, 0x00, 0x90, 0xE8]);
    ram.load_bytes(0x9000, &[0xA0, 0x07, 0x60]);

    cpu.step().unwrap(); // JSR
    cpu.step().unwrap(); // LDY #$07
    cpu.step().unwrap(); // RTS

    assert_eq!(cpu.pc(), 0x8003);
    assert_eq!(cpu.sp(), 0xFF);
    assert_eq!(cpu.y(), 0x07);

    cpu.step().unwrap();
    assert_eq!(cpu.x(), 0x01);
}

#[test]
fn test_nested_subroutines() {
    // main: JSR a; BRK    a: JSR b; INX; RTS    b: INY; RTS
    let (mut cpu, ram) = setup_cpu(&[0x20, 0x00, 0x90, 0x00]);
    ram.load_bytes(0x9000, &[0x20, 0x00, 0xA0, 0xE8, 0x60]);
    ram.load_bytes(0xA000, &[0xC8, 0x60]);

    let executed = cpu.run_until_halt(100).unwrap();

    assert_eq!(executed, 7);
    assert_eq!(cpu.x(), 1);
    assert_eq!(cpu.y(), 1);
    assert_eq!(cpu.sp(), 0xFF);
    assert_eq!(cpu.state(), CpuState::Halted);
}

// ========== Halting ==========

#[test]
fn test_brk_sets_flags_and_halts() {
    let (mut cpu, _ram) = setup_cpu(&[0x00]);

    assert_eq!(cpu.step().unwrap(), Step::Executed { opcode: 0x00 });

    assert!(cpu.flag_b());
    assert!(cpu.flag_i());
    assert_eq!(cpu.pc(), 0x8001);
    assert_eq!(cpu.sp(), 0xFF);
    assert_eq!(cpu.cycles(), 7);
    assert_eq!(cpu.state(), CpuState::Halted);
}

#[test]
fn test_stp_halts() {
    let (mut cpu, _ram) = setup_cpu(&[0xDB, 0xE8]);

    cpu.step().unwrap();

    assert_eq!(cpu.state(), CpuState::Halted);
    assert_eq!(cpu.step().unwrap(), Step::Halted);
    assert_eq!(cpu.x(), 0);
}
