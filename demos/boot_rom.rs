//! Boot a small program from ROM on the fully threaded computer.
//!
//! The program stores a few values into RAM, calls a subroutine and stops
//! with BRK. Every diagnostic the components emit is captured and printed
//! at the end.
//!
//! Run with: `cargo run --example boot_rom [config.toml]`

use std::env;
use std::fs;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use sim65c02::{CapturedDiagnostics, Chip, Computer, RomImage, SystemConfig};

// 8000  A9 42     LDA #$42
// 8002  8D 00 02  STA $0200
// 8005  AA        TAX
// 8006  E8        INX
// 8007  8E 01 02  STX $0201
// 800A  20 11 80  JSR $8011
// 800D  8C 02 02  STY $0202
// 8010  00        BRK
// 8011  A0 07     LDY #$07
// 8013  60        RTS
const PROGRAM: [u8; 20] = [
    0xA9, 0x42, 0x8D, 0x00, 0x02, 0xAA, 0xE8, 0x8E, 0x01, 0x02, 0x20, 0x11, 0x80, 0x8C, 0x02,
    0x02, 0x00, 0xA0, 0x07, 0x60,
];

fn load_config() -> Result<SystemConfig, String> {
    match env::args().nth(1) {
        Some(path) => {
            let text = fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
            SystemConfig::from_toml_str(&text).map_err(|e| format!("{path}: {e}"))
        }
        None => Ok(SystemConfig::default()),
    }
}

fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    println!("65C02 Breadboard Computer");
    println!("=========================\n");
    println!(
        "RAM 0x{:04X}-0x{:04X}, ROM 0x{:04X}-0x{:04X}, clock {} Hz ({:?})\n",
        config.ram_start,
        config.ram_end,
        config.rom_start,
        config.rom_end,
        config.clock_hz,
        config.clock_mode
    );

    let image = match RomImage::with_program(config.rom_start, config.rom_capacity, &PROGRAM) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Program does not fit the ROM: {e}");
            process::exit(1);
        }
    };

    let diagnostics = Arc::new(CapturedDiagnostics::new());
    let mut computer = match Computer::assemble(config, image, diagnostics.clone()) {
        Ok(computer) => computer,
        Err(e) => {
            eprintln!("Assembly failed: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = computer.start() {
        eprintln!("Failed to start: {e}");
        process::exit(1);
    }

    let halted = computer.wait_for_halt(Duration::from_secs(10));
    computer.shutdown();

    if !halted {
        println!("CPU did not halt within 10 s (is the clock in monostable mode?)\n");
    }

    computer.with_cpu(|cpu| {
        println!("Final CPU state: {:?}", cpu.state());
        println!(
            "  A:{:02X} X:{:02X} Y:{:02X} SP:{:02X} PC:{:04X} P:{:08b}",
            cpu.a(),
            cpu.x(),
            cpu.y(),
            cpu.sp(),
            cpu.pc(),
            cpu.status()
        );
        println!(
            "  {} instructions, {} cycles\n",
            cpu.instructions(),
            cpu.cycles()
        );
    });

    let ram = computer.ram();
    println!(
        "RAM 0x0200..0x0203: {:02X} {:02X} {:02X}\n",
        ram.read_byte(0x0200),
        ram.read_byte(0x0201),
        ram.read_byte(0x0202)
    );

    println!("Diagnostics:");
    for entry in diagnostics.entries() {
        println!(
            "  [{:<7}] {:<10} {}",
            entry.severity, entry.component, entry.message
        );
    }
}
