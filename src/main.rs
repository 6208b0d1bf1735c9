//! sim86 - 8086 disassembler and simulator
//!
//! Command-line driver: loads a raw 8086 program image and either prints
//! its disassembly or executes it and reports the final machine state.

use std::io::Write;
use std::process::ExitCode;

use sim86::cpu::Simulator;
use sim86::disasm::disassemble;

enum Mode {
    Disasm,
    Exec,
}

fn usage(program: &str) {
    eprintln!("Usage: {} [-dump] -disasm <file>", program);
    eprintln!("       {} [-dump] -exec <file>", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -disasm <file>  Print the program's disassembly");
    eprintln!("  -exec <file>    Execute the program and print the final registers");
    eprintln!("  -dump           After -exec, write the memory image to dump_<file>.data");
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("sim86");

    let mut mode: Option<Mode> = None;
    let mut path: Option<String> = None;
    let mut dump = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-disasm" | "-exec" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: {} requires a file argument", args[i]);
                    usage(program);
                    return ExitCode::FAILURE;
                }
                mode = Some(if args[i] == "-disasm" {
                    Mode::Disasm
                } else {
                    Mode::Exec
                });
                path = Some(args[i + 1].clone());
                i += 2;
            }
            "-dump" => {
                dump = true;
                i += 1;
            }
            "-h" | "--help" => {
                usage(program);
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Error: unknown option '{}'", arg);
                usage(program);
                return ExitCode::FAILURE;
            }
        }
    }

    let (mode, path) = match (mode, path) {
        (Some(mode), Some(path)) => (mode, path),
        _ => {
            usage(program);
            return ExitCode::FAILURE;
        }
    };

    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Failed to read '{}': {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match mode {
        Mode::Disasm => {
            let clean = match disassemble(&data, &path, &mut out) {
                Ok(clean) => clean,
                Err(err) => {
                    eprintln!("Failed to write listing: {}", err);
                    return ExitCode::FAILURE;
                }
            };
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Mode::Exec => {
            let mut sim = Simulator::new();
            sim.load_program(&data, 0);

            if writeln!(out, "--- {} execution ---", path).is_err() {
                return ExitCode::FAILURE;
            }
            let run_result = sim.run(&mut out);
            if let Err(ref err) = run_result {
                log::error!("execution aborted: {}", err);
            }
            // Report whatever state accumulated, even after a failure
            if let Err(err) = sim.print_final_registers(&mut out) {
                eprintln!("Failed to write final registers: {}", err);
                return ExitCode::FAILURE;
            }

            if dump {
                let dump_path = format!("dump_{}.data", path);
                if let Err(err) = std::fs::write(&dump_path, sim.mem.as_slice()) {
                    eprintln!("Failed to write '{}': {}", dump_path, err);
                    return ExitCode::FAILURE;
                }
            }

            if run_result.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
