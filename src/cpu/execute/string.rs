//! String instruction semantics
//!
//! String ops read through DS:SI and write through ES:DI, stepping SI/DI
//! by the operand size in the direction DF selects. With the REP prefix
//! the operation repeats while CX counts down; the compare variants
//! (CMPS/SCAS) additionally stop as soon as ZF clears. Register effects
//! are traced once per instruction with the cumulative before/after
//! values, so a `rep movsw` produces a single trace line.

use std::fmt::Write as _;

use super::arithmetic::sub_with_flags;
use super::Simulator;
use crate::cpu::decode::{Instruction, Mnemonic, Register, Width};
use crate::cpu::state::{Cpu, Reg};

pub(crate) fn string_op(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let width = inst.width.unwrap_or(Width::Word);

    let before = [
        (Reg::Ax, sim.cpu.get(Reg::Ax)),
        (Reg::Si, sim.cpu.get(Reg::Si)),
        (Reg::Di, sim.cpu.get(Reg::Di)),
        (Reg::Cx, sim.cpu.get(Reg::Cx)),
    ];

    if inst.rep {
        while sim.cpu.get(Reg::Cx) != 0 {
            one_step(sim, inst.mnemonic, width);
            let cx = sim.cpu.get(Reg::Cx).wrapping_sub(1);
            sim.cpu.set(Reg::Cx, cx);
            let compares = matches!(inst.mnemonic, Mnemonic::Cmps | Mnemonic::Scas);
            if compares && !sim.flag(Cpu::ZF) {
                break;
            }
        }
    } else {
        one_step(sim, inst.mnemonic, width);
    }

    for (slot, old) in before {
        let new = sim.cpu.get(slot);
        if new != old {
            let _ = write!(trace, " {}:{:#x}->{:#x}", slot.name(), old, new);
        }
    }
}

/// One iteration of a string op, advancing SI/DI per DF
fn one_step(sim: &mut Simulator, mnemonic: Mnemonic, width: Width) {
    let size: u16 = match width {
        Width::Byte => 1,
        Width::Word => 2,
    };
    let delta = if sim.flag(Cpu::DF) {
        size.wrapping_neg()
    } else {
        size
    };

    let si = sim.cpu.get(Reg::Si);
    let di = sim.cpu.get(Reg::Di);
    let src = Cpu::physical_address(sim.cpu.get(Reg::Ds), si);
    let dst = Cpu::physical_address(sim.cpu.get(Reg::Es), di);
    let acc = Register::accumulator(width);

    match mnemonic {
        Mnemonic::Movs => {
            let value = sim.read_mem(src, width);
            sim.write_mem(dst, width, value);
            sim.cpu.set(Reg::Si, si.wrapping_add(delta));
            sim.cpu.set(Reg::Di, di.wrapping_add(delta));
        }
        Mnemonic::Stos => {
            let value = sim.cpu.read_register(acc);
            sim.write_mem(dst, width, value);
            sim.cpu.set(Reg::Di, di.wrapping_add(delta));
        }
        Mnemonic::Lods => {
            let value = sim.read_mem(src, width);
            sim.cpu.write_register(acc, value);
            sim.cpu.set(Reg::Si, si.wrapping_add(delta));
        }
        Mnemonic::Cmps => {
            let a = sim.read_mem(src, width);
            let b = sim.read_mem(dst, width);
            let mut flags = sim.flags();
            sub_with_flags(a, b, 0, width, &mut flags);
            sim.set_flags(flags);
            sim.cpu.set(Reg::Si, si.wrapping_add(delta));
            sim.cpu.set(Reg::Di, di.wrapping_add(delta));
        }
        _ => {
            // SCAS
            let a = sim.cpu.read_register(acc);
            let b = sim.read_mem(dst, width);
            let mut flags = sim.flags();
            sub_with_flags(a, b, 0, width, &mut flags);
            sim.set_flags(flags);
            sim.cpu.set(Reg::Di, di.wrapping_add(delta));
        }
    }
}
