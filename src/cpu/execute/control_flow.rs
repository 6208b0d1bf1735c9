//! Control transfer semantics
//!
//! Relative targets: labels store their displacement normalized to the
//! end of a two-byte encoding, so every relative transfer lands at
//! `old_ip + 2 + label` regardless of the instruction's real length. IP
//! changes are not traced here; the step loop prints the IP transition
//! for every instruction.

use super::stack::{pop_word, push_word};
use super::Simulator;
use crate::cpu::decode::{Instruction, Mnemonic, Operand, Width};
use crate::cpu::state::{Cpu, Reg};

fn relative_target(old_ip: u16, label: i16) -> u16 {
    old_ip.wrapping_add(2).wrapping_add(label as u16)
}

/// Evaluate a conditional-jump predicate against FLAGS
fn condition(sim: &Simulator, mnemonic: Mnemonic) -> bool {
    let cf = sim.flag(Cpu::CF);
    let zf = sim.flag(Cpu::ZF);
    let sf = sim.flag(Cpu::SF);
    let of = sim.flag(Cpu::OF);
    let pf = sim.flag(Cpu::PF);
    match mnemonic {
        Mnemonic::Je => zf,
        Mnemonic::Jne => !zf,
        Mnemonic::Jb => cf,
        Mnemonic::Jnb => !cf,
        Mnemonic::Jbe => cf || zf,
        Mnemonic::Ja => !cf && !zf,
        Mnemonic::Jl => sf != of,
        Mnemonic::Jnl => sf == of,
        Mnemonic::Jle => (sf != of) || zf,
        Mnemonic::Jg => !((sf != of) || zf),
        Mnemonic::Jp => pf,
        Mnemonic::Jnp => !pf,
        Mnemonic::Jo => of,
        Mnemonic::Jno => !of,
        Mnemonic::Js => sf,
        _ => !sf, // Jns
    }
}

/// JMP in all its forms: relative, far direct, and register/memory
/// indirect (near and far)
pub(crate) fn jmp(sim: &mut Simulator, inst: &Instruction, old_ip: u16, trace: &mut String) {
    let Some(dest) = &inst.dest else {
        return;
    };
    match dest {
        Operand::Label(disp) => {
            let target = relative_target(old_ip, *disp);
            sim.cpu.set(Reg::Ip, target);
        }
        Operand::FarPointer { cs, ip } => {
            sim.write_slot_traced(Reg::Cs, *cs, trace);
            sim.cpu.set(Reg::Ip, *ip);
        }
        Operand::Memory(m) if inst.mnemonic == Mnemonic::JmpFar => {
            let addr = sim.operand_address(m);
            let ip = sim.mem.read_u16(addr);
            let cs = sim.mem.read_u16(addr.wrapping_add(2));
            sim.write_slot_traced(Reg::Cs, cs, trace);
            sim.cpu.set(Reg::Ip, ip);
        }
        _ => {
            let target = sim.read_operand(dest, Width::Word);
            sim.cpu.set(Reg::Ip, target);
        }
    }
}

/// CALL: push the return address (CS too for far forms), then transfer
pub(crate) fn call(sim: &mut Simulator, inst: &Instruction, old_ip: u16, trace: &mut String) {
    let Some(dest) = &inst.dest else {
        return;
    };
    let return_ip = sim.cpu.get(Reg::Ip);
    match dest {
        Operand::Label(disp) => {
            push_word(sim, return_ip, trace);
            let target = relative_target(old_ip, *disp);
            sim.cpu.set(Reg::Ip, target);
        }
        Operand::FarPointer { cs, ip } => {
            let return_cs = sim.cpu.get(Reg::Cs);
            push_word(sim, return_cs, trace);
            push_word(sim, return_ip, trace);
            sim.write_slot_traced(Reg::Cs, *cs, trace);
            sim.cpu.set(Reg::Ip, *ip);
        }
        Operand::Memory(m) if inst.mnemonic == Mnemonic::CallFar => {
            let addr = sim.operand_address(m);
            let ip = sim.mem.read_u16(addr);
            let cs = sim.mem.read_u16(addr.wrapping_add(2));
            let return_cs = sim.cpu.get(Reg::Cs);
            push_word(sim, return_cs, trace);
            push_word(sim, return_ip, trace);
            sim.write_slot_traced(Reg::Cs, cs, trace);
            sim.cpu.set(Reg::Ip, ip);
        }
        _ => {
            let target = sim.read_operand(dest, Width::Word);
            push_word(sim, return_ip, trace);
            sim.cpu.set(Reg::Ip, target);
        }
    }
}

/// RET/RETF, with the optional imm16 stack adjustment
pub(crate) fn ret(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let ip = pop_word(sim, trace);
    sim.cpu.set(Reg::Ip, ip);
    if inst.mnemonic == Mnemonic::Retf {
        let cs = pop_word(sim, trace);
        sim.write_slot_traced(Reg::Cs, cs, trace);
    }
    if let Some(Operand::Immediate(imm)) = &inst.dest {
        let sp = sim.cpu.get(Reg::Sp).wrapping_add(imm.value as u16);
        sim.write_slot_traced(Reg::Sp, sp, trace);
    }
}

/// Jcc: transfer when the predicate holds
pub(crate) fn conditional_jump(sim: &mut Simulator, inst: &Instruction, old_ip: u16) {
    let Some(Operand::Label(disp)) = &inst.dest else {
        return;
    };
    if condition(sim, inst.mnemonic) {
        let target = relative_target(old_ip, *disp);
        sim.cpu.set(Reg::Ip, target);
    }
}

/// LOOP/LOOPZ/LOOPNZ: decrement CX, then jump while it is nonzero (and
/// ZF agrees for the conditional variants)
pub(crate) fn loop_op(sim: &mut Simulator, inst: &Instruction, old_ip: u16, trace: &mut String) {
    let Some(Operand::Label(disp)) = &inst.dest else {
        return;
    };
    let cx = sim.cpu.get(Reg::Cx).wrapping_sub(1);
    sim.write_slot_traced(Reg::Cx, cx, trace);
    let taken = match inst.mnemonic {
        Mnemonic::Loopz => cx != 0 && sim.flag(Cpu::ZF),
        Mnemonic::Loopnz => cx != 0 && !sim.flag(Cpu::ZF),
        _ => cx != 0,
    };
    if taken {
        let target = relative_target(old_ip, *disp);
        sim.cpu.set(Reg::Ip, target);
    }
}

/// JCXZ: jump when CX is already zero; no decrement
pub(crate) fn jcxz(sim: &mut Simulator, inst: &Instruction, old_ip: u16) {
    let Some(Operand::Label(disp)) = &inst.dest else {
        return;
    };
    if sim.cpu.get(Reg::Cx) == 0 {
        let target = relative_target(old_ip, *disp);
        sim.cpu.set(Reg::Ip, target);
    }
}
