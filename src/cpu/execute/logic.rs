//! Boolean, shift, and rotate semantics
//!
//! Boolean ops clear CF, OF, and AF and set ZF/SF/PF from the result.
//! Shifts and rotates run one bit position per count step, carrying the
//! shifted-out bit through CF; OF follows the single-shift definitions on
//! the last step. NOT touches no flags.

use super::arithmetic::{set_szp, width_masks};
use super::Simulator;
use crate::cpu::decode::{Instruction, Mnemonic, Width};
use crate::cpu::state::Cpu;

/// AND/OR/XOR/TEST; TEST discards the result
pub(crate) fn boolean(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let (Some(dest), Some(source)) = (&inst.dest, &inst.source) else {
        return;
    };
    let width = Simulator::operation_width(inst);
    let a = sim.read_operand(dest, width);
    let b = sim.read_operand(source, width);

    let result = match inst.mnemonic {
        Mnemonic::And | Mnemonic::Test => a & b,
        Mnemonic::Or => a | b,
        _ => a ^ b,
    };

    let mut flags = sim.flags() & !(Cpu::CF | Cpu::OF | Cpu::AF);
    set_szp(result, width, &mut flags);
    if inst.mnemonic != Mnemonic::Test {
        sim.write_operand(dest, width, result, trace);
    }
    sim.set_flags(flags);
}

/// NOT: bitwise complement, no flag effects
pub(crate) fn not(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let Some(dest) = &inst.dest else {
        return;
    };
    let width = Simulator::operation_width(inst);
    let a = sim.read_operand(dest, width);
    sim.write_operand(dest, width, !a, trace);
}

/// SHL/SHR/SAR/ROL/ROR/RCL/RCR with a count of 1 or CL
pub(crate) fn shift_rotate(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let (Some(dest), Some(source)) = (&inst.dest, &inst.source) else {
        return;
    };
    let width = Simulator::operation_width(inst);
    let count = sim.read_operand(source, Width::Byte) & 0xFF;
    if count == 0 {
        return;
    }

    let (mask, _, sign) = width_masks(width);
    let mut v = sim.read_operand(dest, width) as u32 & mask;
    let mut cf = sim.flag(Cpu::CF);
    let mut of = sim.flag(Cpu::OF);

    for _ in 0..count {
        match inst.mnemonic {
            Mnemonic::Shl => {
                cf = v & sign != 0;
                v = (v << 1) & mask;
                of = (v & sign != 0) != cf;
            }
            Mnemonic::Shr => {
                of = v & sign != 0;
                cf = v & 1 != 0;
                v >>= 1;
            }
            Mnemonic::Sar => {
                cf = v & 1 != 0;
                v = (v >> 1) | (v & sign);
                of = false;
            }
            Mnemonic::Rol => {
                let msb = v & sign != 0;
                v = ((v << 1) | msb as u32) & mask;
                cf = msb;
                of = (v & sign != 0) != cf;
            }
            Mnemonic::Ror => {
                let lsb = v & 1 != 0;
                v = (v >> 1) | if lsb { sign } else { 0 };
                cf = lsb;
                of = (v & sign != 0) != (v & (sign >> 1) != 0);
            }
            Mnemonic::Rcl => {
                let msb = v & sign != 0;
                v = ((v << 1) | cf as u32) & mask;
                cf = msb;
                of = (v & sign != 0) != cf;
            }
            _ => {
                // RCR
                let lsb = v & 1 != 0;
                v = (v >> 1) | if cf { sign } else { 0 };
                cf = lsb;
                of = (v & sign != 0) != (v & (sign >> 1) != 0);
            }
        }
    }

    let result = v as u16;
    let mut flags = sim.flags() & !(Cpu::CF | Cpu::OF);
    if cf {
        flags |= Cpu::CF;
    }
    if of {
        flags |= Cpu::OF;
    }
    // Rotates leave ZF/SF/PF alone; shifts recompute them (AF undefined)
    if matches!(
        inst.mnemonic,
        Mnemonic::Shl | Mnemonic::Shr | Mnemonic::Sar
    ) {
        flags &= !Cpu::AF;
        set_szp(result, width, &mut flags);
    }

    sim.write_operand(dest, width, result, trace);
    sim.set_flags(flags);
}
