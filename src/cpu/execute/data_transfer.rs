//! Data movement semantics (MOV, XCHG, LEA, pointer loads, converts)

use super::Simulator;
use crate::cpu::decode::{Instruction, Mnemonic, Operand, Register, SegmentReg, Width};
use crate::cpu::state::{Cpu, Reg};

/// MOV: copy source to dest, no flag effects
pub(crate) fn mov(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let (Some(dest), Some(source)) = (&inst.dest, &inst.source) else {
        return;
    };
    let width = Simulator::operation_width(inst);
    let value = sim.read_operand(source, width);
    sim.write_operand(dest, width, value, trace);
}

/// XCHG: swap dest and source
pub(crate) fn xchg(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let (Some(dest), Some(source)) = (&inst.dest, &inst.source) else {
        return;
    };
    let width = Simulator::operation_width(inst);
    let a = sim.read_operand(dest, width);
    let b = sim.read_operand(source, width);
    sim.write_operand(dest, width, b, trace);
    sim.write_operand(source, width, a, trace);
}

/// LEA: the effective address itself, no memory access
pub(crate) fn lea(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let (Some(dest), Some(Operand::Memory(m))) = (&inst.dest, &inst.source) else {
        return;
    };
    let offset = sim.effective_offset(m);
    sim.write_operand(dest, Width::Word, offset, trace);
}

/// LDS/LES: load a 32-bit pointer from memory into reg and DS/ES
pub(crate) fn load_pointer(sim: &mut Simulator, inst: &Instruction, trace: &mut String) {
    let (Some(dest), Some(Operand::Memory(m))) = (&inst.dest, &inst.source) else {
        return;
    };
    let addr = sim.operand_address(m);
    let offset = sim.mem.read_u16(addr);
    let segment = sim.mem.read_u16(addr.wrapping_add(2));
    sim.write_operand(dest, Width::Word, offset, trace);
    let seg_reg = if inst.mnemonic == Mnemonic::Lds {
        SegmentReg::Ds
    } else {
        SegmentReg::Es
    };
    sim.write_register_traced(Register::seg(seg_reg), segment, trace);
}

/// XLAT: AL = [DS:BX + AL]
pub(crate) fn xlat(sim: &mut Simulator, trace: &mut String) {
    let al = sim.cpu.read_register(Register::byte(0));
    let offset = sim.cpu.get(Reg::Bx).wrapping_add(al);
    let addr = Cpu::physical_address(sim.cpu.get(Reg::Ds), offset);
    let value = sim.mem.read_u8(addr) as u16;
    sim.write_register_traced(Register::byte(0), value, trace);
}

/// LAHF: AH = the low-byte flags (SF ZF AF PF CF)
pub(crate) fn lahf(sim: &mut Simulator, trace: &mut String) {
    let low = sim.flags() & (Cpu::SF | Cpu::ZF | Cpu::AF | Cpu::PF | Cpu::CF);
    sim.write_register_traced(Register::byte(4), low, trace);
}

/// SAHF: low-byte flags = AH
pub(crate) fn sahf(sim: &mut Simulator) {
    let ah = sim.cpu.read_register(Register::byte(4));
    let keep = sim.flags() & !(Cpu::SF | Cpu::ZF | Cpu::AF | Cpu::PF | Cpu::CF);
    sim.set_flags(keep | (ah & (Cpu::SF | Cpu::ZF | Cpu::AF | Cpu::PF | Cpu::CF)));
}

/// CBW: AX = sign-extended AL
pub(crate) fn cbw(sim: &mut Simulator, trace: &mut String) {
    let al = sim.cpu.read_register(Register::byte(0)) as u8;
    sim.write_register_traced(Register::word(0), al as i8 as i16 as u16, trace);
}

/// CWD: DX = sign bits of AX
pub(crate) fn cwd(sim: &mut Simulator, trace: &mut String) {
    let ax = sim.cpu.get(Reg::Ax);
    let dx = if ax & 0x8000 != 0 { 0xFFFF } else { 0 };
    sim.write_register_traced(Register::word(2), dx, trace);
}
