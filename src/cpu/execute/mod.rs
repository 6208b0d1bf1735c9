//! Instruction execution
//!
//! The simulator owns the CPU register file and the one-megabyte memory.
//! Its run loop is driven by the CPU's own CS:IP rather than iteration
//! over a pre-decoded list: each step decodes the instruction at the
//! current physical address, advances IP past it, dispatches by mnemonic,
//! and emits a trace line describing every register, IP, and flag change.

pub mod arithmetic;
pub mod control_flow;
pub mod data_transfer;
pub mod logic;
pub mod stack;
pub mod string;

use std::fmt::Write as _;
use std::io;

use thiserror::Error;

use crate::cpu::decode::{
    decode_instruction, ByteReader, DecodeError, Instruction, MemoryOperand, Mnemonic, Operand,
    Register, Width,
};
use crate::cpu::state::{Cpu, Reg};
use crate::memory::Memory;

/// Bound on executed instructions per run, so self-loops like `jmp $+0`
/// terminate
pub const STEP_LIMIT: u64 = 1_000_000;

/// Execution failure
#[derive(Debug, Error)]
pub enum ExecError {
    /// Decoded fine, but the simulator has no semantics for it
    #[error("unimplemented instruction {mnemonic}")]
    Unimplemented { mnemonic: &'static str },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The simulated machine: registers, memory, and the loaded program's
/// bounds
pub struct Simulator {
    pub cpu: Cpu,
    pub mem: Memory,
    program_start: u32,
    program_end: u32,
    halted: bool,
}

impl Simulator {
    /// Machine with zeroed registers and memory and no program
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            mem: Memory::new(),
            program_start: 0,
            program_end: 0,
            halted: false,
        }
    }

    /// Place a program image in memory and point CS:IP at it
    ///
    /// The offset must stay below 64 KiB since CS is left at zero. The
    /// recorded bounds decide when the run loop stops: execution ends as
    /// soon as IP leaves `[offset, offset + len)`.
    pub fn load_program(&mut self, data: &[u8], offset: u32) {
        self.mem.load(data, offset as usize);
        self.program_start = offset;
        self.program_end = offset + data.len() as u32;
        self.cpu.set(Reg::Ip, offset as u16);
    }

    /// Fetch-decode-execute until IP leaves the program, HLT, the step
    /// cap, or an error
    pub fn run<W: io::Write>(&mut self, out: &mut W) -> Result<(), ExecError> {
        self.run_with_limit(out, STEP_LIMIT)
    }

    /// [`Self::run`] with a caller-chosen instruction cap
    pub fn run_with_limit<W: io::Write>(
        &mut self,
        out: &mut W,
        limit: u64,
    ) -> Result<(), ExecError> {
        let mut steps: u64 = 0;
        while !self.halted {
            let phys =
                Cpu::physical_address(self.cpu.get(Reg::Cs), self.cpu.get(Reg::Ip));
            if phys < self.program_start || phys >= self.program_end {
                break;
            }
            if steps >= limit {
                log::warn!("stopping after {} instructions (step limit)", limit);
                break;
            }
            self.step(out)?;
            steps += 1;
        }
        Ok(())
    }

    /// Execute the single instruction at CS:IP
    pub fn step<W: io::Write>(&mut self, out: &mut W) -> Result<(), ExecError> {
        let old_ip = self.cpu.get(Reg::Ip);
        let old_flags = self.cpu.get(Reg::Flags);
        let phys = Cpu::physical_address(self.cpu.get(Reg::Cs), old_ip) as usize;

        let mut reader = ByteReader::new(self.mem.as_slice(), phys);
        let inst = decode_instruction(&mut reader)?;
        let length = (reader.pos() - phys) as u16;

        // IP points past the instruction before it executes; relative
        // jumps adjust from there.
        self.cpu.set(Reg::Ip, old_ip.wrapping_add(length));

        let mut trace = String::new();
        self.dispatch(&inst, old_ip, &mut trace)?;

        let new_ip = self.cpu.get(Reg::Ip);
        let _ = write!(trace, " ip:{:#x}->{:#x}", old_ip, new_ip);
        let new_flags = self.cpu.get(Reg::Flags);
        if new_flags != old_flags {
            let _ = write!(
                trace,
                " flags:{}->{}",
                Cpu::flag_letters(old_flags),
                Cpu::flag_letters(new_flags)
            );
        }
        writeln!(out, "{} ;{}", inst, trace)?;
        Ok(())
    }

    fn dispatch(
        &mut self,
        inst: &Instruction,
        old_ip: u16,
        trace: &mut String,
    ) -> Result<(), ExecError> {
        match inst.mnemonic {
            Mnemonic::Mov => data_transfer::mov(self, inst, trace),
            Mnemonic::Xchg => data_transfer::xchg(self, inst, trace),
            Mnemonic::Lea => data_transfer::lea(self, inst, trace),
            Mnemonic::Lds | Mnemonic::Les => data_transfer::load_pointer(self, inst, trace),
            Mnemonic::Xlat => data_transfer::xlat(self, trace),
            Mnemonic::Lahf => data_transfer::lahf(self, trace),
            Mnemonic::Sahf => data_transfer::sahf(self),
            Mnemonic::Cbw => data_transfer::cbw(self, trace),
            Mnemonic::Cwd => data_transfer::cwd(self, trace),

            Mnemonic::Add | Mnemonic::Adc | Mnemonic::Sub | Mnemonic::Sbb | Mnemonic::Cmp => {
                arithmetic::binary(self, inst, trace)
            }
            Mnemonic::Inc | Mnemonic::Dec => arithmetic::step_by_one(self, inst, trace),
            Mnemonic::Neg => arithmetic::neg(self, inst, trace),

            Mnemonic::And | Mnemonic::Or | Mnemonic::Xor | Mnemonic::Test => {
                logic::boolean(self, inst, trace)
            }
            Mnemonic::Not => logic::not(self, inst, trace),
            Mnemonic::Shl
            | Mnemonic::Shr
            | Mnemonic::Sar
            | Mnemonic::Rol
            | Mnemonic::Ror
            | Mnemonic::Rcl
            | Mnemonic::Rcr => logic::shift_rotate(self, inst, trace),

            Mnemonic::Push => stack::push(self, inst, trace),
            Mnemonic::Pop => stack::pop(self, inst, trace),
            Mnemonic::Pushf => stack::pushf(self, trace),
            Mnemonic::Popf => stack::popf(self, trace),

            Mnemonic::Call | Mnemonic::CallFar => control_flow::call(self, inst, old_ip, trace),
            Mnemonic::Jmp | Mnemonic::JmpNear | Mnemonic::JmpFar => {
                control_flow::jmp(self, inst, old_ip, trace)
            }
            Mnemonic::Ret | Mnemonic::Retf => control_flow::ret(self, inst, trace),
            Mnemonic::Je
            | Mnemonic::Jne
            | Mnemonic::Jb
            | Mnemonic::Jnb
            | Mnemonic::Jbe
            | Mnemonic::Ja
            | Mnemonic::Jl
            | Mnemonic::Jnl
            | Mnemonic::Jle
            | Mnemonic::Jg
            | Mnemonic::Jp
            | Mnemonic::Jnp
            | Mnemonic::Jo
            | Mnemonic::Jno
            | Mnemonic::Js
            | Mnemonic::Jns => control_flow::conditional_jump(self, inst, old_ip),
            Mnemonic::Loop | Mnemonic::Loopz | Mnemonic::Loopnz => {
                control_flow::loop_op(self, inst, old_ip, trace)
            }
            Mnemonic::Jcxz => control_flow::jcxz(self, inst, old_ip),

            Mnemonic::Movs
            | Mnemonic::Cmps
            | Mnemonic::Scas
            | Mnemonic::Lods
            | Mnemonic::Stos => string::string_op(self, inst, trace),

            Mnemonic::Clc => self.update_flag(Cpu::CF, false),
            Mnemonic::Stc => self.update_flag(Cpu::CF, true),
            Mnemonic::Cmc => {
                let carry = self.flag(Cpu::CF);
                self.update_flag(Cpu::CF, !carry);
            }
            Mnemonic::Cld => self.update_flag(Cpu::DF, false),
            Mnemonic::Std => self.update_flag(Cpu::DF, true),
            Mnemonic::Cli => self.update_flag(Cpu::IF, false),
            Mnemonic::Sti => self.update_flag(Cpu::IF, true),

            Mnemonic::Hlt => self.halted = true,

            // Decoded but not simulated
            _ => {
                return Err(ExecError::Unimplemented {
                    mnemonic: inst.mnemonic.name(),
                })
            }
        }
        Ok(())
    }

    // === Flags ===

    pub(crate) fn flags(&self) -> u16 {
        self.cpu.get(Reg::Flags)
    }

    pub(crate) fn set_flags(&mut self, flags: u16) {
        self.cpu.set(Reg::Flags, flags);
    }

    pub(crate) fn flag(&self, bit: u16) -> bool {
        self.flags() & bit != 0
    }

    pub(crate) fn update_flag(&mut self, bit: u16, value: bool) {
        let flags = self.flags();
        self.set_flags(if value { flags | bit } else { flags & !bit });
    }

    // === Operand plumbing ===

    /// The size an instruction operates at, from its operands
    pub(crate) fn operation_width(inst: &Instruction) -> Width {
        inst.dest
            .as_ref()
            .and_then(Operand::width)
            .or_else(|| inst.source.as_ref().and_then(Operand::width))
            .or(inst.width)
            .unwrap_or(Width::Word)
    }

    /// Offset part of a memory operand's effective address
    pub(crate) fn effective_offset(&self, m: &MemoryOperand) -> u16 {
        let disp = m.disp as u16;
        if m.direct {
            return disp;
        }
        let base = match m.formula {
            0b000 => self.cpu.get(Reg::Bx).wrapping_add(self.cpu.get(Reg::Si)),
            0b001 => self.cpu.get(Reg::Bx).wrapping_add(self.cpu.get(Reg::Di)),
            0b010 => self.cpu.get(Reg::Bp).wrapping_add(self.cpu.get(Reg::Si)),
            0b011 => self.cpu.get(Reg::Bp).wrapping_add(self.cpu.get(Reg::Di)),
            0b100 => self.cpu.get(Reg::Si),
            0b101 => self.cpu.get(Reg::Di),
            0b110 => self.cpu.get(Reg::Bp),
            _ => self.cpu.get(Reg::Bx),
        };
        base.wrapping_add(disp)
    }

    /// Physical address of a memory operand: the override segment if one
    /// was attached, otherwise SS for BP-based formulas and DS for the
    /// rest
    pub(crate) fn operand_address(&self, m: &MemoryOperand) -> u32 {
        let seg_slot = match m.segment {
            Some(seg) => Reg::from_seg_index(seg.index()),
            None if m.bp_based() => Reg::Ss,
            None => Reg::Ds,
        };
        Cpu::physical_address(self.cpu.get(seg_slot), self.effective_offset(m))
    }

    pub(crate) fn read_mem(&self, addr: u32, width: Width) -> u16 {
        match width {
            Width::Byte => self.mem.read_u8(addr) as u16,
            Width::Word => self.mem.read_u16(addr),
        }
    }

    pub(crate) fn write_mem(&mut self, addr: u32, width: Width, value: u16) {
        match width {
            Width::Byte => self.mem.write_u8(addr, value as u8),
            Width::Word => self.mem.write_u16(addr, value),
        }
    }

    /// Value of an operand at the given operation width
    pub(crate) fn read_operand(&self, op: &Operand, width: Width) -> u16 {
        match op {
            Operand::Register(reg) => self.cpu.read_register(*reg),
            Operand::Memory(m) => self.read_mem(self.operand_address(m), width),
            Operand::Immediate(imm) => imm.value as u16,
            Operand::Label(disp) => *disp as u16,
            Operand::FarPointer { ip, .. } => *ip,
        }
    }

    /// Store into a register or memory operand
    pub(crate) fn write_operand(
        &mut self,
        op: &Operand,
        width: Width,
        value: u16,
        trace: &mut String,
    ) {
        match op {
            Operand::Register(reg) => self.write_register_traced(*reg, value, trace),
            Operand::Memory(m) => self.write_mem(self.operand_address(m), width, value),
            _ => panic!("write to a value operand: {:?}", op),
        }
    }

    /// Register write with the ` name:0xold->0xnew` trace entry
    ///
    /// Byte writes trace under the canonical wide name with the whole
    /// slot's before/after values.
    pub(crate) fn write_register_traced(&mut self, reg: Register, value: u16, trace: &mut String) {
        let slot = Cpu::slot_of(reg);
        let old = self.cpu.get(slot);
        self.cpu.write_register(reg, value);
        let new = self.cpu.get(slot);
        let _ = write!(trace, " {}:{:#x}->{:#x}", slot.name(), old, new);
    }

    /// Direct slot write with trace (SP, CX and friends)
    pub(crate) fn write_slot_traced(&mut self, slot: Reg, value: u16, trace: &mut String) {
        let old = self.cpu.get(slot);
        self.cpu.set(slot, value);
        let _ = write!(trace, " {}:{:#x}->{:#x}", slot.name(), old, value);
    }

    /// Final register report: nonzero registers, IP, and set flags
    pub fn print_final_registers<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "Final registers:")?;
        const REPORT_ORDER: [Reg; 12] = [
            Reg::Ax,
            Reg::Bx,
            Reg::Cx,
            Reg::Dx,
            Reg::Sp,
            Reg::Bp,
            Reg::Si,
            Reg::Di,
            Reg::Es,
            Reg::Cs,
            Reg::Ss,
            Reg::Ds,
        ];
        for reg in REPORT_ORDER {
            let value = self.cpu.get(reg);
            if value != 0 {
                writeln!(out, "      {}: 0x{:04x} ({})", reg.name(), value, value)?;
            }
        }
        let ip = self.cpu.get(Reg::Ip);
        writeln!(out, "      ip: 0x{:04x} ({})", ip, ip)?;
        let flags = self.cpu.get(Reg::Flags);
        if flags != 0 {
            writeln!(out, "   flags: {}", Cpu::flag_letters(flags))?;
        }
        Ok(())
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
