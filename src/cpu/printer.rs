//! Textual rendering of decoded instructions
//!
//! Produces one deterministic line per instruction in NASM syntax:
//! optional `lock `/`rep ` prefixes, the mnemonic (string ops take a
//! `b`/`w` suffix), then `dest, source`. Immediates and displacements
//! print in signed decimal; direct addresses and far pointers in unsigned
//! decimal. Relative labels print as `$` plus the displacement adjusted
//! for the two-byte length of a short jump.

use std::fmt;

use crate::cpu::decode::{
    Immediate, Instruction, MemoryOperand, Operand, Register, SegmentReg, Width,
};

const BYTE_REG_NAMES: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
const WORD_REG_NAMES: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];
const SEG_REG_NAMES: [&str; 4] = ["es", "cs", "ss", "ds"];

/// Effective-address formula text, indexed by the r/m encoding
const EA_FORMULAS: [&str; 8] = [
    "bx + si",
    "bx + di",
    "bp + si",
    "bp + di",
    "si",
    "di",
    "bp",
    "bx",
];

/// Assembler name of a register operand
pub fn register_name(reg: &Register) -> &'static str {
    if reg.segment {
        SEG_REG_NAMES[(reg.index & 0b11) as usize]
    } else {
        match reg.width {
            Width::Byte => BYTE_REG_NAMES[reg.index as usize],
            Width::Word => WORD_REG_NAMES[reg.index as usize],
        }
    }
}

fn segment_prefix(seg: SegmentReg) -> &'static str {
    match seg {
        SegmentReg::Es => "es:",
        SegmentReg::Cs => "cs:",
        SegmentReg::Ss => "ss:",
        SegmentReg::Ds => "ds:",
    }
}

fn fmt_memory(m: &MemoryOperand, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if m.explicit_size {
        match m.width {
            Some(Width::Byte) => write!(f, "byte ")?,
            Some(Width::Word) => write!(f, "word ")?,
            None => {}
        }
    }
    if let Some(seg) = m.segment {
        write!(f, "{}", segment_prefix(seg))?;
    }
    if m.direct {
        return write!(f, "[{}]", m.disp as u16);
    }
    write!(f, "[{}", EA_FORMULAS[m.formula as usize])?;
    if m.disp > 0 {
        write!(f, " + {}", m.disp)?;
    } else if m.disp < 0 {
        write!(f, " - {}", -(m.disp as i32))?;
    }
    write!(f, "]")
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(reg) => f.write_str(register_name(reg)),
            Operand::Memory(m) => fmt_memory(m, f),
            Operand::Immediate(Immediate { value, .. }) => write!(f, "{}", value),
            // Short jumps store their displacement relative to the end of
            // the two-byte encoding; `$` is the instruction start.
            Operand::Label(disp) => write!(f, "${:+}", (*disp as i32) + 2),
            Operand::FarPointer { cs, ip } => write!(f, "{}:{}", cs, ip),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lock {
            write!(f, "lock ")?;
        }
        if self.rep {
            write!(f, "rep ")?;
        }
        write!(f, "{}", self.mnemonic.name())?;
        if self.mnemonic.is_string_op() {
            match self.width {
                Some(Width::Byte) => write!(f, "b")?,
                Some(Width::Word) => write!(f, "w")?,
                None => {}
            }
        }
        if let Some(dest) = &self.dest {
            write!(f, " {}", dest)?;
            if let Some(source) = &self.source {
                write!(f, ", {}", source)?;
            }
        }
        Ok(())
    }
}
