//! Instruction decoder
//!
//! One decode call consumes any prefix bytes (LOCK, segment override, REP)
//! and then one complete instruction. Classification follows the 8086
//! first-byte patterns; sub-opcode groups (0x80, 0xD0, 0xF6, 0xFE, 0xFF)
//! look at the reg field of the ModR/M byte. The decoder is restartable:
//! each call is a pure function of the slice and the reader position.

use super::error::DecodeError;
use super::instruction::{Instruction, Mnemonic};
use super::modrm::ModRM;
use super::operands::{Immediate, MemoryOperand, Operand, SegmentReg, Width};
use super::reader::ByteReader;

/// Decode one instruction starting at the reader's position
pub fn decode_instruction(r: &mut ByteReader) -> Result<Instruction, DecodeError> {
    let addr = r.pos() as u32;
    let mut lock = false;
    let mut segment: Option<SegmentReg> = None;

    // Prefix state lives only until the first non-prefix byte.
    loop {
        let byte = r.read_u8("opcode")?;
        match byte {
            // LOCK
            0xF0 => lock = true,
            // Segment override 001SR110
            0x26 | 0x2E | 0x36 | 0x3E => segment = Some(SegmentReg::from_index((byte >> 3) & 0b11)),
            // REP 1111001Z; must be followed by a string op. The Z bit is
            // not used to tell REPE from REPNE.
            0xF2 | 0xF3 => {
                let op = r.read_u8("string opcode after rep")?;
                let mut inst = decode_string_op(op, addr).ok_or(DecodeError::UnknownOpcode {
                    byte: op,
                })?;
                inst.lock = lock;
                inst.rep = true;
                return Ok(inst);
            }
            _ => {
                let mut inst = decode_form(r, byte, addr, segment)?;
                inst.lock = lock;
                return Ok(inst);
            }
        }
    }
}

/// Mnemonics of the `00OP0xxW` arithmetic families, indexed by OP
const ARITH_FAMILY: [Mnemonic; 8] = [
    Mnemonic::Add,
    Mnemonic::Or,
    Mnemonic::Adc,
    Mnemonic::Sbb,
    Mnemonic::And,
    Mnemonic::Sub,
    Mnemonic::Xor,
    Mnemonic::Cmp,
];

/// Conditional jumps 0x70-0x7F in opcode order
const COND_JUMPS: [Mnemonic; 16] = [
    Mnemonic::Jo,
    Mnemonic::Jno,
    Mnemonic::Jb,
    Mnemonic::Jnb,
    Mnemonic::Je,
    Mnemonic::Jne,
    Mnemonic::Jbe,
    Mnemonic::Ja,
    Mnemonic::Js,
    Mnemonic::Jns,
    Mnemonic::Jp,
    Mnemonic::Jnp,
    Mnemonic::Jl,
    Mnemonic::Jnl,
    Mnemonic::Jle,
    Mnemonic::Jg,
];

/// String ops 1010x1xW; shared between the plain and REP-prefixed paths
fn decode_string_op(byte: u8, addr: u32) -> Option<Instruction> {
    let width = Width::from_w_bit(byte & 1 != 0);
    let mnemonic = match byte & !1 {
        0xA4 => Mnemonic::Movs,
        0xA6 => Mnemonic::Cmps,
        0xAA => Mnemonic::Stos,
        0xAC => Mnemonic::Lods,
        0xAE => Mnemonic::Scas,
        _ => return None,
    };
    Some(Instruction::new(addr, mnemonic).with_width(width))
}

/// Attach a pending segment override to a memory operand
fn apply_segment(op: Operand, segment: Option<SegmentReg>) -> Operand {
    match op {
        Operand::Memory(m) => Operand::Memory(m.with_segment(segment)),
        other => other,
    }
}

/// Mark a memory operand as needing a printed size keyword
fn mark_explicit_size(op: Operand) -> Operand {
    match op {
        Operand::Memory(m) => Operand::Memory(m.with_explicit_size()),
        other => other,
    }
}

/// Read an immediate of exactly `width` bytes, sign-extending byte values
fn read_imm(r: &mut ByteReader, width: Width) -> Result<Operand, DecodeError> {
    let imm = match width {
        Width::Byte => Immediate {
            width: Width::Byte,
            value: r.read_i8("immediate")? as i16,
        },
        Width::Word => Immediate {
            width: Width::Word,
            value: r.read_i16("immediate")?,
        },
    };
    Ok(Operand::Immediate(imm))
}

/// Dispatch on the first non-prefix byte
fn decode_form(
    r: &mut ByteReader,
    byte: u8,
    addr: u32,
    segment: Option<SegmentReg>,
) -> Result<Instruction, DecodeError> {
    let w_bit = Width::from_w_bit(byte & 1 != 0);

    let inst = match byte {
        // MOV r/m <-> reg: 100010DW
        0x88..=0x8B => {
            let modrm = ModRM::read(r)?;
            let reg = Operand::reg(modrm.reg, w_bit);
            let rm = apply_segment(modrm.rm_operand(r, Some(w_bit))?, segment);
            let to_reg = byte & 0b10 != 0;
            let (dest, source) = if to_reg { (reg, rm) } else { (rm, reg) };
            Instruction::new(addr, Mnemonic::Mov)
                .with_dest(dest)
                .with_source(source)
        }

        // MOV r/m <- imm: 1100011W (reg field unused)
        0xC6 | 0xC7 => {
            let modrm = ModRM::read(r)?;
            let rm = apply_segment(
                mark_explicit_size(modrm.rm_operand(r, Some(w_bit))?),
                segment,
            );
            let imm = read_imm(r, w_bit)?;
            Instruction::new(addr, Mnemonic::Mov)
                .with_dest(rm)
                .with_source(imm)
        }

        // MOV reg <- imm: 1011WREG
        0xB0..=0xBF => {
            let width = Width::from_w_bit(byte & 0b1000 != 0);
            let reg = Operand::reg(byte & 0b111, width);
            let imm = read_imm(r, width)?;
            Instruction::new(addr, Mnemonic::Mov)
                .with_dest(reg)
                .with_source(imm)
        }

        // MOV accumulator <-> direct address: 101000DW
        0xA0..=0xA3 => {
            let acc = Operand::accumulator(w_bit);
            let address = r.read_u16("direct address")?;
            let mem = apply_segment(
                Operand::Memory(MemoryOperand::direct(address, Some(w_bit))),
                segment,
            );
            let to_acc = byte & 0b10 == 0;
            let (dest, source) = if to_acc { (acc, mem) } else { (mem, acc) };
            Instruction::new(addr, Mnemonic::Mov)
                .with_dest(dest)
                .with_source(source)
        }

        // MOV r/m <-> sreg: 100011D0
        0x8C | 0x8E => {
            let modrm = ModRM::read(r)?;
            if modrm.reg > 3 {
                return Err(DecodeError::IllegalSegmentSelector {
                    byte,
                    selector: modrm.reg,
                });
            }
            let sreg = Operand::seg(SegmentReg::from_index(modrm.reg));
            let rm = apply_segment(modrm.rm_operand(r, Some(Width::Word))?, segment);
            let to_sreg = byte == 0x8E;
            let (dest, source) = if to_sreg { (sreg, rm) } else { (rm, sreg) };
            Instruction::new(addr, Mnemonic::Mov)
                .with_dest(dest)
                .with_source(source)
        }

        // Group: INC/DEC/CALL/CALL far/JMP/JMP far/PUSH r/m16
        0xFF => {
            let modrm = ModRM::read(r)?;
            let rm = apply_segment(modrm.rm_operand(r, Some(Width::Word))?, segment);
            let (mnemonic, sized) = match modrm.reg {
                0 => (Mnemonic::Inc, true),
                1 => (Mnemonic::Dec, true),
                2 => (Mnemonic::Call, false),
                3 => (Mnemonic::CallFar, false),
                4 => (Mnemonic::Jmp, false),
                5 => (Mnemonic::JmpFar, false),
                6 => (Mnemonic::Push, true),
                _ => {
                    return Err(DecodeError::IllegalSubOp {
                        byte,
                        subop: modrm.reg,
                    })
                }
            };
            let rm = if sized { mark_explicit_size(rm) } else { rm };
            Instruction::new(addr, mnemonic).with_dest(rm)
        }

        // INC/DEC r/m8: 11111110
        0xFE => {
            let modrm = ModRM::read(r)?;
            let mnemonic = match modrm.reg {
                0 => Mnemonic::Inc,
                1 => Mnemonic::Dec,
                _ => {
                    return Err(DecodeError::IllegalSubOp {
                        byte,
                        subop: modrm.reg,
                    })
                }
            };
            let rm = apply_segment(
                mark_explicit_size(modrm.rm_operand(r, Some(Width::Byte))?),
                segment,
            );
            Instruction::new(addr, mnemonic).with_dest(rm)
        }

        // POP r/m16: 10001111 (reg must be 0)
        0x8F => {
            let modrm = ModRM::read(r)?;
            if modrm.reg != 0 {
                return Err(DecodeError::IllegalSubOp {
                    byte,
                    subop: modrm.reg,
                });
            }
            let rm = apply_segment(
                mark_explicit_size(modrm.rm_operand(r, Some(Width::Word))?),
                segment,
            );
            Instruction::new(addr, Mnemonic::Pop).with_dest(rm)
        }

        // PUSH/POP reg16: 01010REG / 01011REG
        0x50..=0x57 => {
            Instruction::new(addr, Mnemonic::Push).with_dest(Operand::reg(byte & 0b111, Width::Word))
        }
        0x58..=0x5F => {
            Instruction::new(addr, Mnemonic::Pop).with_dest(Operand::reg(byte & 0b111, Width::Word))
        }

        // PUSH/POP sreg: 000SR110 / 000SR111 (0x0F is POP CS on the 8086)
        0x06 | 0x0E | 0x16 | 0x1E => Instruction::new(addr, Mnemonic::Push)
            .with_dest(Operand::seg(SegmentReg::from_index((byte >> 3) & 0b11))),
        0x07 | 0x0F | 0x17 | 0x1F => Instruction::new(addr, Mnemonic::Pop)
            .with_dest(Operand::seg(SegmentReg::from_index((byte >> 3) & 0b11))),

        // XCHG r/m, reg: 1000011W
        0x86 | 0x87 => {
            let modrm = ModRM::read(r)?;
            let reg = Operand::reg(modrm.reg, w_bit);
            let rm = apply_segment(modrm.rm_operand(r, Some(w_bit))?, segment);
            Instruction::new(addr, Mnemonic::Xchg)
                .with_dest(rm)
                .with_source(reg)
        }

        // XCHG AX, reg: 10010REG
        0x90..=0x97 => Instruction::new(addr, Mnemonic::Xchg)
            .with_dest(Operand::accumulator(Width::Word))
            .with_source(Operand::reg(byte & 0b111, Width::Word)),

        // IN/OUT with fixed port: 1110010W / 1110011W
        0xE4 | 0xE5 => {
            let port = r.read_u8("port number")?;
            Instruction::new(addr, Mnemonic::In)
                .with_dest(Operand::accumulator(w_bit))
                .with_source(Operand::imm(port as i16, Width::Byte))
        }
        0xE6 | 0xE7 => {
            let port = r.read_u8("port number")?;
            Instruction::new(addr, Mnemonic::Out)
                .with_dest(Operand::imm(port as i16, Width::Byte))
                .with_source(Operand::accumulator(w_bit))
        }

        // IN/OUT through DX: 1110110W / 1110111W
        0xEC | 0xED => Instruction::new(addr, Mnemonic::In)
            .with_dest(Operand::accumulator(w_bit))
            .with_source(Operand::reg(2, Width::Word)),
        0xEE | 0xEF => Instruction::new(addr, Mnemonic::Out)
            .with_dest(Operand::reg(2, Width::Word))
            .with_source(Operand::accumulator(w_bit)),

        // XLAT
        0xD7 => Instruction::new(addr, Mnemonic::Xlat),

        // LEA / LES / LDS: reg16 <- effective address / pointer
        0x8D | 0xC4 | 0xC5 => {
            let mnemonic = match byte {
                0x8D => Mnemonic::Lea,
                0xC4 => Mnemonic::Les,
                _ => Mnemonic::Lds,
            };
            let modrm = ModRM::read(r)?;
            let reg = Operand::reg(modrm.reg, Width::Word);
            let rm = apply_segment(modrm.rm_operand(r, None)?, segment);
            Instruction::new(addr, mnemonic)
                .with_dest(reg)
                .with_source(rm)
        }

        // PUSHF / POPF / SAHF / LAHF
        0x9C => Instruction::new(addr, Mnemonic::Pushf),
        0x9D => Instruction::new(addr, Mnemonic::Popf),
        0x9E => Instruction::new(addr, Mnemonic::Sahf),
        0x9F => Instruction::new(addr, Mnemonic::Lahf),

        // Decimal adjust family: 0010D111 pattern
        0x27 => Instruction::new(addr, Mnemonic::Daa),
        0x2F => Instruction::new(addr, Mnemonic::Das),
        0x37 => Instruction::new(addr, Mnemonic::Aaa),
        0x3F => Instruction::new(addr, Mnemonic::Aas),

        // Arithmetic families r/m <-> reg: 00OP00DW
        b @ 0x00..=0x3F if b & 0b100 == 0 => {
            let mnemonic = ARITH_FAMILY[((byte >> 3) & 0b111) as usize];
            let modrm = ModRM::read(r)?;
            let reg = Operand::reg(modrm.reg, w_bit);
            let rm = apply_segment(modrm.rm_operand(r, Some(w_bit))?, segment);
            let to_reg = byte & 0b10 != 0;
            let (dest, source) = if to_reg { (reg, rm) } else { (rm, reg) };
            Instruction::new(addr, mnemonic)
                .with_dest(dest)
                .with_source(source)
        }

        // Arithmetic accumulator <- imm: 00OP010W
        b @ 0x00..=0x3F if b & 0b110 == 0b100 => {
            let mnemonic = ARITH_FAMILY[((byte >> 3) & 0b111) as usize];
            let imm = read_imm(r, w_bit)?;
            Instruction::new(addr, mnemonic)
                .with_dest(Operand::accumulator(w_bit))
                .with_source(imm)
        }

        // Arithmetic r/m <- imm: 100000SW (sub-op selects the operation)
        0x80..=0x83 => {
            let modrm = ModRM::read(r)?;
            let mnemonic = ARITH_FAMILY[modrm.reg as usize];
            let rm = apply_segment(
                mark_explicit_size(modrm.rm_operand(r, Some(w_bit))?),
                segment,
            );
            let s_bit = byte & 0b10 != 0;
            let imm = if s_bit {
                // Sign-extended 8-bit immediate in a W-sized operation
                Operand::imm(r.read_i8("immediate")? as i16, w_bit)
            } else {
                read_imm(r, w_bit)?
            };
            Instruction::new(addr, mnemonic)
                .with_dest(rm)
                .with_source(imm)
        }

        // INC/DEC reg16: 01000REG / 01001REG
        0x40..=0x47 => {
            Instruction::new(addr, Mnemonic::Inc).with_dest(Operand::reg(byte & 0b111, Width::Word))
        }
        0x48..=0x4F => {
            Instruction::new(addr, Mnemonic::Dec).with_dest(Operand::reg(byte & 0b111, Width::Word))
        }

        // AAM / AAD: second byte must be 0b00001010
        0xD4 | 0xD5 => {
            let second = r.read_u8("second byte of AAM/AAD")?;
            if second != 0b00001010 {
                return Err(DecodeError::IllegalSecondByte {
                    byte,
                    found: second,
                });
            }
            let mnemonic = if byte == 0xD4 {
                Mnemonic::Aam
            } else {
                Mnemonic::Aad
            };
            Instruction::new(addr, mnemonic)
        }

        // CBW / CWD
        0x98 => Instruction::new(addr, Mnemonic::Cbw),
        0x99 => Instruction::new(addr, Mnemonic::Cwd),

        // Unary group: TEST/NOT/NEG/MUL/IMUL/DIV/IDIV (reg=1 reserved)
        0xF6 | 0xF7 => {
            let modrm = ModRM::read(r)?;
            let mnemonic = match modrm.reg {
                0 => Mnemonic::Test,
                2 => Mnemonic::Not,
                3 => Mnemonic::Neg,
                4 => Mnemonic::Mul,
                5 => Mnemonic::Imul,
                6 => Mnemonic::Div,
                7 => Mnemonic::Idiv,
                _ => {
                    return Err(DecodeError::IllegalSubOp {
                        byte,
                        subop: modrm.reg,
                    })
                }
            };
            let rm = apply_segment(
                mark_explicit_size(modrm.rm_operand(r, Some(w_bit))?),
                segment,
            );
            let inst = Instruction::new(addr, mnemonic).with_dest(rm);
            if mnemonic == Mnemonic::Test {
                inst.with_source(read_imm(r, w_bit)?)
            } else {
                inst
            }
        }

        // Shifts and rotates: 110100VW (reg=6 reserved)
        0xD0..=0xD3 => {
            let modrm = ModRM::read(r)?;
            let mnemonic = match modrm.reg {
                0 => Mnemonic::Rol,
                1 => Mnemonic::Ror,
                2 => Mnemonic::Rcl,
                3 => Mnemonic::Rcr,
                4 => Mnemonic::Shl,
                5 => Mnemonic::Shr,
                7 => Mnemonic::Sar,
                _ => {
                    return Err(DecodeError::IllegalSubOp {
                        byte,
                        subop: modrm.reg,
                    })
                }
            };
            let rm = apply_segment(
                mark_explicit_size(modrm.rm_operand(r, Some(w_bit))?),
                segment,
            );
            let v_bit = byte & 0b10 != 0;
            let count = if v_bit {
                Operand::reg(1, Width::Byte) // CL
            } else {
                Operand::imm(1, Width::Byte)
            };
            Instruction::new(addr, mnemonic)
                .with_dest(rm)
                .with_source(count)
        }

        // TEST r/m, reg: 1000010W
        0x84 | 0x85 => {
            let modrm = ModRM::read(r)?;
            let reg = Operand::reg(modrm.reg, w_bit);
            let rm = apply_segment(modrm.rm_operand(r, Some(w_bit))?, segment);
            Instruction::new(addr, Mnemonic::Test)
                .with_dest(rm)
                .with_source(reg)
        }

        // TEST accumulator, imm: 1010100W
        0xA8 | 0xA9 => {
            let imm = read_imm(r, w_bit)?;
            Instruction::new(addr, Mnemonic::Test)
                .with_dest(Operand::accumulator(w_bit))
                .with_source(imm)
        }

        // String ops without REP
        0xA4..=0xA7 | 0xAA..=0xAF => match decode_string_op(byte, addr) {
            Some(inst) => inst,
            None => return Err(DecodeError::UnknownOpcode { byte }),
        },

        // CALL near direct: displacement relative to the next instruction.
        // The stored label is normalized to the two-byte convention, so the
        // three-byte near forms add one.
        0xE8 => {
            let disp = r.read_i16("call displacement")?;
            Instruction::new(addr, Mnemonic::Call).with_dest(Operand::Label(disp.wrapping_add(1)))
        }
        // JMP near direct
        0xE9 => {
            let disp = r.read_i16("jump displacement")?;
            Instruction::new(addr, Mnemonic::JmpNear)
                .with_dest(Operand::Label(disp.wrapping_add(1)))
        }
        // JMP far direct
        0xEA => {
            let ip = r.read_u16("far pointer offset")?;
            let cs = r.read_u16("far pointer segment")?;
            Instruction::new(addr, Mnemonic::Jmp).with_dest(Operand::FarPointer { cs, ip })
        }
        // JMP short
        0xEB => {
            let disp = r.read_i8("jump displacement")? as i16;
            Instruction::new(addr, Mnemonic::Jmp).with_dest(Operand::Label(disp))
        }
        // CALL far direct
        0x9A => {
            let ip = r.read_u16("far pointer offset")?;
            let cs = r.read_u16("far pointer segment")?;
            Instruction::new(addr, Mnemonic::Call).with_dest(Operand::FarPointer { cs, ip })
        }

        // RET near/far, optionally popping imm16
        0xC2 => {
            let imm = r.read_i16("stack adjustment")?;
            Instruction::new(addr, Mnemonic::Ret).with_dest(Operand::imm(imm, Width::Word))
        }
        0xC3 => Instruction::new(addr, Mnemonic::Ret),
        0xCA => {
            let imm = r.read_i16("stack adjustment")?;
            Instruction::new(addr, Mnemonic::Retf).with_dest(Operand::imm(imm, Width::Word))
        }
        0xCB => Instruction::new(addr, Mnemonic::Retf),

        // Conditional jumps: 0111CCCC
        0x70..=0x7F => {
            let disp = r.read_i8("jump displacement")? as i16;
            Instruction::new(addr, COND_JUMPS[(byte & 0b1111) as usize])
                .with_dest(Operand::Label(disp))
        }

        // LOOP family and JCXZ: 111000TT
        0xE0..=0xE3 => {
            let mnemonic = match byte & 0b11 {
                0 => Mnemonic::Loopnz,
                1 => Mnemonic::Loopz,
                2 => Mnemonic::Loop,
                _ => Mnemonic::Jcxz,
            };
            let disp = r.read_i8("loop displacement")? as i16;
            Instruction::new(addr, mnemonic).with_dest(Operand::Label(disp))
        }

        // INT family: 110011TT
        0xCC => Instruction::new(addr, Mnemonic::Int3),
        0xCD => {
            let vector = r.read_u8("interrupt vector")?;
            Instruction::new(addr, Mnemonic::Int).with_dest(Operand::imm(vector as i16, Width::Byte))
        }
        0xCE => Instruction::new(addr, Mnemonic::Into),
        0xCF => Instruction::new(addr, Mnemonic::Iret),

        // Processor control
        0xF4 => Instruction::new(addr, Mnemonic::Hlt),
        0xF5 => Instruction::new(addr, Mnemonic::Cmc),
        0xF8 => Instruction::new(addr, Mnemonic::Clc),
        0xF9 => Instruction::new(addr, Mnemonic::Stc),
        0xFA => Instruction::new(addr, Mnemonic::Cli),
        0xFB => Instruction::new(addr, Mnemonic::Sti),
        0xFC => Instruction::new(addr, Mnemonic::Cld),
        0xFD => Instruction::new(addr, Mnemonic::Std),
        0x9B => Instruction::new(addr, Mnemonic::Wait),

        // ESC to external coprocessor: 11011XXX + ModR/M. The 6-bit
        // external opcode is XXX concatenated with the reg field.
        0xD8..=0xDF => {
            let modrm = ModRM::read(r)?;
            let ext = ((byte & 0b111) << 3) | modrm.reg;
            let rm = apply_segment(modrm.rm_operand(r, None)?, segment);
            Instruction::new(addr, Mnemonic::Esc)
                .with_dest(Operand::imm(ext as i16, Width::Byte))
                .with_source(rm)
        }

        _ => return Err(DecodeError::UnknownOpcode { byte }),
    };

    Ok(inst)
}
