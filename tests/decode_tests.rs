//! Tests for instruction decoding: structure, prefixes, addresses, and
//! the failure diagnostics

use sim86::cpu::decode::{
    decode_instruction, ByteReader, DecodeError, Instruction, Mnemonic, Operand, Width,
};

fn decode_one(bytes: &[u8]) -> Instruction {
    let mut reader = ByteReader::new(bytes, 0);
    decode_instruction(&mut reader).expect("stream should decode")
}

fn decode_err(bytes: &[u8]) -> DecodeError {
    let mut reader = ByteReader::new(bytes, 0);
    decode_instruction(&mut reader).expect_err("stream should not decode")
}

#[test]
fn test_instructions_record_their_start_address() {
    let bytes = [0xB8, 0x01, 0x00, 0x40]; // MOV AX, 1; INC AX
    let mut reader = ByteReader::new(&bytes, 0);

    let first = decode_instruction(&mut reader).unwrap();
    assert_eq!(first.addr, 0);
    assert_eq!(first.mnemonic, Mnemonic::Mov);

    let second = decode_instruction(&mut reader).unwrap();
    assert_eq!(second.addr, 3);
    assert_eq!(second.mnemonic, Mnemonic::Inc);
    assert_eq!(reader.pos(), 4);
}

#[test]
fn test_decode_is_a_pure_function_of_slice_and_position() {
    let bytes = [0x83, 0xE9, 0x01]; // SUB CX, 1
    let a = decode_instruction(&mut ByteReader::new(&bytes, 0)).unwrap();
    let b = decode_instruction(&mut ByteReader::new(&bytes, 0)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_prefixes_attach_only_to_the_next_instruction() {
    let bytes = [0xF0, 0x26, 0x88, 0x07, 0x40]; // LOCK MOV ES:[BX], AL; INC AX
    let mut reader = ByteReader::new(&bytes, 0);

    let locked = decode_instruction(&mut reader).unwrap();
    assert!(locked.lock);
    assert_eq!(locked.addr, 0); // the prefix bytes belong to it
    match locked.dest {
        Some(Operand::Memory(m)) => assert!(m.segment.is_some()),
        ref other => panic!("expected memory dest, got {:?}", other),
    }

    let plain = decode_instruction(&mut reader).unwrap();
    assert!(!plain.lock);
    assert_eq!(plain.mnemonic, Mnemonic::Inc);
}

#[test]
fn test_rep_requires_a_string_instruction() {
    assert_eq!(
        decode_err(&[0xF3, 0x40]),
        DecodeError::UnknownOpcode { byte: 0x40 }
    );

    let rep = decode_one(&[0xF3, 0xA5]); // REP MOVSW
    assert!(rep.rep);
    assert_eq!(rep.mnemonic, Mnemonic::Movs);
    assert_eq!(rep.width, Some(Width::Word));
}

#[test]
fn test_repne_byte_also_decodes_as_rep() {
    let rep = decode_one(&[0xF2, 0xAE]); // REPNE SCASB, Z bit ignored
    assert!(rep.rep);
    assert_eq!(rep.mnemonic, Mnemonic::Scas);
    assert_eq!(rep.width, Some(Width::Byte));
}

#[test]
fn test_mov_immediate_widths() {
    let byte = decode_one(&[0xB4, 0xFF]); // MOV AH, -1
    assert_eq!(byte.source, Some(Operand::imm(-1, Width::Byte)));

    let word = decode_one(&[0xB8, 0xF4, 0xFF]); // MOV AX, -12
    assert_eq!(word.source, Some(Operand::imm(-12, Width::Word)));
}

#[test]
fn test_sign_extended_arithmetic_immediate() {
    // 0x83: S=1 W=1, 8-bit immediate sign-extended into a word op
    let inst = decode_one(&[0x83, 0xC3, 0xFE]); // ADD BX, -2
    assert_eq!(inst.mnemonic, Mnemonic::Add);
    assert_eq!(inst.source, Some(Operand::imm(-2, Width::Word)));
}

#[test]
fn test_short_jump_labels_store_the_raw_displacement() {
    let inst = decode_one(&[0xEB, 0xFE]); // JMP $+0
    assert_eq!(inst.dest, Some(Operand::Label(-2)));

    let inst = decode_one(&[0x75, 0xFB]); // JNE $-3
    assert_eq!(inst.mnemonic, Mnemonic::Jne);
    assert_eq!(inst.dest, Some(Operand::Label(-5)));
}

#[test]
fn test_near_jump_labels_are_normalized_to_the_short_convention() {
    // E9 0000: three-byte encoding, target = next instruction
    let inst = decode_one(&[0xE9, 0x00, 0x00]);
    assert_eq!(inst.mnemonic, Mnemonic::JmpNear);
    assert_eq!(inst.dest, Some(Operand::Label(1)));

    // E8 FDFF: call back to its own first byte
    let inst = decode_one(&[0xE8, 0xFD, 0xFF]);
    assert_eq!(inst.mnemonic, Mnemonic::Call);
    assert_eq!(inst.dest, Some(Operand::Label(-2)));
}

#[test]
fn test_far_pointer_operands() {
    let inst = decode_one(&[0xEA, 0x88, 0x77, 0x66, 0x55]);
    assert_eq!(inst.mnemonic, Mnemonic::Jmp);
    assert_eq!(
        inst.dest,
        Some(Operand::FarPointer {
            cs: 0x5566,
            ip: 0x7788
        })
    );
}

#[test]
fn test_pop_cs_exists_on_the_8086() {
    let inst = decode_one(&[0x0F]);
    assert_eq!(inst.mnemonic, Mnemonic::Pop);
}

#[test]
fn test_group_ff_sub_opcodes() {
    // reg=110 -> PUSH word [bx]
    let push = decode_one(&[0xFF, 0x37]);
    assert_eq!(push.mnemonic, Mnemonic::Push);
    match push.dest {
        Some(Operand::Memory(m)) => assert!(m.explicit_size),
        ref other => panic!("expected memory dest, got {:?}", other),
    }

    // reg=101 -> JMP far [bx]
    let jmpf = decode_one(&[0xFF, 0x2F]);
    assert_eq!(jmpf.mnemonic, Mnemonic::JmpFar);

    // reg=111 is reserved
    assert_eq!(
        decode_err(&[0xFF, 0xF8]),
        DecodeError::IllegalSubOp {
            byte: 0xFF,
            subop: 0b111
        }
    );
}

#[test]
fn test_unary_group_reserves_sub_opcode_one() {
    assert_eq!(
        decode_err(&[0xF7, 0xC8]), // mod=11 reg=001
        DecodeError::IllegalSubOp {
            byte: 0xF7,
            subop: 0b001
        }
    );

    let test = decode_one(&[0xF6, 0xC0, 0x01]); // TEST AL, 1
    assert_eq!(test.mnemonic, Mnemonic::Test);
    assert_eq!(test.source, Some(Operand::imm(1, Width::Byte)));
}

#[test]
fn test_shift_group_reserves_sub_opcode_six() {
    assert_eq!(
        decode_err(&[0xD1, 0xF0]), // mod=11 reg=110
        DecodeError::IllegalSubOp {
            byte: 0xD1,
            subop: 0b110
        }
    );
}

#[test]
fn test_segment_selector_above_ds_is_illegal() {
    assert_eq!(
        decode_err(&[0x8E, 0xE0]), // MOV sreg with reg=100
        DecodeError::IllegalSegmentSelector {
            byte: 0x8E,
            selector: 0b100
        }
    );
}

#[test]
fn test_aam_aad_demand_the_literal_second_byte() {
    assert_eq!(decode_one(&[0xD4, 0x0A]).mnemonic, Mnemonic::Aam);
    assert_eq!(decode_one(&[0xD5, 0x0A]).mnemonic, Mnemonic::Aad);
    assert_eq!(
        decode_err(&[0xD4, 0x0B]),
        DecodeError::IllegalSecondByte {
            byte: 0xD4,
            found: 0x0B
        }
    );
}

#[test]
fn test_truncated_instruction_is_a_short_read() {
    assert!(matches!(
        decode_err(&[0xB8, 0x01]),
        DecodeError::ShortRead { .. }
    ));
    assert!(matches!(
        decode_err(&[0x8B]),
        DecodeError::ShortRead { .. }
    ));
    assert!(matches!(
        decode_err(&[0x8B, 0x84, 0x10]), // mod=10 needs a 16-bit displacement
        DecodeError::ShortRead { .. }
    ));
}

#[test]
fn test_unknown_opcode_reports_the_byte() {
    assert_eq!(
        decode_err(&[0x66]), // 80186+ operand-size prefix, not 8086
        DecodeError::UnknownOpcode { byte: 0x66 }
    );
    assert_eq!(decode_err(&[0xF1]), DecodeError::UnknownOpcode { byte: 0xF1 });
}

#[test]
fn test_diagnostics_print_the_byte_in_binary() {
    let err = decode_err(&[0x66]);
    assert_eq!(err.to_string(), "unknown opcode 0b01100110");
}
