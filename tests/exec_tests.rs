//! End-to-end execution tests: load a byte program, run it, check the
//! final machine state and the trace output

use pretty_assertions::assert_eq;
use sim86::cpu::{Cpu, ExecError, Reg, Simulator};

/// Load and run a program from offset zero, discarding the trace
fn run_program(bytes: &[u8]) -> Simulator {
    let mut sim = Simulator::new();
    sim.load_program(bytes, 0);
    sim.run(&mut std::io::sink()).expect("program should run");
    sim
}

/// Load and run a program, capturing the trace text
fn run_traced(bytes: &[u8]) -> (Simulator, String) {
    let mut sim = Simulator::new();
    sim.load_program(bytes, 0);
    let mut out = Vec::new();
    sim.run(&mut out).expect("program should run");
    (sim, String::from_utf8(out).unwrap())
}

#[test]
fn test_mov_immediate_to_register() {
    let sim = run_program(&[0xB8, 0x01, 0x00]); // MOV AX, 1
    assert_eq!(sim.cpu.get(Reg::Ax), 0x0001);
    assert_eq!(sim.cpu.get(Reg::Ip), 3);
    assert_eq!(sim.cpu.get(Reg::Flags), 0);
}

#[test]
fn test_add_register_to_register() {
    // MOV AX, 3; MOV BX, 2; ADD AX, BX
    let sim = run_program(&[0xB8, 0x03, 0x00, 0xBB, 0x02, 0x00, 0x01, 0xD8]);
    assert_eq!(sim.cpu.get(Reg::Ax), 0x0005);
    assert_eq!(sim.cpu.get(Reg::Bx), 0x0002);
    assert_eq!(sim.cpu.get(Reg::Ip), 8);
    // 5 = 0b101: two set bits, so parity is even; nothing else fires
    assert_eq!(sim.cpu.get(Reg::Flags), Cpu::PF);
}

#[test]
fn test_countdown_loop_terminates() {
    // MOV CX, 3; loop: SUB CX, 1; JNE loop
    let sim = run_program(&[0xB9, 0x03, 0x00, 0x83, 0xE9, 0x01, 0x75, 0xFB]);
    assert_eq!(sim.cpu.get(Reg::Cx), 0);
    assert_eq!(sim.cpu.get(Reg::Ip), 8);
    // The final SUB leaves zero: ZF, and 0 has even parity
    assert_eq!(sim.cpu.get(Reg::Flags), Cpu::ZF | Cpu::PF);
}

#[test]
fn test_cmp_sets_flags_without_writing() {
    let sim = run_program(&[0x3D, 0x00, 0x00]); // CMP AX, 0
    assert_eq!(sim.cpu.get(Reg::Ax), 0);
    assert_eq!(sim.cpu.get(Reg::Ip), 3);
    assert_eq!(sim.cpu.get(Reg::Flags), Cpu::ZF | Cpu::PF);
}

#[test]
fn test_cmp_flags_match_sub_flags() {
    // MOV AX, 7; CMP AX, 9  versus  MOV AX, 7; SUB AX, 9
    let cmp = run_program(&[0xB8, 0x07, 0x00, 0x3D, 0x09, 0x00]);
    let sub = run_program(&[0xB8, 0x07, 0x00, 0x2D, 0x09, 0x00]);
    assert_eq!(cmp.cpu.get(Reg::Flags), sub.cpu.get(Reg::Flags));
    assert_eq!(cmp.cpu.get(Reg::Ax), 7); // CMP left AX alone
    assert_eq!(sub.cpu.get(Reg::Ax), 0xFFFE);
}

#[test]
fn test_self_jump_is_bounded_by_the_step_cap() {
    let mut sim = Simulator::new();
    sim.load_program(&[0xEB, 0xFE], 0); // JMP $+0
    sim.run_with_limit(&mut std::io::sink(), 100)
        .expect("capped run should finish");
    // IP is back on the jump itself every iteration
    assert_eq!(sim.cpu.get(Reg::Ip), 0);
}

#[test]
fn test_byte_writes_alias_into_wide_registers() {
    // MOV AX, 0x1234; MOV AH, 0xAB
    let sim = run_program(&[0xB8, 0x34, 0x12, 0xB4, 0xAB]);
    assert_eq!(sim.cpu.get(Reg::Ax), 0xAB34);
}

#[test]
fn test_memory_round_trip_through_a_direct_address() {
    // MOV word [1000], 123; MOV AX, [1000]
    let sim = run_program(&[0xC7, 0x06, 0xE8, 0x03, 0x7B, 0x00, 0xA1, 0xE8, 0x03]);
    assert_eq!(sim.cpu.get(Reg::Ax), 123);
    assert_eq!(sim.mem.read_u16(1000), 123);
    assert_eq!(sim.cpu.get(Reg::Ip), 9);
}

#[test]
fn test_segment_override_addresses_through_es() {
    // MOV AX, 0x100; MOV ES, AX; MOV BX, 0; MOV word ES:[BX], 42
    let sim = run_program(&[
        0xB8, 0x00, 0x01, 0x8E, 0xC0, 0xBB, 0x00, 0x00, 0x26, 0xC7, 0x07, 0x2A, 0x00,
    ]);
    assert_eq!(sim.mem.read_u16(0x1000), 42);
    // The write landed in ES, not over the program at DS:0
    assert_eq!(sim.mem.read_u8(0x0000), 0xB8);
}

#[test]
fn test_bp_based_operands_default_to_the_stack_segment() {
    // MOV AX, 0x100; MOV SS, AX; MOV BP, 0x10; MOV byte [BP], 0x77
    let sim = run_program(&[
        0xB8, 0x00, 0x01, 0x8E, 0xD0, 0xBD, 0x10, 0x00, 0xC6, 0x46, 0x00, 0x77,
    ]);
    assert_eq!(sim.mem.read_u8(0x1010), 0x77);
}

#[test]
fn test_push_and_pop_move_words_through_the_stack() {
    // MOV AX, 0x1234; MOV SP, 0x1000; PUSH AX; POP BX
    let sim = run_program(&[0xB8, 0x34, 0x12, 0xBC, 0x00, 0x10, 0x50, 0x5B]);
    assert_eq!(sim.cpu.get(Reg::Bx), 0x1234);
    assert_eq!(sim.cpu.get(Reg::Sp), 0x1000);
    assert_eq!(sim.mem.read_u16(0x0FFE), 0x1234);
}

#[test]
fn test_call_and_ret_round_trip() {
    // MOV SP, 0x1000; CALL +1; HLT; INC AX...  layout:
    //   0: BC 00 10    mov sp, 0x1000
    //   3: E8 01 00    call 7
    //   6: F4          hlt
    //   7: 40          inc ax
    //   8: C3          ret
    let sim = run_program(&[0xBC, 0x00, 0x10, 0xE8, 0x01, 0x00, 0xF4, 0x40, 0xC3]);
    assert_eq!(sim.cpu.get(Reg::Ax), 1);
    assert_eq!(sim.cpu.get(Reg::Sp), 0x1000);
    assert_eq!(sim.cpu.get(Reg::Ip), 7); // halted right after the HLT
}

#[test]
fn test_conditional_jump_skips_when_taken() {
    // MOV AX, 0; CMP AX, 0; JE +1 (over the first INC); INC AX; INC AX
    let sim = run_program(&[
        0xB8, 0x00, 0x00, 0x3D, 0x00, 0x00, 0x74, 0x01, 0x40, 0x40,
    ]);
    assert_eq!(sim.cpu.get(Reg::Ax), 1);
    assert_eq!(sim.cpu.get(Reg::Ip), 10);
}

#[test]
fn test_loop_decrements_cx_to_zero() {
    // MOV CX, 3; spin: LOOP spin
    let sim = run_program(&[0xB9, 0x03, 0x00, 0xE2, 0xFE]);
    assert_eq!(sim.cpu.get(Reg::Cx), 0);
    assert_eq!(sim.cpu.get(Reg::Ip), 5);
}

#[test]
fn test_jcxz_jumps_only_on_zero_cx() {
    // MOV CX, 0; JCXZ +1; INC AX; INC BX
    let sim = run_program(&[0xB9, 0x00, 0x00, 0xE3, 0x01, 0x40, 0x43]);
    assert_eq!(sim.cpu.get(Reg::Ax), 0); // skipped
    assert_eq!(sim.cpu.get(Reg::Bx), 1);
    assert_eq!(sim.cpu.get(Reg::Cx), 0); // no decrement
}

#[test]
fn test_rep_stos_fills_memory() {
    // MOV AX, 0xAA; MOV DI, 0x2000; MOV CX, 3; REP STOSB
    let sim = run_program(&[
        0xB8, 0xAA, 0x00, 0xBF, 0x00, 0x20, 0xB9, 0x03, 0x00, 0xF3, 0xAA,
    ]);
    assert_eq!(sim.mem.read_u8(0x2000), 0xAA);
    assert_eq!(sim.mem.read_u8(0x2001), 0xAA);
    assert_eq!(sim.mem.read_u8(0x2002), 0xAA);
    assert_eq!(sim.mem.read_u8(0x2003), 0x00);
    assert_eq!(sim.cpu.get(Reg::Di), 0x2003);
    assert_eq!(sim.cpu.get(Reg::Cx), 0);
}

#[test]
fn test_movs_copies_between_si_and_di() {
    // MOV word [0x500], 0xBEEF by hand, then:
    // MOV SI, 0x500; MOV DI, 0x600; MOVSW
    let mut sim = Simulator::new();
    sim.mem.write_u16(0x500, 0xBEEF);
    sim.load_program(&[0xBE, 0x00, 0x05, 0xBF, 0x00, 0x06, 0xA5], 0);
    sim.run(&mut std::io::sink()).unwrap();
    assert_eq!(sim.mem.read_u16(0x600), 0xBEEF);
    assert_eq!(sim.cpu.get(Reg::Si), 0x502);
    assert_eq!(sim.cpu.get(Reg::Di), 0x602);
}

#[test]
fn test_std_reverses_string_direction() {
    // STD; MOV SI, 0x500; LODSB
    let sim = run_program(&[0xFD, 0xBE, 0x00, 0x05, 0xAC]);
    assert_eq!(sim.cpu.get(Reg::Si), 0x4FF);
    assert_ne!(sim.cpu.get(Reg::Flags) & Cpu::DF, 0);
}

#[test]
fn test_shift_left_doubles_and_sets_carry_out() {
    // MOV AX, 0x8001; SHL AX, 1
    let sim = run_program(&[0xB8, 0x01, 0x80, 0xD1, 0xE0]);
    assert_eq!(sim.cpu.get(Reg::Ax), 0x0002);
    assert_ne!(sim.cpu.get(Reg::Flags) & Cpu::CF, 0);
}

#[test]
fn test_unimplemented_instruction_aborts_the_run() {
    let mut sim = Simulator::new();
    sim.load_program(&[0xCD, 0x10], 0); // INT 0x10
    let err = sim
        .run(&mut std::io::sink())
        .expect_err("interrupts are not simulated");
    match err {
        ExecError::Unimplemented { mnemonic } => assert_eq!(mnemonic, "int"),
        other => panic!("expected an unimplemented diagnostic, got {:?}", other),
    }
}

#[test]
fn test_trace_line_shows_register_ip_and_flag_changes() {
    let (_, trace) = run_traced(&[0xB8, 0x03, 0x00, 0xBB, 0x02, 0x00, 0x01, 0xD8]);
    assert_eq!(
        trace,
        "mov ax, 3 ; ax:0x0->0x3 ip:0x0->0x3\n\
         mov bx, 2 ; bx:0x0->0x2 ip:0x3->0x6\n\
         add ax, bx ; ax:0x3->0x5 ip:0x6->0x8 flags:->P\n"
    );
}

#[test]
fn test_byte_register_writes_trace_under_the_wide_name() {
    let (_, trace) = run_traced(&[0xB4, 0xAB]); // MOV AH, 0xAB
    assert_eq!(trace, "mov ah, -85 ; ax:0x0->0xab00 ip:0x0->0x2\n");
}

#[test]
fn test_final_register_report_format() {
    let (sim, _) = run_traced(&[0xB8, 0x03, 0x00, 0xBB, 0x02, 0x00, 0x01, 0xD8]);
    let mut out = Vec::new();
    sim.print_final_registers(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\nFinal registers:\n\
         \u{20}     ax: 0x0005 (5)\n\
         \u{20}     bx: 0x0002 (2)\n\
         \u{20}     ip: 0x0008 (8)\n\
         \u{20}  flags: P\n"
    );
}

#[test]
fn test_loop_trace_includes_the_cx_write() {
    let (_, trace) = run_traced(&[0xB9, 0x01, 0x00, 0xE2, 0xFE]); // MOV CX, 1; LOOP $
    assert_eq!(
        trace,
        "mov cx, 1 ; cx:0x0->0x1 ip:0x0->0x3\n\
         loop $+0 ; cx:0x1->0x0 ip:0x3->0x5\n"
    );
}
