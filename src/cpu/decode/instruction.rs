//! Decoded instruction representation

use super::operands::{Operand, Width};

/// The closed set of 8086 mnemonics
///
/// Intersegment CALL/JMP through memory and the far RET carry their own
/// variants so the printer and executor never need out-of-band state to
/// tell them apart from the near forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    // Data transfer
    Mov,
    Push,
    Pop,
    Xchg,
    In,
    Out,
    Xlat,
    Lea,
    Lds,
    Les,
    Lahf,
    Sahf,
    Pushf,
    Popf,
    // Arithmetic
    Add,
    Adc,
    Inc,
    Aaa,
    Daa,
    Sub,
    Sbb,
    Dec,
    Neg,
    Cmp,
    Aas,
    Das,
    Mul,
    Imul,
    Aam,
    Div,
    Idiv,
    Aad,
    Cbw,
    Cwd,
    // Logic and shifts
    Not,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,
    Rcl,
    Rcr,
    And,
    Test,
    Or,
    Xor,
    // String
    Movs,
    Cmps,
    Scas,
    Lods,
    Stos,
    // Control transfer
    Call,
    CallFar,
    Jmp,
    JmpNear,
    JmpFar,
    Ret,
    Retf,
    Je,
    Jne,
    Jb,
    Jnb,
    Jbe,
    Ja,
    Jl,
    Jnl,
    Jle,
    Jg,
    Jp,
    Jnp,
    Jo,
    Jno,
    Js,
    Jns,
    Loop,
    Loopz,
    Loopnz,
    Jcxz,
    Int,
    Int3,
    Into,
    Iret,
    // Processor control
    Clc,
    Cmc,
    Stc,
    Cld,
    Std,
    Cli,
    Sti,
    Hlt,
    Wait,
    Esc,
}

impl Mnemonic {
    /// Assembler spelling
    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Mov => "mov",
            Mnemonic::Push => "push",
            Mnemonic::Pop => "pop",
            Mnemonic::Xchg => "xchg",
            Mnemonic::In => "in",
            Mnemonic::Out => "out",
            Mnemonic::Xlat => "xlat",
            Mnemonic::Lea => "lea",
            Mnemonic::Lds => "lds",
            Mnemonic::Les => "les",
            Mnemonic::Lahf => "lahf",
            Mnemonic::Sahf => "sahf",
            Mnemonic::Pushf => "pushf",
            Mnemonic::Popf => "popf",
            Mnemonic::Add => "add",
            Mnemonic::Adc => "adc",
            Mnemonic::Inc => "inc",
            Mnemonic::Aaa => "aaa",
            Mnemonic::Daa => "daa",
            Mnemonic::Sub => "sub",
            Mnemonic::Sbb => "sbb",
            Mnemonic::Dec => "dec",
            Mnemonic::Neg => "neg",
            Mnemonic::Cmp => "cmp",
            Mnemonic::Aas => "aas",
            Mnemonic::Das => "das",
            Mnemonic::Mul => "mul",
            Mnemonic::Imul => "imul",
            Mnemonic::Aam => "aam",
            Mnemonic::Div => "div",
            Mnemonic::Idiv => "idiv",
            Mnemonic::Aad => "aad",
            Mnemonic::Cbw => "cbw",
            Mnemonic::Cwd => "cwd",
            Mnemonic::Not => "not",
            Mnemonic::Shl => "shl",
            Mnemonic::Shr => "shr",
            Mnemonic::Sar => "sar",
            Mnemonic::Rol => "rol",
            Mnemonic::Ror => "ror",
            Mnemonic::Rcl => "rcl",
            Mnemonic::Rcr => "rcr",
            Mnemonic::And => "and",
            Mnemonic::Test => "test",
            Mnemonic::Or => "or",
            Mnemonic::Xor => "xor",
            Mnemonic::Movs => "movs",
            Mnemonic::Cmps => "cmps",
            Mnemonic::Scas => "scas",
            Mnemonic::Lods => "lods",
            Mnemonic::Stos => "stos",
            Mnemonic::Call => "call",
            Mnemonic::CallFar => "call far",
            Mnemonic::Jmp => "jmp",
            Mnemonic::JmpNear => "jmp near",
            Mnemonic::JmpFar => "jmp far",
            Mnemonic::Ret => "ret",
            Mnemonic::Retf => "retf",
            Mnemonic::Je => "je",
            Mnemonic::Jne => "jne",
            Mnemonic::Jb => "jb",
            Mnemonic::Jnb => "jnb",
            Mnemonic::Jbe => "jbe",
            Mnemonic::Ja => "ja",
            Mnemonic::Jl => "jl",
            Mnemonic::Jnl => "jnl",
            Mnemonic::Jle => "jle",
            Mnemonic::Jg => "jg",
            Mnemonic::Jp => "jp",
            Mnemonic::Jnp => "jnp",
            Mnemonic::Jo => "jo",
            Mnemonic::Jno => "jno",
            Mnemonic::Js => "js",
            Mnemonic::Jns => "jns",
            Mnemonic::Loop => "loop",
            Mnemonic::Loopz => "loopz",
            Mnemonic::Loopnz => "loopnz",
            Mnemonic::Jcxz => "jcxz",
            Mnemonic::Int => "int",
            Mnemonic::Int3 => "int3",
            Mnemonic::Into => "into",
            Mnemonic::Iret => "iret",
            Mnemonic::Clc => "clc",
            Mnemonic::Cmc => "cmc",
            Mnemonic::Stc => "stc",
            Mnemonic::Cld => "cld",
            Mnemonic::Std => "std",
            Mnemonic::Cli => "cli",
            Mnemonic::Sti => "sti",
            Mnemonic::Hlt => "hlt",
            Mnemonic::Wait => "wait",
            Mnemonic::Esc => "esc",
        }
    }

    /// String-move family, which takes the printed `b`/`w` size suffix
    pub fn is_string_op(self) -> bool {
        matches!(
            self,
            Mnemonic::Movs | Mnemonic::Cmps | Mnemonic::Scas | Mnemonic::Lods | Mnemonic::Stos
        )
    }
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Address of the first byte (prefixes included) in the source stream
    pub addr: u32,
    pub mnemonic: Mnemonic,
    pub dest: Option<Operand>,
    pub source: Option<Operand>,
    /// LOCK prefix present
    pub lock: bool,
    /// REP prefix present (string ops only)
    pub rep: bool,
    /// Operation size when no operand carries one (string ops)
    pub width: Option<Width>,
}

impl Instruction {
    /// New instruction with no operands
    pub fn new(addr: u32, mnemonic: Mnemonic) -> Self {
        Self {
            addr,
            mnemonic,
            dest: None,
            source: None,
            lock: false,
            rep: false,
            width: None,
        }
    }

    /// Set the destination operand
    pub fn with_dest(mut self, dest: Operand) -> Self {
        self.dest = Some(dest);
        self
    }

    /// Set the source operand
    pub fn with_source(mut self, source: Operand) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the explicit operation width
    pub fn with_width(mut self, width: Width) -> Self {
        self.width = Some(width);
        self
    }
}
