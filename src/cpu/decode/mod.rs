//! Instruction decoding
//!
//! Converts a raw 8086 byte stream into structured [`Instruction`] values:
//! prefix handling, ModR/M parsing, displacement and immediate reads, and
//! classification of the bit-sliced opcode map.

pub mod decoder;
pub mod error;
pub mod instruction;
pub mod modrm;
pub mod operands;
pub mod reader;

pub use decoder::decode_instruction;
pub use error::DecodeError;
pub use instruction::{Instruction, Mnemonic};
pub use modrm::ModRM;
pub use operands::{Immediate, MemoryOperand, Operand, Register, SegmentReg, Width};
pub use reader::ByteReader;
