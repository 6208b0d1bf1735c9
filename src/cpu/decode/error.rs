//! Decode failure diagnostics

use thiserror::Error;

/// Reasons a byte stream fails to decode
///
/// All variants are fatal to the current decode pass. Offending bytes are
/// rendered in binary because the 8086 opcode map is bit-sliced; the binary
/// form is what the reference tables index by.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The stream ended in the middle of an instruction
    #[error("stream ended while reading {what}")]
    ShortRead { what: &'static str },

    /// First byte matches no 8086 instruction form
    #[error("unknown opcode {byte:#010b}")]
    UnknownOpcode { byte: u8 },

    /// A ModR/M sub-opcode field holds a value the ISA reserves
    #[error("illegal sub-opcode {subop:#05b} for opcode {byte:#010b}")]
    IllegalSubOp { byte: u8, subop: u8 },

    /// A segment-register selector above DS (value > 3)
    #[error("illegal segment register selector {selector:#05b} for opcode {byte:#010b}")]
    IllegalSegmentSelector { byte: u8, selector: u8 },

    /// AAM/AAD must be followed by the literal byte 0b00001010
    #[error("opcode {byte:#010b} requires second byte 0b00001010, found {found:#010b}")]
    IllegalSecondByte { byte: u8, found: u8 },
}
