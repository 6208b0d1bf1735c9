//! Disassembly listing driver
//!
//! Walks a byte stream from the front, printing one instruction per line
//! in a form a standard 8086 assembler accepts back. The listing opens
//! with a comment naming the source and a `bits 16` directive; if the
//! decoder rejects a byte, the listing ends with a marker comment and the
//! failure is logged.

use std::io;

use crate::cpu::decode::{decode_instruction, ByteReader};

/// Disassemble `bytes` into `out`. Returns whether the whole stream
/// decoded cleanly.
pub fn disassemble<W: io::Write>(bytes: &[u8], path: &str, out: &mut W) -> io::Result<bool> {
    writeln!(out, "; {}", path)?;
    writeln!(out, "bits 16")?;

    let mut reader = ByteReader::new(bytes, 0);
    while reader.has_bytes() {
        match decode_instruction(&mut reader) {
            Ok(inst) => writeln!(out, "{}", inst)?,
            Err(err) => {
                log::error!("decode failed near offset {:#x}: {}", reader.pos(), err);
                writeln!(out, "; Failed beyond this point")?;
                return Ok(false);
            }
        }
    }
    Ok(true)
}
