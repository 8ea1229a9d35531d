//! Intel HEX loader.
//!
//! Parses Intel HEX text (`:LLAAAATT[DD...]CC`) and writes data records
//! into an emulator's program memory. Supports record types 00 (data),
//! 01 (EOF), 02 (extended segment address) and 04 (extended linear
//! address); start-address records are ignored.

use tracing::debug;

use crate::emulator::Emulator;
use crate::error::{Error, Result};

/// One data record, at an absolute byte address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub address: u32,
    pub data: Vec<u8>,
}

/// Parse Intel HEX text into data records.
pub fn parse_hex(hex: &str) -> Result<Vec<DataRecord>> {
    let mut records = Vec::new();
    let mut base_addr: u32 = 0;

    for (n, line) in hex.lines().enumerate() {
        let line_no = n + 1;
        let fail = |reason: String| Error::Hex { line: line_no, reason };

        let line = line.trim();
        if line.is_empty() { continue; }
        let Some(body) = line.strip_prefix(':') else {
            continue; // skip non-hex lines
        };

        let bytes = hex_line_to_bytes(body).map_err(fail)?;
        if bytes.len() < 5 {
            return Err(fail("line too short".into()));
        }

        let byte_count = bytes[0] as usize;
        let addr = ((bytes[1] as u32) << 8) | bytes[2] as u32;
        let record_type = bytes[3];
        if bytes.len() != byte_count + 5 {
            return Err(fail(format!("length {} does not match byte count {}", bytes.len(), byte_count)));
        }

        let sum: u8 = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        if sum != 0 {
            return Err(fail(format!("checksum error: sum={}", sum)));
        }

        let data = &bytes[4..4 + byte_count];
        match record_type {
            0x00 => records.push(DataRecord { address: base_addr + addr, data: data.to_vec() }),
            0x01 => break,
            0x02 if byte_count >= 2 => {
                base_addr = (((data[0] as u32) << 8) | data[1] as u32) << 4;
            }
            0x04 if byte_count >= 2 => {
                base_addr = (((data[0] as u32) << 8) | data[1] as u32) << 16;
            }
            // Start addresses and unknown records
            _ => {}
        }
    }

    Ok(records)
}

/// Load Intel HEX text into program memory.
///
/// Returns the number of data bytes written.
pub fn load_hex(em: &mut Emulator, hex: &str) -> Result<usize> {
    let records = parse_hex(hex)?;
    let mut total = 0;
    for r in &records {
        em.write_program_bytes(r.address, &r.data)?;
        total += r.data.len();
    }
    debug!(records = records.len(), bytes = total, "intel hex loaded");
    Ok(total)
}

fn hex_line_to_bytes(hex_str: &str) -> std::result::Result<Vec<u8>, String> {
    if hex_str.len() % 2 != 0 {
        return Err("odd number of hex characters".into());
    }
    hex_str
        .as_bytes()
        .chunks(2)
        .map(|pair| Ok((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect()
}

fn hex_digit(c: u8) -> std::result::Result<u8, String> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(format!("invalid hex character: {:?}", c as char)),
    }
}
