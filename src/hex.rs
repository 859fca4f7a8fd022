use core::fmt;

use heapless::Vec;

const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Appends the upper case hex form of `bytes` to `out`.
pub fn encode_into<W: fmt::Write>(bytes: &[u8], out: &mut W) -> fmt::Result {
    for b in bytes {
        out.write_char(DIGITS[(b >> 4) as usize] as char)?;
        out.write_char(DIGITS[(b & 0x0F) as usize] as char)?;
    }
    Ok(())
}

/// Appends the bytes encoded by the hex text `s` to `out`.
pub fn decode_into<const N: usize>(s: &[u8], out: &mut Vec<u8, N>) -> Result<(), DecodeHexError> {
    if s.len() % 2 != 0 {
        return Err(DecodeHexError::OddLength);
    }
    for pair in s.chunks_exact(2) {
        let byte = (nibble(pair[0])? << 4) | nibble(pair[1])?;
        out.push(byte).map_err(|_| DecodeHexError::Overflow)?;
    }
    Ok(())
}

fn nibble(c: u8) -> Result<u8, DecodeHexError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(DecodeHexError::InvalidDigit),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeHexError {
    OddLength,
    InvalidDigit,
    Overflow,
}

impl fmt::Display for DecodeHexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeHexError::OddLength => "input string has an odd number of bytes".fmt(f),
            DecodeHexError::InvalidDigit => "invalid hex digit".fmt(f),
            DecodeHexError::Overflow => "decoded data does not fit".fmt(f),
        }
    }
}
