//! Hexadecimal response codec.
//!
//! PUF responses arrive as hex strings (32 characters for the usual 128-bit
//! SRAM window). [`HexCodec`] turns them into fixed-width [`BitString`]s,
//! zero padded on the most-significant side. Values wider than the configured
//! width are rejected rather than clipped: a response that does not fit is
//! corrupted data, and silently dropping its top bits would skew every
//! distance computed from it.

use std::fmt;

use crate::error::{PufError, Result};

/// Response width used by the reference firmware (16 bytes of SRAM).
pub const DEFAULT_RESPONSE_BITS: usize = 128;

/// Validated response width in bits. Always a positive multiple of 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseWidth(usize);

impl ResponseWidth {
    pub const DEFAULT: Self = Self(DEFAULT_RESPONSE_BITS);

    pub fn new(bits: usize) -> Result<Self> {
        if bits == 0 || bits % 4 != 0 {
            return Err(PufError::Config(format!(
                "response width must be a positive multiple of 4 bits, got {bits}"
            )));
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> usize {
        self.0
    }

    /// Number of hex characters in a canonical response.
    pub fn nibbles(self) -> usize {
        self.0 / 4
    }
}

impl Default for ResponseWidth {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ResponseWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}

/// Fixed-length bit sequence, most-significant bit first.
///
/// Stored big-endian in bytes; when the length is not a multiple of 8 the
/// unused high bits of the first byte are always zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitString {
    bytes: Vec<u8>,
    len: usize,
}

impl BitString {
    /// All-zero string of `len` bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            bytes: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Big-endian bytes, 8 bits each.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            len: bytes.len() * 8,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Bit at `index`, where index 0 is the most-significant bit.
    pub fn get(&self, index: usize) -> Option<bool> {
        let (byte, mask) = self.locate(index)?;
        Some(self.bytes[byte] & mask != 0)
    }

    /// Invert the bit at `index` (0 = most significant). Out-of-range indices are ignored.
    pub fn flip(&mut self, index: usize) {
        if let Some((byte, mask)) = self.locate(index) {
            self.bytes[byte] ^= mask;
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn locate(&self, index: usize) -> Option<(usize, u8)> {
        if index >= self.len {
            return None;
        }
        let from_lsb = self.len - 1 - index;
        let byte = self.bytes.len() - 1 - from_lsb / 8;
        Some((byte, 1u8 << (from_lsb % 8)))
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            let bit = self.get(i).unwrap_or(false);
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Converts hex responses to bit strings of one fixed width.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexCodec {
    width: ResponseWidth,
}

impl HexCodec {
    pub fn new(width: ResponseWidth) -> Self {
        Self { width }
    }

    pub fn width(&self) -> ResponseWidth {
        self.width
    }

    /// Decode `hex` into exactly `width` bits.
    ///
    /// Surrounding whitespace and a `0x` prefix are tolerated; redundant
    /// leading zeros are fine as long as the value fits.
    pub fn decode(&self, hex: &str) -> Result<BitString> {
        let trimmed = hex.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(PufError::format(hex, "empty response"));
        }

        let mut nibbles = Vec::with_capacity(digits.len());
        for ch in digits.chars() {
            let value = ch
                .to_digit(16)
                .ok_or_else(|| PufError::format(hex, format!("non-hex character '{ch}'")))?;
            nibbles.push(value as u8);
        }

        let first_significant = nibbles
            .iter()
            .position(|&n| n != 0)
            .unwrap_or(nibbles.len());
        let significant = &nibbles[first_significant..];
        let bits_needed = match significant.first() {
            Some(&lead) => (significant.len() - 1) * 4 + (8 - lead.leading_zeros() as usize),
            None => 0,
        };
        if bits_needed > self.width.bits() {
            return Err(PufError::format(
                hex,
                format!("value needs {bits_needed} bits, exceeds {}", self.width),
            ));
        }

        let total = self.width.nibbles();
        let mut bits = BitString::zeros(self.width.bits());
        let offset = total - significant.len();
        for (i, &nibble) in significant.iter().enumerate() {
            let from_lsb = total - 1 - (offset + i);
            let byte = bits.bytes.len() - 1 - from_lsb / 2;
            bits.bytes[byte] |= nibble << ((from_lsb % 2) * 4);
        }
        Ok(bits)
    }

    /// Canonical upper-case hex form, exactly `len / 4` characters.
    pub fn encode(bits: &BitString) -> String {
        let nibbles = bits.len().div_ceil(4);
        let mut out = String::with_capacity(nibbles);
        for i in 0..nibbles {
            let from_lsb = nibbles - 1 - i;
            let byte = bits.bytes[bits.bytes.len() - 1 - from_lsb / 2];
            let nibble = (byte >> ((from_lsb % 2) * 4)) & 0x0F;
            out.push_str(&format!("{nibble:X}"));
        }
        out
    }
}
