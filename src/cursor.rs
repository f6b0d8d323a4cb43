use crate::error::{CodecError, Result};

/// Read cursor over an in-memory map block.
///
/// Decode threads one of these through every parser instead of sharing a
/// mutable reader, so each step is a pure function of (bytes, position).
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Cursor { bytes, pos }
    }

    /// Current read position within the block.
    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::TruncatedStream {
                offset: self.pos,
                needed: n,
            });
        }
        let s = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_signed_byte(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    /// Little-endian 16-bit word, as the offset tables store them.
    pub fn read_word(&mut self) -> Result<u16> {
        let s = self.take(2)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    pub fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Look at the next byte without consuming it.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(CodecError::TruncatedStream {
                offset: self.pos,
                needed: 1,
            });
        }
        Ok(self.bytes[self.pos])
    }
}

/// Write-side mirror of [`Cursor`]. Appends to an owned buffer.
#[derive(Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer::default()
    }

    pub fn tell(&self) -> usize {
        self.bytes.len()
    }

    pub fn write_byte(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn write_signed_byte(&mut self, b: i8) {
        self.bytes.push(b as u8);
    }

    pub fn write_word(&mut self, w: u16) {
        self.bytes.extend_from_slice(&w.to_le_bytes());
    }

    pub fn write_slice(&mut self, s: &[u8]) {
        self.bytes.extend_from_slice(s);
    }

    /// Patch a previously written little-endian word in place.
    pub fn patch_word(&mut self, at: usize, w: u16) {
        self.bytes[at..at + 2].copy_from_slice(&w.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn words_are_little_endian() {
        let mut w = Writer::new();
        w.write_word(0x1234);
        assert_eq!(w.as_slice(), &[0x34, 0x12]);

        let mut c = Cursor::new(w.as_slice());
        assert_eq!(c.read_word().unwrap(), 0x1234);
        assert_eq!(c.tell(), 2);
    }

    #[test]
    fn signed_bytes_round_trip() {
        let mut w = Writer::new();
        w.write_signed_byte(-3);
        let mut c = Cursor::new(w.as_slice());
        assert_eq!(c.read_signed_byte().unwrap(), -3);
    }

    #[test]
    fn truncation_reports_offset() {
        let mut c = Cursor::new(&[0xAA]);
        c.read_byte().unwrap();
        let err = c.read_word().unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedStream {
                offset: 1,
                needed: 2
            }
        );
    }

    #[test]
    fn seek_and_peek() {
        let mut c = Cursor::new(&[1, 2, 3]);
        c.seek(2);
        assert_eq!(c.peek_byte().unwrap(), 3);
        assert_eq!(c.tell(), 2);
    }
}
