//! The per-file compressed-text codec.
//!
//! Each string block carries its own 60-entry alphabet, ordered by how often
//! each byte occurs in that block's text. Strings are then stored as 5-bit
//! codes packed most-significant-bit-first: codes 0..=29 index the low half
//! of the alphabet directly, and two escape codes modify the next literal
//! (uppercase it, or add 30 to reach the high half of the table).

use bitreader::BitReader;
use bitvec::prelude::*;
use indexmap::IndexMap;
use log::{debug, trace};

use crate::error::{CodecError, Result};

/// Number of entries in a stored alphabet table.
pub const ALPHABET_SIZE: usize = 60;

/// Escape: uppercase the next literal.
pub const CODE_UPPERCASE_NEXT: u8 = 30;

/// Escape: add 30 to the next literal (high half of the alphabet).
pub const CODE_HIGH_RANGE_NEXT: u8 = 31;

/// Placeholder byte used to pad a sparse alphabet out to 60 entries.
const PAD_BYTE: u8 = 0x7F;

/// Accumulates byte frequencies across the strings of one block.
///
/// Consumed by [`AlphabetBuilder::finish`]; the resulting [`Alphabet`] is
/// immutable, so "already finished" is a type-level fact rather than a flag.
#[derive(Default)]
pub struct AlphabetBuilder {
    // IndexMap keeps first-seen order, which breaks frequency ties.
    counts: IndexMap<u8, usize>,
}

impl AlphabetBuilder {
    pub fn new() -> Self {
        AlphabetBuilder::default()
    }

    /// Count one string. Case is carried by the escape code, so letters are
    /// lower-cased before counting, and every string contributes one NUL for
    /// its terminator.
    pub fn add_string(&mut self, text: &[u8]) {
        for &b in text {
            *self.counts.entry(b.to_ascii_lowercase()).or_insert(0) += 1;
        }
        *self.counts.entry(0).or_insert(0) += 1;
    }

    pub fn finish(self) -> Result<Alphabet> {
        if self.counts.len() > ALPHABET_SIZE {
            return Err(CodecError::AlphabetOverflow(self.counts.len()));
        }
        let mut entries: Vec<(u8, usize)> = self.counts.into_iter().collect();
        while entries.len() < ALPHABET_SIZE {
            entries.push((PAD_BYTE, 0));
        }
        // Stable sort: equal counts keep first-seen order.
        entries.sort_by(|a, b| b.1.cmp(&a.1));

        let mut table = [0u8; ALPHABET_SIZE];
        for (i, (byte, count)) in entries.iter().enumerate() {
            trace!("alphabet code {:2} = {:#04x} (count {})", i, byte, count);
            table[i] = *byte;
        }
        Ok(Alphabet { table })
    }
}

/// A finished byte ↔ 5-bit-code bijection for one string block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    table: [u8; ALPHABET_SIZE],
}

impl Alphabet {
    /// Build from the strings of a block (encode side).
    pub fn build<'a, I>(strings: I) -> Result<Alphabet>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut builder = AlphabetBuilder::new();
        for s in strings {
            builder.add_string(s);
        }
        builder.finish()
    }

    /// Adopt the 60 bytes stored at the front of a string block (decode
    /// side). The stored order is the code assignment.
    pub fn from_table(table: [u8; ALPHABET_SIZE]) -> Alphabet {
        Alphabet { table }
    }

    pub fn as_table(&self) -> &[u8; ALPHABET_SIZE] {
        &self.table
    }

    pub fn index_of(&self, byte: u8) -> Option<u8> {
        self.table.iter().position(|&b| b == byte).map(|i| i as u8)
    }

    pub fn byte_at(&self, index: u8) -> u8 {
        self.table[index as usize]
    }

    /// Append one string's codes (terminator included) to `out`.
    pub fn encode(&self, text: &[u8], out: &mut CodeWriter) -> Result<()> {
        for &raw in text {
            let mut b = raw;
            if b.is_ascii_uppercase() {
                out.write_code(CODE_UPPERCASE_NEXT);
                b = b.to_ascii_lowercase();
            }
            self.encode_literal(b, out)?;
        }
        // NUL is counted for every string, so it is always representable.
        self.encode_literal(0, out)
    }

    fn encode_literal(&self, b: u8, out: &mut CodeWriter) -> Result<()> {
        let mut index = self.index_of(b).ok_or(CodecError::InvalidCharacter(b))?;
        if index >= 30 {
            out.write_code(CODE_HIGH_RANGE_NEXT);
            index -= 30;
        }
        out.write_code(index);
        Ok(())
    }

    /// Read codes until the NUL literal and return the decoded bytes.
    pub fn decode(&self, codes: &mut CodeReader) -> Result<Vec<u8>> {
        let mut text = Vec::new();
        let mut upper = false;
        let mut high = false;
        loop {
            match codes.read_code()? {
                CODE_UPPERCASE_NEXT => upper = true,
                CODE_HIGH_RANGE_NEXT => high = true,
                code => {
                    let index = if high { code + 30 } else { code };
                    let b = self.byte_at(index);
                    if b == 0 {
                        // Pending escapes at the terminator are dropped,
                        // matching the shipped decoder.
                        return Ok(text);
                    }
                    text.push(if upper { b.to_ascii_uppercase() } else { b });
                    upper = false;
                    high = false;
                }
            }
        }
    }
}

/// Reads packed 5-bit codes, MSB first, spanning byte boundaries.
pub struct CodeReader<'a> {
    reader: BitReader<'a>,
}

impl<'a> CodeReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        CodeReader {
            reader: BitReader::new(bytes),
        }
    }

    pub fn read_code(&mut self) -> Result<u8> {
        let at = (self.reader.position() / 8) as usize;
        self.reader
            .read_u8(5)
            .map_err(|_| CodecError::TruncatedStream {
                offset: at,
                needed: 1,
            })
    }
}

/// Write-side mirror of [`CodeReader`], backed by an MSB-first bit vector.
#[derive(Default)]
pub struct CodeWriter {
    bits: BitVec<u8, Msb0>,
}

impl CodeWriter {
    pub fn new() -> Self {
        CodeWriter::default()
    }

    pub fn write_code(&mut self, code: u8) {
        debug_assert!(code < 32);
        for shift in (0..5).rev() {
            self.bits.push(code >> shift & 1 == 1);
        }
    }

    /// Packed bytes; the final partial byte is zero-padded.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bits.into_vec()
    }
}

/// One string block: the 60-byte alphabet table followed by the packed
/// code stream of all strings back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringBlock {
    pub alphabet: Alphabet,
    pub strings: Vec<Vec<u8>>,
}

impl StringBlock {
    /// Build a block (and its alphabet) from plain strings.
    pub fn build(strings: Vec<Vec<u8>>) -> Result<StringBlock> {
        let alphabet = Alphabet::build(strings.iter().map(|s| s.as_slice()))?;
        Ok(StringBlock { alphabet, strings })
    }

    /// Decode a block. The count is not stored in the block itself; the
    /// caller supplies it from the map header.
    pub fn decode(data: &[u8], count: usize) -> Result<StringBlock> {
        if data.len() < ALPHABET_SIZE {
            return Err(CodecError::TruncatedStream {
                offset: data.len(),
                needed: ALPHABET_SIZE - data.len(),
            });
        }
        let mut table = [0u8; ALPHABET_SIZE];
        table.copy_from_slice(&data[..ALPHABET_SIZE]);
        let alphabet = Alphabet::from_table(table);

        let mut codes = CodeReader::new(&data[ALPHABET_SIZE..]);
        let mut strings = Vec::with_capacity(count);
        for i in 0..count {
            let s = alphabet.decode(&mut codes)?;
            trace!("string {} = {} byte(s)", i, s.len());
            strings.push(s);
        }
        debug!("decoded string block: {} string(s)", strings.len());
        Ok(StringBlock { alphabet, strings })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::from(&self.alphabet.as_table()[..]);
        let mut codes = CodeWriter::new();
        for s in &self.strings {
            self.alphabet.encode(s, &mut codes)?;
        }
        out.extend_from_slice(&codes.into_bytes());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn codes_of(bytes: &[u8], n: usize) -> Vec<u8> {
        let mut r = CodeReader::new(bytes);
        (0..n).map(|_| r.read_code().unwrap()).collect()
    }

    #[test]
    fn aab_alphabet_and_codes() {
        // Frequencies: 'a' twice, 'b' once, NUL once; ties keep first-seen
        // order, so 'a' gets code 0, 'b' code 1, NUL code 2.
        let alphabet = Alphabet::build([b"AAB".as_slice()]).unwrap();
        assert_eq!(alphabet.byte_at(0), b'a');
        assert_eq!(alphabet.index_of(b'b'), Some(1));
        assert_eq!(alphabet.index_of(0), Some(2));

        // Every uppercase letter carries its own escape, 'B' included.
        let mut w = CodeWriter::new();
        alphabet.encode(b"AAB", &mut w).unwrap();
        let packed = w.into_bytes();
        assert_eq!(
            codes_of(&packed, 7),
            vec![
                CODE_UPPERCASE_NEXT,
                0,
                CODE_UPPERCASE_NEXT,
                0,
                CODE_UPPERCASE_NEXT,
                1,
                2
            ]
        );
    }

    #[test]
    fn build_always_yields_sixty_distinct_codes() {
        let alphabet = Alphabet::build([b"hello world".as_slice()]).unwrap();
        let table = alphabet.as_table();
        assert_eq!(table.len(), ALPHABET_SIZE);
        for &b in b"helo wrd\0" {
            assert_eq!(alphabet.byte_at(alphabet.index_of(b).unwrap()), b);
        }
    }

    #[test]
    fn high_range_escape_round_trip() {
        // Thirty-plus distinct bytes force part of the text into the high
        // half of the table.
        let text: Vec<u8> = (b'!'..b'!' + 40).collect();
        let alphabet = Alphabet::build([text.as_slice()]).unwrap();

        let mut w = CodeWriter::new();
        alphabet.encode(&text, &mut w).unwrap();
        let packed = w.into_bytes();

        let mut r = CodeReader::new(&packed);
        assert_eq!(alphabet.decode(&mut r).unwrap(), text);
    }

    #[test]
    fn mixed_case_round_trip() {
        let text = b"Highpool is Under Attack!".to_vec();
        let alphabet = Alphabet::build([text.as_slice()]).unwrap();

        let mut w = CodeWriter::new();
        alphabet.encode(&text, &mut w).unwrap();
        let packed = w.into_bytes();

        let mut r = CodeReader::new(&packed);
        assert_eq!(alphabet.decode(&mut r).unwrap(), text);
    }

    #[test]
    fn unencodable_byte_is_rejected() {
        let alphabet = Alphabet::build([b"abc".as_slice()]).unwrap();
        let mut w = CodeWriter::new();
        assert_eq!(
            alphabet.encode(b"xyz", &mut w).unwrap_err(),
            CodecError::InvalidCharacter(b'x')
        );
    }

    #[test]
    fn overflow_past_sixty_distinct_bytes() {
        let text: Vec<u8> = (1u8..=80).collect();
        assert!(matches!(
            Alphabet::build([text.as_slice()]),
            Err(CodecError::AlphabetOverflow(_))
        ));
    }

    #[test]
    fn string_block_round_trip() {
        let block = StringBlock::build(vec![
            b"You see a pile of rubble.".to_vec(),
            b"The door is LOCKED.".to_vec(),
            Vec::new(),
            b"It opens.".to_vec(),
        ])
        .unwrap();

        let bytes = block.encode().unwrap();
        assert_eq!(&bytes[..ALPHABET_SIZE], &block.alphabet.as_table()[..]);

        let decoded = StringBlock::decode(&bytes, block.strings.len()).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn stored_table_order_is_the_code_assignment() {
        let mut table = [PAD_BYTE; ALPHABET_SIZE];
        table[0] = b'e';
        table[1] = 0;
        table[2] = b't';
        let alphabet = Alphabet::from_table(table);
        assert_eq!(alphabet.index_of(b't'), Some(2));
        assert_eq!(alphabet.byte_at(0), b'e');
    }
}
