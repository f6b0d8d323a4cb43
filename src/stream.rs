//! One action class's instruction stream: an offset table of little-endian
//! words followed by a byte pool holding the instructions themselves.
//!
//! The slot count is not stored. The table always spans `N * 2` bytes and
//! the first instruction normally sits right at its end, so the decoder
//! keeps reading offsets until its own position reaches the smallest
//! nonzero offset collected so far. That rule is inherited from the legacy
//! tooling as observed behavior; anything that trips it up is a heuristic
//! bug to surface, not format behavior to absorb.

use log::{debug, trace};

use crate::action::{self, Action};
use crate::cursor::{Cursor, Writer};
use crate::error::{CodecError, Result};
use crate::patches;
use crate::special::SpecialActionTable;

/// The decoded instruction sequence for one action class. Slot order is
/// identity: instruction k of class c is addressed as (c, k) by the rest
/// of the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionStream {
    pub class: u8,
    pub slots: Vec<Option<Action>>,
}

impl ActionStream {
    pub fn new(class: u8) -> Self {
        ActionStream {
            class,
            slots: Vec::new(),
        }
    }

    /// Decode the stream whose offset table starts at `table_start`.
    /// Offsets are relative to the table start.
    pub fn decode(
        block: &[u8],
        table_start: usize,
        class: u8,
        specials: &SpecialActionTable,
    ) -> Result<ActionStream> {
        let mut c = Cursor::at(block, table_start);
        let mut offsets: Vec<u16> = Vec::new();
        let mut first_data: Option<usize> = None;

        loop {
            let rel = c.tell() - table_start;
            if let Some(fd) = first_data {
                if rel >= fd {
                    break;
                }
            }
            let off = c.read_word()? as usize;
            if off != 0 {
                if off < rel {
                    // An offset pointing back into bytes already consumed
                    // as table entries means the boundary heuristic has
                    // misfired somewhere. Surface it; do not paper over it.
                    debug!(
                        "offset {:#06x} points back into the table (read at +{:#06x})",
                        off, rel
                    );
                }
                first_data = Some(first_data.map_or(off, |fd| fd.min(off)));
            }
            offsets.push(off as u16);
        }
        trace!(
            "class {}: inferred {} slot(s), pool at +{:#06x}",
            class,
            offsets.len(),
            first_data.unwrap_or(0)
        );

        let mut slots = Vec::with_capacity(offsets.len());
        for &off in &offsets {
            if off == 0 {
                slots.push(None);
                continue;
            }
            let mut ic = Cursor::at(block, table_start + off as usize);
            let decoded = action::decode(&mut ic, class, specials)?;
            slots.push(Some(patches::apply(decoded)));
        }
        debug!(
            "class {}: {} slot(s), {} live",
            class,
            slots.len(),
            slots.iter().filter(|s| s.is_some()).count()
        );
        Ok(ActionStream { class, slots })
    }

    /// Serialize the stream: offset table first, pool immediately after.
    /// Null slots keep their zero offsets. A slot holding an instruction
    /// of the wrong kind for this class is rejected, since the class
    /// alone selects the decoder on the way back in.
    pub fn encode(&self, specials: &SpecialActionTable) -> Result<Vec<u8>> {
        let table_len = self.slots.len() * 2;
        let mut table = Writer::new();
        let mut pool = Writer::new();

        for slot in &self.slots {
            match slot {
                None => table.write_word(0),
                Some(a) => {
                    if !a.matches_class(self.class) {
                        return Err(CodecError::ClassMismatch(self.class));
                    }
                    let off = table_len + pool.tell();
                    table.write_word(off as u16);
                    action::encode(a, &mut pool, specials)?;
                }
            }
        }
        let mut out = table.into_bytes();
        out.extend_from_slice(pool.as_slice());
        Ok(out)
    }
}

impl std::fmt::Display for ActionStream {
    /// Disassembly-style listing, one slot per line.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "class {} ({} slots)", self.class, self.slots.len())?;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(a) => writeln!(f, "  {:3}: {}", i, a)?,
                None => writeln!(f, "  {:3}: -", i)?,
            }
        }
        Ok(())
    }
}
