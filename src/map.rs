//! Whole map-block decode/encode: header, central directory, the two
//! per-square grids, the per-class instruction streams and the string
//! block, wired together through the relocation resolver.
//!
//! Block layout:
//!
//! ```text
//! 0x00  width, height, flags, monster_count, npc_count, string_count
//! 0x06  central directory (u16 LE, block-relative):
//!       strings, monster_names, monster_data, npcs, nibble6,
//!       16-slot action-class master table
//! 0x30  action-class grid   (two squares per byte, high nibble first)
//!       action-selector grid (one byte per square)
//!       ...instruction streams and tables at the directory offsets
//! ```

use std::collections::HashMap;

use log::{debug, info};

use crate::alphabet::{StringBlock, ALPHABET_SIZE};
use crate::cursor::{Cursor, Writer};
use crate::error::{CodecError, Result};
use crate::reloc::{self, MapUsage, Relocations, CLASS_COUNT};
use crate::special::SpecialActionTable;
use crate::stream::ActionStream;

/// Fixed size of the header plus central directory.
pub const HEADER_SIZE: usize = 0x30;

/// Map flag bit: the random-encounter table (class 15) is live.
const FLAG_RANDOM_ENCOUNTERS: u8 = 0x01;

/// Bytes per monster record / per NPC record in the flat tables the core
/// carries through without interpreting.
const MONSTER_RECORD: usize = 8;
const NPC_RECORD: usize = 16;

/// One fully decoded map block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapBlock {
    pub width: u8,
    pub height: u8,
    pub random_encounters: bool,
    /// Action class per square, row-major, 0 = no action.
    pub action_classes: Vec<u8>,
    /// Action selector per square.
    pub action_selectors: Vec<u8>,
    /// Extra class-6 selector nibbles, present only while class 6 is live.
    pub nibble6: Option<Vec<u8>>,
    /// Flat monster records, opaque to the core.
    pub monster_data: Vec<u8>,
    pub monster_names: Vec<Vec<u8>>,
    /// Flat NPC records, opaque to the core.
    pub npcs: Vec<u8>,
    /// Live instruction streams, ascending class order.
    pub streams: Vec<ActionStream>,
    pub strings: StringBlock,
}

impl MapBlock {
    fn squares(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn grid_bytes(&self) -> usize {
        (self.squares() + 1) / 2
    }

    fn usage(&self) -> MapUsage {
        let mut used_classes = [false; CLASS_COUNT];
        for &c in &self.action_classes {
            used_classes[c as usize & 0x0F] = true;
        }
        used_classes[0] = false;
        MapUsage {
            used_classes,
            monster_count: self.monster_names.len(),
            npc_count: self.npcs.len() / NPC_RECORD,
            random_encounters: self.random_encounters,
        }
    }

    pub fn stream_for(&self, class: u8) -> Option<&ActionStream> {
        self.streams.iter().find(|s| s.class == class)
    }

    /// Decode a whole block.
    pub fn decode(block: &[u8], specials: &SpecialActionTable) -> Result<MapBlock> {
        let mut c = Cursor::new(block);
        let width = c.read_byte()?;
        let height = c.read_byte()?;
        let flags = c.read_byte()?;
        let monster_count = c.read_byte()? as usize;
        let npc_count = c.read_byte()? as usize;
        let string_count = c.read_byte()? as usize;

        let strings_off = c.read_word()?;
        let monster_names_off = c.read_word()?;
        let monster_data_off = c.read_word()?;
        let npcs_off = c.read_word()?;
        let nibble6_off = c.read_word()?;
        let mut class_offsets = [0u16; CLASS_COUNT];
        for off in class_offsets.iter_mut() {
            *off = c.read_word()?;
        }

        let squares = width as usize * height as usize;
        let grid_bytes = (squares + 1) / 2;
        let mut action_classes = Vec::with_capacity(squares);
        for &b in c.read_slice(grid_bytes)? {
            action_classes.push(b >> 4);
            if action_classes.len() < squares {
                action_classes.push(b & 0x0F);
            }
        }
        let action_selectors = c.read_slice(squares)?.to_vec();

        let mut used_classes = [false; CLASS_COUNT];
        for &cl in &action_classes {
            used_classes[cl as usize] = true;
        }
        used_classes[0] = false;
        let usage = MapUsage {
            used_classes,
            monster_count,
            npc_count,
            random_encounters: flags & FLAG_RANDOM_ENCOUNTERS != 0,
        };

        let relocations = reloc::resolve(
            Relocations {
                class_offsets,
                monster_names: monster_names_off,
                monster_data: monster_data_off,
                npcs: npcs_off,
                nibble6: nibble6_off,
            },
            &usage,
        )?;

        let mut streams = Vec::new();
        for class in 1..CLASS_COUNT as u8 {
            let off = relocations.class_offsets[class as usize];
            if off != 0 {
                streams.push(ActionStream::decode(block, off as usize, class, specials)?);
            }
        }

        let nibble6 = if relocations.nibble6 != 0 {
            let mut nc = Cursor::at(block, relocations.nibble6 as usize);
            Some(nc.read_slice(grid_bytes)?.to_vec())
        } else {
            None
        };

        let monster_data = if monster_count > 0 {
            let mut mc = Cursor::at(block, relocations.monster_data as usize);
            mc.read_slice(monster_count * MONSTER_RECORD)?.to_vec()
        } else {
            Vec::new()
        };

        let mut monster_names = Vec::with_capacity(monster_count);
        if monster_count > 0 {
            let mut nc = Cursor::at(block, relocations.monster_names as usize);
            for _ in 0..monster_count {
                let mut name = Vec::new();
                loop {
                    match nc.read_byte()? {
                        0 => break,
                        b => name.push(b),
                    }
                }
                monster_names.push(name);
            }
        }

        let npcs = if npc_count > 0 {
            let mut pc = Cursor::at(block, relocations.npcs as usize);
            pc.read_slice(npc_count * NPC_RECORD)?.to_vec()
        } else {
            Vec::new()
        };

        let strings = if string_count > 0 {
            let off = strings_off as usize;
            let data = block.get(off..).ok_or(CodecError::TruncatedStream {
                offset: off,
                needed: ALPHABET_SIZE,
            })?;
            StringBlock::decode(data, string_count)?
        } else {
            StringBlock::build(Vec::new())?
        };

        info!(
            "decoded map block {}x{}: {} stream(s), {} string(s), {} monster(s)",
            width,
            height,
            streams.len(),
            strings.strings.len(),
            monster_count
        );
        Ok(MapBlock {
            width,
            height,
            random_encounters: usage.random_encounters,
            action_classes,
            action_selectors,
            nibble6,
            monster_data,
            monster_names,
            npcs,
            streams,
            strings,
        })
    }

    /// Serialize the block. Sections land in ascending class order with
    /// the string block last; byte-identical class streams share one copy,
    /// as the legacy linker's output does, but only where the resolver
    /// could tell them apart again.
    pub fn encode(&self, specials: &SpecialActionTable) -> Result<Vec<u8>> {
        let squares = self.squares();
        if self.action_classes.len() != squares || self.action_selectors.len() != squares {
            return Err(CodecError::TruncatedStream {
                offset: 0,
                needed: squares,
            });
        }
        // The flat tables must agree with the counts the header will carry.
        if self.monster_data.len() != self.monster_names.len() * MONSTER_RECORD {
            return Err(CodecError::TruncatedStream {
                offset: 0,
                needed: self.monster_names.len() * MONSTER_RECORD,
            });
        }
        if self.npcs.len() % NPC_RECORD != 0 {
            return Err(CodecError::TruncatedStream {
                offset: 0,
                needed: self.npcs.len().next_multiple_of(NPC_RECORD),
            });
        }
        let usage = self.usage();

        let mut w = Writer::new();
        w.write_byte(self.width);
        w.write_byte(self.height);
        w.write_byte(if self.random_encounters {
            FLAG_RANDOM_ENCOUNTERS
        } else {
            0
        });
        w.write_byte(self.monster_names.len() as u8);
        w.write_byte((self.npcs.len() / NPC_RECORD) as u8);
        w.write_byte(self.strings.strings.len() as u8);

        // Directory placeholders, patched as each section lands.
        let dir = w.tell();
        for _ in 0..5 + CLASS_COUNT {
            w.write_word(0);
        }
        let dir_strings = dir;
        let dir_monster_names = dir + 2;
        let dir_monster_data = dir + 4;
        let dir_npcs = dir + 6;
        let dir_nibble6 = dir + 8;
        let dir_classes = dir + 10;
        debug_assert_eq!(w.tell(), HEADER_SIZE);

        // Class grid, two squares per byte, high nibble first.
        let mut i = 0;
        while i < squares {
            let hi = self.action_classes[i] & 0x0F;
            let lo = if i + 1 < squares {
                self.action_classes[i + 1] & 0x0F
            } else {
                0
            };
            w.write_byte(hi << 4 | lo);
            i += 2;
        }
        w.write_slice(&self.action_selectors);

        // Instruction streams, deduplicating identical layouts the way the
        // legacy linker did. Sharing is only allowed where the resolver
        // can later decide the owner.
        let mut seen: HashMap<Vec<u8>, (u16, u8)> = HashMap::new();
        for stream in &self.streams {
            if stream.class == 0 || stream.class as usize >= CLASS_COUNT {
                return Err(CodecError::UnknownActionClass(stream.class));
            }
            let bytes = stream.encode(specials)?;
            let entry = seen.get(&bytes).copied();
            let off = match entry {
                Some((off, owner)) if can_share(stream.class, owner, &usage) => {
                    debug!(
                        "class {} shares stream bytes with class {} at {:#06x}",
                        stream.class, owner, off
                    );
                    off
                }
                _ => {
                    let off = w.tell() as u16;
                    w.write_slice(&bytes);
                    seen.insert(bytes, (off, stream.class));
                    off
                }
            };
            w.patch_word(dir_classes + stream.class as usize * 2, off);
        }

        if let Some(nibble6) = &self.nibble6 {
            if self.stream_for(6).is_some() {
                if nibble6.len() != self.grid_bytes() {
                    return Err(CodecError::TruncatedStream {
                        offset: w.tell(),
                        needed: self.grid_bytes(),
                    });
                }
                w.patch_word(dir_nibble6, w.tell() as u16);
                w.write_slice(nibble6);
            }
        }

        if !self.monster_names.is_empty() {
            w.patch_word(dir_monster_data, w.tell() as u16);
            w.write_slice(&self.monster_data);
            w.patch_word(dir_monster_names, w.tell() as u16);
            for name in &self.monster_names {
                w.write_slice(name);
                w.write_byte(0);
            }
        }

        if !self.npcs.is_empty() {
            w.patch_word(dir_npcs, w.tell() as u16);
            w.write_slice(&self.npcs);
        }

        if !self.strings.strings.is_empty() {
            w.patch_word(dir_strings, w.tell() as u16);
            w.write_slice(&self.strings.encode()?);
        }

        Ok(w.into_bytes())
    }
}

/// Two classes may share one stream layout only if the resolver will be
/// able to pick the owner back out on decode.
fn can_share(a: u8, b: u8, usage: &MapUsage) -> bool {
    let ra = usage.used_classes[a as usize];
    let rb = usage.used_classes[b as usize];
    if ra && rb {
        return false;
    }
    ra || rb || a == 15 || b == 15
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Encounter, Print};
    use crate::framing::ClassPair;
    use test_log::test;

    const NO_SPECIALS: &[u16] = &[];

    fn print_action(msg: u8) -> Option<Action> {
        Some(Action::Print(Print {
            messages: vec![msg],
            next: ClassPair::NONE,
        }))
    }

    fn small_block() -> MapBlock {
        let squares = 4 * 4;
        let mut action_classes = vec![0u8; squares];
        action_classes[0] = 1;
        action_classes[5] = 1;
        let mut action_selectors = vec![0u8; squares];
        action_selectors[0] = 0;
        action_selectors[5] = 1;

        MapBlock {
            width: 4,
            height: 4,
            random_encounters: false,
            action_classes,
            action_selectors,
            nibble6: None,
            monster_data: vec![0xAB; 2 * 8],
            monster_names: vec![b"rat".to_vec(), b"raider".to_vec()],
            npcs: vec![0xCD; 16],
            streams: vec![ActionStream {
                class: 1,
                slots: vec![print_action(3), print_action(7)],
            }],
            strings: StringBlock::build(vec![
                b"A rat scurries past.".to_vec(),
                b"The raider sneers.".to_vec(),
            ])
            .unwrap(),
        }
    }

    #[test]
    fn whole_block_round_trip() {
        let block = small_block();
        let bytes = block.encode(NO_SPECIALS).unwrap();
        let back = MapBlock::decode(&bytes, NO_SPECIALS).unwrap();
        assert_eq!(back, block);
        // Re-encoding the decoded block reproduces the bytes exactly.
        assert_eq!(back.encode(NO_SPECIALS).unwrap(), bytes);
    }

    #[test]
    fn empty_tables_round_trip() {
        let mut block = small_block();
        block.monster_data.clear();
        block.monster_names.clear();
        block.npcs.clear();
        block.strings = StringBlock::build(Vec::new()).unwrap();

        let bytes = block.encode(NO_SPECIALS).unwrap();
        let back = MapBlock::decode(&bytes, NO_SPECIALS).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn identical_streams_share_bytes_when_resolvable() {
        let mut block = small_block();
        // The class 15 encounter happens to serialize to the same bytes as
        // class 1's print ([0x03, 0x87, 0xFF] after each one-slot table),
        // so encode emits one copy with both master-table slots on it.
        block.random_encounters = true;
        block.streams = vec![
            ActionStream {
                class: 1,
                slots: vec![Some(Action::Print(Print {
                    messages: vec![3, 7],
                    next: ClassPair::NONE,
                }))],
            },
            ActionStream {
                class: 15,
                slots: vec![Some(Action::Encounter(Encounter {
                    monster: 3,
                    max_group: 0x87,
                    next: ClassPair::NONE,
                }))],
            },
        ];
        let bytes = block.encode(NO_SPECIALS).unwrap();

        // On decode the resolver hands the shared offset to class 1, the
        // one the grid references, and zeroes class 15.
        let back = MapBlock::decode(&bytes, NO_SPECIALS).unwrap();
        assert!(back.stream_for(1).is_some());
        assert!(back.stream_for(15).is_none());
    }

    #[test]
    fn ragged_monster_table_fails_encode() {
        let mut block = small_block();
        block.monster_data.pop();
        let err = block.encode(NO_SPECIALS).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedStream { offset: 0, needed: 16 }
        );
    }

    #[test]
    fn ragged_npc_table_fails_encode() {
        let mut block = small_block();
        block.npcs.push(0xEE);
        let err = block.encode(NO_SPECIALS).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedStream { offset: 0, needed: 32 }
        );
    }

    #[test]
    fn odd_square_count_grid() {
        let mut block = small_block();
        block.width = 3;
        block.height = 3;
        block.action_classes = vec![1, 0, 0, 0, 0, 0, 0, 0, 1];
        block.action_selectors = vec![0; 9];
        block.action_selectors[8] = 1;

        let bytes = block.encode(NO_SPECIALS).unwrap();
        let back = MapBlock::decode(&bytes, NO_SPECIALS).unwrap();
        assert_eq!(back, block);
    }
}
