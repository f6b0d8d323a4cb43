//! Shared-offset disambiguation for the action-class master table.
//!
//! The legacy linker de-duplicated identical instruction streams, so
//! several of the 16 master-table slots can point at one offset even
//! though at most one of those classes really owns the data. Each class
//! is modeled as an independent stream, so before anything is decoded or
//! laid out the table has to be reduced to one owner per offset.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::error::{CodecError, Result};

/// Number of slots in the action-class master table.
pub const CLASS_COUNT: usize = 16;

/// Class whose presence is asserted by the map's random-encounter flag
/// rather than by the per-square grid.
const RANDOM_ENCOUNTER_CLASS: u8 = 15;

/// The offsets the resolver reconciles: the 16-slot master table plus the
/// named offsets that are known to alias it in shipped files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocations {
    pub class_offsets: [u16; CLASS_COUNT],
    pub monster_names: u16,
    pub monster_data: u16,
    pub npcs: u16,
    pub nibble6: u16,
}

/// What the rest of the decoded map actually uses.
#[derive(Debug, Clone, Default)]
pub struct MapUsage {
    /// Classes painted onto the per-square action-class grid.
    pub used_classes: [bool; CLASS_COUNT],
    pub monster_count: usize,
    pub npc_count: usize,
    pub random_encounters: bool,
}

/// A shipped file where none of the general rules decide the owner.
struct KnownException {
    classes: &'static [u8],
    offset: u16,
    winner: u8,
}

/// Closed list, keyed by exact candidate set and offset value.
const KNOWN_EXCEPTIONS: &[KnownException] = &[
    KnownException { classes: &[2, 11], offset: 0x0C32, winner: 2 },
    KnownException { classes: &[1, 10], offset: 0x0A06, winner: 10 },
    KnownException { classes: &[4, 5], offset: 0x1B40, winner: 5 },
];

/// Reduce `r` so every nonzero offset has exactly one owner.
pub fn resolve(mut r: Relocations, usage: &MapUsage) -> Result<Relocations> {
    // Named offsets for empty logical tables are leftovers, not data.
    if usage.monster_count == 0 {
        r.monster_names = 0;
        r.monster_data = 0;
    }
    if usage.npc_count == 0 {
        r.npcs = 0;
    }
    if !usage.random_encounters {
        r.class_offsets[RANDOM_ENCOUNTER_CLASS as usize] = 0;
    }

    // Known aliasing artifacts against the monster-name table.
    if r.monster_names != 0 {
        if r.nibble6 == r.monster_names {
            debug!("nibble-6 offset aliases monster names, zeroing");
            r.nibble6 = 0;
        }
        for (class, off) in r.class_offsets.iter_mut().enumerate() {
            if *off == r.monster_names {
                debug!("class {} offset aliases monster names, zeroing", class);
                *off = 0;
            }
        }
    }

    // Group the master table by offset value; each shared group needs a
    // single owner. BTreeMap keeps the walk deterministic.
    let mut groups: BTreeMap<u16, Vec<u8>> = BTreeMap::new();
    for (class, &off) in r.class_offsets.iter().enumerate() {
        if off != 0 {
            groups.entry(off).or_default().push(class as u8);
        }
    }

    for (offset, classes) in groups {
        if classes.len() < 2 {
            continue;
        }
        let winner = pick_owner(offset, &classes, usage)?;
        trace!("offset {:#06x}: {:?} resolved to class {}", offset, classes, winner);
        for &class in &classes {
            if class != winner {
                r.class_offsets[class as usize] = 0;
            }
        }
    }

    // The nibble-6 table only means anything while class 6 is live.
    if r.class_offsets[6] == 0 {
        r.nibble6 = 0;
    }
    Ok(r)
}

fn pick_owner(offset: u16, classes: &[u8], usage: &MapUsage) -> Result<u8> {
    let referenced: Vec<u8> = classes
        .iter()
        .copied()
        .filter(|&c| usage.used_classes[c as usize])
        .collect();

    match referenced.as_slice() {
        [one] => return Ok(*one),
        [] => {}
        many => {
            // The format cannot express two live classes at one offset.
            return Err(CodecError::AmbiguousOffsetOwnership {
                offset,
                classes: many.to_vec(),
            });
        }
    }

    // Nothing on the grid claims it; random encounters are asserted by
    // the map flag instead, so class 15 wins by convention.
    if classes.contains(&RANDOM_ENCOUNTER_CLASS) {
        return Ok(RANDOM_ENCOUNTER_CLASS);
    }

    for e in KNOWN_EXCEPTIONS {
        if e.offset == offset && e.classes == classes {
            debug!(
                "offset {:#06x}: known exception resolves {:?} to class {}",
                offset, classes, e.winner
            );
            return Ok(e.winner);
        }
    }

    Err(CodecError::UnresolvableOffsetConflict {
        offset,
        classes: classes.to_vec(),
    })
}
