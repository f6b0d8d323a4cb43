//! The class-6 ("special building") indirection layer.
//!
//! A class-6 instruction starts with an index into a caller-supplied table
//! of 16-bit action identities. The identity, not the index, decides how
//! many bytes follow. That layout knowledge is a closed, hand-enumerated
//! table: any identity missing from it is a hard error, never a guess.

use std::collections::HashMap;

use crate::error::{CodecError, Result};

/// Caller-supplied, read-only: ordinal index ↦ true action identity.
pub type SpecialActionTable = [u16];

/// Byte layout of one special action identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialLayout {
    /// Fixed argument bytes following the index byte.
    pub arg_len: usize,
    /// Free-form tail read until a literal 0xFF.
    pub ff_tail: bool,
    /// Trailing action-class/selector pair.
    pub branch: bool,
}

const fn layout(arg_len: usize, ff_tail: bool, branch: bool) -> SpecialLayout {
    SpecialLayout {
        arg_len,
        ff_tail,
        branch,
    }
}

lazy_static! {
    /// Every special action identity the shipped files use.
    static ref SPECIAL_LAYOUTS: HashMap<u16, SpecialLayout> = {
        let mut m = HashMap::new();
        m.insert(0x0001, layout(3, true, false));  // shop counter + stock list
        m.insert(0x0002, layout(2, false, true));  // doctor
        m.insert(0x0003, layout(2, false, true));  // hotel room
        m.insert(0x0004, layout(3, true, false));  // skill trainer + course list
        m.insert(0x0005, layout(1, false, true));  // ranger promotion board
        m.insert(0x0010, layout(2, false, true));  // toll gate
        m.insert(0x0011, layout(2, false, true));  // locked door
        m.insert(0x0012, layout(1, true, false));  // combination lock digits
        m.insert(0x0020, layout(1, false, false)); // water refill
        m.insert(0x0021, layout(1, false, false)); // radiation cleanse
        m.insert(0x0030, layout(4, false, false)); // teleporter pad
        m.insert(0x0031, layout(1, true, false));  // elevator floor list
        m.insert(0x0040, layout(3, false, true));  // slot machine
        m.insert(0x00FF, layout(0, false, false)); // inert barricade
        m
    };
}

/// Layout for a true action identity, or `UnknownSpecialAction`.
pub fn layout_of(action: u16) -> Result<SpecialLayout> {
    SPECIAL_LAYOUTS
        .get(&action)
        .copied()
        .ok_or(CodecError::UnknownSpecialAction(action))
}

/// Decode side: turn a stored index into the identity it names.
pub fn resolve(table: &SpecialActionTable, index: u8) -> Result<u16> {
    table
        .get(index as usize)
        .copied()
        .ok_or(CodecError::UnknownSpecialAction(index as u16))
}

/// Encode side: find the index for an identity. The table is shared and
/// fixed; the encoder may not extend it.
pub fn index_for(table: &SpecialActionTable, action: u16) -> Result<u8> {
    table
        .iter()
        .position(|&a| a == action)
        .map(|i| i as u8)
        .ok_or(CodecError::ActionNotInTable(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn known_layouts_resolve() {
        let l = layout_of(0x0001).unwrap();
        assert_eq!(l, layout(3, true, false));
        assert!(layout_of(0x0030).unwrap().arg_len == 4);
    }

    #[test]
    fn unknown_identity_is_fatal() {
        assert_eq!(
            layout_of(0xBEEF).unwrap_err(),
            CodecError::UnknownSpecialAction(0xBEEF)
        );
    }

    #[test]
    fn index_lookup_both_ways() {
        let table = [0x0001u16, 0x0020, 0x0011];
        assert_eq!(resolve(&table, 2).unwrap(), 0x0011);
        assert_eq!(index_for(&table, 0x0020).unwrap(), 1);
        assert_eq!(
            index_for(&table, 0x0003).unwrap_err(),
            CodecError::ActionNotInTable(0x0003)
        );
    }
}
