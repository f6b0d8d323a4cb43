//! Framing conventions shared by every instruction kind: the trailing
//! action-class/selector pair and the two sentinel-terminated list styles.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::error::Result;

/// Action classes at or above this value are single-byte no-op/sentinel
/// classes; the selector byte that normally follows is omitted entirely.
pub const BARE_CLASS_MIN: u8 = 253;

/// A trailing (action class, action selector) pair.
///
/// The selector is `None` exactly when the class is ≥ [`BARE_CLASS_MIN`],
/// mirroring the one-byte form on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPair {
    pub class: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<u8>,
}

impl ClassPair {
    /// The "nothing follows" pair, the most common trailer in shipped maps.
    pub const NONE: ClassPair = ClassPair {
        class: 255,
        selector: None,
    };

    pub fn new(class: u8, selector: u8) -> Self {
        if class >= BARE_CLASS_MIN {
            ClassPair {
                class,
                selector: None,
            }
        } else {
            ClassPair {
                class,
                selector: Some(selector),
            }
        }
    }

    pub fn read(c: &mut Cursor) -> Result<ClassPair> {
        let class = c.read_byte()?;
        let selector = if class >= BARE_CLASS_MIN {
            None
        } else {
            Some(c.read_byte()?)
        };
        trace!("class pair {:?}/{:?}", class, selector);
        Ok(ClassPair { class, selector })
    }

    pub fn write(&self, w: &mut Writer) {
        w.write_byte(self.class);
        if self.class < BARE_CLASS_MIN {
            w.write_byte(self.selector.unwrap_or(0));
        }
    }
}

/// End-of-list sentinel for the 0xFF-terminated list styles.
pub const LIST_TERMINATOR: u8 = 0xFF;

/// High bit marking "last record" in the high-bit-terminated list styles.
pub const LAST_RECORD_FLAG: u8 = 0x80;

/// Read records until a literal 0xFF sentinel.
///
/// `read_one` consumes exactly one record; the sentinel byte itself is
/// consumed here. A list reduced to the bare sentinel yields zero records.
pub fn read_ff_terminated<T>(
    c: &mut Cursor,
    mut read_one: impl FnMut(&mut Cursor) -> Result<T>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    loop {
        if c.peek_byte()? == LIST_TERMINATOR {
            c.read_byte()?;
            return Ok(out);
        }
        out.push(read_one(c)?);
    }
}

/// Write the records of a 0xFF-terminated list followed by the sentinel.
pub fn write_ff_terminated<T>(w: &mut Writer, items: &[T], mut write_one: impl FnMut(&mut Writer, &T)) {
    for item in items {
        write_one(w, item);
    }
    w.write_byte(LIST_TERMINATOR);
}

/// Read records until one reports itself as last (high bit of its flag
/// byte). `read_one` returns `(record, is_last)`. At least one record is
/// always present in this list style.
pub fn read_high_bit_terminated<T>(
    c: &mut Cursor,
    mut read_one: impl FnMut(&mut Cursor) -> Result<(T, bool)>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    loop {
        let (record, last) = read_one(c)?;
        out.push(record);
        if last {
            return Ok(out);
        }
    }
}

/// Write a high-bit-terminated list; `write_one` receives `is_last` so it
/// can set the flag bit on the final record.
pub fn write_high_bit_terminated<T>(
    w: &mut Writer,
    items: &[T],
    mut write_one: impl FnMut(&mut Writer, &T, bool),
) {
    let n = items.len();
    for (i, item) in items.iter().enumerate() {
        write_one(w, item, i + 1 == n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bare_class_drops_selector() {
        let mut w = Writer::new();
        ClassPair::new(255, 9).write(&mut w);
        assert_eq!(w.as_slice(), &[255]);

        let mut c = Cursor::new(&[255]);
        let p = ClassPair::read(&mut c).unwrap();
        assert_eq!(p, ClassPair::NONE);
    }

    #[test]
    fn boundary_classes() {
        // 252 keeps its selector, 253 is the first bare class.
        let mut w = Writer::new();
        ClassPair::new(252, 7).write(&mut w);
        ClassPair::new(253, 7).write(&mut w);
        assert_eq!(w.as_slice(), &[252, 7, 253]);

        let mut c = Cursor::new(w.as_slice());
        assert_eq!(
            ClassPair::read(&mut c).unwrap(),
            ClassPair { class: 252, selector: Some(7) }
        );
        assert_eq!(
            ClassPair::read(&mut c).unwrap(),
            ClassPair { class: 253, selector: None }
        );
    }

    #[test]
    fn empty_ff_list_is_bare_sentinel() {
        let mut c = Cursor::new(&[0xFF]);
        let items = read_ff_terminated(&mut c, |c| c.read_byte()).unwrap();
        assert!(items.is_empty());
        assert_eq!(c.tell(), 1);

        let mut w = Writer::new();
        write_ff_terminated::<u8>(&mut w, &[], |w, b| w.write_byte(*b));
        assert_eq!(w.as_slice(), &[0xFF]);
    }

    #[test]
    fn high_bit_list_stops_on_flag() {
        // Two one-byte records, second carries the last flag.
        let mut c = Cursor::new(&[0x03, 0x85]);
        let items = read_high_bit_terminated(&mut c, |c| {
            let b = c.read_byte()?;
            Ok((b & 0x7F, b & LAST_RECORD_FLAG != 0))
        })
        .unwrap();
        assert_eq!(items, vec![3, 5]);
    }
}
