//! The per-square action instruction model and its byte codecs.
//!
//! Every map square can name one action out of a class table; each class
//! has its own variable-length layout. Decoding is a single dispatch on
//! the class discriminant, so the set of kinds is closed at compile time.

use std::fmt::{Display, Formatter};

use log::trace;
use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, Writer};
use crate::error::{CodecError, Result};
use crate::framing::{
    read_ff_terminated, read_high_bit_terminated, write_ff_terminated, write_high_bit_terminated,
    ClassPair, LAST_RECORD_FLAG,
};
use crate::special::{self, SpecialActionTable};

/// Dispatch classes. The action-class grid stores 0 for "no action";
/// class 15 reuses the encounter layout for the random-encounter table.
pub const CLASS_PRINT: u8 = 1;
pub const CLASS_CHECK: u8 = 2;
pub const CLASS_ENCOUNTER: u8 = 3;
pub const CLASS_MASK: u8 = 4;
pub const CLASS_LOOT: u8 = 5;
pub const CLASS_SPECIAL_BUILDING: u8 = 6;
pub const CLASS_DIALOGUE: u8 = 7;
pub const CLASS_RADIATION: u8 = 8;
pub const CLASS_TRANSITION: u8 = 9;
pub const CLASS_IMPASSABLE: u8 = 10;
pub const CLASS_ALTER: u8 = 11;
pub const CLASS_RANDOM_ENCOUNTER: u8 = 15;

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Print(Print),
    Check(Check),
    Encounter(Encounter),
    Mask(Mask),
    Loot(Loot),
    SpecialBuilding(SpecialBuilding),
    Dialogue(Dialogue),
    Radiation(Radiation),
    Transition(Transition),
    Impassable(Impassable),
    Alter(Alter),
}

impl Action {
    /// Whether this kind can legally occupy a slot of `class`. Only the
    /// encounter layout serves two classes (3 and the random-encounter
    /// table at 15).
    pub fn matches_class(&self, class: u8) -> bool {
        match self {
            Action::Print(_) => class == CLASS_PRINT,
            Action::Check(_) => class == CLASS_CHECK,
            Action::Encounter(_) => class == CLASS_ENCOUNTER || class == CLASS_RANDOM_ENCOUNTER,
            Action::Mask(_) => class == CLASS_MASK,
            Action::Loot(_) => class == CLASS_LOOT,
            Action::SpecialBuilding(_) => class == CLASS_SPECIAL_BUILDING,
            Action::Dialogue(_) => class == CLASS_DIALOGUE,
            Action::Radiation(_) => class == CLASS_RADIATION,
            Action::Transition(_) => class == CLASS_TRANSITION,
            Action::Impassable(_) => class == CLASS_IMPASSABLE,
            Action::Alter(_) => class == CLASS_ALTER,
        }
    }
}

/// Prints one or more messages, then chains to the next action.
///
/// Message bytes carry the last-record flag in the high bit, so indices
/// are limited to 0..=127. At least one message is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Print {
    pub messages: Vec<u8>,
    pub next: ClassPair,
}

impl Print {
    fn read(c: &mut Cursor) -> Result<Print> {
        let messages = read_high_bit_terminated(c, |c| {
            let b = c.read_byte()?;
            Ok((b & 0x7F, b & LAST_RECORD_FLAG != 0))
        })?;
        let next = ClassPair::read(c)?;
        Ok(Print { messages, next })
    }

    fn write(&self, w: &mut Writer) {
        write_high_bit_terminated(w, &self.messages, |w, &m, last| {
            let m = m & 0x7F;
            w.write_byte(if last { m | LAST_RECORD_FLAG } else { m });
        });
        self.next.write(w);
    }
}

/// One attribute/skill test within a [`Check`].
///
/// The attribute byte's high bit announces an optional one-shot
/// replacement pair after the two branch targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub attribute: u8,
    pub difficulty: u8,
    pub pass: ClassPair,
    pub fail: ClassPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<ClassPair>,
}

impl CheckEntry {
    fn read(c: &mut Cursor) -> Result<CheckEntry> {
        let head = c.read_byte()?;
        let difficulty = c.read_byte()?;
        let pass = ClassPair::read(c)?;
        let fail = ClassPair::read(c)?;
        let replacement = if head & LAST_RECORD_FLAG != 0 {
            Some(ClassPair::read(c)?)
        } else {
            None
        };
        Ok(CheckEntry {
            attribute: head & 0x7F,
            difficulty,
            pass,
            fail,
            replacement,
        })
    }

    fn write(&self, w: &mut Writer) {
        let mut head = self.attribute & 0x7F;
        if self.replacement.is_some() {
            head |= LAST_RECORD_FLAG;
        }
        w.write_byte(head);
        w.write_byte(self.difficulty);
        self.pass.write(w);
        self.fail.write(w);
        if let Some(r) = &self.replacement {
            r.write(w);
        }
    }
}

/// A skill/attribute check gate. Entries end at a literal 0xFF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub flags: u8,
    pub message: u8,
    pub entries: Vec<CheckEntry>,
}

impl Check {
    fn read(c: &mut Cursor) -> Result<Check> {
        let flags = c.read_byte()?;
        let message = c.read_byte()?;
        let entries = read_ff_terminated(c, CheckEntry::read)?;
        Ok(Check {
            flags,
            message,
            entries,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(self.flags);
        w.write_byte(self.message);
        write_ff_terminated(w, &self.entries, |w, e| e.write(w));
    }
}

/// A fixed monster encounter (also the random-encounter table layout).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub monster: u8,
    pub max_group: u8,
    pub next: ClassPair,
}

impl Encounter {
    fn read(c: &mut Cursor) -> Result<Encounter> {
        Ok(Encounter {
            monster: c.read_byte()?,
            max_group: c.read_byte()?,
            next: ClassPair::read(c)?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(self.monster);
        w.write_byte(self.max_group);
        self.next.write(w);
    }
}

/// Replaces the square's tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    pub tile: u8,
    pub next: ClassPair,
}

impl Mask {
    fn read(c: &mut Cursor) -> Result<Mask> {
        Ok(Mask {
            tile: c.read_byte()?,
            next: ClassPair::read(c)?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(self.tile);
        self.next.write(w);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootItem {
    pub item: u8,
    pub quantity: u8,
}

/// A loot pile: (item, quantity) entries ending at a literal 0xFF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loot {
    pub items: Vec<LootItem>,
    pub next: ClassPair,
}

impl Loot {
    fn read(c: &mut Cursor) -> Result<Loot> {
        let items = read_ff_terminated(c, |c| {
            Ok(LootItem {
                item: c.read_byte()?,
                quantity: c.read_byte()?,
            })
        })?;
        let next = ClassPair::read(c)?;
        Ok(Loot { items, next })
    }

    fn write(&self, w: &mut Writer) {
        write_ff_terminated(w, &self.items, |w, i| {
            w.write_byte(i.item);
            w.write_byte(i.quantity);
        });
        self.next.write(w);
    }
}

/// Class 6: not self-describing. The stored byte indexes the caller's
/// special action table; the resulting identity picks the layout.
///
/// The model stores the identity, not the index, so encode has to find
/// the identity in the table again (and fails if it cannot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialBuilding {
    pub action: u16,
    pub args: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tail: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<ClassPair>,
}

impl SpecialBuilding {
    fn read(c: &mut Cursor, table: &SpecialActionTable) -> Result<SpecialBuilding> {
        let index = c.read_byte()?;
        let action = special::resolve(table, index)?;
        let layout = special::layout_of(action)?;
        trace!("special action {:#06x} via index {}", action, index);

        let args = c.read_slice(layout.arg_len)?.to_vec();
        let tail = if layout.ff_tail {
            read_ff_terminated(c, |c| c.read_byte())?
        } else {
            Vec::new()
        };
        let next = if layout.branch {
            Some(ClassPair::read(c)?)
        } else {
            None
        };
        Ok(SpecialBuilding {
            action,
            args,
            tail,
            next,
        })
    }

    fn write(&self, w: &mut Writer, table: &SpecialActionTable) -> Result<()> {
        let index = special::index_for(table, self.action)?;
        let layout = special::layout_of(self.action)?;
        w.write_byte(index);
        w.write_slice(&self.args);
        if layout.ff_tail {
            write_ff_terminated(w, &self.tail, |w, &b| w.write_byte(b));
        }
        if let Some(next) = &self.next {
            next.write(w);
        }
        Ok(())
    }
}

/// One selectable reply in a [`Dialogue`]. The message byte carries the
/// last-record flag in its high bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub message: u8,
    pub target: ClassPair,
}

/// A question with one or more answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialogue {
    pub question: u8,
    pub answers: Vec<Answer>,
}

impl Dialogue {
    fn read(c: &mut Cursor) -> Result<Dialogue> {
        let question = c.read_byte()?;
        let answers = read_high_bit_terminated(c, |c| {
            let b = c.read_byte()?;
            let target = ClassPair::read(c)?;
            Ok((
                Answer {
                    message: b & 0x7F,
                    target,
                },
                b & LAST_RECORD_FLAG != 0,
            ))
        })?;
        Ok(Dialogue { question, answers })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(self.question);
        write_high_bit_terminated(w, &self.answers, |w, a, last| {
            let m = a.message & 0x7F;
            w.write_byte(if last { m | LAST_RECORD_FLAG } else { m });
            a.target.write(w);
        });
    }
}

/// Radiation damage on entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Radiation {
    pub damage: u8,
    pub next: ClassPair,
}

impl Radiation {
    fn read(c: &mut Cursor) -> Result<Radiation> {
        Ok(Radiation {
            damage: c.read_byte()?,
            next: ClassPair::read(c)?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(self.damage);
        self.next.write(w);
    }
}

/// Moves the party, possibly to another map. Coordinates are signed and
/// relative when bit 7 of the flags byte is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub relative: bool,
    pub x: i8,
    pub y: i8,
    pub map: u8,
    pub message: u8,
    pub next: ClassPair,
}

impl Transition {
    fn read(c: &mut Cursor) -> Result<Transition> {
        let flags = c.read_byte()?;
        Ok(Transition {
            relative: flags & 0x80 != 0,
            x: c.read_signed_byte()?,
            y: c.read_signed_byte()?,
            map: c.read_byte()?,
            message: c.read_byte()?,
            next: ClassPair::read(c)?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(if self.relative { 0x80 } else { 0 });
        w.write_signed_byte(self.x);
        w.write_signed_byte(self.y);
        w.write_byte(self.map);
        w.write_byte(self.message);
        self.next.write(w);
    }
}

/// Blocks movement, optionally printing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Impassable {
    pub message: u8,
    pub next: ClassPair,
}

impl Impassable {
    fn read(c: &mut Cursor) -> Result<Impassable> {
        Ok(Impassable {
            message: c.read_byte()?,
            next: ClassPair::read(c)?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write_byte(self.message);
        self.next.write(w);
    }
}

/// One square rewrite within an [`Alter`]. Flags byte: bit 7 last record,
/// bit 0 coordinates are relative to the triggering square.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alteration {
    pub relative: bool,
    pub x: i8,
    pub y: i8,
    pub new: ClassPair,
}

/// Rewrites the action of one or more squares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alter {
    pub alterations: Vec<Alteration>,
}

impl Alter {
    fn read(c: &mut Cursor) -> Result<Alter> {
        let alterations = read_high_bit_terminated(c, |c| {
            let flags = c.read_byte()?;
            let x = c.read_signed_byte()?;
            let y = c.read_signed_byte()?;
            let new = ClassPair::read(c)?;
            Ok((
                Alteration {
                    relative: flags & 0x01 != 0,
                    x,
                    y,
                    new,
                },
                flags & LAST_RECORD_FLAG != 0,
            ))
        })?;
        Ok(Alter { alterations })
    }

    fn write(&self, w: &mut Writer) {
        write_high_bit_terminated(w, &self.alterations, |w, a, last| {
            let mut flags = if a.relative { 0x01 } else { 0x00 };
            if last {
                flags |= LAST_RECORD_FLAG;
            }
            w.write_byte(flags);
            w.write_signed_byte(a.x);
            w.write_signed_byte(a.y);
            a.new.write(w);
        });
    }
}

/// Decode one instruction, dispatching on the slot's action class.
pub fn decode(c: &mut Cursor, class: u8, table: &SpecialActionTable) -> Result<Action> {
    trace!("decoding class {} at {:#06x}", class, c.tell());
    match class {
        CLASS_PRINT => Ok(Action::Print(Print::read(c)?)),
        CLASS_CHECK => Ok(Action::Check(Check::read(c)?)),
        CLASS_ENCOUNTER | CLASS_RANDOM_ENCOUNTER => Ok(Action::Encounter(Encounter::read(c)?)),
        CLASS_MASK => Ok(Action::Mask(Mask::read(c)?)),
        CLASS_LOOT => Ok(Action::Loot(Loot::read(c)?)),
        CLASS_SPECIAL_BUILDING => Ok(Action::SpecialBuilding(SpecialBuilding::read(c, table)?)),
        CLASS_DIALOGUE => Ok(Action::Dialogue(Dialogue::read(c)?)),
        CLASS_RADIATION => Ok(Action::Radiation(Radiation::read(c)?)),
        CLASS_TRANSITION => Ok(Action::Transition(Transition::read(c)?)),
        CLASS_IMPASSABLE => Ok(Action::Impassable(Impassable::read(c)?)),
        CLASS_ALTER => Ok(Action::Alter(Alter::read(c)?)),
        other => Err(CodecError::UnknownActionClass(other)),
    }
}

/// Serialize one instruction. The exact inverse of [`decode`].
pub fn encode(action: &Action, w: &mut Writer, table: &SpecialActionTable) -> Result<()> {
    match action {
        Action::Print(a) => a.write(w),
        Action::Check(a) => a.write(w),
        Action::Encounter(a) => a.write(w),
        Action::Mask(a) => a.write(w),
        Action::Loot(a) => a.write(w),
        Action::SpecialBuilding(a) => a.write(w, table)?,
        Action::Dialogue(a) => a.write(w),
        Action::Radiation(a) => a.write(w),
        Action::Transition(a) => a.write(w),
        Action::Impassable(a) => a.write(w),
        Action::Alter(a) => a.write(w),
    }
    Ok(())
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Print(a) => write!(f, "print {:?} -> {}/{:?}", a.messages, a.next.class, a.next.selector),
            Action::Check(a) => write!(f, "check msg {} ({} entries)", a.message, a.entries.len()),
            Action::Encounter(a) => write!(f, "encounter monster {} x{}", a.monster, a.max_group),
            Action::Mask(a) => write!(f, "mask tile {}", a.tile),
            Action::Loot(a) => write!(f, "loot ({} items)", a.items.len()),
            Action::SpecialBuilding(a) => write!(f, "special {:#06x}", a.action),
            Action::Dialogue(a) => write!(f, "dialogue msg {} ({} answers)", a.question, a.answers.len()),
            Action::Radiation(a) => write!(f, "radiation {}", a.damage),
            Action::Transition(a) => write!(f, "transition to map {} ({},{})", a.map, a.x, a.y),
            Action::Impassable(a) => write!(f, "impassable msg {}", a.message),
            Action::Alter(a) => write!(f, "alter ({} squares)", a.alterations.len()),
        }
    }
}
