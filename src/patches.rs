//! Rewrites for data defects in the shipped game files.
//!
//! A handful of instructions in the retail maps were mastered wrong and the
//! original engine happens to tolerate them. Each entry here matches one
//! exact decoded structure and rewrites it to the intended form. The match
//! is full structural equality, so a patch can never fire on anything but
//! the one shipped instruction it names. Re-encoding the patched structure
//! does not re-trigger anything.

use log::debug;

use crate::action::{Action, Dialogue, Loot, Print};
use crate::framing::ClassPair;

/// Apply the known-corruption rewrites to a freshly decoded instruction.
pub fn apply(action: Action) -> Action {
    if let Some(patched) = doubled_print_message(&action) {
        debug!("patched doubled print message");
        return patched;
    }
    if let Some(patched) = self_looping_dialogue(&action) {
        debug!("patched self-looping dialogue answer");
        return patched;
    }
    if let Some(patched) = phantom_loot_entry(&action) {
        debug!("patched phantom empty loot entry");
        return patched;
    }
    action
}

/// One retail map repeats message 0x14 twice in a single print slot; the
/// engine shows it once.
fn doubled_print_message(action: &Action) -> Option<Action> {
    match action {
        Action::Print(p)
            if p.messages == [0x14, 0x14]
                && p.next == (ClassPair { class: 253, selector: None }) =>
        {
            Some(Action::Print(Print {
                messages: vec![0x14],
                next: p.next,
            }))
        }
        _ => None,
    }
}

/// A dialogue in one shipped block answers back into itself forever; the
/// intended target is the bare terminating class.
fn self_looping_dialogue(action: &Action) -> Option<Action> {
    match action {
        Action::Dialogue(d)
            if d.question == 0x0B
                && d.answers.len() == 1
                && d.answers[0].message == 0x0B
                && d.answers[0].target == ClassPair::new(7, 0x0B) =>
        {
            let mut answers = d.answers.clone();
            answers[0].target = ClassPair { class: 253, selector: None };
            Some(Action::Dialogue(Dialogue {
                question: d.question,
                answers,
            }))
        }
        _ => None,
    }
}

/// A loot pile holding a single zero-quantity item 0x45; the engine treats
/// it as empty.
fn phantom_loot_entry(action: &Action) -> Option<Action> {
    match action {
        Action::Loot(l)
            if l.items.len() == 1 && l.items[0].item == 0x45 && l.items[0].quantity == 0 =>
        {
            Some(Action::Loot(Loot {
                items: vec![],
                next: l.next,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::LootItem;
    use test_log::test;

    #[test]
    fn doubled_message_collapses() {
        let action = Action::Print(Print {
            messages: vec![0x14, 0x14],
            next: ClassPair { class: 253, selector: None },
        });
        assert_eq!(
            apply(action),
            Action::Print(Print {
                messages: vec![0x14],
                next: ClassPair { class: 253, selector: None },
            })
        );
    }

    #[test]
    fn near_miss_is_left_alone() {
        // Same doubled message but a different trailer: not the shipped
        // defect, must pass through untouched.
        let action = Action::Print(Print {
            messages: vec![0x14, 0x14],
            next: ClassPair::NONE,
        });
        assert_eq!(apply(action.clone()), action);
    }

    #[test]
    fn phantom_loot_empties() {
        let action = Action::Loot(Loot {
            items: vec![LootItem { item: 0x45, quantity: 0 }],
            next: ClassPair::new(255, 0),
        });
        match apply(action) {
            Action::Loot(l) => assert!(l.items.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ordinary_instructions_pass_through() {
        let action = Action::Loot(Loot {
            items: vec![LootItem { item: 0x45, quantity: 2 }],
            next: ClassPair::new(255, 0),
        });
        assert_eq!(apply(action.clone()), action);
    }
}
