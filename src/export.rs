//! Structured-text (TOML) form of a map block, for external editing
//! tooling. A thin adapter: every field of the decoded model round-trips,
//! but nothing here is on the codec's correctness-critical path, so its
//! errors are plain strings rather than the codec taxonomy.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::alphabet::{Alphabet, StringBlock, ALPHABET_SIZE};
use crate::map::MapBlock;
use crate::stream::ActionStream;

#[derive(Debug, Serialize, Deserialize)]
pub struct MapDoc {
    pub width: u8,
    pub height: u8,
    #[serde(default)]
    pub random_encounters: bool,
    pub action_classes: Vec<u8>,
    pub action_selectors: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nibble6: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monster_data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monster_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub npcs: Vec<u8>,
    /// Stored so hand-built files with non-frequency alphabets survive.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alphabet: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<String>,
    #[serde(default, rename = "stream", skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamDoc {
    pub class: u8,
    /// Total slots, nulls included; only live slots are listed.
    pub slot_count: usize,
    #[serde(default, rename = "action", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SlotDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotDoc {
    pub index: usize,
    pub action: Action,
}

fn text_to_string(bytes: &[u8]) -> Result<String, String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| format!("non-ASCII text in map block: {e}"))
}

pub fn to_doc(block: &MapBlock) -> Result<MapDoc, String> {
    let strings = block
        .strings
        .strings
        .iter()
        .map(|s| text_to_string(s))
        .collect::<Result<Vec<_>, _>>()?;
    let monster_names = block
        .monster_names
        .iter()
        .map(|s| text_to_string(s))
        .collect::<Result<Vec<_>, _>>()?;

    let streams = block
        .streams
        .iter()
        .map(|s| StreamDoc {
            class: s.class,
            slot_count: s.slots.len(),
            actions: s
                .slots
                .iter()
                .enumerate()
                .filter_map(|(i, slot)| {
                    slot.as_ref().map(|a| SlotDoc {
                        index: i,
                        action: a.clone(),
                    })
                })
                .collect(),
        })
        .collect();

    Ok(MapDoc {
        width: block.width,
        height: block.height,
        random_encounters: block.random_encounters,
        action_classes: block.action_classes.clone(),
        action_selectors: block.action_selectors.clone(),
        nibble6: block.nibble6.clone(),
        monster_data: block.monster_data.clone(),
        monster_names,
        npcs: block.npcs.clone(),
        alphabet: block.strings.alphabet.as_table().to_vec(),
        strings,
        streams,
    })
}

pub fn from_doc(doc: MapDoc) -> Result<MapBlock, String> {
    let strings: Vec<Vec<u8>> = doc.strings.iter().map(|s| s.as_bytes().to_vec()).collect();
    for s in &strings {
        if let Some(&b) = s.iter().find(|b| !b.is_ascii()) {
            return Err(format!("string byte {b:#04x} is outside the ASCII range"));
        }
    }

    let string_block = if doc.alphabet.is_empty() {
        StringBlock::build(strings).map_err(|e| e.to_string())?
    } else {
        let table: [u8; ALPHABET_SIZE] = doc
            .alphabet
            .as_slice()
            .try_into()
            .map_err(|_| format!("alphabet table must hold exactly {ALPHABET_SIZE} bytes"))?;
        StringBlock {
            alphabet: Alphabet::from_table(table),
            strings,
        }
    };

    let mut streams = Vec::with_capacity(doc.streams.len());
    for s in doc.streams {
        let mut slots: Vec<Option<Action>> = vec![None; s.slot_count];
        for slot in s.actions {
            if slot.index >= slots.len() {
                return Err(format!(
                    "class {} action index {} is outside slot_count {}",
                    s.class, slot.index, s.slot_count
                ));
            }
            slots[slot.index] = Some(slot.action);
        }
        streams.push(ActionStream {
            class: s.class,
            slots,
        });
    }

    Ok(MapBlock {
        width: doc.width,
        height: doc.height,
        random_encounters: doc.random_encounters,
        action_classes: doc.action_classes,
        action_selectors: doc.action_selectors,
        nibble6: doc.nibble6,
        monster_data: doc.monster_data,
        monster_names: doc
            .monster_names
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect(),
        npcs: doc.npcs,
        streams,
        strings: string_block,
    })
}

pub fn to_toml(block: &MapBlock) -> Result<String, String> {
    let doc = to_doc(block)?;
    toml::to_string_pretty(&doc).map_err(|e| e.to_string())
}

pub fn from_toml(text: &str) -> Result<MapBlock, String> {
    let doc: MapDoc = toml::from_str(text).map_err(|e| e.to_string())?;
    from_doc(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Print;
    use crate::framing::ClassPair;
    use test_log::test;

    fn block() -> MapBlock {
        MapBlock {
            width: 2,
            height: 2,
            random_encounters: true,
            action_classes: vec![1, 0, 0, 0],
            action_selectors: vec![0, 0, 0, 0],
            nibble6: None,
            monster_data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            monster_names: vec![b"scorpion".to_vec()],
            npcs: Vec::new(),
            streams: vec![ActionStream {
                class: 1,
                slots: vec![
                    Some(Action::Print(Print {
                        messages: vec![0],
                        next: ClassPair::NONE,
                    })),
                    None,
                ],
            }],
            strings: StringBlock::build(vec![b"It stings!".to_vec()]).unwrap(),
        }
    }

    #[test]
    fn toml_round_trip_is_lossless() {
        let b = block();
        let text = to_toml(&b).unwrap();
        let back = from_toml(&text).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn null_slots_survive_as_gaps() {
        let text = to_toml(&block()).unwrap();
        let back = from_toml(&text).unwrap();
        assert_eq!(back.streams[0].slots.len(), 2);
        assert!(back.streams[0].slots[1].is_none());
    }

    #[test]
    fn out_of_range_slot_index_is_rejected() {
        let mut doc = to_doc(&block()).unwrap();
        doc.streams[0].actions[0].index = 9;
        assert!(from_doc(doc).is_err());
    }
}
