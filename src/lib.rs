//! Codec for the legacy map blocks of a 1980s RPG: decodes the binary
//! action bytecode, compressed strings and offset directories into an
//! editable model, and re-encodes the model byte for byte.

#[macro_use]
extern crate lazy_static;

pub mod action;
pub mod alphabet;
pub mod cursor;
pub mod error;
pub mod export;
pub mod framing;
pub mod map;
pub mod patches;
pub mod reloc;
pub mod special;
pub mod stream;
