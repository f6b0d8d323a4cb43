use thiserror::Error;

/// Everything that can go wrong while decoding or encoding a map block.
///
/// All variants are fatal for the enclosing block: a map either round-trips
/// completely or is rejected. There is no partial-success mode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The block ended in the middle of a record.
    #[error("truncated stream: needed {needed} byte(s) at offset {offset:#06x}")]
    TruncatedStream { offset: usize, needed: usize },

    /// An action-class value outside the enumerated dispatch set.
    #[error("unknown action class {0}")]
    UnknownActionClass(u8),

    /// An instruction placed in a stream whose class uses a different layout.
    #[error("instruction kind does not belong to action class {0}")]
    ClassMismatch(u8),

    /// A special-action code with no entry in the static layout table.
    #[error("unknown special action {0:#06x}")]
    UnknownSpecialAction(u16),

    /// Encode could not find a special action in the caller's table.
    #[error("special action {0:#06x} not present in the special action table")]
    ActionNotInTable(u16),

    /// Two action classes sharing one offset are both referenced by the map.
    #[error("classes {classes:?} all reference shared offset {offset:#06x}")]
    AmbiguousOffsetOwnership { offset: u16, classes: Vec<u8> },

    /// No rule decided which class owns a shared offset.
    #[error("cannot resolve owner of shared offset {offset:#06x} (candidates {classes:?})")]
    UnresolvableOffsetConflict { offset: u16, classes: Vec<u8> },

    /// More than 60 distinct bytes fed to the alphabet builder.
    #[error("alphabet overflow: {0} distinct bytes (limit 60)")]
    AlphabetOverflow(usize),

    /// A byte outside the file's alphabet showed up in text to encode.
    #[error("byte {0:#04x} is not representable in this file's alphabet")]
    InvalidCharacter(u8),
}

pub type Result<T> = std::result::Result<T, CodecError>;
