use crate::bsp::{LumpId, ProducerVariant};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("invalid magic {found:?} (expected {expected:?})")]
    InvalidMagic { found: [u8; 4], expected: [u8; 4] },

    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("no decoder for lump {lump:?} version {version} ({variant:?})")]
    UnsupportedRegionVersion {
        lump: LumpId,
        version: i32,
        variant: ProducerVariant,
    },

    #[error("game lump {four_cc} has unsupported version {version}")]
    UnsupportedSubVersion { four_cc: String, version: u16 },

    #[error("lump {index} at {offset}+{length} exceeds file length {file_len}")]
    RegionOutOfBounds {
        index: u8,
        offset: u32,
        length: u32,
        file_len: u64,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
            _ => Error::Io(err.to_string()),
        }
    }
}

impl Error {
    /// Errors after which nothing else read from the same source can be
    /// trusted: a bad magic, a read past the source end, a directory entry
    /// pointing outside the source, or a failing source.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidMagic { .. }
                | Error::UnexpectedEof
                | Error::RegionOutOfBounds { .. }
                | Error::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
