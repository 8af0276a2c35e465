//! Non-fatal decode warnings
//!
//! Diagnostics are a side channel next to the error path: the decode that
//! produced one still returns data. Every diagnostic is logged through
//! `tracing` and kept on the session for callers that want to inspect them.

use std::fmt;

use serde::Serialize;

use super::game_lump::FourCc;
use super::lump::LumpId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Diagnostic {
    /// Lump length is not a multiple of the record size. `smaller`/`larger`
    /// are the nearest sizes within 99 bytes that would divide it evenly.
    MalformedSizeHint {
        lump: LumpId,
        version: i32,
        length: u32,
        record_size: usize,
        smaller: Option<usize>,
        larger: Option<usize>,
    },
    /// Game lump entry with a code this crate has no decoder for
    UnknownGameLump { four_cc: FourCc, version: u16 },
    /// Known game lump code with a version outside the supported set
    UnsupportedSubVersion { four_cc: FourCc, version: u16 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedSizeHint {
                lump,
                version,
                length,
                record_size,
                smaller,
                larger,
            } => {
                write!(
                    f,
                    "[lump #{} {:?} v{}] length {} is not a multiple of {}",
                    *lump as u8, lump, version, length, record_size
                )?;
                if smaller.is_some() || larger.is_some() {
                    let show = |v: &Option<usize>| v.map_or("-".to_string(), |s| s.to_string());
                    write!(f, " (nearest: {}; {})", show(smaller), show(larger))?;
                }
                Ok(())
            }
            Diagnostic::UnknownGameLump { four_cc, version } => {
                write!(f, "unknown game lump {four_cc} v{version}, skipped")
            }
            Diagnostic::UnsupportedSubVersion { four_cc, version } => {
                write!(f, "game lump {four_cc} has unsupported version {version}")
            }
        }
    }
}

/// Collects diagnostics for one session
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
