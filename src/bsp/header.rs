//! BSP file header and lump directory
//!
//! # Layout (1036 bytes)
//!
//! ```text
//! 0     ident         "VBSP" as an integer in the file's byte order
//! 4     version       i32
//! 8     lumps[64]     16 bytes each, field order depends on the producer
//! 1032  map_revision  i32
//! ```

use std::fmt;
use std::io::{Read, Seek};
use std::str::FromStr;

use serde::Serialize;

use super::lump::{LumpId, HEADER_LUMPS};
use crate::codec::{BinaryReader, Endian};
use crate::error::{Error, Result};

/// `"VBSP"` read as a little-endian integer
pub const IDBSPHEADER: u32 = u32::from_le_bytes(*b"VBSP");

pub const HEADER_SIZE: usize = 8 + HEADER_LUMPS * RegionDescriptor::SIZE + 4;

/// Tool/platform that wrote the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ProducerVariant {
    /// PC builds of most Source games
    #[default]
    Standard,
    /// Left 4 Dead 2 moved the lump version ahead of the offset
    Left4Dead2,
    /// CS:GO on PS3, big-endian
    Ps3,
}

/// Order of the first three fields of a lump descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorOrder {
    /// offset, length, version
    OffsetFirst,
    /// version, offset, length
    VersionFirst,
}

impl ProducerVariant {
    pub fn endian(self) -> Endian {
        match self {
            ProducerVariant::Standard | ProducerVariant::Left4Dead2 => Endian::Little,
            ProducerVariant::Ps3 => Endian::Big,
        }
    }

    pub fn descriptor_order(self) -> DescriptorOrder {
        match self {
            ProducerVariant::Left4Dead2 => DescriptorOrder::VersionFirst,
            ProducerVariant::Standard | ProducerVariant::Ps3 => DescriptorOrder::OffsetFirst,
        }
    }

    /// The magic bytes as they appear on disk for this variant
    pub fn magic_bytes(self) -> [u8; 4] {
        match self.endian() {
            Endian::Little => IDBSPHEADER.to_le_bytes(),
            Endian::Big => IDBSPHEADER.to_be_bytes(),
        }
    }
}

impl FromStr for ProducerVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "default" | "pc" => Ok(ProducerVariant::Standard),
            "l4d2" | "left4dead2" => Ok(ProducerVariant::Left4Dead2),
            "ps3" | "csgo-ps3" => Ok(ProducerVariant::Ps3),
            other => Err(Error::InvalidFormat(format!("unknown producer variant: {other}"))),
        }
    }
}

impl fmt::Display for ProducerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProducerVariant::Standard => "standard",
            ProducerVariant::Left4Dead2 => "l4d2",
            ProducerVariant::Ps3 => "ps3",
        };
        f.write_str(s)
    }
}

/// One entry of the lump directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegionDescriptor {
    /// Directory slot, stamped by the parser
    pub index: u8,
    pub offset: u32,
    pub length: u32,
    pub version: i32,
    /// Non-zero when the lump is LZMA compressed
    pub uncompressed_size: i32,
}

impl RegionDescriptor {
    pub const SIZE: usize = 16;

    fn read<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        order: DescriptorOrder,
        index: u8,
    ) -> Result<Self> {
        let (offset, length, version) = match order {
            DescriptorOrder::OffsetFirst => {
                let offset = reader.read_u32()?;
                let length = reader.read_u32()?;
                let version = reader.read_i32()?;
                (offset, length, version)
            }
            DescriptorOrder::VersionFirst => {
                let version = reader.read_i32()?;
                let offset = reader.read_u32()?;
                let length = reader.read_u32()?;
                (offset, length, version)
            }
        };
        Ok(Self {
            index,
            offset,
            length,
            version,
            uncompressed_size: reader.read_i32()?,
        })
    }

    pub fn lump(&self) -> LumpId {
        // index always comes from the 0..64 parse loop
        LumpId::ALL[self.index as usize]
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_compressed(&self) -> bool {
        self.uncompressed_size != 0
    }
}

/// Parsed `dheader_t`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileHeader {
    pub ident: u32,
    pub version: i32,
    pub regions: Vec<RegionDescriptor>,
    pub map_revision: i32,
}

impl FileHeader {
    pub fn parse<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        variant: ProducerVariant,
    ) -> Result<Self> {
        reader.seek(0)?;
        let ident = reader.read_u32()?;
        reader.seek(0)?;
        let raw_ident = reader.read_array::<4>()?;
        if ident != IDBSPHEADER {
            return Err(Error::InvalidMagic {
                found: raw_ident,
                expected: variant.magic_bytes(),
            });
        }

        let version = reader.read_i32()?;
        let order = variant.descriptor_order();
        let mut regions = Vec::with_capacity(HEADER_LUMPS);
        for index in 0..HEADER_LUMPS {
            regions.push(RegionDescriptor::read(reader, order, index as u8)?);
        }
        let map_revision = reader.read_i32()?;

        Ok(Self {
            ident,
            version,
            regions,
            map_revision,
        })
    }

    pub fn region(&self, lump: LumpId) -> &RegionDescriptor {
        &self.regions[lump.index()]
    }
}
