//! Physics collision (lump 29) and displacement physics (lump 28)

use std::io::{Read, Seek};

use serde::Serialize;
use source_kv::KeyValues;

use super::array::read_count;
use super::header::RegionDescriptor;
use super::stream::decode_until_sentinel;
use crate::codec::BinaryReader;
use crate::error::{Error, Result};

/// `dphysmodel_t`, the head of each collision record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhysModelHead {
    pub model_index: i32,
    pub data_size: i32,
    pub keydata_size: i32,
    pub solid_count: i32,
}

impl PhysModelHead {
    pub const SIZE: usize = 16;

    /// `model_index == -1` ends the lump
    pub fn is_terminator(&self) -> bool {
        self.model_index == -1
    }

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            model_index: reader.read_i32()?,
            data_size: reader.read_i32()?,
            keydata_size: reader.read_i32()?,
            solid_count: reader.read_i32()?,
        })
    }
}

/// Collision data for one brush model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysModel {
    pub model_index: i32,
    pub data_size: i32,
    pub keydata_size: i32,
    /// Raw VPhysics collision solids
    #[serde(skip)]
    pub solids: Vec<Vec<u8>>,
    /// Text block describing solids, fluids and edit parameters
    pub key_data: String,
}

impl PhysModel {
    fn read_body<R: Read + Seek>(reader: &mut BinaryReader<R>, head: PhysModelHead) -> Result<Self> {
        if head.solid_count < 0 {
            return Err(Error::InvalidFormat(format!(
                "phys model {} has negative solid count {}",
                head.model_index, head.solid_count
            )));
        }

        let mut solids = Vec::new();
        for _ in 0..head.solid_count {
            let size = read_count(reader, 1)?;
            solids.push(reader.read_bytes(size)?);
        }

        let key_data = if head.keydata_size > 0 {
            let text = reader.read_bytes(head.keydata_size as usize - 1)?;
            reader.skip(1)?;
            String::from_utf8_lossy(&text).into_owned()
        } else {
            String::new()
        };

        Ok(Self {
            model_index: head.model_index,
            data_size: head.data_size,
            keydata_size: head.keydata_size,
            solids,
            key_data,
        })
    }

    /// Parse the key data into one block per `solid`/`fluid`/`editparams` section
    pub fn key_sections(&self) -> Vec<KeyValues> {
        source_kv::parse_entities(&self.key_data)
    }
}

/// Decode the collision lump up to its `-1` terminator record
pub fn decode_phys_collide<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    region: &RegionDescriptor,
) -> Result<Vec<PhysModel>> {
    decode_until_sentinel(
        reader,
        region,
        PhysModelHead::read,
        PhysModelHead::is_terminator,
        PhysModel::read_body,
    )
}

/// Displacement collision blobs: a `u16` count, `u16` sizes, then the blobs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhysDisp {
    pub blobs: Vec<Vec<u8>>,
}

impl PhysDisp {
    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, region: &RegionDescriptor) -> Result<Self> {
        reader.seek(region.offset as u64)?;
        let count = reader.read_u16()? as usize;
        let mut sizes = Vec::with_capacity(count);
        for _ in 0..count {
            sizes.push(reader.read_u16()? as usize);
        }
        let mut blobs = Vec::with_capacity(count);
        for size in sizes {
            blobs.push(reader.read_bytes(size)?);
        }
        Ok(Self { blobs })
    }
}
