//! Cluster visibility (PVS) and audibility (PAS)
//!
//! # Lump layout
//!
//! ```text
//! i32                 numclusters
//! [i32; 2] * n        byte offsets of each cluster's PVS and PAS row,
//!                     relative to the start of the lump
//! ...                 run-length coded rows
//! ```
//!
//! A row is a bitset over all clusters, one bit per cluster, LSB first. A
//! zero byte is followed by a count byte and stands for `count * 8` zero
//! bits; any other byte is eight literal bits.

use std::collections::BTreeSet;
use std::io::{Read, Seek};

use serde::Serialize;

use crate::codec::BinaryReader;
use crate::error::{Error, Result};

/// Upper bound on clusters; cluster indices fit in a u16
pub const MAX_MAP_CLUSTERS: u32 = 65536;

/// Offsets of one cluster's two rows inside the visibility lump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterOffsets {
    pub pvs: u32,
    pub pas: u32,
}

/// Decoded visibility lump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub cluster_count: u32,
    pub offsets: Vec<ClusterOffsets>,
    /// Potentially visible clusters, indexed by source cluster
    pub pvs: Vec<BTreeSet<u16>>,
    /// Potentially audible clusters; `None` unless requested in the config
    pub pas: Option<Vec<BTreeSet<u16>>>,
}

impl Visibility {
    /// Read the lump at `region_offset`. The reader must be positioned
    /// there already.
    pub fn read<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        region_offset: u64,
        region_length: u32,
        decode_audible: bool,
    ) -> Result<Self> {
        let cluster_count = reader.read_i32()?;
        if cluster_count < 0 || cluster_count as u32 > MAX_MAP_CLUSTERS {
            return Err(Error::InvalidFormat(format!(
                "visibility cluster count {cluster_count} out of range"
            )));
        }
        let cluster_count = cluster_count as u32;
        if 4 + cluster_count as u64 * 8 > region_length as u64 {
            return Err(Error::InvalidFormat(format!(
                "visibility offset table for {cluster_count} clusters exceeds lump length {region_length}"
            )));
        }

        let mut offsets = Vec::with_capacity(cluster_count as usize);
        for _ in 0..cluster_count {
            offsets.push(ClusterOffsets {
                pvs: reader.read_u32()?,
                pas: reader.read_u32()?,
            });
        }

        let pvs_offsets: Vec<u32> = offsets.iter().map(|o| o.pvs).collect();
        let pvs = decode_visibility(reader, region_offset, cluster_count, &pvs_offsets)?;

        let pas = if decode_audible {
            let pas_offsets: Vec<u32> = offsets.iter().map(|o| o.pas).collect();
            Some(decode_visibility(reader, region_offset, cluster_count, &pas_offsets)?)
        } else {
            None
        };

        Ok(Self {
            cluster_count,
            offsets,
            pvs,
            pas,
        })
    }

    pub fn is_visible(&self, from: u16, to: u16) -> bool {
        self.pvs
            .get(from as usize)
            .is_some_and(|set| set.contains(&to))
    }

    pub fn is_audible(&self, from: u16, to: u16) -> Option<bool> {
        let pas = self.pas.as_ref()?;
        Some(pas.get(from as usize).is_some_and(|set| set.contains(&to)))
    }
}

/// Decode one row per entry of `offsets`, each starting at
/// `region_offset + offset`. Rows share nothing but the reader.
pub fn decode_visibility<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    region_offset: u64,
    cluster_count: u32,
    offsets: &[u32],
) -> Result<Vec<BTreeSet<u16>>> {
    offsets
        .iter()
        .map(|&offset| decode_row(reader, region_offset + offset as u64, cluster_count))
        .collect()
}

/// Decode a single run-length coded row starting at `start`
pub fn decode_row<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    start: u64,
    cluster_count: u32,
) -> Result<BTreeSet<u16>> {
    reader.seek(start)?;
    let mut visible = BTreeSet::new();
    let mut position = 0u32;

    while position < cluster_count {
        let bits = reader.read_u8()?;
        if bits == 0 {
            let skip = reader.read_u8()? as u32;
            position += skip * 8;
            continue;
        }

        for b in 0..8 {
            if position + b >= cluster_count {
                break;
            }
            if bits & (1 << b) != 0 {
                visible.insert((position + b) as u16);
            }
        }
        position += 8;
    }

    Ok(visible)
}
