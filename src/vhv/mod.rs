//! Static prop vertex lighting (`.vhv`)
//!
//! vrad writes one file per static prop into the map's pakfile
//! (`sp_<index>.vhv`, `sp_hdr_<index>.vhv`).
//!
//! # Layout
//!
//! ```text
//! header   40 bytes   version, checksum, vertex flags/size/count, mesh count, 4 unused
//! meshes   28 bytes   lod, vertex count, offset, 4 unused
//! vertices            per mesh, at the absolute mesh offset
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use bitflags::bitflags;
use serde::Serialize;

use crate::codec::{BinaryReader, Color32, Endian};
use crate::error::{Error, Result};

pub const VHV_VERSION: i32 = 2;
pub const HEADER_SIZE: usize = 40;
pub const MESH_HEADER_SIZE: usize = 28;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct VertexFlags: u32 {
        const POSITION = 0x1;
        const NORMAL = 0x2;
        const COLOR = 0x4;
        const SPECULAR = 0x8;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub version: i32,
    /// Matches the checksum of the `.mdl` the lighting was baked for
    pub checksum: u32,
    pub vertex_flags: VertexFlags,
    pub vertex_size: u32,
    pub vertex_count: u32,
    pub mesh_count: u32,
}

impl FileHeader {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let version = reader.read_i32()?;
        let checksum = reader.read_u32()?;
        let vertex_flags = VertexFlags::from_bits_retain(reader.read_u32()?);
        let vertex_size = reader.read_u32()?;
        let vertex_count = reader.read_u32()?;
        let mesh_count = reader.read_i32()?;
        reader.skip(16)?;

        if version != VHV_VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported vhv version {version} (expected {VHV_VERSION})"
            )));
        }
        let mesh_count = u32::try_from(mesh_count)
            .map_err(|_| Error::InvalidFormat(format!("negative mesh count {mesh_count}")))?;

        Ok(Self {
            version,
            checksum,
            vertex_flags,
            vertex_size,
            vertex_count,
            mesh_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mesh {
    pub lod: u32,
    pub vertex_count: u32,
    /// Absolute offset of the first vertex
    pub offset: u32,
    pub colors: Vec<Color32>,
}

/// Decoded `.vhv` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VhvFile {
    pub header: FileHeader,
    pub meshes: Vec<Mesh>,
}

impl VhvFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::decode(&mut BinaryReader::from_bytes(data, Endian::Little))
    }

    pub fn read<R: Read + Seek>(source: R) -> Result<Self> {
        Self::decode(&mut BinaryReader::new(source, Endian::Little)?)
    }

    fn decode<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        if reader.len() < HEADER_SIZE as u64 {
            return Err(Error::InvalidFormat(format!(
                "{} bytes is smaller than the vhv header",
                reader.len()
            )));
        }
        reader.seek(0)?;
        let header = FileHeader::read(reader)?;

        let mut meshes = Vec::with_capacity(header.mesh_count.min(1024) as usize);
        for _ in 0..header.mesh_count {
            let lod = reader.read_u32()?;
            let vertex_count = reader.read_u32()?;
            let offset = reader.read_u32()?;
            reader.skip(16)?;
            meshes.push(Mesh {
                lod,
                vertex_count,
                offset,
                colors: Vec::new(),
            });
        }

        for mesh in meshes.iter_mut() {
            reader.seek(mesh.offset as u64)?;
            mesh.colors = read_colors(reader, header.vertex_flags, mesh.vertex_count)?;
        }

        tracing::debug!(
            meshes = meshes.len(),
            vertices = header.vertex_count,
            flags = ?header.vertex_flags,
            "decoded vhv"
        );
        Ok(Self { header, meshes })
    }

    /// Colours of every mesh in file order
    pub fn colors(&self) -> impl Iterator<Item = &Color32> {
        self.meshes.iter().flat_map(|m| m.colors.iter())
    }
}

fn read_colors<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    flags: VertexFlags,
    count: u32,
) -> Result<Vec<Color32>> {
    let elem_size = if flags.contains(VertexFlags::NORMAL) {
        12
    } else if flags.contains(VertexFlags::COLOR) {
        4
    } else {
        return Err(Error::NotImplemented(format!("vhv vertex flags {flags:?}")));
    };
    if count as u64 * elem_size > reader.remaining()? {
        return Err(Error::UnexpectedEof);
    }

    (0..count)
        .map(|_| {
            if elem_size == 12 {
                reader.read_array::<12>().map(|s| average_directional(&s))
            } else {
                // stored b, g, r, a
                let [b, g, r, a] = reader.read_array::<4>()?;
                Ok(Color32 { r, g, b, a })
            }
        })
        .collect()
}

/// Collapse three RGBExp32 samples (one per basis direction, stored b, g,
/// r, exponent) into one colour.
fn average_directional(samples: &[u8; 12]) -> Color32 {
    let avg = |a: usize, b: usize, c: usize| {
        ((samples[a] as u32 + samples[b] as u32 + samples[c] as u32) / 3) as u8
    };
    let scale = 2f32.powi(avg(3, 7, 11) as i32);
    let tex_light = |c: u8| (c as f32 * scale * 0.5).clamp(0.0, 255.0) as u8;
    Color32 {
        r: tex_light(avg(2, 6, 10)),
        g: tex_light(avg(1, 5, 9)),
        b: tex_light(avg(0, 4, 8)),
        a: 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryWriter;

    fn vhv_bytes(flags: VertexFlags, meshes: &[(u32, &[u8])]) -> Vec<u8> {
        let elem = if flags.contains(VertexFlags::NORMAL) { 12 } else { 4 };
        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(VHV_VERSION);
        w.write_u32(0xDEADBEEF);
        w.write_u32(flags.bits());
        w.write_u32(elem as u32);
        w.write_u32(meshes.iter().map(|(_, v)| (v.len() / elem) as u32).sum());
        w.write_i32(meshes.len() as i32);
        w.write_zeros(16);

        let mut offset = HEADER_SIZE + meshes.len() * MESH_HEADER_SIZE;
        for (lod, vertices) in meshes {
            w.write_u32(*lod);
            w.write_u32((vertices.len() / elem) as u32);
            w.write_u32(offset as u32);
            w.write_zeros(16);
            offset += vertices.len();
        }
        for (_, vertices) in meshes {
            w.write_bytes(vertices);
        }
        w.into_vec()
    }

    #[test]
    fn test_normal_samples_averaged() {
        // b g r exp, three times
        let samples = [
            10, 20, 30, 1, //
            20, 40, 60, 2, //
            30, 60, 90, 3, //
        ];
        let vhv = VhvFile::from_bytes(&vhv_bytes(VertexFlags::NORMAL, &[(0, &samples)])).unwrap();
        assert_eq!(vhv.header.checksum, 0xDEADBEEF);
        assert_eq!(vhv.meshes.len(), 1);
        // averages r=60 g=40 b=20, exponent 2 -> x4 x0.5
        assert_eq!(vhv.meshes[0].colors, [Color32 { r: 120, g: 80, b: 40, a: 255 }]);
    }

    #[test]
    fn test_brightness_clamped() {
        let samples = [200, 200, 200, 8, 200, 200, 200, 8, 200, 200, 200, 8];
        let vhv = VhvFile::from_bytes(&vhv_bytes(VertexFlags::NORMAL, &[(0, &samples)])).unwrap();
        assert_eq!(vhv.meshes[0].colors[0], Color32 { r: 255, g: 255, b: 255, a: 255 });
    }

    #[test]
    fn test_color_meshes() {
        let lod0 = [1, 2, 3, 4, 5, 6, 7, 8];
        let lod1 = [9, 10, 11, 12];
        let vhv = VhvFile::from_bytes(&vhv_bytes(VertexFlags::COLOR, &[(0, &lod0), (1, &lod1)])).unwrap();
        assert_eq!(vhv.meshes.len(), 2);
        assert_eq!(vhv.meshes[1].lod, 1);
        assert_eq!(vhv.meshes[0].colors[1], Color32 { r: 7, g: 6, b: 5, a: 8 });
        assert_eq!(vhv.colors().count(), 3);
    }

    #[test]
    fn test_rejects() {
        assert!(matches!(VhvFile::from_bytes(&[0; 39]), Err(Error::InvalidFormat(_))));

        let mut data = vhv_bytes(VertexFlags::COLOR, &[]);
        data[0] = 3;
        assert!(matches!(VhvFile::from_bytes(&data), Err(Error::InvalidFormat(_))));

        let data = vhv_bytes(VertexFlags::SPECULAR, &[(0, &[0; 4])]);
        assert!(matches!(VhvFile::from_bytes(&data), Err(Error::NotImplemented(_))));

        let mut data = vhv_bytes(VertexFlags::NORMAL, &[(0, &[0; 12])]);
        data.truncate(data.len() - 1);
        assert_eq!(VhvFile::from_bytes(&data), Err(Error::UnexpectedEof));
    }
}
