//! Fixed-size lump records
//!
//! One struct per on-disk record, each a [`Record`] with its exact size.
//! Lumps whose layout changed between versions get an enum with one
//! variant per version (see [`Leafs`], [`WorldLights`], [`Occlusion`]).

use std::io::{Read, Seek};

use bitflags::bitflags;
use serde::Serialize;

use super::array::{read_count, Record};
use super::bitpack::{unpack16, unpack_face_count_render_order};
use crate::codec::{BinaryReader, ColorRgbExp32, CompressedLightCube, Vector};
use crate::error::Result;

bitflags! {
    /// `CONTENTS_*` brush and leaf content flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct Contents: u32 {
        const SOLID = 0x1;
        const WINDOW = 0x2;
        const AUX = 0x4;
        const GRATE = 0x8;
        const SLIME = 0x10;
        const WATER = 0x20;
        const BLOCKLOS = 0x40;
        const OPAQUE = 0x80;
        const TESTFOGVOLUME = 0x100;
        const BLOCKLIGHT = 0x400;
        const TEAM1 = 0x800;
        const TEAM2 = 0x1000;
        const IGNORE_NODRAW_OPAQUE = 0x2000;
        const MOVEABLE = 0x4000;
        const AREAPORTAL = 0x8000;
        const PLAYERCLIP = 0x10000;
        const MONSTERCLIP = 0x20000;
        const CURRENT_0 = 0x40000;
        const CURRENT_90 = 0x80000;
        const CURRENT_180 = 0x100000;
        const CURRENT_270 = 0x200000;
        const CURRENT_UP = 0x400000;
        const CURRENT_DOWN = 0x800000;
        const ORIGIN = 0x1000000;
        const MONSTER = 0x2000000;
        const DEBRIS = 0x4000000;
        const DETAIL = 0x8000000;
        const TRANSLUCENT = 0x10000000;
        const LADDER = 0x20000000;
        const HITBOX = 0x40000000;
    }
}

bitflags! {
    /// `SURF_*` texinfo flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct SurfaceFlags: u32 {
        const LIGHT = 0x1;
        const SKY2D = 0x2;
        const SKY = 0x4;
        const WARP = 0x8;
        const TRANS = 0x10;
        const NOPORTAL = 0x20;
        const TRIGGER = 0x40;
        const NODRAW = 0x80;
        const HINT = 0x100;
        const SKIP = 0x200;
        const NOLIGHT = 0x400;
        const BUMPLIGHT = 0x800;
        const NOSHADOWS = 0x1000;
        const NODECALS = 0x2000;
        const NOCHOP = 0x4000;
        const HITBOX = 0x8000;
    }
}

bitflags! {
    /// Lump 59 `LVLFLAGS_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct MapFlags: u32 {
        const BAKED_STATIC_PROP_LIGHTING_NONHDR = 0x1;
        const BAKED_STATIC_PROP_LIGHTING_HDR = 0x2;
    }
}

fn read_i16_3<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<[i16; 3]> {
    Ok([reader.read_i16()?, reader.read_i16()?, reader.read_i16()?])
}

fn read_f32_4<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<[f32; 4]> {
    Ok([
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
        reader.read_f32()?,
    ])
}

/// Lump 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Plane {
    pub normal: Vector,
    pub dist: f32,
    pub plane_type: i32,
}

impl Record for Plane {
    const SIZE: usize = 20;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            normal: reader.read_vector()?,
            dist: reader.read_f32()?,
            plane_type: reader.read_i32()?,
        })
    }
}

/// Lump 2
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TexData {
    pub reflectivity: Vector,
    /// Index into the texdata string table (lump 44)
    pub name_string_table_id: i32,
    pub width: i32,
    pub height: i32,
    pub view_width: i32,
    pub view_height: i32,
}

impl Record for TexData {
    const SIZE: usize = 32;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            reflectivity: reader.read_vector()?,
            name_string_table_id: reader.read_i32()?,
            width: reader.read_i32()?,
            height: reader.read_i32()?,
            view_width: reader.read_i32()?,
            view_height: reader.read_i32()?,
        })
    }
}

/// Lump 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Node {
    pub plane_num: i32,
    /// Negative values are `-(leaf + 1)`
    pub children: [i32; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub num_faces: u16,
    pub area: i16,
}

impl Record for Node {
    const SIZE: usize = 32;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let node = Self {
            plane_num: reader.read_i32()?,
            children: reader.read_i32_array::<2>()?,
            mins: read_i16_3(reader)?,
            maxs: read_i16_3(reader)?,
            first_face: reader.read_u16()?,
            num_faces: reader.read_u16()?,
            area: reader.read_i16()?,
        };
        reader.skip(2)?;
        Ok(node)
    }
}

/// Lump 6
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TexInfo {
    /// `[s/t][xyz offset]` in texels per world unit
    pub texture_vecs: [[f32; 4]; 2],
    /// `[s/t][xyz offset]` in luxels per world unit
    pub lightmap_vecs: [[f32; 4]; 2],
    pub flags: SurfaceFlags,
    pub tex_data: i32,
}

impl Record for TexInfo {
    const SIZE: usize = 72;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            texture_vecs: [read_f32_4(reader)?, read_f32_4(reader)?],
            lightmap_vecs: [read_f32_4(reader)?, read_f32_4(reader)?],
            flags: SurfaceFlags::from_bits_retain(reader.read_u32()?),
            tex_data: reader.read_i32()?,
        })
    }
}

/// Lumps 7, 27 and 58
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Face {
    pub plane_num: u16,
    pub side: u8,
    pub on_node: u8,
    pub first_edge: i32,
    pub num_edges: i16,
    pub tex_info: i16,
    pub disp_info: i16,
    pub surface_fog_volume_id: i16,
    pub styles: [u8; 4],
    /// Byte offset into the lighting lump, -1 when unlit
    pub light_ofs: i32,
    pub area: f32,
    pub lightmap_texture_mins_in_luxels: [i32; 2],
    pub lightmap_texture_size_in_luxels: [i32; 2],
    pub orig_face: i32,
    pub num_prims: u16,
    pub first_prim_id: u16,
    pub smoothing_groups: u32,
}

impl Record for Face {
    const SIZE: usize = 56;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            plane_num: reader.read_u16()?,
            side: reader.read_u8()?,
            on_node: reader.read_u8()?,
            first_edge: reader.read_i32()?,
            num_edges: reader.read_i16()?,
            tex_info: reader.read_i16()?,
            disp_info: reader.read_i16()?,
            surface_fog_volume_id: reader.read_i16()?,
            styles: reader.read_array::<4>()?,
            light_ofs: reader.read_i32()?,
            area: reader.read_f32()?,
            lightmap_texture_mins_in_luxels: reader.read_i32_array::<2>()?,
            lightmap_texture_size_in_luxels: reader.read_i32_array::<2>()?,
            orig_face: reader.read_i32()?,
            num_prims: reader.read_u16()?,
            first_prim_id: reader.read_u16()?,
            smoothing_groups: reader.read_u32()?,
        })
    }
}

/// Lump 10, version 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Leaf {
    pub contents: Contents,
    pub cluster: i16,
    /// 9-bit signed area from the packed area/flags word
    pub area: i16,
    /// 7-bit leaf flags from the packed area/flags word
    pub flags: i16,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_leaf_face: u16,
    pub num_leaf_faces: u16,
    pub first_leaf_brush: u16,
    pub num_leaf_brushes: u16,
    pub leaf_water_data_id: i16,
}

impl Leaf {
    fn read_head<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let contents = Contents::from_bits_retain(reader.read_u32()?);
        let cluster = reader.read_i16()?;
        let (area, flags) = unpack16(reader.read_u16()? as u32);
        Ok(Self {
            contents,
            cluster,
            area,
            flags,
            mins: read_i16_3(reader)?,
            maxs: read_i16_3(reader)?,
            first_leaf_face: reader.read_u16()?,
            num_leaf_faces: reader.read_u16()?,
            first_leaf_brush: reader.read_u16()?,
            num_leaf_brushes: reader.read_u16()?,
            leaf_water_data_id: reader.read_i16()?,
        })
    }
}

impl Record for Leaf {
    const SIZE: usize = 32;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let leaf = Self::read_head(reader)?;
        reader.skip(2)?;
        Ok(leaf)
    }
}

/// Lump 10, version 0: carries its own ambient light cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeafV0 {
    #[serde(flatten)]
    pub leaf: Leaf,
    pub ambient_lighting: CompressedLightCube,
}

impl Record for LeafV0 {
    const SIZE: usize = 56;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let leaf = Leaf::read_head(reader)?;
        let ambient_lighting = CompressedLightCube::read(reader)?;
        reader.skip(2)?;
        Ok(Self { leaf, ambient_lighting })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "version", content = "leafs")]
pub enum Leafs {
    V0(Vec<LeafV0>),
    V1(Vec<Leaf>),
}

impl Leafs {
    pub fn len(&self) -> usize {
        match self {
            Leafs::V0(v) => v.len(),
            Leafs::V1(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&Leaf> {
        match self {
            Leafs::V0(v) => v.get(index).map(|l| &l.leaf),
            Leafs::V1(v) => v.get(index),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Leaf> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

/// Lump 12: vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge(pub [u16; 2]);

impl Record for Edge {
    const SIZE: usize = 4;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self([reader.read_u16()?, reader.read_u16()?]))
    }
}

/// Lump 14: brush models, index 0 is the world
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Model {
    pub mins: Vector,
    pub maxs: Vector,
    pub origin: Vector,
    pub head_node: i32,
    pub first_face: i32,
    pub num_faces: i32,
}

impl Record for Model {
    const SIZE: usize = 48;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            mins: reader.read_vector()?,
            maxs: reader.read_vector()?,
            origin: reader.read_vector()?,
            head_node: reader.read_i32()?,
            first_face: reader.read_i32()?,
            num_faces: reader.read_i32()?,
        })
    }
}

/// Lumps 15 and 54, version 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorldLight {
    pub origin: Vector,
    pub intensity: Vector,
    pub normal: Vector,
    pub cluster: i32,
    pub emit_type: i32,
    pub style: i32,
    pub stopdot: f32,
    pub stopdot2: f32,
    pub exponent: f32,
    pub radius: f32,
    pub constant_attn: f32,
    pub linear_attn: f32,
    pub quadratic_attn: f32,
    pub flags: i32,
    pub texinfo: i32,
    pub owner: i32,
}

impl WorldLight {
    fn read_tail<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        origin: Vector,
        intensity: Vector,
        normal: Vector,
    ) -> Result<Self> {
        Ok(Self {
            origin,
            intensity,
            normal,
            cluster: reader.read_i32()?,
            emit_type: reader.read_i32()?,
            style: reader.read_i32()?,
            stopdot: reader.read_f32()?,
            stopdot2: reader.read_f32()?,
            exponent: reader.read_f32()?,
            radius: reader.read_f32()?,
            constant_attn: reader.read_f32()?,
            linear_attn: reader.read_f32()?,
            quadratic_attn: reader.read_f32()?,
            flags: reader.read_i32()?,
            texinfo: reader.read_i32()?,
            owner: reader.read_i32()?,
        })
    }
}

impl Record for WorldLight {
    const SIZE: usize = 88;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let origin = reader.read_vector()?;
        let intensity = reader.read_vector()?;
        let normal = reader.read_vector()?;
        Self::read_tail(reader, origin, intensity, normal)
    }
}

/// Version 1 inserts a shadow cast offset right after the normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WorldLightV1 {
    #[serde(flatten)]
    pub light: WorldLight,
    pub shadow_cast_offset: Vector,
}

impl Record for WorldLightV1 {
    const SIZE: usize = 100;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let origin = reader.read_vector()?;
        let intensity = reader.read_vector()?;
        let normal = reader.read_vector()?;
        let shadow_cast_offset = reader.read_vector()?;
        let light = WorldLight::read_tail(reader, origin, intensity, normal)?;
        Ok(Self { light, shadow_cast_offset })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "version", content = "lights")]
pub enum WorldLights {
    V0(Vec<WorldLight>),
    V1(Vec<WorldLightV1>),
}

impl WorldLights {
    pub fn len(&self) -> usize {
        match self {
            WorldLights::V0(v) => v.len(),
            WorldLights::V1(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&WorldLight> {
        match self {
            WorldLights::V0(v) => v.get(index),
            WorldLights::V1(v) => v.get(index).map(|l| &l.light),
        }
    }
}

/// Lump 18
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Brush {
    pub first_side: i32,
    pub num_sides: i32,
    pub contents: Contents,
}

impl Record for Brush {
    const SIZE: usize = 12;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            first_side: reader.read_i32()?,
            num_sides: reader.read_i32()?,
            contents: Contents::from_bits_retain(reader.read_u32()?),
        })
    }
}

/// Lump 19
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrushSide {
    pub plane_num: u16,
    pub tex_info: i16,
    pub disp_info: i16,
    pub bevel: i16,
}

impl Record for BrushSide {
    const SIZE: usize = 8;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            plane_num: reader.read_u16()?,
            tex_info: reader.read_i16()?,
            disp_info: reader.read_i16()?,
            bevel: reader.read_i16()?,
        })
    }
}

/// Lump 20
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Area {
    pub num_area_portals: i32,
    pub first_area_portal: i32,
}

impl Record for Area {
    const SIZE: usize = 8;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            num_area_portals: reader.read_i32()?,
            first_area_portal: reader.read_i32()?,
        })
    }
}

/// Lump 21
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AreaPortal {
    pub portal_key: u16,
    pub other_area: u16,
    pub first_clip_portal_vert: u16,
    pub clip_portal_verts: u16,
    pub plane_num: i32,
}

impl Record for AreaPortal {
    const SIZE: usize = 12;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            portal_key: reader.read_u16()?,
            other_area: reader.read_u16()?,
            first_clip_portal_vert: reader.read_u16()?,
            clip_portal_verts: reader.read_u16()?,
            plane_num: reader.read_i32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispSubNeighbor {
    /// 0xFFFF when there is no neighbor
    pub neighbor: u16,
    pub orientation: u8,
    pub span: u8,
    pub neighbor_span: u8,
}

impl DispSubNeighbor {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let sub = Self {
            neighbor: reader.read_u16()?,
            orientation: reader.read_u8()?,
            span: reader.read_u8()?,
            neighbor_span: reader.read_u8()?,
        };
        reader.skip(1)?;
        Ok(sub)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispCornerNeighbors {
    pub neighbors: [u16; 4],
    pub count: u8,
}

impl DispCornerNeighbors {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let mut neighbors = [0u16; 4];
        for n in neighbors.iter_mut() {
            *n = reader.read_u16()?;
        }
        let count = reader.read_u8()?;
        reader.skip(1)?;
        Ok(Self { neighbors, count })
    }
}

/// Lump 26
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispInfo {
    pub start_position: Vector,
    pub disp_vert_start: i32,
    pub disp_tri_start: i32,
    pub power: i32,
    pub min_tess: i32,
    pub smoothing_angle: f32,
    pub contents: Contents,
    pub map_face: u16,
    pub lightmap_alpha_start: i32,
    pub lightmap_sample_position_start: i32,
    /// Two sub-neighbors per edge
    pub edge_neighbors: [[DispSubNeighbor; 2]; 4],
    pub corner_neighbors: [DispCornerNeighbors; 4],
    pub allowed_verts: [u32; 10],
}

impl DispInfo {
    /// Vertices along one side: `2^power + 1`
    pub fn side_length(&self) -> u32 {
        (1u32 << self.power.clamp(0, 31)) + 1
    }
}

impl Record for DispInfo {
    const SIZE: usize = 176;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let start_position = reader.read_vector()?;
        let disp_vert_start = reader.read_i32()?;
        let disp_tri_start = reader.read_i32()?;
        let power = reader.read_i32()?;
        let min_tess = reader.read_i32()?;
        let smoothing_angle = reader.read_f32()?;
        let contents = Contents::from_bits_retain(reader.read_u32()?);
        let map_face = reader.read_u16()?;
        reader.skip(2)?;
        let lightmap_alpha_start = reader.read_i32()?;
        let lightmap_sample_position_start = reader.read_i32()?;

        let mut edge_neighbors = [[DispSubNeighbor::default(); 2]; 4];
        for edge in edge_neighbors.iter_mut() {
            for sub in edge.iter_mut() {
                *sub = DispSubNeighbor::read(reader)?;
            }
        }
        let mut corner_neighbors = [DispCornerNeighbors::default(); 4];
        for corner in corner_neighbors.iter_mut() {
            *corner = DispCornerNeighbors::read(reader)?;
        }

        Ok(Self {
            start_position,
            disp_vert_start,
            disp_tri_start,
            power,
            min_tess,
            smoothing_angle,
            contents,
            map_face,
            lightmap_alpha_start,
            lightmap_sample_position_start,
            edge_neighbors,
            corner_neighbors,
            allowed_verts: reader.read_u32_array::<10>()?,
        })
    }
}

/// Lump 33
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispVert {
    pub vec: Vector,
    pub dist: f32,
    pub alpha: f32,
}

impl Record for DispVert {
    const SIZE: usize = 20;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            vec: reader.read_vector()?,
            dist: reader.read_f32()?,
            alpha: reader.read_f32()?,
        })
    }
}

/// Lump 36
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeafWaterData {
    pub surface_z: f32,
    pub min_z: f32,
    pub surface_tex_info_id: i16,
}

impl Record for LeafWaterData {
    const SIZE: usize = 12;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let data = Self {
            surface_z: reader.read_f32()?,
            min_z: reader.read_f32()?,
            surface_tex_info_id: reader.read_i16()?,
        };
        reader.skip(2)?;
        Ok(data)
    }
}

/// Lump 37
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Primitive {
    /// 0 triangle list, 1 triangle strip
    pub prim_type: u8,
    pub first_index: u16,
    pub index_count: u16,
    pub first_vert: u16,
    pub vert_count: u16,
}

impl Record for Primitive {
    const SIZE: usize = 10;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let prim_type = reader.read_u8()?;
        reader.skip(1)?;
        Ok(Self {
            prim_type,
            first_index: reader.read_u16()?,
            index_count: reader.read_u16()?,
            first_vert: reader.read_u16()?,
            vert_count: reader.read_u16()?,
        })
    }
}

/// Lump 42
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cubemap {
    pub origin: [i32; 3],
    /// 0 means the default size
    pub size: i32,
}

impl Record for Cubemap {
    const SIZE: usize = 16;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            origin: reader.read_i32_array::<3>()?,
            size: reader.read_i32()?,
        })
    }
}

/// Fields shared by overlays and water overlays; `N` is the face slot count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayRecord<const N: usize> {
    pub id: i32,
    pub tex_info: i16,
    pub face_count: u16,
    pub render_order: u8,
    /// Only the first `face_count` entries are meaningful
    pub faces: Vec<i32>,
    pub u: [f32; 2],
    pub v: [f32; 2],
    pub uv_points: [Vector; 4],
    pub origin: Vector,
    pub basis_normal: Vector,
}

impl<const N: usize> Record for OverlayRecord<N> {
    const SIZE: usize = 8 + N * 4 + 16 + 4 * 12 + 24;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let id = reader.read_i32()?;
        let tex_info = reader.read_i16()?;
        let (face_count, render_order) = unpack_face_count_render_order(reader.read_u16()?);
        let mut faces = Vec::with_capacity(N);
        for _ in 0..N {
            faces.push(reader.read_i32()?);
        }
        let u = [reader.read_f32()?, reader.read_f32()?];
        let v = [reader.read_f32()?, reader.read_f32()?];
        let mut uv_points = [Vector::default(); 4];
        for p in uv_points.iter_mut() {
            *p = reader.read_vector()?;
        }
        Ok(Self {
            id,
            tex_info,
            face_count,
            render_order,
            faces,
            u,
            v,
            uv_points,
            origin: reader.read_vector()?,
            basis_normal: reader.read_vector()?,
        })
    }
}

impl<const N: usize> OverlayRecord<N> {
    /// Faces the overlay is applied to
    pub fn active_faces(&self) -> &[i32] {
        &self.faces[..(self.face_count as usize).min(self.faces.len())]
    }
}

/// Lump 45 (`OVERLAY_BSP_FACE_COUNT` = 64)
pub type Overlay = OverlayRecord<64>;
/// Lump 50 (`WATEROVERLAY_BSP_FACE_COUNT` = 256)
pub type WaterOverlay = OverlayRecord<256>;

/// Lumps 51 and 52
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeafAmbientIndex {
    pub ambient_sample_count: u16,
    pub first_ambient_sample: u16,
}

impl Record for LeafAmbientIndex {
    const SIZE: usize = 4;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            ambient_sample_count: reader.read_u16()?,
            first_ambient_sample: reader.read_u16()?,
        })
    }
}

/// Lumps 55 and 56
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeafAmbientLighting {
    pub cube: CompressedLightCube,
    /// Position inside the leaf bounds, in 1/255 steps
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl Record for LeafAmbientLighting {
    const SIZE: usize = 28;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let sample = Self {
            cube: CompressedLightCube::read(reader)?,
            x: reader.read_u8()?,
            y: reader.read_u8()?,
            z: reader.read_u8()?,
        };
        reader.skip(1)?;
        Ok(sample)
    }
}

/// Lump 60
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayFade {
    pub fade_dist_min_sq: f32,
    pub fade_dist_max_sq: f32,
}

impl Record for OverlayFade {
    const SIZE: usize = 8;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            fade_dist_min_sq: reader.read_f32()?,
            fade_dist_max_sq: reader.read_f32()?,
        })
    }
}

/// Lump 9 occluder; version 1 and later append the area
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OccluderData {
    pub flags: i32,
    pub first_poly: i32,
    pub poly_count: i32,
    pub mins: Vector,
    pub maxs: Vector,
    pub area: Option<i32>,
}

impl OccluderData {
    pub fn record_size(version: i32) -> usize {
        if version >= 1 {
            40
        } else {
            36
        }
    }

    pub(crate) fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, version: i32) -> Result<Self> {
        Ok(Self {
            flags: reader.read_i32()?,
            first_poly: reader.read_i32()?,
            poly_count: reader.read_i32()?,
            mins: reader.read_vector()?,
            maxs: reader.read_vector()?,
            area: if version >= 1 { Some(reader.read_i32()?) } else { None },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccluderPolyData {
    pub first_vertex_index: i32,
    pub vertex_count: i32,
    pub plane_num: i32,
}

impl Record for OccluderPolyData {
    const SIZE: usize = 12;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            first_vertex_index: reader.read_i32()?,
            vertex_count: reader.read_i32()?,
            plane_num: reader.read_i32()?,
        })
    }
}

/// Lump 9: three count-prefixed arrays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occlusion {
    pub version: i32,
    pub occluders: Vec<OccluderData>,
    pub polys: Vec<OccluderPolyData>,
    /// Indices into the vertex lump
    pub vertex_indices: Vec<i32>,
}

impl Occlusion {
    pub(crate) fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, version: i32) -> Result<Self> {
        let count = read_count(reader, OccluderData::record_size(version))?;
        let mut occluders = Vec::with_capacity(count);
        for _ in 0..count {
            occluders.push(OccluderData::read(reader, version)?);
        }

        let count = read_count(reader, OccluderPolyData::SIZE)?;
        let mut polys = Vec::with_capacity(count);
        for _ in 0..count {
            polys.push(OccluderPolyData::read(reader)?);
        }

        let count = read_count(reader, 4)?;
        let mut vertex_indices = Vec::with_capacity(count);
        for _ in 0..count {
            vertex_indices.push(reader.read_i32()?);
        }

        Ok(Self {
            version,
            occluders,
            polys,
            vertex_indices,
        })
    }
}

/// Lightmap samples (lumps 8 and 53) are plain [`ColorRgbExp32`] arrays
pub type LightmapSample = ColorRgbExp32;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::bitpack::pack16;
    use crate::codec::{BinaryWriter, Endian};

    fn read_exact<T: Record>(data: &[u8]) -> T {
        assert_eq!(data.len(), T::SIZE, "fixture size");
        let mut reader = BinaryReader::from_bytes(data, Endian::Little);
        let record = T::read(&mut reader).unwrap();
        assert_eq!(reader.position().unwrap(), T::SIZE as u64);
        record
    }

    fn leaf_head(w: &mut BinaryWriter) {
        w.write_u32(Contents::SOLID.bits() | Contents::DETAIL.bits());
        w.write_i16(12);
        w.write_u16(pack16(-3, 5));
        for v in [-1i16, -2, -3, 1, 2, 3] {
            w.write_i16(v);
        }
        w.write_u16(7);
        w.write_u16(2);
        w.write_u16(9);
        w.write_u16(1);
        w.write_i16(-1);
    }

    #[test]
    fn test_leaf_versions() {
        let mut w = BinaryWriter::new(Endian::Little);
        leaf_head(&mut w);
        w.write_zeros(2);
        let leaf: Leaf = read_exact(w.as_slice());
        assert_eq!(leaf.contents, Contents::SOLID | Contents::DETAIL);
        assert_eq!((leaf.cluster, leaf.area, leaf.flags), (12, -3, 5));
        assert_eq!(leaf.maxs, [1, 2, 3]);
        assert_eq!(leaf.leaf_water_data_id, -1);

        let mut w = BinaryWriter::new(Endian::Little);
        leaf_head(&mut w);
        w.write_bytes(&[9; 24]);
        w.write_zeros(2);
        let leaf: LeafV0 = read_exact(w.as_slice());
        assert_eq!(leaf.leaf.area, -3);
        assert_eq!(leaf.ambient_lighting.colors[5].exponent, 9);

        let leafs = Leafs::V0(vec![leaf]);
        assert_eq!(leafs.get(0).map(|l| l.first_leaf_face), Some(7));
        assert_eq!(leafs.iter().count(), 1);
    }

    #[test]
    fn test_world_light_v1_field_order() {
        let mut w = BinaryWriter::new(Endian::Little);
        for v in 1..=12 {
            w.write_f32(v as f32);
        }
        w.write_i32(44);
        w.write_zeros(WorldLightV1::SIZE - 52);
        let light: WorldLightV1 = read_exact(w.as_slice());
        assert_eq!(light.light.normal, Vector::new(7.0, 8.0, 9.0));
        assert_eq!(light.shadow_cast_offset, Vector::new(10.0, 11.0, 12.0));
        assert_eq!(light.light.cluster, 44);

        let lights = WorldLights::V1(vec![light]);
        assert_eq!(lights.get(0).unwrap().cluster, 44);
    }

    #[test]
    fn test_record_sizes_consume_exactly() {
        let _: Node = read_exact(&[0; 32]);
        let _: TexInfo = read_exact(&[0; 72]);
        let _: Face = read_exact(&[0; 56]);
        let _: DispInfo = read_exact(&[0; 176]);
        let _: Overlay = read_exact(&[0; 352]);
        let _: WaterOverlay = read_exact(&[0; 1120]);
        let _: LeafAmbientLighting = read_exact(&[0; 28]);
        let _: Primitive = read_exact(&[0; 10]);
        let _: LeafWaterData = read_exact(&[0; 12]);
    }

    #[test]
    fn test_overlay_face_count_split() {
        let mut w = BinaryWriter::new(Endian::Little);
        w.write_i32(3);
        w.write_i16(5);
        w.write_u16(0x8002);
        w.write_i32(100);
        w.write_i32(200);
        w.write_i32(300);
        w.write_zeros(Overlay::SIZE - w.len());
        let overlay: Overlay = read_exact(w.as_slice());
        assert_eq!(overlay.face_count, 2);
        assert_eq!(overlay.render_order, 2);
        assert_eq!(overlay.active_faces(), [100, 200]);
    }

    #[test]
    fn test_disp_info_neighbors() {
        let mut w = BinaryWriter::new(Endian::Little);
        w.write_zeros(12 + 8);
        w.write_i32(3);
        w.write_zeros(48 - w.len());
        // first edge, first sub-neighbor
        w.write_u16(17);
        w.write_bytes(&[1, 2, 3, 0]);
        w.write_zeros(42);
        w.write_u16(0xFFFF);
        w.write_zeros(6);
        w.write_u8(1);
        w.write_u8(0);
        w.write_zeros(30 + 40);
        let disp: DispInfo = read_exact(w.as_slice());
        assert_eq!(disp.power, 3);
        assert_eq!(disp.side_length(), 9);
        assert_eq!(disp.edge_neighbors[0][0].neighbor, 17);
        assert_eq!(disp.edge_neighbors[0][0].neighbor_span, 3);
        assert_eq!(disp.corner_neighbors[0].neighbors[0], 0xFFFF);
        assert_eq!(disp.corner_neighbors[0].count, 1);
    }

    #[test]
    fn test_occlusion_versions() {
        let occlusion = |version: i32| {
            let mut w = BinaryWriter::new(Endian::Little);
            // one occluder
            w.write_i32(1);
            w.write_i32(0);
            w.write_i32(0);
            w.write_i32(1);
            w.write_zeros(24);
            if version >= 1 {
                w.write_i32(6);
            }
            // one poly
            w.write_i32(1);
            w.write_i32(0);
            w.write_i32(2);
            w.write_i32(4);
            // two vertex indices
            w.write_i32(2);
            w.write_i32(10);
            w.write_i32(11);
            w.into_vec()
        };

        let data = occlusion(2);
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        let occ = Occlusion::read(&mut reader, 2).unwrap();
        assert_eq!(occ.occluders[0].area, Some(6));
        assert_eq!(occ.polys[0].vertex_count, 2);
        assert_eq!(occ.polys[0].plane_num, 4);
        assert_eq!(occ.vertex_indices, [10, 11]);
        assert_eq!(reader.position().unwrap(), data.len() as u64);

        let data = occlusion(0);
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        let occ = Occlusion::read(&mut reader, 0).unwrap();
        assert_eq!(occ.occluders[0].area, None);
        assert_eq!(occ.vertex_indices, [10, 11]);
    }
}
