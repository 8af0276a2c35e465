//! Game lump (lump 35) and its sub-lumps
//!
//! The game lump is a second directory inside the file:
//!
//! ```text
//! i32                         lumpCount
//! dgamelump_t * lumpCount     { id: i32, flags: u16, version: u16,
//!                               fileofs: i32, filelen: i32 }
//! ```
//!
//! `fileofs` is an absolute file offset. Each entry is decoded on its own;
//! whatever a sub-decoder consumes, the cursor is moved to
//! `fileofs + filelen` before the next entry.

use std::fmt;
use std::io::{Read, Seek};

use bitflags::bitflags;
use serde::{Serialize, Serializer};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::array::read_count;
use super::header::RegionDescriptor;
use crate::codec::{BinaryReader, Color32, ColorRgbExp32, QAngle, Vector, Vector2};
use crate::error::{Error, Result};

/// Size of one model-name dictionary slot
pub const NAME_SLOT_SIZE: usize = 128;

/// Four-character game lump id, stored as a big-endian packed `i32`
/// (`'sprp'` in C)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub i32);

impl FourCc {
    pub const STATIC_PROPS: FourCc = FourCc(i32::from_be_bytes(*b"sprp"));
    pub const DETAIL_PROPS: FourCc = FourCc(i32::from_be_bytes(*b"dprp"));
    pub const DETAIL_PROP_LIGHTING: FourCc = FourCc(i32::from_be_bytes(*b"dplt"));
    pub const DETAIL_PROP_LIGHTING_HDR: FourCc = FourCc(i32::from_be_bytes(*b"dplh"));

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        FourCc(i32::from_be_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

impl Serialize for FourCc {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

bitflags! {
    /// `dgamelump_t::flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct GameLumpFlags: u16 {
        const COMPRESSED = 0x0001;
    }
}

bitflags! {
    /// Per-instance static prop flags (`STATIC_PROP_*`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct StaticPropFlags: u8 {
        const FADES = 0x01;
        const USE_LIGHTING_ORIGIN = 0x02;
        const NO_DRAW = 0x04;
        const IGNORE_NORMALS = 0x08;
        const NO_SHADOW = 0x10;
        const SCREEN_SPACE_FADE = 0x20;
        const NO_PER_VERTEX_LIGHTING = 0x40;
        const NO_SELF_SHADOWING = 0x80;
    }
}

/// One entry of the game lump directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameLumpHeader {
    pub four_cc: FourCc,
    pub flags: GameLumpFlags,
    pub version: u16,
    pub offset: i32,
    pub length: i32,
}

impl GameLumpHeader {
    pub const SIZE: usize = 16;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            four_cc: FourCc(reader.read_i32()?),
            flags: GameLumpFlags::from_bits_retain(reader.read_u16()?),
            version: reader.read_u16()?,
            offset: reader.read_i32()?,
            length: reader.read_i32()?,
        })
    }

    fn start(&self) -> Result<u64> {
        u64::try_from(self.offset).map_err(|_| {
            Error::InvalidFormat(format!("game lump {} has negative offset {}", self.four_cc, self.offset))
        })
    }

    fn end(&self) -> Result<u64> {
        let length = u64::try_from(self.length).map_err(|_| {
            Error::InvalidFormat(format!("game lump {} has negative length {}", self.four_cc, self.length))
        })?;
        Ok(self.start()? + length)
    }
}

/// `StaticPropLump_t` fields shared by every version (the v4 layout, 56 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV4 {
    pub origin: Vector,
    pub angles: QAngle,
    /// Index into [`StaticPropLump::names`]
    pub prop_type: u16,
    /// Range into [`StaticPropLump::leaves`]
    pub first_leaf: u16,
    pub leaf_count: u16,
    pub solid: u8,
    pub flags: StaticPropFlags,
    pub skin: i32,
    pub fade_min_dist: f32,
    pub fade_max_dist: f32,
    pub lighting_origin: Vector,
}

impl StaticPropV4 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            origin: reader.read_vector()?,
            angles: reader.read_qangle()?,
            prop_type: reader.read_u16()?,
            first_leaf: reader.read_u16()?,
            leaf_count: reader.read_u16()?,
            solid: reader.read_u8()?,
            flags: StaticPropFlags::from_bits_retain(reader.read_u8()?),
            skin: reader.read_i32()?,
            fade_min_dist: reader.read_f32()?,
            fade_max_dist: reader.read_f32()?,
            lighting_origin: reader.read_vector()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV5 {
    #[serde(flatten)]
    pub base: StaticPropV4,
    pub forced_fade_scale: f32,
}

impl StaticPropV5 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            base: StaticPropV4::read(reader)?,
            forced_fade_scale: reader.read_f32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV6 {
    #[serde(flatten)]
    pub base: StaticPropV5,
    pub min_dx_level: u16,
    pub max_dx_level: u16,
}

impl StaticPropV6 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            base: StaticPropV5::read(reader)?,
            min_dx_level: reader.read_u16()?,
            max_dx_level: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV7 {
    #[serde(flatten)]
    pub base: StaticPropV6,
    pub diffuse_modulation: Color32,
}

impl StaticPropV7 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            base: StaticPropV6::read(reader)?,
            diffuse_modulation: reader.read_color32()?,
        })
    }
}

/// v8 drops the DX levels in favour of CPU/GPU levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV8 {
    #[serde(flatten)]
    pub base: StaticPropV5,
    pub min_cpu_level: u8,
    pub max_cpu_level: u8,
    pub min_gpu_level: u8,
    pub max_gpu_level: u8,
    pub diffuse_modulation: Color32,
}

impl StaticPropV8 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            base: StaticPropV5::read(reader)?,
            min_cpu_level: reader.read_u8()?,
            max_cpu_level: reader.read_u8()?,
            min_gpu_level: reader.read_u8()?,
            max_gpu_level: reader.read_u8()?,
            diffuse_modulation: reader.read_color32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV9 {
    #[serde(flatten)]
    pub base: StaticPropV8,
    pub disable_x360: bool,
}

impl StaticPropV9 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let base = StaticPropV8::read(reader)?;
        // bool padded to 4 bytes
        let disable_x360 = reader.read_u32()? != 0;
        Ok(Self { base, disable_x360 })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV10 {
    #[serde(flatten)]
    pub base: StaticPropV9,
    pub flags_ex: u32,
}

impl StaticPropV10 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            base: StaticPropV9::read(reader)?,
            flags_ex: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StaticPropV11 {
    #[serde(flatten)]
    pub base: StaticPropV10,
    pub uniform_scale: f32,
}

impl StaticPropV11 {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            base: StaticPropV10::read(reader)?,
            uniform_scale: reader.read_f32()?,
        })
    }
}

/// A static prop instance, tagged by the sub-lump version that laid it out
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "version")]
pub enum StaticProp {
    V4(StaticPropV4),
    V5(StaticPropV5),
    V6(StaticPropV6),
    V7(StaticPropV7),
    V8(StaticPropV8),
    V9(StaticPropV9),
    V10(StaticPropV10),
    V11(StaticPropV11),
}

impl StaticProp {
    /// On-disk record size for a sub-lump version
    pub fn record_size(version: u16) -> Option<usize> {
        match version {
            4 => Some(56),
            5 => Some(60),
            6 => Some(64),
            7 | 8 => Some(68),
            9 => Some(72),
            10 => Some(76),
            11 => Some(80),
            _ => None,
        }
    }

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, version: u16) -> Result<Self> {
        let prop = match version {
            4 => StaticProp::V4(StaticPropV4::read(reader)?),
            5 => StaticProp::V5(StaticPropV5::read(reader)?),
            6 => StaticProp::V6(StaticPropV6::read(reader)?),
            7 => StaticProp::V7(StaticPropV7::read(reader)?),
            8 => StaticProp::V8(StaticPropV8::read(reader)?),
            9 => StaticProp::V9(StaticPropV9::read(reader)?),
            10 => StaticProp::V10(StaticPropV10::read(reader)?),
            11 => StaticProp::V11(StaticPropV11::read(reader)?),
            _ => {
                return Err(Error::UnsupportedSubVersion {
                    four_cc: FourCc::STATIC_PROPS.to_string(),
                    version,
                })
            }
        };
        Ok(prop)
    }

    pub fn version(&self) -> u16 {
        match self {
            StaticProp::V4(_) => 4,
            StaticProp::V5(_) => 5,
            StaticProp::V6(_) => 6,
            StaticProp::V7(_) => 7,
            StaticProp::V8(_) => 8,
            StaticProp::V9(_) => 9,
            StaticProp::V10(_) => 10,
            StaticProp::V11(_) => 11,
        }
    }

    /// Fields every version carries
    pub fn base(&self) -> &StaticPropV4 {
        match self {
            StaticProp::V4(p) => p,
            StaticProp::V5(p) => &p.base,
            StaticProp::V6(p) => &p.base.base,
            StaticProp::V7(p) => &p.base.base.base,
            StaticProp::V8(p) => &p.base.base,
            StaticProp::V9(p) => &p.base.base.base,
            StaticProp::V10(p) => &p.base.base.base.base,
            StaticProp::V11(p) => &p.base.base.base.base.base,
        }
    }

    pub fn forced_fade_scale(&self) -> Option<f32> {
        match self {
            StaticProp::V4(_) => None,
            StaticProp::V5(p) => Some(p.forced_fade_scale),
            StaticProp::V6(p) => Some(p.base.forced_fade_scale),
            StaticProp::V7(p) => Some(p.base.base.forced_fade_scale),
            StaticProp::V8(p) => Some(p.base.forced_fade_scale),
            StaticProp::V9(p) => Some(p.base.base.forced_fade_scale),
            StaticProp::V10(p) => Some(p.base.base.base.forced_fade_scale),
            StaticProp::V11(p) => Some(p.base.base.base.base.forced_fade_scale),
        }
    }

    pub fn diffuse_modulation(&self) -> Option<Color32> {
        match self {
            StaticProp::V4(_) | StaticProp::V5(_) | StaticProp::V6(_) => None,
            StaticProp::V7(p) => Some(p.diffuse_modulation),
            StaticProp::V8(p) => Some(p.diffuse_modulation),
            StaticProp::V9(p) => Some(p.base.diffuse_modulation),
            StaticProp::V10(p) => Some(p.base.base.diffuse_modulation),
            StaticProp::V11(p) => Some(p.base.base.base.diffuse_modulation),
        }
    }
}

/// `sprp`: model dictionary, leaf table and instances
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticPropLump {
    pub names: Vec<String>,
    pub leaves: Vec<u16>,
    pub props: Vec<StaticProp>,
}

impl StaticPropLump {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, version: u16) -> Result<Self> {
        let record_size = StaticProp::record_size(version).ok_or_else(|| Error::UnsupportedSubVersion {
            four_cc: FourCc::STATIC_PROPS.to_string(),
            version,
        })?;

        let names = read_name_dictionary(reader)?;

        let leaf_count = read_count(reader, 2)?;
        let mut leaves = Vec::with_capacity(leaf_count);
        for _ in 0..leaf_count {
            leaves.push(reader.read_u16()?);
        }

        let prop_count = read_count(reader, record_size)?;
        let mut props = Vec::with_capacity(prop_count);
        for _ in 0..prop_count {
            props.push(StaticProp::read(reader, version)?);
        }

        Ok(Self { names, leaves, props })
    }

    /// Model path for a prop, if its dictionary index is valid
    pub fn model_name(&self, prop: &StaticProp) -> Option<&str> {
        self.names.get(prop.base().prop_type as usize).map(String::as_str)
    }

    /// Leaves a prop touches
    pub fn prop_leaves(&self, prop: &StaticProp) -> &[u16] {
        let base = prop.base();
        let start = base.first_leaf as usize;
        let end = start + base.leaf_count as usize;
        self.leaves.get(start..end).unwrap_or(&[])
    }
}

/// `DetailSpriteDictLump_t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetailSprite {
    pub upper_left: Vector2,
    pub lower_right: Vector2,
    pub tex_upper_left: Vector2,
    pub tex_lower_right: Vector2,
}

impl DetailSprite {
    pub const SIZE: usize = 32;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            upper_left: reader.read_vector2()?,
            lower_right: reader.read_vector2()?,
            tex_upper_left: reader.read_vector2()?,
            tex_lower_right: reader.read_vector2()?,
        })
    }
}

/// `DetailObjectLump_t` (version 4)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetailProp {
    pub origin: Vector,
    pub angles: QAngle,
    /// Model or sprite dictionary index, depending on `prop_type`
    pub detail_model: u16,
    pub leaf: u16,
    pub lighting: ColorRgbExp32,
    pub light_styles: u32,
    pub light_style_count: u8,
    pub sway_amount: u8,
    pub shape_angle: u8,
    pub shape_size: u8,
    pub orientation: u8,
    /// 0 model, 1 sprite, 2 cross shape, 3 tri shape
    pub prop_type: u8,
    pub scale: f32,
}

impl DetailProp {
    pub const SIZE: usize = 52;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let origin = reader.read_vector()?;
        let angles = reader.read_qangle()?;
        let detail_model = reader.read_u16()?;
        let leaf = reader.read_u16()?;
        let lighting = reader.read_color_rgb_exp32()?;
        let light_styles = reader.read_u32()?;
        let light_style_count = reader.read_u8()?;
        let sway_amount = reader.read_u8()?;
        let shape_angle = reader.read_u8()?;
        let shape_size = reader.read_u8()?;
        let orientation = reader.read_u8()?;
        reader.skip(3)?;
        let prop_type = reader.read_u8()?;
        reader.skip(3)?;
        let scale = reader.read_f32()?;
        Ok(Self {
            origin,
            angles,
            detail_model,
            leaf,
            lighting,
            light_styles,
            light_style_count,
            sway_amount,
            shape_angle,
            shape_size,
            orientation,
            prop_type,
            scale,
        })
    }
}

/// `dprp`: model dictionary, sprite dictionary and instances
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPropLump {
    pub models: Vec<String>,
    pub sprites: Vec<DetailSprite>,
    pub props: Vec<DetailProp>,
}

impl DetailPropLump {
    pub const VERSION: u16 = 4;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let models = read_name_dictionary(reader)?;

        let sprite_count = read_count(reader, DetailSprite::SIZE)?;
        let mut sprites = Vec::with_capacity(sprite_count);
        for _ in 0..sprite_count {
            sprites.push(DetailSprite::read(reader)?);
        }

        let prop_count = read_count(reader, DetailProp::SIZE)?;
        let mut props = Vec::with_capacity(prop_count);
        for _ in 0..prop_count {
            props.push(DetailProp::read(reader)?);
        }

        Ok(Self { models, sprites, props })
    }
}

/// `DetailPropLightstylesLump_t`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetailPropLighting {
    pub lighting: ColorRgbExp32,
    pub style: u8,
}

impl DetailPropLighting {
    pub const SIZE: usize = 5;
    pub const VERSION: u16 = 0;

    fn read_all<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Vec<Self>> {
        let count = read_count(reader, Self::SIZE)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(Self {
                lighting: reader.read_color_rgb_exp32()?,
                style: reader.read_u8()?,
            });
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameLumpData {
    StaticProps(StaticPropLump),
    DetailProps(DetailPropLump),
    DetailPropLighting(Vec<DetailPropLighting>),
    DetailPropLightingHdr(Vec<DetailPropLighting>),
    /// Code with no decoder; its bytes were skipped
    Unknown,
}

/// A directory entry and the outcome of decoding it
#[derive(Debug, Clone, PartialEq)]
pub struct GameLumpEntry {
    pub header: GameLumpHeader,
    pub data: Result<GameLumpData>,
}

/// Decoded game lump directory, in file order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameLump {
    pub entries: Vec<GameLumpEntry>,
}

impl GameLump {
    pub fn read<R: Read + Seek>(
        reader: &mut BinaryReader<R>,
        region: &RegionDescriptor,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self> {
        reader.seek(region.offset as u64)?;
        let count = read_count(reader, GameLumpHeader::SIZE)?;
        let mut headers = Vec::with_capacity(count);
        for _ in 0..count {
            headers.push(GameLumpHeader::read(reader)?);
        }

        let mut entries = Vec::with_capacity(count);
        for header in headers {
            reader.seek(header.start()?)?;
            let data = match decode_entry(reader, &header, diagnostics) {
                Ok(data) => Ok(data),
                Err(e @ (Error::UnsupportedSubVersion { .. } | Error::NotImplemented(_))) => Err(e),
                Err(e) => return Err(e),
            };
            reader.seek(header.end()?)?;
            entries.push(GameLumpEntry { header, data });
        }

        Ok(Self { entries })
    }

    pub fn find(&self, four_cc: FourCc) -> Option<&GameLumpEntry> {
        self.entries.iter().find(|e| e.header.four_cc == four_cc)
    }

    pub fn static_props(&self) -> Option<&StaticPropLump> {
        match self.find(FourCc::STATIC_PROPS)?.data.as_ref().ok()? {
            GameLumpData::StaticProps(lump) => Some(lump),
            _ => None,
        }
    }

    pub fn detail_props(&self) -> Option<&DetailPropLump> {
        match self.find(FourCc::DETAIL_PROPS)?.data.as_ref().ok()? {
            GameLumpData::DetailProps(lump) => Some(lump),
            _ => None,
        }
    }

    pub fn detail_prop_lighting(&self, hdr: bool) -> Option<&[DetailPropLighting]> {
        let four_cc = if hdr {
            FourCc::DETAIL_PROP_LIGHTING_HDR
        } else {
            FourCc::DETAIL_PROP_LIGHTING
        };
        match self.find(four_cc)?.data.as_ref().ok()? {
            GameLumpData::DetailPropLighting(v) | GameLumpData::DetailPropLightingHdr(v) => Some(v),
            _ => None,
        }
    }
}

fn decode_entry<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    header: &GameLumpHeader,
    diagnostics: &mut Diagnostics,
) -> Result<GameLumpData> {
    let four_cc = header.four_cc;
    let version = header.version;

    let supported = match four_cc {
        FourCc::STATIC_PROPS => StaticProp::record_size(version).is_some(),
        FourCc::DETAIL_PROPS => version == DetailPropLump::VERSION,
        FourCc::DETAIL_PROP_LIGHTING | FourCc::DETAIL_PROP_LIGHTING_HDR => {
            version == DetailPropLighting::VERSION
        }
        _ => {
            diagnostics.push(Diagnostic::UnknownGameLump { four_cc, version });
            return Ok(GameLumpData::Unknown);
        }
    };
    if !supported {
        diagnostics.push(Diagnostic::UnsupportedSubVersion { four_cc, version });
        return Err(Error::UnsupportedSubVersion {
            four_cc: four_cc.to_string(),
            version,
        });
    }
    if header.flags.contains(GameLumpFlags::COMPRESSED) {
        return Err(Error::NotImplemented(format!("compressed game lump {four_cc}")));
    }

    tracing::debug!(%four_cc, version, offset = header.offset, length = header.length, "decoding game lump");
    let data = match four_cc {
        FourCc::STATIC_PROPS => GameLumpData::StaticProps(StaticPropLump::read(reader, version)?),
        FourCc::DETAIL_PROPS => GameLumpData::DetailProps(DetailPropLump::read(reader)?),
        FourCc::DETAIL_PROP_LIGHTING => {
            GameLumpData::DetailPropLighting(DetailPropLighting::read_all(reader)?)
        }
        _ => GameLumpData::DetailPropLightingHdr(DetailPropLighting::read_all(reader)?),
    };
    Ok(data)
}

/// `i32` count followed by that many 128-byte name slots
fn read_name_dictionary<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Vec<String>> {
    let count = read_count(reader, NAME_SLOT_SIZE)?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(reader.read_fixed_string(NAME_SLOT_SIZE)?);
    }
    Ok(names)
}
