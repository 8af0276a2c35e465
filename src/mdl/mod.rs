//! Studio model header (`.mdl`)
//!
//! Only the main header, the optional secondary header and the bone tables
//! are decoded. Bones and bone controllers are read on first access and
//! cached on the [`MdlFile`].

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use bitflags::bitflags;
use serde::Serialize;

use crate::bsp::ProducerVariant;
use crate::codec::{BinaryReader, Matrix3x4, Quaternion, RadianEuler, Vector};
use crate::error::{Error, Result};

/// `"IDST"` read as a little-endian integer
pub const IDSTUDIOHEADER: u32 = u32::from_le_bytes(*b"IDST");
pub const HEADER_SIZE: usize = 408;
pub const BONE_SIZE: u64 = 216;
pub const BONE_CONTROLLER_SIZE: u64 = 56;

bitflags! {
    /// `STUDIOHDR_FLAGS_*`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
    pub struct StudioFlags: u32 {
        const AUTOGENERATED_HITBOX = 0x1;
        const USES_ENV_CUBEMAP = 0x2;
        const FORCE_OPAQUE = 0x4;
        const TRANSLUCENT_TWOPASS = 0x8;
        const STATIC_PROP = 0x10;
        const USES_FB_TEXTURE = 0x20;
        const HAS_SHADOW_LOD = 0x40;
        const USES_BUMPMAPPING = 0x80;
        const USE_SHADOW_LOD_MATERIALS = 0x100;
        const OBSOLETE = 0x200;
        const NO_FORCED_FADE = 0x800;
        const FORCE_PHONEME_CROSSFADE = 0x1000;
        const CONSTANT_DIRECTIONAL_LIGHT_DOT = 0x2000;
        const FLEXES_CONVERTED = 0x4000;
        const BUILT_IN_PREVIEW_MODE = 0x8000;
        const AMBIENT_BOOST = 0x10000;
        const DO_NOT_CAST_SHADOWS = 0x20000;
        const CAST_TEXTURE_SHADOWS = 0x40000;
    }
}

/// Count/offset pair of one header table. Offsets are relative to the
/// start of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Table {
    pub count: i32,
    pub offset: i32,
}

impl Table {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        Ok(Self {
            count: reader.read_i32()?,
            offset: reader.read_i32()?,
        })
    }

    /// Absolute offset of element `i`
    fn element(&self, i: usize, stride: u64) -> Result<u64> {
        let base = u64::try_from(self.offset)
            .map_err(|_| Error::InvalidFormat(format!("negative table offset {}", self.offset)))?;
        Ok(base + i as u64 * stride)
    }

    fn len(&self) -> Result<usize> {
        usize::try_from(self.count)
            .map_err(|_| Error::InvalidFormat(format!("negative table count {}", self.count)))
    }
}

/// `studiohdr_t`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudioHeader {
    pub version: i32,
    pub checksum: i32,
    pub name: String,
    pub length: i32,

    pub eye_position: Vector,
    pub illum_position: Vector,
    pub hull_min: Vector,
    pub hull_max: Vector,
    pub view_bbmin: Vector,
    pub view_bbmax: Vector,

    pub flags: StudioFlags,
    pub bones: Table,
    pub bone_controllers: Table,
    pub hitbox_sets: Table,
    pub local_anims: Table,
    pub local_seqs: Table,
    pub activity_list_version: i32,
    pub events_indexed: i32,
    pub textures: Table,
    pub cd_textures: Table,
    pub skin_ref_count: i32,
    pub skin_families: Table,
    pub body_parts: Table,
    pub local_attachments: Table,
    pub local_nodes: Table,
    pub local_node_name_index: i32,
    pub flex_descs: Table,
    pub flex_controllers: Table,
    pub flex_rules: Table,
    pub ik_chains: Table,
    pub mouths: Table,
    pub local_pose_params: Table,
    pub surface_prop_index: i32,
    pub key_value_index: i32,
    pub key_value_size: i32,
    pub local_ik_autoplay_locks: Table,

    pub mass: f32,
    pub contents: i32,
    pub include_models: Table,
    pub anim_block_name_index: i32,
    pub anim_blocks: Table,
    pub bone_table_by_name_index: i32,

    pub const_directional_light_dot: u8,
    pub root_lod: u8,
    pub num_allowed_root_lods: u8,

    pub flex_controller_ui: Table,
    pub vert_anim_fixed_point_scale: f32,
    pub surface_prop_lookup: i32,
    /// Offset of [`StudioHeader2`], zero when absent
    pub studiohdr2_index: i32,
}

impl StudioHeader {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.seek(0)?;
        let raw = reader.read_array::<4>()?;
        if u32::from_le_bytes(raw) != IDSTUDIOHEADER {
            return Err(Error::InvalidMagic {
                found: raw,
                expected: *b"IDST",
            });
        }

        let version = reader.read_i32()?;
        let checksum = reader.read_i32()?;
        let name = reader.read_fixed_string(64)?;
        let length = reader.read_i32()?;

        let eye_position = reader.read_vector()?;
        let illum_position = reader.read_vector()?;
        let hull_min = reader.read_vector()?;
        let hull_max = reader.read_vector()?;
        let view_bbmin = reader.read_vector()?;
        let view_bbmax = reader.read_vector()?;

        let flags = StudioFlags::from_bits_retain(reader.read_u32()?);
        let bones = Table::read(reader)?;
        let bone_controllers = Table::read(reader)?;
        let hitbox_sets = Table::read(reader)?;
        let local_anims = Table::read(reader)?;
        let local_seqs = Table::read(reader)?;
        let activity_list_version = reader.read_i32()?;
        let events_indexed = reader.read_i32()?;
        let textures = Table::read(reader)?;
        let cd_textures = Table::read(reader)?;
        let skin_ref_count = reader.read_i32()?;
        let skin_families = Table::read(reader)?;
        let body_parts = Table::read(reader)?;
        let local_attachments = Table::read(reader)?;
        let local_nodes = Table::read(reader)?;
        let local_node_name_index = reader.read_i32()?;
        let flex_descs = Table::read(reader)?;
        let flex_controllers = Table::read(reader)?;
        let flex_rules = Table::read(reader)?;
        let ik_chains = Table::read(reader)?;
        let mouths = Table::read(reader)?;
        let local_pose_params = Table::read(reader)?;
        let surface_prop_index = reader.read_i32()?;
        let key_value_index = reader.read_i32()?;
        let key_value_size = reader.read_i32()?;
        let local_ik_autoplay_locks = Table::read(reader)?;

        let mass = reader.read_f32()?;
        let contents = reader.read_i32()?;
        let include_models = Table::read(reader)?;
        // virtualModel
        reader.skip(4)?;
        let anim_block_name_index = reader.read_i32()?;
        let anim_blocks = Table::read(reader)?;
        // animblockModel
        reader.skip(4)?;
        let bone_table_by_name_index = reader.read_i32()?;
        // pVertexBase, pIndexBase
        reader.skip(8)?;

        let const_directional_light_dot = reader.read_u8()?;
        let root_lod = reader.read_u8()?;
        let num_allowed_root_lods = reader.read_u8()?;
        reader.skip(5)?;

        let flex_controller_ui = Table::read(reader)?;
        let vert_anim_fixed_point_scale = reader.read_f32()?;
        let surface_prop_lookup = reader.read_i32()?;
        let studiohdr2_index = reader.read_i32()?;
        reader.skip(4)?;

        Ok(Self {
            version,
            checksum,
            name,
            length,
            eye_position,
            illum_position,
            hull_min,
            hull_max,
            view_bbmin,
            view_bbmax,
            flags,
            bones,
            bone_controllers,
            hitbox_sets,
            local_anims,
            local_seqs,
            activity_list_version,
            events_indexed,
            textures,
            cd_textures,
            skin_ref_count,
            skin_families,
            body_parts,
            local_attachments,
            local_nodes,
            local_node_name_index,
            flex_descs,
            flex_controllers,
            flex_rules,
            ik_chains,
            mouths,
            local_pose_params,
            surface_prop_index,
            key_value_index,
            key_value_size,
            local_ik_autoplay_locks,
            mass,
            contents,
            include_models,
            anim_block_name_index,
            anim_blocks,
            bone_table_by_name_index,
            const_directional_light_dot,
            root_lod,
            num_allowed_root_lods,
            flex_controller_ui,
            vert_anim_fixed_point_scale,
            surface_prop_lookup,
            studiohdr2_index,
        })
    }
}

/// `studiohdr2_t`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudioHeader2 {
    pub src_bone_transforms: Table,
    pub illum_position_attachment_index: i32,
    pub max_eye_deflection: f32,
    pub linear_bone_index: i32,
    pub name_index: i32,
    pub bone_flex_drivers: Table,
    pub body_group_presets: Table,
}

impl StudioHeader2 {
    pub const SIZE: usize = 220;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let header = Self {
            src_bone_transforms: Table::read(reader)?,
            illum_position_attachment_index: reader.read_i32()?,
            max_eye_deflection: reader.read_f32()?,
            linear_bone_index: reader.read_i32()?,
            name_index: reader.read_i32()?,
            bone_flex_drivers: Table::read(reader)?,
            body_group_presets: Table::read(reader)?,
        };
        reader.skip(4 + 176)?;
        Ok(header)
    }
}

/// `mstudiobone_t`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    pub parent: i32,
    pub bone_controller: [i32; 6],
    pub pos: Vector,
    pub quat: Quaternion,
    pub rot: RadianEuler,
    pub pos_scale: Vector,
    pub rot_scale: Vector,
    pub pose_to_bone: Matrix3x4,
    pub q_alignment: Quaternion,
    pub flags: i32,
    pub proc_type: i32,
    pub proc_index: i32,
    pub physics_bone: i32,
    pub surface_prop: String,
    pub contents: i32,
    pub surface_prop_lookup: i32,
}

impl Bone {
    /// `base` is the absolute offset of this bone; string offsets are
    /// relative to it.
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, base: u64) -> Result<Self> {
        reader.seek(base)?;
        let name_index = reader.read_i32()?;
        let parent = reader.read_i32()?;
        let bone_controller = reader.read_i32_array::<6>()?;
        let pos = reader.read_vector()?;
        let quat = reader.read_quaternion()?;
        let rot = reader.read_radian_euler()?;
        let pos_scale = reader.read_vector()?;
        let rot_scale = reader.read_vector()?;
        let pose_to_bone = Matrix3x4::read(reader)?;
        let q_alignment = reader.read_quaternion()?;
        let flags = reader.read_i32()?;
        let proc_type = reader.read_i32()?;
        let proc_index = reader.read_i32()?;
        let physics_bone = reader.read_i32()?;
        let surface_prop_index = reader.read_i32()?;
        let contents = reader.read_i32()?;
        let surface_prop_lookup = reader.read_i32()?;

        Ok(Self {
            name: read_relative_string(reader, base, name_index)?,
            parent,
            bone_controller,
            pos,
            quat,
            rot,
            pos_scale,
            rot_scale,
            pose_to_bone,
            q_alignment,
            flags,
            proc_type,
            proc_index,
            physics_bone,
            surface_prop: read_relative_string(reader, base, surface_prop_index)?,
            contents,
            surface_prop_lookup,
        })
    }
}

/// `mstudiobonecontroller_t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoneController {
    pub bone: i32,
    pub kind: i32,
    pub start: f32,
    pub end: f32,
    pub rest: i32,
    pub input_field: i32,
}

impl BoneController {
    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>, base: u64) -> Result<Self> {
        reader.seek(base)?;
        Ok(Self {
            bone: reader.read_i32()?,
            kind: reader.read_i32()?,
            start: reader.read_f32()?,
            end: reader.read_f32()?,
            rest: reader.read_i32()?,
            input_field: reader.read_i32()?,
        })
    }
}

fn read_relative_string<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    base: u64,
    offset: i32,
) -> Result<String> {
    let pos = base.checked_add_signed(offset as i64).ok_or_else(|| {
        Error::InvalidFormat(format!("string offset {offset} before start of file"))
    })?;
    reader.seek(pos)?;
    reader.read_cstring()
}

/// An open `.mdl`
pub struct MdlFile<R> {
    reader: BinaryReader<R>,
    header: StudioHeader,
    header2: Option<StudioHeader2>,
    bones: Option<Arc<Vec<Bone>>>,
    bone_controllers: Option<Arc<Vec<BoneController>>>,
}

impl MdlFile<BufReader<File>> {
    /// Files named `*.ps3.mdl` are treated as console models
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let variant = match path.to_str() {
            Some(s) if s.to_ascii_lowercase().ends_with(".ps3.mdl") => ProducerVariant::Ps3,
            _ => ProducerVariant::Standard,
        };
        let file = File::open(path)?;
        Self::with_variant(BufReader::new(file), variant)
    }
}

impl<R: Read + Seek> MdlFile<R> {
    pub fn from_reader(source: R) -> Result<Self> {
        Self::with_variant(source, ProducerVariant::Standard)
    }

    pub fn with_variant(source: R, variant: ProducerVariant) -> Result<Self> {
        if variant == ProducerVariant::Ps3 {
            return Err(Error::NotImplemented(
                "PS3 models are LZMA compressed".to_string(),
            ));
        }
        let mut reader = BinaryReader::new(source, variant.endian())?;
        if reader.len() < HEADER_SIZE as u64 {
            return Err(Error::InvalidFormat(format!(
                "{} bytes is smaller than the model header",
                reader.len()
            )));
        }

        let header = StudioHeader::read(&mut reader)?;
        let header2 = match u64::try_from(header.studiohdr2_index) {
            Ok(0) => None,
            Ok(offset) => {
                reader.seek(offset)?;
                Some(StudioHeader2::read(&mut reader)?)
            }
            Err(_) => {
                return Err(Error::InvalidFormat(format!(
                    "negative studiohdr2 offset {}",
                    header.studiohdr2_index
                )))
            }
        };

        tracing::debug!(name = %header.name, version = header.version, "opened mdl");
        Ok(Self {
            reader,
            header,
            header2,
            bones: None,
            bone_controllers: None,
        })
    }

    pub fn header(&self) -> &StudioHeader {
        &self.header
    }

    pub fn header2(&self) -> Option<&StudioHeader2> {
        self.header2.as_ref()
    }

    pub fn bones(&mut self) -> Result<Arc<Vec<Bone>>> {
        if let Some(bones) = &self.bones {
            return Ok(Arc::clone(bones));
        }
        let table = self.header.bones;
        let bones = (0..table.len()?)
            .map(|i| Bone::read(&mut self.reader, table.element(i, BONE_SIZE)?))
            .collect::<Result<Vec<_>>>()?;
        let bones = Arc::new(bones);
        self.bones = Some(Arc::clone(&bones));
        Ok(bones)
    }

    pub fn bone_controllers(&mut self) -> Result<Arc<Vec<BoneController>>> {
        if let Some(controllers) = &self.bone_controllers {
            return Ok(Arc::clone(controllers));
        }
        let table = self.header.bone_controllers;
        let controllers = (0..table.len()?)
            .map(|i| BoneController::read(&mut self.reader, table.element(i, BONE_CONTROLLER_SIZE)?))
            .collect::<Result<Vec<_>>>()?;
        let controllers = Arc::new(controllers);
        self.bone_controllers = Some(Arc::clone(&controllers));
        Ok(controllers)
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R> std::fmt::Debug for MdlFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdlFile")
            .field("name", &self.header.name)
            .field("version", &self.header.version)
            .field("has_header2", &self.header2.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BinaryWriter, Endian};
    use std::io::Cursor;

    struct Fixture {
        bones: Vec<(&'static str, i32)>,
        controllers: usize,
        header2: bool,
    }

    /// Header, optional studiohdr2, bones, controllers, then bone names
    fn mdl_bytes(fx: &Fixture) -> Vec<u8> {
        let header2_at = HEADER_SIZE;
        let bones_at = header2_at + if fx.header2 { StudioHeader2::SIZE } else { 0 };
        let controllers_at = bones_at + fx.bones.len() * BONE_SIZE as usize;
        let strings_at = controllers_at + fx.controllers * BONE_CONTROLLER_SIZE as usize;

        let mut w = BinaryWriter::new(Endian::Little);
        w.write_bytes(b"IDST");
        w.write_i32(48);
        w.write_i32(0x1234);
        w.write_fixed_string("props/barrel.mdl", 64);
        w.write_i32(0);
        w.write_zeros(6 * 12);
        w.write_u32((StudioFlags::STATIC_PROP | StudioFlags::FORCE_OPAQUE).bits());
        w.write_i32(fx.bones.len() as i32);
        w.write_i32(bones_at as i32);
        w.write_i32(fx.controllers as i32);
        w.write_i32(controllers_at as i32);
        w.write_zeros(HEADER_SIZE - 8 - w.len());
        w.write_i32(if fx.header2 { header2_at as i32 } else { 0 });
        w.write_i32(0);
        assert_eq!(w.len(), HEADER_SIZE);

        if fx.header2 {
            w.write_zeros(12);
            w.write_f32(0.5);
            w.write_zeros(StudioHeader2::SIZE - 16);
        }

        let mut strings = Vec::new();
        for (i, (name, parent)) in fx.bones.iter().enumerate() {
            let base = bones_at + i * BONE_SIZE as usize;
            let name_at = strings_at + strings.len();
            strings.extend_from_slice(name.as_bytes());
            strings.push(0);
            w.write_i32((name_at - base) as i32);
            w.write_i32(*parent);
            // bonecontroller[6] through qAlignment
            w.write_zeros(152);
            w.write_i32(0);
            w.write_i32(0);
            w.write_i32(0);
            w.write_i32(-1);
            // surface prop points at the shared trailing empty string
            let empty_at = strings_at + fx.bones.iter().map(|(n, _)| n.len() + 1).sum::<usize>();
            w.write_i32((empty_at - base) as i32);
            w.write_i32(1);
            w.write_i32(0);
            w.write_zeros(28);
        }
        for i in 0..fx.controllers {
            w.write_i32(i as i32);
            w.write_i32(0x20);
            w.write_f32(-45.0);
            w.write_f32(45.0);
            w.write_i32(0);
            w.write_i32(0);
            w.write_zeros(32);
        }
        w.write_bytes(&strings);
        w.write_u8(0);
        w.into_vec()
    }

    #[test]
    fn test_header() {
        let fx = Fixture { bones: vec![], controllers: 0, header2: false };
        let mdl = MdlFile::from_reader(Cursor::new(mdl_bytes(&fx))).unwrap();
        let header = mdl.header();
        assert_eq!(header.version, 48);
        assert_eq!(header.checksum, 0x1234);
        assert_eq!(header.name, "props/barrel.mdl");
        assert!(header.flags.contains(StudioFlags::STATIC_PROP));
        assert!(mdl.header2().is_none());
    }

    #[test]
    fn test_header2() {
        let fx = Fixture { bones: vec![], controllers: 0, header2: true };
        let mdl = MdlFile::from_reader(Cursor::new(mdl_bytes(&fx))).unwrap();
        assert_eq!(mdl.header2().unwrap().max_eye_deflection, 0.5);
    }

    #[test]
    fn test_bones_cached() {
        let fx = Fixture {
            bones: vec![("static_prop", -1), ("lid", 0)],
            controllers: 1,
            header2: true,
        };
        let mut mdl = MdlFile::from_reader(Cursor::new(mdl_bytes(&fx))).unwrap();
        let bones = mdl.bones().unwrap();
        assert_eq!(bones.len(), 2);
        assert_eq!(bones[0].name, "static_prop");
        assert_eq!(bones[1].name, "lid");
        assert_eq!(bones[1].parent, 0);
        assert_eq!(bones[1].physics_bone, -1);
        assert_eq!(bones[1].surface_prop, "");
        assert_eq!(bones[1].contents, 1);
        assert!(Arc::ptr_eq(&bones, &mdl.bones().unwrap()));

        let controllers = mdl.bone_controllers().unwrap();
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].end, 45.0);
    }

    #[test]
    fn test_rejects() {
        assert!(matches!(
            MdlFile::from_reader(Cursor::new(vec![0u8; 100])),
            Err(Error::InvalidFormat(_))
        ));

        let fx = Fixture { bones: vec![], controllers: 0, header2: false };
        let mut data = mdl_bytes(&fx);
        data[..4].copy_from_slice(b"IDSQ");
        assert!(matches!(
            MdlFile::from_reader(Cursor::new(data)),
            Err(Error::InvalidMagic { found, .. }) if &found == b"IDSQ"
        ));

        assert!(matches!(
            MdlFile::with_variant(Cursor::new(mdl_bytes(&fx)), ProducerVariant::Ps3),
            Err(Error::NotImplemented(_))
        ));
    }
}
