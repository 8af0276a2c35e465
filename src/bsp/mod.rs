//! Source engine BSP maps (`VBSP`)
//!
//! A [`BspFile`] owns its byte source and parses only the header up front.
//! Each lump is decoded the first time its accessor is called and cached
//! for the rest of the session:
//!
//! ```no_run
//! use source_formats::bsp::BspFile;
//!
//! let mut bsp = BspFile::open("maps/de_dust2.bsp")?;
//! if let Some(planes) = bsp.planes()? {
//!     println!("{} planes", planes.len());
//! }
//! for warning in bsp.diagnostics() {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), source_formats::Error>(())
//! ```

pub mod array;
pub mod bitpack;
pub mod cache;
pub mod diagnostics;
pub mod dispatch;
pub mod game_lump;
pub mod header;
pub mod lump;
pub mod pakfile;
pub mod physics;
pub mod stream;
pub mod structs;
pub mod visibility;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use source_kv::KeyValues;

use crate::codec::{BinaryReader, ColorRgbExp32, Vector};
use crate::error::{Error, Result};

pub use cache::{RegionCache, RegionType, RegionValue, SlotState};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use dispatch::{resolve, Decoder, RegionContext};
pub use game_lump::{FourCc, GameLump, StaticProp, StaticPropLump};
pub use header::{FileHeader, ProducerVariant, RegionDescriptor, IDBSPHEADER};
pub use lump::{LumpId, HEADER_LUMPS};
pub use pakfile::Pakfile;
pub use physics::{PhysDisp, PhysModel};
pub use structs::*;
pub use visibility::Visibility;

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct BspConfig {
    pub variant: ProducerVariant,
    /// Also decode the potentially audible sets of the visibility lump
    pub decode_audible_sets: bool,
}

/// Builder for opening BSP sessions
#[derive(Debug, Default)]
pub struct BspBuilder {
    config: BspConfig,
}

impl BspBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, variant: ProducerVariant) -> Self {
        self.config.variant = variant;
        self
    }

    pub fn decode_audible_sets(mut self, enabled: bool) -> Self {
        self.config.decode_audible_sets = enabled;
        self
    }

    pub fn open(self, path: impl AsRef<Path>) -> Result<BspFile<BufReader<File>>> {
        let file = File::open(path)?;
        BspFile::with_config(BufReader::new(file), self.config)
    }

    pub fn from_reader<R: Read + Seek>(self, source: R) -> Result<BspFile<R>> {
        BspFile::with_config(source, self.config)
    }
}

macro_rules! lump_accessors {
    ($($(#[$doc:meta])* $name:ident => $lump:ident: $ty:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self) -> Result<Option<Arc<$ty>>> {
                self.typed(LumpId::$lump)
            }
        )*
    };
}

/// An open BSP file
pub struct BspFile<R> {
    reader: BinaryReader<R>,
    header: FileHeader,
    config: BspConfig,
    cache: RegionCache,
    diagnostics: Diagnostics,
    poisoned: Option<Error>,
}

impl BspFile<BufReader<File>> {
    /// Open a PC map with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        BspBuilder::new().open(path)
    }
}

impl<R: Read + Seek> BspFile<R> {
    pub fn from_reader(source: R) -> Result<Self> {
        Self::with_config(source, BspConfig::default())
    }

    /// Parse the header; fails on a bad magic or a truncated directory
    pub fn with_config(source: R, config: BspConfig) -> Result<Self> {
        let mut reader = BinaryReader::new(source, config.variant.endian())?;
        let header = FileHeader::parse(&mut reader, config.variant)?;
        tracing::debug!(
            version = header.version,
            revision = header.map_revision,
            variant = %config.variant,
            "opened bsp"
        );
        Ok(Self {
            reader,
            header,
            config,
            cache: RegionCache::new(),
            diagnostics: Diagnostics::new(),
            poisoned: None,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn config(&self) -> &BspConfig {
        &self.config
    }

    pub fn region(&self, lump: LumpId) -> &RegionDescriptor {
        self.header.region(lump)
    }

    /// Warnings collected by every decode so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    pub fn is_decoded(&self, lump: LumpId) -> bool {
        self.cache.is_decoded(lump)
    }

    pub fn slot_state(&self, lump: LumpId) -> SlotState {
        self.cache.state(lump)
    }

    /// The fatal error that ended this session, if any
    pub fn poisoned(&self) -> Option<&Error> {
        self.poisoned.as_ref()
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn check_poisoned(&self) -> Result<()> {
        match &self.poisoned {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Record a fatal error so every later access fails with it
    fn poison_on_fatal<T>(&mut self, lump: LumpId, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() && self.poisoned.is_none() {
                tracing::warn!(?lump, error = %err, "bsp session aborted");
                self.poisoned = Some(err.clone());
            }
        }
        result
    }

    fn check_bounds(&self, region: &RegionDescriptor) -> Result<()> {
        if region.end() > self.reader.len() {
            return Err(Error::RegionOutOfBounds {
                index: region.index,
                offset: region.offset,
                length: region.length,
                file_len: self.reader.len(),
            });
        }
        Ok(())
    }

    /// Raw bytes of a lump. Not cached.
    pub fn bytes(&mut self, lump: LumpId) -> Result<Vec<u8>> {
        self.check_poisoned()?;
        let region = *self.header.region(lump);
        let result = self.check_bounds(&region).and_then(|()| {
            self.reader.seek(region.offset as u64)?;
            self.reader.read_bytes(region.length as usize)
        });
        self.poison_on_fatal(lump, result)
    }

    /// Decode a lump with the decoder [`resolve`] picks for it.
    ///
    /// Zero-length lumps are `None` without consulting the decoder table.
    /// The outcome is memoized, errors included. A fatal error (truncated
    /// source, a lump outside the source) ends the session: every later
    /// access returns that error.
    pub fn decode(&mut self, lump: LumpId) -> Result<Option<RegionValue>> {
        self.check_poisoned()?;
        let result = self.decode_region(lump);
        self.poison_on_fatal(lump, result)
    }

    fn decode_region(&mut self, lump: LumpId) -> Result<Option<RegionValue>> {
        let region = *self.header.region(lump);
        let file_len = self.reader.len();
        let variant = self.config.variant;
        let decode_audible_sets = self.config.decode_audible_sets;
        let reader = &mut self.reader;
        let diagnostics = &mut self.diagnostics;

        self.cache.get_or_try_insert_with(lump, || {
            if region.is_empty() {
                return Ok(None);
            }
            if region.end() > file_len {
                return Err(Error::RegionOutOfBounds {
                    index: region.index,
                    offset: region.offset,
                    length: region.length,
                    file_len,
                });
            }
            if region.is_compressed() {
                return Err(Error::NotImplemented(format!(
                    "LZMA compressed lump {:?} ({} bytes unpacked)",
                    lump, region.uncompressed_size
                )));
            }

            let decoder = resolve(lump, region.version, variant)?;
            tracing::debug!(?lump, ?decoder, offset = region.offset, length = region.length, "decoding lump");
            let mut ctx = RegionContext {
                reader,
                region,
                decode_audible_sets,
                diagnostics,
            };
            decoder.decode(&mut ctx).map(Some)
        })
    }

    fn typed<T: RegionType>(&mut self, lump: LumpId) -> Result<Option<Arc<T>>> {
        Ok(self.decode(lump)?.and_then(T::from_value))
    }

    lump_accessors! {
        /// Lump 0, one key/value block per entity
        entities => Entities: Vec<KeyValues>;
        planes => Planes: Vec<Plane>;
        tex_data => TexData: Vec<TexData>;
        vertexes => Vertexes: Vec<Vector>;
        visibility => Visibility: Visibility;
        nodes => Nodes: Vec<Node>;
        tex_info => TexInfo: Vec<TexInfo>;
        faces => Faces: Vec<Face>;
        /// LDR lightmap samples, addressed by [`Face::light_ofs`] in bytes
        lighting => Lighting: Vec<ColorRgbExp32>;
        occlusion => Occlusion: Occlusion;
        leafs => Leafs: Leafs;
        /// Hammer face ids, parallel to [`faces`](Self::faces)
        face_ids => FaceIds: Vec<u16>;
        edges => Edges: Vec<Edge>;
        /// Signed edge indices; negative means the edge is reversed
        surfedges => Surfedges: Vec<i32>;
        models => Models: Vec<Model>;
        world_lights => WorldLights: WorldLights;
        leaf_faces => LeafFaces: Vec<u16>;
        leaf_brushes => LeafBrushes: Vec<u16>;
        brushes => Brushes: Vec<Brush>;
        brush_sides => BrushSides: Vec<BrushSide>;
        areas => Areas: Vec<Area>;
        area_portals => AreaPortals: Vec<AreaPortal>;
        disp_info => DispInfo: Vec<DispInfo>;
        /// Faces before splitting
        original_faces => OriginalFaces: Vec<Face>;
        phys_disp => PhysDisp: PhysDisp;
        phys_collide => PhysCollide: Vec<PhysModel>;
        vert_normals => VertNormals: Vec<Vector>;
        vert_normal_indices => VertNormalIndices: Vec<u16>;
        disp_lightmap_alphas => DispLightmapAlphas: Vec<u8>;
        disp_verts => DispVerts: Vec<DispVert>;
        disp_lightmap_sample_positions => DispLightmapSamplePositions: Vec<u8>;
        game_lump => GameLump: GameLump;
        leaf_water_data => LeafWaterData: Vec<LeafWaterData>;
        primitives => Primitives: Vec<Primitive>;
        prim_verts => PrimVerts: Vec<Vector>;
        prim_indices => PrimIndices: Vec<u16>;
        pakfile => Pakfile: Pakfile;
        clip_portal_verts => ClipPortalVerts: Vec<Vector>;
        cubemaps => Cubemaps: Vec<Cubemap>;
        /// Null-terminated texture names, addressed by the string table
        tex_data_string_data => TexDataStringData: Vec<u8>;
        tex_data_string_table => TexDataStringTable: Vec<i32>;
        overlays => Overlays: Vec<Overlay>;
        leaf_min_dist_to_water => LeafMinDistToWater: Vec<u16>;
        face_macro_texture_info => FaceMacroTextureInfo: Vec<u16>;
        disp_tris => DispTris: Vec<u16>;
        prop_blob => PropBlob: Vec<u8>;
        water_overlays => WaterOverlays: Vec<WaterOverlay>;
        leaf_ambient_index_hdr => LeafAmbientIndexHdr: Vec<LeafAmbientIndex>;
        leaf_ambient_index => LeafAmbientIndex: Vec<LeafAmbientIndex>;
        lighting_hdr => LightingHdr: Vec<ColorRgbExp32>;
        world_lights_hdr => WorldLightsHdr: WorldLights;
        leaf_ambient_lighting_hdr => LeafAmbientLightingHdr: Vec<LeafAmbientLighting>;
        leaf_ambient_lighting => LeafAmbientLighting: Vec<LeafAmbientLighting>;
        faces_hdr => FacesHdr: Vec<Face>;
        map_flags => MapFlags: MapFlags;
        overlay_fades => OverlayFades: Vec<OverlayFade>;
    }

    /// Texture names in string-table order (lump 44 into lump 43)
    pub fn texture_names(&mut self) -> Result<Vec<String>> {
        let Some(table) = self.tex_data_string_table()? else {
            return Ok(Vec::new());
        };
        let data = self.tex_data_string_data()?.unwrap_or_default();

        table
            .iter()
            .map(|&offset| {
                let start = usize::try_from(offset)
                    .ok()
                    .filter(|&s| s < data.len())
                    .ok_or_else(|| {
                        Error::InvalidFormat(format!(
                            "texture string offset {offset} outside string data ({} bytes)",
                            data.len()
                        ))
                    })?;
                let rest = &data[start..];
                let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
            })
            .collect()
    }

    /// Name of the texture a texinfo entry points at
    pub fn texture_name(&mut self, tex_info: usize) -> Result<Option<String>> {
        let Some(infos) = self.tex_info()? else {
            return Ok(None);
        };
        let Some(datas) = self.tex_data()? else {
            return Ok(None);
        };
        let Some(tex_data) = infos
            .get(tex_info)
            .and_then(|info| usize::try_from(info.tex_data).ok())
            .and_then(|i| datas.get(i))
        else {
            return Ok(None);
        };
        let names = self.texture_names()?;
        Ok(usize::try_from(tex_data.name_string_table_id)
            .ok()
            .and_then(|i| names.get(i).cloned()))
    }

    /// CRC-32 over every lump except the entities, in directory order.
    /// This is the checksum the engine compares between client and server.
    pub fn map_checksum(&mut self) -> Result<u32> {
        let mut hasher = crc32fast::Hasher::new();
        for lump in LumpId::ALL {
            if lump == LumpId::Entities || self.header.region(lump).is_empty() {
                continue;
            }
            hasher.update(&self.bytes(lump)?);
        }
        Ok(hasher.finalize())
    }
}

impl<R> std::fmt::Debug for BspFile<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BspFile")
            .field("version", &self.header.version)
            .field("map_revision", &self.header.map_revision)
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("diagnostics", &self.diagnostics.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
