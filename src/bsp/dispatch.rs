//! Decoder selection by (lump, version, producer)
//!
//! [`resolve`] is a pure table lookup; [`Decoder::decode`] runs the chosen
//! decoder against one region and returns the value tagged with its type.

use std::io::{Read, Seek};

use source_kv::KeyValues;

use super::array::{decode_records, Record};
use super::cache::{RegionType, RegionValue};
use super::diagnostics::Diagnostics;
use super::game_lump::GameLump;
use super::header::{ProducerVariant, RegionDescriptor};
use super::lump::LumpId;
use super::pakfile::Pakfile;
use super::physics::{decode_phys_collide, PhysDisp};
use super::structs::*;
use super::visibility::Visibility;
use crate::codec::{BinaryReader, ColorRgbExp32, Vector};
use crate::error::{Error, Result};

/// Everything a decoder may touch while decoding one region
pub struct RegionContext<'a, R> {
    pub reader: &'a mut BinaryReader<R>,
    pub region: RegionDescriptor,
    pub decode_audible_sets: bool,
    pub diagnostics: &'a mut Diagnostics,
}

impl<R: Read + Seek> RegionContext<'_, R> {
    pub fn records<T: Record>(&mut self) -> Result<Vec<T>> {
        decode_records(self.reader, &self.region, self.diagnostics)
    }

    /// The whole region as raw bytes
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        self.seek_start()?;
        self.reader.read_bytes(self.region.length as usize)
    }

    pub fn seek_start(&mut self) -> Result<()> {
        self.reader.seek(self.region.offset as u64)
    }
}

/// Decoders, one per distinct on-disk layout. The output type of each is
/// noted on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
    /// `Vec<KeyValues>`
    Entities,
    /// `Vec<Plane>`
    Planes,
    /// `Vec<TexData>`
    TexData,
    /// `Vec<Vector>`
    Vectors,
    /// `Visibility`
    Visibility,
    /// `Vec<Node>`
    Nodes,
    /// `Vec<TexInfo>`
    TexInfo,
    /// `Vec<Face>`
    Faces,
    /// `Vec<ColorRgbExp32>`
    LightmapSamples,
    /// `Occlusion`
    Occlusion,
    /// `Leafs::V0`
    LeafsV0,
    /// `Leafs::V1`
    LeafsV1,
    /// `Vec<u16>`
    U16s,
    /// `Vec<i32>`
    I32s,
    /// `Vec<Edge>`
    Edges,
    /// `Vec<Model>`
    Models,
    /// `WorldLights::V0`
    WorldLightsV0,
    /// `WorldLights::V1`
    WorldLightsV1,
    /// `Vec<Brush>`
    Brushes,
    /// `Vec<BrushSide>`
    BrushSides,
    /// `Vec<Area>`
    Areas,
    /// `Vec<AreaPortal>`
    AreaPortals,
    /// `Vec<DispInfo>`
    DispInfo,
    /// `PhysDisp`
    PhysDisp,
    /// `Vec<PhysModel>`
    PhysCollide,
    /// `Vec<u8>`
    Bytes,
    /// `Vec<DispVert>`
    DispVerts,
    /// `GameLump`
    GameLump,
    /// `Vec<LeafWaterData>`
    LeafWaterData,
    /// `Vec<Primitive>`
    Primitives,
    /// `Pakfile`
    Pakfile,
    /// `Vec<Cubemap>`
    Cubemaps,
    /// `Vec<Overlay>`
    Overlays,
    /// `Vec<WaterOverlay>`
    WaterOverlays,
    /// `Vec<LeafAmbientIndex>`
    LeafAmbientIndex,
    /// `Vec<LeafAmbientLighting>`
    LeafAmbientLighting,
    /// `Vec<OverlayFade>`
    OverlayFades,
    /// `MapFlags`
    MapFlags,
}

/// Pick the decoder for a lump. Combinations with no registered decoder
/// fail with [`Error::UnsupportedRegionVersion`].
pub fn resolve(lump: LumpId, version: i32, variant: ProducerVariant) -> Result<Decoder> {
    use Decoder as D;
    use LumpId as L;

    let decoder = match (lump, variant, version) {
        // console lightmap pages and compressed collision
        (L::Lighting | L::LightingHdr | L::PhysCollide, ProducerVariant::Ps3, _) => None,

        (L::Entities, _, _) => Some(D::Entities),
        (L::Planes, _, _) => Some(D::Planes),
        (L::TexData, _, _) => Some(D::TexData),
        (L::Vertexes | L::VertNormals | L::PrimVerts | L::ClipPortalVerts, _, _) => Some(D::Vectors),
        (L::Visibility, _, _) => Some(D::Visibility),
        (L::Nodes, _, _) => Some(D::Nodes),
        (L::TexInfo, _, _) => Some(D::TexInfo),
        (L::Faces | L::OriginalFaces | L::FacesHdr, _, _) => Some(D::Faces),
        (L::Lighting | L::LightingHdr, _, _) => Some(D::LightmapSamples),
        (L::Occlusion, _, 0..=2) => Some(D::Occlusion),
        (L::Leafs, _, 0) => Some(D::LeafsV0),
        (L::Leafs, _, 1) => Some(D::LeafsV1),
        (
            L::FaceIds
            | L::LeafFaces
            | L::LeafBrushes
            | L::VertNormalIndices
            | L::PrimIndices
            | L::LeafMinDistToWater
            | L::FaceMacroTextureInfo
            | L::DispTris,
            _,
            _,
        ) => Some(D::U16s),
        (L::Surfedges | L::TexDataStringTable, _, _) => Some(D::I32s),
        (L::Edges, _, _) => Some(D::Edges),
        (L::Models, _, _) => Some(D::Models),
        (L::WorldLights | L::WorldLightsHdr, _, 0) => Some(D::WorldLightsV0),
        (L::WorldLights | L::WorldLightsHdr, _, 1) => Some(D::WorldLightsV1),
        (L::Brushes, _, _) => Some(D::Brushes),
        (L::BrushSides, _, _) => Some(D::BrushSides),
        (L::Areas, _, _) => Some(D::Areas),
        (L::AreaPortals, _, _) => Some(D::AreaPortals),
        (L::DispInfo, _, _) => Some(D::DispInfo),
        (L::PhysDisp, _, _) => Some(D::PhysDisp),
        (L::PhysCollide, _, _) => Some(D::PhysCollide),
        (
            L::DispLightmapAlphas
            | L::DispLightmapSamplePositions
            | L::TexDataStringData
            | L::PropBlob,
            _,
            _,
        ) => Some(D::Bytes),
        (L::DispVerts, _, _) => Some(D::DispVerts),
        (L::GameLump, _, _) => Some(D::GameLump),
        (L::LeafWaterData, _, _) => Some(D::LeafWaterData),
        (L::Primitives, _, _) => Some(D::Primitives),
        (L::Pakfile, _, _) => Some(D::Pakfile),
        (L::Cubemaps, _, _) => Some(D::Cubemaps),
        (L::Overlays, _, _) => Some(D::Overlays),
        (L::WaterOverlays, _, _) => Some(D::WaterOverlays),
        (L::LeafAmbientIndex | L::LeafAmbientIndexHdr, _, _) => Some(D::LeafAmbientIndex),
        (L::LeafAmbientLighting | L::LeafAmbientLightingHdr, _, _) => Some(D::LeafAmbientLighting),
        (L::OverlayFades, _, _) => Some(D::OverlayFades),
        (L::MapFlags, _, _) => Some(D::MapFlags),
        _ => None,
    };

    decoder.ok_or(Error::UnsupportedRegionVersion {
        lump,
        version,
        variant,
    })
}

fn tag<T: RegionType>(value: T) -> RegionValue {
    value.into_value()
}

impl Decoder {
    /// Stride of fixed-size record decoders
    pub fn record_size(self) -> Option<usize> {
        let size = match self {
            Decoder::Planes => Plane::SIZE,
            Decoder::TexData => TexData::SIZE,
            Decoder::Vectors => Vector::SIZE,
            Decoder::Nodes => Node::SIZE,
            Decoder::TexInfo => TexInfo::SIZE,
            Decoder::Faces => Face::SIZE,
            Decoder::LightmapSamples => ColorRgbExp32::SIZE,
            Decoder::LeafsV0 => LeafV0::SIZE,
            Decoder::LeafsV1 => Leaf::SIZE,
            Decoder::U16s => 2,
            Decoder::I32s => 4,
            Decoder::Edges => Edge::SIZE,
            Decoder::Models => Model::SIZE,
            Decoder::WorldLightsV0 => WorldLight::SIZE,
            Decoder::WorldLightsV1 => WorldLightV1::SIZE,
            Decoder::Brushes => Brush::SIZE,
            Decoder::BrushSides => BrushSide::SIZE,
            Decoder::Areas => Area::SIZE,
            Decoder::AreaPortals => AreaPortal::SIZE,
            Decoder::DispInfo => DispInfo::SIZE,
            Decoder::Bytes => 1,
            Decoder::DispVerts => DispVert::SIZE,
            Decoder::LeafWaterData => LeafWaterData::SIZE,
            Decoder::Primitives => Primitive::SIZE,
            Decoder::Cubemaps => Cubemap::SIZE,
            Decoder::Overlays => Overlay::SIZE,
            Decoder::WaterOverlays => WaterOverlay::SIZE,
            Decoder::LeafAmbientIndex => LeafAmbientIndex::SIZE,
            Decoder::LeafAmbientLighting => LeafAmbientLighting::SIZE,
            Decoder::OverlayFades => OverlayFade::SIZE,
            Decoder::Entities
            | Decoder::Visibility
            | Decoder::Occlusion
            | Decoder::PhysDisp
            | Decoder::PhysCollide
            | Decoder::GameLump
            | Decoder::Pakfile
            | Decoder::MapFlags => return None,
        };
        Some(size)
    }

    pub fn decode<R: Read + Seek>(self, ctx: &mut RegionContext<'_, R>) -> Result<RegionValue> {
        let value = match self {
            Decoder::Entities => {
                let bytes = ctx.bytes()?;
                let text = String::from_utf8_lossy(&bytes);
                tag::<Vec<KeyValues>>(source_kv::parse_entities(&text))
            }
            Decoder::Planes => tag(ctx.records::<Plane>()?),
            Decoder::TexData => tag(ctx.records::<TexData>()?),
            Decoder::Vectors => tag(ctx.records::<Vector>()?),
            Decoder::Visibility => {
                ctx.seek_start()?;
                tag(Visibility::read(
                    ctx.reader,
                    ctx.region.offset as u64,
                    ctx.region.length,
                    ctx.decode_audible_sets,
                )?)
            }
            Decoder::Nodes => tag(ctx.records::<Node>()?),
            Decoder::TexInfo => tag(ctx.records::<TexInfo>()?),
            Decoder::Faces => tag(ctx.records::<Face>()?),
            Decoder::LightmapSamples => tag(ctx.records::<ColorRgbExp32>()?),
            Decoder::Occlusion => {
                ctx.seek_start()?;
                tag(Occlusion::read(ctx.reader, ctx.region.version)?)
            }
            Decoder::LeafsV0 => tag(Leafs::V0(ctx.records()?)),
            Decoder::LeafsV1 => tag(Leafs::V1(ctx.records()?)),
            Decoder::U16s => tag(ctx.records::<u16>()?),
            Decoder::I32s => tag(ctx.records::<i32>()?),
            Decoder::Edges => tag(ctx.records::<Edge>()?),
            Decoder::Models => tag(ctx.records::<Model>()?),
            Decoder::WorldLightsV0 => tag(WorldLights::V0(ctx.records()?)),
            Decoder::WorldLightsV1 => tag(WorldLights::V1(ctx.records()?)),
            Decoder::Brushes => tag(ctx.records::<Brush>()?),
            Decoder::BrushSides => tag(ctx.records::<BrushSide>()?),
            Decoder::Areas => tag(ctx.records::<Area>()?),
            Decoder::AreaPortals => tag(ctx.records::<AreaPortal>()?),
            Decoder::DispInfo => tag(ctx.records::<DispInfo>()?),
            Decoder::PhysDisp => tag(PhysDisp::read(ctx.reader, &ctx.region)?),
            Decoder::PhysCollide => tag(decode_phys_collide(ctx.reader, &ctx.region)?),
            Decoder::Bytes => tag(ctx.bytes()?),
            Decoder::DispVerts => tag(ctx.records::<DispVert>()?),
            Decoder::GameLump => tag(GameLump::read(ctx.reader, &ctx.region, ctx.diagnostics)?),
            Decoder::LeafWaterData => tag(ctx.records::<LeafWaterData>()?),
            Decoder::Primitives => tag(ctx.records::<Primitive>()?),
            Decoder::Pakfile => tag(Pakfile::new(ctx.bytes()?)),
            Decoder::Cubemaps => tag(ctx.records::<Cubemap>()?),
            Decoder::Overlays => tag(ctx.records::<Overlay>()?),
            Decoder::WaterOverlays => tag(ctx.records::<WaterOverlay>()?),
            Decoder::LeafAmbientIndex => tag(ctx.records::<LeafAmbientIndex>()?),
            Decoder::LeafAmbientLighting => tag(ctx.records::<LeafAmbientLighting>()?),
            Decoder::OverlayFades => tag(ctx.records::<OverlayFade>()?),
            Decoder::MapFlags => {
                let words = ctx.records::<u32>()?;
                let bits = words.first().copied().unwrap_or(0);
                tag(MapFlags::from_bits_retain(bits))
            }
        };
        Ok(value)
    }
}
