//! Per-session memo of decoded lumps

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use source_kv::KeyValues;

use super::game_lump::GameLump;
use super::lump::{LumpId, HEADER_LUMPS};
use super::pakfile::Pakfile;
use super::physics::{PhysDisp, PhysModel};
use super::structs::*;
use super::visibility::Visibility;
use crate::codec::{ColorRgbExp32, Vector};
use crate::error::{Error, Result};

/// A value type some decoder produces, and the [`RegionValue`] tag it is
/// stored under.
pub trait RegionType: Sized {
    fn into_value(self) -> RegionValue;

    fn from_value(value: RegionValue) -> Option<Arc<Self>>;
}

macro_rules! region_values {
    ($($variant:ident($ty:ty),)*) => {
        /// A decoded lump, tagged by the type its decoder produced
        #[derive(Clone)]
        pub enum RegionValue {
            $($variant(Arc<$ty>),)*
        }

        impl RegionValue {
            pub fn kind(&self) -> &'static str {
                match self {
                    $(RegionValue::$variant(_) => stringify!($variant),)*
                }
            }
        }

        $(
            impl RegionType for $ty {
                fn into_value(self) -> RegionValue {
                    RegionValue::$variant(Arc::new(self))
                }

                fn from_value(value: RegionValue) -> Option<Arc<Self>> {
                    match value {
                        RegionValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

region_values! {
    Entities(Vec<KeyValues>),
    Planes(Vec<Plane>),
    TexData(Vec<TexData>),
    Vectors(Vec<Vector>),
    Visibility(Visibility),
    Nodes(Vec<Node>),
    TexInfo(Vec<TexInfo>),
    Faces(Vec<Face>),
    LightmapSamples(Vec<ColorRgbExp32>),
    Occlusion(Occlusion),
    Leafs(Leafs),
    U16s(Vec<u16>),
    I32s(Vec<i32>),
    Edges(Vec<Edge>),
    Models(Vec<Model>),
    WorldLights(WorldLights),
    Brushes(Vec<Brush>),
    BrushSides(Vec<BrushSide>),
    Areas(Vec<Area>),
    AreaPortals(Vec<AreaPortal>),
    DispInfo(Vec<DispInfo>),
    PhysDisp(PhysDisp),
    PhysCollide(Vec<PhysModel>),
    Bytes(Vec<u8>),
    DispVerts(Vec<DispVert>),
    GameLump(GameLump),
    LeafWaterData(Vec<LeafWaterData>),
    Primitives(Vec<Primitive>),
    Pakfile(Pakfile),
    Cubemaps(Vec<Cubemap>),
    Overlays(Vec<Overlay>),
    WaterOverlays(Vec<WaterOverlay>),
    LeafAmbientIndex(Vec<LeafAmbientIndex>),
    LeafAmbientLighting(Vec<LeafAmbientLighting>),
    OverlayFades(Vec<OverlayFade>),
    MapFlags(MapFlags),
}

impl fmt::Debug for RegionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegionValue::{}(..)", self.kind())
    }
}

enum Slot {
    Pending,
    Absent,
    Decoded(RegionValue),
    Failed(Error),
}

/// Observable state of one cache slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlotState {
    /// Not accessed yet
    Pending,
    /// Zero-length lump
    Absent,
    Decoded,
    /// The decode failed; the same error is returned on every access
    Failed,
}

/// One slot per directory entry. Every slot is resolved at most once per
/// session: to a value, to absent, or to the error its decode raised.
pub struct RegionCache {
    slots: Vec<Slot>,
}

impl RegionCache {
    pub fn new() -> Self {
        Self {
            slots: (0..HEADER_LUMPS).map(|_| Slot::Pending).collect(),
        }
    }

    pub fn state(&self, lump: LumpId) -> SlotState {
        match self.slots[lump.index()] {
            Slot::Pending => SlotState::Pending,
            Slot::Absent => SlotState::Absent,
            Slot::Decoded(_) => SlotState::Decoded,
            Slot::Failed(_) => SlotState::Failed,
        }
    }

    pub fn is_decoded(&self, lump: LumpId) -> bool {
        self.state(lump) == SlotState::Decoded
    }

    /// Return the memoized outcome, or run `decode` and memoize it.
    /// `Ok(None)` from `decode` marks the lump absent.
    pub fn get_or_try_insert_with<F>(&mut self, lump: LumpId, decode: F) -> Result<Option<RegionValue>>
    where
        F: FnOnce() -> Result<Option<RegionValue>>,
    {
        let slot = &mut self.slots[lump.index()];
        match slot {
            Slot::Decoded(value) => return Ok(Some(value.clone())),
            Slot::Absent => return Ok(None),
            Slot::Failed(err) => return Err(err.clone()),
            Slot::Pending => {}
        }

        let result = decode();
        *slot = match &result {
            Ok(Some(v)) => Slot::Decoded(v.clone()),
            Ok(None) => Slot::Absent,
            Err(err) => Slot::Failed(err.clone()),
        };
        result
    }

    /// Typed wrapper over [`get_or_try_insert_with`](Self::get_or_try_insert_with)
    pub fn decode<T, F>(&mut self, lump: LumpId, decode: F) -> Result<Option<Arc<T>>>
    where
        T: RegionType,
        F: FnOnce() -> Result<Option<T>>,
    {
        let value = self.get_or_try_insert_with(lump, || Ok(decode()?.map(T::into_value)))?;
        Ok(value.and_then(T::from_value))
    }
}

impl Default for RegionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoded: Vec<LumpId> = LumpId::ALL
            .iter()
            .copied()
            .filter(|&l| self.is_decoded(l))
            .collect();
        f.debug_struct("RegionCache").field("decoded", &decoded).finish()
    }
}
