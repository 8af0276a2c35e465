//! Lump indices of the BSP directory

use serde::Serialize;

/// Number of lump slots in every BSP header
pub const HEADER_LUMPS: usize = 64;

macro_rules! lump_ids {
    ($($name:ident = $index:literal,)*) => {
        /// Position of a lump in the 64-entry directory
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[repr(u8)]
        pub enum LumpId {
            $($name = $index,)*
        }

        impl LumpId {
            pub const ALL: [LumpId; HEADER_LUMPS] = [$(LumpId::$name,)*];

            pub fn from_index(index: u8) -> Option<Self> {
                match index {
                    $($index => Some(LumpId::$name),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(LumpId::$name => stringify!($name),)*
                }
            }
        }
    };
}

lump_ids! {
    Entities = 0,
    Planes = 1,
    TexData = 2,
    Vertexes = 3,
    Visibility = 4,
    Nodes = 5,
    TexInfo = 6,
    Faces = 7,
    Lighting = 8,
    Occlusion = 9,
    Leafs = 10,
    FaceIds = 11,
    Edges = 12,
    Surfedges = 13,
    Models = 14,
    WorldLights = 15,
    LeafFaces = 16,
    LeafBrushes = 17,
    Brushes = 18,
    BrushSides = 19,
    Areas = 20,
    AreaPortals = 21,
    PropCollision = 22,
    PropHulls = 23,
    PropHullVerts = 24,
    PropTris = 25,
    DispInfo = 26,
    OriginalFaces = 27,
    PhysDisp = 28,
    PhysCollide = 29,
    VertNormals = 30,
    VertNormalIndices = 31,
    DispLightmapAlphas = 32,
    DispVerts = 33,
    DispLightmapSamplePositions = 34,
    GameLump = 35,
    LeafWaterData = 36,
    Primitives = 37,
    PrimVerts = 38,
    PrimIndices = 39,
    Pakfile = 40,
    ClipPortalVerts = 41,
    Cubemaps = 42,
    TexDataStringData = 43,
    TexDataStringTable = 44,
    Overlays = 45,
    LeafMinDistToWater = 46,
    FaceMacroTextureInfo = 47,
    DispTris = 48,
    PropBlob = 49,
    WaterOverlays = 50,
    LeafAmbientIndexHdr = 51,
    LeafAmbientIndex = 52,
    LightingHdr = 53,
    WorldLightsHdr = 54,
    LeafAmbientLightingHdr = 55,
    LeafAmbientLighting = 56,
    XZipPakfile = 57,
    FacesHdr = 58,
    MapFlags = 59,
    OverlayFades = 60,
    OverlaySystemLevels = 61,
    PhysLevel = 62,
    DispMultiBlend = 63,
}

impl LumpId {
    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_in_index_order() {
        for (i, lump) in LumpId::ALL.iter().enumerate() {
            assert_eq!(lump.index(), i);
            assert_eq!(LumpId::from_index(i as u8), Some(*lump));
        }
        assert_eq!(LumpId::from_index(64), None);
        assert_eq!(LumpId::GameLump.name(), "GameLump");
    }
}
