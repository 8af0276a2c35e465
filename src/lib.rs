//! Source engine file formats
//!
//! Lazy, cached decoding of compiled BSP maps, plus the static prop
//! lighting (`.vhv`) and studio model (`.mdl`) headers that ship with them.

pub mod codec;
pub mod error;
pub mod bsp;
pub mod vhv;
pub mod mdl;

pub use error::{Error, Result};
pub use codec::{
    BinaryReader, BinaryWriter, Endian,
    Vector, QAngle, ColorRgbExp32, Color32,
};
pub use bsp::{
    BspFile, BspBuilder, BspConfig,
    LumpId, ProducerVariant, FileHeader, RegionDescriptor,
    Diagnostic, SlotState,
};
pub use vhv::VhvFile;
pub use mdl::MdlFile;
pub use source_kv::KeyValues;
