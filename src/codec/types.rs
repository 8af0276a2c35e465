use std::io::{Read, Seek};

use serde::Serialize;

use super::BinaryReader;
use crate::error::Result;

/// 3D float vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    pub const SIZE: usize = 12;

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

/// Euler angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QAngle {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// Euler angles in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RadianEuler {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Row-major 3x4 affine matrix
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Matrix3x4(pub [[f32; 4]; 3]);

impl Matrix3x4 {
    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let mut m = [[0.0f32; 4]; 3];
        for row in m.iter_mut() {
            for v in row.iter_mut() {
                *v = reader.read_f32()?;
            }
        }
        Ok(Self(m))
    }
}

/// Shared-exponent RGB colour used by lightmaps and vertex lighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ColorRgbExp32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub exponent: i8,
}

impl ColorRgbExp32 {
    pub const SIZE: usize = 4;

    /// Linear light scaled to the 0..255 range the engine uses
    pub fn to_linear(self) -> Vector {
        let scale = 2f32.powi(self.exponent as i32);
        Vector::new(
            self.r as f32 * scale,
            self.g as f32 * scale,
            self.b as f32 * scale,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Ambient light from six axis directions (+X, -X, +Y, -Y, +Z, -Z)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompressedLightCube {
    pub colors: [ColorRgbExp32; 6],
}

impl CompressedLightCube {
    pub const SIZE: usize = 24;

    pub fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        let mut colors = [ColorRgbExp32::default(); 6];
        for c in colors.iter_mut() {
            *c = reader.read_color_rgb_exp32()?;
        }
        Ok(Self { colors })
    }
}

impl<R: Read + Seek> BinaryReader<R> {
    pub fn read_vector(&mut self) -> Result<Vector> {
        Ok(Vector {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
        })
    }

    pub fn read_vector2(&mut self) -> Result<Vector2> {
        Ok(Vector2 {
            x: self.read_f32()?,
            y: self.read_f32()?,
        })
    }

    pub fn read_qangle(&mut self) -> Result<QAngle> {
        Ok(QAngle {
            pitch: self.read_f32()?,
            yaw: self.read_f32()?,
            roll: self.read_f32()?,
        })
    }

    pub fn read_quaternion(&mut self) -> Result<Quaternion> {
        Ok(Quaternion {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
            w: self.read_f32()?,
        })
    }

    pub fn read_radian_euler(&mut self) -> Result<RadianEuler> {
        Ok(RadianEuler {
            x: self.read_f32()?,
            y: self.read_f32()?,
            z: self.read_f32()?,
        })
    }

    pub fn read_color_rgb_exp32(&mut self) -> Result<ColorRgbExp32> {
        Ok(ColorRgbExp32 {
            r: self.read_u8()?,
            g: self.read_u8()?,
            b: self.read_u8()?,
            exponent: self.read_i8()?,
        })
    }

    pub fn read_color32(&mut self) -> Result<Color32> {
        Ok(Color32 {
            r: self.read_u8()?,
            g: self.read_u8()?,
            b: self.read_u8()?,
            a: self.read_u8()?,
        })
    }
}
