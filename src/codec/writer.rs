use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};

use super::reader::Endian;

macro_rules! write_endian {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, v: $ty) {
            // writes into a Vec cannot fail
            let _ = match self.endian {
                Endian::Little => self.data.$name::<LittleEndian>(v),
                Endian::Big => self.data.$name::<BigEndian>(v),
            };
        }
    };
}

/// Binary writer producing Source format byte streams (used to build fixtures)
pub struct BinaryWriter {
    data: Vec<u8>,
    endian: Endian,
}

impl BinaryWriter {
    pub fn new(endian: Endian) -> Self {
        Self { data: Vec::new(), endian }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, n: usize) {
        self.data.resize(self.data.len() + n, 0);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    write_endian!(write_u16, u16);
    write_endian!(write_i16, i16);
    write_endian!(write_u32, u32);
    write_endian!(write_i32, i32);
    write_endian!(write_f32, f32);

    /// Write `s` into a zero-padded slot of `size` bytes (truncating if needed)
    pub fn write_fixed_string(&mut self, s: &str, size: usize) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(size.saturating_sub(1));
        self.write_bytes(&bytes[..n]);
        self.write_zeros(size - n);
    }

    pub fn write_cstring(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_u8(0);
    }

    /// Overwrite a previously written u32 (directory back-patching)
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        let slot = &mut self.data[pos..pos + 4];
        match self.endian {
            Endian::Little => LittleEndian::write_u32(slot, v),
            Endian::Big => BigEndian::write_u32(slot, v),
        }
    }

    pub fn patch_i32(&mut self, pos: usize, v: i32) {
        self.patch_u32(pos, v as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryReader;

    #[test]
    fn test_write_both_orders() {
        let mut le = BinaryWriter::new(Endian::Little);
        le.write_u32(0x01020304);
        assert_eq!(le.as_slice(), &[0x04, 0x03, 0x02, 0x01]);

        let mut be = BinaryWriter::new(Endian::Big);
        be.write_u32(0x01020304);
        assert_eq!(be.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_patch() {
        let mut w = BinaryWriter::new(Endian::Big);
        w.write_u32(0);
        w.write_u16(7);
        w.patch_i32(0, -2);

        let data = w.into_vec();
        let mut reader = BinaryReader::from_bytes(&data, Endian::Big);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_u16().unwrap(), 7);
    }

    #[test]
    fn test_fixed_string() {
        let mut w = BinaryWriter::new(Endian::Little);
        w.write_fixed_string("models/props/crate.mdl", 128);
        assert_eq!(w.len(), 128);
        assert_eq!(w.as_slice()[22], 0);
    }
}
