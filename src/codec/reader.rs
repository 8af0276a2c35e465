use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// Byte order applied to every multi-byte read of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

macro_rules! read_endian {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let v = match self.endian {
                Endian::Little => self.inner.$name::<LittleEndian>()?,
                Endian::Big => self.inner.$name::<BigEndian>()?,
            };
            Ok(v)
        }
    };
}

/// Seekable binary reader over a Source format byte stream
pub struct BinaryReader<R> {
    inner: R,
    endian: Endian,
    len: u64,
}

impl<'a> BinaryReader<Cursor<&'a [u8]>> {
    pub fn from_bytes(data: &'a [u8], endian: Endian) -> Self {
        Self {
            inner: Cursor::new(data),
            endian,
            len: data.len() as u64,
        }
    }
}

impl<R: Read + Seek> BinaryReader<R> {
    pub fn new(mut inner: R, endian: Endian) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, endian, len })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Total length of the underlying source
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn remaining(&mut self) -> Result<u64> {
        Ok(self.len.saturating_sub(self.position()?))
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        if self.remaining()? < n {
            return Err(Error::UnexpectedEof);
        }
        self.inner.seek(SeekFrom::Current(n as i64))?;
        Ok(())
    }

    /// Read a raw block. Never byte-swapped.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.remaining()? < n as u64 {
            return Err(Error::UnexpectedEof);
        }
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.inner.read_u8()?)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.inner.read_i8()?)
    }

    read_endian!(read_u16, u16);
    read_endian!(read_i16, i16);
    read_endian!(read_u32, u32);
    read_endian!(read_i32, i32);
    read_endian!(read_u64, u64);
    read_endian!(read_i64, i64);
    read_endian!(read_f32, f32);

    pub fn read_i32_array<const N: usize>(&mut self) -> Result<[i32; N]> {
        let mut out = [0i32; N];
        for v in out.iter_mut() {
            *v = self.read_i32()?;
        }
        Ok(out)
    }

    pub fn read_u32_array<const N: usize>(&mut self) -> Result<[u32; N]> {
        let mut out = [0u32; N];
        for v in out.iter_mut() {
            *v = self.read_u32()?;
        }
        Ok(out)
    }

    /// Read a null-terminated string stored in a fixed-size slot.
    /// Always consumes `size` bytes.
    pub fn read_fixed_string(&mut self, size: usize) -> Result<String> {
        let bytes = self.read_bytes(size)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read bytes up to and including a null terminator
    pub fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
