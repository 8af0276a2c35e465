//! Fixed-stride lump decoding
//!
//! Most lumps are a bare array of equally sized records. The record count
//! is `length / record_size`; a remainder is tolerated (trailing bytes are
//! ignored) but reported as a [`Diagnostic::MalformedSizeHint`] naming the
//! closest sizes that would have divided the lump evenly.

use std::io::{Read, Seek};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::header::RegionDescriptor;
use crate::codec::{BinaryReader, ColorRgbExp32, Vector};
use crate::error::{Error, Result};

/// Furthest distance from the declared size searched for a better divisor
pub const DIVISOR_SEARCH_RANGE: usize = 99;

/// A record with a fixed on-disk size
pub trait Record: Sized {
    const SIZE: usize;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self>;
}

impl Record for u8 {
    const SIZE: usize = 1;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.read_u8()
    }
}

impl Record for u16 {
    const SIZE: usize = 2;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.read_u16()
    }
}

impl Record for u32 {
    const SIZE: usize = 4;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.read_u32()
    }
}

impl Record for i32 {
    const SIZE: usize = 4;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.read_i32()
    }
}

impl Record for Vector {
    const SIZE: usize = 12;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.read_vector()
    }
}

impl Record for ColorRgbExp32 {
    const SIZE: usize = 4;

    fn read<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Self> {
        reader.read_color_rgb_exp32()
    }
}

/// Nearest record sizes below and above `record_size` that divide `length`.
///
/// Smaller sizes are searched first, each direction stops at the first hit.
/// The search never goes below 1 and never further than
/// [`DIVISOR_SEARCH_RANGE`] from `record_size`.
pub fn nearest_divisors(length: usize, record_size: usize) -> (Option<usize>, Option<usize>) {
    let smaller = (1..=DIVISOR_SEARCH_RANGE)
        .map_while(|s| record_size.checked_sub(s).filter(|&c| c > 0))
        .find(|&c| length % c == 0);
    let larger = (1..=DIVISOR_SEARCH_RANGE)
        .map(|s| record_size + s)
        .find(|&c| length % c == 0);
    (smaller, larger)
}

/// Record count for a lump, reporting a diagnostic when the length has a
/// remainder. Never fails.
pub fn record_count(
    region: &RegionDescriptor,
    record_size: usize,
    diagnostics: &mut Diagnostics,
) -> usize {
    let length = region.length as usize;
    if length % record_size != 0 {
        let (smaller, larger) = nearest_divisors(length, record_size);
        diagnostics.push(Diagnostic::MalformedSizeHint {
            lump: region.lump(),
            version: region.version,
            length: region.length,
            record_size,
            smaller,
            larger,
        });
    }
    length / record_size
}

/// Decode `length / record_size` records starting at the region offset.
pub fn decode_array<R, T, F>(
    reader: &mut BinaryReader<R>,
    region: &RegionDescriptor,
    record_size: usize,
    diagnostics: &mut Diagnostics,
    mut read_record: F,
) -> Result<Vec<T>>
where
    R: Read + Seek,
    F: FnMut(&mut BinaryReader<R>) -> Result<T>,
{
    let count = record_count(region, record_size, diagnostics);
    reader.seek(region.offset as u64)?;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(read_record(reader)?);
    }
    Ok(records)
}

/// Read the `i32` element count that prefixes a variable-length table.
/// Negative counts are malformed; counts whose `count * elem_size` bytes run
/// past the source end are truncation.
pub fn read_count<R: Read + Seek>(reader: &mut BinaryReader<R>, elem_size: usize) -> Result<usize> {
    let count = reader.read_i32()?;
    let count = usize::try_from(count)
        .map_err(|_| Error::InvalidFormat(format!("negative element count {count}")))?;
    if (count as u64).saturating_mul(elem_size as u64) > reader.remaining()? {
        return Err(Error::UnexpectedEof);
    }
    Ok(count)
}

/// [`decode_array`] for a [`Record`] type
pub fn decode_records<R, T>(
    reader: &mut BinaryReader<R>,
    region: &RegionDescriptor,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<T>>
where
    R: Read + Seek,
    T: Record,
{
    decode_array(reader, region, T::SIZE, diagnostics, T::read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsp::LumpId;
    use crate::codec::Endian;

    fn region(length: u32) -> RegionDescriptor {
        RegionDescriptor {
            index: LumpId::Edges as u8,
            offset: 4,
            length,
            version: 0,
            uncompressed_size: 0,
        }
    }

    #[test]
    fn test_nearest_divisors() {
        assert_eq!(nearest_divisors(100, 8), (Some(5), Some(10)));
        assert_eq!(nearest_divisors(97, 8), (Some(1), Some(97)));
        // prime beyond the search window above, only 1 below
        assert_eq!(nearest_divisors(211, 8), (Some(1), None));
        assert_eq!(nearest_divisors(7, 1), (None, Some(7)));
    }

    #[test]
    fn test_remainder_reports_once() {
        let data: Vec<u8> = (0..104).map(|i| i as u8).collect();
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        let mut diags = Diagnostics::new();

        let records = decode_array(&mut reader, &region(100), 8, &mut diags, |r| r.read_u64()).unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records[0], u64::from_le_bytes([4, 5, 6, 7, 8, 9, 10, 11]));
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags.as_slice()[0],
            Diagnostic::MalformedSizeHint {
                lump: LumpId::Edges,
                version: 0,
                length: 100,
                record_size: 8,
                smaller: Some(5),
                larger: Some(10),
            }
        );
    }

    #[test]
    fn test_exact_multiple_is_silent() {
        let data = vec![0u8; 100];
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        let mut diags = Diagnostics::new();

        let records = decode_array(&mut reader, &region(96), 8, &mut diags, |r| r.read_u64()).unwrap();
        assert_eq!(records.len(), 12);
        assert!(diags.is_empty());
        assert_eq!(reader.position().unwrap(), 100);
    }

    #[test]
    fn test_record_larger_than_lump() {
        let data = vec![0u8; 16];
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        let mut diags = Diagnostics::new();

        let records: Vec<Vector> = decode_records(&mut reader, &region(10), &mut diags).unwrap();
        assert!(records.is_empty());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_truncated_source() {
        let data = vec![0u8; 20];
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        let mut diags = Diagnostics::new();

        let result: Result<Vec<u32>> = decode_records(&mut reader, &region(40), &mut diags);
        assert_eq!(result, Err(Error::UnexpectedEof));
    }

    #[test]
    fn test_read_count() {
        let mut data = 2i32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0u8; 8]);
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        assert_eq!(read_count(&mut reader, 4).unwrap(), 2);
        assert_eq!(reader.position().unwrap(), 4);

        reader.seek(0).unwrap();
        assert_eq!(read_count(&mut reader, 5), Err(Error::UnexpectedEof));

        let data = (-1i32).to_le_bytes();
        let mut reader = BinaryReader::from_bytes(&data, Endian::Little);
        assert!(matches!(read_count(&mut reader, 1), Err(Error::InvalidFormat(_))));
    }
}
