//! Streams of variable-size records with no leading count

use std::io::{Read, Seek};

use super::header::RegionDescriptor;
use crate::codec::BinaryReader;
use crate::error::Result;

/// Read records from the start of `region` until a head matches
/// `is_sentinel` or the cursor reaches the region's last byte.
///
/// Each record is a head (read by `read_head`) followed by a body whose
/// shape the head describes (read by `read_body`). A sentinel head is not
/// emitted; the cursor is moved back to where it started.
pub fn decode_until_sentinel<R, H, T, FH, FS, FB>(
    reader: &mut BinaryReader<R>,
    region: &RegionDescriptor,
    mut read_head: FH,
    is_sentinel: FS,
    mut read_body: FB,
) -> Result<Vec<T>>
where
    R: Read + Seek,
    FH: FnMut(&mut BinaryReader<R>) -> Result<H>,
    FS: Fn(&H) -> bool,
    FB: FnMut(&mut BinaryReader<R>, H) -> Result<T>,
{
    reader.seek(region.offset as u64)?;
    let limit = region.end().saturating_sub(1);
    let mut records = Vec::new();

    loop {
        let head_start = reader.position()?;
        if head_start >= limit {
            break;
        }
        let head = read_head(reader)?;
        if is_sentinel(&head) {
            reader.seek(head_start)?;
            break;
        }
        records.push(read_body(reader, head)?);
    }

    Ok(records)
}
