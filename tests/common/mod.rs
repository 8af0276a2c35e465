#![allow(dead_code)]

use std::cell::Cell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use source_formats::bsp::{LumpId, ProducerVariant, RegionDescriptor, HEADER_LUMPS, IDBSPHEADER};
use source_formats::codec::{BinaryWriter, Endian};

/// Builds a BSP file lump by lump. Lumps are laid out after the header in
/// the order they are added.
pub struct BspBuilder {
    variant: ProducerVariant,
    lumps: Vec<(LumpId, i32, Vec<u8>)>,
}

impl BspBuilder {
    pub fn new(variant: ProducerVariant) -> Self {
        Self {
            variant,
            lumps: Vec::new(),
        }
    }

    pub fn lump(mut self, lump: LumpId, version: i32, data: Vec<u8>) -> Self {
        self.lumps.push((lump, version, data));
        self
    }

    pub fn writer(&self) -> BinaryWriter {
        BinaryWriter::new(self.variant.endian())
    }

    /// Offset the next added lump will land at
    pub fn next_offset(&self) -> usize {
        source_formats::bsp::header::HEADER_SIZE + self.lumps.iter().map(|(_, _, d)| d.len()).sum::<usize>()
    }

    pub fn build(self) -> Vec<u8> {
        let mut w = BinaryWriter::new(self.variant.endian());
        w.write_u32(IDBSPHEADER);
        w.write_i32(21);
        let dir = w.len();
        w.write_zeros(HEADER_LUMPS * RegionDescriptor::SIZE);
        w.write_i32(3);

        let version_first = self.variant == ProducerVariant::Left4Dead2;
        for (lump, version, data) in &self.lumps {
            let offset = w.len() as u32;
            w.write_bytes(data);
            let slot = dir + lump.index() * RegionDescriptor::SIZE;
            let fields = if version_first {
                [*version as u32, offset, data.len() as u32]
            } else {
                [offset, data.len() as u32, *version as u32]
            };
            for (i, v) in fields.into_iter().enumerate() {
                w.patch_u32(slot + i * 4, v);
            }
        }
        w.into_vec()
    }
}

pub fn le() -> BinaryWriter {
    BinaryWriter::new(Endian::Little)
}

/// Counts every `read` call that reaches the wrapped source
pub struct CountingReader<R> {
    inner: R,
    reads: Rc<Cell<usize>>,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> (Self, Rc<Cell<usize>>) {
        let reads = Rc::new(Cell::new(0));
        (
            Self {
                inner,
                reads: Rc::clone(&reads),
            },
            reads,
        )
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for CountingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Plane records: normal +Z, distance `i * 64`, type 2
pub fn planes(count: usize) -> Vec<u8> {
    let mut w = le();
    for i in 0..count {
        w.write_f32(0.0);
        w.write_f32(0.0);
        w.write_f32(1.0);
        w.write_f32(i as f32 * 64.0);
        w.write_i32(2);
    }
    w.into_vec()
}
