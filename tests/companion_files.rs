use std::io::Write;

use source_formats::codec::{BinaryWriter, Endian};
use source_formats::mdl::HEADER_SIZE;
use source_formats::vhv::{VertexFlags, VHV_VERSION};
use source_formats::{Error, MdlFile, VhvFile};

fn write_temp(suffix: &str, data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_vhv_from_path() {
    let mut w = BinaryWriter::new(Endian::Little);
    w.write_i32(VHV_VERSION);
    w.write_u32(77);
    w.write_u32(VertexFlags::COLOR.bits());
    w.write_u32(4);
    w.write_u32(1);
    w.write_i32(1);
    w.write_zeros(16);
    w.write_u32(0);
    w.write_u32(1);
    w.write_u32(68);
    w.write_zeros(16);
    w.write_bytes(&[30, 20, 10, 255]);

    let file = write_temp(".vhv", &w.into_vec());
    let vhv = VhvFile::open(file.path()).unwrap();
    assert_eq!(vhv.header.checksum, 77);
    let color = vhv.colors().next().unwrap();
    assert_eq!((color.r, color.g, color.b, color.a), (10, 20, 30, 255));
}

#[test]
fn test_ps3_model_by_name() {
    let mut w = BinaryWriter::new(Endian::Big);
    w.write_bytes(b"IDST");
    w.write_zeros(HEADER_SIZE - 4);

    let file = write_temp(".ps3.mdl", &w.into_vec());
    assert!(matches!(MdlFile::open(file.path()), Err(Error::NotImplemented(_))));
}

#[test]
fn test_missing_file() {
    assert!(matches!(VhvFile::open("/nonexistent/sp_0.vhv"), Err(Error::Io(_))));
}
