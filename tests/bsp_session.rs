mod common;

use std::io::{Cursor, Write};
use std::sync::Arc;

use common::{le, planes, BspBuilder as Fixture, CountingReader};
use source_formats::bsp::bitpack::pack16;
use source_formats::bsp::{
    BspBuilder, BspFile, Diagnostic, FourCc, LumpId, ProducerVariant, SlotState, StaticProp,
};
use source_formats::Error;

fn open(data: Vec<u8>) -> BspFile<Cursor<Vec<u8>>> {
    BspFile::from_reader(Cursor::new(data)).unwrap()
}

#[test]
fn test_second_access_does_not_read() {
    let data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Planes, 0, planes(4))
        .build();
    let (source, reads) = CountingReader::new(Cursor::new(data));
    let mut bsp = BspFile::from_reader(source).unwrap();

    let before = reads.get();
    let first = bsp.planes().unwrap().unwrap();
    assert!(reads.get() > before);

    let after_first = reads.get();
    let second = bsp.planes().unwrap().unwrap();
    assert_eq!(reads.get(), after_first);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 4);
}

#[test]
fn test_empty_file_every_accessor_absent() {
    let mut bsp = open(Fixture::new(ProducerVariant::Standard).build());

    macro_rules! assert_absent {
        ($($accessor:ident)*) => {
            $(assert!(bsp.$accessor().unwrap().is_none(), stringify!($accessor));)*
        };
    }
    assert_absent! {
        entities planes tex_data vertexes visibility nodes tex_info faces lighting
        occlusion leafs face_ids edges surfedges models world_lights leaf_faces
        leaf_brushes brushes brush_sides areas area_portals disp_info original_faces
        phys_disp phys_collide vert_normals vert_normal_indices disp_lightmap_alphas
        disp_verts disp_lightmap_sample_positions game_lump leaf_water_data primitives
        prim_verts prim_indices pakfile clip_portal_verts cubemaps tex_data_string_data
        tex_data_string_table overlays leaf_min_dist_to_water face_macro_texture_info
        disp_tris prop_blob water_overlays leaf_ambient_index_hdr leaf_ambient_index
        lighting_hdr world_lights_hdr leaf_ambient_lighting_hdr leaf_ambient_lighting
        faces_hdr map_flags overlay_fades
    }
    for lump in LumpId::ALL {
        assert_eq!(bsp.slot_state(lump), SlotState::Absent);
    }
    assert!(bsp.diagnostics().is_empty());
    assert!(bsp.texture_names().unwrap().is_empty());
}

#[test]
fn test_wrong_magic_fails_at_open() {
    let mut data = Fixture::new(ProducerVariant::Standard).build();
    data[..4].copy_from_slice(b"VBSQ");
    let err = BspFile::from_reader(Cursor::new(data)).unwrap_err();
    assert_eq!(err, Error::InvalidMagic { found: *b"VBSQ", expected: *b"VBSP" });

    let err = BspFile::from_reader(Cursor::new(vec![0u8; 16])).unwrap_err();
    assert!(matches!(err, Error::InvalidMagic { .. }));
}

#[test]
fn test_truncated_header_fails_at_open() {
    let data = Fixture::new(ProducerVariant::Standard).build();
    let err = BspFile::from_reader(Cursor::new(data[..500].to_vec())).unwrap_err();
    assert_eq!(err, Error::UnexpectedEof);
}

#[test]
fn test_open_path() {
    let data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Planes, 0, planes(2))
        .build();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let mut bsp = BspFile::open(file.path()).unwrap();
    assert_eq!(bsp.header().version, 21);
    assert_eq!(bsp.header().map_revision, 3);
    assert_eq!(bsp.planes().unwrap().unwrap()[1].dist, 64.0);
}

#[test]
fn test_region_failure_is_isolated() {
    // 1.5 planes, and a leaf lump with a version nothing decodes
    let data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Planes, 0, planes(2)[..30].to_vec())
        .lump(LumpId::Leafs, 9, vec![0; 32])
        .lump(LumpId::Edges, 0, vec![1, 0, 2, 0])
        .build();
    let mut bsp = open(data);

    assert!(matches!(
        bsp.leafs(),
        Err(Error::UnsupportedRegionVersion { lump: LumpId::Leafs, version: 9, .. })
    ));
    assert_eq!(bsp.planes().unwrap().unwrap().len(), 1);
    assert_eq!(bsp.edges().unwrap().unwrap()[0].0, [1, 2]);

    assert_eq!(bsp.diagnostics().len(), 1);
    assert!(matches!(
        bsp.diagnostics()[0],
        Diagnostic::MalformedSizeHint { lump: LumpId::Planes, length: 30, record_size: 20, .. }
    ));
}

#[test]
fn test_l4d2_descriptor_order() {
    let data = Fixture::new(ProducerVariant::Left4Dead2)
        .lump(LumpId::Planes, 0, planes(3))
        .build();
    let mut bsp = BspBuilder::new()
        .variant(ProducerVariant::Left4Dead2)
        .from_reader(Cursor::new(data))
        .unwrap();
    assert_eq!(bsp.planes().unwrap().unwrap().len(), 3);
}

#[test]
fn test_leafs_bit_packed_area() {
    let mut w = le();
    w.write_u32(1);
    w.write_i16(7);
    w.write_u16(pack16(-3, 5));
    w.write_zeros(24);
    let mut bsp = open(
        Fixture::new(ProducerVariant::Standard)
            .lump(LumpId::Leafs, 1, w.into_vec())
            .build(),
    );
    let leafs = bsp.leafs().unwrap().unwrap();
    let leaf = leafs.get(0).unwrap();
    assert_eq!(leaf.cluster, 7);
    assert_eq!((leaf.area, leaf.flags), (-3, 5));
}

#[test]
fn test_visibility_sets() {
    let mut w = le();
    w.write_i32(2);
    for (pvs, pas) in [(20, 22), (21, 23)] {
        w.write_u32(pvs);
        w.write_u32(pas);
    }
    w.write_bytes(&[0b11, 0b10, 0b01, 0b11]);
    let data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Visibility, 0, w.into_vec())
        .build();

    let mut bsp = open(data.clone());
    let vis = bsp.visibility().unwrap().unwrap();
    assert!(vis.is_visible(0, 1));
    assert!(!vis.is_visible(1, 0));
    assert_eq!(vis.is_audible(0, 0), None);

    let mut bsp = BspBuilder::new()
        .decode_audible_sets(true)
        .from_reader(Cursor::new(data))
        .unwrap();
    let vis = bsp.visibility().unwrap().unwrap();
    assert_eq!(vis.is_audible(0, 1), Some(false));
    assert_eq!(vis.is_audible(1, 0), Some(true));
}

/// Static props v5 plus an unknown entry, at absolute offsets
fn game_lump_fixture() -> Vec<u8> {
    let fixture = Fixture::new(ProducerVariant::Standard);
    let base = fixture.next_offset();

    let mut sprp = le();
    sprp.write_i32(2);
    sprp.write_fixed_string("models/props/barrel.mdl", 128);
    sprp.write_fixed_string("models/props/crate.mdl", 128);
    sprp.write_i32(3);
    for leaf in [4u16, 5, 9] {
        sprp.write_u16(leaf);
    }
    sprp.write_i32(2);
    for (i, prop_type) in [1u16, 0].into_iter().enumerate() {
        sprp.write_f32(i as f32 * 10.0);
        sprp.write_f32(0.0);
        sprp.write_f32(0.0);
        sprp.write_zeros(12);
        sprp.write_u16(prop_type);
        sprp.write_u16(i as u16);
        sprp.write_u16(2);
        sprp.write_u8(6);
        sprp.write_u8(0);
        sprp.write_i32(i as i32);
        sprp.write_f32(0.0);
        sprp.write_f32(1000.0);
        sprp.write_zeros(12);
        sprp.write_f32(1.0);
    }
    let sprp = sprp.into_vec();
    let unknown = vec![0xAA; 12];

    let dir_size = 4 + 2 * 16;
    let mut w = le();
    w.write_i32(2);
    let mut offset = base + dir_size;
    for (code, version, data) in [(FourCc::STATIC_PROPS, 5u16, &sprp), (FourCc::from_bytes(*b"zzzz"), 1, &unknown)] {
        w.write_i32(code.0);
        w.write_u16(0);
        w.write_u16(version);
        w.write_i32(offset as i32);
        w.write_i32(data.len() as i32);
        offset += data.len();
    }
    w.write_bytes(&sprp);
    w.write_bytes(&unknown);

    fixture.lump(LumpId::GameLump, 0, w.into_vec()).build()
}

#[test]
fn test_game_lump_static_props() {
    let mut bsp = open(game_lump_fixture());
    let game_lump = bsp.game_lump().unwrap().unwrap();
    assert_eq!(game_lump.entries.len(), 2);

    let props = game_lump.static_props().unwrap();
    assert_eq!(props.props.len(), 2);
    assert!(matches!(props.props[0], StaticProp::V5(_)));
    assert_eq!(props.model_name(&props.props[0]), Some("models/props/crate.mdl"));
    assert_eq!(props.prop_leaves(&props.props[1]), &[5, 9]);
    assert_eq!(props.props[1].base().origin.x, 10.0);
    assert_eq!(props.props[1].forced_fade_scale(), Some(1.0));

    assert!(bsp
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::UnknownGameLump { version: 1, .. })));
}

#[test]
fn test_phys_collide_until_terminator() {
    let mut w = le();
    for model in 0..2 {
        let key = format!("solid {{\n\"index\" \"{model}\"\n\"mass\" \"10\"\n}}\n");
        w.write_i32(model);
        w.write_i32(8);
        w.write_i32(key.len() as i32 + 1);
        w.write_i32(1);
        w.write_i32(4);
        w.write_bytes(b"VPHY");
        w.write_cstring(&key);
    }
    w.write_i32(-1);
    w.write_i32(-1);
    w.write_i32(0);
    w.write_i32(0);

    let mut bsp = open(
        Fixture::new(ProducerVariant::Standard)
            .lump(LumpId::PhysCollide, 0, w.into_vec())
            .build(),
    );
    let models = bsp.phys_collide().unwrap().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[1].model_index, 1);
    assert_eq!(models[0].solids, [b"VPHY".to_vec()]);
    assert_eq!(models[1].key_sections()[0].get("index"), Some("1"));
}

#[test]
fn test_texture_names_and_checksum_are_stable() {
    let strings = b"dev/dev_measuregeneric01\0tools/toolsskybox\0".to_vec();
    let mut table = le();
    table.write_i32(0);
    table.write_i32(25);
    let data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Entities, 0, b"{\n\"classname\" \"worldspawn\"\n}\n\0".to_vec())
        .lump(LumpId::TexDataStringData, 0, strings)
        .lump(LumpId::TexDataStringTable, 0, table.into_vec())
        .build();

    let mut bsp = open(data);
    assert_eq!(bsp.texture_names().unwrap(), ["dev/dev_measuregeneric01", "tools/toolsskybox"]);
    let first = bsp.map_checksum().unwrap();
    assert_eq!(bsp.map_checksum().unwrap(), first);
    assert_eq!(bsp.entities().unwrap().unwrap()[0].classname(), Some("worldspawn"));
}

/// An unknown entry followed by static props pointing past the file end
fn truncated_game_lump_fixture() -> Vec<u8> {
    let fixture = Fixture::new(ProducerVariant::Standard).lump(LumpId::Planes, 0, planes(2));
    let base = fixture.next_offset();

    let mut w = le();
    w.write_i32(2);
    w.write_i32(FourCc::from_bytes(*b"zzzz").0);
    w.write_u16(0);
    w.write_u16(1);
    w.write_i32((base + 4 + 2 * 16) as i32);
    w.write_i32(8);
    w.write_i32(FourCc::STATIC_PROPS.0);
    w.write_u16(0);
    w.write_u16(6);
    w.write_i32(1_000_000);
    w.write_i32(64);
    w.write_zeros(8);

    fixture.lump(LumpId::GameLump, 0, w.into_vec()).build()
}

#[test]
fn test_truncated_region_ends_session() {
    let mut bsp = open(truncated_game_lump_fixture());

    assert_eq!(bsp.game_lump().unwrap_err(), Error::UnexpectedEof);
    assert_eq!(bsp.slot_state(LumpId::GameLump), SlotState::Failed);
    assert_eq!(bsp.poisoned(), Some(&Error::UnexpectedEof));

    // planes are intact on disk but the session no longer serves them
    assert_eq!(bsp.planes().unwrap_err(), Error::UnexpectedEof);
    assert_eq!(bsp.slot_state(LumpId::Planes), SlotState::Pending);
    assert_eq!(bsp.bytes(LumpId::Planes).unwrap_err(), Error::UnexpectedEof);
    assert_eq!(bsp.map_checksum().unwrap_err(), Error::UnexpectedEof);
}

#[test]
fn test_failed_region_is_not_decoded_again() {
    let (source, reads) = CountingReader::new(Cursor::new(truncated_game_lump_fixture()));
    let mut bsp = BspFile::from_reader(source).unwrap();

    assert_eq!(bsp.game_lump().unwrap_err(), Error::UnexpectedEof);
    let after_first = reads.get();
    let unknown = |bsp: &BspFile<_>| {
        bsp.diagnostics()
            .iter()
            .filter(|d| matches!(d, Diagnostic::UnknownGameLump { .. }))
            .count()
    };
    assert_eq!(unknown(&bsp), 1);

    for _ in 0..3 {
        assert_eq!(bsp.game_lump().unwrap_err(), Error::UnexpectedEof);
    }
    assert_eq!(reads.get(), after_first);
    assert_eq!(unknown(&bsp), 1);
    assert_eq!(bsp.diagnostics().len(), 1);
}

#[test]
fn test_lump_outside_source_ends_session() {
    let mut data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Planes, 0, planes(1))
        .lump(LumpId::Edges, 0, vec![1, 0, 2, 0])
        .build();
    let slot = 8 + LumpId::Edges.index() * 16;
    data[slot + 4..slot + 8].copy_from_slice(&100_000u32.to_le_bytes());
    let mut bsp = open(data);

    assert!(matches!(
        bsp.edges(),
        Err(Error::RegionOutOfBounds { index: 12, length: 100_000, .. })
    ));
    assert!(matches!(bsp.planes(), Err(Error::RegionOutOfBounds { index: 12, .. })));
    assert!(matches!(bsp.edges(), Err(Error::RegionOutOfBounds { .. })));
}

#[test]
fn test_scoped_failure_keeps_session() {
    let data = Fixture::new(ProducerVariant::Standard)
        .lump(LumpId::Planes, 0, planes(2))
        .lump(LumpId::Leafs, 9, vec![0; 32])
        .build();
    let (source, reads) = CountingReader::new(Cursor::new(data));
    let mut bsp = BspFile::from_reader(source).unwrap();

    let err = bsp.leafs().unwrap_err();
    assert!(matches!(err, Error::UnsupportedRegionVersion { version: 9, .. }));
    let after_first = reads.get();
    assert_eq!(bsp.leafs().unwrap_err(), err);
    assert_eq!(reads.get(), after_first);

    assert!(bsp.poisoned().is_none());
    assert_eq!(bsp.planes().unwrap().unwrap().len(), 2);
}
