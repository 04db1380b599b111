use std::fs;
use std::io::Cursor;

use map_features::CodecError;
use map_features::classify::RenderCategory;
use map_features::container::{
    DecodedTile, DirectoryEntry, EncodeOptions, TileFileReader, encode_tiles, verify_map_file,
};
use map_features::dataset::MapData;
use map_features::model::{Coordinate, GeometryKind, RawNode, RawWay, SourceBlock, Tag, TileId};

fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn node(id: i64, lat: f64, lon: f64, pairs: &[(&str, &str)]) -> RawNode {
    RawNode {
        id,
        lat,
        lon,
        tags: tags(pairs),
    }
}

fn way(id: i64, nodes: &[i64], pairs: &[(&str, &str)]) -> RawWay {
    RawWay {
        id,
        nodes: nodes.to_vec(),
        tags: tags(pairs),
    }
}

fn by_hemisphere(coordinate: Coordinate) -> TileId {
    if coordinate.longitude < 0.0 { 1 } else { 2 }
}

fn sample_data() -> MapData {
    MapData::from_blocks(vec![
        SourceBlock {
            nodes: vec![
                node(1, 52.0, 13.0, &[]),
                node(2, 52.1, 13.1, &[("crossing", "zebra")]),
                node(3, 52.2, 13.2, &[("place", "town"), ("name", "Ort")]),
            ],
            ways: vec![way(
                10,
                &[1, 2],
                &[
                    ("highway", "primary"),
                    ("name", "Hauptstraße"),
                    ("natural", "water"),
                ],
            )],
        },
        SourceBlock {
            nodes: vec![
                node(4, 40.0, -74.0, &[]),
                node(5, 40.1, -74.1, &[]),
                node(6, 40.2, -74.2, &[]),
            ],
            ways: vec![way(
                11,
                &[4, 5, 6, 4],
                &[("leisure", "park"), ("name", "Central Park")],
            )],
        },
    ])
}

fn encode(data: &MapData, scheme: fn(Coordinate) -> TileId) -> Vec<u8> {
    let index = data.partition(&scheme).expect("partition");
    let (cursor, _) = encode_tiles(
        Cursor::new(Vec::new()),
        data,
        &index,
        &EncodeOptions { no_progress: true },
    )
    .expect("encode");
    cursor.into_inner()
}

fn read(bytes: Vec<u8>, tile_id: TileId) -> DecodedTile {
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    reader.read_tile(tile_id).expect("read").expect("tile present")
}

#[test]
fn roundtrip_preserves_features_exactly() {
    let data = sample_data();
    let bytes = encode(&data, by_hemisphere);
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    assert_eq!(reader.header().version, 1);
    assert_eq!(reader.tile_ids().collect::<Vec<_>>(), vec![1, 2]);

    let west = reader.read_tile(1).expect("read").expect("tile 1");
    assert_eq!(west.features.len(), 1);
    let park = &west.features[0];
    assert_eq!(park.id, 11);
    assert_eq!(park.geometry, GeometryKind::Polygon);
    assert_eq!(park.category, RenderCategory::GeofeatureResidential);
    assert_eq!(
        park.coordinates,
        vec![
            Coordinate::new(40.0, -74.0),
            Coordinate::new(40.1, -74.1),
            Coordinate::new(40.2, -74.2),
            Coordinate::new(40.0, -74.0),
        ]
    );
    assert_eq!(park.properties, tags(&[("name", "Central Park")]));
    assert_eq!(park.label.as_deref(), Some("Central Park"));

    let east = reader.read_tile(2).expect("read").expect("tile 2");
    let ids: Vec<i64> = east.features.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![10, 3]);

    let road = &east.features[0];
    assert_eq!(road.geometry, GeometryKind::Polyline);
    assert_eq!(road.category, RenderCategory::Road);
    assert_eq!(
        road.coordinates,
        vec![Coordinate::new(52.0, 13.0), Coordinate::new(52.1, 13.1)]
    );
    assert_eq!(
        road.properties,
        tags(&[
            ("name", "Hauptstraße"),
            ("natural", "water"),
            ("crossing", "zebra"),
        ])
    );
    assert_eq!(road.label.as_deref(), Some("Hauptstraße"));

    let town = &east.features[1];
    assert_eq!(town.geometry, GeometryKind::Point);
    assert_eq!(town.category, RenderCategory::PopulatedPlace);
    assert_eq!(town.coordinates, vec![Coordinate::new(52.2, 13.2)]);
    assert_eq!(town.properties, tags(&[("name", "Ort")]));

    assert!(reader.read_tile(3).expect("read").is_none());
}

#[test]
fn label_indices_point_at_name_value_descriptors() {
    let bytes = encode(&sample_data(), by_hemisphere);
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    let entry = reader.entry(2).expect("entry");
    let (header, records) = reader.read_feature_records(entry).expect("records");

    assert_eq!(header.descriptor_count, 8);
    assert_eq!(records[0].label, Some(1));
    assert_eq!(records[0].descriptor_start, 0);
    assert_eq!(records[0].property_count, 3);
    // Three pairs precede the town's properties.
    assert_eq!(records[1].label, Some(7));
    assert_eq!(records[1].descriptor_start, 6);
    assert_eq!(records[1].coordinate_start, 2);
}

#[test]
fn features_without_name_have_no_label() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![node(1, 1.0, 1.0, &[("amenity", "cafe"), ("Name", "Upper")])],
        ways: vec![],
    }]);
    let bytes = encode(&data, |_| 0);
    // Label is the i32 right after the feature id.
    let label_at = (12 + 12 + 40 + 8) as usize;
    assert_eq!(
        i32::from_le_bytes(bytes[label_at..label_at + 4].try_into().expect("label bytes")),
        -1
    );

    let tile = read(bytes, 0);
    assert_eq!(tile.features[0].label, None);
    assert_eq!(tile.features[0].properties, tags(&[("Name", "Upper")]));
}

#[test]
fn unused_nodes_become_points() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 0.0, 1.0, &[]),
            node(3, 1.0, 1.0, &[]),
        ],
        ways: vec![way(7, &[1, 2], &[])],
    }]);
    let tile = read(encode(&data, |_| 5), 5);

    assert_eq!(tile.features.len(), 2);
    assert_eq!(tile.features[0].id, 7);
    assert_eq!(tile.features[0].geometry, GeometryKind::Polyline);
    assert_eq!(tile.features[0].category, RenderCategory::Unknown);
    assert_eq!(tile.features[1].id, 3);
    assert_eq!(tile.features[1].geometry, GeometryKind::Point);
    assert!(tile.features[1].properties.is_empty());
}

#[test]
fn orphan_points_follow_ascending_node_id() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![
            node(30, 2.0, 2.0, &[("name", "C")]),
            node(10, 0.5, 0.5, &[("amenity", "cafe"), ("name", "A")]),
            node(1, 0.0, 0.0, &[]),
            node(20, 1.0, 1.0, &[("note", "x"), ("name", "B")]),
            node(2, 0.0, 1.0, &[]),
        ],
        ways: vec![way(5, &[1, 2], &[("name", "W")])],
    }]);
    let bytes = encode(&data, |_| 0);
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    let entry = reader.entry(0).expect("entry");
    let (header, records) = reader.read_feature_records(entry).expect("records");

    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![5, 10, 20, 30]);
    let descriptor_starts: Vec<u32> = records.iter().map(|r| r.descriptor_start).collect();
    assert_eq!(descriptor_starts, vec![0, 2, 4, 8]);
    let coordinate_starts: Vec<u32> = records.iter().map(|r| r.coordinate_start).collect();
    assert_eq!(coordinate_starts, vec![0, 2, 3, 4]);
    let labels: Vec<Option<u32>> = records.iter().map(|r| r.label).collect();
    assert_eq!(labels, vec![Some(1), Some(3), Some(7), Some(9)]);
    assert_eq!(header.descriptor_count, 10);

    let tile = reader.read_tile_at(entry).expect("tile");
    let names: Vec<Option<&str>> = tile.features.iter().map(|f| f.label.as_deref()).collect();
    assert_eq!(names, vec![Some("W"), Some("A"), Some("B"), Some("C")]);
    assert_eq!(tile.features[1].category, RenderCategory::GeofeatureResidential);
    assert_eq!(tile.features[2].properties, tags(&[("note", "x"), ("name", "B")]));
}

#[test]
fn nodes_used_by_a_way_elsewhere_are_not_points() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![node(1, 0.0, -1.0, &[]), node(2, 0.0, 1.0, &[("barrier", "gate")])],
        ways: vec![way(7, &[1, 2], &[("railway", "rail")])],
    }]);
    let bytes = encode(&data, by_hemisphere);
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");

    let west = reader.read_tile(1).expect("read").expect("tile 1");
    assert_eq!(west.features.len(), 1);
    assert_eq!(west.features[0].properties, tags(&[("barrier", "gate")]));
    // Node 2 lives in tile 2 but belongs to the way, so tile 2 is empty.
    let east = reader.read_tile(2).expect("read").expect("tile 2");
    assert!(east.features.is_empty());
}

#[test]
fn closed_ways_are_polygons() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 0.0, 1.0, &[]),
            node(3, 1.0, 1.0, &[]),
            node(4, 0.0, 0.0, &[]),
        ],
        ways: vec![
            way(20, &[1, 2, 3, 1], &[("landuse", "forest")]),
            way(21, &[1, 2], &[]),
            // Distinct node ids at identical coordinates still close the ring.
            way(22, &[1, 2, 3, 4], &[]),
            way(23, &[1], &[]),
        ],
    }]);
    let tile = read(encode(&data, |_| 0), 0);
    let kinds: Vec<GeometryKind> = tile.features.iter().map(|f| f.geometry).collect();
    assert_eq!(
        kinds,
        vec![
            GeometryKind::Polygon,
            GeometryKind::Polyline,
            GeometryKind::Polygon,
            GeometryKind::Polygon,
        ]
    );
    assert_eq!(tile.features[0].category, RenderCategory::GeofeatureForest);
}

#[test]
fn directory_entries_point_at_tile_blocks() {
    let data = sample_data();
    let bytes = encode(&data, by_hemisphere);
    let len = bytes.len() as u64;
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    assert_eq!(reader.file_len(), len);

    let entries = reader.directory().to_vec();
    assert_eq!(entries.len(), 2);
    let mut previous = 0;
    for entry in entries {
        assert!(entry.offset >= 12 + 2 * 12);
        assert!(entry.offset > previous);
        previous = entry.offset;
        let (header, records) = reader.read_feature_records(entry).expect("records");
        assert_eq!(header.feature_count as usize, records.len());
        assert!(header.coordinates_offset > entry.offset);
        assert!(header.descriptors_offset >= header.coordinates_offset);
        assert!(header.characters_offset >= header.descriptors_offset);
        let tile = reader.read_tile_at(entry).expect("tile");
        assert_eq!(tile.features.len(), records.len());
    }
}

#[test]
fn character_table_counts_utf16_units() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![node(1, 0.0, 0.0, &[("name", "🗺"), ("note", "é")])],
        ways: vec![],
    }]);
    let bytes = encode(&data, |_| 0);
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    let header = reader.read_block_header(24).expect("header");
    // "name" 4 + map emoji 2 + "note" 4 + "é" 1
    assert_eq!(header.character_count, 11);

    let tile = reader.read_tile(0).expect("read").expect("tile");
    assert_eq!(tile.features[0].label.as_deref(), Some("🗺"));
    assert_eq!(tile.features[0].properties[1], ("note".to_string(), "é".to_string()));
}

#[test]
fn empty_dataset_writes_header_only() {
    let bytes = encode(&MapData::default(), |_| 0);
    assert_eq!(bytes.len(), 12);
    let reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    assert_eq!(reader.header().tile_count, 0);
}

/// One tile (id 7) with one point feature carrying `name=vv`.
fn hand_built_file() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&1u64.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&7u32.to_le_bytes());
    buf.extend_from_slice(&24u64.to_le_bytes());

    // block header
    for value in [1u32, 1, 2, 6] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    for value in [94u64, 110, 126] {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    // feature record
    buf.extend_from_slice(&99i64.to_le_bytes());
    buf.extend_from_slice(&1i32.to_le_bytes());
    buf.push(0);
    buf.push(3);
    for value in [0u32, 1, 0, 1] {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    buf.extend_from_slice(&1.5f64.to_le_bytes());
    buf.extend_from_slice(&2.5f64.to_le_bytes());

    for value in [0u32, 4, 4, 2] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    for unit in "namevv".encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
    assert_eq!(buf.len(), 138);
    buf
}

#[test]
fn decodes_hand_built_file() {
    let tile = read(hand_built_file(), 7);
    assert_eq!(tile.tile_id, 7);
    assert_eq!(tile.features.len(), 1);
    let feature = &tile.features[0];
    assert_eq!(feature.id, 99);
    assert_eq!(feature.geometry, GeometryKind::Point);
    assert_eq!(feature.category, RenderCategory::PopulatedPlace);
    assert_eq!(feature.coordinates, vec![Coordinate::new(1.5, 2.5)]);
    assert_eq!(feature.properties, tags(&[("name", "vv")]));
    assert_eq!(feature.label.as_deref(), Some("vv"));
}

#[test]
fn encoder_matches_hand_built_layout() {
    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![node(99, 1.5, 2.5, &[("place", "city"), ("name", "vv")])],
        ways: vec![],
    }]);
    assert_eq!(encode(&data, |_| 7), hand_built_file());
}

#[test]
fn directory_entries_use_their_wire_encoding() {
    let bytes = hand_built_file();
    let mut expected = Vec::new();
    DirectoryEntry {
        tile_id: 7,
        offset: 24,
    }
    .encode(&mut expected);
    assert_eq!(&bytes[12..24], expected.as_slice());

    let data = MapData::from_blocks(vec![SourceBlock {
        nodes: vec![node(99, 1.5, 2.5, &[("place", "city"), ("name", "vv")])],
        ways: vec![],
    }]);
    let encoded = encode(&data, |_| 7);
    assert_eq!(&encoded[12..24], expected.as_slice());
    let mut cursor = &encoded[12..24];
    assert_eq!(
        DirectoryEntry::decode(&mut cursor).expect("entry"),
        DirectoryEntry {
            tile_id: 7,
            offset: 24
        }
    );
}

#[test]
fn zero_character_count_falls_back_to_descriptors() {
    let mut bytes = hand_built_file();
    bytes[36..40].copy_from_slice(&0u32.to_le_bytes());
    let tile = read(bytes, 7);
    assert_eq!(tile.features[0].properties, tags(&[("name", "vv")]));
}

fn corrupt_error(bytes: Vec<u8>) -> anyhow::Error {
    let mut reader = TileFileReader::from_reader(Cursor::new(bytes)).expect("reader");
    reader.read_tile(7).expect_err("corrupt tile")
}

fn is_corrupt(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<CodecError>(), Some(CodecError::Corrupt(_)))
}

#[test]
fn unknown_geometry_byte_is_corrupt() {
    let mut bytes = hand_built_file();
    bytes[24 + 40 + 12] = 9;
    assert!(is_corrupt(&corrupt_error(bytes)));
}

#[test]
fn unknown_category_byte_is_corrupt() {
    let mut bytes = hand_built_file();
    bytes[24 + 40 + 13] = 12;
    assert!(is_corrupt(&corrupt_error(bytes)));
}

#[test]
fn label_outside_descriptor_table_is_corrupt() {
    let mut bytes = hand_built_file();
    bytes[24 + 40 + 8..24 + 40 + 12].copy_from_slice(&5i32.to_le_bytes());
    assert!(is_corrupt(&corrupt_error(bytes)));
}

#[test]
fn truncated_tables_are_corrupt() {
    let mut bytes = hand_built_file();
    bytes.truncate(bytes.len() - 1);
    assert!(is_corrupt(&corrupt_error(bytes)));
}

#[test]
fn descriptor_count_must_match_pairs() {
    let mut bytes = hand_built_file();
    // Claim one descriptor and drop the label so only the pair check fails.
    bytes[24 + 8..24 + 12].copy_from_slice(&1u32.to_le_bytes());
    bytes[24 + 40 + 8..24 + 40 + 12].copy_from_slice(&(-1i32).to_le_bytes());
    assert!(is_corrupt(&corrupt_error(bytes)));
}

#[test]
fn unsupported_version_and_short_directory_fail_to_open() {
    let mut bytes = hand_built_file();
    bytes[0..8].copy_from_slice(&2u64.to_le_bytes());
    assert!(TileFileReader::from_reader(Cursor::new(bytes)).is_err());

    let mut bytes = hand_built_file();
    bytes[8..12].copy_from_slice(&100u32.to_le_bytes());
    let err = TileFileReader::from_reader(Cursor::new(bytes)).expect_err("short directory");
    assert!(is_corrupt(&err));

    assert!(TileFileReader::from_reader(Cursor::new(vec![1u8, 0, 0])).is_err());
}

#[test]
fn verify_reports_each_failing_tile() {
    let dir = tempfile::tempdir().expect("tempdir");

    let good = dir.path().join("good.bin");
    fs::write(&good, hand_built_file()).expect("write good");
    let report = verify_map_file(&good).expect("verify good");
    assert!(report.is_ok());
    assert_eq!(report.verified_tiles, 1);
    assert_eq!(report.features, 1);

    let mut bytes = hand_built_file();
    bytes[24 + 40 + 12] = 9;
    let bad = dir.path().join("bad.bin");
    fs::write(&bad, bytes).expect("write bad");
    let report = verify_map_file(&bad).expect("verify bad");
    assert!(!report.is_ok());
    assert_eq!(report.verified_tiles, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].tile_id, 7);
    assert_eq!(report.failures[0].offset, 24);
}
