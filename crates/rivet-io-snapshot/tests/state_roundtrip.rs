use rivet_io_snapshot::state::codec::{Decoder, Encoder};
use rivet_io_snapshot::state::{SnapshotError, SnapshotReader, SnapshotVersion, SnapshotWriter};

#[test]
fn writer_reader_roundtrip() {
    let mut w = SnapshotWriter::new(*b"TEST", SnapshotVersion::new(1, 2));
    w.field_bytes(3, Encoder::new().u32(0xDEAD_BEEF).finish());
    w.field_bytes(1, Encoder::new().u8(7).u64(42).finish());
    let bytes = w.finish();

    let r = SnapshotReader::parse(&bytes, *b"TEST").unwrap();
    assert_eq!(r.header().device_version, SnapshotVersion::new(1, 2));

    let mut d = Decoder::new(r.bytes(1).unwrap());
    assert_eq!(d.u8().unwrap(), 7);
    assert_eq!(d.u64().unwrap(), 42);
    assert_eq!(d.remaining(), 0);

    let mut d = Decoder::new(r.bytes(3).unwrap());
    assert_eq!(d.u32().unwrap(), 0xDEAD_BEEF);

    assert!(r.bytes(2).is_none());
}

#[test]
fn encoding_is_deterministic_regardless_of_field_order() {
    let mut a = SnapshotWriter::new(*b"DETM", SnapshotVersion::new(1, 0));
    a.field_bytes(2, vec![2]);
    a.field_bytes(1, vec![1]);

    let mut b = SnapshotWriter::new(*b"DETM", SnapshotVersion::new(1, 0));
    b.field_bytes(1, vec![1]);
    b.field_bytes(2, vec![2]);

    assert_eq!(a.finish(), b.finish(), "encoding must be deterministic");
}

#[test]
fn parse_rejects_wrong_device_id() {
    let bytes = SnapshotWriter::new(*b"AAAA", SnapshotVersion::new(1, 0)).finish();
    let err = SnapshotReader::parse(&bytes, *b"BBBB").unwrap_err();
    assert_eq!(
        err,
        SnapshotError::BadDeviceId {
            expected: *b"BBBB",
            found: *b"AAAA",
        }
    );
}

#[test]
fn parse_rejects_truncated_field() {
    let mut w = SnapshotWriter::new(*b"TRNC", SnapshotVersion::new(1, 0));
    w.field_bytes(1, vec![0u8; 16]);
    let mut bytes = w.finish();
    bytes.truncate(bytes.len() - 1);
    assert_eq!(
        SnapshotReader::parse(&bytes, *b"TRNC").unwrap_err(),
        SnapshotError::UnexpectedEof
    );
}

#[test]
fn parse_rejects_duplicate_tags() {
    // Hand-build a blob with the same tag twice; the writer cannot produce
    // this, but a corrupt snapshot can.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"DUPE");
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    for _ in 0..2 {
        bytes.extend_from_slice(&7u16.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0xAB);
    }
    assert_eq!(
        SnapshotReader::parse(&bytes, *b"DUPE").unwrap_err(),
        SnapshotError::DuplicateField(7)
    );
}
