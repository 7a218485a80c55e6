//! `AddressDecoder` region registration and routing boundary tests.

use kpu_core::common::{Address, KpuError, MemoryKind};
use kpu_core::memory::AddressDecoder;

#[test]
fn decodes_address_within_a_registered_region() {
    let mut decoder = AddressDecoder::new();
    decoder.register(Address::new(0), 4096, MemoryKind::External, 0).unwrap();
    decoder.register(Address::new(4096), 4096, MemoryKind::L3Tile, 2).unwrap();

    let routing = decoder.decode(Address::new(4100)).unwrap();
    assert_eq!(routing.kind, MemoryKind::L3Tile);
    assert_eq!(routing.id, 2);
    assert_eq!(routing.offset, Address::new(4));
}

#[test]
fn rejects_overlapping_region_registration() {
    let mut decoder = AddressDecoder::new();
    decoder.register(Address::new(0), 4096, MemoryKind::External, 0).unwrap();
    let err = decoder.register(Address::new(2048), 4096, MemoryKind::External, 1);
    assert!(matches!(err, Err(KpuError::OverlapError { .. })));
}

#[test]
fn adjacent_regions_do_not_overlap() {
    let mut decoder = AddressDecoder::new();
    decoder.register(Address::new(0), 4096, MemoryKind::External, 0).unwrap();
    assert!(decoder.register(Address::new(4096), 4096, MemoryKind::External, 1).is_ok());
}

#[test]
fn unmapped_address_is_rejected() {
    let decoder = AddressDecoder::new();
    let err = decoder.decode(Address::new(0));
    assert!(matches!(err, Err(KpuError::UnmappedAddress(0))));
}

#[test]
fn decode_range_rejects_a_span_crossing_a_region_boundary() {
    let mut decoder = AddressDecoder::new();
    decoder.register(Address::new(0), 16, MemoryKind::External, 0).unwrap();
    let err = decoder.decode_range(Address::new(8), 16);
    assert!(matches!(err, Err(KpuError::RangeError { .. })));
}

#[test]
fn decode_range_accepts_a_span_within_one_region() {
    let mut decoder = AddressDecoder::new();
    decoder.register(Address::new(0), 16, MemoryKind::External, 0).unwrap();
    let routing = decoder.decode_range(Address::new(4), 8).unwrap();
    assert_eq!(routing.offset, Address::new(4));
}
