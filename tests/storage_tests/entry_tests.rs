//! Tests for the record codec
//!
//! These tests verify:
//! - Header layout (26 bytes, big-endian, value-only CRC)
//! - Two-phase decode (header, then body)
//! - Rejection of empty keys, tampered values and malformed bodies

use bytes::Bytes;
use rosedb::storage::{DataType, Entry, EntryHeader, StrMark, ENTRY_HEADER_SIZE, EXTRA_SEPARATOR};
use rosedb::RoseError;

// =============================================================================
// Helper Functions
// =============================================================================

fn string_entry(key: &'static [u8], value: &'static [u8]) -> Entry {
    Entry::no_extra(
        Bytes::from_static(key),
        Bytes::from_static(value),
        DataType::String,
        StrMark::Set as u8,
    )
    .with_timestamp(1_700_000_000)
}

fn decode(buf: &Bytes) -> rosedb::Result<Entry> {
    let header = EntryHeader::decode(&buf[..ENTRY_HEADER_SIZE])?;
    Entry::from_parts(&header, buf.slice(ENTRY_HEADER_SIZE..))
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_encode_header_layout() {
    let entry = string_entry(b"key", b"value");
    let buf = entry.encode().unwrap();

    assert_eq!(buf.len(), ENTRY_HEADER_SIZE + 3 + 5);
    assert_eq!(buf.len() as u64, entry.size());

    assert_eq!(&buf[0..4], &crc32fast::hash(b"value").to_be_bytes());
    assert_eq!(&buf[4..8], &3u32.to_be_bytes());
    assert_eq!(&buf[8..12], &5u32.to_be_bytes());
    assert_eq!(&buf[12..16], &0u32.to_be_bytes());
    assert_eq!(&buf[16..18], &[0u8, 0u8]);
    assert_eq!(&buf[18..26], &1_700_000_000u64.to_be_bytes());
    assert_eq!(&buf[26..], b"keyvalue");
}

#[test]
fn test_state_carries_type_and_mark() {
    let entry = Entry::no_extra(
        Bytes::from_static(b"k"),
        Bytes::new(),
        DataType::ZSet,
        3,
    );
    let buf = entry.encode().unwrap();

    assert_eq!(&buf[16..18], &[4u8, 3u8]);
}

#[test]
fn test_checksum_covers_value_only() {
    let a = string_entry(b"key-a", b"same");
    let b = string_entry(b"key-b", b"same");

    assert_eq!(a.checksum(), b.checksum());
    assert_eq!(a.checksum(), crc32fast::hash(b"same"));
}

// =============================================================================
// Decode Tests
// =============================================================================

#[test]
fn test_two_phase_decode() {
    let entry = Entry::new(
        Bytes::from_static(b"user"),
        Bytes::from_static(b"alice"),
        Bytes::from_static(b"field"),
        DataType::Hash,
        0,
    )
    .unwrap()
    .with_timestamp(42);
    let buf = entry.encode().unwrap();

    let header = EntryHeader::decode(&buf[..ENTRY_HEADER_SIZE]).unwrap();
    assert_eq!(header.key_size, 4);
    assert_eq!(header.value_size, 5);
    assert_eq!(header.extra_size, 5);
    assert_eq!(header.body_size(), 14);
    assert_eq!(header.entry_size(), buf.len() as u64);

    let decoded = Entry::from_parts(&header, buf.slice(ENTRY_HEADER_SIZE..)).unwrap();
    assert_eq!(decoded, entry);
}

#[test]
fn test_decode_short_header_fails() {
    let result = EntryHeader::decode(&[0u8; ENTRY_HEADER_SIZE - 1]);
    assert!(matches!(result, Err(RoseError::InvalidEntry)));
}

#[test]
fn test_zeroed_header_is_empty() {
    let header = EntryHeader::decode(&[0u8; ENTRY_HEADER_SIZE]).unwrap();
    assert!(header.is_empty());
}

#[test]
fn test_tampered_value_fails_crc() {
    let buf = string_entry(b"key", b"value").encode().unwrap();
    let mut tampered = buf.to_vec();
    tampered[ENTRY_HEADER_SIZE + 3] ^= 0xff;

    let result = decode(&Bytes::from(tampered));
    assert!(matches!(result, Err(RoseError::InvalidCrc)));
}

#[test]
fn test_tampered_key_still_passes_crc() {
    let buf = string_entry(b"key", b"value").encode().unwrap();
    let mut tampered = buf.to_vec();
    tampered[ENTRY_HEADER_SIZE] = b'K';

    let decoded = decode(&Bytes::from(tampered)).unwrap();
    assert_eq!(&decoded.key[..], b"Key");
}

#[test]
fn test_body_length_mismatch_fails() {
    let buf = string_entry(b"key", b"value").encode().unwrap();
    let header = EntryHeader::decode(&buf[..ENTRY_HEADER_SIZE]).unwrap();

    let result = Entry::from_parts(&header, buf.slice(ENTRY_HEADER_SIZE..buf.len() - 1));
    assert!(matches!(result, Err(RoseError::InvalidEntry)));
}

#[test]
fn test_unknown_type_tag_fails() {
    let buf = string_entry(b"key", b"value").encode().unwrap();
    let mut tampered = buf.to_vec();
    tampered[16] = 9;

    let result = decode(&Bytes::from(tampered));
    assert!(matches!(result, Err(RoseError::InvalidEntry)));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_encode_empty_key_fails() {
    let entry = Entry::no_extra(Bytes::new(), Bytes::from_static(b"v"), DataType::String, 0);
    assert!(matches!(entry.encode(), Err(RoseError::InvalidEntry)));
}

#[test]
fn test_extra_with_separator_rejected() {
    let mut extra = b"a".to_vec();
    extra.extend_from_slice(EXTRA_SEPARATOR);
    extra.extend_from_slice(b"b");

    let result = Entry::new(
        Bytes::from_static(b"k"),
        Bytes::new(),
        Bytes::from(extra),
        DataType::List,
        0,
    );
    assert!(matches!(result, Err(RoseError::ExtraContainsSeparator)));
}

#[test]
fn test_empty_value_round_trips() {
    let entry = string_entry(b"k", b"");
    let decoded = decode(&entry.encode().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert!(decoded.value.is_empty());
}
