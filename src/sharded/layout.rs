// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use byteorder::ByteOrder;
use byteorder::LE;

use crate::codec::FilterBytes;
use crate::error::Error;
use crate::fuse::Fingerprint;
use crate::fuse::FuseDescriptor;
use crate::fuse::DESCRIPTOR_BYTES;

/// Size of the tag region at the head of a sharded file.
pub(super) const HEADER_LEN: usize = 16;

/// First byte of the shard index.
pub(super) const INDEX_START: usize = HEADER_LEN;

/// Index sentinel marking a shard slot with no filter.
pub(super) const EMPTY_OFFSET: u64 = u64::MAX;

/// Widest supported sharding; `2^13 = 8192` still fits the tag's 4-digit
/// decimal capacity field.
pub(super) const MAX_SHARD_BITS: u8 = 13;

pub(super) fn capacity(shard_bits: u8) -> u32 {
    1u32 << shard_bits
}

/// The shard owning `key`: its top `shard_bits` bits.
#[inline]
pub(super) fn shard_prefix(key: u64, shard_bits: u8) -> u32 {
    if shard_bits == 0 {
        0
    } else {
        (key >> (64 - shard_bits as u32)) as u32
    }
}

pub(super) fn index_len(capacity: u32) -> usize {
    capacity as usize * 8
}

/// Offset of the first body byte; also the minimum length of a well-formed
/// file.
pub(super) fn body_start(capacity: u32) -> usize {
    HEADER_LEN + index_len(capacity)
}

fn slot_offset(prefix: u32) -> usize {
    INDEX_START + prefix as usize * 8
}

pub(super) fn read_slot(file: &[u8], prefix: u32) -> u64 {
    LE::read_u64(&file[slot_offset(prefix)..])
}

pub(super) fn write_slot(file: &mut [u8], prefix: u32, offset: u64) {
    LE::write_u64(&mut file[slot_offset(prefix)..], offset);
}

pub(super) fn check_shard_bits(shard_bits: u8) -> Result<(), Error> {
    if shard_bits > MAX_SHARD_BITS {
        return Err(Error::invalid_argument(format!(
            "shard_bits {shard_bits} exceeds the maximum of {MAX_SHARD_BITS}"
        )));
    }
    Ok(())
}

/// Renders the 16-byte tag, e.g. `sbinfuse08-0256` plus a zero pad byte.
pub(super) fn tag_bytes<W: Fingerprint>(capacity: u32) -> [u8; HEADER_LEN] {
    let mut tag = [0u8; HEADER_LEN];
    let text = format!("sbinfuse{:02}-{capacity:04}", W::BITS);
    tag[..text.len()].copy_from_slice(text.as_bytes());
    tag
}

/// Validates the tag of an open file against this width and `shard_bits`.
///
/// The id prefix and the dash are matched exactly, and the capacity is
/// parsed from exactly the four digit positions the tag defines; a wider
/// or narrower field is a format error, not a lenient parse.
pub(super) fn check_tag<W: Fingerprint>(file: &[u8], shard_bits: u8) -> Result<(), Error> {
    let id = format!("sbinfuse{:02}", W::BITS);
    if &file[..id.len()] != id.as_bytes() {
        return Err(Error::format(format!(
            "incorrect type id: expected {id}, found {}",
            String::from_utf8_lossy(&file[..id.len()])
        )));
    }
    if file[10] != b'-' {
        return Err(Error::format("malformed tag: missing capacity separator"));
    }
    let digits = &file[11..15];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::format("malformed tag: capacity field is not 4 digits"));
    }
    let found: u32 = digits
        .iter()
        .fold(0u32, |acc, &d| acc * 10 + (d - b'0') as u32);
    if found != capacity(shard_bits) {
        return Err(Error::capacity_mismatch(capacity(shard_bits), found));
    }
    Ok(())
}

/// Assembles the fresh-file prefix: the tag followed by an all-empty
/// index.
pub(super) fn header_block<W: Fingerprint>(capacity: u32) -> Vec<u8> {
    let mut bytes = FilterBytes::with_capacity(body_start(capacity));
    bytes.write(&tag_bytes::<W>(capacity));
    for _ in 0..capacity {
        bytes.write_u64_le(EMPTY_OFFSET);
    }
    bytes.into_bytes()
}

/// A loaded shard: its decoded descriptor plus where its fingerprint bytes
/// sit in the file.
///
/// Deliberately *not* a reference into the mapping: the engines re-derive
/// the byte slice from their current mapping on every query, so a remap
/// can never leave a slot pointing at unmapped memory.
#[derive(Clone, Copy, Debug)]
pub(super) struct ShardSlot {
    descriptor: FuseDescriptor,
    data_start: usize,
    data_len: usize,
}

impl ShardSlot {
    #[inline]
    pub fn contains<W: Fingerprint>(&self, key: u64, file: &[u8]) -> bool {
        self.descriptor
            .contains::<W>(key, &file[self.data_start..self.data_start + self.data_len])
    }
}

/// Reads the index and materializes a [`ShardSlot`] for every non-empty
/// entry, bounds-checking each filter against the file length.
pub(super) fn load_slots<W: Fingerprint>(
    file: &[u8],
    capacity: u32,
) -> Result<Vec<Option<ShardSlot>>, Error> {
    let mut slots = Vec::with_capacity(capacity as usize);
    for prefix in 0..capacity {
        let offset = read_slot(file, prefix);
        if offset == EMPTY_OFFSET {
            slots.push(None);
            continue;
        }
        let offset = usize::try_from(offset)
            .map_err(|_| Error::format("filter offset out of range").with_context("shard", prefix))?;
        if offset < body_start(capacity) || offset + DESCRIPTOR_BYTES > file.len() {
            return Err(Error::format("filter offset points outside the file body")
                .with_context("shard", prefix));
        }
        let descriptor = FuseDescriptor::decode(&file[offset..])
            .map_err(|e| e.with_context("shard", prefix))?;
        let data_start = offset + DESCRIPTOR_BYTES;
        let data_len = descriptor.array_length as usize * W::BYTES;
        if data_start + data_len > file.len() {
            return Err(Error::format("filter extends past end of file")
                .with_context("shard", prefix));
        }
        slots.push(Some(ShardSlot {
            descriptor,
            data_start,
            data_len,
        }));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_bytes_exact() {
        assert_eq!(&tag_bytes::<u8>(2)[..15], b"sbinfuse08-0002");
        assert_eq!(&tag_bytes::<u16>(256)[..15], b"sbinfuse16-0256");
        assert_eq!(tag_bytes::<u8>(2)[15], 0);
    }

    #[test]
    fn test_check_tag_accepts_own_output() {
        let header = header_block::<u8>(capacity(3));
        check_tag::<u8>(&header, 3).unwrap();
    }

    #[test]
    fn test_check_tag_rejects_wrong_width() {
        let header = header_block::<u8>(capacity(3));
        assert!(check_tag::<u16>(&header, 3).is_err());
    }

    #[test]
    fn test_check_tag_rejects_wrong_capacity() {
        use crate::error::ErrorKind;
        let header = header_block::<u8>(capacity(1));
        let err = check_tag::<u8>(&header, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityMismatch);
    }

    #[test]
    fn test_shard_prefix_routing() {
        assert_eq!(shard_prefix(0x8000_0000_0000_0000, 1), 1);
        assert_eq!(shard_prefix(0x7fff_ffff_ffff_ffff, 1), 0);
        assert_eq!(shard_prefix(0xff00_0000_0000_0000, 8), 0xff);
        assert_eq!(shard_prefix(u64::MAX, 0), 0);
    }

    #[test]
    fn test_header_block_is_all_sentinels() {
        let cap = capacity(2);
        let header = header_block::<u8>(cap);
        assert_eq!(header.len(), body_start(cap));
        for prefix in 0..cap {
            assert_eq!(read_slot(&header, prefix), EMPTY_OFFSET);
        }
    }

    #[test]
    fn test_slot_round_trip() {
        let mut header = header_block::<u8>(capacity(4));
        write_slot(&mut header, 9, 0x1234);
        assert_eq!(read_slot(&header, 9), 0x1234);
        assert_eq!(read_slot(&header, 8), EMPTY_OFFSET);
    }
}
