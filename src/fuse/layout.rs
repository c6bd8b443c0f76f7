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

use crate::codec::FilterSlice;
use crate::error::Error;
use crate::fuse::Fingerprint;
use crate::hash::mix_split;

/// Serialized size of a descriptor: seed (u64) plus five u32 geometry
/// fields, little-endian.
pub(crate) const DESCRIPTOR_BYTES: usize = 28;

/// Keys hash into three consecutive segments.
const ARITY: u32 = 3;

/// Cap on the segment length; beyond this, longer segments stop helping
/// construction success rates.
const MAX_SEGMENT_LENGTH: u32 = 1 << 18;

/// Fixed-size head of a binary fuse filter: the construction seed and the
/// segmented array geometry. Everything about a filter except the
/// fingerprint array itself.
///
/// A zeroed descriptor (`segment_count == 0`) denotes "no filter"; every
/// constructed or decoded descriptor has `segment_count >= 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FuseDescriptor {
    pub seed: u64,
    pub segment_length: u32,
    pub segment_length_mask: u32,
    pub segment_count: u32,
    pub segment_count_length: u32,
    pub array_length: u32,
}

impl FuseDescriptor {
    /// Computes the array geometry for a key set of the given size.
    ///
    /// The segment length grows with the key count up to a fixed cap, and
    /// the total array carries a shrinking relative overhead (12.5% in the
    /// limit). Zero- and one-key sets degenerate to a minimal three-segment
    /// array.
    pub fn for_key_count(n_keys: u32) -> Self {
        let mut segment_length = if n_keys == 0 {
            4
        } else {
            let exponent = ((n_keys as f64).ln() / 3.33f64.ln() + 2.25).floor() as u32;
            1u32 << exponent.min(31)
        };
        if segment_length > MAX_SEGMENT_LENGTH {
            segment_length = MAX_SEGMENT_LENGTH;
        }
        let segment_length_mask = segment_length - 1;

        let capacity = if n_keys <= 1 {
            0
        } else {
            let size_factor =
                (0.875 + 0.25 * 1_000_000f64.ln() / (n_keys as f64).ln()).max(1.125);
            (n_keys as f64 * size_factor).round() as u32
        };

        let mut segment_count = capacity.div_ceil(segment_length);
        segment_count = if segment_count <= ARITY - 1 {
            1
        } else {
            segment_count - (ARITY - 1)
        };
        let array_length = (segment_count + ARITY - 1) * segment_length;
        let segment_count_length = segment_count * segment_length;

        FuseDescriptor {
            seed: 0,
            segment_length,
            segment_length_mask,
            segment_count,
            segment_count_length,
            array_length,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.segment_count > 0
    }

    /// Serialized size of a filter with this geometry, descriptor included.
    pub fn serialized_len(&self, fingerprint_bytes: usize) -> usize {
        DESCRIPTOR_BYTES + self.array_length as usize * fingerprint_bytes
    }

    /// The slot for hash function `index` (0, 1 or 2) of a mixed hash.
    ///
    /// The top of the hash picks a start segment via a multiply-high, and
    /// 18-bit windows of the low 36 bits displace within the segment, one
    /// window per hash function. Slots land in `[0, array_length)` for any
    /// consistent descriptor.
    #[inline]
    pub fn slot(&self, index: u32, hash: u64) -> usize {
        let mut h = mulhi(hash, self.segment_count_length as u64);
        h += (index * self.segment_length) as u64;
        let hh = hash & ((1u64 << 36) - 1);
        h ^= (hh >> (36 - 18 * index)) & self.segment_length_mask as u64;
        h as usize
    }

    /// All three slots of a mixed hash at once; the form the query kernel
    /// uses.
    #[inline]
    pub fn slots(&self, hash: u64) -> [usize; 3] {
        let mask = self.segment_length_mask as u64;
        let h0 = mulhi(hash, self.segment_count_length as u64);
        let h1 = h0 + self.segment_length as u64;
        let h2 = h1 + self.segment_length as u64;
        [
            h0 as usize,
            (h1 ^ ((hash >> 18) & mask)) as usize,
            (h2 ^ (hash & mask)) as usize,
        ]
    }

    /// Queries `key` against a fingerprint array laid out per this
    /// descriptor. Three loads, two XORs, no branches on the data.
    #[inline]
    pub fn contains<W: Fingerprint>(&self, key: u64, fingerprints: &[u8]) -> bool {
        let hash = mix_split(key, self.seed);
        let [h0, h1, h2] = self.slots(hash);
        let mut f = W::from_hash(hash);
        f ^= W::read(fingerprints, h0);
        f ^= W::read(fingerprints, h1);
        f ^= W::read(fingerprints, h2);
        f == W::default()
    }

    /// Encodes the descriptor into its 28-byte little-endian form.
    pub fn encode(&self) -> [u8; DESCRIPTOR_BYTES] {
        let mut buf = [0u8; DESCRIPTOR_BYTES];
        buf[0..8].copy_from_slice(&self.seed.to_le_bytes());
        buf[8..12].copy_from_slice(&self.segment_length.to_le_bytes());
        buf[12..16].copy_from_slice(&self.segment_length_mask.to_le_bytes());
        buf[16..20].copy_from_slice(&self.segment_count.to_le_bytes());
        buf[20..24].copy_from_slice(&self.segment_count_length.to_le_bytes());
        buf[24..28].copy_from_slice(&self.array_length.to_le_bytes());
        buf
    }

    /// Decodes a descriptor from the head of `src` and checks the geometry
    /// is internally consistent.
    ///
    /// Consistency is what keeps every later `slot` computation inside the
    /// fingerprint array, so a corrupted descriptor is rejected here rather
    /// than surfacing as an out-of-bounds panic at query time. The
    /// fingerprint bytes themselves are never validated.
    pub fn decode(src: &[u8]) -> Result<Self, Error> {
        let mut cursor = FilterSlice::new(src);
        let truncated = |_| Error::format("filter descriptor truncated");
        let descriptor = FuseDescriptor {
            seed: cursor.read_u64_le().map_err(truncated)?,
            segment_length: cursor.read_u32_le().map_err(truncated)?,
            segment_length_mask: cursor.read_u32_le().map_err(truncated)?,
            segment_count: cursor.read_u32_le().map_err(truncated)?,
            segment_count_length: cursor.read_u32_le().map_err(truncated)?,
            array_length: cursor.read_u32_le().map_err(truncated)?,
        };

        let consistent = descriptor.segment_count > 0
            && descriptor.segment_length.is_power_of_two()
            && descriptor.segment_length_mask == descriptor.segment_length - 1
            && descriptor.segment_count_length
                == descriptor.segment_count.wrapping_mul(descriptor.segment_length)
            && descriptor.array_length
                == (descriptor.segment_count.wrapping_add(ARITY - 1))
                    .wrapping_mul(descriptor.segment_length);
        if !consistent {
            return Err(Error::format("filter descriptor is malformed"));
        }
        Ok(descriptor)
    }
}

/// Upper 64 bits of the 128-bit product; maps a hash uniformly onto
/// `[0, n)` without division.
#[inline]
fn mulhi(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) >> 64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_key_layout_is_minimal() {
        let descriptor = FuseDescriptor::for_key_count(0);
        assert_eq!(descriptor.segment_length, 4);
        assert_eq!(descriptor.segment_count, 1);
        assert_eq!(descriptor.array_length, 12);
        assert!(descriptor.is_populated());
    }

    #[test]
    fn test_layout_overhead_bounds() {
        for n in [100u32, 10_000, 1_000_000] {
            let descriptor = FuseDescriptor::for_key_count(n);
            let overhead = descriptor.array_length as f64 / n as f64;
            assert!(overhead > 1.0, "array must exceed key count for n={n}");
            assert!(overhead < 2.0, "overhead {overhead} too large for n={n}");
        }
    }

    #[test]
    fn test_slots_in_bounds() {
        let descriptor = FuseDescriptor::for_key_count(10_000);
        for hash in [0u64, 1, u64::MAX, 0xdead_beef_cafe_f00d] {
            for slot in descriptor.slots(hash) {
                assert!(slot < descriptor.array_length as usize);
            }
            for index in 0..3 {
                assert!(descriptor.slot(index, hash) < descriptor.array_length as usize);
            }
        }
    }

    #[test]
    fn test_slots_agree_with_slot() {
        let descriptor = FuseDescriptor::for_key_count(5_000);
        for hash in [3u64, 0x1234_5678_9abc_def0, u64::MAX / 3] {
            let batch = descriptor.slots(hash);
            for index in 0..3u32 {
                assert_eq!(batch[index as usize], descriptor.slot(index, hash));
            }
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut descriptor = FuseDescriptor::for_key_count(4_242);
        descriptor.seed = 0x0123_4567_89ab_cdef;
        let encoded = descriptor.encode();
        let decoded = FuseDescriptor::decode(&encoded).unwrap();
        assert_eq!(descriptor, decoded);
    }

    #[test]
    fn test_decode_rejects_truncation_and_corruption() {
        let descriptor = FuseDescriptor::for_key_count(100);
        let encoded = descriptor.encode();
        assert!(FuseDescriptor::decode(&encoded[..27]).is_err());

        let mut corrupt = encoded;
        corrupt[8..12].copy_from_slice(&3u32.to_le_bytes()); // not a power of two
        assert!(FuseDescriptor::decode(&corrupt).is_err());
    }
}
