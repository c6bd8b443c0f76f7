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

use crate::error::Error;
use crate::fuse::Fingerprint;
use crate::fuse::FuseDescriptor;
use crate::hash::mix_split;
use crate::hash::SplitMix64;

/// Seed reseeds before construction gives up. Failure at this point is a
/// property of the key set, not bad luck.
const MAX_ATTEMPTS: usize = 100;

/// Start of the deterministic seed stream.
const SEED_STREAM: u64 = 0x726b_2b9d_438b_9d4d;

/// Builds the fingerprint array for `keys` over the geometry in
/// `descriptor`, choosing and recording a construction seed that admits a
/// complete peeling.
///
/// Keys are consumed in arbitrary order. A duplicated pair of hashes in the
/// same three slots is tolerated (counted and dropped); anything denser
/// forces a reseed. Returns the serialized fingerprint bytes, or
/// `BuildFailed` once the retry limit is exhausted.
pub(crate) fn populate<W: Fingerprint>(
    keys: &[u64],
    descriptor: &mut FuseDescriptor,
) -> Result<Vec<u8>, Error> {
    let size = keys.len();
    let capacity = descriptor.array_length as usize;
    let mut rng = SplitMix64::new(SEED_STREAM);
    descriptor.seed = rng.next();

    if size == 0 {
        return Ok(vec![0u8; capacity * W::BYTES]);
    }

    // Scratch state. `reverse_order` first holds the keys' hashes bucketed
    // by their top bits, then is reused as the peel stack; the extra slot
    // at the end is a non-zero sentinel for the bucketing probe below.
    let mut reverse_order = vec![0u64; size + 1];
    let mut reverse_slot = vec![0u8; size];
    let mut alone = vec![0u32; capacity];
    let mut slot_count = vec![0u8; capacity];
    let mut slot_hash = vec![0u64; capacity];

    let mut block_bits = 1u32;
    while (1u32 << block_bits) < descriptor.segment_count {
        block_bits += 1;
    }
    let block = 1usize << block_bits;
    let mut start_pos = vec![0u32; block];

    reverse_order[size] = 1;

    let mut stack_size;
    let mut attempt = 0;
    loop {
        attempt += 1;
        if attempt > MAX_ATTEMPTS {
            return Err(Error::build_failed(format!(
                "fingerprint assignment failed after {MAX_ATTEMPTS} seeds"
            )));
        }

        // Bucket the hashes by their top bits so keys that share segments
        // land near each other; the peel below then walks the array mostly
        // in order.
        for (i, pos) in start_pos.iter_mut().enumerate() {
            *pos = ((i as u64 * size as u64) >> block_bits) as u32;
        }
        let block_mask = (block - 1) as u64;
        for &key in keys {
            let hash = mix_split(key, descriptor.seed);
            let mut bucket = (hash >> (64 - block_bits)) as usize;
            while reverse_order[start_pos[bucket] as usize] != 0 {
                bucket = ((bucket + 1) as u64 & block_mask) as usize;
            }
            reverse_order[start_pos[bucket] as usize] = hash;
            start_pos[bucket] += 1;
        }

        // Count per-slot degrees. The low two bits of each count entry
        // accumulate the hash-function indexes mod 3, so a slot of degree
        // one knows which of its key's three slots it is without a search.
        let mut overload = false;
        let mut duplicates = 0usize;
        for i in 0..size {
            let hash = reverse_order[i];
            let h0 = descriptor.slot(0, hash);
            slot_count[h0] = slot_count[h0].wrapping_add(4);
            slot_hash[h0] ^= hash;
            let h1 = descriptor.slot(1, hash);
            slot_count[h1] = slot_count[h1].wrapping_add(4);
            slot_count[h1] ^= 1;
            slot_hash[h1] ^= hash;
            let h2 = descriptor.slot(2, hash);
            slot_count[h2] = slot_count[h2].wrapping_add(4);
            slot_count[h2] ^= 2;
            slot_hash[h2] ^= hash;

            // Two identical hashes cancel in every slot_hash they share;
            // drop the second occurrence instead of failing the attempt.
            if (slot_hash[h0] & slot_hash[h1] & slot_hash[h2]) == 0 {
                if (slot_hash[h0] == 0 && slot_count[h0] == 8)
                    || (slot_hash[h1] == 0 && slot_count[h1] == 8)
                    || (slot_hash[h2] == 0 && slot_count[h2] == 8)
                {
                    duplicates += 1;
                    slot_count[h0] = slot_count[h0].wrapping_sub(4);
                    slot_hash[h0] ^= hash;
                    slot_count[h1] = slot_count[h1].wrapping_sub(4);
                    slot_count[h1] ^= 1;
                    slot_hash[h1] ^= hash;
                    slot_count[h2] = slot_count[h2].wrapping_sub(4);
                    slot_count[h2] ^= 2;
                    slot_hash[h2] ^= hash;
                }
            }
            overload |= slot_count[h0] < 4 || slot_count[h1] < 4 || slot_count[h2] < 4;
        }
        if overload {
            // A slot's degree wrapped the 6-bit counter; reseed.
            reverse_order[..size].fill(0);
            slot_count.fill(0);
            slot_hash.fill(0);
            descriptor.seed = rng.next();
            continue;
        }

        // Peel: repeatedly detach keys that are the last user of some slot,
        // recording for each the slot it will be assigned from.
        let mut queue_size = 0usize;
        for (i, &count) in slot_count.iter().enumerate() {
            alone[queue_size] = i as u32;
            if (count >> 2) == 1 {
                queue_size += 1;
            }
        }
        stack_size = 0usize;
        while queue_size > 0 {
            queue_size -= 1;
            let index = alone[queue_size] as usize;
            if (slot_count[index] >> 2) != 1 {
                continue;
            }
            let hash = slot_hash[index];
            let found = slot_count[index] & 3;
            reverse_slot[stack_size] = found;
            reverse_order[stack_size] = hash;
            stack_size += 1;

            let slots = [
                descriptor.slot(0, hash),
                descriptor.slot(1, hash),
                descriptor.slot(2, hash),
                descriptor.slot(0, hash),
                descriptor.slot(1, hash),
            ];
            for step in 1..3u8 {
                let other = slots[(found + step) as usize];
                alone[queue_size] = other as u32;
                if (slot_count[other] >> 2) == 2 {
                    queue_size += 1;
                }
                slot_count[other] = slot_count[other].wrapping_sub(4);
                slot_count[other] ^= mod3(found + step);
                slot_hash[other] ^= hash;
            }
        }

        if stack_size + duplicates == size {
            break;
        }

        // The 2-core is non-empty; reseed and try again.
        reverse_order[..size].fill(0);
        slot_count.fill(0);
        slot_hash.fill(0);
        descriptor.seed = rng.next();
    }

    // Assign fingerprints in reverse peel order: each key's detached slot
    // is set last, so the XOR over its three slots comes out to its
    // fingerprint exactly.
    let mut fingerprints = vec![W::default(); capacity];
    for i in (0..stack_size).rev() {
        let hash = reverse_order[i];
        let found = reverse_slot[i] as usize;
        let slots = [
            descriptor.slot(0, hash),
            descriptor.slot(1, hash),
            descriptor.slot(2, hash),
            descriptor.slot(0, hash),
            descriptor.slot(1, hash),
        ];
        let mut value = W::from_hash(hash);
        value ^= fingerprints[slots[found + 1]];
        value ^= fingerprints[slots[found + 2]];
        fingerprints[slots[found]] = value;
    }

    Ok(W::into_bytes(fingerprints))
}

#[inline]
fn mod3(x: u8) -> u8 {
    if x > 2 {
        x - 3
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build<W: Fingerprint>(keys: &[u64]) -> (FuseDescriptor, Vec<u8>) {
        let mut descriptor = FuseDescriptor::for_key_count(keys.len() as u32);
        let data = populate::<W>(keys, &mut descriptor).unwrap();
        (descriptor, data)
    }

    #[test]
    fn test_no_false_negatives_small() {
        let keys: Vec<u64> = (0..1_000u64).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect();
        let (descriptor, data) = build::<u8>(&keys);
        for &key in &keys {
            assert!(descriptor.contains::<u8>(key, &data));
        }
    }

    #[test]
    fn test_no_false_negatives_u16() {
        let keys: Vec<u64> = (0..5_000u64).map(|i| i.wrapping_mul(0xff51afd7ed558ccd)).collect();
        let (descriptor, data) = build::<u16>(&keys);
        for &key in &keys {
            assert!(descriptor.contains::<u16>(key, &data));
        }
    }

    #[test]
    fn test_empty_key_set() {
        let (descriptor, data) = build::<u8>(&[]);
        assert_eq!(data.len(), descriptor.array_length as usize);
        assert!(descriptor.is_populated());
    }

    #[test]
    fn test_single_key() {
        let (descriptor, data) = build::<u8>(&[0xdead_beef]);
        assert!(descriptor.contains::<u8>(0xdead_beef, &data));
    }

    #[test]
    fn test_deterministic_construction() {
        let keys: Vec<u64> = (0..500u64).map(|i| i * 7 + 1).collect();
        let (da, a) = build::<u8>(&keys);
        let (db, b) = build::<u8>(&keys);
        assert_eq!(da, db);
        assert_eq!(a, b);
    }
}
