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

const C1: u64 = 0xff51afd7ed558ccd;
const C2: u64 = 0xc4ceb9fe1a85ec53;

/// The 64-bit MurmurHash3 finalizer. Full avalanche: every input bit affects
/// every output bit, which is what the segmented index derivation below it
/// relies on.
#[inline]
fn mix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(C1);
    h ^= h >> 33;
    h = h.wrapping_mul(C2);
    h ^= h >> 33;
    h
}

/// Combines a key with a construction seed into the single 64-bit hash that
/// drives both the three slot indexes and the fingerprint of that key.
///
/// Callers assume the keys themselves are already uniformly distributed;
/// the mix here is what makes a *re-seed* produce an independent layout when
/// construction has to retry.
#[inline]
pub(crate) fn mix_split(key: u64, seed: u64) -> u64 {
    mix64(key.wrapping_add(seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix64_avalanche_nonzero() {
        // Flipping one input bit must change roughly half the output bits.
        let a = mix64(0x0123_4567_89ab_cdef);
        let b = mix64(0x0123_4567_89ab_cdee);
        let flipped = (a ^ b).count_ones();
        assert!((16..=48).contains(&flipped), "weak avalanche: {flipped}");
    }

    #[test]
    fn test_mix_split_seed_sensitivity() {
        let key = 42u64;
        assert_ne!(mix_split(key, 1), mix_split(key, 2));
    }
}
