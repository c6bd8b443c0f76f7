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

use std::marker::PhantomData;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::fuse::construct;
use crate::fuse::Fingerprint;
use crate::fuse::FuseDescriptor;
use crate::fuse::DESCRIPTOR_BYTES;

/// Where a filter's fingerprint array lives.
///
/// `Owned` data is dropped with the filter; `Borrowed` data belongs to the
/// caller (typically a memory-mapped file) and is merely viewed.
#[derive(Debug)]
enum FingerprintData<'a> {
    Empty,
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl FingerprintData<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            FingerprintData::Empty => &[],
            FingerprintData::Owned(data) => data,
            FingerprintData::Borrowed(data) => data,
        }
    }
}

/// A single binary fuse filter over a set of 64-bit keys.
///
/// See the [module documentation](crate::filter) for properties and usage.
/// The lifetime parameter is `'static` for built filters and tied to the
/// source buffer for deserialized ones.
#[derive(Debug)]
pub struct Filter<'a, W: Fingerprint = u8> {
    descriptor: FuseDescriptor,
    fingerprints: FingerprintData<'a>,
    _width: PhantomData<W>,
}

/// A filter with 8-bit fingerprints (≈0.39% false-positive rate).
pub type Filter8<'a> = Filter<'a, u8>;
/// A filter with 16-bit fingerprints (≈0.0015% false-positive rate).
pub type Filter16<'a> = Filter<'a, u16>;

impl<W: Fingerprint> Default for Filter<'_, W> {
    fn default() -> Self {
        Self {
            descriptor: FuseDescriptor::default(),
            fingerprints: FingerprintData::Empty,
            _width: PhantomData,
        }
    }
}

impl<'a, W: Fingerprint> Filter<'a, W> {
    /// Creates an empty, unpopulated filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter holding exactly the given keys.
    ///
    /// Equivalent to [`Filter::new`] followed by [`Filter::populate`].
    pub fn build(keys: &[u64]) -> Result<Self, Error> {
        let mut filter = Self::new();
        filter.populate(keys)?;
        Ok(filter)
    }

    /// Populates an empty filter with the given keys.
    ///
    /// The keys may arrive in any order and duplicates are tolerated (they
    /// are deduplicated internally before construction). All keys must be
    /// provided in this single call; a populated filter is immutable.
    ///
    /// # Errors
    ///
    /// - `AlreadyPopulated` if this wrapper already holds a filter.
    /// - `AllocFailed` if the key count exceeds the 32-bit addressing of
    ///   the fingerprint array.
    /// - `BuildFailed` if construction exhausts its seed retries, which
    ///   indicates pathological collisions in the key set itself.
    ///
    /// On error the wrapper is left unpopulated and may be dropped, but a
    /// `BuildFailed` will recur for the same key set.
    pub fn populate(&mut self, keys: &[u64]) -> Result<(), Error> {
        if self.is_populated() {
            return Err(Error::already_populated());
        }
        if keys.len() > u32::MAX as usize {
            return Err(Error::new(
                ErrorKind::AllocFailed,
                format!("{} keys exceed the filter's 32-bit addressing", keys.len()),
            ));
        }

        let mut unique = keys.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut descriptor = FuseDescriptor::for_key_count(unique.len() as u32);
        let data = construct::populate::<W>(&unique, &mut descriptor)?;

        self.descriptor = descriptor;
        self.fingerprints = FingerprintData::Owned(data);
        Ok(())
    }

    /// Returns whether this wrapper holds a constructed or deserialized
    /// filter.
    pub fn is_populated(&self) -> bool {
        self.descriptor.is_populated()
    }

    /// Returns true when `key` is (probably) in the set, false when it is
    /// definitely not.
    ///
    /// Never allocates and is safe to call from several threads at once.
    ///
    /// # Errors
    ///
    /// `NotPopulated` if the filter was never built or deserialized.
    pub fn contains(&self, key: u64) -> Result<bool, Error> {
        if !self.is_populated() {
            return Err(Error::not_populated());
        }
        Ok(self.descriptor.contains::<W>(key, self.fingerprints.bytes()))
    }

    /// Checks that every one of `keys` is contained in the filter.
    ///
    /// Any false negative means the filter state is corrupt or there is a
    /// construction bug; the offending key is logged and `false` is
    /// returned immediately. Intended as a build-time integrity check.
    pub fn verify(&self, keys: &[u64]) -> Result<bool, Error> {
        for &key in keys {
            if !self.contains(key)? {
                log::warn!("filter verify detected a false negative: {key:#018x}");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Number of bytes [`Filter::serialize`] will write.
    pub fn serialization_bytes(&self) -> usize {
        self.descriptor.serialized_len(W::BYTES)
    }

    /// Serializes the filter into the caller-owned `dst` buffer: the
    /// descriptor followed by the fingerprint array. Does not allocate.
    ///
    /// # Errors
    ///
    /// `NotPopulated` on an empty wrapper; `InvalidArgument` if `dst` is
    /// shorter than [`Filter::serialization_bytes`].
    pub fn serialize(&self, dst: &mut [u8]) -> Result<(), Error> {
        if !self.is_populated() {
            return Err(Error::not_populated());
        }
        let need = self.serialization_bytes();
        if dst.len() < need {
            return Err(Error::invalid_argument(format!(
                "serialization needs {need} bytes, buffer holds {}",
                dst.len()
            )));
        }
        dst[..DESCRIPTOR_BYTES].copy_from_slice(&self.descriptor.encode());
        dst[DESCRIPTOR_BYTES..need].copy_from_slice(self.fingerprints.bytes());
        Ok(())
    }

    /// Deserializes a filter that borrows its fingerprint array from `src`.
    ///
    /// Only the descriptor prefix is parsed and checked; the fingerprint
    /// bytes are aliased as-is, so deserializing is O(1) regardless of
    /// filter size. The returned filter cannot outlive `src`; when `src`
    /// is a memory-mapped file, that file must stay mapped for as long as
    /// the filter is queried.
    ///
    /// # Errors
    ///
    /// `FormatError` if the descriptor is truncated or malformed, or if
    /// `src` is too short to hold the fingerprint array the descriptor
    /// describes.
    pub fn deserialize(src: &'a [u8]) -> Result<Self, Error> {
        let descriptor = FuseDescriptor::decode(src)?;
        let need = descriptor.serialized_len(W::BYTES);
        if src.len() < need {
            return Err(Error::format(format!(
                "filter truncated: descriptor promises {need} bytes, buffer holds {}",
                src.len()
            )));
        }
        Ok(Self {
            descriptor,
            fingerprints: FingerprintData::Borrowed(&src[DESCRIPTOR_BYTES..need]),
            _width: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_construct() {
        let filter = Filter8::new();
        assert!(!filter.is_populated());
        assert_eq!(
            filter.contains(1).unwrap_err().kind(),
            ErrorKind::NotPopulated
        );
    }

    #[test]
    fn test_build_and_contains() {
        let keys = [0u64, 1, 2, 0x8000_0000_0000_0000];
        let filter = Filter8::build(&keys).unwrap();
        assert!(filter.is_populated());
        for &key in &keys {
            assert!(filter.contains(key).unwrap());
        }
        assert!(filter.verify(&keys).unwrap());
    }

    #[test]
    fn test_populate_twice_fails() {
        let mut filter = Filter8::build(&[1, 2, 3]).unwrap();
        assert_eq!(
            filter.populate(&[4]).unwrap_err().kind(),
            ErrorKind::AlreadyPopulated
        );
    }

    #[test]
    fn test_duplicate_keys_tolerated() {
        let filter = Filter8::build(&[7, 7, 7, 8, 8]).unwrap();
        assert!(filter.contains(7).unwrap());
        assert!(filter.contains(8).unwrap());
    }

    #[test]
    fn test_empty_key_set_contains_nothing_much() {
        let filter = Filter8::build(&[]).unwrap();
        assert!(filter.is_populated());
        // Any fixed probe is rejected by the all-zero fingerprint array
        // unless its fingerprint happens to be zero; this one is not.
        assert!(!filter.contains(0x8000_0000_0000_0000).unwrap());
    }

    #[test]
    fn test_serialize_round_trip() {
        let keys: Vec<u64> = (0..2_000u64).map(|i| i.wrapping_mul(0x9e3779b97f4a7c15)).collect();
        let filter = Filter16::build(&keys).unwrap();

        let mut bytes = vec![0u8; filter.serialization_bytes()];
        filter.serialize(&mut bytes).unwrap();

        let view = Filter16::deserialize(&bytes).unwrap();
        assert!(view.is_populated());
        for &key in &keys {
            assert_eq!(view.contains(key).unwrap(), filter.contains(key).unwrap());
        }
    }

    #[test]
    fn test_serialize_short_buffer() {
        let filter = Filter8::build(&[1, 2, 3]).unwrap();
        let mut small = vec![0u8; filter.serialization_bytes() - 1];
        assert_eq!(
            filter.serialize(&mut small).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn test_deserialize_truncated() {
        let filter = Filter8::build(&[1, 2, 3]).unwrap();
        let mut bytes = vec![0u8; filter.serialization_bytes()];
        filter.serialize(&mut bytes).unwrap();
        let err = Filter8::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }
}
