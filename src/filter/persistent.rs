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
use std::path::Path;

use crate::error::Error;
use crate::fuse::Fingerprint;
use crate::fuse::FuseDescriptor;
use crate::fuse::DESCRIPTOR_BYTES;
use crate::mmap::MappedFile;
use crate::mmap::MappedFileRead;

/// Size of the identification region at the head of a filter file.
const HEADER_LEN: usize = 16;

/// Type id written at offset zero, e.g. `binfuse08`; the remainder of the
/// header region is zero padding.
fn type_id<W: Fingerprint>() -> String {
    format!("binfuse{:02}", W::BITS)
}

impl<W: Fingerprint> super::Filter<'_, W> {
    /// Persists a populated filter to its own file.
    ///
    /// Layout: a 16-byte header holding the ASCII type id, then the
    /// serialized filter. An existing file at `path` is overwritten.
    ///
    /// # Errors
    ///
    /// `NotPopulated` on an empty wrapper; `Io` on filesystem failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        if !self.is_populated() {
            return Err(Error::not_populated());
        }
        let path = path.as_ref();
        let file_len = HEADER_LEN + self.serialization_bytes();
        let mut map = MappedFile::create(path, file_len as u64)?;

        let id = type_id::<W>();
        let bytes = map.bytes_mut();
        bytes[..id.len()].copy_from_slice(id.as_bytes());
        bytes[id.len()..HEADER_LEN].fill(0);
        self.serialize(&mut bytes[HEADER_LEN..])?;
        map.sync()
    }
}

/// A single filter loaded from a file written by [`save`](super::Filter::save),
/// queried directly off the memory mapping.
///
/// Opening validates the type id and the descriptor; queries then touch
/// only the mapped fingerprint pages. The mapping lives as long as the
/// source.
///
/// ```no_run
/// use binfuse::filter::{Filter8, FilterSource8};
///
/// let filter = Filter8::build(&[1, 2, 3]).unwrap();
/// filter.save("keys.filter").unwrap();
///
/// let source = FilterSource8::open("keys.filter").unwrap();
/// assert!(source.contains(2));
/// ```
#[derive(Debug)]
pub struct FilterSource<W: Fingerprint = u8> {
    map: MappedFileRead,
    descriptor: FuseDescriptor,
    _width: PhantomData<W>,
}

/// A [`FilterSource`] over 8-bit fingerprints.
pub type FilterSource8 = FilterSource<u8>;
/// A [`FilterSource`] over 16-bit fingerprints.
pub type FilterSource16 = FilterSource<u16>;

impl<W: Fingerprint> FilterSource<W> {
    /// Memory-maps the filter file at `path` read-only and validates it.
    ///
    /// # Errors
    ///
    /// `FormatError` if the type id does not match this fingerprint width
    /// or the file cannot hold the filter its descriptor describes; `Io`
    /// if the file cannot be opened or mapped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let map = MappedFileRead::open(path)?;
        let id = type_id::<W>();
        let bytes = map.bytes();
        if bytes.len() < HEADER_LEN + DESCRIPTOR_BYTES {
            return Err(Error::format("file too short for a filter header")
                .with_context("path", path.display()));
        }
        if &bytes[..id.len()] != id.as_bytes() {
            return Err(Error::format(format!(
                "incorrect type id: expected {id}, found {}",
                String::from_utf8_lossy(&bytes[..id.len()])
            ))
            .with_context("path", path.display()));
        }
        let descriptor = FuseDescriptor::decode(&bytes[HEADER_LEN..])?;
        if bytes.len() < HEADER_LEN + descriptor.serialized_len(W::BYTES) {
            return Err(
                Error::format("filter truncated: fingerprint array extends past end of file")
                    .with_context("path", path.display()),
            );
        }
        Ok(Self {
            map,
            descriptor,
            _width: PhantomData,
        })
    }

    /// Returns true when `key` is (probably) in the set, false when it is
    /// definitely not.
    pub fn contains(&self, key: u64) -> bool {
        let start = HEADER_LEN + DESCRIPTOR_BYTES;
        let len = self.descriptor.array_length as usize * W::BYTES;
        self.descriptor
            .contains::<W>(key, &self.map.bytes()[start..start + len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::filter::Filter16;
    use crate::filter::Filter8;
    use crate::filter::FilterSource16;
    use crate::filter::FilterSource8;

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single.filter");

        let keys: Vec<u64> = (0..10_000u64).map(|i| i.wrapping_mul(0xc4ceb9fe1a85ec53)).collect();
        let filter = Filter8::build(&keys).unwrap();
        filter.save(&path).unwrap();

        let source = FilterSource8::open(&path).unwrap();
        for &key in &keys {
            assert!(source.contains(key));
        }
    }

    #[test]
    fn test_save_unpopulated_fails() {
        let dir = tempfile::tempdir().unwrap();
        let filter = Filter8::new();
        let err = filter.save(dir.path().join("x.filter")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotPopulated);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w8.filter");
        Filter8::build(&[1, 2, 3]).unwrap().save(&path).unwrap();

        let err = FilterSource16::open(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn test_sixteen_bit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single16.filter");
        let keys = [5u64, 6, 7];
        Filter16::build(&keys).unwrap().save(&path).unwrap();

        let source = FilterSource16::open(&path).unwrap();
        for &key in &keys {
            assert!(source.contains(key));
        }
    }
}
