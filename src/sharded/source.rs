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

use std::fs;
use std::marker::PhantomData;
use std::path::Path;

use crate::error::Error;
use crate::fuse::Fingerprint;
use crate::mmap::MappedFileRead;
use crate::sharded::layout;
use crate::sharded::layout::ShardSlot;

/// Read-mode handle over a sharded filter file.
///
/// Opening memory-maps the file, validates the tag and capacity, and
/// decodes a descriptor for every occupied shard slot. Queries are then
/// pure reads against the mapping (no allocation, no I/O beyond page
/// faults) and take `&self`, so one source can serve many threads.
///
/// The default-constructed source has no file behind it: it reports zero
/// shards and contains nothing.
#[derive(Debug)]
pub struct ShardedSource<W: Fingerprint = u8> {
    map: Option<MappedFileRead>,
    shard_bits: u8,
    slots: Vec<Option<ShardSlot>>,
    shards: u32,
    _width: PhantomData<W>,
}

impl<W: Fingerprint> Default for ShardedSource<W> {
    fn default() -> Self {
        Self {
            map: None,
            shard_bits: 0,
            slots: Vec::new(),
            shards: 0,
            _width: PhantomData,
        }
    }
}

impl<W: Fingerprint> ShardedSource<W> {
    /// Creates a source with no backing file; every query returns false.
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory-maps the sharded file at `path` read-only and loads its
    /// shard table.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for `shard_bits > 13`; `FormatError` for a
    /// missing header, a foreign or malformed tag, or a filter that does
    /// not fit the file; `CapacityMismatch` if the file was written with a
    /// different `shard_bits`; `Io` if the file cannot be opened or
    /// mapped.
    pub fn open(path: impl AsRef<Path>, shard_bits: u8) -> Result<Self, Error> {
        layout::check_shard_bits(shard_bits)?;
        let path = path.as_ref();
        let cap = layout::capacity(shard_bits);

        let file_len = fs::metadata(path)
            .map_err(|e| Error::io("stat", e).with_context("path", path.display()))?
            .len();
        if file_len < layout::body_start(cap) as u64 {
            let message = if file_len == 0 {
                "empty file: no header present"
            } else {
                "corrupt file: header and index half written"
            };
            return Err(Error::format(message).with_context("path", path.display()));
        }

        let map = MappedFileRead::open(path)?;
        layout::check_tag::<W>(map.bytes(), shard_bits)?;
        let slots = layout::load_slots::<W>(map.bytes(), cap)?;
        let shards = slots.iter().flatten().count() as u32;

        Ok(Self {
            map: Some(map),
            shard_bits,
            slots,
            shards,
            _width: PhantomData,
        })
    }

    /// Returns true when `key` is (probably) in the set, false when it is
    /// definitely not.
    ///
    /// The key's shard is selected by its top `shard_bits` bits; a key
    /// routed to a shard that was never added is definitely absent.
    pub fn contains(&self, key: u64) -> bool {
        let Some(map) = self.map.as_ref() else {
            return false;
        };
        let prefix = layout::shard_prefix(key, self.shard_bits);
        match &self.slots[prefix as usize] {
            Some(slot) => slot.contains::<W>(key, map.bytes()),
            None => false,
        }
    }

    /// Number of shards holding a filter.
    pub fn shards(&self) -> u32 {
        self.shards
    }
}
