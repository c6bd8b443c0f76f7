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
use std::path::PathBuf;

use crate::error::Error;
use crate::error::ErrorKind;
use crate::filter::Filter;
use crate::fuse::Fingerprint;
use crate::mmap::MappedFile;
use crate::sharded::layout;
use crate::sharded::layout::ShardSlot;

/// Write-mode handle over a sharded filter file.
///
/// A sink owns its file exclusively for its lifetime. Filters are appended
/// one shard at a time: in any prefix order via [`ShardedSink::add`], or
/// in key order via the streaming calls, which build each shard's filter as
/// its key range completes. See the [module documentation](crate::sharded)
/// for the file layout.
#[derive(Debug)]
pub struct ShardedSink<W: Fingerprint = u8> {
    path: PathBuf,
    shard_bits: u8,
    map: Option<MappedFile>,
    slots: Vec<Option<ShardSlot>>,
    shards_built: u32,
    stream_keys: Vec<u64>,
    stream_last_prefix: u32,
    stream_last_key: Option<u64>,
    _width: PhantomData<W>,
}

impl<W: Fingerprint> ShardedSink<W> {
    /// Opens (or prepares to create) the sharded file at `path`.
    ///
    /// An existing non-empty file must carry a matching tag and capacity;
    /// its shard count is recovered from the index so appending can
    /// resume. A missing or empty file is left untouched; the header and
    /// index are first written by the first [`ShardedSink::add`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for `shard_bits > 13`; `FormatError` /
    /// `CapacityMismatch` if an existing file disagrees with the
    /// parameters; `Io` on filesystem failure.
    pub fn open(path: impl AsRef<Path>, shard_bits: u8) -> Result<Self, Error> {
        layout::check_shard_bits(shard_bits)?;
        let path = path.as_ref();
        let mut sink = Self {
            path: path.to_path_buf(),
            shard_bits,
            map: None,
            slots: vec![None; layout::capacity(shard_bits) as usize],
            shards_built: 0,
            stream_keys: Vec::new(),
            stream_last_prefix: 0,
            stream_last_key: None,
            _width: PhantomData,
        };

        let file_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if file_len > 0 {
            let map = MappedFile::open(path)?;
            sink.validate(&map)?;
            sink.map = Some(map);
            sink.reload_slots()?;
            log::debug!(
                "reopened sharded filter {} with {} shards",
                path.display(),
                sink.shards_built
            );
        }
        Ok(sink)
    }

    /// Number of shards holding a filter.
    pub fn shards(&self) -> u32 {
        self.shards_built
    }

    /// Inserts a pre-built filter as the shard for `prefix`.
    ///
    /// Every key the filter was built from must have `prefix` as its top
    /// `shard_bits` bits; the sink cannot check this, and a violation
    /// shows up as false negatives at query time.
    ///
    /// The file is extended, the filter serialized into the new tail, and
    /// the index slot pointed at it; the mapping is refreshed afterwards so
    /// [`ShardedSink::contains`] keeps working.
    ///
    /// # Errors
    ///
    /// `NotPopulated` if `filter` is empty, `InvalidArgument` if `prefix`
    /// is out of range, `CapacityExceeded` if every slot is already
    /// occupied, `SlotOccupied` if this slot is, `Io` on filesystem
    /// failure. The index is untouched on any error.
    pub fn add(&mut self, filter: &Filter<'_, W>, prefix: u32) -> Result<(), Error> {
        if !filter.is_populated() {
            return Err(Error::not_populated());
        }
        let cap = layout::capacity(self.shard_bits);
        if prefix >= cap {
            return Err(Error::invalid_argument(format!(
                "prefix {prefix} out of range for {cap} shards"
            )));
        }
        if self.shards_built == cap {
            return Err(Error::new(
                ErrorKind::CapacityExceeded,
                format!("sharded filter already holds all {cap} shards"),
            ));
        }

        let need = filter.serialization_bytes();
        let map = self.map_or_create()?;
        if layout::read_slot(map.bytes(), prefix) != layout::EMPTY_OFFSET {
            return Err(Error::new(
                ErrorKind::SlotOccupied,
                format!("there is already a filter for prefix {prefix}"),
            ));
        }

        let old_len = map.len();
        map.resize((old_len + need) as u64)?;
        filter.serialize(&mut map.bytes_mut()[old_len..old_len + need])?;
        layout::write_slot(map.bytes_mut(), prefix, old_len as u64);
        map.sync()?;

        // The resize remapped the file; every cached view is stale. The
        // reload also recounts `shards_built` from the index.
        self.reload_slots()?;
        log::debug!("appended shard {prefix} ({need} bytes) at offset {old_len}");
        Ok(())
    }

    /// Resets the streaming state; call once before a run of
    /// [`ShardedSink::stream_add`].
    pub fn stream_prepare(&mut self) {
        self.stream_keys.clear();
        self.stream_last_prefix = 0;
        self.stream_last_key = None;
    }

    /// Adds one key of a non-decreasing key stream.
    ///
    /// Keys accumulate per shard; when the stream crosses into the next
    /// shard prefix the accumulated shard is built and appended. Because
    /// the keys arrive sorted, each shard's keys are contiguous and only
    /// one shard is ever buffered.
    ///
    /// # Errors
    ///
    /// `OutOfOrder` if `key` sorts below its predecessor; the stream state
    /// is unchanged and the file keeps whatever the last flush produced.
    /// Build and I/O errors propagate from the implied
    /// [`ShardedSink::add`].
    pub fn stream_add(&mut self, key: u64) -> Result<(), Error> {
        if let Some(last) = self.stream_last_key {
            if key < last {
                return Err(Error::new(
                    ErrorKind::OutOfOrder,
                    format!("streamed key {key:#018x} sorts before {last:#018x}"),
                ));
            }
        }
        let prefix = layout::shard_prefix(key, self.shard_bits);
        if prefix != self.stream_last_prefix {
            self.flush_stream()?;
            self.stream_last_prefix = prefix;
        }
        self.stream_keys.push(key);
        self.stream_last_key = Some(key);
        Ok(())
    }

    /// Builds and appends the final buffered shard of a stream.
    pub fn stream_finalize(&mut self) -> Result<(), Error> {
        self.flush_stream()
    }

    /// Returns true when `key` is (probably) in the set, false when it is
    /// definitely not, including when its shard has not been added yet.
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

    fn flush_stream(&mut self) -> Result<(), Error> {
        if self.stream_keys.is_empty() {
            return Ok(());
        }
        let filter = Filter::build(&self.stream_keys)?;
        let prefix = self.stream_last_prefix;
        log::debug!(
            "streaming flush: {} keys into shard {prefix}",
            self.stream_keys.len()
        );
        self.stream_keys.clear();
        self.add(&filter, prefix)
    }

    /// Returns the live mapping, writing the header and an all-empty index
    /// first if the file has none yet.
    fn map_or_create(&mut self) -> Result<&mut MappedFile, Error> {
        if self.map.is_none() {
            let cap = layout::capacity(self.shard_bits);
            let mut map = MappedFile::create(&self.path, layout::body_start(cap) as u64)?;
            let header = layout::header_block::<W>(cap);
            map.bytes_mut()[..header.len()].copy_from_slice(&header);
            map.sync()?;
            log::debug!(
                "created sharded filter {} with capacity {cap}",
                self.path.display()
            );
            self.map = Some(map);
            self.shards_built = 0;
        }
        self.map
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::Io, "file mapping unavailable"))
    }

    fn validate(&self, map: &MappedFile) -> Result<(), Error> {
        let cap = layout::capacity(self.shard_bits);
        if map.len() < layout::body_start(cap) {
            return Err(Error::format("corrupt file: header and index half written")
                .with_context("path", self.path.display()));
        }
        layout::check_tag::<W>(map.bytes(), self.shard_bits)
    }

    fn reload_slots(&mut self) -> Result<(), Error> {
        if let Some(map) = self.map.as_ref() {
            let cap = layout::capacity(self.shard_bits);
            self.slots = layout::load_slots::<W>(map.bytes(), cap)?;
            self.shards_built = self.slots.iter().flatten().count() as u32;
        }
        Ok(())
    }
}
