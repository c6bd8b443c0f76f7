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

//! Thin wrappers around `memmap2` mappings.
//!
//! The write-mode wrapper supports the resize-then-remap cycle the sharded
//! sink performs on every append. A resize invalidates every byte reference
//! previously derived from the mapping, which is why the rest of the crate
//! only ever holds offsets into a mapping and re-derives slices through
//! [`MappedFile::bytes`] after each call that can remap.
//!
//! Mapping an empty file is not supported by the OS primitive; callers
//! create files at their final header size before mapping.

use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;

use memmap2::Mmap;
use memmap2::MmapMut;

use crate::error::Error;

/// A writable file-backed mapping that can grow.
#[derive(Debug)]
pub(crate) struct MappedFile {
    file: File,
    map: MmapMut,
    path: PathBuf,
}

impl MappedFile {
    /// Creates (or truncates to `len`) the file at `path` and maps it
    /// read-write.
    pub fn create(path: &Path, len: u64) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::io("open", e).with_context("path", path.display()))?;
        file.set_len(len)
            .map_err(|e| Error::io("resize", e).with_context("path", path.display()))?;
        Self::map_whole(file, path)
    }

    /// Maps an existing, non-empty file read-write.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::io("open", e).with_context("path", path.display()))?;
        Self::map_whole(file, path)
    }

    fn map_whole(file: File, path: &Path) -> Result<Self, Error> {
        // Safety: the engine owns this file exclusively for the lifetime of
        // the mapping; nothing else truncates it underneath us.
        let map = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| Error::io("map", e).with_context("path", path.display()))?;
        Ok(Self {
            file,
            map,
            path: path.to_path_buf(),
        })
    }

    /// Grows the file to `len` and remaps it. The previous mapping, and
    /// every slice derived from it, is gone after this returns.
    pub fn resize(&mut self, len: u64) -> Result<(), Error> {
        self.sync()?;
        self.file
            .set_len(len)
            .map_err(|e| Error::io("resize", e).with_context("path", self.path.display()))?;
        self.map = unsafe { MmapMut::map_mut(&self.file) }
            .map_err(|e| Error::io("remap", e).with_context("path", self.path.display()))?;
        Ok(())
    }

    /// Flushes the mapping to disk.
    pub fn sync(&self) -> Result<(), Error> {
        self.map
            .flush()
            .map_err(|e| Error::io("sync", e).with_context("path", self.path.display()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.map
    }
}

/// A read-only file-backed mapping.
#[derive(Debug)]
pub(crate) struct MappedFileRead {
    map: Mmap,
}

impl MappedFileRead {
    /// Maps the whole file at `path` read-only.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)
            .map_err(|e| Error::io("open", e).with_context("path", path.display()))?;
        // Safety: readers tolerate concurrent readers only; the caller
        // contract forbids a live writer on the same file.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::io("map", e).with_context("path", path.display()))?;
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_resize_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.bin");

        let mut map = MappedFile::create(&path, 8).unwrap();
        map.bytes_mut()[..8].copy_from_slice(b"abcdefgh");
        map.resize(16).unwrap();
        assert_eq!(map.len(), 16);
        // Contents survive the remap; the extension reads as zeros.
        assert_eq!(&map.bytes()[..8], b"abcdefgh");
        assert_eq!(&map.bytes()[8..], &[0u8; 8]);
        map.bytes_mut()[8] = b'i';
        map.sync().unwrap();
        drop(map);

        let read = MappedFileRead::open(&path).unwrap();
        assert_eq!(read.len(), 16);
        assert_eq!(&read.bytes()[..9], b"abcdefghi");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MappedFileRead::open(&dir.path().join("absent")).is_err());
    }
}
