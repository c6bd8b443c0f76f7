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

//! The binary fuse primitive: layout calculation, randomized construction
//! and the query kernel.
//!
//! A binary fuse filter stores one fingerprint per array slot; each key maps
//! to three slots spread over consecutive logical segments, and the XOR of
//! the three slot values equals the key's fingerprint. Construction is a
//! peeling process over that 3-uniform hypergraph; querying is three loads
//! and two XORs. Keys present in the construction set always match, and an
//! absent key matches with probability 2^-W for fingerprint width W.
//!
//! The types here are deliberately low level (geometry plus raw fingerprint
//! bytes) so the same query kernel runs over a heap-allocated array and
//! over a slice of a memory-mapped file. The [`crate::filter`] module wraps
//! this into the build-once filter most callers want.

use std::fmt;
use std::ops::BitXor;
use std::ops::BitXorAssign;

pub(crate) mod construct;
pub(crate) mod layout;

pub(crate) use self::layout::FuseDescriptor;
pub(crate) use self::layout::DESCRIPTOR_BYTES;

/// Fingerprint width of a binary fuse filter.
///
/// Implemented for [`u8`] (≈0.39% false-positive rate) and [`u16`]
/// (≈0.0015%). The width is fixed at construction time and is part of every
/// persisted filter's identity: files record it in their type tag and
/// readers must open them with the same width.
pub trait Fingerprint:
    Copy + Default + Eq + BitXor<Output = Self> + BitXorAssign + fmt::Debug + Send + Sync + 'static
{
    /// Width in bits; bounds the false-positive rate at `2^-BITS`.
    const BITS: u32;

    /// Bytes one fingerprint occupies in a serialized array.
    const BYTES: usize;

    /// Derives the fingerprint of an already-mixed 64-bit hash.
    fn from_hash(hash: u64) -> Self;

    /// Loads the fingerprint at `index` from a serialized array.
    fn read(bytes: &[u8], index: usize) -> Self;

    /// Converts a constructed fingerprint array into its serialized bytes.
    fn into_bytes(values: Vec<Self>) -> Vec<u8>;
}

impl Fingerprint for u8 {
    const BITS: u32 = 8;
    const BYTES: usize = 1;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        (hash ^ (hash >> 32)) as u8
    }

    #[inline]
    fn read(bytes: &[u8], index: usize) -> Self {
        bytes[index]
    }

    fn into_bytes(values: Vec<Self>) -> Vec<u8> {
        values
    }
}

impl Fingerprint for u16 {
    const BITS: u32 = 16;
    const BYTES: usize = 2;

    #[inline]
    fn from_hash(hash: u64) -> Self {
        (hash ^ (hash >> 32)) as u16
    }

    #[inline]
    fn read(bytes: &[u8], index: usize) -> Self {
        u16::from_le_bytes([bytes[2 * index], bytes[2 * index + 1]])
    }

    fn into_bytes(values: Vec<Self>) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * 2);
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }
}
