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

//! Sharded, file-backed binary fuse filters for key sets too large to
//! build in one piece.
//!
//! The 64-bit key space is partitioned by the top `shard_bits` of each key
//! into `2^shard_bits` shards, each an independent filter. All shards live
//! in a single file:
//!
//! ```text
//! header [0, 16)           ASCII tag `sbinfuseWW-CCCC` (width, capacity)
//! index  [16, 16 + 8·C)    C little-endian u64 offsets; all-ones = empty
//! body   [16 + 8·C, EOF)   serialized filters, in append order
//! ```
//!
//! A [`ShardedSink`] writes such a file shard by shard; a
//! [`ShardedSource`] memory-maps it and routes each query to the shard
//! owning the key's prefix. Because every query touches exactly one
//! shard's fingerprint array, only a sliver of the file needs to be
//! resident.
//!
//! # Building
//!
//! Filters can be added per shard in any order with [`ShardedSink::add`],
//! or, when the keys are available in sorted order, streamed:
//!
//! ```no_run
//! use binfuse::sharded::{ShardedSink8, ShardedSource8};
//!
//! let mut sink = ShardedSink8::open("keys.shards", 8).unwrap();
//! sink.stream_prepare();
//! for key in [0x00ab_u64 << 48, 0x01cd_u64 << 48, 0x01ce_u64 << 48] {
//!     sink.stream_add(key).unwrap(); // keys must be non-decreasing
//! }
//! sink.stream_finalize().unwrap();
//! drop(sink);
//!
//! let source = ShardedSource8::open("keys.shards", 8).unwrap();
//! assert!(source.contains(0x00ab_u64 << 48));
//! ```
//!
//! Streaming keeps at most one shard's keys in memory, which is the point:
//! a billion-key build needs RAM for one shard and disk for the rest.
//!
//! # Consistency
//!
//! Each `add` grows the file and remaps it; the sink rebuilds its cached
//! shard views after every append, so interleaving `add` and `contains` on
//! a sink is safe. A sink owns its file exclusively; do not open a source
//! on a file with a live sink. Any number of sources may read the same
//! file concurrently.

mod layout;
mod sink;
mod source;

pub use self::sink::ShardedSink;
pub use self::source::ShardedSource;

/// A [`ShardedSink`] over 8-bit fingerprints.
pub type ShardedSink8 = ShardedSink<u8>;
/// A [`ShardedSink`] over 16-bit fingerprints.
pub type ShardedSink16 = ShardedSink<u16>;
/// A [`ShardedSource`] over 8-bit fingerprints.
pub type ShardedSource8 = ShardedSource<u8>;
/// A [`ShardedSource`] over 16-bit fingerprints.
pub type ShardedSource16 = ShardedSource<u16>;
