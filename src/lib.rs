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

//! # Sharded, persistent binary fuse filters
//!
//! This crate answers one question, "is this 64-bit key in the set?",
//! with zero false negatives and a small, bounded false-positive rate,
//! over key sets that may be far too large to build in memory at once.
//!
//! Three layers, smallest first:
//!
//! - [`fuse`]: the binary fuse primitive: construction and the
//!   three-load query kernel, generic over 8- and 16-bit fingerprints.
//! - [`filter`]: a build-once wrapper around one filter, with
//!   serialization, zero-copy deserialization, and single-file
//!   persistence.
//! - [`sharded`]: many filters in one memory-mapped file, keyed by the top
//!   bits of each key; built incrementally (random-order or streaming) and
//!   queried with essentially no per-query I/O once warm.
//!
//! Keys are assumed to be uniformly distributed; hash your real keys
//! first. All on-disk formats are little-endian and build-once: there is
//! no insertion or deletion after a filter is sealed.
//!
//! ```rust
//! use binfuse::filter::Filter8;
//!
//! let keys = [0xdead_beef_u64, 0xcafe_f00d, 42];
//! let filter = Filter8::build(&keys).unwrap();
//! assert!(filter.contains(42).unwrap());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod error;
pub mod filter;
pub mod fuse;
pub mod sharded;

mod codec;
mod hash;
mod mmap;
