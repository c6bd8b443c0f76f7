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

//! Single binary fuse filters: build once, query forever.
//!
//! # Properties
//!
//! - **No false negatives**: every key passed to a successful build is
//!   reported present.
//! - **Bounded false positives**: an absent key is reported present with
//!   probability at most 2^-8 ([`Filter8`]) or 2^-16 ([`Filter16`]).
//! - **Immutable**: a filter is populated exactly once; there is no insert
//!   or remove.
//!
//! # Usage
//!
//! ```rust
//! use binfuse::filter::Filter8;
//!
//! let keys = [1u64, 2, 3, 0xdead_beef];
//! let filter = Filter8::build(&keys).unwrap();
//!
//! assert!(filter.contains(2).unwrap());
//! // Every build key is found; that is the no-false-negative guarantee.
//! assert!(filter.verify(&keys).unwrap());
//! ```
//!
//! # Ownership
//!
//! A filter either owns its fingerprint array (built in memory via
//! [`Filter::build`] or [`Filter::populate`]) or borrows it from a caller
//! buffer ([`Filter::deserialize`]), typically a slice of a memory-mapped
//! file, which is how the sharded engine queries without copying. The
//! borrow is a real lifetime: the compiler will not let a deserialized
//! filter outlive the bytes it reads from.
//!
//! ```rust
//! use binfuse::filter::Filter8;
//!
//! let filter = Filter8::build(&[10, 20, 30]).unwrap();
//! let mut bytes = vec![0u8; filter.serialization_bytes()];
//! filter.serialize(&mut bytes).unwrap();
//!
//! let view = Filter8::deserialize(&bytes).unwrap();
//! assert!(view.contains(20).unwrap());
//! ```
//!
//! For persisting a single filter to its own file, see [`Filter::save`] and
//! [`FilterSource`]. Filters covering more keys than comfortably fit in
//! memory belong in the [`crate::sharded`] engine instead.

mod persistent;
mod wrapper;

pub use self::persistent::FilterSource;
pub use self::persistent::FilterSource16;
pub use self::persistent::FilterSource8;
pub use self::wrapper::Filter;
pub use self::wrapper::Filter16;
pub use self::wrapper::Filter8;
