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

mod common;

use binfuse::error::ErrorKind;
use binfuse::filter::Filter16;
use binfuse::filter::Filter8;
use binfuse::filter::FilterSource16;
use binfuse::filter::FilterSource8;
use common::estimate_false_positive_rate;
use common::random_keys;
use googletest::assert_that;
use googletest::prelude::le;

#[test]
fn test_default_construct() {
    let filter = Filter8::new();
    assert!(!filter.is_populated());
    assert_eq!(
        filter.contains(0).unwrap_err().kind(),
        ErrorKind::NotPopulated
    );
}

#[test]
fn test_large8() {
    let keys = random_keys(1_000_000, 42);
    let filter = Filter8::build(&keys).unwrap();
    assert!(filter.verify(&keys).unwrap());

    let rate = estimate_false_positive_rate(|key| filter.contains(key).unwrap());
    assert_that!(rate, le(0.005));
}

#[test]
fn test_large16() {
    let keys = random_keys(1_000_000, 43);
    let filter = Filter16::build(&keys).unwrap();
    assert!(filter.verify(&keys).unwrap());

    let rate = estimate_false_positive_rate(|key| filter.contains(key).unwrap());
    assert_that!(rate, le(0.00005));
}

#[test]
fn test_borrowed_round_trip_matches_owned() {
    let keys = random_keys(50_000, 44);
    let filter = Filter8::build(&keys).unwrap();

    let mut bytes = vec![0u8; filter.serialization_bytes()];
    filter.serialize(&mut bytes).unwrap();
    let view = Filter8::deserialize(&bytes).unwrap();

    for &key in keys.iter().take(1_000) {
        assert!(view.contains(key).unwrap());
    }
    // Owned and borrowed forms agree everywhere, members or not.
    let mut probe = 0x9e37_79b9_7f4a_7c15u64;
    for _ in 0..10_000 {
        probe = probe.wrapping_mul(0xd134_2543_de82_ef95).wrapping_add(1);
        assert_eq!(
            filter.contains(probe).unwrap(),
            view.contains(probe).unwrap()
        );
    }
}

#[test]
fn test_persistent_round_trip_large8() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large8.filter");

    let keys = random_keys(200_000, 45);
    let filter = Filter8::build(&keys).unwrap();
    filter.save(&path).unwrap();

    let source = FilterSource8::open(&path).unwrap();
    for &key in &keys {
        assert!(source.contains(key));
    }
    let rate = estimate_false_positive_rate(|key| source.contains(key));
    assert_that!(rate, le(0.005));
}

#[test]
fn test_persistent_round_trip_large16() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large16.filter");

    let keys = random_keys(200_000, 46);
    Filter16::build(&keys).unwrap().save(&path).unwrap();

    let source = FilterSource16::open(&path).unwrap();
    for &key in &keys {
        assert!(source.contains(key));
    }
    let rate = estimate_false_positive_rate(|key| source.contains(key));
    assert_that!(rate, le(0.00005));
}

#[test]
fn test_open_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(
        FilterSource8::open(dir.path().join("non_existent.filter"))
            .unwrap_err()
            .kind(),
        ErrorKind::Io
    );
}
