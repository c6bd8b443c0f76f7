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

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

/// Deterministic set of uniformly distributed 64-bit keys.
#[allow(dead_code)] // false-positive
pub fn random_keys(count: usize, seed: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys: Vec<u64> = (0..count).map(|_| rng.gen()).collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Fraction of one million random probes a filter reports as present.
///
/// The probes are drawn independently of any construction set, so for a
/// filter over random keys this estimates the false-positive rate.
#[allow(dead_code)] // false-positive
pub fn estimate_false_positive_rate(contains: impl Fn(u64) -> bool) -> f64 {
    const SAMPLE_SIZE: usize = 1_000_000;

    let mut rng = StdRng::seed_from_u64(0x0b5e_55ed_0000_0001);
    let matches = (0..SAMPLE_SIZE)
        .filter(|_| contains(rng.gen()))
        .count();
    matches as f64 / SAMPLE_SIZE as f64
}
