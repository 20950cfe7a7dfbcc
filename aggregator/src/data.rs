// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Bit-level payloads moved through the aggregator.
//!
//! Narrow elements and wide output words are both untyped bit vectors: the
//! element width and the bank count are construction-time parameters, so the
//! wide word can be arbitrarily large. Bit 0 is the least significant bit.

use bitvec::prelude::*;
use itertools::Itertools;

pub type Data = BitBox<usize, Lsb0>;

/// output data, which the aggregator labels as invalid when no round is being delivered
#[derive(Clone, Debug, PartialEq)]
pub struct DataWithValidity {
    pub data: Data,
    pub valid: bool,
}

impl DataWithValidity {
    /// An invalid, all-zero word of `width` bits.
    pub fn invalid(width: usize) -> Self {
        Self {
            data: zeroed(width),
            valid: false,
        }
    }
}

pub fn zeroed(width: usize) -> Data {
    BitVec::<usize, Lsb0>::repeat(false, width).into_boxed_bitslice()
}

/// Pack the low `width` bits of `value` into a `Data`.
///
/// Bits above 64 are zero.
pub fn pack(value: u64, width: usize) -> Data {
    let mut bits = BitVec::<usize, Lsb0>::repeat(false, width);
    for i in 0..width.min(64) {
        bits.set(i, (value >> i) & 1 == 1);
    }
    bits.into_boxed_bitslice()
}

/// Load the low 64 bits of `data` into an integer.
pub fn unpack(data: &BitSlice<usize, Lsb0>) -> u64 {
    data.iter()
        .take(64)
        .enumerate()
        .fold(0u64, |acc, (i, b)| acc | ((*b as u64) << i))
}

/// Concatenate `parts` so that the first part occupies the lowest bits.
pub fn concat<'a, I>(parts: I) -> Data
where
    I: IntoIterator<Item = &'a BitSlice<usize, Lsb0>>,
{
    let mut word = BitVec::<usize, Lsb0>::new();
    for part in parts {
        word.extend_from_bitslice(part);
    }
    word.into_boxed_bitslice()
}

/// Render `data` most-significant bit first, with `_` between `lane`-bit fields.
pub fn to_bit_string(data: &BitSlice<usize, Lsb0>, lane: usize) -> String {
    if lane == 0 {
        return String::new();
    }
    data.chunks(lane)
        .rev()
        .map(|chunk| {
            chunk
                .iter()
                .rev()
                .map(|b| if *b { '1' } else { '0' })
                .collect::<String>()
        })
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_concat_lanes() {
        let lanes = [0x01u64, 0x02, 0x03, 0x04]
            .iter()
            .map(|v| pack(*v, 8))
            .collect::<Vec<_>>();
        let word = concat(lanes.iter().map(|lane| lane.as_bitslice()));
        assert_eq!(word.len(), 32);
        assert_eq!(unpack(&word), 0x04030201);
        assert_eq!(unpack(&word[8..16]), 0x02);
    }

    #[test]
    fn pack_truncates_to_width() {
        let narrow = pack(0x1ff, 4);
        assert_eq!(narrow.len(), 4);
        assert_eq!(unpack(&narrow), 0xf);
    }

    #[test]
    fn bit_string_groups_lanes() {
        let word = concat([pack(0b01, 2).as_bitslice(), pack(0b10, 2).as_bitslice()]);
        assert_eq!(to_bit_string(&word, 2), "10_01");
        assert_eq!(DataWithValidity::invalid(3).data, zeroed(3));
    }
}
